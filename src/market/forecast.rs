//! Forecast capability boundary
//!
//! An external service may predict the next candle from the most recent bars.
//! Whatever it does, the price model only ever sees `Some(forecast)` or a
//! reason to take the fallback path.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::types::Candle;

/// Predicted next candle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub sentiment: Option<String>,
}

impl Forecast {
    /// Finite and strictly positive prices only
    pub fn is_usable(&self) -> bool {
        [self.high, self.low, self.close]
            .iter()
            .all(|v| v.is_finite() && *v > 0.0)
    }
}

/// Forecast configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ForecastConfig {
    pub enabled: bool,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    /// Upper bound on how long a tick waits for a forecast
    pub timeout_ms: u64,
    /// Number of recent candles sent to the service
    pub lookback: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            api_key: None,
            timeout_ms: 1500,
            lookback: 5,
        }
    }
}

/// External next-candle predictor
#[async_trait]
pub trait Forecaster: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` means "no opinion"; errors are treated the same way
    async fn forecast(&self, recent: &[Candle]) -> Result<Option<Forecast>>;
}

/// Forecaster used when the capability is absent
#[derive(Debug, Default, Clone, Copy)]
pub struct NoForecaster;

#[async_trait]
impl Forecaster for NoForecaster {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn forecast(&self, _recent: &[Candle]) -> Result<Option<Forecast>> {
        Ok(None)
    }
}

#[derive(Debug, Serialize)]
struct ForecastRequest<'a> {
    candles: &'a [Candle],
}

/// Forecast service reached over HTTP.
///
/// POSTs `{"candles": [...]}` and expects `{"high", "low", "close", "sentiment"}`.
/// A 204 or an empty body counts as no result.
pub struct HttpForecaster {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpForecaster {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build forecast HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        })
    }
}

#[async_trait]
impl Forecaster for HttpForecaster {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn forecast(&self, recent: &[Candle]) -> Result<Option<Forecast>> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&ForecastRequest { candles: recent });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .context("Forecast request failed")?
            .error_for_status()
            .context("Forecast service returned an error status")?;

        if response.status() == reqwest::StatusCode::NO_CONTENT {
            debug!("Forecast service returned no content");
            return Ok(None);
        }

        let body = response
            .text()
            .await
            .context("Failed to read forecast response")?;
        if body.trim().is_empty() || body.trim() == "null" {
            return Ok(None);
        }

        let forecast: Forecast =
            serde_json::from_str(&body).context("Malformed forecast response")?;
        Ok(Some(forecast))
    }
}

/// Build the forecaster described by the config
pub fn build_forecaster(config: &ForecastConfig) -> Result<std::sync::Arc<dyn Forecaster>> {
    match (config.enabled, config.endpoint.as_deref()) {
        (true, Some(endpoint)) if !endpoint.is_empty() => {
            let forecaster = HttpForecaster::new(
                endpoint,
                config.api_key.clone(),
                Duration::from_millis(config.timeout_ms),
            )?;
            Ok(std::sync::Arc::new(forecaster))
        }
        (true, _) => {
            warn!("Forecasting enabled without an endpoint; using fallback only");
            Ok(std::sync::Arc::new(NoForecaster))
        }
        _ => Ok(std::sync::Arc::new(NoForecaster)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forecast_usability() {
        let good = Forecast {
            high: 10.0,
            low: 9.0,
            close: 9.5,
            sentiment: None,
        };
        assert!(good.is_usable());
        assert!(!Forecast { close: f64::NAN, ..good.clone() }.is_usable());
        assert!(!Forecast { low: 0.0, ..good }.is_usable());
    }

    #[test]
    fn test_forecast_parses_without_sentiment() {
        let f: Forecast = serde_json::from_str(r#"{"high":1.0,"low":0.5,"close":0.8}"#).unwrap();
        assert_eq!(f.sentiment, None);
        assert_eq!(f.close, 0.8);
    }

    #[tokio::test]
    async fn test_no_forecaster_has_no_opinion() {
        let result = NoForecaster.forecast(&[]).await.unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_build_forecaster_defaults_to_none() {
        let forecaster = build_forecaster(&ForecastConfig::default()).unwrap();
        assert_eq!(forecaster.name(), "none");

        let enabled_without_endpoint = ForecastConfig {
            enabled: true,
            ..Default::default()
        };
        let forecaster = build_forecaster(&enabled_without_endpoint).unwrap();
        assert_eq!(forecaster.name(), "none");
    }

    #[test]
    fn test_build_forecaster_http() {
        let config = ForecastConfig {
            enabled: true,
            endpoint: Some("http://127.0.0.1:9/forecast".to_string()),
            ..Default::default()
        };
        let forecaster = build_forecaster(&config).unwrap();
        assert_eq!(forecaster.name(), "http");
    }
}
