//! Dashboard API Types
//!
//! DTOs for HTTP/WebSocket communication with a frontend.

use serde::{Deserialize, Serialize};

use crate::driver::TickEvent;
use crate::engine::Snapshot;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

/// Body of `POST /api/timeframe`
#[derive(Debug, Clone, Deserialize)]
pub struct TimeframeRequest {
    pub timeframe: String,
}

/// Reply to a queued command. The driver applies it between ticks, so the
/// resulting state arrives on the next snapshot publish.
#[derive(Debug, Clone, Serialize)]
pub struct CommandAck {
    pub accepted: String,
}

impl CommandAck {
    pub fn queued(label: &str) -> Self {
        Self {
            accepted: label.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    /// Full state (sent on connect)
    FullState(Snapshot),
    /// Snapshot published after a tick or command
    Snapshot(Snapshot),
    /// Orders and signals from one tick
    Tick(TickEvent),
    Heartbeat(i64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_response_envelope() {
        let ok = serde_json::to_value(ApiResponse::success(3)).unwrap();
        assert_eq!(ok["success"], true);
        assert_eq!(ok["data"], 3);

        let err = serde_json::to_value(ApiResponse::<u8>::error("nope")).unwrap();
        assert_eq!(err["success"], false);
        assert_eq!(err["error"], "nope");
    }

    #[test]
    fn test_command_ack_carries_no_state() {
        let ack = ApiResponse::success(CommandAck::queued("toggle"));
        let json = serde_json::to_value(ack).unwrap();
        assert_eq!(json["data"]["accepted"], "toggle");
        assert_eq!(json["data"].as_object().map(|o| o.len()), Some(1));
    }

    #[test]
    fn test_ws_message_tagging() {
        let json = serde_json::to_value(WsMessage::Heartbeat(7)).unwrap();
        assert_eq!(json["type"], "Heartbeat");
        assert_eq!(json["data"], 7);
    }
}
