//! Trading-status state machine and operator commands
//!
//! ACTIVE <-> STOPPED via toggle (no-op during EMERGENCY_STOP), any state ->
//! EMERGENCY_STOP via the emergency command. The only automatic transition,
//! EMERGENCY_STOP -> STOPPED, happens inside the tick after liquidation.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::{Timeframe, TradingStatus};

/// Operator command, applied between ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "value", rename_all = "snake_case")]
pub enum Command {
    ToggleTrading,
    EmergencyStop,
    SelectTimeframe(Timeframe),
}

/// ACTIVE <-> STOPPED; unchanged while an emergency is pending
pub fn toggle(status: TradingStatus) -> TradingStatus {
    match status {
        TradingStatus::Active => TradingStatus::Stopped,
        TradingStatus::Stopped => TradingStatus::Active,
        TradingStatus::EmergencyStop => TradingStatus::EmergencyStop,
    }
}

pub fn emergency(_status: TradingStatus) -> TradingStatus {
    TradingStatus::EmergencyStop
}

/// Post-liquidation transition run by the tick
pub fn after_liquidation(status: TradingStatus) -> TradingStatus {
    match status {
        TradingStatus::EmergencyStop => TradingStatus::Stopped,
        other => other,
    }
}

/// Whether the decision engine may run this tick
pub fn allows_entries(status: TradingStatus) -> bool {
    status == TradingStatus::Active
}

/// Fields of the snapshot an operator command can change
pub trait Controllable {
    fn status(&self) -> TradingStatus;
    fn set_status(&mut self, status: TradingStatus);
    fn set_timeframe(&mut self, timeframe: Timeframe);
}

/// Apply `command` to `target`. Returns whether anything changed.
pub fn apply_command<T: Controllable>(target: &mut T, command: Command) -> bool {
    match command {
        Command::ToggleTrading => {
            let before = target.status();
            let after = toggle(before);
            target.set_status(after);
            info!(from = %before, to = %after, "[STATUS] Toggle");
            before != after
        }
        Command::EmergencyStop => {
            let before = target.status();
            target.set_status(emergency(before));
            info!(from = %before, "[STATUS] Emergency stop requested");
            before != TradingStatus::EmergencyStop
        }
        Command::SelectTimeframe(timeframe) => {
            info!(timeframe = %timeframe, "[STATUS] Timeframe selected");
            target.set_timeframe(timeframe);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Panel {
        status: TradingStatus,
        timeframe: Timeframe,
    }

    impl Controllable for Panel {
        fn status(&self) -> TradingStatus {
            self.status
        }
        fn set_status(&mut self, status: TradingStatus) {
            self.status = status;
        }
        fn set_timeframe(&mut self, timeframe: Timeframe) {
            self.timeframe = timeframe;
        }
    }

    #[test]
    fn test_toggle_transitions() {
        assert_eq!(toggle(TradingStatus::Active), TradingStatus::Stopped);
        assert_eq!(toggle(TradingStatus::Stopped), TradingStatus::Active);
        assert_eq!(toggle(TradingStatus::EmergencyStop), TradingStatus::EmergencyStop);
    }

    #[test]
    fn test_emergency_from_any_state() {
        for s in [TradingStatus::Active, TradingStatus::Stopped, TradingStatus::EmergencyStop] {
            assert_eq!(emergency(s), TradingStatus::EmergencyStop);
        }
    }

    #[test]
    fn test_after_liquidation() {
        assert_eq!(after_liquidation(TradingStatus::EmergencyStop), TradingStatus::Stopped);
        assert_eq!(after_liquidation(TradingStatus::Active), TradingStatus::Active);
        assert_eq!(after_liquidation(TradingStatus::Stopped), TradingStatus::Stopped);
    }

    #[test]
    fn test_apply_command() {
        let mut panel = Panel {
            status: TradingStatus::Active,
            timeframe: Timeframe::Min5,
        };
        assert!(apply_command(&mut panel, Command::ToggleTrading));
        assert_eq!(panel.status, TradingStatus::Stopped);

        assert!(apply_command(&mut panel, Command::EmergencyStop));
        assert!(!apply_command(&mut panel, Command::ToggleTrading));
        assert_eq!(panel.status, TradingStatus::EmergencyStop);
        assert!(!apply_command(&mut panel, Command::EmergencyStop));

        apply_command(&mut panel, Command::SelectTimeframe(Timeframe::Hour1));
        assert_eq!(panel.timeframe, Timeframe::Hour1);
    }

    #[test]
    fn test_command_serde() {
        let cmd: Command =
            serde_json::from_str(r#"{"command":"select_timeframe","value":"15m"}"#).unwrap();
        assert_eq!(cmd, Command::SelectTimeframe(Timeframe::Min15));
        let cmd: Command = serde_json::from_str(r#"{"command":"emergency_stop"}"#).unwrap();
        assert_eq!(cmd, Command::EmergencyStop);
    }
}
