//! # Telecommand module
//!
//! This module provides telecommand functionality to the communications
//! interface. Telecommands are JSON objects with a `type` and an optional
//! `payload`, for example:
//!
//! ```json
//! {"type": "ARM", "payload": {"cmd": "joints", "joints_deg": [0, 10, -20, 0, 30, 0]}}
//! ```

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod arm_ctrl;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Internal
use arm_ctrl::ArmCmd;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A telecommand, i.e. an instruction sent to the arm executable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Tc {
    /// Sequence the arm into CAN control.
    #[serde(rename = "ENABLE_CAN")]
    EnableCan,

    /// Emergency stop the arm, then hold the current position.
    #[serde(rename = "STOP")]
    Stop,

    /// Report the current arm state in the log.
    #[serde(rename = "STATE")]
    State,

    /// Update a motion target.
    #[serde(rename = "ARM")]
    Arm(ArmCmd),
}

/// Possible parsing errors.
#[derive(Debug, Error)]
pub enum TcParseError {
    #[error("TC contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Tc {
    /// Parse a new TC from a JSON packet
    pub fn from_json(json_str: &str) -> Result<Self, TcParseError> {
        serde_json::from_str(json_str).map_err(TcParseError::InvalidJson)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_tcs() {
        assert_eq!(Tc::from_json(r#"{"type": "STOP"}"#).unwrap(), Tc::Stop);
        assert_eq!(Tc::from_json(r#"{"type": "ENABLE_CAN"}"#).unwrap(), Tc::EnableCan);

        let tc = Tc::from_json(
            r#"{"type": "ARM", "payload": {
                "cmd": "joints",
                "joints_deg": [0, 10, -20, 0, 30.5, 0],
                "speed_pct": 40
            }}"#,
        )
        .unwrap();

        assert_eq!(
            tc,
            Tc::Arm(ArmCmd::Joints {
                joints_deg: [0.0, 10.0, -20.0, 0.0, 30.5, 0.0],
                speed_pct: Some(40)
            })
        );

        let tc = Tc::from_json(
            r#"{"type": "ARM", "payload": {"cmd": "gripper", "aperture_mm": 35.0}}"#,
        )
        .unwrap();

        assert_eq!(
            tc,
            Tc::Arm(ArmCmd::Gripper {
                aperture_mm: 35.0,
                effort: None
            })
        );
    }

    #[test]
    fn test_parse_invalid_tcs() {
        assert!(Tc::from_json("not json").is_err());
        assert!(Tc::from_json(r#"{"type": "MNVR"}"#).is_err());
        assert!(Tc::from_json(r#"{"type": "ARM", "payload": {"cmd": "joints"}}"#).is_err());
    }
}
