//! # Arm script interpreter module
//!
//! This module provides an interpreter for arm scripts, allowing telecommands to be replayed at
//! fixed times. A script is a sequence of `<time_s>: <json tc>;` entries, one per line:
//!
//! ```text
//! 0.0: {"type": "ENABLE_CAN"};
//! 1.5: {"type": "ARM", "payload": {"cmd": "joints", "joints_deg": [0, 10, -20, 0, 30, 0]}};
//! 4.0: {"type": "STOP"};
//! ```
//!
//! Lines which don't match this pattern (comments for example) are ignored.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use regex::RegexBuilder;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

// Internal
use comms_if::tc::{Tc, TcParseError};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Pattern matching a single script entry, capture 1 is the time, capture 3 the TC.
const ENTRY_PATTERN: &str = r"^\s*(\d+(\.\d+)?)\s*:\s*([^;]*);";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A command which is scripted to occur at a specific time.
#[derive(Debug)]
struct Command {
    /// The time the command is supposed to execute at
    exec_time_s: f64,

    /// The Telecommand to run
    tc: Tc,
}

/// A script interpreter.
///
/// After initialising with the path to the script to run use `.get_pending_tcs` to acquire a list
/// of telecommands that need executing.
#[derive(Debug)]
pub struct ScriptInterpreter {
    script_path: Option<PathBuf>,
    cmds: VecDeque<Command>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Could not find the script at {0:?}")]
    ScriptNotFound(PathBuf),

    #[error("Could not load the script: {0}")]
    ScriptLoadError(std::io::Error),

    #[error("The script is empty (or is so bad it can't be read)")]
    ScriptEmpty,

    #[error("Script contains an invalid timestamp: {0}. Should be a float (like 1.0)")]
    InvalidTimestamp(String),

    #[error("Script contains an invalid TC at {0} s: {1}")]
    InvalidTc(f64, TcParseError),

    #[error("The script entry pattern is invalid: {0}")]
    PatternError(regex::Error),

    #[error("Script entries must be in time order, {0} s comes after {1} s")]
    OutOfOrder(f64, f64),
}

#[derive(Debug, PartialEq)]
pub enum PendingTcs {
    None,
    Some(Vec<Tc>),
    EndOfScript,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ScriptInterpreter {
    /// Create a new interpreter from the given script path.
    pub fn new<P: AsRef<Path>>(script_path: P) -> Result<Self, ScriptError> {
        let path = PathBuf::from(script_path.as_ref());

        if !path.exists() {
            return Err(ScriptError::ScriptNotFound(path));
        }

        let script = fs::read_to_string(&path).map_err(ScriptError::ScriptLoadError)?;

        let mut interp = Self::from_script_str(&script)?;
        interp.script_path = Some(path);

        Ok(interp)
    }

    /// Create a new interpreter from the contents of a script.
    pub fn from_script_str(script: &str) -> Result<Self, ScriptError> {
        let mut cmds: VecDeque<Command> = VecDeque::new();

        let re = RegexBuilder::new(ENTRY_PATTERN)
            .multi_line(true)
            .build()
            .map_err(ScriptError::PatternError)?;

        for cap in re.captures_iter(script) {
            let (time_str, tc_str) = match (cap.get(1), cap.get(3)) {
                (Some(t), Some(tc)) => (t.as_str(), tc.as_str()),
                _ => continue,
            };

            let exec_time_s: f64 = time_str
                .parse()
                .map_err(|e| ScriptError::InvalidTimestamp(format!("{}", e)))?;

            if let Some(last) = cmds.back() {
                if exec_time_s < last.exec_time_s {
                    return Err(ScriptError::OutOfOrder(exec_time_s, last.exec_time_s));
                }
            }

            // The scripts contain JSON only.
            let tc = Tc::from_json(tc_str).map_err(|e| ScriptError::InvalidTc(exec_time_s, e))?;

            cmds.push_back(Command { exec_time_s, tc });
        }

        if cmds.is_empty() {
            return Err(ScriptError::ScriptEmpty);
        }

        Ok(ScriptInterpreter {
            script_path: None,
            cmds,
        })
    }

    /// Return the TCs whose execution time is at or before `current_time_s`.
    ///
    /// Once every TC has been handed out `EndOfScript` is returned.
    pub fn get_pending_tcs(&mut self, current_time_s: f64) -> PendingTcs {
        if self.cmds.is_empty() {
            return PendingTcs::EndOfScript;
        }

        let mut tc_vec: Vec<Tc> = vec![];

        while let Some(cmd) = self.cmds.front() {
            if cmd.exec_time_s > current_time_s {
                break;
            }

            if let Some(cmd) = self.cmds.pop_front() {
                tc_vec.push(cmd.tc);
            }
        }

        if tc_vec.is_empty() {
            PendingTcs::None
        } else {
            PendingTcs::Some(tc_vec)
        }
    }

    /// Get the number of TCs remaining in the script
    pub fn get_num_tcs(&self) -> usize {
        self.cmds.len()
    }

    /// Get the length of the script in seconds
    pub fn get_duration(&self) -> f64 {
        match self.cmds.back() {
            Some(c) => c.exec_time_s,
            None => 0f64,
        }
    }

    /// Path the script was loaded from, if it came from a file
    pub fn script_path(&self) -> Option<&Path> {
        self.script_path.as_deref()
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::tc::arm_ctrl::ArmCmd;

    const SCRIPT: &str = r#"
# Bring the arm up then wave the gripper
0.0: {"type": "ENABLE_CAN"};
0.5: {"type": "ARM", "payload": {"cmd": "gripper", "aperture_mm": 20.0}};
0.5: {"type": "STATE"};
2.25: {"type": "STOP"};
"#;

    #[test]
    fn test_parse_script() {
        let interp = ScriptInterpreter::from_script_str(SCRIPT).unwrap();

        assert_eq!(interp.get_num_tcs(), 4);
        assert_eq!(interp.get_duration(), 2.25);
        assert!(interp.script_path().is_none());
    }

    #[test]
    fn test_pending_tcs() {
        let mut interp = ScriptInterpreter::from_script_str(SCRIPT).unwrap();

        assert_eq!(interp.get_pending_tcs(0.0), PendingTcs::Some(vec![Tc::EnableCan]));
        assert_eq!(interp.get_pending_tcs(0.1), PendingTcs::None);
        assert_eq!(
            interp.get_pending_tcs(1.0),
            PendingTcs::Some(vec![
                Tc::Arm(ArmCmd::Gripper {
                    aperture_mm: 20.0,
                    effort: None
                }),
                Tc::State
            ])
        );
        assert_eq!(interp.get_pending_tcs(3.0), PendingTcs::Some(vec![Tc::Stop]));
        assert_eq!(interp.get_pending_tcs(4.0), PendingTcs::EndOfScript);
    }

    #[test]
    fn test_bad_scripts() {
        assert!(matches!(
            ScriptInterpreter::from_script_str("# nothing here\n"),
            Err(ScriptError::ScriptEmpty)
        ));
        assert!(matches!(
            ScriptInterpreter::from_script_str(r#"1.0: {"type": "DANCE"};"#),
            Err(ScriptError::InvalidTc(t, _)) if t == 1.0
        ));
        assert!(matches!(
            ScriptInterpreter::from_script_str(
                "2.0: {\"type\": \"STOP\"};\n1.0: {\"type\": \"STATE\"};"
            ),
            Err(ScriptError::OutOfOrder(_, _))
        ));
    }

    #[test]
    fn test_load_script_file() {
        let path = std::env::temp_dir().join(format!(
            "arm_script_interpreter_test_{}.script",
            std::process::id()
        ));
        fs::write(&path, SCRIPT).unwrap();

        let interp = ScriptInterpreter::new(&path).unwrap();
        assert_eq!(interp.get_num_tcs(), 4);
        assert_eq!(interp.script_path(), Some(path.as_path()));

        fs::remove_file(&path).unwrap();

        assert!(matches!(
            ScriptInterpreter::new(&path),
            Err(ScriptError::ScriptNotFound(_))
        ));
    }
}
