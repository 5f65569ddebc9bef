//! Host platform (linux for example) utility functions

use std::env;
use std::path::PathBuf;

/// Environment variable holding the root directory of the arm software.
pub const SW_ROOT_ENV_VAR: &str = "ARM_SW_ROOT";

/// Get the root directory of the arm software, containing the `params` and `sessions`
/// directories.
pub fn get_sw_root() -> Result<PathBuf, env::VarError> {
    env::var(SW_ROOT_ENV_VAR).map(PathBuf::from)
}
