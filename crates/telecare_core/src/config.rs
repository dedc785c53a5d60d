//! Runtime configuration read from the process environment.
//!
//! | Variable             | Default                       |
//! |----------------------|-------------------------------|
//! | `TELECARE_DB_PATH`   | `<temp dir>/telecare.sqlite3` |
//! | `TELECARE_LOG_LEVEL` | `debug` / `info` by build     |
//! | `TELECARE_LOG_DIR`   | unset: logging stays off      |

use crate::logging::default_log_level;
use std::path::PathBuf;

pub const DB_PATH_ENV: &str = "TELECARE_DB_PATH";
pub const LOG_LEVEL_ENV: &str = "TELECARE_LOG_LEVEL";
pub const LOG_DIR_ENV: &str = "TELECARE_LOG_DIR";

const DEFAULT_DB_FILE: &str = "telecare.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub log_level: String,
    /// `None` disables file logging.
    pub log_dir: Option<PathBuf>,
}

impl CoreConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds config from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Self {
            db_path: read(DB_PATH_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_DB_FILE)),
            log_level: read(LOG_LEVEL_ENV).unwrap_or_else(|| default_log_level().to_string()),
            log_dir: read(LOG_DIR_ENV).map(PathBuf::from),
        }
    }
}
