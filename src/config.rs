use std::net::SocketAddr;
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "medrx";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable overriding the database file location.
pub const DB_PATH_ENV: &str = "MEDRX_DB_PATH";
/// Environment variable overriding the HTTP listen address.
pub const BIND_ENV: &str = "MEDRX_BIND";

pub const DEFAULT_BIND: &str = "127.0.0.1:8300";

/// Get the application data directory.
/// Platform data dir (e.g. ~/.local/share/medrx), or ./medrx when none is known.
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default SQLite database file
pub fn default_database_path() -> PathBuf {
    app_data_dir().join("medrx.db")
}

/// Log filter used when RUST_LOG is unset.
pub fn default_log_filter() -> String {
    format!("{}=info,tower_http=info", APP_NAME)
}

/// Runtime settings for the HTTP service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database_path: PathBuf,
    pub bind: SocketAddr,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} is not a valid listen address: {value}")]
    InvalidBind { var: &'static str, value: String },
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_path = lookup(DB_PATH_ENV)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_database_path);

        let raw_bind = lookup(BIND_ENV)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = raw_bind
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidBind { var: BIND_ENV, value: raw_bind.clone() })?;

        Ok(Self { database_path, bind })
    }
}
