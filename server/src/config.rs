use std::path::PathBuf;
use std::time::Duration;

pub const PMMS_HISTORY_URL: &str = "https://www.freddiemac.com/pmms/docs/PMMS_history.csv";
pub const DEFAULT_PMMS_REFRESH_SECS: u64 = 21600; // every 6 hours

pub const DEFAULT_SERVER_PORT: u16 = 3000;
pub const DEFAULT_STATIC_DIR: &str = "client/dist";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_UPSTREAM_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_UPSTREAM_CONNECT_TIMEOUT_SECS: u64 = 5;

fn positive_env<T>(name: &str) -> Option<T>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    std::env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<T>().ok())
        .filter(|value| *value > T::default())
}

fn dir_env(name: &str, default: &str) -> PathBuf {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

pub fn server_port() -> u16 {
    positive_env("SERVER_PORT").unwrap_or(DEFAULT_SERVER_PORT)
}

/// Built client bundle.
pub fn static_dir() -> PathBuf {
    dir_env("STATIC_DIR", DEFAULT_STATIC_DIR)
}

/// Dataset root served under `/data`.
pub fn data_dir() -> PathBuf {
    dir_env("DATA_DIR", DEFAULT_DATA_DIR)
}

pub fn pmms_refresh_interval() -> Duration {
    Duration::from_secs(positive_env("PMMS_REFRESH_SECS").unwrap_or(DEFAULT_PMMS_REFRESH_SECS))
}

pub fn upstream_http_timeout() -> Duration {
    positive_env("UPSTREAM_HTTP_TIMEOUT_SECS")
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_UPSTREAM_HTTP_TIMEOUT_SECS))
}

pub fn upstream_connect_timeout() -> Duration {
    positive_env("UPSTREAM_CONNECT_TIMEOUT_SECS")
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_UPSTREAM_CONNECT_TIMEOUT_SECS))
}
