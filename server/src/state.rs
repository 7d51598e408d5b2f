use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::warn;

use crate::config::{data_dir, static_dir, upstream_connect_timeout, upstream_http_timeout};

/// Converted mortgage-rate history, serialized once per refresh.
#[derive(Debug, Clone)]
pub struct PmmsSnapshot {
    pub csv: Bytes,
    pub rows: usize,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AppState {
    /// `None` until the first successful load.
    pub pmms: Arc<RwLock<Option<PmmsSnapshot>>>,
    pub http_client: reqwest::Client,
    pub static_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_dirs(static_dir(), data_dir())
    }

    pub fn with_dirs(static_dir: PathBuf, data_dir: PathBuf) -> Self {
        let request_timeout = upstream_http_timeout();
        let connect_timeout = upstream_connect_timeout();
        let http_client = reqwest::Client::builder()
            .user_agent("pricemap/0.1")
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .or_else(|e| {
                warn!(
                    error = %e,
                    "failed to build configured HTTP client, retrying without custom user-agent"
                );
                reqwest::Client::builder()
                    .timeout(request_timeout)
                    .connect_timeout(connect_timeout)
                    .build()
            })
            .unwrap_or_else(|e| {
                panic!("failed to build timeout-configured HTTP client: {e}");
            });
        Self {
            pmms: Arc::new(RwLock::new(None)),
            http_client,
            static_dir,
            data_dir,
        }
    }
}
