use serde::{Deserialize, Serialize};
use std::time::Duration;

/// HTTP client tuning that is only settable from a config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub max_connections: usize,
    #[serde(with = "super::serde_helpers")]
    pub keep_alive_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            max_connections: 20,
            keep_alive_timeout: Duration::from_secs(60),
            user_agent: format!("rask-log-uploader/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}
