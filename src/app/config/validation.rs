use super::{Config, ConfigError};
use url::Url;

/// Smallest accepted request ceiling. Anything lower cannot hold a gzip
/// frame plus a typical record.
const MIN_REQUEST_BYTES: usize = 1024;

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.endpoint).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid endpoint URL '{}': {}", self.endpoint, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl(format!(
                "Endpoint must use http or https, got '{}'",
                url.scheme()
            )));
        }

        if self.max_request_bytes < MIN_REQUEST_BYTES {
            return Err(ConfigError::InvalidConfig(format!(
                "Max request bytes ({}) must be at least {MIN_REQUEST_BYTES}",
                self.max_request_bytes
            )));
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        if self.connection_timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "Connection timeout must be greater than 0".to_string(),
            ));
        }

        if self.http.max_connections == 0 {
            return Err(ConfigError::InvalidConfig(
                "Max connections must be greater than 0".to_string(),
            ));
        }

        if !self.reads_stdin() && !self.input.is_file() {
            return Err(ConfigError::InvalidConfig(format!(
                "Input file does not exist: {}",
                self.input.display()
            )));
        }

        Ok(())
    }
}
