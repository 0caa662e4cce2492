use super::groups::HttpSettings;
use super::{ConfigError, ErrorPolicy, LogFormat, LogLevel};
use crate::batching::DEFAULT_MAX_REQUEST_BYTES;
use crate::domain::UploadOptions;
use crate::transport::HttpTransportConfig;
use crate::upload::UploaderConfig;
use clap::parser::ValueSource;
use clap::{ArgAction, ArgMatches, CommandFactory, FromArgMatches, Parser};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

const DEFAULT_ENDPOINT: &str = "http://rask-log-aggregator:9600/v1/aggregate";

#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(author, version, about, long_about = None)]
#[serde(default)]
pub struct Config {
    /// NDJSON file with one record per line, or "-" for stdin
    #[arg(default_value = "-")]
    pub input: PathBuf,

    /// Collector endpoint URL
    #[arg(long, env = "RASK_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Ceiling on the compressed size of one request, in bytes
    #[arg(long, env = "MAX_REQUEST_BYTES", default_value_t = DEFAULT_MAX_REQUEST_BYTES)]
    pub max_request_bytes: usize,

    /// Maximum number of requests in flight at once
    #[arg(long, env = "MAX_CONCURRENCY", default_value = "4")]
    pub max_concurrency: NonZeroUsize,

    /// How failed batches are handled
    #[arg(long, env = "ERROR_POLICY", default_value = "aggregate")]
    pub error_policy: ErrorPolicy,

    /// Upload from worker threads instead of the async runtime
    #[arg(
        long,
        env = "BLOCKING",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value_t = false,
        default_missing_value = "true"
    )]
    pub blocking: bool,

    /// Per-request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "30")]
    pub request_timeout_secs: u64,

    /// Connection timeout in seconds
    #[arg(long, env = "CONNECTION_TIMEOUT_SECS", default_value = "10")]
    pub connection_timeout_secs: u64,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", default_value = "compact")]
    pub log_format: LogFormat,

    /// Configuration file path (optional)
    #[arg(long, env = "CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// HTTP client tuning (config file only)
    #[arg(skip)]
    pub http: HttpSettings,

    /// Derived fields (not CLI arguments)
    #[serde(skip)]
    #[arg(skip)]
    pub request_timeout: Duration,

    #[serde(skip)]
    #[arg(skip)]
    pub connection_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: PathBuf::from("-"),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
            max_concurrency: NonZeroUsize::new(4).unwrap_or(NonZeroUsize::MIN),
            error_policy: ErrorPolicy::Aggregate,
            blocking: false,
            request_timeout_secs: 30,
            connection_timeout_secs: 10,
            log_level: LogLevel::Info,
            log_format: LogFormat::Compact,
            config_file: None,
            http: HttpSettings::default(),
            request_timeout: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Parses CLI arguments (with env fallbacks) without loading a config file.
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let mut config = Config::try_parse_from(args)?;
        config.post_process();
        config.validate()?;
        Ok(config)
    }

    /// Parses CLI arguments and, when `--config-file` is given, layers them
    /// over the file. Only values set on the command line or through the
    /// environment replace the file's value.
    pub fn load<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let matches = Config::command().try_get_matches_from(args)?;
        let cli = Config::from_arg_matches(&matches)?;

        let mut config = match cli.config_file.clone() {
            Some(path) => {
                let base = Self::read_file(&path)?;
                cli.merge_onto(base, &matches)
            }
            None => cli,
        };

        config.post_process();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::read_file(path.as_ref())?;
        config.post_process();
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.config_file = Some(path.to_path_buf());
        Ok(config)
    }

    fn merge_onto(self, mut base: Config, matches: &ArgMatches) -> Config {
        let explicit = |id: &str| {
            matches!(
                matches.value_source(id),
                Some(ValueSource::CommandLine | ValueSource::EnvVariable)
            )
        };

        if explicit("input") {
            base.input = self.input;
        }
        if explicit("endpoint") {
            base.endpoint = self.endpoint;
        }
        if explicit("max_request_bytes") {
            base.max_request_bytes = self.max_request_bytes;
        }
        if explicit("max_concurrency") {
            base.max_concurrency = self.max_concurrency;
        }
        if explicit("error_policy") {
            base.error_policy = self.error_policy;
        }
        if explicit("blocking") {
            base.blocking = self.blocking;
        }
        if explicit("request_timeout_secs") {
            base.request_timeout_secs = self.request_timeout_secs;
        }
        if explicit("connection_timeout_secs") {
            base.connection_timeout_secs = self.connection_timeout_secs;
        }
        if explicit("log_level") {
            base.log_level = self.log_level;
        }
        if explicit("log_format") {
            base.log_format = self.log_format;
        }

        base
    }

    pub fn post_process(&mut self) {
        self.request_timeout = Duration::from_secs(self.request_timeout_secs);
        self.connection_timeout = Duration::from_secs(self.connection_timeout_secs);
    }

    pub fn reads_stdin(&self) -> bool {
        self.input.as_os_str() == "-"
    }

    pub fn transport_config(&self) -> HttpTransportConfig {
        HttpTransportConfig {
            endpoint: self.endpoint.clone(),
            timeout: self.request_timeout,
            connection_timeout: self.connection_timeout,
            max_connections: self.http.max_connections,
            keep_alive_timeout: self.http.keep_alive_timeout,
            user_agent: self.http.user_agent.clone(),
        }
    }

    pub fn uploader_config(&self) -> UploaderConfig {
        UploaderConfig {
            max_request_bytes: self.max_request_bytes,
        }
    }

    /// Builds per-call options implementing the configured error policy.
    pub fn upload_options(&self) -> UploadOptions {
        let options = UploadOptions::new().with_max_concurrency(self.max_concurrency);

        match self.error_policy {
            ErrorPolicy::Aggregate => options,
            ErrorPolicy::Log => options.with_error_handler(|failure| {
                warn!(
                    batch_index = failure.batch_index(),
                    first_record = failure.records().start,
                    records = failure.record_count(),
                    error = %failure.error(),
                    "dropping failed batch"
                );
                Ok::<(), crate::domain::HandlerError>(())
            }),
            ErrorPolicy::Abort => options.with_error_handler(Err),
        }
    }
}
