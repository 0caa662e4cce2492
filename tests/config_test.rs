use rask_log_uploader::app::{Config, ConfigError, ErrorPolicy, LogFormat, LogLevel};
use serial_test::serial;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn test_defaults_parse_and_validate() {
    let config = Config::from_args(["rask-log-uploader"]).unwrap();

    assert!(config.reads_stdin());
    assert_eq!(config.endpoint, "http://rask-log-aggregator:9600/v1/aggregate");
    assert_eq!(config.max_request_bytes, 1024 * 1024);
    assert_eq!(config.max_concurrency.get(), 4);
    assert_eq!(config.error_policy, ErrorPolicy::Aggregate);
    assert!(!config.blocking);
    assert_eq!(config.log_level, LogLevel::Info);
    assert_eq!(config.log_format, LogFormat::Compact);
    assert_eq!(config.request_timeout, Duration::from_secs(30));
    assert!(!config.upload_options().has_error_handler());
}

#[test]
#[serial]
fn test_cli_flags_override_defaults() {
    let input = config_file("{\"message\":\"hello\"}\n");
    let config = Config::from_args([
        "rask-log-uploader",
        input.path().to_str().unwrap(),
        "--endpoint",
        "https://collector.example.com/v1/aggregate",
        "--max-request-bytes",
        "65536",
        "--max-concurrency",
        "8",
        "--error-policy",
        "abort",
        "--blocking",
        "--request-timeout-secs",
        "5",
        "--log-format",
        "json",
    ])
    .unwrap();

    assert!(!config.reads_stdin());
    assert_eq!(config.uploader_config().max_request_bytes, 65536);
    assert_eq!(config.max_concurrency.get(), 8);
    assert_eq!(config.error_policy, ErrorPolicy::Abort);
    assert!(config.blocking);
    assert_eq!(config.log_format, LogFormat::Json);

    let options = config.upload_options();
    assert!(options.has_error_handler());
    assert_eq!(options.max_concurrency().get(), 8);

    let transport = config.transport_config();
    assert_eq!(transport.endpoint, "https://collector.example.com/v1/aggregate");
    assert_eq!(transport.timeout, Duration::from_secs(5));
}

#[test]
#[serial]
fn test_invalid_values_are_rejected() {
    assert!(matches!(
        Config::from_args(["rask-log-uploader", "--max-concurrency", "0"]),
        Err(ConfigError::InvalidArgs(_))
    ));
    assert!(matches!(
        Config::from_args(["rask-log-uploader", "--endpoint", "not a url"]),
        Err(ConfigError::InvalidUrl(_))
    ));
    assert!(matches!(
        Config::from_args(["rask-log-uploader", "--endpoint", "ftp://collector/upload"]),
        Err(ConfigError::InvalidUrl(_))
    ));
    assert!(matches!(
        Config::from_args(["rask-log-uploader", "--max-request-bytes", "100"]),
        Err(ConfigError::InvalidConfig(_))
    ));
    assert!(matches!(
        Config::from_args(["rask-log-uploader", "--request-timeout-secs", "0"]),
        Err(ConfigError::InvalidConfig(_))
    ));
    assert!(matches!(
        Config::from_args(["rask-log-uploader", "/definitely/not/here.ndjson"]),
        Err(ConfigError::InvalidConfig(_))
    ));
}

#[test]
#[serial]
fn test_file_values_apply_and_cli_wins() {
    let file = config_file(
        r#"
endpoint = "http://collector.internal:9600/v1/aggregate"
max_request_bytes = 262144
max_concurrency = 6
error_policy = "log"

[http]
max_connections = 5
keep_alive_timeout = 15000
"#,
    );
    let path = file.path().to_str().unwrap();

    let from_file = Config::from_file(file.path()).unwrap();
    assert_eq!(from_file.endpoint, "http://collector.internal:9600/v1/aggregate");
    assert_eq!(from_file.max_request_bytes, 262_144);
    assert_eq!(from_file.error_policy, ErrorPolicy::Log);
    assert_eq!(from_file.http.max_connections, 5);
    assert_eq!(from_file.http.keep_alive_timeout, Duration::from_secs(15));
    assert_eq!(from_file.request_timeout, Duration::from_secs(30));

    let merged = Config::load([
        "rask-log-uploader",
        "--config-file",
        path,
        "--max-concurrency",
        "2",
    ])
    .unwrap();
    assert_eq!(merged.endpoint, "http://collector.internal:9600/v1/aggregate");
    assert_eq!(merged.max_concurrency.get(), 2);
    assert_eq!(merged.error_policy, ErrorPolicy::Log);
    assert_eq!(merged.transport_config().max_connections, 5);
    assert_eq!(merged.config_file.as_deref(), Some(file.path()));
}

#[test]
#[serial]
fn test_explicit_default_valued_flags_beat_file() {
    let file = config_file(
        r#"
max_concurrency = 6
blocking = true
log_format = "json"
"#,
    );
    let path = file.path().to_str().unwrap();

    let from_file = Config::load(["rask-log-uploader", "--config-file", path]).unwrap();
    assert_eq!(from_file.max_concurrency.get(), 6);
    assert!(from_file.blocking);
    assert_eq!(from_file.log_format, LogFormat::Json);

    let overridden = Config::load([
        "rask-log-uploader",
        "--config-file",
        path,
        "--max-concurrency",
        "4",
        "--blocking=false",
        "--log-format",
        "compact",
    ])
    .unwrap();
    assert_eq!(overridden.max_concurrency.get(), 4);
    assert!(!overridden.blocking);
    assert_eq!(overridden.log_format, LogFormat::Compact);
}

#[test]
#[serial]
fn test_malformed_file_is_a_parse_error() {
    let file = config_file("max_concurrency = \"many\"\n");

    assert!(matches!(
        Config::from_file(file.path()),
        Err(ConfigError::ParseError(_))
    ));
}

#[test]
#[serial]
fn test_environment_fallbacks() {
    // SAFETY: env mutation is confined to #[serial] tests
    unsafe {
        std::env::set_var("RASK_ENDPOINT", "http://env-collector:9600/v1/aggregate");
        std::env::set_var("MAX_CONCURRENCY", "12");
    }

    let result = Config::from_args(["rask-log-uploader"]);

    unsafe {
        std::env::remove_var("RASK_ENDPOINT");
        std::env::remove_var("MAX_CONCURRENCY");
    }

    let config = result.unwrap();
    assert_eq!(config.endpoint, "http://env-collector:9600/v1/aggregate");
    assert_eq!(config.max_concurrency.get(), 12);
}
