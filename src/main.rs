use rask_log_uploader::app::{App, Config, ConfigError, init_logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match Config::load(std::env::args_os()) {
        Ok(config) => config,
        Err(ConfigError::InvalidArgs(e)) => e.exit(),
        Err(e) => return Err(e.into()),
    };

    init_logging(config.log_level, config.log_format)?;

    App::new(config)?.run().await
}
