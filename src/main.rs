use anyhow::Context;
use clap::Parser;
use messages::{
    config::{Config, DEFAULT_LOG_FILTER},
    presentation::cli::{Cli, run},
};
use tokio::main;
use tracing_subscriber::EnvFilter;

#[main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::try_parse();

    let log_filter = config
        .as_ref()
        .map(|config| config.log_filter.clone())
        .unwrap_or_else(|_| std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string()));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_new(&log_filter)
                .with_context(|| format!("invalid log filter '{log_filter}'"))?,
        )
        .init();

    run(cli, config).await
}
