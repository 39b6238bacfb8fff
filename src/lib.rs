//! drivelink: an origin proxy for cloud-drive files plus a `get` command that
//! downloads through the range-dl engine, falling back to the proxy.

pub mod cli;
pub mod config;
pub mod download;
pub mod origin;
pub mod proxy;

use anyhow::Context;
use clap::Parser;
use log::info;

use cli::{Cli, Command};
use config::AppConfig;

/// Install env_logger. `--log-level` wins over `RUST_LOG`; default is `info`.
pub fn init_logging(level: Option<&str>) {
    let mut builder = match level {
        Some(filters) => {
            let mut builder = env_logger::Builder::new();
            builder.parse_filters(filters);
            builder
        }
        None => env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")),
    };
    builder.format_timestamp_millis();
    let _ = builder.try_init();
}

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    let mut config = AppConfig::load(cli.config.as_deref())?;
    match &cli.command {
        Command::Serve(args) => args.apply(&mut config),
        Command::Get(args) => args.apply(&mut config),
    }
    config.validate()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;

    runtime.block_on(async move {
        match cli.command {
            Command::Serve(_) => {
                info!("drivelink: serving on {}", config.server.bind);
                proxy::serve(&config).await
            }
            Command::Get(args) => {
                let summary = download::run_get(&config, &args).await?;
                println!("{}", serde_json::to_string(&summary)?);
                Ok(())
            }
        }
    })
}
