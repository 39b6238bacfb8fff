//! Command-line interface

use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::config::AppConfig;

#[derive(Parser, Debug)]
#[command(
    name = "drivelink",
    version,
    about = "Cloud-drive download proxy and concurrent range downloader"
)]
pub struct Cli {
    /// TOML config file; every field is optional
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log filter (e.g. `debug`, `range_dl=trace`); overrides RUST_LOG
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the origin proxy (`GET /file/{id}/download`)
    Serve(ServeArgs),
    /// Download a file with parallel range requests, falling back to the proxy
    Get(GetArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long)]
    pub bind: Option<SocketAddr>,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Origin URL that supports Range requests
    pub url: String,

    /// File identifier the proxy can resolve if the origin URL fails
    #[arg(long)]
    pub id: Option<String>,

    /// Output file (defaults to the last URL path segment)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Proxy base URL for the fallback download
    #[arg(long)]
    pub proxy: Option<String>,

    /// Bytes per range request
    #[arg(long)]
    pub chunk_size: Option<u64>,

    /// Range requests in flight at once
    #[arg(long)]
    pub max_concurrent: Option<usize>,
}

impl ServeArgs {
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(bind) = self.bind {
            config.server.bind = bind;
        }
    }
}

impl GetArgs {
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(proxy) = &self.proxy {
            config.client.proxy_base = proxy.clone();
        }
        if let Some(chunk_size) = self.chunk_size {
            config.transfer.chunk_size = chunk_size;
        }
        if let Some(max) = self.max_concurrent {
            config.transfer.max_concurrent_chunks = max;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_flags_override_config() {
        let cli = Cli::try_parse_from([
            "drivelink",
            "get",
            "https://cdn.example.com/a.bin",
            "--id",
            "abc",
            "--proxy",
            "http://proxy:3000",
            "--max-concurrent",
            "4",
        ])
        .unwrap();

        let Command::Get(args) = cli.command else {
            panic!("expected get");
        };
        assert_eq!(args.id.as_deref(), Some("abc"));

        let mut config = AppConfig::default();
        args.apply(&mut config);
        assert_eq!(config.client.proxy_base, "http://proxy:3000");
        assert_eq!(config.transfer.max_concurrent_chunks, 4);
        assert_eq!(config.transfer.chunk_size, 8 * 1024 * 1024);
    }

    #[test]
    fn serve_bind_and_global_flags() {
        let cli = Cli::try_parse_from([
            "drivelink",
            "serve",
            "--bind",
            "0.0.0.0:8080",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));

        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        let mut config = AppConfig::default();
        args.apply(&mut config);
        assert_eq!(config.server.bind.port(), 8080);
    }
}
