//! CLI for relbump.

mod commands;

use anyhow::Result;
use clap::Parser;
use relbump_core::config::{self, RelbumpConfig};
use std::path::PathBuf;

use commands::run_update;

/// Check the upstream release of the configured package and refresh its version/hash record.
#[derive(Debug, Parser)]
#[command(name = "relbump", version)]
#[command(about = "relbump: bump a package's pinned version and source hash to the latest upstream release", long_about = None)]
pub struct Cli {
    /// Config file to use instead of ~/.config/relbump/config.toml (must exist).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Version record to update, overriding `package.hashes_file` from the config.
    #[arg(long, value_name = "PATH")]
    pub hashes_file: Option<PathBuf>,
}

impl Cli {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = cli.load_config()?;
        tracing::debug!("loaded config: package={:?} backend={:?}", cfg.package, cfg.hash_backend);
        run_update(&cfg)
    }

    fn load_config(&self) -> Result<RelbumpConfig> {
        let mut cfg = match &self.config {
            Some(path) => config::load_from_path(path)?,
            None => config::load_or_init()?,
        };
        if let Some(path) = &self.hashes_file {
            cfg.package.hashes_file = path.clone();
        }
        Ok(cfg)
    }
}
