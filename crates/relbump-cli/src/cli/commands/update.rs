//! `relbump` – check the latest release and update the version record.

use anyhow::Result;
use relbump_core::config::RelbumpConfig;
use relbump_core::github::GithubClient;
use relbump_core::hash;
use relbump_core::http::HttpClient;
use relbump_core::updater::{UpdateOutcome, Updater};
use std::io;

pub fn run_update(cfg: &RelbumpConfig) -> Result<()> {
    let github = GithubClient::new(HttpClient::new(&cfg.http), &cfg.github);
    let hasher = hash::hasher_from_config(cfg);
    let updater = Updater::new(&cfg.package, &github, hasher.as_ref());

    let stdout = io::stdout();
    let outcome = updater.run(&mut stdout.lock())?;
    match outcome {
        UpdateOutcome::UpToDate { current, .. } => {
            tracing::debug!(package = %cfg.package.name, %current, "no update needed");
        }
        UpdateOutcome::Updated {
            previous, record, ..
        } => {
            tracing::info!(
                package = %cfg.package.name,
                %previous,
                version = %record.version,
                hash = %record.hash,
                "version record updated"
            );
        }
    }
    Ok(())
}
