//! Update orchestration: record -> latest release -> compare -> hash -> record.
//!
//! Every step either succeeds or aborts the run. The record file is written
//! only as the final step, so a failed run leaves the last-known-good record
//! on disk.

use anyhow::{Context, Result};
use std::io::Write;

use crate::config::PackageConfig;
use crate::hash::ContentHasher;
use crate::record::{self, VersionRecord};
use crate::template;
use crate::version;

/// Source of "latest published version" for an upstream project.
pub trait ReleaseSource {
    /// Latest release version of `owner/repo`, already stripped of any `v` prefix.
    fn latest_version(&self, owner: &str, repo: &str) -> Result<String>;
}

/// What a run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    UpToDate {
        current: String,
        latest: String,
    },
    Updated {
        previous: String,
        record: VersionRecord,
        url: String,
    },
}

pub struct Updater<'a> {
    package: &'a PackageConfig,
    releases: &'a dyn ReleaseSource,
    hasher: &'a dyn ContentHasher,
}

impl<'a> Updater<'a> {
    pub fn new(
        package: &'a PackageConfig,
        releases: &'a dyn ReleaseSource,
        hasher: &'a dyn ContentHasher,
    ) -> Self {
        Self {
            package,
            releases,
            hasher,
        }
    }

    /// Run one update check, writing operator status lines to `out`.
    pub fn run<W: Write>(&self, out: &mut W) -> Result<UpdateOutcome> {
        let pkg = self.package;
        let path = &pkg.hashes_file;

        let current = record::load(path)?;
        let latest = self.releases.latest_version(&pkg.owner, &pkg.repo)?;

        writeln!(out, "Current: {}, Latest: {}", current.version, latest)?;

        let newer = version::should_update(&current.version, &latest).with_context(|| {
            format!(
                "compare versions {:?} and {:?} for {}",
                current.version, latest, pkg.name
            )
        })?;
        if !newer {
            writeln!(out, "Already up to date")?;
            tracing::info!(package = %pkg.name, version = %current.version, "already up to date");
            return Ok(UpdateOutcome::UpToDate {
                current: current.version,
                latest,
            });
        }

        let url = template::download_url(pkg, &latest)
            .with_context(|| format!("build download URL for {}", pkg.name))?;
        tracing::info!(package = %pkg.name, from = %current.version, to = %latest, %url, "updating");

        writeln!(out, "Calculating source hash...")?;
        let hash = self.hasher.hash_url(&url, pkg.unpack)?;

        let next = VersionRecord::new(latest.clone(), hash.to_string());
        record::save(path, &next)?;
        writeln!(out, "Updated to {}", latest)?;

        Ok(UpdateOutcome::Updated {
            previous: current.version,
            record: next,
            url,
        })
    }
}
