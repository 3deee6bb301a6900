//! Release version parsing and the "is latest strictly newer" predicate.
//!
//! Accepts tags like `v1.2.3`, `1.2`, `2.0.0-rc.1` and `1.0.0+build.5`.
//! Release components compare numerically with missing trailing components
//! treated as zero; a prerelease sorts below its release; build metadata is
//! ignored for ordering.

use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionError {
    #[error("empty version string")]
    Empty,
    #[error("invalid release component {component:?} in version {input:?}")]
    InvalidComponent { input: String, component: String },
    #[error("empty prerelease identifier in version {0:?}")]
    EmptyPrerelease(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Identifier {
    Numeric(u64),
    Alpha(String),
}

impl Ord for Identifier {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Identifier::Numeric(a), Identifier::Numeric(b)) => a.cmp(b),
            (Identifier::Numeric(_), Identifier::Alpha(_)) => Ordering::Less,
            (Identifier::Alpha(_), Identifier::Numeric(_)) => Ordering::Greater,
            (Identifier::Alpha(a), Identifier::Alpha(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Identifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A parsed release version.
#[derive(Debug, Clone)]
pub struct Version {
    release: Vec<u64>,
    prerelease: Vec<Identifier>,
    raw: String,
}

impl Version {
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let trimmed = input.trim();
        let s = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);
        if s.is_empty() {
            return Err(VersionError::Empty);
        }

        let without_build = s.split_once('+').map_or(s, |(head, _)| head);
        let (core, pre) = match without_build.split_once('-') {
            Some((core, pre)) => (core, Some(pre)),
            None => (without_build, None),
        };

        let mut release = Vec::new();
        for component in core.split('.') {
            let n = component
                .parse::<u64>()
                .map_err(|_| VersionError::InvalidComponent {
                    input: input.to_string(),
                    component: component.to_string(),
                })?;
            release.push(n);
        }

        let mut prerelease = Vec::new();
        if let Some(pre) = pre {
            for ident in pre.split('.') {
                if ident.is_empty() {
                    return Err(VersionError::EmptyPrerelease(input.to_string()));
                }
                prerelease.push(match ident.parse::<u64>() {
                    Ok(n) => Identifier::Numeric(n),
                    Err(_) => Identifier::Alpha(ident.to_string()),
                });
            }
        }

        Ok(Self {
            release,
            prerelease,
            raw: trimmed.to_string(),
        })
    }

    fn cmp_release(&self, other: &Self) -> Ordering {
        let len = self.release.len().max(other.release.len());
        for i in 0..len {
            let a = self.release.get(i).copied().unwrap_or(0);
            let b = other.release.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        Ordering::Equal
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_release(other).then_with(|| {
            match (self.prerelease.is_empty(), other.prerelease.is_empty()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => self.prerelease.cmp(&other.prerelease),
            }
        })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// True iff `latest` is strictly newer than `current`.
pub fn should_update(current: &str, latest: &str) -> Result<bool, VersionError> {
    let current = Version::parse(current)?;
    let latest = Version::parse(latest)?;
    Ok(latest > current)
}
