//! GitHub releases API: resolve the latest published release tag.

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::config::GithubConfig;
use crate::http::HttpClient;
use crate::updater::ReleaseSource;

#[derive(Debug, Deserialize)]
struct LatestRelease {
    tag_name: String,
}

/// Strip one leading `v` or `V` from a tag (`v1.2.3` -> `1.2.3`).
pub fn normalize_tag(tag: &str) -> &str {
    tag.strip_prefix(['v', 'V']).unwrap_or(tag)
}

/// Pick the API token: explicit value, then `GH_TOKEN`, then `GITHUB_TOKEN`.
/// Empty values are treated as unset.
pub fn resolve_token<F>(explicit: Option<&str>, env: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let present = |t: &String| !t.trim().is_empty();
    explicit
        .map(str::to_string)
        .filter(present)
        .or_else(|| env("GH_TOKEN").filter(present))
        .or_else(|| env("GITHUB_TOKEN").filter(present))
}

/// Parse the body of `GET /repos/{owner}/{repo}/releases/latest`.
pub(crate) fn parse_latest_release(body: &serde_json::Value, context: &str) -> Result<String> {
    if !body.is_object() {
        anyhow::bail!("{}: expected JSON object", context);
    }
    let release = LatestRelease::deserialize(body)
        .with_context(|| format!("{}: expected tag_name string", context))?;
    Ok(release.tag_name)
}

pub struct GithubClient {
    http: HttpClient,
    api_base: String,
    token: Option<String>,
}

impl GithubClient {
    pub fn new(http: HttpClient, cfg: &GithubConfig) -> Self {
        let token = resolve_token(cfg.token.as_deref(), |k| std::env::var(k).ok());
        Self {
            http,
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn latest_release_url(&self, owner: &str, repo: &str) -> String {
        format!("{}/repos/{}/{}/releases/latest", self.api_base, owner, repo)
    }

    /// Raw `tag_name` of the latest release of `owner/repo`.
    pub fn latest_release_tag(&self, owner: &str, repo: &str) -> Result<String> {
        let url = self.latest_release_url(owner, repo);
        let auth = self.token.as_ref().map(|t| format!("Bearer {}", t));

        let mut headers = vec![("Accept", "application/vnd.github+json")];
        if let Some(auth) = auth.as_deref() {
            headers.push(("Authorization", auth));
        }

        tracing::debug!(owner, repo, authenticated = auth.is_some(), "querying latest release");
        let context = format!("GitHub latest release {}/{}", owner, repo);
        let body = self.http.get_json(&url, &headers).context(context.clone())?;
        parse_latest_release(&body, &context)
    }
}

impl ReleaseSource for GithubClient {
    fn latest_version(&self, owner: &str, repo: &str) -> Result<String> {
        let tag = self.latest_release_tag(owner, repo)?;
        let version = normalize_tag(&tag).to_string();
        tracing::info!(owner, repo, tag = %tag, version = %version, "latest release resolved");
        Ok(version)
    }
}
