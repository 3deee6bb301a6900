use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Download URL template used by source-tarball releases.
pub const DEFAULT_URL_TEMPLATE: &str =
    "https://{host}/{owner}/{repo}/releases/download/v{version}/{repo}-{version}-src.tar.gz";

/// The upstream project being tracked and where its version record lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageConfig {
    /// Local package name (used in log lines only).
    pub name: String,
    /// Repository owner on the hosting service.
    pub owner: String,
    /// Repository (project) name on the hosting service.
    pub repo: String,
    /// Host serving release downloads.
    #[serde(default = "default_host")]
    pub host: String,
    /// Download URL template; `{host}`, `{owner}`, `{repo}` and `{version}` are substituted.
    #[serde(default = "default_url_template")]
    pub url_template: String,
    /// Unpack the archive before hashing (NAR hash of the tree) instead of hashing the raw file.
    #[serde(default = "default_unpack")]
    pub unpack: bool,
    /// JSON file holding the `{version, hash}` record.
    pub hashes_file: PathBuf,
}

fn default_host() -> String {
    "github.com".to_string()
}

fn default_url_template() -> String {
    DEFAULT_URL_TEMPLATE.to_string()
}

fn default_unpack() -> bool {
    true
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            name: "sorapec".to_string(),
            owner: "Kh05ifr4nD".to_string(),
            repo: "sorapec".to_string(),
            host: default_host(),
            url_template: default_url_template(),
            unpack: true,
            hashes_file: PathBuf::from("packages/sorapec/hashes.json"),
        }
    }
}

/// HTTP client settings shared by the release lookup and archive downloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub connect_timeout_secs: u64,
    /// Total transfer timeout; archives can be large.
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 15,
            timeout_secs: 300,
            user_agent: "relbump-updater".to_string(),
        }
    }
}

/// Release index service (GitHub REST API) settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    /// API root, without trailing slash.
    pub api_base: String,
    /// Explicit API token. When unset, `GH_TOKEN` then `GITHUB_TOKEN` are consulted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            token: None,
        }
    }
}

/// How source hashes are computed: natively (download + NAR hash) or via `nix store prefetch-file`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashBackend {
    #[default]
    Native,
    Nix,
}

/// Global configuration loaded from `~/.config/relbump/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelbumpConfig {
    #[serde(default)]
    pub hash_backend: HashBackend,
    #[serde(default)]
    pub package: PackageConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub github: GithubConfig,
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("relbump")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<RelbumpConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = RelbumpConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    load_from_path(&path)
}

/// Load configuration from an explicit path. The file must exist.
pub fn load_from_path(path: &Path) -> Result<RelbumpConfig> {
    let data =
        fs::read_to_string(path).with_context(|| format!("read config: {}", path.display()))?;
    let cfg: RelbumpConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = RelbumpConfig::default();
        assert_eq!(cfg.hash_backend, HashBackend::Native);
        assert_eq!(cfg.package.owner, "Kh05ifr4nD");
        assert_eq!(cfg.package.repo, "sorapec");
        assert_eq!(cfg.package.host, "github.com");
        assert!(cfg.package.unpack);
        assert_eq!(cfg.http.connect_timeout_secs, 15);
        assert_eq!(cfg.github.api_base, "https://api.github.com");
        assert!(cfg.github.token.is_none());
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = RelbumpConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: RelbumpConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn empty_file_yields_defaults() {
        let cfg: RelbumpConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, RelbumpConfig::default());
    }

    #[test]
    fn config_toml_custom_package() {
        let toml = r#"
            hash_backend = "nix"

            [package]
            name = "crush"
            owner = "charmbracelet"
            repo = "crush"
            unpack = false
            hashes_file = "packages/crush/hashes.json"

            [http]
            timeout_secs = 60
        "#;
        let cfg: RelbumpConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.hash_backend, HashBackend::Nix);
        assert_eq!(cfg.package.owner, "charmbracelet");
        assert_eq!(cfg.package.host, "github.com");
        assert_eq!(cfg.package.url_template, DEFAULT_URL_TEMPLATE);
        assert!(!cfg.package.unpack);
        assert_eq!(
            cfg.package.hashes_file,
            PathBuf::from("packages/crush/hashes.json")
        );
        assert_eq!(cfg.http.timeout_secs, 60);
        assert_eq!(cfg.http.connect_timeout_secs, 15);
        assert_eq!(cfg.http.user_agent, "relbump-updater");
    }

    #[test]
    fn unknown_backend_rejected() {
        let toml = r#"hash_backend = "sha1""#;
        assert!(toml::from_str::<RelbumpConfig>(toml).is_err());
    }

    #[test]
    fn load_from_path_reads_file_and_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        assert!(load_from_path(&path).is_err());

        fs::write(&path, "[github]\ntoken = \"abc\"\n").unwrap();
        let cfg = load_from_path(&path).unwrap();
        assert_eq!(cfg.github.token.as_deref(), Some("abc"));
        assert_eq!(cfg.github.api_base, "https://api.github.com");
    }
}
