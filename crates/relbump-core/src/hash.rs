//! Content hashes for release archives.
//!
//! Hashes are reported in SRI form (`sha256-<base64>`), the format Nix
//! expressions consume. Two backends compute them: a native one that
//! downloads and hashes in-process, and one that delegates to
//! `nix store prefetch-file`.

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::process::Command;
use std::str::FromStr;

use crate::archive;
use crate::config::{HashBackend, RelbumpConfig};
use crate::http::HttpClient;
use crate::nar;

const SRI_PREFIX: &str = "sha256-";

/// A SHA-256 digest rendered as an SRI string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sri([u8; 32]);

impl Sri {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Sri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", SRI_PREFIX, STANDARD.encode(self.0))
    }
}

impl FromStr for Sri {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let b64 = s
            .strip_prefix(SRI_PREFIX)
            .with_context(|| format!("not a sha256 SRI hash: {:?}", s))?;
        let bytes = STANDARD
            .decode(b64)
            .with_context(|| format!("invalid base64 in SRI hash: {:?}", s))?;
        let digest: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| anyhow::anyhow!("SRI digest is {} bytes, expected 32", b.len()))?;
        Ok(Self(digest))
    }
}

/// Downloads `url` and returns a content-addressed hash of it.
///
/// With `unpack`, the archive is unpacked and the hash covers the resulting
/// tree (Nix "recursive" hash); otherwise it covers the raw bytes.
pub trait ContentHasher {
    fn hash_url(&self, url: &str, unpack: bool) -> Result<Sri>;
}

/// Flat SHA-256 of a byte buffer.
pub fn flat_hash(bytes: &[u8]) -> Sri {
    Sri(Sha256::digest(bytes).into())
}

/// NAR hash of an unpacked archive.
pub fn unpacked_hash(archive_bytes: &[u8]) -> Result<Sri> {
    let tree = archive::unpack(archive_bytes).context("unpack archive")?;
    let digest = nar::nar_sha256(&tree).context("serialize unpacked tree")?;
    Ok(Sri(digest))
}

/// Download with libcurl and hash in-process.
pub struct NativeHasher {
    http: HttpClient,
}

impl NativeHasher {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

impl ContentHasher for NativeHasher {
    fn hash_url(&self, url: &str, unpack: bool) -> Result<Sri> {
        let bytes = self
            .http
            .get_bytes(url, &[])
            .with_context(|| format!("download {}", url))?;
        let sri = if unpack {
            unpacked_hash(&bytes).with_context(|| format!("hash unpacked {}", url))?
        } else {
            flat_hash(&bytes)
        };
        tracing::info!(url, unpack, bytes = bytes.len(), sha256 = %sri.to_hex(), "archive hashed");
        Ok(sri)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PrefetchResult {
    hash: String,
    store_path: String,
}

fn parse_prefetch_output(stdout: &str) -> Result<Sri> {
    let result: PrefetchResult = serde_json::from_str(stdout.trim())
        .context("nix store prefetch-file: expected JSON object with hash and storePath")?;
    tracing::debug!(store_path = %result.store_path, "prefetched into store");
    result.hash.parse()
}

/// Delegate to `nix store prefetch-file --json --hash-type sha256 [--unpack] <url>`.
pub struct NixPrefetchHasher {
    program: String,
}

impl NixPrefetchHasher {
    pub fn new() -> Self {
        Self {
            program: "nix".to_string(),
        }
    }

    /// Use a different executable in place of `nix`.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn args(url: &str, unpack: bool) -> Vec<String> {
        let mut args: Vec<String> = ["store", "prefetch-file", "--json", "--hash-type", "sha256"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        if unpack {
            args.push("--unpack".to_string());
        }
        args.push(url.to_string());
        args
    }
}

impl Default for NixPrefetchHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentHasher for NixPrefetchHasher {
    fn hash_url(&self, url: &str, unpack: bool) -> Result<Sri> {
        let args = Self::args(url, unpack);
        tracing::debug!(program = %self.program, ?args, "running prefetch");
        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .with_context(|| format!("spawn {}", self.program))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let mut msg = format!(
                "command failed ({}): {} {}",
                output.status,
                self.program,
                args.join(" ")
            );
            if !stdout.trim().is_empty() {
                msg.push_str(&format!("\n--- stdout ---\n{}", stdout.trim_end()));
            }
            if !stderr.trim().is_empty() {
                msg.push_str(&format!("\n--- stderr ---\n{}", stderr.trim_end()));
            }
            anyhow::bail!(msg);
        }

        let sri = parse_prefetch_output(&stdout)?;
        tracing::info!(url, unpack, sha256 = %sri.to_hex(), "archive hashed via nix");
        Ok(sri)
    }
}

/// Build the hasher selected by `cfg.hash_backend`.
pub fn hasher_from_config(cfg: &RelbumpConfig) -> Box<dyn ContentHasher> {
    match cfg.hash_backend {
        HashBackend::Native => Box::new(NativeHasher::new(HttpClient::new(&cfg.http))),
        HashBackend::Nix => Box::new(NixPrefetchHasher::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_hash_known_content() {
        let sri = flat_hash(b"hello\n");
        assert_eq!(
            sri.to_hex(),
            "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03"
        );
        assert_eq!(
            sri.to_string(),
            "sha256-WJG1tSLV3whtD/CxEPvZ0hu0/HFjrzTQgoai6Eb2vgM="
        );
    }

    #[test]
    fn sri_parse_roundtrips_display() {
        let text = "sha256-sr61IOs/G4Fqq14dHzooxylomjtCfyO6pWKq21WHNRo=";
        let sri: Sri = text.parse().unwrap();
        assert_eq!(sri.to_string(), text);
    }

    #[test]
    fn sri_parse_rejects_bad_input() {
        assert!("sha512-AAAA".parse::<Sri>().is_err());
        assert!("sha256-not base64!".parse::<Sri>().is_err());
        assert!("sha256-AAAA".parse::<Sri>().is_err());
    }

    #[test]
    fn prefetch_output_parsed() {
        let out = r#"{"hash":"sha256-pQpattmS9VmO3ZIQUFn66az8GSmB4IvYhTTCFn6SUmo=","storePath":"/nix/store/abc-source"}"#;
        assert_eq!(
            parse_prefetch_output(out).unwrap().to_string(),
            "sha256-pQpattmS9VmO3ZIQUFn66az8GSmB4IvYhTTCFn6SUmo="
        );
        assert!(parse_prefetch_output(r#"{"hash":"sha256-x"}"#).is_err());
        assert!(parse_prefetch_output("warning: something").is_err());
    }

    #[test]
    fn prefetch_args_include_unpack_only_when_requested() {
        assert_eq!(
            NixPrefetchHasher::args("https://x/a.tar.gz", true),
            [
                "store",
                "prefetch-file",
                "--json",
                "--hash-type",
                "sha256",
                "--unpack",
                "https://x/a.tar.gz"
            ]
        );
        assert!(!NixPrefetchHasher::args("https://x/a", false).contains(&"--unpack".to_string()));
    }

    #[cfg(unix)]
    #[test]
    fn prefetch_failure_reports_command() {
        let hasher = NixPrefetchHasher::with_program("false");
        let err = hasher.hash_url("https://x/a.tar.gz", true).unwrap_err();
        let msg = format!("{:#}", err);
        assert!(msg.contains("command failed"));
        assert!(msg.contains("prefetch-file"));
    }

    #[test]
    fn missing_program_fails_to_spawn() {
        let hasher = NixPrefetchHasher::with_program("relbump-no-such-program");
        let err = hasher.hash_url("https://x/a", false).unwrap_err();
        assert!(format!("{:#}", err).contains("spawn relbump-no-such-program"));
    }
}
