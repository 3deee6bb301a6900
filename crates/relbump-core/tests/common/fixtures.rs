//! Release tarballs and config for end-to-end runs.

use flate2::write::GzEncoder;
use flate2::Compression;
use relbump_core::config::{GithubConfig, HttpConfig, PackageConfig};
use std::io::Write;
use std::path::Path;
use tar::{EntryType, Header};

/// NAR hash of the tree produced by [`source_tarball`], independent of the top directory name.
pub const SOURCE_TREE_HASH: &str = "sha256-sr61IOs/G4Fqq14dHzooxylomjtCfyO6pWKq21WHNRo=";

/// A `<top>/` source tree with a plain file, an executable script and a symlink, as tar.gz.
pub fn source_tarball(top: &str) -> Vec<u8> {
    let mut b = tar::Builder::new(Vec::new());

    let mut h = Header::new_gnu();
    h.set_entry_type(EntryType::Directory);
    h.set_mode(0o755);
    h.set_size(0);
    b.append_data(&mut h, format!("{top}/"), std::io::empty()).unwrap();

    for (name, mode, data) in [
        ("README.md", 0o644, &b"hello\n"[..]),
        ("bin/run.sh", 0o755, &b"#!/bin/sh\necho hi\n"[..]),
    ] {
        let mut h = Header::new_gnu();
        h.set_entry_type(EntryType::Regular);
        h.set_mode(mode);
        h.set_size(data.len() as u64);
        b.append_data(&mut h, format!("{top}/{name}"), data).unwrap();
    }

    let mut h = Header::new_gnu();
    h.set_entry_type(EntryType::Symlink);
    h.set_mode(0o777);
    h.set_size(0);
    b.append_link(&mut h, format!("{top}/link"), "README.md").unwrap();

    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(&b.into_inner().unwrap()).unwrap();
    enc.finish().unwrap()
}

/// Package pointing at a local server: `{host}` is `127.0.0.1:<port>` and the scheme is http.
pub fn local_package(host: &str, hashes_file: &Path) -> PackageConfig {
    PackageConfig {
        host: host.to_string(),
        url_template:
            "http://{host}/{owner}/{repo}/releases/download/v{version}/{repo}-{version}-src.tar.gz"
                .to_string(),
        hashes_file: hashes_file.to_path_buf(),
        ..PackageConfig::default()
    }
}

pub fn local_github(base_url: &str, token: Option<&str>) -> GithubConfig {
    GithubConfig {
        api_base: base_url.to_string(),
        token: token.map(str::to_string),
    }
}

pub fn fast_http() -> HttpConfig {
    HttpConfig {
        connect_timeout_secs: 5,
        timeout_secs: 10,
        ..HttpConfig::default()
    }
}
