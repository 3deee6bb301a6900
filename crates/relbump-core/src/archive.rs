//! Unpack a downloaded source archive into an in-memory tree.
//!
//! Handles gzip-compressed and plain tar. Only what NAR can represent is
//! kept: directories, regular files (with the owner-executable bit) and
//! symlinks. Hard links become copies of their target. Ownership, times and
//! the remaining permission bits are dropped, exactly as unpacking to disk and
//! serializing to NAR would.

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use std::collections::BTreeMap;
use std::io::Read;

use crate::nar::Node;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArchiveError {
    #[error("unsafe path in archive: {0:?}")]
    UnsafePath(String),
    #[error("unsupported entry type {kind} for {path:?}")]
    UnsupportedEntry { path: String, kind: String },
    #[error("{0:?} is not a directory but has entries below it")]
    NotADirectory(String),
    #[error("hard link {path:?} points to missing or non-file target {target:?}")]
    BadHardLink { path: String, target: String },
}

fn display(path: &[u8]) -> String {
    String::from_utf8_lossy(path).into_owned()
}

/// Split an archive path into components, rejecting absolute paths and `..`.
fn components(path: &[u8]) -> Result<Vec<Vec<u8>>, ArchiveError> {
    if path.starts_with(b"/") {
        return Err(ArchiveError::UnsafePath(display(path)));
    }
    let mut out = Vec::new();
    for c in path.split(|b| *b == b'/') {
        match c {
            b"" | b"." => continue,
            b".." => return Err(ArchiveError::UnsafePath(display(path))),
            _ => out.push(c.to_vec()),
        }
    }
    Ok(out)
}

/// Walk to (creating as needed) the directory at `comps`.
fn dir_mut<'a>(
    root: &'a mut BTreeMap<Vec<u8>, Node>,
    comps: &[Vec<u8>],
) -> Result<&'a mut BTreeMap<Vec<u8>, Node>, ArchiveError> {
    let mut cur = root;
    for (i, c) in comps.iter().enumerate() {
        let node = cur.entry(c.clone()).or_insert_with(Node::empty_dir);
        cur = match node {
            Node::Directory(children) => children,
            _ => return Err(ArchiveError::NotADirectory(display(&comps[..=i].join(&b'/')))),
        };
    }
    Ok(cur)
}

fn lookup<'a>(root: &'a BTreeMap<Vec<u8>, Node>, comps: &[Vec<u8>]) -> Option<&'a Node> {
    let (last, parents) = comps.split_last()?;
    let mut cur = root;
    for c in parents {
        match cur.get(c)? {
            Node::Directory(children) => cur = children,
            _ => return None,
        }
    }
    cur.get(last)
}

/// Place `node` at `comps`. Directories merge with an existing directory; anything else replaces.
fn insert(
    root: &mut BTreeMap<Vec<u8>, Node>,
    comps: &[Vec<u8>],
    node: Node,
) -> Result<(), ArchiveError> {
    let Some((name, parents)) = comps.split_last() else {
        // The archive root itself ("./"); nothing to record.
        return Ok(());
    };
    let parent = dir_mut(root, parents)?;
    if node.is_dir() && parent.get(name).is_some_and(Node::is_dir) {
        return Ok(());
    }
    parent.insert(name.clone(), node);
    Ok(())
}

fn read_tar<R: Read>(reader: R) -> Result<BTreeMap<Vec<u8>, Node>> {
    let mut archive = tar::Archive::new(reader);
    let mut root: BTreeMap<Vec<u8>, Node> = BTreeMap::new();

    for entry in archive.entries().context("read tar entries")? {
        let mut entry = entry.context("read tar entry")?;
        let raw_path = entry.path_bytes().into_owned();
        let comps = components(&raw_path)?;
        let kind = entry.header().entry_type();

        let node = match kind {
            tar::EntryType::XGlobalHeader => continue,
            tar::EntryType::Directory => Node::empty_dir(),
            // Pre-POSIX archives mark directories with a trailing slash on a regular entry.
            tar::EntryType::Regular if raw_path.ends_with(b"/") => Node::empty_dir(),
            tar::EntryType::Regular | tar::EntryType::Continuous => {
                let mode = entry
                    .header()
                    .mode()
                    .with_context(|| format!("bad mode for {}", display(&raw_path)))?;
                let mut contents = Vec::new();
                entry
                    .read_to_end(&mut contents)
                    .with_context(|| format!("read {}", display(&raw_path)))?;
                Node::Regular {
                    executable: mode & 0o100 != 0,
                    contents,
                }
            }
            tar::EntryType::Symlink => {
                let target = entry
                    .link_name_bytes()
                    .map(|t| t.into_owned())
                    .unwrap_or_default();
                Node::Symlink { target }
            }
            tar::EntryType::Link => {
                let target = entry
                    .link_name_bytes()
                    .map(|t| t.into_owned())
                    .unwrap_or_default();
                let target_comps = components(&target)?;
                match lookup(&root, &target_comps) {
                    Some(n @ Node::Regular { .. }) => n.clone(),
                    _ => {
                        return Err(ArchiveError::BadHardLink {
                            path: display(&raw_path),
                            target: display(&target),
                        }
                        .into())
                    }
                }
            }
            other => {
                return Err(ArchiveError::UnsupportedEntry {
                    path: display(&raw_path),
                    kind: format!("{:?}", other),
                }
                .into())
            }
        };

        insert(&mut root, &comps, node)?;
    }

    Ok(root)
}

/// Unpack `bytes` (tar or tar.gz) and return the tree Nix would hash.
///
/// A lone top-level entry becomes the root, so `pkg-1.0/src/lib.rs`
/// hashes as `src/lib.rs` and a single-file archive hashes as that file.
pub fn unpack(bytes: &[u8]) -> Result<Node> {
    let mut root = if bytes.starts_with(&GZIP_MAGIC) {
        read_tar(GzDecoder::new(bytes))?
    } else {
        read_tar(bytes)?
    };

    if root.len() == 1 {
        if let Some((name, top)) = root.pop_first() {
            let name = display(&name);
            tracing::debug!(top = %name, "using single top-level entry as root");
            return Ok(top);
        }
    }
    Ok(Node::Directory(root))
}
