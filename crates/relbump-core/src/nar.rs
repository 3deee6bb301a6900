//! Nix Archive (NAR) serialization of an in-memory file tree.
//!
//! NAR is the canonical, metadata-free encoding Nix hashes for
//! "recursive" (unpacked) fixed-output sources: only file type, contents,
//! the executable bit and symlink targets are encoded, directory entries are
//! sorted bytewise, and every string is a little-endian u64 length followed
//! by the bytes padded with zeros to a multiple of 8.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::{self, Write};

const NAR_MAGIC: &[u8] = b"nix-archive-1";

/// A file system object as it appears in a NAR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Regular { executable: bool, contents: Vec<u8> },
    Symlink { target: Vec<u8> },
    /// Children keyed by raw name bytes; `BTreeMap` gives the bytewise order NAR requires.
    Directory(BTreeMap<Vec<u8>, Node>),
}

impl Node {
    pub fn empty_dir() -> Self {
        Node::Directory(BTreeMap::new())
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Node::Directory(_))
    }
}

fn write_str<W: Write>(w: &mut W, bytes: &[u8]) -> io::Result<()> {
    w.write_all(&(bytes.len() as u64).to_le_bytes())?;
    w.write_all(bytes)?;
    let pad = (8 - bytes.len() % 8) % 8;
    if pad > 0 {
        w.write_all(&[0u8; 8][..pad])?;
    }
    Ok(())
}

fn write_node<W: Write>(w: &mut W, node: &Node) -> io::Result<()> {
    write_str(w, b"(")?;
    write_str(w, b"type")?;
    match node {
        Node::Regular {
            executable,
            contents,
        } => {
            write_str(w, b"regular")?;
            if *executable {
                write_str(w, b"executable")?;
                write_str(w, b"")?;
            }
            write_str(w, b"contents")?;
            write_str(w, contents)?;
        }
        Node::Symlink { target } => {
            write_str(w, b"symlink")?;
            write_str(w, b"target")?;
            write_str(w, target)?;
        }
        Node::Directory(children) => {
            write_str(w, b"directory")?;
            for (name, child) in children {
                write_str(w, b"entry")?;
                write_str(w, b"(")?;
                write_str(w, b"name")?;
                write_str(w, name)?;
                write_str(w, b"node")?;
                write_node(w, child)?;
                write_str(w, b")")?;
            }
        }
    }
    write_str(w, b")")
}

/// Write the NAR serialization of `node` to `w`.
pub fn write_nar<W: Write>(w: &mut W, node: &Node) -> io::Result<()> {
    write_str(w, NAR_MAGIC)?;
    write_node(w, node)
}

/// SHA-256 of the NAR serialization, streamed without buffering the archive.
pub fn nar_sha256(node: &Node) -> io::Result<[u8; 32]> {
    let mut hasher = Sha256::new();
    write_nar(&mut hasher, node)?;
    Ok(hasher.finalize().into())
}
