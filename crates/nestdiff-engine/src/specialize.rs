//! Specialization: deciding what an opaque artifact is.
//!
//! Classification looks at the filesystem entry type first, then at the magic
//! bytes at the start of the content. The result is cached on the artifact, so
//! specializing twice is a no-op and an artifact's kind never changes.

use std::fmt;
use std::fs;

use tracing::{debug, warn};

use crate::artifact::Artifact;
use crate::error::{EngineError, EngineResult};

/// How many leading bytes the detectors look at.
pub const SNIFF_LEN: usize = 512;

const AR_MAGIC: &[u8] = b"!<arch>\n";
const ZSTD_MAGIC: &[u8] = &[0x28, 0xB5, 0x2F, 0xFD];

/// The closed set of artifact kinds the engine knows how to compare.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// A filesystem directory.
    Directory,
    /// A symbolic link, compared by its target.
    Symlink,
    /// A Unix `ar` archive (static libraries, `.deb` packages).
    ArArchive,
    /// A zstd-compressed stream with a single payload.
    Zstd,
    /// UTF-8 text.
    Text,
    /// Anything else.
    Binary,
}

impl ArtifactKind {
    /// Returns `true` for kinds that expose members.
    pub fn is_container(self) -> bool {
        matches!(self, Self::Directory | Self::ArArchive | Self::Zstd)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Directory => "directory",
            Self::Symlink => "symbolic link",
            Self::ArArchive => "ar archive",
            Self::Zstd => "zstd compressed data",
            Self::Text => "text file",
            Self::Binary => "binary file",
        };
        f.write_str(label)
    }
}

/// Classify `artifact`, caching the result.
///
/// A missing artifact takes the kind of the artifact it stands in for.
pub fn specialize(artifact: &Artifact) -> ArtifactKind {
    if let Some(counterpart) = artifact.counterpart() {
        return *artifact.kind.get_or_init(|| specialize(counterpart));
    }
    *artifact.kind.get_or_init(|| {
        let kind = classify(artifact);
        debug!(artifact = artifact.name(), %kind, "specialized");
        kind
    })
}

fn classify(artifact: &Artifact) -> ArtifactKind {
    if let Some(path) = artifact.path() {
        match fs::symlink_metadata(path) {
            Ok(meta) if meta.file_type().is_symlink() => return ArtifactKind::Symlink,
            Ok(meta) if meta.is_dir() => return ArtifactKind::Directory,
            Ok(_) => {}
            Err(e) => {
                warn!(artifact = artifact.name(), error = %e, "cannot stat; treating as binary");
                return ArtifactKind::Binary;
            }
        }
    }

    let head = match artifact.read_head(SNIFF_LEN) {
        Ok(head) => head,
        Err(e) => {
            warn!(artifact = artifact.name(), error = %e, "cannot sniff; treating as binary");
            return ArtifactKind::Binary;
        }
    };

    match detect_format(artifact.name(), &head) {
        Ok(kind) => kind,
        Err(e) => {
            debug!(error = %e, "no container format matched");
            classify_leaf(&head)
        }
    }
}

/// Match `head` against the known container formats.
pub fn detect_format(name: &str, head: &[u8]) -> EngineResult<ArtifactKind> {
    if head.starts_with(AR_MAGIC) {
        Ok(ArtifactKind::ArArchive)
    } else if head.starts_with(ZSTD_MAGIC) {
        Ok(ArtifactKind::Zstd)
    } else {
        Err(EngineError::UnsupportedFormat {
            name: name.to_string(),
        })
    }
}

/// Text or binary, judged from the leading bytes.
pub fn classify_leaf(head: &[u8]) -> ArtifactKind {
    if head.contains(&0) {
        return ArtifactKind::Binary;
    }
    match std::str::from_utf8(head) {
        Ok(_) => ArtifactKind::Text,
        // A multi-byte character cut off by the sniff window is still text.
        Err(e) if e.error_len().is_none() && head.len() == SNIFF_LEN => ArtifactKind::Text,
        Err(_) => ArtifactKind::Binary,
    }
}
