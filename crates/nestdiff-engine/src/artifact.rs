//! Artifacts: the named, byte-bearing units under comparison.
//!
//! An [`Artifact`] is a display name plus a byte source: a filesystem path, an
//! in-memory buffer (archive members, decompressed payloads) or nothing at all
//! for a missing artifact. Artifacts are immutable and shared as
//! [`ArtifactRef`]; the only interior state is the cached
//! [`ArtifactKind`](crate::specialize::ArtifactKind) written once by the
//! specializer and the content digest.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use tempfile::NamedTempFile;

use crate::error::{EngineError, EngineResult};
use crate::specialize::ArtifactKind;

/// Display name used for the absent side of an added/removed pair.
pub const MISSING_NAME: &str = "/dev/null";

/// Shared handle to an artifact.
pub type ArtifactRef = Arc<Artifact>;

/// A named artifact under comparison.
pub struct Artifact {
    name: String,
    origin: Origin,
    pub(crate) kind: OnceLock<ArtifactKind>,
    digest: OnceLock<blake3::Hash>,
}

enum Origin {
    Path(PathBuf),
    Memory(Arc<[u8]>),
    Missing { counterpart: ArtifactRef },
}

impl Artifact {
    /// An artifact backed by a filesystem path, displayed as the path itself.
    pub fn from_path(path: impl Into<PathBuf>) -> ArtifactRef {
        let path = path.into();
        let name = path.display().to_string();
        Self::from_path_named(name, path)
    }

    /// An artifact backed by a filesystem path with an explicit display name.
    pub fn from_path_named(name: impl Into<String>, path: impl Into<PathBuf>) -> ArtifactRef {
        Arc::new(Self::with_origin(name.into(), Origin::Path(path.into())))
    }

    /// An artifact backed by an in-memory buffer.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> ArtifactRef {
        Arc::new(Self::with_origin(name.into(), Origin::Memory(bytes.into())))
    }

    /// A placeholder for an artifact that only exists on the other side.
    pub fn missing(counterpart: ArtifactRef) -> ArtifactRef {
        Arc::new(Self::with_origin(
            MISSING_NAME.to_string(),
            Origin::Missing { counterpart },
        ))
    }

    fn with_origin(name: String, origin: Origin) -> Self {
        Self {
            name,
            origin,
            kind: OnceLock::new(),
            digest: OnceLock::new(),
        }
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` for a missing-artifact placeholder.
    pub fn is_missing(&self) -> bool {
        matches!(self.origin, Origin::Missing { .. })
    }

    /// The real artifact a missing placeholder stands in for.
    pub fn counterpart(&self) -> Option<&ArtifactRef> {
        match &self.origin {
            Origin::Missing { counterpart } => Some(counterpart),
            _ => None,
        }
    }

    /// Filesystem path, when the artifact lives on disk.
    pub fn path(&self) -> Option<&Path> {
        match &self.origin {
            Origin::Path(path) => Some(path),
            _ => None,
        }
    }

    /// The kind assigned by the specializer, if it has run.
    pub fn cached_kind(&self) -> Option<ArtifactKind> {
        self.kind.get().copied()
    }

    /// Size of the content in bytes. Missing artifacts are empty.
    pub fn byte_length(&self) -> EngineResult<u64> {
        match &self.origin {
            Origin::Path(path) => fs::metadata(path)
                .map(|m| m.len())
                .map_err(|e| EngineError::io(&self.name, e)),
            Origin::Memory(bytes) => Ok(bytes.len() as u64),
            Origin::Missing { .. } => Ok(0),
        }
    }

    /// Open the content for streaming reads.
    pub fn open_for_read(&self) -> EngineResult<Box<dyn Read + Send>> {
        match &self.origin {
            Origin::Path(path) => {
                let file = File::open(path).map_err(|e| EngineError::io(&self.name, e))?;
                Ok(Box::new(file))
            }
            Origin::Memory(bytes) => Ok(Box::new(Cursor::new(Arc::clone(bytes)))),
            Origin::Missing { .. } => Ok(Box::new(io::empty())),
        }
    }

    /// Read the whole content.
    pub fn read_bytes(&self) -> EngineResult<Arc<[u8]>> {
        match &self.origin {
            Origin::Path(path) => fs::read(path)
                .map(Arc::from)
                .map_err(|e| EngineError::io(&self.name, e)),
            Origin::Memory(bytes) => Ok(Arc::clone(bytes)),
            Origin::Missing { .. } => Ok(Arc::from(Vec::new())),
        }
    }

    /// Read at most `limit` bytes from the start of the content.
    pub fn read_head(&self, limit: usize) -> EngineResult<Vec<u8>> {
        let mut head = Vec::with_capacity(limit);
        self.open_for_read()?
            .take(limit as u64)
            .read_to_end(&mut head)
            .map_err(|e| EngineError::io(&self.name, e))?;
        Ok(head)
    }

    /// BLAKE3 digest of the content, computed on first use.
    pub fn content_hash(&self) -> EngineResult<blake3::Hash> {
        if let Some(digest) = self.digest.get() {
            return Ok(*digest);
        }
        let mut hasher = blake3::Hasher::new();
        let mut reader = self.open_for_read()?;
        io::copy(&mut reader, &mut hasher).map_err(|e| EngineError::io(&self.name, e))?;
        Ok(*self.digest.get_or_init(|| hasher.finalize()))
    }

    /// An on-disk path holding this artifact's content, for external tools.
    ///
    /// In-memory and missing artifacts are written to a uniquely named
    /// temporary file that lives as long as the returned value.
    pub fn materialize(&self) -> EngineResult<Materialized> {
        if let Origin::Path(path) = &self.origin {
            return Ok(Materialized {
                path: path.clone(),
                _temp: None,
            });
        }
        let bytes = self.read_bytes()?;
        let mut temp = tempfile::Builder::new()
            .prefix("nestdiff-")
            .tempfile()
            .map_err(|e| EngineError::io(&self.name, e))?;
        temp.write_all(&bytes)
            .and_then(|()| temp.flush())
            .map_err(|e| EngineError::io(&self.name, e))?;
        Ok(Materialized {
            path: temp.path().to_path_buf(),
            _temp: Some(temp),
        })
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let origin = match &self.origin {
            Origin::Path(path) => format!("path {}", path.display()),
            Origin::Memory(bytes) => format!("{} bytes in memory", bytes.len()),
            Origin::Missing { counterpart } => format!("missing, other side {}", counterpart.name),
        };
        f.debug_struct("Artifact")
            .field("name", &self.name)
            .field("origin", &origin)
            .field("kind", &self.kind.get())
            .finish()
    }
}

/// An artifact's content available at a filesystem path.
#[derive(Debug)]
pub struct Materialized {
    path: PathBuf,
    _temp: Option<NamedTempFile>,
}

impl Materialized {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_artifact_reads() {
        let artifact = Artifact::from_bytes("a.txt", b"hello".to_vec());
        assert_eq!(artifact.name(), "a.txt");
        assert_eq!(artifact.byte_length().unwrap(), 5);
        assert_eq!(&*artifact.read_bytes().unwrap(), b"hello");
        assert_eq!(artifact.read_head(2).unwrap(), b"he");
        assert!(artifact.path().is_none());
    }

    #[test]
    fn missing_artifact_is_empty() {
        let real = Artifact::from_bytes("x", b"data".to_vec());
        let missing = Artifact::missing(Arc::clone(&real));
        assert!(missing.is_missing());
        assert_eq!(missing.name(), MISSING_NAME);
        assert_eq!(missing.byte_length().unwrap(), 0);
        assert!(missing.read_bytes().unwrap().is_empty());
        assert_eq!(missing.counterpart().unwrap().name(), "x");
    }

    #[test]
    fn path_artifact_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.bin");
        fs::write(&path, b"on disk").unwrap();

        let artifact = Artifact::from_path_named("f.bin", &path);
        assert_eq!(artifact.byte_length().unwrap(), 7);
        assert_eq!(&*artifact.read_bytes().unwrap(), b"on disk");
        assert_eq!(artifact.path(), Some(path.as_path()));
    }

    #[test]
    fn unreadable_path_is_io_error() {
        let artifact = Artifact::from_path("/nonexistent/nestdiff/file");
        assert!(matches!(artifact.read_bytes(), Err(EngineError::Io { .. })));
    }

    #[test]
    fn equal_content_hashes_match() {
        let a = Artifact::from_bytes("a", b"same".to_vec());
        let b = Artifact::from_bytes("b", b"same".to_vec());
        let c = Artifact::from_bytes("c", b"other".to_vec());
        assert_eq!(a.content_hash().unwrap(), b.content_hash().unwrap());
        assert_ne!(a.content_hash().unwrap(), c.content_hash().unwrap());
    }

    #[test]
    fn content_hash_is_computed_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.bin");
        fs::write(&path, b"first").unwrap();
        let artifact = Artifact::from_path(&path);
        let digest = artifact.content_hash().unwrap();

        fs::write(&path, b"second").unwrap();
        assert_eq!(artifact.content_hash().unwrap(), digest);
        assert_eq!(digest, blake3::hash(b"first"));
    }

    #[test]
    fn materialize_memory_uses_unique_temp_files() {
        let a = Artifact::from_bytes("a", b"one".to_vec());
        let b = Artifact::from_bytes("a", b"two".to_vec());
        let ma = a.materialize().unwrap();
        let mb = b.materialize().unwrap();
        assert_ne!(ma.path(), mb.path());
        assert_eq!(fs::read(ma.path()).unwrap(), b"one");

        let path = ma.path().to_path_buf();
        drop(ma);
        assert!(!path.exists());
    }
}
