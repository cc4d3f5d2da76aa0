//! zstd streams: a container with exactly one member, the decompressed payload.

use std::path::Path;
use std::sync::{Arc, OnceLock};

use tracing::debug;

use super::{as_container, Container};
use crate::artifact::{Artifact, ArtifactRef};
use crate::error::{EngineError, EngineResult};

/// A zstd-compressed artifact.
///
/// The payload is decoded on first access and kept for the container's
/// lifetime. Because it has a single member the container is transparent:
/// [`nested_container`](Container::nested_container) exposes the payload's
/// own container, if any.
#[derive(Debug)]
pub struct ZstdContainer {
    source: ArtifactRef,
    payload: OnceLock<ArtifactRef>,
}

impl ZstdContainer {
    pub fn new(source: ArtifactRef) -> Self {
        Self {
            source,
            payload: OnceLock::new(),
        }
    }

    /// `foo.tar.zst` holds `foo.tar`; anything else holds `<name>-content`.
    pub fn member_name(&self) -> String {
        let name = self.source.name();
        let base = Path::new(name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string());
        match base.strip_suffix(".zst") {
            Some(stem) if !stem.is_empty() => stem.to_string(),
            _ => format!("{base}-content"),
        }
    }

    fn payload(&self) -> EngineResult<ArtifactRef> {
        if let Some(payload) = self.payload.get() {
            return Ok(Arc::clone(payload));
        }
        let reader = self.source.open_for_read()?;
        let decoded = ::zstd::decode_all(reader)
            .map_err(|e| EngineError::malformed(self.source.name(), format!("zstd: {e}")))?;
        debug!(
            artifact = self.source.name(),
            bytes = decoded.len(),
            "decompressed zstd payload"
        );
        let payload = Artifact::from_bytes(self.member_name(), decoded);
        Ok(Arc::clone(self.payload.get_or_init(|| payload)))
    }
}

impl Container for ZstdContainer {
    fn source(&self) -> &ArtifactRef {
        &self.source
    }

    fn member_names(&self) -> EngineResult<Vec<String>> {
        Ok(vec![self.member_name()])
    }

    fn member(&self, name: &str) -> EngineResult<ArtifactRef> {
        if name == self.member_name() {
            self.payload()
        } else {
            Err(EngineError::MemberNotFound {
                container: self.source.name().to_string(),
                name: name.to_string(),
            })
        }
    }

    fn nested_container(&self) -> EngineResult<Option<Arc<dyn Container>>> {
        Ok(as_container(&self.payload()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{ar_archive, zstd_compress};
    use crate::specialize::{specialize, ArtifactKind};

    fn container(name: &str, bytes: Vec<u8>) -> ZstdContainer {
        let source = Artifact::from_bytes(name, bytes);
        assert_eq!(specialize(&source), ArtifactKind::Zstd);
        ZstdContainer::new(source)
    }

    #[test]
    fn member_name_strips_extension() {
        assert_eq!(container("data.txt.zst", zstd_compress(b"x")).member_name(), "data.txt");
        assert_eq!(container("dir/blob", zstd_compress(b"x")).member_name(), "blob-content");
        assert_eq!(container(".zst", zstd_compress(b"x")).member_name(), ".zst-content");
    }

    #[test]
    fn decompresses_single_member() {
        let zst = container("hello.txt.zst", zstd_compress(b"hello\n"));
        assert_eq!(zst.member_names().unwrap(), vec!["hello.txt"]);
        let payload = zst.member("hello.txt").unwrap();
        assert_eq!(&*payload.read_bytes().unwrap(), b"hello\n");
        assert!(Arc::ptr_eq(&payload, &zst.member("hello.txt").unwrap()));
        assert!(zst.nested_container().unwrap().is_none());
    }

    #[test]
    fn payload_container_is_nested() {
        let zst = container("lib.a.zst", zstd_compress(&ar_archive(&[("x.o", b"1")])));
        let nested = zst.nested_container().unwrap().unwrap();
        assert_eq!(nested.source().name(), "lib.a");
        assert_eq!(nested.member_names().unwrap(), vec!["x.o"]);
    }

    #[test]
    fn corrupt_stream_is_malformed() {
        let mut bytes = zstd_compress(b"some payload that compresses");
        bytes.truncate(bytes.len() / 2);
        let zst = container("broken.zst", bytes);
        assert!(matches!(
            zst.member("broken"),
            Err(EngineError::MalformedContainer { .. })
        ));
    }
}
