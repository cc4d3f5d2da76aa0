//! The container view of an artifact that only exists on the other side.

use std::sync::Arc;

use super::Container;
use crate::artifact::{Artifact, ArtifactRef};
use crate::error::EngineResult;

/// Mirrors the member listing of its counterpart, with every member missing.
///
/// Descending into a removed directory or archive through this container
/// reports each of its members as removed too.
pub struct MissingContainer {
    source: ArtifactRef,
    counterpart: Arc<dyn Container>,
}

impl MissingContainer {
    pub fn new(source: ArtifactRef, counterpart: Arc<dyn Container>) -> Self {
        Self {
            source,
            counterpart,
        }
    }
}

impl Container for MissingContainer {
    fn source(&self) -> &ArtifactRef {
        &self.source
    }

    fn member_names(&self) -> EngineResult<Vec<String>> {
        self.counterpart.member_names()
    }

    fn member(&self, name: &str) -> EngineResult<ArtifactRef> {
        Ok(Artifact::missing(self.counterpart.member(name)?))
    }

    fn all_members(&self) -> EngineResult<Vec<(String, ArtifactRef)>> {
        Ok(self
            .counterpart
            .all_members()?
            .into_iter()
            .map(|(name, member)| (name, Artifact::missing(member)))
            .collect())
    }

    fn nested_container(&self) -> EngineResult<Option<Arc<dyn Container>>> {
        Ok(self.counterpart.nested_container()?.map(|inner| {
            let source = Artifact::missing(Arc::clone(inner.source()));
            Arc::new(MissingContainer::new(source, inner)) as Arc<dyn Container>
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::MISSING_NAME;
    use crate::container::as_container;
    use crate::fixtures::{ar_archive, zstd_compress};

    #[test]
    fn members_are_missing_but_keep_names() {
        let real = Artifact::from_bytes("lib.a", ar_archive(&[("x.o", b"1"), ("y.o", b"22")]));
        let missing = as_container(&Artifact::missing(real)).unwrap();

        let members = missing.members().unwrap();
        assert_eq!(members.keys().collect::<Vec<_>>(), vec!["x.o", "y.o"]);
        for member in members.values() {
            assert!(member.is_missing());
            assert_eq!(member.name(), MISSING_NAME);
            assert!(member.read_bytes().unwrap().is_empty());
        }
        assert_eq!(members["y.o"].counterpart().unwrap().name(), "y.o");
    }

    #[test]
    fn nesting_is_mirrored() {
        let real = Artifact::from_bytes("lib.a.zst", zstd_compress(&ar_archive(&[("x.o", b"1")])));
        let missing = as_container(&Artifact::missing(real)).unwrap();

        let nested = missing.nested_container().unwrap().unwrap();
        assert!(nested.source().is_missing());
        assert_eq!(nested.member_names().unwrap(), vec!["x.o"]);
        assert!(nested.member("x.o").unwrap().is_missing());
    }
}
