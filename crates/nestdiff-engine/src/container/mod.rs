//! Containers: artifacts that expose named members.
//!
//! The [`Container`] trait is the capability every archive-like format
//! implements. [`as_container`] is the factory that picks the concrete
//! container for a specialized artifact, including the [`MissingContainer`]
//! that mirrors the other side's listing for an artifact that only exists
//! there.

pub mod ar;
pub mod directory;
pub mod missing;
pub mod zstd;

use std::sync::Arc;

use indexmap::map::Entry;
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::artifact::ArtifactRef;
use crate::error::{EngineError, EngineResult};
use crate::specialize::{specialize, ArtifactKind};

pub use ar::ArContainer;
pub use directory::DirectoryContainer;
pub use missing::MissingContainer;
pub use zstd::ZstdContainer;

/// Ordered mapping of member name to member artifact.
pub type Members = IndexMap<String, ArtifactRef>;

/// An artifact's capability to expose named sub-artifacts.
///
/// Implementations provide [`member_names`](Self::member_names) and
/// [`member`](Self::member); everything else has a default built on those two.
/// Member names are stable for the lifetime of a container.
pub trait Container: Send + Sync {
    /// The artifact this container wraps.
    fn source(&self) -> &ArtifactRef;

    /// Member names in source order. Must not require fetching member bodies.
    fn member_names(&self) -> EngineResult<Vec<String>>;

    /// Fetch one member. Fails with [`EngineError::MemberNotFound`] if absent.
    fn member(&self, name: &str) -> EngineResult<ArtifactRef>;

    /// Every member with its name, in source order.
    ///
    /// The default calls [`member`](Self::member) once per name, which is
    /// O(n * cost(member)). Override it when the format can list and fetch in
    /// one pass.
    /// A listed name that cannot be fetched is skipped with a warning so the
    /// rest of the container can still be compared.
    fn all_members(&self) -> EngineResult<Vec<(String, ArtifactRef)>> {
        let mut members = Vec::new();
        for name in self.member_names()? {
            match self.member(&name) {
                Ok(member) => members.push((name, member)),
                Err(err @ EngineError::MemberNotFound { .. }) => {
                    warn!(container = self.source().name(), %err, "skipping unreachable member");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(members)
    }

    /// Members keyed by name. On duplicate names the first occurrence wins.
    fn members(&self) -> EngineResult<Members> {
        let mut members = Members::new();
        for (name, member) in self.all_members()? {
            match members.entry(name) {
                Entry::Occupied(entry) => {
                    warn!(
                        container = self.source().name(),
                        member = entry.key().as_str(),
                        "duplicate member name; keeping the first"
                    );
                }
                Entry::Vacant(entry) => {
                    entry.insert(member);
                }
            }
        }
        Ok(members)
    }

    /// The single sub-container this container transparently represents.
    fn nested_container(&self) -> EngineResult<Option<Arc<dyn Container>>> {
        Ok(None)
    }

    /// Member names followed by the nested container's names, for display.
    fn member_names_nested(&self) -> EngineResult<Vec<String>> {
        let mut names = self.member_names()?;
        if let Some(nested) = self.nested_container()? {
            let mut inner = nested.member_names()?;
            inner.sort();
            let label = nested.source().name().to_string();
            names.extend(inner.into_iter().map(|name| format!("[{label}] {name}")));
        }
        Ok(names)
    }

    /// Dig through nested containers following `path`, one name per level.
    ///
    /// Returns `None` when a name is absent or an intermediate member is not
    /// a container.
    fn lookup(&self, path: &[&str]) -> EngineResult<Option<ArtifactRef>> {
        let Some((first, rest)) = path.split_first() else {
            return Ok(None);
        };
        let member = match self.member(first) {
            Ok(member) => member,
            Err(EngineError::MemberNotFound { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        debug!(?path, member = member.name(), "lookup");
        specialize(&member);
        if rest.is_empty() {
            return Ok(Some(member));
        }
        match as_container(&member) {
            Some(container) => container.lookup(rest),
            None => Ok(None),
        }
    }
}

/// The container view of `artifact`, or `None` if its kind has no members.
///
/// A missing artifact is a container exactly when the artifact it stands in
/// for is one; it then yields a [`MissingContainer`].
pub fn as_container(artifact: &ArtifactRef) -> Option<Arc<dyn Container>> {
    if let Some(counterpart) = artifact.counterpart() {
        let real = as_container(counterpart)?;
        return Some(Arc::new(MissingContainer::new(Arc::clone(artifact), real)));
    }
    match specialize(artifact) {
        ArtifactKind::Directory => {
            let root = artifact.path()?.to_path_buf();
            Some(Arc::new(DirectoryContainer::new(Arc::clone(artifact), root)))
        }
        ArtifactKind::ArArchive => Some(Arc::new(ArContainer::new(Arc::clone(artifact)))),
        ArtifactKind::Zstd => Some(Arc::new(ZstdContainer::new(Arc::clone(artifact)))),
        ArtifactKind::Symlink | ArtifactKind::Text | ArtifactKind::Binary => None,
    }
}

/// Follow `nested_container` from `start` down to the innermost container.
///
/// Fails with [`EngineError::MaxDepthExceeded`] after `max_depth` levels so
/// that self-similar input cannot unwrap forever.
pub fn innermost(
    start: Arc<dyn Container>,
    max_depth: usize,
) -> EngineResult<Arc<dyn Container>> {
    let mut current = start;
    let mut depth = 0;
    while let Some(next) = current.nested_container()? {
        depth += 1;
        if depth > max_depth {
            return Err(EngineError::MaxDepthExceeded { limit: max_depth });
        }
        current = next;
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::Artifact;
    use crate::fixtures::{ar_archive, zstd_compress};

    #[test]
    fn leaf_kinds_are_not_containers() {
        assert!(as_container(&Artifact::from_bytes("t", b"text".to_vec())).is_none());
        assert!(as_container(&Artifact::from_bytes("b", vec![0u8, 1, 2])).is_none());
    }

    #[test]
    fn missing_of_leaf_is_not_a_container() {
        let real = Artifact::from_bytes("t", b"text".to_vec());
        assert!(as_container(&Artifact::missing(real)).is_none());
    }

    #[test]
    fn missing_of_container_mirrors_names() {
        let real = Artifact::from_bytes("lib.a", ar_archive(&[("x.o", b"1"), ("y.o", b"2")]));
        let missing = Artifact::missing(real);
        let container = as_container(&missing).unwrap();
        assert_eq!(container.member_names().unwrap(), vec!["x.o", "y.o"]);
        assert!(container.member("x.o").unwrap().is_missing());
    }

    #[test]
    fn nested_names_are_prefixed_and_sorted() {
        let inner = ar_archive(&[("b.o", b"2"), ("a.o", b"1")]);
        let outer = Artifact::from_bytes("lib.a.zst", zstd_compress(&inner));
        let container = as_container(&outer).unwrap();
        assert_eq!(
            container.member_names_nested().unwrap(),
            vec!["lib.a", "[lib.a] a.o", "[lib.a] b.o"]
        );
    }

    #[test]
    fn lookup_digs_through_nesting() {
        let inner = ar_archive(&[("x.o", b"payload")]);
        let outer = Artifact::from_bytes("lib.a.zst", zstd_compress(&inner));
        let container = as_container(&outer).unwrap();

        let found = container.lookup(&["lib.a", "x.o"]).unwrap().unwrap();
        assert_eq!(&*found.read_bytes().unwrap(), b"payload");
        assert!(container.lookup(&["lib.a", "nope.o"]).unwrap().is_none());
        assert!(container.lookup(&["nope"]).unwrap().is_none());
        assert!(container.lookup(&[]).unwrap().is_none());
    }

    #[test]
    fn innermost_unwraps_every_level() {
        let ar = ar_archive(&[("x.o", b"1")]);
        let twice = zstd_compress(&zstd_compress(&ar));
        let outer = as_container(&Artifact::from_bytes("lib.a.zst.zst", twice)).unwrap();

        let inner = innermost(Arc::clone(&outer), 8).unwrap();
        assert_eq!(inner.member_names().unwrap(), vec!["x.o"]);

        let err = innermost(outer, 1).err().unwrap();
        assert!(matches!(err, EngineError::MaxDepthExceeded { limit: 1 }));
    }

    /// Lists a name it cannot fetch.
    struct Haunted {
        source: ArtifactRef,
    }

    impl Container for Haunted {
        fn source(&self) -> &ArtifactRef {
            &self.source
        }

        fn member_names(&self) -> EngineResult<Vec<String>> {
            Ok(vec!["real".into(), "ghost".into()])
        }

        fn member(&self, name: &str) -> EngineResult<ArtifactRef> {
            match name {
                "real" => Ok(Artifact::from_bytes("real", b"1".to_vec())),
                _ => Err(EngineError::MemberNotFound {
                    container: "haunted".into(),
                    name: name.into(),
                }),
            }
        }
    }

    #[test]
    fn unfetchable_member_is_skipped() {
        let container = Haunted {
            source: Artifact::from_bytes("haunted", Vec::new()),
        };
        let members = container.members().unwrap();
        assert_eq!(members.keys().collect::<Vec<_>>(), vec!["real"]);
    }

    #[test]
    fn duplicate_names_keep_first_occurrence() {
        let archive = Artifact::from_bytes(
            "lib.a",
            ar_archive(&[("x.o", b"first"), ("y.o", b"y"), ("x.o", b"second")]),
        );
        let container = as_container(&archive).unwrap();
        assert_eq!(container.all_members().unwrap().len(), 3);

        let members = container.members().unwrap();
        assert_eq!(members.keys().collect::<Vec<_>>(), vec!["x.o", "y.o"]);
        assert_eq!(&*members["x.o"].read_bytes().unwrap(), b"first");
    }
}
