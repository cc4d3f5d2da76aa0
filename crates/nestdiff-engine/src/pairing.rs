//! Member pairing: deciding which member of one container is compared with
//! which member of the other.
//!
//! Pairs come out in a fixed order: exact name matches in the order of the
//! first container, then fuzzy matches best score first, then (when enabled)
//! members only one side has: removed ones in the first container's order,
//! added ones in the second's. Every member appears in at most one pair.

use std::sync::Arc;

use nestdiff_types::AbortSignal;
use tracing::debug;

use crate::artifact::{Artifact, ArtifactRef};
use crate::container::{innermost, Container, Members};
use crate::error::{EngineError, EngineResult};
use crate::fuzzy::{perform_fuzzy_matching, Similarity};
use crate::progress::Progress;

/// How a pair came about.
#[derive(Clone, Debug, PartialEq)]
pub enum PairingKind {
    /// Both containers transparently wrap a single sub-container.
    Nested,
    /// Same member name on both sides.
    Exact,
    /// Different names, similar content.
    Fuzzy { score: f64 },
    /// Only in the first container; the second side is missing.
    Removed,
    /// Only in the second container; the first side is missing.
    Added,
}

/// One pair of artifacts to compare.
#[derive(Clone, Debug)]
pub struct Comparison {
    pub ours: ArtifactRef,
    pub theirs: ArtifactRef,
    pub comment: Option<String>,
    pub kind: PairingKind,
}

impl Comparison {
    fn new(ours: ArtifactRef, theirs: ArtifactRef, kind: PairingKind) -> Self {
        Self {
            ours,
            theirs,
            comment: None,
            kind,
        }
    }
}

/// Knobs and shared run state for [`comparisons`].
pub struct MatchOptions<'a> {
    pub include_added_removed: bool,
    /// Minimum fuzzy score; `0.0` disables fuzzy matching.
    pub fuzzy_threshold: f64,
    pub max_depth: usize,
    pub similarity: &'a dyn Similarity,
    pub progress: &'a Progress,
    pub abort: &'a AbortSignal,
}

/// Pair the members of two containers.
pub fn comparisons(
    ours: &dyn Container,
    theirs: &dyn Container,
    opts: &MatchOptions<'_>,
) -> EngineResult<Vec<Comparison>> {
    let ours_nested = ours.nested_container()?;
    let theirs_nested = theirs.nested_container()?;
    if let (Some(a), Some(b)) = (&ours_nested, &theirs_nested) {
        debug!(
            ours = a.source().name(),
            theirs = b.source().name(),
            "pairing nested containers"
        );
        return Ok(vec![Comparison::new(
            Arc::clone(a.source()),
            Arc::clone(b.source()),
            PairingKind::Nested,
        )]);
    }

    // A wrapper on one side only is unwrapped so its content lines up with
    // the other side's members.
    let ours_members = members_of(ours, ours_nested, opts.max_depth)?;
    let theirs_members = members_of(theirs, theirs_nested, opts.max_depth)?;

    let total = ours_members.len().max(theirs_members.len()) as u64;
    let mut scope = opts.progress.scope(total);
    let mut pairs = Vec::new();

    let mut theirs_taken = vec![false; theirs_members.len()];
    let mut ours_rest = Members::new();
    for (name, member) in ours_members {
        if opts.abort.is_triggered() {
            return Err(EngineError::aborted(opts.abort));
        }
        match theirs_members.get_full(&name) {
            Some((index, _, other)) => {
                theirs_taken[index] = true;
                scope.step(1, &name);
                pairs.push(Comparison::new(member, Arc::clone(other), PairingKind::Exact));
            }
            None => {
                ours_rest.insert(name, member);
            }
        }
    }
    let theirs_rest: Members = theirs_members
        .into_iter()
        .zip(theirs_taken)
        .filter(|(_, taken)| !taken)
        .map(|(entry, _)| entry)
        .collect();

    let mut ours_fuzzy = vec![false; ours_rest.len()];
    let mut theirs_fuzzy = vec![false; theirs_rest.len()];
    if opts.fuzzy_threshold > 0.0 && !ours_rest.is_empty() && !theirs_rest.is_empty() {
        let matches = perform_fuzzy_matching(
            &ours_rest,
            &theirs_rest,
            opts.fuzzy_threshold,
            opts.similarity,
            opts.abort,
        )?;
        for m in matches {
            let (Some((ours_name, ours_member)), Some((_, theirs_member))) =
                (ours_rest.get_index(m.ours), theirs_rest.get_index(m.theirs))
            else {
                continue;
            };
            ours_fuzzy[m.ours] = true;
            theirs_fuzzy[m.theirs] = true;
            scope.step(2, ours_name);
            pairs.push(Comparison {
                comment: Some(format!(
                    "Files similar despite different names (similarity score: {:.2})",
                    m.score
                )),
                ..Comparison::new(
                    Arc::clone(ours_member),
                    Arc::clone(theirs_member),
                    PairingKind::Fuzzy { score: m.score },
                )
            });
        }
    }

    let ours_only = ours_rest
        .into_iter()
        .zip(ours_fuzzy)
        .filter(|(_, used)| !used)
        .map(|(entry, _)| entry);
    let theirs_only = theirs_rest
        .into_iter()
        .zip(theirs_fuzzy)
        .filter(|(_, used)| !used)
        .map(|(entry, _)| entry);

    if opts.include_added_removed {
        for (name, member) in ours_only {
            scope.step(1, &name);
            let missing = Artifact::missing(Arc::clone(&member));
            pairs.push(Comparison::new(member, missing, PairingKind::Removed));
        }
        for (name, member) in theirs_only {
            scope.step(1, &name);
            let missing = Artifact::missing(Arc::clone(&member));
            pairs.push(Comparison::new(missing, member, PairingKind::Added));
        }
    } else {
        let skipped = ours_only.count() + theirs_only.count();
        if skipped > 0 {
            debug!(skipped, "not comparing members present on one side only");
        }
    }

    Ok(pairs)
}

fn members_of(
    container: &dyn Container,
    nested: Option<Arc<dyn Container>>,
    max_depth: usize,
) -> EngineResult<Members> {
    match nested {
        Some(first) => innermost(first, max_depth)?.members(),
        None => container.members(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use super::*;
    use crate::container::as_container;
    use crate::fixtures::{ar_archive, zstd_compress};
    use crate::fuzzy::ContentSimilarity;

    struct Fixture {
        similarity: ContentSimilarity,
        progress: Progress,
        abort: AbortSignal,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                similarity: ContentSimilarity::new(1 << 20),
                progress: Progress::silent(),
                abort: AbortSignal::new(),
            }
        }

        fn options(&self, include_added_removed: bool, fuzzy_threshold: f64) -> MatchOptions<'_> {
            MatchOptions {
                include_added_removed,
                fuzzy_threshold,
                max_depth: 16,
                similarity: &self.similarity,
                progress: &self.progress,
                abort: &self.abort,
            }
        }
    }

    fn archive(name: &str, members: &[(&str, &[u8])]) -> Arc<dyn Container> {
        as_container(&Artifact::from_bytes(name, ar_archive(members))).unwrap()
    }

    fn names(pairs: &[Comparison]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|p| (p.ours.name().to_string(), p.theirs.name().to_string()))
            .collect()
    }

    #[test]
    fn exact_matches_follow_first_container_order() {
        let a = archive("a.a", &[("c.o", b"1"), ("a.o", b"2"), ("b.o", b"3")]);
        let b = archive("b.a", &[("a.o", b"2"), ("b.o", b"x"), ("c.o", b"1")]);
        let fx = Fixture::new();
        let pairs = comparisons(a.as_ref(), b.as_ref(), &fx.options(false, 0.0)).unwrap();
        assert_eq!(
            names(&pairs),
            vec![
                ("c.o".into(), "c.o".into()),
                ("a.o".into(), "a.o".into()),
                ("b.o".into(), "b.o".into()),
            ]
        );
        assert!(pairs.iter().all(|p| p.kind == PairingKind::Exact));
    }

    #[test]
    fn renamed_member_is_fuzzy_matched_then_leftovers_reported() {
        let body: Vec<u8> = (0..40).flat_map(|i| format!("row {i}\n").into_bytes()).collect();
        let mut edited = body.clone();
        edited.extend_from_slice(b"row 40\n");
        let a = archive("a.a", &[("keep.o", b"k"), ("old.o", body.as_slice()), ("gone.o", b"\x00\x01")]);
        let b = archive("b.a", &[("keep.o", b"k"), ("new.o", edited.as_slice()), ("fresh.o", b"\x07")]);

        let fx = Fixture::new();
        let pairs = comparisons(a.as_ref(), b.as_ref(), &fx.options(true, 0.75)).unwrap();
        assert_eq!(
            names(&pairs),
            vec![
                ("keep.o".into(), "keep.o".into()),
                ("old.o".into(), "new.o".into()),
                ("gone.o".into(), "/dev/null".into()),
                ("/dev/null".into(), "fresh.o".into()),
            ]
        );
        assert!(matches!(pairs[1].kind, PairingKind::Fuzzy { .. }));
        assert!(pairs[1]
            .comment
            .as_deref()
            .unwrap()
            .starts_with("Files similar despite different names (similarity score: 0.9"));
        assert_eq!(pairs[2].kind, PairingKind::Removed);
        assert_eq!(pairs[3].kind, PairingKind::Added);
    }

    #[test]
    fn identical_content_under_new_name_pairs_fully() {
        let a = archive("a.a", &[("a.txt", b"hello"), ("b.txt", b"world")]);
        let b = archive("b.a", &[("a.txt", b"hello"), ("c.txt", b"world")]);
        let fx = Fixture::new();
        let pairs = comparisons(a.as_ref(), b.as_ref(), &fx.options(true, 0.1)).unwrap();
        assert_eq!(
            names(&pairs),
            vec![("a.txt".into(), "a.txt".into()), ("b.txt".into(), "c.txt".into())]
        );
        assert_eq!(pairs[0].kind, PairingKind::Exact);
        assert_eq!(pairs[1].kind, PairingKind::Fuzzy { score: 1.0 });
        assert_eq!(
            pairs[1].comment.as_deref(),
            Some("Files similar despite different names (similarity score: 1.00)")
        );
    }

    #[test]
    fn duplicate_member_pairs_by_first_occurrence() {
        let a = archive("a.a", &[("x.o", b"first"), ("x.o", b"second")]);
        let b = archive("b.a", &[("x.o", b"other")]);
        let fx = Fixture::new();
        let pairs = comparisons(a.as_ref(), b.as_ref(), &fx.options(true, 0.75)).unwrap();
        assert_eq!(names(&pairs), vec![("x.o".into(), "x.o".into())]);
        assert_eq!(&*pairs[0].ours.read_bytes().unwrap(), b"first");
    }

    #[test]
    fn one_sided_members_dropped_unless_requested() {
        let a = archive("a.a", &[("x.o", b"1")]);
        let b = archive("b.a", &[("y.o", b"\x00")]);
        let fx = Fixture::new();
        assert!(comparisons(a.as_ref(), b.as_ref(), &fx.options(false, 0.75))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn both_nested_pair_the_inner_containers() {
        let a = as_container(&Artifact::from_bytes(
            "lib.a.zst",
            zstd_compress(&ar_archive(&[("x.o", b"1")])),
        ))
        .unwrap();
        let b = as_container(&Artifact::from_bytes(
            "lib.a.zst",
            zstd_compress(&ar_archive(&[("x.o", b"2")])),
        ))
        .unwrap();
        let fx = Fixture::new();
        let pairs = comparisons(a.as_ref(), b.as_ref(), &fx.options(true, 0.75)).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].kind, PairingKind::Nested);
        assert_eq!(pairs[0].ours.name(), "lib.a");
    }

    #[test]
    fn one_sided_wrapper_is_unwrapped() {
        let double = zstd_compress(&zstd_compress(&ar_archive(&[("x.o", b"1"), ("y.o", b"2")])));
        let wrapped = as_container(&Artifact::from_bytes("lib.a.zst.zst", double)).unwrap();
        let plain = archive("lib.a", &[("y.o", b"2"), ("x.o", b"1")]);

        let fx = Fixture::new();
        let pairs = comparisons(wrapped.as_ref(), plain.as_ref(), &fx.options(true, 0.75)).unwrap();
        assert_eq!(
            names(&pairs),
            vec![("x.o".into(), "x.o".into()), ("y.o".into(), "y.o".into())]
        );
    }

    #[test]
    fn progress_completes_for_each_pairing() {
        let a = archive("a.a", &[("x.o", b"1"), ("y.o", b"2"), ("z.o", b"3")]);
        let b = archive("b.a", &[("x.o", b"1")]);
        let fx = Fixture::new();
        comparisons(a.as_ref(), b.as_ref(), &fx.options(false, 0.0)).unwrap();
        assert_eq!(fx.progress.done(), fx.progress.total());
        assert_eq!(fx.progress.total(), 3);
    }

    #[test]
    fn aborted_run_stops_pairing() {
        let a = archive("a.a", &[("x.o", b"1")]);
        let b = archive("b.a", &[("x.o", b"1")]);
        let fx = Fixture::new();
        fx.abort.trigger("stop");
        let err = comparisons(a.as_ref(), b.as_ref(), &fx.options(false, 0.0)).unwrap_err();
        assert!(err.is_fatal());
    }

    fn member_set() -> impl Strategy<Value = Vec<(String, Vec<u8>)>> {
        prop::collection::btree_map("[a-f]{1,3}", prop::collection::vec(any::<u8>(), 0..24), 0..8)
            .prop_map(|m| m.into_iter().collect())
    }

    proptest! {
        #[test]
        fn every_member_paired_at_most_once(
            ours in member_set(),
            theirs in member_set(),
            threshold in prop_oneof![Just(0.0), 0.3f64..1.0],
        ) {
            let build = |name: &str, members: &[(String, Vec<u8>)]| {
                let borrowed: Vec<(&str, &[u8])> =
                    members.iter().map(|(n, d)| (n.as_str(), d.as_slice())).collect();
                archive(name, &borrowed)
            };
            let a = build("a.a", &ours);
            let b = build("b.a", &theirs);

            let fx = Fixture::new();
            let pairs = comparisons(a.as_ref(), b.as_ref(), &fx.options(true, threshold)).unwrap();

            let mut seen_ours = HashSet::new();
            let mut seen_theirs = HashSet::new();
            for pair in &pairs {
                match pair.kind {
                    PairingKind::Added => {}
                    _ => prop_assert!(seen_ours.insert(pair.ours.name().to_string())),
                }
                match pair.kind {
                    PairingKind::Removed => {}
                    _ => prop_assert!(seen_theirs.insert(pair.theirs.name().to_string())),
                }
                if pair.kind == PairingKind::Exact {
                    prop_assert_eq!(pair.ours.name(), pair.theirs.name());
                }
            }
            // With added/removed enabled every member shows up exactly once.
            prop_assert_eq!(seen_ours.len(), ours.len());
            prop_assert_eq!(seen_theirs.len(), theirs.len());
        }
    }
}
