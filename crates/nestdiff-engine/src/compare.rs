//! The recursive comparison driver.
//!
//! [`Comparator::compare`] specializes both sides, pairs container members,
//! recurses into every pair and assembles the [`Difference`] tree. Recoverable
//! failures are recorded on the node where they happened and the walk goes
//! on; only an abort (explicit, or the report budget running out) stops it,
//! in which case the tree built so far is returned with every unfinished
//! ancestor marked as truncated.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use nestdiff_diff::diff_text;
use nestdiff_types::{AbortSignal, CompareConfig, Difference, Incomplete, IncompleteKind};
use tracing::{debug, info, warn};

use crate::artifact::{Artifact, ArtifactRef};
use crate::container::{as_container, Container};
use crate::error::EngineError;
use crate::fuzzy::{ContentSimilarity, Similarity};
use crate::leaf::{ContentDiff, LeafComparator, ToolDiff};
use crate::pairing::{comparisons, MatchOptions};
use crate::progress::{Progress, ProgressSink};
use crate::specialize::{specialize, ArtifactKind};

/// Label of the member-listing child node of a container pair.
pub const FILE_LIST_LABEL: &str = "file list";

/// The result of a comparison run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompareOutcome {
    /// The difference tree, `None` when the inputs are equivalent.
    pub difference: Option<Difference>,
    /// Why the run stopped early, if it did.
    pub aborted: Option<String>,
}

impl CompareOutcome {
    pub fn has_differences(&self) -> bool {
        self.difference.is_some()
    }

    pub fn is_truncated(&self) -> bool {
        self.aborted.is_some()
    }
}

/// An abort unwinding the walk, carrying the partial tree of the level it
/// left.
struct Interrupted {
    reason: String,
    partial: Option<Difference>,
}

type Walk<T> = Result<T, Interrupted>;

/// Configured comparison engine.
///
/// ```no_run
/// use nestdiff_engine::Comparator;
/// use nestdiff_types::CompareConfig;
///
/// let outcome = Comparator::new(CompareConfig::default())
///     .compare_paths("old.deb".as_ref(), "new.deb".as_ref());
/// println!("{}", outcome.has_differences());
/// ```
pub struct Comparator {
    config: CompareConfig,
    similarity: Arc<dyn Similarity>,
    content: Arc<dyn LeafComparator>,
    details: Vec<Arc<dyn LeafComparator>>,
    progress: Progress,
    abort: AbortSignal,
    emitted: AtomicU64,
}

impl Comparator {
    pub fn new(config: CompareConfig) -> Self {
        Self {
            similarity: Arc::new(ContentSimilarity::new(config.fuzzy_max_bytes)),
            content: Arc::new(ContentDiff),
            details: vec![Arc::new(ToolDiff::nm_symbol_table())],
            progress: Progress::silent(),
            abort: AbortSignal::new(),
            emitted: AtomicU64::new(0),
            config,
        }
    }

    /// Replace the scoring function used for fuzzy matching.
    pub fn with_similarity(mut self, similarity: Arc<dyn Similarity>) -> Self {
        self.similarity = similarity;
        self
    }

    /// Replace the raw-content comparator.
    pub fn with_content_diff(mut self, content: Arc<dyn LeafComparator>) -> Self {
        self.content = content;
        self
    }

    /// Replace the detail comparators run alongside the content diff.
    pub fn with_details(mut self, details: Vec<Arc<dyn LeafComparator>>) -> Self {
        self.details = details;
        self
    }

    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Progress::new(sink);
        self
    }

    /// Share an externally owned abort signal.
    pub fn with_abort_signal(mut self, abort: AbortSignal) -> Self {
        self.abort = abort;
        self
    }

    pub fn config(&self) -> &CompareConfig {
        &self.config
    }

    pub fn abort_signal(&self) -> &AbortSignal {
        &self.abort
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    /// Compare two filesystem paths.
    pub fn compare_paths(&self, ours: &Path, theirs: &Path) -> CompareOutcome {
        self.compare(Artifact::from_path(ours), Artifact::from_path(theirs))
    }

    /// Compare two artifacts and build the difference tree.
    pub fn compare(&self, ours: ArtifactRef, theirs: ArtifactRef) -> CompareOutcome {
        info!(ours = ours.name(), theirs = theirs.name(), "comparing");
        let outcome = match self.compare_pair(&ours, &theirs, None, 0) {
            Ok(difference) => match self.abort.reason() {
                // The budget ran out on the very last node written.
                Some(reason) if self.abort.is_triggered() => CompareOutcome {
                    difference: difference.map(|mut d| {
                        d.mark_incomplete(truncated(reason));
                        d
                    }),
                    aborted: Some(reason.to_string()),
                },
                _ => CompareOutcome {
                    difference,
                    aborted: None,
                },
            },
            Err(interrupted) => {
                warn!(reason = %interrupted.reason, "comparison stopped early");
                CompareOutcome {
                    difference: interrupted.partial,
                    aborted: Some(interrupted.reason),
                }
            }
        };
        info!(
            differences = outcome.has_differences(),
            nodes = outcome.difference.as_ref().map_or(0, Difference::node_count),
            truncated = outcome.is_truncated(),
            "comparison finished"
        );
        outcome
    }

    fn compare_pair(
        &self,
        ours: &ArtifactRef,
        theirs: &ArtifactRef,
        comment: Option<String>,
        depth: usize,
    ) -> Walk<Option<Difference>> {
        match self.compare_artifacts(ours, theirs, depth) {
            Ok(mut node) => {
                if let Some(comment) = comment {
                    // A fuzzy pairing is reported even when the contents turn out equal.
                    node.get_or_insert_with(|| Difference::new(ours.name(), theirs.name()))
                        .add_comment(comment);
                }
                Ok(node)
            }
            Err(mut interrupted) => {
                if let (Some(partial), Some(comment)) = (interrupted.partial.as_mut(), comment) {
                    partial.add_comment(comment);
                }
                Err(interrupted)
            }
        }
    }

    fn compare_artifacts(
        &self,
        ours: &ArtifactRef,
        theirs: &ArtifactRef,
        depth: usize,
    ) -> Walk<Option<Difference>> {
        if self.abort.is_triggered() {
            return Err(Interrupted {
                reason: self.abort_reason(),
                partial: None,
            });
        }

        let ours_kind = specialize(ours);
        let theirs_kind = specialize(theirs);
        if self.identical(ours, theirs, ours_kind, theirs_kind) {
            debug!(ours = ours.name(), theirs = theirs.name(), "identical content");
            return Ok(None);
        }

        let mut node = Difference::new(ours.name(), theirs.name());
        if depth > self.config.max_depth {
            let err = EngineError::MaxDepthExceeded {
                limit: self.config.max_depth,
            };
            self.record(&mut node, err)
                .map_err(|reason| interrupt(node.clone(), reason))?;
            return Ok(Some(node));
        }

        let node = match (as_container(ours), as_container(theirs)) {
            (Some(a), Some(b)) => self.compare_containers(node, a.as_ref(), b.as_ref(), depth)?,
            _ => {
                if let Err(reason) =
                    self.compare_leaves(&mut node, ours, theirs, ours_kind, theirs_kind)
                {
                    return Err(interrupt(node, reason));
                }
                node
            }
        };
        Ok(node.into_non_empty())
    }

    // Fast path: same kind, same length, same digest. Directories and links
    // always take the full path.
    fn identical(
        &self,
        ours: &Artifact,
        theirs: &Artifact,
        ours_kind: ArtifactKind,
        theirs_kind: ArtifactKind,
    ) -> bool {
        if ours.is_missing()
            || theirs.is_missing()
            || ours_kind != theirs_kind
            || matches!(ours_kind, ArtifactKind::Directory | ArtifactKind::Symlink)
        {
            return false;
        }
        match (ours.byte_length(), theirs.byte_length()) {
            (Ok(a), Ok(b)) if a == b => {}
            _ => return false,
        }
        matches!(
            (ours.content_hash(), theirs.content_hash()),
            (Ok(a), Ok(b)) if a == b
        )
    }

    fn compare_containers(
        &self,
        mut node: Difference,
        ours: &dyn Container,
        theirs: &dyn Container,
        depth: usize,
    ) -> Walk<Difference> {
        let both_present = !ours.source().is_missing() && !theirs.source().is_missing();
        if both_present {
            if let Err(reason) = self.file_list(&mut node, ours, theirs) {
                return Err(interrupt(node, reason));
            }
            if let Err(reason) = self.run_details(&mut node, ours.source(), theirs.source()) {
                return Err(interrupt(node, reason));
            }
        }

        let options = MatchOptions {
            include_added_removed: self.config.include_added_removed,
            fuzzy_threshold: if self.config.fuzzy_enabled() {
                self.config.fuzzy_threshold
            } else {
                0.0
            },
            max_depth: self.config.max_depth,
            similarity: self.similarity.as_ref(),
            progress: &self.progress,
            abort: &self.abort,
        };
        let pairs = match comparisons(ours, theirs, &options) {
            Ok(pairs) => pairs,
            Err(err) => {
                if let Err(reason) = self.record(&mut node, err) {
                    return Err(interrupt(node, reason));
                }
                return Ok(node);
            }
        };
        debug!(
            ours = ours.source().name(),
            theirs = theirs.source().name(),
            pairs = pairs.len(),
            depth,
            "descending"
        );

        for pair in pairs {
            match self.compare_pair(&pair.ours, &pair.theirs, pair.comment, depth + 1) {
                Ok(Some(child)) => node.add_detail(child),
                Ok(None) => {}
                Err(mut interrupted) => {
                    if let Some(partial) = interrupted.partial.take() {
                        node.add_detail(partial);
                    }
                    interrupted.partial = Some(mark_truncated(node, &interrupted.reason));
                    return Err(interrupted);
                }
            }
        }
        Ok(node)
    }

    fn file_list(
        &self,
        node: &mut Difference,
        ours: &dyn Container,
        theirs: &dyn Container,
    ) -> Result<(), String> {
        let listing = ours
            .member_names_nested()
            .and_then(|a| theirs.member_names_nested().map(|b| (a, b)));
        match listing {
            Ok((a, b)) => {
                let text = diff_text(&join_lines(&a), &join_lines(&b))
                    .to_unified(ours.source().name(), theirs.source().name());
                if !text.is_empty() {
                    self.account(text.len());
                    node.add_detail(Difference::with_diff(FILE_LIST_LABEL, FILE_LIST_LABEL, text));
                }
                Ok(())
            }
            Err(err) => self.record(node, err),
        }
    }

    fn compare_leaves(
        &self,
        node: &mut Difference,
        ours: &Artifact,
        theirs: &Artifact,
        ours_kind: ArtifactKind,
        theirs_kind: ArtifactKind,
    ) -> Result<(), String> {
        if ours_kind != theirs_kind && !ours.is_missing() && !theirs.is_missing() {
            node.add_comment(format!("Type mismatch: {ours_kind} vs {theirs_kind}"));
        }
        if !self.content.applies_to(ours_kind) || !self.content.applies_to(theirs_kind) {
            return Ok(());
        }
        match self.content.diff(ours, theirs, &self.abort) {
            Ok(text) => {
                self.account(text.len());
                node.unified_diff = text;
            }
            Err(err) => self.record(node, err)?,
        }
        if !ours.is_missing() && !theirs.is_missing() {
            self.run_details(node, ours, theirs)?;
        }
        Ok(())
    }

    fn run_details(
        &self,
        node: &mut Difference,
        ours: &Artifact,
        theirs: &Artifact,
    ) -> Result<(), String> {
        let (ours_kind, theirs_kind) = (specialize(ours), specialize(theirs));
        for detail in &self.details {
            if !detail.applies_to(ours_kind) || !detail.applies_to(theirs_kind) {
                continue;
            }
            let mut child = Difference::new(
                format!("{} {}", detail.label(), ours.name()),
                format!("{} {}", detail.label(), theirs.name()),
            );
            match detail.diff(ours, theirs, &self.abort) {
                Ok(text) => {
                    self.account(text.len());
                    child.unified_diff = text;
                }
                Err(err) => self.record(&mut child, err)?,
            }
            node.add_detail(child);
        }
        Ok(())
    }

    /// Record a recoverable error on `node`; hand back the reason of a fatal
    /// one.
    fn record(&self, node: &mut Difference, err: EngineError) -> Result<(), String> {
        if let EngineError::Aborted { reason } = err {
            return Err(reason);
        }
        warn!(
            source1 = %node.source1,
            source2 = %node.source2,
            error = %err,
            "comparison incomplete"
        );
        node.mark_incomplete(Incomplete::new(err.incomplete_kind(), err.to_string()));
        Ok(())
    }

    // Counts emitted diff text against the report budget and fires the abort
    // signal once it is exhausted.
    fn account(&self, bytes: usize) {
        let Some(limit) = self.config.max_report_size else {
            return;
        };
        let bytes = bytes as u64;
        let total = self.emitted.fetch_add(bytes, Ordering::SeqCst) + bytes;
        if total > limit && !self.abort.is_triggered() {
            info!(limit, total, "report size limit reached");
            self.abort
                .trigger(format!("report size limit of {limit} bytes exceeded"));
        }
    }

    fn abort_reason(&self) -> String {
        self.abort.reason().unwrap_or("aborted").to_string()
    }
}

fn interrupt(node: Difference, reason: String) -> Interrupted {
    Interrupted {
        partial: Some(mark_truncated(node, &reason)),
        reason,
    }
}

fn mark_truncated(mut node: Difference, reason: &str) -> Difference {
    node.mark_incomplete(truncated(reason));
    node
}

fn truncated(reason: &str) -> Incomplete {
    Incomplete::new(IncompleteKind::Truncated, reason)
}

fn join_lines(names: &[String]) -> String {
    names.iter().map(|n| format!("{n}\n")).collect()
}
