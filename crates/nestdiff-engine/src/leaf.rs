//! Leaf comparators: producing diff text for a pair of artifacts.
//!
//! [`ContentDiff`] is the built-in comparator for raw content. Detail
//! comparators such as [`ToolDiff::nm_symbol_table`] add extra child nodes
//! for kinds where an external tool can say more than the bytes do.

use std::fs;
use std::sync::Arc;

use nestdiff_diff::{diff_blobs, diff_text, hexdump, ToolCommand};
use nestdiff_types::AbortSignal;
use tracing::debug;

use crate::artifact::Artifact;
use crate::error::{EngineError, EngineResult};
use crate::specialize::{specialize, ArtifactKind};

/// Produces a unified diff for two artifacts. Empty output means "no
/// difference".
pub trait LeafComparator: Send + Sync {
    /// Short name shown in the difference tree.
    fn label(&self) -> &str;

    /// Whether this comparator handles artifacts of `kind`.
    fn applies_to(&self, kind: ArtifactKind) -> bool;

    fn diff(&self, ours: &Artifact, theirs: &Artifact, abort: &AbortSignal)
        -> EngineResult<String>;
}

/// Line diff of the raw content; binary content is compared as hexdump and
/// symlinks by their target.
#[derive(Clone, Copy, Debug, Default)]
pub struct ContentDiff;

impl LeafComparator for ContentDiff {
    fn label(&self) -> &str {
        "content"
    }

    fn applies_to(&self, kind: ArtifactKind) -> bool {
        kind != ArtifactKind::Directory
    }

    fn diff(
        &self,
        ours: &Artifact,
        theirs: &Artifact,
        abort: &AbortSignal,
    ) -> EngineResult<String> {
        if abort.is_triggered() {
            return Err(EngineError::aborted(abort));
        }
        let old = leaf_content(ours)?;
        let new = leaf_content(theirs)?;
        let binary = [ours, theirs]
            .iter()
            .any(|a| specialize(a) == ArtifactKind::Binary);
        let diff = if binary {
            diff_text(&hexdump(&old), &hexdump(&new))
        } else {
            diff_blobs(&old, &new)
        };
        Ok(diff.to_unified(ours.name(), theirs.name()))
    }
}

fn leaf_content(artifact: &Artifact) -> EngineResult<Arc<[u8]>> {
    if let (ArtifactKind::Symlink, Some(path)) = (specialize(artifact), artifact.path()) {
        let target = fs::read_link(path).map_err(|e| EngineError::io(artifact.name(), e))?;
        return Ok(Arc::from(
            format!("destination: {}\n", target.display()).into_bytes(),
        ));
    }
    artifact.read_bytes()
}

/// Runs an external tool on both sides and diffs its output.
///
/// Each side is materialized to disk first; the temporary path is replaced
/// by the artifact's display name in the output so the two runs line up.
#[derive(Clone, Debug)]
pub struct ToolDiff {
    label: String,
    program: String,
    args: Vec<String>,
    kinds: Vec<ArtifactKind>,
}

impl ToolDiff {
    pub fn new(
        program: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
        kinds: impl IntoIterator<Item = ArtifactKind>,
    ) -> Self {
        let program = program.into();
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let label = std::iter::once(program.clone())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            label,
            program,
            args,
            kinds: kinds.into_iter().collect(),
        }
    }

    /// `nm -s` on archives: the symbol index and per-member symbols.
    pub fn nm_symbol_table() -> Self {
        Self::new("nm", ["-s"], [ArtifactKind::ArArchive])
    }

    /// Swap the program while keeping arguments and kinds.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        let old = std::mem::replace(&mut self.program, program.into());
        self.label = self.label.replacen(&old, &self.program, 1);
        self
    }

    fn output(&self, artifact: &Artifact, abort: &AbortSignal) -> EngineResult<String> {
        let materialized = artifact.materialize()?;
        let command = self
            .args
            .iter()
            .fold(ToolCommand::new(&self.program), |cmd, arg| cmd.arg(arg))
            .arg(materialized.path());
        debug!(command = %command.display(), artifact = artifact.name(), "running tool");
        let stdout = command.run(abort)?;
        let text = String::from_utf8_lossy(&stdout);
        let path = materialized.path().display().to_string();
        Ok(text.replace(&path, artifact.name()))
    }
}

impl LeafComparator for ToolDiff {
    fn label(&self) -> &str {
        &self.label
    }

    fn applies_to(&self, kind: ArtifactKind) -> bool {
        self.kinds.contains(&kind)
    }

    fn diff(
        &self,
        ours: &Artifact,
        theirs: &Artifact,
        abort: &AbortSignal,
    ) -> EngineResult<String> {
        let old = self.output(ours, abort)?;
        let new = self.output(theirs, abort)?;
        Ok(diff_text(&old, &new).to_unified(ours.name(), theirs.name()))
    }
}
