//! Fuzzy matching: pairing members whose names differ but whose content is
//! alike.

use std::time::{Duration, Instant};

use nestdiff_diff::{content_similarity, Fingerprint};
use nestdiff_types::AbortSignal;
use tracing::{debug, warn};

use crate::artifact::Artifact;
use crate::container::Members;
use crate::error::{EngineError, EngineResult};
use crate::specialize::{specialize, ArtifactKind};

/// Wall-clock budget for exact scoring within one container pair. Once it is
/// spent only byte-identical members are still paired.
pub const EXACT_SCORING_BUDGET: Duration = Duration::from_secs(10);

/// Scores how alike two artifacts are, in `[0, 1]`.
///
/// Members are fingerprinted once before the cross product. Pairs whose
/// [`estimate`](Self::estimate) falls below the threshold are never passed to
/// [`score`](Self::score).
pub trait Similarity: Send + Sync {
    /// Summarize one member. `None` when it cannot be scored (directories,
    /// oversized input, unreadable content).
    fn fingerprint(&self, artifact: &Artifact) -> Option<Fingerprint>;

    /// Cheap estimate from two fingerprints, at least the value of `score`
    /// for any pair worth pairing.
    fn estimate(&self, ours: &Fingerprint, theirs: &Fingerprint) -> f64;

    /// Full score of two fingerprinted artifacts.
    fn score(&self, ours: &Artifact, theirs: &Artifact) -> Option<f64>;
}

/// Content-based similarity over the raw bytes of both artifacts.
///
/// Identical content scores 1.0 by BLAKE3 digest; everything else goes
/// through a line or byte diff ratio.
#[derive(Clone, Copy, Debug)]
pub struct ContentSimilarity {
    max_bytes: u64,
}

/// Headroom over the sketch estimate, covering sampling error and the gap
/// between shingle overlap and byte diff ratio.
const SKETCH_SLACK: f64 = 0.25;

/// Absorbs the `f32` rounding of diff ratios.
const BOUND_SLACK: f64 = 1e-6;

impl ContentSimilarity {
    /// Artifacts larger than `max_bytes` are not scored.
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    fn scorable(&self, artifact: &Artifact) -> bool {
        !artifact.is_missing()
            && specialize(artifact) != ArtifactKind::Directory
            && artifact
                .byte_length()
                .is_ok_and(|len| len <= self.max_bytes)
    }
}

impl Similarity for ContentSimilarity {
    fn fingerprint(&self, artifact: &Artifact) -> Option<Fingerprint> {
        if !self.scorable(artifact) {
            return None;
        }
        match artifact.read_bytes() {
            Ok(bytes) => Some(Fingerprint::of(&bytes)),
            Err(err) => {
                debug!(member = artifact.name(), %err, "not fuzzy matching unreadable member");
                None
            }
        }
    }

    fn estimate(&self, ours: &Fingerprint, theirs: &Fingerprint) -> f64 {
        let bound = ours.upper_bound(theirs) + BOUND_SLACK;
        match ours.resemblance(theirs) {
            Some(resemblance) => {
                let dice = 2.0 * resemblance / (1.0 + resemblance);
                bound.min(dice + SKETCH_SLACK)
            }
            None => bound,
        }
    }

    fn score(&self, ours: &Artifact, theirs: &Artifact) -> Option<f64> {
        if ours.content_hash().ok()? == theirs.content_hash().ok()? {
            return Some(1.0);
        }
        let (a, b) = (ours.read_bytes().ok()?, theirs.read_bytes().ok()?);
        Some(content_similarity(&a, &b))
    }
}

/// One fuzzy pairing, by position in the two residual member maps.
#[derive(Clone, Debug, PartialEq)]
pub struct FuzzyMatch {
    pub ours: usize,
    pub theirs: usize,
    pub score: f64,
}

/// Greedily pair members of `ours` and `theirs` scoring at least `threshold`.
///
/// Candidates are taken best score first, ties broken by position in `ours`
/// and then in `theirs`, so the result is deterministic. Each member is used
/// at most once.
pub fn perform_fuzzy_matching(
    ours: &Members,
    theirs: &Members,
    threshold: f64,
    similarity: &dyn Similarity,
    abort: &AbortSignal,
) -> EngineResult<Vec<FuzzyMatch>> {
    match_within(ours, theirs, threshold, similarity, abort, EXACT_SCORING_BUDGET)
}

fn match_within(
    ours: &Members,
    theirs: &Members,
    threshold: f64,
    similarity: &dyn Similarity,
    abort: &AbortSignal,
    budget: Duration,
) -> EngineResult<Vec<FuzzyMatch>> {
    let ours_prints = fingerprints(ours, similarity, abort)?;
    let theirs_prints = fingerprints(theirs, similarity, abort)?;
    let deadline = Instant::now() + budget;
    let mut over_budget = false;
    let mut rejected = 0usize;

    let mut candidates = Vec::new();
    for (oi, (ours_member, ours_print)) in ours.values().zip(&ours_prints).enumerate() {
        if abort.is_triggered() {
            return Err(EngineError::aborted(abort));
        }
        let Some(ours_print) = ours_print else {
            continue;
        };
        for (ti, (theirs_member, theirs_print)) in theirs.values().zip(&theirs_prints).enumerate() {
            let Some(theirs_print) = theirs_print else {
                continue;
            };
            let score = if ours_print.digest() == theirs_print.digest() {
                Some(1.0)
            } else if similarity.estimate(ours_print, theirs_print) < threshold {
                rejected += 1;
                None
            } else if over_budget || Instant::now() >= deadline {
                if !over_budget {
                    warn!(
                        budget_ms = budget.as_millis() as u64,
                        "fuzzy matching budget spent; pairing identical content only"
                    );
                    over_budget = true;
                }
                None
            } else {
                similarity.score(ours_member, theirs_member)
            };
            match score {
                Some(score) if score >= threshold => candidates.push(FuzzyMatch {
                    ours: oi,
                    theirs: ti,
                    score,
                }),
                _ => {}
            }
        }
    }
    debug!(rejected, candidates = candidates.len(), "fuzzy candidates");

    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(a.ours.cmp(&b.ours))
            .then(a.theirs.cmp(&b.theirs))
    });

    let mut ours_used = vec![false; ours.len()];
    let mut theirs_used = vec![false; theirs.len()];
    let mut matches = Vec::new();
    for candidate in candidates {
        if ours_used[candidate.ours] || theirs_used[candidate.theirs] {
            continue;
        }
        ours_used[candidate.ours] = true;
        theirs_used[candidate.theirs] = true;
        debug!(
            ours = ours.get_index(candidate.ours).map(|(n, _)| n.as_str()),
            theirs = theirs.get_index(candidate.theirs).map(|(n, _)| n.as_str()),
            score = candidate.score,
            "fuzzy match"
        );
        matches.push(candidate);
    }
    Ok(matches)
}

fn fingerprints(
    members: &Members,
    similarity: &dyn Similarity,
    abort: &AbortSignal,
) -> EngineResult<Vec<Option<Fingerprint>>> {
    members
        .values()
        .map(|member| {
            if abort.is_triggered() {
                return Err(EngineError::aborted(abort));
            }
            Ok(similarity.fingerprint(member))
        })
        .collect()
}
