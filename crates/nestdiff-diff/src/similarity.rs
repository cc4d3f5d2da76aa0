//! Content similarity scoring used to pair renamed members.
//!
//! Scores are in `[0, 1]`; `1.0` means identical content. Text is compared by
//! lines, anything else byte by byte. Both comparisons run under a deadline so
//! a pathological pair cannot stall the run; a timed-out diff still yields a
//! (coarser) ratio.
//!
//! A [`Fingerprint`] summarizes one content so that most hopeless pairs can
//! be rejected without diffing them: [`Fingerprint::upper_bound`] never
//! underestimates [`content_similarity`], and binary contents carry a MinHash
//! sketch whose [`resemblance`](Fingerprint::resemblance) estimates how much
//! of the two byte streams is shared.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::time::{Duration, Instant};

use similar::{Algorithm, DiffableStr, TextDiff};

/// Wall-clock budget for a single similarity computation.
pub const SIMILARITY_DEADLINE: Duration = Duration::from_millis(250);

/// Score how similar two contents are.
pub fn content_similarity(old: &[u8], new: &[u8]) -> f64 {
    if old == new {
        return 1.0;
    }
    if old.is_empty() || new.is_empty() {
        return 0.0;
    }

    match (std::str::from_utf8(old), std::str::from_utf8(new)) {
        (Ok(old_str), Ok(new_str)) => TextDiff::configure()
            .algorithm(Algorithm::Myers)
            .timeout(SIMILARITY_DEADLINE)
            .diff_lines(old_str, new_str)
            .ratio() as f64,
        _ => {
            let deadline = Instant::now() + SIMILARITY_DEADLINE;
            let ops = similar::capture_diff_slices_deadline(
                Algorithm::Myers,
                old,
                new,
                Some(deadline),
            );
            similar::get_diff_ratio(&ops, old.len(), new.len()) as f64
        }
    }
}

/// Width in bytes of the shingles hashed into a sketch.
const SHINGLE: usize = 8;

/// Number of minimum shingle hashes kept per sketch.
const SKETCH_SIZE: usize = 128;

/// Binary contents shorter than this are cheap to diff and get no sketch.
pub const SKETCH_MIN_LEN: usize = 4096;

/// Summary of one content, computed once and compared many times.
#[derive(Clone, Debug)]
pub struct Fingerprint {
    digest: blake3::Hash,
    len: u64,
    // Line hash -> count, sorted by hash. Present for valid UTF-8.
    lines: Option<Vec<(u64, u32)>>,
    line_count: u64,
    bytes: Box<[u64; 256]>,
    sketch: Vec<u64>,
}

impl Fingerprint {
    pub fn of(content: &[u8]) -> Self {
        let mut bytes = Box::new([0u64; 256]);
        for &b in content {
            bytes[b as usize] += 1;
        }

        let (lines, line_count, sketch) = match std::str::from_utf8(content) {
            Ok(text) => {
                let tokens = DiffableStr::tokenize_lines(text);
                let line_count = tokens.len() as u64;
                let mut counts: HashMap<u64, u32> = HashMap::new();
                for line in tokens {
                    *counts.entry(token_hash(line.as_bytes())).or_default() += 1;
                }
                let mut lines: Vec<_> = counts.into_iter().collect();
                lines.sort_unstable();
                (Some(lines), line_count, Vec::new())
            }
            Err(_) if content.len() >= SKETCH_MIN_LEN => (None, 0, sketch(content)),
            Err(_) => (None, 0, Vec::new()),
        };

        Self {
            digest: blake3::hash(content),
            len: content.len() as u64,
            lines,
            line_count,
            bytes,
            sketch,
        }
    }

    /// BLAKE3 digest of the content.
    pub fn digest(&self) -> &blake3::Hash {
        &self.digest
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// A score [`content_similarity`] cannot exceed for these two contents.
    ///
    /// Matched lines (or bytes) form a common subsequence, so their number is
    /// bounded by the multiset intersection of the two sides' tokens.
    pub fn upper_bound(&self, other: &Self) -> f64 {
        if self.digest == other.digest {
            return 1.0;
        }
        if self.is_empty() || other.is_empty() {
            return 0.0;
        }
        match (&self.lines, &other.lines) {
            (Some(ours), Some(theirs)) => dice(
                shared_tokens(ours, theirs),
                self.line_count,
                other.line_count,
            ),
            _ => {
                let shared = self
                    .bytes
                    .iter()
                    .zip(other.bytes.iter())
                    .map(|(a, b)| *a.min(b))
                    .sum();
                dice(shared, self.len, other.len)
            }
        }
    }

    /// Estimated resemblance of two binary contents in `[0, 1]`, from their
    /// sketches. `None` when either side has no sketch.
    pub fn resemblance(&self, other: &Self) -> Option<f64> {
        let (ours, theirs) = (&self.sketch, &other.sketch);
        if ours.is_empty() || theirs.is_empty() {
            return None;
        }
        // Walk the smallest hashes of the union, counting those both share.
        let k = ours.len().min(theirs.len());
        let (mut i, mut j, mut taken, mut shared) = (0, 0, 0, 0);
        while taken < k && i < ours.len() && j < theirs.len() {
            match ours[i].cmp(&theirs[j]) {
                Ordering::Less => i += 1,
                Ordering::Greater => j += 1,
                Ordering::Equal => {
                    shared += 1;
                    i += 1;
                    j += 1;
                }
            }
            taken += 1;
        }
        Some(shared as f64 / k as f64)
    }
}

fn dice(shared: u64, a: u64, b: u64) -> f64 {
    if a + b == 0 {
        return 1.0;
    }
    (2 * shared) as f64 / (a + b) as f64
}

fn shared_tokens(ours: &[(u64, u32)], theirs: &[(u64, u32)]) -> u64 {
    let (mut i, mut j, mut shared) = (0, 0, 0u64);
    while i < ours.len() && j < theirs.len() {
        match ours[i].0.cmp(&theirs[j].0) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                shared += u64::from(ours[i].1.min(theirs[j].1));
                i += 1;
                j += 1;
            }
        }
    }
    shared
}

fn token_hash(token: &[u8]) -> u64 {
    let mut head = [0u8; 8];
    head.copy_from_slice(&blake3::hash(token).as_bytes()[..8]);
    u64::from_le_bytes(head)
}

// splitmix64 finalizer.
fn mix(mut x: u64) -> u64 {
    x ^= x >> 30;
    x = x.wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

/// Bottom-k MinHash of the content's overlapping shingles, sorted ascending.
fn sketch(content: &[u8]) -> Vec<u64> {
    let mut heap: BinaryHeap<u64> = BinaryHeap::with_capacity(SKETCH_SIZE + 1);
    let mut window = [0u8; SHINGLE];
    for shingle in content.windows(SHINGLE) {
        window.copy_from_slice(shingle);
        let h = mix(u64::from_le_bytes(window));
        let full = heap.len() >= SKETCH_SIZE;
        if full && heap.peek().is_some_and(|&max| h >= max) {
            continue;
        }
        if heap.iter().any(|&kept| kept == h) {
            continue;
        }
        if full {
            heap.pop();
        }
        heap.push(h);
    }
    let mut sketch = heap.into_vec();
    sketch.sort_unstable();
    sketch
}
