//src/minimizer.rs

//! Window-minimum sampling of canonical k-mers.
//!
//! A window covers `k` consecutive k-mer start positions (`2k - 1` bases).
//! The sampled set is the union of:
//!   - the minimum of every full window,
//!   - running minima of the partial windows anchored at either end,
//! or, for sequences too short to hold one full window, every prefix minimum.
//! K-mers overlapping a non-ACGT base never take part.

use ahash::AHashSet;

use crate::kmer::{base_value, canonical_code, kmer_mask};

/// Canonical code of every k-mer start position, `None` where the k-mer
/// overlaps an invalid base. `k` is at most 32.
pub fn canonical_kmers(seq: &[u8], k: usize) -> Vec<Option<u64>> {
    if k == 0 || seq.len() < k {
        return Vec::new();
    }
    let mask = kmer_mask(k);
    let mut out = Vec::with_capacity(seq.len() - k + 1);

    let mut fwd = 0u64;
    // number of valid bases ending at the current position
    let mut run = 0usize;
    for (pos, &b) in seq.iter().enumerate() {
        match base_value(b) {
            Some(code) => {
                fwd = ((fwd << 2) | code) & mask;
                run += 1;
            }
            None => run = 0,
        }
        if pos + 1 >= k {
            out.push(if run >= k { Some(canonical_code(fwd, k)) } else { None });
        }
    }
    out
}

#[inline]
fn window_min(window: &[Option<u64>]) -> Option<u64> {
    window.iter().filter_map(|c| *c).min()
}

/// Insert the running minimum after every valid candidate.
fn running_minima<'a, I>(candidates: I, out: &mut AHashSet<u64>)
where
    I: Iterator<Item = &'a Option<u64>>,
{
    let mut best: Option<u64> = None;
    for code in candidates.filter_map(|c| *c) {
        let m = best.map_or(code, |b| b.min(code));
        best = Some(m);
        out.insert(m);
    }
}

/// Minimum of every full window, updated incrementally: the window is only
/// rescanned when the k-mer sliding out was the current minimum.
fn interior_minimizers(kmers: &[Option<u64>], k: usize, out: &mut AHashSet<u64>) {
    let last_start = kmers.len() - k;

    let mut current = window_min(&kmers[..k]);
    if let Some(m) = current {
        out.insert(m);
    }

    for i in 1..=last_start {
        let leaving = kmers[i - 1];
        current = if leaving.is_some() && leaving == current {
            window_min(&kmers[i..i + k])
        } else {
            match (current, kmers[i + k - 1]) {
                (Some(m), Some(entering)) => Some(m.min(entering)),
                (None, entering) => entering,
                (m, None) => m,
            }
        };
        if let Some(m) = current {
            out.insert(m);
        }
    }
}

/// Extracts minimizers for a fixed k.
#[derive(Debug, Clone, Copy)]
pub struct MinimizerExtractor {
    k: usize,
}

impl MinimizerExtractor {
    pub fn new(k: usize) -> Self {
        Self { k }
    }

    /// Add the minimizers of `seq` to `out`. Returns the number of valid
    /// k-mer start positions in `seq` (one strand).
    pub fn extract_into(&self, seq: &[u8], out: &mut AHashSet<u64>) -> u64 {
        let k = self.k;
        let kmers = canonical_kmers(seq, k);
        let valid = kmers.iter().filter(|c| c.is_some()).count() as u64;
        let n = kmers.len();
        if n == 0 || valid == 0 {
            return valid;
        }

        if n < k {
            // no full window fits
            running_minima(kmers.iter(), out);
            return valid;
        }

        interior_minimizers(&kmers, k, out);
        running_minima(kmers[..k - 1].iter(), out);
        running_minima(kmers[n - k + 1..].iter().rev(), out);
        valid
    }

    pub fn extract(&self, seq: &[u8]) -> AHashSet<u64> {
        let mut out = AHashSet::new();
        self.extract_into(seq, &mut out);
        out
    }
}
