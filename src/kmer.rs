//src/kmer.rs

//! Base-level codec shared by database building and read scoring.
//!
//! Bases are packed two bits each with `A=0, C=1, G=2, T=3` and the leftmost
//! base in the most significant position, so comparing two codes of the same
//! length gives the same answer as comparing the strings lexicographically.

use crate::error::{MnbcError, Result};

/// 2-bit value of an uppercase nucleotide, `None` for anything else.
#[inline]
pub fn base_value(b: u8) -> Option<u64> {
    match b {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        _ => None,
    }
}

#[inline]
fn complement_base(b: u8) -> Option<u8> {
    match b {
        b'A' => Some(b'T'),
        b'C' => Some(b'G'),
        b'G' => Some(b'C'),
        b'T' => Some(b'A'),
        _ => None,
    }
}

/// Reverse complement of a k-mer. Fails on the first non-ACGT base.
pub fn reverse_complement(kmer: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(kmer.len());
    for (i, &b) in kmer.iter().enumerate().rev() {
        let c = complement_base(b).ok_or(MnbcError::InvalidBase { base: b, position: i })?;
        out.push(c);
    }
    Ok(out)
}

/// Lexicographically smaller of `kmer` and its reverse complement.
/// A palindromic k-mer returns itself.
pub fn canonical(kmer: &[u8]) -> Result<Vec<u8>> {
    let rc = reverse_complement(kmer)?;
    if rc.as_slice() < kmer {
        Ok(rc)
    } else {
        Ok(kmer.to_vec())
    }
}

/// Base-4 integer of a fully valid k-mer (at most 32 bases).
pub fn encode(kmer: &[u8]) -> Result<u64> {
    if kmer.len() > crate::config::MAX_K {
        return Err(MnbcError::Config(format!(
            "cannot encode a {}-mer into 64 bits",
            kmer.len()
        )));
    }
    let mut val = 0u64;
    for (i, &b) in kmer.iter().enumerate() {
        let code = base_value(b).ok_or(MnbcError::InvalidBase { base: b, position: i })?;
        val = (val << 2) | code;
    }
    Ok(val)
}

/// Mask covering the low `2k` bits.
#[inline]
pub fn kmer_mask(k: usize) -> u64 {
    if k >= 32 {
        u64::MAX
    } else {
        (1u64 << (2 * k)) - 1
    }
}

/// Reverse complement of a packed k-mer. Complementing and reversing the
/// bits moves the k-mer to the high end with each base's two bits swapped;
/// swapping them back and shifting down gives the reversed strand.
#[inline]
pub fn reverse_complement_code(kmer: u64, k: usize) -> u64 {
    const LOW_BITS: u64 = 0x5555_5555_5555_5555;
    let flipped = (!kmer).reverse_bits();
    let pairs = ((flipped >> 1) & LOW_BITS) | ((flipped & LOW_BITS) << 1);
    pairs >> (64 - 2 * k)
}

/// Smaller of a packed k-mer and its reverse complement.
#[inline]
pub fn canonical_code(kmer: u64, k: usize) -> u64 {
    kmer.min(reverse_complement_code(kmer, k))
}
