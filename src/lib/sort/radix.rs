//! LSD radix sort for coordinate sort keys.
//!
//! O(n) counting sort over 10-bit digits (1024 buckets): three passes cover
//! the 30-bit composite position, then as many passes as the chromosome id
//! needs. Each pass is stable, so equal coordinates keep their input order
//! and the record ordinal acts as the final tie-breaker.

use crate::sort::keys::{SortContext, SortKey};

/// Digit width per pass.
const RADIX_BITS: u32 = 10;

/// Bucket count per pass.
const RADIX: usize = 1 << RADIX_BITS;

/// Digit mask.
const RADIX_MASK: u32 = (RADIX as u32) - 1;

/// Below this size a comparison sort beats the counting passes.
const RADIX_THRESHOLD: usize = 256;

/// Sort keys into coordinate order: `(chromosome_id, composite_position)`
/// ascending, ties keeping their current order.
///
/// The chromosome digit count adapts to the reference count in `context`,
/// so reference counts beyond one digit's range still sort correctly.
pub fn radix_sort_keys(keys: &mut Vec<SortKey>, context: &SortContext) {
    let n = keys.len();
    if n < RADIX_THRESHOLD {
        // Stable, same observable order as the counting passes.
        keys.sort_by_key(SortKey::coordinate);
        return;
    }

    let chromosome_passes = chromosome_pass_count(context.reference_count);
    let mut scratch = vec![SortKey::default(); n];
    let mut in_keys = true;

    // Composite position: bits 0..30, least significant digit first.
    for pass in 0..3 {
        let shift = pass * RADIX_BITS;
        let digit = |key: &SortKey| ((key.composite_position >> shift) & RADIX_MASK) as usize;
        if in_keys {
            counting_pass(keys, &mut scratch, digit);
        } else {
            counting_pass(&scratch, keys, digit);
        }
        in_keys = !in_keys;
    }

    // Chromosome id, widened per digit until the reference count is covered.
    for pass in 0..chromosome_passes {
        let shift = pass * RADIX_BITS;
        let digit = |key: &SortKey| ((key.chromosome_id >> shift) & RADIX_MASK) as usize;
        if in_keys {
            counting_pass(keys, &mut scratch, digit);
        } else {
            counting_pass(&scratch, keys, digit);
        }
        in_keys = !in_keys;
    }

    if !in_keys {
        keys.copy_from_slice(&scratch);
    }
}

/// One stable counting-sort pass: count, exclusive prefix sum, scatter in
/// input order.
fn counting_pass(src: &[SortKey], dst: &mut [SortKey], digit: impl Fn(&SortKey) -> usize) {
    let mut counts = [0u32; RADIX];
    for key in src {
        counts[digit(key)] += 1;
    }

    let mut total = 0u32;
    for count in &mut counts {
        let c = *count;
        *count = total;
        total += c;
    }

    for key in src {
        let d = digit(key);
        dst[counts[d] as usize] = *key;
        counts[d] += 1;
    }
}

/// Number of 10-bit passes needed to cover every chromosome id, including
/// the unmapped sentinel at `reference_count`.
fn chromosome_pass_count(reference_count: u32) -> u32 {
    let bits = 32 - reference_count.leading_zeros();
    bits.div_ceil(RADIX_BITS).max(1)
}
