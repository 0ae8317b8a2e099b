//! LZ77 match finder over ARGB pixels.
//!
//! One build pass records the best `(distance, length)` backward match for
//! every pixel position. Candidate sources come from hash buckets chained
//! through an index table: ordinary positions hash their pixel pair, while
//! positions inside a constant run hash `(color, remaining run length)` so
//! runs with equal tails land in one bucket. A match that still holds at the
//! position to its left is propagated there directly instead of re-searching.

use alloc::vec;
use alloc::vec::Vec;

use crate::types::{MAX_LENGTH, MAX_LENGTH_BITS, WINDOW_SIZE};

const HASH_BITS: u32 = 18;
const HASH_SIZE: usize = 1 << HASH_BITS;

const HASH_MULT_HI: u32 = 0xc6a4a793;
const HASH_MULT_LO: u32 = 0x5bd1e996;

/// Link marking "no further candidate in this bucket".
const NIL: u32 = u32::MAX;

#[inline]
fn hash_pair(p0: u32, p1: u32) -> usize {
    let key = p1
        .wrapping_mul(HASH_MULT_HI)
        .wrapping_add(p0.wrapping_mul(HASH_MULT_LO));
    (key >> (32 - HASH_BITS)) as usize
}

/// Chain every position to the previous member of its hash bucket.
///
/// Requires `argb.len() > 2`; the final pixel is never chained.
fn build_links(argb: &[u32]) -> Vec<u32> {
    let size = argb.len();
    let mut links = vec![NIL; size];
    let mut heads = vec![NIL; HASH_SIZE];

    let mut pos = 0usize;
    let mut in_run = argb[0] == argb[1];
    while pos + 2 < size {
        let in_run_next = argb[pos + 1] == argb[pos + 2];
        if in_run && in_run_next {
            let color = argb[pos];
            let mut tail = 1usize;
            while pos + tail + 2 < size && argb[pos + tail + 2] == color {
                tail += 1;
            }
            if tail > MAX_LENGTH {
                // Head positions of an over-long run stay unlinked; they are
                // fully served by distance-1 copies.
                pos += tail - MAX_LENGTH;
                tail = MAX_LENGTH;
            }
            for t in (1..=tail).rev() {
                let bucket = hash_pair(color, t as u32);
                links[pos] = heads[bucket];
                heads[bucket] = pos as u32;
                pos += 1;
            }
            in_run = false;
        } else {
            let bucket = hash_pair(argb[pos], argb[pos + 1]);
            links[pos] = heads[bucket];
            heads[bucket] = pos as u32;
            pos += 1;
            in_run = in_run_next;
        }
    }
    let penultimate = size - 2;
    links[penultimate] = heads[hash_pair(argb[penultimate], argb[penultimate + 1])];
    links
}

/// Length of the common prefix of `argb[a..]` and `argb[b..]`, capped at
/// `cap`. Callers keep `a + cap` and `b + cap` inside the image.
#[inline]
fn common_prefix(argb: &[u32], a: usize, b: usize, cap: usize) -> usize {
    (0..cap).find(|&i| argb[a + i] != argb[b + i]).unwrap_or(cap)
}

/// Best `(distance, length)` at `base`: two positional guesses, then up to
/// `budget` bucket candidates no older than `floor`.
fn best_match(
    argb: &[u32],
    links: &[u32],
    base: usize,
    width: usize,
    floor: usize,
    budget: usize,
) -> (usize, usize) {
    let size = argb.len();
    // The final pixel is never part of a match; it always costs a literal.
    let max_len = (size - 1 - base).min(MAX_LENGTH);
    let good_enough = max_len.min(256);
    let mut dist = 0usize;
    let mut len = 0usize;

    // The pixel one row up and the previous pixel are the likely sources in
    // image data; try both before touching the buckets.
    for guess in [width, 1] {
        if base >= guess && argb[base - guess + len] == argb[base + len] {
            let run = common_prefix(argb, base - guess, base, max_len);
            if run > len {
                len = run;
                dist = guess;
            }
        }
    }

    if len < MAX_LENGTH {
        let mut budget = budget;
        let mut cursor = links[base];
        // One probe pixel rejects most candidates without a full compare:
        // beating the current best means matching at least one pixel past it.
        let mut want = argb[base + len];
        while cursor != NIL && cursor as usize >= floor && budget > 0 {
            budget -= 1;
            let cand = cursor as usize;
            if argb[cand + len] == want {
                let run = common_prefix(argb, cand, base, max_len);
                if run > len {
                    len = run;
                    dist = base - cand;
                    if len >= good_enough {
                        break;
                    }
                    want = argb[base + len];
                }
            }
            cursor = links[cand];
        }
    }
    (dist, len)
}

/// Per-position best backward match, packed as `(distance << 12) | length`.
///
/// The lookups are pure reads: for a fixed image and build parameters,
/// [`HashChain::find_copy`] and [`HashChain::find_offset`] always agree, which
/// the path-emission pass relies on.
#[derive(Debug)]
pub struct HashChain {
    packed: Vec<u32>,
}

impl HashChain {
    /// Search the image and record the best match for every position.
    ///
    /// `quality` (0..=100) scales the per-position candidate budget and how
    /// far back the window reaches.
    pub fn new(argb: &[u32], quality: u8, width: usize) -> Self {
        let size = argb.len();
        let mut packed = vec![0u32; size];
        if size <= 2 {
            return Self { packed };
        }

        let budget = 8 + quality as usize * quality as usize / 128;
        let window = match quality {
            0..=25 => width << 4,
            26..=50 => width << 6,
            51..=75 => width << 8,
            _ => WINDOW_SIZE,
        }
        .min(WINDOW_SIZE);

        let links = build_links(argb);

        // The last pixel never opens a match; scan the rest right to left.
        let mut base = size - 2;
        while base > 0 {
            let floor = base.saturating_sub(window);
            let (mut dist, mut len) = best_match(argb, &links, base, width, floor, budget);

            // A match that still holds one pixel to the left serves the
            // previous position at the same distance, one pixel longer;
            // record the whole stretch without another search.
            let search_base = base;
            loop {
                debug_assert!(len <= MAX_LENGTH);
                debug_assert!(dist <= WINDOW_SIZE);
                packed[base] = ((dist as u32) << MAX_LENGTH_BITS) | len as u32;
                if base == 0 {
                    break;
                }
                base -= 1;
                if dist == 0 || base < dist || argb[base - dist] != argb[base] {
                    break;
                }
                if len == MAX_LENGTH && dist != 1 && base + MAX_LENGTH < search_base {
                    break;
                }
                if len < MAX_LENGTH {
                    len += 1;
                }
            }
        }

        Self { packed }
    }

    /// Best `(distance, length)` at `pos`. Length 0 or 1 means no usable match.
    #[inline]
    pub fn find_copy(&self, pos: usize) -> (usize, usize) {
        let v = self.packed[pos];
        (
            (v >> MAX_LENGTH_BITS) as usize,
            (v & ((1 << MAX_LENGTH_BITS) - 1)) as usize,
        )
    }

    /// Best match distance at `pos`, consistent with [`Self::find_copy`].
    #[inline]
    pub fn find_offset(&self, pos: usize) -> usize {
        (self.packed[pos] >> MAX_LENGTH_BITS) as usize
    }

    /// Number of positions covered.
    #[inline]
    pub fn size(&self) -> usize {
        self.packed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebuild_is_deterministic() {
        let mut pixels = Vec::new();
        for i in 0u32..300 {
            pixels.push(0xFF000000 | (i * 31 % 13));
        }
        let a = HashChain::new(&pixels, 75, 20);
        let b = HashChain::new(&pixels, 75, 20);
        for pos in 0..pixels.len() {
            assert_eq!(a.find_copy(pos), b.find_copy(pos));
            assert_eq!(a.find_offset(pos), a.find_copy(pos).0);
        }
    }

    #[test]
    fn test_matches_are_true_copies() {
        let mut pixels = Vec::new();
        for i in 0u32..400 {
            pixels.push(0xFF000000 | (i * 7 % 23));
        }
        let chain = HashChain::new(&pixels, 75, 25);
        for pos in 0..pixels.len() {
            let (dist, len) = chain.find_copy(pos);
            if len >= 2 {
                assert!(dist >= 1 && dist <= pos);
                for k in 0..len {
                    assert_eq!(pixels[pos + k], pixels[pos + k - dist], "pos {pos} k {k}");
                }
            }
        }
    }

    #[test]
    fn test_never_matches_through_last_pixel() {
        let pixels = vec![0xFFABCDEFu32; 50];
        let chain = HashChain::new(&pixels, 75, 10);
        for pos in 0..pixels.len() {
            let (_, len) = chain.find_copy(pos);
            assert!(pos + len < pixels.len());
        }
    }

    #[test]
    fn test_constant_region_uses_distance_one() {
        let pixels = vec![0xFF445566u32; 120];
        let chain = HashChain::new(&pixels, 75, 12);
        let (dist, len) = chain.find_copy(40);
        assert_eq!(dist, 1);
        assert!(len >= 2);
    }

    #[test]
    fn test_row_above_is_found() {
        // Two identical 16-pixel rows of otherwise distinct pixels.
        let mut pixels: Vec<u32> = (0u32..16).map(|i| 0xFF000000 | (i * 5 + 1)).collect();
        let row = pixels.clone();
        pixels.extend_from_slice(&row);
        let chain = HashChain::new(&pixels, 75, 16);
        let (dist, len) = chain.find_copy(16);
        assert_eq!(dist, 16);
        assert!(len >= 2);
    }

    #[test]
    fn test_window_bounds_distance_at_low_quality() {
        // Quality 0 keeps the window at width << 4; no source may be older.
        let mut pixels = Vec::new();
        for i in 0u32..600 {
            pixels.push(0xFF000000 | (i % 90) * 3);
        }
        let chain = HashChain::new(&pixels, 0, 8);
        for pos in 0..pixels.len() {
            let (dist, len) = chain.find_copy(pos);
            if len >= 2 {
                assert!(dist <= 8 << 4, "pos {pos} dist {dist}");
            }
        }
    }

    #[test]
    fn test_common_prefix_stops_at_mismatch() {
        let data = [5u32, 6, 7, 5, 6, 9, 1, 2];
        assert_eq!(common_prefix(&data, 0, 3, 3), 2);
        assert_eq!(common_prefix(&data, 1, 4, 2), 1);
        assert_eq!(common_prefix(&data, 0, 6, 2), 0);
    }

    #[test]
    fn test_degenerate_sizes() {
        assert_eq!(HashChain::new(&[], 75, 1).size(), 0);
        assert_eq!(HashChain::new(&[0xFF000000], 75, 1).find_copy(0), (0, 0));
        let two = HashChain::new(&[0xFF000000, 0xFF000000], 75, 2);
        assert_eq!(two.find_copy(0), (0, 0));
        assert_eq!(two.find_copy(1), (0, 0));
    }
}
