//! Symbol-frequency histogram over a backward-reference stream.
//!
//! The green channel, length codes, and color-cache indices share one merged
//! alphabet: slots `[0, 256)` are green literals, `[256, 280)` length prefix
//! codes, and the remainder cache indices.

use alloc::vec;
use alloc::vec::Vec;

use crate::prefix::prefix_encode_bits;
use crate::types::{
    argb_alpha, argb_blue, argb_green, argb_red, BackwardRefs, PixOrCopy, NUM_DISTANCE_CODES,
    NUM_LENGTH_CODES, NUM_LITERAL_CODES,
};

/// Size of the merged green/length/cache alphabet for a given cache size.
#[inline]
pub fn literal_alphabet_size(cache_bits: u8) -> usize {
    NUM_LITERAL_CODES + NUM_LENGTH_CODES + if cache_bits > 0 { 1 << cache_bits } else { 0 }
}

/// Population counts for the five symbol alphabets of a reference stream.
#[derive(Debug, Clone)]
pub struct Histogram {
    /// Merged green/length/cache alphabet.
    pub literal: Vec<u32>,
    /// Red channel bytes.
    pub red: [u32; 256],
    /// Blue channel bytes.
    pub blue: [u32; 256],
    /// Alpha channel bytes.
    pub alpha: [u32; 256],
    /// Distance prefix codes.
    pub distance: [u32; NUM_DISTANCE_CODES],
}

impl Histogram {
    /// Empty histogram sized for `cache_bits`.
    pub fn new(cache_bits: u8) -> Self {
        Self {
            literal: vec![0; literal_alphabet_size(cache_bits)],
            red: [0; 256],
            blue: [0; 256],
            alpha: [0; 256],
            distance: [0; NUM_DISTANCE_CODES],
        }
    }

    /// Count one literal pixel across the four channel alphabets.
    #[inline]
    pub fn add_literal(&mut self, argb: u32) {
        self.literal[argb_green(argb) as usize] += 1;
        self.red[argb_red(argb) as usize] += 1;
        self.blue[argb_blue(argb) as usize] += 1;
        self.alpha[argb_alpha(argb) as usize] += 1;
    }

    /// Count one cache-index token.
    #[inline]
    pub fn add_cache_idx(&mut self, idx: u16) {
        let slot = NUM_LITERAL_CODES + NUM_LENGTH_CODES + idx as usize;
        debug_assert!(slot < self.literal.len());
        self.literal[slot] += 1;
    }

    /// Count one copy token. `dist_code` is the already remapped plane code.
    #[inline]
    pub fn add_copy(&mut self, len: u16, dist_code: u32) {
        let (len_prefix, _) = prefix_encode_bits(u32::from(len));
        let (dist_prefix, _) = prefix_encode_bits(dist_code);
        self.literal[NUM_LITERAL_CODES + len_prefix as usize] += 1;
        self.distance[dist_prefix as usize] += 1;
    }

    /// Build from a reference stream. `remap_distance` converts each copy's
    /// raw distance to its plane code before counting.
    pub fn from_refs<F>(refs: &BackwardRefs, cache_bits: u8, remap_distance: F) -> Self
    where
        F: Fn(u32) -> u32,
    {
        let mut histo = Self::new(cache_bits);
        for token in refs.iter() {
            match *token {
                PixOrCopy::Literal(argb) => histo.add_literal(argb),
                PixOrCopy::CacheIdx(idx) => histo.add_cache_idx(idx),
                PixOrCopy::Copy { len, dist } => histo.add_copy(len, remap_distance(dist)),
            }
        }
        histo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::make_argb;

    #[test]
    fn test_alphabet_sizes() {
        assert_eq!(literal_alphabet_size(0), 280);
        assert_eq!(literal_alphabet_size(1), 282);
        assert_eq!(literal_alphabet_size(8), 536);
        assert_eq!(literal_alphabet_size(11), 2328);
    }

    #[test]
    fn test_literal_counts_by_channel() {
        let mut histo = Histogram::new(0);
        histo.add_literal(make_argb(0xFF, 0x11, 0x22, 0x33));
        assert_eq!(histo.literal[0x22], 1);
        assert_eq!(histo.red[0x11], 1);
        assert_eq!(histo.blue[0x33], 1);
        assert_eq!(histo.alpha[0xFF], 1);
    }

    #[test]
    fn test_from_refs_remaps_distances() {
        let mut refs = BackwardRefs::new();
        refs.push(PixOrCopy::literal(0xFF000000));
        refs.push(PixOrCopy::copy(8, 16));
        // Remap raw distance 16 to plane code 1.
        let histo = Histogram::from_refs(&refs, 0, |d| {
            assert_eq!(d, 16);
            1
        });
        let (len_prefix, _) = prefix_encode_bits(8);
        assert_eq!(histo.literal[NUM_LITERAL_CODES + len_prefix as usize], 1);
        assert_eq!(histo.distance[0], 1);
    }

    #[test]
    fn test_cache_index_slot() {
        let mut histo = Histogram::new(4);
        histo.add_cache_idx(5);
        assert_eq!(histo.literal[NUM_LITERAL_CODES + NUM_LENGTH_CODES + 5], 1);
    }
}
