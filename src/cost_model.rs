//! Per-symbol bit-cost model derived from an initial reference stream.
//!
//! Costs are 64-bit fixed-point with [`LOG_2_PRECISION_BITS`] fractional
//! bits, estimated per alphabet as `log2(sum) - log2(count)`.

use alloc::vec;
use alloc::vec::Vec;

use crate::backward_refs::distance_to_plane_code;
use crate::fastlog::{fast_log2, LOG_2_PRECISION_BITS};
use crate::histogram::Histogram;
use crate::prefix::prefix_encode_bits;
use crate::types::{
    argb_alpha, argb_blue, argb_green, argb_red, BackwardRefs, NUM_DISTANCE_CODES,
    NUM_LENGTH_CODES, NUM_LITERAL_CODES,
};

/// Numerator of the cost scale applied to literal candidates.
///
/// Literals and cache hits carry a calibrated penalty relative to copies of
/// the same span; the exact ratios are part of the cost model and changing
/// them changes compression.
pub(crate) const LITERAL_COST_SCALE: i64 = 82;
/// Numerator of the cost scale applied to cache-index candidates.
pub(crate) const CACHE_COST_SCALE: i64 = 68;
/// Shared denominator of the candidate cost scales.
pub(crate) const COST_SCALE_DENOM: i64 = 100;

/// Rounding signed division.
#[inline]
pub(crate) fn div_round(a: i64, b: i64) -> i64 {
    if (a < 0) == (b < 0) {
        (a + b / 2) / b
    } else {
        (a - b / 2) / b
    }
}

/// Fill `out[i] = log2(sum) - log2(counts[i])` in fixed point.
///
/// With fewer than two distinct symbols the alphabet costs nothing (a
/// single-entry prefix tree), so every slot is zero. A zero-count slot
/// otherwise gets the full `log2(sum)`, the largest estimate the table can
/// express.
fn counts_to_bit_estimates(counts: &[u32], out: &mut [u32]) {
    debug_assert_eq!(counts.len(), out.len());
    let sum: u32 = counts.iter().sum();
    let nonzeros = counts.iter().filter(|&&c| c > 0).count();
    if nonzeros <= 1 {
        out.fill(0);
        return;
    }
    let logsum = fast_log2(sum);
    for (slot, &count) in out.iter_mut().zip(counts.iter()) {
        *slot = logsum.saturating_sub(fast_log2(count));
    }
}

/// Immutable bit-cost tables for the five symbol alphabets.
pub(crate) struct CostModel {
    alpha: [u32; 256],
    red: [u32; 256],
    blue: [u32; 256],
    literal: Vec<u32>,
    distance: [u32; NUM_DISTANCE_CODES],
}

impl CostModel {
    /// Derive the model from `refs`, remapping copy distances through the
    /// plane code of an image `xsize` wide.
    pub(crate) fn build(xsize: usize, cache_bits: u8, refs: &BackwardRefs) -> Self {
        let histo = Histogram::from_refs(refs, cache_bits, |dist| {
            distance_to_plane_code(xsize, dist as usize)
        });

        let mut model = Self {
            alpha: [0; 256],
            red: [0; 256],
            blue: [0; 256],
            literal: vec![0; histo.literal.len()],
            distance: [0; NUM_DISTANCE_CODES],
        };
        counts_to_bit_estimates(&histo.alpha, &mut model.alpha);
        counts_to_bit_estimates(&histo.red, &mut model.red);
        counts_to_bit_estimates(&histo.blue, &mut model.blue);
        counts_to_bit_estimates(&histo.literal, &mut model.literal);
        counts_to_bit_estimates(&histo.distance, &mut model.distance);
        model
    }

    /// Cost of a raw pixel: all four channel symbols.
    #[inline]
    pub(crate) fn literal_cost(&self, argb: u32) -> i64 {
        i64::from(self.alpha[argb_alpha(argb) as usize])
            + i64::from(self.red[argb_red(argb) as usize])
            + i64::from(self.literal[argb_green(argb) as usize])
            + i64::from(self.blue[argb_blue(argb) as usize])
    }

    /// Cost of a cache-index token.
    #[inline]
    pub(crate) fn cache_cost(&self, idx: u16) -> i64 {
        i64::from(self.literal[NUM_LITERAL_CODES + NUM_LENGTH_CODES + idx as usize])
    }

    /// Cost of a copy length: its prefix code plus literal extra bits.
    #[inline]
    pub(crate) fn length_cost(&self, len: u32) -> i64 {
        let (code, extra_bits) = prefix_encode_bits(len);
        i64::from(self.literal[NUM_LITERAL_CODES + code as usize])
            + (i64::from(extra_bits) << LOG_2_PRECISION_BITS)
    }

    /// Cost of a distance plane code: its prefix code plus extra bits.
    #[inline]
    pub(crate) fn distance_cost(&self, dist_plane_code: u32) -> i64 {
        let (code, extra_bits) = prefix_encode_bits(dist_plane_code);
        i64::from(self.distance[code as usize])
            + (i64::from(extra_bits) << LOG_2_PRECISION_BITS)
    }

    /// Literal cost with the calibrated candidate scale applied.
    #[inline]
    pub(crate) fn scaled_literal_cost(&self, argb: u32) -> i64 {
        div_round(self.literal_cost(argb) * LITERAL_COST_SCALE, COST_SCALE_DENOM)
    }

    /// Cache cost with the calibrated candidate scale applied.
    #[inline]
    pub(crate) fn scaled_cache_cost(&self, idx: u16) -> i64 {
        div_round(self.cache_cost(idx) * CACHE_COST_SCALE, COST_SCALE_DENOM)
    }
}
