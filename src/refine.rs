//! Cost-based refinement of a backward-reference stream.
//!
//! Rebuilds the token stream as a shortest path over the copy-edge DAG: a
//! single left-to-right pass relaxes, for every pixel, the literal edge and
//! the best copy edge reported by the hash chain, then a backward trace
//! recovers the cheapest hop sequence and a final pass re-emits tokens.
//!
//! The algorithm is Zopfli-like but tailored to images; consecutive pixels
//! sharing a copy distance (flat or repeating regions) are folded into a
//! constant number of interval pushes via the `reach` bookkeeping below.

use thiserror::Error;

use crate::backward_refs::distance_to_plane_code;
use crate::color_cache::ColorCache;
use crate::cost_manager::CostManager;
use crate::cost_model::CostModel;
use crate::hash_chain::HashChain;
use crate::types::{BackwardRefs, PixOrCopy};

/// Failure of a refinement pass.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RefineError {
    /// The pixel buffer does not match the stated dimensions.
    #[error("pixel buffer of {pixels} entries does not match {xsize}x{ysize}")]
    BufferSize {
        /// Image width in pixels.
        xsize: usize,
        /// Image height in pixels.
        ysize: usize,
        /// Length of the provided pixel buffer.
        pixels: usize,
    },

    /// The source reference stream is malformed.
    #[error("corrupt reference stream: {0}")]
    CorruptRefs(&'static str),
}

/// Recompute the cheapest token sequence for `argb` and return it.
///
/// `refs_src` supplies the symbol statistics the cost model is derived from;
/// it is typically the output of
/// [`greedy_backward_refs`](crate::greedy_backward_refs), or of a previous
/// refinement. `hash_chain` must have been built over the same `argb`.
pub fn refine_backward_references(
    xsize: usize,
    ysize: usize,
    argb: &[u32],
    cache_bits: u8,
    hash_chain: &HashChain,
    refs_src: &BackwardRefs,
) -> Result<BackwardRefs, RefineError> {
    let pix_count = xsize * ysize;
    if argb.len() != pix_count || hash_chain.size() != pix_count {
        return Err(RefineError::BufferSize {
            xsize,
            ysize,
            pixels: argb.len(),
        });
    }
    if pix_count == 0 {
        return Ok(BackwardRefs::new());
    }
    validate_refs(refs_src, pix_count, cache_bits)?;

    let mut manager = distance_only_pass(xsize, pix_count, argb, cache_bits, hash_chain, refs_src);
    let path_start = trace_backwards(&mut manager.dist_array);
    Ok(follow_chosen_path(
        argb,
        cache_bits,
        &manager.dist_array[path_start..],
        hash_chain,
    ))
}

fn validate_refs(
    refs: &BackwardRefs,
    pix_count: usize,
    cache_bits: u8,
) -> Result<(), RefineError> {
    let cache_size = if cache_bits > 0 { 1usize << cache_bits } else { 0 };
    let mut span = 0usize;
    for token in refs.iter() {
        match *token {
            PixOrCopy::Literal(_) => span += 1,
            PixOrCopy::CacheIdx(idx) => {
                if usize::from(idx) >= cache_size {
                    return Err(RefineError::CorruptRefs("cache index out of range"));
                }
                span += 1;
            }
            PixOrCopy::Copy { len, dist } => {
                if len == 0 {
                    return Err(RefineError::CorruptRefs("zero-length copy"));
                }
                if dist == 0 {
                    return Err(RefineError::CorruptRefs("zero-distance copy"));
                }
                span += usize::from(len);
            }
        }
    }
    if span != pix_count {
        return Err(RefineError::CorruptRefs(
            "token stream does not cover the image",
        ));
    }
    Ok(())
}

/// Relax the literal (or cache-index) edge into pixel `idx`.
///
/// Cache insertion happens on the miss branch only; a hit leaves the cache
/// untouched, mirroring what the emit pass will do.
#[inline]
fn relax_literal(
    argb: &[u32],
    model: &CostModel,
    cache: &mut Option<ColorCache>,
    idx: usize,
    prev_cost: i64,
    manager: &mut CostManager,
) {
    let color = argb[idx];
    let hit = cache.as_ref().and_then(|c| c.contains(color));
    let candidate = prev_cost
        + match hit {
            Some(cache_idx) => model.scaled_cache_cost(cache_idx),
            None => {
                if let Some(c) = cache.as_mut() {
                    c.insert(color);
                }
                model.scaled_literal_cost(color)
            }
        };
    if manager.costs[idx] > candidate {
        manager.costs[idx] = candidate;
        manager.dist_array[idx] = 1;
    }
}

/// The distance-only pass: fill `dist_array[i]` with the hop length of the
/// cheapest encoding of pixels `[0..=i]`, for every `i`. Returns the manager
/// so callers also see the settled `costs`.
fn distance_only_pass(
    xsize: usize,
    pix_count: usize,
    argb: &[u32],
    cache_bits: u8,
    chain: &HashChain,
    refs_src: &BackwardRefs,
) -> CostManager {
    let model = CostModel::build(xsize, cache_bits, refs_src);
    let mut manager = CostManager::new(pix_count, &model);
    let mut cache = (cache_bits > 0).then(|| ColorCache::new(cache_bits));

    relax_literal(argb, &model, &mut cache, 0, 0, &mut manager);

    // Offsets are >= 1, so 0 doubles as "no previous offset".
    let mut offset_prev = 0usize;
    let mut len_prev = 0usize;
    let mut offset_cost = 0i64;
    let mut first_offset_is_constant = false;
    let mut reach = 0usize;

    for i in 1..pix_count {
        let prev_cost = manager.costs[i - 1];
        let (offset, len) = chain.find_copy(i);

        relax_literal(argb, &model, &mut cache, i, prev_cost, &mut manager);

        if len >= 2 {
            if offset != offset_prev {
                let code = distance_to_plane_code(xsize, offset);
                offset_cost = model.distance_cost(code);
                first_offset_is_constant = true;
                manager.push_interval(prev_cost + offset_cost, i, len);
            } else {
                // The distance repeats, so this pixel's contributions nest
                // inside what previous pixels already pushed up to `reach`.
                // One push per run of equal offsets suffices.
                debug_assert!(len_prev >= 1);
                if first_offset_is_constant {
                    reach = i - 1 + len_prev - 1;
                    first_offset_is_constant = false;
                }

                if i + len - 1 > reach {
                    // Find the last consecutive position in [i, reach]
                    // still carrying this offset, settle it, and push from
                    // there. Positions in between keep their already pushed
                    // bounds.
                    let mut j = i;
                    let mut len_j = 0usize;
                    while j <= reach {
                        let (offset_next, len_next) = chain.find_copy(j + 1);
                        if offset_next != offset {
                            let (_, len_here) = chain.find_copy(j);
                            len_j = len_here;
                            break;
                        }
                        len_j = len_next;
                        j += 1;
                    }
                    manager.update_cost_at_index(j - 1, false);
                    manager.update_cost_at_index(j, false);
                    let base_cost = manager.costs[j - 1] + offset_cost;
                    manager.push_interval(base_cost, j, len_j);
                    reach = j + len_j - 1;
                }
            }
        }

        manager.update_cost_at_index(i, true);
        offset_prev = offset;
        len_prev = len;
    }

    manager
}

/// Pack the chosen hop lengths at the tail of `dist_array`, returning the
/// index where they start.
///
/// `dist_array = [1 x 2 x x 3 x 2]` becomes `[1 x 2 x 1 2 3 2]` with the
/// path occupying the final four slots.
fn trace_backwards(dist_array: &mut [u16]) -> usize {
    let mut path = dist_array.len();
    let mut cur = dist_array.len() as isize - 1;
    while cur >= 0 {
        let hop = dist_array[cur as usize];
        debug_assert!(hop >= 1);
        path -= 1;
        dist_array[path] = hop;
        cur -= hop as isize;
    }
    path
}

/// Re-walk the chosen path and emit the final token stream, replaying the
/// color cache exactly as a decoder will.
fn follow_chosen_path(
    argb: &[u32],
    cache_bits: u8,
    chosen_path: &[u16],
    chain: &HashChain,
) -> BackwardRefs {
    let mut refs = BackwardRefs::with_capacity(chosen_path.len());
    let mut cache = (cache_bits > 0).then(|| ColorCache::new(cache_bits));

    let mut i = 0usize;
    for &hop in chosen_path {
        let len = usize::from(hop);
        if len == 1 {
            let color = argb[i];
            match cache.as_mut() {
                Some(c) => {
                    if let Some(idx) = c.contains(color) {
                        refs.push(PixOrCopy::cache_idx(idx));
                    } else {
                        c.insert(color);
                        refs.push(PixOrCopy::literal(color));
                    }
                }
                None => refs.push(PixOrCopy::literal(color)),
            }
            i += 1;
        } else {
            let offset = chain.find_offset(i);
            refs.push(PixOrCopy::copy(len as u16, offset as u32));
            if let Some(c) = cache.as_mut() {
                for k in 0..len {
                    c.insert(argb[i + k]);
                }
            }
            i += len;
        }
    }
    debug_assert_eq!(i, argb.len());
    refs
}
