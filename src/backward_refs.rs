//! Two-dimensional distance codes and the greedy reference producer.
//!
//! Distances that land on a small (dx, dy) neighborhood of the current pixel
//! compress better than their raw linear value suggests; the plane code gives
//! the 120 nearest neighbors the smallest slots of the distance alphabet and
//! shifts everything else up by 120.

use crate::color_cache::ColorCache;
use crate::hash_chain::HashChain;
use crate::types::{BackwardRefs, PixOrCopy, MIN_LENGTH, WINDOW_SIZE};

/// (dx, dy) neighborhood ordered by code. Codes 1..=120.
#[rustfmt::skip]
const DISTANCE_MAP: [(i8, i8); 120] = [
    (0, 1),  (1, 0),  (1, 1),  (-1, 1), (0, 2),  (2, 0),  (1, 2),  (-1, 2),
    (2, 1),  (-2, 1), (2, 2),  (-2, 2), (0, 3),  (3, 0),  (1, 3),  (-1, 3),
    (3, 1),  (-3, 1), (2, 3),  (-2, 3), (3, 2),  (-3, 2), (0, 4),  (4, 0),
    (1, 4),  (-1, 4), (4, 1),  (-4, 1), (3, 3),  (-3, 3), (2, 4),  (-2, 4),
    (4, 2),  (-4, 2), (0, 5),  (3, 4),  (-3, 4), (4, 3),  (-4, 3), (5, 0),
    (1, 5),  (-1, 5), (5, 1),  (-5, 1), (2, 5),  (-2, 5), (5, 2),  (-5, 2),
    (4, 4),  (-4, 4), (3, 5),  (-3, 5), (5, 3),  (-5, 3), (0, 6),  (6, 0),
    (1, 6),  (-1, 6), (6, 1),  (-6, 1), (2, 6),  (-2, 6), (6, 2),  (-6, 2),
    (4, 5),  (-4, 5), (5, 4),  (-5, 4), (3, 6),  (-3, 6), (6, 3),  (-6, 3),
    (0, 7),  (7, 0),  (1, 7),  (-1, 7), (5, 5),  (-5, 5), (7, 1),  (-7, 1),
    (4, 6),  (-4, 6), (6, 4),  (-6, 4), (2, 7),  (-2, 7), (7, 2),  (-7, 2),
    (3, 7),  (-3, 7), (7, 3),  (-7, 3), (5, 6),  (-5, 6), (6, 5),  (-6, 5),
    (8, 0),  (4, 7),  (-4, 7), (7, 4),  (-7, 4), (8, 1),  (8, 2),  (6, 6),
    (-6, 6), (8, 3),  (5, 7),  (-5, 7), (7, 5),  (-7, 5), (8, 4),  (6, 7),
    (-6, 7), (7, 6),  (-7, 6), (8, 5),  (7, 7),  (-7, 7), (8, 6),  (8, 7)
];

/// Reverse of [`DISTANCE_MAP`], indexed by `yoffset * 16 + 8 - xoffset`.
/// Valid for xoffset in [0, 8] and yoffset in [0, 7]; 255 marks unused cells.
#[rustfmt::skip]
const PLANE_TO_CODE_LUT: [u8; 128] = [
    96,  73,  55,  39,  23, 13, 5,  1,  255, 255, 255, 255, 255, 255, 255, 255,
    101, 78,  58,  42,  26, 16, 8,  2,  0,   3,   9,   17,  27,  43,  59,  79,
    102, 86,  62,  46,  32, 20, 10, 6,  4,   7,   11,  21,  33,  47,  63,  87,
    105, 90,  70,  52,  37, 28, 18, 14, 12,  15,  19,  29,  38,  53,  71,  91,
    110, 99,  82,  66,  48, 35, 30, 24, 22,  25,  31,  36,  49,  67,  83,  100,
    115, 108, 94,  76,  64, 50, 44, 40, 34,  41,  45,  51,  65,  77,  95,  109,
    118, 113, 103, 92,  80, 68, 60, 56, 54,  57,  61,  69,  81,  93,  104, 114,
    119, 116, 111, 106, 97, 88, 84, 74, 72,  75,  85,  89,  98,  107, 112, 117
];

/// Remap a raw linear distance to its plane code for an image `xsize` wide.
pub fn distance_to_plane_code(xsize: usize, dist: usize) -> u32 {
    let yoffset = dist / xsize;
    let xoffset = dist - yoffset * xsize;
    if xoffset <= 8 && yoffset < 8 {
        u32::from(PLANE_TO_CODE_LUT[yoffset * 16 + 8 - xoffset]) + 1
    } else if xoffset + 8 > xsize && yoffset < 7 {
        u32::from(PLANE_TO_CODE_LUT[(yoffset + 1) * 16 + 8 + (xsize - xoffset)]) + 1
    } else {
        (dist + 120) as u32
    }
}

/// Inverse of [`distance_to_plane_code`].
pub fn plane_code_to_distance(xsize: usize, code: u32) -> usize {
    if code > 120 {
        (code - 120) as usize
    } else {
        let (dx, dy) = DISTANCE_MAP[(code - 1) as usize];
        let dist = i32::from(dx) + i32::from(dy) * xsize as i32;
        dist.max(1) as usize
    }
}

/// Produce an initial reference stream with a single greedy pass.
///
/// Takes the chain's best match at every position when it is at least
/// [`MIN_LENGTH`] pixels, otherwise falls back to a cache index or literal.
/// The result seeds the cost model of
/// [`refine_backward_references`](crate::refine_backward_references).
pub fn greedy_backward_refs(argb: &[u32], cache_bits: u8, chain: &HashChain) -> BackwardRefs {
    let size = argb.len();
    let mut refs = BackwardRefs::with_capacity(size / 2);
    let mut cache = (cache_bits > 0).then(|| ColorCache::new(cache_bits));

    let mut pos = 0;
    while pos < size {
        let (dist, len) = chain.find_copy(pos);
        if len >= MIN_LENGTH && dist > 0 && dist <= WINDOW_SIZE {
            refs.push(PixOrCopy::copy(len as u16, dist as u32));
            if let Some(c) = cache.as_mut() {
                for k in 0..len {
                    c.insert(argb[pos + k]);
                }
            }
            pos += len;
        } else {
            let color = argb[pos];
            match cache.as_mut() {
                Some(c) => {
                    if let Some(idx) = c.contains(color) {
                        refs.push(PixOrCopy::cache_idx(idx));
                    } else {
                        refs.push(PixOrCopy::literal(color));
                    }
                    c.insert(color);
                }
                None => refs.push(PixOrCopy::literal(color)),
            }
            pos += 1;
        }
    }
    refs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_code_roundtrip() {
        let xsize = 100;
        for dist in 1..=200 {
            let code = distance_to_plane_code(xsize, dist);
            assert_eq!(plane_code_to_distance(xsize, code), dist, "dist {dist}");
        }
    }

    #[test]
    fn test_neighborhood_codes() {
        let xsize = 100;
        // Previous pixel is (dx=1, dy=0): code 2. Pixel above is (0, 1): code 1.
        assert_eq!(distance_to_plane_code(xsize, 1), 2);
        assert_eq!(distance_to_plane_code(xsize, xsize), 1);
    }

    #[test]
    fn test_far_distances_shift_by_120() {
        let xsize = 10;
        let dist = 9 * xsize + 5;
        assert_eq!(distance_to_plane_code(xsize, dist), (dist + 120) as u32);
    }

    #[test]
    fn test_greedy_uniform_run() {
        let pixels = vec![0xFF000000u32; 100];
        let chain = HashChain::new(&pixels, 75, 10);
        let refs = greedy_backward_refs(&pixels, 0, &chain);
        assert!(refs.tokens[0].is_literal());
        assert!(refs.tokens[1].is_copy());
        assert_eq!(refs.pixel_span(), 100);
    }

    #[test]
    fn test_greedy_covers_image_exactly() {
        let mut pixels = Vec::new();
        for i in 0u32..333 {
            pixels.push(0xFF000000 | (i * 17 % 11));
        }
        let chain = HashChain::new(&pixels, 75, 37);
        let refs = greedy_backward_refs(&pixels, 4, &chain);
        assert_eq!(refs.pixel_span(), 333);
    }
}
