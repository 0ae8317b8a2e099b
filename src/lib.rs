//! Cost-optimal backward-reference refinement for lossless image coding.
//!
//! Copyright (C) 2026 Imazen LLC
//!
//! This program is free software: you can redistribute it and/or modify
//! it under the terms of the GNU Affero General Public License as published
//! by the Free Software Foundation, either version 3 of the License, or
//! (at your option) any later version.
//!
//! For commercial licensing inquiries: support@imazen.io
//!
//! Given an image as row-major ARGB pixels and an initial stream of LZ77
//! tokens (literals, length/distance copies, color-cache indices), this crate
//! recomputes the globally cheapest token sequence under a bit-cost model
//! derived from the initial stream — the Zopfli idea, tailored to images.
//!
//! The solver treats token choices as edges of a DAG over pixel positions and
//! runs a single left-to-right relaxation pass. Copy edges, which would
//! naively cost `O(pixels * max_copy_length)` to relax, are collapsed into a
//! sorted list of constant-cost intervals, making the pass near linear.
//!
//! # Example
//!
//! ```rust
//! use zenrefs::{greedy_backward_refs, refine_backward_references, HashChain};
//!
//! // An 8x8 image of one flat color.
//! let argb = vec![0xFF336699u32; 64];
//! let chain = HashChain::new(&argb, 75, 8);
//! let initial = greedy_backward_refs(&argb, 0, &chain);
//! let refined = refine_backward_references(8, 8, &argb, 0, &chain, &initial)?;
//! // A literal seed, one long distance-1 copy, and a final literal.
//! assert_eq!(refined.len(), 3);
//! assert_eq!(refined.pixel_span(), 64);
//! # Ok::<(), zenrefs::RefineError>(())
//! ```
//!
//! # no_std
//!
//! Works in `no_std` environments (requires `alloc`):
//! ```toml
//! [dependencies]
//! zenrefs = { version = "...", default-features = false }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

extern crate alloc;

mod backward_refs;
mod color_cache;
mod cost_manager;
mod cost_model;
mod fastlog;
mod hash_chain;
mod histogram;
mod prefix;
mod refine;
mod types;

pub use backward_refs::{distance_to_plane_code, greedy_backward_refs, plane_code_to_distance};
pub use color_cache::ColorCache;
pub use fastlog::{fast_log2, LOG_2_PRECISION_BITS};
pub use hash_chain::HashChain;
pub use histogram::{literal_alphabet_size, Histogram};
pub use prefix::prefix_encode_bits;
pub use refine::{refine_backward_references, RefineError};
pub use types::{
    argb_alpha, argb_blue, argb_green, argb_red, make_argb, BackwardRefs, PixOrCopy, MAX_LENGTH,
    MIN_LENGTH, NUM_DISTANCE_CODES, NUM_LENGTH_CODES, NUM_LITERAL_CODES, WINDOW_SIZE,
};
