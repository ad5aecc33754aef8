// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tessera is a tile-aligned pixel-region iteration engine for raster
//! image processing.
//!
//! Image data lives in tile-backed stores with bounded residency
//! (see [`tessera_common`]); filter code asks the engine to iterate a
//! rectangle of interest, and the engine delivers a sequence of
//! tile-aligned chunks, each a zero-copy [`Region`] view into exactly one
//! tile of every participating store. Write access goes through a shadow
//! store that is merged back, and flagged for redisplay, once the whole
//! rectangle has been delivered.
//!
//! # Example
//!
//! ```
//! use tessera::{iterate_src_dest, Drawable, IterateOptions, TileCache};
//!
//! let cache = TileCache::unbounded();
//! let mut drawable = Drawable::new(130, 65, 3, &cache);
//! // Invert every channel of every pixel.
//! iterate_src_dest(&mut drawable, IterateOptions::new(), |_x, _y, src, dest| {
//!     for (s, d) in src.iter().zip(dest.iter_mut()) {
//!         *d = 255 - s;
//!     }
//! })
//! .unwrap();
//! assert_eq!(drawable.pixel(70, 10).unwrap(), &[255, 255, 255]);
//! ```
//!
//! # Features
//!
//! - `png` (enabled by default): Allow loading and saving
//!   [`Pixmap`]s as PNG images.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![warn(clippy::print_stdout, clippy::print_stderr)]
#![forbid(unsafe_code)]

mod chunks;
mod drawable;
mod iter;
mod progress;
mod region;
mod shadow;

/// Core data structures: tiles, stores, the cache, rectangles, pixmaps.
pub use tessera_common;

pub use chunks::{Chunk, Chunks};
pub use drawable::{Drawable, Image};
pub use iter::{
    for_each_chunk_dest, for_each_chunk_n, for_each_chunk_src, for_each_chunk_src_dest,
    for_each_chunk_src_to_dest, iterate_dest, iterate_rows_dest, iterate_rows_src,
    iterate_rows_src_dest, iterate_src, iterate_src_dest, IterateOptions,
};
pub use progress::{Cadence, Cancelled, ProgressSink, PULSE};
pub use region::{Region, RegionMut};
pub use tessera_common::{IntRect, Pixmap, StoreError, Tile, TileCache, TileStore};

use thiserror::Error;

/// Errors that can occur during region iteration.
#[derive(Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Tile or pixel access outside the drawable's grid, or a write
    /// through a read-only store.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Shadow writeback could not commit every tile.
    ///
    /// The merge is not atomic: tiles merged before the failure remain
    /// merged. `rect` is the sub-rectangle that failed.
    #[error("failed to merge shadow tiles back over {rect:?}")]
    MergeFailed {
        /// The sub-rectangle that could not be merged.
        rect: IntRect,
    },
    /// The progress sink asked for the iteration to stop. No shadow merge
    /// was performed for the cancelled call.
    #[error("iteration cancelled by the progress sink")]
    Cancelled,
}

pub(crate) type Result<T, E = Error> = std::result::Result<T, E>;
