// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tiles: fixed-size blocks of drawable pixel data.

use std::rc::Rc;

/// A fixed-size rectangular block of a drawable's pixel buffer.
///
/// Tiles are the unit of cache residency. A tile's pixel bytes live behind
/// an [`Rc`] so the same bytes can be shared copy-on-write with other
/// holders (the store's swap table, or an undo snapshot taken through
/// [`TileStore::share_tile_data`]); the first write access after sharing
/// duplicates the buffer via [`Rc::make_mut`].
///
/// Tiles in the rightmost column and bottom row of a store's grid cover
/// less than the nominal `WIDTH x HEIGHT` pixels; their buffers are sized
/// to the clipped extent, so the row stride of an edge tile is smaller
/// than that of an interior tile.
///
/// [`TileStore::share_tile_data`]: crate::store::TileStore::share_tile_data
#[derive(Clone, Debug, Default)]
pub struct Tile {
    /// The tile's pixel bytes; `None` while the tile is not resident.
    pub(crate) data: Option<Rc<Vec<u8>>>,
    /// Whether the tile holds writes not yet flushed to the swap table.
    pub(crate) dirty: bool,
    /// Last-access stamp handed out by the cache clock.
    pub(crate) stamp: u64,
}

impl Tile {
    /// The nominal width of a tile in pixels.
    pub const WIDTH: u32 = 64;

    /// The nominal height of a tile in pixels.
    pub const HEIGHT: u32 = 64;

    /// Whether the tile's bytes are currently in memory.
    #[inline]
    pub fn is_resident(&self) -> bool {
        self.data.is_some()
    }

    /// Whether the tile holds writes that have not been flushed.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether the tile's bytes are shared with another holder.
    ///
    /// A shared tile is duplicated on the next write access. Note that the
    /// store's own swap table counts as a holder after a flush.
    #[inline]
    pub fn is_shared(&self) -> bool {
        matches!(&self.data, Some(data) if Rc::strong_count(data) > 1)
    }
}
