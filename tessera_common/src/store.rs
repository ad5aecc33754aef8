// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tile-backed storage for one drawable's pixel data.

use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, trace};
use thiserror::Error;

use crate::cache::TileCache;
use crate::rect::IntRect;
use crate::tile::Tile;

/// Errors raised by tile and pixel access.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum StoreError {
    /// A coordinate outside the store's grid was requested.
    ///
    /// The coordinate and grid size are in tiles for tile-level access and
    /// in pixels for pixel-level access.
    #[error("coordinate ({x}, {y}) is outside the {width}x{height} grid")]
    OutOfBounds {
        /// Requested horizontal coordinate.
        x: u32,
        /// Requested vertical coordinate.
        y: u32,
        /// Grid extent in the horizontal direction.
        width: u32,
        /// Grid extent in the vertical direction.
        height: u32,
    },
    /// Write access was requested through a store marked read-only.
    #[error("write access to a read-only tile store")]
    ReadOnlyViolation,
}

/// Chunked storage for one drawable's pixel data.
///
/// Pixels are organized as a grid of [`Tile::WIDTH`]` x `[`Tile::HEIGHT`]
/// tiles. Every pixel of the store maps to exactly one tile and one offset
/// within it; tiles in the rightmost column and bottom row may extend past
/// the logical bounds and are clipped on access (their buffers are sized to
/// the clipped extent).
///
/// Tiles are faulted in lazily. A tile that has never been written reads as
/// all zeroes. [`flush`](Self::flush) commits dirty tiles into the store's
/// swap table (an in-memory stand-in for a tile swap file), after which
/// their buffers may be dropped under cache pressure and later re-faulted
/// from the swap table. Dirty tiles are never evicted.
#[derive(Debug)]
pub struct TileStore {
    width: u32,
    height: u32,
    bpp: usize,
    tile_cols: u32,
    tile_rows: u32,
    tiles: Vec<Tile>,
    /// Committed bytes of every tile that has ever been flushed, keyed by
    /// tile index. Shares buffers with resident tiles via `Rc`; a write
    /// after a flush copies-on-write, leaving the committed bytes intact.
    swap: HashMap<u32, Rc<Vec<u8>>>,
    cache: TileCache,
    read_only: bool,
}

impl TileStore {
    /// Create a store covering `width x height` pixels of `bpp` bytes each.
    ///
    /// All pixels initially read as zero.
    ///
    /// # Panics
    ///
    /// Panics if `width`, `height`, or `bpp` is zero.
    pub fn new(width: u32, height: u32, bpp: usize, cache: &TileCache) -> Self {
        assert!(
            width > 0 && height > 0 && bpp > 0,
            "tile store must have non-zero extent and pixel size"
        );
        let tile_cols = width.div_ceil(Tile::WIDTH);
        let tile_rows = height.div_ceil(Tile::HEIGHT);
        Self {
            width,
            height,
            bpp,
            tile_cols,
            tile_rows,
            tiles: vec![Tile::default(); tile_cols as usize * tile_rows as usize],
            swap: HashMap::new(),
            cache: cache.clone(),
            read_only: false,
        }
    }

    /// The store's width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// The store's height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per pixel.
    #[inline]
    pub fn bpp(&self) -> usize {
        self.bpp
    }

    /// The number of tile columns in the grid.
    #[inline]
    pub fn tile_cols(&self) -> u32 {
        self.tile_cols
    }

    /// The number of tile rows in the grid.
    #[inline]
    pub fn tile_rows(&self) -> u32 {
        self.tile_rows
    }

    /// Mark the store read-only (or writable again).
    ///
    /// Write access to a read-only store fails with
    /// [`StoreError::ReadOnlyViolation`]. This is the guard a host puts on
    /// stores it hands to code that is only supposed to read them.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Whether the store is marked read-only.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// The absolute pixel rectangle the tile at `(tx, ty)` covers, clipped
    /// to the store's bounds.
    pub fn tile_bounds(&self, tx: u32, ty: u32) -> Result<IntRect, StoreError> {
        self.index(tx, ty)?;
        let x0 = tx * Tile::WIDTH;
        let y0 = ty * Tile::HEIGHT;
        Ok(IntRect {
            x0,
            y0,
            x1: (x0 + Tile::WIDTH).min(self.width),
            y1: (y0 + Tile::HEIGHT).min(self.height),
        })
    }

    /// Read access to the tile at `(tx, ty)`, faulting it in if needed.
    ///
    /// The returned slice is the tile's whole (clipped) buffer, row-major
    /// with a stride of `tile_bounds(tx, ty).width() * bpp` bytes.
    pub fn tile_data(&mut self, tx: u32, ty: u32) -> Result<&[u8], StoreError> {
        let idx = self.index(tx, ty)?;
        self.fault(idx);
        Ok(self.tiles[idx as usize]
            .data
            .as_ref()
            .expect("tile is resident after fault")
            .as_slice())
    }

    /// Write access to the tile at `(tx, ty)`, faulting it in if needed.
    ///
    /// Marks the tile dirty. If the tile's buffer is shared (with the swap
    /// table or a snapshot), it is duplicated first, so holders of the old
    /// bytes are unaffected.
    pub fn tile_data_mut(&mut self, tx: u32, ty: u32) -> Result<&mut [u8], StoreError> {
        if self.read_only {
            return Err(StoreError::ReadOnlyViolation);
        }
        let idx = self.index(tx, ty)?;
        self.fault(idx);
        let tile = &mut self.tiles[idx as usize];
        tile.dirty = true;
        let data = tile.data.as_mut().expect("tile is resident after fault");
        Ok(Rc::make_mut(data).as_mut_slice())
    }

    /// Hand out a shared reference to the tile's current bytes.
    ///
    /// This is the hook an undo/snapshot layer uses: the returned buffer
    /// stays valid and unchanged for as long as the caller holds it, while
    /// the store transparently copies-on-write at the next write access.
    pub fn share_tile_data(&mut self, tx: u32, ty: u32) -> Result<Rc<Vec<u8>>, StoreError> {
        let idx = self.index(tx, ty)?;
        self.fault(idx);
        Ok(Rc::clone(
            self.tiles[idx as usize]
                .data
                .as_ref()
                .expect("tile is resident after fault"),
        ))
    }

    /// Whether the tile at `(tx, ty)` holds unflushed writes.
    pub fn is_tile_dirty(&self, tx: u32, ty: u32) -> Result<bool, StoreError> {
        let idx = self.index(tx, ty)?;
        Ok(self.tiles[idx as usize].dirty)
    }

    /// Commit all dirty tiles to the swap table and clear their dirty
    /// flags.
    ///
    /// After a flush, clean tiles may be evicted under cache pressure and
    /// re-faulted later without data loss.
    pub fn flush(&mut self) {
        let mut flushed = 0_u32;
        for (idx, tile) in self.tiles.iter_mut().enumerate() {
            if tile.dirty {
                let data = tile.data.as_ref().expect("dirty tiles are resident");
                self.swap.insert(idx as u32, Rc::clone(data));
                tile.dirty = false;
                flushed += 1;
            }
        }
        if flushed > 0 {
            debug!("flushed {flushed} dirty tiles to swap");
        }
    }

    /// Read the pixel at `(x, y)`.
    pub fn pixel(&mut self, x: u32, y: u32) -> Result<&[u8], StoreError> {
        let (off, len) = self.pixel_span(x, y)?;
        let (tx, ty) = (x / Tile::WIDTH, y / Tile::HEIGHT);
        let data = self.tile_data(tx, ty)?;
        Ok(&data[off..off + len])
    }

    /// Write access to the pixel at `(x, y)`.
    pub fn pixel_mut(&mut self, x: u32, y: u32) -> Result<&mut [u8], StoreError> {
        let (off, len) = self.pixel_span(x, y)?;
        let (tx, ty) = (x / Tile::WIDTH, y / Tile::HEIGHT);
        let data = self.tile_data_mut(tx, ty)?;
        Ok(&mut data[off..off + len])
    }

    /// The number of tiles currently resident.
    pub fn resident_tiles(&self) -> usize {
        self.tiles.iter().filter(|t| t.is_resident()).count()
    }

    fn index(&self, tx: u32, ty: u32) -> Result<u32, StoreError> {
        if tx >= self.tile_cols || ty >= self.tile_rows {
            return Err(StoreError::OutOfBounds {
                x: tx,
                y: ty,
                width: self.tile_cols,
                height: self.tile_rows,
            });
        }
        Ok(ty * self.tile_cols + tx)
    }

    /// Byte offset and length of pixel `(x, y)` within its tile's buffer.
    fn pixel_span(&self, x: u32, y: u32) -> Result<(usize, usize), StoreError> {
        if x >= self.width || y >= self.height {
            return Err(StoreError::OutOfBounds {
                x,
                y,
                width: self.width,
                height: self.height,
            });
        }
        let ewidth = (self.width - (x / Tile::WIDTH) * Tile::WIDTH).min(Tile::WIDTH);
        let stride = ewidth as usize * self.bpp;
        let off = (y % Tile::HEIGHT) as usize * stride + (x % Tile::WIDTH) as usize * self.bpp;
        Ok((off, self.bpp))
    }

    /// Clipped byte length of the tile at flat index `idx`.
    fn tile_len(&self, idx: u32) -> usize {
        let tx = idx % self.tile_cols;
        let ty = idx / self.tile_cols;
        let ewidth = (self.width - tx * Tile::WIDTH).min(Tile::WIDTH);
        let eheight = (self.height - ty * Tile::HEIGHT).min(Tile::HEIGHT);
        ewidth as usize * eheight as usize * self.bpp
    }

    /// Ensure the tile at `idx` is resident and stamp it as most recently
    /// used, evicting this store's own LRU clean tiles if the shared cache
    /// went over budget.
    fn fault(&mut self, idx: u32) {
        if !self.tiles[idx as usize].is_resident() {
            let bytes = self.tile_len(idx);
            let data = match self.swap.get(&idx) {
                Some(saved) => Rc::clone(saved),
                None => Rc::new(vec![0; bytes]),
            };
            self.tiles[idx as usize].data = Some(data);
            self.cache.charge(bytes);
            trace!("faulted in tile {idx} ({bytes} bytes)");
            self.reclaim(idx);
        }
        self.tiles[idx as usize].stamp = self.cache.next_stamp();
    }

    /// Drop LRU clean tiles (other than `protect`) while the cache is over
    /// budget. Stops when no evictable tile remains in this store.
    fn reclaim(&mut self, protect: u32) {
        while self.cache.over_budget() {
            let victim = self
                .tiles
                .iter()
                .enumerate()
                .filter(|(idx, t)| *idx as u32 != protect && t.is_resident() && !t.is_dirty())
                .min_by_key(|(_, t)| t.stamp)
                .map(|(idx, _)| idx as u32);
            let Some(victim) = victim else {
                break;
            };
            self.tiles[victim as usize].data = None;
            let bytes = self.tile_len(victim);
            self.cache.release(bytes);
            self.cache.note_eviction();
            trace!("evicted tile {victim} ({bytes} bytes)");
        }
    }
}

impl Drop for TileStore {
    fn drop(&mut self) {
        for idx in 0..self.tiles.len() as u32 {
            if self.tiles[idx as usize].is_resident() {
                self.cache.release(self.tile_len(idx));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BPP: usize = 3;

    fn store(width: u32, height: u32) -> TileStore {
        TileStore::new(width, height, BPP, &TileCache::unbounded())
    }

    #[test]
    fn grid_dimensions_round_up() {
        let s = store(130, 65);
        assert_eq!(s.tile_cols(), 3);
        assert_eq!(s.tile_rows(), 2);
    }

    #[test]
    fn edge_tiles_are_clipped() {
        let s = store(130, 65);
        assert_eq!(
            s.tile_bounds(0, 0).unwrap(),
            IntRect::new(0, 0, 64, 64)
        );
        assert_eq!(
            s.tile_bounds(2, 1).unwrap(),
            IntRect::new(128, 64, 130, 65)
        );
    }

    #[test]
    fn tile_access_out_of_grid() {
        let mut s = store(130, 65);
        assert_eq!(
            s.tile_data(3, 0),
            Err(StoreError::OutOfBounds {
                x: 3,
                y: 0,
                width: 3,
                height: 2
            })
        );
    }

    #[test]
    fn unwritten_tiles_read_as_zero() {
        let mut s = store(70, 70);
        assert!(s.tile_data(1, 1).unwrap().iter().all(|&b| b == 0));
        assert_eq!(s.pixel(69, 69).unwrap(), &[0, 0, 0]);
    }

    #[test]
    fn writes_round_trip_through_pixels() {
        let mut s = store(130, 65);
        s.pixel_mut(70, 10).unwrap().copy_from_slice(&[1, 2, 3]);
        assert_eq!(s.pixel(70, 10).unwrap(), &[1, 2, 3]);
        assert!(s.is_tile_dirty(1, 0).unwrap());
        assert!(!s.is_tile_dirty(0, 0).unwrap());
    }

    #[test]
    fn read_only_store_rejects_writes() {
        let mut s = store(10, 10);
        s.set_read_only(true);
        assert_eq!(s.tile_data_mut(0, 0), Err(StoreError::ReadOnlyViolation));
        assert_eq!(s.pixel_mut(0, 0), Err(StoreError::ReadOnlyViolation));
        assert!(s.tile_data(0, 0).is_ok());
    }

    #[test]
    fn flush_clears_dirty_flags() {
        let mut s = store(10, 10);
        s.pixel_mut(0, 0).unwrap().fill(9);
        assert!(s.is_tile_dirty(0, 0).unwrap());
        s.flush();
        assert!(!s.is_tile_dirty(0, 0).unwrap());
        assert_eq!(s.pixel(0, 0).unwrap(), &[9, 9, 9]);
    }

    #[test]
    fn eviction_preserves_flushed_data() {
        // Budget fits roughly one interior tile.
        let cache = TileCache::new(Tile::WIDTH as usize * Tile::HEIGHT as usize * BPP + 1);
        let mut s = TileStore::new(200, 200, BPP, &cache);
        s.pixel_mut(0, 0).unwrap().copy_from_slice(&[7, 8, 9]);
        s.flush();
        // Touch other tiles to push the first one out.
        for tx in 1..s.tile_cols() {
            let _ = s.tile_data(tx, 0).unwrap();
        }
        assert!(cache.evictions() > 0);
        // The evicted tile re-faults from swap with its data intact.
        assert_eq!(s.pixel(0, 0).unwrap(), &[7, 8, 9]);
    }

    #[test]
    fn dirty_tiles_are_never_evicted() {
        let cache = TileCache::new(1);
        let mut s = TileStore::new(200, 64, BPP, &cache);
        s.pixel_mut(0, 0).unwrap().copy_from_slice(&[1, 1, 1]);
        s.pixel_mut(64, 0).unwrap().copy_from_slice(&[2, 2, 2]);
        s.pixel_mut(128, 0).unwrap().copy_from_slice(&[3, 3, 3]);
        // Every tile is dirty, so nothing could be evicted despite the
        // one-byte budget.
        assert_eq!(s.resident_tiles(), 3);
        assert_eq!(s.pixel(0, 0).unwrap(), &[1, 1, 1]);
    }

    #[test]
    fn shared_tile_data_is_copy_on_write() {
        let mut s = store(64, 64);
        s.pixel_mut(5, 5).unwrap().copy_from_slice(&[4, 5, 6]);
        let snapshot = s.share_tile_data(0, 0).unwrap();
        s.pixel_mut(5, 5).unwrap().copy_from_slice(&[9, 9, 9]);
        // The snapshot still sees the old bytes.
        let stride = 64 * BPP;
        let off = 5 * stride + 5 * BPP;
        assert_eq!(&snapshot[off..off + BPP], &[4, 5, 6]);
        assert_eq!(s.pixel(5, 5).unwrap(), &[9, 9, 9]);
    }

    #[test]
    fn drop_releases_residency() {
        let cache = TileCache::unbounded();
        {
            let mut s = TileStore::new(64, 64, BPP, &cache);
            let _ = s.tile_data(0, 0).unwrap();
            assert!(cache.resident_bytes() > 0);
        }
        assert_eq!(cache.resident_bytes(), 0);
    }
}
