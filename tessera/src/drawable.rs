// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Images and the drawables they own.

use log::debug;
use tessera_common::cache::TileCache;
use tessera_common::pixmap::Pixmap;
use tessera_common::rect::IntRect;
use tessera_common::store::TileStore;

use crate::shadow;
use crate::Result;

/// A canvas owning zero or more drawables.
///
/// The image carries the shared tile cache its drawables allocate from and
/// the current selection rectangle, which supplies the default region of
/// interest for iteration calls that do not pass one explicitly.
#[derive(Debug)]
pub struct Image {
    width: u32,
    height: u32,
    cache: TileCache,
    drawables: Vec<Drawable>,
    selection: Option<IntRect>,
}

impl Image {
    /// Create an empty image of the given canvas size.
    pub fn new(width: u32, height: u32, cache: &TileCache) -> Self {
        Self {
            width,
            height,
            cache: cache.clone(),
            drawables: Vec::new(),
            selection: None,
        }
    }

    /// The canvas width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// The canvas height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The tile cache this image's drawables allocate from.
    pub fn cache(&self) -> &TileCache {
        &self.cache
    }

    /// Add a drawable of the given size and pixel depth at an offset within
    /// the canvas, returning its index.
    pub fn add_drawable(
        &mut self,
        width: u32,
        height: u32,
        bpp: usize,
        offset_x: u32,
        offset_y: u32,
    ) -> usize {
        let mut drawable = Drawable::new(width, height, bpp, &self.cache);
        drawable.offset_x = offset_x;
        drawable.offset_y = offset_y;
        drawable.mask = local_mask(self.selection, &drawable);
        self.drawables.push(drawable);
        self.drawables.len() - 1
    }

    /// The drawable at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn drawable(&self, index: usize) -> &Drawable {
        &self.drawables[index]
    }

    /// Mutable access to the drawable at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn drawable_mut(&mut self, index: usize) -> &mut Drawable {
        &mut self.drawables[index]
    }

    /// The current selection rectangle in canvas coordinates, if any.
    pub fn selection(&self) -> Option<IntRect> {
        self.selection
    }

    /// Replace the selection and propagate the resulting mask bounds to
    /// every drawable.
    pub fn set_selection(&mut self, selection: Option<IntRect>) {
        self.selection = selection;
        for drawable in &mut self.drawables {
            drawable.mask = local_mask(selection, drawable);
        }
    }
}

/// The selection clipped to a drawable and shifted into its local
/// coordinates.
fn local_mask(selection: Option<IntRect>, drawable: &Drawable) -> Option<IntRect> {
    let selection = selection?;
    let extent = IntRect::from_xywh(
        drawable.offset_x,
        drawable.offset_y,
        drawable.width,
        drawable.height,
    );
    let clipped = selection.intersect(&extent);
    Some(IntRect {
        x0: clipped.x0 - drawable.offset_x,
        y0: clipped.y0 - drawable.offset_y,
        x1: clipped.x1 - drawable.offset_x,
        y1: clipped.y1 - drawable.offset_y,
    })
}

/// A paintable surface: one canonical tile store plus an on-demand shadow
/// store that buffers writes until they are merged.
///
/// Drawables are mutated through write iterations (which land in the
/// shadow and merge on completion) or through the direct pixel accessors;
/// either way, [`flush`](Self::flush) commits dirty tiles so they survive
/// cache eviction.
#[derive(Debug)]
pub struct Drawable {
    width: u32,
    height: u32,
    bpp: usize,
    offset_x: u32,
    offset_y: u32,
    tiles: TileStore,
    shadow: Option<TileStore>,
    cache: TileCache,
    /// Selection bounds in drawable-local coordinates, kept current by the
    /// owning image.
    mask: Option<IntRect>,
    /// Area changed by shadow merges since the host last asked.
    pending_update: Option<IntRect>,
}

impl Drawable {
    /// Create a drawable with all pixels zero.
    ///
    /// # Panics
    ///
    /// Panics if `width`, `height`, or `bpp` is zero.
    pub fn new(width: u32, height: u32, bpp: usize, cache: &TileCache) -> Self {
        Self {
            width,
            height,
            bpp,
            offset_x: 0,
            offset_y: 0,
            tiles: TileStore::new(width, height, bpp, cache),
            shadow: None,
            cache: cache.clone(),
            mask: None,
            pending_update: None,
        }
    }

    /// Create a drawable holding a copy of a pixmap's pixels.
    ///
    /// The imported tiles are flushed, so they can be evicted and
    /// re-faulted without data loss.
    ///
    /// # Panics
    ///
    /// Panics if the pixmap has zero extent.
    pub fn from_pixmap(pixmap: &Pixmap, cache: &TileCache) -> Self {
        let bpp = pixmap.bpp();
        let mut drawable = Self::new(pixmap.width(), pixmap.height(), bpp, cache);
        for ty in 0..drawable.tiles.tile_rows() {
            for tx in 0..drawable.tiles.tile_cols() {
                let bounds = drawable
                    .tiles
                    .tile_bounds(tx, ty)
                    .expect("tile is inside the grid");
                let stride = bounds.width() as usize * bpp;
                let data = drawable
                    .tiles
                    .tile_data_mut(tx, ty)
                    .expect("tile is inside the grid");
                for (row, y) in (bounds.y0..bounds.y1).enumerate() {
                    let src = &pixmap.row(y)[bounds.x0 as usize * bpp..bounds.x1 as usize * bpp];
                    data[row * stride..row * stride + src.len()].copy_from_slice(src);
                }
            }
        }
        drawable.tiles.flush();
        drawable
    }

    /// Copy the drawable's pixels into a new pixmap.
    pub fn to_pixmap(&mut self) -> Pixmap {
        let bpp = self.bpp;
        let mut pixmap = Pixmap::new(self.width, self.height, bpp);
        for ty in 0..self.tiles.tile_rows() {
            for tx in 0..self.tiles.tile_cols() {
                let bounds = self
                    .tiles
                    .tile_bounds(tx, ty)
                    .expect("tile is inside the grid");
                let stride = bounds.width() as usize * bpp;
                let data = self
                    .tiles
                    .tile_data(tx, ty)
                    .expect("tile is inside the grid");
                for (row, y) in (bounds.y0..bounds.y1).enumerate() {
                    let dest =
                        &mut pixmap.row_mut(y)[bounds.x0 as usize * bpp..bounds.x1 as usize * bpp];
                    dest.copy_from_slice(&data[row * stride..row * stride + dest.len()]);
                }
            }
        }
        pixmap
    }

    /// The drawable's width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// The drawable's height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per pixel.
    #[inline]
    pub fn bpp(&self) -> usize {
        self.bpp
    }

    /// The drawable's offset within its image's canvas.
    #[inline]
    pub fn offset(&self) -> (u32, u32) {
        (self.offset_x, self.offset_y)
    }

    /// The drawable's full extent in local coordinates.
    pub fn bounds(&self) -> IntRect {
        IntRect::from_xywh(0, 0, self.width, self.height)
    }

    /// The default region of interest: the image selection clipped to this
    /// drawable (possibly empty), or the full extent when nothing is
    /// selected.
    pub fn mask_bounds(&self) -> IntRect {
        self.mask.unwrap_or_else(|| self.bounds())
    }

    /// Read the pixel at `(x, y)`.
    pub fn pixel(&mut self, x: u32, y: u32) -> Result<&[u8]> {
        Ok(self.tiles.pixel(x, y)?)
    }

    /// Overwrite the pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `pixel` is not `bpp` bytes long.
    pub fn put_pixel(&mut self, x: u32, y: u32, pixel: &[u8]) -> Result<()> {
        assert_eq!(pixel.len(), self.bpp, "pixel must be `bpp` bytes");
        self.tiles.pixel_mut(x, y)?.copy_from_slice(pixel);
        Ok(())
    }

    /// Set every byte of every pixel to `value`.
    pub fn fill(&mut self, value: u8) -> Result<()> {
        for ty in 0..self.tiles.tile_rows() {
            for tx in 0..self.tiles.tile_cols() {
                self.tiles.tile_data_mut(tx, ty)?.fill(value);
            }
        }
        Ok(())
    }

    /// Commit dirty tiles so they survive cache eviction.
    pub fn flush(&mut self) {
        self.tiles.flush();
    }

    /// The canonical tile store.
    pub fn store(&self) -> &TileStore {
        &self.tiles
    }

    pub(crate) fn store_mut(&mut self) -> &mut TileStore {
        &mut self.tiles
    }

    /// Canonical and shadow stores at once, creating the shadow on first
    /// use. The disjoint borrows let a read-write iteration read committed
    /// pixels while writing the shadow.
    pub(crate) fn split_tiles_shadow(&mut self) -> (&mut TileStore, &mut TileStore) {
        if self.shadow.is_none() {
            debug!(
                "opening {}x{} shadow store ({} bpp)",
                self.width, self.height, self.bpp
            );
            self.shadow = Some(TileStore::new(
                self.width,
                self.height,
                self.bpp,
                &self.cache,
            ));
        }
        let Self { tiles, shadow, .. } = self;
        (tiles, shadow.as_mut().expect("shadow was just created"))
    }

    pub(crate) fn shadow_mut(&mut self) -> &mut TileStore {
        self.split_tiles_shadow().1
    }

    /// Drop the shadow store, discarding any unmerged writes.
    pub fn discard_shadow(&mut self) {
        self.shadow = None;
    }

    /// Merge shadow writes over `roi` back into the canonical store and
    /// record `roi` for redisplay.
    ///
    /// Without an open shadow store this is a no-op. The merge is not
    /// atomic across tiles; see [`Error::MergeFailed`](crate::Error).
    pub fn merge_shadow(&mut self, roi: IntRect) -> Result<()> {
        let Some(shadow_store) = self.shadow.as_mut() else {
            debug!("shadow merge requested without an open shadow store");
            return Ok(());
        };
        shadow::merge(&mut self.tiles, shadow_store, roi)?;
        if !roi.is_empty() {
            self.pending_update = Some(match self.pending_update {
                Some(pending) => pending.union(&roi),
                None => roi,
            });
        }
        debug!("merged shadow over {roi:?}");
        Ok(())
    }

    /// The area changed by shadow merges since the last call, cleared on
    /// read. Hosts poll this to know what to redisplay.
    pub fn take_update_rect(&mut self) -> Option<IntRect> {
        self.pending_update.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> TileCache {
        TileCache::unbounded()
    }

    #[test]
    fn pixmap_round_trip() {
        let mut pixmap = Pixmap::new(130, 65, 3);
        for (i, byte) in pixmap.data_mut().iter_mut().enumerate() {
            *byte = (i % 253) as u8;
        }
        let mut drawable = Drawable::from_pixmap(&pixmap, &cache());
        let out = drawable.to_pixmap();
        assert_eq!(out.data(), pixmap.data());
    }

    #[test]
    fn pixels_read_and_write() {
        let mut drawable = Drawable::new(100, 50, 2, &cache());
        drawable.put_pixel(99, 49, &[7, 11]).unwrap();
        assert_eq!(drawable.pixel(99, 49).unwrap(), &[7, 11]);
        assert!(drawable.pixel(100, 0).is_err());
    }

    #[test]
    fn selection_clips_to_each_drawable() {
        let c = cache();
        let mut image = Image::new(200, 200, &c);
        let full = image.add_drawable(200, 200, 3, 0, 0);
        let offset = image.add_drawable(50, 50, 3, 100, 100);
        image.set_selection(Some(IntRect::new(90, 90, 120, 120)));
        assert_eq!(
            image.drawable(full).mask_bounds(),
            IntRect::new(90, 90, 120, 120)
        );
        assert_eq!(
            image.drawable(offset).mask_bounds(),
            IntRect::new(0, 0, 20, 20)
        );
        image.set_selection(None);
        assert_eq!(
            image.drawable(offset).mask_bounds(),
            IntRect::new(0, 0, 50, 50)
        );
    }

    #[test]
    fn selection_outside_drawable_is_empty() {
        let c = cache();
        let mut image = Image::new(200, 200, &c);
        let idx = image.add_drawable(50, 50, 1, 0, 0);
        image.set_selection(Some(IntRect::new(100, 100, 150, 150)));
        assert!(image.drawable(idx).mask_bounds().is_empty());
    }

    #[test]
    fn merge_records_update_rect() {
        let mut drawable = Drawable::new(100, 100, 1, &cache());
        drawable.shadow_mut().tile_data_mut(0, 0).unwrap().fill(1);
        drawable.merge_shadow(IntRect::new(0, 0, 10, 10)).unwrap();
        drawable.merge_shadow(IntRect::new(20, 20, 30, 30)).unwrap();
        assert_eq!(
            drawable.take_update_rect(),
            Some(IntRect::new(0, 0, 30, 30))
        );
        assert_eq!(drawable.take_update_rect(), None);
    }

    #[test]
    fn merge_without_shadow_is_a_no_op() {
        let mut drawable = Drawable::new(10, 10, 1, &cache());
        drawable.merge_shadow(IntRect::new(0, 0, 10, 10)).unwrap();
        assert_eq!(drawable.take_update_rect(), None);
        assert_eq!(drawable.pixel(0, 0).unwrap(), &[0]);
    }
}
