// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The region-iteration drivers.
//!
//! Every entry point decomposes a region of interest into tile-aligned
//! chunks ([`Chunks`]), delivers each chunk to the supplied callback as one
//! zero-copy [`Region`]/[`RegionMut`] per participating store, reports
//! progress at the configured cadence, and for write variants merges
//! the drawable's shadow store back once the whole ROI has been delivered.
//!
//! The callback set is deliberately closed: read-only, read-write,
//! write-only, each at chunk, row, and pixel granularity, plus an N-source
//! synchronized form. Write callbacks see the drawable's *shadow*, so a
//! read-write iteration never observes its own earlier writes; pixels
//! become authoritative only at the final merge.

use smallvec::SmallVec;
use tessera_common::rect::IntRect;
use tessera_common::store::{StoreError, TileStore};
use tessera_common::tile::Tile;

use crate::chunks::{Chunk, Chunks};
use crate::drawable::Drawable;
use crate::progress::{Cadence, ProgressSink};
use crate::region::{Region, RegionMut};
use crate::{Error, Result};

/// Per-call knobs for the `iterate_*` and `for_each_chunk_*` entry points.
pub struct IterateOptions<'a> {
    /// Rectangle of interest in drawable coordinates. `None` asks the
    /// drawable for its mask bounds (the image selection clipped to the
    /// drawable, or the full extent).
    pub roi: Option<IntRect>,
    /// How often to report progress.
    pub cadence: Cadence,
    /// Where to report progress; `None` disables reporting.
    pub progress: Option<&'a mut dyn ProgressSink>,
}

impl Default for IterateOptions<'_> {
    fn default() -> Self {
        Self {
            roi: None,
            cadence: Cadence::default(),
            progress: None,
        }
    }
}

impl<'a> IterateOptions<'a> {
    /// Options with every knob at its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Options with an explicit region of interest.
    pub fn with_roi(roi: IntRect) -> Self {
        Self {
            roi: Some(roi),
            ..Self::default()
        }
    }
}

/// The cursor state of one running iteration: pixels delivered so far and
/// the progress-report bookkeeping.
struct IterationState<'a> {
    total: u64,
    done: u64,
    rows_since_report: u32,
    reported_full: bool,
    cadence: Cadence,
    sink: Option<&'a mut dyn ProgressSink>,
}

impl<'a> IterationState<'a> {
    fn new(total: u64, cadence: Cadence, sink: Option<&'a mut dyn ProgressSink>) -> Self {
        Self {
            total,
            done: 0,
            rows_since_report: 0,
            reported_full: false,
            cadence,
            sink,
        }
    }

    /// Account for `rows` freshly processed rows covering `pixels` pixels,
    /// reporting progress if the cadence came due.
    fn advance(&mut self, rows: u32, pixels: u64, chunk_done: bool) -> Result<()> {
        self.done += pixels;
        debug_assert!(self.done <= self.total, "delivered more pixels than the ROI holds");
        let due = match self.cadence {
            Cadence::Never => false,
            Cadence::PerChunk => chunk_done,
            Cadence::EveryRows(n) => {
                self.rows_since_report += rows;
                if self.rows_since_report >= n.get() {
                    self.rows_since_report %= n.get();
                    true
                } else {
                    false
                }
            }
        };
        if due {
            self.report()?;
        }
        Ok(())
    }

    fn report(&mut self) -> Result<()> {
        if let Some(sink) = self.sink.as_deref_mut() {
            let fraction = self.done as f64 / self.total as f64;
            if fraction >= 1.0 {
                self.reported_full = true;
            }
            sink.report(fraction).map_err(|_| Error::Cancelled)?;
        }
        Ok(())
    }

    /// Ensure a completed iteration's last report is exactly `1.0`.
    ///
    /// An empty ROI reports nothing at all.
    fn finish(&mut self) -> Result<()> {
        if self.total > 0 && self.cadence != Cadence::Never && !self.reported_full {
            self.report()?;
        }
        Ok(())
    }
}

/// Resolve the effective ROI and check it against the drawable's bounds.
fn resolve_roi(drawable: &Drawable, explicit: Option<IntRect>) -> Result<IntRect> {
    let roi = explicit.unwrap_or_else(|| drawable.mask_bounds());
    check_roi(&roi, drawable.width(), drawable.height())
}

fn check_roi(roi: &IntRect, width: u32, height: u32) -> Result<IntRect> {
    if roi.x1 > width || roi.y1 > height {
        return Err(Error::Store(StoreError::OutOfBounds {
            x: roi.x1,
            y: roi.y1,
            width,
            height,
        }));
    }
    Ok(*roi)
}

/// Build the zero-copy read view for one chunk.
///
/// The chunk lies inside a single tile of `store` by the chunking
/// invariant, so the view is a slice of that tile's buffer.
fn chunk_region<'s>(
    store: &'s mut TileStore,
    origin: (u32, u32),
    chunk: Chunk,
) -> Result<Region<'s>> {
    let x = origin.0 + chunk.dx;
    let y = origin.1 + chunk.dy;
    let (tx, ty) = (x / Tile::WIDTH, y / Tile::HEIGHT);
    let bounds = store.tile_bounds(tx, ty)?;
    let bpp = store.bpp();
    let stride = bounds.width() as usize * bpp;
    let offset = (y - bounds.y0) as usize * stride + (x - bounds.x0) as usize * bpp;
    let len = (chunk.height as usize - 1) * stride + chunk.width as usize * bpp;
    let data = store.tile_data(tx, ty)?;
    Ok(Region::new(
        &data[offset..offset + len],
        x,
        y,
        chunk.width,
        chunk.height,
        stride,
        bpp,
    ))
}

/// Build the zero-copy write view for one chunk. See [`chunk_region`].
fn chunk_region_mut<'s>(
    store: &'s mut TileStore,
    origin: (u32, u32),
    chunk: Chunk,
) -> Result<RegionMut<'s>> {
    let x = origin.0 + chunk.dx;
    let y = origin.1 + chunk.dy;
    let (tx, ty) = (x / Tile::WIDTH, y / Tile::HEIGHT);
    let bounds = store.tile_bounds(tx, ty)?;
    let bpp = store.bpp();
    let stride = bounds.width() as usize * bpp;
    let offset = (y - bounds.y0) as usize * stride + (x - bounds.x0) as usize * bpp;
    let len = (chunk.height as usize - 1) * stride + chunk.width as usize * bpp;
    let data = store.tile_data_mut(tx, ty)?;
    Ok(RegionMut::new(
        &mut data[offset..offset + len],
        x,
        y,
        chunk.width,
        chunk.height,
        stride,
        bpp,
    ))
}

/// Deliver every chunk of the ROI as a read-only region.
pub fn for_each_chunk_src(
    drawable: &mut Drawable,
    options: IterateOptions<'_>,
    mut f: impl FnMut(&Region<'_>),
) -> Result<()> {
    let roi = resolve_roi(drawable, options.roi)?;
    let mut state = IterationState::new(roi.area(), options.cadence, options.progress);
    let store = drawable.store_mut();
    for chunk in Chunks::new(roi.width(), roi.height(), &[(roi.x0, roi.y0)]) {
        let region = chunk_region(store, (roi.x0, roi.y0), chunk)?;
        f(&region);
        state.advance(chunk.height, chunk.area(), true)?;
    }
    state.finish()
}

/// Deliver every chunk of the ROI as a committed-pixel read region plus a
/// shadow write region, merging the shadow on completion.
pub fn for_each_chunk_src_dest(
    drawable: &mut Drawable,
    options: IterateOptions<'_>,
    mut f: impl FnMut(&Region<'_>, &mut RegionMut<'_>),
) -> Result<()> {
    let roi = resolve_roi(drawable, options.roi)?;
    let mut state = IterationState::new(roi.area(), options.cadence, options.progress);
    {
        let (tiles, shadow) = drawable.split_tiles_shadow();
        for chunk in Chunks::new(roi.width(), roi.height(), &[(roi.x0, roi.y0)]) {
            let src = chunk_region(tiles, (roi.x0, roi.y0), chunk)?;
            let mut dest = chunk_region_mut(shadow, (roi.x0, roi.y0), chunk)?;
            f(&src, &mut dest);
            state.advance(chunk.height, chunk.area(), true)?;
        }
    }
    state.finish()?;
    drawable.merge_shadow(roi)
}

/// Deliver every chunk of the ROI as a shadow write region, merging the
/// shadow on completion.
pub fn for_each_chunk_dest(
    drawable: &mut Drawable,
    options: IterateOptions<'_>,
    mut f: impl FnMut(&mut RegionMut<'_>),
) -> Result<()> {
    let roi = resolve_roi(drawable, options.roi)?;
    let mut state = IterationState::new(roi.area(), options.cadence, options.progress);
    {
        let shadow = drawable.shadow_mut();
        for chunk in Chunks::new(roi.width(), roi.height(), &[(roi.x0, roi.y0)]) {
            let mut dest = chunk_region_mut(shadow, (roi.x0, roi.y0), chunk)?;
            f(&mut dest);
            state.advance(chunk.height, chunk.area(), true)?;
        }
    }
    state.finish()?;
    drawable.merge_shadow(roi)
}

/// Read from one drawable while writing another, with independent tile
/// phases: the chunking respects both stores' grids.
///
/// `options.roi` addresses `src`; the destination rectangle has the same
/// size and starts at `dest_origin` in `dest`'s coordinates.
pub fn for_each_chunk_src_to_dest(
    src: &mut Drawable,
    dest: &mut Drawable,
    dest_origin: (u32, u32),
    options: IterateOptions<'_>,
    mut f: impl FnMut(&Region<'_>, &mut RegionMut<'_>),
) -> Result<()> {
    let src_roi = resolve_roi(src, options.roi)?;
    let dest_roi = IntRect::from_xywh(
        dest_origin.0,
        dest_origin.1,
        src_roi.width(),
        src_roi.height(),
    );
    check_roi(&dest_roi, dest.width(), dest.height())?;
    let mut state = IterationState::new(src_roi.area(), options.cadence, options.progress);
    {
        let src_store = src.store_mut();
        let dest_store = dest.shadow_mut();
        let origins = [(src_roi.x0, src_roi.y0), dest_origin];
        for chunk in Chunks::new(src_roi.width(), src_roi.height(), &origins) {
            let s = chunk_region(src_store, origins[0], chunk)?;
            let mut d = chunk_region_mut(dest_store, origins[1], chunk)?;
            f(&s, &mut d);
            state.advance(chunk.height, chunk.area(), true)?;
        }
    }
    state.finish()?;
    dest.merge_shadow(dest_roi)
}

/// Synchronized iteration over any number of read regions and at most one
/// write region.
///
/// Every participant carries its own ROI; all ROIs must have identical
/// width and height, and chunking respects every participant's tile grid.
/// The write region, if any, goes through its drawable's shadow store and
/// is merged on completion.
///
/// # Panics
///
/// Panics if no participant is given, or if the ROIs disagree in size.
pub fn for_each_chunk_n(
    sources: &mut [(&mut Drawable, IntRect)],
    mut dest: Option<(&mut Drawable, IntRect)>,
    cadence: Cadence,
    progress: Option<&mut dyn ProgressSink>,
    mut f: impl FnMut(&[Region<'_>], Option<&mut RegionMut<'_>>),
) -> Result<()> {
    let extent = sources
        .first()
        .map(|(_, roi)| (roi.width(), roi.height()))
        .or_else(|| dest.as_ref().map(|(_, roi)| (roi.width(), roi.height())))
        .expect("at least one participating region");
    for (drawable, roi) in sources.iter() {
        assert_eq!(
            (roi.width(), roi.height()),
            extent,
            "participating regions must have identical size"
        );
        check_roi(roi, drawable.width(), drawable.height())?;
    }
    if let Some((drawable, roi)) = dest.as_ref() {
        assert_eq!(
            (roi.width(), roi.height()),
            extent,
            "participating regions must have identical size"
        );
        check_roi(roi, drawable.width(), drawable.height())?;
    }

    let origins: SmallVec<[(u32, u32); 4]> = sources
        .iter()
        .map(|(_, roi)| (roi.x0, roi.y0))
        .chain(dest.as_ref().map(|(_, roi)| (roi.x0, roi.y0)))
        .collect();
    let total = u64::from(extent.0) * u64::from(extent.1);
    let mut state = IterationState::new(total, cadence, progress);
    {
        let mut dest_split = dest.as_mut().map(|(d, roi)| (d.shadow_mut(), *roi));
        for chunk in Chunks::new(extent.0, extent.1, &origins) {
            let regions: SmallVec<[Region<'_>; 2]> = sources
                .iter_mut()
                .map(|(d, roi)| chunk_region(d.store_mut(), (roi.x0, roi.y0), chunk))
                .collect::<Result<_>>()?;
            let mut dest_region = match dest_split.as_mut() {
                Some((store, roi)) => Some(chunk_region_mut(store, (roi.x0, roi.y0), chunk)?),
                None => None,
            };
            f(&regions, dest_region.as_mut());
            state.advance(chunk.height, chunk.area(), true)?;
        }
    }
    state.finish()?;
    if let Some((drawable, roi)) = dest {
        drawable.merge_shadow(roi)?;
    }
    Ok(())
}

/// Call `f(x, y, row)` for every row of the ROI, read-only.
pub fn iterate_rows_src(
    drawable: &mut Drawable,
    options: IterateOptions<'_>,
    mut f: impl FnMut(u32, u32, &[u8]),
) -> Result<()> {
    let roi = resolve_roi(drawable, options.roi)?;
    let mut state = IterationState::new(roi.area(), options.cadence, options.progress);
    let store = drawable.store_mut();
    for chunk in Chunks::new(roi.width(), roi.height(), &[(roi.x0, roi.y0)]) {
        let region = chunk_region(store, (roi.x0, roi.y0), chunk)?;
        let last = chunk.height - 1;
        for (i, row) in region.rows().enumerate() {
            f(region.x(), region.y() + i as u32, row);
            state.advance(1, u64::from(chunk.width), i as u32 == last)?;
        }
    }
    state.finish()
}

/// Call `f(x, y, src_row, dest_row)` for every row of the ROI and merge
/// the written rows on completion.
pub fn iterate_rows_src_dest(
    drawable: &mut Drawable,
    options: IterateOptions<'_>,
    mut f: impl FnMut(u32, u32, &[u8], &mut [u8]),
) -> Result<()> {
    let roi = resolve_roi(drawable, options.roi)?;
    let mut state = IterationState::new(roi.area(), options.cadence, options.progress);
    {
        let (tiles, shadow) = drawable.split_tiles_shadow();
        for chunk in Chunks::new(roi.width(), roi.height(), &[(roi.x0, roi.y0)]) {
            let src = chunk_region(tiles, (roi.x0, roi.y0), chunk)?;
            let mut dest = chunk_region_mut(shadow, (roi.x0, roi.y0), chunk)?;
            let last = chunk.height - 1;
            for (i, (src_row, dest_row)) in src.rows().zip(dest.rows_mut()).enumerate() {
                f(src.x(), src.y() + i as u32, src_row, dest_row);
                state.advance(1, u64::from(chunk.width), i as u32 == last)?;
            }
        }
    }
    state.finish()?;
    drawable.merge_shadow(roi)
}

/// Call `f(x, y, dest_row)` for every row of the ROI and merge the written
/// rows on completion.
pub fn iterate_rows_dest(
    drawable: &mut Drawable,
    options: IterateOptions<'_>,
    mut f: impl FnMut(u32, u32, &mut [u8]),
) -> Result<()> {
    let roi = resolve_roi(drawable, options.roi)?;
    let mut state = IterationState::new(roi.area(), options.cadence, options.progress);
    {
        let shadow = drawable.shadow_mut();
        for chunk in Chunks::new(roi.width(), roi.height(), &[(roi.x0, roi.y0)]) {
            let mut dest = chunk_region_mut(shadow, (roi.x0, roi.y0), chunk)?;
            let x = dest.x();
            let y = dest.y();
            let last = chunk.height - 1;
            for (i, dest_row) in dest.rows_mut().enumerate() {
                f(x, y + i as u32, dest_row);
                state.advance(1, u64::from(chunk.width), i as u32 == last)?;
            }
        }
    }
    state.finish()?;
    drawable.merge_shadow(roi)
}

/// Call `f(x, y, pixel)` for every pixel of the ROI, read-only.
pub fn iterate_src(
    drawable: &mut Drawable,
    options: IterateOptions<'_>,
    mut f: impl FnMut(u32, u32, &[u8]),
) -> Result<()> {
    let bpp = drawable.bpp();
    iterate_rows_src(drawable, options, |x, y, row| {
        for (i, pixel) in row.chunks_exact(bpp).enumerate() {
            f(x + i as u32, y, pixel);
        }
    })
}

/// Call `f(x, y, src_pixel, dest_pixel)` for every pixel of the ROI and
/// merge the written pixels on completion.
pub fn iterate_src_dest(
    drawable: &mut Drawable,
    options: IterateOptions<'_>,
    mut f: impl FnMut(u32, u32, &[u8], &mut [u8]),
) -> Result<()> {
    let bpp = drawable.bpp();
    iterate_rows_src_dest(drawable, options, |x, y, src_row, dest_row| {
        for (i, (src_pixel, dest_pixel)) in src_row
            .chunks_exact(bpp)
            .zip(dest_row.chunks_exact_mut(bpp))
            .enumerate()
        {
            f(x + i as u32, y, src_pixel, dest_pixel);
        }
    })
}

/// Call `f(x, y, dest_pixel)` for every pixel of the ROI and merge the
/// written pixels on completion.
pub fn iterate_dest(
    drawable: &mut Drawable,
    options: IterateOptions<'_>,
    mut f: impl FnMut(u32, u32, &mut [u8]),
) -> Result<()> {
    let bpp = drawable.bpp();
    iterate_rows_dest(drawable, options, |x, y, dest_row| {
        for (i, pixel) in dest_row.chunks_exact_mut(bpp).enumerate() {
            f(x + i as u32, y, pixel);
        }
    })
}
