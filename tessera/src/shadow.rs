// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Merging shadow writes back into canonical tile storage.

use log::debug;
use tessera_common::rect::IntRect;
use tessera_common::store::{StoreError, TileStore};
use tessera_common::tile::Tile;

use crate::Error;

/// Copy the ROI-intersecting part of every touched shadow tile back into
/// the canonical store.
///
/// Write access dirty-marks each canonical tile (and copies-on-write if its
/// bytes are shared). The merge is deliberately **not atomic** across
/// tiles: if a tile cannot be acquired, the merge aborts with
/// [`Error::MergeFailed`] carrying the failed sub-rectangle, and tiles
/// merged before the failure stay merged.
pub(crate) fn merge(
    canonical: &mut TileStore,
    shadow: &mut TileStore,
    roi: IntRect,
) -> Result<(), Error> {
    if roi.is_empty() {
        return Ok(());
    }
    let tx0 = roi.x0 / Tile::WIDTH;
    let tx1 = (roi.x1 - 1) / Tile::WIDTH;
    let ty0 = roi.y0 / Tile::HEIGHT;
    let ty1 = (roi.y1 - 1) / Tile::HEIGHT;
    for ty in ty0..=ty1 {
        for tx in tx0..=tx1 {
            // The nominal (unclipped) tile rectangle; access failures below
            // surface as MergeFailed carrying this sub-rectangle.
            let nominal = IntRect {
                x0: tx * Tile::WIDTH,
                y0: ty * Tile::HEIGHT,
                x1: (tx + 1) * Tile::WIDTH,
                y1: (ty + 1) * Tile::HEIGHT,
            };
            let sub = nominal.intersect(&roi);
            if let Err(err) = merge_tile(canonical, shadow, tx, ty, sub) {
                debug!("shadow merge aborted at tile ({tx}, {ty}): {err}");
                return Err(Error::MergeFailed { rect: sub });
            }
        }
    }
    Ok(())
}

fn merge_tile(
    canonical: &mut TileStore,
    shadow: &mut TileStore,
    tx: u32,
    ty: u32,
    sub: IntRect,
) -> Result<(), StoreError> {
    let bounds = canonical.tile_bounds(tx, ty)?;
    // A ROI reaching past the drawable's edge may overhang an edge tile;
    // only the part that exists can be copied.
    let sub = sub.intersect(&bounds);
    if sub.is_empty() {
        return Ok(());
    }
    let bpp = canonical.bpp();
    let stride = bounds.width() as usize * bpp;
    let src = shadow.tile_data(tx, ty)?;
    let dest = canonical.tile_data_mut(tx, ty)?;
    let row_bytes = sub.width() as usize * bpp;
    for row in 0..sub.height() {
        let tile_row = (sub.y0 + row - bounds.y0) as usize;
        let off = tile_row * stride + (sub.x0 - bounds.x0) as usize * bpp;
        dest[off..off + row_bytes].copy_from_slice(&src[off..off + row_bytes]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_common::cache::TileCache;

    fn stores(width: u32, height: u32) -> (TileStore, TileStore) {
        let cache = TileCache::unbounded();
        (
            TileStore::new(width, height, 1, &cache),
            TileStore::new(width, height, 1, &cache),
        )
    }

    #[test]
    fn merge_copies_only_the_roi() {
        let (mut canonical, mut shadow) = stores(100, 100);
        shadow.tile_data_mut(0, 0).unwrap().fill(0xFF);
        let roi = IntRect::new(10, 10, 20, 20);
        merge(&mut canonical, &mut shadow, roi).unwrap();
        assert_eq!(canonical.pixel(10, 10).unwrap(), &[0xFF]);
        assert_eq!(canonical.pixel(19, 19).unwrap(), &[0xFF]);
        assert_eq!(canonical.pixel(9, 10).unwrap(), &[0]);
        assert_eq!(canonical.pixel(20, 20).unwrap(), &[0]);
    }

    #[test]
    fn merge_spans_tile_boundaries() {
        let (mut canonical, mut shadow) = stores(130, 65);
        for ty in 0..shadow.tile_rows() {
            for tx in 0..shadow.tile_cols() {
                shadow.tile_data_mut(tx, ty).unwrap().fill(0x55);
            }
        }
        let roi = IntRect::new(0, 0, 130, 65);
        merge(&mut canonical, &mut shadow, roi).unwrap();
        assert_eq!(canonical.pixel(0, 0).unwrap(), &[0x55]);
        assert_eq!(canonical.pixel(129, 64).unwrap(), &[0x55]);
    }

    #[test]
    fn empty_roi_is_a_no_op() {
        let (mut canonical, mut shadow) = stores(64, 64);
        shadow.tile_data_mut(0, 0).unwrap().fill(0xFF);
        merge(&mut canonical, &mut shadow, IntRect::new(5, 5, 5, 60)).unwrap();
        assert_eq!(canonical.pixel(5, 5).unwrap(), &[0]);
    }

    #[test]
    fn failed_merge_keeps_earlier_tiles() {
        let (mut canonical, mut shadow) = stores(130, 65);
        for ty in 0..shadow.tile_rows() {
            for tx in 0..shadow.tile_cols() {
                shadow.tile_data_mut(tx, ty).unwrap().fill(0x77);
            }
        }
        // The ROI reaches past the grid; tiles 0 and 1 of the first row
        // merge before tile 3 fails.
        let roi = IntRect::new(0, 0, 200, 10);
        let err = merge(&mut canonical, &mut shadow, roi).unwrap_err();
        assert!(matches!(err, Error::MergeFailed { .. }));
        assert_eq!(canonical.pixel(0, 0).unwrap(), &[0x77]);
        assert_eq!(canonical.pixel(127, 9).unwrap(), &[0x77]);
    }

    #[test]
    fn failure_rect_names_the_failed_area() {
        let (mut canonical, mut shadow) = stores(64, 64);
        canonical.set_read_only(true);
        shadow.tile_data_mut(0, 0).unwrap().fill(1);
        let roi = IntRect::new(3, 4, 20, 30);
        match merge(&mut canonical, &mut shadow, roi) {
            Err(Error::MergeFailed { rect }) => assert_eq!(rect, roi),
            other => panic!("expected MergeFailed, got {other:?}"),
        }
    }
}
