// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Decomposing a region of interest into tile-aligned chunks.

use smallvec::SmallVec;
use tessera_common::tile::Tile;

/// One tile-aligned sub-rectangle of a region of interest.
///
/// Offsets are relative to the ROI's top-left corner; each participating
/// store adds its own origin to obtain absolute coordinates.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    /// Horizontal offset of the chunk within the ROI.
    pub dx: u32,
    /// Vertical offset of the chunk within the ROI.
    pub dy: u32,
    /// The chunk's width in pixels.
    pub width: u32,
    /// The chunk's height in pixels.
    pub height: u32,
}

impl Chunk {
    /// The number of pixels the chunk covers.
    #[inline]
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// An iterator carving a `width x height` region of interest into
/// tile-aligned chunks.
///
/// `origins` are the absolute top-left pixel coordinates at which the ROI
/// starts in each participating store. At every cursor position the chunk
/// extent is the smallest distance to the next tile boundary across all
/// participants, clamped to the ROI. No chunk ever crosses a tile
/// boundary in *any* participating store, which is what lets regions be
/// zero-copy views into single tile buffers.
///
/// Chunks are produced in raster-scan order and exactly partition the ROI;
/// an empty ROI produces no chunks.
#[derive(Clone, Debug)]
pub struct Chunks {
    width: u32,
    height: u32,
    origins: SmallVec<[(u32, u32); 2]>,
    dx: u32,
    dy: u32,
    row_height: u32,
}

impl Chunks {
    /// Create a chunk iterator for a ROI of the given size.
    ///
    /// # Panics
    ///
    /// Panics if `origins` is empty.
    pub fn new(width: u32, height: u32, origins: &[(u32, u32)]) -> Self {
        assert!(!origins.is_empty(), "at least one participating region");
        Self {
            width,
            height,
            origins: SmallVec::from_slice(origins),
            dx: 0,
            dy: 0,
            row_height: 0,
        }
    }

    /// Distance from `offset` to the nearest tile boundary across all
    /// participants, along one axis.
    fn span(&self, offset: u32, tile_extent: u32, vertical: bool) -> u32 {
        self.origins
            .iter()
            .map(|&(ox, oy)| {
                let abs = if vertical { oy } else { ox } + offset;
                tile_extent - (abs % tile_extent)
            })
            .min()
            .expect("origins is non-empty")
    }
}

impl Iterator for Chunks {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        if self.dx >= self.width {
            self.dx = 0;
            self.dy += self.row_height;
        }
        if self.dy >= self.height {
            return None;
        }
        if self.dx == 0 {
            self.row_height = self
                .span(self.dy, Tile::HEIGHT, true)
                .min(self.height - self.dy);
        }
        let width = self
            .span(self.dx, Tile::WIDTH, false)
            .min(self.width - self.dx);
        let chunk = Chunk {
            dx: self.dx,
            dy: self.dy,
            width,
            height: self.row_height,
        };
        self.dx += width;
        Some(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Assert the chunks exactly partition the ROI: every pixel covered
    /// once, no chunk out of bounds.
    fn assert_partition(width: u32, height: u32, origins: &[(u32, u32)]) -> Vec<Chunk> {
        let chunks: Vec<_> = Chunks::new(width, height, origins).collect();
        let mut covered = vec![0_u8; (width * height) as usize];
        for c in &chunks {
            assert!(c.width > 0 && c.height > 0);
            assert!(c.dx + c.width <= width && c.dy + c.height <= height);
            for y in c.dy..c.dy + c.height {
                for x in c.dx..c.dx + c.width {
                    covered[(y * width + x) as usize] += 1;
                }
            }
        }
        assert!(
            covered.iter().all(|&n| n == 1),
            "every ROI pixel must be covered exactly once"
        );
        chunks
    }

    /// Assert no chunk crosses a tile boundary in any participant.
    fn assert_tile_aligned(chunks: &[Chunk], origins: &[(u32, u32)]) {
        for c in chunks {
            for &(ox, oy) in origins {
                let x0 = ox + c.dx;
                let y0 = oy + c.dy;
                assert_eq!(
                    x0 / Tile::WIDTH,
                    (x0 + c.width - 1) / Tile::WIDTH,
                    "chunk {c:?} spans a tile column at origin ({ox}, {oy})"
                );
                assert_eq!(
                    y0 / Tile::HEIGHT,
                    (y0 + c.height - 1) / Tile::HEIGHT,
                    "chunk {c:?} spans a tile row at origin ({ox}, {oy})"
                );
            }
        }
    }

    #[test]
    fn empty_roi_produces_no_chunks() {
        assert_eq!(Chunks::new(0, 10, &[(0, 0)]).count(), 0);
        assert_eq!(Chunks::new(10, 0, &[(3, 7)]).count(), 0);
    }

    #[test]
    fn whole_drawable_grid() {
        // The 130x65 drawable from the engine's canonical scenario: a 3x2
        // grid of chunks with column widths 64, 64, 2 and row heights 64, 1.
        let chunks = assert_partition(130, 65, &[(0, 0)]);
        assert_eq!(
            chunks,
            vec![
                Chunk { dx: 0, dy: 0, width: 64, height: 64 },
                Chunk { dx: 64, dy: 0, width: 64, height: 64 },
                Chunk { dx: 128, dy: 0, width: 2, height: 64 },
                Chunk { dx: 0, dy: 64, width: 64, height: 1 },
                Chunk { dx: 64, dy: 64, width: 64, height: 1 },
                Chunk { dx: 128, dy: 64, width: 2, height: 1 },
            ]
        );
        assert_tile_aligned(&chunks, &[(0, 0)]);
    }

    #[test]
    fn single_pixel_inside_one_tile() {
        // A 1x1 ROI at (70, 0) sits fully inside tile column 1 and must be
        // one chunk, not an error.
        let chunks = assert_partition(1, 1, &[(70, 0)]);
        assert_eq!(chunks, vec![Chunk { dx: 0, dy: 0, width: 1, height: 1 }]);
    }

    #[test]
    fn unaligned_roi_splits_at_boundaries() {
        let origins = [(10, 50)];
        let chunks = assert_partition(100, 30, &origins);
        assert_tile_aligned(&chunks, &origins);
        // First column runs from x=10 to the boundary at x=64.
        assert_eq!(chunks[0].width, 54);
        // First row runs from y=50 to the boundary at y=64.
        assert_eq!(chunks[0].height, 14);
    }

    #[test]
    fn mismatched_origins_use_the_finer_split() {
        // Two participants whose tile phases disagree: boundaries of both
        // grids must be respected.
        let origins = [(0, 0), (30, 10)];
        let chunks = assert_partition(128, 70, &origins);
        assert_tile_aligned(&chunks, &origins);
        // x: boundaries at 34 (second grid) and 64 (first grid).
        assert_eq!(chunks[0].width, 34);
        assert_eq!(chunks[1].width, 30);
    }

    #[test]
    fn chunk_count_matches_grid() {
        let chunks: Vec<_> = Chunks::new(128, 128, &[(0, 0)]).collect();
        assert_eq!(chunks.len(), 4);
        assert!(chunks.iter().all(|c| c.width == 64 && c.height == 64));
    }
}
