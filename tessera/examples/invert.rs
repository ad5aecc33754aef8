// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Invert a generated gradient image through the iteration engine,
//! reporting progress along the way.
//!
//! Pass a path to also write the result as a PNG:
//!
//! ```sh
//! cargo run --example invert -- inverted.png
//! ```

use std::num::NonZeroU32;

use tessera::{
    iterate_src_dest, Cadence, Cancelled, Drawable, IterateOptions, Pixmap, TileCache,
};

fn main() {
    // A small budget so the example also exercises tile eviction.
    let cache = TileCache::new(512 * 1024);

    let mut pixmap = Pixmap::new(300, 200, 3);
    for y in 0..pixmap.height() {
        let row = pixmap.row_mut(y);
        for x in 0..300_usize {
            row[x * 3] = (x % 256) as u8;
            row[x * 3 + 1] = (y % 256) as u8;
            row[x * 3 + 2] = ((x + y as usize) / 2 % 256) as u8;
        }
    }
    let mut drawable = Drawable::from_pixmap(&pixmap, &cache);

    let mut last_printed = -1.0_f64;
    let mut sink = |fraction: f64| -> Result<(), Cancelled> {
        if fraction - last_printed >= 0.1 || fraction == 1.0 {
            eprintln!("inverting... {:3.0}%", fraction * 100.0);
            last_printed = fraction;
        }
        Ok(())
    };

    iterate_src_dest(
        &mut drawable,
        IterateOptions {
            roi: None,
            cadence: Cadence::EveryRows(NonZeroU32::new(5).unwrap()),
            progress: Some(&mut sink),
        },
        |_x, _y, src, dest| {
            for (s, d) in src.iter().zip(dest.iter_mut()) {
                *d = 255 - s;
            }
        },
    )
    .expect("iteration over a fresh drawable cannot fail");

    eprintln!(
        "updated {:?}, {} tiles evicted along the way",
        drawable.take_update_rect(),
        cache.evictions()
    );

    if let Some(path) = std::env::args().nth(1) {
        let out = drawable.to_pixmap();
        let file = std::fs::File::create(&path).expect("create output file");
        out.write_png(file).expect("encode PNG");
        eprintln!("wrote {path}");
    }
}
