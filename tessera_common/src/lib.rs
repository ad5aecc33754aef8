// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core data structures shared across the Tessera engine: integer
//! rectangles, tiles, tile-backed stores with a shared residency cache,
//! and a flat [`Pixmap`][pixmap::Pixmap] interchange type.
//!
//! This crate should not be used on its own; it is the data layer
//! underneath the [`tessera`](https://crates.io/crates/tessera) iteration
//! engine.
//!
//! # Features
//!
//! - `png` (enabled by default): Allow loading and saving
//!   [`Pixmap`][pixmap::Pixmap]s as PNG images.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![warn(clippy::print_stdout, clippy::print_stderr)]
#![forbid(unsafe_code)]

pub mod cache;
pub mod pixmap;
pub mod rect;
pub mod store;
pub mod tile;

pub use cache::TileCache;
pub use pixmap::Pixmap;
pub use rect::IntRect;
pub use store::{StoreError, TileStore};
pub use tile::Tile;
