// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Progress reporting during iteration.

use std::num::NonZeroU32;

/// Sentinel fraction for indeterminate ("pulse") progress.
///
/// By convention a negative fraction tells a sink that the total amount of
/// work is unknown; sinks typically translate it into an indeterminate UI
/// state. The engine always knows its totals and never reports this value
/// itself, but the convention is part of the sink interface so hosts can
/// reuse their sinks for operations that do pulse.
pub const PULSE: f64 = -1.0;

/// Returned by a [`ProgressSink`] to stop the surrounding iteration.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Cancelled;

/// Receives fractional completion reports during one iteration call.
///
/// Fractions are in `[0.0, 1.0]` and non-decreasing within a call, and the
/// last report of a completed iteration is exactly `1.0`. Returning
/// `Err(Cancelled)` aborts the iteration: the engine surfaces
/// [`Error::Cancelled`](crate::Error::Cancelled) and performs no shadow
/// merge for that call, leaving the drawable's committed pixels untouched.
pub trait ProgressSink {
    /// Handle one progress report.
    fn report(&mut self, fraction: f64) -> Result<(), Cancelled>;
}

impl<F: FnMut(f64) -> Result<(), Cancelled>> ProgressSink for F {
    fn report(&mut self, fraction: f64) -> Result<(), Cancelled> {
        self(fraction)
    }
}

/// How often an iteration call reports progress.
///
/// Filters historically disagreed on cadence (every row, every fifth row,
/// once per chunk), so it is a per-call knob rather than a fixed policy.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Cadence {
    /// Report once after each delivered chunk.
    #[default]
    PerChunk,
    /// Report after every `n` processed rows.
    EveryRows(NonZeroU32),
    /// Never report.
    Never,
}
