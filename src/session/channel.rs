// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Tetralink Team

//! Shared cancellation flag and progress fraction

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Shared {
    cancel: AtomicBool,
    /// Bits of a non-negative `f64`; their integer order matches the float order.
    progress: AtomicU64,
}

/// Handle shared between the host thread and engine callbacks.
///
/// Clones refer to the same flag and progress value. Progress only moves
/// forward: [`ProgressChannel::advance`] keeps the maximum of all reports and
/// clamps to `[0, 1]`.
#[derive(Debug, Clone, Default)]
pub struct ProgressChannel {
    shared: Arc<Shared>,
}

impl ProgressChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cooperative cancellation.
    pub fn cancel(&self) {
        self.shared.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.load(Ordering::SeqCst)
    }

    /// Current progress in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        f64::from_bits(self.shared.progress.load(Ordering::Acquire))
    }

    /// Raise progress to `fraction` if it is ahead of the current value.
    pub fn advance(&self, fraction: f64) -> f64 {
        // NaN and -0.0 collapse to +0.0 so the bit order stays valid
        let value = if fraction > 0.0 { fraction.min(1.0) } else { 0.0 };
        let bits = value.to_bits();
        let previous = self.shared.progress.fetch_max(bits, Ordering::AcqRel);
        f64::from_bits(previous.max(bits))
    }

    /// Clear both the cancel flag and the progress for a new computation.
    pub fn reset(&self) {
        self.shared.cancel.store(false, Ordering::SeqCst);
        self.shared.progress.store(0.0f64.to_bits(), Ordering::Release);
    }
}
