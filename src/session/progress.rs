// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Tetralink Team

//! Progress derived from engine messages
//!
//! The engine reports progress in two ways: dedicated percentage messages,
//! and milestone lines (phase completion, optimisation iterations). Both are
//! recognised by a [`MilestoneParser`]; the [`ProgressTracker`] turns them
//! into a non-decreasing fraction. After the first dedicated message the
//! milestone heuristic is ignored for the rest of the computation.

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::trace;

use super::channel::ProgressChannel;

/// Progress at the start of the optimisation phase.
pub const OPTIMISATION_START: f64 = 0.25;
/// Progress at the end of the optimisation phase.
pub const OPTIMISATION_END: f64 = 0.70;
/// Iterations assumed for the optimisation phase.
pub const MAX_ITERATIONS: u32 = 20;

/// Something the engine said about how far it got.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Milestone {
    /// Dedicated progress report, already scaled to `[0, 1]`.
    Progress(f64),
    PhaseCompleted(u32),
    Iteration(u32),
}

impl Milestone {
    /// Progress fraction implied by a heuristic milestone.
    pub fn fraction(self) -> f64 {
        match self {
            Self::Progress(value) => value,
            Self::PhaseCompleted(phase) => match phase {
                0 => 0.0,
                1 => 0.10,
                2 => 0.25,
                3 => 0.70,
                4 => 0.98,
                _ => 1.0,
            },
            Self::Iteration(k) => {
                let step = (OPTIMISATION_END - OPTIMISATION_START) / f64::from(MAX_ITERATIONS);
                (OPTIMISATION_START + f64::from(k) * step).min(OPTIMISATION_END)
            }
        }
    }
}

/// Recognises milestones in engine message lines.
pub trait MilestoneParser: Send + Sync {
    /// `None` for lines that carry no progress information.
    fn parse(&self, message: &str) -> Option<Milestone>;
}

/// Parser for the MG-Tetra message wording.
#[derive(Debug, Clone, Default)]
pub struct MgMessageParser;

const DEDICATED_PREFIX: &str = "MGMESSAGE  1009001 ";
const PHASE_PREFIX: &str = "-- PHASE ";
const PHASE_SUFFIX: &str = "COMPLETED";
const ITERATION_PREFIX: &str = "** ITERATION ";

impl MilestoneParser for MgMessageParser {
    fn parse(&self, message: &str) -> Option<Milestone> {
        if let Some(rest) = message.strip_prefix(DEDICATED_PREFIX) {
            let percent: f64 = rest.split_whitespace().last()?.parse().ok()?;
            return Some(Milestone::Progress(percent / 100.0));
        }

        let line = message.trim();
        if let Some(rest) = line.strip_prefix(PHASE_PREFIX) {
            let rest = rest.trim_end();
            if !rest.ends_with(PHASE_SUFFIX) {
                return None;
            }
            let phase = rest.split_whitespace().next()?.parse().ok()?;
            return Some(Milestone::PhaseCompleted(phase));
        }
        if let Some(rest) = line.strip_prefix(ITERATION_PREFIX) {
            let k = rest.split_whitespace().next()?.parse().ok()?;
            return Some(Milestone::Iteration(k));
        }
        None
    }
}

/// Applies milestones to a [`ProgressChannel`].
pub struct ProgressTracker {
    parser: Box<dyn MilestoneParser>,
    channel: ProgressChannel,
    dedicated_seen: AtomicBool,
}

impl ProgressTracker {
    pub fn new(channel: ProgressChannel) -> Self {
        Self::with_parser(channel, Box::new(MgMessageParser))
    }

    pub fn with_parser(channel: ProgressChannel, parser: Box<dyn MilestoneParser>) -> Self {
        Self {
            parser,
            channel,
            dedicated_seen: AtomicBool::new(false),
        }
    }

    pub fn channel(&self) -> &ProgressChannel {
        &self.channel
    }

    /// Whether a dedicated progress message has switched the heuristic off.
    pub fn is_dedicated(&self) -> bool {
        self.dedicated_seen.load(Ordering::Acquire)
    }

    /// Feed one engine message; returns the progress after it.
    pub fn observe(&self, message: &str) -> f64 {
        match self.parser.parse(message) {
            Some(Milestone::Progress(value)) => {
                self.dedicated_seen.store(true, Ordering::Release);
                self.channel.advance(value)
            }
            Some(milestone) if !self.is_dedicated() => self.channel.advance(milestone.fraction()),
            Some(_) => self.channel.progress(),
            None => {
                trace!("no progress in engine message: {}", message.trim_end());
                self.channel.progress()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_engine_lines() {
        let parser = MgMessageParser;
        assert_eq!(
            parser.parse("  -- PHASE 2 COMPLETED"),
            Some(Milestone::PhaseCompleted(2))
        );
        assert_eq!(
            parser.parse("     ** ITERATION   7"),
            Some(Milestone::Iteration(7))
        );
        assert_eq!(
            parser.parse("MGMESSAGE  1009001  0 1 4.250000e+01"),
            Some(Milestone::Progress(0.425))
        );
        assert_eq!(parser.parse("  -- PHASE 2 STARTED"), None);
        assert_eq!(parser.parse("MGMESSAGE  1009001  0 1 garbage"), None);
        assert_eq!(parser.parse("random chatter"), None);
    }

    #[test]
    fn test_phase_table() {
        assert_relative_eq!(Milestone::PhaseCompleted(1).fraction(), 0.10);
        assert_relative_eq!(Milestone::PhaseCompleted(3).fraction(), 0.70);
        assert_relative_eq!(Milestone::PhaseCompleted(4).fraction(), 0.98);
        assert_relative_eq!(Milestone::PhaseCompleted(9).fraction(), 1.0);
    }

    #[test]
    fn test_iterations_are_capped() {
        assert_relative_eq!(Milestone::Iteration(0).fraction(), 0.25);
        assert_relative_eq!(Milestone::Iteration(10).fraction(), 0.475);
        assert_relative_eq!(Milestone::Iteration(20).fraction(), 0.70);
        assert_relative_eq!(Milestone::Iteration(45).fraction(), 0.70);
    }

    #[test]
    fn test_dedicated_message_disables_heuristic() {
        let tracker = ProgressTracker::new(ProgressChannel::new());
        tracker.observe("  -- PHASE 1 COMPLETED");
        assert_relative_eq!(tracker.channel().progress(), 0.10);

        tracker.observe("MGMESSAGE  1009001  0 1 2.000000e+01");
        assert!(tracker.is_dedicated());
        assert_relative_eq!(tracker.channel().progress(), 0.20);

        tracker.observe("  -- PHASE 3 COMPLETED");
        assert_relative_eq!(tracker.channel().progress(), 0.20);
    }
}
