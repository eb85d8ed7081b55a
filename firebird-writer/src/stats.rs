//! Run statistics
//!
//! Counters observe every filter decision and time-extraction fallback. They
//! never feed back into filtering or serialization.

use serde::Serialize;
use std::path::PathBuf;

/// Cumulative counters of one writer instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunningStats {
    /// Trajectories (batch) or tracks (streaming) seen
    pub total: u64,
    /// Trajectories or tracks rejected or discarded
    pub filtered: u64,
    /// Trajectories or tracks written
    pub saved: u64,
    /// Time extractions that found no usable time
    pub no_time: u64,
    /// Points rejected by the step window
    pub steps_filtered: u64,
    /// Steps received (streaming only)
    pub steps_seen: u64,
    /// Events opened
    pub events_seen: u64,
    /// Events emitted with at least one trajectory
    pub events_written: u64,
}

impl RunningStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share of `part` in `total`, in percent
    fn percent(part: u64, total: u64) -> f64 {
        if total > 0 {
            part as f64 * 100.0 / total as f64
        } else {
            0.0
        }
    }

    pub fn filtered_percent(&self) -> f64 {
        Self::percent(self.filtered, self.total)
    }

    pub fn saved_percent(&self) -> f64 {
        Self::percent(self.saved, self.total)
    }

    /// Log the end-of-run summary
    ///
    /// Step and timing lines only appear when the matching option is active.
    pub fn log_summary(&self, step_cut: bool, require_rich_trajectory: bool) {
        log::info!("[firebird-writer] Trajectory filtering statistics:");
        log::info!(
            "[firebird-writer] Events: {} seen, {} written",
            self.events_seen,
            self.events_written
        );
        log::info!("[firebird-writer] Total trajectories processed: {}", self.total);
        log::info!(
            "[firebird-writer] Filtered (skipped) trajectories: {} ({:.1}%)",
            self.filtered,
            self.filtered_percent()
        );
        log::info!(
            "[firebird-writer] Saved trajectories: {} ({:.1}%)",
            self.saved,
            self.saved_percent()
        );
        if self.steps_seen > 0 {
            log::info!("[firebird-writer] Total steps: {}", self.steps_seen);
        }
        if step_cut {
            log::info!(
                "[firebird-writer] Steps filtered due to position limits: {}",
                self.steps_filtered
            );
        }
        if require_rich_trajectory {
            log::info!(
                "[firebird-writer] Trajectories without proper time information: {}",
                self.no_time
            );
        }
    }
}

/// What a writer reports when it is closed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Final counters
    pub stats: RunningStats,
    /// File written, `None` when nothing was emitted or the write failed
    pub output: Option<PathBuf>,
}

impl RunSummary {
    pub fn wrote_output(&self) -> bool {
        self.output.is_some()
    }
}
