//! Batch (end-of-event) writer
//!
//! Every call hands over the complete trajectories of one event. Filtering
//! runs in a single pass per trajectory and the surviving trajectory goes
//! to the event buffer atomically; nothing carries over between calls.

use crate::config::FilterConfig;
use crate::filter::{FilterPolicy, Verdict};
use crate::format::BATCH_ORIGIN_TYPES;
use crate::json_writer::{write_document, JsonStreamWriter};
use crate::params::{PointRow, TrackParams};
use crate::stats::{RunSummary, RunningStats};
use crate::time::TimeExtractor;
use crate::types::{Result, Trajectory};

/// Outcome of one trajectory inside an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrajectoryOutcome {
    Saved,
    Filtered,
}

/// Writer fed with whole events of finished trajectories
pub struct BatchWriter {
    config: FilterConfig,
    writer: JsonStreamWriter,
    stats: RunningStats,
}

impl BatchWriter {
    /// Create a writer, validating and logging the configuration
    pub fn new(config: FilterConfig) -> Result<Self> {
        config.validate()?;
        config.log_settings();

        let file_name = config.output_file.display().to_string();
        let writer = JsonStreamWriter::new(&file_name, &config.component_name, &BATCH_ORIGIN_TYPES)?;

        Ok(Self {
            config,
            writer,
            stats: RunningStats::new(),
        })
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> RunningStats {
        self.stats
    }

    /// Number of events emitted so far
    pub fn event_count(&self) -> usize {
        self.writer.event_count()
    }

    /// Filter and serialize the trajectories of one event
    ///
    /// Returns `true` when the event was emitted, i.e. at least one
    /// trajectory survived.
    pub fn process_event(&mut self, event_id: i64, trajectories: &[Trajectory]) -> Result<bool> {
        self.stats.events_seen += 1;

        if trajectories.is_empty() {
            log::warn!("[firebird-writer] No trajectories found for event {}", event_id);
            return Ok(false);
        }

        self.stats.total += trajectories.len() as u64;
        self.writer.open_event(event_id)?;

        let mut filtered = 0u64;
        let mut saved = 0u64;
        for trajectory in trajectories {
            match self.process_trajectory(trajectory)? {
                TrajectoryOutcome::Saved => saved += 1,
                TrajectoryOutcome::Filtered => filtered += 1,
            }
        }

        self.stats.filtered += filtered;
        self.stats.saved += saved;

        let emitted = self.writer.close_event()?;
        if emitted {
            self.stats.events_written += 1;
        }

        log::info!(
            "[firebird-writer] Event {}: processed {} trajectories, filtered {}, saved {}",
            event_id,
            trajectories.len(),
            filtered,
            saved
        );

        Ok(emitted)
    }

    fn process_trajectory(&mut self, trajectory: &Trajectory) -> Result<TrajectoryOutcome> {
        let track_id = trajectory.track.track_id;

        let verdict = FilterPolicy::evaluate_trajectory(trajectory, &self.config, &mut self.stats);
        match verdict {
            Verdict::Rejected(reason) => {
                log::debug!("[firebird-writer] Trajectory {} rejected: {}", track_id, reason);
                return Ok(TrajectoryOutcome::Filtered);
            }
            Verdict::OpticalOverride => {
                log::trace!("[firebird-writer] Trajectory {} kept as optical photon", track_id);
            }
            Verdict::Accepted => {}
        }

        // Already known to be valid when rich timing is required, so this never
        // counts a second missing time for the first point.
        let first_time = trajectory
            .points
            .first()
            .map(|point| TimeExtractor::extract_time(point, 0, &self.config, &mut self.stats));

        self.writer.open_trajectory()?;
        let mut written = 0usize;

        for (index, point) in trajectory.points.iter().enumerate() {
            let position = point.position();
            if !FilterPolicy::accept_point(position, &self.config, &mut self.stats) {
                continue;
            }

            let extracted = match (index, first_time) {
                (0, Some(time)) => time,
                _ => TimeExtractor::extract_time(point, index, &self.config, &mut self.stats),
            };

            self.writer
                .add_row(&PointRow::new(position, extracted.or_fallback(index)))?;
            written += 1;
        }

        // A single recorded point is kept, one left over by the step filter is not
        if written == 0 || (written < 2 && written < trajectory.points.len()) {
            self.writer.discard_trajectory();
            log::debug!(
                "[firebird-writer] Trajectory {} discarded, {} point(s) left after step filter",
                track_id,
                written
            );
            return Ok(TrajectoryOutcome::Filtered);
        }

        let params = TrackParams::from_trajectory(trajectory, first_time.and_then(|t| t.known()));
        if self.writer.close_trajectory(&params)? {
            Ok(TrajectoryOutcome::Saved)
        } else {
            Ok(TrajectoryOutcome::Filtered)
        }
    }

    /// Write the document and log the run statistics
    ///
    /// Write failures are logged, not returned: the run ends without output.
    pub fn close(mut self) -> RunSummary {
        let path = self.config.output_file.clone();
        let events = self.writer.event_count();

        let output = if events == 0 {
            log::warn!("[firebird-writer] No events were processed. Output file not created.");
            None
        } else {
            match self
                .writer
                .finish()
                .and_then(|document| write_document(&path, &document))
            {
                Ok(()) => {
                    log::info!(
                        "[firebird-writer] Successfully wrote JSON trajectories to: {}",
                        path.display()
                    );
                    Some(path)
                }
                Err(e) => {
                    log::error!("[firebird-writer] Error writing JSON file: {}", e);
                    None
                }
            }
        };

        self.stats
            .log_summary(self.config.step_cut, self.config.require_rich_trajectory);

        RunSummary {
            stats: self.stats,
            output,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::load_document;
    use crate::types::{Track, TrajectoryPoint, Vec3, POST_TIME_ATTRIBUTE, PRE_TIME_ATTRIBUTE};
    use tempfile::TempDir;

    fn track(track_id: i32, parent_id: i32) -> Track {
        Track {
            track_id,
            parent_id,
            pdg: 13,
            name: "mu-".to_string(),
            charge: -1.0,
            momentum: Vec3::new(0.0, 0.0, 1000.0),
            vertex: Vec3::default(),
            global_time: None,
        }
    }

    fn rich_trajectory(track_id: i32, parent_id: i32, zs: &[f64]) -> Trajectory {
        let points = zs
            .iter()
            .enumerate()
            .map(|(i, z)| {
                let attribute = if i == 0 { PRE_TIME_ATTRIBUTE } else { POST_TIME_ATTRIBUTE };
                TrajectoryPoint::rich_with_time(Vec3::new(0.0, 0.0, *z), attribute, format!("{} ns", i))
            })
            .collect();
        Trajectory::new(track(track_id, parent_id), points)
    }

    fn config(dir: &TempDir) -> FilterConfig {
        FilterConfig::new().with_output_file(dir.path().join("out.firebird.json"))
    }

    #[test]
    fn test_event_with_accepted_trajectories() {
        let dir = TempDir::new().unwrap();
        let mut writer = BatchWriter::new(config(&dir)).unwrap();

        let trajectories = vec![
            rich_trajectory(1, 0, &[0.0, 10.0, 20.0]),
            rich_trajectory(2, 0, &[5.0, 15.0]),
        ];
        assert!(writer.process_event(3, &trajectories).unwrap());

        let stats = writer.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.saved, 2);
        assert_eq!(stats.events_written, 1);

        let summary = writer.close();
        let path = summary.output.unwrap();
        let document = load_document(&path).unwrap();
        document.validate().unwrap();
        assert_eq!(document.events[0].id, 3);
        assert_eq!(document.trajectory_count(), 2);

        let first = &document.events[0].groups[0].trajectories[0];
        assert_eq!(first.points[2], vec![0.0, 0.0, 20.0, 2.0, 0.0]);
    }

    #[test]
    fn test_event_without_survivors_is_not_emitted() {
        let dir = TempDir::new().unwrap();
        let mut writer =
            BatchWriter::new(config(&dir).with_only_primary(true)).unwrap();

        let trajectories = vec![rich_trajectory(4, 1, &[0.0, 1.0])];
        assert!(!writer.process_event(1, &trajectories).unwrap());
        assert!(!writer.process_event(2, &[]).unwrap());
        assert_eq!(writer.event_count(), 0);

        let summary = writer.close();
        assert!(!summary.wrote_output());
        assert_eq!(summary.stats.events_seen, 2);
        assert_eq!(summary.stats.filtered, 1);
        assert!(!dir.path().join("out.firebird.json").exists());
    }

    #[test]
    fn test_plain_points_fall_back_without_rich_timing() {
        let dir = TempDir::new().unwrap();
        let mut writer =
            BatchWriter::new(config(&dir).with_require_rich_trajectory(false)).unwrap();

        let points = vec![
            TrajectoryPoint::plain(Vec3::new(0.0, 0.0, 0.0)),
            TrajectoryPoint::plain(Vec3::new(0.0, 0.0, 1.0)),
            TrajectoryPoint::plain(Vec3::new(0.0, 0.0, 2.0)),
        ];
        writer
            .process_event(0, &[Trajectory::new(track(1, 0), points)])
            .unwrap();
        assert_eq!(writer.stats().no_time, 0);

        let document = load_document(&writer.close().output.unwrap()).unwrap();
        let times: Vec<f64> = document.events[0].groups[0].trajectories[0]
            .points
            .iter()
            .map(|p| p[3])
            .collect();
        assert_eq!(times.len(), 3);
        assert_eq!(times[0], 0.0);
        assert!((times[1] - 0.1).abs() < 1e-12);
        assert!((times[2] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_missing_first_time_rejects_when_required() {
        let dir = TempDir::new().unwrap();
        let mut writer = BatchWriter::new(config(&dir)).unwrap();

        let points = vec![
            TrajectoryPoint::plain(Vec3::new(0.0, 0.0, 0.0)),
            TrajectoryPoint::plain(Vec3::new(0.0, 0.0, 1.0)),
        ];
        writer
            .process_event(0, &[Trajectory::new(track(1, 0), points)])
            .unwrap();

        let stats = writer.stats();
        assert_eq!(stats.filtered, 1);
        assert_eq!(stats.no_time, 1);
    }

    #[test]
    fn test_single_recorded_point_is_kept() {
        let dir = TempDir::new().unwrap();
        let mut writer = BatchWriter::new(config(&dir)).unwrap();

        writer
            .process_event(0, &[rich_trajectory(1, 0, &[7.0])])
            .unwrap();
        assert_eq!(writer.stats().saved, 1);

        let document = load_document(&writer.close().output.unwrap()).unwrap();
        let trajectory = &document.events[0].groups[0].trajectories[0];
        assert_eq!(trajectory.points, vec![vec![0.0, 0.0, 7.0, 0.0, 0.0]]);
    }

    #[test]
    fn test_point_left_by_step_cut_is_discarded() {
        let dir = TempDir::new().unwrap();
        let mut writer =
            BatchWriter::new(config(&dir).with_step_cut(-10.0, 10.0, 100.0)).unwrap();

        let trajectories = vec![
            rich_trajectory(1, 0, &[0.0, 50.0]),
            rich_trajectory(2, 0, &[]),
        ];
        assert!(!writer.process_event(0, &trajectories).unwrap());

        let stats = writer.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.saved, 0);
        assert_eq!(stats.filtered, 2);
        assert_eq!(stats.steps_filtered, 1);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = FilterConfig::new().with_momentum_range(10.0, 1.0);
        assert!(BatchWriter::new(config).is_err());
    }

    #[test]
    fn test_write_failure_is_logged_not_returned() {
        let dir = TempDir::new().unwrap();
        let config = FilterConfig::new().with_output_file(dir.path().join("missing").join("out.json"));
        let mut writer = BatchWriter::new(config).unwrap();

        writer
            .process_event(0, &[rich_trajectory(1, 0, &[0.0, 1.0])])
            .unwrap();

        let summary = writer.close();
        assert!(!summary.wrote_output());
        assert_eq!(summary.stats.saved, 1);
    }
}
