//! Streaming (per-step) writer
//!
//! Steps arrive one at a time and track or event boundaries are either
//! signalled explicitly or inferred from identifier changes. The writer is an
//! explicit state machine:
//!
//! ```text
//! event:  Idle -> Open -> Closed
//! track:  New -> Accumulating -> Finalized | Discarded
//! ```
//!
//! Accepted points are serialized straight into the open trajectory of the
//! [`JsonStreamWriter`]; the trajectory is only committed to its event when
//! the track is finalized.

use crate::config::FilterConfig;
use crate::filter::{FilterPolicy, Verdict};
use crate::format::STREAMING_ORIGIN_TYPES;
use crate::json_writer::JsonStreamWriter;
use crate::params::{PointRow, TrackParams};
use crate::stats::{RunSummary, RunningStats};
use crate::types::{Result, StepPoint, Track, Vec3, WriterError};
use crate::units;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Tracks with an id below this are logged when they start
const TRACE_TRACK_ID_LIMIT: i32 = 1000;

/// Boundary and record notifications pushed by the host
#[derive(Debug, Clone, PartialEq)]
pub enum StreamSignal {
    /// A new run/event pair begins
    NewEvent { run_id: i32, event_id: i64 },
    /// A new track begins in the current event
    NewTrack(Track),
    /// One step of a track, from `pre` to `post`
    Step {
        track_id: i32,
        pre: StepPoint,
        post: StepPoint,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventState {
    Idle,
    Open { run_id: i32, event_id: i64 },
    Closed,
}

/// Track being assembled
struct Accumulating {
    track: Track,
    first_step_pending: bool,
    points: usize,
    /// Points removed by the step filter
    dropped: usize,
    length: f64,
    last_position: Option<Vec3>,
}

enum TrackState {
    Accumulating(Accumulating),
    /// Rejected or orphaned; steps with this id are ignored
    Discarded { track_id: i32 },
}

impl TrackState {
    fn track_id(&self) -> i32 {
        match self {
            TrackState::Accumulating(acc) => acc.track.track_id,
            TrackState::Discarded { track_id } => *track_id,
        }
    }
}

/// Writer fed with individual steps
pub struct StreamingWriter {
    config: FilterConfig,
    writer: JsonStreamWriter,
    stats: RunningStats,
    output: Option<BufWriter<File>>,
    event: EventState,
    track: Option<TrackState>,
    tracks_saved_in_event: u64,
}

impl StreamingWriter {
    /// Create a writer, validating and logging the configuration
    ///
    /// Nothing touches the file system until [`open`](Self::open).
    pub fn new(config: FilterConfig) -> Result<Self> {
        config.validate()?;
        config.log_settings();

        let file_name = config.output_file.display().to_string();
        let writer =
            JsonStreamWriter::new(&file_name, &config.component_name, &STREAMING_ORIGIN_TYPES)?;

        Ok(Self {
            config,
            writer,
            stats: RunningStats::new(),
            output: None,
            event: EventState::Idle,
            track: None,
            tracks_saved_in_event: 0,
        })
    }

    /// Create the output file
    ///
    /// Must be called exactly once before any record is processed.
    pub fn open(&mut self) -> Result<()> {
        if self.output.is_some() {
            return Err(WriterError::OutOfSequence("open called on an open writer"));
        }

        let path = &self.config.output_file;
        let file = File::create(path).map_err(|source| {
            log::error!(
                "[firebird-writer] Failed to open output file '{}': {}",
                path.display(),
                source
            );
            WriterError::OutputOpen {
                path: path.clone(),
                source,
            }
        })?;

        log::debug!("[firebird-writer] Opened output file {}", path.display());
        self.output = Some(BufWriter::new(file));
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.output.is_some()
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> RunningStats {
        self.stats
    }

    /// Id of the open event, if any
    pub fn current_event(&self) -> Option<i64> {
        match self.event {
            EventState::Open { event_id, .. } => Some(event_id),
            _ => None,
        }
    }

    /// Number of events emitted so far
    pub fn event_count(&self) -> usize {
        self.writer.event_count()
    }

    /// Feed one signal
    pub fn process(&mut self, signal: StreamSignal) -> Result<()> {
        if self.output.is_none() {
            return Err(WriterError::NotOpen);
        }

        match signal {
            StreamSignal::NewEvent { run_id, event_id } => self.begin_event(run_id, event_id),
            StreamSignal::NewTrack(track) => self.begin_track(track),
            StreamSignal::Step {
                track_id,
                pre,
                post,
            } => self.add_step(track_id, pre, post),
        }
    }

    /// Feed one step and infer event and track boundaries from its ids
    pub fn on_step(
        &mut self,
        run_id: i32,
        event_id: i64,
        track: &Track,
        pre: StepPoint,
        post: StepPoint,
    ) -> Result<()> {
        if self.current_event() != Some(event_id) {
            self.process(StreamSignal::NewEvent { run_id, event_id })?;
        }

        let same_track = matches!(&self.track, Some(state) if state.track_id() == track.track_id);
        if !same_track {
            self.process(StreamSignal::NewTrack(track.clone()))?;
        }

        self.process(StreamSignal::Step {
            track_id: track.track_id,
            pre,
            post,
        })
    }

    fn begin_event(&mut self, run_id: i32, event_id: i64) -> Result<()> {
        if self.current_event() == Some(event_id) {
            return Ok(());
        }

        self.finalize_event()?;

        self.writer.open_event(event_id)?;
        self.event = EventState::Open { run_id, event_id };
        self.tracks_saved_in_event = 0;
        self.stats.events_seen += 1;

        log::debug!(
            "[firebird-writer] Started processing event: {} (run: {})",
            event_id,
            run_id
        );
        Ok(())
    }

    fn begin_track(&mut self, track: Track) -> Result<()> {
        self.finalize_track()?;
        self.stats.total += 1;

        if self.current_event().is_none() {
            log::warn!(
                "[firebird-writer] Track {} arrived outside of an event, ignoring it",
                track.track_id
            );
            self.stats.filtered += 1;
            self.track = Some(TrackState::Discarded {
                track_id: track.track_id,
            });
            return Ok(());
        }

        match FilterPolicy::evaluate_track(&track, &self.config) {
            Verdict::Rejected(reason) => {
                log::trace!(
                    "[firebird-writer] Track {} rejected: {}",
                    track.track_id,
                    reason
                );
                self.stats.filtered += 1;
                self.track = Some(TrackState::Discarded {
                    track_id: track.track_id,
                });
                return Ok(());
            }
            Verdict::OpticalOverride | Verdict::Accepted => {}
        }

        if track.track_id < TRACE_TRACK_ID_LIMIT {
            log::trace!(
                "[firebird-writer] Processing track: {}, {} (parent: {}), vertex: {}",
                track.track_id,
                track.name,
                track.parent_id,
                track.vertex
            );
        }

        self.writer.open_trajectory()?;
        self.track = Some(TrackState::Accumulating(Accumulating {
            track,
            first_step_pending: true,
            points: 0,
            dropped: 0,
            length: 0.0,
            last_position: None,
        }));
        Ok(())
    }

    fn add_step(&mut self, track_id: i32, pre: StepPoint, post: StepPoint) -> Result<()> {
        self.stats.steps_seen += 1;

        let known = matches!(&self.track, Some(state) if state.track_id() == track_id);
        if !known {
            self.begin_orphan(track_id)?;
            return Ok(());
        }

        let acc = match self.track.as_mut() {
            Some(TrackState::Accumulating(acc)) => acc,
            _ => return Ok(()),
        };

        if acc.first_step_pending {
            acc.first_step_pending = false;
            Self::add_point(&mut self.writer, &self.config, &mut self.stats, acc, pre)?;
        }
        Self::add_point(&mut self.writer, &self.config, &mut self.stats, acc, post)
    }

    /// A step for a track that never started: implicit new-track transition
    ///
    /// Without a track record there is nothing to filter on, so the track is
    /// counted and discarded.
    fn begin_orphan(&mut self, track_id: i32) -> Result<()> {
        self.finalize_track()?;
        log::debug!(
            "[firebird-writer] Step for unknown track {}, discarding it",
            track_id
        );
        self.stats.total += 1;
        self.stats.filtered += 1;
        self.track = Some(TrackState::Discarded { track_id });
        Ok(())
    }

    fn add_point(
        writer: &mut JsonStreamWriter,
        config: &FilterConfig,
        stats: &mut RunningStats,
        acc: &mut Accumulating,
        point: StepPoint,
    ) -> Result<()> {
        if !FilterPolicy::accept_point(point.position, config, stats) {
            acc.dropped += 1;
            return Ok(());
        }

        writer.add_row(&PointRow::new(point.position, point.global_time))?;

        if let Some(last) = acc.last_position {
            acc.length += last.distance_to(&point.position);
        }
        acc.last_position = Some(point.position);
        acc.points += 1;
        Ok(())
    }

    /// Commit or discard the current track
    fn finalize_track(&mut self) -> Result<()> {
        let acc = match self.track.take() {
            Some(TrackState::Accumulating(acc)) => acc,
            Some(TrackState::Discarded { .. }) | None => return Ok(()),
        };

        let track_id = acc.track.track_id;

        if acc.points == 0 || (acc.points < 2 && acc.dropped > 0) {
            self.writer.discard_trajectory();
            self.stats.filtered += 1;
            log::trace!(
                "[firebird-writer] Track {} discarded with {} point(s)",
                track_id,
                acc.points
            );
            return Ok(());
        }

        if self.config.track_length_min > 0.0 && acc.length / units::MM < self.config.track_length_min {
            self.writer.discard_trajectory();
            self.stats.filtered += 1;
            log::trace!(
                "[firebird-writer] Track {} shorter than {} mm",
                track_id,
                self.config.track_length_min
            );
            return Ok(());
        }

        let params = TrackParams::from_track(&acc.track);
        if self.writer.close_trajectory(&params)? {
            self.stats.saved += 1;
            self.tracks_saved_in_event += 1;
        } else {
            self.stats.filtered += 1;
        }
        Ok(())
    }

    fn finalize_event(&mut self) -> Result<()> {
        let event_id = match self.event {
            EventState::Open { event_id, .. } => event_id,
            EventState::Idle | EventState::Closed => return Ok(()),
        };

        self.finalize_track()?;

        if self.writer.close_event()? {
            self.stats.events_written += 1;
            log::debug!(
                "[firebird-writer] Finalized event {} with {} tracks",
                event_id,
                self.tracks_saved_in_event
            );
        } else {
            log::debug!("[firebird-writer] Skipping empty event {}", event_id);
        }

        self.event = EventState::Closed;
        Ok(())
    }

    /// Finalize the last event, write the document and log the statistics
    ///
    /// When no event was emitted, or writing fails, the file created by
    /// `open` is removed.
    pub fn close(mut self) -> Result<RunSummary> {
        let output = self.output.take().ok_or(WriterError::NotOpen)?;

        let written = match self.write_output(output) {
            Ok(written) => written,
            Err(e) => {
                remove_output(&self.config.output_file);
                return Err(e);
            }
        };

        self.stats
            .log_summary(self.config.step_cut, self.config.require_rich_trajectory);

        Ok(RunSummary {
            stats: self.stats,
            output: written,
        })
    }

    fn write_output(&mut self, mut output: BufWriter<File>) -> Result<Option<PathBuf>> {
        self.finalize_event()?;

        let path = self.config.output_file.clone();
        if self.writer.event_count() == 0 {
            drop(output);
            log::warn!("[firebird-writer] No events were processed. Output file not created.");
            remove_output(&path);
            return Ok(None);
        }

        let document = self.writer.finish()?;
        output
            .write_all(document.as_bytes())
            .and_then(|_| output.flush())
            .map_err(|source| WriterError::OutputWrite {
                path: path.clone(),
                source,
            })?;
        log::info!(
            "[firebird-writer] Successfully wrote JSON trajectories to: {}",
            path.display()
        );
        Ok(Some(path))
    }
}

/// An opened writer that never reached `close` leaves no file behind
impl Drop for StreamingWriter {
    fn drop(&mut self) {
        if let Some(output) = self.output.take() {
            drop(output);
            log::warn!(
                "[firebird-writer] Writer dropped before close, removing {}",
                self.config.output_file.display()
            );
            remove_output(&self.config.output_file);
        }
    }
}

fn remove_output(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        log::debug!(
            "[firebird-writer] Could not remove output {}: {}",
            path.display(),
            e
        );
    }
}
