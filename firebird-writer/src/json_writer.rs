//! Incremental firebird-dex-json emitter
//!
//! Values are serialized as soon as they arrive. Each nesting level (events,
//! trajectories, points) keeps its own first-element flag, so separators are
//! always written before an element and never have to be taken back.
//!
//! A trajectory is staged in its own buffer until `close_trajectory`, and an
//! event until `close_event`; only then are the bytes appended to the parent
//! level. A trajectory without points or an event without trajectories is
//! dropped at close and leaves no trace in the document.

use crate::format::{FORMAT_TYPE, FORMAT_VERSION, GROUP_TYPE, PARAM_COLUMNS, POINT_COLUMNS};
use crate::params::{PointRow, TrackParams};
use crate::types::{Result, WriterError};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Separator bookkeeping of one JSON array
#[derive(Debug, Clone, Copy)]
struct ArrayLevel {
    first: bool,
    len: usize,
}

impl ArrayLevel {
    fn new() -> Self {
        Self { first: true, len: 0 }
    }

    /// Write the separator preceding the next element
    fn begin_element(&mut self, buf: &mut Vec<u8>) {
        if self.first {
            self.first = false;
        } else {
            buf.push(b',');
        }
        self.len += 1;
    }
}

struct OpenEvent {
    buf: Vec<u8>,
    trajectories: ArrayLevel,
}

struct OpenTrajectory {
    buf: Vec<u8>,
    points: ArrayLevel,
}

/// Streaming writer of one firebird-dex-json document
pub struct JsonStreamWriter {
    file_name: String,
    group_header: Vec<u8>,
    events_buf: Vec<u8>,
    events: ArrayLevel,
    event: Option<OpenEvent>,
    trajectory: Option<OpenTrajectory>,
}

impl JsonStreamWriter {
    /// Create a writer
    ///
    /// `file_name` goes to `origin.file`, `component_name` and `origin_types`
    /// describe the single trajectory group of every event.
    pub fn new(file_name: &str, component_name: &str, origin_types: &[&str]) -> Result<Self> {
        Ok(Self {
            file_name: file_name.to_string(),
            group_header: Self::group_header(component_name, origin_types)?,
            events_buf: Vec::new(),
            events: ArrayLevel::new(),
            event: None,
            trajectory: None,
        })
    }

    /// Everything of a group up to the opening bracket of `trajectories`
    fn group_header(component_name: &str, origin_types: &[&str]) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"{\"name\":");
        serde_json::to_writer(&mut buf, component_name)?;
        buf.extend_from_slice(b",\"type\":");
        serde_json::to_writer(&mut buf, GROUP_TYPE)?;
        buf.extend_from_slice(b",\"origin\":{\"type\":");
        serde_json::to_writer(&mut buf, origin_types)?;
        buf.extend_from_slice(b"},\"paramColumns\":");
        serde_json::to_writer(&mut buf, &PARAM_COLUMNS)?;
        buf.extend_from_slice(b",\"pointColumns\":");
        serde_json::to_writer(&mut buf, &POINT_COLUMNS)?;
        buf.extend_from_slice(b",\"trajectories\":[");
        Ok(buf)
    }

    /// Number of events emitted so far
    pub fn event_count(&self) -> usize {
        self.events.len
    }

    pub fn is_event_open(&self) -> bool {
        self.event.is_some()
    }

    pub fn is_trajectory_open(&self) -> bool {
        self.trajectory.is_some()
    }

    /// Points staged in the open trajectory
    pub fn open_point_count(&self) -> usize {
        self.trajectory.as_ref().map_or(0, |t| t.points.len)
    }

    /// Start a new event
    pub fn open_event(&mut self, id: i64) -> Result<()> {
        if self.event.is_some() {
            return Err(WriterError::OutOfSequence("open_event while an event is open"));
        }

        let mut buf = Vec::new();
        buf.extend_from_slice(b"{\"id\":");
        serde_json::to_writer(&mut buf, &id)?;
        buf.extend_from_slice(b",\"groups\":[");
        buf.extend_from_slice(&self.group_header);

        self.event = Some(OpenEvent {
            buf,
            trajectories: ArrayLevel::new(),
        });
        Ok(())
    }

    /// Start a trajectory in the open event
    pub fn open_trajectory(&mut self) -> Result<()> {
        if self.event.is_none() {
            return Err(WriterError::OutOfSequence("open_trajectory without an open event"));
        }
        if self.trajectory.is_some() {
            return Err(WriterError::OutOfSequence(
                "open_trajectory while a trajectory is open",
            ));
        }

        self.trajectory = Some(OpenTrajectory {
            buf: b"{\"points\":[".to_vec(),
            points: ArrayLevel::new(),
        });
        Ok(())
    }

    /// Append a `[x, y, z, t, aux]` point to the open trajectory
    pub fn add_point(&mut self, x: f64, y: f64, z: f64, t: f64, aux: i32) -> Result<()> {
        let trajectory = self
            .trajectory
            .as_mut()
            .ok_or(WriterError::OutOfSequence("add_point without an open trajectory"))?;

        let buf = &mut trajectory.buf;
        trajectory.points.begin_element(buf);
        buf.push(b'[');
        for (i, value) in [x, y, z, t].iter().enumerate() {
            if i > 0 {
                buf.push(b',');
            }
            serde_json::to_writer(&mut *buf, value)?;
        }
        buf.push(b',');
        serde_json::to_writer(&mut *buf, &aux)?;
        buf.push(b']');
        Ok(())
    }

    /// Append an already converted point row
    pub fn add_row(&mut self, row: &PointRow) -> Result<()> {
        self.add_point(row.x, row.y, row.z, row.t, row.aux)
    }

    /// Finish the open trajectory with its parameters
    ///
    /// Returns `false` (and emits nothing) when the trajectory has no points.
    pub fn close_trajectory(&mut self, params: &TrackParams) -> Result<bool> {
        let mut trajectory = self
            .trajectory
            .take()
            .ok_or(WriterError::OutOfSequence("close_trajectory without an open trajectory"))?;

        if trajectory.points.len == 0 {
            return Ok(false);
        }

        let event = self
            .event
            .as_mut()
            .ok_or(WriterError::OutOfSequence("close_trajectory without an open event"))?;

        let buf = &mut trajectory.buf;
        buf.extend_from_slice(b"],\"params\":");
        Self::write_params(buf, params)?;
        buf.push(b'}');

        event.trajectories.begin_element(&mut event.buf);
        event.buf.extend_from_slice(&trajectory.buf);
        Ok(true)
    }

    /// Drop the open trajectory without emitting anything
    pub fn discard_trajectory(&mut self) {
        self.trajectory = None;
    }

    /// Finish the open event
    ///
    /// A trajectory still open is discarded first. Returns `false` (and emits
    /// nothing) when the event holds no trajectories.
    pub fn close_event(&mut self) -> Result<bool> {
        self.discard_trajectory();

        let mut event = self
            .event
            .take()
            .ok_or(WriterError::OutOfSequence("close_event without an open event"))?;

        if event.trajectories.len == 0 {
            return Ok(false);
        }

        // trajectories array, group object, groups array, event object
        event.buf.extend_from_slice(b"]}]}");

        self.events.begin_element(&mut self.events_buf);
        self.events_buf.extend_from_slice(&event.buf);
        Ok(true)
    }

    /// Close whatever is still open and return the complete document
    ///
    /// The emitted events are handed over; the writer is left empty.
    pub fn finish(&mut self) -> Result<String> {
        if self.event.is_some() {
            self.close_event()?;
        }

        let events_buf = std::mem::take(&mut self.events_buf);
        let events = std::mem::replace(&mut self.events, ArrayLevel::new());

        let mut doc = Vec::with_capacity(events_buf.len() + 256);
        doc.extend_from_slice(b"{\"type\":");
        serde_json::to_writer(&mut doc, FORMAT_TYPE)?;
        doc.extend_from_slice(b",\"version\":");
        serde_json::to_writer(&mut doc, FORMAT_VERSION)?;
        doc.extend_from_slice(b",\"origin\":{\"file\":");
        serde_json::to_writer(&mut doc, &self.file_name)?;
        doc.extend_from_slice(b",\"entries_count\":");
        serde_json::to_writer(&mut doc, &events.len)?;
        doc.extend_from_slice(b"},\"events\":[");
        doc.extend_from_slice(&events_buf);
        doc.extend_from_slice(b"]}");

        String::from_utf8(doc).map_err(|e| WriterError::InvalidDocument(e.to_string()))
    }

    fn write_params(buf: &mut Vec<u8>, params: &TrackParams) -> Result<()> {
        buf.push(b'[');
        serde_json::to_writer(&mut *buf, &params.pdg)?;
        buf.push(b',');
        serde_json::to_writer(&mut *buf, &params.name)?;
        for value in [
            params.charge,
            params.px,
            params.py,
            params.pz,
            params.vx,
            params.vy,
            params.vz,
            params.theta,
            params.phi,
            params.q_over_p,
            params.loc_a,
            params.loc_b,
            params.time,
        ] {
            buf.push(b',');
            serde_json::to_writer(&mut *buf, &value)?;
        }
        buf.push(b']');
        Ok(())
    }
}

/// Write a finished document to `path` in one go
pub fn write_document(path: &Path, document: &str) -> Result<()> {
    let file = File::create(path).map_err(|source| WriterError::OutputOpen {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(document.as_bytes())
        .and_then(|_| writer.flush())
        .map_err(|source| WriterError::OutputWrite {
            path: path.to_path_buf(),
            source,
        })
}
