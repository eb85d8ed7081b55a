//! JSON Lines input and the per-file drivers
//!
//! Step files hold one record per line, tagged by `record`:
//!
//! ```text
//! {"record":"event","run_id":0,"event_id":1}
//! {"record":"track","track_id":1,"parent_id":0,"pdg":13,"name":"mu-","momentum":[0,0,5000]}
//! {"record":"step","track_id":1,"pre":{...},"post":{...}}
//! {"record":"track_step","run_id":0,"event_id":1,"track":{...},"pre":{...},"post":{...}}
//! ```
//!
//! `track_step` carries the whole track and lets the writer infer the
//! boundaries. Event files hold one whole event per line:
//!
//! ```text
//! {"event_id":1,"trajectories":[{"track":{...},"points":[...]}]}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use anyhow::{Context, Result};
use firebird_writer::{
    BatchWriter, FilterConfig, RunSummary, StepPoint, StreamSignal, StreamingWriter, Track,
    Trajectory,
};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One line of a step file
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum StepRecord {
    Event {
        #[serde(default)]
        run_id: i32,
        event_id: i64,
    },
    Track(Track),
    Step {
        track_id: i32,
        pre: StepPoint,
        post: StepPoint,
    },
    TrackStep {
        #[serde(default)]
        run_id: i32,
        event_id: i64,
        track: Track,
        pre: StepPoint,
        post: StepPoint,
    },
}

/// One line of an event file
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EventRecord {
    pub event_id: i64,
    #[serde(default)]
    pub trajectories: Vec<Trajectory>,
}

/// Call `handle` with every parsed record of a JSON Lines file
fn for_each_record<T, F>(path: &Path, mut handle: F) -> Result<usize>
where
    T: for<'de> Deserialize<'de>,
    F: FnMut(T) -> Result<()>,
{
    let file = File::open(path).with_context(|| format!("Failed to open input: {:?}", path))?;
    let reader = BufReader::new(file);

    let mut count = 0;
    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {:?}", path))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let record: T = serde_json::from_str(trimmed)
            .with_context(|| format!("Invalid record at {:?} line {}", path, index + 1))?;
        handle(record)?;
        count += 1;
    }

    Ok(count)
}

/// Drive a streaming writer over a step file
pub fn run_stream(input: &Path, config: FilterConfig) -> Result<RunSummary> {
    let output = config.output_file.clone();
    let mut writer = StreamingWriter::new(config)?;
    writer
        .open()
        .with_context(|| format!("Cannot write {:?}", output))?;

    let records = for_each_record(input, |record: StepRecord| {
        match record {
            StepRecord::Event { run_id, event_id } => {
                writer.process(StreamSignal::NewEvent { run_id, event_id })?
            }
            StepRecord::Track(track) => writer.process(StreamSignal::NewTrack(track))?,
            StepRecord::Step {
                track_id,
                pre,
                post,
            } => writer.process(StreamSignal::Step {
                track_id,
                pre,
                post,
            })?,
            StepRecord::TrackStep {
                run_id,
                event_id,
                track,
                pre,
                post,
            } => writer.on_step(run_id, event_id, &track, pre, post)?,
        }
        Ok(())
    })?;

    log::debug!("Read {} step records from {:?}", records, input);
    Ok(writer.close()?)
}

/// Drive a batch writer over an event file
pub fn run_batch(input: &Path, config: FilterConfig) -> Result<RunSummary> {
    let mut writer = BatchWriter::new(config)?;

    let records = for_each_record(input, |record: EventRecord| {
        writer.process_event(record.event_id, &record.trajectories)?;
        Ok(())
    })?;

    log::debug!("Read {} events from {:?}", records, input);
    Ok(writer.close())
}
