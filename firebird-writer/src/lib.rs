//! Firebird Trajectory Writer Library
//!
//! Converts simulated particle tracks into firebird-dex-json event documents,
//! applying configurable acceptance filters along the way.
//!
//! # Architecture
//!
//! - [`FilterPolicy`] decides which tracks, points and trajectories are kept
//! - [`TimeExtractor`] reads per-point times and falls back when they are missing
//! - [`JsonStreamWriter`] emits the nested document incrementally
//! - [`BatchWriter`] takes complete trajectories once per event
//! - [`StreamingWriter`] takes individual steps and infers track and event
//!   boundaries
//!
//! Each writer owns its statistics, output buffer and output file. Run one
//! writer per simulation thread; writers share nothing.
//!
//! Inputs are expected in base units (mm, ns, MeV, see [`units`]); the
//! document is written in mm, ns and MeV/c.
//!
//! # Example Usage
//!
//! ```no_run
//! use firebird_writer::{FilterConfig, StepPoint, StreamingWriter, Track, Vec3};
//!
//! let config = FilterConfig::stepping_defaults()
//!     .with_output_file("run.firebird.json")
//!     .with_step_cut(-2000.0, 2000.0, 1000.0);
//!
//! let mut writer = StreamingWriter::new(config).unwrap();
//! writer.open().unwrap();
//!
//! let track = Track {
//!     track_id: 1,
//!     parent_id: 0,
//!     pdg: 13,
//!     name: "mu-".to_string(),
//!     charge: -1.0,
//!     momentum: Vec3::new(0.0, 0.0, 5000.0),
//!     vertex: Vec3::default(),
//!     global_time: Some(0.0),
//! };
//! let pre = StepPoint::new(Vec3::new(0.0, 0.0, 0.0), 0.0);
//! let post = StepPoint::new(Vec3::new(0.0, 0.0, 10.0), 0.03);
//! writer.on_step(0, 1, &track, pre, post).unwrap();
//!
//! let summary = writer.close().unwrap();
//! println!("saved {} tracks", summary.stats.saved);
//! ```

// Public modules
pub mod batch;
pub mod config;
pub mod filter;
pub mod format;
pub mod json_writer;
pub mod params;
pub mod stats;
pub mod stream;
pub mod time;
pub mod types;
pub mod units;

// Re-export main types for convenience
pub use batch::BatchWriter;
pub use config::FilterConfig;
pub use filter::{FilterPolicy, RejectReason, Verdict};
pub use format::{derive_output_name, load_document, DexDocument};
pub use json_writer::JsonStreamWriter;
pub use params::{PointRow, TrackParams};
pub use stats::{RunSummary, RunningStats};
pub use stream::{StreamSignal, StreamingWriter};
pub use time::{ExtractedTime, TimeExtractor};
pub use types::{
    Result, StepPoint, Track, Trajectory, TrajectoryPoint, Vec3, WriterError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
