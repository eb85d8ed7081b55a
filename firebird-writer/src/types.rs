//! Core record types consumed by the writer
//!
//! These are the read-only records the simulation host pushes into the
//! engines: a track description, the points sampled along it, and (for the
//! batch mode) whole trajectories. Positions, times and momenta are in the
//! base units of [`crate::units`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Result type for writer operations
pub type Result<T> = std::result::Result<T, WriterError>;

/// Attribute carrying the time of the first point of a rich trajectory
pub const PRE_TIME_ATTRIBUTE: &str = "PreT";

/// Attribute carrying the time of every later point of a rich trajectory
pub const POST_TIME_ATTRIBUTE: &str = "PostT";

/// Particle name used by the simulation for optical photons
pub const OPTICAL_PHOTON: &str = "opticalphoton";

/// Errors that can occur while filtering or writing trajectories
#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    #[error("Failed to open output file '{path}': {source}")]
    OutputOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write output file '{path}': {source}")]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid firebird document: {0}")]
    InvalidDocument(String),

    #[error("Writer is not open, call open() before processing records")]
    NotOpen,

    #[error("Out of sequence: {0}")]
    OutOfSequence(&'static str),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Three-vector in base units
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean length
    pub fn mag(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Distance from the z axis
    pub fn perp(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Polar angle measured from +z, in [0, pi]
    pub fn theta(&self) -> f64 {
        if self.x == 0.0 && self.y == 0.0 && self.z == 0.0 {
            0.0
        } else {
            self.perp().atan2(self.z)
        }
    }

    /// Azimuthal angle in the xy plane, in (-pi, pi]
    pub fn phi(&self) -> f64 {
        if self.x == 0.0 && self.y == 0.0 {
            0.0
        } else {
            self.y.atan2(self.x)
        }
    }

    pub fn distance_to(&self, other: &Vec3) -> f64 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z).mag()
    }
}

impl From<[f64; 3]> for Vec3 {
    fn from(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl From<Vec3> for [f64; 3] {
    fn from(v: Vec3) -> Self {
        [v.x, v.y, v.z]
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

/// A simulated particle track as described by the source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Track identifier, unique within an event
    pub track_id: i32,
    /// Parent track identifier (0 for primaries)
    #[serde(default)]
    pub parent_id: i32,
    /// PDG particle code
    pub pdg: i32,
    /// Particle name (e.g. "e-", "pi+", "opticalphoton")
    pub name: String,
    /// Charge in units of the elementary charge
    #[serde(default)]
    pub charge: f64,
    /// Momentum vector (base units)
    pub momentum: Vec3,
    /// Production vertex (base units)
    #[serde(default)]
    pub vertex: Vec3,
    /// Global time at the vertex, when the source knows it
    #[serde(default)]
    pub global_time: Option<f64>,
}

impl Track {
    /// Primary tracks have no parent
    pub fn is_primary(&self) -> bool {
        self.parent_id == 0
    }

    pub fn is_optical_photon(&self) -> bool {
        self.name == OPTICAL_PHOTON
    }

    /// Momentum magnitude (base units)
    pub fn momentum_mag(&self) -> f64 {
        self.momentum.mag()
    }
}

/// One sampled point of a step: position plus global time
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StepPoint {
    pub position: Vec3,
    #[serde(default)]
    pub global_time: f64,
}

impl StepPoint {
    pub fn new(position: Vec3, global_time: f64) -> Self {
        Self {
            position,
            global_time,
        }
    }
}

/// A point of a complete trajectory handed over in batch mode
///
/// Rich points carry string attributes from which per-point time can be read;
/// plain points only know their position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TrajectoryPoint {
    Rich {
        position: Vec3,
        #[serde(default)]
        attributes: BTreeMap<String, String>,
    },
    Plain {
        position: Vec3,
    },
}

impl TrajectoryPoint {
    pub fn plain(position: Vec3) -> Self {
        TrajectoryPoint::Plain { position }
    }

    /// Rich point with a single time attribute
    pub fn rich_with_time(position: Vec3, attribute: &str, value: impl Into<String>) -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert(attribute.to_string(), value.into());
        TrajectoryPoint::Rich {
            position,
            attributes,
        }
    }

    pub fn position(&self) -> Vec3 {
        match self {
            TrajectoryPoint::Rich { position, .. } => *position,
            TrajectoryPoint::Plain { position } => *position,
        }
    }

    pub fn is_rich(&self) -> bool {
        matches!(self, TrajectoryPoint::Rich { .. })
    }

    /// Look up a string attribute (always `None` for plain points)
    pub fn attribute(&self, name: &str) -> Option<&str> {
        match self {
            TrajectoryPoint::Rich { attributes, .. } => attributes.get(name).map(String::as_str),
            TrajectoryPoint::Plain { .. } => None,
        }
    }
}

/// A complete trajectory: the track and every point recorded for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub track: Track,
    #[serde(default)]
    pub points: Vec<TrajectoryPoint>,
}

impl Trajectory {
    pub fn new(track: Track, points: Vec<TrajectoryPoint>) -> Self {
        Self { track, points }
    }

    /// Production point: the first recorded point, or the track vertex
    pub fn vertex(&self) -> Vec3 {
        self.points
            .first()
            .map_or(self.track.vertex, TrajectoryPoint::position)
    }

    /// Total polyline length over all raw points (0 with fewer than two points)
    pub fn polyline_length(&self) -> f64 {
        polyline_length(self.points.iter().map(TrajectoryPoint::position))
    }
}

/// Sum of segment lengths along an ordered sequence of positions
pub fn polyline_length(positions: impl IntoIterator<Item = Vec3>) -> f64 {
    let mut length = 0.0;
    let mut previous: Option<Vec3> = None;
    for position in positions {
        if let Some(prev) = previous {
            length += prev.distance_to(&position);
        }
        previous = Some(position);
    }
    length
}
