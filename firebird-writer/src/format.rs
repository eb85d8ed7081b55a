//! The firebird-dex-json document format
//!
//! Constants describing the envelope written by the engines, and serde
//! types to read a written document back and check its invariants.

use crate::types::{Result, WriterError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Value of the top-level `type` field
pub const FORMAT_TYPE: &str = "firebird-dex-json";

/// Value of the top-level `version` field
pub const FORMAT_VERSION: &str = "0.04";

/// Type of the single group written per event
pub const GROUP_TYPE: &str = "PointTrajectory";

/// Column names of the trajectory parameter tuple
pub const PARAM_COLUMNS: [&str; 15] = [
    "pdg", "type", "charge", "px", "py", "pz", "vx", "vy", "vz", "theta", "phi", "q_over_p",
    "loc_a", "loc_b", "time",
];

/// Column names of a trajectory point
pub const POINT_COLUMNS: [&str; 5] = ["x", "y", "z", "t", "aux"];

/// Origin types of trajectories assembled from complete trajectories
pub const BATCH_ORIGIN_TYPES: [&str; 2] = ["G4VTrajectory", "G4VTrajectoryPoint"];

/// Origin types of trajectories assembled from individual steps
pub const STREAMING_ORIGIN_TYPES: [&str; 2] = ["G4Track", "G4StepPoint"];

/// Suffix of simulation output files replaced by [`derive_output_name`]
const EDM4HEP_SUFFIX: &str = ".edm4hep.root";

/// Suffix of firebird documents
pub const FIREBIRD_SUFFIX: &str = ".firebird.json";

/// A complete firebird-dex-json document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DexDocument {
    #[serde(rename = "type")]
    pub format_type: String,
    pub version: String,
    pub origin: DexOrigin,
    pub events: Vec<DexEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DexOrigin {
    pub file: String,
    pub entries_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DexEvent {
    pub id: i64,
    pub groups: Vec<DexGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DexGroup {
    pub name: String,
    #[serde(rename = "type")]
    pub group_type: String,
    pub origin: DexGroupOrigin,
    #[serde(rename = "paramColumns")]
    pub param_columns: Vec<String>,
    #[serde(rename = "pointColumns")]
    pub point_columns: Vec<String>,
    pub trajectories: Vec<DexTrajectory>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DexGroupOrigin {
    #[serde(rename = "type")]
    pub types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DexTrajectory {
    pub points: Vec<Vec<f64>>,
    pub params: Vec<serde_json::Value>,
}

impl DexDocument {
    /// Parse a document from its JSON text and validate it
    pub fn from_json(text: &str) -> Result<Self> {
        let document: DexDocument = serde_json::from_str(text)?;
        document.validate()?;
        Ok(document)
    }

    pub fn trajectory_count(&self) -> usize {
        self.events
            .iter()
            .flat_map(|e| e.groups.iter())
            .map(|g| g.trajectories.len())
            .sum()
    }

    pub fn point_count(&self) -> usize {
        self.events
            .iter()
            .flat_map(|e| e.groups.iter())
            .flat_map(|g| g.trajectories.iter())
            .map(|t| t.points.len())
            .sum()
    }

    /// Check the envelope and the structural invariants of every event
    pub fn validate(&self) -> Result<()> {
        if self.format_type != FORMAT_TYPE {
            return Err(invalid(format!("unexpected type '{}'", self.format_type)));
        }
        if self.version != FORMAT_VERSION {
            return Err(invalid(format!("unsupported version '{}'", self.version)));
        }
        if self.origin.entries_count != self.events.len() {
            return Err(invalid(format!(
                "entries_count is {} but the document holds {} events",
                self.origin.entries_count,
                self.events.len()
            )));
        }

        for event in &self.events {
            if event.groups.is_empty() {
                return Err(invalid(format!("event {} has no groups", event.id)));
            }
            for group in &event.groups {
                if group.trajectories.is_empty() {
                    return Err(invalid(format!(
                        "group '{}' of event {} has no trajectories",
                        group.name, event.id
                    )));
                }
                for (index, trajectory) in group.trajectories.iter().enumerate() {
                    if trajectory.points.is_empty() {
                        return Err(invalid(format!(
                            "trajectory {} of event {} has no points",
                            index, event.id
                        )));
                    }
                    if trajectory.points.iter().any(|p| p.len() != POINT_COLUMNS.len()) {
                        return Err(invalid(format!(
                            "trajectory {} of event {} has a point without {} columns",
                            index,
                            event.id,
                            POINT_COLUMNS.len()
                        )));
                    }
                    if trajectory.params.len() != PARAM_COLUMNS.len() {
                        return Err(invalid(format!(
                            "trajectory {} of event {} has {} params, expected {}",
                            index,
                            event.id,
                            trajectory.params.len(),
                            PARAM_COLUMNS.len()
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

fn invalid(message: String) -> WriterError {
    WriterError::InvalidDocument(message)
}

/// Read and validate a firebird document from disk
pub fn load_document(path: &Path) -> Result<DexDocument> {
    log::debug!("Loading firebird document: {:?}", path);
    let text = fs::read_to_string(path)?;
    DexDocument::from_json(&text)
}

/// Output name for a simulation output file
///
/// `run.edm4hep.root` becomes `run.firebird.json`, any other name loses its
/// last extension (`run.jsonl` becomes `run.firebird.json`), and an empty
/// name becomes `output.firebird.json`.
pub fn derive_output_name(input: &str) -> PathBuf {
    if input.is_empty() {
        return PathBuf::from(format!("output{}", FIREBIRD_SUFFIX));
    }
    if let Some(stem) = input.strip_suffix(EDM4HEP_SUFFIX) {
        return PathBuf::from(format!("{}{}", stem, FIREBIRD_SUFFIX));
    }
    if input.ends_with(FIREBIRD_SUFFIX) {
        return PathBuf::from(input);
    }

    let path = Path::new(input);
    let stem = match path.extension() {
        Some(_) => path.with_extension(""),
        None => path.to_path_buf(),
    };
    PathBuf::from(format!("{}{}", stem.to_string_lossy(), FIREBIRD_SUFFIX))
}
