//! Configuration loading and merging
//!
//! The optional TOML file has two sections:
//!
//! ```toml
//! [writer]            # any FilterConfig option, snake_case or PascalCase
//! OnlyPrimary = true
//! StepCut = true
//! StepZMin = -2000.0
//!
//! [input]
//! files = ["run1.jsonl", "run2.jsonl"]
//! output_dir = "display"
//! threads = 4
//! ```
//!
//! Options left out keep the preset of the chosen mode, command-line flags
//! override the file.

use anyhow::{Context, Result};
use firebird_writer::FilterConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from a TOML file)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub writer: WriterOverrides,
    #[serde(default)]
    pub input: InputConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InputConfig {
    /// Inputs used when none are given on the command line
    #[serde(default)]
    pub files: Vec<PathBuf>,
    /// Directory for derived output names (default: next to the input)
    pub output_dir: Option<PathBuf>,
    /// Worker threads for parallel inputs (default: one per core)
    pub threads: Option<usize>,
}

/// Writer options that replace the preset when set
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WriterOverrides {
    #[serde(alias = "ComponentName")]
    pub component_name: Option<String>,
    #[serde(alias = "SaveOptical")]
    pub save_optical: Option<bool>,
    #[serde(alias = "OnlyPrimary")]
    pub only_primary: Option<bool>,
    #[serde(alias = "VertexCut")]
    pub vertex_cut: Option<bool>,
    #[serde(alias = "VertexZMin")]
    pub vertex_z_min: Option<f64>,
    #[serde(alias = "VertexZMax")]
    pub vertex_z_max: Option<f64>,
    #[serde(alias = "StepCut")]
    pub step_cut: Option<bool>,
    #[serde(alias = "StepZMin")]
    pub step_z_min: Option<f64>,
    #[serde(alias = "StepZMax")]
    pub step_z_max: Option<f64>,
    #[serde(alias = "StepRMax")]
    pub step_r_max: Option<f64>,
    #[serde(alias = "MomentumMin")]
    pub momentum_min: Option<f64>,
    #[serde(alias = "MomentumMax")]
    pub momentum_max: Option<f64>,
    #[serde(alias = "TrackLengthMin")]
    pub track_length_min: Option<f64>,
    #[serde(alias = "SaveParticles")]
    pub save_particles: Option<Vec<i32>>,
    #[serde(alias = "RequireRichTrajectory")]
    pub require_rich_trajectory: Option<bool>,
    #[serde(alias = "VerboseTimeExtraction")]
    pub verbose_time_extraction: Option<bool>,
}

impl WriterOverrides {
    /// Options set in `other` win over options set in `self`
    pub fn merged_with(self, other: WriterOverrides) -> WriterOverrides {
        WriterOverrides {
            component_name: other.component_name.or(self.component_name),
            save_optical: other.save_optical.or(self.save_optical),
            only_primary: other.only_primary.or(self.only_primary),
            vertex_cut: other.vertex_cut.or(self.vertex_cut),
            vertex_z_min: other.vertex_z_min.or(self.vertex_z_min),
            vertex_z_max: other.vertex_z_max.or(self.vertex_z_max),
            step_cut: other.step_cut.or(self.step_cut),
            step_z_min: other.step_z_min.or(self.step_z_min),
            step_z_max: other.step_z_max.or(self.step_z_max),
            step_r_max: other.step_r_max.or(self.step_r_max),
            momentum_min: other.momentum_min.or(self.momentum_min),
            momentum_max: other.momentum_max.or(self.momentum_max),
            track_length_min: other.track_length_min.or(self.track_length_min),
            save_particles: other.save_particles.or(self.save_particles),
            require_rich_trajectory: other
                .require_rich_trajectory
                .or(self.require_rich_trajectory),
            verbose_time_extraction: other
                .verbose_time_extraction
                .or(self.verbose_time_extraction),
        }
    }

    /// Apply every set option on top of `base`
    pub fn apply(&self, mut base: FilterConfig) -> FilterConfig {
        if let Some(name) = &self.component_name {
            base.component_name = name.clone();
        }
        if let Some(codes) = &self.save_particles {
            base.save_particles = codes.clone();
        }

        set(&mut base.save_optical, self.save_optical);
        set(&mut base.only_primary, self.only_primary);
        set(&mut base.vertex_cut, self.vertex_cut);
        set(&mut base.vertex_z_min, self.vertex_z_min);
        set(&mut base.vertex_z_max, self.vertex_z_max);
        set(&mut base.step_cut, self.step_cut);
        set(&mut base.step_z_min, self.step_z_min);
        set(&mut base.step_z_max, self.step_z_max);
        set(&mut base.step_r_max, self.step_r_max);
        set(&mut base.momentum_min, self.momentum_min);
        set(&mut base.momentum_max, self.momentum_max);
        set(&mut base.track_length_min, self.track_length_min);
        set(&mut base.require_rich_trajectory, self.require_rich_trajectory);
        set(&mut base.verbose_time_extraction, self.verbose_time_extraction);
        base
    }
}

fn set<T: Copy>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}
