//! Writer configuration types
//!
//! `FilterConfig` holds every threshold and toggle the engines consult. It is
//! read once when an engine is created and never mutated afterwards.
//! Thresholds are expressed in output units: millimetres for positions and
//! MeV/c for momenta.

use crate::types::{Result, WriterError};
use crate::units;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default output file name
pub const DEFAULT_OUTPUT_FILE: &str = "trajectories.firebird.json";

/// Filtering and output configuration shared by the batch and streaming writers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Output file path
    #[serde(alias = "OutputFile")]
    pub output_file: PathBuf,

    /// Group name shown by the event display
    #[serde(alias = "ComponentName")]
    pub component_name: String,

    /// Keep optical photons regardless of every other track filter
    #[serde(alias = "SaveOptical")]
    pub save_optical: bool,

    /// Keep only primary tracks (parent id 0)
    #[serde(alias = "OnlyPrimary")]
    pub only_primary: bool,

    /// Apply the vertex z window
    #[serde(alias = "VertexCut")]
    pub vertex_cut: bool,

    /// Vertex z window lower bound (mm)
    #[serde(alias = "VertexZMin")]
    pub vertex_z_min: f64,

    /// Vertex z window upper bound (mm)
    #[serde(alias = "VertexZMax")]
    pub vertex_z_max: f64,

    /// Apply the step position window
    #[serde(alias = "StepCut")]
    pub step_cut: bool,

    /// Step z window lower bound (mm)
    #[serde(alias = "StepZMin")]
    pub step_z_min: f64,

    /// Step z window upper bound (mm)
    #[serde(alias = "StepZMax")]
    pub step_z_max: f64,

    /// Maximum distance of a step from the z axis (mm)
    #[serde(alias = "StepRMax")]
    pub step_r_max: f64,

    /// Minimum momentum (MeV/c), inclusive
    #[serde(alias = "MomentumMin")]
    pub momentum_min: f64,

    /// Maximum momentum (MeV/c), inclusive
    #[serde(alias = "MomentumMax")]
    pub momentum_max: f64,

    /// Minimum polyline length (mm), 0 disables the cut
    #[serde(alias = "TrackLengthMin")]
    pub track_length_min: f64,

    /// PDG codes to keep, empty keeps every species
    #[serde(alias = "SaveParticles")]
    pub save_particles: Vec<i32>,

    /// Batch mode: require per-point timing on every kept trajectory
    #[serde(alias = "RequireRichTrajectory")]
    pub require_rich_trajectory: bool,

    /// Log every time extraction at info level
    #[serde(alias = "VerboseTimeExtraction")]
    pub verbose_time_extraction: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            output_file: PathBuf::from(DEFAULT_OUTPUT_FILE),
            component_name: "Geant4Trajectories".to_string(),
            save_optical: false,
            only_primary: false,
            vertex_cut: false,
            vertex_z_min: -5000.0,
            vertex_z_max: 5000.0,
            step_cut: false,
            step_z_min: -5000.0,
            step_z_max: 5000.0,
            step_r_max: 5000.0,
            momentum_min: 150.0,
            momentum_max: 1.0e6,
            track_length_min: 0.0,
            save_particles: Vec::new(),
            require_rich_trajectory: true,
            verbose_time_extraction: false,
        }
    }
}

impl FilterConfig {
    /// Create a configuration with the batch (end-of-event) defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults used by the stepping (streaming) writer
    ///
    /// Primary tracks above 300 MeV/c with a vertex inside +-4500 mm.
    pub fn stepping_defaults() -> Self {
        Self {
            component_name: "Geant4TrueTrajectories".to_string(),
            only_primary: true,
            vertex_cut: true,
            vertex_z_min: -4500.0,
            vertex_z_max: 4500.0,
            momentum_min: 300.0,
            momentum_max: 10_000.0 * units::TEV / units::MEV,
            ..Self::default()
        }
    }

    /// Builder method: set the output file
    pub fn with_output_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_file = path.into();
        self
    }

    /// Builder method: set the component (group) name
    pub fn with_component_name(mut self, name: impl Into<String>) -> Self {
        self.component_name = name.into();
        self
    }

    /// Builder method: keep optical photons unconditionally
    pub fn with_save_optical(mut self, enabled: bool) -> Self {
        self.save_optical = enabled;
        self
    }

    /// Builder method: keep only primary tracks
    pub fn with_only_primary(mut self, enabled: bool) -> Self {
        self.only_primary = enabled;
        self
    }

    /// Builder method: enable the vertex z window
    pub fn with_vertex_cut(mut self, z_min: f64, z_max: f64) -> Self {
        self.vertex_cut = true;
        self.vertex_z_min = z_min;
        self.vertex_z_max = z_max;
        self
    }

    /// Builder method: enable the step position window
    pub fn with_step_cut(mut self, z_min: f64, z_max: f64, r_max: f64) -> Self {
        self.step_cut = true;
        self.step_z_min = z_min;
        self.step_z_max = z_max;
        self.step_r_max = r_max;
        self
    }

    /// Builder method: set the momentum window (MeV/c)
    pub fn with_momentum_range(mut self, min: f64, max: f64) -> Self {
        self.momentum_min = min;
        self.momentum_max = max;
        self
    }

    /// Builder method: set the minimum track length (mm)
    pub fn with_track_length_min(mut self, length: f64) -> Self {
        self.track_length_min = length;
        self
    }

    /// Builder method: restrict kept species to these PDG codes
    pub fn with_save_particles(mut self, codes: Vec<i32>) -> Self {
        self.save_particles = codes;
        self
    }

    /// Builder method: require rich per-point timing (batch mode)
    pub fn with_require_rich_trajectory(mut self, enabled: bool) -> Self {
        self.require_rich_trajectory = enabled;
        self
    }

    /// Builder method: verbose time extraction diagnostics
    pub fn with_verbose_time_extraction(mut self, enabled: bool) -> Self {
        self.verbose_time_extraction = enabled;
        self
    }

    /// Check if a PDG code passes the species list
    pub fn should_save_particle(&self, pdg: i32) -> bool {
        self.save_particles.is_empty() || self.save_particles.contains(&pdg)
    }

    /// Reject inverted windows and negative limits
    pub fn validate(&self) -> Result<()> {
        if self.momentum_min > self.momentum_max {
            return Err(WriterError::InvalidConfig(format!(
                "MomentumMin ({}) is greater than MomentumMax ({})",
                self.momentum_min, self.momentum_max
            )));
        }
        if self.vertex_cut && self.vertex_z_min > self.vertex_z_max {
            return Err(WriterError::InvalidConfig(format!(
                "VertexZMin ({}) is greater than VertexZMax ({})",
                self.vertex_z_min, self.vertex_z_max
            )));
        }
        if self.step_cut && self.step_z_min > self.step_z_max {
            return Err(WriterError::InvalidConfig(format!(
                "StepZMin ({}) is greater than StepZMax ({})",
                self.step_z_min, self.step_z_max
            )));
        }
        if self.step_cut && self.step_r_max < 0.0 {
            return Err(WriterError::InvalidConfig(format!(
                "StepRMax must not be negative, got {}",
                self.step_r_max
            )));
        }
        if self.track_length_min < 0.0 {
            return Err(WriterError::InvalidConfig(format!(
                "TrackLengthMin must not be negative, got {}",
                self.track_length_min
            )));
        }
        if self.component_name.is_empty() {
            return Err(WriterError::InvalidConfig(
                "ComponentName must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Log the effective configuration once, at engine creation
    pub fn log_settings(&self) {
        log::info!("[firebird-writer] Trajectory filtering configuration:");
        log::info!("[firebird-writer] OutputFile: {}", self.output_file.display());
        log::info!("[firebird-writer] ComponentName: {}", self.component_name);
        log::info!("[firebird-writer] SaveOptical: {}", self.save_optical);
        log::info!("[firebird-writer] OnlyPrimary: {}", self.only_primary);
        log::info!("[firebird-writer] VertexCut: {}", self.vertex_cut);
        log::info!("[firebird-writer] VertexZMin: {:.2} mm", self.vertex_z_min);
        log::info!("[firebird-writer] VertexZMax: {:.2} mm", self.vertex_z_max);
        log::info!("[firebird-writer] StepCut: {}", self.step_cut);
        log::info!("[firebird-writer] StepZMin: {:.2} mm", self.step_z_min);
        log::info!("[firebird-writer] StepZMax: {:.2} mm", self.step_z_max);
        log::info!("[firebird-writer] StepRMax: {:.2} mm", self.step_r_max);
        log::info!("[firebird-writer] MinMomentum: {:.3} MeV/c", self.momentum_min);
        log::info!("[firebird-writer] MaxMomentum: {:.3} MeV/c", self.momentum_max);
        log::info!("[firebird-writer] MinTrackLength: {:.2} mm", self.track_length_min);
        log::info!("[firebird-writer] RequireRichTrajectory: {}", self.require_rich_trajectory);
        log::info!("[firebird-writer] VerboseTimeExtraction: {}", self.verbose_time_extraction);

        if self.save_particles.is_empty() {
            log::info!("[firebird-writer] SaveParticles: [all]");
        } else {
            let codes: Vec<String> = self.save_particles.iter().map(|c| c.to_string()).collect();
            log::info!("[firebird-writer] SaveParticles: {}", codes.join(", "));
        }
    }
}
