//! Acceptance filters for tracks, points and whole trajectories
//!
//! Track rules are evaluated in a fixed precedence and the first matching
//! rule decides:
//! 1. optical photons are kept unconditionally when `SaveOptical` is set
//! 2. `OnlyPrimary` rejects tracks with a parent
//! 3. momentum outside `[MomentumMin, MomentumMax]` is rejected
//! 4. species missing from a non-empty `SaveParticles` list are rejected
//! 5. (batch) polylines shorter than `TrackLengthMin` are rejected
//! 6. `VertexCut` rejects vertices outside `[VertexZMin, VertexZMax]`
//! 7. (batch) `RequireRichTrajectory` rejects trajectories whose first point
//!    has no time

use crate::config::FilterConfig;
use crate::stats::RunningStats;
use crate::time::TimeExtractor;
use crate::types::{Track, Trajectory, Vec3};
use crate::units;
use std::fmt;

/// Outcome of a track-level filter evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Kept by the optical photon override
    OpticalOverride,
    /// Passed every rule
    Accepted,
    /// Rejected by the named rule
    Rejected(RejectReason),
}

impl Verdict {
    pub fn is_accepted(self) -> bool {
        !matches!(self, Verdict::Rejected(_))
    }
}

/// Rule that rejected a track or trajectory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NotPrimary,
    Momentum,
    Species,
    TooFewPoints,
    TooShort,
    Vertex,
    NoTime,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::NotPrimary => write!(f, "not a primary track"),
            RejectReason::Momentum => write!(f, "momentum outside range"),
            RejectReason::Species => write!(f, "particle type not selected"),
            RejectReason::TooFewPoints => write!(f, "fewer than two points"),
            RejectReason::TooShort => write!(f, "track shorter than minimum length"),
            RejectReason::Vertex => write!(f, "vertex z outside range"),
            RejectReason::NoTime => write!(f, "first point has no time information"),
        }
    }
}

/// Filter policy evaluated against a [`FilterConfig`]
pub struct FilterPolicy;

impl FilterPolicy {
    /// Track-level decision used by the streaming writer (rules 1-4 and 6)
    pub fn accept_track(track: &Track, config: &FilterConfig) -> bool {
        Self::evaluate_track(track, config).is_accepted()
    }

    /// Track-level decision with the rule that decided it
    pub fn evaluate_track(track: &Track, config: &FilterConfig) -> Verdict {
        if let Some(verdict) = Self::kinematic_rules(track, config) {
            return verdict;
        }
        if let Some(reason) = Self::vertex_rule(track.vertex, config) {
            return Verdict::Rejected(reason);
        }
        Verdict::Accepted
    }

    /// Point-level decision; counts every rejected step
    pub fn accept_point(position: Vec3, config: &FilterConfig, stats: &mut RunningStats) -> bool {
        if !config.step_cut {
            return true;
        }

        let z = position.z / units::MM;
        let r = position.perp() / units::MM;

        if z < config.step_z_min || z > config.step_z_max || r > config.step_r_max {
            stats.steps_filtered += 1;
            return false;
        }
        true
    }

    /// Trajectory-level decision used by the batch writer (all rules)
    pub fn accept_trajectory(
        trajectory: &Trajectory,
        config: &FilterConfig,
        stats: &mut RunningStats,
    ) -> bool {
        Self::evaluate_trajectory(trajectory, config, stats).is_accepted()
    }

    /// Trajectory-level decision with the rule that decided it
    pub fn evaluate_trajectory(
        trajectory: &Trajectory,
        config: &FilterConfig,
        stats: &mut RunningStats,
    ) -> Verdict {
        if let Some(verdict) = Self::kinematic_rules(&trajectory.track, config) {
            return verdict;
        }

        if config.track_length_min > 0.0 {
            if trajectory.points.len() < 2 {
                return Verdict::Rejected(RejectReason::TooFewPoints);
            }
            if trajectory.polyline_length() / units::MM < config.track_length_min {
                return Verdict::Rejected(RejectReason::TooShort);
            }
        }

        if let Some(reason) = Self::vertex_rule(trajectory.vertex(), config) {
            return Verdict::Rejected(reason);
        }

        if config.require_rich_trajectory {
            if let Some(first) = trajectory.points.first() {
                let time = TimeExtractor::extract_time(first, 0, config, stats);
                if !time.is_known() {
                    if config.verbose_time_extraction {
                        log::warn!(
                            "[firebird-writer] First point of trajectory {} has no time information, skipping",
                            trajectory.track.track_id
                        );
                    }
                    return Verdict::Rejected(RejectReason::NoTime);
                }
            }
        }

        Verdict::Accepted
    }

    /// Rules 1-4; `None` means no rule decided
    fn kinematic_rules(track: &Track, config: &FilterConfig) -> Option<Verdict> {
        if track.is_optical_photon() && config.save_optical {
            return Some(Verdict::OpticalOverride);
        }

        if config.only_primary && !track.is_primary() {
            return Some(Verdict::Rejected(RejectReason::NotPrimary));
        }

        let p = track.momentum_mag() / units::MEV;
        if p < config.momentum_min || p > config.momentum_max {
            return Some(Verdict::Rejected(RejectReason::Momentum));
        }

        if !config.should_save_particle(track.pdg) {
            return Some(Verdict::Rejected(RejectReason::Species));
        }

        None
    }

    fn vertex_rule(vertex: Vec3, config: &FilterConfig) -> Option<RejectReason> {
        if !config.vertex_cut {
            return None;
        }
        let vz = vertex.z / units::MM;
        if vz < config.vertex_z_min || vz > config.vertex_z_max {
            return Some(RejectReason::Vertex);
        }
        None
    }
}
