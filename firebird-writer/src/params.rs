//! Output rows: trajectory parameters and points in output units
//!
//! Everything produced here is already converted to mm / ns / MeV and
//! sanitized, so the JSON writer never sees a NaN or an infinity.

use crate::types::{Track, Trajectory, Vec3};
use crate::units;

/// Smallest momentum magnitude used when computing q/p
const MIN_MOMENTUM: f64 = 1e-10;

/// Replace NaN and infinities with 0
pub fn sanitize(value: f64) -> f64 {
    sanitize_or(value, 0.0)
}

/// Replace NaN and infinities with `default`
pub fn sanitize_or(value: f64, default: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        default
    }
}

/// Parameter tuple of one trajectory, in `paramColumns` order
#[derive(Debug, Clone, PartialEq)]
pub struct TrackParams {
    pub pdg: i32,
    pub name: String,
    pub charge: f64,
    pub px: f64,
    pub py: f64,
    pub pz: f64,
    pub vx: f64,
    pub vy: f64,
    pub vz: f64,
    pub theta: f64,
    pub phi: f64,
    pub q_over_p: f64,
    pub loc_a: f64,
    pub loc_b: f64,
    pub time: f64,
}

impl TrackParams {
    /// Parameters of a streamed track: vertex and global time from the track
    pub fn from_track(track: &Track) -> Self {
        Self::build(track, track.vertex, track.global_time.unwrap_or(0.0))
    }

    /// Parameters of a batch trajectory
    ///
    /// The vertex is the first recorded point; `first_point_time` is the
    /// extracted time of that point, 0 when it is unknown.
    pub fn from_trajectory(trajectory: &Trajectory, first_point_time: Option<f64>) -> Self {
        Self::build(
            &trajectory.track,
            trajectory.vertex(),
            first_point_time.unwrap_or(0.0),
        )
    }

    fn build(track: &Track, vertex: Vec3, time: f64) -> Self {
        let momentum = track.momentum;
        let p = momentum.mag().max(MIN_MOMENTUM);

        Self {
            pdg: track.pdg,
            name: track.name.clone(),
            charge: sanitize(track.charge),
            px: sanitize(momentum.x / units::MEV),
            py: sanitize(momentum.y / units::MEV),
            pz: sanitize(momentum.z / units::MEV),
            vx: sanitize(vertex.x / units::MM),
            vy: sanitize(vertex.y / units::MM),
            vz: sanitize(vertex.z / units::MM),
            theta: sanitize(momentum.theta()),
            phi: sanitize(momentum.phi()),
            q_over_p: sanitize(track.charge / (p / units::GEV)),
            loc_a: 0.0,
            loc_b: 0.0,
            time: sanitize(time / units::NS),
        }
    }
}

/// One `[x, y, z, t, aux]` row of a trajectory
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointRow {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub t: f64,
    pub aux: i32,
}

impl PointRow {
    /// Convert a position and time from base units
    pub fn new(position: Vec3, time: f64) -> Self {
        Self {
            x: sanitize(position.x / units::MM),
            y: sanitize(position.y / units::MM),
            z: sanitize(position.z / units::MM),
            t: sanitize(time / units::NS),
            aux: 0,
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}
