//! Base units for records handed to the writer
//!
//! Records arrive in the simulation's internal unit system, where millimetre,
//! nanosecond and MeV are 1. Output columns are produced by dividing by the
//! unit they are expressed in, so a source with a different base only needs
//! to scale its records once at the boundary.

/// Millimetre (length base unit)
pub const MM: f64 = 1.0;
/// Centimetre
pub const CM: f64 = 10.0 * MM;
/// Metre
pub const M: f64 = 1000.0 * MM;

/// Nanosecond (time base unit)
pub const NS: f64 = 1.0;
/// Microsecond
pub const US: f64 = 1.0e3 * NS;
/// Millisecond
pub const MS: f64 = 1.0e6 * NS;
/// Second
pub const S: f64 = 1.0e9 * NS;

/// MeV (energy/momentum base unit)
pub const MEV: f64 = 1.0;
/// GeV
pub const GEV: f64 = 1.0e3 * MEV;
/// TeV
pub const TEV: f64 = 1.0e6 * MEV;
