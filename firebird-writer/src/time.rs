//! Time extraction for trajectory points
//!
//! Rich points carry their time as a string attribute such as `"10.2 ns"`:
//! a number followed by an optional unit token. The first point of a
//! trajectory is read from `PreT`, every later point from `PostT`. Points
//! without a usable time either fall back to a synthetic, monotonically
//! increasing value or are reported as unknown, depending on
//! `RequireRichTrajectory`.

use crate::config::FilterConfig;
use crate::stats::RunningStats;
use crate::types::{TrajectoryPoint, POST_TIME_ATTRIBUTE, PRE_TIME_ATTRIBUTE};
use crate::units;

/// Spacing of the synthetic fallback times
const FALLBACK_TIME_STEP: f64 = 0.1 * units::NS;

/// Outcome of a time extraction, in base time units
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExtractedTime {
    Known(f64),
    Unknown,
}

impl ExtractedTime {
    pub fn known(self) -> Option<f64> {
        match self {
            ExtractedTime::Known(t) => Some(t),
            ExtractedTime::Unknown => None,
        }
    }

    pub fn is_known(self) -> bool {
        matches!(self, ExtractedTime::Known(_))
    }

    /// Resolve an unknown time to the synthetic value for `point_index`
    pub fn or_fallback(self, point_index: usize) -> f64 {
        match self {
            ExtractedTime::Known(t) => t,
            ExtractedTime::Unknown => fallback_time(point_index),
        }
    }
}

/// Synthetic time for a point without timing information
pub fn fallback_time(point_index: usize) -> f64 {
    point_index as f64 * FALLBACK_TIME_STEP
}

/// Name of the attribute holding the time of the point at `point_index`
pub fn time_attribute_name(point_index: usize) -> &'static str {
    if point_index == 0 {
        PRE_TIME_ATTRIBUTE
    } else {
        POST_TIME_ATTRIBUTE
    }
}

/// Scale of a unit token; unknown tokens are taken as nanoseconds
pub fn time_unit_scale(token: &str) -> f64 {
    match token {
        "ns" => units::NS,
        "s" => units::S,
        "ms" => units::MS,
        "us" | "µs" | "μs" => units::US,
        _ => units::NS,
    }
}

/// Parse a time attribute value into base units
///
/// Accepts a leading decimal number (sign, fraction and exponent allowed)
/// followed by optional whitespace and a unit token. Returns `None` for
/// empty, non-numeric or non-finite values.
pub fn parse_time_value(value: &str) -> Option<f64> {
    let trimmed = value.trim_start();
    let number_len = numeric_prefix_len(trimmed);
    if number_len == 0 {
        return None;
    }

    let number: f64 = trimmed[..number_len].parse().ok()?;
    if !number.is_finite() {
        return None;
    }

    let scale = trimmed[number_len..]
        .split_whitespace()
        .next()
        .map_or(units::NS, time_unit_scale);

    Some(number * scale)
}

/// Length in bytes of the decimal number at the start of `s`
fn numeric_prefix_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut pos = 0;

    if pos < bytes.len() && (bytes[pos] == b'+' || bytes[pos] == b'-') {
        pos += 1;
    }

    let int_start = pos;
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    let mut digits = pos - int_start;

    if pos < bytes.len() && bytes[pos] == b'.' {
        let frac_start = pos + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            pos = frac_end;
        }
    }

    if digits == 0 {
        return 0;
    }

    // Exponent only counts when at least one digit follows it
    if pos < bytes.len() && (bytes[pos] == b'e' || bytes[pos] == b'E') {
        let mut exp_pos = pos + 1;
        if exp_pos < bytes.len() && (bytes[exp_pos] == b'+' || bytes[exp_pos] == b'-') {
            exp_pos += 1;
        }
        let exp_digits_start = exp_pos;
        while exp_pos < bytes.len() && bytes[exp_pos].is_ascii_digit() {
            exp_pos += 1;
        }
        if exp_pos > exp_digits_start {
            pos = exp_pos;
        }
    }

    pos
}

/// Time extractor for batch trajectory points
pub struct TimeExtractor;

impl TimeExtractor {
    /// Extract the time of the point at `point_index`
    ///
    /// Increments `stats.no_time` exactly once when no time can be found and
    /// rich timing is required.
    pub fn extract_time(
        point: &TrajectoryPoint,
        point_index: usize,
        config: &FilterConfig,
        stats: &mut RunningStats,
    ) -> ExtractedTime {
        let attribute = time_attribute_name(point_index);

        let parsed = match point {
            TrajectoryPoint::Plain { .. } => {
                Self::report(
                    config,
                    format_args!("Point {} is not a rich trajectory point, cannot extract time", point_index),
                );
                None
            }
            TrajectoryPoint::Rich { .. } => match point.attribute(attribute) {
                Some(raw) => {
                    let parsed = parse_time_value(raw);
                    if parsed.is_none() {
                        Self::report(
                            config,
                            format_args!(
                                "Could not parse {} value '{}' in point {}",
                                attribute, raw, point_index
                            ),
                        );
                    }
                    parsed
                }
                None => {
                    Self::report(
                        config,
                        format_args!("Could not find {} in point {}", attribute, point_index),
                    );
                    None
                }
            },
        };

        match parsed {
            Some(time) => {
                if config.verbose_time_extraction {
                    log::info!(
                        "[firebird-writer] Extracted time {} = {} ns from point {}",
                        attribute,
                        time / units::NS,
                        point_index
                    );
                }
                ExtractedTime::Known(time)
            }
            None if config.require_rich_trajectory => {
                stats.no_time += 1;
                ExtractedTime::Unknown
            }
            None => ExtractedTime::Known(fallback_time(point_index)),
        }
    }

    fn report(config: &FilterConfig, message: std::fmt::Arguments<'_>) {
        if config.verbose_time_extraction {
            log::warn!("[firebird-writer] {}", message);
        } else {
            log::trace!("[firebird-writer] {}", message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vec3;

    fn rich(attribute: &str, value: &str) -> TrajectoryPoint {
        TrajectoryPoint::rich_with_time(Vec3::default(), attribute, value)
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9 * expected.abs().max(1.0),
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_parse_with_units() {
        assert_close(parse_time_value("10.2 ns").unwrap(), 10.2);
        assert_close(parse_time_value("10.2").unwrap(), 10.2);
        assert_close(parse_time_value("1 s").unwrap(), 1.0e9);
        assert_close(parse_time_value("2 ms").unwrap(), 2.0e6);
        assert_close(parse_time_value("3 us").unwrap(), 3000.0);
        assert_close(parse_time_value("3 µs").unwrap(), 3000.0);
        assert_close(parse_time_value("7.5 fortnights").unwrap(), 7.5);
    }

    #[test]
    fn test_parse_number_forms() {
        assert_close(parse_time_value("  4.25ns").unwrap(), 4.25);
        assert_close(parse_time_value("1.5e3 ns").unwrap(), 1500.0);
        assert_close(parse_time_value("-2 ns").unwrap(), -2.0);
        assert_close(parse_time_value(".5").unwrap(), 0.5);
        assert_close(parse_time_value("3e").unwrap(), 3.0);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_time_value(""), None);
        assert_eq!(parse_time_value("   "), None);
        assert_eq!(parse_time_value("ns"), None);
        assert_eq!(parse_time_value("."), None);
        assert_eq!(parse_time_value("1e999 ns"), None);
    }

    #[test]
    fn test_attribute_by_position() {
        let config = FilterConfig::new();
        let mut stats = RunningStats::new();

        let first = rich(PRE_TIME_ATTRIBUTE, "1 ns");
        assert_eq!(
            TimeExtractor::extract_time(&first, 0, &config, &mut stats),
            ExtractedTime::Known(1.0)
        );

        // PreT is not consulted past the first point
        assert_eq!(
            TimeExtractor::extract_time(&first, 1, &config, &mut stats),
            ExtractedTime::Unknown
        );
        assert_eq!(stats.no_time, 1);

        let later = rich(POST_TIME_ATTRIBUTE, "2 ns");
        assert_eq!(
            TimeExtractor::extract_time(&later, 3, &config, &mut stats),
            ExtractedTime::Known(2.0)
        );
    }

    #[test]
    fn test_missing_time_required_counts_once() {
        let config = FilterConfig::new().with_require_rich_trajectory(true);
        let mut stats = RunningStats::new();

        let plain = TrajectoryPoint::plain(Vec3::default());
        let result = TimeExtractor::extract_time(&plain, 0, &config, &mut stats);
        assert_eq!(result, ExtractedTime::Unknown);
        assert_eq!(stats.no_time, 1);
    }

    #[test]
    fn test_missing_time_falls_back_when_not_required() {
        let config = FilterConfig::new().with_require_rich_trajectory(false);
        let mut stats = RunningStats::new();

        let plain = TrajectoryPoint::plain(Vec3::default());
        let result = TimeExtractor::extract_time(&plain, 4, &config, &mut stats);
        assert_close(result.known().unwrap(), 0.4);

        let empty = rich(POST_TIME_ATTRIBUTE, "");
        let result = TimeExtractor::extract_time(&empty, 2, &config, &mut stats);
        assert_close(result.known().unwrap(), 0.2);
        assert_eq!(stats.no_time, 0);
    }

    #[test]
    fn test_unparseable_attribute_is_unknown_when_required() {
        let config = FilterConfig::new();
        let mut stats = RunningStats::new();

        let garbage = rich(PRE_TIME_ATTRIBUTE, "soon");
        let result = TimeExtractor::extract_time(&garbage, 0, &config, &mut stats);
        assert!(!result.is_known());
        assert_eq!(stats.no_time, 1);
        assert_close(result.or_fallback(5), 0.5);
    }
}
