//! Severity index calculation for PM2.5 concentrations.
//!
//! The index is a piecewise-linear interpolation over a fixed breakpoint
//! table. Each segment maps a concentration sub-range (µg/m³) linearly onto an
//! index sub-range. Concentrations above the last bounded segment are
//! extrapolated with that segment's slope, so the function has no ceiling.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index value meaning "no index could be determined for this reading".
pub const UNAVAILABLE: i32 = -1;

/// `(concentration_low, concentration_high, index_low, index_high)`.
const BREAKPOINTS: [(f64, f64, f64, f64); 5] = [
    (0.0, 30.0, 0.0, 50.0),
    (30.0, 60.0, 50.0, 100.0),
    (60.0, 90.0, 100.0, 200.0),
    (90.0, 120.0, 200.0, 300.0),
    (120.0, 250.0, 300.0, 400.0),
];

// ---

/// Compute the severity index for a PM2.5 concentration in µg/m³.
///
/// Returns `None` for negative or non-finite input; callers map that to
/// [`UNAVAILABLE`].
pub fn severity_index(pm25: f64) -> Option<i32> {
    // ---
    if !pm25.is_finite() || pm25 < 0.0 {
        return None;
    }

    let segment = BREAKPOINTS
        .iter()
        .find(|(_, hi, _, _)| pm25 <= *hi)
        .unwrap_or(&BREAKPOINTS[BREAKPOINTS.len() - 1]);

    let (lo, hi, idx_lo, idx_hi) = *segment;
    let index = idx_lo + (pm25 - lo) * ((idx_hi - idx_lo) / (hi - lo));

    Some(index.round() as i32)
}

/// Qualitative bucket derived from a severity index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "good")]
    Good,
    #[serde(rename = "moderate")]
    Moderate,
    #[serde(rename = "unhealthy")]
    Unhealthy,
    #[serde(rename = "poor")]
    Poor,
    #[serde(rename = "very poor")]
    VeryPoor,
    #[serde(rename = "severe")]
    Severe,
    #[serde(rename = "unavailable")]
    Unavailable,
}

impl Category {
    // ---
    /// Map an index to its category. Negative indexes are [`Category::Unavailable`].
    pub fn from_index(index: i32) -> Self {
        // ---
        match index {
            i if i < 0 => Category::Unavailable,
            0..=50 => Category::Good,
            51..=100 => Category::Moderate,
            101..=200 => Category::Unhealthy,
            201..=300 => Category::Poor,
            301..=400 => Category::VeryPoor,
            _ => Category::Severe,
        }
    }

    pub fn as_str(&self) -> &'static str {
        // ---
        match self {
            Category::Good => "good",
            Category::Moderate => "moderate",
            Category::Unhealthy => "unhealthy",
            Category::Poor => "poor",
            Category::VeryPoor => "very poor",
            Category::Severe => "severe",
            Category::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_zero_is_good() {
        // ---
        let index = severity_index(0.0).unwrap();
        assert_eq!(index, 0);
        assert_eq!(Category::from_index(index), Category::Good);
    }

    #[test]
    fn test_mid_segment_interpolation() {
        // ---
        // 50 + (45 - 30) * 50 / 30 = 75
        let index = severity_index(45.0).unwrap();
        assert_eq!(index, 75);
        assert_eq!(Category::from_index(index), Category::Moderate);
        assert_eq!(Category::from_index(index).to_string(), "moderate");
    }

    #[test]
    fn test_breakpoints_are_continuous() {
        // ---
        assert_eq!(severity_index(30.0), Some(50));
        assert_eq!(severity_index(60.0), Some(100));
        assert_eq!(severity_index(90.0), Some(200));
        assert_eq!(severity_index(120.0), Some(300));
        assert_eq!(severity_index(250.0), Some(400));

        // Just past each breakpoint stays on the same value after rounding
        assert_eq!(severity_index(30.0001), Some(50));
        assert_eq!(severity_index(90.0001), Some(200));
    }

    #[test]
    fn test_extrapolates_above_last_segment() {
        // ---
        // 400 + (380 - 250) * 100 / 130 = 500
        assert_eq!(severity_index(380.0), Some(500));
        assert_eq!(Category::from_index(500), Category::Severe);
    }

    #[test]
    fn test_monotonic_non_decreasing() {
        // ---
        let mut previous = 0;
        for step in 0..=5000 {
            let value = step as f64 * 0.1;
            let index = severity_index(value).unwrap();
            assert!(
                index >= previous,
                "index dropped at {}: {} < {}",
                value,
                index,
                previous
            );
            previous = index;
        }
    }

    #[test]
    fn test_invalid_input_is_unavailable() {
        // ---
        assert_eq!(severity_index(-1.0), None);
        assert_eq!(severity_index(f64::NAN), None);
        assert_eq!(severity_index(f64::INFINITY), None);
        assert_eq!(Category::from_index(UNAVAILABLE), Category::Unavailable);
    }

    #[test]
    fn test_category_thresholds() {
        // ---
        assert_eq!(Category::from_index(50), Category::Good);
        assert_eq!(Category::from_index(51), Category::Moderate);
        assert_eq!(Category::from_index(100), Category::Moderate);
        assert_eq!(Category::from_index(200), Category::Unhealthy);
        assert_eq!(Category::from_index(300), Category::Poor);
        assert_eq!(Category::from_index(400), Category::VeryPoor);
        assert_eq!(Category::from_index(401), Category::Severe);
    }

    #[test]
    fn test_category_serializes_as_label() {
        // ---
        let json = serde_json::to_string(&Category::VeryPoor).unwrap();
        assert_eq!(json, "\"very poor\"");
    }
}
