//! PM2.5 concentration to Air Quality Index conversion using the EPA breakpoint table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// AQI reported for any concentration outside the breakpoint table.
pub const AQI_SATURATION: f64 = 500.0;

/// One linear segment of the concentration-to-AQI mapping.
///
/// A band covers concentrations in `(c_low, c_high]`, except the first band
/// which is closed at zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breakpoint {
    pub c_low: f64,
    pub c_high: f64,
    pub i_low: f64,
    pub i_high: f64,
}

impl Breakpoint {
    const fn new(c_low: f64, c_high: f64, i_low: f64, i_high: f64) -> Self {
        Self {
            c_low,
            c_high,
            i_low,
            i_high,
        }
    }

    fn contains(&self, concentration: f64, first: bool) -> bool {
        let above_low = if first {
            concentration >= self.c_low
        } else {
            concentration > self.c_low
        };
        above_low && concentration <= self.c_high
    }

    fn interpolate(&self, concentration: f64) -> f64 {
        (self.i_high - self.i_low) / (self.c_high - self.c_low) * (concentration - self.c_low)
            + self.i_low
    }
}

/// PM2.5 breakpoints in µg/m³ and their AQI ranges.
pub const PM25_BREAKPOINTS: [Breakpoint; 7] = [
    Breakpoint::new(0.0, 12.0, 0.0, 50.0),
    Breakpoint::new(12.0, 35.4, 51.0, 100.0),
    Breakpoint::new(35.4, 55.4, 101.0, 150.0),
    Breakpoint::new(55.4, 150.4, 151.0, 200.0),
    Breakpoint::new(150.4, 250.4, 201.0, 300.0),
    Breakpoint::new(250.4, 350.4, 301.0, 400.0),
    Breakpoint::new(350.4, 500.4, 401.0, 500.0),
];

/// Converts a PM2.5 concentration into an AQI score.
///
/// The concentration is interpolated linearly within its breakpoint band and
/// rounded to the nearest integer (ties to even). Missing or NaN input yields
/// `None`; a concentration matching no band yields exactly
/// [`AQI_SATURATION`].
///
/// # Examples
///
/// ```rust
/// use aqi_forecast::pm25_to_aqi;
///
/// assert_eq!(pm25_to_aqi(Some(35.4)), Some(100.0));
/// assert_eq!(pm25_to_aqi(Some(600.0)), Some(500.0));
/// assert_eq!(pm25_to_aqi(Some(f64::NAN)), None);
/// assert_eq!(pm25_to_aqi(None), None);
/// ```
pub fn pm25_to_aqi(concentration: Option<f64>) -> Option<f64> {
    let c = concentration.filter(|c| !c.is_nan())?;
    let aqi = PM25_BREAKPOINTS
        .iter()
        .enumerate()
        .find(|(i, band)| band.contains(c, *i == 0))
        .map(|(_, band)| band.interpolate(c).round_ties_even())
        .unwrap_or(AQI_SATURATION);
    Some(aqi)
}

/// EPA health category for an AQI value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AqiCategory {
    /// 0–50.
    Good,
    /// 51–100.
    Moderate,
    /// 101–150.
    UnhealthyForSensitiveGroups,
    /// 151–200.
    Unhealthy,
    /// 201–300.
    VeryUnhealthy,
    /// Above 300.
    Hazardous,
}

impl AqiCategory {
    /// Maps an AQI value to its category. Negative or NaN values return `None`.
    ///
    /// Values between two categories (e.g. a model predicting `50.4`) are
    /// assigned to the lower category.
    pub fn from_aqi(aqi: f64) -> Option<Self> {
        if aqi.is_nan() || aqi < 0.0 {
            return None;
        }
        Some(match aqi {
            a if a < 51.0 => AqiCategory::Good,
            a if a < 101.0 => AqiCategory::Moderate,
            a if a < 151.0 => AqiCategory::UnhealthyForSensitiveGroups,
            a if a < 201.0 => AqiCategory::Unhealthy,
            a if a < 301.0 => AqiCategory::VeryUnhealthy,
            _ => AqiCategory::Hazardous,
        })
    }

    pub fn label(&self) -> &'static str {
        match self {
            AqiCategory::Good => "Good",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::UnhealthyForSensitiveGroups => "Unhealthy for Sensitive Groups",
            AqiCategory::Unhealthy => "Unhealthy",
            AqiCategory::VeryUnhealthy => "Very Unhealthy",
            AqiCategory::Hazardous => "Hazardous",
        }
    }
}

impl fmt::Display for AqiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowest_band_is_bounded_and_monotonic() {
        let mut previous = -1.0;
        for step in 0..=120 {
            let c = step as f64 / 10.0;
            let aqi = pm25_to_aqi(Some(c)).unwrap();
            assert!((0.0..=50.0).contains(&aqi), "aqi {} for c {}", aqi, c);
            assert!(aqi >= previous, "not monotonic at c {}", c);
            previous = aqi;
        }
    }

    #[test]
    fn test_band_edges() {
        assert_eq!(pm25_to_aqi(Some(0.0)), Some(0.0));
        assert_eq!(pm25_to_aqi(Some(12.0)), Some(50.0));
        assert_eq!(pm25_to_aqi(Some(12.1)), Some(51.0));
        assert_eq!(pm25_to_aqi(Some(35.4)), Some(100.0));
        assert_eq!(pm25_to_aqi(Some(55.4)), Some(150.0));
        assert_eq!(pm25_to_aqi(Some(150.4)), Some(200.0));
        assert_eq!(pm25_to_aqi(Some(500.4)), Some(500.0));
    }

    #[test]
    fn test_interpolation_inside_bands() {
        // 50 / 12 * 10 = 41.67
        assert_eq!(pm25_to_aqi(Some(10.0)), Some(42.0));
        // 49 / 20 * 4.6 + 101 = 112.27
        assert_eq!(pm25_to_aqi(Some(40.0)), Some(112.0));
        // 49 / 95 * 4.6 + 151 = 153.37
        assert_eq!(pm25_to_aqi(Some(60.0)), Some(153.0));
    }

    #[test]
    fn test_saturation() {
        assert_eq!(pm25_to_aqi(Some(600.0)), Some(AQI_SATURATION));
        assert_eq!(pm25_to_aqi(Some(500.5)), Some(AQI_SATURATION));
        assert_eq!(pm25_to_aqi(Some(-3.0)), Some(AQI_SATURATION));
    }

    #[test]
    fn test_missing_input() {
        assert_eq!(pm25_to_aqi(None), None);
        assert_eq!(pm25_to_aqi(Some(f64::NAN)), None);
    }

    #[test]
    fn test_category_from_aqi() {
        assert_eq!(AqiCategory::from_aqi(0.0), Some(AqiCategory::Good));
        assert_eq!(AqiCategory::from_aqi(50.4), Some(AqiCategory::Good));
        assert_eq!(AqiCategory::from_aqi(100.0), Some(AqiCategory::Moderate));
        assert_eq!(
            AqiCategory::from_aqi(112.0),
            Some(AqiCategory::UnhealthyForSensitiveGroups)
        );
        assert_eq!(AqiCategory::from_aqi(153.0), Some(AqiCategory::Unhealthy));
        assert_eq!(AqiCategory::from_aqi(250.0), Some(AqiCategory::VeryUnhealthy));
        assert_eq!(AqiCategory::from_aqi(480.0), Some(AqiCategory::Hazardous));
        assert_eq!(AqiCategory::from_aqi(-1.0), None);
        assert_eq!(AqiCategory::Moderate.to_string(), "Moderate");
    }
}
