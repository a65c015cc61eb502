//! Forecast horizons and the column / model names derived from them.

use crate::types::schema::{COL_TARGET_DAY1, COL_TARGET_DAY2, COL_TARGET_DAY3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How far ahead a model forecasts the AQI.
///
/// Each horizon owns one target column in the feature table and one model
/// artifact in the registry.
///
/// ```
/// use aqi_forecast::Horizon;
///
/// assert_eq!(Horizon::Day2.target_column(), "target_day2");
/// assert_eq!(Horizon::Day2.model_name(), "model_day2");
/// assert_eq!(Horizon::Day2.shift_hours(), 48);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Horizon {
    Day1,
    Day2,
    Day3,
}

impl Horizon {
    pub const ALL: [Horizon; 3] = [Horizon::Day1, Horizon::Day2, Horizon::Day3];

    pub fn days(&self) -> u32 {
        match self {
            Horizon::Day1 => 1,
            Horizon::Day2 => 2,
            Horizon::Day3 => 3,
        }
    }

    /// Hours the AQI series is shifted backward to build this horizon's target.
    pub fn shift_hours(&self) -> usize {
        24 * self.days() as usize
    }

    pub fn target_column(&self) -> &'static str {
        match self {
            Horizon::Day1 => COL_TARGET_DAY1,
            Horizon::Day2 => COL_TARGET_DAY2,
            Horizon::Day3 => COL_TARGET_DAY3,
        }
    }

    pub fn model_name(&self) -> String {
        format!("model_day{}", self.days())
    }

    pub fn from_days(days: u32) -> Option<Self> {
        Horizon::ALL.into_iter().find(|h| h.days() == days)
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "day {}", self.days())
    }
}
