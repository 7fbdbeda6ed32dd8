//! Market saturation of a zone/category group.

use serde::{Deserialize, Serialize};

use syndicate_types::SaturationLevel;

/// Saturation of one zone/category group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Saturation {
    /// Open businesses divided by capacity; `f64::MAX` when capacity is zero
    /// so the report stays JSON-encodable.
    pub ratio: f64,
    /// Discrete level.
    pub level: SaturationLevel,
    /// Traffic multiplier applied to every business in the group.
    pub multiplier: f64,
}

/// Classify `count` open businesses against the zone's `capacity`.
pub fn saturation(count: usize, capacity: u32) -> Saturation {
    let ratio = if capacity == 0 {
        f64::MAX
    } else {
        f64::from(u32::try_from(count).unwrap_or(u32::MAX)) / f64::from(capacity)
    };
    let level = if ratio < 0.5 {
        SaturationLevel::Undersaturated
    } else if ratio < 0.9 {
        SaturationLevel::Balanced
    } else if ratio < 1.2 {
        SaturationLevel::Saturated
    } else {
        SaturationLevel::Oversaturated
    };
    Saturation {
        ratio,
        level,
        multiplier: multiplier(level),
    }
}

/// Traffic multiplier for a saturation level.
pub const fn multiplier(level: SaturationLevel) -> f64 {
    match level {
        SaturationLevel::Undersaturated => 1.2,
        SaturationLevel::Balanced => 1.0,
        SaturationLevel::Saturated => 0.85,
        SaturationLevel::Oversaturated => 0.65,
    }
}
