//! Feature-name classification and physiological bounds.
//!
//! Joint signals are named `<joint>_<motion>_<measurement>_<side>_<unit>`,
//! e.g. `hip_flexion_angle_ipsi_rad` or `knee_flexion_velocity_contra_rad_s`.
//! Force-plate signals are named `<direction>_grf_<side>_<unit>` and
//! `cop_<axis>_<side>_<unit>`. Classification only looks at the measurement
//! token and the unit suffix, so it never fails: names it cannot place are
//! [`FeatureKind::Unknown`].

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Angular velocity limit in rad/s.
pub const MAX_ANGULAR_VELOCITY_RAD_S: f64 = 20.0;

/// Joint moment limit in N·m.
pub const MAX_JOINT_MOMENT_NM: f64 = 300.0;

/// Mass-normalised joint moment limit in N·m/kg.
pub const MAX_JOINT_MOMENT_NM_KG: f64 = 5.0;

/// Biomechanical signal category of a feature column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureKind {
    Angle,
    Velocity,
    Moment,
    Grf,
    Cop,
    Unknown,
}

impl FeatureKind {
    /// Classify a feature column by its name tokens.
    pub fn classify(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        let tokens: Vec<&str> = lower.split('_').collect();

        if tokens.iter().any(|t| *t == "grf") {
            return FeatureKind::Grf;
        }
        if tokens.iter().any(|t| *t == "cop") {
            return FeatureKind::Cop;
        }

        // Measurement token sits before side/unit, so scan from the right.
        for token in tokens.iter().rev() {
            match *token {
                "angle" => return FeatureKind::Angle,
                "velocity" | "vel" => return FeatureKind::Velocity,
                "moment" => return FeatureKind::Moment,
                _ => {}
            }
        }

        FeatureKind::Unknown
    }

    /// Whether range checks apply to this kind at all
    pub fn is_range_checked(&self) -> bool {
        matches!(
            self,
            FeatureKind::Angle | FeatureKind::Velocity | FeatureKind::Moment
        )
    }

    /// Magnitude bound for this kind given the column's unit, before tolerance.
    pub fn bound(&self, unit: FeatureUnit) -> Option<f64> {
        match self {
            FeatureKind::Angle => Some(match unit {
                FeatureUnit::Degrees => 180.0,
                _ => PI,
            }),
            FeatureKind::Velocity => Some(match unit {
                FeatureUnit::DegreesPerSecond => MAX_ANGULAR_VELOCITY_RAD_S.to_degrees(),
                _ => MAX_ANGULAR_VELOCITY_RAD_S,
            }),
            FeatureKind::Moment => Some(match unit {
                FeatureUnit::NewtonMetresPerKg => MAX_JOINT_MOMENT_NM_KG,
                _ => MAX_JOINT_MOMENT_NM,
            }),
            FeatureKind::Grf | FeatureKind::Cop | FeatureKind::Unknown => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureKind::Angle => "angle",
            FeatureKind::Velocity => "velocity",
            FeatureKind::Moment => "moment",
            FeatureKind::Grf => "grf",
            FeatureKind::Cop => "cop",
            FeatureKind::Unknown => "unknown",
        }
    }
}

/// Unit suffix of a feature column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureUnit {
    Radians,
    Degrees,
    RadiansPerSecond,
    DegreesPerSecond,
    NewtonMetres,
    NewtonMetresPerKg,
    Newtons,
    BodyWeight,
    Metres,
    Millimetres,
    Unknown,
}

impl FeatureUnit {
    /// Recognised unit suffixes, two-token suffixes first.
    pub const SUFFIXES: [(&'static str, FeatureUnit); 10] = [
        ("rad_s", FeatureUnit::RadiansPerSecond),
        ("deg_s", FeatureUnit::DegreesPerSecond),
        ("Nm_kg", FeatureUnit::NewtonMetresPerKg),
        ("rad", FeatureUnit::Radians),
        ("deg", FeatureUnit::Degrees),
        ("Nm", FeatureUnit::NewtonMetres),
        ("N", FeatureUnit::Newtons),
        ("BW", FeatureUnit::BodyWeight),
        ("mm", FeatureUnit::Millimetres),
        ("m", FeatureUnit::Metres),
    ];

    /// Parse the unit from the end of a feature name.
    pub fn parse(name: &str) -> Self {
        Self::split(name).map(|(_, unit)| unit).unwrap_or(FeatureUnit::Unknown)
    }

    /// Split a feature name into (stem, unit) if it ends in a known unit.
    pub fn split(name: &str) -> Option<(&str, FeatureUnit)> {
        Self::SUFFIXES.iter().find_map(|(suffix, unit)| {
            let stem = name.strip_suffix(suffix)?;
            let stem = stem.strip_suffix('_')?;
            (!stem.is_empty()).then_some((stem, *unit))
        })
    }

    pub fn suffix(&self) -> Option<&'static str> {
        Self::SUFFIXES
            .iter()
            .find(|(_, unit)| unit == self)
            .map(|(suffix, _)| *suffix)
    }

    /// Whether this unit is a sensible carrier for the given kind.
    pub fn fits(&self, kind: FeatureKind) -> bool {
        use FeatureUnit::*;
        match kind {
            FeatureKind::Angle => matches!(self, Radians | Degrees),
            FeatureKind::Velocity => matches!(self, RadiansPerSecond | DegreesPerSecond),
            FeatureKind::Moment => matches!(self, NewtonMetres | NewtonMetresPerKg),
            FeatureKind::Grf => matches!(self, Newtons | BodyWeight),
            FeatureKind::Cop => matches!(self, Metres | Millimetres),
            FeatureKind::Unknown => true,
        }
    }
}

/// Classification of one feature column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureMapping {
    pub kind: FeatureKind,
    pub unit: FeatureUnit,
}

impl FeatureMapping {
    pub fn of(name: &str) -> Self {
        Self {
            kind: FeatureKind::classify(name),
            unit: FeatureUnit::parse(name),
        }
    }

    /// Physiological magnitude bound scaled by `tolerance`, if any.
    pub fn bound(&self, tolerance: f64) -> Option<f64> {
        self.kind.bound(self.unit).map(|b| b * tolerance)
    }
}
