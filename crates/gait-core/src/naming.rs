//! Controlled vocabulary for feature column names.
//!
//! ## Layouts
//!
//! - Joint signals: `<joint>_<motion>_<measurement>_<side>_<unit>`
//! - Ground reaction force: `<direction>_grf_<side>_<unit>`
//! - Centre of pressure: `cop_<axis>_<side>_<unit>`
//!
//! [`NamingValidator::suggest`] repairs common abbreviations and small typos
//! token by token, and only proposes a name that itself passes the check.

use serde::{Deserialize, Serialize};

use crate::feature::{FeatureKind, FeatureUnit};

pub const JOINTS: &[&str] = &[
    "hip", "knee", "ankle", "pelvis", "trunk", "thorax", "foot", "shank", "thigh",
];

pub const MOTIONS: &[&str] = &[
    "flexion",
    "extension",
    "adduction",
    "abduction",
    "rotation",
    "dorsiflexion",
    "plantarflexion",
    "inversion",
    "eversion",
    "tilt",
    "obliquity",
];

pub const MEASUREMENTS: &[&str] = &["angle", "velocity", "moment"];

pub const SIDES: &[&str] = &["ipsi", "contra"];

pub const GRF_DIRECTIONS: &[&str] = &["vertical", "anterior", "posterior", "lateral", "medial"];

pub const COP_AXES: &[&str] = &["x", "y", "z"];

const ALIASES: &[(&str, &str)] = &[
    ("flex", "flexion"),
    ("ext", "extension"),
    ("add", "adduction"),
    ("abd", "abduction"),
    ("rot", "rotation"),
    ("df", "dorsiflexion"),
    ("pf", "plantarflexion"),
    ("ang", "angle"),
    ("vel", "velocity"),
    ("mom", "moment"),
    ("ipsilateral", "ipsi"),
    ("contralateral", "contra"),
    ("vert", "vertical"),
    ("ant", "anterior"),
    ("lat", "lateral"),
    ("radians", "rad"),
    ("degrees", "deg"),
    ("nm", "Nm"),
    ("bw", "BW"),
    ("n", "N"),
];

/// Largest edit distance accepted when snapping a token to the vocabulary
const MAX_EDIT_DISTANCE: usize = 2;

/// Which part of a feature name a problem was found in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NamingIssue {
    /// Name does not end in a recognised unit suffix
    UnknownUnit { suffix: String },
    /// Stem has the wrong number of `_`-separated tokens for its layout
    TokenCount { expected: usize, actual: usize },
    UnknownJoint(String),
    UnknownMotion(String),
    UnknownMeasurement(String),
    UnknownSide(String),
    UnknownDirection(String),
    UnknownAxis(String),
    /// A fixed layout token (`grf`, `cop`) is missing from its position
    UnexpectedToken { expected: String, found: String },
    /// Unit does not carry the measurement (e.g. an angle in newtons)
    UnitMismatch { kind: FeatureKind, unit: FeatureUnit },
}

/// Result of checking one feature name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameCheck {
    pub name: String,
    pub kind: FeatureKind,
    pub issues: Vec<NamingIssue>,
}

impl NameCheck {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Checks feature names against the controlled vocabulary
#[derive(Debug, Clone, Default)]
pub struct NamingValidator;

impl NamingValidator {
    pub fn new() -> Self {
        Self
    }

    /// Check a single feature name
    pub fn check(&self, name: &str) -> NameCheck {
        let kind = FeatureKind::classify(name);
        let mut issues = Vec::new();

        let stem = match FeatureUnit::split(name) {
            Some((stem, unit)) => {
                if !unit.fits(kind) {
                    issues.push(NamingIssue::UnitMismatch { kind, unit });
                }
                stem
            }
            None => {
                let suffix = name.rsplit('_').next().unwrap_or(name);
                issues.push(NamingIssue::UnknownUnit {
                    suffix: suffix.to_string(),
                });
                name.rsplit_once('_').map(|(stem, _)| stem).unwrap_or("")
            }
        };

        let tokens: Vec<&str> = stem.split('_').filter(|t| !t.is_empty()).collect();
        let layout = Layout::for_kind(kind);
        let slots = layout.slots();

        if tokens.len() != slots.len() {
            issues.push(NamingIssue::TokenCount {
                expected: slots.len(),
                actual: tokens.len(),
            });
        } else {
            for (token, slot) in tokens.iter().zip(slots) {
                if let Some(issue) = slot.check(token) {
                    issues.push(issue);
                }
            }
        }

        NameCheck {
            name: name.to_string(),
            kind,
            issues,
        }
    }

    /// Check every name, returning only the failing ones
    pub fn check_all<'a, I>(&self, names: I) -> Vec<NameCheck>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names
            .into_iter()
            .map(|n| self.check(n))
            .filter(|c| !c.is_valid())
            .collect()
    }

    /// Propose a corrected name, or `None` if the name is already valid or
    /// cannot be repaired.
    pub fn suggest(&self, name: &str) -> Option<String> {
        if self.check(name).is_valid() {
            return None;
        }

        let (stem, unit) = match FeatureUnit::split(name) {
            Some((stem, unit)) => (stem.to_string(), unit.suffix()?.to_string()),
            None => {
                let (stem, last) = name.rsplit_once('_')?;
                (stem.to_string(), snap_unit(last)?)
            }
        };

        let tokens: Vec<String> = stem
            .split('_')
            .filter(|t| !t.is_empty())
            .map(|t| t.to_ascii_lowercase())
            .collect();

        // Layout is decided on the corrected tokens so "vert_grf" and "cop"
        // typos still land in the force-plate layouts.
        let aliased: Vec<String> = tokens.iter().map(|t| resolve_alias(t)).collect();
        let layout = if aliased.iter().any(|t| t == "grf") {
            Layout::Grf
        } else if aliased.first().map(String::as_str) == Some("cop") {
            Layout::Cop
        } else {
            Layout::Joint
        };
        let slots = layout.slots();
        if aliased.len() != slots.len() {
            return None;
        }

        let mut corrected = Vec::with_capacity(slots.len() + 1);
        for (token, slot) in aliased.iter().zip(slots) {
            corrected.push(slot.snap(token)?);
        }
        corrected.push(unit);

        let candidate = corrected.join("_");
        (candidate != name && self.check(&candidate).is_valid()).then_some(candidate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Joint,
    Grf,
    Cop,
}

impl Layout {
    fn for_kind(kind: FeatureKind) -> Self {
        match kind {
            FeatureKind::Grf => Layout::Grf,
            FeatureKind::Cop => Layout::Cop,
            _ => Layout::Joint,
        }
    }

    fn slots(&self) -> &'static [Slot] {
        match self {
            Layout::Joint => &[Slot::Joint, Slot::Motion, Slot::Measurement, Slot::Side],
            Layout::Grf => &[Slot::Direction, Slot::Literal(&["grf"]), Slot::Side],
            Layout::Cop => &[Slot::Literal(&["cop"]), Slot::Axis, Slot::Side],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Joint,
    Motion,
    Measurement,
    Side,
    Direction,
    Axis,
    /// Fixed token(s) accepted in this position
    Literal(&'static [&'static str]),
}

impl Slot {
    fn vocabulary(&self) -> &'static [&'static str] {
        match self {
            Slot::Joint => JOINTS,
            Slot::Motion => MOTIONS,
            Slot::Measurement => MEASUREMENTS,
            Slot::Side => SIDES,
            Slot::Direction => GRF_DIRECTIONS,
            Slot::Axis => COP_AXES,
            Slot::Literal(words) => *words,
        }
    }

    fn check(&self, token: &str) -> Option<NamingIssue> {
        if self.vocabulary().contains(&token) {
            return None;
        }
        let token = token.to_string();
        Some(match self {
            Slot::Joint => NamingIssue::UnknownJoint(token),
            Slot::Motion => NamingIssue::UnknownMotion(token),
            Slot::Measurement => NamingIssue::UnknownMeasurement(token),
            Slot::Side => NamingIssue::UnknownSide(token),
            Slot::Direction => NamingIssue::UnknownDirection(token),
            Slot::Axis => NamingIssue::UnknownAxis(token),
            Slot::Literal(expected) => NamingIssue::UnexpectedToken {
                expected: expected.join("|"),
                found: token,
            },
        })
    }

    fn snap(&self, token: &str) -> Option<String> {
        nearest(token, self.vocabulary()).map(str::to_string)
    }
}

fn resolve_alias(token: &str) -> String {
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == token)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or_else(|| token.to_string())
}

fn snap_unit(token: &str) -> Option<String> {
    let resolved = resolve_alias(&token.to_ascii_lowercase());
    let single_token: Vec<&str> = FeatureUnit::SUFFIXES
        .iter()
        .map(|(suffix, _)| *suffix)
        .filter(|s| !s.contains('_'))
        .collect();
    nearest(&resolved, &single_token).map(str::to_string)
}

/// Closest vocabulary entry within [`MAX_EDIT_DISTANCE`], ties broken by order.
fn nearest<'v>(token: &str, vocabulary: &[&'v str]) -> Option<&'v str> {
    if let Some(exact) = vocabulary.iter().find(|v| **v == token) {
        return Some(exact);
    }
    // Single-letter axis tokens are too short for fuzzy matching.
    if token.len() <= 2 {
        return None;
    }
    vocabulary
        .iter()
        .map(|v| (strsim::levenshtein(token, v), *v))
        .filter(|(d, _)| *d <= MAX_EDIT_DISTANCE)
        .min_by_key(|(d, _)| *d)
        .map(|(_, v)| v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        let validator = NamingValidator::new();
        for name in [
            "hip_flexion_angle_ipsi_rad",
            "knee_flexion_velocity_contra_rad_s",
            "ankle_dorsiflexion_moment_ipsi_Nm_kg",
            "vertical_grf_ipsi_BW",
            "cop_x_contra_m",
        ] {
            let check = validator.check(name);
            assert!(check.is_valid(), "{name}: {:?}", check.issues);
        }
    }

    #[test]
    fn test_unknown_tokens_are_reported() {
        let check = NamingValidator::new().check("hip_flexon_angle_left_rad");
        assert!(check.issues.contains(&NamingIssue::UnknownMotion("flexon".into())));
        assert!(check.issues.contains(&NamingIssue::UnknownSide("left".into())));
    }

    #[test]
    fn test_unit_mismatch() {
        let check = NamingValidator::new().check("hip_flexion_angle_ipsi_N");
        assert_eq!(
            check.issues,
            vec![NamingIssue::UnitMismatch {
                kind: FeatureKind::Angle,
                unit: FeatureUnit::Newtons
            }]
        );
    }

    #[test]
    fn test_misplaced_force_plate_literal() {
        let validator = NamingValidator::new();
        let grf = validator.check("grf_vertical_ipsi_N");
        assert!(grf.issues.contains(&NamingIssue::UnexpectedToken {
            expected: "grf".into(),
            found: "vertical".into(),
        }));

        let cop = validator.check("x_cop_ipsi_m");
        assert!(cop.issues.contains(&NamingIssue::UnexpectedToken {
            expected: "cop".into(),
            found: "x".into(),
        }));
        assert!(cop.issues.contains(&NamingIssue::UnknownAxis("cop".into())));
    }

    #[test]
    fn test_missing_unit_and_token_count() {
        let check = NamingValidator::new().check("hip_angle");
        assert!(matches!(check.issues[0], NamingIssue::UnknownUnit { .. }));
        assert!(check
            .issues
            .iter()
            .any(|i| matches!(i, NamingIssue::TokenCount { expected: 4, .. })));
    }

    #[test]
    fn test_suggest_expands_aliases_and_typos() {
        let validator = NamingValidator::new();
        assert_eq!(
            validator.suggest("hip_flex_angle_ipsi_rad").as_deref(),
            Some("hip_flexion_angle_ipsi_rad")
        );
        assert_eq!(
            validator.suggest("knee_flexoin_ang_contra_degrees").as_deref(),
            Some("knee_flexion_angle_contra_deg")
        );
        assert_eq!(
            validator.suggest("vert_grf_ipsilateral_BW").as_deref(),
            Some("vertical_grf_ipsi_BW")
        );
    }

    #[test]
    fn test_suggest_none_for_valid_or_hopeless() {
        let validator = NamingValidator::new();
        assert_eq!(validator.suggest("hip_flexion_angle_ipsi_rad"), None);
        assert_eq!(validator.suggest("completely_unrelated_column"), None);
    }

    #[test]
    fn test_check_all_returns_failures_only() {
        let failures = NamingValidator::new()
            .check_all(["hip_flexion_angle_ipsi_rad", "speed"].iter().copied());
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].name, "speed");
    }
}
