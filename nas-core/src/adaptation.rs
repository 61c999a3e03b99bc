//! Coordination adaptation: named fixes mapped to altitude-banded handoff rules.
//!
//! The adaptation is static data loaded with the [`crate::database`]; this
//! module only answers "which facility owns traffic at this fix and altitude".

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{NasError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixType {
    RouteBased,
    ZoneBased,
}

/// One altitude band of a coordination fix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdaptationFix {
    #[serde(rename = "type")]
    pub fix_type: FixType,
    pub to_facility: String,
    pub from_facility: String,
    /// Inclusive band in feet.
    #[serde(default = "full_band")]
    pub altitude: [i32; 2],
}

fn full_band() -> [i32; 2] {
    [0, 99_900]
}

/// All altitude bands configured for a single fix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdaptationFixes(pub Vec<AdaptationFix>);

impl AdaptationFixes {
    /// Resolve the band for an altitude string ("310", "VFR/170", "170B210").
    ///
    /// A fix with a single band matches any altitude.
    pub fn fix(&self, altitude: &str) -> Result<&AdaptationFix> {
        match self.0.as_slice() {
            [] => Err(NasError::NoMatchingFix(altitude.to_string())),
            [only] => Ok(only),
            bands => {
                let alt = parse_altitude(altitude)
                    .ok_or_else(|| NasError::NoMatchingFix(altitude.to_string()))?;
                bands
                    .iter()
                    .find(|f| alt >= f.altitude[0] && alt <= f.altitude[1])
                    .ok_or_else(|| NasError::NoMatchingFix(altitude.to_string()))
            }
        }
    }

    /// The fix type shared by every band, or `None` if bands disagree.
    pub fn fix_type(&self) -> Option<FixType> {
        let first = self.0.first()?.fix_type;
        self.0
            .iter()
            .all(|f| f.fix_type == first)
            .then_some(first)
    }

    pub fn is_zone_based(&self) -> bool {
        self.0.iter().any(|f| f.fix_type == FixType::ZoneBased)
    }
}

/// Parse a flight-plan altitude string into feet.
///
/// Values are in hundreds of feet. A "VFR/" prefix is skipped and block
/// altitudes use the lower bound. Plain "VFR" and values too large for an
/// `i32` in feet have no numeric altitude.
pub fn parse_altitude(altitude: &str) -> Option<i32> {
    let s = altitude.trim();
    let s = s.strip_prefix("VFR/").unwrap_or(s);
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<i32>().ok()?.checked_mul(100)
}

// ---------------------------------------------------------------------------
// Per-facility adaptations
// ---------------------------------------------------------------------------

/// ERAM (center) adaptation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EramAdaptation {
    #[serde(default)]
    pub coordination_fixes: BTreeMap<String, AdaptationFixes>,
}

impl EramAdaptation {
    /// First coordination fix named along the route that has a band for
    /// `altitude`.
    pub fn fix_for_route_and_altitude(&self, route: &str, altitude: &str) -> Option<String> {
        route
            .split(|c: char| c.is_whitespace() || c == '.')
            .filter(|tok| !tok.is_empty())
            .find(|tok| {
                self.coordination_fixes
                    .get(*tok)
                    .is_some_and(|fixes| fixes.fix(altitude).is_ok())
            })
            .map(str::to_string)
    }

    pub fn adaptation_fix_for_altitude(&self, fix: &str, altitude: &str) -> Option<&AdaptationFix> {
        self.coordination_fixes.get(fix)?.fix(altitude).ok()
    }
}

/// STARS (terminal) facility adaptation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StarsFacilityAdaptation {
    #[serde(default)]
    pub coordination_fixes: BTreeMap<String, AdaptationFixes>,
    /// Whether scratchpad 1 / scratchpad 2 may use the long form.
    #[serde(default)]
    pub allow_long_scratchpad: [bool; 2],
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
