//! Static world data: facilities, adaptations, fix geography, aircraft types.
//!
//! Loaded once from JSON and validated before any facility is built, so the
//! runtime can treat a missing fix location as a programming error.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::adaptation::{AdaptationFixes, EramAdaptation, FixType, StarsFacilityAdaptation};
use crate::types::{NasError, Point2LL, Result};

/// A terminal area and the center that overlies it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tracon {
    pub artcc: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NasDatabase {
    #[serde(default)]
    pub tracons: BTreeMap<String, Tracon>,
    #[serde(default)]
    pub eram_adaptations: BTreeMap<String, EramAdaptation>,
    #[serde(default)]
    pub stars_adaptations: BTreeMap<String, StarsFacilityAdaptation>,
    #[serde(default)]
    pub fixes: BTreeMap<String, Point2LL>,
    /// Known aircraft type designators.
    #[serde(default)]
    pub aircraft_performance: BTreeSet<String>,
}

impl NasDatabase {
    /// Read and validate a database file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let db: NasDatabase = serde_json::from_str(text)?;
        db.validate()?;
        Ok(db)
    }

    /// Check cross references that the runtime relies on.
    pub fn validate(&self) -> Result<()> {
        for (id, tracon) in &self.tracons {
            if !self.eram_adaptations.contains_key(&tracon.artcc) {
                return Err(NasError::Config(format!(
                    "TRACON {id} names unknown ARTCC {}",
                    tracon.artcc
                )));
            }
        }

        let eram = self
            .eram_adaptations
            .iter()
            .flat_map(|(_, a)| a.coordination_fixes.iter());
        let stars = self
            .stars_adaptations
            .iter()
            .flat_map(|(_, a)| a.coordination_fixes.iter());
        for (name, fixes) in eram.chain(stars) {
            self.check_fixes(name, fixes)?;
        }
        Ok(())
    }

    fn check_fixes(&self, name: &str, fixes: &AdaptationFixes) -> Result<()> {
        match fixes.fix_type() {
            None if fixes.0.is_empty() => Err(NasError::Config(format!(
                "{name}: coordination fix has no altitude bands"
            ))),
            None => Err(NasError::Config(format!(
                "{name}: coordination fix mixes zone-based and route-based bands"
            ))),
            Some(FixType::ZoneBased) if self.fix_location(name).is_none() => {
                Err(NasError::MissingFixLocation(name.to_string()))
            }
            Some(_) => Ok(()),
        }
    }

    /// Location of a fix; `None` when absent or zero.
    pub fn fix_location(&self, fix: &str) -> Option<Point2LL> {
        self.fixes.get(fix).copied().filter(|p| !p.is_zero())
    }

    /// Overlying center of a TRACON.
    pub fn artcc_for(&self, tracon: &str) -> Option<&str> {
        self.tracons.get(tracon).map(|t| t.artcc.as_str())
    }

    pub fn is_known_aircraft_type(&self, actype: &str) -> bool {
        self.aircraft_performance.contains(actype)
    }

    /// TRACONs under a center, in identifier order.
    pub fn tracons_for(&self, artcc: &str) -> Vec<&str> {
        self.tracons
            .iter()
            .filter(|(_, t)| t.artcc == artcc)
            .map(|(id, _)| id.as_str())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
