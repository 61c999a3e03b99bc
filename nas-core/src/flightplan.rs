//! Flight plans, track ownership records, and coordination fix resolution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::adaptation::{FixType, StarsFacilityAdaptation};
use crate::database::NasDatabase;
use crate::types::{FlightRules, NasError, Point2LL, Result, Squawk};

// ---------------------------------------------------------------------------
// Generic flight plan
// ---------------------------------------------------------------------------

/// Flight plan as filed, independent of any automation system.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlightPlan {
    pub callsign: String,
    /// Three-character facility-assigned code prefixed to the callsign on
    /// the wire.
    #[serde(default)]
    pub ecid: String,
    #[serde(default)]
    pub rules: FlightRules,
    /// Full type string, e.g. `B738/L`, `H/B744/L`, `2/F16/G`.
    #[serde(default)]
    pub aircraft_type: String,
    #[serde(default)]
    pub assigned_squawk: Squawk,
    #[serde(default)]
    pub departure_airport: String,
    #[serde(default)]
    pub arrival_airport: String,
    /// Cruise altitude in feet.
    #[serde(default)]
    pub altitude: i32,
    #[serde(default)]
    pub route: String,
    /// Exit fix for departures.
    #[serde(default)]
    pub exit: String,
}

impl FlightPlan {
    /// Type designator without weight-class prefix, formation count, or
    /// equipment suffix.
    pub fn type_without_suffix(&self) -> &str {
        let fields: Vec<&str> = self.aircraft_type.split('/').collect();
        match fields.as_slice() {
            [_, actype, _] => *actype,
            [prefix, actype] if is_type_prefix(prefix) => *actype,
            [actype, _] => *actype,
            _ => &self.aircraft_type,
        }
    }

    /// Trailing equipment suffix including the slash (`/L`), or empty.
    pub fn equipment_suffix(&self) -> &str {
        let fields: Vec<&str> = self.aircraft_type.split('/').collect();
        let has_suffix = match fields.as_slice() {
            [_, _, _] => true,
            [prefix, _] => !is_type_prefix(prefix),
            _ => false,
        };
        match self.aircraft_type.rfind('/') {
            Some(idx) if has_suffix => &self.aircraft_type[idx..],
            _ => "",
        }
    }
}

/// Weight class (H, S, J) or formation count ahead of the type.
fn is_type_prefix(s: &str) -> bool {
    matches!(s, "H" | "S" | "J") || (!s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
}

// ---------------------------------------------------------------------------
// STARS flight plan
// ---------------------------------------------------------------------------

/// Where a plan held by a terminal facility came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlightPlanType {
    /// Sent down by an overlying center.
    #[default]
    RemoteEnroute,
    /// Sent over by an adjacent terminal facility.
    RemoteNonEnroute,
    /// Entered locally and given a NAS code.
    LocalEnroute,
    /// Entered locally and given a local code.
    LocalNonEnroute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinationTimeType {
    Departure,
    Arrival,
    Overflight,
}

impl CoordinationTimeType {
    /// Single-letter code used on the wire (P, A, E).
    pub fn letter(&self) -> char {
        match self {
            CoordinationTimeType::Departure => 'P',
            CoordinationTimeType::Arrival => 'A',
            CoordinationTimeType::Overflight => 'E',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinationTime {
    pub time: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: CoordinationTimeType,
}

/// A flight plan with terminal coordination metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StarsFlightPlan {
    pub plan: FlightPlan,
    #[serde(default)]
    pub plan_type: FlightPlanType,
    /// `None` behaves as "already due".
    #[serde(default)]
    pub coordination_time: Option<CoordinationTime>,
    #[serde(default)]
    pub coordination_fix: String,
    /// Facilities this plan has already been sent to.
    #[serde(default)]
    pub contained_facilities: Vec<String>,
    /// Altitude as carried in messages: "310", "VFR/170", "170B210".
    #[serde(default)]
    pub altitude: String,
    #[serde(default)]
    pub sp1: String,
    #[serde(default)]
    pub sp2: String,
    /// Owning position for abbreviated entries.
    #[serde(default)]
    pub initial_controller: String,
}

impl StarsFlightPlan {
    pub fn callsign(&self) -> &str {
        &self.plan.callsign
    }

    pub fn squawk(&self) -> Squawk {
        self.plan.assigned_squawk
    }

    pub fn already_sent_to(&self, facility: &str) -> bool {
        self.contained_facilities.iter().any(|f| f == facility)
    }

    /// Find the coordination fix for this plan at a terminal facility.
    ///
    /// Route-based fixes named in the route or along the aircraft's waypoints
    /// win; otherwise the nearest zone-based fix to the aircraft is used.
    pub fn coordination_fix_for(
        &self,
        adaptation: &StarsFacilityAdaptation,
        aircraft: &AircraftSnapshot,
        db: &NasDatabase,
    ) -> Result<Option<String>> {
        for (fix, fixes) in &adaptation.coordination_fixes {
            let Ok(band) = fixes.fix(&self.altitude) else {
                continue;
            };
            if band.fix_type == FixType::ZoneBased {
                continue;
            }
            if self.plan.route.contains(fix.as_str()) || aircraft.waypoints.iter().any(|w| w == fix)
            {
                return Ok(Some(fix.clone()));
            }
        }

        let position = aircraft.position;
        let mut closest: Option<(&String, f64)> = None;
        for (fix, fixes) in &adaptation.coordination_fixes {
            if !fixes.is_zone_based() {
                continue;
            }
            let location = db
                .fix_location(fix)
                .ok_or_else(|| NasError::MissingFixLocation(fix.clone()))?;
            let dist = position.nm_distance(&location);
            if closest.map_or(true, |(_, best)| dist < best) {
                closest = Some((fix, dist));
            }
        }
        Ok(closest.map(|(fix, _)| fix.clone()))
    }
}

// ---------------------------------------------------------------------------
// Track ownership
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectedHandoff {
    pub original_owner: String,
    pub redirector: Vec<String>,
    pub redirected_to: String,
}

/// Who controls a track and who it is being handed to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackInformation {
    pub identifier: String,
    pub track_owner: String,
    pub handoff_controller: String,
    pub flight_plan: Option<StarsFlightPlan>,
    pub point_out: String,
    pub point_out_history: Vec<String>,
    pub redirected_handoff: RedirectedHandoff,
    pub sp1: String,
    pub sp2: String,
    /// Plan was associated automatically rather than by a controller.
    pub auto_associate_fp: bool,
}

impl TrackInformation {
    pub fn new(
        identifier: &str,
        track_owner: &str,
        handoff_controller: &str,
        flight_plan: Option<StarsFlightPlan>,
    ) -> Self {
        TrackInformation {
            identifier: identifier.to_string(),
            track_owner: track_owner.to_string(),
            handoff_controller: handoff_controller.to_string(),
            flight_plan,
            ..Default::default()
        }
    }

    /// Whether this track belongs to the given aircraft.
    pub fn matches_aircraft(&self, callsign: &str, squawk: Squawk) -> bool {
        self.flight_plan
            .as_ref()
            .is_some_and(|fp| fp.callsign() == callsign || fp.squawk() == squawk)
    }
}

/// A track seen without a flight plan (e.g. primary-only).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnsupportedTrack {
    pub location: Point2LL,
    pub owner: String,
    pub handoff_controller: String,
    pub flight_plan: Option<StarsFlightPlan>,
}

/// What the aircraft simulation tells us about an aircraft.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AircraftSnapshot {
    pub callsign: String,
    pub squawk: Squawk,
    pub position: Point2LL,
    /// Remaining planned fixes, in order.
    pub waypoints: Vec<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
