//! Inter-facility flight data messages and plan <-> message conversion.
//!
//! Every message kind carries only the fields it uses. Messages are built,
//! routed and consumed within a single update pass.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::flightplan::{CoordinationTime, FlightPlan, StarsFlightPlan};
use crate::types::{FlightRules, Squawk};

/// Plans are transmitted once simulated time is this close to their
/// coordination time.
pub const TRANSMIT_FP_MESSAGE_MINUTES: i64 = 30;

/// Length of the facility-assigned prefix on a flight identifier.
const ECID_LEN: usize = 3;

/// Source identifier: facility plus simulated time, e.g. `ZNY2034Z`.
pub fn format_source_id(facility: &str, time: DateTime<Utc>) -> String {
    format!("{facility}{}", time.format("%H%MZ"))
}

/// Facility portion of a source identifier.
pub fn source_facility(source_id: &str) -> &str {
    match source_id.char_indices().nth(ECID_LEN) {
        Some((idx, _)) => &source_id[..idx],
        None => source_id,
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AircraftData {
    #[serde(default)]
    pub departure_location: String,
    #[serde(default)]
    pub arrival_location: String,
    #[serde(default = "one")]
    pub number_of_aircraft: u32,
    /// Type without prefix or suffix (A20N, B737).
    #[serde(default)]
    pub aircraft_type: String,
    /// Full type string as filed.
    #[serde(default)]
    pub aircraft_category: String,
    /// Equipment suffix (`/L`, `/G`).
    #[serde(default)]
    pub equipment: String,
}

fn one() -> u32 {
    1
}

/// Flight plan fields as carried by Plan and Amendment messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanPayload {
    /// ECID followed by the callsign.
    pub flight_id: String,
    #[serde(default)]
    pub aircraft_data: AircraftData,
    pub bcn: Squawk,
    #[serde(default)]
    pub coordination_fix: String,
    #[serde(default)]
    pub coordination_time: Option<CoordinationTime>,
    /// Requested altitude for departures, assigned for arrivals; may be
    /// "VFR", "VFR/170" or a block like "170B210".
    #[serde(default)]
    pub altitude: String,
    #[serde(default)]
    pub route: String,
}

/// Track ownership fragment carried by transfer messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackFragment {
    /// Aircraft identifier (callsign).
    pub identifier: String,
    #[serde(default)]
    pub track_owner: String,
    #[serde(default)]
    pub handoff_controller: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferPayload {
    pub bcn: Squawk,
    #[serde(default)]
    pub coordination_fix: String,
    pub track: TrackFragment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageBody {
    /// Full flight plan. Sent by both centers and terminal facilities.
    Plan(PlanPayload),
    Amendment(PlanPayload),
    Cancellation { bcn: Squawk },
    /// Terminal facility asking its center for a plan by code.
    RequestFlightPlan { bcn: Squawk },
    DepartureDm { bcn: Squawk },
    BeaconTerminate { bcn: Squawk },
    /// Handoff initiated; carries the proposed owner.
    InitiateTransfer(TransferPayload),
    /// Handoff accepted or recalled, told apart by the carried owner.
    AcceptRecallTransfer(TransferPayload),
}

impl MessageBody {
    pub fn name(&self) -> &'static str {
        match self {
            MessageBody::Plan(_) => "Plan",
            MessageBody::Amendment(_) => "Amendment",
            MessageBody::Cancellation { .. } => "Cancellation",
            MessageBody::RequestFlightPlan { .. } => "RequestFlightPlan",
            MessageBody::DepartureDm { .. } => "DepartureDM",
            MessageBody::BeaconTerminate { .. } => "BeaconTerminate",
            MessageBody::InitiateTransfer(_) => "InitiateTransfer",
            MessageBody::AcceptRecallTransfer(_) => "AcceptRecallTransfer",
        }
    }

    pub fn bcn(&self) -> Squawk {
        match self {
            MessageBody::Plan(p) | MessageBody::Amendment(p) => p.bcn,
            MessageBody::Cancellation { bcn }
            | MessageBody::RequestFlightPlan { bcn }
            | MessageBody::DepartureDm { bcn }
            | MessageBody::BeaconTerminate { bcn } => *bcn,
            MessageBody::InitiateTransfer(t) | MessageBody::AcceptRecallTransfer(t) => t.bcn,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightPlanMessage {
    /// `LLLhhmmZ`: sending facility and simulated time.
    pub source_id: String,
    pub body: MessageBody,
}

impl FlightPlanMessage {
    pub fn new(facility: &str, time: DateTime<Utc>, body: MessageBody) -> Self {
        FlightPlanMessage {
            source_id: format_source_id(facility, time),
            body,
        }
    }

    /// Restamp with a forwarding facility.
    pub fn forwarded_by(mut self, facility: &str, time: DateTime<Utc>) -> Self {
        self.source_id = format_source_id(facility, time);
        self
    }
}

// ---------------------------------------------------------------------------
// Addressing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    Eram(String),
    Stars(String),
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Destination::Eram(id) => write!(f, "ERAM {id}"),
            Destination::Stars(id) => write!(f, "STARS {id}"),
        }
    }
}

/// A message waiting in an actor's outbox.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub to: Destination,
    pub message: FlightPlanMessage,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

/// ECID normalized to exactly three characters so the callsign can be split
/// back off on receipt.
fn wire_ecid(ecid: &str) -> String {
    let ecid: String = ecid.chars().take(ECID_LEN).collect();
    format!("{ecid:0>width$}", width = ECID_LEN)
}

fn aircraft_data(fp: &FlightPlan) -> AircraftData {
    AircraftData {
        departure_location: fp.departure_airport.clone(),
        arrival_location: fp.arrival_airport.clone(),
        number_of_aircraft: 1,
        aircraft_type: fp.type_without_suffix().to_string(),
        aircraft_category: fp.aircraft_type.clone(),
        equipment: fp.equipment_suffix().to_string(),
    }
}

impl StarsFlightPlan {
    /// Plan fields as sent on the wire.
    pub fn message(&self) -> PlanPayload {
        PlanPayload {
            flight_id: wire_ecid(&self.plan.ecid) + &self.plan.callsign,
            aircraft_data: aircraft_data(&self.plan),
            bcn: self.plan.assigned_squawk,
            coordination_fix: self.coordination_fix.clone(),
            coordination_time: self.coordination_time,
            altitude: self.altitude.clone(),
            route: self.plan.route.clone(),
        }
    }
}

impl PlanPayload {
    /// Rebuild a terminal flight plan from a received message.
    pub fn flight_plan(&self) -> StarsFlightPlan {
        let rules = if self.altitude.contains("VFR") {
            FlightRules::Vfr
        } else {
            FlightRules::Ifr
        };
        let mut fp = StarsFlightPlan {
            plan: FlightPlan {
                rules,
                aircraft_type: self.aircraft_data.aircraft_type.clone()
                    + &self.aircraft_data.equipment,
                assigned_squawk: self.bcn,
                departure_airport: self.aircraft_data.departure_location.clone(),
                arrival_airport: self.aircraft_data.arrival_location.clone(),
                route: self.route.clone(),
                ..Default::default()
            },
            coordination_fix: self.coordination_fix.clone(),
            coordination_time: self.coordination_time,
            altitude: self.altitude.clone(),
            ..Default::default()
        };

        if let Some((idx, _)) = self.flight_id.char_indices().nth(ECID_LEN) {
            fp.plan.ecid = self.flight_id[..idx].to_string();
            fp.plan.callsign = self.flight_id[idx..].to_string();
        }
        fp
    }
}

/// Plan message answering a RequestFlightPlan.
pub fn departure_message(fp: &FlightPlan, facility: &str, time: DateTime<Utc>) -> FlightPlanMessage {
    let vfr = if fp.rules == FlightRules::Vfr { "VFR/" } else { "" };
    let payload = PlanPayload {
        flight_id: wire_ecid(&fp.ecid) + &fp.callsign,
        aircraft_data: aircraft_data(fp),
        bcn: fp.assigned_squawk,
        coordination_fix: fp.exit.clone(),
        coordination_time: None,
        altitude: format!("{vfr}{}", fp.altitude / 100),
        route: fp.route.clone(),
    };
    FlightPlanMessage::new(facility, time, MessageBody::Plan(payload))
}

impl StarsFlightPlan {
    /// Departure message for this plan, keeping the coordination fix and
    /// altitude already resolved here over the filed ones.
    pub fn departure_message(&self, facility: &str, time: DateTime<Utc>) -> FlightPlanMessage {
        let mut msg = departure_message(&self.plan, facility, time);
        if let MessageBody::Plan(p) = &mut msg.body {
            if !self.coordination_fix.is_empty() {
                p.coordination_fix = self.coordination_fix.clone();
            }
            if !self.altitude.is_empty() {
                p.altitude = self.altitude.clone();
            }
            p.coordination_time = self.coordination_time;
        }
        msg
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
