//! STARS (terminal) actor.
//!
//! Holds plans sent down by its center or entered locally and track ownership
//! for aircraft in its airspace. Local codes come from the beacon bank its
//! center shares among all of its terminal facilities.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::abbreviated::{AbbreviatedFpFields, TypeOfFlight};
use crate::adaptation::StarsFacilityAdaptation;
use crate::database::NasDatabase;
use crate::flightplan::{
    AircraftSnapshot, FlightPlan, FlightPlanType, StarsFlightPlan, TrackInformation,
    UnsupportedTrack,
};
use crate::message::{Destination, Envelope, FlightPlanMessage, MessageBody, TransferPayload};
use crate::registry::FacilityDirectory;
use crate::squawk::SquawkAllocator;
use crate::types::{NasError, Result, Squawk};

/// Handoff outcome published to whoever drives the simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvent {
    TransferAccepted { callsign: String, to_controller: String },
    TransferRejected { callsign: String, to_controller: String },
}

#[derive(Debug, Clone)]
pub struct StarsComputer {
    pub identifier: String,
    /// Center that owns this facility.
    pub overlying_center: String,
    pub adaptation: StarsFacilityAdaptation,
    pub contained_plans: BTreeMap<Squawk, StarsFlightPlan>,
    pub received_messages: Vec<FlightPlanMessage>,
    pub track_information: BTreeMap<String, TrackInformation>,
    pub unsupported_tracks: Vec<UnsupportedTrack>,
    outbox: Vec<Envelope>,
}

impl StarsComputer {
    pub fn new(
        identifier: &str,
        overlying_center: &str,
        adaptation: StarsFacilityAdaptation,
    ) -> Self {
        StarsComputer {
            identifier: identifier.to_string(),
            overlying_center: overlying_center.to_string(),
            adaptation,
            contained_plans: BTreeMap::new(),
            received_messages: Vec::new(),
            track_information: BTreeMap::new(),
            unsupported_tracks: Vec::new(),
            outbox: Vec::new(),
        }
    }

    pub fn take_outbox(&mut self) -> Vec<Envelope> {
        std::mem::take(&mut self.outbox)
    }

    /// Draw a local code from the center's bank.
    pub fn create_squawk(&self, bank: &mut SquawkAllocator) -> Result<Squawk> {
        let sq = bank.allocate()?;
        debug!("{}: issued local code {sq}", self.identifier);
        Ok(sq)
    }

    pub fn release_squawk(&self, bank: &mut SquawkAllocator, sq: Squawk) -> Result<()> {
        bank.release(sq)
    }

    // -----------------------------------------------------------------------
    // Outgoing traffic
    // -----------------------------------------------------------------------

    pub fn send_to_overlying_eram(&mut self, msg: FlightPlanMessage) {
        self.outbox.push(Envelope {
            to: Destination::Eram(self.overlying_center.clone()),
            message: msg,
        });
    }

    /// Send track data to another facility. A known peer TRACON gets it
    /// directly; anything else goes up to our center.
    pub fn send_track_info(
        &mut self,
        receiving: &str,
        body: MessageBody,
        sim_time: DateTime<Utc>,
        directory: &FacilityDirectory,
    ) {
        let msg = FlightPlanMessage::new(&self.identifier, sim_time, body);
        if receiving != self.identifier && directory.is_tracon(receiving) {
            self.outbox.push(Envelope {
                to: Destination::Stars(receiving.to_string()),
                message: msg,
            });
        } else {
            self.send_to_overlying_eram(msg);
        }
    }

    /// Ask the center for the plan behind a code.
    pub fn request_flight_plan(&mut self, bcn: Squawk, sim_time: DateTime<Utc>) {
        let msg = FlightPlanMessage::new(
            &self.identifier,
            sim_time,
            MessageBody::RequestFlightPlan { bcn },
        );
        self.send_to_overlying_eram(msg);
    }

    // -----------------------------------------------------------------------
    // Lookups and local entry
    // -----------------------------------------------------------------------

    /// Find a held plan by beacon code or callsign.
    pub fn get_flight_plan(&self, identifier: &str) -> Result<&StarsFlightPlan> {
        if let Ok(sq) = identifier.parse::<Squawk>() {
            if let Some(fp) = self.contained_plans.get(&sq) {
                return Ok(fp);
            }
        }
        self.contained_plans
            .values()
            .find(|fp| fp.callsign() == identifier)
            .ok_or_else(|| NasError::NoMatchingFlight(identifier.to_string()))
    }

    pub fn add_track_information(&mut self, callsign: &str, info: TrackInformation) {
        self.track_information.insert(callsign.to_string(), info);
    }

    pub fn add_unsupported_track(&mut self, ut: UnsupportedTrack) {
        self.unsupported_tracks.push(ut);
    }

    fn track_mut(&mut self, callsign: &str) -> Result<&mut TrackInformation> {
        self.track_information
            .get_mut(callsign)
            .ok_or_else(|| NasError::NoMatchingFlight(callsign.to_string()))
    }

    pub fn set_scratchpad(&mut self, callsign: &str, sp: &str) -> Result<()> {
        self.track_mut(callsign)?.sp1 = sp.to_string();
        Ok(())
    }

    pub fn set_secondary_scratchpad(&mut self, callsign: &str, sp: &str) -> Result<()> {
        self.track_mut(callsign)?.sp2 = sp.to_string();
        Ok(())
    }

    /// Coordination fix for a held plan, using this facility's adaptation.
    pub fn coordination_fix(
        &self,
        fp: &StarsFlightPlan,
        aircraft: &AircraftSnapshot,
        db: &NasDatabase,
    ) -> Result<Option<String>> {
        fp.coordination_fix_for(&self.adaptation, aircraft, db)
    }

    /// Store a plan from a parsed abbreviated entry and return its code.
    ///
    /// Without a code in the entry one is drawn from `bank`; an entered code
    /// outside the bank marks the plan as en-route.
    pub fn create_local_plan(
        &mut self,
        fields: &AbbreviatedFpFields,
        bank: &mut SquawkAllocator,
    ) -> Result<Squawk> {
        if fields.acid.is_empty() {
            return Err(NasError::NoMatchingFlight(String::new()));
        }
        let (squawk, plan_type) = match fields.bcn {
            Some(sq) if sq.is_zero() => return Err(NasError::ZeroSquawk(fields.acid.clone())),
            Some(sq) if bank.contains(sq) => {
                bank.retire(sq);
                (sq, FlightPlanType::LocalNonEnroute)
            }
            Some(sq) => (sq, FlightPlanType::LocalEnroute),
            None => (self.create_squawk(bank)?, FlightPlanType::LocalNonEnroute),
        };

        let mut plan = FlightPlan {
            callsign: fields.acid.clone(),
            rules: fields.rules.unwrap_or_default(),
            aircraft_type: fields.aircraft_type.clone(),
            assigned_squawk: squawk,
            ..Default::default()
        };
        match fields.type_of_flight {
            Some(TypeOfFlight::Departure) => {
                plan.departure_airport = fields.departure_airport.clone()
            }
            Some(TypeOfFlight::Arrival) => plan.arrival_airport = fields.departure_airport.clone(),
            Some(TypeOfFlight::Overflight) | None => {}
        }

        let fp = StarsFlightPlan {
            plan,
            plan_type,
            altitude: fields.requested_alt.clone(),
            sp1: fields.sc1.clone(),
            sp2: fields.sc2.clone(),
            initial_controller: fields.controlling_position.clone(),
            ..Default::default()
        };
        info!("{}: local plan {} on {squawk}", self.identifier, fields.acid);
        self.contained_plans.insert(squawk, fp);
        Ok(squawk)
    }

    // -----------------------------------------------------------------------
    // Message sorting
    // -----------------------------------------------------------------------

    /// Process everything received before this call, appending any handoff
    /// outcomes to `events`.
    pub fn sort_received_messages(&mut self, events: &mut Vec<TransferEvent>) {
        for msg in std::mem::take(&mut self.received_messages) {
            match msg.body {
                MessageBody::Plan(p) => {
                    if p.bcn.is_zero() {
                        debug!("{}: dropping plan {} with no code", self.identifier, p.flight_id);
                    } else {
                        self.contained_plans.insert(p.bcn, p.flight_plan());
                    }
                }
                MessageBody::Amendment(p) => {
                    self.contained_plans.insert(p.bcn, p.flight_plan());
                }
                MessageBody::Cancellation { bcn } => {
                    self.contained_plans.remove(&bcn);
                }
                MessageBody::InitiateTransfer(t) => events.push(self.initiate_transfer(t)),
                MessageBody::AcceptRecallTransfer(t) => self.accept_recall_transfer(t),
                other => debug!("{}: ignoring {}", self.identifier, other.name()),
            }
        }
    }

    fn initiate_transfer(&mut self, t: TransferPayload) -> TransferEvent {
        let TransferPayload { bcn, track, .. } = t;
        let accepted = TransferEvent::TransferAccepted {
            callsign: track.identifier.clone(),
            to_controller: track.track_owner.clone(),
        };

        if let Some(fp) = self.contained_plans.remove(&bcn) {
            self.track_information.insert(
                track.identifier.clone(),
                TrackInformation::new(
                    &track.identifier,
                    &track.track_owner,
                    &track.handoff_controller,
                    Some(fp),
                ),
            );
            return accepted;
        }

        if let Some(existing) = self.track_information.remove(&track.identifier) {
            self.track_information.insert(
                track.identifier.clone(),
                TrackInformation::new(
                    &track.identifier,
                    &track.track_owner,
                    &track.handoff_controller,
                    existing.flight_plan,
                ),
            );
            return accepted;
        }

        warn!(
            "{}: no plan or track for transfer of {} ({bcn})",
            self.identifier, track.identifier
        );
        TransferEvent::TransferRejected {
            callsign: track.identifier,
            to_controller: track.track_owner,
        }
    }

    fn accept_recall_transfer(&mut self, t: TransferPayload) {
        let id = &t.track.identifier;
        let Some(info) = self.track_information.get_mut(id) else {
            debug!("{}: accept/recall for unknown track {id}", self.identifier);
            return;
        };
        if info.track_owner != t.track.track_owner {
            info.track_owner = t.track.track_owner.clone();
            info.handoff_controller.clear();
        } else {
            self.track_information.remove(id);
        }
    }

    /// Forget every plan and track belonging to the aircraft.
    pub fn completely_delete_aircraft(&mut self, callsign: &str, squawk: Squawk) {
        self.track_information
            .retain(|_, info| !info.matches_aircraft(callsign, squawk));
        self.contained_plans
            .retain(|sq, fp| *sq != squawk && fp.callsign() != callsign);
        self.unsupported_tracks.retain(|ut| {
            !ut.flight_plan
                .as_ref()
                .is_some_and(|fp| fp.callsign() == callsign || fp.squawk() == squawk)
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
