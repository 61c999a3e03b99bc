//! ERAM (en-route center) actor.
//!
//! Owns the region's flight plans and track information and the terminal
//! facilities beneath it. Outgoing traffic is queued in an outbox and
//! delivered by the registry's router; nothing here touches another actor.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, warn};

use crate::adaptation::EramAdaptation;
use crate::flightplan::{StarsFlightPlan, TrackInformation};
use crate::message::{
    source_facility, Destination, Envelope, FlightPlanMessage, MessageBody, PlanPayload,
    TransferPayload, TRANSMIT_FP_MESSAGE_MINUTES,
};
use crate::registry::FacilityDirectory;
use crate::squawk::SquawkAllocator;
use crate::stars::StarsComputer;
use crate::types::{NasError, Result, Squawk};

#[derive(Debug, Clone)]
pub struct EramComputer {
    pub identifier: String,
    pub adaptation: EramAdaptation,
    pub stars_computers: BTreeMap<String, StarsComputer>,
    pub received_messages: Vec<FlightPlanMessage>,
    pub flight_plans: BTreeMap<Squawk, StarsFlightPlan>,
    pub track_information: BTreeMap<String, TrackInformation>,
    /// NAS codes for plans arriving from outside the simulation.
    pub available_squawks: SquawkAllocator,
    /// Local bank shared by every terminal facility under this center.
    pub stars_squawks: SquawkAllocator,
    outbox: Vec<Envelope>,
}

impl EramComputer {
    pub fn new(
        identifier: &str,
        adaptation: EramAdaptation,
        stars_computers: impl IntoIterator<Item = StarsComputer>,
        stars_squawks: SquawkAllocator,
    ) -> Self {
        EramComputer {
            identifier: identifier.to_string(),
            adaptation,
            stars_computers: stars_computers
                .into_iter()
                .map(|sc| (sc.identifier.clone(), sc))
                .collect(),
            received_messages: Vec::new(),
            flight_plans: BTreeMap::new(),
            track_information: BTreeMap::new(),
            available_squawks: SquawkAllocator::nas(),
            stars_squawks,
            outbox: Vec::new(),
        }
    }

    /// Issue a NAS code.
    pub fn create_squawk(&mut self) -> Result<Squawk> {
        self.available_squawks.allocate()
    }

    pub fn release_squawk(&mut self, sq: Squawk) -> Result<()> {
        self.available_squawks.release(sq)
    }

    /// Queue a message for one of this center's own terminal facilities.
    pub fn to_stars_facility(&mut self, facility: &str, msg: FlightPlanMessage) -> Result<()> {
        if !self.stars_computers.contains_key(facility) {
            return Err(NasError::UnknownFacility(facility.to_string()));
        }
        self.outbox.push(Envelope {
            to: Destination::Stars(facility.to_string()),
            message: msg,
        });
        Ok(())
    }

    /// Queue a message for a peer center.
    pub fn send_message_to_eram(
        &mut self,
        facility: &str,
        msg: FlightPlanMessage,
        directory: &FacilityDirectory,
    ) -> Result<()> {
        if facility == self.identifier || !directory.is_center(facility) {
            return Err(NasError::UnknownFacility(facility.to_string()));
        }
        self.outbox.push(Envelope {
            to: Destination::Eram(facility.to_string()),
            message: msg,
        });
        Ok(())
    }

    pub fn take_outbox(&mut self) -> Vec<Envelope> {
        std::mem::take(&mut self.outbox)
    }

    // -----------------------------------------------------------------------
    // Message sorting
    // -----------------------------------------------------------------------

    /// Process everything received before this call.
    ///
    /// A message that violates an invariant aborts the pass with an error;
    /// the messages behind it stay queued for the next pass.
    pub fn sort_messages(
        &mut self,
        directory: &FacilityDirectory,
        sim_time: DateTime<Utc>,
    ) -> Result<()> {
        let mut pending = std::mem::take(&mut self.received_messages).into_iter();
        while let Some(msg) = pending.next() {
            if let Err(e) = self.sort_message(msg, directory, sim_time) {
                error!("{}: aborting message sort: {e}", self.identifier);
                let rest: Vec<_> = pending.collect();
                self.received_messages.splice(0..0, rest);
                return Err(e);
            }
        }
        Ok(())
    }

    fn sort_message(
        &mut self,
        msg: FlightPlanMessage,
        directory: &FacilityDirectory,
        sim_time: DateTime<Utc>,
    ) -> Result<()> {
        match &msg.body {
            MessageBody::Plan(p) => self.receive_plan(p, &msg),
            MessageBody::RequestFlightPlan { bcn } => {
                self.answer_plan_request(*bcn, &msg.source_id, sim_time);
                Ok(())
            }
            MessageBody::InitiateTransfer(t) => {
                self.initiate_transfer(t, &msg, directory, sim_time);
                Ok(())
            }
            MessageBody::AcceptRecallTransfer(t) => {
                self.accept_recall_transfer(t, &msg, directory);
                Ok(())
            }
            // TODO: coordination time tracking (DepartureDM) and beacon
            // termination once the adaptation carries departure fix pairs.
            MessageBody::DepartureDm { .. }
            | MessageBody::BeaconTerminate { .. }
            | MessageBody::Amendment(_)
            | MessageBody::Cancellation { .. } => {
                debug!("{}: ignoring {}", self.identifier, msg.body.name());
                Ok(())
            }
        }
    }

    fn receive_plan(&mut self, p: &PlanPayload, msg: &FlightPlanMessage) -> Result<()> {
        if p.bcn.is_zero() {
            return Err(NasError::ZeroSquawk(p.flight_id.clone()));
        }

        let mut fp = p.flight_plan();
        if fp.coordination_fix.is_empty() {
            match self
                .adaptation
                .fix_for_route_and_altitude(&fp.plan.route, &fp.altitude)
            {
                Some(fix) => fp.coordination_fix = fix,
                None => {
                    warn!(
                        "{}: coordination fix not found for route \"{}\", altitude \"{}\"",
                        self.identifier, fp.plan.route, fp.altitude
                    );
                    self.flight_plans.insert(p.bcn, fp);
                    return Ok(());
                }
            }
        }

        let owner = self
            .adaptation
            .adaptation_fix_for_altitude(&fp.coordination_fix, &fp.altitude)
            .map(|af| af.to_facility.clone());
        self.flight_plans.insert(p.bcn, fp);

        if let Some(to) = owner.filter(|to| *to != self.identifier) {
            if let Err(e) = self.to_stars_facility(&to, msg.clone()) {
                debug!("{}: plan {} not forwarded: {e}", self.identifier, p.bcn);
            }
        }
        Ok(())
    }

    fn answer_plan_request(&mut self, bcn: Squawk, source_id: &str, sim_time: DateTime<Utc>) {
        let facility = source_facility(source_id);
        let Some(plan) = self.flight_plans.get(&bcn) else {
            debug!("{}: no plan for {bcn} requested by {facility}", self.identifier);
            return;
        };
        let reply = plan.departure_message(&self.identifier, sim_time);
        if let Err(e) = self.to_stars_facility(facility, reply) {
            warn!("{}: cannot answer plan request: {e}", self.identifier);
        }
    }

    fn initiate_transfer(
        &mut self,
        t: &TransferPayload,
        msg: &FlightPlanMessage,
        directory: &FacilityDirectory,
        sim_time: DateTime<Utc>,
    ) {
        let id = &t.track.identifier;
        let info = self
            .track_information
            .entry(id.clone())
            .or_insert_with(|| {
                TrackInformation::new(id, "", "", self.flight_plans.get(&t.bcn).cloned())
            });
        info.track_owner = t.track.track_owner.clone();
        info.handoff_controller = t.track.handoff_controller.clone();
        let altitude = info.flight_plan.as_ref().map(|fp| fp.altitude.clone());
        self.available_squawks.retire(t.bcn);

        let Some(altitude) = altitude else {
            warn!("{}: no flight plan behind track {id}", self.identifier);
            return;
        };
        let Some(to) = self
            .adaptation
            .adaptation_fix_for_altitude(&t.coordination_fix, &altitude)
            .map(|af| af.to_facility.clone())
        else {
            warn!(
                "{}: couldn't find adaptation fix {} at altitude \"{altitude}\"",
                self.identifier, t.coordination_fix
            );
            return;
        };

        if to == self.identifier {
            let fp = self.flight_plans.get(&t.bcn).cloned();
            self.track_information.insert(
                id.clone(),
                TrackInformation::new(
                    id,
                    &t.track.track_owner,
                    &t.track.handoff_controller,
                    fp,
                ),
            );
            return;
        }

        let fwd = msg.clone().forwarded_by(&self.identifier, sim_time);
        let sent = if to.starts_with('Z') {
            self.send_message_to_eram(&to, fwd, directory)
        } else {
            self.to_stars_facility(&to, fwd)
        };
        if let Err(e) = sent {
            warn!("{}: transfer of {id} not forwarded: {e}", self.identifier);
        }
    }

    fn accept_recall_transfer(
        &mut self,
        t: &TransferPayload,
        msg: &FlightPlanMessage,
        directory: &FacilityDirectory,
    ) {
        let id = &t.track.identifier;
        if !self.adaptation.coordination_fixes.contains_key(&t.coordination_fix) {
            warn!(
                "{}: adaptation fixes not found for coordination fix {}",
                self.identifier, t.coordination_fix
            );
            return;
        }
        let Some(info) = self.track_information.get_mut(id) else {
            warn!("{}: accept/recall for unknown track {id}", self.identifier);
            return;
        };

        // Same owner coming back means the handoff was recalled.
        if t.track.track_owner == info.track_owner {
            if let Err(e) = self.available_squawks.release(t.bcn) {
                warn!("{}: recall of {id}: {e}", self.identifier);
            }
        }
        info.track_owner = t.track.track_owner.clone();

        let altitude = info
            .flight_plan
            .as_ref()
            .map(|fp| fp.altitude.clone())
            .unwrap_or_default();
        let origin = self
            .adaptation
            .adaptation_fix_for_altitude(&t.coordination_fix, &altitude)
            .map(|af| af.from_facility.clone());
        if let Some(from) = origin.filter(|from| *from != self.identifier) {
            if let Err(e) = self.send_message_to_eram(&from, msg.clone(), directory) {
                warn!("{}: accept/recall of {id} not returned: {e}", self.identifier);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Timed transmission
    // -----------------------------------------------------------------------

    /// Send every plan whose coordination time is within the lead window and
    /// whose destination has not received it yet.
    pub fn send_flight_plans(&mut self, directory: &FacilityDirectory, sim_time: DateTime<Utc>) {
        // Plans held only through a track; table plans are evaluated below.
        let track_keys: Vec<String> = self
            .track_information
            .iter()
            .filter(|(_, info)| {
                info.flight_plan
                    .as_ref()
                    .is_some_and(|fp| !self.flight_plans.contains_key(&fp.squawk()))
            })
            .map(|(k, _)| k.clone())
            .collect();
        for key in track_keys {
            let due = self.track_information[&key]
                .flight_plan
                .as_ref()
                .and_then(|fp| self.due_destination(fp, sim_time).map(|to| (to, fp.message())));
            if let Some((to, payload)) = due {
                self.send_flight_plan(payload, &to, directory, sim_time);
                if let Some(fp) = self
                    .track_information
                    .get_mut(&key)
                    .and_then(|info| info.flight_plan.as_mut())
                {
                    fp.contained_facilities.push(to);
                }
            }
        }

        let squawks: Vec<Squawk> = self.flight_plans.keys().copied().collect();
        for sq in squawks {
            let fp = &self.flight_plans[&sq];
            if let Some(to) = self.due_destination(fp, sim_time) {
                let payload = fp.message();
                self.send_flight_plan(payload, &to, directory, sim_time);
                if let Some(fp) = self.flight_plans.get_mut(&sq) {
                    fp.contained_facilities.push(to);
                }
            }
        }
    }

    /// Destination facility if `fp` should go out now.
    fn due_destination(&self, fp: &StarsFlightPlan, sim_time: DateTime<Utc>) -> Option<String> {
        let lead = Duration::minutes(TRANSMIT_FP_MESSAGE_MINUTES);
        if fp
            .coordination_time
            .is_some_and(|ct| sim_time + lead < ct.time)
        {
            return None;
        }
        // Unresolved on receipt; already logged there.
        if fp.coordination_fix.is_empty() {
            return None;
        }

        let Some(fixes) = self.adaptation.coordination_fixes.get(&fp.coordination_fix) else {
            error!(
                "{}: no coordination fix found for plan coordination fix \"{}\"",
                self.identifier, fp.coordination_fix
            );
            return None;
        };
        match fixes.fix(&fp.altitude) {
            Ok(af) if fp.already_sent_to(&af.to_facility) => None,
            Ok(af) => Some(af.to_facility.clone()),
            Err(e) => {
                error!("{}: {} @ {}: {e}", self.identifier, fp.coordination_fix, fp.altitude);
                None
            }
        }
    }

    /// Deliver a plan to `to`: directly if it is one of our terminal
    /// facilities, otherwise through the center that owns it.
    fn send_flight_plan(
        &mut self,
        payload: PlanPayload,
        to: &str,
        directory: &FacilityDirectory,
        sim_time: DateTime<Utc>,
    ) {
        if to == self.identifier {
            return;
        }
        let msg = FlightPlanMessage::new(&self.identifier, sim_time, MessageBody::Plan(payload));
        if self.to_stars_facility(to, msg.clone()).is_ok() {
            return;
        }
        let delivered = match directory.center_for(to) {
            Some(center) => self.send_message_to_eram(center, msg, directory),
            None => Err(NasError::UnknownFacility(to.to_string())),
        };
        if let Err(e) = delivered {
            warn!("{}: plan for {to} not delivered: {e}", self.identifier);
        }
    }

    /// Forget every track belonging to the aircraft, here and below.
    pub fn completely_delete_aircraft(&mut self, callsign: &str, squawk: Squawk) {
        self.track_information
            .retain(|_, info| !info.matches_aircraft(callsign, squawk));
        for stars in self.stars_computers.values_mut() {
            stars.completely_delete_aircraft(callsign, squawk);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::tests::fixture;
    use crate::flightplan::{CoordinationTime, CoordinationTimeType, FlightPlan};
    use crate::message::{format_source_id, TrackFragment};
    use crate::registry::FacilityDirectory;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap()
    }

    fn center(id: &str) -> (EramComputer, FacilityDirectory) {
        let db = fixture();
        let stars = db
            .tracons_for(id)
            .into_iter()
            .map(|tracon| StarsComputer::new(tracon, id, Default::default()));
        let ec = EramComputer::new(
            id,
            db.eram_adaptations[id].clone(),
            stars,
            SquawkAllocator::beacon_bank(0o52),
        );
        (ec, FacilityDirectory::from_database(&db))
    }

    fn zny() -> (EramComputer, FacilityDirectory) {
        center("ZNY")
    }

    fn plan_payload(bcn: u16, route: &str, altitude: &str, fix: &str) -> PlanPayload {
        PlanPayload {
            flight_id: "1A2DAL45".into(),
            bcn: Squawk(bcn),
            route: route.into(),
            altitude: altitude.into(),
            coordination_fix: fix.into(),
            ..Default::default()
        }
    }

    fn plan_msg(p: PlanPayload) -> FlightPlanMessage {
        FlightPlanMessage::new("ZDC", t0(), MessageBody::Plan(p))
    }

    fn transfer(bcn: u16, fix: &str, owner: &str, handoff: &str) -> TransferPayload {
        TransferPayload {
            bcn: Squawk(bcn),
            coordination_fix: fix.into(),
            track: TrackFragment {
                identifier: "DAL45".into(),
                track_owner: owner.into(),
                handoff_controller: handoff.into(),
            },
        }
    }

    #[test]
    fn test_zero_squawk_plan_rejected() {
        let (mut ec, dir) = zny();
        ec.received_messages
            .push(plan_msg(plan_payload(0, "DIXIE", "120", "")));
        ec.received_messages
            .push(plan_msg(plan_payload(0o2301, "DIXIE", "120", "")));

        let err = ec.sort_messages(&dir, t0()).unwrap_err();
        assert!(matches!(err, NasError::ZeroSquawk(_)));
        assert!(ec.flight_plans.is_empty());
        // the message behind it is still queued
        assert_eq!(ec.received_messages.len(), 1);
    }

    #[test]
    fn test_plan_resolves_fix_and_forwards() {
        let (mut ec, dir) = zny();
        ec.received_messages
            .push(plan_msg(plan_payload(0o2301, "KEWR DIXIE V16", "120", "")));
        ec.sort_messages(&dir, t0()).unwrap();

        assert_eq!(ec.flight_plans[&Squawk(0o2301)].coordination_fix, "DIXIE");
        let out = ec.take_outbox();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to, Destination::Stars("PHL".into()));
    }

    #[test]
    fn test_plan_owned_here_not_forwarded() {
        let (mut ec, dir) = zny();
        ec.received_messages
            .push(plan_msg(plan_payload(0o2302, "KEWR DIXIE V16", "310", "")));
        ec.sort_messages(&dir, t0()).unwrap();
        assert!(ec.flight_plans.contains_key(&Squawk(0o2302)));
        assert!(ec.take_outbox().is_empty());
    }

    #[test]
    fn test_plan_without_fix_dropped_with_warning() {
        let (mut ec, dir) = zny();
        ec.received_messages
            .push(plan_msg(plan_payload(0o2303, "BDR SAX", "120", "")));
        ec.received_messages
            .push(plan_msg(plan_payload(0o2304, "DIXIE", "120", "")));
        ec.sort_messages(&dir, t0()).unwrap();

        // recorded but not routed; the rest of the batch still ran
        assert_eq!(ec.flight_plans[&Squawk(0o2303)].coordination_fix, "");
        assert_eq!(ec.take_outbox().len(), 1);
    }

    #[test]
    fn test_request_flight_plan_answers_requester() {
        let (mut ec, dir) = zny();
        ec.received_messages
            .push(plan_msg(plan_payload(0o2305, "DIXIE", "310", "DIXIE")));
        ec.received_messages.push(FlightPlanMessage {
            source_id: format_source_id("N90", t0()),
            body: MessageBody::RequestFlightPlan { bcn: Squawk(0o2305) },
        });
        ec.sort_messages(&dir, t0()).unwrap();

        let out = ec.take_outbox();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to, Destination::Stars("N90".into()));
        let MessageBody::Plan(p) = &out[0].message.body else {
            panic!("expected a plan");
        };
        assert_eq!(p.bcn, Squawk(0o2305));
        assert_eq!(p.altitude, "310");
        assert_eq!(out[0].message.source_id, "ZNY1800Z");
    }

    #[test]
    fn test_request_for_unknown_plan_ignored() {
        let (mut ec, dir) = zny();
        ec.received_messages.push(FlightPlanMessage::new(
            "N90",
            t0(),
            MessageBody::RequestFlightPlan { bcn: Squawk(0o7001) },
        ));
        ec.sort_messages(&dir, t0()).unwrap();
        assert!(ec.take_outbox().is_empty());
    }

    #[test]
    fn test_initiate_transfer_forwards_to_peer_center() {
        let (mut ec, dir) = zny();
        ec.received_messages
            .push(plan_msg(plan_payload(0o2306, "MERIT", "230", "MERIT")));
        ec.sort_messages(&dir, t0()).unwrap();
        ec.take_outbox();

        ec.received_messages.push(FlightPlanMessage::new(
            "N90",
            t0(),
            MessageBody::InitiateTransfer(transfer(0o2306, "MERIT", "2J", "B")),
        ));
        ec.sort_messages(&dir, t0()).unwrap();

        let info = &ec.track_information["DAL45"];
        assert_eq!(info.track_owner, "2J");
        assert_eq!(info.handoff_controller, "B");
        assert!(!ec.available_squawks.is_available(Squawk(0o2306)));

        let out = ec.take_outbox();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to, Destination::Eram("ZBW".into()));
        assert!(out[0].message.source_id.starts_with("ZNY"));
    }

    #[test]
    fn test_initiate_transfer_committed_locally() {
        let (mut ec, dir) = zny();
        ec.received_messages
            .push(plan_msg(plan_payload(0o2307, "DIXIE", "310", "DIXIE")));
        ec.received_messages.push(FlightPlanMessage::new(
            "N90",
            t0(),
            MessageBody::InitiateTransfer(transfer(0o2307, "DIXIE", "N56", "")),
        ));
        ec.sort_messages(&dir, t0()).unwrap();

        assert!(ec.take_outbox().is_empty());
        let info = &ec.track_information["DAL45"];
        assert_eq!(info.track_owner, "N56");
        assert_eq!(info.flight_plan.as_ref().unwrap().squawk(), Squawk(0o2307));
    }

    #[test]
    fn test_accept_recall_at_center() {
        let (mut ec, dir) = zny();
        ec.received_messages
            .push(plan_msg(plan_payload(0o2310, "MERIT", "230", "MERIT")));
        ec.received_messages.push(FlightPlanMessage::new(
            "N90",
            t0(),
            MessageBody::InitiateTransfer(transfer(0o2310, "MERIT", "2J", "B")),
        ));
        ec.sort_messages(&dir, t0()).unwrap();
        ec.take_outbox();
        assert!(!ec.available_squawks.is_available(Squawk(0o2310)));

        // recall: same owner returns, code goes back to the pool
        ec.received_messages.push(FlightPlanMessage::new(
            "N90",
            t0(),
            MessageBody::AcceptRecallTransfer(transfer(0o2310, "MERIT", "2J", "")),
        ));
        ec.sort_messages(&dir, t0()).unwrap();
        assert!(ec.available_squawks.is_available(Squawk(0o2310)));
        // MERIT originates here, so nothing goes back out
        assert!(ec.take_outbox().is_empty());
    }

    #[test]
    fn test_accept_at_receiving_center_returns_to_origin() {
        let (mut ec, dir) = center("ZBW");
        ec.received_messages
            .push(plan_msg(plan_payload(0o2320, "MERIT", "230", "MERIT")));
        ec.received_messages.push(FlightPlanMessage::new(
            "ZNY",
            t0(),
            MessageBody::InitiateTransfer(transfer(0o2320, "MERIT", "2J", "B12")),
        ));
        ec.sort_messages(&dir, t0()).unwrap();
        let out = ec.take_outbox();
        // plan and handoff both go down to A90
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|e| e.to == Destination::Stars("A90".into())));

        // accept: a new owner takes the track and the code stays out of the pool
        ec.received_messages.push(FlightPlanMessage::new(
            "A90",
            t0(),
            MessageBody::AcceptRecallTransfer(transfer(0o2320, "MERIT", "B12", "")),
        ));
        ec.sort_messages(&dir, t0()).unwrap();
        assert_eq!(ec.track_information["DAL45"].track_owner, "B12");
        assert!(!ec.available_squawks.is_available(Squawk(0o2320)));

        // MERIT originates at ZNY, so the acceptance goes back there
        let out = ec.take_outbox();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to, Destination::Eram("ZNY".into()));
        assert!(matches!(
            out[0].message.body,
            MessageBody::AcceptRecallTransfer(_)
        ));
    }

    #[test]
    fn test_oversized_altitude_stored_unrouted() {
        let (mut ec, dir) = zny();
        ec.received_messages
            .push(plan_msg(plan_payload(0o2321, "KATL DIXIE", "99999999", "")));
        ec.sort_messages(&dir, t0()).unwrap();

        assert_eq!(ec.flight_plans[&Squawk(0o2321)].coordination_fix, "");
        assert!(ec.take_outbox().is_empty());

        // no coordination fix, so the timed pass leaves it alone
        ec.send_flight_plans(&dir, t0());
        assert!(ec.take_outbox().is_empty());
        assert!(ec.flight_plans[&Squawk(0o2321)].contained_facilities.is_empty());
    }

    #[test]
    fn test_accept_with_unknown_fix_dropped() {
        let (mut ec, dir) = zny();
        ec.received_messages.push(FlightPlanMessage::new(
            "ZBW",
            t0(),
            MessageBody::AcceptRecallTransfer(transfer(0o2311, "NOPE", "B12", "")),
        ));
        ec.sort_messages(&dir, t0()).unwrap();
        assert!(ec.take_outbox().is_empty());
    }

    fn timed_plan(bcn: u16, fix: &str, altitude: &str, at: DateTime<Utc>) -> StarsFlightPlan {
        StarsFlightPlan {
            plan: FlightPlan {
                callsign: "DAL45".into(),
                assigned_squawk: Squawk(bcn),
                ..Default::default()
            },
            coordination_fix: fix.into(),
            coordination_time: Some(CoordinationTime {
                time: at,
                kind: CoordinationTimeType::Arrival,
            }),
            altitude: altitude.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_timed_transmission_window() {
        let (mut ec, dir) = zny();
        let coord = t0() + Duration::minutes(60);
        ec.flight_plans
            .insert(Squawk(0o2312), timed_plan(0o2312, "DIXIE", "120", coord));

        // 31 minutes out: too early
        ec.send_flight_plans(&dir, coord - Duration::minutes(31));
        assert!(ec.take_outbox().is_empty());

        // exactly 30 minutes out: sent
        ec.send_flight_plans(&dir, coord - Duration::minutes(30));
        let out = ec.take_outbox();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to, Destination::Stars("PHL".into()));
        assert_eq!(
            ec.flight_plans[&Squawk(0o2312)].contained_facilities,
            vec!["PHL".to_string()]
        );

        // never again
        ec.send_flight_plans(&dir, coord);
        assert!(ec.take_outbox().is_empty());
    }

    #[test]
    fn test_timed_transmission_falls_back_to_center() {
        let (mut ec, dir) = zny();
        // MERIT hands to ZBW, which is not one of our terminal facilities
        ec.flight_plans
            .insert(Squawk(0o2313), timed_plan(0o2313, "MERIT", "230", t0()));
        ec.send_flight_plans(&dir, t0());
        let out = ec.take_outbox();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to, Destination::Eram("ZBW".into()));
    }

    #[test]
    fn test_track_plan_transmitted_once() {
        let (mut ec, dir) = zny();
        let fp = timed_plan(0o2314, "DIXIE", "120", t0());
        ec.track_information
            .insert("DAL45".into(), TrackInformation::new("DAL45", "2J", "", Some(fp)));
        ec.send_flight_plans(&dir, t0());
        assert_eq!(ec.take_outbox().len(), 1);
        ec.send_flight_plans(&dir, t0());
        assert!(ec.take_outbox().is_empty());
    }

    #[test]
    fn test_completely_delete_aircraft() {
        let (mut ec, _) = zny();
        let fp = timed_plan(0o2315, "DIXIE", "120", t0());
        ec.track_information
            .insert("DAL45".into(), TrackInformation::new("DAL45", "2J", "", Some(fp.clone())));
        ec.stars_computers
            .get_mut("N90")
            .unwrap()
            .add_track_information("DAL45", TrackInformation::new("DAL45", "2J", "", Some(fp)));

        ec.completely_delete_aircraft("DAL45", Squawk(0o7777));
        assert!(ec.track_information.is_empty());
        assert!(ec.stars_computers["N90"].track_information.is_empty());
    }
}
