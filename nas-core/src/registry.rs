//! Facility registry: builds every center and terminal facility from the
//! database, routes messages between them, and drives the update tick.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::abbreviated::AbbreviatedFpFields;
use crate::database::NasDatabase;
use crate::eram::EramComputer;
use crate::flightplan::{StarsFlightPlan, TrackInformation};
use crate::message::{Destination, Envelope, FlightPlanMessage, MessageBody};
use crate::squawk::SquawkAllocator;
use crate::stars::{StarsComputer, TransferEvent};
use crate::types::{NasError, Result, Squawk};

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

/// Which facility identifiers exist and which center owns each TRACON.
#[derive(Debug, Clone, Default)]
pub struct FacilityDirectory {
    centers: BTreeSet<String>,
    tracons: BTreeMap<String, String>,
}

impl FacilityDirectory {
    pub fn from_database(db: &NasDatabase) -> Self {
        FacilityDirectory {
            centers: db.eram_adaptations.keys().cloned().collect(),
            tracons: db
                .tracons
                .iter()
                .map(|(id, t)| (id.clone(), t.artcc.clone()))
                .collect(),
        }
    }

    pub fn is_center(&self, facility: &str) -> bool {
        self.centers.contains(facility)
    }

    pub fn is_tracon(&self, facility: &str) -> bool {
        self.tracons.contains_key(facility)
    }

    /// The center itself, or the center overlying a TRACON.
    pub fn center_for(&self, facility: &str) -> Option<&str> {
        if let Some(center) = self.centers.get(facility) {
            return Some(center.as_str());
        }
        self.tracons.get(facility).map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// One row of the facility overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacilitySummary {
    pub facility: String,
    pub kind: &'static str,
    pub center: String,
    pub plans: usize,
    pub tracks: usize,
    pub queued: usize,
    pub codes_available: usize,
}

#[derive(Debug, Clone)]
pub struct EramComputers {
    pub computers: BTreeMap<String, EramComputer>,
    directory: FacilityDirectory,
}

impl EramComputers {
    /// Build one center per ERAM adaptation and one terminal facility per
    /// TRACON. The TRACONs under a center share one pool of `beacon_bank`
    /// codes.
    pub fn new(db: &NasDatabase, beacon_bank: u16) -> Self {
        let computers = db
            .eram_adaptations
            .iter()
            .map(|(artcc, adaptation)| {
                let stars = db.tracons_for(artcc).into_iter().map(|tracon| {
                    StarsComputer::new(
                        tracon,
                        artcc,
                        db.stars_adaptations.get(tracon).cloned().unwrap_or_default(),
                    )
                });
                let ec = EramComputer::new(
                    artcc,
                    adaptation.clone(),
                    stars,
                    SquawkAllocator::beacon_bank(beacon_bank),
                );
                (artcc.clone(), ec)
            })
            .collect();
        EramComputers {
            computers,
            directory: FacilityDirectory::from_database(db),
        }
    }

    pub fn directory(&self) -> &FacilityDirectory {
        &self.directory
    }

    /// The owning center and, for a TRACON, its terminal facility.
    pub fn facility_computers(
        &self,
        facility: &str,
    ) -> Result<(&EramComputer, Option<&StarsComputer>)> {
        let unknown = || NasError::UnknownFacility(facility.to_string());
        if let Some(ec) = self.computers.get(facility) {
            return Ok((ec, None));
        }
        let center = self.directory.center_for(facility).ok_or_else(unknown)?;
        let ec = self.computers.get(center).ok_or_else(unknown)?;
        let sc = ec.stars_computers.get(facility).ok_or_else(unknown)?;
        Ok((ec, Some(sc)))
    }

    pub fn eram_mut(&mut self, facility: &str) -> Result<&mut EramComputer> {
        let center = self
            .directory
            .center_for(facility)
            .ok_or_else(|| NasError::UnknownFacility(facility.to_string()))?;
        self.computers
            .get_mut(center)
            .ok_or_else(|| NasError::UnknownFacility(facility.to_string()))
    }

    pub fn stars_mut(&mut self, tracon: &str) -> Result<&mut StarsComputer> {
        self.eram_mut(tracon)?
            .stars_computers
            .get_mut(tracon)
            .ok_or_else(|| NasError::UnknownFacility(tracon.to_string()))
    }

    // -----------------------------------------------------------------------
    // Routing
    // -----------------------------------------------------------------------

    /// Put a message in a facility's inbox. Messages for unknown
    /// facilities are logged and dropped.
    pub fn deliver(&mut self, env: Envelope) {
        let inbox = match &env.to {
            Destination::Eram(id) => self.computers.get_mut(id).map(|ec| &mut ec.received_messages),
            Destination::Stars(id) => self
                .directory
                .center_for(id)
                .and_then(|center| self.computers.get_mut(center))
                .and_then(|ec| ec.stars_computers.get_mut(id))
                .map(|sc| &mut sc.received_messages),
        };
        match inbox {
            Some(inbox) => {
                debug!("{} -> {}: {}", env.message.source_id, env.to, env.message.body.name());
                inbox.push(env.message);
            }
            None => warn!("dropping {} for unknown {}", env.message.body.name(), env.to),
        }
    }

    /// Queue an externally produced message.
    pub fn inject(&mut self, to: Destination, message: FlightPlanMessage) {
        self.deliver(Envelope { to, message });
    }

    fn route(&mut self, outbox: Vec<Envelope>) {
        for env in outbox {
            self.deliver(env);
        }
    }

    /// Drain every outbox filled outside of `update`.
    fn route_pending(&mut self) {
        let mut pending = Vec::new();
        for ec in self.computers.values_mut() {
            pending.extend(ec.take_outbox());
            for sc in ec.stars_computers.values_mut() {
                pending.extend(sc.take_outbox());
            }
        }
        self.route(pending);
    }

    /// One simulation tick.
    ///
    /// Centers run in identifier order: each sorts its inbox, sends due
    /// plans, then lets each of its terminal facilities sort theirs. Mail
    /// produced by a step is delivered before the next step runs.
    pub fn update(&mut self, sim_time: DateTime<Utc>) -> Result<Vec<TransferEvent>> {
        self.route_pending();
        let mut events = Vec::new();

        let centers: Vec<String> = self.computers.keys().cloned().collect();
        for id in &centers {
            let Some(ec) = self.computers.get_mut(id) else {
                continue;
            };
            let sorted = ec.sort_messages(&self.directory, sim_time);
            if sorted.is_ok() {
                ec.send_flight_plans(&self.directory, sim_time);
            }
            let out = ec.take_outbox();
            let tracons: Vec<String> = ec.stars_computers.keys().cloned().collect();
            self.route(out);
            sorted?;

            for tracon in &tracons {
                let Some(sc) = self
                    .computers
                    .get_mut(id)
                    .and_then(|ec| ec.stars_computers.get_mut(tracon))
                else {
                    continue;
                };
                sc.sort_received_messages(&mut events);
                let out = sc.take_outbox();
                self.route(out);
            }
        }
        Ok(events)
    }

    // -----------------------------------------------------------------------
    // Operations on behalf of the simulation
    // -----------------------------------------------------------------------

    pub fn get_stars_flight_plan(&self, tracon: &str, identifier: &str) -> Result<&StarsFlightPlan> {
        let (_, sc) = self.facility_computers(tracon)?;
        sc.ok_or_else(|| NasError::UnknownFacility(tracon.to_string()))?
            .get_flight_plan(identifier)
    }

    pub fn completely_delete_aircraft(&mut self, callsign: &str, squawk: Squawk) {
        for ec in self.computers.values_mut() {
            ec.completely_delete_aircraft(callsign, squawk);
        }
    }

    pub fn set_scratchpad(&mut self, tracon: &str, callsign: &str, sp: &str) -> Result<()> {
        self.stars_mut(tracon)?.set_scratchpad(callsign, sp)
    }

    pub fn set_secondary_scratchpad(&mut self, tracon: &str, callsign: &str, sp: &str) -> Result<()> {
        self.stars_mut(tracon)?.set_secondary_scratchpad(callsign, sp)
    }

    pub fn add_track_information(
        &mut self,
        tracon: &str,
        callsign: &str,
        info: TrackInformation,
    ) -> Result<()> {
        self.stars_mut(tracon)?.add_track_information(callsign, info);
        Ok(())
    }

    /// Issue a code: a NAS code at a center, a local code at a TRACON.
    pub fn create_squawk(&mut self, facility: &str) -> Result<Squawk> {
        if self.computers.contains_key(facility) {
            return self.eram_mut(facility)?.create_squawk();
        }
        let ec = self.eram_mut(facility)?;
        let sc = ec
            .stars_computers
            .get(facility)
            .ok_or_else(|| NasError::UnknownFacility(facility.to_string()))?;
        sc.create_squawk(&mut ec.stars_squawks)
    }

    pub fn release_squawk(&mut self, facility: &str, sq: Squawk) -> Result<()> {
        if self.computers.contains_key(facility) {
            return self.eram_mut(facility)?.release_squawk(sq);
        }
        let ec = self.eram_mut(facility)?;
        let sc = ec
            .stars_computers
            .get(facility)
            .ok_or_else(|| NasError::UnknownFacility(facility.to_string()))?;
        sc.release_squawk(&mut ec.stars_squawks, sq)
    }

    /// Store a locally entered abbreviated plan at a TRACON.
    pub fn create_local_plan(
        &mut self,
        tracon: &str,
        fields: &AbbreviatedFpFields,
    ) -> Result<Squawk> {
        let ec = self.eram_mut(tracon)?;
        let sc = ec
            .stars_computers
            .get_mut(tracon)
            .ok_or_else(|| NasError::UnknownFacility(tracon.to_string()))?;
        sc.create_local_plan(fields, &mut ec.stars_squawks)
    }

    pub fn request_flight_plan(
        &mut self,
        tracon: &str,
        bcn: Squawk,
        sim_time: DateTime<Utc>,
    ) -> Result<()> {
        self.stars_mut(tracon)?.request_flight_plan(bcn, sim_time);
        Ok(())
    }

    /// Send track data from a TRACON to another facility.
    pub fn send_track_info(
        &mut self,
        from_tracon: &str,
        receiving: &str,
        body: MessageBody,
        sim_time: DateTime<Utc>,
    ) -> Result<()> {
        let directory = self.directory.clone();
        self.stars_mut(from_tracon)?
            .send_track_info(receiving, body, sim_time, &directory);
        Ok(())
    }

    pub fn summary(&self) -> Vec<FacilitySummary> {
        let mut rows = Vec::new();
        for (id, ec) in &self.computers {
            rows.push(FacilitySummary {
                facility: id.clone(),
                kind: "ERAM",
                center: id.clone(),
                plans: ec.flight_plans.len(),
                tracks: ec.track_information.len(),
                queued: ec.received_messages.len(),
                codes_available: ec.available_squawks.available_count(),
            });
            for (tracon, sc) in &ec.stars_computers {
                rows.push(FacilitySummary {
                    facility: tracon.clone(),
                    kind: "STARS",
                    center: id.clone(),
                    plans: sc.contained_plans.len(),
                    tracks: sc.track_information.len(),
                    queued: sc.received_messages.len(),
                    codes_available: ec.stars_squawks.available_count(),
                });
            }
        }
        rows
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::tests::fixture;
    use crate::flightplan::{CoordinationTime, CoordinationTimeType};
    use crate::message::{PlanPayload, TrackFragment, TransferPayload};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap()
    }

    fn registry() -> EramComputers {
        EramComputers::new(&fixture(), 0o52)
    }

    fn arrival(bcn: u16, fix: &str, altitude: &str, at: DateTime<Utc>) -> FlightPlanMessage {
        FlightPlanMessage::new(
            "ZDC",
            t0(),
            MessageBody::Plan(PlanPayload {
                flight_id: "1A2DAL45".into(),
                bcn: Squawk(bcn),
                coordination_fix: fix.into(),
                coordination_time: Some(CoordinationTime {
                    time: at,
                    kind: CoordinationTimeType::Arrival,
                }),
                altitude: altitude.into(),
                route: format!("KATL {fix}"),
                ..Default::default()
            }),
        )
    }

    fn transfer(bcn: u16, owner: &str, handoff: &str) -> TransferPayload {
        TransferPayload {
            bcn: Squawk(bcn),
            coordination_fix: "MERIT".into(),
            track: TrackFragment {
                identifier: "DAL45".into(),
                track_owner: owner.into(),
                handoff_controller: handoff.into(),
            },
        }
    }

    #[test]
    fn test_construction() {
        let reg = registry();
        let (ec, sc) = reg.facility_computers("ZNY").unwrap();
        assert_eq!(ec.identifier, "ZNY");
        assert!(sc.is_none());

        let (ec, sc) = reg.facility_computers("PHL").unwrap();
        assert_eq!(ec.identifier, "ZNY");
        assert_eq!(sc.unwrap().identifier, "PHL");

        let (ec, _) = reg.facility_computers("A90").unwrap();
        assert_eq!(ec.identifier, "ZBW");
    }

    #[test]
    fn test_unknown_facility() {
        let reg = registry();
        assert!(matches!(
            reg.facility_computers("C90"),
            Err(NasError::UnknownFacility(f)) if f == "C90"
        ));
        assert!(reg.get_stars_flight_plan("ZNY", "DAL45").is_err());
    }

    #[test]
    fn test_plan_reaches_tracon_once_inside_window() {
        let mut reg = registry();
        let coord = t0() + Duration::minutes(45);
        // DIXIE below FL170 belongs to PHL; coordination time 45 min out
        reg.inject(Destination::Eram("ZNY".into()), arrival(0o2401, "DIXIE", "120", coord));

        // receipt forwards the plan straight down
        reg.update(t0()).unwrap();
        assert!(reg.get_stars_flight_plan("PHL", "DAL45").is_ok());

        // timed transmission happens once the window opens, and only once
        reg.update(coord - Duration::minutes(30)).unwrap();
        reg.update(coord - Duration::minutes(29)).unwrap();
        let ec = &reg.computers["ZNY"];
        assert_eq!(
            ec.flight_plans[&Squawk(0o2401)].contained_facilities,
            vec!["PHL".to_string()]
        );
        assert!(reg.computers["ZNY"].stars_computers["PHL"].received_messages.is_empty());
    }

    #[test]
    fn test_plan_flows_to_peer_center_tracon() {
        let mut reg = registry();
        // ZNY hands MERIT traffic to ZBW; ZBW delivers MERIT to A90
        reg.inject(Destination::Eram("ZNY".into()), arrival(0o2402, "MERIT", "230", t0()));

        // ZBW runs before ZNY, so it sees the plan on the next tick
        reg.update(t0()).unwrap();
        assert!(reg.get_stars_flight_plan("A90", "DAL45").is_err());
        reg.update(t0()).unwrap();
        let fp = reg.get_stars_flight_plan("A90", "DAL45").unwrap();
        assert_eq!(fp.squawk(), Squawk(0o2402));
        assert!(reg.computers["ZNY"].flight_plans[&Squawk(0o2402)].already_sent_to("ZBW"));
        assert!(reg.computers["ZBW"].flight_plans.contains_key(&Squawk(0o2402)));
    }

    #[test]
    fn test_handoff_accepted_at_tracon() {
        let mut reg = registry();
        reg.inject(Destination::Eram("ZNY".into()), arrival(0o2403, "MERIT", "230", t0()));
        reg.update(t0()).unwrap();
        reg.update(t0()).unwrap();
        assert!(reg.get_stars_flight_plan("A90", "DAL45").is_ok());

        // ZNY -> ZBW on this tick, ZBW -> A90 on the next
        reg.inject(
            Destination::Eram("ZNY".into()),
            FlightPlanMessage::new("N90", t0(), MessageBody::InitiateTransfer(transfer(0o2403, "B12", "N56"))),
        );
        assert!(reg.update(t0()).unwrap().is_empty());
        let events = reg.update(t0()).unwrap();
        assert_eq!(
            events,
            vec![TransferEvent::TransferAccepted {
                callsign: "DAL45".into(),
                to_controller: "B12".into(),
            }]
        );
        let sc = &reg.computers["ZBW"].stars_computers["A90"];
        assert_eq!(sc.track_information["DAL45"].track_owner, "B12");
        assert!(sc.contained_plans.is_empty());
    }

    #[test]
    fn test_zero_squawk_aborts_update() {
        let mut reg = registry();
        reg.inject(Destination::Eram("ZNY".into()), arrival(0, "DIXIE", "120", t0()));
        assert!(matches!(reg.update(t0()), Err(NasError::ZeroSquawk(_))));
        // nothing from the bad plan was stored
        assert!(reg.computers["ZNY"].flight_plans.is_empty());
    }

    #[test]
    fn test_request_flight_plan_round_trip() {
        let mut reg = registry();
        let later = t0() + Duration::hours(3);
        reg.inject(Destination::Eram("ZNY".into()), arrival(0o2404, "DIXIE", "310", later));
        reg.update(t0()).unwrap();
        assert!(reg.get_stars_flight_plan("N90", "2404").is_err());

        reg.request_flight_plan("N90", Squawk(0o2404), t0()).unwrap();
        reg.update(t0()).unwrap();
        let fp = reg.get_stars_flight_plan("N90", "2404").unwrap();
        assert_eq!(fp.callsign(), "DAL45");
        assert_eq!(fp.altitude, "310");
    }

    #[test]
    fn test_squawks_per_facility() {
        let mut reg = registry();
        let local = reg.create_squawk("N90").unwrap();
        assert_eq!(local, Squawk(0o5201));
        // TRACONs under one center draw from the same bank
        let phl = reg.create_squawk("PHL").unwrap();
        assert_ne!(phl, local);
        assert_eq!(phl, Squawk(0o5202));
        // a different center has a bank of its own
        assert_eq!(reg.create_squawk("A90").unwrap(), Squawk(0o5201));
        let nas = reg.create_squawk("ZNY").unwrap();
        assert_eq!(nas, Squawk(0o1001));

        reg.release_squawk("N90", local).unwrap();
        assert!(matches!(
            reg.release_squawk("N90", local),
            Err(NasError::SquawkAlreadyAvailable(_))
        ));
        assert!(reg.create_squawk("C90").is_err());
    }

    #[test]
    fn test_local_plans_share_center_bank() {
        let db = fixture();
        let mut reg = registry();
        let adaptation = &db.stars_adaptations["N90"];
        let first = crate::parse_abbreviated_fp(adaptation, &db, &["N123AB", "C172"]);
        let second = crate::parse_abbreviated_fp(adaptation, &db, &["N456CD", "C172"]);

        let a = reg.create_local_plan("N90", &first).unwrap();
        let b = reg.create_local_plan("PHL", &second).unwrap();
        assert_ne!(a, b);
        assert_eq!(reg.get_stars_flight_plan("PHL", "N456CD").unwrap().squawk(), b);

        let rows = reg.summary();
        let n90 = rows.iter().find(|r| r.facility == "N90").unwrap();
        let phl = rows.iter().find(|r| r.facility == "PHL").unwrap();
        assert_eq!(n90.codes_available, 0o77 - 2);
        assert_eq!(phl.codes_available, 0o77 - 2);
        assert!(reg.create_local_plan("ZNY", &first).is_err());
    }

    #[test]
    fn test_scratchpads_and_delete() {
        let mut reg = registry();
        assert!(reg.set_scratchpad("N90", "DAL45", "ROB").is_err());
        reg.add_track_information("N90", "DAL45", TrackInformation::new("DAL45", "2J", "", None))
            .unwrap();
        reg.set_scratchpad("N90", "DAL45", "ROB").unwrap();
        reg.set_secondary_scratchpad("N90", "DAL45", "JFK").unwrap();
        let (_, sc) = reg.facility_computers("N90").unwrap();
        assert_eq!(sc.unwrap().track_information["DAL45"].sp1, "ROB");

        reg.inject(Destination::Eram("ZNY".into()), arrival(0o2405, "DIXIE", "120", t0()));
        reg.update(t0()).unwrap();
        reg.completely_delete_aircraft("DAL45", Squawk(0o2405));
        assert!(reg.get_stars_flight_plan("PHL", "DAL45").is_err());
    }

    #[test]
    fn test_track_info_between_tracons() {
        let mut reg = registry();
        reg.add_track_information("PHL", "DAL45", TrackInformation::new("DAL45", "P1", "", None))
            .unwrap();
        reg.send_track_info(
            "N90",
            "PHL",
            MessageBody::InitiateTransfer(transfer(0o2406, "P2", "")),
            t0(),
        )
        .unwrap();
        let events = reg.update(t0()).unwrap();
        assert!(matches!(events[..], [TransferEvent::TransferAccepted { .. }]));
        let sc = &reg.computers["ZNY"].stars_computers["PHL"];
        assert_eq!(sc.track_information["DAL45"].track_owner, "P2");
    }

    #[test]
    fn test_undeliverable_dropped() {
        let mut reg = registry();
        reg.inject(Destination::Stars("C90".into()), arrival(0o2407, "DIXIE", "120", t0()));
        reg.update(t0()).unwrap();
        assert!(reg.summary().iter().all(|row| row.queued == 0));
    }

    #[test]
    fn test_summary_rows() {
        let reg = registry();
        let rows = reg.summary();
        let names: Vec<&str> = rows.iter().map(|r| r.facility.as_str()).collect();
        assert_eq!(names, vec!["ZBW", "A90", "ZNY", "N90", "PHL"]);
        assert_eq!(rows[1].kind, "STARS");
        assert_eq!(rows[1].center, "ZBW");
        assert_eq!(rows[1].codes_available, 0o77);
    }
}
