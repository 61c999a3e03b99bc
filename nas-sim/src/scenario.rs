//! Scripted scenarios: a start time, a tick length, and actions applied at
//! given ticks before the registry update runs.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::info;

use nas_core::message::{Destination, FlightPlanMessage};
use nas_core::registry::EramComputers;
use nas_core::stars::TransferEvent;
use nas_core::types::{NasError, Result, Squawk};

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub start: DateTime<Utc>,
    /// Falls back to the configured tick length.
    #[serde(default)]
    pub tick_seconds: Option<u32>,
    #[serde(default)]
    pub ticks: u32,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    pub at_tick: u32,
    #[serde(flatten)]
    pub action: Action,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Drop a message into a facility's inbox.
    Inject {
        to: Destination,
        message: FlightPlanMessage,
    },
    RequestFlightPlan { tracon: String, bcn: Squawk },
    DeleteAircraft { callsign: String, squawk: Squawk },
    Scratchpad {
        tracon: String,
        callsign: String,
        #[serde(default)]
        secondary: bool,
        text: String,
    },
}

/// A transfer event with the tick that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct TickEvent {
    pub tick: u32,
    pub time: DateTime<Utc>,
    pub event: TransferEvent,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Simulated time at the start of `tick`.
    pub fn time_at(&self, tick: u32, default_tick_seconds: u32) -> DateTime<Utc> {
        let secs = self.tick_seconds.unwrap_or(default_tick_seconds);
        self.start + Duration::seconds(i64::from(tick) * i64::from(secs))
    }

    /// Run `ticks` ticks against the registry and collect transfer events.
    pub fn run(
        &self,
        registry: &mut EramComputers,
        ticks: u32,
        default_tick_seconds: u32,
    ) -> Result<Vec<TickEvent>> {
        let mut out = Vec::new();
        for tick in 0..ticks {
            let time = self.time_at(tick, default_tick_seconds);
            for step in self.steps.iter().filter(|s| s.at_tick == tick) {
                apply(registry, &step.action, time)?;
            }
            for event in registry.update(time)? {
                info!("tick {tick}: {event:?}");
                out.push(TickEvent { tick, time, event });
            }
        }
        Ok(out)
    }
}

fn apply(registry: &mut EramComputers, action: &Action, time: DateTime<Utc>) -> Result<()> {
    let applied = match action {
        Action::Inject { to, message } => {
            registry.inject(to.clone(), message.clone());
            Ok(())
        }
        Action::RequestFlightPlan { tracon, bcn } => {
            registry.request_flight_plan(tracon, *bcn, time)
        }
        Action::DeleteAircraft { callsign, squawk } => {
            registry.completely_delete_aircraft(callsign, *squawk);
            Ok(())
        }
        Action::Scratchpad {
            tracon,
            callsign,
            secondary,
            text,
        } => {
            if *secondary {
                registry.set_secondary_scratchpad(tracon, callsign, text)
            } else {
                registry.set_scratchpad(tracon, callsign, text)
            }
        }
    };
    applied.map_err(|e| match e {
        NasError::UnknownFacility(f) => NasError::Config(format!("scenario names unknown facility {f}")),
        other => other,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
