//! nas-core: flight data distribution and handoff coordination between
//! en-route centers (ERAM) and terminal facilities (STARS).
//!
//! No async and no I/O beyond loading the adaptation database. Facilities
//! exchange messages only through the registry's router, one tick at a time.

pub mod abbreviated;
pub mod adaptation;
pub mod config;
pub mod database;
pub mod eram;
pub mod flightplan;
pub mod message;
pub mod registry;
pub mod squawk;
pub mod stars;
pub mod types;

// Re-export commonly used types at crate root
pub use abbreviated::{parse_abbreviated_fp, AbbreviatedFpError, AbbreviatedFpFields};
pub use database::NasDatabase;
pub use eram::EramComputer;
pub use flightplan::{FlightPlan, StarsFlightPlan, TrackInformation};
pub use message::{Destination, FlightPlanMessage, MessageBody};
pub use registry::{EramComputers, FacilityDirectory, FacilitySummary};
pub use squawk::SquawkAllocator;
pub use stars::{StarsComputer, TransferEvent};
pub use types::*;
