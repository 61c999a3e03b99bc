//! Shared types, error enum, and beacon-code helpers for nas-core.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors produced by nas-core.
#[derive(Debug, Error)]
pub enum NasError {
    #[error("no more available squawk codes")]
    NoMoreAvailableSquawkCodes,
    #[error("squawk {0} is not part of this pool")]
    SquawkNotInPool(Squawk),
    #[error("squawk {0} is already available")]
    SquawkAlreadyAvailable(Squawk),
    #[error("invalid squawk code: {0}")]
    InvalidSquawk(String),
    #[error("unknown facility: {0}")]
    UnknownFacility(String),
    #[error("no matching flight: {0}")]
    NoMatchingFlight(String),
    #[error("no matching fix: {0}")]
    NoMatchingFix(String),
    #[error("plan message for {0} carries a zero squawk")]
    ZeroSquawk(String),
    #[error("{0}: not found in fixes database")]
    MissingFixLocation(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, NasError>;

// ---------------------------------------------------------------------------
// Squawk codes
// ---------------------------------------------------------------------------

/// Mode 3/A beacon code. Stored as the raw 12-bit value; displayed in octal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Squawk(pub u16);

/// VFR code. Never issued by a pool.
pub const VFR_SQUAWK: Squawk = Squawk(0o1200);

/// Special purpose codes and their two-letter datablock labels.
pub const SPC_TABLE: &[(Squawk, &str)] = &[
    (Squawk(0o7400), "LL"),
    (Squawk(0o7500), "HJ"),
    (Squawk(0o7600), "RF"),
    (Squawk(0o7700), "EM"),
    (Squawk(0o7777), "MI"),
];

impl Squawk {
    pub const ZERO: Squawk = Squawk(0);
    pub const MAX: u16 = 0o7777;

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// SPC label if this is a special purpose code.
    pub fn spc(&self) -> Option<&'static str> {
        SPC_TABLE
            .iter()
            .find(|(sq, _)| sq == self)
            .map(|(_, label)| *label)
    }

    pub fn is_spc(&self) -> bool {
        self.spc().is_some()
    }
}

impl fmt::Display for Squawk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04o}", self.0)
    }
}

/// Accepts exactly four octal digits.
impl FromStr for Squawk {
    type Err = NasError;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() != 4 || !s.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
            return Err(NasError::InvalidSquawk(s.to_string()));
        }
        u16::from_str_radix(s, 8)
            .map(Squawk)
            .map_err(|_| NasError::InvalidSquawk(s.to_string()))
    }
}

impl TryFrom<String> for Squawk {
    type Error = NasError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Squawk> for String {
    fn from(sq: Squawk) -> String {
        sq.to_string()
    }
}

// ---------------------------------------------------------------------------
// Flight rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlightRules {
    #[default]
    Ifr,
    Vfr,
}

impl fmt::Display for FlightRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlightRules::Ifr => write!(f, "IFR"),
            FlightRules::Vfr => write!(f, "VFR"),
        }
    }
}

// ---------------------------------------------------------------------------
// Geography
// ---------------------------------------------------------------------------

const EARTH_RADIUS_NM: f64 = 3440.065;

/// Latitude/longitude in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2LL {
    pub lat: f64,
    pub lon: f64,
}

impl Point2LL {
    pub fn new(lat: f64, lon: f64) -> Self {
        Point2LL { lat, lon }
    }

    pub fn is_zero(&self) -> bool {
        self.lat == 0.0 && self.lon == 0.0
    }

    /// Great-circle distance in nautical miles.
    pub fn nm_distance(&self, other: &Point2LL) -> f64 {
        let dlat = (other.lat - self.lat).to_radians();
        let dlon = (other.lon - self.lon).to_radians();
        let a = (dlat / 2.0).sin().powi(2)
            + self.lat.to_radians().cos()
                * other.lat.to_radians().cos()
                * (dlon / 2.0).sin().powi(2);
        EARTH_RADIUS_NM * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
