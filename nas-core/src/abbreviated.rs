//! Abbreviated flight plan entry (the short form typed at a terminal scope).
//!
//! The first token is the aircraft id; every other token is classified by
//! its shape. Most problems are collected and parsing continues, but a few
//! stop it outright.

use thiserror::Error;

use crate::adaptation::StarsFacilityAdaptation;
use crate::database::NasDatabase;
use crate::types::{FlightRules, Squawk};

/// Triangle marker that introduces scratchpad 1 on the keyboard.
pub const STARS_TRIANGLE: char = '\u{80}';
/// Marker that introduces scratchpad 2.
pub const SECONDARY_SCRATCHPAD_MARKER: char = '+';

/// Scratchpad values reserved by the system.
const RESERVED_SCRATCHPADS: [&str; 6] = ["NAT", "CST", "AMB", "RDR", "ADB", "XXX"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeOfFlight {
    Arrival,
    Departure,
    Overflight,
}

impl TypeOfFlight {
    fn from_letter(c: char) -> Option<Self> {
        match c {
            'A' => Some(TypeOfFlight::Arrival),
            'P' => Some(TypeOfFlight::Departure),
            'E' => Some(TypeOfFlight::Overflight),
            _ => None,
        }
    }
}

/// Problems found in an abbreviated entry, shown as the scope's error text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbbreviatedFpError {
    #[error("ILL ACID")]
    IllegalAcid,
    #[error("ILL SCR: {0}")]
    IllegalScratchpad(String),
    #[error("ILL TYPE: {0}")]
    IllegalAcType(String),
    #[error("FORMAT: {0}")]
    InvalidAbbreviatedFp(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AbbreviatedFpFields {
    pub acid: String,
    pub bcn: Option<Squawk>,
    pub controlling_position: String,
    pub type_of_flight: Option<TypeOfFlight>,
    pub departure_airport: String,
    pub sc1: String,
    pub sc2: String,
    pub aircraft_type: String,
    /// Requested altitude in hundreds of feet.
    pub requested_alt: String,
    pub rules: Option<FlightRules>,
    pub errors: Vec<AbbreviatedFpError>,
}

impl AbbreviatedFpFields {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Parse an abbreviated entry already split on whitespace.
pub fn parse_abbreviated_fp(
    adaptation: &StarsFacilityAdaptation,
    db: &NasDatabase,
    fields: &[&str],
) -> AbbreviatedFpFields {
    let mut out = AbbreviatedFpFields::default();

    let Some((acid, rest)) = fields.split_first() else {
        out.errors.push(AbbreviatedFpError::IllegalAcid);
        return out;
    };
    if !is_acid(acid) {
        out.errors.push(AbbreviatedFpError::IllegalAcid);
        return out;
    }
    out.acid = acid.to_string();

    for field in rest {
        match classify(adaptation, db, field, &mut out) {
            Step::Continue => {}
            Step::Stop(e) => {
                out.errors.push(e);
                return out;
            }
        }
    }
    out
}

enum Step {
    Continue,
    Stop(AbbreviatedFpError),
}

fn is_acid(s: &str) -> bool {
    let len = s.chars().count();
    (2..=7).contains(&len) && s.starts_with(|c: char| c.is_ascii_alphabetic())
}

fn classify(
    adaptation: &StarsFacilityAdaptation,
    db: &NasDatabase,
    field: &str,
    out: &mut AbbreviatedFpFields,
) -> Step {
    let chars: Vec<char> = field.chars().collect();

    if let Ok(sq) = field.parse::<Squawk>() {
        out.bcn = Some(sq);
        return Step::Continue;
    }

    if let ['.', r] = chars.as_slice() {
        out.rules = Some(match r {
            'V' | 'P' => FlightRules::Vfr,
            'E' => FlightRules::Ifr,
            _ => return Step::Stop(AbbreviatedFpError::InvalidAbbreviatedFp(field.to_string())),
        });
        return Step::Continue;
    }

    if chars.len() == 2 && chars.iter().all(|c| c.is_ascii_alphanumeric()) {
        out.controlling_position = field.to_string();
        return Step::Continue;
    }

    match chars.as_slice() {
        [t] if TypeOfFlight::from_letter(*t).is_some() => {
            out.type_of_flight = TypeOfFlight::from_letter(*t);
            return Step::Continue;
        }
        [t, a, b] if a.is_ascii_alphanumeric() && b.is_ascii_alphanumeric() => {
            if let Some(tof) = TypeOfFlight::from_letter(*t) {
                out.type_of_flight = Some(tof);
                out.departure_airport = format!("{a}{b}");
                return Step::Continue;
            }
        }
        _ => {}
    }

    if let Some(sp) = field.strip_prefix(STARS_TRIANGLE) {
        let max = if adaptation.allow_long_scratchpad[0] { 4 } else { 3 };
        return scratchpad(sp, max, &mut out.sc1, &mut out.errors);
    }
    if let Some(sp) = field.strip_prefix(SECONDARY_SCRATCHPAD_MARKER) {
        let max = if adaptation.allow_long_scratchpad[1] { 4 } else { 3 };
        return scratchpad(sp, max, &mut out.sc2, &mut out.errors);
    }

    if field.contains('/') || (chars.len() >= 3 && chars[0].is_ascii_alphabetic()) {
        return aircraft_type(db, field, out);
    }

    if chars.len() == 3 && chars.iter().all(|c| c.is_ascii_digit()) {
        out.requested_alt = field.to_string();
        return Step::Continue;
    }

    out.errors
        .push(AbbreviatedFpError::InvalidAbbreviatedFp(field.to_string()));
    Step::Continue
}

fn scratchpad(
    sp: &str,
    max: usize,
    slot: &mut String,
    errors: &mut Vec<AbbreviatedFpError>,
) -> Step {
    let len = sp.chars().count();
    if !(2..=max).contains(&len) {
        errors.push(AbbreviatedFpError::IllegalScratchpad(sp.to_string()));
        return Step::Continue;
    }
    if RESERVED_SCRATCHPADS.contains(&sp) {
        return Step::Stop(AbbreviatedFpError::IllegalScratchpad(sp.to_string()));
    }
    // three trailing digits would read as a beacon code
    let tail: Vec<char> = sp.chars().rev().take(3).collect();
    if tail.len() == 3 && tail.iter().all(|c| c.is_ascii_digit()) {
        errors.push(AbbreviatedFpError::IllegalScratchpad(sp.to_string()));
        return Step::Continue;
    }
    *slot = sp.to_string();
    Step::Continue
}

fn aircraft_type(db: &NasDatabase, field: &str, out: &mut AbbreviatedFpFields) -> Step {
    let bad_format = || Step::Stop(AbbreviatedFpError::InvalidAbbreviatedFp(field.to_string()));
    let is_suffix = |s: &str| s.len() == 1 && s.starts_with(|c: char| c.is_ascii_alphabetic());
    let is_count = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    let parts: Vec<&str> = field.split('/').collect();
    let actype = match parts.as_slice() {
        [t] => *t,
        [n, t] if is_count(*n) => {
            if !t.starts_with(|c: char| c.is_ascii_alphabetic()) {
                return bad_format();
            }
            *t
        }
        [t, s] => {
            if !is_suffix(*s) {
                return bad_format();
            }
            *t
        }
        [n, t, s] => {
            if !is_count(*n) || !is_suffix(*s) || !t.starts_with(|c: char| c.is_ascii_alphabetic()) {
                return bad_format();
            }
            *t
        }
        _ => return bad_format(),
    };

    if db.is_known_aircraft_type(actype) {
        out.aircraft_type = field.to_string();
    } else {
        out.errors
            .push(AbbreviatedFpError::IllegalAcType(actype.to_string()));
    }
    Step::Continue
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
