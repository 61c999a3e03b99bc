//! Beacon code pools.
//!
//! Centers draw NAS codes from the full valid range; terminal facilities draw
//! local codes from a single beacon bank. Either way a code handed out is
//! absent from the pool until it is released again.

use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use crate::types::{NasError, Result, Squawk, VFR_SQUAWK};

/// First code issued from the NAS range.
const NAS_FIRST: u16 = 0o1001;

/// Pool of unused beacon codes.
#[derive(Debug, Clone)]
pub struct SquawkAllocator {
    range: RangeInclusive<u16>,
    available: BTreeSet<Squawk>,
}

impl SquawkAllocator {
    /// NAS pool: 1001-7777 minus special purpose codes and 1200.
    pub fn nas() -> Self {
        let range = NAS_FIRST..=Squawk::MAX;
        let available = range
            .clone()
            .map(Squawk)
            .filter(|sq| !sq.is_spc() && *sq != VFR_SQUAWK)
            .collect();
        SquawkAllocator { range, available }
    }

    /// Local pool for a beacon bank (the two leading octal digits), e.g.
    /// bank 0o52 covers 5201-5277.
    pub fn beacon_bank(bank: u16) -> Self {
        let base = (bank & 0o77) * 0o100;
        let range = base + 1..=base + 0o77;
        let available = range.clone().map(Squawk).collect();
        SquawkAllocator { range, available }
    }

    /// Hand out an unused code. No ordering is promised to callers.
    pub fn allocate(&mut self) -> Result<Squawk> {
        self.available
            .pop_first()
            .ok_or(NasError::NoMoreAvailableSquawkCodes)
    }

    /// Take a specific code out of circulation. Already-absent codes are fine.
    pub fn retire(&mut self, sq: Squawk) -> bool {
        self.available.remove(&sq)
    }

    /// Return a code to the pool.
    pub fn release(&mut self, sq: Squawk) -> Result<()> {
        if !self.contains(sq) {
            return Err(NasError::SquawkNotInPool(sq));
        }
        if !self.available.insert(sq) {
            return Err(NasError::SquawkAlreadyAvailable(sq));
        }
        Ok(())
    }

    /// Whether `sq` belongs to this pool's range (allocated or not).
    pub fn contains(&self, sq: Squawk) -> bool {
        self.range.contains(&sq.0) && !sq.is_spc() && sq != VFR_SQUAWK
    }

    pub fn is_available(&self, sq: Squawk) -> bool {
        self.available.contains(&sq)
    }

    pub fn available_count(&self) -> usize {
        self.available.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
