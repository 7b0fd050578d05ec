use std::time::Duration;

use tokio::time::Instant;

use crate::location::StorageLocation;
use crate::retry::ErrorKind;

/// Mutable bookkeeping for one `execute` call. Never shared.
#[derive(Debug)]
pub(crate) struct AttemptRecord {
    pub attempts: u32,
    pub location: StorageLocation,
    pub failovers: u32,
    pub throttle_events: u32,
    /// Set after the secondary answered 404; remaining attempts go to primary.
    pub secondary_ruled_out: bool,
    started: Instant,
}

impl AttemptRecord {
    pub fn new(location: StorageLocation) -> Self {
        Self {
            attempts: 0,
            location,
            failovers: 0,
            throttle_events: 0,
            secondary_ruled_out: false,
            started: Instant::now(),
        }
    }

    pub fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn observe(&mut self, kind: ErrorKind) {
        match kind {
            ErrorKind::Throttled(_) => self.throttle_events += 1,
            ErrorKind::SecondaryNotFound => self.secondary_ruled_out = true,
            _ => {}
        }
    }

    /// Location pin forced by what this call has seen so far.
    pub fn forced_location(&self) -> Option<StorageLocation> {
        self.secondary_ruled_out.then_some(StorageLocation::Primary)
    }

    pub fn move_to(&mut self, next: StorageLocation) {
        if next != self.location {
            self.failovers += 1;
            self.location = next;
        }
    }

    pub fn summary(&self) -> ExecutionSummary {
        ExecutionSummary {
            attempts: self.attempts,
            failovers: self.failovers,
            throttle_events: self.throttle_events,
            location: self.location,
            elapsed: self.elapsed(),
        }
    }
}

/// Read-only account of a finished `execute` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub attempts: u32,
    /// Times an attempt targeted a different location than the previous one.
    pub failovers: u32,
    /// 429/503 responses seen.
    pub throttle_events: u32,
    /// Location that produced the final result.
    pub location: StorageLocation,
    pub elapsed: Duration,
}

/// Value plus the summary of the call that produced it.
#[derive(Debug, Clone)]
pub struct Executed<T> {
    pub value: T,
    pub summary: ExecutionSummary,
}
