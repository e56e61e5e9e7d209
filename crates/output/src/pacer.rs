//! Precision pacer for outputs without a hardware clock
//!
//! Deadlines advance from the previous deadline, not from "now", so a late
//! wake-up does not accumulate drift.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Default)]
pub struct Pacer {
    last: Option<Instant>,
}

impl Pacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deadline of the next tick, one `interval` after the previous one
    ///
    /// Resynchronises to now when more than one interval behind.
    pub fn next_deadline(&mut self, interval: Duration) -> Instant {
        let now = Instant::now();
        let deadline = match self.last {
            Some(last) => {
                let target = last + interval;
                if target + interval < now {
                    now
                } else {
                    target
                }
            }
            None => now,
        };
        self.last = Some(deadline);
        deadline
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
