//! Leading-edge throttle for discovery refreshes.
//!
//! The first request in a quiet period runs immediately and opens a window.
//! Requests that arrive inside the window collapse into a single pending run
//! at the end of the window.  No matter how many notifications arrive, at
//! most one run is ever queued.
//!
//! The throttle is a pure state machine over caller-supplied instants; the
//! hub's event loop sleeps until [`Throttle::deadline`] and then calls
//! [`Throttle::poll`].

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    window_until: Option<Instant>,
    pending: bool,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            window_until: None,
            pending: false,
        }
    }

    /// Requests a run.  Returns `true` when the caller should run now.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.window_until {
            Some(until) if now < until => {
                self.pending = true;
                false
            }
            _ => {
                self.window_until = Some(now + self.interval);
                self.pending = false;
                true
            }
        }
    }

    /// Returns `true` when a deferred run is due now.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.window_until {
            Some(until) if now >= until && self.pending => {
                self.pending = false;
                self.window_until = Some(now + self.interval);
                true
            }
            _ => false,
        }
    }

    /// When the deferred run is due, if one is pending.
    pub fn deadline(&self) -> Option<Instant> {
        if self.pending {
            self.window_until
        } else {
            None
        }
    }
}
