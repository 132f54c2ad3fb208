// SPDX-License-Identifier: MIT OR Apache-2.0
//! Last-write-wins trigger admission.
//!
//! A trigger waits out its delay before it is released. Scheduling again
//! before release supersedes the pending trigger, which is then never run.
//! Time is passed in so callers decide how it advances.

use std::time::{Duration, Instant};
use uuid::Uuid;

/// A trigger waiting for its delay to pass
#[derive(Debug, Clone)]
struct Pending<T> {
    ticket: Uuid,
    due: Instant,
    value: T,
}

/// Holds at most one pending trigger
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<Pending<T>>,
    superseded: u64,
}

impl<T> Debouncer<T> {
    /// Create a debouncer with a default delay
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
            superseded: 0,
        }
    }

    /// Default delay
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `value` with the default delay
    pub fn schedule(&mut self, value: T, now: Instant) -> Uuid {
        self.schedule_after(value, self.delay, now)
    }

    /// Schedule `value` to be released `delay` after `now`, replacing any
    /// pending trigger. Returns the ticket of the new trigger.
    pub fn schedule_after(&mut self, value: T, delay: Duration, now: Instant) -> Uuid {
        let ticket = Uuid::new_v4();
        if let Some(previous) = self.pending.replace(Pending {
            ticket,
            due: now + delay,
            value,
        }) {
            self.superseded += 1;
            tracing::debug!(superseded = %previous.ticket, %ticket, "trigger superseded");
        }
        ticket
    }

    /// Release the pending trigger if its delay has passed
    pub fn poll(&mut self, now: Instant) -> Option<(Uuid, T)> {
        if !self.pending.as_ref().is_some_and(|p| now >= p.due) {
            return None;
        }
        self.pending.take().map(|p| (p.ticket, p.value))
    }

    /// Drop the pending trigger. Returns its ticket.
    pub fn cancel(&mut self) -> Option<Uuid> {
        self.pending.take().map(|p| p.ticket)
    }

    /// Ticket of the pending trigger
    pub fn pending(&self) -> Option<Uuid> {
        self.pending.as_ref().map(|p| p.ticket)
    }

    /// Time until the pending trigger is due
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.pending
            .as_ref()
            .map(|p| p.due.saturating_duration_since(now))
    }

    /// Triggers replaced before release
    pub fn superseded(&self) -> u64 {
        self.superseded
    }
}
