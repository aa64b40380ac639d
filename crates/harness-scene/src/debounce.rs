// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Input coalescing for pick requests

/// Default quiet window before a pending pick is released
pub const DEFAULT_DEBOUNCE_MS: f64 = 50.0;

/// Trailing debounce over timestamped events
///
/// Each [`push`](Debounce::push) replaces the pending value and restarts the
/// window. [`poll`](Debounce::poll) is called once per tick and releases the
/// pending value only after the window has passed without new events, so at
/// most one value comes out per tick. Time is passed in milliseconds by the
/// caller.
#[derive(Debug, Clone)]
pub struct Debounce<T> {
    delay_ms: f64,
    pending: Option<T>,
    last_event: f64,
}

impl<T> Debounce<T> {
    pub fn new(delay_ms: f64) -> Self {
        Self {
            delay_ms: delay_ms.max(0.0),
            pending: None,
            last_event: 0.0,
        }
    }

    pub fn delay_ms(&self) -> f64 {
        self.delay_ms
    }

    pub fn set_delay_ms(&mut self, delay_ms: f64) {
        self.delay_ms = delay_ms.max(0.0);
    }

    pub fn push(&mut self, value: T, now_ms: f64) {
        self.pending = Some(value);
        self.last_event = now_ms;
    }

    /// Take the pending value once the window has elapsed
    pub fn poll(&mut self, now_ms: f64) -> Option<T> {
        if self.pending.is_some() && now_ms - self.last_event >= self.delay_ms {
            self.pending.take()
        } else {
            None
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take()
    }
}

impl<T> Default for Debounce<T> {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_MS)
    }
}
