// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Synchronous observer registry

use std::fmt;

/// Handle returned by [`Observers::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Callback<T> = Box<dyn FnMut(&T) + Send + Sync>;

/// Callbacks notified in registration order, on the caller's thread,
/// after the state they observe has been updated
pub struct Observers<T> {
    next_id: u64,
    entries: Vec<(ObserverId, Callback<T>)>,
}

impl<T> Observers<T> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, callback: impl FnMut(&T) + Send + Sync + 'static) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, Box::new(callback)));
        id
    }

    /// Remove an observer, returning whether it was registered
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    pub fn notify(&mut self, value: &T) {
        for (_, callback) in &mut self.entries {
            callback(value);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<T> Default for Observers<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Observers<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("count", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_registration_order_and_unsubscribe() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut observers = Observers::new();

        let first = {
            let log = Arc::clone(&log);
            observers.subscribe(move |v: &u32| log.lock().unwrap().push(("first", *v)))
        };
        {
            let log = Arc::clone(&log);
            observers.subscribe(move |v: &u32| log.lock().unwrap().push(("second", *v)));
        }

        observers.notify(&1);
        assert!(observers.unsubscribe(first));
        assert!(!observers.unsubscribe(first));
        observers.notify(&2);

        assert_eq!(
            *log.lock().unwrap(),
            vec![("first", 1), ("second", 1), ("second", 2)]
        );
    }
}
