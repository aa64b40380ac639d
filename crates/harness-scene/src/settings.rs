// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Settings holder with change notification

use crate::observer::{ObserverId, Observers};
use harness_model::Settings;

/// Current settings plus observers notified after every effective change
#[derive(Debug, Default)]
pub struct SettingsStore {
    settings: Settings,
    observers: Observers<Settings>,
}

impl SettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            observers: Observers::new(),
        }
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    /// Replace the settings, returning the previous value when it changed
    pub fn set(&mut self, settings: Settings) -> Option<Settings> {
        if settings == self.settings {
            return None;
        }
        let previous = std::mem::replace(&mut self.settings, settings);
        self.observers.notify(&self.settings);
        Some(previous)
    }

    /// Edit the settings in place
    pub fn update(&mut self, edit: impl FnOnce(&mut Settings)) -> Option<Settings> {
        let mut next = self.settings.clone();
        edit(&mut next);
        self.set(next)
    }

    pub fn subscribe(
        &mut self,
        callback: impl FnMut(&Settings) + Send + Sync + 'static,
    ) -> ObserverId {
        self.observers.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.observers.unsubscribe(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harness_model::SplineMode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_notifies_only_on_change() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut store = SettingsStore::default();
        {
            let calls = Arc::clone(&calls);
            store.subscribe(move |s| {
                assert_eq!(s.spline_mode, SplineMode::Clamped);
                calls.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert!(store.set(Settings::default()).is_none());
        let previous = store.update(|s| s.spline_mode = SplineMode::Clamped);
        assert_eq!(previous.map(|p| p.spline_mode), Some(SplineMode::Unclamped));
        assert!(store.update(|s| s.spline_mode = SplineMode::Clamped).is_none());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.get().spline_mode, SplineMode::Clamped);
    }
}
