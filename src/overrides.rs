//! Live selection overrides for preview tooling.
//!
//! A preview panel wants to force a specific variant regardless of what the server assigned.
//! [`OverrideSet`] holds those forced selections and notifies subscribers on every change so the
//! host can re-render. Overrides are merged over the stored selection array by the resolver's
//! *caller*; [`resolve`][crate::personalization::resolve] itself stays pure and override-free.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::profile::SelectedPersonalization;

/// Handle returned by [`OverrideSet::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

type ChangeCallback = Box<dyn Fn() + Send + Sync>;

/// Mutable map of experience id → forced selection, with change notification.
#[derive(Default)]
pub struct OverrideSet {
    overrides: Mutex<HashMap<String, SelectedPersonalization>>,
    subscribers: Mutex<Vec<(u64, ChangeCallback)>>,
    next_id: AtomicU64,
}

impl OverrideSet {
    pub fn new() -> OverrideSet {
        OverrideSet::default()
    }

    /// Force a selection for its experience. Replaces any previous override for the same
    /// experience.
    pub fn set(&self, selection: SelectedPersonalization) {
        {
            let mut overrides = self.lock_overrides();
            overrides.insert(selection.experience_id.clone(), selection);
        }
        self.notify();
    }

    /// Remove the override for one experience. Returns whether one was present.
    pub fn clear(&self, experience_id: &str) -> bool {
        let removed = self.lock_overrides().remove(experience_id).is_some();
        if removed {
            self.notify();
        }
        removed
    }

    pub fn clear_all(&self) {
        let was_empty = {
            let mut overrides = self.lock_overrides();
            let was_empty = overrides.is_empty();
            overrides.clear();
            was_empty
        };
        if !was_empty {
            self.notify();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lock_overrides().is_empty()
    }

    /// Merge overrides over a server-provided selection array: overridden experiences are
    /// replaced in place, overrides for experiences not in the array are appended.
    pub fn apply(&self, selections: &[SelectedPersonalization]) -> Vec<SelectedPersonalization> {
        let overrides = self.lock_overrides();
        if overrides.is_empty() {
            return selections.to_vec();
        }

        let mut merged: Vec<SelectedPersonalization> = selections
            .iter()
            .map(|s| overrides.get(&s.experience_id).unwrap_or(s).clone())
            .collect();
        for (experience_id, selection) in overrides.iter() {
            if !selections.iter().any(|s| &s.experience_id == experience_id) {
                merged.push(selection.clone());
            }
        }
        merged
    }

    /// Register a callback invoked after every change to the override set.
    pub fn subscribe(&self, callback: impl Fn() + Send + Sync + 'static) -> SubscriptionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut subscribers = self.lock_subscribers();
        subscribers.push((id, Box::new(callback)));
        SubscriptionHandle(id)
    }

    /// Remove a subscriber. Returns `false` if the handle was already unsubscribed.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let mut subscribers = self.lock_subscribers();
        let before = subscribers.len();
        subscribers.retain(|(id, _)| *id != handle.0);
        subscribers.len() != before
    }

    fn notify(&self) {
        let subscribers = self.lock_subscribers();
        for (_, callback) in subscribers.iter() {
            callback();
        }
    }

    fn lock_overrides(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<String, SelectedPersonalization>> {
        self.overrides
            .lock()
            .expect("thread holding override lock should not panic")
    }

    fn lock_subscribers(&self) -> std::sync::MutexGuard<'_, Vec<(u64, ChangeCallback)>> {
        self.subscribers
            .lock()
            .expect("thread holding subscriber lock should not panic")
    }
}
