//! Durable, versioned cache of visitor state. [`ProfileStateStore`] is what makes the SDK
//! stateless-safe across page loads: profile, selected personalizations, consent, and pending
//! changes are persisted under fixed keys and re-hydrated on the next start.
//!
//! Cached state is advisory. Any entry that fails validation on read is treated as absent, so a
//! corrupted or stale cache degrades to a cold start instead of crashing the host app.
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::profile::{Consent, Profile, ProfileChange, SelectedPersonalization};
use crate::storage::KeyValueStorage;

const ANONYMOUS_ID_KEY: &str = "__attune_anonymous_id__";
const CONSENT_KEY: &str = "__attune_consent__";
const DEBUG_KEY: &str = "__attune_debug__";
const PROFILE_KEY: &str = "__attune_profile__";
const PERSONALIZATIONS_KEY: &str = "__attune_personalizations__";
const CHANGES_KEY: &str = "__attune_changes__";

/// What [`ProfileStateStore::reset`] clears beyond visitor state. Consent and the debug flag
/// represent explicit visitor/developer choices and survive a reset unless asked.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResetOptions {
    pub clear_consent: bool,
    pub clear_debug: bool,
}

/// Typed accessors over a [`KeyValueStorage`].
///
/// Values are JSON, except consent (`"accepted"`/`"denied"`) and debug (`"true"`/`"false"`),
/// which are stored as bare strings. Writing `None` removes the key; the literal strings
/// `"undefined"`/`"null"` are never written.
pub struct ProfileStateStore {
    storage: Arc<dyn KeyValueStorage>,
}

impl ProfileStateStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> ProfileStateStore {
        ProfileStateStore { storage }
    }

    pub fn anonymous_id(&self) -> Option<String> {
        self.storage.get(ANONYMOUS_ID_KEY)
    }

    /// Returns the stored anonymous id, minting and persisting a fresh one on first call.
    pub fn anonymous_id_or_create(&self) -> String {
        match self.anonymous_id() {
            Some(id) => id,
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                self.storage.set(ANONYMOUS_ID_KEY, &id);
                id
            }
        }
    }

    pub fn set_anonymous_id(&self, id: Option<&str>) {
        match id {
            Some(id) => self.storage.set(ANONYMOUS_ID_KEY, id),
            None => self.storage.remove(ANONYMOUS_ID_KEY),
        }
    }

    /// Tri-state consent: `None` means the visitor was never asked.
    pub fn consent(&self) -> Option<Consent> {
        let raw = self.storage.get(CONSENT_KEY)?;
        let parsed = Consent::from_str(&raw);
        if parsed.is_none() {
            log::warn!(target: "attune", key = CONSENT_KEY, raw; "ignoring unrecognized consent value");
        }
        parsed
    }

    pub fn set_consent(&self, consent: Option<Consent>) {
        match consent {
            Some(consent) => self.storage.set(CONSENT_KEY, consent.as_str()),
            None => self.storage.remove(CONSENT_KEY),
        }
    }

    pub fn debug(&self) -> bool {
        self.storage.get(DEBUG_KEY).as_deref() == Some("true")
    }

    pub fn set_debug(&self, debug: bool) {
        self.storage.set(DEBUG_KEY, if debug { "true" } else { "false" });
    }

    pub fn profile(&self) -> Option<Profile> {
        self.read_json(PROFILE_KEY)
    }

    pub fn set_profile(&self, profile: Option<&Profile>) {
        self.write_json(PROFILE_KEY, profile);
    }

    pub fn personalizations(&self) -> Vec<SelectedPersonalization> {
        self.read_json(PERSONALIZATIONS_KEY).unwrap_or_default()
    }

    pub fn set_personalizations(&self, personalizations: Option<&[SelectedPersonalization]>) {
        self.write_json(PERSONALIZATIONS_KEY, personalizations);
    }

    pub fn changes(&self) -> Vec<ProfileChange> {
        self.read_json(CHANGES_KEY).unwrap_or_default()
    }

    pub fn set_changes(&self, changes: Option<&[ProfileChange]>) {
        self.write_json(CHANGES_KEY, changes);
    }

    /// Clear cached visitor state. Consent and debug survive unless [`ResetOptions`] asks
    /// otherwise.
    pub fn reset(&self, options: ResetOptions) {
        self.storage.remove(ANONYMOUS_ID_KEY);
        self.storage.remove(PROFILE_KEY);
        self.storage.remove(PERSONALIZATIONS_KEY);
        self.storage.remove(CHANGES_KEY);
        if options.clear_consent {
            self.storage.remove(CONSENT_KEY);
        }
        if options.clear_debug {
            self.storage.remove(DEBUG_KEY);
        }
        log::debug!(target: "attune",
                    clear_consent = options.clear_consent,
                    clear_debug = options.clear_debug;
                    "visitor state reset");
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.storage.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                log::warn!(target: "attune", key; "discarding unreadable cache entry: {err}");
                None
            }
        }
    }

    fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: Option<&T>) {
        let Some(value) = value else {
            self.storage.remove(key);
            return;
        };
        match serde_json::to_string(value) {
            Ok(serialized) => self.storage.set(key, &serialized),
            Err(err) => {
                log::warn!(target: "attune", key; "failed to serialize cache entry: {err}");
            }
        }
    }
}
