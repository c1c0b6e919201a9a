//! Decides when a rendered component counts as "viewed".
//!
//! Platform adapters own the actual visibility plumbing (IntersectionObserver on the web, view
//! callbacks on native) and forward notifications into [`ViewTrackingEngine`]. The engine keeps
//! a small state machine per watched element, applies dedup and stickiness rules, and emits
//! component-view events through the builder → interceptor pipeline → dispatcher chain.
//!
//! Visibility callbacks may fire redundantly (duplicate "became visible" notifications are
//! normal); it is the state machine, not any scheduling guarantee, that makes this safe.
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::events::{ComponentViewProperties, Event, EventBuilder, EventDispatcher};
use crate::interceptor::InterceptorPipeline;
use crate::timestamp::{self, Timestamp};

/// Opaque identity of a watched element, assigned by the platform adapter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementId(String);

impl<T: Into<String>> From<T> for ElementId {
    fn from(value: T) -> ElementId {
        ElementId(value.into())
    }
}

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tracking identity and metadata for one watched component.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentViewData {
    /// Id of the rendered entry (the variant entry when a personalization applied).
    pub entry_id: String,
    pub experience_id: Option<String>,
    pub variant_index: u32,
    /// When true (the default), the component is tracked at most once while mounted. When
    /// false, every hidden→visible cycle re-tracks.
    pub sticky: bool,
    /// Dedup scope shared across elements rendering the same component (a hero repeated in a
    /// carousel, say). The first tracked element in a scope emits; other elements in the same
    /// scope are suppressed on their first view.
    pub duplication_scope: Option<String>,
}

/// Declarative marker attributes understood by [`ViewTrackingEngine::observe_marked`].
pub mod markers {
    pub const ENTRY_ID: &str = "data-attune-entry-id";
    pub const EXPERIENCE_ID: &str = "data-attune-experience-id";
    pub const VARIANT_INDEX: &str = "data-attune-variant-index";
    pub const STICKY: &str = "data-attune-sticky";
    pub const SCOPE: &str = "data-attune-scope";
}

impl ComponentViewData {
    /// Build tracking data from marker attributes discovered on an element. Returns `None` when
    /// the attributes don't carry an entry id, in which case there is nothing to track.
    pub fn from_markers(attributes: &HashMap<String, String>) -> Option<ComponentViewData> {
        let entry_id = attributes.get(markers::ENTRY_ID)?.clone();
        Some(ComponentViewData {
            entry_id,
            experience_id: attributes.get(markers::EXPERIENCE_ID).cloned(),
            variant_index: attributes
                .get(markers::VARIANT_INDEX)
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            sticky: attributes
                .get(markers::STICKY)
                .map(|v| v != "false")
                .unwrap_or(true),
            duplication_scope: attributes.get(markers::SCOPE).cloned(),
        })
    }
}

/// Per-element watch state.
///
/// `Unobserved` and the terminal states have no variant here: an element is unobserved or
/// removed exactly when it has no entry in the records map.
#[derive(Debug, Clone)]
enum WatchState {
    Observing,
    Tracked {
        #[allow(dead_code)]
        tracked_at: Timestamp,
        still_visible: bool,
    },
}

#[derive(Debug, Clone)]
struct WatchRecord {
    data: ComponentViewData,
    state: WatchState,
}

/// Caller-supplied hook invoked for every emitted component-view event. Errors are caught and
/// logged, never propagated back into the observer loop.
pub type ViewCallback =
    dyn Fn(&Event) -> Result<(), Box<dyn std::error::Error + Send + Sync>> + Send + Sync;

/// Consulted at emission time, before any event is built. Visibility notifications arrive from
/// the platform long after `observe`, so consent has to be re-checked here rather than only at
/// observation time.
pub type EmissionGate = Arc<dyn Fn() -> bool + Send + Sync>;

pub struct ViewTrackingEngine {
    records: Mutex<HashMap<ElementId, WatchRecord>>,
    tracked_scopes: Mutex<HashSet<String>>,
    builder: Arc<EventBuilder>,
    pipeline: Arc<InterceptorPipeline<Event>>,
    dispatcher: EventDispatcher,
    callbacks: Mutex<Vec<Box<ViewCallback>>>,
    gate: EmissionGate,
}

impl ViewTrackingEngine {
    pub fn new(
        builder: Arc<EventBuilder>,
        pipeline: Arc<InterceptorPipeline<Event>>,
        dispatcher: EventDispatcher,
        gate: EmissionGate,
    ) -> ViewTrackingEngine {
        ViewTrackingEngine {
            records: Mutex::new(HashMap::new()),
            tracked_scopes: Mutex::new(HashSet::new()),
            builder,
            pipeline,
            dispatcher,
            callbacks: Mutex::new(Vec::new()),
            gate,
        }
    }

    /// Register a hook to observe emitted component-view events.
    pub fn on_component_view(
        &self,
        callback: impl Fn(&Event) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
            + Send
            + Sync
            + 'static,
    ) {
        let mut callbacks = self
            .callbacks
            .lock()
            .expect("thread holding callback lock should not panic");
        callbacks.push(Box::new(callback));
    }

    /// Start watching an element with explicit tracking data. Re-observing an already-watched
    /// element replaces its data but keeps its tracking state.
    pub fn observe(&self, element: ElementId, data: ComponentViewData) {
        let mut records = self.lock_records();
        match records.get_mut(&element) {
            Some(record) => record.data = data,
            None => {
                log::debug!(target: "attune", element = element.0, entry_id = data.entry_id;
                            "observing element");
                records.insert(
                    element,
                    WatchRecord {
                        data,
                        state: WatchState::Observing,
                    },
                );
            }
        }
    }

    /// Start watching an element whose tracking data comes from declarative marker attributes.
    /// Returns `false` (and watches nothing) when the markers don't yield an entry id.
    pub fn observe_marked(
        &self,
        element: ElementId,
        attributes: &HashMap<String, String>,
    ) -> bool {
        match ComponentViewData::from_markers(attributes) {
            Some(data) => {
                self.observe(element, data);
                true
            }
            None => {
                log::warn!(target: "attune", element = element.0;
                           "element markers carry no entry id, not tracking");
                false
            }
        }
    }

    /// Stop watching without removing the element itself.
    pub fn unobserve(&self, element: &ElementId) {
        if self.lock_records().remove(element).is_some() {
            log::debug!(target: "attune", element = element.0; "element untracked");
        }
    }

    /// The element was detached from the tree: discard all local state. No further events are
    /// produced for this identity.
    pub fn element_removed(&self, element: &ElementId) {
        self.lock_records().remove(element);
    }

    /// The element left the viewport. Re-arms non-sticky components for another tracking cycle.
    pub fn element_hidden(&self, element: &ElementId) {
        let mut records = self.lock_records();
        if let Some(WatchRecord {
            state: WatchState::Tracked { still_visible, .. },
            ..
        }) = records.get_mut(element)
        {
            *still_visible = false;
        }
    }

    /// The platform reports the element sufficiently visible. Emits a component-view event
    /// unless dedup says this view was already counted, or the gate (consent) refuses emission.
    pub async fn element_visible(&self, element: &ElementId) {
        if !(self.gate)() {
            // Watch state is untouched, so the view can still be counted if consent is
            // granted later.
            log::debug!(target: "attune", element = element.0;
                        "component view suppressed: event production not permitted");
            return;
        }

        let data = {
            let mut records = self.lock_records();
            let Some(record) = records.get_mut(element) else {
                log::debug!(target: "attune", element = element.0;
                            "visibility notification for unobserved element");
                return;
            };

            match &mut record.state {
                WatchState::Observing => {
                    record.state = WatchState::Tracked {
                        tracked_at: timestamp::now(),
                        still_visible: true,
                    };
                    match &record.data.duplication_scope {
                        Some(scope) if !self.claim_scope(scope) => {
                            log::debug!(target: "attune",
                                        element = element.0,
                                        scope = scope.as_str();
                                        "duplication scope already tracked, suppressing view");
                            None
                        }
                        _ => Some(record.data.clone()),
                    }
                }
                WatchState::Tracked { still_visible, .. } if *still_visible => {
                    // Duplicate notification while visible; never re-track.
                    None
                }
                WatchState::Tracked {
                    still_visible,
                    tracked_at,
                } => {
                    *still_visible = true;
                    if record.data.sticky {
                        log::debug!(target: "attune",
                                    element = element.0,
                                    entry_id = record.data.entry_id;
                                    "component already tracked, sticky dedup applies");
                        None
                    } else {
                        *tracked_at = timestamp::now();
                        Some(record.data.clone())
                    }
                }
            }
        };

        if let Some(data) = data {
            self.emit(data).await;
        }
    }

    async fn emit(&self, data: ComponentViewData) {
        let event = self.builder.build_component_view(ComponentViewProperties {
            component: data.entry_id.clone(),
            experience: data.experience_id.clone(),
            variant: (data.variant_index > 0).then(|| data.entry_id.clone()),
            variant_index: data.variant_index,
        });
        let event = self.pipeline.run(event).await;

        {
            let callbacks = self
                .callbacks
                .lock()
                .expect("thread holding callback lock should not panic");
            for callback in callbacks.iter() {
                if let Err(err) = callback(&event) {
                    log::warn!(target: "attune", entry_id = data.entry_id;
                               "component-view callback failed: {err}");
                }
            }
        }

        log::debug!(target: "attune",
                    entry_id = data.entry_id,
                    variant_index = data.variant_index;
                    "component view tracked");
        self.dispatcher.dispatch(event);
    }

    /// Mark a duplication scope as tracked. Returns `false` when some element already claimed
    /// it.
    fn claim_scope(&self, scope: &str) -> bool {
        self.tracked_scopes
            .lock()
            .expect("thread holding scope lock should not panic")
            .insert(scope.to_owned())
    }

    fn lock_records(&self) -> std::sync::MutexGuard<'_, HashMap<ElementId, WatchRecord>> {
        self.records
            .lock()
            .expect("thread holding view records lock should not panic")
    }
}
