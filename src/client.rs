//! The upward-facing surface of the core. UI-framework adapters (web components, native
//! screens, server middlewares) are only permitted to call into the runtime through [`Client`].
use std::sync::Arc;
use std::time::Duration;

use crate::api::{ApiClient, ApiConfig, RequestOptions, DEFAULT_BASE_URL};
use crate::error::{Error, Result};
use crate::events::{
    AmbientSource, Event, EventBuilder, EventDispatcher, EventDispatcherConfig, PageProperties,
};
use crate::interceptor::InterceptorPipeline;
use crate::overrides::OverrideSet;
use crate::personalization::{self, Entry, Resolution};
use crate::profile::{Consent, Profile};
use crate::sdk_metadata::SdkMetadata;
use crate::state_store::{ProfileStateStore, ResetOptions};
use crate::storage::KeyValueStorage;
use crate::transport::{Transport, TransportConfig};
use crate::view_tracking::{ComponentViewData, ElementId, ViewTrackingEngine};

/// Configuration for [`Client`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_id: String,
    pub environment: String,
    pub base_url: String,
    /// Channel stamped on every event (e.g., "web", "server", "mobile").
    pub channel: String,
    /// Host SDK identity, stamped into event context.
    pub sdk: SdkMetadata,
    pub transport: TransportConfig,
    /// Encode profile request bodies as `text/plain` (browser hosts, CORS preflight).
    pub plain_text_body: bool,
    pub delivery_interval: Duration,
    pub batch_size: usize,
}

impl ClientConfig {
    pub fn new(client_id: impl Into<String>, environment: impl Into<String>) -> ClientConfig {
        ClientConfig {
            client_id: client_id.into(),
            environment: environment.into(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            channel: "server".to_owned(),
            sdk: SdkMetadata::core(),
            transport: TransportConfig::default(),
            plain_text_body: false,
            delivery_interval: Duration::from_millis(1000),
            batch_size: 100,
        }
    }
}

/// Platform-independent personalization/analytics client.
///
/// Event-producing operations are gated on consent: once the visitor denied consent, they
/// return [`Error::Blocked`] without doing any work.
pub struct Client {
    api: ApiClient,
    store: Arc<ProfileStateStore>,
    builder: Arc<EventBuilder>,
    pipeline: Arc<InterceptorPipeline<Event>>,
    dispatcher: EventDispatcher,
    view_tracking: ViewTrackingEngine,
    overrides: OverrideSet,
}

impl Client {
    pub fn new(
        config: ClientConfig,
        storage: Arc<dyn KeyValueStorage>,
        ambient: Arc<dyn AmbientSource>,
    ) -> Result<Client> {
        let transport = Arc::new(Transport::new(config.transport.clone()));
        let api = ApiClient::new(
            ApiConfig {
                base_url: config.base_url.clone(),
                client_id: config.client_id.clone(),
                environment: config.environment.clone(),
                plain_text_body: config.plain_text_body,
            },
            transport.clone(),
        );
        let store = Arc::new(ProfileStateStore::new(storage));
        let builder = Arc::new(EventBuilder::new(
            config.channel.clone(),
            config.sdk.clone(),
            ambient,
        ));
        let pipeline = Arc::new(InterceptorPipeline::new());
        let dispatcher = EventDispatcher::new(
            EventDispatcherConfig {
                events_url: api.events_url()?,
                delivery_interval: config.delivery_interval,
                batch_size: config.batch_size,
            },
            transport,
            {
                let store = store.clone();
                Arc::new(move || store.anonymous_id_or_create())
            },
        );
        let view_tracking = ViewTrackingEngine::new(
            builder.clone(),
            pipeline.clone(),
            dispatcher.clone(),
            {
                // Visibility notifications outlive any observe-time consent check, so the
                // engine re-checks at emission time.
                let store = store.clone();
                Arc::new(move || store.consent() != Some(Consent::Denied))
            },
        );

        Ok(Client {
            api,
            store,
            builder,
            pipeline,
            dispatcher,
            view_tracking,
            overrides: OverrideSet::new(),
        })
    }

    /// Resolve the content variant to render for `entry`, based on the cached selection set with
    /// preview overrides applied.
    pub fn resolve(&self, entry: Entry) -> Resolution {
        let selections = self.overrides.apply(&self.store.personalizations());
        personalization::resolve(entry, &selections)
    }

    /// Report a page view. Updates the visitor profile and selection set from the response.
    pub async fn page(&self, properties: PageProperties) -> Result<()> {
        self.ensure_consent()?;
        let event = self.builder.build_page(properties);
        self.send_profile_event(event).await
    }

    /// Report a behavioral event. Updates the visitor profile and selection set from the
    /// response.
    pub async fn track(
        &self,
        event: impl Into<String>,
        properties: serde_json::Map<String, serde_json::Value>,
    ) -> Result<()> {
        self.ensure_consent()?;
        let event = self.builder.build_track(event, properties);
        self.send_profile_event(event).await
    }

    /// Attach an identity and traits to the visitor.
    pub async fn identify(
        &self,
        user_id: impl Into<String>,
        traits: serde_json::Map<String, serde_json::Value>,
    ) -> Result<()> {
        self.ensure_consent()?;
        let event = self.builder.build_identify(user_id, traits);
        self.send_profile_event(event).await
    }

    /// Start watching an element for view tracking.
    pub fn observe(&self, element: ElementId, data: ComponentViewData) -> Result<()> {
        self.ensure_consent()?;
        self.view_tracking.observe(element, data);
        Ok(())
    }

    pub fn unobserve(&self, element: &ElementId) {
        self.view_tracking.unobserve(element);
    }

    /// Visibility notifications, forwarded from the platform adapter.
    pub fn view_tracking(&self) -> &ViewTrackingEngine {
        &self.view_tracking
    }

    /// Event interceptors run on every event before it is shipped.
    pub fn interceptors(&self) -> &Arc<InterceptorPipeline<Event>> {
        &self.pipeline
    }

    /// Preview overrides, merged over the server selection set by [`Client::resolve`].
    pub fn overrides(&self) -> &OverrideSet {
        &self.overrides
    }

    pub fn get_profile(&self) -> Option<Profile> {
        self.store.profile()
    }

    pub fn consent(&self) -> Option<Consent> {
        self.store.consent()
    }

    pub fn set_consent(&self, consent: Consent) {
        self.store.set_consent(Some(consent));
    }

    /// Forget the visitor: clears profile, personalizations, changes, and the anonymous id.
    pub fn reset(&self, options: ResetOptions) {
        self.store.reset(options);
    }

    /// Force delivery of queued analytics events (shutdown, tests).
    pub async fn flush_events(&self) {
        self.dispatcher.flush().await;
    }

    async fn send_profile_event(&self, event: Event) -> Result<()> {
        let event = self.pipeline.run(event).await;
        let profile_id = self.store.profile().map(|p| p.id);
        let data = self
            .api
            .upsert_profile(profile_id.as_deref(), &[event], &RequestOptions::default())
            .await?;

        // Snapshot semantics: the response replaces cached state wholesale.
        self.store.set_profile(Some(&data.profile));
        self.store.set_personalizations(Some(&data.experiences));
        self.store.set_changes(Some(&data.changes));
        Ok(())
    }

    /// Guard invoked at the top of every event-producing operation.
    fn ensure_consent(&self) -> Result<()> {
        if self.store.consent() == Some(Consent::Denied) {
            log::debug!(target: "attune", "operation blocked: visitor denied consent");
            return Err(Error::Blocked {
                reason: "visitor denied consent",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoAmbient;
    use crate::storage::InMemoryStorage;

    fn client() -> Client {
        Client::new(
            ClientConfig::new("org-1", "main"),
            Arc::new(InMemoryStorage::new()),
            Arc::new(NoAmbient),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn denied_consent_blocks_event_operations() {
        let client = client();
        client.set_consent(Consent::Denied);

        let result = client.track("clicked", Default::default()).await;
        assert!(matches!(result, Err(Error::Blocked { .. })));

        let result = client.observe(
            ElementId::from("el-1"),
            ComponentViewData {
                entry_id: "entry-1".to_owned(),
                experience_id: None,
                variant_index: 0,
                sticky: true,
                duplication_scope: None,
            },
        );
        assert!(matches!(result, Err(Error::Blocked { .. })));
    }

    #[tokio::test]
    async fn consent_denied_after_observe_stops_component_views() {
        let client = client();
        client
            .observe(
                ElementId::from("el-1"),
                ComponentViewData {
                    entry_id: "entry-1".to_owned(),
                    experience_id: None,
                    variant_index: 0,
                    sticky: true,
                    duplication_scope: None,
                },
            )
            .unwrap();

        client.set_consent(Consent::Denied);
        client
            .view_tracking()
            .element_visible(&ElementId::from("el-1"))
            .await;
        assert_eq!(client.dispatcher.pending(), 0);
    }

    #[test]
    fn resolve_applies_preview_overrides() {
        let client = client();
        let entry: Entry = serde_json::from_value(serde_json::json!({
            "id": "B1",
            "experiences": [{
                "id": "E1",
                "type": "experiment",
                "config": {
                    "distribution": [0.5, 0.5],
                    "components": [{
                        "type": "entryReplacement",
                        "baseline": {"id": "B1"},
                        "variants": [{"id": "V1"}],
                    }],
                },
                "variants": [{"id": "V1"}],
            }],
        }))
        .unwrap();

        // Nothing cached, nothing overridden: baseline.
        let resolution = client.resolve(entry.clone());
        assert_eq!(resolution.entry.id, "B1");

        client.overrides().set(crate::profile::SelectedPersonalization {
            experience_id: "E1".to_owned(),
            variant_index: 1,
            variants: Default::default(),
            sticky: false,
        });
        let resolution = client.resolve(entry);
        assert_eq!(resolution.entry.id, "V1");
    }

    #[test]
    fn reset_clears_cached_profile() {
        let client = client();
        client.store.set_profile(Some(&Profile {
            id: "p-1".to_owned(),
            stable_id: "s-1".to_owned(),
            random: 0.1,
            audiences: vec![],
            traits: Default::default(),
            location: None,
            session: None,
        }));

        client.reset(ResetOptions::default());
        assert!(client.get_profile().is_none());
    }
}
