//! Construction of typed analytics events.
//!
//! [`EventBuilder`] owns the shared contextual metadata (channel, SDK library info, ambient
//! locale/user-agent/page accessors) so call sites only supply kind-specific fields. Ambient
//! values come from an injected [`AmbientSource`], which lets the same builder behave correctly
//! embedded in a browser, a server, or a native app.
use std::sync::Arc;

use crate::events::event::{
    ComponentViewProperties, Event, EventContext, PageProperties, UniversalEventProperties,
};
use crate::sdk_metadata::SdkMetadata;
use crate::timestamp;

/// Host-supplied accessors for ambient context. Every accessor defaults to "unavailable", which
/// is the correct answer for server-side hosts.
pub trait AmbientSource: Send + Sync {
    fn locale(&self) -> Option<String> {
        None
    }
    fn user_agent(&self) -> Option<String> {
        None
    }
    /// Snapshot of the current page, for hosts that have one.
    fn page(&self) -> Option<PageProperties> {
        None
    }
}

/// [`AmbientSource`] for hosts with no ambient context (servers, tests).
#[derive(Debug, Default)]
pub struct NoAmbient;

impl AmbientSource for NoAmbient {}

/// Builds analytics events with shared contextual metadata.
pub struct EventBuilder {
    channel: String,
    library: SdkMetadata,
    ambient: Arc<dyn AmbientSource>,
}

impl EventBuilder {
    pub fn new(
        channel: impl Into<String>,
        library: SdkMetadata,
        ambient: Arc<dyn AmbientSource>,
    ) -> EventBuilder {
        EventBuilder {
            channel: channel.into(),
            library,
            ambient,
        }
    }

    /// Stamp the properties every event shares: a fresh `messageId` and three identical
    /// ISO-8601 timestamps (events are built synchronously, not queued).
    pub fn build_universal(&self, user_id: Option<String>) -> UniversalEventProperties {
        let now = timestamp::now();
        UniversalEventProperties {
            channel: self.channel.clone(),
            context: EventContext {
                library: self.library.clone(),
                locale: self.ambient.locale(),
                user_agent: self.ambient.user_agent(),
                page: self.ambient.page(),
            },
            message_id: uuid::Uuid::new_v4().to_string(),
            original_timestamp: now,
            sent_at: now,
            timestamp: now,
            user_id,
        }
    }

    /// Build a page-view event. `properties` is a caller-supplied partial that is deep-merged
    /// over the ambient page snapshot; the ambient `title` only fills in when the caller left it
    /// unset.
    pub fn build_page(&self, properties: PageProperties) -> Event {
        let merged = match self.ambient.page() {
            Some(ambient) => properties.merged_over(ambient),
            None => properties,
        };
        Event::Page {
            universal: self.build_universal(None),
            properties: merged,
        }
    }

    pub fn build_track(
        &self,
        event: impl Into<String>,
        properties: serde_json::Map<String, serde_json::Value>,
    ) -> Event {
        Event::Track {
            universal: self.build_universal(None),
            event: event.into(),
            properties,
        }
    }

    pub fn build_identify(
        &self,
        user_id: impl Into<String>,
        traits: serde_json::Map<String, serde_json::Value>,
    ) -> Event {
        Event::Identify {
            universal: self.build_universal(Some(user_id.into())),
            traits,
        }
    }

    pub fn build_component_view(&self, properties: ComponentViewProperties) -> Event {
        Event::Component {
            universal: self.build_universal(None),
            properties,
        }
    }

    pub fn build_screen(
        &self,
        name: impl Into<String>,
        properties: serde_json::Map<String, serde_json::Value>,
    ) -> Event {
        Event::Screen {
            universal: self.build_universal(None),
            name: name.into(),
            properties,
        }
    }

    pub fn build_alias(&self, user_id: impl Into<String>, previous_id: impl Into<String>) -> Event {
        Event::Alias {
            universal: self.build_universal(Some(user_id.into())),
            previous_id: previous_id.into(),
        }
    }

    pub fn build_group(
        &self,
        group_id: impl Into<String>,
        traits: serde_json::Map<String, serde_json::Value>,
    ) -> Event {
        Event::Group {
            universal: self.build_universal(None),
            group_id: group_id.into(),
            traits,
        }
    }
}
