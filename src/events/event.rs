use serde::{Deserialize, Serialize};

use crate::sdk_metadata::SdkMetadata;
use crate::timestamp::Timestamp;

/// Properties shared by every event kind.
///
/// `message_id` is a fresh UUID stamped at construction time and serves as the idempotency key
/// for server-side dedup. The three timestamps are identical at construction, since events are
/// built synchronously rather than queued-then-stamped.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UniversalEventProperties {
    pub channel: String,
    pub context: EventContext,
    pub message_id: String,
    pub original_timestamp: Timestamp,
    pub sent_at: Timestamp,
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Ambient context captured when an event is built.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventContext {
    pub library: SdkMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<PageProperties>,
}

/// Page snapshot / page-view properties. All fields are independently optional so the same shape
/// serves both as the ambient snapshot and as a caller-supplied partial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct PageProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PageProperties {
    /// Deep-merge `self` (the caller-supplied partial) over `ambient`. Caller fields win;
    /// ambient fields fill the gaps. The ambient `title` in particular is only a fallback for an
    /// unset title, never an override.
    pub fn merged_over(mut self, ambient: PageProperties) -> PageProperties {
        self.url = self.url.or(ambient.url);
        self.path = self.path.or(ambient.path);
        self.search = self.search.or(ambient.search);
        self.title = self.title.or(ambient.title);
        self.referrer = self.referrer.or(ambient.referrer);
        fill_missing(&mut self.extra, ambient.extra);
        self
    }
}

/// Fill `target` with entries from `source` it lacks. Where both sides hold a JSON object under
/// the same key the merge recurses, so a caller partial like `{"campaign": {"source": ...}}`
/// keeps the ambient `campaign.medium` alongside it.
fn fill_missing(
    target: &mut serde_json::Map<String, serde_json::Value>,
    source: serde_json::Map<String, serde_json::Value>,
) {
    for (key, value) in source {
        match target.entry(key) {
            serde_json::map::Entry::Vacant(slot) => {
                slot.insert(value);
            }
            serde_json::map::Entry::Occupied(mut slot) => {
                if let (serde_json::Value::Object(nested), serde_json::Value::Object(ambient)) =
                    (slot.get_mut(), value)
                {
                    fill_missing(nested, ambient);
                }
            }
        }
    }
}

/// Properties of a component-view event: which rendered entry became visible and which
/// personalization (if any) produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentViewProperties {
    /// Id of the rendered entry.
    pub component: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    pub variant_index: u32,
}

/// An analytics event, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Event {
    #[serde(rename_all = "camelCase")]
    Page {
        #[serde(flatten)]
        universal: UniversalEventProperties,
        properties: PageProperties,
    },
    #[serde(rename_all = "camelCase")]
    Track {
        #[serde(flatten)]
        universal: UniversalEventProperties,
        event: String,
        #[serde(default)]
        properties: serde_json::Map<String, serde_json::Value>,
    },
    #[serde(rename_all = "camelCase")]
    Identify {
        #[serde(flatten)]
        universal: UniversalEventProperties,
        #[serde(default)]
        traits: serde_json::Map<String, serde_json::Value>,
    },
    #[serde(rename_all = "camelCase")]
    Component {
        #[serde(flatten)]
        universal: UniversalEventProperties,
        properties: ComponentViewProperties,
    },
    #[serde(rename_all = "camelCase")]
    Screen {
        #[serde(flatten)]
        universal: UniversalEventProperties,
        name: String,
        #[serde(default)]
        properties: serde_json::Map<String, serde_json::Value>,
    },
    #[serde(rename_all = "camelCase")]
    Alias {
        #[serde(flatten)]
        universal: UniversalEventProperties,
        previous_id: String,
    },
    #[serde(rename_all = "camelCase")]
    Group {
        #[serde(flatten)]
        universal: UniversalEventProperties,
        group_id: String,
        #[serde(default)]
        traits: serde_json::Map<String, serde_json::Value>,
    },
}

impl Event {
    /// Shared properties, regardless of kind.
    pub fn universal(&self) -> &UniversalEventProperties {
        match self {
            Event::Page { universal, .. }
            | Event::Track { universal, .. }
            | Event::Identify { universal, .. }
            | Event::Component { universal, .. }
            | Event::Screen { universal, .. }
            | Event::Alias { universal, .. }
            | Event::Group { universal, .. } => universal,
        }
    }
}

/// An [`Event`] as shipped to the batch ingestion endpoint, which additionally requires the
/// visitor's anonymous id on every event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEvent {
    #[serde(flatten)]
    pub event: Event,
    pub anonymous_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(extra: serde_json::Value) -> PageProperties {
        let serde_json::Value::Object(extra) = extra else {
            panic!("extra must be an object");
        };
        PageProperties {
            extra,
            ..Default::default()
        }
    }

    #[test]
    fn nested_objects_merge_instead_of_replacing() {
        let partial = page(serde_json::json!({
            "campaign": {"source": "newsletter"},
        }));
        let ambient = page(serde_json::json!({
            "campaign": {"source": "organic", "medium": "email"},
            "experiment": "exp-1",
        }));

        let merged = partial.merged_over(ambient);
        assert_eq!(merged.extra["campaign"]["source"], "newsletter");
        assert_eq!(merged.extra["campaign"]["medium"], "email");
        assert_eq!(merged.extra["experiment"], "exp-1");
    }

    #[test]
    fn mismatched_value_kinds_keep_the_caller_side() {
        let partial = page(serde_json::json!({"campaign": "spring-sale"}));
        let ambient = page(serde_json::json!({"campaign": {"source": "organic"}}));

        let merged = partial.merged_over(ambient);
        assert_eq!(merged.extra["campaign"], "spring-sale");
    }
}
