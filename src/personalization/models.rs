use serde::{Deserialize, Serialize};

/// `TryParse` allows a subfield to fail parsing without failing the parsing of the whole
/// structure.
///
/// Experience and variant sub-entries come from CMS content that editors can break at any time;
/// wrapping them in `TryParse` means one malformed experience degrades to "not matched" while
/// the rest of the entry stays usable.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum TryParse<T> {
    /// Successfully parsed.
    Parsed(T),
    /// Parsing failed.
    ParseFailed(serde_json::Value),
}

impl<T> TryParse<T> {
    pub fn as_parsed(&self) -> Option<&T> {
        match self {
            TryParse::Parsed(v) => Some(v),
            TryParse::ParseFailed(_) => None,
        }
    }
}

impl<T> From<TryParse<T>> for Option<T> {
    fn from(value: TryParse<T>) -> Self {
        match value {
            TryParse::Parsed(v) => Some(v),
            TryParse::ParseFailed(_) => None,
        }
    }
}

/// A CMS content entry, as handed to the resolver by the host's content layer.
///
/// The core only interprets `id` and the linked `experiences`; everything else rides along in
/// `fields` untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: String,
    /// Experiences linked to this entry. `None` means the entry doesn't carry a
    /// personalization-experiences field at all, which is distinct from an empty list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiences: Option<Vec<TryParse<ExperienceEntry>>>,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// Field key under which [`resolve`][super::resolve::resolve] records which selection produced a
/// resolved entry.
pub const PERSONALIZATION_META_FIELD: &str = "attunePersonalization";

/// An experience definition: links a baseline to one or more variants with a traffic and
/// distribution policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub experience_type: ExperienceType,
    pub config: ExperienceConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<AudienceRef>,
    /// Variant entries linked to this experience, looked up by id when a replacement component
    /// selects one.
    #[serde(default)]
    pub variants: Vec<TryParse<Entry>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum ExperienceType {
    Experiment,
    Personalization,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct ExperienceConfig {
    /// Traffic split across baseline + variants. Allocation itself happens server-side; clients
    /// only use this for well-formedness checks.
    #[serde(default)]
    pub distribution: Vec<f64>,
    #[serde(default)]
    pub components: Vec<TryParse<ExperienceComponent>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic: Option<f64>,
    #[serde(default = "default_sticky")]
    pub sticky: bool,
}

fn default_sticky() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct AudienceRef {
    pub id: String,
}

/// One personalized slot inside an experience.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ExperienceComponent {
    /// Swap a whole baseline entry for a variant entry.
    #[serde(rename_all = "camelCase")]
    EntryReplacement {
        baseline: EntryRef,
        variants: Vec<EntryRef>,
    },
    /// Override a single field value.
    #[serde(rename_all = "camelCase")]
    InlineVariable {
        key: String,
        value_type: InlineValueType,
        baseline: InlineValue,
        variants: Vec<InlineValue>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct EntryRef {
    pub id: String,
    #[serde(default)]
    pub hidden: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum InlineValueType {
    String,
    Number,
    Boolean,
    Object,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct InlineValue {
    #[serde(default)]
    pub value: serde_json::Value,
}

impl ExperienceEntry {
    /// A well-formed experience links exactly `distribution.len() - 1` variants (index 0 of the
    /// distribution is the baseline).
    pub fn is_well_formed(&self) -> bool {
        !self.config.distribution.is_empty()
            && self.variants.len() == self.config.distribution.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_experience_degrades_without_poisoning_entry() {
        let entry: Entry = serde_json::from_value(serde_json::json!({
            "id": "B1",
            "experiences": [
                {"this is": "not an experience"},
                {
                    "id": "E1",
                    "type": "experiment",
                    "config": {"distribution": [0.5, 0.5]},
                    "variants": [{"id": "V1"}],
                },
            ],
            "headline": "hello",
        }))
        .unwrap();

        let experiences = entry.experiences.as_ref().unwrap();
        assert_eq!(experiences.len(), 2);
        assert!(experiences[0].as_parsed().is_none());
        assert_eq!(experiences[1].as_parsed().unwrap().id, "E1");
        assert_eq!(entry.fields["headline"], "hello");
    }

    #[test]
    fn component_union_is_tagged_by_type() {
        let component: ExperienceComponent = serde_json::from_value(serde_json::json!({
            "type": "entryReplacement",
            "baseline": {"id": "B1"},
            "variants": [{"id": "V1", "hidden": false}],
        }))
        .unwrap();
        assert!(matches!(
            component,
            ExperienceComponent::EntryReplacement { .. }
        ));

        let component: ExperienceComponent = serde_json::from_value(serde_json::json!({
            "type": "inlineVariable",
            "key": "headline",
            "valueType": "string",
            "baseline": {"value": "hello"},
            "variants": [{"value": "howdy"}],
        }))
        .unwrap();
        assert!(matches!(
            component,
            ExperienceComponent::InlineVariable { .. }
        ));
        // Variant fields stay camelCase on the wire.
        let wire = serde_json::to_value(&component).unwrap();
        assert_eq!(wire["valueType"], "string");
    }

    #[test]
    fn well_formedness_ties_variants_to_distribution() {
        let experience: ExperienceEntry = serde_json::from_value(serde_json::json!({
            "id": "E1",
            "type": "experiment",
            "config": {"distribution": [0.5, 0.5]},
            "variants": [{"id": "V1"}],
        }))
        .unwrap();
        assert!(experience.is_well_formed());

        let experience: ExperienceEntry = serde_json::from_value(serde_json::json!({
            "id": "E1",
            "type": "experiment",
            "config": {"distribution": [0.5, 0.25, 0.25]},
            "variants": [{"id": "V1"}],
        }))
        .unwrap();
        assert!(!experience.is_well_formed());
    }
}
