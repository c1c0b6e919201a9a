//! HTTP client for the assignment/profile endpoint.
//!
//! One request shape does all profile work: it carries the events that triggered the mutation
//! and comes back with the fresh [`Profile`] snapshot, the selected personalizations, and any
//! pending changes. All traffic goes through [`Transport`], so timeout/retry policy applies
//! uniformly.
use std::sync::Arc;

use reqwest::header::CONTENT_TYPE;
use reqwest::Url;

use crate::error::TransportError;
use crate::events::Event;
use crate::profile::{Profile, ProfileChange, SelectedPersonalization};
use crate::transport::Transport;
use crate::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.attune.io";

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    /// Organization-scoped client id.
    pub client_id: String,
    /// Environment name (e.g., "main").
    pub environment: String,
    /// Encode the JSON body as `text/plain` so browser hosts dodge the CORS preflight. The
    /// server accepts both encodings.
    pub plain_text_body: bool,
}

/// Request options accepted by the profile endpoint.
#[derive(Debug, Clone, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfileRequest<'a> {
    events: &'a [Event],
    options: &'a RequestOptions,
}

/// Response envelope shared by all endpoints. Missing `Option` fields parse as `None`, so no
/// `default` attributes here (they would force a `T: Default` bound onto the derive).
#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseEnvelope<T> {
    data: Option<T>,
    message: Option<String>,
    error: Option<String>,
}

/// Payload of a successful profile mutation. Replaces the cached visitor state wholesale.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileData {
    pub profile: Profile,
    #[serde(default)]
    pub experiences: Vec<SelectedPersonalization>,
    #[serde(default)]
    pub changes: Vec<ProfileChange>,
}

pub struct ApiClient {
    transport: Arc<Transport>,
    config: ApiConfig,
}

impl ApiClient {
    pub fn new(config: ApiConfig, transport: Arc<Transport>) -> ApiClient {
        ApiClient { transport, config }
    }

    /// Send events to the profile endpoint and return the fresh visitor state.
    ///
    /// A malformed success response is a contract violation and surfaces as
    /// [`Error::SchemaValidation`]; this is deliberately different from cache reads, which
    /// degrade to "absent".
    pub async fn upsert_profile(
        &self,
        profile_id: Option<&str>,
        events: &[Event],
        options: &RequestOptions,
    ) -> Result<ProfileData> {
        let url = self.profiles_url(profile_id)?;
        let body = ProfileRequest { events, options };

        log::debug!(target: "attune",
                    profile_id = profile_id.unwrap_or("-"),
                    events = events.len();
                    "sending profile mutation");

        let request = if self.config.plain_text_body {
            self.transport
                .client()
                .post(url)
                .header(CONTENT_TYPE, "text/plain")
                .body(serde_json::to_string(&body)?)
        } else {
            self.transport.client().post(url).json(&body)
        };

        let response = self.transport.send(request).await?;
        let raw = response.text().await.map_err(TransportError::from)?;
        let envelope: ResponseEnvelope<ProfileData> = serde_json::from_str(&raw)?;

        if let Some(error) = envelope.error {
            return Err(Error::Api { message: error });
        }
        let Some(data) = envelope.data else {
            return Err(Error::Api {
                message: envelope
                    .message
                    .unwrap_or_else(|| "response envelope carries no data".to_owned()),
            });
        };

        log::debug!(target: "attune",
                    profile_id = data.profile.id,
                    experiences = data.experiences.len();
                    "profile mutation succeeded");
        Ok(data)
    }

    /// `POST /v2/organizations/{client_id}/environments/{env}/profiles[/{id}]`
    fn profiles_url(&self, profile_id: Option<&str>) -> Result<Url> {
        let ApiConfig {
            base_url,
            client_id,
            environment,
            ..
        } = &self.config;
        let mut url = format!(
            "{base_url}/v2/organizations/{client_id}/environments/{environment}/profiles"
        );
        if let Some(id) = profile_id {
            url.push('/');
            url.push_str(id);
        }
        Url::parse(&url).map_err(Error::InvalidBaseUrl)
    }

    /// `POST /v1/organizations/{client_id}/environments/{env}/events`
    pub fn events_url(&self) -> Result<Url> {
        let ApiConfig {
            base_url,
            client_id,
            environment,
            ..
        } = &self.config;
        Url::parse(&format!(
            "{base_url}/v1/organizations/{client_id}/environments/{environment}/events"
        ))
        .map_err(Error::InvalidBaseUrl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportConfig;

    fn client(base_url: &str) -> ApiClient {
        ApiClient::new(
            ApiConfig {
                base_url: base_url.to_owned(),
                client_id: "org-1".to_owned(),
                environment: "main".to_owned(),
                plain_text_body: false,
            },
            Arc::new(Transport::new(TransportConfig::default())),
        )
    }

    #[test]
    fn profiles_url_includes_optional_id() {
        let client = client("https://api.example.com");
        assert_eq!(
            client.profiles_url(None).unwrap().as_str(),
            "https://api.example.com/v2/organizations/org-1/environments/main/profiles"
        );
        assert_eq!(
            client.profiles_url(Some("p-1")).unwrap().as_str(),
            "https://api.example.com/v2/organizations/org-1/environments/main/profiles/p-1"
        );
    }

    #[test]
    fn events_url_is_v1() {
        let client = client("https://api.example.com");
        assert_eq!(
            client.events_url().unwrap().as_str(),
            "https://api.example.com/v1/organizations/org-1/environments/main/events"
        );
    }

    #[test]
    fn envelope_tolerates_absent_fields() {
        let envelope: ResponseEnvelope<ProfileData> = serde_json::from_str("{}").unwrap();
        assert!(envelope.data.is_none());
        assert!(envelope.message.is_none());
        assert!(envelope.error.is_none());

        let envelope: ResponseEnvelope<ProfileData> = serde_json::from_value(serde_json::json!({
            "data": {
                "profile": {
                    "id": "p-1",
                    "stableId": "s-1",
                    "random": 0.5,
                    "audiences": [],
                    "traits": {},
                },
            },
        }))
        .unwrap();
        assert_eq!(envelope.data.unwrap().profile.id, "p-1");
    }

    #[test]
    fn invalid_base_url_is_reported() {
        let client = client("not a url");
        assert!(matches!(
            client.profiles_url(None),
            Err(Error::InvalidBaseUrl(_))
        ));
    }
}
