//! Playable reference lookup using the VK video search API.

use std::time::Duration;

use log::debug;
use serde::Deserialize;
use url::Url;

use crate::error::{BotError, ProviderErrorKind, Result};
use crate::types::ReferenceCandidate;

const PROVIDER: &str = "vk";

/// Prefix that biases search results towards films.
const TOPIC_PREFIX: &str = "фильм";

const API_VERSION: &str = "5.199";

/// Long-form videos hosted on VK itself.
const FILTERS: &str = "long,vk";

/// Sort by relevance.
const SORT: &str = "0";

pub const DEFAULT_CANDIDATE_COUNT: u32 = 50;

/// Upper bound the API accepts for `count`.
const MAX_CANDIDATE_COUNT: u32 = 200;

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    response: Option<SearchPayload>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct SearchPayload {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    title: Option<String>,
    player: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error_code: Option<i64>,
    error_msg: Option<String>,
}

fn parse_search_response(body: &str) -> Result<Vec<ReferenceCandidate>> {
    let envelope: SearchEnvelope = serde_json::from_str(body).map_err(|e| BotError::Provider {
        provider: PROVIDER,
        kind: ProviderErrorKind::Malformed(e.to_string()),
    })?;

    if let Some(error) = envelope.error {
        return Err(BotError::Provider {
            provider: PROVIDER,
            kind: ProviderErrorKind::Malformed(format!(
                "API error {}: {}",
                error.error_code.unwrap_or_default(),
                error.error_msg.unwrap_or_default()
            )),
        });
    }

    // Items without a player link cannot be played, so they are skipped.
    Ok(envelope
        .response
        .map(|payload| payload.items)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|item| Some(ReferenceCandidate::new(item.title?, item.player?)))
        .collect())
}

/// Client for the VK `video.search` method.
#[derive(Debug, Clone)]
pub struct VkVideoClient {
    token: String,
    client: reqwest::Client,
    api_url: Url,
}

impl VkVideoClient {
    /// Build a client whose every request is bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the HTTP client cannot be constructed.
    pub fn new(token: String, api_url: Url, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BotError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            token,
            client,
            api_url,
        })
    }

    /// Search for videos matching a canonical "Title (Year)" string.
    ///
    /// Candidates come back in provider order. An empty list is a valid
    /// answer, not an error.
    ///
    /// # Errors
    ///
    /// Returns `Provider` on transport failure, timeout, non-success status
    /// or an API-level error payload.
    pub async fn search(&self, canonical_title: &str, count: u32) -> Result<Vec<ReferenceCandidate>> {
        let canonical_title = canonical_title.trim();
        if canonical_title.is_empty() {
            return Err(BotError::Validation("reference query is empty".to_string()));
        }

        let q = format!("{TOPIC_PREFIX} {canonical_title}");
        let count = count.clamp(1, MAX_CANDIDATE_COUNT).to_string();
        debug!("Requesting VK videos for {q:?} (count {count})");

        let response = self
            .client
            .get(self.api_url.clone())
            .query(&[
                ("q", q.as_str()),
                ("count", count.as_str()),
                ("access_token", self.token.as_str()),
                ("v", API_VERSION),
                ("filters", FILTERS),
                ("sort", SORT),
            ])
            .send()
            .await
            .map_err(|e| BotError::provider(PROVIDER, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BotError::Provider {
                provider: PROVIDER,
                kind: ProviderErrorKind::Status(status),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| BotError::provider(PROVIDER, &e))?;

        let candidates = parse_search_response(&body)?;
        debug!("VK returned {} candidates", candidates.len());
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_support::{query_params, serve_json};

    fn client(url: Url) -> VkVideoClient {
        VkVideoClient::new("vk-token".to_string(), url, Duration::from_secs(5))
            .expect("client builds")
    }

    #[test]
    fn keeps_provider_order() -> Result<()> {
        let body = json!({
            "response": {
                "count": 3,
                "items": [
                    { "title": "Venom 2", "player": "u2" },
                    { "title": "Venom", "player": "u1" },
                    { "title": "Private clip" }
                ]
            }
        });
        let candidates = parse_search_response(&body.to_string())?;
        assert_eq!(
            candidates,
            vec![
                ReferenceCandidate::new("Venom 2", "u2"),
                ReferenceCandidate::new("Venom", "u1"),
            ]
        );
        Ok(())
    }

    #[test]
    fn no_items_is_empty_not_error() -> Result<()> {
        assert!(parse_search_response(r#"{"response":{"count":0,"items":[]}}"#)?.is_empty());
        assert!(parse_search_response(r#"{"response":{"count":0}}"#)?.is_empty());
        Ok(())
    }

    #[test]
    fn api_error_payload_is_provider_error() {
        let body = r#"{"error":{"error_code":5,"error_msg":"User authorization failed"}}"#;
        assert!(matches!(
            parse_search_response(body),
            Err(BotError::Provider { provider: "vk", .. })
        ));
    }

    #[tokio::test]
    async fn sends_biased_query_and_fixed_filters() -> Result<()> {
        let body = json!({ "response": { "items": [{ "title": "Venom", "player": "u1" }] } });
        let (url, request) = serve_json(200, &body.to_string()).await;

        let candidates = client(url).search("Venom (2018)", DEFAULT_CANDIDATE_COUNT).await?;
        assert_eq!(candidates.len(), 1);

        let params = query_params(&request.await.expect("server task"));
        assert_eq!(params.get("q").map(String::as_str), Some("фильм Venom (2018)"));
        assert_eq!(params.get("count").map(String::as_str), Some("50"));
        assert_eq!(params.get("access_token").map(String::as_str), Some("vk-token"));
        assert_eq!(params.get("v").map(String::as_str), Some(API_VERSION));
        assert_eq!(params.get("filters").map(String::as_str), Some("long,vk"));
        assert_eq!(params.get("sort").map(String::as_str), Some("0"));
        Ok(())
    }

    #[tokio::test]
    async fn count_is_bounded() -> Result<()> {
        let (url, request) = serve_json(200, r#"{"response":{"items":[]}}"#).await;
        client(url).search("Dune (2021)", 10_000).await?;
        let params = query_params(&request.await.expect("server task"));
        assert_eq!(params.get("count").map(String::as_str), Some("200"));
        Ok(())
    }

    #[tokio::test]
    async fn server_error_is_provider_error() {
        let (url, _request) = serve_json(503, "{}").await;
        assert!(matches!(
            client(url).search("Dune (2021)", 5).await,
            Err(BotError::Provider {
                kind: ProviderErrorKind::Status(_),
                ..
            })
        ));
    }
}
