//! Movie metadata lookup against the Kinopoisk API.

use std::time::Duration;

use log::debug;
use serde::Deserialize;
use url::Url;

use crate::error::{BotError, ProviderErrorKind, Result};
use crate::types::{MovieInfo, RatingSource, Ratings};

const PROVIDER: &str = "kinopoisk";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    docs: Vec<Document>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Document {
    name: Option<String>,
    year: Option<i32>,
    movie_length: Option<u32>,
    description: Option<String>,
    rating: Option<RatingBlock>,
    poster: Option<Poster>,
}

#[derive(Debug, Deserialize)]
struct RatingBlock {
    kp: Option<f64>,
    imdb: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Poster {
    url: Option<String>,
}

fn malformed(message: impl Into<String>) -> BotError {
    BotError::Provider {
        provider: PROVIDER,
        kind: ProviderErrorKind::Malformed(message.into()),
    }
}

/// Replace the non-breaking spaces Kinopoisk embeds in descriptions.
fn normalize_description(raw: &str) -> String {
    raw.replace('\u{a0}', " ")
}

fn document_to_movie(query: &str, doc: Document) -> Result<MovieInfo> {
    let title = doc
        .name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| BotError::NotFound(query.to_string()))?;
    let year = doc
        .year
        .ok_or_else(|| malformed(format!("document for {title:?} has no year")))?;

    let mut ratings = Ratings::default();
    if let Some(block) = doc.rating {
        if let Some(kp) = block.kp {
            ratings.insert(RatingSource::Kp, kp);
        }
        if let Some(imdb) = block.imdb {
            ratings.insert(RatingSource::Imdb, imdb);
        }
    }

    Ok(MovieInfo {
        title,
        year,
        runtime_minutes: doc.movie_length,
        description: doc
            .description
            .as_deref()
            .map(normalize_description)
            .unwrap_or_default(),
        ratings,
        poster_url: doc.poster.and_then(|poster| poster.url),
    })
}

/// Map a raw search response body to the first matching movie.
fn parse_search_response(query: &str, body: &str) -> Result<MovieInfo> {
    let response: SearchResponse =
        serde_json::from_str(body).map_err(|e| malformed(e.to_string()))?;
    let doc = response
        .docs
        .into_iter()
        .next()
        .ok_or_else(|| BotError::NotFound(query.to_string()))?;
    document_to_movie(query, doc)
}

/// Client for the Kinopoisk movie search endpoint.
#[derive(Debug, Clone)]
pub struct KinopoiskClient {
    token: String,
    client: reqwest::Client,
    api_url: Url,
}

impl KinopoiskClient {
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

    /// Look up one movie by free-text query.
    ///
    /// # Errors
    ///
    /// - `Validation` when the query is blank
    /// - `NotFound` when the provider has no matching document
    /// - `Provider` on transport failure, timeout or non-success status
    pub async fn resolve(&self, query: &str) -> Result<MovieInfo> {
        let query = query.trim();
        if query.is_empty() {
            return Err(BotError::Validation("query is empty".to_string()));
        }

        debug!("Requesting Kinopoisk metadata for {query:?}");

        let response = self
            .client
            .get(self.api_url.clone())
            .query(&[
                ("page", "1"),
                ("limit", "1"),
                ("query", query),
                ("token", self.token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| BotError::provider(PROVIDER, &e))?;

        let status = response.status();
        if !status.is_success() {
            debug!("Kinopoisk answered with status {status}");
            return Err(BotError::Provider {
                provider: PROVIDER,
                kind: ProviderErrorKind::Status(status),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| BotError::provider(PROVIDER, &e))?;

        let movie = parse_search_response(query, &body)?;
        debug!("Kinopoisk resolved {query:?} to {}", movie.canonical_title());
        Ok(movie)
    }
}
