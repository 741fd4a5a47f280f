//! Common types used throughout the cinebot pipeline.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{BotError, Result};

/// A free-text movie lookup submitted by a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieQuery {
    pub raw_text: String,
    pub user_id: String,
}

impl MovieQuery {
    /// Build a query, rejecting text that is blank after trimming.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if `raw_text` is empty or whitespace only.
    pub fn new(user_id: impl Into<String>, raw_text: &str) -> Result<Self> {
        let trimmed = raw_text.trim();
        if trimmed.is_empty() {
            return Err(BotError::Validation("query is empty".to_string()));
        }
        Ok(Self {
            raw_text: trimmed.to_string(),
            user_id: user_id.into(),
        })
    }
}

/// Source of a movie rating.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum RatingSource {
    /// Kinopoisk user rating
    Kp,
    /// IMDb user rating
    Imdb,
}

impl RatingSource {
    /// Human readable label for display.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            RatingSource::Kp => "Kinopoisk",
            RatingSource::Imdb => "IMDb",
        }
    }
}

/// Ratings reported by the provider.
///
/// Only scores the provider actually sent are stored; an omitted or null
/// score is absent rather than zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ratings(BTreeMap<RatingSource, f64>);

impl Ratings {
    pub fn insert(&mut self, source: RatingSource, score: f64) {
        self.0.insert(source, score);
    }

    /// The reported score, if any.
    #[must_use]
    pub fn get(&self, source: RatingSource) -> Option<f64> {
        self.0.get(&source).copied()
    }

    /// The reported score, or `0.0` when the provider omitted it.
    #[must_use]
    pub fn score(&self, source: RatingSource) -> f64 {
        self.get(source).unwrap_or(0.0)
    }
}

/// Canonical movie metadata. Only built from a successful lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieInfo {
    pub title: String,
    pub year: i32,
    pub runtime_minutes: Option<u32>,
    pub description: String,
    pub ratings: Ratings,
    pub poster_url: Option<String>,
}

impl MovieInfo {
    /// The "Title (Year)" string used for reference lookup and history.
    #[must_use]
    pub fn canonical_title(&self) -> String {
        format!("{} ({})", self.title, self.year)
    }
}

/// A (title, url) pair returned by the video-search provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceCandidate {
    pub title: String,
    pub url: String,
}

impl ReferenceCandidate {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }
}

/// Best reference for a movie, or `None` when nothing acceptable was found.
pub type ResolvedReference = Option<ReferenceCandidate>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHistoryEntry {
    pub user_id: String,
    pub raw_query: String,
    pub canonical_title: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieStat {
    pub user_id: String,
    pub movie_title: String,
    pub count: u32,
}
