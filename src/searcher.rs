//! Movie resolution pipeline: metadata, reference, then bookkeeping.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::fuzzy_search::select_reference;
use crate::kinopoisk::KinopoiskClient;
use crate::store::{DEFAULT_LIMIT, InteractionStore};
use crate::types::{MovieInfo, MovieQuery, ReferenceCandidate, ResolvedReference};
use crate::vk_video::{DEFAULT_CANDIDATE_COUNT, VkVideoClient};

/// Everything a successful search hands back to the front-end.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub movie: MovieInfo,
    pub reference: ResolvedReference,
    pub elapsed: Duration,
}

/// Wires the provider clients, the matcher and the store together.
///
/// Built once at startup and shared by every request.
#[derive(Debug, Clone)]
pub struct MovieSearcher {
    metadata: KinopoiskClient,
    references: VkVideoClient,
    store: Arc<InteractionStore>,
}

impl MovieSearcher {
    pub fn new(
        metadata: KinopoiskClient,
        references: VkVideoClient,
        store: Arc<InteractionStore>,
    ) -> Self {
        Self {
            metadata,
            references,
            store,
        }
    }

    /// Build the clients and open the store described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `Config` if an HTTP client cannot be built and `Storage` if
    /// the database cannot be opened.
    pub fn from_config(config: &Config) -> Result<Self> {
        let metadata = KinopoiskClient::new(
            config.kinopoisk_token.clone(),
            config.kinopoisk_api_url.clone(),
            config.http_timeout,
        )?;
        let references = VkVideoClient::new(
            config.vk_token.clone(),
            config.vk_api_url.clone(),
            config.http_timeout,
        )?;
        let store = Arc::new(InteractionStore::open(&config.database_path)?);
        Ok(Self::new(metadata, references, store))
    }

    /// Resolve a free-text query into canonical movie metadata.
    ///
    /// # Errors
    ///
    /// Propagates `Validation`, `NotFound` and `Provider` from the lookup.
    pub async fn resolve(&self, query: &str) -> Result<MovieInfo> {
        self.metadata.resolve(query).await
    }

    /// Find the best playable reference for a canonical title.
    ///
    /// # Errors
    ///
    /// Returns `Provider` when the video search itself fails; an empty or
    /// unconvincing result is `Ok(None)`.
    pub async fn find_reference(&self, canonical_title: &str) -> Result<ResolvedReference> {
        let candidates = self
            .references
            .search(canonical_title, DEFAULT_CANDIDATE_COUNT)
            .await?;
        Ok(pick_reference(canonical_title, &candidates))
    }

    /// Log the search and bump the title counter atomically.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the write fails; nothing is persisted then.
    pub fn record(&self, user_id: &str, query: &str, canonical_title: &str) -> Result<()> {
        self.store.record(user_id, query, canonical_title)
    }

    /// Recent `(query, title)` pairs for a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the store cannot be read.
    pub fn history(&self, user_id: &str) -> Result<Vec<(String, String)>> {
        Ok(self
            .store
            .history(user_id, DEFAULT_LIMIT)?
            .into_iter()
            .map(|entry| (entry.raw_query, entry.canonical_title))
            .collect())
    }

    /// Most searched `(title, count)` pairs for a user.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the store cannot be read.
    pub fn stats(&self, user_id: &str) -> Result<Vec<(String, u32)>> {
        Ok(self
            .store
            .stats(user_id, DEFAULT_LIMIT)?
            .into_iter()
            .map(|stat| (stat.movie_title, stat.count))
            .collect())
    }

    /// Run the whole pipeline for one user query.
    ///
    /// Only metadata failures abort the search. A failed reference lookup
    /// degrades to no reference and a failed write is only logged.
    ///
    /// # Errors
    ///
    /// Propagates `Validation`, `NotFound` and `Provider` from [`Self::resolve`].
    pub async fn search(&self, query: &MovieQuery) -> Result<SearchOutcome> {
        let started = Instant::now();
        info!("User {} searching for {:?}", query.user_id, query.raw_text);

        let movie = self.resolve(&query.raw_text).await?;
        let canonical_title = movie.canonical_title();

        let reference = match self.find_reference(&canonical_title).await {
            Ok(reference) => reference,
            Err(e) => {
                warn!("Reference lookup for {canonical_title:?} failed: {e}");
                None
            }
        };

        if let Err(e) = self.record(&query.user_id, &query.raw_text, &canonical_title) {
            warn!(
                "Failed to record search {:?} for user {}: {e}",
                query.raw_text, query.user_id
            );
        }

        let elapsed = started.elapsed();
        debug!(
            "Search for {:?} finished in {elapsed:?} (reference: {})",
            query.raw_text,
            reference.is_some()
        );

        Ok(SearchOutcome {
            movie,
            reference,
            elapsed,
        })
    }
}

/// Select the best candidate and hand back an owned copy.
#[must_use]
pub fn pick_reference(
    canonical_title: &str,
    candidates: &[ReferenceCandidate],
) -> ResolvedReference {
    let selected = select_reference(canonical_title, candidates).cloned();
    match &selected {
        Some(candidate) => debug!("Selected reference {:?} for {canonical_title:?}", candidate.title),
        None => debug!(
            "No acceptable reference for {canonical_title:?} among {} candidates",
            candidates.len()
        ),
    }
    selected
}
