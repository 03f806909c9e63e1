//! # Search Orchestrator Module
//!
//! ## Purpose
//! Single entry point for section search: try the remote full-text index
//! first, and on any failure fall back to loading the corpus, scoring every
//! candidate locally, sorting, and paginating. The fallback is functionally
//! complete, not a degraded stub: it is the only implementation most
//! deployments exercise.
//!
//! ## Input/Output Specification
//! - **Input**: Free-text query, optional exact-match year filter
//! - **Output**: Ranked, truncated, score-stripped section list
//! - **Caching**: TTL result cache keyed by `(normalized query, year)`, and
//!   a per-letter listing cache; both lazily swept past a capacity bound
//!
//! ## Request flow
//! `START -> try remote -> [ok: RETURN] | [fail: check cache -> [hit: RETURN]
//! | [miss: load corpus -> score all -> sort -> truncate -> cache -> RETURN]]`

use crate::cache::{Clock, TtlMap};
use crate::config::Config;
use crate::corpus::{anchor_ordinal, CorpusStore};
use crate::errors::{Result, SearchError};
use crate::remote::RemoteIndex;
use crate::scoring::{score, QueryTerms};
use crate::Section;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Cache key for fallback search results
type ResultKey = (String, Option<i32>);

/// Main search orchestrator
pub struct SearchEngine {
    config: Arc<Config>,
    corpus: Arc<CorpusStore>,
    remote: RemoteIndex,
    result_cache: TtlMap<ResultKey, Vec<Section>>,
    letter_cache: TtlMap<i32, Vec<Section>>,
}

impl SearchEngine {
    pub fn new(
        config: Arc<Config>,
        corpus: Arc<CorpusStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let remote = RemoteIndex::new(config.remote_index.clone())?;
        Self::with_remote(config, corpus, remote, clock)
    }

    /// Construct with an explicit remote client; tests point this at a stub
    pub fn with_remote(
        config: Arc<Config>,
        corpus: Arc<CorpusStore>,
        remote: RemoteIndex,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let result_cache = TtlMap::new(
            Duration::from_secs(config.search.result_cache_ttl_seconds),
            config.search.result_cache_capacity,
            clock.clone(),
        );
        let letter_cache = TtlMap::new(
            Duration::from_secs(config.search.letter_cache_ttl_seconds),
            config.search.letter_cache_capacity,
            clock,
        );
        Ok(Self {
            config,
            corpus,
            remote,
            result_cache,
            letter_cache,
        })
    }

    /// Search the corpus. Remote failures of any kind are absorbed and
    /// recovered locally; they are never surfaced to the caller.
    ///
    /// Returns `Err(SearchError::NoContent)` when the corpus store itself is
    /// empty or missing, a condition distinct from zero matches.
    pub async fn search(&self, query: &str, year: Option<i32>) -> Result<Arc<Vec<Section>>> {
        let per_page = self.config.search.page_size;

        match self.remote.search_sections(query, year, per_page).await {
            Ok(hits) => {
                debug!("Remote index answered with {} hits", hits.len());
                return Ok(Arc::new(hits));
            }
            Err(failure) => {
                info!("Remote index unavailable ({}), using local fallback", failure);
            }
        }

        self.search_local(query, year).await
    }

    /// The complete local fallback: cache check, corpus scan, score, sort,
    /// truncate, cache store.
    async fn search_local(&self, query: &str, year: Option<i32>) -> Result<Arc<Vec<Section>>> {
        let terms = QueryTerms::parse(query);
        let key: ResultKey = (terms_key(query), year);

        if let Some(cached) = self.result_cache.get(&key) {
            debug!("Result cache hit for {:?}", key);
            return Ok(cached);
        }

        let snapshot = self.corpus.load_sections().await;
        if snapshot.is_empty() {
            warn!("Corpus store is empty; reporting no content");
            return Err(SearchError::NoContent);
        }

        let quota = self.config.search.early_exit_quota;
        let mut matches: Vec<(&Section, f64)> = Vec::new();

        for (section, text) in snapshot.iter() {
            if let Some(filter_year) = year {
                if section.year != filter_year {
                    continue;
                }
            }

            if let Some(s) = score(&terms, text) {
                matches.push((section, s));
            }

            // Latency guard for broad queries. A year filter implies the
            // caller wants the complete result set for that year, so the
            // early exit only applies to unfiltered scans.
            if year.is_none() && matches.len() >= quota {
                debug!("Early exit after {} raw matches", matches.len());
                break;
            }
        }

        // Deterministic ranking: score desc, then year desc, then original
        // corpus order via the stable sort.
        matches.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.0.year.cmp(&a.0.year))
        });

        let results: Vec<Section> = matches
            .into_iter()
            .take(self.config.search.page_size)
            .map(|(section, _)| section.clone())
            .collect();

        debug!(
            "Fallback search for {:?} produced {} results",
            key,
            results.len()
        );
        Ok(self.result_cache.insert(key, results))
    }

    /// All sections of one letter in anchor order, remote-first with local
    /// fallback and a per-year cache.
    pub async fn letter(&self, year: i32) -> Result<Arc<Vec<Section>>> {
        if let Some(cached) = self.letter_cache.get(&year) {
            return Ok(cached);
        }

        match self.remote.fetch_letter(year).await {
            Ok(mut hits) if !hits.is_empty() => {
                hits.sort_by_key(|s| anchor_ordinal(&s.anchor));
                return Ok(self.letter_cache.insert(year, hits));
            }
            Ok(_) => {
                debug!("Remote index has no sections for {}", year);
            }
            Err(failure) => {
                info!("Remote index unavailable ({}), using local fallback", failure);
            }
        }

        let sections = self.corpus.sections_for_year(year).await;
        if sections.is_empty() {
            return Err(SearchError::LetterNotFound { year });
        }
        Ok(self.letter_cache.insert(year, sections))
    }

    /// Cache observability for the stats endpoint
    pub fn cache_sizes(&self) -> (usize, usize) {
        (self.result_cache.len(), self.letter_cache.len())
    }
}

/// Normalize the cache key the same way the scorer normalizes phrases, so
/// whitespace variants of one query share an entry.
fn terms_key(raw: &str) -> String {
    raw.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
