//! # Letters Search Service
//!
//! ## Overview
//! This library implements a content-browsing and search service over a fixed
//! corpus of Warren Buffett's shareholder letters. Queries go to a remote
//! full-text index first; when that collaborator is unreachable the service
//! falls back to a complete local relevance engine over the normalized corpus.
//!
//! ## Architecture
//! The system is composed of several key modules:
//! - `corpus`: Corpus loader for per-year JSONL section files and the topic taxonomy
//! - `scoring`: Relevance scorer for `(query, section)` pairs
//! - `remote`: Client for the remote full-text index
//! - `search`: Search orchestrator combining remote attempt, fallback, and result caching
//! - `wisdom`: Deterministic daily-wisdom and surprise-quote selection
//! - `api`: REST API endpoints
//! - `cache`: TTL cache primitives with injected clocks
//! - `config`: Configuration management and settings
//! - `errors`: Centralized error handling and types
//!
//! ## Input/Output Specification
//! - **Input**: Normalized letter sections (JSONL), free-text search queries
//! - **Output**: Ranked section lists with stable citation anchors
//! - **Performance**: Sub-second fallback queries, deterministic results
//!
//! ## Usage
//! ```rust,no_run
//! use letters_search::{config::Config, corpus::CorpusStore, search::SearchEngine};
//! use letters_search::cache::SystemClock;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Arc::new(Config::from_file("config.toml")?);
//!     let clock = Arc::new(SystemClock);
//!     let corpus = Arc::new(CorpusStore::new(config.corpus.clone(), clock.clone()));
//!     let engine = SearchEngine::new(config, corpus, clock)?;
//!     let hits = engine.search("circle of competence", None).await?;
//!     println!("Found {} results", hits.len());
//!     Ok(())
//! }
//! ```

// Core modules
pub mod api;
pub mod cache;
pub mod config;
pub mod corpus;
pub mod errors;
pub mod remote;
pub mod scoring;
pub mod search;
pub mod wisdom;

// Utilities
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use errors::{Result, SearchError};
pub use search::SearchEngine;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A single citable paragraph-level unit of text from a source letter.
///
/// Sections are read-only projections of the normalized corpus files; `text`
/// is never mutated after load. Extra fields present in stored records
/// (checksums, parser version) are tolerated and ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    /// Unique section identifier (e.g. `"2007-¶12"`)
    pub id: String,
    /// Parent letter identifier
    pub document_id: i64,
    /// Display title of the source letter
    pub title: String,
    /// Publication year
    pub year: i32,
    /// Corpus origin tag (e.g. `"letters"`)
    pub source: String,
    /// Paragraph-level citation marker, unique within a letter
    pub anchor: String,
    /// The quoted passage
    pub text: String,
    /// Topic assignments, when the tagging pass has run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topics: Option<Vec<TopicAssignment>>,
}

/// One topic assigned to a section by the tagging pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicAssignment {
    pub topic_id: String,
    pub topic_name: String,
    /// Assignment relevance score
    pub score: f64,
    pub matched_keywords: Vec<String>,
    pub confidence: Confidence,
}

/// Confidence tier of a topic assignment.
///
/// Modeled as a closed enumeration so a typo in stored data fails that
/// record's parse instead of silently disabling scoring bonuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// A topic from the curated taxonomy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    /// URL-safe identifier
    pub slug: String,
    pub name: String,
    pub description: String,
    pub keywords: Vec<String>,
    /// Display hint, irrelevant to scoring
    pub color: String,
    /// Lower value = more prominent
    pub priority: i32,
}

/// Application state shared across components
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Config>,
    pub search_engine: Arc<search::SearchEngine>,
    pub wisdom_engine: Arc<wisdom::WisdomEngine>,
    pub corpus: Arc<corpus::CorpusStore>,
}
