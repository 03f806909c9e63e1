//! # Relevance Scoring Module
//!
//! ## Purpose
//! Assigns a relevance score to a `(query, section)` pair such that sorting
//! candidates by descending score yields useful results, with an admission
//! threshold that excludes clearly irrelevant sections before sorting.
//!
//! ## Input/Output Specification
//! - **Input**: A parsed query and a section's precomputed lowercased text
//! - **Output**: `Some(score)` for admitted candidates, `None` for excluded
//! - **Determinism**: Pure function of its inputs; no clock, no randomness
//!
//! ## Scoring model
//! Queries tokenize on whitespace; tokens of length <= 2 are noise and
//! discarded. A candidate containing every remaining token is an all-terms
//! match and scores from a per-token base plus phrase, position, frequency,
//! and brevity bonuses. A candidate matching at least 70% of distinct tokens
//! is a partial match with a lower, bonus-free score. Anything below the
//! partial bar is excluded.

/// Base score per matched token on an all-terms match
const TOKEN_MATCH_SCORE: f64 = 5.0;
/// Bonus when the exact query phrase appears verbatim
const PHRASE_BONUS: f64 = 20.0;
/// Positional bonus when the first token appears very early
const EARLY_POSITION_BONUS: f64 = 10.0;
const EARLY_POSITION_CUTOFF: usize = 50;
/// Smaller positional bonus for a moderately early first token
const NEAR_POSITION_BONUS: f64 = 5.0;
const NEAR_POSITION_CUTOFF: usize = 200;
/// Bonus for short, focused passages
const SHORT_TEXT_BONUS: f64 = 3.0;
const SHORT_TEXT_CUTOFF: usize = 500;
/// Base score per matched token on a partial match
const PARTIAL_TOKEN_SCORE: f64 = 2.0;
/// Fraction of distinct tokens a partial match must reach
const PARTIAL_MATCH_FRACTION: f64 = 0.7;
/// Anchored score when a noise-only query is found at the start of the text
const RAW_ANCHORED_SCORE: f64 = 15.0;
/// Score when a noise-only query is found elsewhere in the text
const RAW_CONTAINED_SCORE: f64 = 10.0;
/// Tokens at or below this length carry no signal
const NOISE_TOKEN_LENGTH: usize = 2;

/// A query parsed once and scored against many candidates
#[derive(Debug, Clone)]
pub struct QueryTerms {
    /// Lowercased query with whitespace runs collapsed, for phrase checks
    normalized: String,
    /// Effective search tokens (length > 2), lowercased
    tokens: Vec<String>,
}

impl QueryTerms {
    pub fn parse(query: &str) -> Self {
        let lowered = query.to_lowercase();
        let words: Vec<&str> = lowered.split_whitespace().collect();
        let normalized = words.join(" ");
        let tokens = words
            .iter()
            .filter(|w| w.len() > NOISE_TOKEN_LENGTH)
            .map(|w| w.to_string())
            .collect();
        Self { normalized, tokens }
    }

    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }
}

/// Score one candidate text against a parsed query.
///
/// `text` must already be lowercased; the corpus snapshot carries these
/// derived copies so the canonical records stay untouched.
pub fn score(terms: &QueryTerms, text: &str) -> Option<f64> {
    // Empty query: browse-all at a uniform baseline.
    if terms.is_empty() {
        return Some(0.0);
    }

    // Every token was noise: fall back to substring containment on the raw
    // normalized query rather than matching everything.
    if terms.tokens.is_empty() {
        return match text.find(&terms.normalized) {
            Some(0) => Some(RAW_ANCHORED_SCORE),
            Some(_) => Some(RAW_CONTAINED_SCORE),
            None => None,
        };
    }

    let counts: Vec<usize> = terms
        .tokens
        .iter()
        .map(|token| text.matches(token.as_str()).count())
        .collect();
    let matched = counts.iter().filter(|&&c| c > 0).count();

    if matched == terms.tokens.len() {
        let mut score = TOKEN_MATCH_SCORE * matched as f64;

        if text.contains(&terms.normalized) {
            score += PHRASE_BONUS;
        }

        // Diminishing positional bonus on the first token, with a hard
        // cutoff beyond which position carries no weight.
        if let Some(index) = text.find(terms.tokens[0].as_str()) {
            if index < EARLY_POSITION_CUTOFF {
                score += EARLY_POSITION_BONUS;
            } else if index < NEAR_POSITION_CUTOFF {
                score += NEAR_POSITION_BONUS;
            }
        }

        score += counts.iter().sum::<usize>() as f64;

        if text.len() < SHORT_TEXT_CUTOFF {
            score += SHORT_TEXT_BONUS;
        }

        Some(score)
    } else if matched as f64 >= (terms.tokens.len() as f64 * PARTIAL_MATCH_FRACTION).ceil() {
        Some(PARTIAL_TOKEN_SCORE * matched as f64)
    } else {
        None
    }
}
