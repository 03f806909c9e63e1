//! # Quote Selection Module
//!
//! ## Purpose
//! Deterministic daily-wisdom and surprise-quote selection over the letter
//! corpus. All randomness is derived from an explicit string key (a calendar
//! date or a request nonce), never from the wall clock, so repeated calls on
//! the same key return the same selection.
//!
//! ## Input/Output Specification
//! - **Input**: Corpus snapshot, topic taxonomy, a selection key
//! - **Output**: One scored section with its primary topic and pool sizes
//! - **Determinism**: Same key and corpus snapshot, same selection
//!
//! ## Key Features
//! - Quality scoring that favors focused, quotable passages
//! - Topic-priority and confidence-weighted boosts
//! - Seeded jitter for day-to-day variety within the quality band
//! - Per-date memoization with bounded retention

use crate::cache::{Clock, TtlMap};
use crate::config::WisdomConfig;
use crate::corpus::CorpusStore;
use crate::errors::{Result, SearchError};
use crate::{Confidence, Section, Topic};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Length band preferences for daily wisdom
const WISDOM_IDEAL_RANGE: (usize, usize) = (100, 800);
const WISDOM_ACCEPTABLE_RANGE: (usize, usize) = (50, 1200);

/// Length band preferences for surprise quotes (tighter: punchier passages)
const SURPRISE_IDEAL_RANGE: (usize, usize) = (80, 600);
const SURPRISE_ACCEPTABLE_RANGE: (usize, usize) = (50, 800);

/// Keywords that mark reflective, quotable writing
const WISDOM_KEYWORDS: &[&str] = &[
    "principle",
    "rule",
    "important",
    "remember",
    "never",
    "always",
    "lesson",
    "learn",
    "believe",
    "think",
    "philosophy",
    "approach",
    "key",
    "fundamental",
    "essential",
    "crucial",
    "vital",
];

/// Extra keywords the surprise selector rewards
const SURPRISE_KEYWORDS: &[&str] = &[
    "surprising",
    "unexpected",
    "remarkable",
    "extraordinary",
    "unusual",
    "counter-intuitive",
    "paradox",
    "irony",
    "mistake",
    "wrong",
    "foolish",
    "brilliant",
    "genius",
    "secret",
    "wise",
    "understand",
    "realize",
];

/// Markers of dense financial reporting, penalized in both selectors
const TECHNICAL_INDICATORS: &[&str] = &[
    "table",
    "million",
    "billion",
    "percent",
    "%",
    "gaap",
    "earnings",
    "sec filing",
    "footnote",
    "depreciation",
    "amortization",
];

/// Deterministic generator seeded from a string key.
///
/// A pure function of the key: no wall-clock or OS entropy anywhere, so a
/// calendar date or request nonce fully determines the sequence.
pub struct SeededRng {
    state: i64,
}

impl SeededRng {
    pub fn from_key(key: &str) -> Self {
        let mut hash: i32 = 0;
        for c in key.chars() {
            hash = hash
                .wrapping_shl(5)
                .wrapping_sub(hash)
                .wrapping_add(c as i32);
        }
        Self { state: hash as i64 }
    }

    /// Next value in `[0, 1)`
    pub fn next_f64(&mut self) -> f64 {
        self.state = (self.state.wrapping_mul(9301).wrapping_add(49297)).rem_euclid(233_280);
        self.state as f64 / 233_280.0
    }

    /// Uniform index below `bound` (`bound` must be non-zero)
    pub fn next_index(&mut self, bound: usize) -> usize {
        ((self.next_f64() * bound as f64) as usize).min(bound - 1)
    }
}

/// A selected quote with its selection context
#[derive(Debug, Clone, Serialize)]
pub struct Selection {
    pub section: Section,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_topic: Option<Topic>,
    pub selection_pool_size: usize,
    pub total_sections: usize,
}

/// Daily-wisdom and surprise-quote selection engine
pub struct WisdomEngine {
    config: WisdomConfig,
    corpus: Arc<CorpusStore>,
    daily_memo: TtlMap<String, Selection>,
}

impl WisdomEngine {
    pub fn new(config: WisdomConfig, corpus: Arc<CorpusStore>, clock: Arc<dyn Clock>) -> Self {
        let retention = Duration::from_secs(config.memo_retention_days * 24 * 60 * 60);
        let daily_memo = TtlMap::new(retention, 32, clock);
        Self {
            config,
            corpus,
            daily_memo,
        }
    }

    /// The wisdom selection for one calendar date key (`YYYY-MM-DD`).
    ///
    /// Memoized per date; repeated calls within the retention window return
    /// the cached selection without re-scoring.
    pub async fn daily(&self, date_key: &str) -> Result<Arc<Selection>> {
        if let Some(memo) = self.daily_memo.get(&date_key.to_string()) {
            return Ok(memo);
        }

        let snapshot = self.corpus.load_sections().await;
        if snapshot.is_empty() {
            return Err(SearchError::NoContent);
        }
        let topics = self.corpus.load_topics().await;

        let mut rng = SeededRng::from_key(date_key);
        let mut candidates: Vec<(&Section, f64)> = snapshot
            .sections()
            .iter()
            .map(|s| {
                let jitter = (rng.next_f64() - 0.5) * 10.0;
                (s, wisdom_score(s, &topics) + jitter)
            })
            .filter(|(_, score)| *score > self.config.min_quality_score)
            .collect();

        if candidates.is_empty() {
            return Err(SearchError::NoQuoteAvailable);
        }

        candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        let pool = candidates.len();
        let top = &candidates[..self.config.candidate_pool.min(pool)];
        let (section, score) = top[rng.next_index(top.len())];

        debug!("Daily wisdom for {}: {} ({:.1})", date_key, section.id, score);
        let selection = Selection {
            section: section.clone(),
            score,
            primary_topic: primary_topic(section, &topics),
            selection_pool_size: pool,
            total_sections: snapshot.len(),
        };
        Ok(self.daily_memo.insert(date_key.to_string(), selection))
    }

    /// A surprise quote for an explicit nonce key, optionally narrowed to a
    /// topic and a minimum quality score.
    pub async fn surprise(
        &self,
        nonce: &str,
        topic_filter: Option<&str>,
        min_score: Option<f64>,
    ) -> Result<Selection> {
        let snapshot = self.corpus.load_sections().await;
        if snapshot.is_empty() {
            return Err(SearchError::NoContent);
        }
        let topics = self.corpus.load_topics().await;
        let min_score = min_score.unwrap_or(self.config.surprise_min_score);

        let mut candidates: Vec<(&Section, f64)> = snapshot
            .sections()
            .iter()
            .filter(|s| match topic_filter {
                Some(filter) => section_matches_topic(s, filter),
                None => true,
            })
            .map(|s| (s, surprise_score(s, &topics)))
            .filter(|(_, score)| *score >= min_score)
            .collect();

        if candidates.is_empty() {
            return Err(SearchError::NoQuoteAvailable);
        }

        candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        let pool = candidates.len();
        let top_count = ((pool as f64 * self.config.surprise_top_fraction) as usize).max(1);
        let top = &candidates[..top_count];

        let mut rng = SeededRng::from_key(nonce);
        let (section, score) = top[rng.next_index(top.len())];

        Ok(Selection {
            section: section.clone(),
            score,
            primary_topic: primary_topic(section, &topics),
            selection_pool_size: pool,
            total_sections: snapshot.len(),
        })
    }
}

/// Quality score for the daily-wisdom pool
fn wisdom_score(section: &Section, topics: &[Topic]) -> f64 {
    let mut score = length_band_score(
        section.text.len(),
        WISDOM_IDEAL_RANGE,
        WISDOM_ACCEPTABLE_RANGE,
        20.0,
        10.0,
        -10.0,
        -5.0,
    );

    if let Some(assignments) = &section.topics {
        for assignment in assignments {
            if let Some(topic) = topics.iter().find(|t| t.id == assignment.topic_id) {
                let boost = match topic.priority {
                    1 => 15.0,
                    2 => 10.0,
                    _ => 5.0,
                };
                score += boost * confidence_multiplier(assignment.confidence);
            }
        }
    }

    let text = section.text.to_lowercase();
    if ends_as_sentence(&text) {
        score += 5.0;
    }
    score += 3.0 * keyword_hits(&text, WISDOM_KEYWORDS) as f64;
    score -= 2.0 * keyword_hits(&text, TECHNICAL_INDICATORS) as f64;

    score
}

/// Quality score for the surprise pool
fn surprise_score(section: &Section, topics: &[Topic]) -> f64 {
    let mut score = length_band_score(
        section.text.len(),
        SURPRISE_IDEAL_RANGE,
        SURPRISE_ACCEPTABLE_RANGE,
        25.0,
        15.0,
        -15.0,
        -10.0,
    );

    if let Some(assignments) = &section.topics {
        let high_confidence = assignments
            .iter()
            .filter(|a| a.confidence == Confidence::High)
            .count();
        score += 8.0 * high_confidence as f64;
        for assignment in assignments {
            if let Some(topic) = topics.iter().find(|t| t.id == assignment.topic_id) {
                if topic.priority == 1 {
                    score += 10.0;
                }
            }
        }
    }

    let text = section.text.to_lowercase();
    if ends_as_sentence(&text) {
        score += 10.0;
    }
    score += 5.0 * keyword_hits(&text, WISDOM_KEYWORDS) as f64;
    score += 8.0 * keyword_hits(&text, SURPRISE_KEYWORDS) as f64;
    score -= 5.0 * keyword_hits(&text, TECHNICAL_INDICATORS) as f64;

    score
}

fn length_band_score(
    len: usize,
    ideal: (usize, usize),
    acceptable: (usize, usize),
    ideal_bonus: f64,
    acceptable_bonus: f64,
    too_short_penalty: f64,
    too_long_penalty: f64,
) -> f64 {
    if len >= ideal.0 && len <= ideal.1 {
        ideal_bonus
    } else if len >= acceptable.0 && len <= acceptable.1 {
        acceptable_bonus
    } else if len < acceptable.0 {
        too_short_penalty
    } else {
        too_long_penalty
    }
}

fn confidence_multiplier(confidence: Confidence) -> f64 {
    match confidence {
        Confidence::High => 1.5,
        Confidence::Medium => 1.0,
        Confidence::Low => 0.7,
    }
}

fn ends_as_sentence(text: &str) -> bool {
    let trimmed = text.trim_end();
    trimmed.ends_with('.') || trimmed.ends_with('!') || trimmed.ends_with('?')
}

fn keyword_hits(text: &str, keywords: &[&str]) -> usize {
    keywords.iter().filter(|k| text.contains(*k)).count()
}

/// Highest-scoring topic assignment resolved against the taxonomy
fn primary_topic(section: &Section, topics: &[Topic]) -> Option<Topic> {
    let assignments = section.topics.as_ref()?;
    let best = assignments
        .iter()
        .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal))?;
    topics.iter().find(|t| t.id == best.topic_id).cloned()
}

fn section_matches_topic(section: &Section, filter: &str) -> bool {
    let filter_lower = filter.to_lowercase();
    section.topics.as_ref().is_some_and(|assignments| {
        assignments.iter().any(|a| {
            a.topic_id == filter || a.topic_name.to_lowercase().contains(&filter_lower)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::config::CorpusConfig;
    use std::io::Write;

    #[test]
    fn test_seeded_rng_is_reproducible_per_key() {
        let mut a = SeededRng::from_key("2024-03-01");
        let mut b = SeededRng::from_key("2024-03-01");
        for _ in 0..20 {
            assert_eq!(a.next_f64(), b.next_f64());
        }
    }

    #[test]
    fn test_seeded_rng_differs_across_keys() {
        let mut a = SeededRng::from_key("2024-03-01");
        let mut b = SeededRng::from_key("2024-03-02");
        let seq_a: Vec<f64> = (0..5).map(|_| a.next_f64()).collect();
        let seq_b: Vec<f64> = (0..5).map(|_| b.next_f64()).collect();
        assert_ne!(seq_a, seq_b);
    }

    #[test]
    fn test_rng_values_stay_in_unit_interval() {
        let mut rng = SeededRng::from_key("bounds");
        for _ in 0..1000 {
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn test_quotable_passage_outscores_financial_table() {
        let quotable = section_with_text(
            "The most important lesson: never lose sight of the principle that \
             price is what you pay and value is what you get. Always remember it.",
        );
        let technical = section_with_text(
            "Depreciation and amortization totaled a number best shown in the \
             table: earnings per GAAP of several million against a billion in float.",
        );
        assert!(wisdom_score(&quotable, &[]) > wisdom_score(&technical, &[]));
    }

    #[test]
    fn test_topic_priority_and_confidence_boost() {
        let topics = vec![Topic {
            id: "t1".to_string(),
            slug: "temperament".to_string(),
            name: "Temperament".to_string(),
            description: "Investor psychology".to_string(),
            keywords: vec!["temperament".to_string()],
            color: "#1f6f54".to_string(),
            priority: 1,
        }];

        let plain = section_with_text("A principle worth keeping in mind, always.");
        let mut tagged = plain.clone();
        tagged.topics = Some(vec![crate::TopicAssignment {
            topic_id: "t1".to_string(),
            topic_name: "Temperament".to_string(),
            score: 0.9,
            matched_keywords: vec!["temperament".to_string()],
            confidence: Confidence::High,
        }]);

        assert!(wisdom_score(&tagged, &topics) > wisdom_score(&plain, &topics));
    }

    #[tokio::test]
    async fn test_daily_selection_memoized_per_date() {
        let (engine, _dir) = engine_with_quotes().await;
        let first = engine.daily("2024-03-01").await.unwrap();
        let second = engine.daily("2024-03-01").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        // A different date may pick differently but must succeed and be
        // internally deterministic.
        let other = engine.daily("2024-03-02").await.unwrap();
        let other_again = engine.daily("2024-03-02").await.unwrap();
        assert_eq!(other.section.id, other_again.section.id);
    }

    #[tokio::test]
    async fn test_surprise_topic_filter_restricts_pool() {
        let (engine, _dir) = engine_with_quotes().await;
        let picked = engine
            .surprise("nonce-1", Some("moats"), Some(0.0))
            .await
            .unwrap();
        assert!(section_matches_topic(&picked.section, "moats"));

        assert!(matches!(
            engine.surprise("nonce-1", Some("no-such-topic"), Some(0.0)).await,
            Err(SearchError::NoQuoteAvailable)
        ));
    }

    #[tokio::test]
    async fn test_empty_corpus_reports_no_content() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new());
        let corpus = Arc::new(CorpusStore::new(
            CorpusConfig {
                data_dir: dir.path().to_path_buf(),
                topics_path: dir.path().join("topics.json"),
                ..CorpusConfig::default()
            },
            clock.clone() as Arc<dyn Clock>,
        ));
        let engine = WisdomEngine::new(
            crate::config::WisdomConfig::default(),
            corpus,
            clock as Arc<dyn Clock>,
        );
        assert!(matches!(
            engine.daily("2024-03-01").await,
            Err(SearchError::NoContent)
        ));
    }

    fn section_with_text(text: &str) -> Section {
        Section {
            id: "2001-¶1".to_string(),
            document_id: 2001,
            title: "2001 Letter".to_string(),
            year: 2001,
            source: "letters".to_string(),
            anchor: "¶1".to_string(),
            text: text.to_string(),
            topics: None,
        }
    }

    async fn engine_with_quotes() -> (WisdomEngine, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("letters_2001.jsonl")).unwrap();
        let quote = "The most important lesson to learn and remember: a durable \
                     principle always beats a clever forecast, and the key rule \
                     is to think for yourself.";
        for i in 1..=6 {
            let topics = if i <= 2 {
                r#","topics":[{"topic_id":"t1","topic_name":"Moats","score":0.8,"matched_keywords":["moat"],"confidence":"high"}]"#
            } else {
                ""
            };
            writeln!(
                file,
                r#"{{"id":"2001-¶{i}","document_id":2001,"title":"2001 Letter","year":2001,"source":"letters","anchor":"¶{i}","text":"{quote} Variant {i}."{topics}}}"#
            )
            .unwrap();
        }
        std::fs::write(
            dir.path().join("topics.json"),
            r##"{"topics":[{"id":"t1","slug":"moats","name":"Moats","description":"Durable advantage","keywords":["moat"],"color":"#1f6f54","priority":1}]}"##,
        )
        .unwrap();

        let clock = Arc::new(ManualClock::new());
        let corpus = Arc::new(CorpusStore::new(
            CorpusConfig {
                data_dir: dir.path().to_path_buf(),
                topics_path: dir.path().join("topics.json"),
                ..CorpusConfig::default()
            },
            clock.clone() as Arc<dyn Clock>,
        ));
        let engine = WisdomEngine::new(
            crate::config::WisdomConfig::default(),
            corpus,
            clock as Arc<dyn Clock>,
        );
        (engine, dir)
    }
}
