//! # Corpus Store Module
//!
//! ## Purpose
//! Loads the full, flattened list of letter sections from the normalized
//! per-year JSONL files, plus the curated topic taxonomy, with time-boxed
//! process-wide caches so repeated requests do not re-read storage.
//!
//! ## Input/Output Specification
//! - **Input**: `letters_<year>.jsonl` files (one JSON section per line) and
//!   a `topics.json` taxonomy document
//! - **Output**: `Arc`-shared corpus snapshots and topic lists
//! - **Failure**: Missing or unreadable storage degrades to an empty corpus;
//!   the orchestrator turns that into a distinct no-content condition
//!
//! ## Key Features
//! - Per-line resilience: one malformed record never aborts a file
//! - Lowercased search texts derived once per load, cached beside the
//!   canonical records and never returned to callers
//! - Newest-year-first scan order
//! - Purely time-based invalidation, no file watching

use crate::cache::{Clock, TtlCell};
use crate::config::CorpusConfig;
use crate::{Section, Topic};
use serde::Deserialize;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// An immutable corpus snapshot: canonical sections plus the index-aligned
/// lowercased texts the scorer works on.
pub struct CorpusSnapshot {
    sections: Vec<Section>,
    search_texts: Vec<String>,
}

impl CorpusSnapshot {
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Iterate sections with their precomputed lowercased texts
    pub fn iter(&self) -> impl Iterator<Item = (&Section, &str)> {
        self.sections
            .iter()
            .zip(self.search_texts.iter().map(String::as_str))
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// Corpus store with TTL-cached section and taxonomy snapshots
pub struct CorpusStore {
    config: CorpusConfig,
    sections: TtlCell<CorpusSnapshot>,
    topics: TtlCell<Vec<Topic>>,
    loads: AtomicUsize,
}

impl CorpusStore {
    pub fn new(config: CorpusConfig, clock: Arc<dyn Clock>) -> Self {
        let sections = TtlCell::new(
            Duration::from_secs(config.cache_ttl_seconds),
            clock.clone(),
        );
        let topics = TtlCell::new(
            Duration::from_secs(config.topics_cache_ttl_seconds),
            clock,
        );
        Self {
            config,
            sections,
            topics,
            loads: AtomicUsize::new(0),
        }
    }

    /// Load all sections, served from cache within the TTL window.
    ///
    /// Never fails: storage-not-found and unreadable files degrade to an
    /// empty snapshot with a logged warning, so callers can report
    /// "no content available" distinctly from "zero results matched".
    pub async fn load_sections(&self) -> Arc<CorpusSnapshot> {
        if let Some(snapshot) = self.sections.get() {
            return snapshot;
        }
        let snapshot = self.read_all_sections().await;
        self.loads.fetch_add(1, Ordering::Relaxed);
        self.sections.put(snapshot)
    }

    /// Load the topic taxonomy, served from cache within its TTL window.
    /// An unreadable taxonomy degrades to an empty list.
    pub async fn load_topics(&self) -> Arc<Vec<Topic>> {
        if let Some(topics) = self.topics.get() {
            return topics;
        }
        let topics = self.read_topics().await;
        self.topics.put(topics)
    }

    /// All sections of one letter, sorted by the ordinal embedded in the
    /// anchor (letter order is governed by the anchor, not file order).
    pub async fn sections_for_year(&self, year: i32) -> Vec<Section> {
        let snapshot = self.load_sections().await;
        let mut sections: Vec<Section> = snapshot
            .sections()
            .iter()
            .filter(|s| s.year == year)
            .cloned()
            .collect();
        sections.sort_by_key(|s| anchor_ordinal(&s.anchor));
        sections
    }

    /// Number of storage reads performed so far. Cache-hit paths do not
    /// increment this; tests use it to assert the TTL window held.
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }

    async fn read_all_sections(&self) -> CorpusSnapshot {
        let mut files = match self.letter_files().await {
            Ok(files) => files,
            Err(e) => {
                warn!(
                    "Corpus directory {:?} unavailable: {}",
                    self.config.data_dir, e
                );
                return CorpusSnapshot {
                    sections: Vec::new(),
                    search_texts: Vec::new(),
                };
            }
        };

        // Newest letters first: the early-exit scan quota then favors
        // recent material, matching the browse experience.
        files.sort_by(|a, b| b.0.cmp(&a.0));

        let mut sections = Vec::new();
        for (year, path) in files {
            let content = match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(e) => {
                    error!("Failed to read corpus file {:?}: {}", path, e);
                    continue;
                }
            };
            parse_jsonl(&content, &path, &mut sections);
            debug!("Loaded letter year {} from {:?}", year, path);
        }

        let search_texts = sections.iter().map(|s| s.text.to_lowercase()).collect();
        debug!("Corpus snapshot loaded: {} sections", sections.len());
        CorpusSnapshot {
            sections,
            search_texts,
        }
    }

    /// Enumerate `letters_<year>.jsonl` files with their parsed years
    async fn letter_files(&self) -> std::io::Result<Vec<(i32, std::path::PathBuf)>> {
        let mut entries = tokio::fs::read_dir(&self.config.data_dir).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(year) = letter_file_year(name) {
                files.push((year, path));
            }
        }
        Ok(files)
    }

    async fn read_topics(&self) -> Vec<Topic> {
        #[derive(Deserialize)]
        struct TopicsFile {
            topics: Vec<Topic>,
        }

        let content = match tokio::fs::read_to_string(&self.config.topics_path).await {
            Ok(content) => content,
            Err(e) => {
                warn!(
                    "Topic taxonomy {:?} unavailable: {}",
                    self.config.topics_path, e
                );
                return Vec::new();
            }
        };

        match serde_json::from_str::<TopicsFile>(&content) {
            Ok(file) => file.topics,
            Err(e) => {
                error!(
                    "Failed to parse topic taxonomy {:?}: {}",
                    self.config.topics_path, e
                );
                Vec::new()
            }
        }
    }
}

/// Parse one JSONL file, skipping malformed lines individually
fn parse_jsonl(content: &str, path: &Path, out: &mut Vec<Section>) {
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Section>(line) {
            Ok(section) => out.push(section),
            Err(e) => {
                debug!("Skipping malformed record in {:?}: {}", path, e);
            }
        }
    }
}

/// Parse the year out of a `letters_<year>.jsonl` file name
fn letter_file_year(name: &str) -> Option<i32> {
    let year = name.strip_prefix("letters_")?.strip_suffix(".jsonl")?;
    if year.len() == 4 {
        year.parse().ok()
    } else {
        None
    }
}

/// Ordinal embedded in an anchor marker such as `"¶12"`
pub fn anchor_ordinal(anchor: &str) -> u32 {
    let digits: String = anchor.chars().filter(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use std::io::Write;

    fn write_fixture(dir: &Path, name: &str, lines: &[&str]) {
        let mut file = std::fs::File::create(dir.join(name)).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
    }

    fn section_line(year: i32, ordinal: u32, text: &str) -> String {
        format!(
            r#"{{"id":"{year}-¶{ordinal}","document_id":{year},"title":"{year} Letter","year":{year},"source":"letters","anchor":"¶{ordinal}","text":"{text}"}}"#
        )
    }

    fn store_for(dir: &Path) -> CorpusStore {
        let config = CorpusConfig {
            data_dir: dir.to_path_buf(),
            topics_path: dir.join("topics.json"),
            ..CorpusConfig::default()
        };
        CorpusStore::new(config, Arc::new(ManualClock::new()))
    }

    #[tokio::test]
    async fn test_malformed_line_skipped_individually() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(
            dir.path(),
            "letters_1999.jsonl",
            &[
                &section_line(1999, 1, "First paragraph."),
                "{not valid json",
                &section_line(1999, 2, "Second paragraph."),
            ],
        );

        let store = store_for(dir.path());
        let snapshot = store.load_sections().await;
        // One bad line among N valid ones yields exactly N sections.
        assert_eq!(snapshot.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_directory_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = CorpusConfig {
            data_dir: dir.path().join("does-not-exist"),
            topics_path: dir.path().join("topics.json"),
            ..CorpusConfig::default()
        };
        let store = CorpusStore::new(config, Arc::new(ManualClock::new()));
        assert!(store.load_sections().await.is_empty());
    }

    #[tokio::test]
    async fn test_cache_hit_returns_same_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(
            dir.path(),
            "letters_2007.jsonl",
            &[&section_line(2007, 1, "Our moat is deep and wide.")],
        );

        let store = store_for(dir.path());
        let first = store.load_sections().await;
        let second = store.load_sections().await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.loads(), 1);
    }

    #[tokio::test]
    async fn test_newest_year_scanned_first() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(
            dir.path(),
            "letters_1995.jsonl",
            &[&section_line(1995, 1, "Old letter.")],
        );
        write_fixture(
            dir.path(),
            "letters_2010.jsonl",
            &[&section_line(2010, 1, "New letter.")],
        );

        let store = store_for(dir.path());
        let snapshot = store.load_sections().await;
        assert_eq!(snapshot.sections()[0].year, 2010);
        assert_eq!(snapshot.sections()[1].year, 1995);
    }

    #[tokio::test]
    async fn test_letter_sorted_by_anchor_ordinal_not_file_order() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(
            dir.path(),
            "letters_1984.jsonl",
            &[
                &section_line(1984, 10, "Tenth."),
                &section_line(1984, 2, "Second."),
                &section_line(1984, 1, "First."),
            ],
        );

        let store = store_for(dir.path());
        let sections = store.sections_for_year(1984).await;
        let anchors: Vec<&str> = sections.iter().map(|s| s.anchor.as_str()).collect();
        assert_eq!(anchors, vec!["¶1", "¶2", "¶10"]);
    }

    #[tokio::test]
    async fn test_topics_parse_with_confidence_enum() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("topics.json"),
            r##"{"topics":[{"id":"t1","slug":"moats","name":"Moats","description":"Durable advantage","keywords":["moat"],"color":"#1f6f54","priority":1}]}"##,
        )
        .unwrap();
        write_fixture(
            dir.path(),
            "letters_2005.jsonl",
            &[r#"{"id":"2005-¶1","document_id":2005,"title":"2005 Letter","year":2005,"source":"letters","anchor":"¶1","text":"A moat.","topics":[{"topic_id":"t1","topic_name":"Moats","score":0.9,"matched_keywords":["moat"],"confidence":"high"}]}"#],
        );

        let store = store_for(dir.path());
        let topics = store.load_topics().await;
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].slug, "moats");

        let snapshot = store.load_sections().await;
        let assignment = snapshot.sections()[0].topics.as_ref().unwrap();
        assert_eq!(assignment[0].confidence, crate::Confidence::High);
    }

    #[test]
    fn test_letter_file_year() {
        assert_eq!(letter_file_year("letters_1987.jsonl"), Some(1987));
        assert_eq!(letter_file_year("letters_87.jsonl"), None);
        assert_eq!(letter_file_year("notes_1987.jsonl"), None);
        assert_eq!(letter_file_year("letters_1987.json"), None);
    }

    #[test]
    fn test_anchor_ordinal() {
        assert_eq!(anchor_ordinal("¶12"), 12);
        assert_eq!(anchor_ordinal("¶3"), 3);
        assert_eq!(anchor_ordinal("no-digits"), 0);
    }
}
