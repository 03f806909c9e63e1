//! # Utilities Module
//!
//! ## Purpose
//! Common utility functions and helpers used throughout the letters search
//! service for text handling, citation formatting, and performance
//! monitoring.
//!
//! ## Input/Output Specification
//! - **Input**: Various data types requiring common operations
//! - **Output**: Processed data, performance metrics, citation strings
//! - **Functions**: Text utilities, timing helpers, citation formatting

use crate::Section;
use std::time::Instant;

/// Performance timer for measuring operation duration
pub struct Timer {
    start: Instant,
    name: String,
}

/// Text processing utilities
pub struct TextUtils;

impl Timer {
    /// Start a new timer with a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Get elapsed time in milliseconds
    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Stop timer and log duration
    pub fn stop(self) -> u64 {
        let elapsed = self.elapsed_ms();
        tracing::debug!("Timer '{}' completed in {}ms", self.name, elapsed);
        elapsed
    }
}

impl TextUtils {
    /// Truncate text to specified length with ellipsis
    pub fn truncate(text: &str, max_length: usize) -> String {
        if text.len() <= max_length {
            text.to_string()
        } else {
            let cut = max_length.saturating_sub(3);
            let boundary = (0..=cut)
                .rev()
                .find(|&i| text.is_char_boundary(i))
                .unwrap_or(0);
            format!("{}...", &text[..boundary])
        }
    }

    /// Count words in text
    pub fn word_count(text: &str) -> usize {
        text.split_whitespace().count()
    }
}

/// Permalink for one section, stable across deployments of the same corpus
pub fn section_permalink(base_url: &str, section: &Section) -> String {
    format!(
        "{}/quote/{}/{}",
        base_url.trim_end_matches('/'),
        section.year,
        section.anchor
    )
}

/// Citation string for one section:
/// `"<text>" — Warren E. Buffett, <title>, <year>, <anchor>, <permalink>`
pub fn format_citation(base_url: &str, section: &Section) -> String {
    format!(
        "\"{}\" — Warren E. Buffett, {}, {}, {}, {}",
        section.text,
        section.title,
        section.year,
        section.anchor,
        section_permalink(base_url, section)
    )
}
