//! # Remote Index Client Module
//!
//! ## Purpose
//! Client for the external full-text search index (Typesense-shaped HTTP
//! contract). The orchestrator tries this collaborator first on every
//! request; absence or unreachability is the normal trigger for the local
//! fallback path, not a rare edge case.
//!
//! ## Input/Output Specification
//! - **Input**: Query text, field to search, result cap, conjunctive filter
//!   expression (`field:=value && field:=value`)
//! - **Output**: `{hits: [{document}]}` unwrapped into `Section` records,
//!   already ranked by the remote engine
//! - **Failure**: A closed [`RemoteFailure`] taxonomy (timeout, transport,
//!   non-2xx, malformed body) so the fallback trigger is explicit and
//!   independently testable rather than a catch-all

use crate::config::RemoteIndexConfig;
use crate::Section;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Why a remote attempt did not produce hits. Every variant triggers the
/// local fallback; none is surfaced to callers.
#[derive(Debug)]
pub enum RemoteFailure {
    /// The bounded request timeout elapsed; treated exactly like a failure
    Timeout,
    /// Connection-level error (refused, DNS, TLS, aborted)
    Transport(String),
    /// The index answered with a non-success status
    Status(u16),
    /// The index answered 2xx but the body did not parse
    MalformedBody(String),
}

impl std::fmt::Display for RemoteFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteFailure::Timeout => write!(f, "request timed out"),
            RemoteFailure::Transport(details) => write!(f, "transport error: {}", details),
            RemoteFailure::Status(code) => write!(f, "unexpected status {}", code),
            RemoteFailure::MalformedBody(details) => write!(f, "malformed body: {}", details),
        }
    }
}

#[derive(Debug, Serialize)]
struct RemoteQuery<'a> {
    q: &'a str,
    query_by: &'a str,
    per_page: usize,
    filter_by: String,
}

#[derive(Debug, Deserialize)]
struct RemoteResponse {
    #[serde(default)]
    hits: Vec<RemoteHit>,
}

#[derive(Debug, Deserialize)]
struct RemoteHit {
    document: Section,
}

/// Client for the remote section index
pub struct RemoteIndex {
    client: reqwest::Client,
    config: RemoteIndexConfig,
}

impl RemoteIndex {
    pub fn new(config: RemoteIndexConfig) -> crate::errors::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self { client, config })
    }

    /// Build the client against an explicit base URL, for tests that stand
    /// in for the index
    #[cfg(test)]
    pub fn with_base_url(mut config: RemoteIndexConfig, base_url: &str) -> Self {
        let url = url_parts(base_url);
        config.protocol = url.0;
        config.host = url.1;
        config.port = url.2;
        Self::new(config).expect("client build")
    }

    /// Ranked hits for a free-text query, optionally narrowed to one year
    pub async fn search_sections(
        &self,
        query: &str,
        year: Option<i32>,
        per_page: usize,
    ) -> Result<Vec<Section>, RemoteFailure> {
        let mut filter_by = "source:=letters".to_string();
        if let Some(year) = year {
            filter_by.push_str(&format!(" && year:={}", year));
        }
        self.request(RemoteQuery {
            q: query,
            query_by: "text",
            per_page,
            filter_by,
        })
        .await
    }

    /// Every section of one letter (match-all query narrowed to the year)
    pub async fn fetch_letter(&self, year: i32) -> Result<Vec<Section>, RemoteFailure> {
        self.request(RemoteQuery {
            q: "*",
            query_by: "text",
            per_page: self.config.letter_page_size,
            filter_by: format!("source:=letters && year:={}", year),
        })
        .await
    }

    async fn request(&self, body: RemoteQuery<'_>) -> Result<Vec<Section>, RemoteFailure> {
        let url = format!(
            "{}://{}:{}/collections/{}/documents/search",
            self.config.protocol, self.config.host, self.config.port, self.config.collection
        );

        let response = self
            .client
            .post(&url)
            .header("X-TYPESENSE-API-KEY", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RemoteFailure::Timeout
                } else {
                    RemoteFailure::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteFailure::Status(status.as_u16()));
        }

        let parsed: RemoteResponse = response
            .json()
            .await
            .map_err(|e| RemoteFailure::MalformedBody(e.to_string()))?;

        debug!("Remote index returned {} hits", parsed.hits.len());
        Ok(parsed.hits.into_iter().map(|h| h.document).collect())
    }
}

#[cfg(test)]
fn url_parts(base_url: &str) -> (String, String, u16) {
    let (protocol, rest) = base_url
        .split_once("://")
        .expect("base url with scheme");
    let rest = rest.trim_end_matches('/');
    let (host, port) = rest.split_once(':').expect("base url with port");
    (
        protocol.to_string(),
        host.to_string(),
        port.parse().expect("numeric port"),
    )
}
