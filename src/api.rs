//! # API Server Module
//!
//! ## Purpose
//! REST API server exposing the read endpoints of the letters search
//! service: search, per-letter browsing, topic browsing, and the quote
//! selection features.
//!
//! ## Input/Output Specification
//! - **Input**: HTTP requests with query text, filters, pagination
//! - **Output**: JSON envelopes with sections, topics, selections
//! - **Endpoints**: Search, letters, topics, daily wisdom, surprise, health, stats
//!
//! ## Key Features
//! - Parameter validation rejected before any scoring work begins
//! - CORS support for web frontends
//! - Structured error responses that never leak internal detail

use crate::errors::SearchError;
use crate::utils::{format_citation, Timer};
use crate::{AppState, Confidence, Section};
use actix_cors::Cors;
use actix_web::{web, App, HttpResponse, HttpServer, Result as ActixResult};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;

/// API server wrapping the shared application state
pub struct ApiServer {
    app_state: AppState,
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: Option<String>,
    year: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TopicSectionParams {
    limit: Option<String>,
    offset: Option<String>,
    min_score: Option<String>,
    confidence: Option<String>,
    year: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WisdomParams {
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SurpriseParams {
    topic: Option<String>,
    min_score: Option<String>,
    seed: Option<String>,
}

impl ApiServer {
    /// Create new API server
    pub fn new(app_state: AppState) -> Self {
        Self { app_state }
    }

    /// Run the API server
    pub async fn run(self) -> crate::errors::Result<()> {
        let bind_addr = format!(
            "{}:{}",
            self.app_state.config.server.host, self.app_state.config.server.port
        );
        let enable_cors = self.app_state.config.server.enable_cors;

        tracing::info!("Starting API server on {}", bind_addr);

        let app_state = self.app_state;
        let server = HttpServer::new(move || {
            let cors = if enable_cors {
                Cors::permissive()
            } else {
                Cors::default()
            };
            App::new()
                .wrap(cors)
                .app_data(web::Data::new(app_state.clone()))
                .route("/search", web::get().to(search_handler))
                .route("/letters/{year}", web::get().to(letter_handler))
                .route("/topics", web::get().to(topics_handler))
                .route("/topics/{slug}", web::get().to(topic_sections_handler))
                .route("/daily-wisdom", web::get().to(daily_wisdom_handler))
                .route("/surprise-me", web::get().to(surprise_handler))
                .route("/health", web::get().to(health_handler))
                .route("/stats", web::get().to(stats_handler))
        })
        .bind(&bind_addr)
        .map_err(|e| SearchError::Internal {
            message: format!("Failed to bind server to {}: {}", bind_addr, e),
        })?
        .run();

        server.await.map_err(|e| SearchError::Internal {
            message: format!("Server error: {}", e),
        })?;

        Ok(())
    }
}

/// Map a service error onto the external response contract. Internal
/// failures surface as a generic signal; detail stays in the logs.
fn error_response(err: &SearchError) -> HttpResponse {
    match err {
        SearchError::NoContent => {
            HttpResponse::ServiceUnavailable().json(json!({ "error": "no_content_available" }))
        }
        SearchError::LetterNotFound { .. } => {
            HttpResponse::NotFound().json(json!({ "error": "letter_not_found" }))
        }
        SearchError::TopicNotFound { .. } => {
            HttpResponse::NotFound().json(json!({ "error": "topic_not_found" }))
        }
        SearchError::NoQuoteAvailable => {
            HttpResponse::NotFound().json(json!({ "error": "no_suitable_quote" }))
        }
        SearchError::InvalidParameter { .. } | SearchError::ValidationFailed { .. } => {
            HttpResponse::BadRequest()
                .json(json!({ "error": "invalid_request", "message": err.to_string() }))
        }
        _ => {
            tracing::error!("Request failed ({}): {}", err.category(), err);
            HttpResponse::InternalServerError().json(json!({ "error": "search_failed" }))
        }
    }
}

fn parse_year(raw: &str) -> Result<i32, SearchError> {
    raw.parse().map_err(|_| SearchError::InvalidParameter {
        param: "year".to_string(),
        reason: format!("'{}' is not a valid year", raw),
    })
}

fn parse_number<T: std::str::FromStr>(raw: &str, param: &str) -> Result<T, SearchError> {
    raw.parse().map_err(|_| SearchError::InvalidParameter {
        param: param.to_string(),
        reason: format!("'{}' is not a valid number", raw),
    })
}

/// Search endpoint: free-text query with an optional exact year filter
async fn search_handler(
    app_state: web::Data<AppState>,
    params: web::Query<SearchParams>,
) -> ActixResult<HttpResponse> {
    let timer = Timer::new("search");
    let query = params.q.as_deref().unwrap_or("");

    let year = match params.year.as_deref().map(parse_year).transpose() {
        Ok(year) => year,
        Err(e) => return Ok(error_response(&e)),
    };

    let response = match app_state.search_engine.search(query, year).await {
        Ok(hits) => HttpResponse::Ok().json(json!({ "hits": &*hits })),
        Err(e) => error_response(&e),
    };
    timer.stop();
    Ok(response)
}

/// Letter listing endpoint: every section of one year in anchor order
async fn letter_handler(
    app_state: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<HttpResponse> {
    let year = match parse_year(&path.into_inner()) {
        Ok(year) => year,
        Err(e) => return Ok(error_response(&e)),
    };

    Ok(match app_state.search_engine.letter(year).await {
        Ok(sections) => HttpResponse::Ok().json(json!({ "sections": &*sections })),
        Err(e) => error_response(&e),
    })
}

/// Topic taxonomy endpoint, sorted by priority then name
async fn topics_handler(app_state: web::Data<AppState>) -> ActixResult<HttpResponse> {
    let topics = app_state.corpus.load_topics().await;
    let mut sorted = (*topics).clone();
    sorted.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));
    let count = sorted.len();
    Ok(HttpResponse::Ok().json(json!({ "topics": sorted, "count": count })))
}

/// Sections assigned to one topic, filtered and paginated
async fn topic_sections_handler(
    app_state: web::Data<AppState>,
    path: web::Path<String>,
    params: web::Query<TopicSectionParams>,
) -> ActixResult<HttpResponse> {
    let slug = path.into_inner();

    let parsed = (|| -> Result<(usize, usize, f64, Option<Confidence>, Option<i32>), SearchError> {
        let limit = params
            .limit
            .as_deref()
            .map(|v| parse_number::<usize>(v, "limit"))
            .transpose()?
            .unwrap_or(50);
        let offset = params
            .offset
            .as_deref()
            .map(|v| parse_number::<usize>(v, "offset"))
            .transpose()?
            .unwrap_or(0);
        let min_score = params
            .min_score
            .as_deref()
            .map(|v| parse_number::<f64>(v, "min_score"))
            .transpose()?
            .unwrap_or(0.5);
        let confidence = match params.confidence.as_deref() {
            None | Some("all") => None,
            Some("high") => Some(Confidence::High),
            Some("medium") => Some(Confidence::Medium),
            Some("low") => Some(Confidence::Low),
            Some(other) => {
                return Err(SearchError::InvalidParameter {
                    param: "confidence".to_string(),
                    reason: format!("'{}' is not a confidence tier", other),
                })
            }
        };
        let year = params.year.as_deref().map(parse_year).transpose()?;
        Ok((limit, offset, min_score, confidence, year))
    })();

    let (limit, offset, min_score, confidence, year) = match parsed {
        Ok(parsed) => parsed,
        Err(e) => return Ok(error_response(&e)),
    };

    let topics = app_state.corpus.load_topics().await;
    let Some(topic) = topics.iter().find(|t| t.slug == slug) else {
        return Ok(error_response(&SearchError::TopicNotFound { slug }));
    };

    let snapshot = app_state.corpus.load_sections().await;
    let assignment_for = |s: &Section| {
        s.topics
            .as_ref()
            .and_then(|ts| ts.iter().find(|a| a.topic_id == topic.id).cloned())
    };

    let mut filtered: Vec<(Section, f64, Confidence)> = snapshot
        .sections()
        .iter()
        .filter_map(|s| {
            let assignment = assignment_for(s)?;
            if assignment.score < min_score {
                return None;
            }
            if let Some(tier) = confidence {
                if assignment.confidence != tier {
                    return None;
                }
            }
            if let Some(year) = year {
                if s.year != year {
                    return None;
                }
            }
            Some((s.clone(), assignment.score, assignment.confidence))
        })
        .collect();

    filtered.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let total = filtered.len();
    let mut year_distribution: BTreeMap<i32, usize> = BTreeMap::new();
    let mut confidence_distribution: BTreeMap<String, usize> = BTreeMap::new();
    let mut score_sum = 0.0;
    for (section, score, tier) in &filtered {
        *year_distribution.entry(section.year).or_default() += 1;
        let tier_name = match tier {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        };
        *confidence_distribution.entry(tier_name.to_string()).or_default() += 1;
        score_sum += score;
    }
    let avg_score = if total > 0 { score_sum / total as f64 } else { 0.0 };

    let page: Vec<Section> = filtered
        .into_iter()
        .skip(offset)
        .take(limit)
        .map(|(section, _, _)| section)
        .collect();

    Ok(HttpResponse::Ok().json(json!({
        "topic": {
            "id": topic.id,
            "slug": topic.slug,
            "name": topic.name,
            "description": topic.description,
            "color": topic.color,
        },
        "sections": page,
        "pagination": {
            "total": total,
            "limit": limit,
            "offset": offset,
            "has_more": offset + limit < total,
        },
        "statistics": {
            "year_distribution": year_distribution,
            "confidence_distribution": confidence_distribution,
            "avg_score": avg_score,
        },
    })))
}

/// Daily wisdom endpoint, deterministic per calendar date
async fn daily_wisdom_handler(
    app_state: web::Data<AppState>,
    params: web::Query<WisdomParams>,
) -> ActixResult<HttpResponse> {
    let date_key = match params.date.as_deref() {
        Some(raw) => match chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(date) => date.format("%Y-%m-%d").to_string(),
            Err(_) => {
                return Ok(error_response(&SearchError::InvalidParameter {
                    param: "date".to_string(),
                    reason: "expected YYYY-MM-DD".to_string(),
                }))
            }
        },
        None => chrono::Utc::now().date_naive().format("%Y-%m-%d").to_string(),
    };

    Ok(match app_state.wisdom_engine.daily(&date_key).await {
        Ok(selection) => {
            let citation = format_citation(
                &app_state.config.server.public_base_url,
                &selection.section,
            );
            HttpResponse::Ok().json(json!({
                "section": selection.section,
                "score": selection.score,
                "primary_topic": selection.primary_topic,
                "citation": citation,
                "date": date_key,
                "selection_pool_size": selection.selection_pool_size,
                "total_sections": selection.total_sections,
            }))
        }
        Err(e) => error_response(&e),
    })
}

/// Surprise quote endpoint, seeded from an explicit nonce or today's date
async fn surprise_handler(
    app_state: web::Data<AppState>,
    params: web::Query<SurpriseParams>,
) -> ActixResult<HttpResponse> {
    let min_score = match params
        .min_score
        .as_deref()
        .map(|v| parse_number::<f64>(v, "min_score"))
        .transpose()
    {
        Ok(min_score) => min_score,
        Err(e) => return Ok(error_response(&e)),
    };

    let seed = match params.seed.as_deref() {
        Some(seed) => seed.to_string(),
        None => chrono::Utc::now().date_naive().format("%Y-%m-%d").to_string(),
    };

    Ok(match app_state
        .wisdom_engine
        .surprise(&seed, params.topic.as_deref(), min_score)
        .await
    {
        Ok(selection) => {
            let citation = format_citation(
                &app_state.config.server.public_base_url,
                &selection.section,
            );
            HttpResponse::Ok().json(json!({
                "section": selection.section,
                "score": selection.score,
                "primary_topic": selection.primary_topic,
                "citation": citation,
                "selection_pool_size": selection.selection_pool_size,
                "total_sections": selection.total_sections,
            }))
        }
        Err(e) => error_response(&e),
    })
}

/// Health check endpoint handler
async fn health_handler() -> ActixResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    })))
}

/// Statistics endpoint handler
async fn stats_handler(app_state: web::Data<AppState>) -> ActixResult<HttpResponse> {
    let (result_entries, letter_entries) = app_state.search_engine.cache_sizes();
    Ok(HttpResponse::Ok().json(json!({
        "corpus": {
            "loads": app_state.corpus.loads(),
        },
        "caches": {
            "result_entries": result_entries,
            "letter_entries": letter_entries,
        },
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Clock, ManualClock};
    use crate::config::{Config, CorpusConfig, RemoteIndexConfig};
    use crate::corpus::CorpusStore;
    use crate::remote::RemoteIndex;
    use crate::search::SearchEngine;
    use crate::wisdom::WisdomEngine;
    use actix_web::{test, App};
    use std::io::Write;
    use std::sync::Arc;

    fn fixture_state(dir: &std::path::Path) -> AppState {
        let mut config = Config::default();
        config.corpus = CorpusConfig {
            data_dir: dir.to_path_buf(),
            topics_path: dir.join("topics.json"),
            ..CorpusConfig::default()
        };
        let config = Arc::new(config);
        let clock = Arc::new(ManualClock::new()) as Arc<dyn Clock>;
        let corpus = Arc::new(CorpusStore::new(config.corpus.clone(), clock.clone()));
        let mut remote_config = RemoteIndexConfig::default();
        remote_config.port = 1; // nothing listens here
        remote_config.timeout_ms = 200;
        let remote = RemoteIndex::new(remote_config).unwrap();
        let search_engine = Arc::new(
            SearchEngine::with_remote(config.clone(), corpus.clone(), remote, clock.clone())
                .unwrap(),
        );
        let wisdom_engine = Arc::new(WisdomEngine::new(
            config.wisdom.clone(),
            corpus.clone(),
            clock,
        ));
        AppState {
            config,
            search_engine,
            wisdom_engine,
            corpus,
        }
    }

    fn write_corpus(dir: &std::path::Path) {
        let mut file = std::fs::File::create(dir.join("letters_2007.jsonl")).unwrap();
        writeln!(
            file,
            r#"{{"id":"2007-¶1","document_id":2007,"title":"2007 Letter","year":2007,"source":"letters","anchor":"¶1","text":"Our moat is deep and wide."}}"#
        )
        .unwrap();
        std::fs::write(
            dir.join("topics.json"),
            r##"{"topics":[
                {"id":"t2","slug":"pricing","name":"Pricing","description":"Pricing power","keywords":["price"],"color":"#8a4f24","priority":2},
                {"id":"t1","slug":"moats","name":"Moats","description":"Durable advantage","keywords":["moat"],"color":"#1f6f54","priority":1}
            ]}"##,
        )
        .unwrap();
    }

    #[actix_web::test]
    async fn test_search_rejects_invalid_year_before_scoring() {
        let dir = tempfile::tempdir().unwrap();
        write_corpus(dir.path());
        let state = fixture_state(dir.path());

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .route("/search", web::get().to(search_handler)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/search?q=moat&year=notayear")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        // The corpus was never touched: rejection happens before any work.
        assert_eq!(state.corpus.loads(), 0);
    }

    #[actix_web::test]
    async fn test_search_returns_hits_envelope() {
        let dir = tempfile::tempdir().unwrap();
        write_corpus(dir.path());
        let state = fixture_state(dir.path());

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/search", web::get().to(search_handler)),
        )
        .await;

        let req = test::TestRequest::get().uri("/search?q=moat").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["hits"].as_array().unwrap().len(), 1);
        assert_eq!(body["hits"][0]["anchor"], "¶1");
    }

    #[actix_web::test]
    async fn test_empty_corpus_maps_to_503() {
        let dir = tempfile::tempdir().unwrap();
        let state = fixture_state(dir.path());

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/search", web::get().to(search_handler)),
        )
        .await;

        let req = test::TestRequest::get().uri("/search?q=moat").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 503);
    }

    #[actix_web::test]
    async fn test_topics_sorted_by_priority_then_name() {
        let dir = tempfile::tempdir().unwrap();
        write_corpus(dir.path());
        let state = fixture_state(dir.path());

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/topics", web::get().to(topics_handler)),
        )
        .await;

        let req = test::TestRequest::get().uri("/topics").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["count"], 2);
        assert_eq!(body["topics"][0]["slug"], "moats");
        assert_eq!(body["topics"][1]["slug"], "pricing");
    }

    #[actix_web::test]
    async fn test_unknown_topic_slug_is_404() {
        let dir = tempfile::tempdir().unwrap();
        write_corpus(dir.path());
        let state = fixture_state(dir.path());

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/topics/{slug}", web::get().to(topic_sections_handler)),
        )
        .await;

        let req = test::TestRequest::get().uri("/topics/no-such").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);
    }

    #[actix_web::test]
    async fn test_daily_wisdom_rejects_malformed_date() {
        let dir = tempfile::tempdir().unwrap();
        write_corpus(dir.path());
        let state = fixture_state(dir.path());

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/daily-wisdom", web::get().to(daily_wisdom_handler)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/daily-wisdom?date=03-01-2024")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }

    #[actix_web::test]
    async fn test_letter_listing_and_not_found() {
        let dir = tempfile::tempdir().unwrap();
        write_corpus(dir.path());
        let state = fixture_state(dir.path());

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/letters/{year}", web::get().to(letter_handler)),
        )
        .await;

        let req = test::TestRequest::get().uri("/letters/2007").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["sections"].as_array().unwrap().len(), 1);

        let req = test::TestRequest::get().uri("/letters/1900").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);
    }
}
