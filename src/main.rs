//! # Letters Search Server Main Driver
//!
//! ## Purpose
//! Main entry point for the letters search server. Orchestrates
//! initialization of all system components and starts the web server for
//! handling search and browsing requests.
//!
//! ## Input/Output Specification
//! - **Input**: Configuration files, command line arguments, environment variables
//! - **Output**: Running web server with search API endpoints
//!
//! ## Architecture Flow
//! 1. Parse command line arguments and load configuration
//! 2. Initialize logging and tracing
//! 3. Initialize corpus store, search engine, and wisdom engine
//! 4. Start web API server
//! 5. Handle shutdown signals gracefully

use clap::{Arg, Command};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

use letters_search::{
    api::ApiServer,
    cache::SystemClock,
    config::Config,
    corpus::CorpusStore,
    errors::{Result, SearchError},
    search::SearchEngine,
    wisdom::WisdomEngine,
    AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("letters-search-server")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Search and browsing service for Warren Buffett's shareholder letters")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Server port")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .value_name("DIR")
                .help("Directory holding the normalized corpus files"),
        )
        .get_matches();

    // Load configuration
    let config_path = matches.get_one::<String>("config").unwrap();
    let mut config = Config::from_file(config_path)?;

    if let Some(port) = matches.get_one::<u16>("port") {
        config.server.port = *port;
    }
    if let Some(data_dir) = matches.get_one::<String>("data-dir") {
        config.corpus.data_dir = data_dir.into();
    }

    let config = Arc::new(config);

    init_logging(&config)?;

    info!("Starting letters search server v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from: {}", config_path);

    let app_state = initialize_components(config.clone()).await?;

    let server = ApiServer::new(app_state);
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            error!("Server error: {}", e);
        }
    });

    info!(
        "Letters search server started on {}:{}",
        config.server.host, config.server.port
    );

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received SIGINT, shutting down gracefully...");
        }
        _ = server_handle => {
            warn!("Server stopped unexpectedly");
        }
    }

    info!("Letters search server shut down");
    Ok(())
}

/// Initialize logging and tracing
fn init_logging(config: &Config) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_new(&config.logging.level).map_err(|_| {
        SearchError::Config {
            message: format!("Invalid log level: {}", config.logging.level),
        }
    })?;

    if config.logging.json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    Ok(())
}

/// Initialize all application components
async fn initialize_components(config: Arc<Config>) -> Result<AppState> {
    info!("Initializing application components...");

    let clock = Arc::new(SystemClock);

    let corpus = Arc::new(CorpusStore::new(config.corpus.clone(), clock.clone()));

    // Warm the corpus cache so the first request does not pay the load; an
    // empty corpus at startup is worth a loud warning but not a refusal to
    // serve, since the store may be populated behind us.
    let snapshot = corpus.load_sections().await;
    if snapshot.is_empty() {
        warn!(
            "Corpus store at {:?} is empty; search will report no content",
            config.corpus.data_dir
        );
    } else {
        info!("Corpus loaded: {} sections", snapshot.len());
    }

    let search_engine = Arc::new(SearchEngine::new(
        config.clone(),
        corpus.clone(),
        clock.clone(),
    )?);

    let wisdom_engine = Arc::new(WisdomEngine::new(
        config.wisdom.clone(),
        corpus.clone(),
        clock,
    ));

    info!("All components initialized successfully");
    Ok(AppState {
        config,
        search_engine,
        wisdom_engine,
        corpus,
    })
}
