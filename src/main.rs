use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use support_agent::{
    config::Config,
    context::ContextLoader,
    conversation::ConversationOrchestrator,
    engine::DecisionEngine,
    provider::build_backends,
    retrieval::{HttpVectorIndex, KnowledgeRetriever},
    server::{self, AppState},
    storage::SqliteStorage,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        provider = %config.provider.kind,
        "Support agent starting..."
    );

    // Initialize storage
    let storage = match SqliteStorage::new(&config.database).await {
        Ok(s) => {
            info!(path = %config.database.path.display(), "Database initialized");
            s
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize database");
            return Err(e.into());
        }
    };

    // Initialize provider backends
    let (reasoning, embeddings) = match build_backends(&config.provider, &config.request) {
        Ok(backends) => {
            info!(base_url = %config.provider.base_url, "Provider backends initialized");
            backends
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize provider backends");
            return Err(e.into());
        }
    };

    // Assemble the engine and orchestrator
    let index = Arc::new(HttpVectorIndex::new(&config.retrieval, &config.request)?);
    let retriever = KnowledgeRetriever::new(embeddings, index, config.retrieval.clone());
    let context = ContextLoader::new(storage.clone());
    let engine = DecisionEngine::new(retriever, context, reasoning, config.request.clone());
    let orchestrator = ConversationOrchestrator::new(storage.clone(), engine);

    let state = Arc::new(AppState::new(orchestrator, storage));

    if let Err(e) = server::run(&config.server, state).await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        support_agent::config::LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        support_agent::config::LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
