// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `crevio serve` command implementation.
//!
//! Wires the configured adapters (Anthropic provider, HTTP embeddings,
//! SQLite storage, optional enrichment analyzers) into a turn orchestrator
//! and serves the HTTP gateway until shutdown.

use std::sync::Arc;

use crevio_anthropic::AnthropicProvider;
use crevio_config::CrevioConfig;
use crevio_core::error::CrevioError;
use crevio_core::traits::{PluginAdapter, StorageAdapter};
use crevio_embedding::HttpEmbedding;
use crevio_enrich::{BlogAnalyzer, EnrichClient, HashtagAnalyzer, SocialProfileAnalyzer};
use crevio_gateway::{start_server, GatewayState};
use crevio_memory::MemoryStore;
use crevio_storage::SqliteStorage;
use crevio_turn::TurnOrchestrator;
use tracing::info;

/// Runs the `crevio serve` command.
pub async fn run_serve(config: CrevioConfig) -> Result<(), CrevioError> {
    init_tracing(&config.agent.log_level);
    info!("starting crevio serve");

    let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
    storage.initialize().await?;
    let storage_dyn: Arc<dyn StorageAdapter + Send + Sync> = storage.clone();

    let provider = Arc::new(AnthropicProvider::new(&config).await?);
    let system_preamble = provider.system_prompt().to_string();
    let embedder = Arc::new(HttpEmbedding::new(&config)?);

    // The memory store shares the storage database connection.
    let memory_store = Arc::new(MemoryStore::new(storage.db()?.connection().clone()).await?);

    let mut orchestrator = TurnOrchestrator::new(
        config.clone(),
        storage_dyn.clone(),
        provider,
        embedder,
        memory_store,
        system_preamble,
    );

    let enrich_client = EnrichClient::new(&config.enrichment)?;
    if enrich_client.enabled() {
        let client = Arc::new(enrich_client);
        orchestrator = orchestrator.with_enrichers(
            Arc::new(SocialProfileAnalyzer::new(
                client.clone(),
                storage_dyn.clone(),
                config.enrichment.clone(),
            )),
            Arc::new(HashtagAnalyzer::new(
                client.clone(),
                storage_dyn.clone(),
                config.enrichment.clone(),
            )),
            Arc::new(BlogAnalyzer::new(
                client,
                storage_dyn.clone(),
                config.enrichment.clone(),
            )),
        );
        info!("enrichment analyzers enabled");
    } else {
        info!("enrichment disabled (no base_url configured)");
    }

    let state = GatewayState {
        orchestrator: Arc::new(orchestrator),
        storage: storage_dyn,
        start_time: std::time::Instant::now(),
    };

    tokio::select! {
        result = start_server(&config.gateway, state) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            storage.shutdown().await
        }
    }
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("crevio={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
