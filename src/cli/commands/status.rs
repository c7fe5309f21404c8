use anyhow::Result;
use std::sync::Arc;

use super::redact_url;
use crate::cli::output::{ComponentStatus, StatusInfo, get_formatter};
use crate::models::{AnalyticsDriver, Config, OutputFormat};
use crate::services::{EmbeddingService, OllamaBackend, create_backend, create_source};

pub async fn handle_status(config: &Config, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);

    let (embedding, dimension) = check_embedding(config).await;
    let model = config.embedding.model.as_str();
    let collection = config
        .vector_store
        .collection_for(model, dimension as u64);

    let mut store_config = config.vector_store.clone();
    store_config.collection = collection.clone();
    let (vector_store, indexed) = match create_backend(&store_config, dimension as u64).await {
        Ok(store) => {
            let indexed = store.stats().await;
            store.close().await;
            match indexed {
                Ok(count) => (connected("Vector Store", &store_config.url), Some(count)),
                Err(e) => (failed("Vector Store", &store_config.url, e), None),
            }
        }
        Err(e) => (failed("Vector Store", &store_config.url, e), None),
    };

    let analytics = check_analytics(config).await;

    let status = StatusInfo {
        embedding,
        vector_store,
        analytics,
        collection,
        indexed,
    };

    println!("{}", formatter.format_status(&status));

    if format == OutputFormat::Text && !status.all_connected() {
        eprintln!("Hint: check the URLs above or run 'estate-indexer config show'");
    }

    Ok(())
}

/// Check the provider. Falls back to the configured dimension when it is down.
async fn check_embedding(config: &Config) -> (ComponentStatus, usize) {
    let configured = config.embedding.dimension as usize;
    let url = config.embedding.url.as_str();

    let backend = match OllamaBackend::new(&config.embedding) {
        Ok(backend) => backend,
        Err(e) => return (failed("Embedding", url, e), configured),
    };

    match EmbeddingService::connect(Arc::new(backend), &config.embedding).await {
        Ok(service) => {
            let mut status = connected("Embedding", url);
            let detail = format!("{} ({} dims)", service.model(), service.dimension());
            status.detail = Some(detail);
            (status, service.dimension())
        }
        Err(e) => (failed("Embedding", url, e), configured),
    }
}

async fn check_analytics(config: &Config) -> ComponentStatus {
    let target = match config.analytics.driver {
        AnalyticsDriver::Postgres => config.analytics.url.clone(),
        AnalyticsDriver::Jsonl => config
            .analytics
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default(),
    };

    match create_source(&config.analytics, config.region).await {
        Ok(source) => {
            source.close().await;
            connected("Analytics", &target)
        }
        Err(e) => failed("Analytics", &target, e),
    }
}

fn connected(name: &str, target: &str) -> ComponentStatus {
    ComponentStatus {
        name: name.to_string(),
        target: redact_url(target),
        connected: true,
        detail: None,
    }
}

fn failed(name: &str, target: &str, error: impl std::fmt::Display) -> ComponentStatus {
    ComponentStatus {
        connected: false,
        detail: Some(error.to_string()),
        ..connected(name, target)
    }
}
