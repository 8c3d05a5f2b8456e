//! Host-facing processor facade.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use llm_embed_record::Record;

use crate::batch::{BatchCoordinator, ProcessedRecord};
use crate::client::{EmbeddingClient, HttpEmbeddingClient};
use crate::config::EmbedConfig;
use crate::context::ProcessContext;
use crate::error::{ConfigError, TransformError};
use crate::spec::Specification;
use crate::transform::RecordTransformer;

/// The contract between a pipeline host and a record processor.
///
/// The host calls `configure` once before the first batch, then `process`
/// for every batch. `specification` may be called at any time.
#[async_trait]
pub trait Processor: Send + Sync {
    fn specification(&self) -> Specification;

    fn configure(&mut self, params: &BTreeMap<String, String>) -> Result<(), ConfigError>;

    async fn process(&self, ctx: &ProcessContext, records: Vec<Record>) -> Vec<ProcessedRecord>;
}

/// Embedding processor: writes the embedding of one field into another.
#[derive(Default)]
pub struct EmbedProcessor {
    client: Option<Arc<dyn EmbeddingClient>>,
    coordinator: Option<BatchCoordinator>,
    started: AtomicBool,
}

impl EmbedProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `client` instead of an HTTP client built from the `url` parameter.
    pub fn with_client(client: Arc<dyn EmbeddingClient>) -> Self {
        EmbedProcessor {
            client: Some(client),
            ..Self::default()
        }
    }

    pub fn is_configured(&self) -> bool {
        self.coordinator.is_some()
    }
}

#[async_trait]
impl Processor for EmbedProcessor {
    fn specification(&self) -> Specification {
        crate::spec::specification()
    }

    fn configure(&mut self, params: &BTreeMap<String, String>) -> Result<(), ConfigError> {
        if self.started.load(Ordering::Acquire) {
            return Err(ConfigError::AlreadyStarted);
        }
        let config = EmbedConfig::from_params(params)?;

        let client: Arc<dyn EmbeddingClient> = match &self.client {
            Some(client) => client.clone(),
            None => Arc::new(
                HttpEmbeddingClient::new(config.url.clone())
                    .map_err(ConfigError::Client)?
                    .check_status(config.check_status),
            ),
        };

        tracing::info!(
            source = %config.source,
            target = %config.target,
            url = %config.url,
            encoding = %config.encoding,
            error_policy = %config.error_policy,
            check_status = config.check_status,
            "processor configured"
        );

        let transformer = RecordTransformer::new(client, &config);
        self.coordinator = Some(BatchCoordinator::new(transformer, config.error_policy));
        Ok(())
    }

    async fn process(&self, ctx: &ProcessContext, records: Vec<Record>) -> Vec<ProcessedRecord> {
        match &self.coordinator {
            Some(coordinator) => {
                self.started.store(true, Ordering::Release);
                coordinator.process_batch(ctx, records).await
            }
            None if records.is_empty() => Vec::new(),
            None => vec![ProcessedRecord::Error(TransformError::NotConfigured)],
        }
    }
}
