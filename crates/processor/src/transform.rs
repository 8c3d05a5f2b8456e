//! Per-record transform: read source, compute, write target.

use std::sync::Arc;

use llm_embed_record::{FieldPath, Record};

use crate::client::EmbeddingClient;
use crate::config::{EmbedConfig, ValueEncoding};
use crate::context::ProcessContext;
use crate::error::TransformError;

/// Applies the configured embedding to one record at a time.
///
/// Holds no per-record state; the same transformer is reused for every
/// record of every batch.
#[derive(Clone)]
pub struct RecordTransformer {
    client: Arc<dyn EmbeddingClient>,
    source: FieldPath,
    target: FieldPath,
    encoding: ValueEncoding,
}

impl RecordTransformer {
    pub fn new(client: Arc<dyn EmbeddingClient>, config: &EmbedConfig) -> Self {
        RecordTransformer {
            client,
            source: config.source.clone(),
            target: config.target.clone(),
            encoding: config.encoding,
        }
    }

    /// Transform `record`, returning it with the target field set.
    ///
    /// The first failure is returned and the record is dropped; a record
    /// that failed part-way is never handed back.
    pub async fn transform(
        &self,
        ctx: &ProcessContext,
        mut record: Record,
    ) -> Result<Record, TransformError> {
        let input = self.source.get(&record)?.to_bytes();
        let output = self.client.compute(ctx, input).await?;
        tracing::debug!(
            source = %self.source,
            target = %self.target,
            bytes = output.len(),
            "computed embedding"
        );
        let value = self.encoding.encode(output)?;

        let mut field = self.target.resolve(&mut record)?;
        field.set(value)?;
        Ok(record)
    }
}
