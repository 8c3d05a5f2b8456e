//! llm-embed-processor: derive an embedding from one record field and store
//! it in another.
//!
//! Per record, the [`RecordTransformer`] reads the configured source field,
//! sends its bytes to the embedding service through an [`EmbeddingClient`],
//! and writes the response into the target field. The [`BatchCoordinator`]
//! runs a batch through the transformer in order, applying the configured
//! [`ErrorPolicy`]. [`EmbedProcessor`] ties configuration, self-description
//! and batch processing together behind the host-facing [`Processor`] trait.

pub mod batch;
pub mod client;
pub mod config;
pub mod context;
mod error;
pub mod processor;
pub mod spec;
pub mod transform;

#[cfg(test)]
mod testing;

pub use batch::{BatchCoordinator, ErrorPolicy, ProcessedRecord};
pub use client::{EmbeddingClient, HttpEmbeddingClient, DEFAULT_ENDPOINT};
pub use config::{EmbedConfig, ValueEncoding};
pub use context::{Interrupted, ProcessContext};
pub use error::{ComputeError, ConfigError, TransformError};
pub use processor::{EmbedProcessor, Processor};
pub use spec::{specification, Parameter, ParameterType, Specification, Validation};
pub use transform::RecordTransformer;
