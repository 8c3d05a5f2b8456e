use llm_embed_record::{ResolveError, SetError};

use crate::context::Interrupted;

/// Errors from a single call to the embedding service.
#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    /// The request could not be sent (connection refused, DNS, ...).
    #[error("request to {endpoint} failed: {source}")]
    Request {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The response body could not be read to the end.
    #[error("reading response from {endpoint} failed: {source}")]
    Body {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success status, only reported when status checking is enabled.
    #[error("{endpoint} responded with status {status}")]
    Status { endpoint: String, status: u16 },

    /// The caller's context was cancelled or ran past its deadline.
    #[error("computation interrupted: {0}")]
    Interrupted(#[from] Interrupted),

    /// The response body is not JSON although JSON encoding was requested.
    #[error("response is not valid JSON: {0}")]
    InvalidResponse(#[source] serde_json::Error),
}

/// The terminal error of one record's transform. Wraps the first failure.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("resolving field reference failed: {0}")]
    Resolve(#[from] ResolveError),

    #[error("setting target field failed: {0}")]
    Set(#[from] SetError),

    #[error("embedding computation failed: {0}")]
    Compute(#[from] ComputeError),

    #[error("processor is not configured")]
    NotConfigured,
}

/// Errors raised while configuring the processor. These are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),

    #[error("parameter '{param}' is not a valid field reference: {source}")]
    Reference {
        param: &'static str,
        #[source]
        source: ResolveError,
    },

    #[error("configuration schema could not be compiled: {0}")]
    Schema(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("processor configuration cannot change after records were processed")]
    AlreadyStarted,
}
