//! Embedding service client.
//!
//! The service is a black box: it receives the source field's bytes as the
//! body of a POST and answers with the embedding as its response body.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

use crate::context::ProcessContext;
use crate::error::ComputeError;

/// Endpoint of the local embedding service used when no `url` is configured.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8091/embedding";

/// Computes a derived value from a field's raw bytes.
///
/// Implementations must honour `ctx`: an already-cancelled context returns
/// an error without doing any work, and cancellation while in flight aborts
/// the call.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn compute(&self, ctx: &ProcessContext, input: Vec<u8>)
        -> Result<Vec<u8>, ComputeError>;
}

/// [`EmbeddingClient`] that POSTs to an HTTP endpoint.
///
/// Any response is treated as a successful computation regardless of its
/// status, unless [`check_status`](Self::check_status) is enabled.
pub struct HttpEmbeddingClient {
    client: reqwest::Client,
    endpoint: String,
    check_status: bool,
}

impl HttpEmbeddingClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().build()?;
        Ok(HttpEmbeddingClient {
            client,
            endpoint: endpoint.into(),
            check_status: false,
        })
    }

    /// Report non-2xx responses as [`ComputeError::Status`].
    pub fn check_status(mut self, enabled: bool) -> Self {
        self.check_status = enabled;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl EmbeddingClient for HttpEmbeddingClient {
    async fn compute(
        &self,
        ctx: &ProcessContext,
        input: Vec<u8>,
    ) -> Result<Vec<u8>, ComputeError> {
        ctx.check()?;

        let call = async {
            let response = self
                .client
                .post(&self.endpoint)
                .header(CONTENT_TYPE, "application/json")
                .body(input)
                .send()
                .await
                .map_err(|source| ComputeError::Request {
                    endpoint: self.endpoint.clone(),
                    source,
                })?;

            let status = response.status();
            if !status.is_success() {
                if self.check_status {
                    return Err(ComputeError::Status {
                        endpoint: self.endpoint.clone(),
                        status: status.as_u16(),
                    });
                }
                tracing::warn!(
                    endpoint = %self.endpoint,
                    status = status.as_u16(),
                    "embedding service returned non-success status, using body as result"
                );
            }

            let body = response
                .bytes()
                .await
                .map_err(|source| ComputeError::Body {
                    endpoint: self.endpoint.clone(),
                    source,
                })?;
            Ok(body.to_vec())
        };

        ctx.run(call).await?
    }
}
