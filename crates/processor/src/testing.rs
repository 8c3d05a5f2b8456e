//! Test doubles shared by the unit tests of this crate.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::client::{EmbeddingClient, HttpEmbeddingClient};
use crate::context::ProcessContext;
use crate::error::ComputeError;

/// Mock embedding client that pops responses from a queue.
pub(crate) struct MockEmbeddingClient {
    responses: Mutex<Vec<Result<Vec<u8>, ComputeError>>>,
    /// Captures the input bytes of each call.
    pub(crate) captured_inputs: Mutex<Vec<Vec<u8>>>,
}

impl MockEmbeddingClient {
    pub(crate) fn new(responses: Vec<Result<Vec<u8>, ComputeError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            captured_inputs: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.captured_inputs.lock().unwrap().len()
    }
}

#[async_trait]
impl EmbeddingClient for MockEmbeddingClient {
    async fn compute(
        &self,
        ctx: &ProcessContext,
        input: Vec<u8>,
    ) -> Result<Vec<u8>, ComputeError> {
        ctx.check()?;
        self.captured_inputs.lock().unwrap().push(input);
        let mut queue = self.responses.lock().unwrap();
        if queue.is_empty() {
            return Err(ComputeError::Status {
                endpoint: "mock".to_string(),
                status: 599,
            });
        }
        queue.remove(0)
    }
}

/// An http URL on a local port nothing listens on.
pub(crate) fn unreachable_endpoint() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}/embedding")
}

/// A genuine connection failure, produced by calling an unreachable endpoint.
pub(crate) async fn connection_refused() -> ComputeError {
    let client = HttpEmbeddingClient::new(unreachable_endpoint()).unwrap();
    client
        .compute(&ProcessContext::new(), b"{}".to_vec())
        .await
        .unwrap_err()
}
