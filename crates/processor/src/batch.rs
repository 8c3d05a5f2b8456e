//! Batch fan-out and error policy.

use std::fmt;
use std::str::FromStr;

use llm_embed_record::Record;

use crate::context::ProcessContext;
use crate::error::TransformError;
use crate::transform::RecordTransformer;

/// What happens to the rest of a batch once one record fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Emit one error marker for the failing record and stop.
    #[default]
    FailFast,
    /// Emit an outcome for every record.
    Isolate,
}

impl ErrorPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorPolicy::FailFast => "fail-fast",
            ErrorPolicy::Isolate => "isolate",
        }
    }
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fail-fast" => Ok(ErrorPolicy::FailFast),
            "isolate" => Ok(ErrorPolicy::Isolate),
            other => Err(format!("unknown error policy '{other}'")),
        }
    }
}

/// The outcome for one input record.
#[derive(Debug)]
pub enum ProcessedRecord {
    Single(Record),
    Error(TransformError),
}

impl ProcessedRecord {
    pub fn is_error(&self) -> bool {
        matches!(self, ProcessedRecord::Error(_))
    }

    pub fn record(&self) -> Option<&Record> {
        match self {
            ProcessedRecord::Single(record) => Some(record),
            ProcessedRecord::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&TransformError> {
        match self {
            ProcessedRecord::Error(err) => Some(err),
            ProcessedRecord::Single(_) => None,
        }
    }
}

impl From<Result<Record, TransformError>> for ProcessedRecord {
    fn from(result: Result<Record, TransformError>) -> Self {
        match result {
            Ok(record) => ProcessedRecord::Single(record),
            Err(err) => ProcessedRecord::Error(err),
        }
    }
}

/// Runs a batch through the transformer, one record at a time in input
/// order.
#[derive(Clone)]
pub struct BatchCoordinator {
    transformer: RecordTransformer,
    policy: ErrorPolicy,
}

impl BatchCoordinator {
    pub fn new(transformer: RecordTransformer, policy: ErrorPolicy) -> Self {
        BatchCoordinator {
            transformer,
            policy,
        }
    }

    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    /// Process `records` and return their outcomes in order.
    ///
    /// Under [`ErrorPolicy::FailFast`] the output stops at the first error
    /// marker, so it may be shorter than the input. Under
    /// [`ErrorPolicy::Isolate`] it has exactly one outcome per input record.
    pub async fn process_batch(
        &self,
        ctx: &ProcessContext,
        records: Vec<Record>,
    ) -> Vec<ProcessedRecord> {
        let total = records.len();
        let mut outcomes = Vec::with_capacity(total);
        let mut failed = 0usize;

        for (index, record) in records.into_iter().enumerate() {
            match self.transformer.transform(ctx, record).await {
                Ok(record) => outcomes.push(ProcessedRecord::Single(record)),
                Err(err) => {
                    tracing::warn!(index, error = %err, "record transform failed");
                    failed += 1;
                    outcomes.push(ProcessedRecord::Error(err));
                    if self.policy == ErrorPolicy::FailFast {
                        if index + 1 < total {
                            tracing::debug!(
                                skipped = total - index - 1,
                                "fail-fast: dropping rest of batch"
                            );
                        }
                        break;
                    }
                }
            }
        }

        tracing::info!(
            records = total,
            processed = outcomes.len() - failed,
            failed,
            policy = %self.policy,
            "batch processed"
        );
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbedConfig;
    use crate::error::ComputeError;
    use crate::testing::{connection_refused, MockEmbeddingClient};
    use llm_embed_record::{Data, Operation};
    use serde_json::json;
    use std::sync::Arc;

    fn record(position: &str, text: &str) -> Record {
        let Some(after) = json!({ "text": text }).as_object().cloned() else {
            unreachable!();
        };
        Record::new(position.as_bytes().to_vec(), Operation::Create)
            .with_after(Data::Structured(after))
    }

    fn coordinator(
        responses: Vec<Result<Vec<u8>, ComputeError>>,
        policy: ErrorPolicy,
    ) -> (BatchCoordinator, Arc<MockEmbeddingClient>) {
        let mock = Arc::new(MockEmbeddingClient::new(responses));
        let config = EmbedConfig::new("text", "embedding").unwrap();
        let transformer = RecordTransformer::new(mock.clone(), &config);
        (BatchCoordinator::new(transformer, policy), mock)
    }

    fn positions(outcomes: &[ProcessedRecord]) -> Vec<Option<&[u8]>> {
        outcomes
            .iter()
            .map(|o| o.record().map(|r| r.position.as_slice()))
            .collect()
    }

    #[test]
    fn policy_parses_its_own_names() {
        for policy in [ErrorPolicy::FailFast, ErrorPolicy::Isolate] {
            assert_eq!(policy.as_str().parse::<ErrorPolicy>(), Ok(policy));
        }
        assert!("fail_fast".parse::<ErrorPolicy>().is_err());
    }

    #[tokio::test]
    async fn empty_batch_yields_no_outcomes() {
        let (batch, mock) = coordinator(vec![], ErrorPolicy::FailFast);
        let outcomes = batch.process_batch(&ProcessContext::new(), vec![]).await;
        assert!(outcomes.is_empty());
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn outcomes_follow_input_order() {
        let (batch, mock) = coordinator(
            vec![Ok(b"[1]".to_vec()), Ok(b"[2]".to_vec()), Ok(b"[3]".to_vec())],
            ErrorPolicy::FailFast,
        );
        let outcomes = batch
            .process_batch(
                &ProcessContext::new(),
                vec![record("a", "one"), record("b", "two"), record("c", "three")],
            )
            .await;

        assert_eq!(
            positions(&outcomes),
            vec![Some(&b"a"[..]), Some(&b"b"[..]), Some(&b"c"[..])]
        );
        let inputs = mock.captured_inputs.lock().unwrap().clone();
        assert_eq!(
            inputs,
            vec![b"\"one\"".to_vec(), b"\"two\"".to_vec(), b"\"three\"".to_vec()]
        );
    }

    #[tokio::test]
    async fn fail_fast_stops_at_first_failure() {
        let (batch, mock) = coordinator(
            vec![
                Ok(b"[1]".to_vec()),
                Err(connection_refused().await),
                Ok(b"[3]".to_vec()),
            ],
            ErrorPolicy::FailFast,
        );
        let outcomes = batch
            .process_batch(
                &ProcessContext::new(),
                vec![record("a", "one"), record("b", "two"), record("c", "three")],
            )
            .await;

        assert_eq!(outcomes.len(), 2);
        assert!(!outcomes[0].is_error());
        assert!(matches!(
            outcomes[1].error(),
            Some(TransformError::Compute(ComputeError::Request { .. }))
        ));
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test]
    async fn isolate_reports_every_record() {
        let (batch, mock) = coordinator(
            vec![
                Ok(b"[1]".to_vec()),
                Err(connection_refused().await),
                Ok(b"[3]".to_vec()),
            ],
            ErrorPolicy::Isolate,
        );
        let outcomes = batch
            .process_batch(
                &ProcessContext::new(),
                vec![record("a", "one"), record("b", "two"), record("c", "three")],
            )
            .await;

        assert_eq!(
            positions(&outcomes),
            vec![Some(&b"a"[..]), None, Some(&b"c"[..])]
        );
        assert_eq!(mock.calls(), 3);
    }

    #[tokio::test]
    async fn resolution_failure_counts_as_record_failure() {
        let (batch, _mock) = coordinator(vec![Ok(b"[1]".to_vec())], ErrorPolicy::Isolate);
        let no_after = Record::new(b"x".to_vec(), Operation::Delete);
        let outcomes = batch
            .process_batch(&ProcessContext::new(), vec![no_after, record("y", "two")])
            .await;

        assert!(matches!(
            outcomes[0].error(),
            Some(TransformError::Resolve(_))
        ));
        let Some(Data::Structured(after)) = outcomes[1]
            .record()
            .and_then(|r| r.payload.after.as_ref())
        else {
            panic!("second record should succeed");
        };
        assert_eq!(after["embedding"], json!("WzFd"));
    }

    #[tokio::test]
    async fn cancelled_context_fails_the_batch() {
        let (batch, mock) = coordinator(vec![Ok(b"[1]".to_vec())], ErrorPolicy::FailFast);
        let ctx = ProcessContext::new();
        ctx.cancel();
        let outcomes = batch
            .process_batch(&ctx, vec![record("a", "one"), record("b", "two")])
            .await;

        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_error());
        assert_eq!(mock.calls(), 0);
    }
}
