//! Cancellation and deadline signal passed from the host into every
//! embedding call.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a context stopped a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Interrupted {
    #[error("context cancelled")]
    Cancelled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// The ambient execution context of a `process` call.
///
/// Cloning shares the cancellation token, so cancelling any clone cancels
/// all of them.
#[derive(Debug, Clone, Default)]
pub struct ProcessContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl ProcessContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// A context driven by an existing host token.
    pub fn with_token(token: CancellationToken) -> Self {
        ProcessContext {
            token,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Fails if the context is already cancelled or past its deadline.
    pub fn check(&self) -> Result<(), Interrupted> {
        if self.token.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }
        match self.deadline {
            Some(deadline) if deadline <= Instant::now() => Err(Interrupted::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Drive `fut` to completion unless the context is cancelled or the
    /// deadline passes first. On interruption `fut` is dropped, releasing
    /// whatever it holds.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Interrupted> {
        self.check()?;
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(Interrupted::Cancelled),
            _ = deadline => Err(Interrupted::DeadlineExceeded),
            output = fut => Ok(output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_context_passes_check() {
        assert_eq!(ProcessContext::new().check(), Ok(()));
    }

    #[test]
    fn cancelled_context_fails_check() {
        let ctx = ProcessContext::new();
        let clone = ctx.clone();
        clone.cancel();
        assert_eq!(ctx.check(), Err(Interrupted::Cancelled));
    }

    #[tokio::test]
    async fn expired_deadline_fails_check() {
        let ctx = ProcessContext::new().with_deadline(Instant::now() - Duration::from_millis(1));
        assert_eq!(ctx.check(), Err(Interrupted::DeadlineExceeded));
    }

    #[tokio::test]
    async fn run_returns_output_when_not_interrupted() {
        let ctx = ProcessContext::new().with_timeout(Duration::from_secs(5));
        assert_eq!(ctx.run(async { 42 }).await, Ok(42));
    }

    #[tokio::test]
    async fn run_stops_at_deadline() {
        let ctx = ProcessContext::new().with_timeout(Duration::from_millis(20));
        let result = ctx
            .run(tokio::time::sleep(Duration::from_secs(10)))
            .await;
        assert_eq!(result, Err(Interrupted::DeadlineExceeded));
    }

    #[tokio::test]
    async fn run_stops_when_cancelled_mid_flight() {
        let ctx = ProcessContext::new();
        let token = ctx.token().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });
        let result = ctx
            .run(tokio::time::sleep(Duration::from_secs(10)))
            .await;
        assert_eq!(result, Err(Interrupted::Cancelled));
    }

    #[tokio::test]
    async fn run_does_not_poll_future_when_already_cancelled() {
        let ctx = ProcessContext::new();
        ctx.cancel();
        let polled = std::sync::atomic::AtomicBool::new(false);
        let result = ctx
            .run(async {
                polled.store(true, std::sync::atomic::Ordering::SeqCst);
            })
            .await;
        assert_eq!(result, Err(Interrupted::Cancelled));
        assert!(!polled.load(std::sync::atomic::Ordering::SeqCst));
    }
}
