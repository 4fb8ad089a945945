//! Execution context passed explicitly to every operation and sequence.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::Span;

use crate::config::EngineConfig;
use crate::core::retry::RetryPolicy;
use crate::reporter::Reporter;

/// Everything an execution needs besides its dependencies and input.
///
/// Cloning is cheap: the reporter is shared, not copied.
#[derive(Clone)]
pub struct Bundle {
    span: Span,
    cancel: CancellationToken,
    retry_policy: RetryPolicy,
    reporter: Arc<dyn Reporter>,
    storage: Arc<dyn Reporter>,
}

impl Bundle {
    /// Bundle bound to `reporter`, logging under the current span, never
    /// cancelled, with the default retry policy.
    pub fn new(reporter: Arc<dyn Reporter>) -> Self {
        Self {
            span: Span::current(),
            cancel: CancellationToken::new(),
            retry_policy: RetryPolicy::default(),
            storage: Arc::clone(&reporter),
            reporter,
        }
    }

    pub fn from_config(config: &EngineConfig, reporter: Arc<dyn Reporter>) -> Self {
        Self::new(reporter).with_retry_policy(config.retry.clone())
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Parent span for the executions run with this bundle.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Cancellation signal. Handlers may consult it; retry loops stop on it.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Where executions run with this bundle store their reports. Inside a
    /// sequence handler this is the sequence's capturing decorator.
    pub fn reporter(&self) -> &Arc<dyn Reporter> {
        &self.reporter
    }

    /// The reporter the bundle was created with, below every sequence
    /// decorator.
    pub fn storage(&self) -> &Arc<dyn Reporter> {
        &self.storage
    }

    /// Same bundle and storage, different reporter.
    pub(crate) fn scoped(&self, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            reporter,
            ..self.clone()
        }
    }
}

impl fmt::Debug for Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bundle")
            .field("span", &self.span)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}
