//! Running operations and sequences and recording what happened.
//!
//! [`execute_operation`] runs a leaf handler under the bundle's retry policy.
//! [`execute_sequence`] runs a composite handler with a scoped reporter so
//! the reports produced directly inside it become its children. Both store
//! their report before returning, and both hand the report back even when
//! the handler or the storage failed.

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn};

use crate::bundle::Bundle;
use crate::core::definition::Definition;
use crate::core::report::{GenericReport, Report};
use crate::core::unrecoverable::is_unrecoverable;
use crate::operation::{Operation, Sequence};
use crate::reporter::{RecentReporter, Reporter};

/// Upper bound on how long a backoff sleep goes without checking for
/// cancellation.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Produces the input for the next attempt from the input of the failed one.
pub type InputHook<IN, DEP> = Arc<dyn Fn(&IN, &DEP) -> IN + Send + Sync>;

/// Per-call retry settings.
pub struct RetryConfig<IN, DEP> {
    /// Run the handler exactly once.
    pub disable_retry: bool,
    /// Adjusts the input before each retry (e.g. raising a gas limit).
    /// Ignored when retries are disabled.
    pub input_hook: Option<InputHook<IN, DEP>>,
}

impl<IN, DEP> Default for RetryConfig<IN, DEP> {
    fn default() -> Self {
        Self {
            disable_retry: false,
            input_hook: None,
        }
    }
}

impl<IN, DEP> Clone for RetryConfig<IN, DEP> {
    fn clone(&self) -> Self {
        Self {
            disable_retry: self.disable_retry,
            input_hook: self.input_hook.clone(),
        }
    }
}

impl<IN, DEP> fmt::Debug for RetryConfig<IN, DEP> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("disable_retry", &self.disable_retry)
            .field("input_hook", &self.input_hook.is_some())
            .finish()
    }
}

/// One adjustment to the default execution settings.
pub enum ExecuteOption<IN, DEP> {
    DisableRetry,
    InputHook(InputHook<IN, DEP>),
    /// Replaces the whole retry configuration.
    RetryConfig(RetryConfig<IN, DEP>),
}

impl<IN, DEP> ExecuteOption<IN, DEP> {
    pub fn input_hook<F>(hook: F) -> Self
    where
        F: Fn(&IN, &DEP) -> IN + Send + Sync + 'static,
    {
        Self::InputHook(Arc::new(hook))
    }
}

/// Settings for one [`execute_operation`] call.
#[derive(Debug)]
pub struct ExecuteConfig<IN, DEP> {
    pub retry: RetryConfig<IN, DEP>,
}

impl<IN, DEP> Default for ExecuteConfig<IN, DEP> {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
        }
    }
}

impl<IN, DEP> ExecuteConfig<IN, DEP> {
    /// Fold options over the defaults, in order; later options win.
    pub fn from_options(options: impl IntoIterator<Item = ExecuteOption<IN, DEP>>) -> Self {
        options
            .into_iter()
            .fold(Self::default(), |mut config, option| {
                match option {
                    ExecuteOption::DisableRetry => config.retry.disable_retry = true,
                    ExecuteOption::InputHook(hook) => config.retry.input_hook = Some(hook),
                    ExecuteOption::RetryConfig(retry) => config.retry = retry,
                }
                config
            })
    }
}

/// Which part of an execution failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The handler did not succeed; the report records why.
    Handler,
    /// The work finished but its report could not be stored or read back.
    Storage,
}

/// Failed execution. Carries the report that was built regardless, so a
/// caller can tell "the work failed" from "the bookkeeping failed" and still
/// inspect the outcome.
#[derive(Debug)]
pub struct ExecuteError<R> {
    kind: FailureKind,
    unit: String,
    report: R,
    error: anyhow::Error,
}

impl<R> ExecuteError<R> {
    fn new(kind: FailureKind, def: &Definition, report: R, error: anyhow::Error) -> Self {
        Self {
            kind,
            unit: def.id.clone(),
            report,
            error,
        }
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn is_storage(&self) -> bool {
        self.kind == FailureKind::Storage
    }

    pub fn report(&self) -> &R {
        &self.report
    }

    pub fn into_report(self) -> R {
        self.report
    }

    /// The handler error, or the storage error for [`FailureKind::Storage`].
    /// A storage failure replaces the handler's error chain, including any
    /// unrecoverable marker; only the rendered `report.err` remains.
    pub fn error(&self) -> &anyhow::Error {
        &self.error
    }

    pub fn into_error(self) -> anyhow::Error {
        self.error
    }
}

impl<R> fmt::Display for ExecuteError<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FailureKind::Handler => write!(f, "execute {}", self.unit),
            FailureKind::Storage => write!(f, "store report for {}", self.unit),
        }
    }
}

impl<R: fmt::Debug> std::error::Error for ExecuteError<R> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        let source: &(dyn std::error::Error + 'static) = &*self.error;
        Some(source)
    }
}

/// Outcome of [`execute_sequence`]: the sequence's own report plus its whole
/// execution tree, descendants before ancestors, ending with the sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceReport<IN, OUT> {
    pub report: Report<IN, OUT>,
    pub execution_reports: Vec<GenericReport>,
}

/// Run `operation` and store its report.
///
/// By default the handler is retried under the bundle's [`RetryPolicy`]
/// (10 attempts, exponential backoff). A handler error marked with
/// [`crate::core::unrecoverable::unrecoverable`] ends the loop at once.
/// The report always records the input the call was made with, even if an
/// input hook changed it for later attempts.
///
/// [`RetryPolicy`]: crate::core::retry::RetryPolicy
pub fn execute_operation<IN, OUT, DEP>(
    bundle: &Bundle,
    operation: &Operation<IN, OUT, DEP>,
    deps: &DEP,
    input: IN,
    options: impl IntoIterator<Item = ExecuteOption<IN, DEP>>,
) -> Result<Report<IN, OUT>, ExecuteError<Report<IN, OUT>>>
where
    IN: Serialize,
    OUT: Serialize,
{
    let def = operation.def();
    let span = info_span!(parent: bundle.span(), "operation", id = %def.id, version = %def.version);
    let _enter = span.enter();
    let config = ExecuteConfig::from_options(options);

    let outcome = if config.retry.disable_retry {
        debug!("executing operation once");
        operation.call(bundle, deps, &input)
    } else {
        run_with_retry(bundle, operation, deps, &input, &config.retry)
    };

    let (output, err) = split_outcome(outcome);
    let report = Report::new(def.clone(), input, output, err.as_ref(), Vec::new());

    if let Err(error) = store_report(bundle.reporter().as_ref(), &report) {
        warn!(report_id = %report.id, error = %format!("{error:#}"), "failed to store operation report");
        return Err(ExecuteError::new(FailureKind::Storage, def, report, error));
    }
    debug!(report_id = %report.id, success = report.is_success(), "operation report stored");

    match err {
        Some(error) => Err(ExecuteError::new(FailureKind::Handler, def, report, error)),
        None => Ok(report),
    }
}

/// Run `sequence` and store its report with the ids of the reports its
/// handler produced directly.
///
/// A handler error is returned after the report is stored; a failing child
/// only fails the sequence if the handler propagates it.
pub fn execute_sequence<IN, OUT, DEP>(
    bundle: &Bundle,
    sequence: &Sequence<IN, OUT, DEP>,
    deps: &DEP,
    input: IN,
) -> Result<SequenceReport<IN, OUT>, ExecuteError<SequenceReport<IN, OUT>>>
where
    IN: Serialize,
    OUT: Serialize,
{
    let def = sequence.def();
    let span = info_span!(parent: bundle.span(), "sequence", id = %def.id, version = %def.version);
    let _enter = span.enter();
    info!(description = %def.description, "executing sequence");

    // Capture over the root storage, not over an enclosing sequence's
    // decorator, so grandchildren never reach the enclosing capture.
    let recent = Arc::new(RecentReporter::new(Arc::clone(bundle.storage())));
    let scoped = bundle.scoped(recent.clone()).with_span(span.clone());
    let outcome = sequence.call(&scoped, deps, &input);
    let children = recent.recent_report_ids();
    debug!(children = children.len(), "sequence handler returned");

    let (output, err) = split_outcome(outcome);
    let report = Report::new(def.clone(), input, output, err.as_ref(), children);

    // The sequence's own report goes through the caller's reporter, which is
    // the enclosing sequence's decorator when nested.
    if let Err(error) = store_report(bundle.reporter().as_ref(), &report) {
        warn!(report_id = %report.id, error = %format!("{error:#}"), "failed to store sequence report");
        let partial = SequenceReport {
            report,
            execution_reports: Vec::new(),
        };
        return Err(ExecuteError::new(FailureKind::Storage, def, partial, error));
    }

    let execution_reports = match bundle
        .storage()
        .get_execution_reports(&report.id)
        .with_context(|| format!("fetch execution reports for {}", report.id))
    {
        Ok(reports) => reports,
        Err(error) => {
            warn!(report_id = %report.id, error = %format!("{error:#}"), "failed to read sequence execution tree");
            let partial = SequenceReport {
                report,
                execution_reports: Vec::new(),
            };
            return Err(ExecuteError::new(FailureKind::Storage, def, partial, error));
        }
    };

    let result = SequenceReport {
        report,
        execution_reports,
    };
    match err {
        Some(error) => Err(ExecuteError::new(FailureKind::Handler, def, result, error)),
        None => Ok(result),
    }
}

fn run_with_retry<IN, OUT, DEP>(
    bundle: &Bundle,
    operation: &Operation<IN, OUT, DEP>,
    deps: &DEP,
    input: &IN,
    retry: &RetryConfig<IN, DEP>,
) -> Result<OUT> {
    let policy = bundle.retry_policy();
    // Hook-adjusted input for later attempts; the caller's input stays intact.
    let mut adjusted: Option<IN> = None;
    let mut attempt = 1u32;
    loop {
        let current = adjusted.as_ref().unwrap_or(input);
        let err = match operation.call(bundle, deps, current) {
            Ok(output) => {
                debug!(attempt, "operation succeeded");
                return Ok(output);
            }
            Err(err) => err,
        };
        if is_unrecoverable(&err) {
            info!(attempt, error = %format!("{err:#}"), "operation failed with unrecoverable error");
            return Err(err);
        }
        if attempt >= policy.attempts {
            info!(attempt, error = %format!("{err:#}"), "operation failed, retries exhausted");
            return Err(err);
        }

        info!(
            operation = %operation.def().id,
            attempt,
            error = %format!("{err:#}"),
            "operation failed, retrying"
        );
        if let Some(hook) = &retry.input_hook {
            adjusted = Some(hook(current, deps));
        }
        if !sleep_unless_cancelled(policy.delay_for(attempt - 1), bundle.cancellation()) {
            info!(attempt, "execution cancelled, abandoning retries");
            return Err(err.context("retry abandoned: execution cancelled"));
        }
        attempt += 1;
    }
}

/// Sleep for `delay`, waking early if `cancel` fires. Returns false when
/// cancelled.
fn sleep_unless_cancelled(delay: Duration, cancel: &CancellationToken) -> bool {
    let deadline = Instant::now() + delay;
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        let remaining = deadline
            .checked_duration_since(Instant::now())
            .unwrap_or(Duration::ZERO);
        if remaining.is_zero() {
            return true;
        }
        thread::sleep(remaining.min(CANCEL_POLL_INTERVAL));
    }
}

fn split_outcome<OUT>(outcome: Result<OUT>) -> (Option<OUT>, Option<anyhow::Error>) {
    match outcome {
        Ok(output) => (Some(output), None),
        Err(err) => (None, Some(err)),
    }
}

fn store_report<IN: Serialize, OUT: Serialize>(
    reporter: &dyn Reporter,
    report: &Report<IN, OUT>,
) -> Result<()> {
    let generic = report.to_generic()?;
    reporter.add_report(generic)
}
