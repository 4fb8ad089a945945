//! Test-only helpers for bundles, definitions and reporters.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, anyhow};

use crate::bundle::Bundle;
use crate::core::definition::Definition;
use crate::core::report::GenericReport;
use crate::core::retry::RetryPolicy;
use crate::reporter::{MemoryReporter, Reporter};

/// Deterministic `1.0.0` definition for `id`.
pub fn definition(id: &str) -> Definition {
    Definition::parse(id, "1.0.0", format!("{id} description")).expect("valid definition")
}

/// Bundle over a fresh memory reporter with the default attempt budget and
/// no backoff delay.
pub fn test_bundle() -> (Bundle, Arc<MemoryReporter>) {
    let reporter = Arc::new(MemoryReporter::new());
    let bundle = Bundle::new(reporter.clone()).with_retry_policy(RetryPolicy::immediate());
    (bundle, reporter)
}

/// Shared call counter for handlers.
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a call and return how many calls came before it.
    pub fn hit(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst)
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Memory reporter with injectable failures.
#[derive(Debug, Default)]
pub struct ErrorReporter {
    inner: MemoryReporter,
    add_report_error: Option<String>,
    execution_reports_error: Option<String>,
}

impl ErrorReporter {
    /// Every `add_report` fails with `message`.
    pub fn failing_add(message: &str) -> Self {
        Self {
            add_report_error: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// Every `get_execution_reports` fails with `message`; adds succeed.
    pub fn failing_execution_reports(message: &str) -> Self {
        Self {
            execution_reports_error: Some(message.to_string()),
            ..Self::default()
        }
    }
}

impl Reporter for ErrorReporter {
    fn add_report(&self, report: GenericReport) -> Result<()> {
        match &self.add_report_error {
            Some(message) => Err(anyhow!("{message}")),
            None => self.inner.add_report(report),
        }
    }

    fn get_report(&self, id: &str) -> Result<GenericReport> {
        self.inner.get_report(id)
    }

    fn get_reports(&self) -> Result<Vec<GenericReport>> {
        self.inner.get_reports()
    }

    fn get_execution_reports(&self, id: &str) -> Result<Vec<GenericReport>> {
        match &self.execution_reports_error {
            Some(message) => Err(anyhow!("{message}")),
            None => self.inner.get_execution_reports(id),
        }
    }
}
