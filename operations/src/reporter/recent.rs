//! Reporter decorator that remembers what passed through it.

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;

use super::Reporter;
use crate::core::report::GenericReport;

/// Forwards every call to an inner reporter and records, in call order, the
/// ids of the reports it stored.
///
/// A sequence execution wraps its bundle's reporter in one of these so that
/// exactly the reports produced directly by its handler become its children.
/// A decorator records everything stored through it, including reports from
/// decorators stacked on top of it. Nested sequences therefore wrap the root
/// storage, not the enclosing decorator, so only the nested sequence's own
/// report reaches the enclosing one.
pub struct RecentReporter {
    inner: Arc<dyn Reporter>,
    recent: Mutex<Vec<String>>,
}

impl RecentReporter {
    pub fn new(inner: Arc<dyn Reporter>) -> Self {
        Self {
            inner,
            recent: Mutex::new(Vec::new()),
        }
    }

    /// Ids of the reports stored through this decorator, oldest first.
    pub fn recent_report_ids(&self) -> Vec<String> {
        self.recent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Reporter for RecentReporter {
    fn add_report(&self, report: GenericReport) -> Result<()> {
        let id = report.id.clone();
        self.inner.add_report(report)?;
        // The inner lock is released before this one is taken.
        self.recent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(id);
        Ok(())
    }

    fn get_report(&self, id: &str) -> Result<GenericReport> {
        self.inner.get_report(id)
    }

    fn get_reports(&self) -> Result<Vec<GenericReport>> {
        self.inner.get_reports()
    }

    fn get_execution_reports(&self, id: &str) -> Result<Vec<GenericReport>> {
        self.inner.get_execution_reports(id)
    }
}
