//! In-memory reference reporter.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Result, anyhow};
use tracing::debug;

use super::{Reporter, collect_execution_reports};
use crate::core::report::{DuplicateReport, GenericReport, ReportNotFound};

/// Keeps every report in insertion order behind a single lock.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    reports: Vec<GenericReport>,
    index: HashMap<String, usize>,
}

impl MemoryState {
    fn insert(&mut self, report: GenericReport) -> Result<()> {
        if self.index.contains_key(&report.id) {
            return Err(anyhow::Error::new(DuplicateReport { id: report.id }));
        }
        self.index.insert(report.id.clone(), self.reports.len());
        self.reports.push(report);
        Ok(())
    }

    fn get(&self, id: &str) -> Result<GenericReport> {
        self.index
            .get(id)
            .map(|&position| self.reports[position].clone())
            .ok_or_else(|| anyhow::Error::new(ReportNotFound { id: id.to_string() }))
    }
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the reporter with an existing history, e.g. reports loaded from a
    /// previous run. Ids must be unique.
    pub fn with_reports(reports: impl IntoIterator<Item = GenericReport>) -> Result<Self> {
        let mut state = MemoryState::default();
        for report in reports {
            state.insert(report)?;
        }
        Ok(Self {
            state: Mutex::new(state),
        })
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.reports.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("memory reporter lock poisoned"))
    }
}

impl Reporter for MemoryReporter {
    fn add_report(&self, report: GenericReport) -> Result<()> {
        debug!(report_id = %report.id, definition = %report.def.id, "storing report");
        self.lock()?.insert(report)
    }

    fn get_report(&self, id: &str) -> Result<GenericReport> {
        self.lock()?.get(id)
    }

    fn get_reports(&self) -> Result<Vec<GenericReport>> {
        Ok(self.lock()?.reports.clone())
    }

    // One lock for the whole walk so the subtree is a consistent snapshot.
    fn get_execution_reports(&self, id: &str) -> Result<Vec<GenericReport>> {
        let state = self.lock()?;
        collect_execution_reports(id, |report_id| state.get(report_id))
    }
}
