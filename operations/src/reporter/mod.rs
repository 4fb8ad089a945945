//! Report storage.
//!
//! The [`Reporter`] trait decouples execution from where reports live.
//! [`MemoryReporter`] is the in-process reference backend; [`RecentReporter`]
//! decorates another reporter to learn which reports a sequence produced.

mod memory;
mod recent;

use std::collections::HashSet;

use anyhow::Result;

use crate::core::report::GenericReport;

pub use memory::MemoryReporter;
pub use recent::RecentReporter;

/// Storage and lookup for execution reports.
///
/// Implementations must be safe to share between threads: a single reporter
/// is typically reachable from several bundles at once.
pub trait Reporter: Send + Sync {
    /// Append a report. Reports are never modified once stored.
    fn add_report(&self, report: GenericReport) -> Result<()>;

    /// Fetch one report, failing with [`crate::core::report::ReportNotFound`]
    /// when the id is unknown.
    fn get_report(&self, id: &str) -> Result<GenericReport>;

    /// Every stored report, in insertion order.
    fn get_reports(&self) -> Result<Vec<GenericReport>>;

    /// The report `id` plus everything reachable through its child links,
    /// descendants before the report that references them.
    fn get_execution_reports(&self, id: &str) -> Result<Vec<GenericReport>> {
        collect_execution_reports(id, |report_id| self.get_report(report_id))
    }
}

/// Depth-first, post-order walk of the report tree rooted at `root_id`.
///
/// Children are visited in the order they were recorded. A report reachable
/// through more than one path is emitted once, at its first visit.
pub fn collect_execution_reports<F>(root_id: &str, mut lookup: F) -> Result<Vec<GenericReport>>
where
    F: FnMut(&str) -> Result<GenericReport>,
{
    let mut visited = HashSet::new();
    let mut reports = Vec::new();
    visit(root_id, &mut lookup, &mut visited, &mut reports)?;
    Ok(reports)
}

fn visit<F>(
    id: &str,
    lookup: &mut F,
    visited: &mut HashSet<String>,
    reports: &mut Vec<GenericReport>,
) -> Result<()>
where
    F: FnMut(&str) -> Result<GenericReport>,
{
    if !visited.insert(id.to_string()) {
        return Ok(());
    }
    let report = lookup(id)?;
    for child_id in &report.child_operation_reports {
        visit(child_id, lookup, visited, reports)?;
    }
    reports.push(report);
    Ok(())
}
