//! Immutable execution records.
//!
//! A [`Report`] is the typed view callers work with. Reporters store the
//! erased [`GenericReport`], where input and output are plain JSON values.
//! Converting between the two is a serde mapping of the payload fields; the
//! identity, definition, timestamp, error and child links copy across as-is.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::core::definition::Definition;

/// Record of one completed execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report<IN, OUT> {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Definition")]
    pub def: Definition,
    /// `None` when the handler did not reach a successful result.
    #[serde(rename = "Output")]
    pub output: Option<OUT>,
    /// The input the execution was started with (never a retry-adjusted one).
    #[serde(rename = "Input")]
    pub input: IN,
    #[serde(rename = "Timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Rendered handler error chain, `None` on success.
    #[serde(rename = "Error")]
    pub err: Option<String>,
    /// Ids of the reports produced directly inside a sequence handler.
    /// Always empty for an operation.
    #[serde(rename = "ChildOperationReports", default)]
    pub child_operation_reports: Vec<String>,
}

/// Type-erased report shape stored by every [`crate::reporter::Reporter`].
pub type GenericReport = Report<Value, Value>;

impl<IN, OUT> Report<IN, OUT> {
    /// Create a report with a fresh id and the current time.
    pub fn new(
        def: Definition,
        input: IN,
        output: Option<OUT>,
        err: Option<&anyhow::Error>,
        child_operation_reports: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            def,
            output,
            input,
            timestamp: Utc::now(),
            err: err.map(|err| format!("{err:#}")),
            child_operation_reports,
        }
    }

    pub fn is_success(&self) -> bool {
        self.err.is_none()
    }
}

impl<IN: Serialize, OUT: Serialize> Report<IN, OUT> {
    /// Map onto the erased storage shape.
    pub fn to_generic(&self) -> Result<GenericReport> {
        let input = serde_json::to_value(&self.input)
            .with_context(|| format!("encode input of report {}", self.id))?;
        let output = self
            .output
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .with_context(|| format!("encode output of report {}", self.id))?;
        Ok(Report {
            id: self.id.clone(),
            def: self.def.clone(),
            output,
            input,
            timestamp: self.timestamp,
            err: self.err.clone(),
            child_operation_reports: self.child_operation_reports.clone(),
        })
    }
}

impl<IN: DeserializeOwned, OUT: DeserializeOwned> Report<IN, OUT> {
    /// Recover a typed report from storage. Fails when the stored payload does
    /// not decode as `IN` / `OUT`.
    pub fn from_generic(report: &GenericReport) -> Result<Self> {
        let input = IN::deserialize(&report.input)
            .with_context(|| format!("decode input of report {}", report.id))?;
        let output = report
            .output
            .as_ref()
            .map(OUT::deserialize)
            .transpose()
            .with_context(|| format!("decode output of report {}", report.id))?;
        Ok(Report {
            id: report.id.clone(),
            def: report.def.clone(),
            output,
            input,
            timestamp: report.timestamp,
            err: report.err.clone(),
            child_operation_reports: report.child_operation_reports.clone(),
        })
    }
}

/// Returned when a reporter has no report with the requested id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("report_id {id}: report not found")]
pub struct ReportNotFound {
    pub id: String,
}

/// Returned when a reporter is asked to store an id it already holds.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("report_id {id}: report already exists")]
pub struct DuplicateReport {
    pub id: String,
}

/// True if any error in the chain is [`ReportNotFound`].
pub fn is_report_not_found(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.is::<ReportNotFound>())
}
