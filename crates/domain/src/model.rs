//! Association / compliance data model shared between the scheduler core
//! and its collaborators.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status reported back to the control plane for one association's current
/// execution cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum AssociationStatus {
    Pending,
    InProgress,
    Success,
    Failed,
    TimedOut,
    Skipped,
}

/// Error code accompanying a non-`NoError` status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum AssociationErrorCode {
    NoError,
    ListAssociationError,
    LoadAssociationDetailError,
    InvalidAssociation,
    InvalidExpression,
    SubmitAssociationError,
}

/// A single managed-instance association as tracked by the scheduler.
///
/// Identity is `association_id` alone — see the Association Cache's
/// `validate()` contract for how checksum changes are folded into a
/// refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Association {
    pub association_id: String,
    pub instance_id: String,
    pub name: String,
    pub document_version: String,
    pub schedule_expression: Option<String>,
    pub checksum: String,
    pub create_date: DateTime<Utc>,

    #[serde(default)]
    pub last_execution_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_scheduled_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub detailed_status: Option<AssociationStatus>,
    #[serde(default)]
    pub parameters: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub output_location: Option<String>,
    #[serde(default)]
    pub document: Option<String>,
    #[serde(default)]
    pub exclude_from_future_scheduling: bool,
    #[serde(default)]
    pub legacy_association: bool,
    #[serde(default)]
    pub run_now: bool,

    /// Diagnostics accumulated for the current refresh/execution cycle.
    /// Not part of the control-plane wire contract; local-only bookkeeping.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl Association {
    /// `true` once this association is never again eligible to be returned
    /// as the next due item (terminal exclusion or an unparseable schedule).
    pub fn is_excluded(&self) -> bool {
        self.exclude_from_future_scheduling
    }
}

/// Severity of a compliance entry. The scheduler subsystem only ever
/// reports `Unspecified`; the field exists because the wire contract
/// carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ComplianceSeverity {
    Unspecified,
}

impl Default for ComplianceSeverity {
    fn default() -> Self {
        ComplianceSeverity::Unspecified
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ComplianceStatus {
    Compliant,
    NonCompliant,
}

/// The result of one association's completed execution, as reported to the
/// control plane's compliance API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceEntry {
    pub association_id: String,
    pub document_name: String,
    pub document_version: String,
    #[serde(default)]
    pub severity: ComplianceSeverity,
    pub status: ComplianceStatus,
    pub execution_time: DateTime<Utc>,
    pub title: String,
}

impl ComplianceEntry {
    pub const DEFAULT_TITLE: &'static str = "AWS:Association";
}

/// One historical execution of an association, kept for operability (CLI
/// inspection, audit cross-reference). Not part of the quantified
/// invariants — purely an aid, mirrors the teacher's run-history records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub association_id: String,
    pub document_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: AssociationStatus,
    pub error: Option<String>,
}

impl RunRecord {
    pub fn document_id_for(association_id: &str, run_id: &str) -> String {
        format!("{association_id}.{run_id}")
    }
}
