//! Run summary and run state of a reconciliation or export run.

use serde::Serialize;
use uuid::Uuid;

use crate::models::{EntityKind, LocalCategory, LocalProduct, RemoteEntity};
use crate::SyncError;

/// Reference to the entity an outcome is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRef {
    pub kind: EntityKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_id: Option<Uuid>,
    pub label: String,
}

impl From<&RemoteEntity> for EntityRef {
    fn from(remote: &RemoteEntity) -> Self {
        Self {
            kind: remote.kind(),
            remote_id: Some(remote.id().to_string()),
            local_id: None,
            label: remote.label().to_string(),
        }
    }
}

impl From<&LocalCategory> for EntityRef {
    fn from(local: &LocalCategory) -> Self {
        Self {
            kind: EntityKind::Category,
            remote_id: local.remote_id.clone(),
            local_id: local.id,
            label: local.name.clone(),
        }
    }
}

impl From<&LocalProduct> for EntityRef {
    fn from(local: &LocalProduct) -> Self {
        Self {
            kind: EntityKind::Product,
            remote_id: local.remote_id.clone(),
            local_id: local.id,
            label: local.name.clone(),
        }
    }
}

/// Error class of a failed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Mapping,
    Persistence,
    RemoteRequest,
    Auth,
    Other,
}

impl From<&SyncError> for FailureKind {
    fn from(error: &SyncError) -> Self {
        match error {
            SyncError::Mapping(_) => Self::Mapping,
            SyncError::Persistence(_) | SyncError::Unlinked { .. } => Self::Persistence,
            SyncError::Auth(_) => Self::Auth,
            SyncError::RemoteRequest { .. }
            | SyncError::Http(_)
            | SyncError::Json(_)
            | SyncError::Protocol(_)
            | SyncError::MaxRetriesExceeded { .. } => Self::RemoteRequest,
            SyncError::Config(_) | SyncError::Url(_) | SyncError::Cancelled => Self::Other,
        }
    }
}

/// One item that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedItem {
    pub entity: EntityRef,
    pub kind: FailureKind,
    pub reason: String,
}

/// Per-item decision of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Created,
    Updated,
    Skipped,
}

/// Counters and failures of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total: usize,
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: Vec<FailedItem>,
    /// The run stopped early; unprocessed items are in none of the counters.
    pub cancelled: bool,
}

impl RunSummary {
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn record(&mut self, outcome: Outcome) {
        self.processed += 1;
        match outcome {
            Outcome::Created => self.created += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::Skipped => self.skipped += 1,
        }
    }

    pub fn record_failure(&mut self, entity: EntityRef, error: &SyncError) {
        self.processed += 1;
        self.failed.push(FailedItem {
            entity,
            kind: FailureKind::from(error),
            reason: error.to_string(),
        });
    }

    /// Items that were created, updated or skipped.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.created + self.updated + self.skipped
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Remote ids of the failed items, for a manual re-run.
    #[must_use]
    pub fn failed_remote_ids(&self) -> Vec<String> {
        self.failed
            .iter()
            .filter_map(|f| f.entity.remote_id.clone())
            .collect()
    }

    /// Progress in percent.
    #[must_use]
    pub fn progress_percentage(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.processed as f64 / self.total as f64) * 100.0
        }
    }
}

/// Observable state of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum RunState {
    #[default]
    Idle,
    Running { processed: usize, total: usize },
    Completed(RunSummary),
}

impl RunState {
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }

    /// Summary of a completed run.
    #[must_use]
    pub fn summary(&self) -> Option<&RunSummary> {
        match self {
            Self::Completed(summary) => Some(summary),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{MappingError, StoreError};

    fn entity(id: &str) -> EntityRef {
        EntityRef {
            kind: EntityKind::Product,
            remote_id: Some(id.to_string()),
            local_id: None,
            label: id.to_string(),
        }
    }

    #[test]
    fn test_counters() {
        let mut summary = RunSummary::new(4);
        summary.record(Outcome::Created);
        summary.record(Outcome::Skipped);
        summary.record(Outcome::Updated);
        summary.record_failure(
            entity("P4"),
            &SyncError::Persistence(StoreError::Unavailable("down".into())),
        );

        assert_eq!(summary.processed, 4);
        assert_eq!(summary.succeeded(), 3);
        assert!(summary.has_failures());
        assert_eq!(summary.failed[0].kind, FailureKind::Persistence);
        assert_eq!(summary.failed_remote_ids(), vec!["P4".to_string()]);
        assert!((summary.progress_percentage() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_failure_classification() {
        let mapping = SyncError::Mapping(MappingError::MissingDepartment { name: "x".into() });
        assert_eq!(FailureKind::from(&mapping), FailureKind::Mapping);
        assert_eq!(
            FailureKind::from(&SyncError::remote(500, "boom")),
            FailureKind::RemoteRequest
        );
        assert_eq!(
            FailureKind::from(&SyncError::Auth("nope".into())),
            FailureKind::Auth
        );
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_value(RunState::Running {
            processed: 1,
            total: 3,
        })
        .unwrap();
        assert_eq!(json["state"], "running");
        assert_eq!(json["total"], 3);
    }
}
