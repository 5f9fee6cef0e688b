//! Organization-chart version model.
//!
//! # Responsibility
//! - Define the draft/approved/archived version record.
//! - Define the denormalized employee snapshot and the change summary shape.
//!
//! # Invariants
//! - Status moves only `Draft -> Approved` or `Draft -> Archived`.
//! - Snapshots are copies of employee state, never foreign keys, so a draft
//!   outlives concurrent edits of live rows.
//! - Snapshot and change-record JSON keys are part of the persisted format
//!   and must not be renamed.

use crate::model::employee::{validate_fields, Employee, EmployeeId};
use crate::model::validation::ValidationError;
use crate::model::org::{LevelId, SectorId, SubLevelId, SubSectorId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type VersionId = i64;

/// Version lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionStatus {
    Draft,
    Approved,
    Archived,
}

impl VersionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Approved => "approved",
            Self::Archived => "archived",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "approved" => Some(Self::Approved),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }

    /// Only drafts accept snapshot rewrites, approval, archival or deletion.
    pub fn is_draft(self) -> bool {
        self == Self::Draft
    }
}

/// Copy of one employee as stored inside a version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeSnapshot {
    pub id: EmployeeId,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "cargo")]
    pub role_title: String,
    #[serde(rename = "setor_id")]
    pub sector_id: SectorId,
    #[serde(rename = "subsetor_id", default)]
    pub sub_sector_id: Option<SubSectorId>,
    #[serde(rename = "nivel_id")]
    pub level_id: LevelId,
    #[serde(rename = "subnivel_id", default)]
    pub sub_level_id: Option<SubLevelId>,
    #[serde(rename = "superior_id", default)]
    pub supervisor_id: Option<EmployeeId>,
    #[serde(rename = "permissoes", default)]
    pub permissions: Vec<String>,
    #[serde(rename = "foto_url", default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(rename = "telefone", default)]
    pub phone: Option<String>,
}

impl EmployeeSnapshot {
    /// Same field rules as a live employee.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_fields(&self.name, &self.role_title, self.email.as_deref())
    }
}

impl From<&Employee> for EmployeeSnapshot {
    fn from(value: &Employee) -> Self {
        Self {
            id: value.id,
            name: value.name.clone(),
            role_title: value.role_title.clone(),
            sector_id: value.sector_id,
            sub_sector_id: value.sub_sector_id,
            level_id: value.level_id,
            sub_level_id: value.sub_level_id,
            supervisor_id: value.supervisor_id,
            permissions: value.permissions.clone(),
            photo_url: value.photo_url.clone(),
            email: value.email.clone(),
            phone: value.phone.clone(),
        }
    }
}

/// Kind of one recorded difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    /// Supervisor reassignment.
    Hierarchy,
    /// Name, role, sector or level edit.
    Data,
    /// Present in the draft only. Not produced by the diff.
    Added,
    /// Present in the live state only. Not produced by the diff.
    Removed,
}

/// One difference between the live state and a draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionChange {
    #[serde(rename = "colaborador_id")]
    pub employee_id: EmployeeId,
    #[serde(rename = "colaborador_nome")]
    pub employee_name: String,
    pub change_type: ChangeType,
    /// Snapshot JSON key of the changed field.
    pub field: Option<String>,
    pub old_value: Value,
    pub new_value: Value,
}

/// Cached diff of a draft against the live state at its last edit.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChangesSummary {
    pub total_changes: usize,
    #[serde(default)]
    pub hierarchy_changes: Vec<VersionChange>,
    #[serde(default)]
    pub data_changes: Vec<VersionChange>,
}

impl ChangesSummary {
    /// Builds a summary whose total matches its record lists.
    pub fn from_changes(
        hierarchy_changes: Vec<VersionChange>,
        data_changes: Vec<VersionChange>,
    ) -> Self {
        Self {
            total_changes: hierarchy_changes.len() + data_changes.len(),
            hierarchy_changes,
            data_changes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_changes == 0
    }
}

/// Stored organization-chart version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgVersion {
    pub id: VersionId,
    pub name: String,
    pub description: Option<String>,
    pub status: VersionStatus,
    pub snapshot: Vec<EmployeeSnapshot>,
    pub changes_summary: ChangesSummary,
    pub created_at: i64,
    pub updated_at: i64,
    pub approved_at: Option<i64>,
}

/// Listing row for versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionListItem {
    pub id: VersionId,
    pub name: String,
    pub description: Option<String>,
    pub status: VersionStatus,
    pub changes_count: usize,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<&OrgVersion> for VersionListItem {
    fn from(value: &OrgVersion) -> Self {
        Self {
            id: value.id,
            name: value.name.clone(),
            description: value.description.clone(),
            status: value.status,
            changes_count: value.changes_summary.total_changes,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

/// Field-level partial update for a draft.
///
/// A supplied `snapshot` replaces the stored one in full.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VersionPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub snapshot: Option<Vec<EmployeeSnapshot>>,
}

#[cfg(test)]
mod tests {
    use super::{ChangesSummary, EmployeeSnapshot};
    use serde_json::json;

    #[test]
    fn snapshot_uses_persisted_field_names() {
        let snapshot = EmployeeSnapshot {
            id: 7,
            name: "Ana".to_string(),
            role_title: "Engenheira".to_string(),
            sector_id: 2,
            sub_sector_id: None,
            level_id: 3,
            sub_level_id: Some(4),
            supervisor_id: Some(1),
            permissions: vec!["admin".to_string()],
            photo_url: None,
            email: None,
            phone: None,
        };

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["nome"], json!("Ana"));
        assert_eq!(value["cargo"], json!("Engenheira"));
        assert_eq!(value["setor_id"], json!(2));
        assert_eq!(value["subnivel_id"], json!(4));
        assert_eq!(value["superior_id"], json!(1));
        assert_eq!(value["permissoes"], json!(["admin"]));
        assert!(value.get("telefone").is_some());
    }

    #[test]
    fn snapshot_optional_fields_default_when_missing() {
        let snapshot: EmployeeSnapshot = serde_json::from_value(json!({
            "id": 1,
            "nome": "Bruno",
            "cargo": "Diretor",
            "setor_id": 1,
            "nivel_id": 1
        }))
        .unwrap();
        assert_eq!(snapshot.supervisor_id, None);
        assert!(snapshot.permissions.is_empty());
    }

    #[test]
    fn default_summary_is_empty() {
        let summary = ChangesSummary::default();
        assert!(summary.is_empty());
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(
            value,
            json!({"total_changes": 0, "hierarchy_changes": [], "data_changes": []})
        );
    }
}
