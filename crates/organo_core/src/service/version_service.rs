//! Organization-chart version workflow: draft, diff, approve, archive.
//!
//! # Responsibility
//! - Capture the live chart into draft versions and keep their change
//!   summary current.
//! - Replay an approved draft onto live employees atomically.
//!
//! # Invariants
//! - Only drafts can be edited, approved, archived or deleted.
//! - Approval writes nothing when the replayed supervisor graph would hold a
//!   cycle.
//! - Snapshot records without a live counterpart are skipped on replay and
//!   never diffed.

use crate::model::employee::EmployeeId;
use crate::model::validation::ValidationError;
use crate::model::version::{
    ChangeType, ChangesSummary, EmployeeSnapshot, OrgVersion, VersionChange, VersionId,
    VersionListItem, VersionPatch, VersionStatus,
};
use crate::repo::employee_repo::{EmployeeRepository, SqliteEmployeeRepository};
use crate::repo::version_repo::{SqliteVersionRepository, VersionRepository};
use crate::repo::RepoError;
use crate::service::{begin_read, begin_write, log_outcome, ServiceFailure};
use rusqlite::Connection;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

const MODULE: &str = "version";

/// Version action rejected by the current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionAction {
    Edit,
    Approve,
    Archive,
    Delete,
}

impl VersionAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Edit => "edit",
            Self::Approve => "approve",
            Self::Archive => "archive",
            Self::Delete => "delete",
        }
    }
}

/// Errors from version operations.
#[derive(Debug)]
pub enum VersionError {
    NotFound(VersionId),
    /// Version name is blank after trim.
    InvalidName,
    /// A draft record fails the employee field rules.
    InvalidRecord {
        employee_id: EmployeeId,
        source: ValidationError,
    },
    /// Action is not allowed from the current status.
    InvalidTransition {
        version_id: VersionId,
        status: VersionStatus,
        action: VersionAction,
    },
    /// Replaying the snapshot would close a supervisor loop.
    ReplayWouldCreateCycle {
        version_id: VersionId,
        cycle: Vec<EmployeeId>,
    },
    Repo(RepoError),
}

impl Display for VersionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "version not found: {id}"),
            Self::InvalidName => write!(f, "version name must not be blank"),
            Self::InvalidRecord {
                employee_id,
                source,
            } => write!(f, "draft record for employee {employee_id} is invalid: {source}"),
            Self::InvalidTransition {
                version_id,
                status,
                action,
            } => write!(
                f,
                "cannot {} version {version_id} with status `{}`",
                action.as_str(),
                status.as_str()
            ),
            Self::ReplayWouldCreateCycle { version_id, cycle } => write!(
                f,
                "approving version {version_id} would create a hierarchy cycle: {cycle:?}"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for VersionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidRecord { source, .. } => Some(source),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for VersionError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound {
                entity: "org_version",
                id,
            } => Self::NotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<rusqlite::Error> for VersionError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(value.into())
    }
}

impl ServiceFailure for VersionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "version_not_found",
            Self::InvalidName => "invalid_name",
            Self::InvalidRecord { .. } => "invalid_input",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::ReplayWouldCreateCycle { .. } => "hierarchy_cycle",
            Self::Repo(RepoError::Conflict(_)) => "integrity_conflict",
            Self::Repo(_) => "storage_failure",
        }
    }

    fn is_storage(&self) -> bool {
        matches!(self, Self::Repo(err) if !matches!(err, RepoError::Conflict(_)))
    }
}

/// Diffs a draft snapshot against the official one.
///
/// For each employee present in both: one hierarchy change when the
/// supervisor differs, one data change per differing `nome`, `cargo`,
/// `setor_id` or `nivel_id`. Records follow the first position of each id in
/// the draft; when an id repeats, its last record is the one compared, the
/// same record approval leaves in place.
pub fn diff_snapshots(official: &[EmployeeSnapshot], draft: &[EmployeeSnapshot]) -> ChangesSummary {
    let official_by_id: HashMap<EmployeeId, &EmployeeSnapshot> =
        official.iter().map(|record| (record.id, record)).collect();

    let mut order: Vec<EmployeeId> = Vec::new();
    let mut draft_by_id: HashMap<EmployeeId, &EmployeeSnapshot> = HashMap::new();
    for record in draft {
        if draft_by_id.insert(record.id, record).is_none() {
            order.push(record.id);
        }
    }

    let mut hierarchy_changes = Vec::new();
    let mut data_changes = Vec::new();
    for proposed in order.iter().filter_map(|id| draft_by_id.get(id).copied()) {
        let Some(current) = official_by_id.get(&proposed.id) else {
            continue;
        };

        if current.supervisor_id != proposed.supervisor_id {
            hierarchy_changes.push(change(
                proposed,
                ChangeType::Hierarchy,
                "superior_id",
                json!(current.supervisor_id),
                json!(proposed.supervisor_id),
            ));
        }

        let fields: [(&str, Value, Value); 4] = [
            ("nome", json!(current.name), json!(proposed.name)),
            ("cargo", json!(current.role_title), json!(proposed.role_title)),
            ("setor_id", json!(current.sector_id), json!(proposed.sector_id)),
            ("nivel_id", json!(current.level_id), json!(proposed.level_id)),
        ];
        for (field, old_value, new_value) in fields {
            if old_value != new_value {
                data_changes.push(change(proposed, ChangeType::Data, field, old_value, new_value));
            }
        }
    }

    ChangesSummary::from_changes(hierarchy_changes, data_changes)
}

fn change(
    proposed: &EmployeeSnapshot,
    change_type: ChangeType,
    field: &str,
    old_value: Value,
    new_value: Value,
) -> VersionChange {
    VersionChange {
        employee_id: proposed.id,
        employee_name: proposed.name.clone(),
        change_type,
        field: Some(field.to_string()),
        old_value,
        new_value,
    }
}

/// Version workflow facade.
pub struct VersionService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> VersionService<'conn> {
    pub fn try_new(conn: &'conn Connection) -> Result<Self, VersionError> {
        SqliteVersionRepository::try_new(conn)?;
        SqliteEmployeeRepository::try_new(conn)?;
        Ok(Self { conn })
    }

    /// Creates a draft holding a copy of every live employee.
    pub fn create_version(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<OrgVersion, VersionError> {
        let started_at = Instant::now();
        let result = self.create_version_inner(name, description);
        log_outcome(
            "version_create",
            MODULE,
            result.as_ref().ok().map(|version| version.id),
            started_at,
            &result,
        );
        result
    }

    fn create_version_inner(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<OrgVersion, VersionError> {
        let name = normalize_name(name)?;
        let tx = begin_write(self.conn)?;
        let snapshot = SqliteEmployeeRepository::new(&tx).snapshot_all()?;
        let created = SqliteVersionRepository::new(&tx).create_version(
            &name,
            description,
            &snapshot,
            &ChangesSummary::default(),
        )?;
        tx.commit()?;
        Ok(created)
    }

    /// Applies a patch to a draft. A new snapshot refreshes the summary
    /// against live state read in the same transaction.
    pub fn edit_version(
        &self,
        version_id: VersionId,
        patch: &VersionPatch,
    ) -> Result<OrgVersion, VersionError> {
        let started_at = Instant::now();
        let result = self.edit_version_inner(version_id, patch);
        log_outcome("version_edit", MODULE, Some(version_id), started_at, &result);
        result
    }

    fn edit_version_inner(
        &self,
        version_id: VersionId,
        patch: &VersionPatch,
    ) -> Result<OrgVersion, VersionError> {
        let tx = begin_write(self.conn)?;
        let versions = SqliteVersionRepository::new(&tx);
        let mut version = load_draft(&versions, version_id, VersionAction::Edit)?;

        if let Some(name) = &patch.name {
            version.name = normalize_name(name)?;
        }
        if let Some(description) = &patch.description {
            version.description = description.clone();
        }
        if let Some(snapshot) = &patch.snapshot {
            for record in snapshot {
                record.validate().map_err(|source| VersionError::InvalidRecord {
                    employee_id: record.id,
                    source,
                })?;
            }
            let official = SqliteEmployeeRepository::new(&tx).snapshot_all()?;
            version.changes_summary = diff_snapshots(&official, snapshot);
            version.snapshot = snapshot.clone();
        }

        versions.update_version(&version)?;
        let updated = versions
            .get_version(version_id)?
            .ok_or(VersionError::NotFound(version_id))?;
        tx.commit()?;
        Ok(updated)
    }

    /// Replays a draft onto live employees and marks it approved.
    pub fn approve_version(&self, version_id: VersionId) -> Result<OrgVersion, VersionError> {
        let started_at = Instant::now();
        let result = self.approve_version_inner(version_id);
        log_outcome(
            "version_approve",
            MODULE,
            Some(version_id),
            started_at,
            &result,
        );
        result
    }

    fn approve_version_inner(&self, version_id: VersionId) -> Result<OrgVersion, VersionError> {
        let tx = begin_write(self.conn)?;
        let versions = SqliteVersionRepository::new(&tx);
        let employees = SqliteEmployeeRepository::new(&tx);
        let version = load_draft(&versions, version_id, VersionAction::Approve)?;

        let mut graph = employees.load_hierarchy()?;
        for record in &version.snapshot {
            if graph.contains(record.id) {
                graph.set_supervisor(record.id, record.supervisor_id);
            }
        }
        if let Some(cycle) = graph.find_cycle() {
            return Err(VersionError::ReplayWouldCreateCycle { version_id, cycle });
        }

        for record in &version.snapshot {
            employees.apply_snapshot_record(record)?;
        }

        let approved_at = chrono::Utc::now().timestamp_millis();
        versions.set_status(version_id, VersionStatus::Approved, Some(approved_at))?;
        let approved = versions
            .get_version(version_id)?
            .ok_or(VersionError::NotFound(version_id))?;
        tx.commit()?;
        Ok(approved)
    }

    pub fn archive_version(&self, version_id: VersionId) -> Result<OrgVersion, VersionError> {
        let started_at = Instant::now();
        let result = self.archive_version_inner(version_id);
        log_outcome(
            "version_archive",
            MODULE,
            Some(version_id),
            started_at,
            &result,
        );
        result
    }

    fn archive_version_inner(&self, version_id: VersionId) -> Result<OrgVersion, VersionError> {
        let tx = begin_write(self.conn)?;
        let versions = SqliteVersionRepository::new(&tx);
        load_draft(&versions, version_id, VersionAction::Archive)?;
        versions.set_status(version_id, VersionStatus::Archived, None)?;
        let archived = versions
            .get_version(version_id)?
            .ok_or(VersionError::NotFound(version_id))?;
        tx.commit()?;
        Ok(archived)
    }

    pub fn delete_version(&self, version_id: VersionId) -> Result<(), VersionError> {
        let started_at = Instant::now();
        let result = self.delete_version_inner(version_id);
        log_outcome("version_delete", MODULE, Some(version_id), started_at, &result);
        result
    }

    fn delete_version_inner(&self, version_id: VersionId) -> Result<(), VersionError> {
        let tx = begin_write(self.conn)?;
        let versions = SqliteVersionRepository::new(&tx);
        load_draft(&versions, version_id, VersionAction::Delete)?;
        versions.delete_version(version_id)?;
        tx.commit()?;
        Ok(())
    }

    pub fn get_version(&self, version_id: VersionId) -> Result<OrgVersion, VersionError> {
        SqliteVersionRepository::new(self.conn)
            .get_version(version_id)?
            .ok_or(VersionError::NotFound(version_id))
    }

    /// Listing rows, most recently updated first.
    pub fn list_versions(&self) -> Result<Vec<VersionListItem>, VersionError> {
        let versions = SqliteVersionRepository::new(self.conn).list_versions()?;
        Ok(versions.iter().map(VersionListItem::from).collect())
    }

    /// The official chart: every live employee in snapshot form.
    pub fn current_snapshot(&self) -> Result<Vec<EmployeeSnapshot>, VersionError> {
        SqliteEmployeeRepository::new(self.conn)
            .snapshot_all()
            .map_err(Into::into)
    }

    /// Diffs a stored version against live state as of now, without
    /// touching the cached summary.
    pub fn diff_against_live(&self, version_id: VersionId) -> Result<ChangesSummary, VersionError> {
        let tx = begin_read(self.conn)?;
        let version = SqliteVersionRepository::new(&tx)
            .get_version(version_id)?
            .ok_or(VersionError::NotFound(version_id))?;
        let official = SqliteEmployeeRepository::new(&tx).snapshot_all()?;
        Ok(diff_snapshots(&official, &version.snapshot))
    }
}

fn load_draft(
    versions: &impl VersionRepository,
    version_id: VersionId,
    action: VersionAction,
) -> Result<OrgVersion, VersionError> {
    let version = versions
        .get_version(version_id)?
        .ok_or(VersionError::NotFound(version_id))?;
    if !version.status.is_draft() {
        return Err(VersionError::InvalidTransition {
            version_id,
            status: version.status,
            action,
        });
    }
    Ok(version)
}

fn normalize_name(name: &str) -> Result<String, VersionError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(VersionError::InvalidName);
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::diff_snapshots;
    use crate::model::version::{ChangeType, EmployeeSnapshot};
    use serde_json::json;

    fn record(id: i64, name: &str, supervisor_id: Option<i64>) -> EmployeeSnapshot {
        EmployeeSnapshot {
            id,
            name: name.to_string(),
            role_title: "Analista".to_string(),
            sector_id: 1,
            sub_sector_id: None,
            level_id: 2,
            sub_level_id: None,
            supervisor_id,
            permissions: Vec::new(),
            photo_url: None,
            email: None,
            phone: None,
        }
    }

    #[test]
    fn identical_snapshots_have_no_changes() {
        let official = vec![record(1, "Ana", None), record(2, "Bruno", Some(1))];
        let summary = diff_snapshots(&official, &official);
        assert!(summary.is_empty());
        assert!(summary.hierarchy_changes.is_empty());
        assert!(summary.data_changes.is_empty());
    }

    #[test]
    fn supervisor_change_is_one_hierarchy_record() {
        let official = vec![
            record(1, "Ana", None),
            record(2, "Bruno", Some(1)),
            record(3, "Carla", Some(1)),
        ];
        let mut draft = official.clone();
        draft[2].supervisor_id = Some(2);

        let summary = diff_snapshots(&official, &draft);
        assert_eq!(summary.total_changes, 1);
        let change = &summary.hierarchy_changes[0];
        assert_eq!(change.employee_id, 3);
        assert_eq!(change.change_type, ChangeType::Hierarchy);
        assert_eq!(change.field.as_deref(), Some("superior_id"));
        assert_eq!(change.old_value, json!(1));
        assert_eq!(change.new_value, json!(2));
    }

    #[test]
    fn data_changes_use_draft_name_and_field_keys() {
        let official = vec![record(1, "Ana", None)];
        let mut draft = official.clone();
        draft[0].name = "Ana Paula".to_string();
        draft[0].level_id = 3;
        draft[0].phone = Some("555".to_string());

        let summary = diff_snapshots(&official, &draft);
        assert_eq!(summary.total_changes, 2);
        let fields: Vec<_> = summary
            .data_changes
            .iter()
            .map(|change| change.field.clone().unwrap())
            .collect();
        assert_eq!(fields, vec!["nome", "nivel_id"]);
        assert!(summary
            .data_changes
            .iter()
            .all(|change| change.employee_name == "Ana Paula"));
    }

    #[test]
    fn repeated_id_is_diffed_once_with_its_last_record() {
        let official = vec![record(1, "Ana", None), record(2, "Bruno", Some(1))];
        let mut moved = record(2, "Bruno", None);
        moved.role_title = "Gerente".to_string();
        let draft = vec![moved, record(1, "Ana", None), record(2, "Bruno", Some(1))];
        assert!(diff_snapshots(&official, &draft).is_empty());

        let mut last = record(2, "Bruno", Some(1));
        last.role_title = "Gerente".to_string();
        let draft = vec![record(2, "Bruno", None), record(1, "Ana", None), last];
        let summary = diff_snapshots(&official, &draft);
        assert_eq!(summary.total_changes, 1);
        assert_eq!(summary.data_changes[0].field.as_deref(), Some("cargo"));
    }

    #[test]
    fn employees_missing_on_either_side_are_not_diffed() {
        let official = vec![record(1, "Ana", None), record(2, "Bruno", Some(1))];
        let draft = vec![record(1, "Ana", None), record(9, "Novo", Some(1))];
        assert!(diff_snapshots(&official, &draft).is_empty());
    }
}
