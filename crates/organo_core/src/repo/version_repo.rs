//! Organization-chart version storage.
//!
//! # Responsibility
//! - Persist versions with their snapshot and cached change summary as JSON
//!   text columns.
//!
//! # Invariants
//! - `snapshot` is always a JSON array of employee snapshots.
//! - A missing `changes_summary` column value reads as the empty summary.
//! - Listing order is `updated_at DESC, id DESC`.
//! - Status rules live in `service::version_service`; this layer stores
//!   whatever it is handed.

use crate::model::version::{
    ChangesSummary, EmployeeSnapshot, OrgVersion, VersionId, VersionStatus,
};
use crate::repo::{ensure_table_ready, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

const VERSION_SELECT_SQL: &str = "SELECT
    id,
    name,
    description,
    status,
    snapshot,
    changes_summary,
    created_at,
    updated_at,
    approved_at
FROM org_versions";

const VERSION_COLUMNS: &[&str] = &[
    "id",
    "name",
    "description",
    "status",
    "snapshot",
    "changes_summary",
    "created_at",
    "updated_at",
    "approved_at",
];

/// Repository interface for version rows.
pub trait VersionRepository {
    /// Inserts a new draft.
    fn create_version(
        &self,
        name: &str,
        description: Option<&str>,
        snapshot: &[EmployeeSnapshot],
        summary: &ChangesSummary,
    ) -> RepoResult<OrgVersion>;
    fn get_version(&self, id: VersionId) -> RepoResult<Option<OrgVersion>>;
    fn list_versions(&self) -> RepoResult<Vec<OrgVersion>>;
    /// Rewrites name, description, snapshot and summary. Bumps `updated_at`.
    fn update_version(&self, version: &OrgVersion) -> RepoResult<()>;
    /// Moves status and stamps `approved_at` when given.
    fn set_status(
        &self,
        id: VersionId,
        status: VersionStatus,
        approved_at: Option<i64>,
    ) -> RepoResult<()>;
    fn delete_version(&self, id: VersionId) -> RepoResult<()>;
}

/// SQLite-backed version repository.
pub struct SqliteVersionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteVersionRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_table_ready(conn, "org_versions", VERSION_COLUMNS)?;
        Ok(Self { conn })
    }

    pub(crate) fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl VersionRepository for SqliteVersionRepository<'_> {
    fn create_version(
        &self,
        name: &str,
        description: Option<&str>,
        snapshot: &[EmployeeSnapshot],
        summary: &ChangesSummary,
    ) -> RepoResult<OrgVersion> {
        self.conn.execute(
            "INSERT INTO org_versions (name, description, status, snapshot, changes_summary)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                name,
                description,
                VersionStatus::Draft.as_str(),
                serde_json::to_string(snapshot)?,
                serde_json::to_string(summary)?,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        self.get_version(id)?
            .ok_or(RepoError::not_found("org_version", id))
    }

    fn get_version(&self, id: VersionId) -> RepoResult<Option<OrgVersion>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{VERSION_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_version_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_versions(&self) -> RepoResult<Vec<OrgVersion>> {
        let mut stmt = self.conn.prepare(&format!(
            "{VERSION_SELECT_SQL} ORDER BY updated_at DESC, id DESC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_version_row(row)?);
        }
        Ok(items)
    }

    fn update_version(&self, version: &OrgVersion) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE org_versions
             SET
                name = ?1,
                description = ?2,
                snapshot = ?3,
                changes_summary = ?4,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?5;",
            params![
                version.name.as_str(),
                version.description.as_deref(),
                serde_json::to_string(&version.snapshot)?,
                serde_json::to_string(&version.changes_summary)?,
                version.id,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("org_version", version.id));
        }
        Ok(())
    }

    fn set_status(
        &self,
        id: VersionId,
        status: VersionStatus,
        approved_at: Option<i64>,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE org_versions
             SET
                status = ?1,
                approved_at = COALESCE(?2, approved_at),
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?3;",
            params![status.as_str(), approved_at, id],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("org_version", id));
        }
        Ok(())
    }

    fn delete_version(&self, id: VersionId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM org_versions WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::not_found("org_version", id));
        }
        Ok(())
    }
}

fn parse_version_row(row: &Row<'_>) -> RepoResult<OrgVersion> {
    let status_text: String = row.get("status")?;
    let status = VersionStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid status `{status_text}` in org_versions.status"
        ))
    })?;

    let snapshot_text: String = row.get("snapshot")?;
    let snapshot: Vec<EmployeeSnapshot> = serde_json::from_str(&snapshot_text)?;

    let summary_text: Option<String> = row.get("changes_summary")?;
    let changes_summary = match summary_text {
        Some(text) => serde_json::from_str(&text)?,
        None => ChangesSummary::default(),
    };

    Ok(OrgVersion {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        status,
        snapshot,
        changes_summary,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        approved_at: row.get("approved_at")?,
    })
}
