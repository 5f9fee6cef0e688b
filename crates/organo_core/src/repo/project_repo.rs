//! Project repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist project rows and answer the lookups allocation and timeline
//!   reports need.
//!
//! # Invariants
//! - `code` is unique; duplicates surface as `RepoError::Conflict`.
//! - Dates are stored as `YYYY-MM-DD` text.
//! - Listing order is deterministic: `id ASC`.

use crate::model::project::{NewProject, Project, ProjectId, ProjectStatus};
use crate::repo::{
    date_to_db, ensure_table_ready, parse_optional_date, RepoError, RepoResult,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const PROJECT_SELECT_SQL: &str = "SELECT
    id,
    code,
    name,
    description,
    company,
    client,
    category,
    sub_category,
    kind,
    estimated_value,
    planned_start,
    planned_end,
    actual_start,
    actual_end,
    status,
    completion_percent,
    created_at,
    updated_at
FROM projects";

const PROJECT_COLUMNS: &[&str] = &[
    "id",
    "code",
    "name",
    "company",
    "client",
    "category",
    "planned_start",
    "planned_end",
    "status",
    "completion_percent",
];

/// Filters for listing projects. Every set field must match exactly.
#[derive(Debug, Clone, Default)]
pub struct ProjectListQuery {
    pub company: Option<String>,
    pub client: Option<String>,
    pub category: Option<String>,
    pub status: Option<ProjectStatus>,
}

/// Repository interface for project rows.
pub trait ProjectRepository {
    fn create_project(&self, project: &NewProject) -> RepoResult<Project>;
    fn get_project(&self, id: ProjectId) -> RepoResult<Option<Project>>;
    fn get_project_by_code(&self, code: &str) -> RepoResult<Option<Project>>;
    fn list_projects(&self, query: &ProjectListQuery) -> RepoResult<Vec<Project>>;
    fn update_project(&self, project: &Project) -> RepoResult<()>;
    fn delete_project(&self, id: ProjectId) -> RepoResult<()>;
    /// Allocations of any status that reference the project.
    fn count_allocations(&self, id: ProjectId) -> RepoResult<u64>;
}

/// SQLite-backed project repository.
pub struct SqliteProjectRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProjectRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_table_ready(conn, "projects", PROJECT_COLUMNS)?;
        Ok(Self { conn })
    }

    pub(crate) fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ProjectRepository for SqliteProjectRepository<'_> {
    fn create_project(&self, project: &NewProject) -> RepoResult<Project> {
        project.validate()?;

        self.conn.execute(
            "INSERT INTO projects (
                code,
                name,
                description,
                company,
                client,
                category,
                sub_category,
                kind,
                estimated_value,
                planned_start,
                planned_end,
                status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12);",
            params![
                project.code.trim(),
                project.name.trim(),
                project.description.as_deref(),
                project.company.trim(),
                project.client.trim(),
                project.category.trim(),
                project.sub_category.as_deref(),
                project.kind.as_deref(),
                project.estimated_value,
                project.planned_start.map(date_to_db),
                project.planned_end.map(date_to_db),
                project.status.unwrap_or(ProjectStatus::Planned).as_str(),
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        self.get_project(id)?
            .ok_or(RepoError::not_found("project", id))
    }

    fn get_project(&self, id: ProjectId) -> RepoResult<Option<Project>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PROJECT_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_project_row(row)?)),
            None => Ok(None),
        }
    }

    fn get_project_by_code(&self, code: &str) -> RepoResult<Option<Project>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PROJECT_SELECT_SQL} WHERE code = ?1;"))?;
        let mut rows = stmt.query([code.trim()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_project_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_projects(&self, query: &ProjectListQuery) -> RepoResult<Vec<Project>> {
        let mut sql = format!("{PROJECT_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(company) = &query.company {
            sql.push_str(" AND company = ?");
            bind_values.push(Value::Text(company.clone()));
        }
        if let Some(client) = &query.client {
            sql.push_str(" AND client = ?");
            bind_values.push(Value::Text(client.clone()));
        }
        if let Some(category) = &query.category {
            sql.push_str(" AND category = ?");
            bind_values.push(Value::Text(category.clone()));
        }
        if let Some(status) = query.status {
            sql.push_str(" AND status = ?");
            bind_values.push(Value::Text(status.as_str().to_string()));
        }
        sql.push_str(" ORDER BY id ASC;");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_project_row(row)?);
        }
        Ok(items)
    }

    fn update_project(&self, project: &Project) -> RepoResult<()> {
        project.validate()?;

        let changed = self.conn.execute(
            "UPDATE projects
             SET
                code = ?1,
                name = ?2,
                description = ?3,
                company = ?4,
                client = ?5,
                category = ?6,
                sub_category = ?7,
                kind = ?8,
                estimated_value = ?9,
                planned_start = ?10,
                planned_end = ?11,
                actual_start = ?12,
                actual_end = ?13,
                status = ?14,
                completion_percent = ?15,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?16;",
            params![
                project.code.as_str(),
                project.name.as_str(),
                project.description.as_deref(),
                project.company.as_str(),
                project.client.as_str(),
                project.category.as_str(),
                project.sub_category.as_deref(),
                project.kind.as_deref(),
                project.estimated_value,
                project.planned_start.map(date_to_db),
                project.planned_end.map(date_to_db),
                project.actual_start.map(date_to_db),
                project.actual_end.map(date_to_db),
                project.status.as_str(),
                i64::from(project.completion_percent),
                project.id,
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::not_found("project", project.id));
        }
        Ok(())
    }

    fn delete_project(&self, id: ProjectId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM projects WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::not_found("project", id));
        }
        Ok(())
    }

    fn count_allocations(&self, id: ProjectId) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM allocations WHERE project_id = ?1;",
            [id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

fn parse_project_row(row: &Row<'_>) -> RepoResult<Project> {
    let status_text: String = row.get("status")?;
    let status = ProjectStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid status `{status_text}` in projects.status"))
    })?;

    let completion: i64 = row.get("completion_percent")?;
    let completion_percent = u8::try_from(completion)
        .ok()
        .filter(|value| *value <= 100)
        .ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid completion `{completion}` in projects.completion_percent"
            ))
        })?;

    Ok(Project {
        id: row.get("id")?,
        code: row.get("code")?,
        name: row.get("name")?,
        description: row.get("description")?,
        company: row.get("company")?,
        client: row.get("client")?,
        category: row.get("category")?,
        sub_category: row.get("sub_category")?,
        kind: row.get("kind")?,
        estimated_value: row.get("estimated_value")?,
        planned_start: parse_optional_date(row.get("planned_start")?, "projects.planned_start")?,
        planned_end: parse_optional_date(row.get("planned_end")?, "projects.planned_end")?,
        actual_start: parse_optional_date(row.get("actual_start")?, "projects.actual_start")?,
        actual_end: parse_optional_date(row.get("actual_end")?, "projects.actual_end")?,
        status,
        completion_percent,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
