//! Employee repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist live employee rows and the supervisor edges between them.
//! - Load the hierarchy graph and full snapshots inside the caller's
//!   transaction.
//!
//! # Invariants
//! - Listing order is deterministic: `id ASC`.
//! - `permissions` is stored as a JSON array in one text column.
//! - Snapshot replay only overwrites chart fields (name, role, sector,
//!   sub-sector, level, sub-level, supervisor).

use crate::graph::hierarchy::HierarchyGraph;
use crate::model::employee::{Employee, EmployeeId, NewEmployee};
use crate::model::org::{LevelId, SectorId};
use crate::model::version::EmployeeSnapshot;
use crate::repo::{ensure_table_ready, RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const EMPLOYEE_SELECT_SQL: &str = "SELECT
    id,
    name,
    role_title,
    sector_id,
    sub_sector_id,
    level_id,
    sub_level_id,
    supervisor_id,
    permissions,
    photo_url,
    email,
    phone,
    created_at,
    updated_at
FROM employees";

const EMPLOYEE_COLUMNS: &[&str] = &[
    "id",
    "name",
    "role_title",
    "sector_id",
    "sub_sector_id",
    "level_id",
    "sub_level_id",
    "supervisor_id",
    "permissions",
    "photo_url",
    "email",
    "phone",
    "created_at",
    "updated_at",
];

/// Filters for listing employees.
#[derive(Debug, Clone, Default)]
pub struct EmployeeListQuery {
    pub sector_id: Option<SectorId>,
    pub level_id: Option<LevelId>,
}

/// Repository interface for employee rows.
pub trait EmployeeRepository {
    fn create_employee(&self, employee: &NewEmployee) -> RepoResult<Employee>;
    /// Overwrites every mutable column of an existing row.
    fn update_employee(&self, employee: &Employee) -> RepoResult<()>;
    fn get_employee(&self, id: EmployeeId) -> RepoResult<Option<Employee>>;
    fn list_employees(&self, query: &EmployeeListQuery) -> RepoResult<Vec<Employee>>;
    /// Direct reports of `supervisor_id`.
    fn list_by_supervisor(&self, supervisor_id: EmployeeId) -> RepoResult<Vec<Employee>>;
    fn delete_employee(&self, id: EmployeeId) -> RepoResult<()>;
    fn count_employees(&self) -> RepoResult<u64>;
    /// Loads every supervisor edge.
    fn load_hierarchy(&self) -> RepoResult<HierarchyGraph>;
    /// Copies every live employee into snapshot form, `id ASC`.
    fn snapshot_all(&self) -> RepoResult<Vec<EmployeeSnapshot>>;
    /// Replays chart fields of one snapshot record onto its live row.
    ///
    /// Returns `false` when no live row has that id.
    fn apply_snapshot_record(&self, record: &EmployeeSnapshot) -> RepoResult<bool>;
}

/// SQLite-backed employee repository.
pub struct SqliteEmployeeRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEmployeeRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_table_ready(conn, "employees", EMPLOYEE_COLUMNS)?;
        Ok(Self { conn })
    }

    /// Creates repository over a connection already checked by the caller.
    pub(crate) fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl EmployeeRepository for SqliteEmployeeRepository<'_> {
    fn create_employee(&self, employee: &NewEmployee) -> RepoResult<Employee> {
        employee.validate()?;

        self.conn.execute(
            "INSERT INTO employees (
                name,
                role_title,
                sector_id,
                sub_sector_id,
                level_id,
                sub_level_id,
                supervisor_id,
                permissions,
                photo_url,
                email,
                phone
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
            params![
                employee.name.trim(),
                employee.role_title.trim(),
                employee.sector_id,
                employee.sub_sector_id,
                employee.level_id,
                employee.sub_level_id,
                employee.supervisor_id,
                serde_json::to_string(&employee.permissions)?,
                employee.photo_url.as_deref(),
                employee.email.as_deref(),
                employee.phone.as_deref(),
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        self.get_employee(id)?
            .ok_or(RepoError::not_found("employee", id))
    }

    fn update_employee(&self, employee: &Employee) -> RepoResult<()> {
        employee.validate()?;

        let changed = self.conn.execute(
            "UPDATE employees
             SET
                name = ?1,
                role_title = ?2,
                sector_id = ?3,
                sub_sector_id = ?4,
                level_id = ?5,
                sub_level_id = ?6,
                supervisor_id = ?7,
                permissions = ?8,
                photo_url = ?9,
                email = ?10,
                phone = ?11,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?12;",
            params![
                employee.name.as_str(),
                employee.role_title.as_str(),
                employee.sector_id,
                employee.sub_sector_id,
                employee.level_id,
                employee.sub_level_id,
                employee.supervisor_id,
                serde_json::to_string(&employee.permissions)?,
                employee.photo_url.as_deref(),
                employee.email.as_deref(),
                employee.phone.as_deref(),
                employee.id,
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::not_found("employee", employee.id));
        }
        Ok(())
    }

    fn get_employee(&self, id: EmployeeId) -> RepoResult<Option<Employee>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{EMPLOYEE_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_employee_row(row)?));
        }
        Ok(None)
    }

    fn list_employees(&self, query: &EmployeeListQuery) -> RepoResult<Vec<Employee>> {
        let mut sql = format!("{EMPLOYEE_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(sector_id) = query.sector_id {
            sql.push_str(" AND sector_id = ?");
            bind_values.push(Value::Integer(sector_id));
        }
        if let Some(level_id) = query.level_id {
            sql.push_str(" AND level_id = ?");
            bind_values.push(Value::Integer(level_id));
        }
        sql.push_str(" ORDER BY id ASC;");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_employee_row(row)?);
        }
        Ok(items)
    }

    fn list_by_supervisor(&self, supervisor_id: EmployeeId) -> RepoResult<Vec<Employee>> {
        let mut stmt = self.conn.prepare(&format!(
            "{EMPLOYEE_SELECT_SQL} WHERE supervisor_id = ?1 ORDER BY id ASC;"
        ))?;
        let mut rows = stmt.query([supervisor_id])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_employee_row(row)?);
        }
        Ok(items)
    }

    fn delete_employee(&self, id: EmployeeId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM employees WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::not_found("employee", id));
        }
        Ok(())
    }

    fn count_employees(&self) -> RepoResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM employees;", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn load_hierarchy(&self) -> RepoResult<HierarchyGraph> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, supervisor_id FROM employees;")?;
        let mut rows = stmt.query([])?;
        let mut edges = Vec::new();
        while let Some(row) = rows.next()? {
            let id: EmployeeId = row.get(0)?;
            let supervisor_id: Option<EmployeeId> = row.get(1)?;
            edges.push((id, supervisor_id));
        }
        Ok(HierarchyGraph::from_edges(edges))
    }

    fn snapshot_all(&self) -> RepoResult<Vec<EmployeeSnapshot>> {
        let employees = self.list_employees(&EmployeeListQuery::default())?;
        Ok(employees.iter().map(EmployeeSnapshot::from).collect())
    }

    fn apply_snapshot_record(&self, record: &EmployeeSnapshot) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE employees
             SET
                name = ?2,
                role_title = ?3,
                sector_id = ?4,
                sub_sector_id = ?5,
                level_id = ?6,
                sub_level_id = ?7,
                supervisor_id = ?8,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![
                record.id,
                record.name.as_str(),
                record.role_title.as_str(),
                record.sector_id,
                record.sub_sector_id,
                record.level_id,
                record.sub_level_id,
                record.supervisor_id,
            ],
        )?;
        Ok(changed > 0)
    }
}

fn parse_employee_row(row: &Row<'_>) -> RepoResult<Employee> {
    let permissions_text: String = row.get("permissions")?;
    let permissions: Vec<String> = serde_json::from_str(&permissions_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid permissions `{permissions_text}` in employees.permissions"
        ))
    })?;

    Ok(Employee {
        id: row.get("id")?,
        name: row.get("name")?,
        role_title: row.get("role_title")?,
        sector_id: row.get("sector_id")?,
        sub_sector_id: row.get("sub_sector_id")?,
        level_id: row.get("level_id")?,
        sub_level_id: row.get("sub_level_id")?,
        supervisor_id: row.get("supervisor_id")?,
        permissions,
        photo_url: row.get("photo_url")?,
        email: row.get("email")?,
        phone: row.get("phone")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
