//! Allocation repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist employee-to-project assignments.
//! - Provide the active-allocation counts the capacity guard needs and the
//!   period scan the occupancy aggregator needs.
//!
//! # Invariants
//! - Dates are `YYYY-MM-DD` text, so lexicographic comparison in SQL is
//!   chronological.
//! - Listing order is deterministic: `id ASC`.

use crate::model::allocation::{
    Allocation, AllocationId, AllocationRole, AllocationStatus, NewAllocation,
};
use crate::model::employee::EmployeeId;
use crate::model::project::ProjectId;
use crate::repo::{
    date_to_db, ensure_table_ready, parse_date, parse_optional_date, RepoError, RepoResult,
};
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const ALLOCATION_SELECT_SQL: &str = "SELECT
    id,
    employee_id,
    project_id,
    role,
    start_date,
    end_date,
    weekly_hours,
    dedication_percent,
    status,
    notes,
    created_at,
    updated_at
FROM allocations";

const ALLOCATION_COLUMNS: &[&str] = &[
    "id",
    "employee_id",
    "project_id",
    "role",
    "start_date",
    "end_date",
    "weekly_hours",
    "dedication_percent",
    "status",
    "notes",
    "created_at",
    "updated_at",
];

/// Filters for listing allocations.
#[derive(Debug, Clone, Default)]
pub struct AllocationListQuery {
    pub project_id: Option<ProjectId>,
    pub employee_id: Option<EmployeeId>,
    pub status: Option<AllocationStatus>,
}

/// Repository interface for allocation rows.
pub trait AllocationRepository {
    fn create_allocation(&self, allocation: &NewAllocation) -> RepoResult<Allocation>;
    fn get_allocation(&self, id: AllocationId) -> RepoResult<Option<Allocation>>;
    fn list_allocations(&self, query: &AllocationListQuery) -> RepoResult<Vec<Allocation>>;
    fn list_active_by_employee(&self, employee_id: EmployeeId) -> RepoResult<Vec<Allocation>>;
    fn list_active_by_project_employee(
        &self,
        project_id: ProjectId,
        employee_id: EmployeeId,
    ) -> RepoResult<Vec<Allocation>>;
    /// Distinct projects among the employee's active allocations.
    fn count_active_projects(&self, employee_id: EmployeeId) -> RepoResult<u32>;
    fn update_allocation(&self, allocation: &Allocation) -> RepoResult<()>;
    fn delete_allocation(&self, id: AllocationId) -> RepoResult<()>;
    /// Allocations of any status whose period touches `[first, last]`.
    fn list_overlapping_period(
        &self,
        first: NaiveDate,
        last: NaiveDate,
    ) -> RepoResult<Vec<Allocation>>;
}

/// SQLite-backed allocation repository.
pub struct SqliteAllocationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAllocationRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_table_ready(conn, "allocations", ALLOCATION_COLUMNS)?;
        Ok(Self { conn })
    }

    pub(crate) fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query_allocations(&self, sql: &str, bind_values: Vec<Value>) -> RepoResult<Vec<Allocation>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_allocation_row(row)?);
        }
        Ok(items)
    }
}

impl AllocationRepository for SqliteAllocationRepository<'_> {
    fn create_allocation(&self, allocation: &NewAllocation) -> RepoResult<Allocation> {
        allocation.validate()?;

        self.conn.execute(
            "INSERT INTO allocations (
                employee_id,
                project_id,
                role,
                start_date,
                end_date,
                weekly_hours,
                dedication_percent,
                status,
                notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                allocation.employee_id,
                allocation.project_id,
                allocation.role.as_str(),
                date_to_db(allocation.start_date),
                allocation.end_date.map(date_to_db),
                allocation.weekly_hours,
                allocation.dedication_percent,
                allocation.status.as_str(),
                allocation.notes.as_deref(),
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        self.get_allocation(id)?
            .ok_or(RepoError::not_found("allocation", id))
    }

    fn get_allocation(&self, id: AllocationId) -> RepoResult<Option<Allocation>> {
        let mut items = self.query_allocations(
            &format!("{ALLOCATION_SELECT_SQL} WHERE id = ?;"),
            vec![Value::Integer(id)],
        )?;
        Ok(items.pop())
    }

    fn list_allocations(&self, query: &AllocationListQuery) -> RepoResult<Vec<Allocation>> {
        let mut sql = format!("{ALLOCATION_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(project_id) = query.project_id {
            sql.push_str(" AND project_id = ?");
            bind_values.push(Value::Integer(project_id));
        }
        if let Some(employee_id) = query.employee_id {
            sql.push_str(" AND employee_id = ?");
            bind_values.push(Value::Integer(employee_id));
        }
        if let Some(status) = query.status {
            sql.push_str(" AND status = ?");
            bind_values.push(Value::Text(status.as_str().to_string()));
        }
        sql.push_str(" ORDER BY id ASC;");

        self.query_allocations(&sql, bind_values)
    }

    fn list_active_by_employee(&self, employee_id: EmployeeId) -> RepoResult<Vec<Allocation>> {
        self.list_allocations(&AllocationListQuery {
            employee_id: Some(employee_id),
            status: Some(AllocationStatus::Active),
            ..AllocationListQuery::default()
        })
    }

    fn list_active_by_project_employee(
        &self,
        project_id: ProjectId,
        employee_id: EmployeeId,
    ) -> RepoResult<Vec<Allocation>> {
        self.list_allocations(&AllocationListQuery {
            project_id: Some(project_id),
            employee_id: Some(employee_id),
            status: Some(AllocationStatus::Active),
        })
    }

    fn count_active_projects(&self, employee_id: EmployeeId) -> RepoResult<u32> {
        let count: u32 = self.conn.query_row(
            "SELECT COUNT(DISTINCT project_id)
             FROM allocations
             WHERE employee_id = ?1 AND status = 'active';",
            [employee_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn update_allocation(&self, allocation: &Allocation) -> RepoResult<()> {
        allocation.validate()?;

        let changed = self.conn.execute(
            "UPDATE allocations
             SET
                role = ?1,
                start_date = ?2,
                end_date = ?3,
                weekly_hours = ?4,
                dedication_percent = ?5,
                status = ?6,
                notes = ?7,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?8;",
            params![
                allocation.role.as_str(),
                date_to_db(allocation.start_date),
                allocation.end_date.map(date_to_db),
                allocation.weekly_hours,
                allocation.dedication_percent,
                allocation.status.as_str(),
                allocation.notes.as_deref(),
                allocation.id,
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::not_found("allocation", allocation.id));
        }
        Ok(())
    }

    fn delete_allocation(&self, id: AllocationId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM allocations WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::not_found("allocation", id));
        }
        Ok(())
    }

    fn list_overlapping_period(
        &self,
        first: NaiveDate,
        last: NaiveDate,
    ) -> RepoResult<Vec<Allocation>> {
        self.query_allocations(
            &format!(
                "{ALLOCATION_SELECT_SQL}
                 WHERE start_date <= ?
                   AND (end_date IS NULL OR end_date >= ?)
                 ORDER BY id ASC;"
            ),
            vec![Value::Text(date_to_db(last)), Value::Text(date_to_db(first))],
        )
    }
}

fn parse_allocation_row(row: &Row<'_>) -> RepoResult<Allocation> {
    let role_text: String = row.get("role")?;
    let role = AllocationRole::parse(&role_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid role `{role_text}` in allocations.role"))
    })?;

    let status_text: String = row.get("status")?;
    let status = AllocationStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid status `{status_text}` in allocations.status"
        ))
    })?;

    let start_text: String = row.get("start_date")?;

    Ok(Allocation {
        id: row.get("id")?,
        employee_id: row.get("employee_id")?,
        project_id: row.get("project_id")?,
        role,
        start_date: parse_date(&start_text, "allocations.start_date")?,
        end_date: parse_optional_date(row.get("end_date")?, "allocations.end_date")?,
        weekly_hours: row.get("weekly_hours")?,
        dedication_percent: row.get("dedication_percent")?,
        status,
        notes: row.get("notes")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
