//! Employee and reporting-line use-case service.
//!
//! # Responsibility
//! - Validate organization references and supervisor edges above the
//!   repository layer.
//! - Provide employee create, update, delete, list and subordinate queries.
//!
//! # Invariants
//! - Supervisor edges never form a cycle, including self-supervision.
//! - A sub-sector must belong to the employee's sector and a sub-level to
//!   the employee's level.
//! - Every check runs inside the `IMMEDIATE` transaction that writes.

use crate::graph::hierarchy::HierarchyGraph;
use crate::model::employee::{Employee, EmployeeId, EmployeePatch, NewEmployee};
use crate::model::org::{LevelId, SectorId, SubLevelId, SubSectorId};
use crate::model::validation::ValidationError;
use crate::repo::employee_repo::{
    EmployeeListQuery, EmployeeRepository, SqliteEmployeeRepository,
};
use crate::repo::org_repo::{OrgRepository, SqliteOrgRepository};
use crate::repo::{RepoError, RepoResult};
use crate::service::{begin_read, begin_write, log_outcome, ServiceFailure};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

const MODULE: &str = "hierarchy";

/// Errors from employee and hierarchy operations.
#[derive(Debug)]
pub enum HierarchyError {
    /// Field-level validation failed.
    InvalidInput(ValidationError),
    EmployeeNotFound(EmployeeId),
    /// Proposed supervisor does not exist.
    SupervisorNotFound(EmployeeId),
    SectorNotFound(SectorId),
    SubSectorNotFound(SubSectorId),
    /// Sub-sector exists but belongs to another sector.
    SubSectorNotInSector {
        sub_sector_id: SubSectorId,
        sector_id: SectorId,
    },
    LevelNotFound(LevelId),
    SubLevelNotFound(SubLevelId),
    /// Sub-level exists but belongs to another level.
    SubLevelNotInLevel {
        sub_level_id: SubLevelId,
        level_id: LevelId,
    },
    /// Assignment would make the employee its own (indirect) supervisor.
    CycleDetected {
        employee_id: EmployeeId,
        supervisor_id: EmployeeId,
    },
    /// Employee still has direct reports.
    HasSubordinates { employee_id: EmployeeId, count: usize },
    /// Repository-level failure.
    Repo(RepoError),
}

impl Display for HierarchyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(err) => write!(f, "{err}"),
            Self::EmployeeNotFound(id) => write!(f, "employee not found: {id}"),
            Self::SupervisorNotFound(id) => write!(f, "supervisor not found: {id}"),
            Self::SectorNotFound(id) => write!(f, "sector not found: {id}"),
            Self::SubSectorNotFound(id) => write!(f, "sub-sector not found: {id}"),
            Self::SubSectorNotInSector {
                sub_sector_id,
                sector_id,
            } => write!(
                f,
                "sub-sector {sub_sector_id} does not belong to sector {sector_id}"
            ),
            Self::LevelNotFound(id) => write!(f, "level not found: {id}"),
            Self::SubLevelNotFound(id) => write!(f, "sub-level not found: {id}"),
            Self::SubLevelNotInLevel {
                sub_level_id,
                level_id,
            } => write!(
                f,
                "sub-level {sub_level_id} does not belong to level {level_id}"
            ),
            Self::CycleDetected {
                employee_id,
                supervisor_id,
            } => write!(
                f,
                "assigning supervisor {supervisor_id} to employee {employee_id} would create a cycle"
            ),
            Self::HasSubordinates { employee_id, count } => write!(
                f,
                "employee {employee_id} still has {count} direct report(s)"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for HierarchyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidInput(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for HierarchyError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::InvalidInput(err),
            other => Self::Repo(other),
        }
    }
}

impl From<rusqlite::Error> for HierarchyError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(value.into())
    }
}

impl From<ValidationError> for HierarchyError {
    fn from(value: ValidationError) -> Self {
        Self::InvalidInput(value)
    }
}

impl ServiceFailure for HierarchyError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::EmployeeNotFound(_) => "employee_not_found",
            Self::SupervisorNotFound(_) => "supervisor_not_found",
            Self::SectorNotFound(_) => "sector_not_found",
            Self::SubSectorNotFound(_) => "sub_sector_not_found",
            Self::SubSectorNotInSector { .. } => "sub_sector_not_in_sector",
            Self::LevelNotFound(_) => "level_not_found",
            Self::SubLevelNotFound(_) => "sub_level_not_found",
            Self::SubLevelNotInLevel { .. } => "sub_level_not_in_level",
            Self::CycleDetected { .. } => "hierarchy_cycle",
            Self::HasSubordinates { .. } => "has_subordinates",
            Self::Repo(RepoError::Conflict(_)) => "integrity_conflict",
            Self::Repo(_) => "storage_failure",
        }
    }

    fn is_storage(&self) -> bool {
        matches!(self, Self::Repo(err) if !matches!(err, RepoError::Conflict(_)))
    }
}

/// Employee and hierarchy service facade.
pub struct HierarchyService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> HierarchyService<'conn> {
    /// Creates service over a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> Result<Self, HierarchyError> {
        SqliteEmployeeRepository::try_new(conn)?;
        SqliteOrgRepository::try_new(conn)?;
        Ok(Self { conn })
    }

    /// Creates one employee after checking organization references and the
    /// optional supervisor.
    pub fn create_employee(&self, input: &NewEmployee) -> Result<Employee, HierarchyError> {
        let started_at = Instant::now();
        let result = self.create_employee_inner(input);
        log_outcome(
            "employee_create",
            MODULE,
            result.as_ref().ok().map(|employee| employee.id),
            started_at,
            &result,
        );
        result
    }

    fn create_employee_inner(&self, input: &NewEmployee) -> Result<Employee, HierarchyError> {
        input.validate()?;

        let tx = begin_write(self.conn)?;
        let employees = SqliteEmployeeRepository::new(&tx);
        let org = SqliteOrgRepository::new(&tx);

        ensure_org_refs(
            &org,
            input.sector_id,
            input.sub_sector_id,
            input.level_id,
            input.sub_level_id,
        )?;
        if let Some(supervisor_id) = input.supervisor_id {
            if employees.get_employee(supervisor_id)?.is_none() {
                return Err(HierarchyError::SupervisorNotFound(supervisor_id));
            }
        }

        let created = employees.create_employee(input)?;
        tx.commit()?;
        Ok(created)
    }

    /// Applies a field-level patch.
    ///
    /// A patch touching the supervisor is checked for existence and cycles
    /// against the graph read in the same transaction.
    pub fn update_employee(
        &self,
        employee_id: EmployeeId,
        patch: &EmployeePatch,
    ) -> Result<Employee, HierarchyError> {
        let started_at = Instant::now();
        let result = self.update_employee_inner(employee_id, patch);
        log_outcome(
            "employee_update",
            MODULE,
            Some(employee_id),
            started_at,
            &result,
        );
        result
    }

    fn update_employee_inner(
        &self,
        employee_id: EmployeeId,
        patch: &EmployeePatch,
    ) -> Result<Employee, HierarchyError> {
        let tx = begin_write(self.conn)?;
        let employees = SqliteEmployeeRepository::new(&tx);
        let org = SqliteOrgRepository::new(&tx);

        let mut employee = employees
            .get_employee(employee_id)?
            .ok_or(HierarchyError::EmployeeNotFound(employee_id))?;
        if patch.is_empty() {
            return Ok(employee);
        }

        patch.apply_to(&mut employee);
        employee.validate()?;

        if patch.touches_org_refs() {
            ensure_org_refs(
                &org,
                employee.sector_id,
                employee.sub_sector_id,
                employee.level_id,
                employee.sub_level_id,
            )?;
        }

        if let Some(Some(supervisor_id)) = patch.supervisor_id {
            if supervisor_id != employee_id && employees.get_employee(supervisor_id)?.is_none() {
                return Err(HierarchyError::SupervisorNotFound(supervisor_id));
            }
            let graph = employees.load_hierarchy()?;
            ensure_no_cycle(&graph, employee_id, supervisor_id)?;
        }

        employees.update_employee(&employee)?;
        let updated = employees
            .get_employee(employee_id)?
            .ok_or(HierarchyError::EmployeeNotFound(employee_id))?;
        tx.commit()?;
        Ok(updated)
    }

    /// Reassigns (or clears) the supervisor of one employee.
    pub fn set_supervisor(
        &self,
        employee_id: EmployeeId,
        supervisor_id: Option<EmployeeId>,
    ) -> Result<Employee, HierarchyError> {
        self.update_employee(employee_id, &EmployeePatch::supervisor(supervisor_id))
    }

    /// Answers the cycle question against current stored edges without
    /// writing anything.
    pub fn would_create_cycle(
        &self,
        employee_id: EmployeeId,
        supervisor_id: Option<EmployeeId>,
    ) -> Result<bool, HierarchyError> {
        let tx = begin_read(self.conn)?;
        let graph = SqliteEmployeeRepository::new(&tx).load_hierarchy()?;
        Ok(graph.would_create_cycle(employee_id, supervisor_id))
    }

    pub fn get_employee(&self, employee_id: EmployeeId) -> Result<Employee, HierarchyError> {
        SqliteEmployeeRepository::new(self.conn)
            .get_employee(employee_id)?
            .ok_or(HierarchyError::EmployeeNotFound(employee_id))
    }

    pub fn list_employees(
        &self,
        query: &EmployeeListQuery,
    ) -> Result<Vec<Employee>, HierarchyError> {
        SqliteEmployeeRepository::new(self.conn)
            .list_employees(query)
            .map_err(Into::into)
    }

    /// Direct reports of one existing employee.
    pub fn list_subordinates(
        &self,
        employee_id: EmployeeId,
    ) -> Result<Vec<Employee>, HierarchyError> {
        let tx = begin_read(self.conn)?;
        let employees = SqliteEmployeeRepository::new(&tx);
        if employees.get_employee(employee_id)?.is_none() {
            return Err(HierarchyError::EmployeeNotFound(employee_id));
        }
        employees.list_by_supervisor(employee_id).map_err(Into::into)
    }

    /// Deletes one employee without direct reports.
    ///
    /// Allocations still referencing the employee surface as an integrity
    /// conflict from storage.
    pub fn delete_employee(&self, employee_id: EmployeeId) -> Result<(), HierarchyError> {
        let started_at = Instant::now();
        let result = self.delete_employee_inner(employee_id);
        log_outcome(
            "employee_delete",
            MODULE,
            Some(employee_id),
            started_at,
            &result,
        );
        result
    }

    fn delete_employee_inner(&self, employee_id: EmployeeId) -> Result<(), HierarchyError> {
        let tx = begin_write(self.conn)?;
        let employees = SqliteEmployeeRepository::new(&tx);
        if employees.get_employee(employee_id)?.is_none() {
            return Err(HierarchyError::EmployeeNotFound(employee_id));
        }
        let reports = employees.list_by_supervisor(employee_id)?;
        if !reports.is_empty() {
            return Err(HierarchyError::HasSubordinates {
                employee_id,
                count: reports.len(),
            });
        }
        employees.delete_employee(employee_id)?;
        tx.commit()?;
        Ok(())
    }

    /// Scans stored edges for a cycle, returning it when one exists.
    pub fn verify_hierarchy(&self) -> Result<Option<Vec<EmployeeId>>, HierarchyError> {
        let tx = begin_read(self.conn)?;
        let graph = SqliteEmployeeRepository::new(&tx).load_hierarchy()?;
        Ok(graph.find_cycle())
    }
}

fn ensure_no_cycle(
    graph: &HierarchyGraph,
    employee_id: EmployeeId,
    supervisor_id: EmployeeId,
) -> Result<(), HierarchyError> {
    if graph.would_create_cycle(employee_id, Some(supervisor_id)) {
        return Err(HierarchyError::CycleDetected {
            employee_id,
            supervisor_id,
        });
    }
    Ok(())
}

fn ensure_org_refs(
    org: &impl OrgRepository,
    sector_id: SectorId,
    sub_sector_id: Option<SubSectorId>,
    level_id: LevelId,
    sub_level_id: Option<SubLevelId>,
) -> Result<(), HierarchyError> {
    lookup(org.get_sector(sector_id), HierarchyError::SectorNotFound(sector_id))?;
    if let Some(sub_sector_id) = sub_sector_id {
        let sub_sector = lookup(
            org.get_sub_sector(sub_sector_id),
            HierarchyError::SubSectorNotFound(sub_sector_id),
        )?;
        if sub_sector.sector_id != sector_id {
            return Err(HierarchyError::SubSectorNotInSector {
                sub_sector_id,
                sector_id,
            });
        }
    }

    lookup(org.get_level(level_id), HierarchyError::LevelNotFound(level_id))?;
    if let Some(sub_level_id) = sub_level_id {
        let sub_level = lookup(
            org.get_sub_level(sub_level_id),
            HierarchyError::SubLevelNotFound(sub_level_id),
        )?;
        if sub_level.level_id != level_id {
            return Err(HierarchyError::SubLevelNotInLevel {
                sub_level_id,
                level_id,
            });
        }
    }
    Ok(())
}

fn lookup<T>(found: RepoResult<Option<T>>, missing: HierarchyError) -> Result<T, HierarchyError> {
    found?.ok_or(missing)
}
