//! Allocation use-case service with the per-sector capacity guard.
//!
//! # Responsibility
//! - Create, update, list and delete employee-to-project allocations.
//! - Enforce the concurrent-project ceiling of the employee's sector on
//!   creation and on reactivation.
//!
//! # Invariants
//! - At most one active allocation per (employee, project); checked at
//!   creation only.
//! - The capacity count is distinct projects among active allocations.
//! - Checks and the write share one `IMMEDIATE` transaction, so two
//!   concurrent creations can not both pass against the same count.

use crate::config::{normalize_sector_name, SectorCapacityPolicy};
use crate::model::allocation::{
    Allocation, AllocationId, AllocationPatch, AllocationStatus, NewAllocation,
};
use crate::model::employee::EmployeeId;
use crate::model::org::SectorId;
use crate::model::project::ProjectId;
use crate::model::validation::ValidationError;
use crate::repo::allocation_repo::{
    AllocationListQuery, AllocationRepository, SqliteAllocationRepository,
};
use crate::repo::employee_repo::{EmployeeRepository, SqliteEmployeeRepository};
use crate::repo::org_repo::{OrgRepository, SqliteOrgRepository};
use crate::repo::project_repo::{ProjectRepository, SqliteProjectRepository};
use crate::repo::RepoError;
use crate::service::{begin_read, begin_write, log_outcome, ServiceFailure};
use rusqlite::Connection;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

const MODULE: &str = "allocation";

/// Errors from allocation operations.
#[derive(Debug)]
pub enum AllocationError {
    InvalidInput(ValidationError),
    EmployeeNotFound(EmployeeId),
    /// Employee references a sector row that no longer exists.
    SectorNotFound {
        employee_id: EmployeeId,
        sector_id: SectorId,
    },
    ProjectNotFound(ProjectId),
    AllocationNotFound(AllocationId),
    /// An active allocation already binds this employee to this project.
    DuplicateActiveAllocation {
        employee_id: EmployeeId,
        project_id: ProjectId,
    },
    /// Employee already sits at the sector ceiling.
    CapacityExceeded {
        employee_id: EmployeeId,
        employee_name: String,
        sector_name: String,
        active_projects: u32,
        ceiling: u32,
    },
    Repo(RepoError),
}

impl Display for AllocationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(err) => write!(f, "{err}"),
            Self::EmployeeNotFound(id) => write!(f, "employee not found: {id}"),
            Self::SectorNotFound {
                employee_id,
                sector_id,
            } => write!(
                f,
                "sector {sector_id} of employee {employee_id} not found"
            ),
            Self::ProjectNotFound(id) => write!(f, "project not found: {id}"),
            Self::AllocationNotFound(id) => write!(f, "allocation not found: {id}"),
            Self::DuplicateActiveAllocation {
                employee_id,
                project_id,
            } => write!(
                f,
                "employee {employee_id} already has an active allocation on project {project_id}"
            ),
            Self::CapacityExceeded {
                employee_name,
                sector_name,
                active_projects,
                ceiling,
                ..
            } => write!(
                f,
                "{employee_name} ({sector_name}) already has {active_projects} active projects; limit is {ceiling} concurrent projects"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AllocationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidInput(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for AllocationError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::InvalidInput(err),
            other => Self::Repo(other),
        }
    }
}

impl From<rusqlite::Error> for AllocationError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(value.into())
    }
}

impl From<ValidationError> for AllocationError {
    fn from(value: ValidationError) -> Self {
        Self::InvalidInput(value)
    }
}

impl ServiceFailure for AllocationError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::EmployeeNotFound(_) => "employee_not_found",
            Self::SectorNotFound { .. } => "sector_not_found",
            Self::ProjectNotFound(_) => "project_not_found",
            Self::AllocationNotFound(_) => "allocation_not_found",
            Self::DuplicateActiveAllocation { .. } => "duplicate_active_allocation",
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::Repo(RepoError::Conflict(_)) => "integrity_conflict",
            Self::Repo(_) => "storage_failure",
        }
    }

    fn is_storage(&self) -> bool {
        matches!(self, Self::Repo(err) if !matches!(err, RepoError::Conflict(_)))
    }
}

/// Outcome of a passed capacity check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapacityCheck {
    pub employee_id: EmployeeId,
    /// Normalized sector name the ceiling was looked up with.
    pub sector_name: String,
    pub active_projects: u32,
    pub ceiling: u32,
}

impl CapacityCheck {
    /// Projects the employee can still take before hitting the ceiling.
    pub fn remaining(&self) -> u32 {
        self.ceiling.saturating_sub(self.active_projects)
    }
}

/// Allocation service facade.
pub struct AllocationService<'conn> {
    conn: &'conn Connection,
    capacity: SectorCapacityPolicy,
}

impl<'conn> AllocationService<'conn> {
    /// Creates service over a migrated connection.
    pub fn try_new(
        conn: &'conn Connection,
        capacity: SectorCapacityPolicy,
    ) -> Result<Self, AllocationError> {
        SqliteAllocationRepository::try_new(conn)?;
        SqliteEmployeeRepository::try_new(conn)?;
        SqliteProjectRepository::try_new(conn)?;
        SqliteOrgRepository::try_new(conn)?;
        Ok(Self { conn, capacity })
    }

    /// Checks whether `employee_id` may take one more project.
    ///
    /// The employee is resolved before the project.
    pub fn validate_assignment(
        &self,
        employee_id: EmployeeId,
        project_id: ProjectId,
    ) -> Result<CapacityCheck, AllocationError> {
        let tx = begin_read(self.conn)?;
        if SqliteEmployeeRepository::new(&tx)
            .get_employee(employee_id)?
            .is_none()
        {
            return Err(AllocationError::EmployeeNotFound(employee_id));
        }
        if SqliteProjectRepository::new(&tx)
            .get_project(project_id)?
            .is_none()
        {
            return Err(AllocationError::ProjectNotFound(project_id));
        }
        self.check_capacity(&tx, employee_id)
    }

    /// Creates one allocation.
    ///
    /// Order of checks: employee, project, duplicate active pair, capacity.
    /// Both the duplicate and the capacity check run whatever status the
    /// new allocation carries.
    pub fn create_allocation(
        &self,
        input: &NewAllocation,
    ) -> Result<Allocation, AllocationError> {
        let started_at = Instant::now();
        let result = self.create_allocation_inner(input);
        log_outcome(
            "allocation_create",
            MODULE,
            result.as_ref().ok().map(|allocation| allocation.id),
            started_at,
            &result,
        );
        result
    }

    fn create_allocation_inner(
        &self,
        input: &NewAllocation,
    ) -> Result<Allocation, AllocationError> {
        input.validate()?;

        let tx = begin_write(self.conn)?;
        let employees = SqliteEmployeeRepository::new(&tx);
        let projects = SqliteProjectRepository::new(&tx);
        let allocations = SqliteAllocationRepository::new(&tx);

        if employees.get_employee(input.employee_id)?.is_none() {
            return Err(AllocationError::EmployeeNotFound(input.employee_id));
        }
        if projects.get_project(input.project_id)?.is_none() {
            return Err(AllocationError::ProjectNotFound(input.project_id));
        }
        if !allocations
            .list_active_by_project_employee(input.project_id, input.employee_id)?
            .is_empty()
        {
            return Err(AllocationError::DuplicateActiveAllocation {
                employee_id: input.employee_id,
                project_id: input.project_id,
            });
        }
        self.check_capacity(&tx, input.employee_id)?;

        let created = allocations.create_allocation(input)?;
        tx.commit()?;
        Ok(created)
    }

    /// Applies a field-level patch.
    ///
    /// Moving a non-active allocation back to `Active` re-runs the capacity
    /// check; the duplicate check is not repeated.
    pub fn update_allocation(
        &self,
        allocation_id: AllocationId,
        patch: &AllocationPatch,
    ) -> Result<Allocation, AllocationError> {
        let started_at = Instant::now();
        let result = self.update_allocation_inner(allocation_id, patch);
        log_outcome(
            "allocation_update",
            MODULE,
            Some(allocation_id),
            started_at,
            &result,
        );
        result
    }

    fn update_allocation_inner(
        &self,
        allocation_id: AllocationId,
        patch: &AllocationPatch,
    ) -> Result<Allocation, AllocationError> {
        let tx = begin_write(self.conn)?;
        let allocations = SqliteAllocationRepository::new(&tx);

        let mut allocation = allocations
            .get_allocation(allocation_id)?
            .ok_or(AllocationError::AllocationNotFound(allocation_id))?;

        let reactivating =
            patch.status == Some(AllocationStatus::Active) && !allocation.is_active();
        if reactivating {
            self.check_capacity(&tx, allocation.employee_id)?;
        }

        patch.apply_to(&mut allocation);
        allocation.validate()?;
        allocations.update_allocation(&allocation)?;

        let updated = allocations
            .get_allocation(allocation_id)?
            .ok_or(AllocationError::AllocationNotFound(allocation_id))?;
        tx.commit()?;
        Ok(updated)
    }

    pub fn get_allocation(
        &self,
        allocation_id: AllocationId,
    ) -> Result<Allocation, AllocationError> {
        SqliteAllocationRepository::new(self.conn)
            .get_allocation(allocation_id)?
            .ok_or(AllocationError::AllocationNotFound(allocation_id))
    }

    pub fn list_allocations(
        &self,
        query: &AllocationListQuery,
    ) -> Result<Vec<Allocation>, AllocationError> {
        SqliteAllocationRepository::new(self.conn)
            .list_allocations(query)
            .map_err(Into::into)
    }

    pub fn delete_allocation(&self, allocation_id: AllocationId) -> Result<(), AllocationError> {
        let started_at = Instant::now();
        let result = self.delete_allocation_inner(allocation_id);
        log_outcome(
            "allocation_delete",
            MODULE,
            Some(allocation_id),
            started_at,
            &result,
        );
        result
    }

    fn delete_allocation_inner(&self, allocation_id: AllocationId) -> Result<(), AllocationError> {
        let tx = begin_write(self.conn)?;
        let allocations = SqliteAllocationRepository::new(&tx);
        if allocations.get_allocation(allocation_id)?.is_none() {
            return Err(AllocationError::AllocationNotFound(allocation_id));
        }
        allocations.delete_allocation(allocation_id)?;
        tx.commit()?;
        Ok(())
    }

    fn check_capacity(
        &self,
        conn: &Connection,
        employee_id: EmployeeId,
    ) -> Result<CapacityCheck, AllocationError> {
        let employee = SqliteEmployeeRepository::new(conn)
            .get_employee(employee_id)?
            .ok_or(AllocationError::EmployeeNotFound(employee_id))?;
        let sector = SqliteOrgRepository::new(conn)
            .get_sector(employee.sector_id)?
            .ok_or(AllocationError::SectorNotFound {
                employee_id,
                sector_id: employee.sector_id,
            })?;

        let sector_name = normalize_sector_name(&sector.name);
        let ceiling = self.capacity.ceiling_for(&sector_name);
        let active_projects =
            SqliteAllocationRepository::new(conn).count_active_projects(employee_id)?;
        if active_projects >= ceiling {
            return Err(AllocationError::CapacityExceeded {
                employee_id,
                employee_name: employee.name,
                sector_name,
                active_projects,
                ceiling,
            });
        }

        Ok(CapacityCheck {
            employee_id,
            sector_name,
            active_projects,
            ceiling,
        })
    }
}
