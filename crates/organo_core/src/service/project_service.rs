//! Project use-case service.
//!
//! # Invariants
//! - Project codes are unique; checked before insert and before a code
//!   change, with the storage constraint as backstop.
//! - A project referenced by any allocation can not be deleted.

use crate::model::project::{NewProject, Project, ProjectId, ProjectPatch};
use crate::model::validation::ValidationError;
use crate::repo::project_repo::{ProjectListQuery, ProjectRepository, SqliteProjectRepository};
use crate::repo::RepoError;
use crate::service::{begin_write, log_outcome, ServiceFailure};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

const MODULE: &str = "project";

/// Errors from project operations.
#[derive(Debug)]
pub enum ProjectError {
    InvalidInput(ValidationError),
    ProjectNotFound(ProjectId),
    /// Another project already uses this code.
    DuplicateCode(String),
    /// Allocations still reference the project.
    HasAllocations { project_id: ProjectId, count: u64 },
    Repo(RepoError),
}

impl Display for ProjectError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(err) => write!(f, "{err}"),
            Self::ProjectNotFound(id) => write!(f, "project not found: {id}"),
            Self::DuplicateCode(code) => write!(f, "project code `{code}` already exists"),
            Self::HasAllocations { project_id, count } => write!(
                f,
                "project {project_id} still has {count} allocation(s)"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ProjectError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidInput(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ProjectError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::InvalidInput(err),
            other => Self::Repo(other),
        }
    }
}

impl From<rusqlite::Error> for ProjectError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(value.into())
    }
}

impl From<ValidationError> for ProjectError {
    fn from(value: ValidationError) -> Self {
        Self::InvalidInput(value)
    }
}

impl ServiceFailure for ProjectError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::ProjectNotFound(_) => "project_not_found",
            Self::DuplicateCode(_) => "duplicate_project_code",
            Self::HasAllocations { .. } => "project_has_allocations",
            Self::Repo(RepoError::Conflict(_)) => "integrity_conflict",
            Self::Repo(_) => "storage_failure",
        }
    }

    fn is_storage(&self) -> bool {
        matches!(self, Self::Repo(err) if !matches!(err, RepoError::Conflict(_)))
    }
}

/// Project service facade.
pub struct ProjectService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> ProjectService<'conn> {
    pub fn try_new(conn: &'conn Connection) -> Result<Self, ProjectError> {
        SqliteProjectRepository::try_new(conn)?;
        Ok(Self { conn })
    }

    pub fn create_project(&self, input: &NewProject) -> Result<Project, ProjectError> {
        let started_at = Instant::now();
        let result = self.create_project_inner(input);
        log_outcome(
            "project_create",
            MODULE,
            result.as_ref().ok().map(|project| project.id),
            started_at,
            &result,
        );
        result
    }

    fn create_project_inner(&self, input: &NewProject) -> Result<Project, ProjectError> {
        input.validate()?;

        let tx = begin_write(self.conn)?;
        let projects = SqliteProjectRepository::new(&tx);
        if projects.get_project_by_code(&input.code)?.is_some() {
            return Err(ProjectError::DuplicateCode(input.code.trim().to_string()));
        }
        let created = projects.create_project(input)?;
        tx.commit()?;
        Ok(created)
    }

    pub fn update_project(
        &self,
        project_id: ProjectId,
        patch: &ProjectPatch,
    ) -> Result<Project, ProjectError> {
        let started_at = Instant::now();
        let result = self.update_project_inner(project_id, patch);
        log_outcome("project_update", MODULE, Some(project_id), started_at, &result);
        result
    }

    fn update_project_inner(
        &self,
        project_id: ProjectId,
        patch: &ProjectPatch,
    ) -> Result<Project, ProjectError> {
        let tx = begin_write(self.conn)?;
        let projects = SqliteProjectRepository::new(&tx);

        let mut project = projects
            .get_project(project_id)?
            .ok_or(ProjectError::ProjectNotFound(project_id))?;
        patch.apply_to(&mut project);
        project.validate()?;

        if patch.code.is_some() {
            if let Some(other) = projects.get_project_by_code(&project.code)? {
                if other.id != project_id {
                    return Err(ProjectError::DuplicateCode(project.code));
                }
            }
        }

        projects.update_project(&project)?;
        let updated = projects
            .get_project(project_id)?
            .ok_or(ProjectError::ProjectNotFound(project_id))?;
        tx.commit()?;
        Ok(updated)
    }

    pub fn get_project(&self, project_id: ProjectId) -> Result<Project, ProjectError> {
        SqliteProjectRepository::new(self.conn)
            .get_project(project_id)?
            .ok_or(ProjectError::ProjectNotFound(project_id))
    }

    pub fn list_projects(&self, query: &ProjectListQuery) -> Result<Vec<Project>, ProjectError> {
        SqliteProjectRepository::new(self.conn)
            .list_projects(query)
            .map_err(Into::into)
    }

    pub fn delete_project(&self, project_id: ProjectId) -> Result<(), ProjectError> {
        let started_at = Instant::now();
        let result = self.delete_project_inner(project_id);
        log_outcome("project_delete", MODULE, Some(project_id), started_at, &result);
        result
    }

    fn delete_project_inner(&self, project_id: ProjectId) -> Result<(), ProjectError> {
        let tx = begin_write(self.conn)?;
        let projects = SqliteProjectRepository::new(&tx);
        if projects.get_project(project_id)?.is_none() {
            return Err(ProjectError::ProjectNotFound(project_id));
        }
        let count = projects.count_allocations(project_id)?;
        if count > 0 {
            return Err(ProjectError::HasAllocations { project_id, count });
        }
        projects.delete_project(project_id)?;
        tx.commit()?;
        Ok(())
    }
}
