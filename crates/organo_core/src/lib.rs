//! Core domain logic for the organization chart and project allocation
//! planner.
//!
//! Owns the reporting-line graph, the draft/approve workflow for chart
//! versions, the per-sector capacity guard on allocations and the
//! occupancy reports. Every operation takes an explicit SQLite connection.

pub mod config;
pub mod db;
pub mod graph;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{normalize_sector_name, ConfigError, CoreConfig, SectorCapacityPolicy};
pub use graph::hierarchy::HierarchyGraph;
pub use logging::{init_logging, init_logging_from_config, logging_status, LogLevel, LoggingError};
pub use model::allocation::{
    Allocation, AllocationId, AllocationPatch, AllocationRole, AllocationStatus, NewAllocation,
};
pub use model::employee::{Employee, EmployeeId, EmployeePatch, NewEmployee};
pub use model::org::{Level, LevelId, Sector, SectorId, SubLevel, SubLevelId, SubSector, SubSectorId};
pub use model::project::{NewProject, Project, ProjectId, ProjectPatch, ProjectStatus};
pub use model::validation::ValidationError;
pub use model::version::{
    ChangeType, ChangesSummary, EmployeeSnapshot, OrgVersion, VersionChange, VersionId,
    VersionListItem, VersionPatch, VersionStatus,
};
pub use repo::{RepoError, RepoResult};
pub use service::allocation_service::{AllocationError, AllocationService, CapacityCheck};
pub use service::hierarchy_service::{HierarchyError, HierarchyService};
pub use service::overload_service::{
    aggregate_month, month_bounds, CompanySummary, EmployeeAvailability, GeneralSummary,
    MonthlyOccupancy, OverloadService, ReportError, TimelineItem,
};
pub use service::project_service::{ProjectError, ProjectService};
pub use service::version_service::{diff_snapshots, VersionAction, VersionError, VersionService};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
