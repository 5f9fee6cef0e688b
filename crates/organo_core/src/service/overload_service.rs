//! Occupancy aggregation and dashboard reports.
//!
//! # Responsibility
//! - Aggregate allocation dedication into monthly occupancy for a year.
//! - Build the portfolio summary, per-company summary, availability and
//!   timeline reports.
//!
//! # Invariants
//! - Monthly occupancy counts every allocation whose period touches the
//!   month, regardless of status.
//! - The mean divides by the whole workforce, so idle employees count as 0%.
//! - Every report reads inside one deferred transaction.

use crate::model::allocation::{Allocation, AllocationStatus};
use crate::model::employee::EmployeeId;
use crate::model::org::SectorId;
use crate::model::project::{Project, ProjectId, ProjectStatus};
use crate::repo::allocation_repo::{
    AllocationListQuery, AllocationRepository, SqliteAllocationRepository,
};
use crate::repo::employee_repo::{
    EmployeeListQuery, EmployeeRepository, SqliteEmployeeRepository,
};
use crate::repo::org_repo::{OrgRepository, SqliteOrgRepository};
use crate::repo::project_repo::{ProjectListQuery, ProjectRepository, SqliteProjectRepository};
use crate::repo::RepoError;
use crate::service::begin_read;
use chrono::NaiveDate;
use log::info;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

const MONTH_LABELS: [&str; 12] = [
    "Jan", "Fev", "Mar", "Abr", "Mai", "Jun", "Jul", "Ago", "Set", "Out", "Nov", "Dez",
];
const FULL_OCCUPANCY: f64 = 100.0;
const UNKNOWN_SECTOR: &str = "N/A";

/// Errors from report queries.
#[derive(Debug)]
pub enum ReportError {
    /// Year outside the supported calendar range.
    InvalidYear(i32),
    Repo(RepoError),
}

impl Display for ReportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidYear(year) => write!(f, "unsupported year: {year}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ReportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::InvalidYear(_) => None,
        }
    }
}

impl From<RepoError> for ReportError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<rusqlite::Error> for ReportError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(value.into())
    }
}

/// Workforce occupancy for one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyOccupancy {
    /// 1..=12.
    pub month: u32,
    pub month_label: &'static str,
    pub total_allocations: usize,
    /// Distinct employees with at least one allocation in the month.
    pub total_people: usize,
    /// Mean dedication over the whole workforce, one decimal.
    pub occupancy_percent: f64,
    pub overloaded: bool,
}

/// Portfolio-wide counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneralSummary {
    pub total_projects: usize,
    pub in_progress_projects: usize,
    pub planned_projects: usize,
    pub completed_projects: usize,
    pub total_portfolio_value: f64,
    pub total_employees: u64,
    /// Distinct employees with an active allocation.
    pub allocated_employees: usize,
    pub allocated_workforce_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanySummary {
    pub company: String,
    pub total_projects: usize,
    pub in_progress_projects: usize,
    pub completed_projects: usize,
    pub total_value: f64,
    pub allocated_employees: usize,
}

/// Current load of one employee from active allocations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmployeeAvailability {
    pub employee_id: EmployeeId,
    pub name: String,
    pub role_title: String,
    pub sector_name: String,
    /// Summed dedication, capped at 100.
    pub occupied_percent: f64,
    pub active_allocations: usize,
    pub available: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineItem {
    pub project_id: ProjectId,
    pub code: String,
    pub name: String,
    pub company: String,
    pub category: String,
    pub planned_start: Option<NaiveDate>,
    pub planned_end: Option<NaiveDate>,
    pub status: ProjectStatus,
    pub completion_percent: u8,
    pub active_allocations: usize,
}

/// First and last day of `month` in `year`.
pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let last = if month == 12 {
        NaiveDate::from_ymd_opt(year, 12, 31)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?.pred_opt()?
    };
    Some((first, last))
}

/// Aggregates one month from a pool of allocations.
///
/// Rows outside `[first, last]` are ignored, so the caller may pass a whole
/// year at once.
pub fn aggregate_month(
    month: u32,
    first: NaiveDate,
    last: NaiveDate,
    allocations: &[Allocation],
    total_employees: u64,
) -> MonthlyOccupancy {
    let mut per_employee: HashMap<EmployeeId, f64> = HashMap::new();
    let mut total_allocations = 0;
    for allocation in allocations
        .iter()
        .filter(|allocation| allocation.overlaps(first, last))
    {
        total_allocations += 1;
        *per_employee.entry(allocation.employee_id).or_insert(0.0) +=
            allocation.dedication_percent;
    }

    let mean = if total_employees == 0 {
        0.0
    } else {
        per_employee.values().sum::<f64>() / total_employees as f64
    };

    MonthlyOccupancy {
        month,
        month_label: MONTH_LABELS[(month.max(1) as usize - 1) % 12],
        total_allocations,
        total_people: per_employee.len(),
        occupancy_percent: round_one_decimal(mean),
        overloaded: mean > FULL_OCCUPANCY,
    }
}

/// Nearest one-decimal value to the exact binary input, ties to even.
fn round_one_decimal(value: f64) -> f64 {
    format!("{value:.1}").parse().unwrap_or(value)
}

/// Report service facade.
pub struct OverloadService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> OverloadService<'conn> {
    pub fn try_new(conn: &'conn Connection) -> Result<Self, ReportError> {
        SqliteAllocationRepository::try_new(conn)?;
        SqliteEmployeeRepository::try_new(conn)?;
        SqliteProjectRepository::try_new(conn)?;
        SqliteOrgRepository::try_new(conn)?;
        Ok(Self { conn })
    }

    /// Twelve records, January to December.
    pub fn monthly_occupancy(&self, year: i32) -> Result<Vec<MonthlyOccupancy>, ReportError> {
        let started_at = Instant::now();
        let (year_start, _) = month_bounds(year, 1).ok_or(ReportError::InvalidYear(year))?;
        let (_, year_end) = month_bounds(year, 12).ok_or(ReportError::InvalidYear(year))?;

        let tx = begin_read(self.conn)?;
        let total_employees = SqliteEmployeeRepository::new(&tx).count_employees()?;
        let allocations =
            SqliteAllocationRepository::new(&tx).list_overlapping_period(year_start, year_end)?;

        let mut months = Vec::with_capacity(12);
        for month in 1..=12 {
            let (first, last) = month_bounds(year, month).ok_or(ReportError::InvalidYear(year))?;
            months.push(aggregate_month(
                month,
                first,
                last,
                &allocations,
                total_employees,
            ));
        }

        info!(
            "event=report_occupancy module=report status=ok year={} overloaded_months={} duration_ms={}",
            year,
            months.iter().filter(|month| month.overloaded).count(),
            started_at.elapsed().as_millis()
        );
        Ok(months)
    }

    pub fn general_summary(&self) -> Result<GeneralSummary, ReportError> {
        let tx = begin_read(self.conn)?;
        let projects =
            SqliteProjectRepository::new(&tx).list_projects(&ProjectListQuery::default())?;
        let total_employees = SqliteEmployeeRepository::new(&tx).count_employees()?;
        let active = SqliteAllocationRepository::new(&tx).list_allocations(&active_only())?;

        let allocated_employees = active
            .iter()
            .map(|allocation| allocation.employee_id)
            .collect::<HashSet<_>>()
            .len();
        let allocated_workforce_percent = if total_employees == 0 {
            0.0
        } else {
            round_one_decimal(allocated_employees as f64 / total_employees as f64 * 100.0)
        };

        Ok(GeneralSummary {
            total_projects: projects.len(),
            in_progress_projects: count_status(&projects, ProjectStatus::InProgress),
            planned_projects: count_status(&projects, ProjectStatus::Planned),
            completed_projects: count_status(&projects, ProjectStatus::Completed),
            total_portfolio_value: total_value(projects.iter()),
            total_employees,
            allocated_employees,
            allocated_workforce_percent,
        })
    }

    /// One summary per company, ordered by company name.
    pub fn company_summaries(&self) -> Result<Vec<CompanySummary>, ReportError> {
        let tx = begin_read(self.conn)?;
        let projects =
            SqliteProjectRepository::new(&tx).list_projects(&ProjectListQuery::default())?;
        let active = SqliteAllocationRepository::new(&tx).list_allocations(&active_only())?;

        let mut by_company: BTreeMap<&str, Vec<&Project>> = BTreeMap::new();
        for project in &projects {
            by_company
                .entry(project.company.as_str())
                .or_default()
                .push(project);
        }

        let summaries = by_company
            .into_iter()
            .map(|(company, company_projects)| {
                let ids: HashSet<ProjectId> =
                    company_projects.iter().map(|project| project.id).collect();
                let allocated_employees = active
                    .iter()
                    .filter(|allocation| ids.contains(&allocation.project_id))
                    .map(|allocation| allocation.employee_id)
                    .collect::<HashSet<_>>()
                    .len();
                CompanySummary {
                    company: company.to_string(),
                    total_projects: company_projects.len(),
                    in_progress_projects: company_projects
                        .iter()
                        .filter(|project| project.status == ProjectStatus::InProgress)
                        .count(),
                    completed_projects: company_projects
                        .iter()
                        .filter(|project| project.status == ProjectStatus::Completed)
                        .count(),
                    total_value: total_value(company_projects.iter().copied()),
                    allocated_employees,
                }
            })
            .collect();
        Ok(summaries)
    }

    /// Load per employee, busiest first.
    pub fn availability(
        &self,
        sector_id: Option<SectorId>,
    ) -> Result<Vec<EmployeeAvailability>, ReportError> {
        let tx = begin_read(self.conn)?;
        let employees = SqliteEmployeeRepository::new(&tx).list_employees(&EmployeeListQuery {
            sector_id,
            ..EmployeeListQuery::default()
        })?;
        let sector_names: HashMap<SectorId, String> = SqliteOrgRepository::new(&tx)
            .list_sectors()?
            .into_iter()
            .map(|sector| (sector.id, sector.name))
            .collect();
        let active = SqliteAllocationRepository::new(&tx).list_allocations(&active_only())?;

        let mut load: HashMap<EmployeeId, (f64, usize)> = HashMap::new();
        for allocation in &active {
            let entry = load.entry(allocation.employee_id).or_insert((0.0, 0));
            entry.0 += allocation.dedication_percent;
            entry.1 += 1;
        }

        let mut items: Vec<EmployeeAvailability> = employees
            .into_iter()
            .map(|employee| {
                let (sum, count) = load.get(&employee.id).copied().unwrap_or((0.0, 0));
                EmployeeAvailability {
                    employee_id: employee.id,
                    sector_name: sector_names
                        .get(&employee.sector_id)
                        .cloned()
                        .unwrap_or_else(|| UNKNOWN_SECTOR.to_string()),
                    name: employee.name,
                    role_title: employee.role_title,
                    occupied_percent: sum.min(FULL_OCCUPANCY),
                    active_allocations: count,
                    available: sum < FULL_OCCUPANCY,
                }
            })
            .collect();
        items.sort_by(|left, right| right.occupied_percent.total_cmp(&left.occupied_percent));
        Ok(items)
    }

    /// Projects for a Gantt view, ordered by planned start.
    ///
    /// With a year, only projects whose planned period overlaps it are kept;
    /// projects without a planned start are then excluded. Without a year,
    /// undated projects sort last.
    pub fn timeline(
        &self,
        year: Option<i32>,
        company: Option<&str>,
    ) -> Result<Vec<TimelineItem>, ReportError> {
        let window = match year {
            Some(year) => {
                let (first, _) = month_bounds(year, 1).ok_or(ReportError::InvalidYear(year))?;
                let (_, last) = month_bounds(year, 12).ok_or(ReportError::InvalidYear(year))?;
                Some((first, last))
            }
            None => None,
        };

        let tx = begin_read(self.conn)?;
        let mut projects = SqliteProjectRepository::new(&tx).list_projects(&ProjectListQuery {
            company: company.map(str::to_string),
            ..ProjectListQuery::default()
        })?;
        if let Some((first, last)) = window {
            projects.retain(|project| project.planned_overlaps(first, last));
        }
        projects.sort_by_key(|project| {
            (
                project.planned_start.is_none(),
                project.planned_start,
                project.id,
            )
        });

        let active = SqliteAllocationRepository::new(&tx).list_allocations(&active_only())?;
        let mut per_project: HashMap<ProjectId, usize> = HashMap::new();
        for allocation in &active {
            *per_project.entry(allocation.project_id).or_insert(0) += 1;
        }

        Ok(projects
            .into_iter()
            .map(|project| TimelineItem {
                project_id: project.id,
                active_allocations: per_project.get(&project.id).copied().unwrap_or(0),
                code: project.code,
                name: project.name,
                company: project.company,
                category: project.category,
                planned_start: project.planned_start,
                planned_end: project.planned_end,
                status: project.status,
                completion_percent: project.completion_percent,
            })
            .collect())
    }
}

fn active_only() -> AllocationListQuery {
    AllocationListQuery {
        status: Some(AllocationStatus::Active),
        ..AllocationListQuery::default()
    }
}

fn count_status(projects: &[Project], status: ProjectStatus) -> usize {
    projects
        .iter()
        .filter(|project| project.status == status)
        .count()
}

fn total_value<'a>(projects: impl Iterator<Item = &'a Project>) -> f64 {
    projects.filter_map(|project| project.estimated_value).sum()
}

#[cfg(test)]
mod tests {
    use super::{aggregate_month, month_bounds, round_one_decimal};
    use crate::model::allocation::{Allocation, AllocationRole, AllocationStatus};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn one_decimal_rounding_breaks_ties_to_even() {
        assert_eq!(round_one_decimal(0.25), 0.2);
        assert_eq!(round_one_decimal(0.75), 0.8);
        // 0.35 is stored just below the tie.
        assert_eq!(round_one_decimal(0.35), 0.3);
        assert_eq!(round_one_decimal(61.96), 62.0);
        assert_eq!(round_one_decimal(50.0), 50.0);
    }

    fn allocation(
        id: i64,
        employee_id: i64,
        start: NaiveDate,
        end: Option<NaiveDate>,
        dedication: f64,
    ) -> Allocation {
        Allocation {
            id,
            employee_id,
            project_id: id,
            role: AllocationRole::Engineer,
            start_date: start,
            end_date: end,
            weekly_hours: 44.0,
            dedication_percent: dedication,
            status: AllocationStatus::Completed,
            notes: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn month_bounds_handle_leap_february_and_december() {
        assert_eq!(
            month_bounds(2028, 2),
            Some((date(2028, 2, 1), date(2028, 2, 29)))
        );
        assert_eq!(
            month_bounds(2026, 12),
            Some((date(2026, 12, 1), date(2026, 12, 31)))
        );
        assert_eq!(month_bounds(2026, 13), None);
    }

    #[test]
    fn empty_workforce_reports_zero() {
        let (first, last) = month_bounds(2026, 3).unwrap();
        let month = aggregate_month(3, first, last, &[], 0);
        assert_eq!(month.month_label, "Mar");
        assert_eq!(month.occupancy_percent, 0.0);
        assert!(!month.overloaded);
    }

    #[test]
    fn status_is_ignored_and_boundaries_are_inclusive() {
        let (first, last) = month_bounds(2026, 3).unwrap();
        let pool = vec![
            allocation(1, 1, date(2026, 3, 31), None, 100.0),
            allocation(2, 2, date(2026, 1, 1), Some(date(2026, 3, 1)), 50.0),
            allocation(3, 3, date(2026, 1, 1), Some(date(2026, 2, 28)), 100.0),
            allocation(4, 4, date(2026, 4, 1), None, 100.0),
        ];
        let month = aggregate_month(3, first, last, &pool, 3);
        assert_eq!(month.total_allocations, 2);
        assert_eq!(month.total_people, 2);
        assert_eq!(month.occupancy_percent, 50.0);
    }

    #[test]
    fn overload_is_decided_before_rounding() {
        let (first, last) = month_bounds(2026, 5).unwrap();
        let pool = vec![
            allocation(1, 1, date(2026, 5, 1), None, 100.0),
            allocation(2, 1, date(2026, 5, 1), None, 0.04),
        ];
        let month = aggregate_month(5, first, last, &pool, 1);
        assert_eq!(month.occupancy_percent, 100.0);
        assert!(month.overloaded);
    }
}
