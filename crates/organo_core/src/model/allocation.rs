//! Allocation model: one employee assigned to one project over a period.
//!
//! # Invariants
//! - At most one `Active` allocation exists per (employee, project) pair.
//!   Enforced by `service::allocation_service` at creation time.
//! - `end_date`, when set, is not before `start_date`.
//! - `end_date = None` means open-ended.

use crate::model::employee::EmployeeId;
use crate::model::project::ProjectId;
use crate::model::validation::{require_percent, ValidationError, MAX_NOTES_CHARS};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub type AllocationId = i64;

/// Default weekly hours for a full-time assignment.
pub const DEFAULT_WEEKLY_HOURS: f64 = 44.0;
/// Default dedication for a new assignment.
pub const DEFAULT_DEDICATION_PERCENT: f64 = 100.0;

/// Function an employee performs inside a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationRole {
    ProjectManager,
    Coordinator,
    Engineer,
    #[default]
    Technician,
    Foreman,
    Assistant,
    Inspector,
    Buyer,
}

impl AllocationRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ProjectManager => "project_manager",
            Self::Coordinator => "coordinator",
            Self::Engineer => "engineer",
            Self::Technician => "technician",
            Self::Foreman => "foreman",
            Self::Assistant => "assistant",
            Self::Inspector => "inspector",
            Self::Buyer => "buyer",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "project_manager" => Some(Self::ProjectManager),
            "coordinator" => Some(Self::Coordinator),
            "engineer" => Some(Self::Engineer),
            "technician" => Some(Self::Technician),
            "foreman" => Some(Self::Foreman),
            "assistant" => Some(Self::Assistant),
            "inspector" => Some(Self::Inspector),
            "buyer" => Some(Self::Buyer),
            _ => None,
        }
    }
}

/// Allocation lifecycle state. Only `Active` rows count against capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStatus {
    #[default]
    Active,
    Completed,
    Suspended,
    Cancelled,
}

impl AllocationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Suspended => "suspended",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "suspended" => Some(Self::Suspended),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub id: AllocationId,
    pub employee_id: EmployeeId,
    pub project_id: ProjectId,
    pub role: AllocationRole,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub weekly_hours: f64,
    /// Share of the employee's time, 0..=100.
    pub dedication_percent: f64,
    pub status: AllocationStatus,
    pub notes: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Allocation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_fields(
            self.start_date,
            self.end_date,
            self.weekly_hours,
            self.dedication_percent,
            self.notes.as_deref(),
        )
    }

    pub fn is_active(&self) -> bool {
        self.status == AllocationStatus::Active
    }

    /// Returns whether the allocation period touches `[first, last]`,
    /// regardless of status.
    pub fn overlaps(&self, first: NaiveDate, last: NaiveDate) -> bool {
        self.start_date <= last && self.end_date.map_or(true, |end| end >= first)
    }
}

/// Input for creating one allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAllocation {
    pub employee_id: EmployeeId,
    pub project_id: ProjectId,
    pub role: AllocationRole,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub weekly_hours: f64,
    pub dedication_percent: f64,
    pub status: AllocationStatus,
    pub notes: Option<String>,
}

impl NewAllocation {
    /// Full-time active allocation starting at `start_date`, open-ended.
    pub fn new(employee_id: EmployeeId, project_id: ProjectId, start_date: NaiveDate) -> Self {
        Self {
            employee_id,
            project_id,
            role: AllocationRole::default(),
            start_date,
            end_date: None,
            weekly_hours: DEFAULT_WEEKLY_HOURS,
            dedication_percent: DEFAULT_DEDICATION_PERCENT,
            status: AllocationStatus::default(),
            notes: None,
        }
    }

    pub fn ending(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn with_dedication(mut self, dedication_percent: f64) -> Self {
        self.dedication_percent = dedication_percent;
        self
    }

    pub fn with_status(mut self, status: AllocationStatus) -> Self {
        self.status = status;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_fields(
            self.start_date,
            self.end_date,
            self.weekly_hours,
            self.dedication_percent,
            self.notes.as_deref(),
        )
    }
}

/// Field-level partial update for an allocation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AllocationPatch {
    pub role: Option<AllocationRole>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<Option<NaiveDate>>,
    pub weekly_hours: Option<f64>,
    pub dedication_percent: Option<f64>,
    pub status: Option<AllocationStatus>,
    pub notes: Option<Option<String>>,
}

impl AllocationPatch {
    /// Patch that only changes status.
    pub fn status(status: AllocationStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn apply_to(&self, allocation: &mut Allocation) {
        if let Some(value) = self.role {
            allocation.role = value;
        }
        if let Some(value) = self.start_date {
            allocation.start_date = value;
        }
        if let Some(value) = self.end_date {
            allocation.end_date = value;
        }
        if let Some(value) = self.weekly_hours {
            allocation.weekly_hours = value;
        }
        if let Some(value) = self.dedication_percent {
            allocation.dedication_percent = value;
        }
        if let Some(value) = self.status {
            allocation.status = value;
        }
        if let Some(value) = &self.notes {
            allocation.notes = value.clone();
        }
    }
}

fn validate_fields(
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    weekly_hours: f64,
    dedication_percent: f64,
    notes: Option<&str>,
) -> Result<(), ValidationError> {
    if let Some(end) = end_date {
        if end < start_date {
            return Err(ValidationError::EndBeforeStart {
                start: start_date,
                end,
            });
        }
    }
    if !(1.0..=60.0).contains(&weekly_hours) {
        return Err(ValidationError::WeeklyHoursOutOfRange(weekly_hours));
    }
    require_percent(dedication_percent, "dedication_percent")?;
    if let Some(notes) = notes {
        let len = notes.chars().count();
        if len > MAX_NOTES_CHARS {
            return Err(ValidationError::NotesTooLong(len));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{AllocationStatus, NewAllocation};
    use crate::model::validation::ValidationError;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn rejects_end_before_start() {
        let input = NewAllocation::new(1, 1, date(2026, 3, 10)).ending(date(2026, 3, 1));
        assert!(matches!(
            input.validate(),
            Err(ValidationError::EndBeforeStart { .. })
        ));
    }

    #[test]
    fn rejects_dedication_above_hundred() {
        let input = NewAllocation::new(1, 1, date(2026, 3, 1)).with_dedication(120.0);
        assert!(matches!(
            input.validate(),
            Err(ValidationError::PercentOutOfRange {
                field: "dedication_percent",
                ..
            })
        ));
    }

    #[test]
    fn status_strings_round_trip_through_parse() {
        for status in [
            AllocationStatus::Active,
            AllocationStatus::Completed,
            AllocationStatus::Suspended,
            AllocationStatus::Cancelled,
        ] {
            assert_eq!(AllocationStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AllocationStatus::parse("ativa"), None);
    }
}
