//! Project (construction job / contract) model.
//!
//! Projects are the dimension allocations and timeline reports are computed
//! against. `code` is unique across the store.

use crate::model::validation::{require_text, ValidationError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub type ProjectId = i64;

/// Project lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Planned,
    InProgress,
    Completed,
    Cancelled,
    Paused,
}

impl ProjectStatus {
    /// Stable storage string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Paused => "paused",
        }
    }

    /// Parses a storage string.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "planned" => Some(Self::Planned),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            "paused" => Some(Self::Paused),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub company: String,
    pub client: String,
    pub category: String,
    pub sub_category: Option<String>,
    pub kind: Option<String>,
    pub estimated_value: Option<f64>,
    pub planned_start: Option<NaiveDate>,
    pub planned_end: Option<NaiveDate>,
    pub actual_start: Option<NaiveDate>,
    pub actual_end: Option<NaiveDate>,
    pub status: ProjectStatus,
    /// 0..=100.
    pub completion_percent: u8,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Project {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_fields(
            &self.code,
            &self.name,
            &self.company,
            &self.client,
            &self.category,
            self.completion_percent,
        )?;
        validate_period(self.planned_start, self.planned_end)?;
        validate_period(self.actual_start, self.actual_end)
    }

    /// Returns whether the planned period overlaps `[first, last]`.
    ///
    /// Projects without a planned start never overlap; a missing planned end
    /// is treated as open-ended.
    pub fn planned_overlaps(&self, first: NaiveDate, last: NaiveDate) -> bool {
        match self.planned_start {
            None => false,
            Some(start) => start <= last && self.planned_end.map_or(true, |end| end >= first),
        }
    }
}

/// Input for creating one project.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewProject {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub company: String,
    pub client: String,
    pub category: String,
    pub sub_category: Option<String>,
    pub kind: Option<String>,
    pub estimated_value: Option<f64>,
    pub planned_start: Option<NaiveDate>,
    pub planned_end: Option<NaiveDate>,
    pub status: Option<ProjectStatus>,
}

impl NewProject {
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        company: impl Into<String>,
        client: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            company: company.into(),
            client: client.into(),
            category: category.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_fields(
            &self.code,
            &self.name,
            &self.company,
            &self.client,
            &self.category,
            0,
        )?;
        validate_period(self.planned_start, self.planned_end)
    }
}

/// Field-level partial update for a project.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProjectPatch {
    pub code: Option<String>,
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub company: Option<String>,
    pub client: Option<String>,
    pub category: Option<String>,
    pub sub_category: Option<Option<String>>,
    pub kind: Option<Option<String>>,
    pub estimated_value: Option<Option<f64>>,
    pub planned_start: Option<Option<NaiveDate>>,
    pub planned_end: Option<Option<NaiveDate>>,
    pub actual_start: Option<Option<NaiveDate>>,
    pub actual_end: Option<Option<NaiveDate>>,
    pub status: Option<ProjectStatus>,
    pub completion_percent: Option<u8>,
}

impl ProjectPatch {
    pub fn apply_to(&self, project: &mut Project) {
        if let Some(value) = &self.code {
            project.code = value.trim().to_string();
        }
        if let Some(value) = &self.name {
            project.name = value.clone();
        }
        if let Some(value) = &self.description {
            project.description = value.clone();
        }
        if let Some(value) = &self.company {
            project.company = value.clone();
        }
        if let Some(value) = &self.client {
            project.client = value.clone();
        }
        if let Some(value) = &self.category {
            project.category = value.clone();
        }
        if let Some(value) = &self.sub_category {
            project.sub_category = value.clone();
        }
        if let Some(value) = &self.kind {
            project.kind = value.clone();
        }
        if let Some(value) = self.estimated_value {
            project.estimated_value = value;
        }
        if let Some(value) = self.planned_start {
            project.planned_start = value;
        }
        if let Some(value) = self.planned_end {
            project.planned_end = value;
        }
        if let Some(value) = self.actual_start {
            project.actual_start = value;
        }
        if let Some(value) = self.actual_end {
            project.actual_end = value;
        }
        if let Some(value) = self.status {
            project.status = value;
        }
        if let Some(value) = self.completion_percent {
            project.completion_percent = value;
        }
    }
}

fn validate_fields(
    code: &str,
    name: &str,
    company: &str,
    client: &str,
    category: &str,
    completion_percent: u8,
) -> Result<(), ValidationError> {
    require_text(code, "code")?;
    require_text(name, "name")?;
    require_text(company, "company")?;
    require_text(client, "client")?;
    require_text(category, "category")?;
    if completion_percent > 100 {
        return Err(ValidationError::PercentOutOfRange {
            field: "completion_percent",
            value: f64::from(completion_percent),
        });
    }
    Ok(())
}

fn validate_period(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<(), ValidationError> {
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(ValidationError::EndBeforeStart { start, end });
        }
    }
    Ok(())
}
