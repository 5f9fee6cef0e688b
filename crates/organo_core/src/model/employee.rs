//! Employee domain model.
//!
//! # Responsibility
//! - Define the live employee record and its creation/patch inputs.
//! - Validate contact and naming fields before persistence.
//!
//! # Invariants
//! - `supervisor_id` is an optional id resolved through the employee store,
//!   never an embedded record.
//! - The supervisor graph stays acyclic; that rule lives in
//!   `graph::hierarchy` because it needs the whole graph.

use crate::model::org::{LevelId, SectorId, SubLevelId, SubSectorId};
use crate::model::validation::{require_text, ValidationError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Stable employee identifier (SQLite row id).
pub type EmployeeId = i64;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

/// Live employee record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    /// Job title as displayed on the chart.
    pub role_title: String,
    pub sector_id: SectorId,
    pub sub_sector_id: Option<SubSectorId>,
    pub level_id: LevelId,
    pub sub_level_id: Option<SubLevelId>,
    /// `None` means the employee sits at the top of a chain.
    pub supervisor_id: Option<EmployeeId>,
    pub permissions: Vec<String>,
    pub photo_url: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}

impl Employee {
    /// Validates naming and contact fields.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_fields(&self.name, &self.role_title, self.email.as_deref())
    }
}

/// Input for creating one employee.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewEmployee {
    pub name: String,
    pub role_title: String,
    pub sector_id: SectorId,
    pub sub_sector_id: Option<SubSectorId>,
    pub level_id: LevelId,
    pub sub_level_id: Option<SubLevelId>,
    pub supervisor_id: Option<EmployeeId>,
    pub permissions: Vec<String>,
    pub photo_url: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl NewEmployee {
    /// Creates an input with the required fields and no optional data.
    pub fn new(
        name: impl Into<String>,
        role_title: impl Into<String>,
        sector_id: SectorId,
        level_id: LevelId,
    ) -> Self {
        Self {
            name: name.into(),
            role_title: role_title.into(),
            sector_id,
            level_id,
            ..Self::default()
        }
    }

    /// Sets the supervisor reference.
    pub fn with_supervisor(mut self, supervisor_id: EmployeeId) -> Self {
        self.supervisor_id = Some(supervisor_id);
        self
    }

    /// Validates naming and contact fields.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_fields(&self.name, &self.role_title, self.email.as_deref())
    }
}

/// Field-level partial update for an employee.
///
/// Outer `None` leaves the field untouched. For nullable columns the inner
/// `Option` carries the new value, so `Some(None)` clears the column.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EmployeePatch {
    pub name: Option<String>,
    pub role_title: Option<String>,
    pub sector_id: Option<SectorId>,
    pub sub_sector_id: Option<Option<SubSectorId>>,
    pub level_id: Option<LevelId>,
    pub sub_level_id: Option<Option<SubLevelId>>,
    pub supervisor_id: Option<Option<EmployeeId>>,
    pub permissions: Option<Vec<String>>,
    pub photo_url: Option<Option<String>>,
    pub email: Option<Option<String>>,
    pub phone: Option<Option<String>>,
}

impl EmployeePatch {
    /// Patch that only reassigns the supervisor.
    pub fn supervisor(supervisor_id: Option<EmployeeId>) -> Self {
        Self {
            supervisor_id: Some(supervisor_id),
            ..Self::default()
        }
    }

    /// Returns whether no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Returns whether any organization reference (sector, level and their
    /// sub-divisions) is touched.
    pub fn touches_org_refs(&self) -> bool {
        self.sector_id.is_some()
            || self.sub_sector_id.is_some()
            || self.level_id.is_some()
            || self.sub_level_id.is_some()
    }

    /// Overwrites the supplied fields on `employee`.
    pub fn apply_to(&self, employee: &mut Employee) {
        if let Some(value) = &self.name {
            employee.name = value.trim().to_string();
        }
        if let Some(value) = &self.role_title {
            employee.role_title = value.trim().to_string();
        }
        if let Some(value) = self.sector_id {
            employee.sector_id = value;
        }
        if let Some(value) = self.sub_sector_id {
            employee.sub_sector_id = value;
        }
        if let Some(value) = self.level_id {
            employee.level_id = value;
        }
        if let Some(value) = self.sub_level_id {
            employee.sub_level_id = value;
        }
        if let Some(value) = self.supervisor_id {
            employee.supervisor_id = value;
        }
        if let Some(value) = &self.permissions {
            employee.permissions = value.clone();
        }
        if let Some(value) = &self.photo_url {
            employee.photo_url = value.clone();
        }
        if let Some(value) = &self.email {
            employee.email = value.clone();
        }
        if let Some(value) = &self.phone {
            employee.phone = value.clone();
        }
    }
}

pub(crate) fn validate_fields(name: &str, role_title: &str, email: Option<&str>) -> Result<(), ValidationError> {
    require_text(name, "name")?;
    require_text(role_title, "role_title")?;
    if let Some(email) = email {
        if !EMAIL_RE.is_match(email.trim()) {
            return Err(ValidationError::InvalidEmail(email.to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{EmployeePatch, NewEmployee};
    use crate::model::validation::ValidationError;

    #[test]
    fn new_employee_rejects_blank_name() {
        let input = NewEmployee::new("   ", "Engineer", 1, 1);
        assert_eq!(input.validate(), Err(ValidationError::BlankField("name")));
    }

    #[test]
    fn new_employee_rejects_malformed_email() {
        let mut input = NewEmployee::new("Ana", "Engineer", 1, 1);
        input.email = Some("ana.example.com".to_string());
        assert!(matches!(
            input.validate(),
            Err(ValidationError::InvalidEmail(_))
        ));

        input.email = Some("ana@example.com".to_string());
        assert!(input.validate().is_ok());
    }

    #[test]
    fn supervisor_patch_can_clear_reference() {
        let patch = EmployeePatch::supervisor(None);
        assert!(!patch.is_empty());
        assert_eq!(patch.supervisor_id, Some(None));
        assert!(!patch.touches_org_refs());
        assert!(EmployeePatch::default().is_empty());
    }
}
