//! Field-level validation errors shared by all model records.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Maximum accepted length of allocation notes, in characters.
pub const MAX_NOTES_CHARS: usize = 500;

/// Field-level validation failure for a model record.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Required text field is blank after trim.
    BlankField(&'static str),
    /// Email does not look like an address.
    InvalidEmail(String),
    /// Percentage field outside `0..=100`.
    PercentOutOfRange { field: &'static str, value: f64 },
    /// Weekly hours outside the accepted `1..=60` window.
    WeeklyHoursOutOfRange(f64),
    /// Period end precedes its start.
    EndBeforeStart {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },
    /// Free-text notes exceed `MAX_NOTES_CHARS`.
    NotesTooLong(usize),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankField(field) => write!(f, "`{field}` must not be blank"),
            Self::InvalidEmail(value) => write!(f, "invalid email address `{value}`"),
            Self::PercentOutOfRange { field, value } => {
                write!(f, "`{field}` must be between 0 and 100, got {value}")
            }
            Self::WeeklyHoursOutOfRange(value) => {
                write!(f, "weekly hours must be between 1 and 60, got {value}")
            }
            Self::EndBeforeStart { start, end } => {
                write!(f, "end date {end} is before start date {start}")
            }
            Self::NotesTooLong(len) => write!(
                f,
                "notes must have at most {MAX_NOTES_CHARS} characters, got {len}"
            ),
        }
    }
}

impl Error for ValidationError {}

pub(crate) fn require_text(value: &str, field: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::BlankField(field));
    }
    Ok(())
}

pub(crate) fn require_percent(value: f64, field: &'static str) -> Result<(), ValidationError> {
    if !(0.0..=100.0).contains(&value) {
        return Err(ValidationError::PercentOutOfRange { field, value });
    }
    Ok(())
}
