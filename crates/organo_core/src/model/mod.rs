//! Domain model for the organization chart and allocation planner.
//!
//! # Responsibility
//! - Define the records core business logic operates on.
//! - Keep field-level validation next to the data it guards.
//!
//! # Invariants
//! - Every record is identified by a SQLite integer row id.
//! - References between records are plain ids, never owned pointers.

pub mod allocation;
pub mod employee;
pub mod org;
pub mod project;
pub mod validation;
pub mod version;
