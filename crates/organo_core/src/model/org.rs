//! Organization lookup records: sectors, levels and their sub-divisions.
//!
//! These are plain reference data. The only rule they carry is membership:
//! a sub-sector belongs to exactly one sector and a sub-level to exactly one
//! level.

use serde::{Deserialize, Serialize};

pub type SectorId = i64;
pub type SubSectorId = i64;
pub type LevelId = i64;
pub type SubLevelId = i64;

/// Company sector (Comercial, Engenharia, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sector {
    pub id: SectorId,
    /// Short code, may be empty.
    pub code: String,
    pub name: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubSector {
    pub id: SubSectorId,
    pub sector_id: SectorId,
    pub name: String,
}

/// Hierarchy level (Diretoria, Gerencia, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub id: LevelId,
    /// Depth rank; lower is closer to the top of the chart.
    pub rank: i64,
    pub name: String,
    pub display_order: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubLevel {
    pub id: SubLevelId,
    pub level_id: LevelId,
    pub name: String,
    pub abbreviation: Option<String>,
}
