//! Sector and level lookup storage.
//!
//! Reference data only: sectors with their sub-sectors, levels with their
//! sub-levels. Listing is `id ASC` for sectors and `display_order, id` for
//! levels.

use crate::model::org::{
    Level, LevelId, Sector, SectorId, SubLevel, SubLevelId, SubSector, SubSectorId,
};
use crate::model::validation::require_text;
use crate::repo::{ensure_table_ready, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

/// Repository interface for organization lookup tables.
pub trait OrgRepository {
    fn create_sector(&self, code: &str, name: &str, full_name: Option<&str>)
        -> RepoResult<Sector>;
    fn get_sector(&self, id: SectorId) -> RepoResult<Option<Sector>>;
    fn list_sectors(&self) -> RepoResult<Vec<Sector>>;
    fn create_sub_sector(&self, sector_id: SectorId, name: &str) -> RepoResult<SubSector>;
    fn get_sub_sector(&self, id: SubSectorId) -> RepoResult<Option<SubSector>>;
    fn list_sub_sectors(&self, sector_id: SectorId) -> RepoResult<Vec<SubSector>>;
    fn create_level(&self, rank: i64, name: &str, display_order: i64) -> RepoResult<Level>;
    fn get_level(&self, id: LevelId) -> RepoResult<Option<Level>>;
    fn list_levels(&self) -> RepoResult<Vec<Level>>;
    fn create_sub_level(
        &self,
        level_id: LevelId,
        name: &str,
        abbreviation: Option<&str>,
    ) -> RepoResult<SubLevel>;
    fn get_sub_level(&self, id: SubLevelId) -> RepoResult<Option<SubLevel>>;
    fn list_sub_levels(&self, level_id: LevelId) -> RepoResult<Vec<SubLevel>>;
}

/// SQLite-backed lookup repository.
pub struct SqliteOrgRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteOrgRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_table_ready(conn, "sectors", &["id", "code", "name", "full_name"])?;
        ensure_table_ready(conn, "sub_sectors", &["id", "sector_id", "name"])?;
        ensure_table_ready(conn, "levels", &["id", "rank", "name", "display_order"])?;
        ensure_table_ready(conn, "sub_levels", &["id", "level_id", "name", "abbreviation"])?;
        Ok(Self { conn })
    }

    pub(crate) fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl OrgRepository for SqliteOrgRepository<'_> {
    fn create_sector(
        &self,
        code: &str,
        name: &str,
        full_name: Option<&str>,
    ) -> RepoResult<Sector> {
        require_text(name, "name")?;
        self.conn.execute(
            "INSERT INTO sectors (code, name, full_name) VALUES (?1, ?2, ?3);",
            params![code.trim(), name.trim(), full_name],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_sector(id)?.ok_or(RepoError::not_found("sector", id))
    }

    fn get_sector(&self, id: SectorId) -> RepoResult<Option<Sector>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, code, name, full_name FROM sectors WHERE id = ?1;")?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_sector_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_sectors(&self) -> RepoResult<Vec<Sector>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, code, name, full_name FROM sectors ORDER BY id ASC;")?;
        let mut rows = stmt.query([])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_sector_row(row)?);
        }
        Ok(items)
    }

    fn create_sub_sector(&self, sector_id: SectorId, name: &str) -> RepoResult<SubSector> {
        require_text(name, "name")?;
        self.conn.execute(
            "INSERT INTO sub_sectors (sector_id, name) VALUES (?1, ?2);",
            params![sector_id, name.trim()],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_sub_sector(id)?
            .ok_or(RepoError::not_found("sub_sector", id))
    }

    fn get_sub_sector(&self, id: SubSectorId) -> RepoResult<Option<SubSector>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, sector_id, name FROM sub_sectors WHERE id = ?1;")?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_sub_sector_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_sub_sectors(&self, sector_id: SectorId) -> RepoResult<Vec<SubSector>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, sector_id, name FROM sub_sectors WHERE sector_id = ?1 ORDER BY id ASC;",
        )?;
        let mut rows = stmt.query([sector_id])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_sub_sector_row(row)?);
        }
        Ok(items)
    }

    fn create_level(&self, rank: i64, name: &str, display_order: i64) -> RepoResult<Level> {
        require_text(name, "name")?;
        self.conn.execute(
            "INSERT INTO levels (rank, name, display_order) VALUES (?1, ?2, ?3);",
            params![rank, name.trim(), display_order],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_level(id)?.ok_or(RepoError::not_found("level", id))
    }

    fn get_level(&self, id: LevelId) -> RepoResult<Option<Level>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, rank, name, display_order FROM levels WHERE id = ?1;")?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_level_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_levels(&self) -> RepoResult<Vec<Level>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, rank, name, display_order
             FROM levels
             ORDER BY display_order ASC, id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_level_row(row)?);
        }
        Ok(items)
    }

    fn create_sub_level(
        &self,
        level_id: LevelId,
        name: &str,
        abbreviation: Option<&str>,
    ) -> RepoResult<SubLevel> {
        require_text(name, "name")?;
        self.conn.execute(
            "INSERT INTO sub_levels (level_id, name, abbreviation) VALUES (?1, ?2, ?3);",
            params![level_id, name.trim(), abbreviation],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_sub_level(id)?
            .ok_or(RepoError::not_found("sub_level", id))
    }

    fn get_sub_level(&self, id: SubLevelId) -> RepoResult<Option<SubLevel>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, level_id, name, abbreviation FROM sub_levels WHERE id = ?1;")?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_sub_level_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_sub_levels(&self, level_id: LevelId) -> RepoResult<Vec<SubLevel>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, level_id, name, abbreviation
             FROM sub_levels
             WHERE level_id = ?1
             ORDER BY id ASC;",
        )?;
        let mut rows = stmt.query([level_id])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_sub_level_row(row)?);
        }
        Ok(items)
    }
}

fn parse_sector_row(row: &Row<'_>) -> RepoResult<Sector> {
    Ok(Sector {
        id: row.get("id")?,
        code: row.get("code")?,
        name: row.get("name")?,
        full_name: row.get("full_name")?,
    })
}

fn parse_sub_sector_row(row: &Row<'_>) -> RepoResult<SubSector> {
    Ok(SubSector {
        id: row.get("id")?,
        sector_id: row.get("sector_id")?,
        name: row.get("name")?,
    })
}

fn parse_level_row(row: &Row<'_>) -> RepoResult<Level> {
    Ok(Level {
        id: row.get("id")?,
        rank: row.get("rank")?,
        name: row.get("name")?,
        display_order: row.get("display_order")?,
    })
}

fn parse_sub_level_row(row: &Row<'_>) -> RepoResult<SubLevel> {
    Ok(SubLevel {
        id: row.get("id")?,
        level_id: row.get("level_id")?,
        name: row.get("name")?,
        abbreviation: row.get("abbreviation")?,
    })
}
