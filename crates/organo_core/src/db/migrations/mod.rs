//! Ordered schema steps for the organization store.
//!
//! `PRAGMA user_version` holds the number of the last applied step. All
//! pending steps run in a single transaction, so a failed step leaves the
//! previous version in place.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

struct SchemaStep {
    version: u32,
    label: &'static str,
    sql: &'static str,
}

const SCHEMA_STEPS: [SchemaStep; 3] = [
    SchemaStep {
        version: 1,
        label: "org_structure",
        sql: include_str!("0001_org_structure.sql"),
    },
    SchemaStep {
        version: 2,
        label: "projects_allocations",
        sql: include_str!("0002_projects_allocations.sql"),
    },
    SchemaStep {
        version: 3,
        label: "org_versions",
        sql: include_str!("0003_org_versions.sql"),
    },
];

/// Schema version this build writes.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS[SCHEMA_STEPS.len() - 1].version
}

/// Brings `conn` up to `latest_version()`.
///
/// Refuses databases stamped by a newer build.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let from = current_user_version(conn)?;
    let latest = latest_version();
    if from > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from,
            latest_supported: latest,
        });
    }

    let pending: Vec<&SchemaStep> = SCHEMA_STEPS
        .iter()
        .filter(|step| step.version > from)
        .collect();
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for step in pending {
        tx.execute_batch(step.sql)
            .and_then(|()| tx.pragma_update(None, "user_version", step.version))
            .map_err(|source| DbError::Migration {
                version: step.version,
                label: step.label,
                source,
            })?;
        info!(
            "event=db_migrate module=db status=ok from={} version={} label={}",
            from, step.version, step.label
        );
    }
    tx.commit()?;
    Ok(())
}

pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}
