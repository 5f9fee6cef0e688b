//! Command-line reports over an organization database.
//!
//! # Responsibility
//! - Open the configured database and print core reports as JSON.
//! - Keep all business rules in `organo_core`; this binary only wires
//!   configuration, logging and output.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use log::info;
use organo_core::db::open_db;
use organo_core::{
    init_logging_from_config, CoreConfig, HierarchyService, OverloadService, VersionService,
};
use serde_json::json;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "organo: organization chart and allocation reports",
    long_about = None
)]
struct Cli {
    /// Database file. Overrides ORGANO_DB_PATH.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Monthly workforce occupancy",
        after_help = "EXAMPLES:\n    organo occupancy --year 2026"
    )]
    Occupancy {
        #[arg(long)]
        year: i32,
    },

    #[command(about = "Current load per employee, busiest first")]
    Availability {
        /// Restrict to one sector id.
        #[arg(long)]
        sector: Option<i64>,
    },

    #[command(about = "Portfolio and per-company summary")]
    Summary,

    #[command(about = "Projects ordered by planned start")]
    Timeline {
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        company: Option<String>,
    },

    #[command(about = "List chart versions, most recent first")]
    Versions,

    #[command(
        about = "Diff a version against the live chart",
        after_help = "EXAMPLES:\n    organo version-diff --id 3"
    )]
    VersionDiff {
        #[arg(long)]
        id: i64,
    },

    #[command(about = "Scan reporting lines for cycles; fails when one exists")]
    CheckHierarchy,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = CoreConfig::from_env().context("invalid ORGANO_* configuration")?;
    if let Some(db) = cli.db.clone() {
        config.db_path = db;
    }
    init_logging_from_config(&config).context("failed to start logging")?;

    let conn = open_db(&config.db_path)
        .with_context(|| format!("failed to open `{}`", config.db_path.display()))?;
    info!("event=cli_command module=cli status=start command={:?}", cli.command);

    let output = match &cli.command {
        Commands::Occupancy { year } => {
            json!(OverloadService::try_new(&conn)?.monthly_occupancy(*year)?)
        }
        Commands::Availability { sector } => {
            json!(OverloadService::try_new(&conn)?.availability(*sector)?)
        }
        Commands::Summary => {
            let reports = OverloadService::try_new(&conn)?;
            json!({
                "general": reports.general_summary()?,
                "companies": reports.company_summaries()?,
            })
        }
        Commands::Timeline { year, company } => {
            json!(OverloadService::try_new(&conn)?.timeline(*year, company.as_deref())?)
        }
        Commands::Versions => json!(VersionService::try_new(&conn)?.list_versions()?),
        Commands::VersionDiff { id } => {
            json!(VersionService::try_new(&conn)?.diff_against_live(*id)?)
        }
        Commands::CheckHierarchy => {
            match HierarchyService::try_new(&conn)?.verify_hierarchy()? {
                None => json!({ "acyclic": true }),
                Some(cycle) => {
                    print_json(&json!({ "acyclic": false, "cycle": cycle }), cli.pretty)?;
                    bail!("reporting lines contain a cycle: {cycle:?}");
                }
            }
        }
    };

    print_json(&output, cli.pretty)
}

fn print_json(value: &serde_json::Value, pretty: bool) -> anyhow::Result<()> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Cli, Commands};
    use clap::Parser;

    #[test]
    fn occupancy_requires_year() {
        assert!(Cli::try_parse_from(["organo", "occupancy"]).is_err());
        let cli = Cli::try_parse_from(["organo", "occupancy", "--year", "2026"]).unwrap();
        assert!(matches!(cli.command, Commands::Occupancy { year: 2026 }));
    }

    #[test]
    fn global_db_flag_is_accepted_after_subcommand() {
        let cli =
            Cli::try_parse_from(["organo", "versions", "--db", "/tmp/org.sqlite3"]).unwrap();
        assert_eq!(cli.db.unwrap().to_string_lossy(), "/tmp/org.sqlite3");
    }

    #[test]
    fn version_diff_parses_id() {
        let cli = Cli::try_parse_from(["organo", "version-diff", "--id", "7"]).unwrap();
        assert!(matches!(cli.command, Commands::VersionDiff { id: 7 }));
    }
}
