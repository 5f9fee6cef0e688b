//! Runtime configuration for the core crate.
//!
//! # Responsibility
//! - Collect database path, logging setup and the sector capacity table.
//! - Load overrides from environment variables and an optional JSON file.
//!
//! # Invariants
//! - Capacity keys are stored normalized, so lookups by raw sector names
//!   match regardless of spacing or case.
//! - Ceilings are at least 1.

use crate::logging::LogLevel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const ENV_DB_PATH: &str = "ORGANO_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "ORGANO_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "ORGANO_LOG_DIR";
pub const ENV_CAPACITY_FILE: &str = "ORGANO_CAPACITY_FILE";

const DEFAULT_DB_FILE_NAME: &str = "organo.sqlite3";
const DEFAULT_CEILING: u32 = 8;

/// Configuration loading or validation failure.
#[derive(Debug)]
pub enum ConfigError {
    /// Capacity file could not be read.
    Io { path: PathBuf, source: std::io::Error },
    /// Capacity JSON is malformed.
    Json(serde_json::Error),
    /// A ceiling of zero would block every assignment.
    ZeroCeiling(String),
    InvalidLogLevel(String),
    RelativeLogDir(PathBuf),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read `{}`: {source}", path.display())
            }
            Self::Json(err) => write!(f, "invalid capacity table: {err}"),
            Self::ZeroCeiling(sector) => {
                write!(f, "capacity ceiling for `{sector}` must be at least 1")
            }
            Self::InvalidLogLevel(message) => write!(f, "{message}"),
            Self::RelativeLogDir(path) => {
                write!(f, "log_dir must be an absolute path, got `{}`", path.display())
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Maximum number of distinct active projects per employee, by sector.
///
/// JSON shape: `{"default": 8, "sectors": {"Engenharia": 3}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectorCapacityPolicy {
    #[serde(rename = "default")]
    default_ceiling: u32,
    sectors: BTreeMap<String, u32>,
}

#[derive(Deserialize)]
struct RawCapacityPolicy {
    #[serde(default = "default_ceiling")]
    default: u32,
    #[serde(default)]
    sectors: BTreeMap<String, u32>,
}

fn default_ceiling() -> u32 {
    DEFAULT_CEILING
}

impl Default for SectorCapacityPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_CEILING,
            [("Comercial", 10), ("Engenharia", 3), ("Suprimentos", 10)],
        )
    }
}

impl SectorCapacityPolicy {
    /// Builds a policy, normalizing every sector key.
    pub fn new<I, S>(default_ceiling: u32, sectors: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: AsRef<str>,
    {
        Self {
            default_ceiling,
            sectors: sectors
                .into_iter()
                .map(|(name, ceiling)| (normalize_sector_name(name.as_ref()), ceiling))
                .collect(),
        }
    }

    /// Parses the JSON table. Missing `default` falls back to 8.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let parsed: RawCapacityPolicy = serde_json::from_str(raw)?;
        let policy = Self::new(parsed.default, parsed.sectors);
        policy.validate()?;
        Ok(policy)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Ceiling for a raw sector name; unknown sectors get the default.
    pub fn ceiling_for(&self, sector_name: &str) -> u32 {
        self.sectors
            .get(&normalize_sector_name(sector_name))
            .copied()
            .unwrap_or(self.default_ceiling)
    }

    pub fn default_ceiling(&self) -> u32 {
        self.default_ceiling
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_ceiling == 0 {
            return Err(ConfigError::ZeroCeiling("default".to_string()));
        }
        if let Some((sector, _)) = self.sectors.iter().find(|(_, ceiling)| **ceiling == 0) {
            return Err(ConfigError::ZeroCeiling(sector.clone()));
        }
        Ok(())
    }
}

/// Trims and title-cases a sector name: a letter is uppercased when it
/// follows a non-letter, lowercased otherwise.
pub fn normalize_sector_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    let mut previous_is_letter = false;
    for ch in name.trim().chars() {
        if ch.is_alphabetic() {
            if previous_is_letter {
                normalized.extend(ch.to_lowercase());
            } else {
                normalized.extend(ch.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            normalized.push(ch);
            previous_is_letter = false;
        }
    }
    normalized
}

/// Core runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub log_level: String,
    /// File logging stays off when unset.
    pub log_dir: Option<PathBuf>,
    pub capacity: SectorCapacityPolicy,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_FILE_NAME),
            log_level: LogLevel::build_default().as_str().to_string(),
            log_dir: None,
            capacity: SectorCapacityPolicy::default(),
        }
    }
}

impl CoreConfig {
    /// Defaults overridden by `ORGANO_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(path) = non_blank(lookup(ENV_DB_PATH)) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(level) = non_blank(lookup(ENV_LOG_LEVEL)) {
            config.log_level = level;
        }
        if let Some(dir) = non_blank(lookup(ENV_LOG_DIR)) {
            config.log_dir = Some(PathBuf::from(dir));
        }
        if let Some(file) = non_blank(lookup(ENV_CAPACITY_FILE)) {
            config.capacity = SectorCapacityPolicy::from_json_file(file)?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        LogLevel::parse(&self.log_level)
            .map_err(|err| ConfigError::InvalidLogLevel(err.to_string()))?;
        if let Some(dir) = &self.log_dir {
            if !dir.is_absolute() {
                return Err(ConfigError::RelativeLogDir(dir.clone()));
            }
        }
        self.capacity.validate()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{normalize_sector_name, ConfigError, CoreConfig, SectorCapacityPolicy};
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn sector_names_are_title_cased() {
        assert_eq!(normalize_sector_name("  engenharia "), "Engenharia");
        assert_eq!(normalize_sector_name("COMERCIAL"), "Comercial");
        assert_eq!(normalize_sector_name("gestão de obras"), "Gestão De Obras");
        assert_eq!(normalize_sector_name("rh-sul"), "Rh-Sul");
    }

    #[test]
    fn default_table_matches_known_sectors() {
        let policy = SectorCapacityPolicy::default();
        assert_eq!(policy.ceiling_for("Engenharia"), 3);
        assert_eq!(policy.ceiling_for(" engenharia"), 3);
        assert_eq!(policy.ceiling_for("Comercial"), 10);
        assert_eq!(policy.ceiling_for("suprimentos"), 10);
        assert_eq!(policy.ceiling_for("Financeiro"), 8);
    }

    #[test]
    fn json_table_normalizes_keys() {
        let policy =
            SectorCapacityPolicy::from_json_str(r#"{"default": 5, "sectors": {"ti": 2}}"#)
                .unwrap();
        assert_eq!(policy.ceiling_for("TI"), 2);
        assert_eq!(policy.ceiling_for("Outro"), 5);
    }

    #[test]
    fn json_table_rejects_zero_ceiling() {
        let err = SectorCapacityPolicy::from_json_str(r#"{"sectors": {"Engenharia": 0}}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::ZeroCeiling(sector) if sector == "Engenharia"));
    }

    #[test]
    fn env_lookup_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"default": 4}}"#).unwrap();
        let capacity_path = file.path().to_string_lossy().into_owned();

        let vars: HashMap<&str, String> = HashMap::from([
            ("ORGANO_DB_PATH", "/tmp/org.sqlite3".to_string()),
            ("ORGANO_LOG_LEVEL", "warn".to_string()),
            ("ORGANO_CAPACITY_FILE", capacity_path),
        ]);
        let config = CoreConfig::from_lookup(|key| vars.get(key).cloned()).unwrap();

        assert_eq!(config.db_path.to_string_lossy(), "/tmp/org.sqlite3");
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.log_dir, None);
        assert_eq!(config.capacity.default_ceiling(), 4);
    }

    #[test]
    fn relative_log_dir_is_rejected() {
        let config = CoreConfig {
            log_dir: Some("logs".into()),
            ..CoreConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RelativeLogDir(_))
        ));
    }
}
