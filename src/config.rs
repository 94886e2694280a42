// src/config.rs
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::ServerError;
use crate::export::{Column, CsvQuoting};

const ENV_CONFIG_PATH: &str = "TENDER_CONFIG_PATH";
const ENV_DB_PATH: &str = "TENDER_DB_PATH";
const ENV_BIND_ADDR: &str = "TENDER_BIND_ADDR";
const DEFAULT_CONFIG_PATH: &str = "config/tender_tracker.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub log_format: LogFormat,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub export: ExportConfig,
    pub scraper: ScraperConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub max_workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".into(),
            max_workers: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub schema_path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "tenders.sqlite3".into(),
            schema_path: "sql/schema.sql".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub csv_quoting: CsvQuoting,
    pub default_columns: Vec<Column>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            csv_quoting: CsvQuoting::Legacy,
            default_columns: Column::DEFAULT_EXPORT.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_pages: usize,
    pub page_delay_ms: u64,
    /// A relevant listing with this many days left or fewer ends the run.
    pub stop_at_days_left: i64,
    pub skip_non_relevant: bool,
    pub include_keywords: Vec<String>,
    pub exclude_keywords: Vec<String>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: "https://bolpatra.gov.np/egp".into(),
            timeout_secs: 60,
            max_pages: 50,
            page_delay_ms: 2000,
            stop_at_days_left: 7,
            skip_non_relevant: true,
            include_keywords: Vec::new(),
            exclude_keywords: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn load_from(path: &Path) -> Result<Self, ServerError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("reading {}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| ServerError::Config(format!("parsing {}: {e}", path.display())))
    }

    /// `.env` first, then `$TENDER_CONFIG_PATH` or the default file (missing
    /// default file means built-in defaults), then env overrides.
    pub fn load() -> Result<Self, ServerError> {
        let _ = dotenvy::dotenv();

        let mut cfg = match std::env::var(ENV_CONFIG_PATH) {
            Ok(p) => {
                let pb = PathBuf::from(p);
                if !pb.exists() {
                    return Err(ServerError::Config(format!(
                        "{ENV_CONFIG_PATH} points to non-existent path {}",
                        pb.display()
                    )));
                }
                Self::load_from(&pb)?
            }
            Err(_) => {
                let default = PathBuf::from(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::load_from(&default)?
                } else {
                    Self::default()
                }
            }
        };

        cfg.apply_env_overrides();
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(p) = std::env::var(ENV_DB_PATH) {
            if !p.trim().is_empty() {
                self.database.path = PathBuf::from(p);
            }
        }
        if let Ok(addr) = std::env::var(ENV_BIND_ADDR) {
            if !addr.trim().is_empty() {
                self.server.bind_addr = addr;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            log_format = "json"

            [server]
            max_workers = 2

            [export]
            csv_quoting = "rfc4180"
            default_columns = ["ifb_no", "title", "marked_relevant"]

            [scraper]
            stop_at_days_left = 3
            include_keywords = ["bridge"]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert_eq!(cfg.server.max_workers, 2);
        assert_eq!(cfg.server.bind_addr, "127.0.0.1:3000");
        assert_eq!(cfg.export.csv_quoting, CsvQuoting::Rfc4180);
        assert_eq!(
            cfg.export.default_columns,
            vec![Column::IfbNo, Column::Title, Column::MarkedRelevant]
        );
        assert_eq!(cfg.scraper.stop_at_days_left, 3);
        assert_eq!(cfg.scraper.max_pages, 50);
        assert_eq!(cfg.database, DatabaseConfig::default());
    }

    #[test]
    fn shipped_config_parses() {
        let cfg = AppConfig::load_from(Path::new(DEFAULT_CONFIG_PATH)).unwrap();
        assert_eq!(cfg.scraper.stop_at_days_left, 7);
        assert_eq!(cfg.export.csv_quoting, CsvQuoting::Legacy);
    }

    #[test]
    fn unknown_column_is_a_config_error() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("bad.toml");
        fs::write(&p, "[export]\ndefault_columns = [\"colour\"]\n").unwrap();
        assert!(matches!(AppConfig::load_from(&p), Err(ServerError::Config(_))));
    }

    #[serial_test::serial]
    #[test]
    fn env_path_and_overrides_win() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("custom.toml");
        fs::write(&p, "[database]\npath = \"from_file.sqlite3\"\n[server]\nbind_addr = \"0.0.0.0:9000\"\n")
            .unwrap();

        env::set_var(ENV_CONFIG_PATH, p.display().to_string());
        env::remove_var(ENV_DB_PATH);
        env::remove_var(ENV_BIND_ADDR);
        let cfg = AppConfig::load().unwrap();
        assert_eq!(cfg.database.path, PathBuf::from("from_file.sqlite3"));
        assert_eq!(cfg.server.bind_addr, "0.0.0.0:9000");

        env::set_var(ENV_DB_PATH, "/tmp/override.sqlite3");
        env::set_var(ENV_BIND_ADDR, "127.0.0.1:4000");
        let cfg = AppConfig::load().unwrap();
        assert_eq!(cfg.database.path, PathBuf::from("/tmp/override.sqlite3"));
        assert_eq!(cfg.server.bind_addr, "127.0.0.1:4000");

        env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml").display().to_string());
        assert!(AppConfig::load().is_err());

        env::remove_var(ENV_CONFIG_PATH);
        env::remove_var(ENV_DB_PATH);
        env::remove_var(ENV_BIND_ADDR);
    }
}
