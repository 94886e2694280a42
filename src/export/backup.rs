// src/export/backup.rs
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::tender::Tender;
use crate::export::ExportError;

/// Full snapshot of the record set, as downloaded and re-imported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backup {
    pub timestamp: String,
    pub total_tenders: usize,
    pub relevant_tenders: usize,
    pub tenders: Vec<Tender>,
}

pub fn build_backup(records: &[Tender], now: DateTime<Utc>) -> Result<String, ExportError> {
    let backup = Backup {
        timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        total_tenders: records.len(),
        relevant_tenders: records.iter().filter(|t| t.marked_relevant).count(),
        tenders: records.to_vec(),
    };
    serde_json::to_string_pretty(&backup).map_err(|e| ExportError::Json(e.to_string()))
}

pub fn parse_backup(text: &str) -> Result<Backup, ExportError> {
    serde_json::from_str(text).map_err(|e| ExportError::InvalidBackup(e.to_string()))
}
