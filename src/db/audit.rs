use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;
use serde_json::Value;

use crate::errors::ServerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Insert,
    Update,
    MarkRelevant,
    Delete,
    DeleteAll,
    ExportCsv,
    ExportXlsx,
    ExportBackup,
    ExportStats,
    ImportBackup,
    Scrape,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Insert => "insert",
            AuditAction::Update => "update",
            AuditAction::MarkRelevant => "mark_relevant",
            AuditAction::Delete => "delete",
            AuditAction::DeleteAll => "delete_all",
            AuditAction::ExportCsv => "export_csv",
            AuditAction::ExportXlsx => "export_xlsx",
            AuditAction::ExportBackup => "export_backup",
            AuditAction::ExportStats => "export_stats",
            AuditAction::ImportBackup => "import_backup",
            AuditAction::Scrape => "scrape",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditLogEntry {
    pub id: i64,
    pub action_type: String,
    pub details: Value,
    pub tender_count: Option<i64>,
    pub created_at: DateTime<Utc>,
}

pub fn record(
    conn: &Connection,
    action: AuditAction,
    details: &Value,
    tender_count: Option<usize>,
    now: DateTime<Utc>,
) -> Result<i64, ServerError> {
    conn.execute(
        "INSERT INTO audit_log (action_type, details, tender_count, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            action.as_str(),
            details.to_string(),
            tender_count.map(|n| n as i64),
            now.timestamp_millis()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Newest first.
pub fn recent(conn: &Connection, limit: usize) -> Result<Vec<AuditLogEntry>, ServerError> {
    let mut stmt = conn.prepare(
        "SELECT id, action_type, details, tender_count, created_at FROM audit_log \
         ORDER BY id DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit as i64], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<i64>>(3)?,
            row.get::<_, i64>(4)?,
        ))
    })?;

    let mut out = Vec::new();
    for r in rows {
        let (id, action_type, details, tender_count, created_ms) = r?;
        out.push(AuditLogEntry {
            id,
            action_type,
            details: serde_json::from_str(&details).unwrap_or(Value::String(details)),
            tender_count,
            created_at: DateTime::from_timestamp_millis(created_ms).unwrap_or_default(),
        });
    }
    Ok(out)
}
