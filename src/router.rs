use astra::Request;
use chrono::{Local, Utc};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use std::io::Read;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::audit::{self, AuditAction};
use crate::db::presets::{self, NewPreset};
use crate::db::scrapes::{get_recent_scrapes, latest_run, ScrapingStatus};
use crate::domain::filter::TenderFilter;
use crate::domain::stats::{summarize, ViewMode};
use crate::domain::tender::{Tender, TenderPatch};
use crate::domain::validation::{validate_new_tender, TenderForm, ValidationErrors};
use crate::errors::ServerError;
use crate::export::{
    self, backup_filename, build_backup, csv_filename, export_csv, export_timestamp, export_xlsx,
    parse_backup, select_records, stats_filename, stats_report, xlsx_filename, ExportOptions,
};
use crate::responses::{
    backup_response, csv_response, json_response, text_response, xlsx_response, ResultResp,
};
use crate::scraper::run_scrape;
use crate::state::AppState;

const MAX_BODY_BYTES: u64 = 16 * 1024 * 1024;
const DEFAULT_AUDIT_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
struct RelevanceBody {
    marked: bool,
}

#[derive(Debug, Deserialize)]
struct DeleteBody {
    ids: Vec<String>,
}

pub fn handle(mut req: Request, state: &Arc<AppState>) -> ResultResp {
    let method = req.method().as_str().to_string();
    let path = req.uri().path().to_string();
    let query = query_pairs(&req);

    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

    match (method.as_str(), segments.as_slice()) {
        ("GET", ["health"]) => json_response(200, &json!({ "status": "ok" })),

        ("GET", ["tenders"]) => list_tenders(state, &query),
        ("POST", ["tenders"]) => create_tender(state, &read_body(&mut req)?),
        ("DELETE", ["tenders"]) => delete_all(state),
        ("POST", ["tenders", "delete"]) => delete_many(state, &read_body(&mut req)?),
        ("POST", ["tenders", id, "relevant"]) => mark_relevant(state, id, &read_body(&mut req)?),
        ("GET", ["tenders", id]) => {
            let tender = state.store().get(id).map_err(|e| state.note_error(e))?;
            json_response(200, &tender.ok_or(ServerError::NotFound)?)
        }
        ("PATCH", ["tenders", id]) => update_tender(state, id, &read_body(&mut req)?),

        ("GET", ["stats"]) => stats(state, &query),

        ("GET", ["export", "csv"]) => export_csv_route(state, &query),
        ("GET", ["export", "xlsx"]) => export_xlsx_route(state, &query),
        ("GET", ["export", "backup"]) => export_backup(state),
        ("GET", ["export", "stats"]) => export_stats(state, &query),
        ("POST", ["import", "backup"]) => import_backup(state, &read_body(&mut req)?),

        ("GET", ["presets"]) => {
            let list = state.db.with_conn(|conn| presets::list_presets(conn))?;
            json_response(200, &list)
        }
        ("POST", ["presets"]) => {
            let preset: NewPreset = serde_json::from_str(&read_body(&mut req)?)?;
            let saved = state
                .db
                .with_conn(|conn| presets::save_preset(conn, preset, Utc::now()))?;
            info!(id = %saved.id, name = %saved.name, "preset saved");
            json_response(201, &saved)
        }
        ("DELETE", ["presets", id]) => {
            state.db.with_conn(|conn| presets::delete_preset(conn, id))?;
            json_response(200, &json!({ "deleted": id }))
        }

        ("GET", ["audit"]) => {
            let limit = match lookup(&query, "limit") {
                Some(v) => v
                    .parse::<usize>()
                    .map_err(|_| ServerError::BadRequest(format!("Invalid limit '{v}'")))?,
                None => DEFAULT_AUDIT_LIMIT,
            };
            let entries = state.db.with_conn(|conn| audit::recent(conn, limit))?;
            json_response(200, &entries)
        }

        ("POST", ["scrape"]) => {
            if !run_scrape(&state.db, &state.config.scraper, state.scrape_flag()) {
                return Err(ServerError::BadRequest("A scrape is already running".into()));
            }
            info!("scrape started");
            json_response(202, &json!({ "started": true }))
        }
        ("GET", ["scrape", "status"]) => {
            let latest = state.db.with_conn(|conn| latest_run(conn))?;
            let status = ScrapingStatus::from_latest(latest);
            json_response(
                200,
                &json!({
                    "status": status.status,
                    "running": state.scrape_flag().load(Ordering::SeqCst),
                    "last_run": status.last_run,
                }),
            )
        }
        ("GET", ["scrape", "runs"]) => {
            let runs = state.db.with_conn(|conn| get_recent_scrapes(conn))?;
            json_response(200, &runs)
        }

        _ => Err(ServerError::NotFound),
    }
}

fn list_tenders(state: &AppState, query: &[(String, String)]) -> ResultResp {
    let filter = TenderFilter::from_query_pairs(query).map_err(ServerError::BadRequest)?;
    let relevant_only = lookup(query, "relevant").is_some_and(is_truthy);
    let records = state.load(&filter, relevant_only)?;
    json_response(200, &records)
}

/// The summary plus the derived ratios and per-bucket totals.
fn stats(state: &AppState, query: &[(String, String)]) -> ResultResp {
    let mode = view_mode(query)?;
    let records = state.load_all()?;
    let summary = summarize(&records, mode);

    let mut body = serde_json::to_value(&summary).map_err(|_| ServerError::InternalError)?;
    body["relevant_percentage"] = json!(summary.relevant_percentage());
    body["urgent_percentage"] = json!(summary.urgent_percentage());
    body["bucket_totals"] = json!(summary
        .bucket_totals()
        .into_iter()
        .map(|(bucket, count)| json!({ "bucket": bucket, "count": count }))
        .collect::<Vec<_>>());
    json_response(200, &body)
}

fn create_tender(state: &AppState, body: &str) -> ResultResp {
    let form: TenderForm = serde_json::from_str(body)?;
    let known = state.collection()?.ifb_numbers();
    let new = validate_new_tender(&form, &known, Utc::now().date_naive())
        .map_err(ServerError::Validation)?;

    // The loaded collection may be partial; the store has the full set.
    let stored = state.store().ifb_numbers().map_err(|e| state.note_error(e))?;
    if stored.contains(&new.ifb_no) {
        let mut errors = ValidationErrors::default();
        errors.add("ifb_no", "This IFB No already exists in the database");
        return Err(ServerError::Validation(errors));
    }

    let tender = state.store().insert(new).map_err(|e| state.note_error(e))?;
    state.collection()?.apply_insert(tender.clone());
    record_audit(
        state,
        AuditAction::Insert,
        json!({ "id": tender.id, "ifb_no": tender.ifb_no }),
        Some(1),
    );
    json_response(201, &tender)
}

fn mark_relevant(state: &AppState, id: &str, body: &str) -> ResultResp {
    let RelevanceBody { marked } = serde_json::from_str(body)?;
    let tender = state
        .store()
        .update(id, &TenderPatch::relevance(marked))
        .map_err(|e| state.note_error(e))?;
    state.collection()?.apply_update(tender.clone());
    record_audit(
        state,
        AuditAction::MarkRelevant,
        json!({ "id": id, "marked": marked }),
        Some(1),
    );
    json_response(200, &tender)
}

fn update_tender(state: &AppState, id: &str, body: &str) -> ResultResp {
    let patch: TenderPatch = serde_json::from_str(body)?;
    if patch.is_empty() {
        return Err(ServerError::BadRequest("Nothing to update".into()));
    }
    let tender = state
        .store()
        .update(id, &patch)
        .map_err(|e| state.note_error(e))?;
    state.collection()?.apply_update(tender.clone());
    record_audit(state, AuditAction::Update, json!({ "id": id }), Some(1));
    json_response(200, &tender)
}

fn delete_many(state: &AppState, body: &str) -> ResultResp {
    let DeleteBody { ids } = serde_json::from_str(body)?;
    if ids.is_empty() {
        return Err(ServerError::BadRequest("No tenders selected".into()));
    }
    let deleted = state
        .store()
        .delete_many(&ids)
        .map_err(|e| state.note_error(e))?;
    state.collection()?.apply_remove(&ids);
    record_audit(state, AuditAction::Delete, json!({ "ids": ids }), Some(deleted));
    json_response(200, &json!({ "deleted": deleted }))
}

fn delete_all(state: &AppState) -> ResultResp {
    let deleted = state.store().delete_all().map_err(|e| state.note_error(e))?;
    state.collection()?.clear();
    record_audit(state, AuditAction::DeleteAll, json!({}), Some(deleted));
    json_response(200, &json!({ "deleted": deleted }))
}

/// Export options with the configured defaults, the records in scope, and
/// the query's filter for the `filtered` scope.
fn export_selection(
    state: &AppState,
    query: &[(String, String)],
) -> Result<(ExportOptions, Vec<Tender>), ServerError> {
    let options = ExportOptions::new(
        state.config.export.default_columns.clone(),
        state.config.export.csv_quoting,
    )
    .with_query_pairs(query)?;
    let filter = TenderFilter::from_query_pairs(query).map_err(ServerError::BadRequest)?;

    let records = state.load_all()?;
    let selected = select_records(&records, &options, &filter.compile(false, Utc::now()))?;
    Ok((options, selected))
}

fn export_csv_route(state: &AppState, query: &[(String, String)]) -> ResultResp {
    let (options, selected) = export_selection(state, query)?;
    let text = export_csv(&selected, &options)?;
    record_audit(
        state,
        AuditAction::ExportCsv,
        json!({ "columns": options.columns, "include_summary": options.include_summary }),
        Some(selected.len()),
    );
    info!(records = selected.len(), "csv exported");
    csv_response(text, &csv_filename(&export_timestamp(Local::now())))
}

fn export_xlsx_route(state: &AppState, query: &[(String, String)]) -> ResultResp {
    let (options, selected) = export_selection(state, query)?;
    let buffer = export_xlsx(&selected, &options.columns)?;
    record_audit(
        state,
        AuditAction::ExportXlsx,
        json!({ "columns": options.columns }),
        Some(selected.len()),
    );
    info!(records = selected.len(), "xlsx exported");
    xlsx_response(buffer, &xlsx_filename(&export_timestamp(Local::now())))
}

fn export_backup(state: &AppState) -> ResultResp {
    let records = state.load_all()?;
    if records.is_empty() {
        return Err(export::ExportError::NoRecords.into());
    }
    let text = build_backup(&records, Utc::now())?;
    record_audit(state, AuditAction::ExportBackup, json!({}), Some(records.len()));
    info!(records = records.len(), "backup exported");
    backup_response(text, &backup_filename(&export_timestamp(Local::now())))
}

fn export_stats(state: &AppState, query: &[(String, String)]) -> ResultResp {
    let mode = view_mode(query)?;
    let records = state.load_all()?;
    let text = stats_report(&summarize(&records, mode), Local::now());
    record_audit(
        state,
        AuditAction::ExportStats,
        json!({ "mode": mode }),
        Some(records.len()),
    );
    text_response(text, &stats_filename(&export_timestamp(Local::now())))
}

/// Restore a backup record for record. Tenders whose id or IFB number is
/// already stored are skipped.
fn import_backup(state: &AppState, body: &str) -> ResultResp {
    let backup = parse_backup(body)?;
    let mut known: HashSet<String> = state.store().ifb_numbers().map_err(|e| state.note_error(e))?;

    let mut imported = 0;
    let mut skipped = 0;
    for t in &backup.tenders {
        if !known.insert(t.ifb_no.trim().to_string()) {
            skipped += 1;
            continue;
        }
        match state.store().restore(t).map_err(|e| state.note_error(e))? {
            Some(tender) => {
                state.collection()?.apply_insert(tender);
                imported += 1;
            }
            None => skipped += 1,
        }
    }

    record_audit(
        state,
        AuditAction::ImportBackup,
        json!({ "backup_timestamp": backup.timestamp, "skipped": skipped }),
        Some(imported),
    );
    info!(imported, skipped, "backup imported");
    json_response(200, &json!({ "imported": imported, "skipped": skipped }))
}

fn record_audit(
    state: &AppState,
    action: AuditAction,
    details: serde_json::Value,
    count: Option<usize>,
) {
    let recorded = state
        .db
        .with_conn(|conn| audit::record(conn, action, &details, count, Utc::now()));
    if let Err(e) = recorded {
        warn!(action = ?action, error = %e, "audit entry not recorded");
    }
}

fn view_mode(query: &[(String, String)]) -> Result<ViewMode, ServerError> {
    let raw = lookup(query, "mode").unwrap_or("all");
    ViewMode::parse(raw).ok_or_else(|| ServerError::BadRequest(format!("Unknown mode '{raw}'")))
}

fn is_truthy(v: &str) -> bool {
    matches!(v.trim(), "1" | "true" | "yes" | "on")
}

fn lookup<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn query_pairs(req: &Request) -> Vec<(String, String)> {
    match req.uri().query() {
        Some(q) => url::form_urlencoded::parse(q.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect(),
        None => Vec::new(),
    }
}

fn read_body(req: &mut Request) -> Result<String, ServerError> {
    let mut body = String::new();
    req.body_mut()
        .reader()
        .take(MAX_BODY_BYTES)
        .read_to_string(&mut body)
        .map_err(|e| ServerError::BadRequest(format!("Unreadable body: {e}")))?;
    Ok(body)
}
