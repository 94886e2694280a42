// src/export/mod.rs

//! Export serializers and the options shared by all of them.

pub mod backup;
pub mod csv;
pub mod report;
pub mod xlsx;

use chrono::{DateTime, Local, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::filter::CompiledFilter;
use crate::domain::tender::Tender;

pub use self::backup::{build_backup, parse_backup};
pub use self::csv::export_csv;
pub use self::report::stats_report;
pub use self::xlsx::export_xlsx;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExportError {
    #[error("Please select at least one column")]
    NoColumns,
    #[error("No tenders to export")]
    NoRecords,
    #[error("Unknown column '{0}'")]
    UnknownColumn(String),
    #[error("Unknown export scope '{0}'")]
    UnknownScope(String),
    #[error("Unknown sort key '{0}'")]
    UnknownSort(String),
    #[error("Unknown CSV quoting '{0}'")]
    UnknownQuoting(String),
    #[error("Invalid backup: {0}")]
    InvalidBackup(String),
    #[error("CSV write failed: {0}")]
    Csv(String),
    #[error("JSON encoding failed: {0}")]
    Json(String),
}

/// A record column as named in CSV headers and export requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    IfbNo,
    Title,
    Organization,
    Deadline,
    DaysLeft,
    ProcurementType,
    NoticeDate,
    Province,
    Source,
    MarkedRelevant,
    ScrapedDate,
    CreatedAt,
    UpdatedAt,
}

impl Column {
    pub const ALL: [Column; 13] = [
        Column::IfbNo,
        Column::Title,
        Column::Organization,
        Column::Deadline,
        Column::DaysLeft,
        Column::ProcurementType,
        Column::NoticeDate,
        Column::Province,
        Column::Source,
        Column::MarkedRelevant,
        Column::ScrapedDate,
        Column::CreatedAt,
        Column::UpdatedAt,
    ];

    pub const DEFAULT_EXPORT: [Column; 9] = [
        Column::IfbNo,
        Column::Title,
        Column::Organization,
        Column::Deadline,
        Column::DaysLeft,
        Column::ProcurementType,
        Column::NoticeDate,
        Column::Province,
        Column::Source,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Column::IfbNo => "ifb_no",
            Column::Title => "title",
            Column::Organization => "organization",
            Column::Deadline => "deadline",
            Column::DaysLeft => "days_left",
            Column::ProcurementType => "procurement_type",
            Column::NoticeDate => "notice_date",
            Column::Province => "province",
            Column::Source => "source",
            Column::MarkedRelevant => "marked_relevant",
            Column::ScrapedDate => "scraped_date",
            Column::CreatedAt => "created_at",
            Column::UpdatedAt => "updated_at",
        }
    }

    pub fn cell(&self, t: &Tender) -> Cell {
        match self {
            Column::IfbNo => Cell::Text(t.ifb_no.clone()),
            Column::Title => Cell::Text(t.title.clone()),
            Column::Organization => Cell::Text(t.organization.clone()),
            Column::Deadline => Cell::instant(t.deadline),
            Column::DaysLeft => t.days_left.map_or(Cell::Empty, Cell::Int),
            Column::ProcurementType => Cell::Text(t.procurement_type.as_str().to_string()),
            Column::NoticeDate => Cell::instant(t.notice_date),
            Column::Province => t
                .province
                .map_or(Cell::Empty, |p| Cell::Text(p.as_str().to_string())),
            Column::Source => Cell::Text(t.source.as_str().to_string()),
            Column::MarkedRelevant => Cell::Bool(t.marked_relevant),
            Column::ScrapedDate => Cell::date(t.scraped_date),
            Column::CreatedAt => Cell::instant(Some(t.created_at)),
            Column::UpdatedAt => Cell::instant(Some(t.updated_at)),
        }
    }
}

impl FromStr for Column {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Column::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| ExportError::UnknownColumn(s.to_string()))
    }
}

/// One exported value, before a serializer decides how to write it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Empty,
    Text(String),
    Int(i64),
    Bool(bool),
}

impl Cell {
    fn instant(dt: Option<DateTime<Utc>>) -> Self {
        dt.map_or(Cell::Empty, |d| {
            Cell::Text(d.to_rfc3339_opts(SecondsFormat::Millis, true))
        })
    }

    fn date(d: NaiveDate) -> Self {
        Cell::Text(d.format("%Y-%m-%d").to_string())
    }

    /// Text form used by CSV and text outputs.
    pub fn render(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Int(n) => n.to_string(),
            Cell::Bool(b) => b.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CsvQuoting {
    /// Quote only values containing a comma; embedded quotes are written as is.
    /// Zero and `false` cells are written out, not left empty.
    #[default]
    Legacy,
    Rfc4180,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExportScope {
    All,
    #[default]
    Relevant,
    /// The request's filter, evaluated in memory.
    Filtered,
    Selected(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    Deadline,
    Organization,
    DaysLeft,
}

impl FromStr for SortBy {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "deadline" => Ok(SortBy::Deadline),
            "organization" => Ok(SortBy::Organization),
            "days_left" => Ok(SortBy::DaysLeft),
            other => Err(ExportError::UnknownSort(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    pub scope: ExportScope,
    pub columns: Vec<Column>,
    pub sort_by: Option<SortBy>,
    pub include_summary: bool,
    pub quoting: CsvQuoting,
}

impl ExportOptions {
    pub fn new(columns: Vec<Column>, quoting: CsvQuoting) -> Self {
        ExportOptions {
            scope: ExportScope::default(),
            columns,
            sort_by: None,
            include_summary: false,
            quoting,
        }
    }

    /// Read `scope`, `ids`, `columns`, `sort_by`, `include_summary` and
    /// `quoting` from query pairs. A present but empty `columns` selects
    /// nothing; an absent one keeps the defaults already in `self`.
    pub fn with_query_pairs(mut self, pairs: &[(String, String)]) -> Result<Self, ExportError> {
        let mut ids: Vec<String> = Vec::new();
        let mut scope_name: Option<String> = None;
        let mut columns: Option<Vec<Column>> = None;

        for (key, value) in pairs {
            let items = || value.split(',').map(str::trim).filter(|s| !s.is_empty());
            match key.as_str() {
                "scope" => scope_name = Some(value.trim().to_ascii_lowercase()),
                "ids" => ids.extend(items().map(str::to_string)),
                "columns" => {
                    let list = columns.get_or_insert_with(Vec::new);
                    for c in items() {
                        let col: Column = c.parse()?;
                        if !list.contains(&col) {
                            list.push(col);
                        }
                    }
                }
                "sort_by" if !value.trim().is_empty() => self.sort_by = Some(value.parse()?),
                "include_summary" => {
                    self.include_summary = matches!(value.trim(), "1" | "true" | "yes" | "on")
                }
                "quoting" => {
                    self.quoting = match value.trim() {
                        "legacy" => CsvQuoting::Legacy,
                        "rfc4180" => CsvQuoting::Rfc4180,
                        other => return Err(ExportError::UnknownQuoting(other.to_string())),
                    }
                }
                _ => {}
            }
        }

        if let Some(cols) = columns {
            self.columns = cols;
        }

        self.scope = match scope_name.as_deref() {
            None if !ids.is_empty() => ExportScope::Selected(ids),
            None => self.scope,
            Some("all") => ExportScope::All,
            Some("relevant") => ExportScope::Relevant,
            Some("filtered") => ExportScope::Filtered,
            Some("selected") => ExportScope::Selected(ids),
            Some(other) => return Err(ExportError::UnknownScope(other.to_string())),
        };

        Ok(self)
    }
}

/// Narrow `records` to the export scope and apply the requested order.
/// Fails on an empty column selection before looking at records, then on an
/// empty result.
pub fn select_records(
    records: &[Tender],
    options: &ExportOptions,
    filter: &CompiledFilter,
) -> Result<Vec<Tender>, ExportError> {
    if options.columns.is_empty() {
        return Err(ExportError::NoColumns);
    }

    let mut selected: Vec<Tender> = match &options.scope {
        ExportScope::All => records.to_vec(),
        ExportScope::Relevant => records.iter().filter(|t| t.marked_relevant).cloned().collect(),
        ExportScope::Filtered => filter.apply(records).into_iter().cloned().collect(),
        ExportScope::Selected(ids) => records
            .iter()
            .filter(|t| ids.iter().any(|id| *id == t.id))
            .cloned()
            .collect(),
    };

    if selected.is_empty() {
        return Err(ExportError::NoRecords);
    }

    if let Some(sort) = options.sort_by {
        selected.sort_by(|a, b| compare(sort, a, b));
    }

    Ok(selected)
}

fn compare(sort: SortBy, a: &Tender, b: &Tender) -> Ordering {
    match sort {
        SortBy::Deadline => nulls_last(a.deadline, b.deadline),
        SortBy::DaysLeft => nulls_last(a.days_left, b.days_left),
        SortBy::Organization => a.organization.cmp(&b.organization),
    }
}

fn nulls_last<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// `YYYY-MM-DD_HH-MM-SS` in local time, used in download filenames.
pub fn export_timestamp(now: DateTime<Local>) -> String {
    now.format("%Y-%m-%d_%H-%M-%S").to_string()
}

pub fn csv_filename(ts: &str) -> String {
    format!("tenders_export_{ts}.csv")
}

pub fn xlsx_filename(ts: &str) -> String {
    format!("tenders_export_{ts}.xlsx")
}

pub fn backup_filename(ts: &str) -> String {
    format!("tender_backup_{ts}.json")
}

pub fn stats_filename(ts: &str) -> String {
    format!("tender_statistics_{ts}.txt")
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::domain::tender::{ProcurementType, Province, Source, Tender};
    use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

    pub fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    pub fn tender(id: &str, title: &str, org: &str, days: Option<i64>, relevant: bool) -> Tender {
        let deadline = days.map(|d| now() + Duration::days(d));
        Tender {
            id: id.into(),
            ifb_no: format!("IFB/{id}"),
            title: title.into(),
            organization: org.into(),
            deadline,
            procurement_type: ProcurementType::WorksNcb,
            notice_date: None,
            province: Some(Province::Bagmati),
            source: Source::Bolpatra,
            days_left: days,
            scraped_date: NaiveDate::from_ymd_opt(2025, 2, 27).unwrap(),
            marked_relevant: relevant,
            created_at: now(),
            updated_at: now(),
        }
    }
}
