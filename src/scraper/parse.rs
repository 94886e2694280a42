// parse.rs
use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::scraper::models::{self, ListedDaysLeft, ScrapedRow};
use crate::scraper::ScraperError;

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y", "%Y/%m/%d"];

/// Rows of the bid table. Rows with too few cells or without a reference
/// number or title are skipped.
pub fn parse_rows(html: &str) -> Result<Vec<ScrapedRow>, ScraperError> {
    let document = Html::parse_document(html);
    let row_sel = Selector::parse("table#dashBoardBidResult tbody tr")
        .map_err(|e| ScraperError::HtmlParse(e.to_string()))?;
    let cell_sel = Selector::parse("td").map_err(|e| ScraperError::HtmlParse(e.to_string()))?;

    let mut rows = Vec::new();
    for (i, tr) in document.select(&row_sel).enumerate() {
        let cells: Vec<String> = tr.select(&cell_sel).map(cell_text).collect();
        match row_from_cells(&cells) {
            Some(row) => rows.push(row),
            None => debug!(row = i, cells = cells.len(), "skipping bid table row"),
        }
    }
    Ok(rows)
}

/// Whether the page carries the bid table at all, rows or not.
pub fn has_bid_table(html: &str) -> bool {
    let document = Html::parse_document(html);
    match Selector::parse("table#dashBoardBidResult") {
        Ok(sel) => document.select(&sel).next().is_some(),
        Err(_) => false,
    }
}

fn cell_text(td: ElementRef<'_>) -> String {
    td.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn row_from_cells(cells: &[String]) -> Option<ScrapedRow> {
    if cells.len() < models::CELL_COUNT {
        return None;
    }
    let ifb_no = cells[models::IFB_NO].clone();
    let title = cells[models::TITLE].clone();
    if ifb_no.is_empty() || title.is_empty() {
        return None;
    }

    let notice_date_raw = cells[models::NOTICE_DATE].clone();
    Some(ScrapedRow {
        ifb_no,
        title,
        organization: cells[models::PUBLIC_ENTITY].clone(),
        procurement_type: cells[models::PROCUREMENT_TYPE].to_lowercase(),
        status: cells[models::STATUS].clone(),
        notice_date: normalize_date(&notice_date_raw),
        notice_date_raw,
        deadline: normalize_date(&cells[models::SUBMISSION_DATE]),
        days_left: parse_days_left_text(&cells[models::DAYS_LEFT]),
    })
}

/// Known listing date formats; a trailing time part is ignored.
pub fn normalize_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let candidates = [raw, raw.split_whitespace().next().unwrap_or(raw)];
    candidates.iter().find_map(|s| {
        DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
    })
}

/// `"27"`, `"27 days"`, `"27 day(s)"` are days; anything mentioning
/// expiry is expired; otherwise unknown.
pub fn parse_days_left_text(text: &str) -> ListedDaysLeft {
    let t = text.trim().to_lowercase();
    if t.is_empty() {
        return ListedDaysLeft::Unknown;
    }
    if t.contains("expir") {
        return ListedDaysLeft::Expired;
    }
    let digits: String = t
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    match digits.parse::<i64>() {
        Ok(n) => ListedDaysLeft::Days(n),
        Err(_) => ListedDaysLeft::Unknown,
    }
}
