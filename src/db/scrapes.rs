use crate::errors::ServerError;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrapeRun {
    pub id: i64,
    pub source: String,
    pub started_at: i64,
    pub finished_at: Option<i64>,
    pub pages_fetched: Option<i64>,
    pub tenders_found: Option<i64>,
    pub tenders_added: Option<i64>,
    pub duplicates_skipped: Option<i64>,
    pub non_relevant_skipped: Option<i64>,
    pub success: Option<bool>,
    pub error_message: Option<String>,
}

/// Counters accumulated while a run is in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunCounters {
    pub pages_fetched: usize,
    pub tenders_found: usize,
    pub tenders_added: usize,
    pub duplicates_skipped: usize,
    pub non_relevant_skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeState {
    Idle,
    Scraping,
    Completed,
    Failed,
}

/// What `GET /scrape/status` reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrapingStatus {
    pub status: ScrapeState,
    pub last_run: Option<ScrapeRun>,
}

impl ScrapingStatus {
    pub fn from_latest(run: Option<ScrapeRun>) -> Self {
        let status = match &run {
            None => ScrapeState::Idle,
            Some(r) if r.finished_at.is_none() => ScrapeState::Scraping,
            Some(r) if r.success == Some(true) => ScrapeState::Completed,
            Some(_) => ScrapeState::Failed,
        };
        ScrapingStatus { status, last_run: run }
    }
}

pub fn start_scrape_run(conn: &Connection, source: &str, now: i64) -> Result<i64, ServerError> {
    conn.execute(
        "INSERT INTO scrape_runs (source, started_at, success) VALUES (?1, ?2, 0)",
        params![source, now],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn end_scrape_run(
    conn: &Connection,
    run_id: i64,
    now: i64,
    counters: &RunCounters,
    success: bool,
    error: Option<String>,
) -> Result<(), ServerError> {
    conn.execute(
        "UPDATE scrape_runs SET finished_at = ?1, pages_fetched = ?2, tenders_found = ?3, \
         tenders_added = ?4, duplicates_skipped = ?5, non_relevant_skipped = ?6, success = ?7, \
         error_message = ?8 WHERE id = ?9",
        params![
            now,
            counters.pages_fetched as i64,
            counters.tenders_found as i64,
            counters.tenders_added as i64,
            counters.duplicates_skipped as i64,
            counters.non_relevant_skipped as i64,
            success,
            error,
            run_id
        ],
    )?;
    Ok(())
}

const RUN_COLUMNS: &str = "id, source, started_at, finished_at, pages_fetched, tenders_found, \
     tenders_added, duplicates_skipped, non_relevant_skipped, success, error_message";

fn row_to_run(row: &Row<'_>) -> rusqlite::Result<ScrapeRun> {
    Ok(ScrapeRun {
        id: row.get(0)?,
        source: row.get(1)?,
        started_at: row.get(2)?,
        finished_at: row.get(3)?,
        pages_fetched: row.get(4)?,
        tenders_found: row.get(5)?,
        tenders_added: row.get(6)?,
        duplicates_skipped: row.get(7)?,
        non_relevant_skipped: row.get(8)?,
        success: row.get(9)?,
        error_message: row.get(10)?,
    })
}

pub fn get_recent_scrapes(conn: &Connection) -> Result<Vec<ScrapeRun>, ServerError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RUN_COLUMNS} FROM scrape_runs ORDER BY started_at DESC, id DESC LIMIT 50"
    ))?;
    let rows = stmt.query_map([], row_to_run)?;

    let mut runs = Vec::new();
    for r in rows {
        runs.push(r?);
    }
    Ok(runs)
}

pub fn latest_run(conn: &Connection) -> Result<Option<ScrapeRun>, ServerError> {
    let run = conn
        .query_row(
            &format!("SELECT {RUN_COLUMNS} FROM scrape_runs ORDER BY id DESC LIMIT 1"),
            [],
            row_to_run,
        )
        .optional()?;
    Ok(run)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(&std::fs::read_to_string("sql/schema.sql").unwrap())
            .unwrap();
        conn
    }

    #[test]
    fn status_follows_the_latest_run() {
        let conn = conn();
        assert_eq!(
            ScrapingStatus::from_latest(latest_run(&conn).unwrap()).status,
            ScrapeState::Idle
        );

        let id = start_scrape_run(&conn, "Bolpatra", 1_000).unwrap();
        assert_eq!(
            ScrapingStatus::from_latest(latest_run(&conn).unwrap()).status,
            ScrapeState::Scraping
        );

        let counters = RunCounters {
            pages_fetched: 2,
            tenders_found: 40,
            tenders_added: 3,
            duplicates_skipped: 30,
            non_relevant_skipped: 7,
        };
        end_scrape_run(&conn, id, 2_000, &counters, true, None).unwrap();
        let status = ScrapingStatus::from_latest(latest_run(&conn).unwrap());
        assert_eq!(status.status, ScrapeState::Completed);
        let run = status.last_run.unwrap();
        assert_eq!(run.tenders_added, Some(3));
        assert_eq!(run.finished_at, Some(2_000));

        let failed = start_scrape_run(&conn, "Bolpatra", 3_000).unwrap();
        end_scrape_run(&conn, failed, 3_500, &RunCounters::default(), false, Some("timeout".into()))
            .unwrap();
        assert_eq!(
            ScrapingStatus::from_latest(latest_run(&conn).unwrap()).status,
            ScrapeState::Failed
        );
        assert_eq!(get_recent_scrapes(&conn).unwrap().len(), 2);
    }
}
