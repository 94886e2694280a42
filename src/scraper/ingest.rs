// ingest.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::ScraperConfig;
use crate::db::audit::{self, AuditAction};
use crate::db::scrapes::{end_scrape_run, start_scrape_run, RunCounters};
use crate::db::{seen_keys, Database, SqliteTenderStore};
use crate::domain::relevance::RelevanceRules;
use crate::domain::tender::{days_left, NewTender, ProcurementType, Source};
use crate::errors::ServerError;
use crate::ids::{hash_key, seen_key};
use crate::scraper::models::{ListedDaysLeft, ScrapedRow};
use crate::scraper::{BolpatraScraper, PageControl, ScraperError};

/// What happened to one listed row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    /// Saved; carries the new record id.
    Added(String),
    Duplicate,
    NonRelevant,
    /// Relevant, but no days-left figure could be worked out. Marked seen, not saved.
    UnknownDeadline,
    UnknownType,
    /// Relevant with too few days left; the run ends here.
    Stop,
}

pub struct Ingestor {
    db: Database,
    store: SqliteTenderStore,
    rules: RelevanceRules,
    stop_at_days_left: i64,
    skip_non_relevant: bool,
    counters: RunCounters,
}

impl Ingestor {
    pub fn new(db: Database, config: &ScraperConfig) -> Self {
        Ingestor {
            store: SqliteTenderStore::new(db.clone()),
            db,
            rules: RelevanceRules::new(&config.include_keywords, &config.exclude_keywords),
            stop_at_days_left: config.stop_at_days_left,
            skip_non_relevant: config.skip_non_relevant,
            counters: RunCounters::default(),
        }
    }

    pub fn counters(&self) -> &RunCounters {
        &self.counters
    }

    pub fn process_page(
        &mut self,
        rows: &[ScrapedRow],
        now: DateTime<Utc>,
    ) -> Result<PageControl, ServerError> {
        self.counters.pages_fetched += 1;
        for row in rows {
            if self.process_row(row, now)? == RowOutcome::Stop {
                return Ok(PageControl::Stop);
            }
        }
        Ok(PageControl::Continue)
    }

    pub fn process_row(&mut self, row: &ScrapedRow, now: DateTime<Utc>) -> Result<RowOutcome, ServerError> {
        self.counters.tenders_found += 1;

        let notice = if row.notice_date_raw.trim().is_empty() {
            now.date_naive().to_string()
        } else {
            row.notice_date_raw.clone()
        };
        let key = hash_key(&seen_key(&row.title, &row.organization, &notice));
        let now_ms = now.timestamp_millis();

        if self.db.with_conn(|conn| seen_keys::lookup(conn, &key))?.is_some() {
            debug!(ifb_no = %row.ifb_no, "already seen");
            self.counters.duplicates_skipped += 1;
            return Ok(RowOutcome::Duplicate);
        }

        let relevant = self.rules.is_relevant_tender(&row.title, &row.organization);
        if !relevant && self.skip_non_relevant {
            self.db
                .with_conn(|conn| seen_keys::mark_seen(conn, &key, false, now_ms))?;
            self.counters.non_relevant_skipped += 1;
            return Ok(RowOutcome::NonRelevant);
        }

        let deadline = row.deadline.map(start_of_day);
        let remaining = match row.days_left {
            ListedDaysLeft::Days(n) => Some(n),
            ListedDaysLeft::Expired => Some(0),
            ListedDaysLeft::Unknown => days_left(deadline, now),
        };

        if relevant {
            match remaining {
                None => {
                    info!(ifb_no = %row.ifb_no, "relevant listing without deadline, marked seen");
                    self.db
                        .with_conn(|conn| seen_keys::mark_seen(conn, &key, true, now_ms))?;
                    return Ok(RowOutcome::UnknownDeadline);
                }
                Some(d) if d <= self.stop_at_days_left => {
                    info!(ifb_no = %row.ifb_no, days_left = d, "closing listing reached, ending run");
                    self.db
                        .with_conn(|conn| seen_keys::mark_seen(conn, &key, true, now_ms))?;
                    return Ok(RowOutcome::Stop);
                }
                Some(_) => {}
            }
        }

        let Some(procurement_type) = ProcurementType::from_listing_text(&row.procurement_type) else {
            warn!(
                ifb_no = %row.ifb_no,
                procurement_type = %row.procurement_type,
                "unrecognised procurement type, skipping row"
            );
            return Ok(RowOutcome::UnknownType);
        };

        let tender = self.store.insert_at(
            NewTender {
                ifb_no: row.ifb_no.trim().to_string(),
                title: row.title.clone(),
                organization: row.organization.clone(),
                deadline,
                procurement_type,
                notice_date: row.notice_date.map(start_of_day),
                province: None,
                source: Source::Bolpatra,
                scraped_date: now.date_naive(),
                marked_relevant: false,
            },
            now,
        )?;
        self.db
            .with_conn(|conn| seen_keys::mark_seen(conn, &key, relevant, now_ms))?;
        self.counters.tenders_added += 1;

        Ok(RowOutcome::Added(tender.id))
    }
}

fn start_of_day(d: NaiveDate) -> DateTime<Utc> {
    d.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// Clears the running flag when the scrape thread ends, panics included.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Start a background scrape unless one is already running. Returns `false`
/// when a run was already in flight.
pub fn run_scrape(db: &Database, config: &ScraperConfig, running: Arc<AtomicBool>) -> bool {
    if running
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return false;
    }

    let db = db.clone();
    let config = config.clone();

    std::thread::spawn(move || {
        let _guard = RunningGuard(running);
        let source = Source::Bolpatra.as_str();

        let run_id = match db.with_conn(|conn| start_scrape_run(conn, source, Utc::now().timestamp_millis())) {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "could not record scrape start");
                return;
            }
        };
        info!(run_id, "scraper thread started");

        let mut ingestor = Ingestor::new(db.clone(), &config);
        let result = BolpatraScraper::new(&config).and_then(|scraper| {
            scraper.fetch_pages(|rows| {
                ingestor
                    .process_page(&rows, Utc::now())
                    .map_err(|e| ScraperError::Store(e.to_string()))
            })
        });

        let counters = *ingestor.counters();
        let now = Utc::now();
        let (success, message) = match &result {
            Ok(pages) => {
                info!(run_id, pages, added = counters.tenders_added, "scrape complete");
                (true, None)
            }
            Err(e) => {
                error!(run_id, error = %e, "scrape failed");
                (false, Some(e.to_string()))
            }
        };

        let finished = db.with_conn(|conn| {
            end_scrape_run(conn, run_id, now.timestamp_millis(), &counters, success, message.clone())?;
            audit::record(
                conn,
                AuditAction::Scrape,
                &json!({ "run_id": run_id, "success": success, "counters": counters, "error": message }),
                Some(counters.tenders_added),
                now,
            )
        });
        if let Err(e) = finished {
            error!(run_id, error = %e, "could not record scrape end");
        }
    });

    true
}
