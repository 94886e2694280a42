use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashSet;
use tracing::info;

use crate::db::connection::Database;
use crate::domain::filter::TenderFilter;
use crate::domain::tender::{
    days_left, truncate_millis, NewTender, Province, Tender, TenderPatch, DAYS_LEFT_SQL,
};
use crate::errors::ServerError;
use crate::ids::generate_id_default;

/// The record store as seen by the rest of the application.
pub trait TenderStore {
    /// Matching records ordered by deadline ascending (no deadline last),
    /// then id.
    fn fetch(&self, filter: &TenderFilter, relevant_only: bool) -> Result<Vec<Tender>, ServerError>;
    fn get(&self, id: &str) -> Result<Option<Tender>, ServerError>;
    fn insert(&self, new: NewTender) -> Result<Tender, ServerError>;
    /// Store an exported record unchanged. `None` if its id is taken.
    fn restore(&self, t: &Tender) -> Result<Option<Tender>, ServerError>;
    fn update(&self, id: &str, patch: &TenderPatch) -> Result<Tender, ServerError>;
    fn delete_many(&self, ids: &[String]) -> Result<usize, ServerError>;
    fn delete_all(&self) -> Result<usize, ServerError>;
    fn ifb_numbers(&self) -> Result<HashSet<String>, ServerError>;
}

#[derive(Debug, Clone)]
pub struct SqliteTenderStore {
    db: Database,
}

const COLUMNS: &str = "id, ifb_no, title, organization, procurement_type, province, source, \
     notice_date, deadline, scraped_date, marked_relevant, created_at, updated_at";

impl SqliteTenderStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// [`TenderStore::fetch`] with an explicit clock.
    pub fn fetch_at(
        &self,
        filter: &TenderFilter,
        relevant_only: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<Tender>, ServerError> {
        let sql_filter = filter.compile(relevant_only, now).to_sql();
        let sql = format!(
            "SELECT {COLUMNS}, {DAYS_LEFT_SQL} AS days_left FROM tenders \
             WHERE {} ORDER BY deadline IS NULL, deadline, id",
            sql_filter.clause
        );

        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(sql_filter.params.iter()), row_to_tender)?;
            let mut out = Vec::new();
            for r in rows {
                out.push(r?);
            }
            Ok(out)
        })
    }

    pub fn get_at(&self, id: &str, now: DateTime<Utc>) -> Result<Option<Tender>, ServerError> {
        self.db.with_conn(|conn| select_one(conn, id, now))
    }

    pub fn insert_at(&self, new: NewTender, now: DateTime<Utc>) -> Result<Tender, ServerError> {
        let now = truncate_millis(now);
        let tender = Tender {
            id: generate_id_default(),
            ifb_no: new.ifb_no,
            title: new.title,
            organization: new.organization,
            deadline: new.deadline.map(truncate_millis),
            procurement_type: new.procurement_type,
            notice_date: new.notice_date.map(truncate_millis),
            province: new.province,
            source: new.source,
            days_left: days_left(new.deadline, now),
            scraped_date: new.scraped_date,
            marked_relevant: new.marked_relevant,
            created_at: now,
            updated_at: now,
        };

        self.db.with_conn(|conn| {
            write_row(conn, "INSERT INTO tenders", &tender)?;
            Ok(())
        })?;

        info!(id = %tender.id, ifb_no = %tender.ifb_no, source = %tender.source, "tender inserted");
        Ok(tender)
    }

    /// Write a record as it was exported, keeping its id and timestamps.
    /// `None` when a record with that id is already stored.
    pub fn restore_at(&self, t: &Tender, now: DateTime<Utc>) -> Result<Option<Tender>, ServerError> {
        let mut tender = t.clone();
        tender.deadline = tender.deadline.map(truncate_millis);
        tender.notice_date = tender.notice_date.map(truncate_millis);
        tender.created_at = truncate_millis(tender.created_at);
        tender.updated_at = truncate_millis(tender.updated_at);
        tender.days_left = days_left(tender.deadline, now);

        let written = self
            .db
            .with_conn(|conn| Ok(write_row(conn, "INSERT OR IGNORE INTO tenders", &tender)?))?;

        if written == 0 {
            info!(id = %tender.id, "tender already stored, not restored");
            return Ok(None);
        }
        info!(id = %tender.id, ifb_no = %tender.ifb_no, "tender restored");
        Ok(Some(tender))
    }

    pub fn update_at(
        &self,
        id: &str,
        patch: &TenderPatch,
        now: DateTime<Utc>,
    ) -> Result<Tender, ServerError> {
        let now = truncate_millis(now);
        self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            let mut tender = select_one(&tx, id, now)?.ok_or(ServerError::NotFound)?;

            if patch.apply_to(&mut tender, now) {
                tender.deadline = tender.deadline.map(truncate_millis);
                tender.updated_at = now;
                tx.execute(
                    "UPDATE tenders SET title = ?2, organization = ?3, procurement_type = ?4, \
                     province = ?5, deadline = ?6, marked_relevant = ?7, updated_at = ?8 \
                     WHERE id = ?1",
                    params![
                        tender.id,
                        tender.title,
                        tender.organization,
                        tender.procurement_type.as_str(),
                        tender.province.map(|p| p.as_str()),
                        tender.deadline.map(|d| d.timestamp_millis()),
                        tender.marked_relevant,
                        tender.updated_at.timestamp_millis(),
                    ],
                )?;
            }

            tx.commit()?;
            Ok(tender)
        })
    }
}

impl TenderStore for SqliteTenderStore {
    fn fetch(&self, filter: &TenderFilter, relevant_only: bool) -> Result<Vec<Tender>, ServerError> {
        self.fetch_at(filter, relevant_only, Utc::now())
    }

    fn get(&self, id: &str) -> Result<Option<Tender>, ServerError> {
        self.get_at(id, Utc::now())
    }

    fn insert(&self, new: NewTender) -> Result<Tender, ServerError> {
        self.insert_at(new, Utc::now())
    }

    fn restore(&self, t: &Tender) -> Result<Option<Tender>, ServerError> {
        self.restore_at(t, Utc::now())
    }

    fn update(&self, id: &str, patch: &TenderPatch) -> Result<Tender, ServerError> {
        self.update_at(id, patch, Utc::now())
    }

    fn delete_many(&self, ids: &[String]) -> Result<usize, ServerError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{i}")).collect();
        let sql = format!("DELETE FROM tenders WHERE id IN ({})", placeholders.join(", "));
        let n = self
            .db
            .with_conn(|conn| Ok(conn.execute(&sql, params_from_iter(ids.iter()))?))?;
        info!(requested = ids.len(), deleted = n, "tenders deleted");
        Ok(n)
    }

    fn delete_all(&self) -> Result<usize, ServerError> {
        let n = self
            .db
            .with_conn(|conn| Ok(conn.execute("DELETE FROM tenders", [])?))?;
        info!(deleted = n, "all tenders deleted");
        Ok(n)
    }

    fn ifb_numbers(&self) -> Result<HashSet<String>, ServerError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT ifb_no FROM tenders")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let mut out = HashSet::new();
            for r in rows {
                out.insert(r?.trim().to_string());
            }
            Ok(out)
        })
    }
}

fn write_row(conn: &Connection, verb: &str, t: &Tender) -> rusqlite::Result<usize> {
    conn.execute(
        &format!(
            "{verb} ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
        ),
        params![
            t.id,
            t.ifb_no,
            t.title,
            t.organization,
            t.procurement_type.as_str(),
            t.province.map(|p| p.as_str()),
            t.source.as_str(),
            t.notice_date.map(|d| d.timestamp_millis()),
            t.deadline.map(|d| d.timestamp_millis()),
            t.scraped_date,
            t.marked_relevant,
            t.created_at.timestamp_millis(),
            t.updated_at.timestamp_millis(),
        ],
    )
}

fn select_one(conn: &Connection, id: &str, now: DateTime<Utc>) -> Result<Option<Tender>, ServerError> {
    let sql = format!("SELECT {COLUMNS}, {DAYS_LEFT_SQL} AS days_left FROM tenders WHERE id = ?2");
    let found = conn
        .query_row(&sql, params![now.timestamp_millis(), id], row_to_tender)
        .optional()?;
    Ok(found)
}

fn row_to_tender(row: &Row<'_>) -> rusqlite::Result<Tender> {
    Ok(Tender {
        id: row.get(0)?,
        ifb_no: row.get(1)?,
        title: row.get(2)?,
        organization: row.get(3)?,
        procurement_type: parse_text(row, 4)?,
        province: match row.get::<_, Option<String>>(5)? {
            Some(s) => Province::parse_optional(&s).map_err(|e| conversion(5, e))?,
            None => None,
        },
        source: parse_text(row, 6)?,
        notice_date: opt_millis(row, 7)?,
        deadline: opt_millis(row, 8)?,
        scraped_date: row.get::<_, NaiveDate>(9)?,
        marked_relevant: row.get(10)?,
        created_at: millis(row, 11)?,
        updated_at: millis(row, 12)?,
        days_left: row.get(13)?,
    })
}

fn conversion<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn parse_text<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let s: String = row.get(idx)?;
    s.parse().map_err(|e| conversion(idx, e))
}

fn opt_millis(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<i64>>(idx)? {
        Some(ms) => DateTime::from_timestamp_millis(ms)
            .map(Some)
            .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, ms)),
        None => Ok(None),
    }
}

fn millis(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let ms: i64 = row.get(idx)?;
    DateTime::from_timestamp_millis(ms).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, ms))
}
