// src/state.rs

//! Process-wide application state: the loaded record collection, the last
//! store error, and fetch sequencing.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::db::{Database, SqliteTenderStore, TenderStore};
use crate::domain::filter::TenderFilter;
use crate::domain::tender::Tender;
use crate::errors::ServerError;

/// Issued by [`TenderCollection::begin_fetch`]; later fetches get larger tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FetchToken(u64);

#[derive(Debug, Default)]
pub struct TenderCollection {
    records: Vec<Tender>,
    next_token: u64,
    last_applied: u64,
    last_error: Option<String>,
}

impl TenderCollection {
    pub fn records(&self) -> &[Tender] {
        &self.records
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn begin_fetch(&mut self) -> FetchToken {
        self.next_token += 1;
        FetchToken(self.next_token)
    }

    /// Apply a finished fetch unless a newer fetch or a local change was
    /// applied after it began. Returns whether the result was applied. A
    /// failed fetch leaves the records as they were and fills the error slot.
    pub fn complete_fetch(
        &mut self,
        token: FetchToken,
        result: Result<&[Tender], &ServerError>,
    ) -> bool {
        if token.0 <= self.last_applied {
            warn!(
                token = token.0,
                last_applied = self.last_applied,
                "discarding stale fetch result"
            );
            return false;
        }
        self.last_applied = token.0;
        match result {
            Ok(records) => {
                self.records = records.to_vec();
                self.last_error = None;
            }
            Err(e) => self.last_error = Some(e.to_string()),
        }
        true
    }

    pub fn set_error(&mut self, e: &ServerError) {
        self.last_error = Some(e.to_string());
    }

    /// Fetches begun before a local change hold a snapshot without it.
    fn retire_pending_fetches(&mut self) {
        self.last_applied = self.next_token;
    }

    pub fn apply_insert(&mut self, t: Tender) {
        self.retire_pending_fetches();
        self.records.retain(|r| r.id != t.id);
        self.records.push(t);
        sort_records(&mut self.records);
    }

    /// Replaces the record with the same id, if loaded.
    pub fn apply_update(&mut self, t: Tender) {
        self.retire_pending_fetches();
        if let Some(slot) = self.records.iter_mut().find(|r| r.id == t.id) {
            *slot = t;
            sort_records(&mut self.records);
        }
    }

    pub fn apply_remove(&mut self, ids: &[String]) {
        self.retire_pending_fetches();
        self.records.retain(|r| !ids.contains(&r.id));
    }

    pub fn clear(&mut self) {
        self.retire_pending_fetches();
        self.records.clear();
    }

    pub fn ifb_numbers(&self) -> HashSet<String> {
        self.records.iter().map(|t| t.ifb_no.trim().to_string()).collect()
    }
}

/// Store order: deadline ascending, records without one last, then id.
pub fn sort_records(records: &mut [Tender]) {
    records.sort_by(|a, b| {
        let by_deadline = match (a.deadline, b.deadline) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_deadline.then_with(|| a.id.cmp(&b.id))
    });
}

pub struct AppState {
    pub config: AppConfig,
    pub db: Database,
    store: Arc<dyn TenderStore + Send + Sync>,
    collection: Mutex<TenderCollection>,
    scrape_running: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(config: AppConfig, db: Database) -> Self {
        let store = Arc::new(SqliteTenderStore::new(db.clone()));
        Self::with_store(config, db, store)
    }

    pub fn with_store(
        config: AppConfig,
        db: Database,
        store: Arc<dyn TenderStore + Send + Sync>,
    ) -> Self {
        AppState {
            config,
            db,
            store,
            collection: Mutex::new(TenderCollection::default()),
            scrape_running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn store(&self) -> &dyn TenderStore {
        self.store.as_ref()
    }

    pub fn collection(&self) -> Result<MutexGuard<'_, TenderCollection>, ServerError> {
        self.collection.lock().map_err(|_| ServerError::InternalError)
    }

    pub fn scrape_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.scrape_running)
    }

    /// Query the store and hand back this request's result. The shared
    /// collection only takes it if no newer fetch finished in the meantime.
    /// The lock is not held while the store runs.
    pub fn load(&self, filter: &TenderFilter, relevant_only: bool) -> Result<Vec<Tender>, ServerError> {
        let token = self.collection()?.begin_fetch();
        let result = self.store.fetch(filter, relevant_only);

        let mut coll = self.collection()?;
        let applied = coll.complete_fetch(token, result.as_deref());
        drop(coll);
        debug!(token = token.0, applied, "fetch completed");

        result
    }

    /// Everything in the store, in store order.
    pub fn load_all(&self) -> Result<Vec<Tender>, ServerError> {
        self.load(&TenderFilter::default(), false)
    }

    /// Record a failed mutation in the error slot and pass it on.
    pub fn note_error(&self, e: ServerError) -> ServerError {
        if let Ok(mut coll) = self.collection.lock() {
            coll.set_error(&e);
        }
        e
    }
}
