use crate::config::AppConfig;
use crate::db::{init_db, Database, SqliteTenderStore, TenderStore};
use crate::domain::filter::TenderFilter;
use crate::domain::tender::{NewTender, Tender, TenderPatch};
use crate::errors::ServerError;
use crate::responses::error_response;
use crate::router::handle;
use crate::state::AppState;
use astra::{Body, Request, Response};
use http::Method;
use serde_json::Value;
use std::collections::HashSet;
use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// A router-ready state over a fresh database in its own temp directory.
pub struct TestApp {
    _dir: TempDir,
    pub db: Database,
    pub state: Arc<AppState>,
}

fn fresh_db() -> (TempDir, Database, AppConfig) {
    let dir = TempDir::new().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
    let path = dir.path().join("test_db.sqlite");
    let db = Database::new(&path);
    init_db(&db, "sql/schema.sql")
        .unwrap_or_else(|e| panic!("Database initialization failed: {e}"));

    let mut config = AppConfig::default();
    config.database.path = path;
    (dir, db, config)
}

pub fn test_app() -> TestApp {
    let (dir, db, config) = fresh_db();
    let state = Arc::new(AppState::new(config, db.clone()));
    TestApp { _dir: dir, db, state }
}

/// Same as [`test_app`] but with the store wrapped in a call counter.
pub fn counting_app() -> (TestApp, Arc<CountingStore>) {
    let (dir, db, config) = fresh_db();
    let store = Arc::new(CountingStore::new(SqliteTenderStore::new(db.clone())));
    let state = Arc::new(AppState::with_store(config, db.clone(), store.clone()));
    (TestApp { _dir: dir, db, state }, store)
}

impl TestApp {
    /// Run a request through the router, rendering errors the way the server does.
    pub fn send(&self, method: Method, uri: &str, body: &str) -> Response {
        match handle(request(method, uri, body), &self.state) {
            Ok(resp) => resp,
            Err(err) => error_response(err),
        }
    }

    pub fn get(&self, uri: &str) -> Response {
        self.send(Method::GET, uri, "")
    }

    pub fn post(&self, uri: &str, body: &Value) -> Response {
        self.send(Method::POST, uri, &body.to_string())
    }
}

pub fn request(method: Method, uri: &str, body: &str) -> Request {
    http::Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn body_string(resp: Response) -> String {
    let mut body = String::new();
    resp.into_body()
        .reader()
        .read_to_string(&mut body)
        .unwrap();
    body
}

pub fn body_json(resp: Response) -> Value {
    let text = body_string(resp);
    serde_json::from_str(&text).unwrap_or_else(|e| panic!("not JSON ({e}): {text}"))
}

pub fn header(resp: &Response, name: &str) -> String {
    resp.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

/// Store wrapper that counts every call made through the trait.
pub struct CountingStore {
    inner: SqliteTenderStore,
    calls: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: SqliteTenderStore) -> Self {
        CountingStore {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl TenderStore for CountingStore {
    fn fetch(&self, filter: &TenderFilter, relevant_only: bool) -> Result<Vec<Tender>, ServerError> {
        self.tick();
        self.inner.fetch(filter, relevant_only)
    }

    fn get(&self, id: &str) -> Result<Option<Tender>, ServerError> {
        self.tick();
        self.inner.get(id)
    }

    fn insert(&self, new: NewTender) -> Result<Tender, ServerError> {
        self.tick();
        self.inner.insert(new)
    }

    fn restore(&self, t: &Tender) -> Result<Option<Tender>, ServerError> {
        self.tick();
        self.inner.restore(t)
    }

    fn update(&self, id: &str, patch: &TenderPatch) -> Result<Tender, ServerError> {
        self.tick();
        self.inner.update(id, patch)
    }

    fn delete_many(&self, ids: &[String]) -> Result<usize, ServerError> {
        self.tick();
        self.inner.delete_many(ids)
    }

    fn delete_all(&self) -> Result<usize, ServerError> {
        self.tick();
        self.inner.delete_all()
    }

    fn ifb_numbers(&self) -> Result<HashSet<String>, ServerError> {
        self.tick();
        self.inner.ifb_numbers()
    }
}
