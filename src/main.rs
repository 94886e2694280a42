use crate::config::{AppConfig, LogFormat};
use crate::db::{init_db, Database};
use crate::responses::error_response;
use crate::router::handle;
use crate::state::AppState;
use astra::Server;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod db;
mod domain;
mod errors;
mod export;
mod ids;
mod responses;
mod router;
mod scraper;
mod state;

#[cfg(test)]
mod tests;

fn init_tracing(format: &LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tender_tracker=info,warn"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn main() {
    let config = match AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration failed: {e}");
            std::process::exit(1);
        }
    };
    init_tracing(&config.log_format);

    let db = Database::new(&config.database.path);
    if let Err(e) = init_db(&db, &config.database.schema_path) {
        error!(error = %e, "database initialization failed");
        std::process::exit(1);
    }

    let addr: SocketAddr = match config.server.bind_addr.parse() {
        Ok(a) => a,
        Err(e) => {
            error!(bind_addr = %config.server.bind_addr, error = %e, "invalid bind address");
            std::process::exit(1);
        }
    };
    let max_workers = config.server.max_workers;
    info!(%addr, max_workers, db = %config.database.path.display(), "starting server");

    let state = Arc::new(AppState::new(config, db));
    let server = Server::bind(&addr).max_workers(max_workers);

    let result = server.serve(move |req, _info| match handle(req, &state) {
        Ok(resp) => resp,
        Err(err) => error_response(err),
    });

    if let Err(e) = result {
        error!(error = %e, "server ended with error");
    }

    info!("server shut down");
}
