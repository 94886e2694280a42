use crate::errors::ServerError;
use rusqlite::{params, Connection, OptionalExtension};

/// Whether a hashed listing key was recorded before, and if so whether it was
/// judged relevant at the time.
pub fn lookup(conn: &Connection, key_hash: &str) -> Result<Option<bool>, ServerError> {
    let found = conn
        .query_row(
            "SELECT relevant FROM seen_keys WHERE key_hash = ?1",
            params![key_hash],
            |row| row.get::<_, bool>(0),
        )
        .optional()?;
    Ok(found)
}

/// Record a key. The first sighting wins.
pub fn mark_seen(conn: &Connection, key_hash: &str, relevant: bool, now: i64) -> Result<(), ServerError> {
    conn.execute(
        "INSERT OR IGNORE INTO seen_keys (key_hash, relevant, first_seen_at) VALUES (?1, ?2, ?3)",
        params![key_hash, relevant, now],
    )?;
    Ok(())
}

pub fn count(conn: &Connection) -> Result<i64, ServerError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM seen_keys", [], |row| row.get(0))?)
}
