use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::domain::filter::TenderFilter;
use crate::domain::validation::ValidationErrors;
use crate::errors::ServerError;
use crate::ids::generate_id_default;

/// A named filter the user can re-apply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterPreset {
    pub id: String,
    pub name: String,
    pub filter: TenderFilter,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPreset {
    pub name: String,
    #[serde(default)]
    pub filter: TenderFilter,
}

pub fn list_presets(conn: &Connection) -> Result<Vec<FilterPreset>, ServerError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, filter_config, created_at FROM filter_presets ORDER BY created_at, name",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, i64>(3)?,
        ))
    })?;

    let mut out = Vec::new();
    for r in rows {
        let (id, name, config, created_ms) = r?;
        let filter: TenderFilter = serde_json::from_str(&config)
            .map_err(|e| ServerError::DbError(format!("Corrupt preset '{name}': {e}")))?;
        let created_at = DateTime::from_timestamp_millis(created_ms)
            .ok_or_else(|| ServerError::DbError(format!("Corrupt preset '{name}' timestamp")))?;
        out.push(FilterPreset {
            id,
            name,
            filter,
            created_at,
        });
    }
    Ok(out)
}

pub fn save_preset(
    conn: &Connection,
    preset: NewPreset,
    now: DateTime<Utc>,
) -> Result<FilterPreset, ServerError> {
    let name = preset.name.trim().to_string();
    let mut errors = ValidationErrors::default();
    if name.is_empty() {
        errors.add("name", "Preset name is required");
    } else {
        let taken: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM filter_presets WHERE name = ?1)",
            params![name],
            |row| row.get(0),
        )?;
        if taken {
            errors.add("name", "A preset with this name already exists");
        }
    }
    if !errors.is_empty() {
        return Err(ServerError::Validation(errors));
    }

    let config = serde_json::to_string(&preset.filter).map_err(|_| ServerError::InternalError)?;
    let saved = FilterPreset {
        id: generate_id_default(),
        name,
        filter: preset.filter,
        created_at: crate::domain::tender::truncate_millis(now),
    };
    conn.execute(
        "INSERT INTO filter_presets (id, name, filter_config, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![saved.id, saved.name, config, saved.created_at.timestamp_millis()],
    )?;
    Ok(saved)
}

pub fn delete_preset(conn: &Connection, id: &str) -> Result<(), ServerError> {
    let n = conn.execute("DELETE FROM filter_presets WHERE id = ?1", params![id])?;
    if n == 0 {
        return Err(ServerError::NotFound);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tender::Province;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(&std::fs::read_to_string("sql/schema.sql").unwrap())
            .unwrap();
        conn
    }

    #[test]
    fn presets_round_trip_and_names_are_unique() {
        let conn = conn();
        let filter = TenderFilter {
            keyword: Some("design".into()),
            province: vec![Province::Bagmati],
            days_left_min: Some(8),
            ..Default::default()
        };
        let saved = save_preset(
            &conn,
            NewPreset { name: " Bagmati design ".into(), filter: filter.clone() },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(saved.name, "Bagmati design");

        let listed = list_presets(&conn).unwrap();
        assert_eq!(listed, vec![saved.clone()]);
        assert_eq!(listed[0].filter, filter);

        let dup = save_preset(
            &conn,
            NewPreset { name: "Bagmati design".into(), filter: TenderFilter::default() },
            Utc::now(),
        );
        match dup {
            Err(ServerError::Validation(e)) => {
                assert_eq!(e.get("name"), Some("A preset with this name already exists"))
            }
            other => panic!("expected validation error, got {other:?}"),
        }

        delete_preset(&conn, &saved.id).unwrap();
        assert!(list_presets(&conn).unwrap().is_empty());
        assert!(matches!(delete_preset(&conn, &saved.id), Err(ServerError::NotFound)));
    }
}
