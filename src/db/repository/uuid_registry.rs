use chrono::Local;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::identifiers::uuid_to_bytes;
use crate::db::DatabaseError;
use crate::models::enums::UuidTable;

const MAX_ALLOCATION_ATTEMPTS: usize = 10;

/// Allocate a new UUID for `table` and record it in the registry.
/// The registry's primary key makes every allocated UUID globally unique.
pub fn allocate_uuid(conn: &Connection, table: UuidTable) -> Result<Uuid, DatabaseError> {
    let now = Local::now().naive_local().format("%Y-%m-%d %H:%M:%S").to_string();
    for attempt in 1..=MAX_ALLOCATION_ATTEMPTS {
        let uuid = Uuid::new_v4();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO uuid_registry (uuid, table_name, created) VALUES (?1, ?2, ?3)",
            params![uuid_to_bytes(&uuid), table.as_str(), now],
        )?;
        if inserted == 1 {
            return Ok(uuid);
        }
        tracing::warn!(table = table.as_str(), attempt, "UUID collision in registry, retrying");
    }
    Err(DatabaseError::ConstraintViolation(format!(
        "could not allocate a unique UUID for {} after {MAX_ALLOCATION_ATTEMPTS} attempts",
        table.as_str()
    )))
}

/// Assign UUIDs to every row of `table` that has none. Returns the number of
/// rows updated.
pub fn backfill_missing_uuids(conn: &Connection, table: UuidTable) -> Result<usize, DatabaseError> {
    let key = table.key_column();
    let sql = format!("SELECT {key} FROM {} WHERE uuid IS NULL", table.as_str());
    let keys: Vec<i64> = {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
        rows.collect::<Result<_, _>>()?
    };

    let update = format!("UPDATE {} SET uuid = ?1 WHERE {key} = ?2", table.as_str());
    for k in &keys {
        let uuid = allocate_uuid(conn, table)?;
        conn.execute(&update, params![uuid_to_bytes(&uuid), k])?;
    }

    if !keys.is_empty() {
        tracing::info!(table = table.as_str(), count = keys.len(), "Backfilled missing UUIDs");
    }
    Ok(keys.len())
}

/// Backfill every UUID-bearing table. Returns the total rows updated.
pub fn backfill_all_missing_uuids(conn: &Connection) -> Result<usize, DatabaseError> {
    let mut total = 0;
    for table in UuidTable::ALL {
        total += backfill_missing_uuids(conn, *table)?;
    }
    Ok(total)
}
