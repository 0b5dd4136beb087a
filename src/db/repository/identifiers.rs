//! External UUID <-> internal key resolution.
//!
//! UUIDs travel as 36-character strings and are stored as 16-byte BLOBs.
//! Malformed input never errors; it simply resolves to nothing.

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::UuidTable;

/// Parse a canonical (hyphenated) UUID string.
pub fn parse_uuid(value: &str) -> Option<Uuid> {
    let value = value.trim();
    if value.len() != 36 {
        return None;
    }
    Uuid::parse_str(value).ok()
}

/// Binary storage form.
pub fn uuid_to_bytes(uuid: &Uuid) -> Vec<u8> {
    uuid.as_bytes().to_vec()
}

pub fn uuid_from_bytes(bytes: &[u8]) -> Option<Uuid> {
    Uuid::from_slice(bytes).ok()
}

/// Storage bytes back to the external string form.
pub fn uuid_string_from_bytes(bytes: &[u8]) -> Option<String> {
    uuid_from_bytes(bytes).map(|u| u.hyphenated().to_string())
}

/// Resolve an external UUID to the table's internal key.
pub fn resolve_key(
    conn: &Connection,
    table: UuidTable,
    uuid: &Uuid,
) -> Result<Option<i64>, DatabaseError> {
    let sql = format!(
        "SELECT {key} FROM {table} WHERE uuid = ?1 LIMIT 1",
        key = table.key_column(),
        table = table.as_str(),
    );
    let key = conn
        .query_row(&sql, params![uuid_to_bytes(uuid)], |row| row.get::<_, i64>(0))
        .optional()?;
    Ok(key)
}

/// Reverse lookup: internal key to external UUID.
pub fn uuid_for_key(
    conn: &Connection,
    table: UuidTable,
    key: i64,
) -> Result<Option<Uuid>, DatabaseError> {
    let sql = format!(
        "SELECT uuid FROM {table} WHERE {key} = ?1 LIMIT 1",
        key = table.key_column(),
        table = table.as_str(),
    );
    let bytes = conn
        .query_row(&sql, params![key], |row| row.get::<_, Option<Vec<u8>>>(0))
        .optional()?
        .flatten();
    Ok(bytes.as_deref().and_then(uuid_from_bytes))
}

pub fn uuid_exists(conn: &Connection, table: UuidTable, uuid: &Uuid) -> Result<bool, DatabaseError> {
    Ok(resolve_key(conn, table, uuid)?.is_some())
}

/// Check that an internal key exists in `table.column`.
pub fn key_exists(
    conn: &Connection,
    table: &str,
    column: &str,
    key: i64,
) -> Result<bool, DatabaseError> {
    let sql = format!("SELECT 1 FROM {table} WHERE {column} = ?1 LIMIT 1");
    let found = conn
        .query_row(&sql, params![key], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn seed_patient(conn: &Connection, pid: i64) -> Uuid {
        let uuid = Uuid::new_v4();
        conn.execute(
            "INSERT INTO patient_data (pid, uuid, fname, lname) VALUES (?1, ?2, 'Ada', 'Lovelace')",
            params![pid, uuid_to_bytes(&uuid)],
        )
        .unwrap();
        uuid
    }

    #[test]
    fn parse_rejects_malformed_and_simple_forms() {
        assert!(parse_uuid("not-a-uuid").is_none());
        assert!(parse_uuid("").is_none());
        let u = Uuid::new_v4();
        assert!(parse_uuid(&u.simple().to_string()).is_none());
        assert_eq!(parse_uuid(&u.to_string()), Some(u));
    }

    #[test]
    fn bytes_round_trip() {
        let u = Uuid::new_v4();
        let bytes = uuid_to_bytes(&u);
        assert_eq!(bytes.len(), 16);
        assert_eq!(uuid_string_from_bytes(&bytes), Some(u.to_string()));
        assert!(uuid_from_bytes(&bytes[..8]).is_none());
    }

    #[test]
    fn resolves_patient_key() {
        let conn = open_memory_database().unwrap();
        let uuid = seed_patient(&conn, 42);
        assert_eq!(resolve_key(&conn, UuidTable::PatientData, &uuid).unwrap(), Some(42));
        assert_eq!(uuid_for_key(&conn, UuidTable::PatientData, 42).unwrap(), Some(uuid));
    }

    #[test]
    fn unknown_and_malformed_resolve_to_none() {
        let conn = open_memory_database().unwrap();
        seed_patient(&conn, 1);
        assert_eq!(resolve_key(&conn, UuidTable::PatientData, &Uuid::new_v4()).unwrap(), None);
        assert_eq!(uuid_for_key(&conn, UuidTable::PatientData, 99).unwrap(), None);
    }

    #[test]
    fn key_exists_checks_column() {
        let conn = open_memory_database().unwrap();
        seed_patient(&conn, 7);
        assert!(key_exists(&conn, "patient_data", "pid", 7).unwrap());
        assert!(!key_exists(&conn, "patient_data", "pid", 8).unwrap());
    }
}
