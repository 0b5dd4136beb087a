use chrono::{Local, NaiveDate};
use rusqlite::types::ToSql;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::identifiers::{parse_uuid, resolve_key, uuid_to_bytes};
use crate::db::DatabaseError;
use crate::models::enums::UuidTable;
use crate::models::PrescriptionFields;

/// Who touched a row, and when.
#[derive(Debug, Clone)]
pub struct AuditStamp {
    pub at: String,
    pub actor: Option<i64>,
}

impl AuditStamp {
    pub fn now(actor: Option<i64>) -> Self {
        Self {
            at: Local::now().naive_local().format("%Y-%m-%d %H:%M:%S").to_string(),
            actor,
        }
    }
}

/// Insert a prescription row. Returns the new surrogate id.
pub fn insert_prescription(
    conn: &Connection,
    patient_key: i64,
    uuid: &Uuid,
    fields: &PrescriptionFields,
    audit: &AuditStamp,
) -> Result<i64, DatabaseError> {
    let mut columns: Vec<String> = vec![
        "uuid".into(),
        "patient_id".into(),
        "date_added".into(),
        "date_modified".into(),
        "created_by".into(),
        "updated_by".into(),
    ];
    let uuid_bytes = uuid_to_bytes(uuid);
    let mut values: Vec<&dyn ToSql> = vec![
        &uuid_bytes as &dyn ToSql,
        &patient_key,
        &audit.at,
        &audit.at,
        &audit.actor,
        &audit.actor,
    ];
    for (name, value) in fields.iter() {
        columns.push(format!("\"{name}\""));
        values.push(value);
    }

    let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "INSERT INTO prescriptions ({}) VALUES ({})",
        columns.join(", "),
        placeholders.join(", ")
    );
    tracing::debug!(%sql, "Inserting prescription");

    conn.execute(&sql, values.as_slice())?;
    Ok(conn.last_insert_rowid())
}

/// Apply a partial update keyed by UUID. Returns the number of rows changed.
pub fn update_prescription(
    conn: &Connection,
    uuid: &Uuid,
    fields: &PrescriptionFields,
    audit: &AuditStamp,
) -> Result<usize, DatabaseError> {
    let mut assignments: Vec<String> = Vec::new();
    let mut values: Vec<&dyn ToSql> = Vec::new();
    for (name, value) in fields.iter() {
        values.push(value);
        assignments.push(format!("\"{name}\" = ?{}", values.len()));
    }
    values.push(&audit.at);
    assignments.push(format!("date_modified = ?{}", values.len()));
    values.push(&audit.actor);
    assignments.push(format!("updated_by = ?{}", values.len()));

    let uuid_bytes = uuid_to_bytes(uuid);
    values.push(&uuid_bytes);
    let sql = format!(
        "UPDATE prescriptions SET {} WHERE uuid = ?{}",
        assignments.join(", "),
        values.len()
    );
    tracing::debug!(%sql, "Updating prescription");

    Ok(conn.execute(&sql, values.as_slice())?)
}

/// Hard-delete a prescription scoped to its patient.
pub fn delete_prescription(
    conn: &Connection,
    patient_key: i64,
    uuid: &Uuid,
) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM prescriptions WHERE patient_id = ?1 AND uuid = ?2",
        params![patient_key, uuid_to_bytes(uuid)],
    )?;
    Ok(deleted)
}

/// The stored patient reference of a prescription.
pub fn prescription_patient_key(
    conn: &Connection,
    uuid: &Uuid,
) -> Result<Option<i64>, DatabaseError> {
    let key = conn
        .query_row(
            "SELECT patient_id FROM prescriptions WHERE uuid = ?1",
            params![uuid_to_bytes(uuid)],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(key)
}

/// Stored `(start_date, end_date)` of a prescription. Unparseable stored
/// dates read as `None`.
pub fn prescription_dates(
    conn: &Connection,
    uuid: &Uuid,
) -> Result<Option<(Option<NaiveDate>, Option<NaiveDate>)>, DatabaseError> {
    let dates = conn
        .query_row(
            "SELECT start_date, end_date FROM prescriptions WHERE uuid = ?1",
            params![uuid_to_bytes(uuid)],
            |row| Ok((row.get::<_, Option<String>>(0)?, row.get::<_, Option<String>>(1)?)),
        )
        .optional()?;
    let parse = |raw: Option<String>| {
        raw.and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok())
    };
    Ok(dates.map(|(start, end)| (parse(start), parse(end))))
}

/// True when the prescription exists and belongs to the patient.
/// Malformed identifiers and lookup failures count as not owned.
pub fn is_owned_by(conn: &Connection, patient_uuid: &str, prescription_uuid: &str) -> bool {
    let (Some(patient), Some(prescription)) = (parse_uuid(patient_uuid), parse_uuid(prescription_uuid))
    else {
        return false;
    };

    let owner = resolve_key(conn, UuidTable::PatientData, &patient)
        .and_then(|pid| Ok((pid, prescription_patient_key(conn, &prescription)?)));
    match owner {
        Ok((Some(pid), Some(stored))) => pid == stored,
        Ok(_) => false,
        Err(e) => {
            tracing::error!(error = %e, "Ownership lookup failed");
            false
        }
    }
}
