//! Prescription service: insert, update, get and delete over the
//! prescriptions table and the unified medication view.
//!
//! Every operation returns a [`ProcessingResult`]. Validation problems and
//! storage failures are reported as data on the result, never as errors.

use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::coding::{CodeLookup, CodesTableLookup};
use crate::db::repository::{
    allocate_uuid, delete_prescription, insert_prescription, is_owned_by, option_title,
    parse_uuid, resolve_key, search_medications, update_prescription, uuid_exists, AuditStamp,
};
use crate::db::DatabaseError;
use crate::models::enums::{OptionList, UuidTable};
use crate::models::*;
use crate::validation::{validate_insert, validate_update, FieldErrors, Validation};

/// Uniform result envelope: validation messages, internal errors, data.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingResult<T> {
    pub validation_messages: FieldErrors,
    pub internal_errors: Vec<String>,
    pub data: Vec<T>,
}

impl<T> Default for ProcessingResult<T> {
    fn default() -> Self {
        Self {
            validation_messages: FieldErrors::new(),
            internal_errors: Vec::new(),
            data: Vec::new(),
        }
    }
}

impl<T> ProcessingResult<T> {
    /// Valid, with no data.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_data(data: Vec<T>) -> Self {
        Self { data, ..Self::default() }
    }

    pub fn invalid(messages: FieldErrors) -> Self {
        Self { validation_messages: messages, ..Self::default() }
    }

    pub fn validation_error(field: &str, message: impl Into<String>) -> Self {
        let mut messages = FieldErrors::new();
        messages.insert(field.to_string(), vec![message.into()]);
        Self::invalid(messages)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self { internal_errors: vec![message.into()], ..Self::default() }
    }

    pub fn is_valid(&self) -> bool {
        self.validation_messages.is_empty()
    }

    pub fn has_internal_errors(&self) -> bool {
        !self.internal_errors.is_empty()
    }

    pub fn has_data(&self) -> bool {
        !self.data.is_empty()
    }
}

fn storage_failure<T>(operation: &str, err: DatabaseError) -> ProcessingResult<T> {
    tracing::error!(operation, error = %err, "Prescription statement failed");
    ProcessingResult::internal_error(format!("Failed to {operation} prescription"))
}

/// Orchestrates validation, ownership and storage for one connection.
pub struct PrescriptionService<'c> {
    conn: &'c Connection,
    actor: Option<i64>,
    lookup: Box<dyn CodeLookup + 'c>,
}

impl<'c> PrescriptionService<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self {
            conn,
            actor: None,
            lookup: Box::new(CodesTableLookup),
        }
    }

    /// Acting user (`users.id`) recorded in the audit fields.
    pub fn with_actor(mut self, user_id: i64) -> Self {
        self.actor = Some(user_id);
        self
    }

    pub fn with_code_lookup(mut self, lookup: impl CodeLookup + 'c) -> Self {
        self.lookup = Box::new(lookup);
        self
    }

    /// Validate and create a prescription. Returns the new id and UUID.
    pub fn insert(&self, data: &Value) -> ProcessingResult<InsertedPrescription> {
        let mut fields = match validate_insert(self.conn, data) {
            Ok(Validation::Valid(fields)) => fields,
            Ok(Validation::Invalid(errors)) => return ProcessingResult::invalid(errors),
            Err(e) => return storage_failure("insert", e),
        };

        let Some(patient) = fields.take("puuid").and_then(|v| v.as_uuid()) else {
            return ProcessingResult::validation_error("puuid", "puuid is required");
        };

        match self.store_new(&patient, &mut fields) {
            Ok(Some(inserted)) => {
                tracing::info!(id = inserted.id, uuid = %inserted.uuid, "Prescription created");
                ProcessingResult::with_data(vec![inserted])
            }
            Ok(None) => ProcessingResult::validation_error(
                "puuid",
                "puuid does not reference an existing patient",
            ),
            Err(e) => storage_failure("insert", e),
        }
    }

    fn store_new(
        &self,
        patient: &Uuid,
        fields: &mut PrescriptionFields,
    ) -> Result<Option<InsertedPrescription>, DatabaseError> {
        let Some(patient_key) = resolve_key(self.conn, UuidTable::PatientData, patient)? else {
            return Ok(None);
        };
        self.attach_titles(fields)?;
        let uuid = allocate_uuid(self.conn, UuidTable::Prescriptions)?;
        let audit = AuditStamp::now(self.actor);
        let id = insert_prescription(self.conn, patient_key, &uuid, fields, &audit)?;
        Ok(Some(InsertedPrescription {
            id,
            uuid: uuid.hyphenated().to_string(),
        }))
    }

    /// Store option titles alongside the coded usage category and intent.
    fn attach_titles(&self, fields: &mut PrescriptionFields) -> Result<(), DatabaseError> {
        let coded = [
            ("usage_category", "usage_category_title", OptionList::UsageCategory),
            ("request_intent", "request_intent_title", OptionList::RequestIntent),
        ];
        for (field, title_field, list) in coded {
            let title = match fields.get(field) {
                Some(FieldValue::Text(option)) => option_title(self.conn, list, option)?,
                Some(FieldValue::Null) => None,
                _ => continue,
            };
            fields.push(title_field, FieldValue::Text(title.unwrap_or_default()));
        }
        Ok(())
    }

    /// Partially update a prescription owned by `patient_uuid`, then return
    /// the current record.
    pub fn update(
        &self,
        patient_uuid: &str,
        prescription_uuid: &str,
        data: &Value,
    ) -> ProcessingResult<MedicationRecord> {
        if is_empty_payload(data) {
            return ProcessingResult::validation_error("data", "update payload is empty");
        }

        let mut fields = match validate_update(self.conn, prescription_uuid, data) {
            Ok(Validation::Valid(fields)) => fields,
            Ok(Validation::Invalid(errors)) => return ProcessingResult::invalid(errors),
            Err(e) => return storage_failure("update", e),
        };

        let Some(uuid) = fields.take("uuid").and_then(|v| v.as_uuid()) else {
            return ProcessingResult::validation_error("uuid", "uuid must be a valid UUID");
        };
        if let Some(claimed) = fields.take("puuid") {
            if claimed.as_uuid() != parse_uuid(patient_uuid) {
                return ProcessingResult::validation_error(
                    "puuid",
                    "a prescription cannot be moved to another patient",
                );
            }
        }

        if !is_owned_by(self.conn, patient_uuid, prescription_uuid) {
            tracing::warn!(prescription = prescription_uuid, "Ownership check failed on update");
            return ProcessingResult::validation_error(
                "uuid",
                "prescription does not belong to the given patient",
            );
        }
        if fields.is_empty() {
            return ProcessingResult::validation_error("data", "no updatable fields supplied");
        }

        let stored = self.attach_titles(&mut fields).and_then(|()| {
            update_prescription(self.conn, &uuid, &fields, &AuditStamp::now(self.actor))
        });
        match stored {
            Ok(changed) => {
                tracing::info!(uuid = %uuid, changed, fields = fields.len(), "Prescription updated");
                self.get_one(prescription_uuid, Some(patient_uuid))
            }
            Err(e) => storage_failure("update", e),
        }
    }

    /// Fetch one record of the unified view by UUID.
    pub fn get_one(&self, uuid: &str, patient_uuid: Option<&str>) -> ProcessingResult<MedicationRecord> {
        let Some(uuid) = parse_uuid(uuid) else {
            return ProcessingResult::validation_error("uuid", "uuid must be a valid UUID");
        };
        let criteria = SearchCriteria::all().with(MedicationFilter::Prescription(uuid));
        self.get_all(&criteria, patient_uuid)
    }

    /// Search the unified view. Patient criteria must name existing patients.
    pub fn get_all(
        &self,
        criteria: &SearchCriteria,
        patient_uuid: Option<&str>,
    ) -> ProcessingResult<MedicationRecord> {
        let patient = match patient_uuid {
            None => None,
            Some(raw) => match parse_uuid(raw) {
                Some(uuid) => Some(uuid),
                None => {
                    return ProcessingResult::validation_error(
                        "patient_uuid",
                        "patient_uuid must be a valid UUID",
                    )
                }
            },
        };

        let mut to_check: Vec<(&str, Uuid)> = Vec::new();
        if let Some(uuid) = patient {
            to_check.push(("patient_uuid", uuid));
        }
        for filter in &criteria.filters {
            if let MedicationFilter::Patient(uuid) = filter {
                to_check.push(("puuid", *uuid));
            }
        }
        for (field, uuid) in to_check {
            match uuid_exists(self.conn, UuidTable::PatientData, &uuid) {
                Ok(true) => {}
                Ok(false) => {
                    return ProcessingResult::validation_error(
                        field,
                        format!("{field} does not reference an existing patient"),
                    )
                }
                Err(e) => return storage_failure("search", e),
            }
        }

        match search_medications(self.conn, criteria, patient.as_ref(), self.lookup.as_ref()) {
            Ok(records) => ProcessingResult::with_data(records),
            Err(e) => storage_failure("search", e),
        }
    }

    /// Parse query-string criteria, then search. Unknown or malformed
    /// criteria fail validation without running the query.
    pub fn get_all_from_pairs<'a, I>(
        &self,
        pairs: I,
        patient_uuid: Option<&str>,
    ) -> ProcessingResult<MedicationRecord>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        match SearchCriteria::from_pairs(pairs) {
            Ok(criteria) => self.get_all(&criteria, patient_uuid),
            Err(errors) => {
                let mut messages = FieldErrors::new();
                for e in errors {
                    messages.entry(e.key().to_string()).or_default().push(e.to_string());
                }
                ProcessingResult::invalid(messages)
            }
        }
    }

    /// Hard-delete a prescription scoped to its patient. Unknown or
    /// malformed identifiers yield an empty result.
    pub fn delete(&self, patient_uuid: &str, uuid: &str) -> ProcessingResult<DeletedPrescription> {
        let (Some(patient), Some(prescription)) = (parse_uuid(patient_uuid), parse_uuid(uuid)) else {
            tracing::warn!("Delete requested with malformed identifiers");
            return ProcessingResult::empty();
        };

        match self.delete_scoped(&patient, &prescription) {
            Ok(0) => ProcessingResult::empty(),
            Ok(_) => {
                tracing::info!(uuid = %prescription, "Prescription deleted");
                ProcessingResult::with_data(vec![DeletedPrescription {
                    uuid: prescription.hyphenated().to_string(),
                }])
            }
            Err(e) => storage_failure("delete", e),
        }
    }

    fn delete_scoped(&self, patient: &Uuid, prescription: &Uuid) -> Result<usize, DatabaseError> {
        if !uuid_exists(self.conn, UuidTable::Prescriptions, prescription)? {
            return Ok(0);
        }
        let Some(patient_key) = resolve_key(self.conn, UuidTable::PatientData, patient)? else {
            return Ok(0);
        };
        delete_prescription(self.conn, patient_key, prescription)
    }
}

fn is_empty_payload(data: &Value) -> bool {
    match data {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
