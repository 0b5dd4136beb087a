use serde::{Deserialize, Serialize};

use super::enums::{MedicationStatus, SourceTable};

/// A coded field resolved against `list_options`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodedValue {
    pub id: String,
    pub title: Option<String>,
    pub codes: Option<String>,
}

/// A drug code resolved through the coding lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodingEntry {
    pub system: String,
    pub code: String,
    pub description: String,
}

/// One row of the unified medication view, after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationRecord {
    pub id: i64,
    pub uuid: Option<String>,
    pub source_table: SourceTable,
    pub patient_uuid: Option<String>,
    pub encounter_uuid: Option<String>,
    pub practitioner_uuid: Option<String>,
    pub drug: Option<String>,
    pub drug_id: Option<i64>,
    pub drugcode: Vec<CodingEntry>,
    pub form: Option<String>,
    pub dosage: Option<String>,
    pub quantity: Option<String>,
    pub size: Option<String>,
    pub unit: Option<CodedValue>,
    pub route: Option<CodedValue>,
    pub interval: Option<CodedValue>,
    pub refills: Option<i64>,
    pub status: MedicationStatus,
    pub active: bool,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub date_added: Option<String>,
    pub date_modified: Option<String>,
    pub note: Option<String>,
    pub indication: Option<String>,
    pub drug_dosage_instructions: Option<String>,
    pub intent: Option<String>,
    pub intent_title: Option<String>,
    pub category: Option<String>,
    pub category_title: Option<String>,
}
