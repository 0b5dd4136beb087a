//! Field validation for prescription payloads.
//!
//! Insert and update each have their own explicit rule table. Validation
//! never fails the caller: it yields either sanitized typed fields or a set
//! of field-keyed messages. Only storage errors during referential checks
//! propagate.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use rusqlite::Connection;
use serde_json::{Map, Value};

use crate::db::repository::{
    key_exists, option_exists, parse_uuid, prescription_dates, uuid_exists,
};
use crate::db::DatabaseError;
use crate::models::enums::{OptionList, UuidTable};
use crate::models::{FieldValue, PrescriptionFields};

/// Dates are accepted only in this exact shape.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

static DATE_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

/// Field-keyed validation messages.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    Optional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text { max_len: usize },
    Integer { min: i64 },
    Boolean,
    Date,
    /// Well-formed UUID, no existence check.
    Uuid,
    /// Well-formed UUID of an existing patient.
    PatientUuid,
    /// Member of a `list_options` list.
    Coded(OptionList),
    /// Integer key that must exist in `table.column`.
    Reference { table: &'static str, column: &'static str },
}

impl FieldKind {
    /// Whether an explicit `null` clears the column.
    pub fn is_nullable(&self) -> bool {
        !matches!(
            self,
            FieldKind::Integer { .. } | FieldKind::Boolean | FieldKind::Uuid | FieldKind::PatientUuid
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub name: &'static str,
    pub presence: Presence,
    pub kind: FieldKind,
}

const fn required(name: &'static str, kind: FieldKind) -> FieldRule {
    FieldRule { name, presence: Presence::Required, kind }
}

const fn optional(name: &'static str, kind: FieldKind) -> FieldRule {
    FieldRule { name, presence: Presence::Optional, kind }
}

const ENCOUNTER: FieldKind = FieldKind::Reference { table: "form_encounter", column: "encounter" };
const DRUG: FieldKind = FieldKind::Reference { table: "drugs", column: "drug_id" };
const PROVIDER: FieldKind = FieldKind::Reference { table: "users", column: "id" };

pub const INSERT_RULES: &[FieldRule] = &[
    required("puuid", FieldKind::PatientUuid),
    required("start_date", FieldKind::Date),
    optional("end_date", FieldKind::Date),
    optional("encounter", ENCOUNTER),
    optional("provider_id", PROVIDER),
    optional("drug", FieldKind::Text { max_len: 150 }),
    optional("drug_id", DRUG),
    optional("rxnorm_drugcode", FieldKind::Text { max_len: 25 }),
    optional("form", FieldKind::Coded(OptionList::Form)),
    optional("dosage", FieldKind::Text { max_len: 100 }),
    optional("quantity", FieldKind::Text { max_len: 31 }),
    optional("size", FieldKind::Text { max_len: 25 }),
    optional("unit", FieldKind::Coded(OptionList::Unit)),
    optional("route", FieldKind::Coded(OptionList::Route)),
    optional("interval", FieldKind::Coded(OptionList::Interval)),
    optional("refills", FieldKind::Integer { min: 0 }),
    optional("per_refill", FieldKind::Integer { min: 0 }),
    optional("substitute", FieldKind::Integer { min: 0 }),
    optional("medication", FieldKind::Boolean),
    optional("active", FieldKind::Boolean),
    optional("note", FieldKind::Text { max_len: 2000 }),
    optional("indication", FieldKind::Text { max_len: 255 }),
    optional("prn", FieldKind::Text { max_len: 30 }),
    optional("drug_dosage_instructions", FieldKind::Text { max_len: 2000 }),
    optional("usage_category", FieldKind::Coded(OptionList::UsageCategory)),
    optional("request_intent", FieldKind::Coded(OptionList::RequestIntent)),
];

pub const UPDATE_RULES: &[FieldRule] = &[
    required("uuid", FieldKind::Uuid),
    optional("puuid", FieldKind::PatientUuid),
    optional("start_date", FieldKind::Date),
    optional("end_date", FieldKind::Date),
    optional("encounter", ENCOUNTER),
    optional("provider_id", PROVIDER),
    optional("drug", FieldKind::Text { max_len: 150 }),
    optional("drug_id", DRUG),
    optional("rxnorm_drugcode", FieldKind::Text { max_len: 25 }),
    optional("form", FieldKind::Coded(OptionList::Form)),
    optional("dosage", FieldKind::Text { max_len: 100 }),
    optional("quantity", FieldKind::Text { max_len: 31 }),
    optional("size", FieldKind::Text { max_len: 25 }),
    optional("unit", FieldKind::Coded(OptionList::Unit)),
    optional("route", FieldKind::Coded(OptionList::Route)),
    optional("interval", FieldKind::Coded(OptionList::Interval)),
    optional("refills", FieldKind::Integer { min: 0 }),
    optional("per_refill", FieldKind::Integer { min: 0 }),
    optional("substitute", FieldKind::Integer { min: 0 }),
    optional("medication", FieldKind::Boolean),
    optional("active", FieldKind::Boolean),
    optional("note", FieldKind::Text { max_len: 2000 }),
    optional("indication", FieldKind::Text { max_len: 255 }),
    optional("prn", FieldKind::Text { max_len: 30 }),
    optional("drug_dosage_instructions", FieldKind::Text { max_len: 2000 }),
    optional("usage_category", FieldKind::Coded(OptionList::UsageCategory)),
    optional("request_intent", FieldKind::Coded(OptionList::RequestIntent)),
];

/// Outcome of validating a payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    Valid(PrescriptionFields),
    Invalid(FieldErrors),
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid(_))
    }
}

/// Validate an insert payload.
pub fn validate_insert(conn: &Connection, payload: &Value) -> Result<Validation, DatabaseError> {
    validate(conn, INSERT_RULES, payload)
}

/// Validate an update payload for the prescription `uuid`.
pub fn validate_update(
    conn: &Connection,
    uuid: &str,
    payload: &Value,
) -> Result<Validation, DatabaseError> {
    let mut merged = match payload {
        Value::Object(map) => map.clone(),
        _ => return Ok(not_an_object()),
    };
    merged.insert("uuid".into(), Value::String(uuid.to_string()));
    match validate(conn, UPDATE_RULES, &Value::Object(merged))? {
        Validation::Valid(fields) => check_stored_date_order(conn, fields),
        invalid => Ok(invalid),
    }
}

/// When an update supplies only one end of the date range, order it against
/// the other end as currently stored. An explicit `null` clears its side.
fn check_stored_date_order(
    conn: &Connection,
    fields: PrescriptionFields,
) -> Result<Validation, DatabaseError> {
    let side = |name: &str| {
        fields.get(name).map(|v| match v {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        })
    };
    let (start, end) = (side("start_date"), side("end_date"));
    if start.is_some() == end.is_some() {
        return Ok(Validation::Valid(fields));
    }
    let Some(uuid) = fields.get("uuid").and_then(FieldValue::as_uuid) else {
        return Ok(Validation::Valid(fields));
    };
    // Unknown prescriptions are left to the ownership check.
    let Some((stored_start, stored_end)) = prescription_dates(conn, &uuid)? else {
        return Ok(Validation::Valid(fields));
    };

    match (start.unwrap_or(stored_start), end.unwrap_or(stored_end)) {
        (Some(new_start), Some(new_end)) if new_end < new_start => {
            let mut errors = FieldErrors::new();
            let field = if end.is_some() { "end_date" } else { "start_date" };
            push_error(&mut errors, field, "end_date must not be before start_date".into());
            tracing::warn!(field, "Update would invert the stored date range");
            Ok(Validation::Invalid(errors))
        }
        _ => Ok(Validation::Valid(fields)),
    }
}

/// Apply `rules` to `payload`. Keys without a rule are dropped.
pub fn validate(
    conn: &Connection,
    rules: &[FieldRule],
    payload: &Value,
) -> Result<Validation, DatabaseError> {
    let Value::Object(map) = payload else {
        return Ok(not_an_object());
    };

    let mut fields = PrescriptionFields::new();
    let mut errors = FieldErrors::new();

    for rule in rules {
        match map.get(rule.name) {
            None | Some(Value::Null) if rule.presence == Presence::Required => {
                push_error(&mut errors, rule.name, format!("{} is required", rule.name));
            }
            None => {}
            Some(Value::Null) if rule.kind.is_nullable() => fields.push(rule.name, FieldValue::Null),
            Some(Value::Null) => {
                push_error(&mut errors, rule.name, format!("{} must not be null", rule.name));
            }
            Some(value) => match check_value(conn, rule, value)? {
                Ok(v) => fields.push(rule.name, v),
                Err(message) => push_error(&mut errors, rule.name, message),
            },
        }
    }

    check_date_order(&fields, &mut errors);
    log_dropped_keys(rules, map);

    if errors.is_empty() {
        Ok(Validation::Valid(fields))
    } else {
        tracing::warn!(fields = ?errors.keys().collect::<Vec<_>>(), "Prescription payload rejected");
        Ok(Validation::Invalid(errors))
    }
}

fn not_an_object() -> Validation {
    let mut errors = FieldErrors::new();
    push_error(&mut errors, "data", "payload must be a JSON object".into());
    Validation::Invalid(errors)
}

fn push_error(errors: &mut FieldErrors, field: &str, message: String) {
    errors.entry(field.to_string()).or_default().push(message);
}

fn log_dropped_keys(rules: &[FieldRule], map: &Map<String, Value>) {
    for key in map.keys() {
        if !rules.iter().any(|r| r.name == key) {
            tracing::debug!(key = %key, "Dropping unrecognized payload field");
        }
    }
}

fn check_date_order(fields: &PrescriptionFields, errors: &mut FieldErrors) {
    if let (Some(FieldValue::Date(start)), Some(FieldValue::Date(end))) =
        (fields.get("start_date"), fields.get("end_date"))
    {
        if end < start {
            push_error(errors, "end_date", "end_date must not be before start_date".into());
        }
    }
}

/// Type and membership check for one value. The outer `Result` carries
/// storage failures; the inner one the validation message.
fn check_value(
    conn: &Connection,
    rule: &FieldRule,
    value: &Value,
) -> Result<Result<FieldValue, String>, DatabaseError> {
    let name = rule.name;
    let checked = match rule.kind {
        FieldKind::Text { max_len } => match value.as_str().map(str::trim) {
            None => Err(format!("{name} must be a string")),
            Some("") => Ok(FieldValue::Null),
            Some(s) if s.chars().count() <= max_len => Ok(FieldValue::Text(s.to_string())),
            Some(_) => Err(format!("{name} must be at most {max_len} characters")),
        },
        FieldKind::Integer { min } => match as_integer(value) {
            Some(i) if i >= min => Ok(FieldValue::Integer(i)),
            Some(_) => Err(format!("{name} must be at least {min}")),
            None => Err(format!("{name} must be an integer")),
        },
        FieldKind::Boolean => {
            as_bool(value).map(FieldValue::Bool).ok_or_else(|| format!("{name} must be a boolean"))
        }
        FieldKind::Date => as_date(value)
            .map(FieldValue::Date)
            .ok_or_else(|| format!("{name} must be a date in YYYY-MM-DD format")),
        FieldKind::Uuid => as_str(value)
            .and_then(parse_uuid)
            .map(FieldValue::Uuid)
            .ok_or_else(|| format!("{name} must be a valid UUID")),
        FieldKind::PatientUuid => match as_str(value).and_then(parse_uuid) {
            None => Err(format!("{name} must be a valid UUID")),
            Some(uuid) if uuid_exists(conn, UuidTable::PatientData, &uuid)? => {
                Ok(FieldValue::Uuid(uuid))
            }
            Some(_) => Err(format!("{name} does not reference an existing patient")),
        },
        FieldKind::Coded(list) => match as_str(value) {
            None => Err(format!("{name} must be a string")),
            Some(option) if option_exists(conn, list, option)? => {
                Ok(FieldValue::Text(option.to_string()))
            }
            Some(option) => Err(format!("{name} '{option}' is not in list {}", list.as_str())),
        },
        FieldKind::Reference { table, column } => match as_integer(value) {
            None => Err(format!("{name} must be an integer")),
            Some(key) if key_exists(conn, table, column, key)? => Ok(FieldValue::Integer(key)),
            Some(key) => Err(format!("{name} {key} does not exist")),
        },
    };
    Ok(checked)
}

fn as_str(value: &Value) -> Option<&str> {
    value.as_str()
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.as_str() {
            "1" | "true" => Some(true),
            "0" | "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn as_date(value: &Value) -> Option<NaiveDate> {
    let s = value.as_str()?;
    if !DATE_SHAPE.is_match(s) {
        return None;
    }
    NaiveDate::parse_from_str(s, DATE_FORMAT).ok()
}
