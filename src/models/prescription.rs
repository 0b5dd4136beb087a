use chrono::NaiveDate;
use rusqlite::types::{ToSql, ToSqlOutput};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single sanitized payload value, typed by the rule that accepted it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i64),
    Bool(bool),
    Date(NaiveDate),
    Uuid(Uuid),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            FieldValue::Uuid(u) => Some(*u),
            _ => None,
        }
    }
}

impl ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            FieldValue::Null => Ok(ToSqlOutput::from(rusqlite::types::Null)),
            FieldValue::Text(s) => s.to_sql(),
            FieldValue::Integer(i) => i.to_sql(),
            FieldValue::Bool(b) => Ok(ToSqlOutput::from(*b as i64)),
            FieldValue::Date(d) => Ok(ToSqlOutput::from(d.format("%Y-%m-%d").to_string())),
            FieldValue::Uuid(u) => Ok(ToSqlOutput::from(u.as_bytes().to_vec())),
        }
    }
}

/// Validated prescription fields, keyed by column name, in rule order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PrescriptionFields {
    values: Vec<(&'static str, FieldValue)>,
}

impl PrescriptionFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: &'static str, value: FieldValue) {
        self.values.retain(|(n, _)| *n != name);
        self.values.push((name, value));
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    /// Removes and returns a field, e.g. `puuid` which is stored as a key.
    pub fn take(&mut self, name: &str) -> Option<FieldValue> {
        let idx = self.values.iter().position(|(n, _)| *n == name)?;
        Some(self.values.remove(idx).1)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &FieldValue)> {
        self.values.iter().map(|(n, v)| (*n, v))
    }
}

/// Returned by a successful insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertedPrescription {
    pub id: i64,
    pub uuid: String,
}

/// Returned by a successful delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletedPrescription {
    pub uuid: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_replaces_existing_field() {
        let mut fields = PrescriptionFields::new();
        fields.push("drug", FieldValue::Text("Aspirin".into()));
        fields.push("drug", FieldValue::Text("Ibuprofen".into()));
        assert_eq!(fields.len(), 1);
        assert_eq!(fields.get("drug").and_then(|v| v.as_text()), Some("Ibuprofen"));
    }

    #[test]
    fn take_removes_field() {
        let mut fields = PrescriptionFields::new();
        let id = Uuid::new_v4();
        fields.push("puuid", FieldValue::Uuid(id));
        fields.push("start_date", FieldValue::Date(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()));
        assert_eq!(fields.take("puuid").and_then(|v| v.as_uuid()), Some(id));
        assert!(fields.get("puuid").is_none());
        assert_eq!(fields.len(), 1);
    }

    #[test]
    fn values_serialize_untagged() {
        let date = FieldValue::Date(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
        assert_eq!(serde_json::to_value(&date).unwrap(), serde_json::json!("2024-01-10"));
        assert_eq!(serde_json::to_value(FieldValue::Integer(3)).unwrap(), serde_json::json!(3));
        assert_eq!(serde_json::to_value(FieldValue::Null).unwrap(), serde_json::Value::Null);
    }
}
