use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::enums::{MedicationStatus, SourceTable};
use crate::db::repository::parse_uuid as canonical_uuid;

/// How the criteria of a search combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    #[default]
    All,
    Any,
}

/// Columns of the unified medication view a caller may compare against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterField {
    Status,
    SourceTable,
    Drug,
    RxnormDrugcode,
    Route,
    Interval,
    Unit,
    Intent,
    Category,
    StartDate,
    EndDate,
    EncounterUuid,
    PractitionerUuid,
}

impl FilterField {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::SourceTable => "source_table",
            Self::Drug => "drug",
            Self::RxnormDrugcode => "rxnorm_drugcode",
            Self::Route => "route",
            Self::Interval => "interval",
            Self::Unit => "unit",
            Self::Intent => "intent",
            Self::Category => "category",
            Self::StartDate => "start_date",
            Self::EndDate => "end_date",
            Self::EncounterUuid => "encounter",
            Self::PractitionerUuid => "practitioner",
        }
    }

    fn from_key(key: &str) -> Option<Self> {
        Some(match key {
            "status" => Self::Status,
            "source_table" => Self::SourceTable,
            "drug" => Self::Drug,
            "rxnorm_drugcode" => Self::RxnormDrugcode,
            "route" => Self::Route,
            "interval" => Self::Interval,
            "unit" => Self::Unit,
            "intent" => Self::Intent,
            "category" => Self::Category,
            "start_date" => Self::StartDate,
            "end_date" => Self::EndDate,
            "encounter" => Self::EncounterUuid,
            "practitioner" => Self::PractitionerUuid,
            _ => return None,
        })
    }

    pub fn is_uuid(&self) -> bool {
        matches!(self, Self::EncounterUuid | Self::PractitionerUuid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Text(String),
    Uuid(Uuid),
}

/// One search criterion over the unified medication view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MedicationFilter {
    Patient(Uuid),
    Prescription(Uuid),
    Equals(FilterField, FilterValue),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("Unknown search parameter: {0}")]
    UnknownKey(String),

    #[error("Invalid UUID for {key}: {value}")]
    MalformedUuid { key: String, value: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

impl FilterError {
    /// The criterion key the error is reported against.
    pub fn key(&self) -> &str {
        match self {
            FilterError::UnknownKey(key) => key,
            FilterError::MalformedUuid { key, .. } | FilterError::InvalidValue { key, .. } => key,
        }
    }
}

impl MedicationFilter {
    /// Parse one `key=value` search parameter.
    pub fn parse(key: &str, value: &str) -> Result<Self, FilterError> {
        let parse_uuid = |value: &str| {
            canonical_uuid(value).ok_or_else(|| FilterError::MalformedUuid {
                key: key.to_string(),
                value: value.to_string(),
            })
        };

        match key {
            "patient" | "puuid" => return Ok(Self::Patient(parse_uuid(value)?)),
            "uuid" | "_id" => return Ok(Self::Prescription(parse_uuid(value)?)),
            _ => {}
        }

        let field =
            FilterField::from_key(key).ok_or_else(|| FilterError::UnknownKey(key.to_string()))?;

        if field.is_uuid() {
            return Ok(Self::Equals(field, FilterValue::Uuid(parse_uuid(value)?)));
        }

        let invalid = || FilterError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        match field {
            FilterField::Status => {
                MedicationStatus::from_str(value).map_err(|_| invalid())?;
            }
            FilterField::SourceTable => {
                SourceTable::from_str(value).map_err(|_| invalid())?;
            }
            _ if value.trim().is_empty() => return Err(invalid()),
            _ => {}
        }
        Ok(Self::Equals(field, FilterValue::Text(value.to_string())))
    }
}

/// A closed set of filters plus the way they combine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchCriteria {
    pub filters: Vec<MedicationFilter>,
    pub match_mode: MatchMode,
}

impl SearchCriteria {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with(mut self, filter: MedicationFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn match_any(mut self) -> Self {
        self.match_mode = MatchMode::Any;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Build criteria from query-string pairs. `_match=any` selects OR
    /// semantics; every failing pair is collected.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, Vec<FilterError>>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut criteria = Self::default();
        let mut errors = Vec::new();
        for (key, value) in pairs {
            if key == "_match" {
                match value {
                    "any" => criteria.match_mode = MatchMode::Any,
                    "all" => criteria.match_mode = MatchMode::All,
                    _ => errors.push(FilterError::InvalidValue {
                        key: key.to_string(),
                        value: value.to_string(),
                    }),
                }
                continue;
            }
            match MedicationFilter::parse(key, value) {
                Ok(filter) => criteria.filters.push(filter),
                Err(e) => errors.push(e),
            }
        }
        if errors.is_empty() {
            Ok(criteria)
        } else {
            Err(errors)
        }
    }
}
