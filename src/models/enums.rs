use crate::db::DatabaseError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// Serde goes through the same string form, so JSON and SQL agree.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

// Derived from the active flag and end date presence.
str_enum!(MedicationStatus {
    Completed => "completed",
    Active => "active",
    Stopped => "stopped",
});

str_enum!(SourceTable {
    Prescriptions => "prescriptions",
    Lists => "lists",
});

// `list_id` keys into the shared list_options table.
str_enum!(OptionList {
    Route => "drug_route",
    Interval => "drug_interval",
    Unit => "drug_units",
    Form => "drug_form",
    UsageCategory => "medication-usage-category",
    RequestIntent => "medication-request-intent",
});

// Tables that carry an external UUID column.
str_enum!(UuidTable {
    PatientData => "patient_data",
    Prescriptions => "prescriptions",
    FormEncounter => "form_encounter",
    Users => "users",
    Lists => "lists",
});

impl MedicationStatus {
    /// Completed when an end date is recorded on an active row, active when
    /// open-ended, stopped otherwise.
    pub fn derive(active: bool, has_end_date: bool) -> Self {
        match (active, has_end_date) {
            (true, true) => Self::Completed,
            (true, false) => Self::Active,
            (false, _) => Self::Stopped,
        }
    }
}

impl UuidTable {
    /// Column holding the internal key other tables reference.
    pub fn key_column(&self) -> &'static str {
        match self {
            Self::PatientData => "pid",
            Self::Prescriptions => "id",
            Self::FormEncounter => "encounter",
            Self::Users => "id",
            Self::Lists => "id",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_derivation() {
        assert_eq!(MedicationStatus::derive(true, true), MedicationStatus::Completed);
        assert_eq!(MedicationStatus::derive(true, false), MedicationStatus::Active);
        assert_eq!(MedicationStatus::derive(false, true), MedicationStatus::Stopped);
        assert_eq!(MedicationStatus::derive(false, false), MedicationStatus::Stopped);
    }

    #[test]
    fn option_list_round_trips_through_str() {
        for list in OptionList::ALL {
            assert_eq!(OptionList::from_str(list.as_str()).unwrap(), *list);
        }
    }

    #[test]
    fn unknown_value_is_invalid_enum() {
        let err = SourceTable::from_str("documents").unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidEnum { .. }));
    }

    #[test]
    fn serde_uses_storage_strings() {
        let json = serde_json::to_string(&MedicationStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
        let back: SourceTable = serde_json::from_str("\"lists\"").unwrap();
        assert_eq!(back, SourceTable::Lists);
        assert!(serde_json::from_str::<SourceTable>("\"nope\"").is_err());
    }
}
