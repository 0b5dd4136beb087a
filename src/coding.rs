//! Drug code enrichment.
//!
//! Stored drug codes look like `RXCUI:197361` (several may be joined with
//! `;`). Each reference is resolved into a [`CodingEntry`] carrying the
//! coding system URI and a human description.

use std::sync::LazyLock;

use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;
use crate::models::CodingEntry;

/// Code type assumed when a reference carries no `SYSTEM:` prefix.
pub const DEFAULT_CODE_TYPE: &str = "RXCUI";

static CODE_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?P<system>[A-Za-z][A-Za-z0-9_\-]*):)?(?P<code>[^:\s][^:]*)$").unwrap()
});

/// A parsed `SYSTEM:code` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeReference {
    pub code_type: String,
    pub code: String,
}

impl CodeReference {
    pub fn parse(raw: &str) -> Option<Self> {
        let caps = CODE_REFERENCE.captures(raw.trim())?;
        let code_type = caps
            .name("system")
            .map(|m| m.as_str().to_ascii_uppercase())
            .unwrap_or_else(|| DEFAULT_CODE_TYPE.to_string());
        Some(Self {
            code_type,
            code: caps["code"].trim().to_string(),
        })
    }

    pub fn system_uri(&self) -> String {
        match self.code_type.as_str() {
            "RXCUI" | "RXNORM" => "http://www.nlm.nih.gov/research/umls/rxnorm".into(),
            "NDC" => "http://hl7.org/fhir/sid/ndc".into(),
            "SNOMED-CT" | "SNOMED" => "http://snomed.info/sct".into(),
            "CVX" => "http://hl7.org/fhir/sid/cvx".into(),
            other => other.to_string(),
        }
    }
}

/// External medical coding lookup.
pub trait CodeLookup: Send + Sync {
    /// Human description for a code, if the catalogue knows it.
    fn describe(
        &self,
        conn: &Connection,
        reference: &CodeReference,
    ) -> Result<Option<String>, DatabaseError>;
}

/// Lookup backed by the local `codes` catalogue table.
#[derive(Debug, Default, Clone, Copy)]
pub struct CodesTableLookup;

impl CodeLookup for CodesTableLookup {
    fn describe(
        &self,
        conn: &Connection,
        reference: &CodeReference,
    ) -> Result<Option<String>, DatabaseError> {
        let text = conn
            .query_row(
                "SELECT code_text FROM codes WHERE code_type = ?1 AND code = ?2 AND active = 1",
                params![reference.code_type, reference.code],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(text.filter(|t| !t.trim().is_empty()))
    }
}

/// Resolve a stored drug code field into coding entries. A missing
/// description falls back to `fallback_description` (the drug name).
pub fn resolve_drugcode(
    conn: &Connection,
    lookup: &dyn CodeLookup,
    raw: &str,
    fallback_description: Option<&str>,
) -> Result<Vec<CodingEntry>, DatabaseError> {
    let mut entries = Vec::new();
    for part in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let Some(reference) = CodeReference::parse(part) else {
            tracing::debug!(code = part, "Skipping unparseable drug code");
            continue;
        };
        let description = lookup
            .describe(conn, &reference)?
            .or_else(|| fallback_description.map(str::to_string))
            .unwrap_or_default();
        entries.push(CodingEntry {
            system: reference.system_uri(),
            code: reference.code,
            description,
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn parses_prefixed_and_bare_codes() {
        let r = CodeReference::parse("RXCUI:197361").unwrap();
        assert_eq!(r.code_type, "RXCUI");
        assert_eq!(r.code, "197361");

        let bare = CodeReference::parse("308182").unwrap();
        assert_eq!(bare.code_type, DEFAULT_CODE_TYPE);

        let lower = CodeReference::parse("ndc:0071-0155").unwrap();
        assert_eq!(lower.code_type, "NDC");
        assert_eq!(lower.system_uri(), "http://hl7.org/fhir/sid/ndc");

        assert!(CodeReference::parse("").is_none());
        assert!(CodeReference::parse("A:B:C").is_none());
    }

    #[test]
    fn resolves_description_from_codes_table() {
        let conn = open_memory_database().unwrap();
        conn.execute(
            "INSERT INTO codes (code_type, code, code_text) VALUES ('RXCUI', '197361', 'Amlodipine 5 MG Oral Tablet')",
            [],
        )
        .unwrap();
        let entries =
            resolve_drugcode(&conn, &CodesTableLookup, "RXCUI:197361", Some("amlodipine")).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].description, "Amlodipine 5 MG Oral Tablet");
        assert_eq!(entries[0].system, "http://www.nlm.nih.gov/research/umls/rxnorm");
    }

    #[test]
    fn falls_back_to_drug_name() {
        let conn = open_memory_database().unwrap();
        let entries =
            resolve_drugcode(&conn, &CodesTableLookup, "RXCUI:999; NDC:123", Some("Aspirin")).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.description == "Aspirin"));
    }

    #[test]
    fn empty_field_yields_no_entries() {
        let conn = open_memory_database().unwrap();
        assert!(resolve_drugcode(&conn, &CodesTableLookup, "  ", None).unwrap().is_empty());
    }
}
