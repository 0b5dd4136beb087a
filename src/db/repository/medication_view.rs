//! Unified medication view.
//!
//! Unions the `prescriptions` table with legacy `lists` medication entries,
//! attaches route/interval/unit option titles and patient/encounter/
//! practitioner UUIDs, then filters with typed criteria. Rows are normalized
//! into [`MedicationRecord`] with drug code enrichment.

use std::str::FromStr;

use rusqlite::types::ToSql;
use rusqlite::Connection;
use uuid::Uuid;

use super::identifiers::{uuid_string_from_bytes, uuid_to_bytes};
use crate::coding::{resolve_drugcode, CodeLookup};
use crate::db::DatabaseError;
use crate::models::enums::{MedicationStatus, OptionList, SourceTable};
use crate::models::*;

/// Both sources projected onto one column shape.
const SOURCE_UNION: &str = "
    SELECT p.id AS id, p.uuid AS uuid, 'prescriptions' AS source_table,
           p.patient_id AS patient_id, p.encounter AS encounter, p.provider_id AS provider_id,
           COALESCE(NULLIF(p.drug, ''), d.name) AS drug, p.drug_id AS drug_id,
           p.rxnorm_drugcode AS rxnorm_drugcode,
           COALESCE(NULLIF(d.form, ''), p.form) AS form,
           p.dosage AS dosage, p.quantity AS quantity,
           COALESCE(NULLIF(d.size, ''), p.size) AS size,
           COALESCE(NULLIF(d.unit, ''), p.unit) AS unit,
           COALESCE(NULLIF(d.route, ''), p.route) AS route,
           p.\"interval\" AS drug_interval, p.refills AS refills,
           CASE WHEN p.end_date IS NOT NULL AND p.active = 1 THEN 'completed'
                WHEN p.active = 1 THEN 'active'
                ELSE 'stopped' END AS status,
           p.active AS active, p.start_date AS start_date, p.end_date AS end_date,
           p.date_added AS date_added, p.date_modified AS date_modified,
           p.note AS note, p.indication AS indication,
           p.drug_dosage_instructions AS drug_dosage_instructions,
           COALESCE(NULLIF(p.request_intent, ''), 'order') AS intent,
           CASE WHEN COALESCE(p.request_intent, '') = '' THEN 'Order'
                ELSE p.request_intent_title END AS intent_title,
           COALESCE(NULLIF(p.usage_category, ''), 'community') AS category,
           CASE WHEN COALESCE(p.usage_category, '') = '' THEN 'Home/Community'
                ELSE p.usage_category_title END AS category_title
    FROM prescriptions p
    LEFT JOIN drugs d ON d.drug_id = p.drug_id
    UNION ALL
    SELECT l.id, l.uuid, 'lists',
           l.pid, first_encounter.encounter, NULL,
           l.title, NULL,
           l.diagnosis,
           NULL,
           NULL, NULL,
           NULL,
           NULL,
           NULL,
           NULL, NULL,
           CASE WHEN l.enddate IS NOT NULL AND l.activity = 1 THEN 'completed'
                WHEN l.activity = 1 THEN 'active'
                ELSE 'stopped' END,
           l.activity, l.begdate, l.enddate,
           l.date, l.modifydate,
           l.comments, NULL,
           lm.drug_dosage_instructions,
           COALESCE(NULLIF(lm.request_intent, ''), 'plan'),
           CASE WHEN COALESCE(lm.request_intent, '') = '' THEN 'Plan'
                ELSE lm.request_intent_title END,
           COALESCE(NULLIF(lm.usage_category, ''), 'community'),
           CASE WHEN COALESCE(lm.usage_category, '') = '' THEN 'Home/Community'
                ELSE lm.usage_category_title END
    FROM lists l
    LEFT JOIN lists_medication lm ON lm.list_id = l.id
    LEFT JOIN (
        SELECT pid, list_id, MIN(encounter) AS encounter
        FROM issue_encounter
        GROUP BY pid, list_id
    ) first_encounter ON first_encounter.list_id = l.id AND first_encounter.pid = l.pid
    WHERE l.type = 'medication'";

/// A built statement with its bound parameters.
pub struct MedicationQuery {
    pub sql: String,
    pub params: Vec<Box<dyn ToSql>>,
}

fn option_projection(list: OptionList, prefix: &str) -> String {
    format!(
        "(SELECT option_id AS {prefix}_id, title AS {prefix}_title, codes AS {prefix}_codes
          FROM list_options WHERE list_id = '{}')",
        list.as_str()
    )
}

fn field_column(field: FilterField) -> &'static str {
    match field {
        FilterField::Status => "combined.status",
        FilterField::SourceTable => "combined.source_table",
        FilterField::Drug => "combined.drug",
        FilterField::RxnormDrugcode => "combined.rxnorm_drugcode",
        FilterField::Route => "combined.route",
        FilterField::Interval => "combined.drug_interval",
        FilterField::Unit => "combined.unit",
        FilterField::Intent => "combined.intent",
        FilterField::Category => "combined.category",
        FilterField::StartDate => "combined.start_date",
        FilterField::EndDate => "combined.end_date",
        FilterField::EncounterUuid => "encounter.euuid",
        FilterField::PractitionerUuid => "practitioner.pruuid",
    }
}

/// Assemble the view query. Criteria combine per their match mode; a
/// patient binding is always AND-ed on top.
pub fn build_query(criteria: &SearchCriteria, patient: Option<&Uuid>) -> MedicationQuery {
    let mut sql = format!(
        "SELECT combined.id, combined.uuid, combined.source_table,
                patient.puuid, encounter.euuid, practitioner.pruuid,
                combined.drug, combined.drug_id, combined.rxnorm_drugcode, combined.form,
                combined.dosage, combined.quantity, combined.size,
                combined.unit, units_list.unit_title, units_list.unit_codes,
                combined.route, routes_list.route_title, routes_list.route_codes,
                combined.drug_interval, intervals_list.interval_title, intervals_list.interval_codes,
                combined.refills, combined.status, combined.active,
                combined.start_date, combined.end_date, combined.date_added, combined.date_modified,
                combined.note, combined.indication, combined.drug_dosage_instructions,
                combined.intent, combined.intent_title, combined.category, combined.category_title
         FROM ({source}) combined
         LEFT JOIN {routes} routes_list ON routes_list.route_id = combined.route
         LEFT JOIN {intervals} intervals_list ON intervals_list.interval_id = combined.drug_interval
         LEFT JOIN {units} units_list ON units_list.unit_id = combined.unit
         LEFT JOIN (SELECT pid, uuid AS puuid FROM patient_data) patient
                ON patient.pid = combined.patient_id
         LEFT JOIN (SELECT encounter AS eid, uuid AS euuid FROM form_encounter) encounter
                ON encounter.eid = combined.encounter
         LEFT JOIN (SELECT id AS practitioner_id, uuid AS pruuid FROM users
                    WHERE npi IS NOT NULL AND npi != '') practitioner
                ON practitioner.practitioner_id = combined.provider_id",
        source = SOURCE_UNION,
        routes = option_projection(OptionList::Route, "route"),
        intervals = option_projection(OptionList::Interval, "interval"),
        units = option_projection(OptionList::Unit, "unit"),
    );

    let mut params: Vec<Box<dyn ToSql>> = Vec::new();
    let mut clauses: Vec<String> = Vec::new();

    for filter in &criteria.filters {
        let (column, value): (&str, Box<dyn ToSql>) = match filter {
            MedicationFilter::Patient(uuid) => ("patient.puuid", Box::new(uuid_to_bytes(uuid))),
            MedicationFilter::Prescription(uuid) => ("combined.uuid", Box::new(uuid_to_bytes(uuid))),
            MedicationFilter::Equals(field, FilterValue::Uuid(uuid)) => {
                (field_column(*field), Box::new(uuid_to_bytes(uuid)))
            }
            MedicationFilter::Equals(field, FilterValue::Text(text)) => {
                (field_column(*field), Box::new(text.clone()))
            }
        };
        params.push(value);
        clauses.push(format!("{column} = ?{}", params.len()));
    }

    let mut conditions: Vec<String> = Vec::new();
    if !clauses.is_empty() {
        let joiner = match criteria.match_mode {
            MatchMode::All => " AND ",
            MatchMode::Any => " OR ",
        };
        conditions.push(format!("({})", clauses.join(joiner)));
    }
    if let Some(uuid) = patient {
        params.push(Box::new(uuid_to_bytes(uuid)));
        conditions.push(format!("patient.puuid = ?{}", params.len()));
    }
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    sql.push_str(" ORDER BY combined.start_date DESC, combined.uuid");

    MedicationQuery { sql, params }
}

/// Run the view query and normalize every row.
pub fn search_medications(
    conn: &Connection,
    criteria: &SearchCriteria,
    patient: Option<&Uuid>,
    lookup: &dyn CodeLookup,
) -> Result<Vec<MedicationRecord>, DatabaseError> {
    let query = build_query(criteria, patient);
    tracing::debug!(
        filters = criteria.filters.len(),
        patient_bound = patient.is_some(),
        "Searching unified medication view"
    );

    let param_refs: Vec<&dyn ToSql> = query.params.iter().map(|p| p.as_ref()).collect();
    let mut stmt = conn.prepare(&query.sql)?;
    let rows = stmt.query_map(param_refs.as_slice(), medication_view_row_from_rusqlite)?;

    let mut records = Vec::new();
    for row in rows {
        records.push(medication_record_from_row(conn, lookup, row?)?);
    }
    Ok(records)
}

// Internal row type for the view projection
struct MedicationViewRow {
    id: i64,
    uuid: Option<Vec<u8>>,
    source_table: String,
    puuid: Option<Vec<u8>>,
    euuid: Option<Vec<u8>>,
    pruuid: Option<Vec<u8>>,
    drug: Option<String>,
    drug_id: Option<i64>,
    rxnorm_drugcode: Option<String>,
    form: Option<String>,
    dosage: Option<String>,
    quantity: Option<String>,
    size: Option<String>,
    unit: Option<String>,
    unit_title: Option<String>,
    unit_codes: Option<String>,
    route: Option<String>,
    route_title: Option<String>,
    route_codes: Option<String>,
    interval: Option<String>,
    interval_title: Option<String>,
    interval_codes: Option<String>,
    refills: Option<i64>,
    status: String,
    active: Option<i64>,
    start_date: Option<String>,
    end_date: Option<String>,
    date_added: Option<String>,
    date_modified: Option<String>,
    note: Option<String>,
    indication: Option<String>,
    drug_dosage_instructions: Option<String>,
    intent: Option<String>,
    intent_title: Option<String>,
    category: Option<String>,
    category_title: Option<String>,
}

fn medication_view_row_from_rusqlite(
    row: &rusqlite::Row<'_>,
) -> Result<MedicationViewRow, rusqlite::Error> {
    Ok(MedicationViewRow {
        id: row.get(0)?,
        uuid: row.get(1)?,
        source_table: row.get(2)?,
        puuid: row.get(3)?,
        euuid: row.get(4)?,
        pruuid: row.get(5)?,
        drug: row.get(6)?,
        drug_id: row.get(7)?,
        rxnorm_drugcode: row.get(8)?,
        form: row.get(9)?,
        dosage: row.get(10)?,
        quantity: row.get(11)?,
        size: row.get(12)?,
        unit: row.get(13)?,
        unit_title: row.get(14)?,
        unit_codes: row.get(15)?,
        route: row.get(16)?,
        route_title: row.get(17)?,
        route_codes: row.get(18)?,
        interval: row.get(19)?,
        interval_title: row.get(20)?,
        interval_codes: row.get(21)?,
        refills: row.get(22)?,
        status: row.get(23)?,
        active: row.get(24)?,
        start_date: row.get(25)?,
        end_date: row.get(26)?,
        date_added: row.get(27)?,
        date_modified: row.get(28)?,
        note: row.get(29)?,
        indication: row.get(30)?,
        drug_dosage_instructions: row.get(31)?,
        intent: row.get(32)?,
        intent_title: row.get(33)?,
        category: row.get(34)?,
        category_title: row.get(35)?,
    })
}

fn coded(id: Option<String>, title: Option<String>, codes: Option<String>) -> Option<CodedValue> {
    let id = id.filter(|v| !v.is_empty())?;
    Some(CodedValue { id, title, codes: codes.filter(|c| !c.is_empty()) })
}

fn medication_record_from_row(
    conn: &Connection,
    lookup: &dyn CodeLookup,
    row: MedicationViewRow,
) -> Result<MedicationRecord, DatabaseError> {
    let drugcode = match row.rxnorm_drugcode.as_deref() {
        Some(raw) if !raw.trim().is_empty() => {
            resolve_drugcode(conn, lookup, raw, row.drug.as_deref())?
        }
        _ => Vec::new(),
    };

    Ok(MedicationRecord {
        id: row.id,
        uuid: row.uuid.as_deref().and_then(uuid_string_from_bytes),
        source_table: SourceTable::from_str(&row.source_table)?,
        patient_uuid: row.puuid.as_deref().and_then(uuid_string_from_bytes),
        encounter_uuid: row.euuid.as_deref().and_then(uuid_string_from_bytes),
        practitioner_uuid: row.pruuid.as_deref().and_then(uuid_string_from_bytes),
        drug: row.drug,
        drug_id: row.drug_id,
        drugcode,
        form: row.form,
        dosage: row.dosage,
        quantity: row.quantity,
        size: row.size,
        unit: coded(row.unit, row.unit_title, row.unit_codes),
        route: coded(row.route, row.route_title, row.route_codes),
        interval: coded(row.interval, row.interval_title, row.interval_codes),
        refills: row.refills,
        status: MedicationStatus::from_str(&row.status)?,
        active: row.active.unwrap_or(0) != 0,
        start_date: row.start_date,
        end_date: row.end_date,
        date_added: row.date_added,
        date_modified: row.date_modified,
        note: row.note,
        indication: row.indication,
        drug_dosage_instructions: row.drug_dosage_instructions,
        intent: row.intent,
        intent_title: row.intent_title,
        category: row.category,
        category_title: row.category_title,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coding::CodesTableLookup;
    use crate::db::sqlite::open_memory_database;
    use rusqlite::params;

    struct Fixture {
        conn: Connection,
        patient: Uuid,
        other_patient: Uuid,
        encounter: Uuid,
        practitioner: Uuid,
    }

    fn fixture() -> Fixture {
        let conn = open_memory_database().unwrap();
        let patient = Uuid::new_v4();
        let other_patient = Uuid::new_v4();
        let encounter = Uuid::new_v4();
        let early_encounter = Uuid::new_v4();
        let practitioner = Uuid::new_v4();

        conn.execute(
            "INSERT INTO patient_data (pid, uuid) VALUES (1, ?1), (2, ?2)",
            params![uuid_to_bytes(&patient), uuid_to_bytes(&other_patient)],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO form_encounter (uuid, encounter, pid) VALUES (?1, 100, 1), (?2, 50, 1)",
            params![uuid_to_bytes(&encounter), uuid_to_bytes(&early_encounter)],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO users (id, uuid, username, npi) VALUES (7, ?1, 'drwho', '1234567890')",
            params![uuid_to_bytes(&practitioner)],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO users (id, uuid, username, npi) VALUES (8, ?1, 'clerk', '')",
            params![uuid_to_bytes(&Uuid::new_v4())],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO drugs (drug_id, name, form, unit, route) VALUES (3, 'Lisinopril', 'tablet', 'mg', '')",
            [],
        )
        .unwrap();

        // Active, open-ended, with drug reference and credentialed provider
        conn.execute(
            "INSERT INTO prescriptions (uuid, patient_id, encounter, provider_id, drug, drug_id,
             rxnorm_drugcode, unit, route, \"interval\", start_date, active)
             VALUES (?1, 1, 100, 7, 'Lisinopril 10mg', 3, 'RXCUI:314076', 'ml', 'oral', 'qd', '2024-03-01', 1)",
            params![uuid_to_bytes(&Uuid::new_v4())],
        )
        .unwrap();
        // Ended while active: completed; provider lacks NPI
        conn.execute(
            "INSERT INTO prescriptions (uuid, patient_id, provider_id, drug, unit, route, start_date, end_date, active)
             VALUES (?1, 1, 8, 'Amoxicillin', 'mg', 'oral', '2024-01-01', '2024-01-10', 1)",
            params![uuid_to_bytes(&Uuid::new_v4())],
        )
        .unwrap();
        // Inactive: stopped; other patient
        conn.execute(
            "INSERT INTO prescriptions (uuid, patient_id, drug, start_date, active)
             VALUES (?1, 2, 'Warfarin', '2023-06-01', 0)",
            params![uuid_to_bytes(&Uuid::new_v4())],
        )
        .unwrap();
        // Legacy medication list entry linked to two encounters
        conn.execute(
            "INSERT INTO lists (id, uuid, pid, type, title, begdate, activity)
             VALUES (20, ?1, 1, 'medication', 'Metformin', '2022-05-05', 1)",
            params![uuid_to_bytes(&Uuid::new_v4())],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO lists_medication (list_id, usage_category, usage_category_title)
             VALUES (20, 'outpatient', 'Outpatient')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO issue_encounter (pid, list_id, encounter) VALUES (1, 20, 100), (1, 20, 50)",
            [],
        )
        .unwrap();
        // Non-medication list item is never part of the view
        conn.execute(
            "INSERT INTO lists (pid, type, title, activity) VALUES (1, 'allergy', 'Penicillin', 1)",
            [],
        )
        .unwrap();

        Fixture { conn, patient, other_patient, encounter, practitioner }
    }

    fn search(f: &Fixture, criteria: &SearchCriteria, patient: Option<&Uuid>) -> Vec<MedicationRecord> {
        search_medications(&f.conn, criteria, patient, &CodesTableLookup).unwrap()
    }

    fn by_drug<'a>(records: &'a [MedicationRecord], drug: &str) -> &'a MedicationRecord {
        records.iter().find(|r| r.drug.as_deref() == Some(drug)).unwrap()
    }

    #[test]
    fn unfiltered_view_unions_both_sources() {
        let f = fixture();
        let records = search(&f, &SearchCriteria::all(), None);
        assert_eq!(records.len(), 4);
        assert_eq!(
            records.iter().filter(|r| r.source_table == SourceTable::Lists).count(),
            1
        );
    }

    #[test]
    fn status_is_derived_from_active_and_end_date() {
        let f = fixture();
        let records = search(&f, &SearchCriteria::all(), None);
        assert_eq!(by_drug(&records, "Lisinopril 10mg").status, MedicationStatus::Active);
        assert_eq!(by_drug(&records, "Amoxicillin").status, MedicationStatus::Completed);
        assert_eq!(by_drug(&records, "Warfarin").status, MedicationStatus::Stopped);
        for r in &records {
            assert_eq!(r.status, MedicationStatus::derive(r.active, r.end_date.is_some()));
        }
    }

    #[test]
    fn drug_reference_overrides_stored_unit_and_falls_back_for_route() {
        let f = fixture();
        let records = search(&f, &SearchCriteria::all(), None);
        let lisinopril = by_drug(&records, "Lisinopril 10mg");
        let unit = lisinopril.unit.as_ref().unwrap();
        assert_eq!(unit.id, "mg");
        assert_eq!(unit.codes.as_deref(), Some("UCUM:mg"));
        let route = lisinopril.route.as_ref().unwrap();
        assert_eq!(route.id, "oral");
        assert_eq!(route.title.as_deref(), Some("Per Oris"));
        assert_eq!(lisinopril.interval.as_ref().unwrap().title.as_deref(), Some("Daily"));
        assert_eq!(lisinopril.form.as_deref(), Some("tablet"));
    }

    #[test]
    fn identity_uuids_resolve_only_for_credentialed_practitioners() {
        let f = fixture();
        let records = search(&f, &SearchCriteria::all(), None);
        let lisinopril = by_drug(&records, "Lisinopril 10mg");
        assert_eq!(lisinopril.patient_uuid, Some(f.patient.to_string()));
        assert_eq!(lisinopril.encounter_uuid, Some(f.encounter.to_string()));
        assert_eq!(lisinopril.practitioner_uuid, Some(f.practitioner.to_string()));
        assert_eq!(by_drug(&records, "Amoxicillin").practitioner_uuid, None);
    }

    #[test]
    fn list_entry_uses_first_encounter_and_defaults() {
        let f = fixture();
        let records = search(&f, &SearchCriteria::all(), None);
        let metformin = by_drug(&records, "Metformin");
        let early: Vec<u8> = f
            .conn
            .query_row("SELECT uuid FROM form_encounter WHERE encounter = 50", [], |r| r.get(0))
            .unwrap();
        assert_eq!(metformin.encounter_uuid, uuid_string_from_bytes(&early));
        assert_eq!(metformin.intent.as_deref(), Some("plan"));
        assert_eq!(metformin.category.as_deref(), Some("outpatient"));
        assert_eq!(metformin.category_title.as_deref(), Some("Outpatient"));
    }

    #[test]
    fn prescription_defaults_intent_and_category() {
        let f = fixture();
        let records = search(&f, &SearchCriteria::all(), None);
        let amox = by_drug(&records, "Amoxicillin");
        assert_eq!(amox.intent.as_deref(), Some("order"));
        assert_eq!(amox.intent_title.as_deref(), Some("Order"));
        assert_eq!(amox.category_title.as_deref(), Some("Home/Community"));
    }

    #[test]
    fn drugcode_falls_back_to_drug_name() {
        let f = fixture();
        let records = search(&f, &SearchCriteria::all(), None);
        let lisinopril = by_drug(&records, "Lisinopril 10mg");
        assert_eq!(lisinopril.drugcode.len(), 1);
        assert_eq!(lisinopril.drugcode[0].code, "314076");
        assert_eq!(lisinopril.drugcode[0].description, "Lisinopril 10mg");
        assert!(by_drug(&records, "Warfarin").drugcode.is_empty());
    }

    #[test]
    fn patient_binding_scopes_results() {
        let f = fixture();
        let records = search(&f, &SearchCriteria::all(), Some(&f.other_patient));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].drug.as_deref(), Some("Warfarin"));
    }

    #[test]
    fn any_mode_ors_criteria_but_keeps_patient_binding() {
        let f = fixture();
        let criteria = SearchCriteria::all()
            .with(MedicationFilter::Equals(FilterField::Drug, FilterValue::Text("Warfarin".into())))
            .with(MedicationFilter::Equals(FilterField::Status, FilterValue::Text("completed".into())))
            .match_any();
        assert_eq!(search(&f, &criteria, None).len(), 2);
        let scoped = search(&f, &criteria, Some(&f.patient));
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].drug.as_deref(), Some("Amoxicillin"));
    }

    #[test]
    fn all_mode_ands_criteria() {
        let f = fixture();
        let criteria = SearchCriteria::all()
            .with(MedicationFilter::Equals(FilterField::Route, FilterValue::Text("oral".into())))
            .with(MedicationFilter::Equals(FilterField::Status, FilterValue::Text("active".into())));
        let records = search(&f, &criteria, None);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].drug.as_deref(), Some("Lisinopril 10mg"));
    }

    #[test]
    fn uuid_criteria_bind_as_binary() {
        let f = fixture();
        let by_encounter = SearchCriteria::all()
            .with(MedicationFilter::Equals(FilterField::EncounterUuid, FilterValue::Uuid(f.encounter)));
        assert_eq!(search(&f, &by_encounter, None).len(), 1);

        let by_patient = SearchCriteria::all().with(MedicationFilter::Patient(f.patient));
        assert_eq!(search(&f, &by_patient, None).len(), 3);
    }

    #[test]
    fn list_entries_follow_the_same_status_rule() {
        let f = fixture();
        f.conn
            .execute(
                "INSERT INTO lists (uuid, pid, type, title, begdate, enddate, activity)
                 VALUES (?1, 1, 'medication', 'Atorvastatin', '2021-01-01', '2021-06-01', 1),
                        (?2, 1, 'medication', 'Simvastatin', '2020-01-01', NULL, 0)",
                params![uuid_to_bytes(&Uuid::new_v4()), uuid_to_bytes(&Uuid::new_v4())],
            )
            .unwrap();

        let lists = SearchCriteria::from_pairs([("source_table", "lists")]).unwrap();
        let records = search(&f, &lists, None);
        assert_eq!(records.len(), 3);
        assert_eq!(by_drug(&records, "Metformin").status, MedicationStatus::Active);
        assert_eq!(by_drug(&records, "Atorvastatin").status, MedicationStatus::Completed);
        assert_eq!(by_drug(&records, "Simvastatin").status, MedicationStatus::Stopped);

        let stopped = SearchCriteria::from_pairs([("status", "stopped")]).unwrap();
        let mut drugs: Vec<_> = search(&f, &stopped, None)
            .into_iter()
            .filter_map(|r| r.drug)
            .collect();
        drugs.sort();
        assert_eq!(drugs, vec!["Simvastatin".to_string(), "Warfarin".to_string()]);
    }

    #[test]
    fn results_order_by_start_date_then_uuid() {
        let f = fixture();
        for drug in ["Aspirin", "Ibuprofen", "Naproxen"] {
            f.conn
                .execute(
                    "INSERT INTO prescriptions (uuid, patient_id, drug, start_date, active)
                     VALUES (?1, 1, ?2, '2024-03-01', 1)",
                    params![uuid_to_bytes(&Uuid::new_v4()), drug],
                )
                .unwrap();
        }

        let records = search(&f, &SearchCriteria::all(), None);
        assert_eq!(records.len(), 7);
        for pair in records.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(a.start_date >= b.start_date, "{:?} before {:?}", a.start_date, b.start_date);
            if a.start_date == b.start_date {
                assert!(a.uuid <= b.uuid);
            }
        }
    }

    #[test]
    fn query_places_patient_binding_last() {
        let criteria = SearchCriteria::all()
            .with(MedicationFilter::Equals(FilterField::Drug, FilterValue::Text("x".into())))
            .match_any();
        let q = build_query(&criteria, Some(&Uuid::new_v4()));
        assert_eq!(q.params.len(), 2);
        assert!(q.sql.contains("(combined.drug = ?1) AND patient.puuid = ?2"));
        assert!(q.sql.contains("UNION ALL"));
    }
}
