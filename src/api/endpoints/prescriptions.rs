//! Prescription endpoints.
//!
//! Unscoped routes search every patient; `/patient/:puuid/...` routes bind
//! the patient and enforce ownership for writes.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use rusqlite::Connection;
use serde_json::Value;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::{DeletedPrescription, InsertedPrescription, MedicationRecord};
use crate::prescriptions::{PrescriptionService, ProcessingResult};

type Criteria = Query<Vec<(String, String)>>;

fn service<'c>(ctx: &ApiContext, conn: &'c Connection) -> PrescriptionService<'c> {
    let service = PrescriptionService::new(conn);
    match ctx.actor {
        Some(actor) => service.with_actor(actor),
        None => service,
    }
}

fn payload(body: Result<Json<Value>, JsonRejection>) -> Result<Value, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

fn pairs(criteria: &[(String, String)]) -> impl Iterator<Item = (&str, &str)> {
    criteria.iter().map(|(k, v)| (k.as_str(), v.as_str()))
}

fn found(
    result: ProcessingResult<MedicationRecord>,
) -> Result<Json<ProcessingResult<MedicationRecord>>, ApiError> {
    let result = ApiError::check(result)?;
    if !result.has_data() {
        return Err(ApiError::NotFound("Prescription not found".into()));
    }
    Ok(Json(result))
}

/// `POST /api/prescription`
pub async fn create(
    State(ctx): State<ApiContext>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<ProcessingResult<InsertedPrescription>>), ApiError> {
    let data = payload(body)?;
    let conn = ctx.open_db()?;
    let result = ApiError::check(service(&ctx, &conn).insert(&data))?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// `GET /api/prescription`
pub async fn list(
    State(ctx): State<ApiContext>,
    Query(criteria): Criteria,
) -> Result<Json<ProcessingResult<MedicationRecord>>, ApiError> {
    let conn = ctx.open_db()?;
    let result = service(&ctx, &conn).get_all_from_pairs(pairs(&criteria), None);
    Ok(Json(ApiError::check(result)?))
}

/// `GET /api/prescription/:uuid`
pub async fn show(
    State(ctx): State<ApiContext>,
    Path(uuid): Path<String>,
) -> Result<Json<ProcessingResult<MedicationRecord>>, ApiError> {
    let conn = ctx.open_db()?;
    let result = service(&ctx, &conn).get_one(&uuid, None);
    found(result)
}

/// `GET /api/patient/:puuid/prescription`
pub async fn list_for_patient(
    State(ctx): State<ApiContext>,
    Path(puuid): Path<String>,
    Query(criteria): Criteria,
) -> Result<Json<ProcessingResult<MedicationRecord>>, ApiError> {
    let conn = ctx.open_db()?;
    let result = service(&ctx, &conn).get_all_from_pairs(pairs(&criteria), Some(&puuid));
    Ok(Json(ApiError::check(result)?))
}

/// `GET /api/patient/:puuid/prescription/:uuid`
pub async fn show_for_patient(
    State(ctx): State<ApiContext>,
    Path((puuid, uuid)): Path<(String, String)>,
) -> Result<Json<ProcessingResult<MedicationRecord>>, ApiError> {
    let conn = ctx.open_db()?;
    let result = service(&ctx, &conn).get_one(&uuid, Some(&puuid));
    found(result)
}

/// `PUT /api/patient/:puuid/prescription/:uuid`
pub async fn update(
    State(ctx): State<ApiContext>,
    Path((puuid, uuid)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ProcessingResult<MedicationRecord>>, ApiError> {
    let data = payload(body)?;
    let conn = ctx.open_db()?;
    let result = service(&ctx, &conn).update(&puuid, &uuid, &data);
    Ok(Json(ApiError::check(result)?))
}

/// `DELETE /api/patient/:puuid/prescription/:uuid`
///
/// Deleting something that is not there is not an error: the result is
/// simply empty.
pub async fn remove(
    State(ctx): State<ApiContext>,
    Path((puuid, uuid)): Path<(String, String)>,
) -> Result<Json<ProcessingResult<DeletedPrescription>>, ApiError> {
    let conn = ctx.open_db()?;
    let result = service(&ctx, &conn).delete(&puuid, &uuid);
    Ok(Json(ApiError::check(result)?))
}
