//! Axum route handlers for the Capillary API.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::capillary::calculator::compute_capillary_dimensions;
use crate::capillary::export::{render_export, EXPORT_FILENAME};
use crate::capillary::models::CapillaryResult;
use crate::capillary::validation::{
    selected_diameter_mismatch, validate_request, validate_result, ValidationError,
};
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    pub inputs: Value,
    pub results: Value,
}

/// POST /api/v1/capillary/calculate
///
/// Validates the raw form values, asks the model, and returns the validated result.
pub async fn handle_calculate(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<CapillaryResult>, AppError> {
    let Json(raw) = payload?;
    let request = validate_request(&raw)?;
    let result = compute_capillary_dimensions(state.model.as_ref(), &request).await?;
    Ok(Json(result))
}

/// POST /api/v1/capillary/export
///
/// Renders a request/result pair as a plain-text attachment. The pair must
/// agree on the selected diameter.
pub async fn handle_export(
    payload: Result<Json<ExportRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(body) = payload?;
    let request = validate_request(&body.inputs)?;
    let result = validate_result(&body.results)?;
    if let Some(mismatch) = selected_diameter_mismatch(&request, &result) {
        return Err(ValidationError {
            issues: vec![mismatch.issue()],
        }
        .into());
    }

    let text = render_export(&request, &result);
    let disposition = format!("attachment; filename=\"{EXPORT_FILENAME}\"");

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        text,
    )
        .into_response())
}
