use axum::{extract::rejection::JsonRejection, extract::State, Json};
use tracing::instrument;

use crate::{
    app_state::AppState,
    error::Result,
    models::receipt::{ReceiptValidationBody, ValidationResult},
};

/// POST /validate-receipt
///
/// Valid and invalid-but-well-formed outcomes are both 200; only malformed
/// requests are 400.
#[instrument(skip(state, payload))]
pub async fn validate_receipt(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ReceiptValidationBody>, JsonRejection>,
) -> Result<Json<ValidationResult>> {
    let Json(body) = payload?;

    let result = state.validation_service.validate_receipt(body).await?;

    Ok(Json(result))
}
