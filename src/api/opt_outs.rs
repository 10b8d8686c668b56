use crate::api::AppState;
use crate::domain::opt_out::OptOutRecord;
use axum::{
    Json,
    extract::{Path, State},
};

/// Lists opt-out records for a phone number, newest last. Operator surface
/// for consent audits; an empty list is a valid answer.
pub async fn list_for_number(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> Json<Vec<OptOutRecord>> {
    Json(state.opt_outs.list_for_number(&number))
}
