use super::error::{ApiJson, ApiPath};
use super::AppState;
use crate::core::DataInput;
use crate::domain::model::{CodeTable, TariffRequest, TariffResponse};
use crate::utils::error::Result;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

pub(super) async fn tariff_handler(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<TariffRequest>,
) -> Result<Json<TariffResponse>> {
    let service = state.tariff_service().await?;
    Ok(Json(service.get_tariff(&request).await?))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub table: CodeTable,
    pub rows: usize,
}

/// Reloads a code table from WITS.
pub(super) async fn refresh_handler(
    State(state): State<AppState>,
    ApiPath(table): ApiPath<CodeTable>,
) -> Result<Json<RefreshResponse>> {
    let service = state.tariff_service().await?;
    let rows = service.refresh(table, DataInput::Api).await?;
    Ok(Json(RefreshResponse { table, rows }))
}
