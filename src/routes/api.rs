// JSON endpoints over the loaded dataset

use axum::{
    extract::{Query, State},
    http::header::SET_COOKIE,
    response::{AppendHeaders, IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    dashboard::{self, FilterOptions, PriceSummary},
    dataset::Dataset,
    error::{AppError, AppResult},
    models::{FilterQuery, Selection, ServiceRecord},
    session::{SessionHandle, SessionStore},
};

// --- Response Wrappers ---

#[derive(Serialize)]
pub struct RecordsResponse {
    count: usize,
    records: Vec<ServiceRecord>,
}

#[derive(Serialize)]
pub struct PricesResponse {
    service: String,
    car: Selection,
    summary: PriceSummary,
    formatted: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    records: usize,
    sessions: usize,
}

// --- Request Structs ---

#[derive(Deserialize)]
pub struct PricesQuery {
    service: Option<String>,
    car: Option<String>,
}

// --- API Handlers ---

pub async fn get_options(State(dataset): State<Arc<Dataset>>) -> Json<FilterOptions> {
    Json(dashboard::filter_options(&dataset))
}

// Filtering here is read-only: it does not count as a search in the history
pub async fn get_records(
    State(dataset): State<Arc<Dataset>>,
    Query(query): Query<FilterQuery>,
) -> impl IntoResponse {
    let selection = query.selection();
    let records: Vec<ServiceRecord> = dashboard::filter_records(&dataset, &selection)
        .into_iter()
        .cloned()
        .collect();
    tracing::debug!(?selection, count = records.len(), "API call: get_records");
    Json(RecordsResponse {
        count: records.len(),
        records,
    })
}

pub async fn get_prices(
    State(dataset): State<Arc<Dataset>>,
    Query(query): Query<PricesQuery>,
) -> AppResult<Json<PricesResponse>> {
    let service = query
        .service
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Query parameter 'service' is required".into()))?;
    let car = Selection::from_param(query.car.as_deref());

    let summary = dashboard::get_service_prices(&dataset.records, &service, &car);
    tracing::debug!(%service, %car, ?summary, "API call: get_prices");
    Ok(Json(PricesResponse {
        formatted: summary.to_string(),
        service,
        car,
        summary,
    }))
}

pub async fn get_recent(session: SessionHandle) -> impl IntoResponse {
    let recent = session.session.lock().await.recent_searches();
    (
        AppendHeaders(session.set_cookie().map(|c| (SET_COOKIE, c))),
        Json(recent),
    )
}

pub async fn health(
    State(dataset): State<Arc<Dataset>>,
    State(sessions): State<Arc<SessionStore>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        records: dataset.records.len(),
        sessions: sessions.len().await,
    })
}
