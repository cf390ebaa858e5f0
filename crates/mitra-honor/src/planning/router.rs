use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::domain::{
    AllocationCheckRequest, CreateRecordRequest, ImportRequest, PlanGroupUpdate, PromoteRequest,
    RecapQuery,
};
use super::recap::to_csv_string;
use super::service::{BudgetService, BudgetServiceError};
use crate::backend::{ApiSession, BackendError, BudgetBackend};
use crate::budget::IncomePool;

/// Router builder exposing the budget-checked flows over HTTP.
pub fn budget_router<B>(service: Arc<BudgetService<B>>) -> Router
where
    B: BudgetBackend + ?Sized + 'static,
{
    Router::new()
        .route("/api/v1/budget/allocations/check", post(check_handler::<B>))
        .route("/api/v1/budget/assignments", post(create_handler::<B>))
        .route(
            "/api/v1/budget/plan-groups/:group_id",
            put(update_group_handler::<B>),
        )
        .route("/api/v1/budget/imports/preview", post(preview_handler::<B>))
        .route("/api/v1/budget/imports/commit", post(commit_handler::<B>))
        .route("/api/v1/budget/plans/promote", post(promote_handler::<B>))
        .route("/api/v1/budget/recap", get(recap_handler::<B>))
        .with_state(service)
}

fn session_from(headers: &HeaderMap) -> ApiSession {
    ApiSession::from_authorization(
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok()),
    )
}

pub(crate) async fn check_handler<B>(
    State(service): State<Arc<BudgetService<B>>>,
    headers: HeaderMap,
    Json(request): Json<AllocationCheckRequest>,
) -> Response
where
    B: BudgetBackend + ?Sized + 'static,
{
    match service
        .check_allocations(&session_from(&headers), &request)
        .await
    {
        Ok(review) => (StatusCode::OK, Json(review)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn create_handler<B>(
    State(service): State<Arc<BudgetService<B>>>,
    headers: HeaderMap,
    Json(request): Json<CreateRecordRequest>,
) -> Response
where
    B: BudgetBackend + ?Sized + 'static,
{
    match service.create_record(&session_from(&headers), &request).await {
        Ok(report) => (StatusCode::CREATED, Json(report)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn update_group_handler<B>(
    State(service): State<Arc<BudgetService<B>>>,
    Path(group_id): Path<u64>,
    headers: HeaderMap,
    Json(update): Json<PlanGroupUpdate>,
) -> Response
where
    B: BudgetBackend + ?Sized + 'static,
{
    match service
        .update_plan_group(&session_from(&headers), group_id, &update)
        .await
    {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn preview_handler<B>(
    State(service): State<Arc<BudgetService<B>>>,
    headers: HeaderMap,
    Json(request): Json<ImportRequest>,
) -> Response
where
    B: BudgetBackend + ?Sized + 'static,
{
    match service.preview_import(&session_from(&headers), &request).await {
        Ok(preview) => (StatusCode::OK, Json(preview)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn commit_handler<B>(
    State(service): State<Arc<BudgetService<B>>>,
    headers: HeaderMap,
    Json(request): Json<ImportRequest>,
) -> Response
where
    B: BudgetBackend + ?Sized + 'static,
{
    match service.commit_import(&session_from(&headers), &request).await {
        Ok(report) => (StatusCode::CREATED, Json(report)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn promote_handler<B>(
    State(service): State<Arc<BudgetService<B>>>,
    headers: HeaderMap,
    Json(request): Json<PromoteRequest>,
) -> Response
where
    B: BudgetBackend + ?Sized + 'static,
{
    match service.promote_plans(&session_from(&headers), &request).await {
        Ok(report) if report.outcome.proceeds() => {
            (StatusCode::CREATED, Json(report)).into_response()
        }
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RecapParams {
    year: i32,
    #[serde(default)]
    month: Option<u32>,
    #[serde(default)]
    pool: IncomePool,
    #[serde(default)]
    format: Option<String>,
}

pub(crate) async fn recap_handler<B>(
    State(service): State<Arc<BudgetService<B>>>,
    headers: HeaderMap,
    Query(params): Query<RecapParams>,
) -> Response
where
    B: BudgetBackend + ?Sized + 'static,
{
    let query = RecapQuery {
        year: params.year,
        month: params.month,
        pool: params.pool,
    };
    let recap = match service.recap(&session_from(&headers), &query).await {
        Ok(recap) => recap,
        Err(err) => return error_response(err),
    };

    let wants_csv = params
        .format
        .as_deref()
        .is_some_and(|format| format.eq_ignore_ascii_case("csv"));
    if !wants_csv {
        return (StatusCode::OK, Json(recap)).into_response();
    }

    match to_csv_string(&recap) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "failed to render recap csv");
            let payload = json!({ "error": err.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

pub(crate) fn error_response(err: BudgetServiceError) -> Response {
    match err {
        BudgetServiceError::ImportBlocked(decision) => {
            let payload = json!({
                "error": "import blocked by budget violations",
                "decision": decision,
            });
            (StatusCode::CONFLICT, Json(payload)).into_response()
        }
        BudgetServiceError::NotFound(_) => {
            let payload = json!({ "error": err.to_string() });
            (StatusCode::NOT_FOUND, Json(payload)).into_response()
        }
        BudgetServiceError::InvalidRequest(_) => {
            let payload = json!({ "error": err.to_string() });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
        }
        BudgetServiceError::Backend(BackendError::Status {
            status,
            ref message,
            ..
        }) if (400..500).contains(&status) => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_REQUEST);
            let payload = json!({ "error": message });
            (status, Json(payload)).into_response()
        }
        BudgetServiceError::Backend(_) => {
            error!(error = %err, "backend call failed");
            let payload = json!({ "error": err.to_string() });
            (StatusCode::BAD_GATEWAY, Json(payload)).into_response()
        }
        BudgetServiceError::PromotionIncomplete {
            ref promoted,
            failed,
            ref source,
        } => {
            error!(error = %err, "promotion left partially applied");
            let status = match source {
                BackendError::Status { status, .. } if (400..500).contains(status) => {
                    StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
                }
                _ => StatusCode::BAD_GATEWAY,
            };
            let payload = json!({
                "error": err.to_string(),
                "promoted": promoted,
                "failed": failed,
            });
            (status, Json(payload)).into_response()
        }
        BudgetServiceError::Ceilings(_) => {
            error!(error = %err, "backend returned inconsistent ceilings");
            let payload = json!({ "error": err.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}
