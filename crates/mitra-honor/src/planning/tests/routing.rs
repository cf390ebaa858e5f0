use super::common::*;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::planning::router::error_response;
use crate::planning::{BudgetService, BudgetServiceError, ImportRequest};

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, "Bearer route-token")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

#[tokio::test]
async fn check_route_blocks_imports_over_quota() {
    let (router, _) = router_for(MemoryBackend::default());

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/budget/allocations/check",
            json!({
                "policy": "import",
                "sub_activity_id": 1,
                "allocations": [{ "mitra_id": 8, "job_code": " ppl", "volume": 20 }]
            }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["decision"]["blocked"], json!(true));
    assert_eq!(payload["rows"][0]["state"], json!("valid_over_budget"));
    assert_eq!(payload["rows"][0]["volume"]["assigned"], json!(170));
    assert_eq!(
        payload["decision"]["violations"][0]["kind"]["type"],
        json!("volume_exceeded")
    );
}

#[tokio::test]
async fn create_route_forwards_bearer_token() {
    let (router, backend) = router_for(MemoryBackend::default());

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/budget/assignments",
            json!({
                "sub_activity_id": 1,
                "start_date": "2026-03-02",
                "members": [{ "mitra_id": 7, "job_code": "PPL", "volume": 5 }]
            }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["outcome"], json!("committed_with_override"));
    assert_eq!(payload["rows"][0]["income"]["total"], json!(3_075_000));
    assert!(backend
        .sessions()
        .iter()
        .all(|session| session.bearer.as_deref() == Some("route-token")));
    assert_eq!(backend.writes().len(), 1);
}

#[tokio::test]
async fn create_route_rejects_empty_members() {
    let (router, backend) = router_for(MemoryBackend::default());

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/budget/assignments",
            json!({ "sub_activity_id": 1, "members": [] }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(backend.writes().is_empty());
}

#[tokio::test]
async fn plan_group_route_sends_update_despite_warnings() {
    let (router, backend) = router_for(MemoryBackend::default());

    let response = router
        .oneshot(json_request(
            "PUT",
            "/api/v1/budget/plan-groups/200",
            json!({ "job_code": "PPL", "volume": 45 }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["outcome"], json!("committed_with_override"));
    assert_eq!(payload["decision"]["blocked"], json!(false));
    assert_eq!(backend.writes().len(), 1);
}

#[tokio::test]
async fn blocked_commit_returns_conflict_with_decision() {
    let backend = MemoryBackend {
        preview: vec![
            preview_row(BUDI, 10, false),
            preview_row(SITI, 10, true),
            preview_row(ANI, 10, false),
        ],
        ..MemoryBackend::default()
    };
    let (router, backend) = router_for(backend);

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/budget/imports/commit",
            json!({
                "sub_activity_id": 3,
                "rows": [
                    { "mitra_id": 7, "job_code": "PPL", "volume": 10 },
                    { "mitra_id": 8, "job_code": "PPL", "volume": 10 },
                    { "mitra_id": 9, "job_code": "PPL", "volume": 10 }
                ]
            }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let payload = read_json_body(response).await;
    assert_eq!(payload["decision"]["blocked"], json!(true));
    assert_eq!(payload["decision"]["policy"], json!("import"));
    assert!(backend.writes().is_empty());
}

#[tokio::test]
async fn promote_route_asks_before_promoting() {
    let (service, backend) = build_service(MemoryBackend::default());
    let service = Arc::new(service);

    let first = crate::planning::budget_router(service.clone())
        .oneshot(json_request(
            "POST",
            "/api/v1/budget/plans/promote",
            json!({ "plan_ids": [20] }),
        ))
        .await
        .expect("route executes");

    assert_eq!(first.status(), StatusCode::OK);
    let payload = read_json_body(first).await;
    assert_eq!(payload["outcome"], json!("rejected"));
    assert!(payload["prompt"].as_str().unwrap_or_default().contains("Proceed anyway?"));
    assert!(backend.writes().is_empty());

    let second = crate::planning::budget_router(service)
        .oneshot(json_request(
            "POST",
            "/api/v1/budget/plans/promote",
            json!({ "plan_ids": [20], "confirmed": true }),
        ))
        .await
        .expect("route executes");

    assert_eq!(second.status(), StatusCode::CREATED);
    let payload = read_json_body(second).await;
    assert_eq!(payload["promoted"], json!([20]));
    assert_eq!(backend.writes().len(), 1);
}

#[tokio::test]
async fn interrupted_promotion_lists_what_was_promoted() {
    let backend = MemoryBackend {
        accepted_writes: Some(1),
        ..MemoryBackend::default()
    };
    let (router, backend) = router_for(backend);

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/budget/plans/promote",
            json!({ "plan_ids": [20, 21], "confirmed": true }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let payload = read_json_body(response).await;
    assert_eq!(payload["promoted"], json!([20]));
    assert_eq!(payload["failed"], json!(21));
    assert_eq!(backend.writes().len(), 1);
}

#[tokio::test]
async fn recap_route_renders_csv() {
    let (router, _) = router_for(MemoryBackend::default());

    let response = router
        .oneshot(
            Request::get("/api/v1/budget/recap?year=2026&month=3&format=csv")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok()),
        Some("text/csv; charset=utf-8")
    );
    let body = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .expect("read body");
    let text = String::from_utf8(body.to_vec()).expect("utf-8 csv");
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("mitra_id,name,nik,period,income,ceiling,headroom,is_over,active,activities")
    );
    assert!(lines
        .next()
        .is_some_and(|line| line.starts_with("9,Ani Lestari,")));
}

#[tokio::test]
async fn recap_route_rejects_invalid_month() {
    let (router, _) = router_for(MemoryBackend::default());

    let response = router
        .oneshot(
            Request::get("/api/v1/budget/recap?year=2026&month=13")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn unavailable_backend_maps_to_bad_gateway() {
    let service = Arc::new(BudgetService::new(Arc::new(UnavailableBackend)));

    let response = crate::planning::router::preview_handler::<UnavailableBackend>(
        State(service),
        axum::http::HeaderMap::new(),
        axum::Json(ImportRequest {
            kind: crate::budget::RecordKind::Assignment,
            sub_activity_id: crate::budget::SubActivityId(3),
            rows: vec![draft(BUDI, "PPL", 1)],
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn backend_rejections_keep_their_client_status() {
    let backend = MemoryBackend {
        reject_writes: Some((422, "periode sudah ditutup".to_string())),
        ..MemoryBackend::default()
    };
    let (router, _) = router_for(backend);

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/budget/assignments",
            json!({
                "sub_activity_id": 1,
                "members": [{ "mitra_id": 8, "job_code": "PML", "volume": 1 }]
            }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert_eq!(payload["error"], json!("periode sudah ditutup"));
}

#[tokio::test]
async fn not_found_maps_to_404() {
    let response = error_response(BudgetServiceError::NotFound("plan #77".to_string()));
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let payload = read_json_body(response).await;
    assert_eq!(payload["error"], json!("plan #77 not found"));
}
