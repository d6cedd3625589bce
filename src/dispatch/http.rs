//! Axum route wiring. Handlers here are thin: they parse the request,
//! call into the tested `dispatch`/`reconcile`/`batch` logic, and shape a
//! response. No business logic lives in this file.

use super::tasks::{enqueue_http_task, run_task, TaskPayload};
use super::webhook::{handle_ats_event, handle_hris_event};
use crate::batch::{snapshot, warehouse_mirror};
use crate::context::AppContext;
use crate::logging::log_error;
use crate::reconcile::{person, timeoff};
use crate::state::{SyncMetrics, TimeOffMapping};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/", get(root_get).post(root_post))
        .route("/webhooks/hris", post(webhooks_hris))
        .route("/webhooks/ats", post(webhooks_ats))
        .route("/cron/nightly", get(cron_nightly))
        .route("/cron/onboarding", get(cron_onboarding))
        .route("/cron/timeoff", get(cron_timeoff))
        .route("/cron/compensation", get(cron_compensation))
        .route("/cron/recalculate-ctc", get(cron_recalculate_ctc))
        .route("/tasks/worker", post(tasks_worker))
        .route("/tasks/export-snapshot", post(tasks_export_snapshot))
        .route("/tasks/export-warehouse", post(tasks_export_warehouse))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(tower_http::timeout::TimeoutLayer::new(Duration::from_secs(60))),
        )
        .with_state(ctx)
}

async fn health() -> &'static str {
    "OK"
}

async fn root_get() -> &'static str {
    "OK"
}

/// Delegates to the ATS or HRIS handler by payload shape, same rule the
/// single Flask root view used: a `Teamtailor-Signature` header or a
/// `resource_id` field in the body means ATS, everything else is HRIS.
async fn root_post(State(ctx): State<Arc<AppContext>>, headers: HeaderMap, Json(body): Json<Value>) -> StatusCode {
    let has_signature_header = headers.contains_key("Teamtailor-Signature");
    let has_resource_id = body.get("resource_id").is_some();
    if has_signature_header || has_resource_id {
        let _ = dispatch_ats(&ctx, &headers, &body).await;
    } else {
        handle_hris_event(&ctx.task_queue, &body).await;
    }
    StatusCode::OK
}

async fn webhooks_hris(State(ctx): State<Arc<AppContext>>, Json(body): Json<Value>) -> StatusCode {
    handle_hris_event(&ctx.task_queue, &body).await;
    StatusCode::OK
}

async fn webhooks_ats(State(ctx): State<Arc<AppContext>>, headers: HeaderMap, Json(body): Json<Value>) -> StatusCode {
    let _ = dispatch_ats(&ctx, &headers, &body).await;
    StatusCode::OK
}

async fn dispatch_ats(ctx: &AppContext, headers: &HeaderMap, body: &Value) -> StatusCode {
    let resource_id = body
        .get("resource_id")
        .or_else(|| body.get("id"))
        .and_then(Value::as_str)
        .unwrap_or("");
    let signature = headers
        .get("Teamtailor-Signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if let Err(e) = handle_ats_event(
        &ctx.teamtailor,
        &ctx.charthop,
        &ctx.runn,
        resource_id,
        signature,
        &ctx.config.corp_email_domain,
        ctx.config.auto_assign_work_email,
        ctx.config.create_planner_person_on_hire,
    )
    .await
    {
        log_error!(error = %e, "ats webhook handling failed, acknowledging anyway");
    }
    StatusCode::OK
}

/// Snapshot export has no reconciler task kind (it is not a `{kind,
/// entity_id}` worker call); the task id is deterministic per day so a
/// retried Cloud Scheduler tick within the same day is a no-op dedupe.
async fn cron_nightly(State(ctx): State<Arc<AppContext>>) -> (StatusCode, Json<Value>) {
    let task_id = format!("export-snapshot-{}", chrono::Utc::now().date_naive());
    match super::tasks::enqueue_raw_json(&ctx.task_queue, "/tasks/export-snapshot", &json!({}), Some(&task_id)).await {
        Ok(result) => (StatusCode::OK, Json(json!({"status": "queued", "task": result.task_name, "url": result.url}))),
        Err(e) => (StatusCode::OK, Json(json!({"status": "error", "message": e.to_string()}))),
    }
}

async fn cron_onboarding(State(ctx): State<Arc<AppContext>>) -> (StatusCode, Json<Value>) {
    let mut metrics = match SyncMetrics::load(&ctx.store).await {
        Ok(m) => m,
        Err(e) => return (StatusCode::OK, Json(json!({"status": "error", "message": e.to_string()}))),
    };
    let reference = chrono::Utc::now().date_naive();
    let summary = person::sync_onboarding_window(
        &ctx.charthop,
        &ctx.runn,
        &mut metrics,
        reference,
        ctx.config.onboarding_lookahead_days,
    )
    .await;
    let _ = metrics.save(&ctx.store).await;
    (StatusCode::OK, Json(json!({"status": "ok", "result": format!("{summary:?}")})))
}

async fn cron_timeoff(State(ctx): State<Arc<AppContext>>) -> (StatusCode, Json<Value>) {
    let mut metrics = match SyncMetrics::load(&ctx.store).await {
        Ok(m) => m,
        Err(e) => return (StatusCode::OK, Json(json!({"status": "error", "message": e.to_string()}))),
    };
    let mut mapping = match TimeOffMapping::load(&ctx.store).await {
        Ok(m) => m,
        Err(e) => return (StatusCode::OK, Json(json!({"status": "error", "message": e.to_string()}))),
    };
    let _ = mapping.cleanup_old(&ctx.store, ctx.config.mapping_ttl_days).await;

    let today = chrono::Utc::now().date_naive();
    let start = today - chrono::Duration::days(ctx.config.timeoff_lookback_days);
    let end = today + chrono::Duration::days(ctx.config.timeoff_lookahead_days);
    let entries = match ctx.charthop.fetch_timeoff(start, end).await {
        Ok(entries) => entries,
        Err(e) => return (StatusCode::OK, Json(json!({"status": "error", "message": e.to_string()}))),
    };
    let summary = timeoff::sync_entries(&ctx.charthop, &ctx.runn, &mut mapping, &ctx.store, &mut metrics, &entries).await;
    let _ = metrics.save(&ctx.store).await;
    (StatusCode::OK, Json(json!({"status": "ok", "result": format!("{summary:?}")})))
}

async fn cron_compensation(State(ctx): State<Arc<AppContext>>) -> (StatusCode, Json<Value>) {
    let task_id = format!("compensation-{}", chrono::Utc::now().date_naive());
    let payload = TaskPayload {
        kind: super::tasks::TaskKind::CompensationSyncBatch,
        entity_id: String::new(),
    };
    match enqueue_http_task(&ctx.task_queue, "/tasks/worker", &payload, Some(&task_id)).await {
        Ok(result) => (StatusCode::OK, Json(json!({"status": "queued", "task": result.task_name}))),
        Err(e) => (StatusCode::OK, Json(json!({"status": "error", "message": e.to_string()}))),
    }
}

async fn cron_recalculate_ctc(State(ctx): State<Arc<AppContext>>) -> (StatusCode, Json<Value>) {
    let task_id = format!("ctc-recalculate-{}", chrono::Utc::now().date_naive());
    let payload = TaskPayload {
        kind: super::tasks::TaskKind::CtcRecalculateBatch,
        entity_id: String::new(),
    };
    match enqueue_http_task(&ctx.task_queue, "/tasks/worker", &payload, Some(&task_id)).await {
        Ok(result) => (StatusCode::OK, Json(json!({"status": "queued", "task": result.task_name}))),
        Err(e) => (StatusCode::OK, Json(json!({"status": "error", "message": e.to_string()}))),
    }
}

async fn tasks_worker(State(ctx): State<Arc<AppContext>>, body: Result<Json<TaskPayload>, axum::extract::rejection::JsonRejection>) -> (StatusCode, Json<Value>) {
    let Ok(Json(payload)) = body else {
        return (StatusCode::BAD_REQUEST, Json(json!({"ok": false, "error": "missing kind/entity_id"})));
    };
    match run_task(&ctx.charthop, &ctx.runn, &ctx.store, &payload, ctx.config.annual_hours).await {
        Ok(result) => (StatusCode::OK, Json(json!({"ok": true, "kind": payload.kind, "entity_id": payload.entity_id, "result": result}))),
        Err(e) => (StatusCode::OK, Json(json!({"ok": false, "kind": payload.kind, "entity_id": payload.entity_id, "error": e.to_string()}))),
    }
}

async fn tasks_export_snapshot(State(ctx): State<Arc<AppContext>>) -> (StatusCode, Json<Value>) {
    match snapshot::export_snapshot(&ctx.charthop, &ctx.store, &ctx.config.sftp, ctx.config.export_mode).await {
        Ok(summary) => (StatusCode::OK, Json(json!({"status": "ok", "rows_sent": summary.rows_sent, "skipped": summary.skipped}))),
        Err(e) => (StatusCode::OK, Json(json!({"status": "error", "message": e.to_string()}))),
    }
}

async fn tasks_export_warehouse(State(ctx): State<Arc<AppContext>>) -> (StatusCode, Json<Value>) {
    let summary = warehouse_mirror::mirror_all(
        &ctx.runn,
        &ctx.warehouse,
        &ctx.store,
        ctx.config.window_days,
        ctx.config.overlap_days,
        ctx.config.runn_holiday_group_id.as_deref(),
        None,
    )
    .await;
    (StatusCode::OK, Json(json!({"loaded": summary.loaded, "errors": summary.errors})))
}
