//! Durable task enqueue and the worker-side routing table. Enqueue talks
//! to the Cloud Tasks REST API over the same [`Transport`] every other
//! adapter uses; the worker side maps a task kind to one reconciler call.

use crate::config::TaskQueueConfig;
use crate::error::{SyncError, SyncResult};
use crate::logging::log_info;
use crate::model::Person;
use crate::reconcile::{compensation, ctc, person as person_reconcile, timeoff};
use crate::remote::{bearer_headers, ChartHopClient, RunnClient, Transport};
use crate::state::{StateStore, SyncMetrics, TimeOffMapping};
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// One of the task kinds the worker endpoint knows how to route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Timeoff,
    TimeoffDelete,
    Person,
    Compensation,
    CompensationSyncBatch,
    CtcRecalculate,
    CtcRecalculateBatch,
}

/// The JSON body every enqueued task carries: `{kind, entity_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPayload {
    pub kind: TaskKind,
    #[serde(default)]
    pub entity_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnqueueResult {
    pub task_name: String,
    pub url: String,
}

/// Builds a Cloud Tasks `tasks.create` request carrying a typed
/// `{kind, entity_id}` worker payload.
pub async fn enqueue_http_task(
    transport: &Transport<TaskQueueConfig>,
    relative_url: &str,
    payload: &TaskPayload,
    task_id: Option<&str>,
) -> SyncResult<EnqueueResult> {
    let body = serde_json::to_value(payload)
        .map_err(|e| SyncError::request_failed("task_queue", format!("failed to encode task body: {e}"), Some(Box::new(e))))?;
    enqueue_raw_json(transport, relative_url, &body, task_id).await
}

/// Builds a Cloud Tasks `tasks.create` request targeting this service's
/// own HTTP surface, authenticated for Cloud Tasks itself via a bearer
/// token and carrying an OIDC token Cloud Tasks mints at dispatch time so
/// the callback into this service is verified.
pub async fn enqueue_raw_json(
    transport: &Transport<TaskQueueConfig>,
    relative_url: &str,
    payload: &serde_json::Value,
    task_id: Option<&str>,
) -> SyncResult<EnqueueResult> {
    let config = transport.config();
    config.validate()?;

    let target_url = format!("{}{}", config.service_url.trim_end_matches('/'), relative_url);
    let body = serde_json::to_vec(payload)
        .map_err(|e| SyncError::request_failed("task_queue", format!("failed to encode task body: {e}"), Some(Box::new(e))))?;
    let body_b64 = base64::engine::general_purpose::STANDARD.encode(&body);

    let mut http_request = json!({
        "httpMethod": "POST",
        "url": target_url,
        "headers": {"Content-Type": "application/json"},
        "body": body_b64,
    });
    if !config.service_account.is_empty() {
        http_request["oidcToken"] = json!({
            "serviceAccountEmail": config.service_account,
            "audience": config.audience,
        });
    }

    let mut task = json!({ "httpRequest": http_request, "dispatchDeadline": format!("{}s", config.dispatch_deadline.as_secs()) });
    if let Some(id) = task_id {
        task["name"] = json!(format!(
            "projects/{}/locations/{}/queues/{}/tasks/{}",
            config.project, config.region, config.queue, id
        ));
    }

    let parent = format!(
        "{}/projects/{}/locations/{}/queues/{}/tasks",
        transport.url(""),
        config.project,
        config.region,
        config.queue
    );

    let token = config
        .api_token
        .as_ref()
        .ok_or_else(|| SyncError::configuration("TASK_QUEUE_ACCESS_TOKEN is required to call Cloud Tasks"))?;
    let headers = bearer_headers(token)?;

    let response: serde_json::Value = transport
        .send_json(|| {
            transport
                .client()
                .post(&parent)
                .headers(headers.clone())
                .json(&json!({ "task": task }))
        })
        .await?;

    let name = response.get("name").and_then(serde_json::Value::as_str).unwrap_or_default().to_string();
    log_info!(task_name = %name, url = %target_url, "task enqueued");
    Ok(EnqueueResult { task_name: name, url: target_url })
}

/// Resolves and runs one worker task, dispatching to the reconciler that
/// owns the given kind. Single-item handlers first resolve the full
/// entity from ChartHop since a task payload only carries an id.
pub async fn run_task(
    charthop: &ChartHopClient,
    runn: &RunnClient,
    store: &StateStore,
    payload: &TaskPayload,
    annual_hours: f64,
) -> SyncResult<serde_json::Value> {
    let mut metrics = SyncMetrics::load(store).await?;

    let result = match payload.kind {
        TaskKind::Timeoff => {
            let Some(entry) = charthop.find_timeoff(&payload.entity_id).await? else {
                return Ok(json!({"status": "skipped", "reason": "timeoff not found"}));
            };
            let mut mapping = TimeOffMapping::load(store).await?;
            let outcome = timeoff::sync_entry(charthop, runn, &mut mapping, store, &entry).await;
            json!({"status": format!("{outcome:?}")})
        }
        TaskKind::TimeoffDelete => {
            let mut mapping = TimeOffMapping::load(store).await?;
            let outcome = timeoff::delete_entry(runn, &mut mapping, store, &mut metrics, &payload.entity_id).await;
            json!({"status": format!("{outcome:?}")})
        }
        TaskKind::Person => {
            let outcome = person_reconcile::sync_person_event(charthop, runn, &mut metrics, &payload.entity_id).await;
            json!({"status": format!("{outcome:?}")})
        }
        TaskKind::Compensation => {
            let Some(person) = charthop.find_person(&payload.entity_id).await? else {
                return Ok(json!({"status": "skipped", "reason": "person not found"}));
            };
            let outcome = compensation::sync_person_compensation(charthop, runn, &mut metrics, &person, annual_hours, None).await;
            json!({"status": format!("{outcome:?}")})
        }
        TaskKind::CompensationSyncBatch => {
            let summary = compensation::batch_sync_compensation(charthop, runn, &mut metrics, annual_hours, None).await;
            json!({"summary": format!("{summary:?}")})
        }
        TaskKind::CtcRecalculate => {
            let person: Option<Person> = charthop.find_person(&payload.entity_id).await?;
            let Some(person) = person else {
                return Ok(json!({"status": "skipped", "reason": "person not found"}));
            };
            let outcome = ctc::calculate_and_update_ctc(charthop, &person).await;
            json!({"status": format!("{outcome:?}")})
        }
        TaskKind::CtcRecalculateBatch => {
            let summary = ctc::batch_calculate_and_update_ctc(charthop, &mut metrics).await;
            json!({"summary": format!("{summary:?}")})
        }
    };

    metrics.save(store).await?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_payload_round_trips_through_json() {
        let payload = TaskPayload {
            kind: TaskKind::CompensationSyncBatch,
            entity_id: String::new(),
        };
        let text = serde_json::to_string(&payload).unwrap();
        assert!(text.contains("compensation_sync_batch"));
        let back: TaskPayload = serde_json::from_str(&text).unwrap();
        assert_eq!(back.kind, TaskKind::CompensationSyncBatch);
    }
}
