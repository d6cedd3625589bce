//! Webhook ingestion for both upstream sources. Both handlers always
//! report success to the caller - a malformed or unrecognized event is
//! logged and acknowledged rather than surfaced as a failure, so the
//! sender never enters a retry storm.

use super::classify::{classify_hris_event, HrisEventKind};
use super::tasks::{enqueue_http_task, EnqueueResult, TaskKind, TaskPayload};
use crate::config::TaskQueueConfig;
use crate::error::SyncResult;
use crate::logging::{log_info, log_warn};
use crate::model::HireEvent;
use crate::remote::{ChartHopClient, RunnClient, TeamtailorClient, Transport};
use serde_json::Value;

#[derive(Debug, Clone)]
pub enum WebhookOutcome {
    Enqueued(EnqueueResult),
    Acknowledged(String),
}

/// Classifies an HRIS webhook body and enqueues the matching task. Job
/// events are classified (per the tolerant-parsing contract) but have no
/// corresponding worker task kind, so they are logged and acknowledged.
pub async fn handle_hris_event(task_queue: &Transport<TaskQueueConfig>, payload: &Value) -> WebhookOutcome {
    let event = classify_hris_event(payload);
    if event.entity_id.is_empty() && !matches!(event.kind, HrisEventKind::Unknown) {
        log_warn!(kind = ?event.kind, "hris event missing entity_id");
        return WebhookOutcome::Acknowledged("missing entity_id".to_string());
    }

    let kind = match event.kind {
        HrisEventKind::TimeoffCreate | HrisEventKind::TimeoffUpdate => Some(TaskKind::Timeoff),
        HrisEventKind::TimeoffDelete => Some(TaskKind::TimeoffDelete),
        HrisEventKind::PersonCreate | HrisEventKind::PersonUpdate => Some(TaskKind::Person),
        HrisEventKind::JobCreate | HrisEventKind::JobUpdate => {
            log_info!(entity_id = %event.entity_id, kind = ?event.kind, "job event acknowledged, no downstream task");
            None
        }
        HrisEventKind::Unknown => {
            log_info!("hris event did not match a known entity/action pair, acknowledging");
            None
        }
    };

    let Some(kind) = kind else {
        return WebhookOutcome::Acknowledged("no task kind for this event".to_string());
    };

    let task_payload = TaskPayload {
        kind,
        entity_id: event.entity_id,
    };
    match enqueue_http_task(task_queue, "/tasks/worker", &task_payload, None).await {
        Ok(result) => WebhookOutcome::Enqueued(result),
        Err(e) => {
            log_warn!(error = %e, "failed to enqueue hris task");
            WebhookOutcome::Acknowledged(e.to_string())
        }
    }
}

/// Verifies the ATS webhook's HMAC signature over `resource_id`, then
/// fetches and processes the application if the signature checks out. A
/// bad signature is opaque to the sender: acknowledged, not rejected.
pub async fn handle_ats_event(
    teamtailor: &TeamtailorClient,
    charthop: &ChartHopClient,
    runn: &RunnClient,
    resource_id: &str,
    signature_header: &str,
    corp_email_domain: &str,
    auto_assign_work_email: bool,
    create_planner_person_on_hire: bool,
) -> SyncResult<WebhookOutcome> {
    if resource_id.is_empty() {
        return Ok(WebhookOutcome::Acknowledged("missing resource_id".to_string()));
    }
    if !teamtailor.verify_signature(resource_id, signature_header)? {
        log_warn!(resource_id = %resource_id, "ats signature verification failed");
        return Ok(WebhookOutcome::Acknowledged("signature mismatch".to_string()));
    }

    let event: HireEvent = teamtailor.fetch_hire_event(resource_id).await?;
    let result = crate::reconcile::hire::process_hired_application(
        charthop,
        runn,
        &event,
        corp_email_domain,
        auto_assign_work_email,
        create_planner_person_on_hire,
    )
    .await;

    log_info!(application_id = %resource_id, processed = result.processed, "ats hire event handled");
    Ok(WebhookOutcome::Acknowledged(format!("{result:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_event_has_no_task_kind() {
        let event = classify_hris_event(&json!({"type": "widget.frob"}));
        assert_eq!(event.kind, HrisEventKind::Unknown);
    }
}
