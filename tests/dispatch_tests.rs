//! Event classification and webhook dispatch tests that don't need a
//! live Cloud Tasks or Teamtailor endpoint: the failure paths these
//! cover are deliberately silent (acknowledge-and-log, never propagate)
//! so a misconfigured queue or a forged signature never turns into a
//! retry storm from the sender's point of view.

use hrsync::config::{RunnConfig, TaskQueueConfig, TeamtailorConfig};
use hrsync::dispatch::classify::classify_hris_event;
use hrsync::dispatch::webhook::{handle_ats_event, handle_hris_event, WebhookOutcome};
use hrsync::remote::{RunnClient, TeamtailorClient, Transport};
use serde_json::json;

#[test]
fn classifies_timeoff_events_tolerant_to_casing_and_separators() {
    for (event_type, entity_type) in [
        ("Create", "Time.Off"),
        ("create", "timeoff"),
        ("CREATE", "TIME-OFF"),
    ] {
        let event = classify_hris_event(&json!({"event_type": event_type, "entity_type": entity_type, "entity_id": "t1"}));
        assert_eq!(event.entity_id, "t1");
        assert!(matches!(event.kind, hrsync::dispatch::HrisEventKind::TimeoffCreate));
    }
}

#[test]
fn classifies_person_update_from_alternate_key_names() {
    let event = classify_hris_event(&json!({
        "eventType": "update",
        "entitytype": "people",
        "entityId": "p1",
    }));
    assert!(matches!(event.kind, hrsync::dispatch::HrisEventKind::PersonUpdate));
    assert_eq!(event.entity_id, "p1");
}

#[test]
fn unrecognized_entity_and_action_classify_as_unknown() {
    let event = classify_hris_event(&json!({"event_type": "widget.frob", "entity_id": "w1"}));
    assert_eq!(event.kind, hrsync::dispatch::HrisEventKind::Unknown);
}

#[tokio::test]
async fn hris_job_event_is_acknowledged_without_enqueue_attempt() {
    // An unconfigured task queue would fail validation on enqueue; a job
    // event must never reach that code path at all.
    let queue = Transport::new(TaskQueueConfig::default());
    let outcome = handle_hris_event(
        &queue,
        &json!({"event_type": "create", "entity_type": "job", "entity_id": "j1"}),
    )
    .await;
    assert!(matches!(outcome, WebhookOutcome::Acknowledged(_)));
}

#[tokio::test]
async fn hris_timeoff_event_with_unconfigured_queue_is_acknowledged_not_errored() {
    let queue = Transport::new(TaskQueueConfig::default());
    let outcome = handle_hris_event(
        &queue,
        &json!({"event_type": "create", "entity_type": "timeoff", "entity_id": "t1"}),
    )
    .await;
    assert!(matches!(outcome, WebhookOutcome::Acknowledged(_)));
}

#[tokio::test]
async fn ats_event_with_missing_resource_id_is_acknowledged() {
    let teamtailor = TeamtailorClient::new(TeamtailorConfig::default());
    let charthop = hrsync::remote::ChartHopClient::new(hrsync::config::ChartHopConfig::default());
    let runn = RunnClient::new(RunnConfig::default());

    let outcome = handle_ats_event(&teamtailor, &charthop, &runn, "", "", "acme.com", false, false)
        .await
        .unwrap();

    assert!(matches!(outcome, WebhookOutcome::Acknowledged(ref msg) if msg.contains("missing resource_id")));
}

#[tokio::test]
async fn ats_event_with_bad_signature_is_acknowledged_not_rejected() {
    let teamtailor = TeamtailorClient::new(TeamtailorConfig {
        webhook_hmac_key: Some("secret".to_string()),
        ..TeamtailorConfig::default()
    });
    let charthop = hrsync::remote::ChartHopClient::new(hrsync::config::ChartHopConfig::default());
    let runn = RunnClient::new(RunnConfig::default());

    let outcome = handle_ats_event(&teamtailor, &charthop, &runn, "app-1", "not-the-right-signature", "acme.com", false, false)
        .await
        .unwrap();

    assert!(matches!(outcome, WebhookOutcome::Acknowledged(ref msg) if msg.contains("signature")));
}
