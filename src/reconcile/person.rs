//! Onboarding reconciliation: people starting soon in the HRIS get a
//! matching person record created or updated in the resource planner.

use crate::logging::log_info;
use crate::model::Person;
use crate::remote::{ChartHopClient, RunnClient};
use crate::state::SyncMetrics;
use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnboardingOutcome {
    Synced,
    Skipped(String),
    Error(String),
}

#[derive(Debug, Default)]
pub struct OnboardingSummary {
    pub processed: usize,
    pub synced: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// Syncs every active person whose start date falls within
/// `[reference, reference + lookahead_days]`.
pub async fn sync_onboarding_window(
    charthop: &ChartHopClient,
    runn: &RunnClient,
    metrics: &mut SyncMetrics,
    reference: NaiveDate,
    lookahead_days: i64,
) -> OnboardingSummary {
    let end = reference + chrono::Duration::days(lookahead_days);
    let people = match charthop.list_active_people().await {
        Ok(people) => people,
        Err(e) => {
            metrics.record_error("onboarding", e.to_string(), "batch".to_string());
            return OnboardingSummary::default();
        }
    };

    let starting: Vec<&Person> = people
        .iter()
        .filter(|p| {
            p.start_date
                .as_deref()
                .and_then(|d| NaiveDate::parse_from_str(&d[..d.len().min(10)], "%Y-%m-%d").ok())
                .is_some_and(|start| start >= reference && start <= end)
        })
        .collect();

    let mut summary = OnboardingSummary {
        processed: starting.len(),
        ..OnboardingSummary::default()
    };

    for person in starting {
        let outcome = sync_person(runn, person).await;
        match &outcome {
            OnboardingOutcome::Synced => {
                summary.synced += 1;
                metrics.increment("onboarding_synced");
            }
            OnboardingOutcome::Skipped(_) => {
                summary.skipped += 1;
                metrics.increment("onboarding_skipped");
            }
            OnboardingOutcome::Error(reason) => {
                summary.errors += 1;
                metrics.increment("onboarding_errors");
                metrics.record_error("onboarding", reason.clone(), person.id.clone());
            }
        }
    }
    metrics.record_sync("onboarding_batch");
    summary
}

/// Processes a single ChartHop person event (typically from a webhook).
pub async fn sync_person_event(
    charthop: &ChartHopClient,
    runn: &RunnClient,
    metrics: &mut SyncMetrics,
    person_id: &str,
) -> OnboardingOutcome {
    let person = match charthop.find_person(person_id).await {
        Ok(Some(p)) => p,
        Ok(None) => return OnboardingOutcome::Skipped("person not found".to_string()),
        Err(e) => {
            metrics.record_error("onboarding", e.to_string(), person_id.to_string());
            return OnboardingOutcome::Error(e.to_string());
        }
    };
    let outcome = sync_person(runn, &person).await;
    match &outcome {
        OnboardingOutcome::Synced => metrics.increment("onboarding_synced"),
        OnboardingOutcome::Skipped(_) => metrics.increment("onboarding_skipped"),
        OnboardingOutcome::Error(reason) => {
            metrics.increment("onboarding_errors");
            metrics.record_error("onboarding", reason.clone(), person_id.to_string());
        }
    }
    metrics.record_sync("onboarding_event");
    outcome
}

async fn sync_person(runn: &RunnClient, person: &Person) -> OnboardingOutcome {
    let Some(email) = person.primary_email() else {
        return OnboardingOutcome::Skipped("missing email".to_string());
    };
    let name = person.display_name().unwrap_or_else(|| email.to_string());
    let employment_type = person.employment_type.clone().unwrap_or_else(|| "employee".to_string());

    match runn
        .upsert_person(&name, email, &employment_type, person.start_date.as_deref())
        .await
    {
        Ok(Some(id)) => {
            log_info!(email, runn_person_id = id, "person synced to runn");
            OnboardingOutcome::Synced
        }
        Ok(None) => OnboardingOutcome::Error("runn upsert response missing id".to_string()),
        Err(e) => OnboardingOutcome::Error(e.to_string()),
    }
}
