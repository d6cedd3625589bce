//! Hire-to-onboarding pipeline: an ATS hire event becomes a ChartHop
//! import row and, optionally, a planner person.

use crate::model::HireEvent;
use crate::remote::{ChartHopClient, RunnClient};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HireResult {
    pub processed: bool,
    pub reason: Option<String>,
    pub generated_work_email: Option<String>,
    pub runn_synced: bool,
}

/// Imports a hired candidate into ChartHop and, if configured, creates a
/// matching planner person. No-ops if the application isn't actually
/// marked hired.
pub async fn process_hired_application(
    charthop: &ChartHopClient,
    runn: &RunnClient,
    event: &HireEvent,
    corp_email_domain: &str,
    auto_assign_work_email: bool,
    create_planner_person: bool,
) -> HireResult {
    if !event.is_hired() {
        return HireResult {
            processed: false,
            reason: Some("application not hired".to_string()),
            generated_work_email: None,
            runn_synced: false,
        };
    }

    let first = event.candidate_first_name.clone().unwrap_or_default();
    let last = event.candidate_last_name.clone().unwrap_or_default();
    let personal_email = event.candidate_personal_email.clone().unwrap_or_default();
    let title = event.job_title.clone().unwrap_or_default();
    let start_date = event.start_date().unwrap_or_default();

    let work_email = if auto_assign_work_email {
        charthop
            .generate_unique_work_email(&first, &last, corp_email_domain)
            .await
            .ok()
            .flatten()
    } else {
        None
    };

    let mut row = HashMap::new();
    row.insert("first name".to_string(), first.clone());
    row.insert("last name".to_string(), last.clone());
    row.insert("contact personalemail".to_string(), personal_email.clone());
    row.insert("title".to_string(), title);
    row.insert("start date".to_string(), start_date.clone());
    if let Some(work_email) = &work_email {
        row.insert("contact workemail".to_string(), work_email.clone());
    }

    if let Err(e) = charthop.import_people_csv(&[row]).await {
        return HireResult {
            processed: false,
            reason: Some(format!("charthop import failed: {e}")),
            generated_work_email: work_email,
            runn_synced: false,
        };
    }

    let mut runn_synced = false;
    if create_planner_person {
        let email_for_runn = work_email.clone().or_else(|| Some(personal_email.clone())).filter(|e| !e.is_empty());
        if let Some(email) = email_for_runn {
            let name = format!("{first} {last}").trim().to_string();
            runn_synced = runn
                .upsert_person(&name, &email, "employee", Some(&start_date))
                .await
                .map(|id| id.is_some())
                .unwrap_or(false);
        }
    }

    HireResult {
        processed: true,
        reason: None,
        generated_work_email: work_email,
        runn_synced,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(status: &str, hired_at: Option<&str>) -> HireEvent {
        HireEvent {
            application_id: "app-1".to_string(),
            status: status.to_string(),
            candidate_first_name: Some("Ada".to_string()),
            candidate_last_name: Some("Lovelace".to_string()),
            candidate_personal_email: Some("ada@example.com".to_string()),
            job_title: Some("Engineer".to_string()),
            hired_at: hired_at.map(str::to_string),
            offer_start_date: None,
            attribute_start_date: None,
        }
    }

    #[test]
    fn is_hired_detection_matches_status_or_hired_at() {
        assert!(event("hired", None).is_hired());
        assert!(event("active", Some("2026-01-01")).is_hired());
        assert!(!event("rejected", None).is_hired());
    }
}
