//! Compensation reconciliation: a ChartHop person's cost-to-company is
//! converted to an hourly rate and pushed onto every active Runn contract.

use crate::model::Person;
use crate::remote::{ChartHopClient, RunnClient};
use crate::state::SyncMetrics;

const COST_UPDATE_EPSILON: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompensationOutcome {
    Synced { contracts_updated: usize },
    Skipped(String),
    Error(String),
}

/// `costPerHour = costToCompany / annualHours`, rounded to cents.
pub fn cost_per_hour(cost_to_company: f64, annual_hours: f64) -> f64 {
    if cost_to_company <= 0.0 || annual_hours <= 0.0 {
        return 0.0;
    }
    (cost_to_company / annual_hours * 100.0).round() / 100.0
}

/// Syncs one person's compensation into every active Runn contract.
pub async fn sync_person_compensation(
    charthop: &ChartHopClient,
    runn: &RunnClient,
    metrics: &mut SyncMetrics,
    person: &Person,
    annual_hours: f64,
    reference_date: Option<&str>,
) -> CompensationOutcome {
    let Some(email) = person.primary_email() else {
        return CompensationOutcome::Skipped("missing email".to_string());
    };
    let Some(ctc) = resolve_ctc(charthop, person).await else {
        return CompensationOutcome::Skipped("missing or invalid cost to company".to_string());
    };

    let rate = cost_per_hour(ctc, annual_hours);
    if rate <= 0.0 {
        return CompensationOutcome::Skipped("calculated cost per hour is invalid".to_string());
    }

    let runn_person = match runn.find_person_by_email(email).await {
        Ok(Some(p)) => p,
        Ok(None) => return CompensationOutcome::Skipped("person not found in runn".to_string()),
        Err(e) => return CompensationOutcome::Error(e.to_string()),
    };

    let contracts = match runn.active_contracts(runn_person.id, reference_date).await {
        Ok(contracts) => contracts,
        Err(e) => return CompensationOutcome::Error(e.to_string()),
    };
    if contracts.is_empty() {
        return CompensationOutcome::Skipped("no active contracts".to_string());
    }

    let mut updated = 0usize;
    let mut failed = 0usize;
    for contract in contracts {
        if let Some(current) = contract.cost_per_hour {
            if (current - rate).abs() < COST_UPDATE_EPSILON {
                continue;
            }
        }
        match runn.update_contract_cost(contract.id, rate).await {
            Ok(()) => {
                updated += 1;
                metrics.increment("contracts_updated");
            }
            Err(_) => failed += 1,
        }
    }

    if updated > 0 {
        metrics.increment("compensation_synced");
        CompensationOutcome::Synced { contracts_updated: updated }
    } else if failed > 0 {
        metrics.increment("compensation_errors");
        CompensationOutcome::Error(format!("failed to update {failed} contracts"))
    } else {
        metrics.increment("compensation_skipped");
        CompensationOutcome::Skipped("contracts already up to date".to_string())
    }
}

async fn resolve_ctc(charthop: &ChartHopClient, person: &Person) -> Option<f64> {
    if let Some(ctc) = person.cost_to_company.filter(|c| *c > 0.0) {
        return Some(ctc);
    }
    let job_id = person.job_id.as_ref()?;
    let job = charthop.find_job(job_id).await.ok().flatten()?;
    job.ctc.filter(|c| *c > 0.0)
}

#[derive(Debug, Default)]
pub struct CompensationBatchSummary {
    pub processed: usize,
    pub synced: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// Syncs compensation for every active ChartHop person with a resolvable
/// cost-to-company, as of `reference_date` (today if unset).
pub async fn batch_sync_compensation(
    charthop: &ChartHopClient,
    runn: &RunnClient,
    metrics: &mut SyncMetrics,
    annual_hours: f64,
    reference_date: Option<&str>,
) -> CompensationBatchSummary {
    let people = match charthop.list_active_people().await {
        Ok(people) => people,
        Err(e) => {
            metrics.record_error("compensation_sync", e.to_string(), "batch".to_string());
            return CompensationBatchSummary::default();
        }
    };

    let mut summary = CompensationBatchSummary {
        processed: people.len(),
        ..CompensationBatchSummary::default()
    };

    for person in &people {
        match sync_person_compensation(charthop, runn, metrics, person, annual_hours, reference_date).await {
            CompensationOutcome::Synced { .. } => summary.synced += 1,
            CompensationOutcome::Skipped(_) => summary.skipped += 1,
            CompensationOutcome::Error(reason) => {
                summary.errors += 1;
                metrics.record_error("compensation_sync", reason, person.id.clone());
            }
        }
    }
    metrics.record_sync("compensation_sync_batch");
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_per_hour_rounds_to_cents() {
        assert_eq!(cost_per_hour(100_000.0, 1856.0), 53.88);
    }

    #[test]
    fn cost_per_hour_is_zero_for_non_positive_input() {
        assert_eq!(cost_per_hour(0.0, 1856.0), 0.0);
        assert_eq!(cost_per_hour(100_000.0, 0.0), 0.0);
    }
}
