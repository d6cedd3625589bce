//! Cost-to-company calculation and write-back to ChartHop. Converts a
//! job's base compensation into a fully-loaded annual figure according to
//! the hiring scheme's formula.

use crate::logging::log_warn;
use crate::model::{HiringScheme, Person};
use crate::remote::ChartHopClient;
use crate::state::SyncMetrics;

const MONTHLY_MINIMUM_WAGE_MXN: f64 = 8364.0;
const MXN_PER_USD: f64 = 18.30;

fn two_minimum_wages_annualized_usd() -> f64 {
    (MONTHLY_MINIMUM_WAGE_MXN * 12.0 * 2.0) / MXN_PER_USD
}

/// Computes the annual cost-to-company for `base_comp` under `scheme`.
/// An unrecognized scheme falls back to the base figure with a warning,
/// rather than failing the whole reconciliation.
pub fn calculate_ctc(base_comp: f64, scheme: &HiringScheme) -> f64 {
    if base_comp <= 0.0 {
        return 0.0;
    }

    let total = match scheme {
        HiringScheme::Nomina | HiringScheme::MixtoInterno => base_comp * 1.40,
        HiringScheme::MixtoExterno => {
            let two_minimums = two_minimum_wages_annualized_usd();
            let bonus = two_minimums * 0.40;
            let remainder = base_comp - two_minimums;
            let fee = remainder * 0.02;
            base_comp + bonus + fee
        }
        HiringScheme::Ontop => base_comp + 720.0,
        HiringScheme::Voiz => base_comp + 240.0,
        HiringScheme::Other(raw) => {
            log_warn!(scheme = %raw, "unrecognized hiring scheme, using base compensation only");
            base_comp
        }
    };

    (total * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CtcOutcome {
    Updated { job_id: String, new_ctc_cents: i64 },
    Skipped(String),
    Error(String),
}

/// Recalculates and writes back a single person's job CTC. Base
/// compensation lives on the job record, not the person.
pub async fn calculate_and_update_ctc(charthop: &ChartHopClient, person: &Person) -> CtcOutcome {
    let Some(job_id) = &person.job_id else {
        return CtcOutcome::Skipped("missing job id".to_string());
    };
    let job = match charthop.find_job(job_id).await {
        Ok(Some(job)) => job,
        Ok(None) => return CtcOutcome::Skipped("job not found".to_string()),
        Err(e) => return CtcOutcome::Error(e.to_string()),
    };
    let Some(base_comp) = job.base_compensation.filter(|c| *c > 0.0) else {
        return CtcOutcome::Skipped("missing base compensation".to_string());
    };
    let scheme = person
        .hiring_scheme
        .clone()
        .unwrap_or_else(|| HiringScheme::Other(String::new()));

    let new_ctc = calculate_ctc(base_comp, &scheme);
    if new_ctc <= 0.0 {
        return CtcOutcome::Skipped("calculation is zero".to_string());
    }

    match charthop.upsert_job_ctc(job_id, new_ctc).await {
        Ok(()) => CtcOutcome::Updated {
            job_id: job_id.clone(),
            new_ctc_cents: (new_ctc * 100.0).round() as i64,
        },
        Err(e) => CtcOutcome::Error(e.to_string()),
    }
}

#[derive(Debug, Default)]
pub struct CtcBatchSummary {
    pub processed: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// Recalculates CTC for every active person in ChartHop.
pub async fn batch_calculate_and_update_ctc(charthop: &ChartHopClient, metrics: &mut SyncMetrics) -> CtcBatchSummary {
    let people = match charthop.list_active_people().await {
        Ok(people) => people,
        Err(e) => {
            metrics.record_error("ctc_calc", e.to_string(), "batch".to_string());
            return CtcBatchSummary::default();
        }
    };

    let mut summary = CtcBatchSummary {
        processed: people.len(),
        ..CtcBatchSummary::default()
    };

    for person in &people {
        match calculate_and_update_ctc(charthop, person).await {
            CtcOutcome::Updated { .. } => {
                summary.updated += 1;
                metrics.increment("ctc_calc_updated");
            }
            CtcOutcome::Skipped(_) => {
                summary.skipped += 1;
                metrics.increment("ctc_calc_skipped");
            }
            CtcOutcome::Error(reason) => {
                summary.errors += 1;
                metrics.increment("ctc_calc_errors");
                metrics.record_error("ctc_calc", reason, person.id.clone());
            }
        }
    }
    metrics.record_sync("ctc_calc_batch");
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nomina_adds_forty_percent() {
        assert_eq!(calculate_ctc(100_000.0, &HiringScheme::Nomina), 140_000.0);
    }

    #[test]
    fn ontop_adds_flat_fee() {
        assert_eq!(calculate_ctc(50_000.0, &HiringScheme::Ontop), 50_720.0);
    }

    #[test]
    fn voiz_adds_flat_fee() {
        assert_eq!(calculate_ctc(50_000.0, &HiringScheme::Voiz), 50_240.0);
    }

    #[test]
    fn mixto_externo_uses_minimum_wage_formula() {
        let ctc = calculate_ctc(100_000.0, &HiringScheme::MixtoExterno);
        let two_minimums = two_minimum_wages_annualized_usd();
        let expected = 100_000.0 + two_minimums * 0.40 + (100_000.0 - two_minimums) * 0.02;
        assert!((ctc - (expected * 100.0).round() / 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unrecognized_scheme_falls_back_to_base() {
        assert_eq!(calculate_ctc(10_000.0, &HiringScheme::Other("mystery".to_string())), 10_000.0);
    }

    #[test]
    fn non_positive_base_yields_zero() {
        assert_eq!(calculate_ctc(0.0, &HiringScheme::Nomina), 0.0);
    }
}
