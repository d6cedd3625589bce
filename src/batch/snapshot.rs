//! Culture Amp roster export. Builds the CSV from active ChartHop
//! people and ships it over SFTP, either as a full snapshot every run or
//! as a delta against the last persisted manifest.

use crate::config::{ExportMode, SftpConfig};
use crate::error::{SyncError, SyncResult};
use crate::logging::log_info;
use crate::model::{Person, SnapshotManifest, SnapshotRow};
use crate::remote::{upload_csv, ChartHopClient};
use crate::state::StateStore;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct SnapshotExportSummary {
    pub rows_sent: usize,
    pub skipped: bool,
}

/// Work email (lowercased) to display name, so a report's manager row
/// can carry the manager's name alongside their email without a second
/// HRIS round trip per person.
fn manager_directory(people: &[Person]) -> HashMap<String, String> {
    people
        .iter()
        .filter_map(|p| {
            let email = p.work_email.as_deref()?.trim().to_lowercase();
            if email.is_empty() {
                return None;
            }
            let name = p.display_name().unwrap_or_else(|| email.clone());
            Some((email, name))
        })
        .collect()
}

/// Turns a person into a snapshot row, or `None` if they have no work
/// email: Culture Amp is addressed by corporate email, same filter the
/// roster export has always applied upstream of the row shape.
fn to_row(person: &Person, managers: &HashMap<String, String>) -> Option<(SnapshotRow, String)> {
    let email = person.work_email.as_deref()?.trim();
    if email.is_empty() {
        return None;
    }

    let preferred = person
        .preferred_first_name
        .as_deref()
        .unwrap_or("")
        .trim()
        .to_string();
    let name = person
        .display_name()
        .unwrap_or_else(|| email.to_string());
    let manager_email = person.manager_work_email.clone().unwrap_or_default();
    let manager = managers
        .get(&manager_email.trim().to_lowercase())
        .cloned()
        .unwrap_or_default();

    let row = SnapshotRow {
        employee_id: person.id.clone(),
        email: email.to_string(),
        name,
        preferred_name: preferred,
        manager_email,
        manager,
        location: person.city.clone().unwrap_or_default(),
        job_title: person.title.clone().unwrap_or_default(),
        seniority: person.seniority.clone().unwrap_or_default(),
        start_date: normalize_date(person.start_date.as_deref()),
        end_date: normalize_date(person.end_date.as_deref()),
        department: person.department.clone().unwrap_or_default(),
        country: person.country.clone().unwrap_or_default(),
        employment_type: person.employment_type.clone().unwrap_or_default(),
        gender: person.gender.clone().unwrap_or_default(),
    };
    Some((row, person.id.clone()))
}

fn normalize_date(raw: Option<&str>) -> String {
    raw.map(|d| d.trim())
        .filter(|d| !d.is_empty())
        .map(|d| d.chars().take(10).collect())
        .unwrap_or_default()
}

fn build_csv(rows: &[SnapshotRow]) -> String {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(crate::model::SNAPSHOT_COLUMNS).ok();
    for row in rows {
        wtr.write_record(row.to_csv_record()).ok();
    }
    let bytes = wtr.into_inner().unwrap_or_default();
    String::from_utf8(bytes).unwrap_or_default()
}

async fn upload(sftp: &SftpConfig, csv_text: String) -> SyncResult<()> {
    let sftp = sftp.clone();
    tokio::task::spawn_blocking(move || upload_csv(&sftp, &csv_text))
        .await
        .map_err(|e| SyncError::sftp(format!("sftp upload task panicked: {e}")))?
}

/// Full export: every active person, every run, no manifest comparison.
/// Still rewrites the manifest afterward so a later switch to delta mode
/// has a baseline to diff against.
async fn full_export(
    charthop: &ChartHopClient,
    store: &StateStore,
    sftp: &SftpConfig,
) -> SyncResult<SnapshotExportSummary> {
    let people = charthop.list_active_people().await?;
    let managers = manager_directory(&people);
    let current: Vec<(SnapshotRow, String)> = people.iter().filter_map(|p| to_row(p, &managers)).collect();
    if current.is_empty() {
        return Err(SyncError::warehouse("culture_amp", "no rows to export"));
    }

    let rows: Vec<SnapshotRow> = current.iter().map(|(r, _)| r.clone()).collect();
    upload(sftp, build_csv(&rows)).await?;

    let (_, next) = SnapshotManifest::empty().diff(&current);
    next.save(store).await?;

    log_info!(rows = rows.len(), "culture amp full export uploaded");
    Ok(SnapshotExportSummary {
        rows_sent: rows.len(),
        skipped: false,
    })
}

/// Delta export: only new, changed, or terminated rows since the last
/// persisted manifest. A termination with a prior `End Date` is resent
/// as-is; one discovered only now is backfilled via ChartHop's
/// `endDateOrg` lookup before being sent.
async fn delta_export(
    charthop: &ChartHopClient,
    store: &StateStore,
    sftp: &SftpConfig,
) -> SyncResult<SnapshotExportSummary> {
    let previous = SnapshotManifest::load(store).await?;
    let people = charthop.list_active_people().await?;
    let managers = manager_directory(&people);
    let current: Vec<(SnapshotRow, String)> = people.iter().filter_map(|p| to_row(p, &managers)).collect();

    let (delta, next) = previous.diff(&current);
    let mut to_send: Vec<SnapshotRow> = Vec::new();
    to_send.extend(delta.added);
    to_send.extend(delta.changed);

    for employee_id in &delta.removed {
        let Some(entry) = previous.entries.get(employee_id) else {
            continue;
        };
        let mut row = entry.last_row.clone();
        if !row.end_date.trim().is_empty() {
            to_send.push(row);
            continue;
        }

        let ch_person_id = entry.hris_person_id.trim();
        if ch_person_id.is_empty() {
            continue;
        }
        match charthop.end_date_org(ch_person_id).await {
            Ok(Some(end_date)) if !end_date.trim().is_empty() => {
                row.end_date = end_date.trim().chars().take(10).collect();
                to_send.push(row);
            }
            Ok(_) => {}
            Err(e) => {
                log_info!(person_id = ch_person_id, error = %e, "end date lookup failed, will retry next run");
            }
        }
    }

    next.save(store).await?;

    if to_send.is_empty() {
        return Ok(SnapshotExportSummary {
            rows_sent: 0,
            skipped: true,
        });
    }

    upload(sftp, build_csv(&to_send)).await?;
    log_info!(rows = to_send.len(), "culture amp delta export uploaded");
    Ok(SnapshotExportSummary {
        rows_sent: to_send.len(),
        skipped: false,
    })
}

pub async fn export_snapshot(
    charthop: &ChartHopClient,
    store: &StateStore,
    sftp: &SftpConfig,
    mode: ExportMode,
) -> SyncResult<SnapshotExportSummary> {
    match mode {
        ExportMode::Full => full_export(charthop, store, sftp).await,
        ExportMode::Delta => delta_export(charthop, store, sftp).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(id: &str, email: &str) -> Person {
        Person {
            id: id.to_string(),
            work_email: Some(email.to_string()),
            personal_email: None,
            legal_first_name: Some("Ada".to_string()),
            legal_last_name: Some("Lovelace".to_string()),
            preferred_first_name: None,
            preferred_last_name: None,
            country: Some("AR".to_string()),
            city: Some("Buenos Aires".to_string()),
            title: Some("Engineer".to_string()),
            seniority: None,
            manager_work_email: None,
            start_date: Some("2024-01-01T00:00:00Z".to_string()),
            end_date: None,
            employment_type: Some("employee".to_string()),
            job_id: None,
            department: Some("Eng".to_string()),
            gender: None,
            cost_to_company: None,
            currency: None,
            hiring_scheme: None,
        }
    }

    #[test]
    fn rows_without_work_email_are_dropped() {
        let mut p = person("p1", "a@x.com");
        p.work_email = None;
        assert!(to_row(&p, &HashMap::new()).is_none());
    }

    #[test]
    fn dates_are_truncated_to_ten_characters() {
        let p = person("p1", "a@x.com");
        let (row, _) = to_row(&p, &HashMap::new()).unwrap();
        assert_eq!(row.start_date, "2024-01-01");
    }

    #[test]
    fn csv_output_has_header_and_one_row_per_person() {
        let p = person("p1", "a@x.com");
        let (row, _) = to_row(&p, &HashMap::new()).unwrap();
        let csv_text = build_csv(&[row]);
        assert_eq!(csv_text.lines().count(), 2);
        assert!(csv_text.starts_with("Employee Id,"));
    }

    #[test]
    fn manager_name_is_resolved_from_the_directory() {
        let mut report = person("p2", "report@x.com");
        report.manager_work_email = Some("Boss@X.com".to_string());
        let boss = person("p1", "boss@x.com");

        let managers = manager_directory(&[boss, report.clone()]);
        let (row, _) = to_row(&report, &managers).unwrap();

        assert_eq!(row.manager, "Ada Lovelace");
        assert_eq!(row.manager_email, "Boss@X.com");
    }

    #[test]
    fn gender_carries_through_to_the_row() {
        let mut p = person("p1", "a@x.com");
        p.gender = Some("Non-binary".to_string());
        let (row, _) = to_row(&p, &HashMap::new()).unwrap();
        assert_eq!(row.gender, "Non-binary");
    }
}
