use super::transport::Transport;
use crate::config::{ChartHopConfig, RemoteConfig};
use crate::error::{SyncError, SyncResult};
use crate::logging::{log_debug, log_warn};
use crate::model::{HiringScheme, Job, Person, TimeOff};
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// ChartHop (HRIS) adapter. Wraps the `/v2/org/{org}/...` read endpoints
/// and the `/v1/org/{org}/import/csv/data` upsert endpoint, which is how
/// ChartHop accepts writes: a one-row CSV posted as multipart form data.
pub struct ChartHopClient {
    transport: Transport<ChartHopConfig>,
}

const DEFAULT_FIELDS: &str = "person id,name first,name last,preferred name first,preferred name last,\
contact workemail,contact personalemail,homeaddress country,homeaddress city,title,seniority,\
manager contact workemail,start date,end date,employment,employmentType,department,department name,\
gender,jobid,status";

impl ChartHopClient {
    pub fn new(config: ChartHopConfig) -> Self {
        Self {
            transport: Transport::new(config),
        }
    }

    fn headers(&self) -> SyncResult<reqwest::header::HeaderMap> {
        let token = self
            .transport
            .config()
            .api_token
            .as_ref()
            .ok_or_else(|| SyncError::configuration("CHARTHOP_API_TOKEN is required"))?;
        super::transport::bearer_headers(token)
    }

    /// Pages through `/v2/org/{org}/person`, following ChartHop's varied
    /// pagination conventions (a `nextOffset`, a `meta.pagination` block,
    /// or a `links.next` URL) and stopping if an offset repeats - a loop
    /// here would otherwise spin forever against a misbehaving page.
    pub async fn list_active_people(&self) -> SyncResult<Vec<Person>> {
        let org = &self.transport.config().org_id;
        let mut offset: u64 = 0;
        let mut page_size = self.transport.config().default_page_size;
        let min_page_size = self.transport.config().min_page_size;
        let mut seen_offsets = HashSet::new();
        let mut people = Vec::new();

        loop {
            if !seen_offsets.insert(offset) {
                log_warn!(offset, "charthop pagination detected a repeated offset, stopping");
                break;
            }

            let url = format!("{}/v2/org/{}/person", self.transport.config().base_url(), org);
            let payload = self.fetch_people_page(&url, offset, &mut page_size, min_page_size).await?;

            let data = payload.get("data").cloned().unwrap_or(Value::Null);
            let items: Vec<Value> = match data {
                Value::Array(items) => items,
                Value::Null => Vec::new(),
                other => vec![other],
            };
            if items.is_empty() {
                break;
            }

            let data_len = items.len() as u64;
            for item in items {
                if let Some(person) = parse_person(&item) {
                    if is_active(&item) {
                        people.push(person);
                    }
                }
            }

            let next_offset = resolve_next_offset(&payload, offset, page_size as u64, data_len);
            match next_offset {
                Some(next) if next != offset => offset = next,
                _ => break,
            }
        }

        log_debug!(count = people.len(), "fetched active people from charthop");
        Ok(people)
    }

    /// Fetches one page of `/person`, degrading `page_size` in place and
    /// retrying the same offset when ChartHop rejects the page as too
    /// large. A persistent 4xx that isn't about page size still aborts
    /// the whole listing.
    async fn fetch_people_page(&self, url: &str, offset: u64, page_size: &mut u32, min_page_size: u32) -> SyncResult<Value> {
        loop {
            let headers = self.headers()?;
            let response = self
                .transport
                .client()
                .get(url)
                .headers(headers)
                .query(&[
                    ("fields", DEFAULT_FIELDS),
                    ("limit", &page_size.to_string()),
                    ("offset", &offset.to_string()),
                ])
                .send()
                .await
                .map_err(|e| SyncError::request_failed("charthop", format!("people listing failed: {e}"), Some(Box::new(e))))?;

            let status = response.status();
            if status.is_success() {
                return response
                    .json()
                    .await
                    .map_err(|e| SyncError::response_parsing("charthop", format!("people listing body: {e}")));
            }

            if status.is_client_error() && status.as_u16() != 408 && status.as_u16() != 429 && *page_size > min_page_size {
                let body = response.text().await.unwrap_or_default();
                let lowered = body.to_lowercase();
                if ["limit", "page size", "page_size"].iter().any(|kw| lowered.contains(kw)) {
                    let degraded = (*page_size / 2).max(min_page_size);
                    log_warn!(
                        old_page_size = *page_size,
                        new_page_size = degraded,
                        offset,
                        "charthop rejected page size, retrying same page smaller"
                    );
                    *page_size = degraded;
                    continue;
                }
                return Err(SyncError::request_failed("charthop", format!("people listing returned {status}: {body}"), None));
            }

            return Err(SyncError::request_failed("charthop", format!("people listing returned {status}"), None));
        }
    }

    pub async fn fetch_timeoff(&self, start: NaiveDate, end: NaiveDate) -> SyncResult<Vec<TimeOff>> {
        let org = &self.transport.config().org_id;
        let url = format!("{}/v2/org/{}/timeoff", self.transport.config().base_url(), org);
        let headers = self.headers()?;
        let payload: Value = self
            .transport
            .send_json(|| {
                self.transport
                    .client()
                    .get(&url)
                    .headers(headers.clone())
                    .query(&[
                        ("startDate", start.to_string()),
                        ("endDate", end.to_string()),
                        (
                            "fields",
                            "person id,person contact workemail,start date,end date,type,reason,status,policy"
                                .to_string(),
                        ),
                    ])
            })
            .await?;

        let data = payload.get("data").cloned().unwrap_or(Value::Null);
        let items: Vec<Value> = match data {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => vec![other],
        };
        Ok(items.iter().filter_map(parse_timeoff).collect())
    }

    /// Looks up a single time-off entry by id, for a worker task that only
    /// carries the entity id from a webhook event.
    pub async fn find_timeoff(&self, timeoff_id: &str) -> SyncResult<Option<TimeOff>> {
        let org = &self.transport.config().org_id;
        let url = format!(
            "{}/v2/org/{}/timeoff/{}",
            self.transport.config().base_url(),
            org,
            timeoff_id
        );
        let headers = self.headers()?;
        let response = self
            .transport
            .client()
            .get(&url)
            .headers(headers)
            .query(&[(
                "fields",
                "person id,person contact workemail,start date,end date,type,reason,status,policy",
            )])
            .send()
            .await
            .map_err(|e| SyncError::request_failed("charthop", format!("timeoff lookup failed: {e}"), Some(Box::new(e))))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(SyncError::request_failed(
                "charthop",
                format!("timeoff lookup returned {}", response.status()),
                None,
            ));
        }
        let payload: Value = response
            .json()
            .await
            .map_err(|e| SyncError::response_parsing("charthop", format!("timeoff lookup body: {e}")))?;
        let item = payload.get("data").cloned().unwrap_or(payload);
        Ok(parse_timeoff(&item))
    }

    /// Looks up a single person by ChartHop id, for the cases where a
    /// webhook or time-off entry only carries a person id and no email.
    pub async fn find_person(&self, person_id: &str) -> SyncResult<Option<Person>> {
        let org = &self.transport.config().org_id;
        let url = format!(
            "{}/v2/org/{}/person/{}",
            self.transport.config().base_url(),
            org,
            person_id
        );
        let headers = self.headers()?;
        let response = self
            .transport
            .client()
            .get(&url)
            .headers(headers)
            .query(&[("fields", DEFAULT_FIELDS)])
            .send()
            .await
            .map_err(|e| SyncError::request_failed("charthop", format!("person lookup failed: {e}"), Some(Box::new(e))))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(SyncError::request_failed(
                "charthop",
                format!("person lookup returned {}", response.status()),
                None,
            ));
        }
        let payload: Value = response
            .json()
            .await
            .map_err(|e| SyncError::response_parsing("charthop", format!("person lookup body: {e}")))?;
        let item = payload.get("data").cloned().unwrap_or(payload);
        Ok(parse_person(&item))
    }

    /// The `End Date Org` field used to backfill a termination row when a
    /// person vanishes from the active roster without one already present.
    pub async fn end_date_org(&self, person_id: &str) -> SyncResult<Option<String>> {
        let person = self.find_person(person_id).await?;
        Ok(person.and_then(|p| p.end_date))
    }

    pub async fn find_job(&self, job_id: &str) -> SyncResult<Option<Job>> {
        let org = &self.transport.config().org_id;
        let url = format!("{}/v2/org/{}/job", self.transport.config().base_url(), org);
        let headers = self.headers()?;
        let payload: Value = self
            .transport
            .send_json(|| {
                self.transport
                    .client()
                    .get(&url)
                    .headers(headers.clone())
                    .query(&[
                        ("q", format!("jobid\\{job_id}")),
                        ("fields", "title,department name,location name,open,basecomp,currency,employment".to_string()),
                    ])
            })
            .await?;
        let data = payload.get("data").and_then(Value::as_array).cloned().unwrap_or_default();
        Ok(data.first().and_then(parse_job))
    }

    /// Writes a single job field via the CSV upsert endpoint. Used to
    /// write the computed CTC back to a job's `ctc` custom field. CTC is
    /// always written in USD regardless of the job's base currency, so
    /// `currency` rides along on every write rather than being left to
    /// whatever the job already has on file.
    pub async fn upsert_job_ctc(&self, job_id: &str, ctc: f64) -> SyncResult<()> {
        let org = &self.transport.config().org_id;
        let url = format!(
            "{}/v1/org/{}/import/csv/data",
            self.transport.config().base_url(),
            org
        );
        let csv_body = format!("job id,ctc,currency\n{job_id},{ctc:.2},USD\n");
        let headers = self.headers()?;
        let _: Value = self
            .transport
            .send_json(|| {
                let part = reqwest::multipart::Part::text(csv_body.clone()).file_name("jobs.csv");
                let form = reqwest::multipart::Form::new().part("file", part);
                self.transport
                    .client()
                    .post(&url)
                    .headers(headers.clone())
                    .query(&[("upsert", "true")])
                    .multipart(form)
            })
            .await?;
        Ok(())
    }

    /// Imports one or more people rows. `rows` is a list of column-name to
    /// value maps, matching ChartHop's free-form import schema.
    pub async fn import_people_csv(&self, rows: &[HashMap<String, String>]) -> SyncResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let org = &self.transport.config().org_id;
        let url = format!(
            "{}/v1/org/{}/import/csv/data",
            self.transport.config().base_url(),
            org
        );
        let csv_body = rows_to_csv(rows);
        let headers = self.headers()?;
        let _: Value = self
            .transport
            .send_json(|| {
                let part = reqwest::multipart::Part::text(csv_body.clone()).file_name("people.csv");
                let form = reqwest::multipart::Form::new().part("file", part);
                self.transport
                    .client()
                    .post(&url)
                    .headers(headers.clone())
                    .query(&[("upsert", "true"), ("creategroups", "true")])
                    .multipart(form)
            })
            .await?;
        Ok(())
    }

    pub async fn email_exists(&self, email: &str) -> SyncResult<bool> {
        if email.is_empty() {
            return Ok(false);
        }
        let org = &self.transport.config().org_id;
        let url = format!("{}/v2/org/{}/person", self.transport.config().base_url(), org);
        let headers = self.headers()?;
        let payload: Value = self
            .transport
            .send_json(|| {
                self.transport
                    .client()
                    .get(&url)
                    .headers(headers.clone())
                    .query(&[
                        ("q", format!("contact workemail\\{email}")),
                        ("fields", "contact workemail".to_string()),
                    ])
            })
            .await?;
        let lower = email.trim().to_lowercase();
        let found = payload
            .get("data")
            .and_then(Value::as_array)
            .map(|items| {
                items.iter().any(|item| {
                    item.get("fields")
                        .and_then(|f| f.get("contact workemail"))
                        .and_then(Value::as_str)
                        .map(|s| s.trim().to_lowercase() == lower)
                        .unwrap_or(false)
                })
            })
            .unwrap_or(false);
        Ok(found)
    }

    /// Generates `first+last@domain`, disambiguating with a numeric
    /// suffix (2..999) the first time that address already exists.
    pub async fn generate_unique_work_email(
        &self,
        first: &str,
        last: &str,
        domain: &str,
    ) -> SyncResult<Option<String>> {
        if domain.is_empty() {
            return Ok(None);
        }
        let base_local = format!(
            "{}{}",
            strip_accents_and_non_alnum(first),
            strip_accents_and_non_alnum(last)
        );
        if base_local.is_empty() {
            return Ok(None);
        }
        let candidate = format!("{base_local}@{domain}");
        if !self.email_exists(&candidate).await? {
            return Ok(Some(candidate));
        }
        for i in 2..999 {
            let candidate = format!("{base_local}{i}@{domain}");
            if !self.email_exists(&candidate).await? {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }
}

/// Strips diacritics and non-alphanumeric characters, lowercasing the
/// result, for deriving a work-email local part from a legal name.
pub fn strip_accents_and_non_alnum(s: &str) -> String {
    s.chars()
        .map(strip_accent)
        .filter(|c| c.is_ascii_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

fn strip_accent(c: char) -> char {
    match c.to_ascii_lowercase() {
        'á' | 'à' | 'ä' | 'â' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        other => other,
    }
}

fn is_active(item: &Value) -> bool {
    let status = item
        .get("fields")
        .and_then(|f| f.get("status"))
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim()
        .to_lowercase();
    status.is_empty() || matches!(status.as_str(), "active" | "current" | "enabled")
}

fn field_str(fields: &Value, key: &str) -> Option<String> {
    fields.get(key).and_then(Value::as_str).map(str::to_string).filter(|s| !s.is_empty())
}

fn parse_person(item: &Value) -> Option<Person> {
    let id = item.get("id").and_then(Value::as_str)?.to_string();
    let fields = item.get("fields").cloned().unwrap_or(Value::Null);
    let hiring_scheme_raw = field_str(&fields, "esquema_contratacion")
        .or_else(|| field_str(&fields, "hiring scheme"));
    Some(Person {
        id,
        work_email: field_str(&fields, "contact workemail"),
        personal_email: field_str(&fields, "contact personalemail"),
        legal_first_name: field_str(&fields, "name first"),
        legal_last_name: field_str(&fields, "name last"),
        preferred_first_name: field_str(&fields, "preferred name first"),
        preferred_last_name: field_str(&fields, "preferred name last"),
        country: field_str(&fields, "homeaddress country"),
        city: field_str(&fields, "homeaddress city"),
        title: field_str(&fields, "title"),
        seniority: field_str(&fields, "seniority"),
        manager_work_email: field_str(&fields, "manager contact workemail"),
        start_date: field_str(&fields, "start date"),
        end_date: field_str(&fields, "end date"),
        employment_type: field_str(&fields, "employmentType").or_else(|| field_str(&fields, "employment")),
        job_id: field_str(&fields, "jobid"),
        department: field_str(&fields, "department").or_else(|| field_str(&fields, "department name")),
        gender: field_str(&fields, "gender"),
        cost_to_company: fields.get("ctc").and_then(Value::as_f64),
        currency: field_str(&fields, "currency"),
        hiring_scheme: hiring_scheme_raw.map(|s| HiringScheme::parse(&s)),
    })
}

fn parse_job(item: &Value) -> Option<Job> {
    let id = item.get("id").and_then(Value::as_str)?.to_string();
    let fields = item.get("fields").cloned().unwrap_or(Value::Null);
    Some(Job {
        id,
        title: field_str(&fields, "title"),
        is_open: fields.get("open").and_then(Value::as_bool).unwrap_or(true),
        base_compensation: fields.get("basecomp").and_then(Value::as_f64),
        currency: field_str(&fields, "currency"),
        ctc: fields.get("ctc").and_then(Value::as_f64),
        employment: field_str(&fields, "employment"),
    })
}

fn parse_timeoff(item: &Value) -> Option<TimeOff> {
    let id = item.get("id").and_then(Value::as_str)?.to_string();
    let fields = item.get("fields").cloned().unwrap_or(Value::Null);
    let mut extra = HashMap::new();
    if let Some(t) = field_str(&fields, "type") {
        extra.insert("type".to_string(), t);
    }
    if let Some(r) = field_str(&fields, "reason") {
        extra.insert("reason".to_string(), r);
    }
    Some(TimeOff {
        id,
        person_id: field_str(&fields, "person id"),
        person_email: field_str(&fields, "person contact workemail"),
        start_date: field_str(&fields, "start date"),
        end_date: field_str(&fields, "end date"),
        status: field_str(&fields, "status").unwrap_or_default(),
        reason: field_str(&fields, "reason"),
        type_field: field_str(&fields, "type"),
        policy: field_str(&fields, "policy"),
        fields: extra,
    })
}

fn resolve_next_offset(payload: &Value, current_offset: u64, page_size: u64, data_len: u64) -> Option<u64> {
    if let Some(next) = payload.get("nextOffset").and_then(Value::as_u64) {
        return Some(next);
    }
    if let Some(meta) = payload.get("meta") {
        if let Some(next) = meta.get("nextOffset").and_then(Value::as_u64) {
            return Some(next);
        }
        if let Some(pagination) = meta.get("pagination") {
            if let Some(next) = pagination.get("nextOffset").and_then(Value::as_u64) {
                return Some(next);
            }
            if let Some(has_more) = pagination.get("hasMore").and_then(Value::as_bool) {
                if !has_more {
                    return None;
                }
            }
        }
    }
    if data_len < page_size {
        return None;
    }
    Some(current_offset + data_len)
}

fn rows_to_csv(rows: &[HashMap<String, String>]) -> String {
    let mut columns: Vec<&String> = Vec::new();
    let mut seen = HashSet::new();
    for row in rows {
        for key in row.keys() {
            if seen.insert(key) {
                columns.push(key);
            }
        }
    }
    let mut out = String::new();
    out.push_str(&columns.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(","));
    out.push('\n');
    for row in rows {
        let line = columns
            .iter()
            .map(|c| row.get(*c).cloned().unwrap_or_default())
            .collect::<Vec<_>>()
            .join(",");
        out.push_str(&line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_accents_lowercases_and_drops_punctuation() {
        assert_eq!(strip_accents_and_non_alnum("María José"), "mariajose");
        assert_eq!(strip_accents_and_non_alnum("O'Brien-Núñez"), "obriennunez");
    }

    #[test]
    fn resolve_next_offset_stops_on_short_page() {
        let payload = serde_json::json!({});
        assert_eq!(resolve_next_offset(&payload, 0, 200, 50), None);
    }

    #[test]
    fn resolve_next_offset_advances_on_full_page() {
        let payload = serde_json::json!({});
        assert_eq!(resolve_next_offset(&payload, 0, 200, 200), Some(200));
    }

    #[test]
    fn resolve_next_offset_honors_has_more_false() {
        let payload = serde_json::json!({"meta": {"pagination": {"hasMore": false}}});
        assert_eq!(resolve_next_offset(&payload, 0, 200, 200), None);
    }

    #[test]
    fn rows_to_csv_unions_columns_across_rows() {
        let mut a = HashMap::new();
        a.insert("first name".to_string(), "Ann".to_string());
        let mut b = HashMap::new();
        b.insert("last name".to_string(), "Lee".to_string());
        let csv = rows_to_csv(&[a, b]);
        assert!(csv.starts_with("first name,last name\n"));
    }
}
