use super::transport::Transport;
use crate::config::{RemoteConfig, RunnConfig};
use crate::error::{SyncError, SyncResult};
use crate::internals::cache::TtlCache;
use crate::internals::ratelimit::TokenBucket;
use crate::model::TimeOffCategory;
use serde_json::{json, Value};

/// A resource-planner person, as far as this process needs to know it.
#[derive(Debug, Clone)]
pub struct RunnPerson {
    pub id: u64,
    pub email: String,
    pub name: String,
}

/// An active Runn contract, as far as the compensation reconciler needs
/// to know it.
#[derive(Debug, Clone)]
pub struct RunnContract {
    pub id: u64,
    pub cost_per_hour: Option<f64>,
}

/// Runn (resource-planning) adapter. Every call passes through the
/// shared token bucket before hitting the network, since Runn enforces a
/// hard per-minute request cap at the account level.
pub struct RunnClient {
    transport: Transport<RunnConfig>,
    rate_limiter: TokenBucket,
    person_by_email: TtlCache<String, RunnPerson>,
}

impl RunnClient {
    pub fn new(config: RunnConfig) -> Self {
        let rate_limiter = TokenBucket::new(config.rate_limit_requests, config.rate_limit_window);
        let person_cache_ttl = config.person_cache_ttl;
        Self {
            transport: Transport::new(config),
            rate_limiter,
            person_by_email: TtlCache::new(person_cache_ttl),
        }
    }

    fn headers(&self) -> SyncResult<reqwest::header::HeaderMap> {
        let token = self
            .transport
            .config()
            .api_token
            .as_ref()
            .ok_or_else(|| SyncError::configuration("RUNN_API_TOKEN is required"))?;
        let mut headers = super::transport::bearer_headers(token)?;
        headers.insert(
            "Accept-Version",
            reqwest::header::HeaderValue::from_static("1.0.0"),
        );
        Ok(headers)
    }

    pub async fn list_people(&self) -> SyncResult<Vec<RunnPerson>> {
        self.rate_limiter.wait_if_needed().await;
        let url = format!("{}/people/", self.transport.config().base_url());
        let headers = self.headers()?;
        let payload: Value = self
            .transport
            .send_json(|| self.transport.client().get(&url).headers(headers.clone()))
            .await?;
        let items = payload.as_array().cloned().unwrap_or_default();
        Ok(items.iter().filter_map(parse_runn_person).collect())
    }

    /// Looks up a person by email, case-insensitively, caching hits for
    /// the configured TTL so a burst of time-off events for the same
    /// person doesn't re-list the whole roster each time.
    pub async fn find_person_by_email(&self, email: &str) -> SyncResult<Option<RunnPerson>> {
        let key = email.trim().to_lowercase();
        if key.is_empty() {
            return Ok(None);
        }
        if let Some(cached) = self.person_by_email.get(&key) {
            return Ok(Some(cached));
        }
        for person in self.list_people().await? {
            if person.email.trim().to_lowercase() == key {
                self.person_by_email.put(key, person.clone());
                return Ok(Some(person));
            }
        }
        Ok(None)
    }

    pub async fn upsert_person(
        &self,
        name: &str,
        email: &str,
        employment_type: &str,
        starts_at: Option<&str>,
    ) -> SyncResult<Option<u64>> {
        self.rate_limiter.wait_if_needed().await;
        let url = format!("{}/people/", self.transport.config().base_url());
        let headers = self.headers()?;
        let mut body = json!({
            "name": if name.is_empty() { email } else { name },
            "email": email,
            "employmentType": employment_type,
        });
        if let Some(starts_at) = starts_at {
            body["startsAt"] = json!(starts_at);
        }
        let payload: Value = self
            .transport
            .send_json(|| {
                self.transport
                    .client()
                    .post(&url)
                    .headers(headers.clone())
                    .json(&body)
            })
            .await?;
        Ok(payload.get("id").and_then(Value::as_u64))
    }

    pub async fn create_timeoff(
        &self,
        person_id: u64,
        start_date: &str,
        end_date: &str,
        minutes_per_day: u32,
        note: &str,
        category: TimeOffCategory,
    ) -> SyncResult<u64> {
        self.rate_limiter.wait_if_needed().await;
        let url = format!(
            "{}/time-offs/{}/",
            self.transport.config().base_url(),
            category.endpoint_segment()
        );
        let headers = self.headers()?;
        let body = json!({
            "personId": person_id,
            "startDate": start_date,
            "endDate": end_date,
            "minutesPerDay": minutes_per_day,
            "note": note,
        });
        let payload: Value = self
            .transport
            .send_json(|| {
                self.transport
                    .client()
                    .post(&url)
                    .headers(headers.clone())
                    .json(&body)
            })
            .await?;
        payload
            .get("id")
            .and_then(Value::as_u64)
            .ok_or_else(|| SyncError::response_parsing("runn", "time-off create response missing id"))
    }

    pub async fn update_timeoff(
        &self,
        runn_id: u64,
        category: TimeOffCategory,
        start_date: &str,
        end_date: &str,
    ) -> SyncResult<()> {
        self.rate_limiter.wait_if_needed().await;
        let url = format!(
            "{}/time-offs/{}/{}",
            self.transport.config().base_url(),
            category.endpoint_segment(),
            runn_id
        );
        let headers = self.headers()?;
        let body = json!({ "startDate": start_date, "endDate": end_date });
        let _: Value = self
            .transport
            .send_json(|| {
                self.transport
                    .client()
                    .put(&url)
                    .headers(headers.clone())
                    .json(&body)
            })
            .await?;
        Ok(())
    }

    /// Lists a person's existing time-offs in the given category, used
    /// only to log an overlap rather than to dedupe - Runn v1.0 merges
    /// overlapping periods automatically on create.
    pub async fn list_person_timeoffs(&self, person_id: u64, category: TimeOffCategory) -> SyncResult<Vec<Value>> {
        self.rate_limiter.wait_if_needed().await;
        let url = format!(
            "{}/time-offs/{}/",
            self.transport.config().base_url(),
            category.endpoint_segment()
        );
        let headers = self.headers()?;
        let payload: Value = self
            .transport
            .send_json(|| {
                self.transport
                    .client()
                    .get(&url)
                    .headers(headers.clone())
                    .query(&[("personId", person_id.to_string())])
            })
            .await?;
        Ok(payload.as_array().cloned().unwrap_or_default())
    }

    /// Generic paginated fetch for the warehouse mirror, which walks
    /// every collection Runn exposes rather than the few this adapter has
    /// typed accessors for. `single_object` is for endpoints like `/me`
    /// that return one object rather than a page: the result is wrapped
    /// in a one-element list instead of paginated.
    pub async fn fetch_collection(&self, path: &str, params: &[(&str, String)], single_object: bool) -> SyncResult<Vec<Value>> {
        self.rate_limiter.wait_if_needed().await;
        let url = format!("{}{}", self.transport.config().base_url(), path);
        let headers = self.headers()?;

        if single_object {
            let query: Vec<(String, String)> = params.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
            let payload: Value = self
                .transport
                .send_json(|| self.transport.client().get(&url).headers(headers.clone()).query(&query))
                .await?;
            return Ok(vec![payload]);
        }

        let mut out = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut query: Vec<(String, String)> = params.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
            query.push(("limit".to_string(), "200".to_string()));
            if let Some(c) = &cursor {
                query.push(("cursor".to_string(), c.clone()));
            }
            let payload: Value = self
                .transport
                .send_json(|| self.transport.client().get(&url).headers(headers.clone()).query(&query))
                .await?;
            let values = match payload.get("values") {
                Some(Value::Array(items)) => items.clone(),
                _ if payload.is_array() => payload.as_array().cloned().unwrap_or_default(),
                _ => Vec::new(),
            };
            out.extend(values);
            cursor = payload.get("nextCursor").and_then(Value::as_str).map(str::to_string);
            if cursor.is_none() {
                break;
            }
            self.rate_limiter.wait_if_needed().await;
        }
        Ok(out)
    }

    /// Lists a person's contracts that are active as of `reference_date`
    /// (an ISO date, or today when omitted).
    pub async fn active_contracts(&self, person_id: u64, reference_date: Option<&str>) -> SyncResult<Vec<RunnContract>> {
        self.rate_limiter.wait_if_needed().await;
        let url = format!("{}/contracts/", self.transport.config().base_url());
        let headers = self.headers()?;
        let mut query = vec![("personId".to_string(), person_id.to_string())];
        if let Some(date) = reference_date {
            query.push(("activeOn".to_string(), date.to_string()));
        }
        let payload: Value = self
            .transport
            .send_json(|| {
                self.transport
                    .client()
                    .get(&url)
                    .headers(headers.clone())
                    .query(&query)
            })
            .await?;
        let items = payload.as_array().cloned().unwrap_or_default();
        Ok(items
            .iter()
            .filter_map(|item| {
                Some(RunnContract {
                    id: item.get("id").and_then(Value::as_u64)?,
                    cost_per_hour: item.get("costPerHour").and_then(Value::as_f64),
                })
            })
            .collect())
    }

    /// Updates a contract's hourly cost, skipped by the caller when the
    /// existing value is already within a cent of the target.
    pub async fn update_contract_cost(&self, contract_id: u64, cost_per_hour: f64) -> SyncResult<()> {
        self.rate_limiter.wait_if_needed().await;
        let url = format!("{}/contracts/{contract_id}", self.transport.config().base_url());
        let headers = self.headers()?;
        let body = json!({ "costPerHour": cost_per_hour });
        let _: Value = self
            .transport
            .send_json(|| {
                self.transport
                    .client()
                    .put(&url)
                    .headers(headers.clone())
                    .json(&body)
            })
            .await?;
        Ok(())
    }

    pub async fn delete_timeoff(&self, runn_id: u64, category: TimeOffCategory) -> SyncResult<()> {
        self.rate_limiter.wait_if_needed().await;
        let url = format!(
            "{}/time-offs/{}/{}",
            self.transport.config().base_url(),
            category.endpoint_segment(),
            runn_id
        );
        let headers = self.headers()?;
        let _: Value = self
            .transport
            .send_json(|| {
                self.transport
                    .client()
                    .delete(&url)
                    .headers(headers.clone())
            })
            .await
            .or_else(|e| {
                // A 404 on delete means the row is already gone; treat as success.
                if matches!(&e, SyncError::RequestFailed { message, .. } if message.contains("404")) {
                    Ok(Value::Null)
                } else {
                    Err(e)
                }
            })?;
        Ok(())
    }
}

fn parse_runn_person(item: &Value) -> Option<RunnPerson> {
    Some(RunnPerson {
        id: item.get("id").and_then(Value::as_u64)?,
        email: item.get("email").and_then(Value::as_str)?.to_string(),
        name: item.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
    })
}
