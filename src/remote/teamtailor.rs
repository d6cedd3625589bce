use super::transport::Transport;
use crate::config::{RemoteConfig, TeamtailorConfig};
use crate::error::{SyncError, SyncResult};
use crate::model::HireEvent;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Teamtailor (ATS) adapter: fetches a hired application (with its
/// candidate, job, and offer included) and verifies inbound webhook
/// signatures.
pub struct TeamtailorClient {
    transport: Transport<TeamtailorConfig>,
}

impl TeamtailorClient {
    pub fn new(config: TeamtailorConfig) -> Self {
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
            .ok_or_else(|| SyncError::configuration("TEAMTAILOR_API_TOKEN is required"))?;
        super::transport::bearer_headers(token)
    }

    pub async fn fetch_hire_event(&self, application_id: &str) -> SyncResult<HireEvent> {
        let url = format!(
            "{}/job-applications/{application_id}",
            self.transport.config().base_url()
        );
        let headers = self.headers()?;
        let payload: Value = self
            .transport
            .send_json(|| {
                self.transport
                    .client()
                    .get(&url)
                    .headers(headers.clone())
                    .query(&[("include", "candidate,job,offers")])
            })
            .await?;

        parse_hire_event(application_id, &payload)
    }

    /// Verifies an inbound webhook's `Teamtailor-Signature` header against
    /// `resource_id`: the expected value is `base64(hex(HMAC_SHA256(key,
    /// resource_id)))`, compared in constant time as bytes. With no
    /// configured key this always succeeds - signature verification is
    /// opt-in until a key is provisioned.
    pub fn verify_signature(&self, resource_id: &str, provided_header: &str) -> SyncResult<bool> {
        let Some(key) = &self.transport.config().webhook_hmac_key else {
            return Ok(true);
        };
        let mut mac = HmacSha256::new_from_slice(key.as_bytes())
            .map_err(|e| SyncError::configuration(format!("invalid webhook HMAC key: {e}")))?;
        mac.update(resource_id.as_bytes());
        let mac_hex = hex::encode(mac.finalize().into_bytes());
        let expected = base64::engine::general_purpose::STANDARD.encode(mac_hex.as_bytes());

        Ok(bool::from(provided_header.as_bytes().ct_eq(expected.as_bytes())))
    }
}

fn find_included<'a>(included: &'a [Value], type_name: &str) -> Option<&'a Value> {
    included.iter().find(|item| item.get("type").and_then(Value::as_str) == Some(type_name))
}

fn attr_str(attrs: &Value, key: &str) -> Option<String> {
    attrs.get(key).and_then(Value::as_str).map(str::to_string)
}

fn parse_hire_event(application_id: &str, payload: &Value) -> SyncResult<HireEvent> {
    let data = payload.get("data").ok_or_else(|| {
        SyncError::response_parsing("teamtailor", "missing `data` in application response")
    })?;
    let attrs = data.get("attributes").cloned().unwrap_or(Value::Null);
    let status = attr_str(&attrs, "status")
        .or_else(|| attr_str(&attrs, "state"))
        .unwrap_or_default();
    let hired_at = attr_str(&attrs, "hired-at").or_else(|| attr_str(&attrs, "hired_at"));

    let included = payload.get("included").and_then(Value::as_array).cloned().unwrap_or_default();
    let candidate_attrs = find_included(&included, "candidates")
        .and_then(|c| c.get("attributes"))
        .cloned()
        .unwrap_or(Value::Null);
    let job_attrs = find_included(&included, "jobs")
        .and_then(|j| j.get("attributes"))
        .cloned()
        .unwrap_or(Value::Null);

    let mut offer_start_date = None;
    for inc in &included {
        if matches!(inc.get("type").and_then(Value::as_str), Some("job-offers") | Some("offers")) {
            let details = inc
                .get("attributes")
                .and_then(|a| a.get("details"))
                .cloned()
                .unwrap_or(Value::Null);
            let sd = attr_str(&details, "start-date").or_else(|| attr_str(&details, "start_date"));
            if let Some(sd) = sd {
                offer_start_date = Some(sd.chars().take(10).collect());
                break;
            }
        }
    }

    Ok(HireEvent {
        application_id: application_id.to_string(),
        status,
        candidate_first_name: attr_str(&candidate_attrs, "first-name"),
        candidate_last_name: attr_str(&candidate_attrs, "last-name"),
        candidate_personal_email: attr_str(&candidate_attrs, "email"),
        job_title: attr_str(&job_attrs, "title"),
        hired_at,
        offer_start_date,
        attribute_start_date: attr_str(&attrs, "start-date").or_else(|| attr_str(&attrs, "start_date")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_key_configured_always_verifies() {
        let config = TeamtailorConfig::default();
        let client = TeamtailorClient::new(config);
        assert!(client.verify_signature("resource-id", "whatever").unwrap());
    }

    #[test]
    fn wrong_signature_is_rejected() {
        let config = TeamtailorConfig {
            webhook_hmac_key: Some("secret".to_string()),
            ..TeamtailorConfig::default()
        };
        let client = TeamtailorClient::new(config);
        assert!(!client.verify_signature("resource-id", "00").unwrap());
    }

    #[test]
    fn correct_signature_is_accepted() {
        let config = TeamtailorConfig {
            webhook_hmac_key: Some("secret".to_string()),
            ..TeamtailorConfig::default()
        };
        let client = TeamtailorClient::new(config);
        let mut mac = HmacSha256::new_from_slice(b"secret").unwrap();
        mac.update(b"resource-id");
        let mac_hex = hex::encode(mac.finalize().into_bytes());
        let sig = base64::engine::general_purpose::STANDARD.encode(mac_hex.as_bytes());
        assert!(client.verify_signature("resource-id", &sig).unwrap());
    }
}
