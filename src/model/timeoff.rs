use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Runn time-off category, one per endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeOffCategory {
    Leave,
    Holidays,
    RosteredOff,
}

impl TimeOffCategory {
    /// Precedence order: holiday/feriado/public beats
    /// roster/rostered/floating/lieu beats the `leave` default.
    pub fn classify(text: &str) -> Self {
        let lower = text.to_lowercase();
        if ["holiday", "feriado", "public"]
            .iter()
            .any(|kw| lower.contains(kw))
        {
            Self::Holidays
        } else if ["roster", "rostered", "floating", "lieu"]
            .iter()
            .any(|kw| lower.contains(kw))
        {
            Self::RosteredOff
        } else {
            Self::Leave
        }
    }

    /// Runn v1.0 endpoint path segment this category maps to.
    pub fn endpoint_segment(self) -> &'static str {
        match self {
            Self::Leave => "leave",
            Self::Holidays => "holidays",
            Self::RosteredOff => "rostered-off",
        }
    }
}

/// ChartHop time-off status as reported by the API. Anything not
/// recognized maps to `Other`, which is treated like an approved entry
/// (skip-set membership is checked on the raw lowercase string, not on
/// this enum, so that unanticipated status spellings still match the
/// skip-set by substring).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeOffStatus {
    Approved,
    Active,
    Denied,
    Rejected,
    Cancelled,
    Draft,
    Pending,
    Withdrawn,
    Other(String),
}

/// Statuses that must never produce a downstream create. Checked as a
/// substring match against the lowercased status text the way the source
/// system's integration does, since upstream spells these inconsistently
/// ("canceled" vs "cancelled").
pub const SKIP_STATUS_KEYWORDS: &[&str] = &[
    "denied",
    "rejected",
    "cancelled",
    "canceled",
    "draft",
    "pending",
    "withdrawn",
];

/// A ChartHop time-off entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeOff {
    pub id: String,
    pub person_id: Option<String>,
    pub person_email: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub status: String,
    pub reason: Option<String>,
    #[serde(rename = "type")]
    pub type_field: Option<String>,
    pub policy: Option<String>,
    /// Free-form extra fields, mirroring the upstream `fields` map. Kept as
    /// a bag rather than exploded into named struct fields because the
    /// upstream schema varies per tenant.
    pub fields: HashMap<String, String>,
}

impl TimeOff {
    pub fn should_skip(&self) -> Option<String> {
        let status_lower = self.status.to_lowercase();
        for keyword in SKIP_STATUS_KEYWORDS {
            if status_lower.contains(keyword) {
                return Some(format!("status is {status_lower}"));
            }
        }
        None
    }

    /// Category classification text pool: type, reason, and policy fields,
    /// both at the top level and inside `fields`.
    pub fn classification_text(&self) -> String {
        let mut parts = vec![];
        if let Some(t) = &self.type_field {
            parts.push(t.clone());
        }
        if let Some(r) = &self.reason {
            parts.push(r.clone());
        }
        if let Some(p) = &self.policy {
            parts.push(p.clone());
        }
        if let Some(t) = self.fields.get("type") {
            parts.push(t.clone());
        }
        if let Some(r) = self.fields.get("reason") {
            parts.push(r.clone());
        }
        parts.join(" ")
    }

    /// Builds the provenance note attached to the created Runn entry:
    /// `"ChartHop:<id> • <reason>"`.
    pub fn derive_note(&self) -> String {
        let reason = self
            .reason
            .clone()
            .or_else(|| self.type_field.clone())
            .or_else(|| self.policy.clone())
            .unwrap_or_else(|| "Time Off".to_string());
        format!("ChartHop:{} • {}", self.id, reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(status: &str) -> TimeOff {
        TimeOff {
            id: "to-1".to_string(),
            person_id: None,
            person_email: None,
            start_date: None,
            end_date: None,
            status: status.to_string(),
            reason: None,
            type_field: None,
            policy: None,
            fields: HashMap::new(),
        }
    }

    #[test]
    fn skip_set_matches_substring_case_insensitively() {
        assert!(base("Denied").should_skip().is_some());
        assert!(base("CANCELED").should_skip().is_some());
        assert!(base("pending_manager_approval").should_skip().is_some());
        assert!(base("approved").should_skip().is_none());
    }

    #[test]
    fn category_precedence_holiday_beats_roster() {
        assert_eq!(
            TimeOffCategory::classify("public holiday floating"),
            TimeOffCategory::Holidays
        );
        assert_eq!(
            TimeOffCategory::classify("rostered day off"),
            TimeOffCategory::RosteredOff
        );
        assert_eq!(TimeOffCategory::classify("sick leave"), TimeOffCategory::Leave);
    }

    #[test]
    fn note_format() {
        let mut to = base("approved");
        to.reason = Some("Vacation".to_string());
        assert_eq!(to.derive_note(), "ChartHop:to-1 • Vacation");
    }
}
