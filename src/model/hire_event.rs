use serde::{Deserialize, Serialize};

/// A Teamtailor hire event, derived from `GET application?include=candidate,job,offers`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HireEvent {
    pub application_id: String,
    pub status: String,
    pub candidate_first_name: Option<String>,
    pub candidate_last_name: Option<String>,
    pub candidate_personal_email: Option<String>,
    pub job_title: Option<String>,
    pub hired_at: Option<String>,
    pub offer_start_date: Option<String>,
    pub attribute_start_date: Option<String>,
}

impl HireEvent {
    pub fn is_hired(&self) -> bool {
        self.status.eq_ignore_ascii_case("hired") || self.hired_at.is_some()
    }

    /// Offer start date preferred, then the application's start-date
    /// attribute, then the first ten characters of `hired_at`.
    pub fn start_date(&self) -> Option<String> {
        self.offer_start_date
            .clone()
            .or_else(|| self.attribute_start_date.clone())
            .or_else(|| self.hired_at.as_ref().map(|h| h.chars().take(10).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_date_prefers_offer() {
        let ev = HireEvent {
            application_id: "app-1".to_string(),
            status: "hired".to_string(),
            candidate_first_name: None,
            candidate_last_name: None,
            candidate_personal_email: None,
            job_title: None,
            hired_at: Some("2025-03-05T10:00:00Z".to_string()),
            offer_start_date: Some("2025-03-01".to_string()),
            attribute_start_date: Some("2025-03-02".to_string()),
        };
        assert_eq!(ev.start_date(), Some("2025-03-01".to_string()));
    }

    #[test]
    fn start_date_falls_back_to_hired_at_prefix() {
        let ev = HireEvent {
            application_id: "app-1".to_string(),
            status: "hired".to_string(),
            candidate_first_name: None,
            candidate_last_name: None,
            candidate_personal_email: None,
            job_title: None,
            hired_at: Some("2025-03-05T10:00:00Z".to_string()),
            offer_start_date: None,
            attribute_start_date: None,
        };
        assert_eq!(ev.start_date(), Some("2025-03-05".to_string()));
    }
}
