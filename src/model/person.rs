use serde::{Deserialize, Serialize};

/// Hiring arrangement that parameterizes the cost-to-company formula.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HiringScheme {
    #[serde(rename = "Nómina")]
    Nomina,
    #[serde(rename = "Mixto Interno")]
    MixtoInterno,
    #[serde(rename = "Mixto Externo")]
    MixtoExterno,
    Ontop,
    Voiz,
    /// Any scheme not in the table above falls back to `base` with a
    /// logged warning.
    Other(String),
}

impl HiringScheme {
    /// Parses the free-text `esquema_contratacion` field from ChartHop.
    /// Matching is case/diacritic tolerant, per the original Python
    /// (`esquema_contratacion.strip().lower()`).
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_lowercase();
        match normalized.as_str() {
            "nómina" | "nomina" | "mixto interno" => {
                if normalized == "mixto interno" {
                    Self::MixtoInterno
                } else {
                    Self::Nomina
                }
            }
            "mixto externo" => Self::MixtoExterno,
            "ontop" => Self::Ontop,
            "voiz" => Self::Voiz,
            _ => Self::Other(raw.to_string()),
        }
    }
}

/// A ChartHop person record. Created by the HRIS; this process only ever
/// reads it, except for the CTC field on the associated [`crate::model::Job`]
/// which it writes back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    pub work_email: Option<String>,
    pub personal_email: Option<String>,
    pub legal_first_name: Option<String>,
    pub legal_last_name: Option<String>,
    pub preferred_first_name: Option<String>,
    pub preferred_last_name: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub title: Option<String>,
    pub seniority: Option<String>,
    pub manager_work_email: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub employment_type: Option<String>,
    pub job_id: Option<String>,
    pub department: Option<String>,
    pub gender: Option<String>,
    pub cost_to_company: Option<f64>,
    pub currency: Option<String>,
    pub hiring_scheme: Option<HiringScheme>,
}

impl Person {
    /// Primary email: work address preferred over personal.
    pub fn primary_email(&self) -> Option<&str> {
        self.work_email
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.personal_email.as_deref().filter(|s| !s.is_empty()))
    }

    /// Display name composed from preferred names, falling back to legal
    /// names.
    pub fn display_name(&self) -> Option<String> {
        let preferred = Self::join_name(&self.preferred_first_name, &self.preferred_last_name);
        if let Some(name) = preferred {
            return Some(name);
        }
        Self::join_name(&self.legal_first_name, &self.legal_last_name)
    }

    fn join_name(first: &Option<String>, last: &Option<String>) -> Option<String> {
        let parts: Vec<&str> = [first, last]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_email_prefers_work() {
        let p = Person {
            work_email: Some("work@example.com".to_string()),
            personal_email: Some("personal@example.com".to_string()),
            ..empty_person()
        };
        assert_eq!(p.primary_email(), Some("work@example.com"));
    }

    #[test]
    fn primary_email_falls_back_to_personal() {
        let p = Person {
            work_email: None,
            personal_email: Some("personal@example.com".to_string()),
            ..empty_person()
        };
        assert_eq!(p.primary_email(), Some("personal@example.com"));
    }

    #[test]
    fn display_name_prefers_preferred() {
        let p = Person {
            preferred_first_name: Some("Mati".to_string()),
            preferred_last_name: Some("Nuno".to_string()),
            legal_first_name: Some("Matias".to_string()),
            legal_last_name: Some("Nuno".to_string()),
            ..empty_person()
        };
        assert_eq!(p.display_name(), Some("Mati Nuno".to_string()));
    }

    #[test]
    fn display_name_falls_back_to_legal() {
        let p = Person {
            legal_first_name: Some("Matias".to_string()),
            legal_last_name: Some("Nuno".to_string()),
            ..empty_person()
        };
        assert_eq!(p.display_name(), Some("Matias Nuno".to_string()));
    }

    #[test]
    fn hiring_scheme_parse_is_diacritic_and_case_tolerant() {
        assert_eq!(HiringScheme::parse("nomina"), HiringScheme::Nomina);
        assert_eq!(HiringScheme::parse("Nómina"), HiringScheme::Nomina);
        assert_eq!(HiringScheme::parse("ONTOP"), HiringScheme::Ontop);
        assert_eq!(HiringScheme::parse("Mixto Externo"), HiringScheme::MixtoExterno);
        assert!(matches!(
            HiringScheme::parse("something else"),
            HiringScheme::Other(_)
        ));
    }

    fn empty_person() -> Person {
        Person {
            id: "p-1".to_string(),
            work_email: None,
            personal_email: None,
            legal_first_name: None,
            legal_last_name: None,
            preferred_first_name: None,
            preferred_last_name: None,
            country: None,
            city: None,
            title: None,
            seniority: None,
            manager_work_email: None,
            start_date: None,
            end_date: None,
            employment_type: None,
            job_id: None,
            department: None,
            gender: None,
            cost_to_company: None,
            currency: None,
            hiring_scheme: None,
        }
    }
}
