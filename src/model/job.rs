use serde::{Deserialize, Serialize};

/// A ChartHop job. `ctc` is the only field this process writes back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub title: Option<String>,
    pub is_open: bool,
    pub base_compensation: Option<f64>,
    pub currency: Option<String>,
    pub ctc: Option<f64>,
    pub employment: Option<String>,
}
