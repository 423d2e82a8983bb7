use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============ Validation Records ============

/// A single validation result as returned by the validation API.
///
/// Fields this crate does not interpret are kept in `extra` and passed
/// through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRecord {
    /// Lowercased email address.
    #[serde(default)]
    pub email: String,
    /// Whether the address passed validation.
    #[serde(default)]
    pub valid: bool,
    /// Raw status string (`deliverable`, `undeliverable`, `risky`, `unknown`, ...).
    #[serde(default = "default_status")]
    pub status: String,
    /// Risk score in [0,1]; absent is treated as 0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<f64>,
    /// Quality score in [0,1]; absent is treated as 0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
    /// Any other fields returned by the API.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_status() -> String {
    "unknown".to_string()
}

impl ValidationRecord {
    pub fn risk(&self) -> f64 {
        self.risk_score.unwrap_or(0.0)
    }

    pub fn quality(&self) -> f64 {
        self.quality_score.unwrap_or(0.0)
    }

    pub fn validation_status(&self) -> ValidationStatus {
        ValidationStatus::parse(&self.status)
    }
}

/// Validation status reported by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Deliverable,
    Undeliverable,
    Risky,
    Unknown,
}

impl ValidationStatus {
    /// Case-insensitive parse; anything unrecognised is `Unknown`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "deliverable" => ValidationStatus::Deliverable,
            "undeliverable" => ValidationStatus::Undeliverable,
            "risky" => ValidationStatus::Risky,
            _ => ValidationStatus::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    Excellent,
    Good,
    Fair,
    Poor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Deliverability {
    High,
    Medium,
    Low,
    Unknown,
}

/// A validation record plus the fields derived by the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedResult {
    #[serde(flatten)]
    pub record: ValidationRecord,
    pub risk_level: RiskLevel,
    pub quality_tier: QualityTier,
    pub deliverability_status: Deliverability,
    pub is_high_risk: bool,
    pub is_safe_to_send: bool,
    pub should_review: bool,
    pub recommendation: String,
    pub validated_at: DateTime<Utc>,
}

/// Names of the fields `EnrichedResult` adds on top of a record.
pub const DERIVED_FIELDS: [&str; 8] = [
    "risk_level",
    "quality_tier",
    "deliverability_status",
    "is_high_risk",
    "is_safe_to_send",
    "should_review",
    "recommendation",
    "validated_at",
];

// ============ Statistics ============

/// Summary over a set of enriched results. Empty input serialises as `{"total": 0}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchStatistics {
    pub total: usize,
    #[serde(flatten)]
    pub breakdown: Option<StatisticsBreakdown>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsBreakdown {
    pub deliverable: usize,
    pub undeliverable: usize,
    pub risky: usize,
    pub unknown: usize,
    pub safe_to_send: usize,
    pub needs_review: usize,
    pub high_risk: usize,
    pub deliverability_rate: f64,
    pub undeliverable_rate: f64,
    pub safe_to_send_rate: f64,
    pub review_rate: f64,
    pub high_risk_rate: f64,
    pub average_risk_score: f64,
    pub average_quality_score: f64,
}

// ============ Batch Jobs ============

/// Server-side job state, observed through polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Unknown,
}

impl JobState {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" | "queued" => JobState::Pending,
            "processing" | "running" | "in_progress" => JobState::Processing,
            "completed" | "complete" => JobState::Completed,
            "failed" | "error" => JobState::Failed,
            "cancelled" | "canceled" => JobState::Cancelled,
            _ => JobState::Unknown,
        }
    }
}

/// Processing priority for asynchronous jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    #[default]
    Normal,
    Low,
}

impl Priority {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Priority::High),
            "normal" | "" => Some(Priority::Normal),
            "low" => Some(Priority::Low),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
        }
    }
}

/// Output of an operation: a single item or several items to be flattened.
#[derive(Debug, Clone, PartialEq)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}
