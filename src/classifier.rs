//! Classification of raw validation records into workflow-friendly tiers.
//!
//! Everything here is pure except [`enrich`], which stamps the current time.

use crate::models::{
    Deliverability, EnrichedResult, QualityTier, RiskLevel, ValidationRecord, ValidationStatus,
    DERIVED_FIELDS,
};
use chrono::{DateTime, Utc};

/// Risk score thresholds.
pub mod risk_thresholds {
    /// Lower bound of the medium tier; also the start of "should review".
    pub const LOW: f64 = 0.3;
    /// Scores below this on a valid address are safe to send.
    pub const MEDIUM: f64 = 0.5;
    /// Lower bound of the high tier.
    pub const HIGH: f64 = 0.7;
}

/// Quality score thresholds (strict `>` comparisons).
pub mod quality_thresholds {
    pub const EXCELLENT: f64 = 0.8;
    pub const GOOD: f64 = 0.6;
    pub const FAIR: f64 = 0.4;
}

pub const RECOMMEND_INVALID: &str = "Do not send - email address is invalid";
pub const RECOMMEND_UNDELIVERABLE: &str = "Do not send - email is undeliverable";
pub const RECOMMEND_HIGH_RISK: &str = "High risk - manual review recommended";
pub const RECOMMEND_MEDIUM_RISK: &str = "Medium risk - consider additional verification";
pub const RECOMMEND_LOW_RISK: &str = "Low risk - safe to send with monitoring";
pub const RECOMMEND_SAFE: &str = "Safe to send";

/// Maps a risk score to its tier.
///
/// # Arguments
///
/// * `score` - Risk score reported by the API (0.0 when absent).
///
/// # Returns
///
/// * `RiskLevel` - `High` from 0.7, `Medium` from 0.3, `Low` below.
pub fn risk_level(score: f64) -> RiskLevel {
    if score >= risk_thresholds::HIGH {
        RiskLevel::High
    } else if score >= risk_thresholds::LOW {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Maps a quality score to its tier. Boundaries are exclusive, so exactly 0.8
/// is `Good`, not `Excellent`.
pub fn quality_tier(score: f64) -> QualityTier {
    if score > quality_thresholds::EXCELLENT {
        QualityTier::Excellent
    } else if score > quality_thresholds::GOOD {
        QualityTier::Good
    } else if score > quality_thresholds::FAIR {
        QualityTier::Fair
    } else {
        QualityTier::Poor
    }
}

/// Deliverability bucket for a normalized validation status.
pub fn deliverability_status(status: ValidationStatus) -> Deliverability {
    match status {
        ValidationStatus::Deliverable => Deliverability::High,
        ValidationStatus::Risky => Deliverability::Medium,
        ValidationStatus::Undeliverable => Deliverability::Low,
        ValidationStatus::Unknown => Deliverability::Unknown,
    }
}

/// Risk score at or above 0.7.
pub fn is_high_risk(score: f64) -> bool {
    score >= risk_thresholds::HIGH
}

/// Whether an address can be mailed without review.
///
/// # Arguments
///
/// * `valid` - Syntax/mailbox validity reported by the API.
/// * `score` - Risk score (0.0 when absent).
///
/// # Returns
///
/// * `bool` - True only for a valid address with a score below 0.5.
pub fn is_safe_to_send(valid: bool, score: f64) -> bool {
    valid && score < risk_thresholds::MEDIUM
}

/// Medium-risk band `[0.3, 0.7)` that warrants a human look.
pub fn should_review(score: f64) -> bool {
    (risk_thresholds::LOW..risk_thresholds::HIGH).contains(&score)
}

/// First matching rule wins.
pub fn recommendation(record: &ValidationRecord) -> &'static str {
    let score = record.risk();
    if !record.valid {
        RECOMMEND_INVALID
    } else if record.validation_status() == ValidationStatus::Undeliverable {
        RECOMMEND_UNDELIVERABLE
    } else if score >= risk_thresholds::HIGH {
        RECOMMEND_HIGH_RISK
    } else if score >= risk_thresholds::MEDIUM {
        RECOMMEND_MEDIUM_RISK
    } else if score >= risk_thresholds::LOW {
        RECOMMEND_LOW_RISK
    } else {
        RECOMMEND_SAFE
    }
}

/// Enriches a record, stamping `validated_at` with the current time.
pub fn enrich(record: ValidationRecord) -> EnrichedResult {
    enrich_at(record, Utc::now())
}

/// Enriches a record with an explicit `validated_at`.
///
/// Derived fields already present in the record's passthrough map (from a
/// previous enrichment) are dropped so they are recomputed, never duplicated.
pub fn enrich_at(mut record: ValidationRecord, validated_at: DateTime<Utc>) -> EnrichedResult {
    for field in DERIVED_FIELDS {
        record.extra.remove(field);
    }

    let risk = record.risk();
    let quality = record.quality();

    EnrichedResult {
        risk_level: risk_level(risk),
        quality_tier: quality_tier(quality),
        deliverability_status: deliverability_status(record.validation_status()),
        is_high_risk: is_high_risk(risk),
        is_safe_to_send: is_safe_to_send(record.valid, risk),
        should_review: should_review(risk),
        recommendation: recommendation(&record).to_string(),
        validated_at,
        record,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(valid: bool, status: &str, risk: Option<f64>) -> ValidationRecord {
        ValidationRecord {
            email: "user@example.com".to_string(),
            valid,
            status: status.to_string(),
            risk_score: risk,
            quality_score: Some(0.9),
            extra: Default::default(),
        }
    }

    #[test]
    fn test_recommendation_rule_order() {
        // invalid wins even over an undeliverable status
        assert_eq!(
            recommendation(&record(false, "undeliverable", Some(0.9))),
            RECOMMEND_INVALID
        );
        assert_eq!(
            recommendation(&record(true, "undeliverable", Some(0.0))),
            RECOMMEND_UNDELIVERABLE
        );
        assert_eq!(
            recommendation(&record(true, "risky", Some(0.7))),
            RECOMMEND_HIGH_RISK
        );
        assert_eq!(
            recommendation(&record(true, "risky", Some(0.5))),
            RECOMMEND_MEDIUM_RISK
        );
        assert_eq!(
            recommendation(&record(true, "deliverable", Some(0.3))),
            RECOMMEND_LOW_RISK
        );
        assert_eq!(
            recommendation(&record(true, "deliverable", None)),
            RECOMMEND_SAFE
        );
    }

    #[test]
    fn test_enrich_populates_derived_fields() {
        let enriched = enrich(record(true, "deliverable", Some(0.1)));
        assert_eq!(enriched.risk_level, RiskLevel::Low);
        assert_eq!(enriched.quality_tier, QualityTier::Excellent);
        assert_eq!(enriched.deliverability_status, Deliverability::High);
        assert!(enriched.is_safe_to_send);
        assert!(!enriched.should_review);
        assert!(!enriched.is_high_risk);
        assert_eq!(enriched.recommendation, RECOMMEND_SAFE);
    }

    #[test]
    fn test_safe_to_send_requires_valid() {
        let enriched = enrich(record(false, "deliverable", Some(0.0)));
        assert!(!enriched.is_safe_to_send);
    }

    #[test]
    fn test_reenrich_does_not_duplicate_fields() {
        let first = enrich(record(true, "risky", Some(0.55)));
        let value = serde_json::to_value(&first).unwrap();
        let reparsed: ValidationRecord = serde_json::from_value(value).unwrap();
        assert!(reparsed.extra.contains_key("risk_level"));

        let second = enrich_at(reparsed, first.validated_at);
        assert!(second.record.extra.is_empty());
        assert_eq!(second, first);
        assert_eq!(
            serde_json::to_value(&second).unwrap()["risk_level"],
            json!("medium")
        );
    }

    #[test]
    fn test_out_of_range_scores_still_classify() {
        assert_eq!(risk_level(1.5), RiskLevel::High);
        assert_eq!(risk_level(-0.2), RiskLevel::Low);
        assert_eq!(quality_tier(-1.0), QualityTier::Poor);
    }
}
