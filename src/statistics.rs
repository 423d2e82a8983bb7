//! Summary statistics over enriched results.

use crate::models::{BatchStatistics, EnrichedResult, StatisticsBreakdown, ValidationStatus};

/// Rounds to two decimal places, halves away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn rate(count: usize, total: usize) -> f64 {
    round2(count as f64 / total as f64 * 100.0)
}

/// Aggregates a set of enriched results.
///
/// Action counts come from the per-record flags rather than the scores, so the
/// summary always agrees with the individual classifications.
pub fn aggregate(results: &[EnrichedResult]) -> BatchStatistics {
    let total = results.len();
    if total == 0 {
        return BatchStatistics {
            total: 0,
            breakdown: None,
        };
    }

    let mut deliverable = 0;
    let mut undeliverable = 0;
    let mut risky = 0;
    let mut unknown = 0;
    let mut safe_to_send = 0;
    let mut needs_review = 0;
    let mut high_risk = 0;
    let mut risk_sum = 0.0;
    let mut quality_sum = 0.0;

    for result in results {
        match result.record.validation_status() {
            ValidationStatus::Deliverable => deliverable += 1,
            ValidationStatus::Undeliverable => undeliverable += 1,
            ValidationStatus::Risky => risky += 1,
            ValidationStatus::Unknown => unknown += 1,
        }
        if result.is_safe_to_send {
            safe_to_send += 1;
        }
        if result.should_review {
            needs_review += 1;
        }
        if result.is_high_risk {
            high_risk += 1;
        }
        risk_sum += result.record.risk();
        quality_sum += result.record.quality();
    }

    BatchStatistics {
        total,
        breakdown: Some(StatisticsBreakdown {
            deliverable,
            undeliverable,
            risky,
            unknown,
            safe_to_send,
            needs_review,
            high_risk,
            deliverability_rate: rate(deliverable, total),
            undeliverable_rate: rate(undeliverable, total),
            safe_to_send_rate: rate(safe_to_send, total),
            review_rate: rate(needs_review, total),
            high_risk_rate: rate(high_risk, total),
            average_risk_score: round2(risk_sum / total as f64),
            average_quality_score: round2(quality_sum / total as f64),
        }),
    }
}
