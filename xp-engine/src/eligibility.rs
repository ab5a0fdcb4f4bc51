// Copyright (C) 2025 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

use crate::{
    experiment::Experiment,
    metrics::VariantMetrics,
    promotion_config::{AutoPromotionConfig, PrimaryMetric},
    stats,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

/// Name of the variant treated as the baseline when present.
pub const CONTROL_VARIANT_NAME: &str = "control";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcludedVariant {
    pub variant_name: String,
    pub reason: String,
}

/// The outcome of an eligibility evaluation. `reason` is always set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityResult {
    pub eligible: bool,
    pub candidate_variant_id: Option<Uuid>,
    pub candidate_variant_name: Option<String>,
    pub baseline_variant_id: Option<Uuid>,
    pub confidence: Option<f64>,
    pub reason: String,
    pub excluded: Vec<ExcludedVariant>,
}

impl EligibilityResult {
    fn rejected(reason: impl Into<String>) -> Self {
        Self {
            eligible: false,
            candidate_variant_id: None,
            candidate_variant_name: None,
            baseline_variant_id: None,
            confidence: None,
            reason: reason.into(),
            excluded: vec![],
        }
    }
}

/// Decide whether a non-baseline variant of `experiment` may be promoted.
///
/// `metrics` must be in variant creation order. Pure apart from reading the clock value passed in.
pub fn evaluate(
    experiment: &Experiment,
    metrics: &[VariantMetrics],
    config: &AutoPromotionConfig,
    now: DateTime<Utc>,
) -> EligibilityResult {
    let result = evaluate_inner(experiment, metrics, config, now);
    if result.eligible {
        info!(
            "Experiment {} is eligible for promotion: {}",
            experiment.name, result.reason
        );
    } else {
        debug!(
            "Experiment {} is not eligible for promotion: {}",
            experiment.name, result.reason
        );
    }
    result
}

fn evaluate_inner(
    experiment: &Experiment,
    metrics: &[VariantMetrics],
    config: &AutoPromotionConfig,
    now: DateTime<Utc>,
) -> EligibilityResult {
    if !experiment.is_active {
        return EligibilityResult::rejected("experiment inactive");
    }

    let hours_running = experiment.hours_running(now);
    if hours_running < config.min_run_duration_hours {
        return EligibilityResult::rejected(format!(
            "experiment has run for {hours_running:.1}h, minimum is {}h",
            config.min_run_duration_hours
        ));
    }

    if metrics.len() < 2 {
        return EligibilityResult::rejected(format!(
            "experiment needs at least two variants, found {}",
            metrics.len()
        ));
    }

    let Some(baseline) = baseline_of(metrics) else {
        return EligibilityResult::rejected("experiment has no baseline variant");
    };

    let mut excluded = Vec::new();
    let mut qualified = Vec::new();
    for variant in metrics {
        match exclusion_reason(variant, config) {
            Some(reason) => excluded.push(ExcludedVariant {
                variant_name: variant.variant_name.clone(),
                reason,
            }),
            None => qualified.push(variant),
        }
    }

    let mut result = EligibilityResult::rejected("");
    result.baseline_variant_id = Some(baseline.variant_id);
    result.excluded = excluded;

    if !qualified.iter().any(|v| v.variant_id == baseline.variant_id) {
        result.reason = format!(
            "baseline '{}' has not met the minimum sample size of {}",
            baseline.variant_name, config.min_sample_size
        );
        return result;
    }

    // Stable sort keeps creation order as the last tie-break.
    qualified.sort_by(|a, b| rank(a, b, config.primary_metric));
    let Some(best) = qualified.first().copied() else {
        result.reason = "no variant has met the minimum sample size".to_string();
        return result;
    };

    if best.variant_id == baseline.variant_id {
        result.reason = if qualified.len() == 1 {
            format!(
                "no variant other than baseline '{}' has met the minimum sample size of {}",
                baseline.variant_name, config.min_sample_size
            )
        } else {
            format!(
                "baseline '{}' remains the best performer on {}",
                baseline.variant_name, config.primary_metric
            )
        };
        return result;
    }

    result.candidate_variant_id = Some(best.variant_id);
    result.candidate_variant_name = Some(best.variant_name.clone());

    let Some(confidence) = stats::confidence(
        config.significance_test_method,
        config.primary_metric,
        baseline,
        best,
    ) else {
        result.reason = format!(
            "significance of '{}' over '{}' could not be computed",
            best.variant_name, baseline.variant_name
        );
        return result;
    };
    result.confidence = Some(confidence);

    if confidence < config.min_confidence_level {
        result.reason = format!(
            "confidence {confidence:.4} that '{}' beats '{}' is below the required {}",
            best.variant_name, baseline.variant_name, config.min_confidence_level
        );
        return result;
    }

    let error_rate_delta =
        best.error_rate.unwrap_or(0.0) - baseline.error_rate.unwrap_or(0.0);
    if error_rate_delta > config.max_error_rate_delta {
        result.reason = format!(
            "error rate of '{}' regresses by {error_rate_delta:.4} over '{}', maximum allowed is {}",
            best.variant_name, baseline.variant_name, config.max_error_rate_delta
        );
        return result;
    }

    result.eligible = true;
    result.reason = format!(
        "'{}' beats '{}' on {} with confidence {confidence:.4}",
        best.variant_name, baseline.variant_name, config.primary_metric
    );
    result
}

/// The variant named `control` (case-insensitive), else the first created variant.
fn baseline_of(metrics: &[VariantMetrics]) -> Option<&VariantMetrics> {
    metrics
        .iter()
        .find(|m| m.variant_name.eq_ignore_ascii_case(CONTROL_VARIANT_NAME))
        .or_else(|| metrics.first())
}

fn exclusion_reason(variant: &VariantMetrics, config: &AutoPromotionConfig) -> Option<String> {
    if variant.total_requests < config.min_sample_size {
        return Some(format!(
            "{} requests, minimum sample size is {}",
            variant.total_requests, config.min_sample_size
        ));
    }
    if primary_value(variant, config.primary_metric).is_none() {
        return Some(format!("no {} data", config.primary_metric));
    }
    None
}

fn primary_value(variant: &VariantMetrics, metric: PrimaryMetric) -> Option<f64> {
    match metric {
        PrimaryMetric::ErrorRate => variant.error_rate,
        PrimaryMetric::Latency => variant.avg_latency_ms,
        PrimaryMetric::ConversionRate => variant.conversion_rate,
    }
}

/// Best first: primary metric, then lower average latency, then more requests.
fn rank(a: &VariantMetrics, b: &VariantMetrics, metric: PrimaryMetric) -> Ordering {
    let a_primary = primary_value(a, metric).unwrap_or(f64::NAN);
    let b_primary = primary_value(b, metric).unwrap_or(f64::NAN);
    let primary = match metric {
        PrimaryMetric::ErrorRate | PrimaryMetric::Latency => a_primary.total_cmp(&b_primary),
        PrimaryMetric::ConversionRate => b_primary.total_cmp(&a_primary),
    };

    primary
        .then_with(|| {
            let a_latency = a.avg_latency_ms.unwrap_or(f64::INFINITY);
            let b_latency = b.avg_latency_ms.unwrap_or(f64::INFINITY);
            a_latency.total_cmp(&b_latency)
        })
        .then_with(|| b.total_requests.cmp(&a.total_requests))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::promotion_config::SignificanceTestMethod;
    use chrono::Duration;

    fn experiment(days_running: i64) -> Experiment {
        Experiment {
            id: Uuid::new_v4(),
            name: "checkout-copy".to_string(),
            description: None,
            is_active: true,
            start_date: Utc::now() - Duration::days(days_running),
            end_date: None,
            winning_variant_id: None,
        }
    }

    fn metrics(name: &str, total: u64, errors: u64, latency: f64) -> VariantMetrics {
        VariantMetrics {
            variant_id: Uuid::new_v4(),
            variant_name: name.to_string(),
            total_requests: total,
            error_count: errors,
            error_rate: (total > 0).then(|| errors as f64 / total as f64),
            avg_latency_ms: (total > 0).then_some(latency),
            latency_std_dev_ms: (total > 0).then_some(100.0),
            avg_tokens_used: None,
            conversions: None,
            conversion_samples: 0,
            conversion_rate: None,
        }
    }

    fn with_conversions(mut metrics: VariantMetrics, conversions: u64) -> VariantMetrics {
        metrics.conversions = Some(conversions);
        metrics.conversion_samples = metrics.total_requests;
        metrics.conversion_rate = Some(conversions as f64 / metrics.total_requests as f64);
        metrics
    }

    fn config() -> AutoPromotionConfig {
        AutoPromotionConfig {
            min_sample_size: 500,
            min_run_duration_hours: 72.0,
            min_confidence_level: 0.95,
            ..Default::default()
        }
    }

    #[test]
    fn lower_error_rate_with_enough_samples_is_eligible() {
        let control = metrics("control", 1000, 20, 900.0);
        let bold = metrics("bold-cta", 1200, 12, 900.0);
        let result = evaluate(&experiment(8), &[control.clone(), bold.clone()], &config(), Utc::now());

        assert!(result.eligible, "{}", result.reason);
        assert_eq!(result.candidate_variant_id, Some(bold.variant_id));
        assert_eq!(result.baseline_variant_id, Some(control.variant_id));
        assert!(result.confidence.unwrap() >= 0.95);
    }

    #[test]
    fn inactive_experiments_are_rejected_first() {
        let mut experiment = experiment(8);
        experiment.is_active = false;
        let result = evaluate(&experiment, &[], &config(), Utc::now());
        assert!(!result.eligible);
        assert_eq!(result.reason, "experiment inactive");
    }

    #[test]
    fn young_experiments_are_rejected() {
        let result = evaluate(
            &experiment(1),
            &[metrics("control", 1000, 20, 900.0), metrics("b", 1200, 1, 900.0)],
            &config(),
            Utc::now(),
        );
        assert!(!result.eligible);
        assert!(result.reason.contains("minimum is 72h"), "{}", result.reason);
    }

    #[test]
    fn variant_one_short_of_the_sample_size_is_never_the_candidate() {
        let control = metrics("control", 1000, 50, 900.0);
        let perfect = metrics("perfect", 499, 0, 100.0);
        let result = evaluate(&experiment(8), &[control, perfect], &config(), Utc::now());

        assert!(!result.eligible);
        assert_eq!(result.candidate_variant_id, None);
        assert_eq!(result.excluded.len(), 1);
        assert_eq!(result.excluded[0].variant_name, "perfect");
    }

    #[test]
    fn best_qualified_variant_is_chosen_when_others_are_excluded() {
        let control = metrics("control", 1000, 50, 900.0);
        let small = metrics("small", 10, 0, 100.0);
        let good = metrics("good", 1000, 20, 900.0);
        let result = evaluate(
            &experiment(8),
            &[control, small, good.clone()],
            &config(),
            Utc::now(),
        );

        assert!(result.eligible, "{}", result.reason);
        assert_eq!(result.candidate_variant_id, Some(good.variant_id));
    }

    #[test]
    fn baseline_winning_is_not_eligible() {
        let result = evaluate(
            &experiment(8),
            &[metrics("control", 1000, 10, 900.0), metrics("b", 1000, 30, 900.0)],
            &config(),
            Utc::now(),
        );
        assert!(!result.eligible);
        assert!(result.reason.contains("remains the best performer"));
    }

    #[test]
    fn insignificant_improvement_is_rejected_with_its_confidence() {
        let result = evaluate(
            &experiment(8),
            &[metrics("control", 1000, 20, 900.0), metrics("b", 1000, 18, 900.0)],
            &config(),
            Utc::now(),
        );
        assert!(!result.eligible);
        assert!(result.confidence.unwrap() < 0.95);
        assert!(result.candidate_variant_id.is_some());
    }

    #[test]
    fn faster_variant_with_worse_reliability_is_never_promoted() {
        let config = AutoPromotionConfig {
            primary_metric: PrimaryMetric::Latency,
            max_error_rate_delta: 0.01,
            ..config()
        };
        let control = metrics("control", 1000, 10, 900.0);
        let fast_but_flaky = metrics("fast", 1000, 50, 600.0);
        let result = evaluate(&experiment(8), &[control, fast_but_flaky], &config, Utc::now());

        assert!(!result.eligible);
        assert!(result.confidence.unwrap() > 0.99);
        assert!(result.reason.contains("regresses"), "{}", result.reason);
    }

    #[test]
    fn higher_conversion_rate_wins_on_conversion() {
        let config = AutoPromotionConfig {
            primary_metric: PrimaryMetric::ConversionRate,
            ..config()
        };
        let control = with_conversions(metrics("control", 1000, 10, 900.0), 100);
        let persuasive = with_conversions(metrics("persuasive", 1000, 10, 900.0), 150);

        let result = evaluate(
            &experiment(8),
            &[control.clone(), persuasive.clone()],
            &config,
            Utc::now(),
        );
        assert!(result.eligible, "{}", result.reason);
        assert_eq!(result.candidate_variant_id, Some(persuasive.variant_id));
        assert_eq!(result.baseline_variant_id, Some(control.variant_id));
        assert!(result.confidence.unwrap() > 0.999);

        // The same pair with the conversions swapped leaves the control in front.
        let control = with_conversions(metrics("control", 1000, 10, 900.0), 150);
        let weaker = with_conversions(metrics("weaker", 1000, 10, 900.0), 100);
        let result = evaluate(&experiment(8), &[control, weaker], &config, Utc::now());
        assert!(!result.eligible);
        assert!(result.reason.contains("remains the best performer"), "{}", result.reason);
    }

    #[test]
    fn variants_without_conversion_data_are_excluded_on_conversion() {
        let config = AutoPromotionConfig {
            primary_metric: PrimaryMetric::ConversionRate,
            ..config()
        };
        let control = with_conversions(metrics("control", 1000, 10, 900.0), 100);
        let untracked = metrics("untracked", 1000, 0, 500.0);
        let result = evaluate(&experiment(8), &[control, untracked], &config, Utc::now());

        assert!(!result.eligible);
        assert_eq!(result.excluded.len(), 1);
        assert_eq!(result.excluded[0].variant_name, "untracked");
    }

    #[test]
    fn bayesian_method_promotes_the_checkout_copy_winner() {
        let config = AutoPromotionConfig {
            significance_test_method: SignificanceTestMethod::Bayesian,
            ..config()
        };
        let control = metrics("control", 1000, 20, 900.0);
        let bold = metrics("bold-cta", 1200, 12, 900.0);
        let result = evaluate(&experiment(8), &[control, bold.clone()], &config, Utc::now());

        assert!(result.eligible, "{}", result.reason);
        assert_eq!(result.candidate_variant_id, Some(bold.variant_id));
        let confidence = result.confidence.unwrap();
        assert!((0.96..0.98).contains(&confidence), "{confidence}");

        let strict = AutoPromotionConfig {
            min_confidence_level: 0.99,
            ..config
        };
        let control = metrics("control", 1000, 20, 900.0);
        let bold = metrics("bold-cta", 1200, 12, 900.0);
        let result = evaluate(&experiment(8), &[control, bold], &strict, Utc::now());
        assert!(!result.eligible);
    }

    #[test]
    fn ties_fall_back_to_latency_then_volume() {
        let a = metrics("a", 1000, 10, 500.0);
        let b = metrics("b", 1000, 10, 400.0);
        assert_eq!(rank(&a, &b, PrimaryMetric::ErrorRate), Ordering::Greater);

        let c = metrics("c", 1000, 10, 400.0);
        let d = metrics("d", 2000, 20, 400.0);
        assert_eq!(rank(&c, &d, PrimaryMetric::ErrorRate), Ordering::Greater);
    }

    #[test]
    fn first_variant_is_the_baseline_without_a_control() {
        let first = metrics("v1", 1000, 10, 500.0);
        let second = metrics("v2", 1000, 10, 500.0);
        let variants = [first.clone(), second];
        let baseline = baseline_of(&variants).unwrap();
        assert_eq!(baseline.variant_id, first.variant_id);
    }
}
