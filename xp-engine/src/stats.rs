// Copyright (C) 2025 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

//! Directional significance measures. Every function returns the confidence, in `[0, 1]`, that
//! the candidate is better than the baseline.

use crate::{
    metrics::VariantMetrics,
    promotion_config::{PrimaryMetric, SignificanceTestMethod},
};
use statrs::function::erf::erfc;
use std::f64::consts::SQRT_2;

/// Standard normal CDF.
pub fn normal_cdf(z: f64) -> f64 {
    0.5 * erfc(-z / SQRT_2)
}

/// Observed proportion of a variant: `successes` out of `trials`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Proportion {
    pub successes: u64,
    pub trials: u64,
}

impl Proportion {
    fn rate(&self) -> f64 {
        self.successes as f64 / self.trials as f64
    }
}

/// One-sided pooled two-proportion z-test.
///
/// `z = (r_b - r_c) / sqrt(p (1 - p) (1/n_b + 1/n_c))` with `p` the pooled rate, and the
/// returned confidence is `Φ(z)`. Pass the rates so that a *lower* candidate rate is better.
pub fn two_proportion_z_test(baseline: Proportion, candidate: Proportion) -> Option<f64> {
    if baseline.trials == 0 || candidate.trials == 0 {
        return None;
    }
    let n_b = baseline.trials as f64;
    let n_c = candidate.trials as f64;
    let pooled = (baseline.successes + candidate.successes) as f64 / (n_b + n_c);
    let se = (pooled * (1.0 - pooled) * (1.0 / n_b + 1.0 / n_c)).sqrt();
    let diff = baseline.rate() - candidate.rate();
    Some(confidence_from(diff, se))
}

/// Probability that the candidate's rate is below the baseline's, using a normal approximation
/// of the Beta(1 + k, 1 + n - k) posteriors.
pub fn bayesian_probability_lower(baseline: Proportion, candidate: Proportion) -> Option<f64> {
    if baseline.trials == 0 || candidate.trials == 0 {
        return None;
    }
    let (mean_b, var_b) = beta_posterior(baseline);
    let (mean_c, var_c) = beta_posterior(candidate);
    Some(confidence_from(mean_b - mean_c, (var_b + var_c).sqrt()))
}

fn beta_posterior(p: Proportion) -> (f64, f64) {
    let alpha = 1.0 + p.successes as f64;
    let beta = 1.0 + (p.trials - p.successes) as f64;
    let total = alpha + beta;
    let mean = alpha / total;
    let variance = alpha * beta / (total * total * (total + 1.0));
    (mean, variance)
}

/// Large-sample Welch z on means, confidence that the candidate mean is lower.
pub fn welch_mean_lower(
    baseline_mean: f64,
    baseline_sd: f64,
    baseline_n: u64,
    candidate_mean: f64,
    candidate_sd: f64,
    candidate_n: u64,
) -> Option<f64> {
    if baseline_n == 0 || candidate_n == 0 {
        return None;
    }
    let se = (baseline_sd.powi(2) / baseline_n as f64 + candidate_sd.powi(2) / candidate_n as f64)
        .sqrt();
    Some(confidence_from(baseline_mean - candidate_mean, se))
}

fn confidence_from(diff: f64, se: f64) -> f64 {
    if se > 0.0 && se.is_finite() {
        normal_cdf(diff / se)
    } else if diff > 0.0 {
        1.0
    } else if diff < 0.0 {
        0.0
    } else {
        0.5
    }
}

/// Confidence that `candidate` beats `baseline` on `metric`.
///
/// `None` when a metric needed by the test is missing on either side.
pub fn confidence(
    method: SignificanceTestMethod,
    metric: PrimaryMetric,
    baseline: &VariantMetrics,
    candidate: &VariantMetrics,
) -> Option<f64> {
    let proportion_test: fn(Proportion, Proportion) -> Option<f64> = match method {
        SignificanceTestMethod::ZTest => two_proportion_z_test,
        SignificanceTestMethod::Bayesian => bayesian_probability_lower,
    };

    match metric {
        PrimaryMetric::ErrorRate => proportion_test(
            Proportion {
                successes: baseline.error_count,
                trials: baseline.total_requests,
            },
            Proportion {
                successes: candidate.error_count,
                trials: candidate.total_requests,
            },
        ),
        // Counting non-conversions turns "higher is better" into "lower is better".
        PrimaryMetric::ConversionRate => {
            let baseline_conversions = baseline.conversions?;
            let candidate_conversions = candidate.conversions?;
            proportion_test(
                Proportion {
                    successes: baseline.conversion_samples - baseline_conversions,
                    trials: baseline.conversion_samples,
                },
                Proportion {
                    successes: candidate.conversion_samples - candidate_conversions,
                    trials: candidate.conversion_samples,
                },
            )
        }
        PrimaryMetric::Latency => welch_mean_lower(
            baseline.avg_latency_ms?,
            baseline.latency_std_dev_ms?,
            baseline.total_requests,
            candidate.avg_latency_ms?,
            candidate.latency_std_dev_ms?,
            candidate.total_requests,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proportion(successes: u64, trials: u64) -> Proportion {
        Proportion { successes, trials }
    }

    #[test]
    fn normal_cdf_matches_reference_values() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 1e-12);
        assert!((normal_cdf(1.959_963_985) - 0.975).abs() < 1e-6);
        assert!((normal_cdf(-1.644_853_627) - 0.05).abs() < 1e-6);
    }

    #[test]
    fn halving_the_error_rate_on_large_samples_is_significant() {
        // 2% of 1000 against 1% of 1200
        let confidence = two_proportion_z_test(proportion(20, 1000), proportion(12, 1200)).unwrap();
        assert!(confidence > 0.97 && confidence < 0.98, "{confidence}");
    }

    #[test]
    fn a_worse_candidate_has_low_confidence() {
        let confidence = two_proportion_z_test(proportion(12, 1200), proportion(20, 1000)).unwrap();
        assert!(confidence < 0.05, "{confidence}");
    }

    #[test]
    fn identical_zero_rates_are_a_coin_flip() {
        let confidence = two_proportion_z_test(proportion(0, 500), proportion(0, 500)).unwrap();
        assert_eq!(confidence, 0.5);
    }

    #[test]
    fn empty_samples_have_no_confidence() {
        assert_eq!(two_proportion_z_test(proportion(0, 0), proportion(1, 10)), None);
        assert_eq!(bayesian_probability_lower(proportion(1, 10), proportion(0, 0)), None);
    }

    #[test]
    fn bayesian_agrees_in_direction_with_the_z_test() {
        let bayes = bayesian_probability_lower(proportion(20, 1000), proportion(12, 1200)).unwrap();
        assert!(bayes > 0.95, "{bayes}");
        let bayes = bayesian_probability_lower(proportion(12, 1200), proportion(20, 1000)).unwrap();
        assert!(bayes < 0.05, "{bayes}");
    }

    #[test]
    fn welch_detects_a_faster_candidate() {
        let confidence = welch_mean_lower(900.0, 200.0, 1000, 850.0, 200.0, 1000).unwrap();
        assert!(confidence > 0.99, "{confidence}");
    }
}
