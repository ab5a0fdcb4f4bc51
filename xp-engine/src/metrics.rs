// Copyright (C) 2025 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

use crate::{
    error::{Error, Result},
    experiment::{Experiment, RequestRecord, Variant, sort_by_creation},
    store::ExperimentStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Aggregate statistics of the requests attributed to one variant.
///
/// Every ratio and mean is `None` when there is nothing to divide by.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantMetrics {
    pub variant_id: Uuid,
    pub variant_name: String,
    pub total_requests: u64,
    pub error_count: u64,
    pub error_rate: Option<f64>,
    pub avg_latency_ms: Option<f64>,
    /// Population standard deviation.
    pub latency_std_dev_ms: Option<f64>,
    pub avg_tokens_used: Option<f64>,
    /// `None` when no request of the variant tracked conversion.
    pub conversions: Option<u64>,
    /// Requests that tracked conversion, the denominator of `conversion_rate`.
    pub conversion_samples: u64,
    pub conversion_rate: Option<f64>,
}

impl VariantMetrics {
    pub fn aggregate(variant: &Variant, requests: &[RequestRecord]) -> Self {
        let total_requests = requests.len() as u64;
        let error_count = requests.iter().filter(|r| r.error.is_some()).count() as u64;

        let latencies: Vec<f64> = requests.iter().map(|r| r.latency_ms as f64).collect();
        let avg_latency_ms = mean(&latencies);
        let latency_std_dev_ms = avg_latency_ms.map(|avg| {
            let variance = latencies.iter().map(|l| (l - avg).powi(2)).sum::<f64>()
                / latencies.len() as f64;
            variance.sqrt()
        });

        let tokens: Vec<f64> = requests
            .iter()
            .filter_map(|r| r.tokens_used.map(|t| t as f64))
            .collect();

        let tracked: Vec<bool> = requests.iter().filter_map(|r| r.converted).collect();
        let conversions = if tracked.is_empty() {
            None
        } else {
            Some(tracked.iter().filter(|converted| **converted).count() as u64)
        };

        Self {
            variant_id: variant.id,
            variant_name: variant.variant_name.clone(),
            total_requests,
            error_count,
            error_rate: ratio(error_count, total_requests),
            avg_latency_ms,
            latency_std_dev_ms,
            avg_tokens_used: mean(&tokens),
            conversions,
            conversion_samples: tracked.len() as u64,
            conversion_rate: conversions.and_then(|c| ratio(c, tracked.len() as u64)),
        }
    }
}

/// An experiment together with its variants (creation order) and their metrics (same order).
#[derive(Clone, Debug)]
pub struct ExperimentSnapshot {
    pub experiment: Experiment,
    pub variants: Vec<Variant>,
    pub metrics: Vec<VariantMetrics>,
}

/// Load an experiment by name and aggregate the metrics of each of its variants.
pub async fn load_snapshot<S: ExperimentStore + ?Sized>(
    store: &S,
    experiment_name: &str,
) -> Result<ExperimentSnapshot> {
    let experiment = store
        .experiment_by_name(experiment_name)
        .await?
        .ok_or_else(|| Error::ExperimentNotFound(experiment_name.to_string()))?;

    let mut variants = store.variants_for(experiment.id).await?;
    sort_by_creation(&mut variants);

    let mut metrics = Vec::with_capacity(variants.len());
    for variant in &variants {
        let requests = store.requests_for_variant(variant.id).await?;
        metrics.push(VariantMetrics::aggregate(variant, &requests));
    }
    trace!(
        "Aggregated metrics for {} variants of {experiment_name}",
        metrics.len()
    );

    Ok(ExperimentSnapshot {
        experiment,
        variants,
        metrics,
    })
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn ratio(numerator: u64, denominator: u64) -> Option<f64> {
    if denominator == 0 {
        None
    } else {
        Some(numerator as f64 / denominator as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai_config::ConfigOverrides;
    use chrono::Utc;

    fn variant() -> Variant {
        Variant {
            id: Uuid::new_v4(),
            experiment_id: Uuid::new_v4(),
            variant_name: "concise".to_string(),
            traffic_percentage: 50.0,
            config_overrides: ConfigOverrides::default(),
            prompt_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn zero_requests_yield_no_ratios() {
        let metrics = VariantMetrics::aggregate(&variant(), &[]);
        assert_eq!(metrics.total_requests, 0);
        assert_eq!(metrics.error_rate, None);
        assert_eq!(metrics.avg_latency_ms, None);
        assert_eq!(metrics.latency_std_dev_ms, None);
        assert_eq!(metrics.avg_tokens_used, None);
        assert_eq!(metrics.conversions, None);
    }

    #[test]
    fn aggregates_use_arithmetic_means() {
        let variant = variant();
        let requests = vec![
            RequestRecord::new(Some(variant.id), 100).with_tokens(300),
            RequestRecord::new(Some(variant.id), 200).with_error("rate limited"),
            RequestRecord::new(Some(variant.id), 300).with_tokens(500),
            RequestRecord::new(Some(variant.id), 400).with_error("timeout"),
        ];

        let metrics = VariantMetrics::aggregate(&variant, &requests);
        assert_eq!(metrics.total_requests, 4);
        assert_eq!(metrics.error_count, 2);
        assert_eq!(metrics.error_rate, Some(0.5));
        assert_eq!(metrics.avg_latency_ms, Some(250.0));
        assert_eq!(metrics.avg_tokens_used, Some(400.0));
        let std_dev = metrics.latency_std_dev_ms.unwrap();
        assert!((std_dev - 111.803_398_874_989_48).abs() < 1e-9);
    }

    #[test]
    fn conversion_rate_only_counts_tracked_requests() {
        let variant = variant();
        let requests = vec![
            RequestRecord::new(Some(variant.id), 10).with_conversion(true),
            RequestRecord::new(Some(variant.id), 10).with_conversion(false),
            RequestRecord::new(Some(variant.id), 10),
        ];

        let metrics = VariantMetrics::aggregate(&variant, &requests);
        assert_eq!(metrics.conversions, Some(1));
        assert_eq!(metrics.conversion_samples, 2);
        assert_eq!(metrics.conversion_rate, Some(0.5));
    }
}
