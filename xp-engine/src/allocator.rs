// Copyright (C) 2025 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

use crate::{
    error::{Error, Result},
    experiment::{Experiment, TrafficAllocation, Variant, sort_by_creation, validate_percentages},
    store::ExperimentStore,
};
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::{collections::HashSet, sync::Arc};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Weighted random assignment of requests to the variants of an experiment.
pub struct TrafficAllocator {
    store: Arc<dyn ExperimentStore>,
    rng: Mutex<StdRng>,
}

impl TrafficAllocator {
    pub fn new(store: Arc<dyn ExperimentStore>) -> Self {
        Self {
            store,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// An allocator whose sequence of draws is reproducible.
    pub fn with_seed(store: Arc<dyn ExperimentStore>, seed: u64) -> Self {
        Self {
            store,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Pick a variant of an active experiment according to the traffic percentages.
    pub async fn assign_variant(&self, experiment_id: Uuid) -> Result<Uuid> {
        let experiment = self.active_experiment(experiment_id).await?;
        let mut variants = self.store.variants_for(experiment_id).await?;
        sort_by_creation(&mut variants);

        let draw = self.rng.lock().await.gen_range(0.0..100.0);
        let variant = select_variant(&variants, draw).ok_or_else(|| {
            Error::validation(format!(
                "experiment '{}' has no variant with positive traffic",
                experiment.name
            ))
        })?;
        trace!(
            "Assigned variant {} of {} for draw {draw:.3}",
            variant.variant_name, experiment.name
        );
        Ok(variant.id)
    }

    /// Replace the traffic percentages of every variant of an active experiment at once.
    ///
    /// Nothing is written unless the full set of allocations is valid.
    pub async fn adjust_traffic(
        &self,
        experiment_id: Uuid,
        allocations: Vec<TrafficAllocation>,
    ) -> Result<Vec<Variant>> {
        let experiment = self.active_experiment(experiment_id).await?;
        let variants = self.store.variants_for(experiment_id).await?;

        let errors = validate_allocations(&variants, &allocations);
        if !errors.is_empty() {
            debug!(
                "Rejected traffic update for {}: {}",
                experiment.name,
                errors.join("; ")
            );
            return Err(Error::Validation { errors });
        }

        let mut updated = self.store.update_traffic(experiment_id, allocations).await?;
        sort_by_creation(&mut updated);
        info!(
            "Rebalanced traffic of experiment {}: {}",
            experiment.name,
            updated
                .iter()
                .map(|v| format!("{}={}", v.variant_name, v.traffic_percentage))
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(updated)
    }

    async fn active_experiment(&self, experiment_id: Uuid) -> Result<Experiment> {
        let experiment = self
            .store
            .experiment_by_id(experiment_id)
            .await?
            .ok_or_else(|| Error::ExperimentNotFound(experiment_id.to_string()))?;
        if !experiment.is_active {
            return Err(Error::validation(format!(
                "experiment '{}' is not active",
                experiment.name
            )));
        }
        Ok(experiment)
    }
}

/// Walk `variants` in order, accumulating percentages, and return the first whose cumulative
/// boundary exceeds `draw`. Variants with no traffic are never selected and any remainder left by
/// a total under 100 goes to the last variant with traffic.
pub fn select_variant(variants: &[Variant], draw: f64) -> Option<&Variant> {
    let mut cumulative = 0.0;
    for variant in variants {
        if variant.traffic_percentage <= 0.0 {
            continue;
        }
        cumulative += variant.traffic_percentage;
        if draw < cumulative {
            return Some(variant);
        }
    }
    variants.iter().rev().find(|v| v.traffic_percentage > 0.0)
}

/// Every violation of a full traffic update: exactly one allocation per variant, each in
/// `[0, 100]`, summing to 100 within tolerance.
pub fn validate_allocations(variants: &[Variant], allocations: &[TrafficAllocation]) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();
    let mut labelled = Vec::with_capacity(allocations.len());

    for allocation in allocations {
        match variants.iter().find(|v| v.id == allocation.variant_id) {
            Some(variant) => {
                if !seen.insert(variant.id) {
                    errors.push(format!(
                        "variant '{}' is allocated more than once",
                        variant.variant_name
                    ));
                }
                labelled.push((variant.variant_name.as_str(), allocation.traffic_percentage));
            }
            None => errors.push(format!(
                "variant {} does not belong to the experiment",
                allocation.variant_id
            )),
        }
    }
    for variant in variants {
        if !seen.contains(&variant.id) {
            errors.push(format!(
                "variant '{}' is missing an allocation",
                variant.variant_name
            ));
        }
    }

    errors.extend(validate_percentages(labelled.into_iter()));
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn variants(percentages: &[f64]) -> Vec<Variant> {
        let experiment_id = Uuid::new_v4();
        percentages
            .iter()
            .enumerate()
            .map(|(i, pct)| Variant {
                id: Uuid::new_v4(),
                experiment_id,
                variant_name: format!("v{i}"),
                traffic_percentage: *pct,
                config_overrides: Default::default(),
                prompt_id: None,
                created_at: Utc::now(),
            })
            .collect()
    }

    #[test]
    fn draws_fall_into_cumulative_buckets() {
        let variants = variants(&[70.0, 30.0]);
        assert_eq!(select_variant(&variants, 0.0).unwrap().id, variants[0].id);
        assert_eq!(select_variant(&variants, 69.999).unwrap().id, variants[0].id);
        assert_eq!(select_variant(&variants, 70.0).unwrap().id, variants[1].id);
        assert_eq!(select_variant(&variants, 99.999).unwrap().id, variants[1].id);
    }

    #[test]
    fn remainder_goes_to_the_last_weighted_variant() {
        let variants = variants(&[33.3, 33.3, 33.3, 0.0]);
        assert_eq!(select_variant(&variants, 99.95).unwrap().id, variants[2].id);
    }

    #[test]
    fn zero_weight_variants_are_never_selected() {
        let variants = variants(&[0.0, 100.0]);
        assert_eq!(select_variant(&variants, 0.0).unwrap().id, variants[1].id);
        assert!(select_variant(&self::variants(&[0.0, 0.0]), 10.0).is_none());
    }

    #[test]
    fn allocations_must_cover_every_variant_once() {
        let variants = variants(&[50.0, 50.0]);
        let allocations = vec![
            TrafficAllocation {
                variant_id: variants[0].id,
                traffic_percentage: 50.0,
            },
            TrafficAllocation {
                variant_id: variants[0].id,
                traffic_percentage: 50.0,
            },
        ];
        let errors = validate_allocations(&variants, &allocations);
        assert_eq!(errors.len(), 2, "{errors:?}");
        assert!(errors.iter().any(|e| e.contains("more than once")));
        assert!(errors.iter().any(|e| e.contains("missing an allocation")));
    }

    #[test]
    fn unknown_and_out_of_range_allocations_are_reported() {
        let variants = variants(&[50.0, 50.0]);
        let allocations = vec![
            TrafficAllocation {
                variant_id: variants[0].id,
                traffic_percentage: 150.0,
            },
            TrafficAllocation {
                variant_id: variants[1].id,
                traffic_percentage: -50.0,
            },
            TrafficAllocation {
                variant_id: Uuid::new_v4(),
                traffic_percentage: 0.0,
            },
        ];
        let errors = validate_allocations(&variants, &allocations);
        assert_eq!(errors.len(), 3, "{errors:?}");
        assert!(errors.iter().any(|e| e.contains("does not belong")));
    }
}
