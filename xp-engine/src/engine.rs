// Copyright (C) 2025 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

use crate::{
    ai_config::AiConfig,
    audit::{PromotionRecord, RollbackRecord},
    eligibility::{self, EligibilityResult},
    error::{Error, Result},
    experiment::Variant,
    hooks::PostCommitHook,
    metrics::{self, VariantMetrics},
    promotion_config::AutoPromotionConfig,
    store::{ExperimentStore, PromotionCommit},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionResult {
    pub success: bool,
    pub dry_run: bool,
    /// Only set when the promotion was committed.
    pub promotion_id: Option<Uuid>,
    pub promoted_variant: Variant,
    pub previous_config: AiConfig,
    pub new_config: AiConfig,
    /// The audit row. For a dry run this is what would have been written.
    pub record: PromotionRecord,
    pub eligibility: EligibilityResult,
}

/// Evaluates experiments and commits promotions and rollbacks against an [`ExperimentStore`].
///
/// Holds no state between calls apart from the store handle and the hook list.
#[derive(Clone)]
pub struct PromotionEngine {
    store: Arc<dyn ExperimentStore>,
    hooks: Vec<Arc<dyn PostCommitHook>>,
}

impl PromotionEngine {
    pub fn new(store: Arc<dyn ExperimentStore>) -> Self {
        Self {
            store,
            hooks: vec![],
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn PostCommitHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn store(&self) -> &Arc<dyn ExperimentStore> {
        &self.store
    }

    /// Metrics for every variant of the named experiment, in variant creation order.
    pub async fn get_variant_metrics(&self, experiment_name: &str) -> Result<Vec<VariantMetrics>> {
        let snapshot = metrics::load_snapshot(self.store.as_ref(), experiment_name).await?;
        Ok(snapshot.metrics)
    }

    /// Evaluate the named experiment without writing anything.
    pub async fn check_promotion_eligibility(
        &self,
        experiment_name: &str,
        config: &AutoPromotionConfig,
    ) -> Result<EligibilityResult> {
        config.ensure_valid()?;
        let snapshot = metrics::load_snapshot(self.store.as_ref(), experiment_name).await?;
        Ok(eligibility::evaluate(
            &snapshot.experiment,
            &snapshot.metrics,
            config,
            Utc::now(),
        ))
    }

    /// Re-evaluate the named experiment and, if a winner is eligible, make its configuration the
    /// new base configuration and end the experiment.
    ///
    /// Fails with [`Error::NotEligible`] without writing when the re-check fails, and with
    /// [`Error::ConcurrentModification`] if the base configuration moved on in the meantime.
    pub async fn promote_winner(
        &self,
        experiment_name: &str,
        config: &AutoPromotionConfig,
    ) -> Result<PromotionResult> {
        config.ensure_valid()?;
        let snapshot = metrics::load_snapshot(self.store.as_ref(), experiment_name).await?;
        let now = Utc::now();
        let eligibility =
            eligibility::evaluate(&snapshot.experiment, &snapshot.metrics, config, now);

        if !eligibility.eligible {
            return Err(Error::NotEligible {
                experiment: experiment_name.to_string(),
                reason: eligibility.reason,
            });
        }
        let winner = eligibility
            .candidate_variant_id
            .and_then(|id| snapshot.variants.iter().find(|v| v.id == id))
            .cloned()
            .ok_or_else(|| Error::NotEligible {
                experiment: experiment_name.to_string(),
                reason: "eligible candidate is no longer part of the experiment".to_string(),
            })?;

        let current = self.store.current_config().await?;
        let previous_config = current.config.clone();
        let new_config =
            previous_config.merged(&winner.config_overrides, winner.prompt_id.as_deref())?;

        let mut record = PromotionRecord {
            id: Uuid::new_v4(),
            experiment_name: snapshot.experiment.name.clone(),
            promoted_variant_id: winner.id,
            previous_config: previous_config.clone(),
            new_config: new_config.clone(),
            promoted_at: now,
            reason: eligibility.reason.clone(),
            dry_run: config.dry_run,
        };

        if config.dry_run {
            info!(
                "Dry run: would promote variant {} of experiment {experiment_name}",
                winner.variant_name
            );
            return Ok(PromotionResult {
                success: true,
                dry_run: true,
                promotion_id: None,
                promoted_variant: winner,
                previous_config,
                new_config,
                record,
                eligibility,
            });
        }

        record = self
            .store
            .commit_promotion(PromotionCommit {
                experiment_id: snapshot.experiment.id,
                experiment_name: snapshot.experiment.name.clone(),
                winning_variant_id: winner.id,
                expected_config_version: current.version,
                previous_config: previous_config.clone(),
                new_config: new_config.clone(),
                reason: eligibility.reason.clone(),
                promoted_at: now,
            })
            .await
            .inspect_err(|err| {
                warn!("Failed to commit the promotion of {experiment_name}: {err}");
            })?;
        info!(
            "Promoted variant {} of experiment {experiment_name} as promotion {}",
            winner.variant_name, record.id
        );

        self.notify_promotion(&record).await;

        Ok(PromotionResult {
            success: true,
            dry_run: false,
            promotion_id: Some(record.id),
            promoted_variant: winner,
            previous_config,
            new_config,
            record,
            eligibility,
        })
    }

    async fn notify_promotion(&self, record: &PromotionRecord) {
        for hook in &self.hooks {
            if let Err(err) = hook.on_promotion(record).await {
                warn!(
                    "Post-commit hook {} failed for promotion {}: {err}",
                    hook.name(),
                    record.id
                );
            }
        }
    }

    pub(crate) async fn notify_rollback(&self, record: &RollbackRecord) {
        for hook in &self.hooks {
            if let Err(err) = hook.on_rollback(record).await {
                warn!(
                    "Post-commit hook {} failed for rollback {}: {err}",
                    hook.name(),
                    record.id
                );
            }
        }
    }
}
