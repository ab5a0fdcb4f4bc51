// Copyright (C) 2025 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

use crate::{
    engine::{PromotionEngine, PromotionResult},
    error::{Error, ErrorKind, Result},
    promotion_config::AutoPromotionConfig,
};
use futures::future::join_all;
use serde::{Deserialize, Serialize};

pub const DISABLED_REASON: &str = "auto-promotion disabled";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedExperiment {
    pub name: String,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanError {
    pub name: String,
    pub code: String,
    pub message: String,
}

/// Outcome of a scan over every active experiment.
///
/// `promotions` includes dry-run results, `promoted` only counts committed promotions.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub scanned: usize,
    pub promoted: usize,
    pub skipped: Vec<SkippedExperiment>,
    pub errors: Vec<ScanError>,
    pub promotions: Vec<PromotionResult>,
}

impl ScanResult {
    fn insert_outcome(&mut self, name: String, outcome: Result<PromotionResult>) {
        match outcome {
            Ok(promotion) => {
                if !promotion.dry_run {
                    self.promoted += 1;
                }
                self.promotions.push(promotion);
            }
            Err(err) => match err.kind() {
                ErrorKind::NotFound | ErrorKind::NotEligible => {
                    debug!("Skipping experiment {name}: {err}");
                    self.skipped.push(SkippedExperiment {
                        name,
                        reason: skip_reason(err),
                    });
                }
                ErrorKind::Validation | ErrorKind::TransientStore => {
                    error!("Failed to promote experiment {name}: {err}");
                    self.errors.push(ScanError {
                        name,
                        code: err.kind().code().to_string(),
                        message: err.to_string(),
                    });
                }
            },
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

fn skip_reason(err: Error) -> String {
    match err {
        Error::NotEligible { reason, .. } => reason,
        other => other.to_string(),
    }
}

impl PromotionEngine {
    /// Try to promote a winner in every active experiment.
    ///
    /// A failure in one experiment is recorded in the result and never aborts the others. Only a
    /// failure to validate the config or to list the experiments fails the whole scan.
    ///
    /// Every eligible experiment is promoted, each one re-evaluated against the config left by
    /// the promotions before it.
    pub async fn scan_and_promote_winners(&self, config: &AutoPromotionConfig) -> Result<ScanResult> {
        config.ensure_valid()?;
        let experiments = self.store().list_active_experiments().await?;
        let mut scan_result = ScanResult {
            scanned: experiments.len(),
            ..Default::default()
        };

        if !config.enabled {
            info!(
                "Auto-promotion is disabled, skipping {} active experiments",
                experiments.len()
            );
            scan_result.skipped = experiments
                .into_iter()
                .map(|experiment| SkippedExperiment {
                    name: experiment.name,
                    reason: DISABLED_REASON.to_string(),
                })
                .collect();
            return Ok(scan_result);
        }

        debug!("Scanning {} active experiments", experiments.len());
        // Evaluation only reads, so it runs for every experiment at once. Every commit writes the
        // same versioned config row and so the promotions go one at a time.
        let evaluations = join_all(
            experiments
                .iter()
                .map(|experiment| self.check_promotion_eligibility(&experiment.name, config)),
        )
        .await;

        for (experiment, evaluation) in experiments.into_iter().zip(evaluations) {
            let outcome = match evaluation {
                Ok(eligibility) if !eligibility.eligible => Err(Error::NotEligible {
                    experiment: experiment.name.clone(),
                    reason: eligibility.reason,
                }),
                Ok(_) => self.promote_in_scan(&experiment.name, config).await,
                Err(err) => Err(err),
            };
            scan_result.insert_outcome(experiment.name, outcome);
        }

        info!(
            "Scanned {} experiments: {} promoted, {} skipped, {} errors",
            scan_result.scanned,
            scan_result.promoted,
            scan_result.skipped.len(),
            scan_result.errors.len()
        );
        Ok(scan_result)
    }

    /// A commit that loses the config row to a writer outside the scan is re-evaluated once.
    async fn promote_in_scan(
        &self,
        experiment_name: &str,
        config: &AutoPromotionConfig,
    ) -> Result<PromotionResult> {
        match self.promote_winner(experiment_name, config).await {
            Err(Error::ConcurrentModification { expected, actual }) => {
                debug!(
                    "Config moved from version {expected} to {actual} while promoting \
                     {experiment_name}, evaluating again"
                );
                self.promote_winner(experiment_name, config).await
            }
            outcome => outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ai_config::AiConfig,
        audit::PromotionRecord,
        eligibility::EligibilityResult,
        experiment::Variant,
    };
    use chrono::Utc;
    use uuid::Uuid;

    fn promotion(dry_run: bool) -> PromotionResult {
        let variant = Variant {
            id: Uuid::new_v4(),
            experiment_id: Uuid::new_v4(),
            variant_name: "b".to_string(),
            traffic_percentage: 50.0,
            config_overrides: Default::default(),
            prompt_id: None,
            created_at: Utc::now(),
        };
        PromotionResult {
            success: true,
            dry_run,
            promotion_id: (!dry_run).then(Uuid::new_v4),
            record: PromotionRecord {
                id: Uuid::new_v4(),
                experiment_name: "x".to_string(),
                promoted_variant_id: variant.id,
                previous_config: AiConfig::default(),
                new_config: AiConfig::default(),
                promoted_at: Utc::now(),
                reason: "better".to_string(),
                dry_run,
            },
            promoted_variant: variant,
            previous_config: AiConfig::default(),
            new_config: AiConfig::default(),
            eligibility: EligibilityResult {
                eligible: true,
                candidate_variant_id: None,
                candidate_variant_name: None,
                baseline_variant_id: None,
                confidence: Some(0.99),
                reason: "better".to_string(),
                excluded: vec![],
            },
        }
    }

    #[test]
    fn outcomes_are_sorted_by_error_kind() {
        let mut result = ScanResult::default();
        result.insert_outcome("a".to_string(), Ok(promotion(false)));
        result.insert_outcome("b".to_string(), Ok(promotion(true)));
        result.insert_outcome(
            "c".to_string(),
            Err(Error::NotEligible {
                experiment: "c".to_string(),
                reason: "experiment inactive".to_string(),
            }),
        );
        result.insert_outcome(
            "d".to_string(),
            Err(Error::TransientStore {
                reason: "connection reset".to_string(),
            }),
        );

        assert_eq!(result.promoted, 1);
        assert_eq!(result.promotions.len(), 2);
        assert_eq!(
            result.skipped,
            vec![SkippedExperiment {
                name: "c".to_string(),
                reason: "experiment inactive".to_string(),
            }]
        );
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, "TRANSIENT_STORE_ERROR");
        assert!(result.has_errors());
    }
}
