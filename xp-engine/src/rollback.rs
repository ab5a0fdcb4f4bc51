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
    engine::PromotionEngine,
    error::{Error, Result},
    store::RollbackCommit,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RollbackStatus {
    RolledBack,
    AlreadyRolledBack,
}

impl fmt::Display for RollbackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RollbackStatus::RolledBack => write!(f, "rolled back"),
            RollbackStatus::AlreadyRolledBack => write!(f, "already rolled back"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackResult {
    pub success: bool,
    pub status: RollbackStatus,
    pub promotion_id: Uuid,
    /// The promotion's `previous_config`.
    pub rolled_back_to: AiConfig,
    pub reason: String,
    /// The audit row written by this call, or the existing one when already rolled back.
    pub rollback_id: Uuid,
}

impl RollbackResult {
    fn already_rolled_back(promotion: &PromotionRecord, existing: &RollbackRecord) -> Self {
        Self {
            success: false,
            status: RollbackStatus::AlreadyRolledBack,
            promotion_id: promotion.id,
            rolled_back_to: promotion.previous_config.clone(),
            reason: format!(
                "promotion was already rolled back at {}: {}",
                existing.rolled_back_at.to_rfc3339(),
                existing.reason
            ),
            rollback_id: existing.id,
        }
    }
}

impl PromotionEngine {
    /// Restore the configuration that preceded a promotion.
    ///
    /// Rolling back the same promotion again writes nothing and returns a result with
    /// `success: false` and [`RollbackStatus::AlreadyRolledBack`]. The experiment itself stays
    /// ended.
    pub async fn rollback_promotion(&self, promotion_id: Uuid, reason: &str) -> Result<RollbackResult> {
        if reason.trim().is_empty() {
            return Err(Error::validation("a rollback reason is required"));
        }

        let promotion = self
            .store()
            .promotion(promotion_id)
            .await?
            .ok_or(Error::PromotionNotFound(promotion_id))?;

        if let Some(existing) = self.existing_rollback(promotion_id).await? {
            info!("Promotion {promotion_id} has already been rolled back");
            return Ok(RollbackResult::already_rolled_back(&promotion, &existing));
        }

        let current = self.store().current_config().await?;
        let commit = RollbackCommit {
            promotion_id,
            expected_config_version: current.version,
            reason: reason.to_string(),
            rolled_back_at: Utc::now(),
        };
        let record = match self.store().commit_rollback(commit).await {
            Ok(record) => record,
            // Another caller got there between the read and the commit.
            Err(Error::AlreadyRolledBack(_)) => {
                let Some(existing) = self.existing_rollback(promotion_id).await? else {
                    return Err(Error::AlreadyRolledBack(promotion_id));
                };
                return Ok(RollbackResult::already_rolled_back(&promotion, &existing));
            }
            Err(err) => {
                error!("Failed to roll back promotion {promotion_id}: {err}");
                return Err(err);
            }
        };
        info!(
            "Rolled back promotion {promotion_id} of experiment {}",
            promotion.experiment_name
        );

        self.notify_rollback(&record).await;

        Ok(RollbackResult {
            success: true,
            status: RollbackStatus::RolledBack,
            promotion_id,
            rolled_back_to: record.restored_config,
            reason: record.reason,
            rollback_id: record.id,
        })
    }

    async fn existing_rollback(&self, promotion_id: Uuid) -> Result<Option<RollbackRecord>> {
        let rollbacks = self.store().rollbacks_for(promotion_id).await?;
        Ok(rollbacks.into_iter().next())
    }
}
