// Copyright (C) 2025 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

use crate::audit::{PromotionRecord, RollbackRecord};
use async_trait::async_trait;

pub type HookResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Side effects that run after a promotion or rollback has been committed.
///
/// A failing hook is logged and otherwise ignored; it never undoes the commit.
#[async_trait]
pub trait PostCommitHook: Send + Sync {
    fn name(&self) -> &str;
    async fn on_promotion(&self, record: &PromotionRecord) -> HookResult;
    async fn on_rollback(&self, record: &RollbackRecord) -> HookResult;
}

/// Writes an audit line for every commit.
#[derive(Clone, Debug, Default)]
pub struct TracingHook;

#[async_trait]
impl PostCommitHook for TracingHook {
    fn name(&self) -> &str {
        "tracing"
    }

    async fn on_promotion(&self, record: &PromotionRecord) -> HookResult {
        info!(
            promotion_id = %record.id,
            experiment = %record.experiment_name,
            variant_id = %record.promoted_variant_id,
            "Promoted variant: {}",
            record.reason
        );
        Ok(())
    }

    async fn on_rollback(&self, record: &RollbackRecord) -> HookResult {
        info!(
            rollback_id = %record.id,
            promotion_id = %record.promotion_id,
            experiment = %record.experiment_name,
            "Rolled back promotion: {}",
            record.reason
        );
        Ok(())
    }
}
