// Copyright (C) 2025 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

pub mod registry;

use crate::{
    ai_config::{AiConfig, VersionedConfig},
    audit::{PromotionRecord, RollbackRecord},
    error::Result,
    experiment::{Experiment, RequestRecord, TrafficAllocation, Variant},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use registry::ExperimentRegistry;

/// Everything the promotion commit writes in one transaction.
#[derive(Clone, Debug, PartialEq)]
pub struct PromotionCommit {
    pub experiment_id: Uuid,
    pub experiment_name: String,
    pub winning_variant_id: Uuid,
    /// The commit fails with `ConcurrentModification` if the config row moved on.
    pub expected_config_version: u64,
    pub previous_config: AiConfig,
    pub new_config: AiConfig,
    pub reason: String,
    pub promoted_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RollbackCommit {
    pub promotion_id: Uuid,
    pub expected_config_version: u64,
    pub reason: String,
    pub rolled_back_at: DateTime<Utc>,
}

/// The relational data the engine reads and writes.
///
/// Multi-row writes (`insert_experiment`, `update_traffic`, `commit_promotion`,
/// `commit_rollback`) must be all-or-nothing.
#[async_trait]
pub trait ExperimentStore: Send + Sync {
    async fn experiment_by_name(&self, name: &str) -> Result<Option<Experiment>>;
    async fn experiment_by_id(&self, id: Uuid) -> Result<Option<Experiment>>;
    async fn list_experiments(&self) -> Result<Vec<Experiment>>;
    async fn list_active_experiments(&self) -> Result<Vec<Experiment>>;
    /// Variants of one experiment in the order they were stored.
    async fn variants_for(&self, experiment_id: Uuid) -> Result<Vec<Variant>>;
    async fn requests_for_variant(&self, variant_id: Uuid) -> Result<Vec<RequestRecord>>;
    async fn record_request(&self, request: RequestRecord) -> Result<()>;
    /// Fails with a validation error if an active experiment already uses the name.
    async fn insert_experiment(&self, experiment: Experiment, variants: Vec<Variant>)
    -> Result<()>;
    async fn end_experiment(&self, experiment_id: Uuid, ended_at: DateTime<Utc>)
    -> Result<Experiment>;
    async fn update_traffic(
        &self,
        experiment_id: Uuid,
        allocations: Vec<TrafficAllocation>,
    ) -> Result<Vec<Variant>>;
    async fn current_config(&self) -> Result<VersionedConfig>;
    /// Writes the new config, ends the experiment with its winner and appends the record.
    async fn commit_promotion(&self, commit: PromotionCommit) -> Result<PromotionRecord>;
    async fn promotion(&self, id: Uuid) -> Result<Option<PromotionRecord>>;
    async fn list_promotions(&self) -> Result<Vec<PromotionRecord>>;
    /// Restores the promotion's previous config and appends the rollback record.
    async fn commit_rollback(&self, commit: RollbackCommit) -> Result<RollbackRecord>;
    async fn rollbacks_for(&self, promotion_id: Uuid) -> Result<Vec<RollbackRecord>>;
}
