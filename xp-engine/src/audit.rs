// Copyright (C) 2025 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

//! Append-only audit rows written by promotions and rollbacks.

use crate::ai_config::AiConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionRecord {
    pub id: Uuid,
    pub experiment_name: String,
    pub promoted_variant_id: Uuid,
    /// Snapshot restored verbatim by a rollback.
    pub previous_config: AiConfig,
    pub new_config: AiConfig,
    pub promoted_at: DateTime<Utc>,
    pub reason: String,
    pub dry_run: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackRecord {
    pub id: Uuid,
    pub promotion_id: Uuid,
    pub experiment_name: String,
    pub restored_config: AiConfig,
    /// The configuration that was live when the rollback was applied.
    pub replaced_config: AiConfig,
    pub rolled_back_at: DateTime<Utc>,
    pub reason: String,
}
