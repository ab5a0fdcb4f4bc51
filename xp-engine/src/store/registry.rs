// Copyright (C) 2025 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

use super::{ExperimentStore, PromotionCommit, RollbackCommit};
use crate::{
    ai_config::{AiConfig, VersionedConfig},
    audit::{PromotionRecord, RollbackRecord},
    error::{Error, Result},
    experiment::{Experiment, RequestRecord, TrafficAllocation, Variant},
};
use async_trait::async_trait;
use atomic_write_file::AtomicWriteFile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::RwLock;
use uuid::Uuid;

pub const REGISTRY_SCHEMA_LATEST: u32 = 1;

/// A JSON-file backed [`ExperimentStore`], or a purely in-memory one when no save path is set.
///
/// Each write is staged on a copy of the data, persisted atomically, and only then swapped in,
/// so a failed write leaves both the file and the in-memory state untouched.
///
/// Can be cloned freely.
#[derive(Clone, Debug)]
pub struct ExperimentRegistry {
    data: Arc<RwLock<RegistryData>>,
    save_path: Option<PathBuf>,
}

/// The struct that is written to the fs.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistryData {
    schema_version: u32,
    base_config: VersionedConfig,
    experiments: Vec<Experiment>,
    variants: Vec<Variant>,
    requests: Vec<RequestRecord>,
    promotions: Vec<PromotionRecord>,
    rollbacks: Vec<RollbackRecord>,
}

impl RegistryData {
    fn new(base_config: AiConfig) -> Self {
        Self {
            schema_version: REGISTRY_SCHEMA_LATEST,
            base_config: VersionedConfig::initial(base_config),
            experiments: vec![],
            variants: vec![],
            requests: vec![],
            promotions: vec![],
            rollbacks: vec![],
        }
    }

    fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("Loading an empty experiment registry as {path:?} does not exist");
            return Ok(Self::new(AiConfig::default()));
        }
        debug!("Loading experiment registry from {}", path.to_string_lossy());

        let contents = std::fs::read_to_string(path)
            .inspect_err(|err| error!("Error reading experiment registry: {err:?}"))?;

        if contents.trim().is_empty() {
            info!("Experiment registry file is empty, returning an empty registry");
            return Ok(Self::new(AiConfig::default()));
        }

        let data: Self = serde_json::from_str(&contents)
            .inspect_err(|err| error!("Error deserializing experiment registry: {err:?}"))?;
        if data.schema_version > REGISTRY_SCHEMA_LATEST {
            return Err(Error::TransientStore {
                reason: format!(
                    "registry schema version {} is newer than the supported version {REGISTRY_SCHEMA_LATEST}",
                    data.schema_version
                ),
            });
        }

        trace!("Loaded experiment registry: {data:?}");
        Ok(data)
    }

    fn save(&self, path: &Path) -> Result<()> {
        debug!("Saving experiment registry to {}", path.to_string_lossy());
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).inspect_err(|err| {
                error!("Error creating experiment registry parent {parent:?}: {err:?}")
            })?;
        }

        let mut file = AtomicWriteFile::options().open(path).inspect_err(|err| {
            error!("Failed to open registry file at {path:?} using AtomicWriteFile: {err}");
        })?;
        let json = serde_json::to_string_pretty(self)?;
        writeln!(file, "{json}")?;
        file.commit().inspect_err(|err| {
            error!("Failed to commit atomic write of the registry: {err}");
        })?;

        Ok(())
    }

    fn experiment_mut(&mut self, experiment_id: Uuid) -> Result<&mut Experiment> {
        self.experiments
            .iter_mut()
            .find(|experiment| experiment.id == experiment_id)
            .ok_or_else(|| Error::ExperimentNotFound(experiment_id.to_string()))
    }
}

impl ExperimentRegistry {
    /// A registry that lives only in memory, with the default base configuration.
    pub fn in_memory() -> Self {
        Self::in_memory_with_config(AiConfig::default())
    }

    pub fn in_memory_with_config(base_config: AiConfig) -> Self {
        Self {
            data: Arc::new(RwLock::new(RegistryData::new(base_config))),
            save_path: None,
        }
    }

    /// Loads the registry from the specified path.
    /// If the file does not exist, an empty registry is returned and created on the first write.
    #[allow(clippy::unused_async)]
    pub async fn load(path: &Path) -> Result<Self> {
        let data = RegistryData::load(path)?;
        Ok(Self {
            data: Arc::new(RwLock::new(data)),
            save_path: Some(path.to_path_buf()),
        })
    }

    pub fn save_path(&self) -> Option<&Path> {
        self.save_path.as_deref()
    }

    /// Run `op` against a staged copy of the data and swap it in once it has been persisted.
    async fn transact<T>(&self, op: impl FnOnce(&mut RegistryData) -> Result<T>) -> Result<T> {
        let mut data = self.data.write().await;
        let mut staged = data.clone();
        let output = op(&mut staged)?;
        if let Some(path) = &self.save_path {
            staged.save(path)?;
        }
        *data = staged;
        Ok(output)
    }
}

#[async_trait]
impl ExperimentStore for ExperimentRegistry {
    async fn experiment_by_name(&self, name: &str) -> Result<Option<Experiment>> {
        let data = self.data.read().await;
        // Prefer the active experiment holding the name, then the most recently started one.
        let experiment = data
            .experiments
            .iter()
            .filter(|experiment| experiment.name == name)
            .max_by_key(|experiment| (experiment.is_active, experiment.start_date))
            .cloned();
        Ok(experiment)
    }

    async fn experiment_by_id(&self, id: Uuid) -> Result<Option<Experiment>> {
        let data = self.data.read().await;
        Ok(data.experiments.iter().find(|e| e.id == id).cloned())
    }

    async fn list_experiments(&self) -> Result<Vec<Experiment>> {
        Ok(self.data.read().await.experiments.clone())
    }

    async fn list_active_experiments(&self) -> Result<Vec<Experiment>> {
        let data = self.data.read().await;
        Ok(data
            .experiments
            .iter()
            .filter(|experiment| experiment.is_active)
            .cloned()
            .collect())
    }

    async fn variants_for(&self, experiment_id: Uuid) -> Result<Vec<Variant>> {
        let data = self.data.read().await;
        Ok(data
            .variants
            .iter()
            .filter(|variant| variant.experiment_id == experiment_id)
            .cloned()
            .collect())
    }

    async fn requests_for_variant(&self, variant_id: Uuid) -> Result<Vec<RequestRecord>> {
        let data = self.data.read().await;
        Ok(data
            .requests
            .iter()
            .filter(|request| request.variant_id == Some(variant_id))
            .cloned()
            .collect())
    }

    async fn record_request(&self, request: RequestRecord) -> Result<()> {
        self.transact(|data| {
            if let Some(variant_id) = request.variant_id {
                if !data.variants.iter().any(|v| v.id == variant_id) {
                    return Err(Error::VariantNotFound(variant_id));
                }
            }
            data.requests.push(request);
            Ok(())
        })
        .await
    }

    async fn insert_experiment(
        &self,
        experiment: Experiment,
        variants: Vec<Variant>,
    ) -> Result<()> {
        self.transact(|data| {
            if data
                .experiments
                .iter()
                .any(|existing| existing.is_active && existing.name == experiment.name)
            {
                return Err(Error::validation(format!(
                    "experiment '{}' is already active",
                    experiment.name
                )));
            }
            info!(
                "Inserting experiment {} ({}) with {} variants",
                experiment.name,
                experiment.id,
                variants.len()
            );
            data.experiments.push(experiment);
            data.variants.extend(variants);
            Ok(())
        })
        .await
    }

    async fn end_experiment(
        &self,
        experiment_id: Uuid,
        ended_at: DateTime<Utc>,
    ) -> Result<Experiment> {
        self.transact(|data| {
            let experiment = data.experiment_mut(experiment_id)?;
            if !experiment.is_active {
                return Err(Error::validation(format!(
                    "experiment '{}' has already ended",
                    experiment.name
                )));
            }
            experiment.is_active = false;
            experiment.end_date = Some(ended_at);
            Ok(experiment.clone())
        })
        .await
    }

    async fn update_traffic(
        &self,
        experiment_id: Uuid,
        allocations: Vec<TrafficAllocation>,
    ) -> Result<Vec<Variant>> {
        self.transact(|data| {
            let experiment = data.experiment_mut(experiment_id)?;
            if !experiment.is_active {
                return Err(Error::validation(format!(
                    "experiment '{}' is not active",
                    experiment.name
                )));
            }
            for allocation in &allocations {
                let variant = data
                    .variants
                    .iter_mut()
                    .find(|v| v.id == allocation.variant_id && v.experiment_id == experiment_id)
                    .ok_or(Error::VariantNotFound(allocation.variant_id))?;
                variant.traffic_percentage = allocation.traffic_percentage;
            }
            Ok(data
                .variants
                .iter()
                .filter(|v| v.experiment_id == experiment_id)
                .cloned()
                .collect())
        })
        .await
    }

    async fn current_config(&self) -> Result<VersionedConfig> {
        Ok(self.data.read().await.base_config.clone())
    }

    async fn commit_promotion(&self, commit: PromotionCommit) -> Result<PromotionRecord> {
        self.transact(|data| {
            if data.base_config.version != commit.expected_config_version {
                return Err(Error::ConcurrentModification {
                    expected: commit.expected_config_version,
                    actual: data.base_config.version,
                });
            }

            let experiment = data.experiment_mut(commit.experiment_id)?;
            if !experiment.is_active {
                return Err(Error::NotEligible {
                    experiment: experiment.name.clone(),
                    reason: "experiment was ended by another caller".to_string(),
                });
            }
            experiment.is_active = false;
            experiment.end_date = Some(commit.promoted_at);
            experiment.winning_variant_id = Some(commit.winning_variant_id);

            data.base_config = VersionedConfig {
                version: data.base_config.version + 1,
                config: commit.new_config.clone(),
                updated_at: commit.promoted_at,
            };

            let record = PromotionRecord {
                id: Uuid::new_v4(),
                experiment_name: commit.experiment_name,
                promoted_variant_id: commit.winning_variant_id,
                previous_config: commit.previous_config,
                new_config: commit.new_config,
                promoted_at: commit.promoted_at,
                reason: commit.reason,
                dry_run: false,
            };
            data.promotions.push(record.clone());
            Ok(record)
        })
        .await
    }

    async fn promotion(&self, id: Uuid) -> Result<Option<PromotionRecord>> {
        let data = self.data.read().await;
        Ok(data.promotions.iter().find(|p| p.id == id).cloned())
    }

    async fn list_promotions(&self) -> Result<Vec<PromotionRecord>> {
        Ok(self.data.read().await.promotions.clone())
    }

    async fn commit_rollback(&self, commit: RollbackCommit) -> Result<RollbackRecord> {
        self.transact(|data| {
            let promotion = data
                .promotions
                .iter()
                .find(|p| p.id == commit.promotion_id)
                .cloned()
                .ok_or(Error::PromotionNotFound(commit.promotion_id))?;
            if data
                .rollbacks
                .iter()
                .any(|r| r.promotion_id == commit.promotion_id)
            {
                return Err(Error::AlreadyRolledBack(commit.promotion_id));
            }
            if data.base_config.version != commit.expected_config_version {
                return Err(Error::ConcurrentModification {
                    expected: commit.expected_config_version,
                    actual: data.base_config.version,
                });
            }

            let replaced_config = data.base_config.config.clone();
            data.base_config = VersionedConfig {
                version: data.base_config.version + 1,
                config: promotion.previous_config.clone(),
                updated_at: commit.rolled_back_at,
            };

            let record = RollbackRecord {
                id: Uuid::new_v4(),
                promotion_id: promotion.id,
                experiment_name: promotion.experiment_name,
                restored_config: promotion.previous_config,
                replaced_config,
                rolled_back_at: commit.rolled_back_at,
                reason: commit.reason,
            };
            data.rollbacks.push(record.clone());
            Ok(record)
        })
        .await
    }

    async fn rollbacks_for(&self, promotion_id: Uuid) -> Result<Vec<RollbackRecord>> {
        let data = self.data.read().await;
        Ok(data
            .rollbacks
            .iter()
            .filter(|r| r.promotion_id == promotion_id)
            .cloned()
            .collect())
    }
}

pub fn get_default_registry_path() -> Result<PathBuf> {
    let path = dirs_next::data_dir()
        .ok_or_else(|| {
            error!("Failed to get data_dir");
            Error::TransientStore {
                reason: "could not obtain the user's data directory".to_string(),
            }
        })?
        .join("xp-engine")
        .join("experiments.json");
    Ok(path)
}
