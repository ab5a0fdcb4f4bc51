// Copyright (C) 2025 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

mod common;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use color_eyre::eyre::Result;
use common::{SeedVariant, seed_checkout_copy, seed_experiment};
use mockall::mock;
use std::sync::Arc;
use uuid::Uuid;
use xp_engine::{
    AutoPromotionConfig, Error, Experiment, ExperimentRegistry, ExperimentStore, NewExperiment,
    NewVariant, PromotionEngine, PromotionRecord, RequestRecord, RollbackRecord,
    TrafficAllocation, Variant, VersionedConfig,
    store::{PromotionCommit, RollbackCommit},
};

mock! {
    pub Store {}
    #[async_trait]
    impl ExperimentStore for Store {
        async fn experiment_by_name(&self, name: &str) -> xp_engine::Result<Option<Experiment>>;
        async fn experiment_by_id(&self, id: Uuid) -> xp_engine::Result<Option<Experiment>>;
        async fn list_experiments(&self) -> xp_engine::Result<Vec<Experiment>>;
        async fn list_active_experiments(&self) -> xp_engine::Result<Vec<Experiment>>;
        async fn variants_for(&self, experiment_id: Uuid) -> xp_engine::Result<Vec<Variant>>;
        async fn requests_for_variant(&self, variant_id: Uuid) -> xp_engine::Result<Vec<RequestRecord>>;
        async fn record_request(&self, request: RequestRecord) -> xp_engine::Result<()>;
        async fn insert_experiment(&self, experiment: Experiment, variants: Vec<Variant>) -> xp_engine::Result<()>;
        async fn end_experiment(&self, experiment_id: Uuid, ended_at: DateTime<Utc>) -> xp_engine::Result<Experiment>;
        async fn update_traffic(&self, experiment_id: Uuid, allocations: Vec<TrafficAllocation>) -> xp_engine::Result<Vec<Variant>>;
        async fn current_config(&self) -> xp_engine::Result<VersionedConfig>;
        async fn commit_promotion(&self, commit: PromotionCommit) -> xp_engine::Result<PromotionRecord>;
        async fn promotion(&self, id: Uuid) -> xp_engine::Result<Option<PromotionRecord>>;
        async fn list_promotions(&self) -> xp_engine::Result<Vec<PromotionRecord>>;
        async fn commit_rollback(&self, commit: RollbackCommit) -> xp_engine::Result<RollbackRecord>;
        async fn rollbacks_for(&self, promotion_id: Uuid) -> xp_engine::Result<Vec<RollbackRecord>>;
    }
}

#[tokio::test]
async fn scan_promotes_the_winner_and_skips_the_rest() -> Result<()> {
    let registry = ExperimentRegistry::in_memory();
    seed_checkout_copy(&registry).await?;
    seed_experiment(
        &registry,
        "too-young",
        1,
        vec![
            SeedVariant::new("control", 600, 60),
            SeedVariant::new("b", 600, 0),
        ],
    )
    .await?;
    seed_experiment(
        &registry,
        "no-difference",
        10,
        vec![
            SeedVariant::new("control", 600, 6),
            SeedVariant::new("b", 600, 6),
        ],
    )
    .await?;
    let engine = PromotionEngine::new(Arc::new(registry.clone()));

    let result = engine
        .scan_and_promote_winners(&AutoPromotionConfig::default())
        .await?;

    assert_eq!(result.scanned, 3);
    assert_eq!(result.promoted, 1);
    assert_eq!(result.promotions[0].record.experiment_name, "checkout-copy");
    assert!(result.errors.is_empty());
    let mut skipped: Vec<_> = result.skipped.iter().map(|s| s.name.as_str()).collect();
    skipped.sort();
    assert_eq!(skipped, vec!["no-difference", "too-young"]);
    assert!(result.skipped.iter().all(|s| !s.reason.is_empty()));
    assert_eq!(registry.list_active_experiments().await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn disabled_scans_skip_everything() -> Result<()> {
    let registry = ExperimentRegistry::in_memory();
    seed_checkout_copy(&registry).await?;
    let engine = PromotionEngine::new(Arc::new(registry.clone()));
    let config = AutoPromotionConfig {
        enabled: false,
        ..Default::default()
    };

    let result = engine.scan_and_promote_winners(&config).await?;
    assert_eq!(result.scanned, 1);
    assert_eq!(result.promoted, 0);
    assert_eq!(result.skipped[0].reason, "auto-promotion disabled");
    assert!(registry.list_promotions().await?.is_empty());

    // A single-target promote is an explicit request and ignores the switch.
    let promotion = engine.promote_winner("checkout-copy", &config).await?;
    assert!(promotion.success);
    Ok(())
}

#[tokio::test]
async fn dry_run_scans_report_promotions_without_counting_them() -> Result<()> {
    let registry = ExperimentRegistry::in_memory();
    seed_checkout_copy(&registry).await?;
    let engine = PromotionEngine::new(Arc::new(registry.clone()));
    let config = AutoPromotionConfig {
        dry_run: true,
        ..Default::default()
    };

    let result = engine.scan_and_promote_winners(&config).await?;
    assert_eq!(result.promoted, 0);
    assert_eq!(result.promotions.len(), 1);
    assert!(result.promotions[0].dry_run);
    assert_eq!(registry.list_active_experiments().await?.len(), 1);
    Ok(())
}

/// An experiment whose store reads fail and one that loses the race for the config row must
/// not stop the scan of the others.
#[tokio::test]
async fn one_failing_experiment_does_not_abort_the_scan() -> Result<()> {
    let now = Utc::now();
    let (flaky, _) = new_rows("flaky", now);
    let (raced, raced_variants) = new_rows("raced", now);
    let control_id = raced_variants[0].id;

    let mut store = MockStore::new();
    let active = vec![flaky.clone(), raced.clone()];
    store
        .expect_list_active_experiments()
        .times(1)
        .returning(move || Ok(active.clone()));
    store
        .expect_experiment_by_name()
        .returning(move |name| match name {
            "flaky" => Err(Error::TransientStore {
                reason: "connection reset by peer".to_string(),
            }),
            _ => Ok(Some(raced.clone())),
        });
    store
        .expect_variants_for()
        .returning(move |_| Ok(raced_variants.clone()));
    store.expect_requests_for_variant().returning(move |id| {
        let errors = if id == control_id { 60 } else { 0 };
        Ok((0..1000)
            .map(|i| {
                let request = RequestRecord::new(Some(id), 500);
                if i < errors {
                    request.with_error("timeout")
                } else {
                    request
                }
            })
            .collect())
    });
    store
        .expect_current_config()
        .returning(|| Ok(VersionedConfig::initial(Default::default())));
    // The scan evaluates a lost race once more before giving up on the experiment.
    store.expect_commit_promotion().times(2).returning(|commit| {
        Err(Error::ConcurrentModification {
            expected: commit.expected_config_version,
            actual: commit.expected_config_version + 1,
        })
    });

    let engine = PromotionEngine::new(Arc::new(store));
    let result = engine
        .scan_and_promote_winners(&AutoPromotionConfig::default())
        .await?;

    assert_eq!(result.scanned, 2);
    assert_eq!(result.promoted, 0);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].name, "flaky");
    assert_eq!(result.errors[0].code, "TRANSIENT_STORE_ERROR");
    assert_eq!(result.skipped.len(), 1);
    assert_eq!(result.skipped[0].name, "raced");
    assert!(result.skipped[0].reason.contains("modified concurrently"));
    Ok(())
}

/// Suspends on every read and write the way a networked database does.
struct YieldingStore(ExperimentRegistry);

#[async_trait]
impl ExperimentStore for YieldingStore {
    async fn experiment_by_name(&self, name: &str) -> xp_engine::Result<Option<Experiment>> {
        tokio::task::yield_now().await;
        self.0.experiment_by_name(name).await
    }
    async fn experiment_by_id(&self, id: Uuid) -> xp_engine::Result<Option<Experiment>> {
        tokio::task::yield_now().await;
        self.0.experiment_by_id(id).await
    }
    async fn list_experiments(&self) -> xp_engine::Result<Vec<Experiment>> {
        self.0.list_experiments().await
    }
    async fn list_active_experiments(&self) -> xp_engine::Result<Vec<Experiment>> {
        self.0.list_active_experiments().await
    }
    async fn variants_for(&self, experiment_id: Uuid) -> xp_engine::Result<Vec<Variant>> {
        tokio::task::yield_now().await;
        self.0.variants_for(experiment_id).await
    }
    async fn requests_for_variant(&self, variant_id: Uuid) -> xp_engine::Result<Vec<RequestRecord>> {
        tokio::task::yield_now().await;
        self.0.requests_for_variant(variant_id).await
    }
    async fn record_request(&self, request: RequestRecord) -> xp_engine::Result<()> {
        self.0.record_request(request).await
    }
    async fn insert_experiment(
        &self,
        experiment: Experiment,
        variants: Vec<Variant>,
    ) -> xp_engine::Result<()> {
        self.0.insert_experiment(experiment, variants).await
    }
    async fn end_experiment(
        &self,
        experiment_id: Uuid,
        ended_at: DateTime<Utc>,
    ) -> xp_engine::Result<Experiment> {
        self.0.end_experiment(experiment_id, ended_at).await
    }
    async fn update_traffic(
        &self,
        experiment_id: Uuid,
        allocations: Vec<TrafficAllocation>,
    ) -> xp_engine::Result<Vec<Variant>> {
        self.0.update_traffic(experiment_id, allocations).await
    }
    async fn current_config(&self) -> xp_engine::Result<VersionedConfig> {
        tokio::task::yield_now().await;
        self.0.current_config().await
    }
    async fn commit_promotion(&self, commit: PromotionCommit) -> xp_engine::Result<PromotionRecord> {
        tokio::task::yield_now().await;
        self.0.commit_promotion(commit).await
    }
    async fn promotion(&self, id: Uuid) -> xp_engine::Result<Option<PromotionRecord>> {
        self.0.promotion(id).await
    }
    async fn list_promotions(&self) -> xp_engine::Result<Vec<PromotionRecord>> {
        self.0.list_promotions().await
    }
    async fn commit_rollback(&self, commit: RollbackCommit) -> xp_engine::Result<RollbackRecord> {
        tokio::task::yield_now().await;
        self.0.commit_rollback(commit).await
    }
    async fn rollbacks_for(&self, promotion_id: Uuid) -> xp_engine::Result<Vec<RollbackRecord>> {
        self.0.rollbacks_for(promotion_id).await
    }
}

#[tokio::test]
async fn every_eligible_experiment_is_promoted_in_one_scan() -> Result<()> {
    let registry = ExperimentRegistry::in_memory();
    for name in ["signup-copy", "search-ranking", "support-tone"] {
        seed_experiment(
            &registry,
            name,
            8,
            vec![
                SeedVariant::new("control", 1000, 60),
                SeedVariant::new("b", 1000, 5),
            ],
        )
        .await?;
    }
    let engine = PromotionEngine::new(Arc::new(YieldingStore(registry.clone())));

    let result = engine
        .scan_and_promote_winners(&AutoPromotionConfig::default())
        .await?;

    assert_eq!(result.scanned, 3);
    assert_eq!(result.promoted, 3, "skipped: {:?}", result.skipped);
    assert!(result.skipped.is_empty());
    assert!(result.errors.is_empty());
    assert_eq!(registry.list_promotions().await?.len(), 3);
    assert_eq!(registry.current_config().await?.version, 4);
    assert!(registry.list_active_experiments().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn failing_to_list_experiments_fails_the_scan() {
    let mut store = MockStore::new();
    store.expect_list_active_experiments().returning(|| {
        Err(Error::TransientStore {
            reason: "pool exhausted".to_string(),
        })
    });

    let engine = PromotionEngine::new(Arc::new(store));
    let result = engine
        .scan_and_promote_winners(&AutoPromotionConfig::default())
        .await;
    assert!(matches!(result, Err(Error::TransientStore { .. })));
}

fn new_rows(name: &str, now: DateTime<Utc>) -> (Experiment, Vec<Variant>) {
    NewExperiment {
        name: name.to_string(),
        description: None,
        start_date: Some(now - Duration::days(7)),
        variants: vec![NewVariant::new("control", 50.0), NewVariant::new("b", 50.0)],
    }
    .into_rows(now)
}
