// Copyright (C) 2025 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

#![allow(dead_code)]

use chrono::{Duration, Utc};
use color_eyre::eyre::Result;
use xp_engine::{
    ConfigOverrides, Experiment, ExperimentRegistry, ExperimentStore, NewExperiment, NewVariant,
    RequestRecord, Variant, lifecycle,
};

/// A variant to seed together with the traffic it has already received.
pub struct SeedVariant {
    pub name: &'static str,
    pub traffic_percentage: f64,
    pub total_requests: usize,
    pub errors: usize,
    pub latency_ms: u64,
    pub overrides: ConfigOverrides,
}

impl SeedVariant {
    pub fn new(name: &'static str, total_requests: usize, errors: usize) -> Self {
        Self {
            name,
            traffic_percentage: 50.0,
            total_requests,
            errors,
            latency_ms: 800,
            overrides: ConfigOverrides::default(),
        }
    }

    pub fn latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn overrides(mut self, overrides: ConfigOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn traffic(mut self, traffic_percentage: f64) -> Self {
        self.traffic_percentage = traffic_percentage;
        self
    }
}

/// Create an experiment that started `days_running` days ago and log its requests.
pub async fn seed_experiment(
    store: &ExperimentRegistry,
    name: &str,
    days_running: i64,
    seeds: Vec<SeedVariant>,
) -> Result<(Experiment, Vec<Variant>)> {
    let new_experiment = NewExperiment {
        name: name.to_string(),
        description: None,
        start_date: Some(Utc::now() - Duration::days(days_running)),
        variants: seeds
            .iter()
            .map(|seed| {
                NewVariant::new(seed.name, seed.traffic_percentage)
                    .with_overrides(seed.overrides.clone())
            })
            .collect(),
    };
    let experiment = lifecycle::create_experiment(store, new_experiment).await?;
    let variants = store.variants_for(experiment.id).await?;

    for (seed, variant) in seeds.iter().zip(&variants) {
        // Alternate latencies around the mean so the spread is non-zero.
        for i in 0..seed.total_requests {
            let latency = if i % 2 == 0 {
                seed.latency_ms + 50
            } else {
                seed.latency_ms.saturating_sub(50)
            };
            let mut request = RequestRecord::new(Some(variant.id), latency).with_tokens(400);
            if i < seed.errors {
                request = request.with_error("upstream timeout");
            }
            store.record_request(request).await?;
        }
    }
    Ok((experiment, variants))
}

/// The "checkout-copy" experiment: 2% errors on 1000 control requests against 1% on 1200
/// `bold-cta` requests, running for 8 days.
pub async fn seed_checkout_copy(store: &ExperimentRegistry) -> Result<(Experiment, Vec<Variant>)> {
    seed_experiment(
        store,
        "checkout-copy",
        8,
        vec![
            SeedVariant::new("control", 1000, 20),
            SeedVariant::new("bold-cta", 1200, 12).overrides(ConfigOverrides {
                model: Some("gpt-4o-mini".to_string()),
                temperature: Some(0.3),
                ..Default::default()
            }),
        ],
    )
    .await
}
