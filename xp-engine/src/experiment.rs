// Copyright (C) 2025 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

use crate::ai_config::ConfigOverrides;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Allowed deviation of a variant allocation total from 100.
pub const TRAFFIC_TOLERANCE: f64 = 0.5;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experiment {
    pub id: Uuid,
    /// Unique lookup key; only one active experiment may hold a name at a time.
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub winning_variant_id: Option<Uuid>,
}

impl Experiment {
    /// Hours elapsed between the start of the experiment and `now`.
    pub fn hours_running(&self, now: DateTime<Utc>) -> f64 {
        let elapsed = now.signed_duration_since(self.start_date);
        elapsed.num_milliseconds() as f64 / 3_600_000.0
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub id: Uuid,
    pub experiment_id: Uuid,
    pub variant_name: String,
    pub traffic_percentage: f64,
    #[serde(default)]
    pub config_overrides: ConfigOverrides,
    pub prompt_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Put variants in creation order. The sort is stable, so variants created at the same
/// instant keep the order they were stored in.
pub fn sort_by_creation(variants: &mut [Variant]) {
    variants.sort_by_key(|variant| variant.created_at);
}

/// A logged AI request/response row. Read-only to the engine apart from ingestion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRecord {
    pub id: Uuid,
    /// `None` when the request was not part of an experiment.
    pub variant_id: Option<Uuid>,
    pub latency_ms: u64,
    pub tokens_used: Option<u64>,
    pub error: Option<String>,
    /// `None` when conversion was not tracked for this request.
    #[serde(default)]
    pub converted: Option<bool>,
    pub created_at: DateTime<Utc>,
}

impl RequestRecord {
    pub fn new(variant_id: Option<Uuid>, latency_ms: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            variant_id,
            latency_ms,
            tokens_used: None,
            error: None,
            converted: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_tokens(mut self, tokens_used: u64) -> Self {
        self.tokens_used = Some(tokens_used);
        self
    }

    pub fn with_conversion(mut self, converted: bool) -> Self {
        self.converted = Some(converted);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficAllocation {
    pub variant_id: Uuid,
    pub traffic_percentage: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVariant {
    pub variant_name: String,
    pub traffic_percentage: f64,
    #[serde(default)]
    pub config_overrides: ConfigOverrides,
    #[serde(default)]
    pub prompt_id: Option<String>,
}

impl NewVariant {
    pub fn new(variant_name: impl Into<String>, traffic_percentage: f64) -> Self {
        Self {
            variant_name: variant_name.into(),
            traffic_percentage,
            config_overrides: ConfigOverrides::default(),
            prompt_id: None,
        }
    }

    pub fn with_overrides(mut self, config_overrides: ConfigOverrides) -> Self {
        self.config_overrides = config_overrides;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewExperiment {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Defaults to the creation time.
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    pub variants: Vec<NewVariant>,
}

impl NewExperiment {
    /// Checks everything that can be checked without the store.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push("experiment name must not be empty".to_string());
        }
        if self.variants.len() < 2 {
            errors.push(format!(
                "an experiment needs at least two variants, got {}",
                self.variants.len()
            ));
        }

        let mut names = HashSet::new();
        for variant in &self.variants {
            if variant.variant_name.trim().is_empty() {
                errors.push("variant name must not be empty".to_string());
            } else if !names.insert(variant.variant_name.as_str()) {
                errors.push(format!(
                    "variant name '{}' is used more than once",
                    variant.variant_name
                ));
            }
            for error in variant.config_overrides.validate() {
                errors.push(format!("variant '{}': {error}", variant.variant_name));
            }
        }

        errors.extend(validate_percentages(
            self.variants
                .iter()
                .map(|v| (v.variant_name.as_str(), v.traffic_percentage)),
        ));
        errors
    }

    /// Build the rows for this experiment. Call [`NewExperiment::validate`] first.
    pub fn into_rows(self, now: DateTime<Utc>) -> (Experiment, Vec<Variant>) {
        let experiment = Experiment {
            id: Uuid::new_v4(),
            name: self.name,
            description: self.description,
            is_active: true,
            start_date: self.start_date.unwrap_or(now),
            end_date: None,
            winning_variant_id: None,
        };
        let variants = self
            .variants
            .into_iter()
            .map(|variant| Variant {
                id: Uuid::new_v4(),
                experiment_id: experiment.id,
                variant_name: variant.variant_name,
                traffic_percentage: variant.traffic_percentage,
                config_overrides: variant.config_overrides,
                prompt_id: variant.prompt_id,
                created_at: now,
            })
            .collect();
        (experiment, variants)
    }
}

/// Range-check each percentage and the total against 100 ± [`TRAFFIC_TOLERANCE`].
pub fn validate_percentages<'a>(allocations: impl Iterator<Item = (&'a str, f64)>) -> Vec<String> {
    let mut errors = Vec::new();
    let mut total = 0.0;
    for (label, percentage) in allocations {
        if !percentage.is_finite() || !(0.0..=100.0).contains(&percentage) {
            errors.push(format!(
                "traffic percentage {percentage} for '{label}' must be within [0, 100]"
            ));
        }
        total += percentage;
    }
    if (total - 100.0).abs() > TRAFFIC_TOLERANCE {
        errors.push(format!(
            "traffic percentages sum to {total}, expected 100 ± {TRAFFIC_TOLERANCE}"
        ));
    }
    errors
}
