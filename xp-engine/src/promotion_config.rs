// Copyright (C) 2025 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Below this level a "significant" result is more likely wrong than right.
const MIN_MEANINGFUL_CONFIDENCE: f64 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum SignificanceTestMethod {
    /// One-sided two-proportion z-test with pooled variance.
    #[default]
    ZTest,
    /// Posterior probability of improvement under Beta(1 + k, 1 + n - k) priors.
    Bayesian,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum PrimaryMetric {
    /// Lower is better.
    #[default]
    ErrorRate,
    /// Lower average latency is better.
    Latency,
    /// Higher is better. Requires conversion tracking on the request rows.
    ConversionRate,
}

impl fmt::Display for PrimaryMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimaryMetric::ErrorRate => write!(f, "errorRate"),
            PrimaryMetric::Latency => write!(f, "latency"),
            PrimaryMetric::ConversionRate => write!(f, "conversionRate"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromotionPreset {
    Aggressive,
    Conservative,
    Balanced,
}

impl FromStr for PromotionPreset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "aggressive" => Ok(PromotionPreset::Aggressive),
            "conservative" => Ok(PromotionPreset::Conservative),
            "balanced" => Ok(PromotionPreset::Balanced),
            other => Err(Error::validation(format!(
                "unknown preset '{other}', expected aggressive, conservative or balanced"
            ))),
        }
    }
}

/// Thresholds supplied with every check, promote and scan call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoPromotionConfig {
    /// Gates scans only; single-target check and promote calls ignore it.
    pub enabled: bool,
    pub dry_run: bool,
    pub min_sample_size: u64,
    pub min_run_duration_hours: f64,
    /// Largest tolerated error-rate increase of the candidate over the baseline.
    pub max_error_rate_delta: f64,
    pub min_confidence_level: f64,
    pub significance_test_method: SignificanceTestMethod,
    #[serde(default)]
    pub primary_metric: PrimaryMetric,
}

impl Default for AutoPromotionConfig {
    fn default() -> Self {
        Self::preset(PromotionPreset::Balanced)
    }
}

/// A partial config laid over a preset. Absent keys keep the preset value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AutoPromotionOverrides {
    pub enabled: Option<bool>,
    pub dry_run: Option<bool>,
    pub min_sample_size: Option<u64>,
    pub min_run_duration_hours: Option<f64>,
    pub max_error_rate_delta: Option<f64>,
    pub min_confidence_level: Option<f64>,
    pub significance_test_method: Option<SignificanceTestMethod>,
    pub primary_metric: Option<PrimaryMetric>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl AutoPromotionConfig {
    pub fn preset(preset: PromotionPreset) -> Self {
        match preset {
            PromotionPreset::Aggressive => Self {
                enabled: true,
                dry_run: false,
                min_sample_size: 100,
                min_run_duration_hours: 24.0,
                max_error_rate_delta: 0.02,
                min_confidence_level: 0.90,
                significance_test_method: SignificanceTestMethod::ZTest,
                primary_metric: PrimaryMetric::ErrorRate,
            },
            PromotionPreset::Conservative => Self {
                enabled: true,
                dry_run: false,
                min_sample_size: 1000,
                min_run_duration_hours: 168.0,
                max_error_rate_delta: 0.005,
                min_confidence_level: 0.99,
                significance_test_method: SignificanceTestMethod::ZTest,
                primary_metric: PrimaryMetric::ErrorRate,
            },
            PromotionPreset::Balanced => Self {
                enabled: true,
                dry_run: false,
                min_sample_size: 500,
                min_run_duration_hours: 72.0,
                max_error_rate_delta: 0.01,
                min_confidence_level: 0.95,
                significance_test_method: SignificanceTestMethod::ZTest,
                primary_metric: PrimaryMetric::ErrorRate,
            },
        }
    }

    /// Resolve a config from an optional preset name and optional overrides, then validate it.
    pub fn load(preset: Option<&str>, overrides: Option<AutoPromotionOverrides>) -> Result<Self> {
        let preset = match preset {
            Some(name) => PromotionPreset::from_str(name)?,
            None => PromotionPreset::Balanced,
        };
        let mut config = Self::preset(preset);
        if let Some(overrides) = overrides {
            config.apply(overrides);
        }
        config.ensure_valid()?;
        debug!("Loaded auto-promotion config: {config:?}");
        Ok(config)
    }

    pub fn apply(&mut self, overrides: AutoPromotionOverrides) {
        if let Some(enabled) = overrides.enabled {
            self.enabled = enabled;
        }
        if let Some(dry_run) = overrides.dry_run {
            self.dry_run = dry_run;
        }
        if let Some(min_sample_size) = overrides.min_sample_size {
            self.min_sample_size = min_sample_size;
        }
        if let Some(hours) = overrides.min_run_duration_hours {
            self.min_run_duration_hours = hours;
        }
        if let Some(delta) = overrides.max_error_rate_delta {
            self.max_error_rate_delta = delta;
        }
        if let Some(confidence) = overrides.min_confidence_level {
            self.min_confidence_level = confidence;
        }
        if let Some(method) = overrides.significance_test_method {
            self.significance_test_method = method;
        }
        if let Some(metric) = overrides.primary_metric {
            self.primary_metric = metric;
        }
    }

    pub fn validate(&self) -> ValidationReport {
        let mut errors = Vec::new();

        if !(self.min_confidence_level > 0.0 && self.min_confidence_level <= 1.0) {
            errors.push(format!(
                "minConfidenceLevel {} must be within (0, 1]",
                self.min_confidence_level
            ));
        } else if self.min_confidence_level < MIN_MEANINGFUL_CONFIDENCE {
            errors.push(format!(
                "minConfidenceLevel {} would accept variants that are more likely worse than the baseline",
                self.min_confidence_level
            ));
        }
        if self.min_sample_size == 0 {
            errors.push("minSampleSize must be greater than 0".to_string());
        }
        if !self.min_run_duration_hours.is_finite() || self.min_run_duration_hours < 0.0 {
            errors.push(format!(
                "minRunDurationHours {} must be a non-negative number",
                self.min_run_duration_hours
            ));
        }
        if !(0.0..=1.0).contains(&self.max_error_rate_delta) {
            errors.push(format!(
                "maxErrorRateDelta {} must be within [0, 1]",
                self.max_error_rate_delta
            ));
        }

        ValidationReport {
            valid: errors.is_empty(),
            errors,
        }
    }

    pub fn ensure_valid(&self) -> Result<()> {
        let report = self.validate();
        if report.valid {
            Ok(())
        } else {
            Err(Error::Validation {
                errors: report.errors,
            })
        }
    }
}
