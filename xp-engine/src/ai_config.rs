// Copyright (C) 2025 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The base AI configuration every request reads at dispatch time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiConfig {
    pub provider: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub top_p: f64,
    pub prompt_id: Option<String>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            temperature: 0.7,
            max_tokens: 1024,
            top_p: 1.0,
            prompt_id: None,
        }
    }
}

impl AiConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.provider.trim().is_empty() {
            errors.push("provider must not be empty".to_string());
        }
        if self.model.trim().is_empty() {
            errors.push("model must not be empty".to_string());
        }
        check_temperature(self.temperature, &mut errors);
        check_max_tokens(self.max_tokens, &mut errors);
        check_top_p(self.top_p, &mut errors);
        errors
    }

    /// Shallow merge: every key set in `overrides` replaces the base value, and a variant's
    /// prompt reference replaces the base prompt.
    ///
    /// The overrides are validated first; nothing is merged if any key is out of range.
    pub fn merged(&self, overrides: &ConfigOverrides, prompt_id: Option<&str>) -> Result<Self> {
        let errors = overrides.validate();
        if !errors.is_empty() {
            return Err(Error::Validation { errors });
        }

        let mut merged = self.clone();
        if let Some(provider) = &overrides.provider {
            merged.provider = provider.clone();
        }
        if let Some(model) = &overrides.model {
            merged.model = model.clone();
        }
        if let Some(temperature) = overrides.temperature {
            merged.temperature = temperature;
        }
        if let Some(max_tokens) = overrides.max_tokens {
            merged.max_tokens = max_tokens;
        }
        if let Some(top_p) = overrides.top_p {
            merged.top_p = top_p;
        }
        if let Some(prompt_id) = overrides.prompt_id.as_deref().or(prompt_id) {
            merged.prompt_id = Some(prompt_id.to_string());
        }

        let errors = merged.validate();
        if !errors.is_empty() {
            return Err(Error::Validation { errors });
        }
        Ok(merged)
    }
}

/// Per-variant keys that replace the matching keys of [`AiConfig`].
///
/// Unknown keys are rejected at deserialization time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_id: Option<String>,
}

impl ConfigOverrides {
    pub fn is_empty(&self) -> bool {
        self == &ConfigOverrides::default()
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if let Some(provider) = &self.provider {
            if provider.trim().is_empty() {
                errors.push("provider override must not be empty".to_string());
            }
        }
        if let Some(model) = &self.model {
            if model.trim().is_empty() {
                errors.push("model override must not be empty".to_string());
            }
        }
        if let Some(temperature) = self.temperature {
            check_temperature(temperature, &mut errors);
        }
        if let Some(max_tokens) = self.max_tokens {
            check_max_tokens(max_tokens, &mut errors);
        }
        if let Some(top_p) = self.top_p {
            check_top_p(top_p, &mut errors);
        }
        errors
    }
}

fn check_temperature(temperature: f64, errors: &mut Vec<String>) {
    if !(0.0..=2.0).contains(&temperature) {
        errors.push(format!("temperature {temperature} must be within [0, 2]"));
    }
}

fn check_max_tokens(max_tokens: u32, errors: &mut Vec<String>) {
    if max_tokens == 0 {
        errors.push("maxTokens must be greater than 0".to_string());
    }
}

fn check_top_p(top_p: f64, errors: &mut Vec<String>) {
    if !(top_p > 0.0 && top_p <= 1.0) {
        errors.push(format!("topP {top_p} must be within (0, 1]"));
    }
}

/// The single current-configuration row, versioned for optimistic concurrency.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionedConfig {
    pub version: u64,
    pub config: AiConfig,
    pub updated_at: DateTime<Utc>,
}

impl VersionedConfig {
    pub fn initial(config: AiConfig) -> Self {
        Self {
            version: 1,
            config,
            updated_at: Utc::now(),
        }
    }
}
