// Copyright (C) 2025 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

use color_eyre::{Result, eyre::eyre};
use std::{
    path::{Path, PathBuf},
    str::FromStr,
};
use xp_engine::{
    AutoPromotionConfig, AutoPromotionOverrides, PromotionPreset, get_default_registry_path,
};

/// The store file given on the command line, or the platform default.
pub fn get_store_path(path: Option<PathBuf>) -> Result<PathBuf> {
    match path {
        Some(path) => Ok(path),
        None => Ok(get_default_registry_path()?),
    }
}

/// Log files live in a `logs` directory next to the default store.
pub fn get_log_dir() -> Result<PathBuf> {
    let store_path = get_default_registry_path()?;
    let dir = store_path
        .parent()
        .ok_or_else(|| eyre!("Could not obtain the parent of {store_path:?}"))?
        .join("logs");
    Ok(dir)
}

/// Resolve the auto-promotion config from a preset, a JSON overrides file and the dry-run flag,
/// in that order of precedence (lowest first).
pub fn load_promotion_config(
    preset: Option<&str>,
    config_file: Option<&Path>,
    dry_run: bool,
) -> Result<AutoPromotionConfig> {
    let config = load_unvalidated_promotion_config(preset, config_file, dry_run)?;
    config.ensure_valid()?;
    debug!("Using auto-promotion config: {config:?}");
    Ok(config)
}

/// As [`load_promotion_config`], but the resolved values are not checked.
pub fn load_unvalidated_promotion_config(
    preset: Option<&str>,
    config_file: Option<&Path>,
    dry_run: bool,
) -> Result<AutoPromotionConfig> {
    let preset = match preset {
        Some(name) => PromotionPreset::from_str(name)?,
        None => PromotionPreset::Balanced,
    };
    let mut overrides = match config_file {
        Some(path) => read_overrides(path)?,
        None => AutoPromotionOverrides::default(),
    };
    if dry_run {
        overrides.dry_run = Some(true);
    }
    let mut config = AutoPromotionConfig::preset(preset);
    config.apply(overrides);
    Ok(config)
}

fn read_overrides(path: &Path) -> Result<AutoPromotionOverrides> {
    let contents = std::fs::read_to_string(path)
        .map_err(|err| eyre!("Could not read config file {path:?}: {err}"))?;
    let overrides = serde_json::from_str(&contents)
        .map_err(|err| eyre!("Invalid config file {path:?}: {err}"))?;
    Ok(overrides)
}
