// Copyright (C) 2025 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

pub mod experiment;
pub mod promotion;
pub mod traffic;

use color_eyre::{Result, eyre::eyre};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Read a JSON document that holds either one `T` or an array of them.
pub(crate) fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        Many(Vec<T>),
        One(T),
    }

    let contents = std::fs::read_to_string(path)
        .map_err(|err| eyre!("Could not read {path:?}: {err}"))?;
    let parsed: OneOrMany<T> =
        serde_json::from_str(&contents).map_err(|err| eyre!("Invalid JSON in {path:?}: {err}"))?;
    Ok(match parsed {
        OneOrMany::Many(items) => items,
        OneOrMany::One(item) => vec![item],
    })
}
