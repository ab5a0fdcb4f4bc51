// Copyright (C) 2025 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

use crate::{
    error::{Error, Result},
    experiment::{Experiment, NewExperiment},
    store::ExperimentStore,
};
use chrono::Utc;

/// Validate and store a new active experiment with its variants.
pub async fn create_experiment<S: ExperimentStore + ?Sized>(
    store: &S,
    new_experiment: NewExperiment,
) -> Result<Experiment> {
    let errors = new_experiment.validate();
    if !errors.is_empty() {
        debug!(
            "Rejected experiment {}: {}",
            new_experiment.name,
            errors.join("; ")
        );
        return Err(Error::Validation { errors });
    }

    let (experiment, variants) = new_experiment.into_rows(Utc::now());
    store
        .insert_experiment(experiment.clone(), variants)
        .await?;
    info!("Created experiment {} ({})", experiment.name, experiment.id);
    Ok(experiment)
}

/// End the active experiment with the given name without picking a winner.
pub async fn end_experiment<S: ExperimentStore + ?Sized>(
    store: &S,
    experiment_name: &str,
) -> Result<Experiment> {
    let experiment = store
        .experiment_by_name(experiment_name)
        .await?
        .ok_or_else(|| Error::ExperimentNotFound(experiment_name.to_string()))?;
    let ended = store.end_experiment(experiment.id, Utc::now()).await?;
    info!("Ended experiment {} ({})", ended.name, ended.id);
    Ok(ended)
}

/// Every experiment, active ones first, then by start date, newest first.
pub async fn list_experiments<S: ExperimentStore + ?Sized>(store: &S) -> Result<Vec<Experiment>> {
    let mut experiments = store.list_experiments().await?;
    experiments.sort_by(|a, b| {
        b.is_active
            .cmp(&a.is_active)
            .then_with(|| b.start_date.cmp(&a.start_date))
    });
    Ok(experiments)
}
