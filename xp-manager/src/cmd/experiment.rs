// Copyright (C) 2025 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

use super::read_json_file;
use crate::{OutputOptions, format_optional, format_state, print_banner, print_json};
use color_eyre::{Result, eyre::eyre};
use colored::Colorize;
use serde::Deserialize;
use std::path::Path;
use uuid::Uuid;
use xp_engine::{
    ExperimentRegistry, ExperimentStore, NewExperiment, PromotionEngine, RequestRecord, lifecycle,
};

/// A request row as logged by the serving side. The id and timestamp are assigned on ingestion.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RequestInput {
    pub variant_id: Option<Uuid>,
    pub latency_ms: u64,
    #[serde(default)]
    pub tokens_used: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub converted: Option<bool>,
}

impl From<RequestInput> for RequestRecord {
    fn from(input: RequestInput) -> Self {
        let mut record = RequestRecord::new(input.variant_id, input.latency_ms);
        record.tokens_used = input.tokens_used;
        record.error = input.error;
        record.converted = input.converted;
        record
    }
}

pub async fn create(registry: &ExperimentRegistry, file: &Path, output: OutputOptions) -> Result<()> {
    let mut definitions: Vec<NewExperiment> = read_json_file(file)?;
    if definitions.len() != 1 {
        return Err(eyre!(
            "Expected exactly one experiment definition in {file:?}, found {}",
            definitions.len()
        ));
    }
    let definition = definitions.remove(0);
    info!("Creating experiment {}", definition.name);

    let experiment = lifecycle::create_experiment(registry, definition).await?;
    let variants = registry.variants_for(experiment.id).await?;

    if output.json {
        return print_json(&serde_json::json!({
            "experiment": experiment,
            "variants": variants,
        }));
    }
    if output.human() {
        println!(
            "{} Created experiment {} ({})",
            "✓".green(),
            experiment.name,
            experiment.id
        );
        for variant in &variants {
            println!(
                "  {} {}%: {}",
                variant.variant_name, variant.traffic_percentage, variant.id
            );
        }
    }
    Ok(())
}

pub async fn end(registry: &ExperimentRegistry, name: &str, output: OutputOptions) -> Result<()> {
    let experiment = lifecycle::end_experiment(registry, name).await?;
    if output.json {
        return print_json(&experiment);
    }
    if output.human() {
        println!("{} Ended experiment {}", "✓".green(), experiment.name);
    }
    Ok(())
}

pub async fn list(registry: &ExperimentRegistry, output: OutputOptions) -> Result<()> {
    let experiments = lifecycle::list_experiments(registry).await?;
    if output.json {
        return print_json(&experiments);
    }

    if experiments.is_empty() {
        println!("No experiments have been created yet");
        return Ok(());
    }
    if output.human() {
        print_banner("Experiments");
    }
    println!(
        "{:<30} {:<38} {:<12} {:<26}",
        "Name", "Id", "State", "Started"
    );
    for experiment in &experiments {
        println!(
            "{:<30} {:<38} {:<12} {:<26}",
            experiment.name,
            experiment.id.to_string(),
            format_state(experiment),
            experiment.start_date.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    Ok(())
}

pub async fn metrics(registry: &ExperimentRegistry, name: &str, output: OutputOptions) -> Result<()> {
    let engine = PromotionEngine::new(std::sync::Arc::new(registry.clone()));
    let metrics = engine.get_variant_metrics(name).await?;
    if output.json {
        return print_json(&metrics);
    }

    if output.human() {
        print_banner(&format!("Metrics for {name}"));
    }
    println!(
        "{:<20} {:>10} {:>8} {:>12} {:>14} {:>12} {:>12}",
        "Variant", "Requests", "Errors", "Error rate", "Avg latency", "Avg tokens", "Conversion"
    );
    for m in &metrics {
        println!(
            "{:<20} {:>10} {:>8} {:>12} {:>14} {:>12} {:>12}",
            m.variant_name,
            m.total_requests,
            m.error_count,
            format_optional(m.error_rate.map(|r| format!("{r:.4}"))),
            format_optional(m.avg_latency_ms.map(|l| format!("{l:.1}ms"))),
            format_optional(m.avg_tokens_used.map(|t| format!("{t:.1}"))),
            format_optional(m.conversion_rate.map(|c| format!("{c:.4}"))),
        );
    }
    Ok(())
}

pub async fn record_request(
    registry: &ExperimentRegistry,
    file: &Path,
    output: OutputOptions,
) -> Result<()> {
    let inputs: Vec<RequestInput> = read_json_file(file)?;
    let count = inputs.len();
    for input in inputs {
        registry.record_request(input.into()).await?;
    }
    debug!("Recorded {count} requests from {file:?}");

    if output.json {
        return print_json(&serde_json::json!({ "recorded": count }));
    }
    if output.human() {
        println!("{} Recorded {count} request(s)", "✓".green());
    }
    Ok(())
}
