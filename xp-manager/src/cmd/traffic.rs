// Copyright (C) 2025 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

use crate::{OutputOptions, print_json};
use color_eyre::{Result, eyre::eyre};
use colored::Colorize;
use std::sync::Arc;
use uuid::Uuid;
use xp_engine::{ExperimentRegistry, ExperimentStore, TrafficAllocation, TrafficAllocator};

pub async fn assign(
    registry: &ExperimentRegistry,
    experiment_id: Uuid,
    output: OutputOptions,
) -> Result<()> {
    let allocator = TrafficAllocator::new(Arc::new(registry.clone()));
    let variant_id = allocator.assign_variant(experiment_id).await?;
    if output.json {
        return print_json(&serde_json::json!({ "variantId": variant_id }));
    }
    println!("{variant_id}");
    Ok(())
}

/// `allocations` pairs a variant id or variant name with its new percentage.
pub async fn adjust_traffic(
    registry: &ExperimentRegistry,
    experiment_id: Uuid,
    allocations: Vec<(String, f64)>,
    output: OutputOptions,
) -> Result<()> {
    let variants = registry.variants_for(experiment_id).await?;
    let mut resolved = Vec::with_capacity(allocations.len());
    for (key, traffic_percentage) in allocations {
        let variant_id = match Uuid::parse_str(&key) {
            Ok(id) => id,
            Err(_) => variants
                .iter()
                .find(|v| v.variant_name == key)
                .map(|v| v.id)
                .ok_or_else(|| eyre!("No variant named '{key}' in experiment {experiment_id}"))?,
        };
        resolved.push(TrafficAllocation {
            variant_id,
            traffic_percentage,
        });
    }

    let allocator = TrafficAllocator::new(Arc::new(registry.clone()));
    let updated = allocator.adjust_traffic(experiment_id, resolved).await?;
    if output.json {
        return print_json(&updated);
    }
    if output.human() {
        println!("{} Traffic updated", "✓".green());
        for variant in &updated {
            println!("  {}: {}%", variant.variant_name, variant.traffic_percentage);
        }
    }
    Ok(())
}
