// Copyright (C) 2025 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

use crate::{OutputOptions, format_eligibility, format_optional, print_banner, print_json};
use color_eyre::{Result, eyre::eyre};
use colored::Colorize;
use uuid::Uuid;
use xp_engine::{
    AutoPromotionConfig, EligibilityResult, PromotionEngine, PromotionResult, RollbackStatus,
    ScanResult,
};

pub async fn check(
    engine: &PromotionEngine,
    name: &str,
    config: &AutoPromotionConfig,
    output: OutputOptions,
) -> Result<()> {
    let eligibility = engine.check_promotion_eligibility(name, config).await?;
    if output.json {
        return print_json(&eligibility);
    }
    if output.human() {
        print_banner(&format!("Eligibility of {name}"));
    }
    print_eligibility(&eligibility);
    Ok(())
}

pub async fn promote(
    engine: &PromotionEngine,
    name: &str,
    config: &AutoPromotionConfig,
    output: OutputOptions,
) -> Result<()> {
    let result = engine.promote_winner(name, config).await?;
    if output.json {
        return print_json(&result);
    }
    print_promotion(&result, output);
    Ok(())
}

pub async fn scan(
    engine: &PromotionEngine,
    config: &AutoPromotionConfig,
    output: OutputOptions,
) -> Result<()> {
    let scan_result = engine.scan_and_promote_winners(config).await?;
    if output.json {
        print_json(&scan_result)?;
    } else {
        if output.human() {
            print_banner("Scan Active Experiments");
        }
        for promotion in &scan_result.promotions {
            print_promotion(promotion, output);
        }
        for skipped in &scan_result.skipped {
            println!("{} {}: {}", "-".yellow(), skipped.name, skipped.reason);
        }
        println!(
            "Scanned {}, promoted {}, skipped {}",
            scan_result.scanned,
            scan_result.promoted,
            scan_result.skipped.len()
        );
    }
    summarise_scan_result(&scan_result, output)
}

/// Print the failed experiments of a scan and fail if there were any.
pub fn summarise_scan_result(scan_result: &ScanResult, output: OutputOptions) -> Result<()> {
    if scan_result.has_errors() {
        if !output.json {
            println!(
                "Failed to evaluate {} experiment(s):",
                scan_result.errors.len()
            );
            for failed in &scan_result.errors {
                println!(
                    "{} {}: [{}] {}",
                    "✕".red(),
                    failed.name,
                    failed.code,
                    failed.message
                );
            }
        }
        error!("Failed to evaluate one or more experiments");
        return Err(eyre!("Failed to evaluate one or more experiments"));
    }
    Ok(())
}

pub async fn rollback(
    engine: &PromotionEngine,
    promotion_id: Uuid,
    reason: &str,
    output: OutputOptions,
) -> Result<()> {
    let result = engine.rollback_promotion(promotion_id, reason).await?;
    if output.json {
        return print_json(&result);
    }
    match result.status {
        RollbackStatus::RolledBack => {
            println!(
                "{} Rolled back promotion {promotion_id} to model {} (rollback {})",
                "✓".green(),
                result.rolled_back_to.model,
                result.rollback_id
            );
        }
        RollbackStatus::AlreadyRolledBack => {
            println!("{} {}", "!".yellow(), result.reason);
        }
    }
    Ok(())
}

pub fn show_config(config: &AutoPromotionConfig) -> Result<()> {
    print_json(config)
}

pub fn validate_config(config: &AutoPromotionConfig, output: OutputOptions) -> Result<()> {
    let report = config.validate();
    if output.json {
        print_json(&report)?;
    } else if report.valid {
        println!("{} The auto-promotion config is valid", "✓".green());
    } else {
        for error in &report.errors {
            println!("{} {error}", "✕".red());
        }
    }
    if !report.valid {
        return Err(eyre!("The auto-promotion config is invalid"));
    }
    Ok(())
}

fn print_eligibility(eligibility: &EligibilityResult) {
    println!("{}: {}", format_eligibility(eligibility), eligibility.reason);
    println!(
        "Candidate: {}",
        format_optional(eligibility.candidate_variant_name.as_deref())
    );
    println!(
        "Confidence: {}",
        format_optional(eligibility.confidence.map(|c| format!("{c:.4}")))
    );
    for excluded in &eligibility.excluded {
        println!(
            "  {} excluded: {}",
            excluded.variant_name, excluded.reason
        );
    }
}

fn print_promotion(result: &PromotionResult, output: OutputOptions) {
    let prefix = if result.dry_run {
        "Dry run:".yellow().to_string()
    } else {
        "✓".green().to_string()
    };
    println!(
        "{prefix} Promoted {} of {} ({})",
        result.promoted_variant.variant_name, result.record.experiment_name, result.eligibility.reason
    );
    if let Some(promotion_id) = result.promotion_id {
        println!("  Promotion id: {promotion_id}");
    }
    if output.verbosity == crate::VerbosityLevel::Full {
        println!("  Previous config: {:?}", result.previous_config);
        println!("  New config: {:?}", result.new_config);
    }
}
