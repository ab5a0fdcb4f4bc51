// Copyright (C) 2025 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

mod commands;

use crate::commands::*;
use clap::Parser;
use color_eyre::eyre::{Result, eyre};
use std::sync::Arc;
use tracing::Level;
use xp_engine::{ExperimentRegistry, PromotionEngine, TracingHook};
use xp_logging::{LogBuilder, LogOutputDest};
use xp_manager::{
    OutputOptions, VerbosityLevel, cmd,
    config::{self, get_log_dir, get_store_path},
};

#[derive(Debug, Clone)]
pub enum LogOutputDestArg {
    StdOut,
    StdErr,
    DataDir,
}

impl std::fmt::Display for LogOutputDestArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogOutputDestArg::StdOut => write!(f, "stdout"),
            LogOutputDestArg::StdErr => write!(f, "stderr"),
            LogOutputDestArg::DataDir => write!(f, "data-dir"),
        }
    }
}

pub fn parse_log_output(val: &str) -> Result<LogOutputDestArg> {
    match val {
        "stdout" => Ok(LogOutputDestArg::StdOut),
        "stderr" => Ok(LogOutputDestArg::StdErr),
        "data-dir" => Ok(LogOutputDestArg::DataDir),
        _ => Err(eyre!("Invalid log output destination: {val}")),
    }
}

/// Parse a `<variant>=<percentage>` pair.
pub fn parse_allocation(val: &str) -> Result<(String, f64)> {
    let Some((variant, percentage)) = val.rsplit_once('=') else {
        return Err(eyre!(
            "Allocation must be in the format VARIANT=PERCENTAGE, e.g. control=70"
        ));
    };
    if variant.is_empty() {
        return Err(eyre!("Allocation '{val}' does not name a variant"));
    }
    let percentage = percentage
        .trim()
        .parse::<f64>()
        .map_err(|err| eyre!("Invalid percentage in '{val}': {err}"))?;
    Ok((variant.to_string(), percentage))
}

#[tracing::instrument(err)]
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Cmd::parse();

    if args.version {
        println!(
            "Prompt Experiment Manager v{}",
            env!("CARGO_PKG_VERSION")
        );
        return Ok(());
    }

    if args.crate_version {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let output = OutputOptions {
        json: args.json,
        verbosity: VerbosityLevel::from(args.verbose),
    };

    let _log_handle = if args.debug || args.trace {
        let log_output_dest = match &args.log_output_dest {
            LogOutputDestArg::StdOut => LogOutputDest::Stdout,
            LogOutputDestArg::StdErr => LogOutputDest::Stderr,
            LogOutputDestArg::DataDir => {
                let timestamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
                let file = get_log_dir()?.join(format!(
                    "xpctl_{}_{timestamp}.log",
                    args.cmd
                        .as_ref()
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "no_command".to_string())
                ));
                LogOutputDest::Path(file)
            }
        };

        let level = if args.debug {
            Level::DEBUG
        } else {
            Level::TRACE
        };
        get_log_builder(level, log_output_dest).initialize()?.1
    } else {
        None
    };

    tracing::info!("Executing cmd: {:?}", args.cmd);

    let Some(sub_cmd) = args.cmd else {
        return Err(eyre!("No subcommand given. Run with --help to see the options."));
    };

    match sub_cmd {
        SubCmd::Config(ConfigSubCmd::Show { config }) => {
            cmd::promotion::show_config(&resolve_promotion_config(&config)?)
        }
        SubCmd::Config(ConfigSubCmd::Validate { config }) => {
            // Skip load-time validation so every violation is reported.
            let resolved = resolve_unvalidated_config(&config)?;
            cmd::promotion::validate_config(&resolved, output)
        }
        sub_cmd => {
            let store_path = get_store_path(args.store_path)?;
            let registry = ExperimentRegistry::load(&store_path).await?;
            run_store_cmd(sub_cmd, registry, output).await
        }
    }
}

async fn run_store_cmd(
    sub_cmd: SubCmd,
    registry: ExperimentRegistry,
    output: OutputOptions,
) -> Result<()> {
    let engine = PromotionEngine::new(Arc::new(registry.clone())).with_hook(Arc::new(TracingHook));

    match sub_cmd {
        SubCmd::AdjustTraffic {
            experiment_id,
            allocations,
        } => cmd::traffic::adjust_traffic(&registry, experiment_id, allocations, output).await,
        SubCmd::Assign { experiment_id } => {
            cmd::traffic::assign(&registry, experiment_id, output).await
        }
        SubCmd::Check { name, config } => {
            let config = resolve_promotion_config(&config)?;
            cmd::promotion::check(&engine, &name, &config, output).await
        }
        SubCmd::Config(config_cmd) => Err(eyre!("config {config_cmd} does not use the store")),
        SubCmd::Create { file } => cmd::experiment::create(&registry, &file, output).await,
        SubCmd::End { name } => cmd::experiment::end(&registry, &name, output).await,
        SubCmd::List => cmd::experiment::list(&registry, output).await,
        SubCmd::Metrics { name } => cmd::experiment::metrics(&registry, &name, output).await,
        SubCmd::Promote { name, config } => {
            let config = resolve_promotion_config(&config)?;
            cmd::promotion::promote(&engine, &name, &config, output).await
        }
        SubCmd::RecordRequest { file } => {
            cmd::experiment::record_request(&registry, &file, output).await
        }
        SubCmd::Rollback {
            promotion_id,
            reason,
        } => cmd::promotion::rollback(&engine, promotion_id, &reason, output).await,
        SubCmd::Scan { config } => {
            let config = resolve_promotion_config(&config)?;
            cmd::promotion::scan(&engine, &config, output).await
        }
    }
}

fn resolve_promotion_config(args: &PromotionConfigArgs) -> Result<xp_engine::AutoPromotionConfig> {
    config::load_promotion_config(
        args.preset.as_deref(),
        args.config_file.as_deref(),
        args.dry_run,
    )
}

fn resolve_unvalidated_config(args: &PromotionConfigArgs) -> Result<xp_engine::AutoPromotionConfig> {
    config::load_unvalidated_promotion_config(
        args.preset.as_deref(),
        args.config_file.as_deref(),
        args.dry_run,
    )
}

fn get_log_builder(level: Level, log_output_dest: LogOutputDest) -> LogBuilder {
    let logging_targets = vec![
        ("xp_engine".to_string(), level),
        ("xp_logging".to_string(), level),
        ("xp_manager".to_string(), level),
        ("xpctl".to_string(), level),
    ];
    let mut log_builder = LogBuilder::new(logging_targets);
    log_builder.output_dest(log_output_dest);
    log_builder.print_updates_to_stdout(false);
    log_builder
}
