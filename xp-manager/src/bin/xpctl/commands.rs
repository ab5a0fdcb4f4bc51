// Copyright (C) 2025 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

use clap::{Args, Parser, Subcommand};
use std::{fmt::Display, path::PathBuf};
use uuid::Uuid;

use crate::{LogOutputDestArg, parse_allocation, parse_log_output};

#[derive(Parser)]
#[command(disable_version_flag = true)]
pub struct Cmd {
    /// Available sub commands.
    #[clap(subcommand)]
    pub cmd: Option<SubCmd>,

    /// Print the crate version.
    #[clap(long)]
    pub crate_version: bool,

    /// Output debug-level logging to stderr.
    #[clap(long, conflicts_with = "trace")]
    pub debug: bool,

    /// Print results as JSON.
    #[clap(long, global = true)]
    pub json: bool,

    /// Specify the logging output destination.
    ///
    /// Valid values are "stdout", "stderr" or "data-dir".
    ///
    /// `stderr` is the default value.
    ///
    /// The data directory location is platform specific:
    ///  - Linux: $HOME/.local/share/xp-engine/logs
    ///  - macOS: $HOME/Library/Application Support/xp-engine/logs
    ///  - Windows: C:\Users\<username>\AppData\Roaming\xp-engine\logs
    #[clap(long, default_value_t = LogOutputDestArg::StdErr, value_parser = parse_log_output, verbatim_doc_comment)]
    pub log_output_dest: LogOutputDestArg,

    /// The experiment store file.
    ///
    /// Defaults to experiments.json under the platform data directory.
    #[clap(long, env = "XP_STORE_PATH", global = true)]
    pub store_path: Option<PathBuf>,

    /// Output trace-level logging to stderr.
    #[clap(long, conflicts_with = "debug")]
    pub trace: bool,

    #[clap(short, long, action = clap::ArgAction::Count, default_value_t = 2)]
    pub verbose: u8,

    /// Print version information.
    #[clap(long)]
    pub version: bool,
}

/// Options that select the auto-promotion thresholds.
#[derive(Args, Clone, Debug, Default)]
pub struct PromotionConfigArgs {
    /// Start from a named preset: aggressive, conservative or balanced.
    ///
    /// Balanced is used when no preset is given.
    #[clap(long)]
    pub preset: Option<String>,

    /// A JSON file of overrides applied on top of the preset, using the camelCase key names,
    /// e.g. {"minSampleSize": 250}.
    #[clap(long)]
    pub config_file: Option<PathBuf>,

    /// Evaluate and report without writing any state change.
    #[clap(long)]
    pub dry_run: bool,
}

#[derive(Subcommand, Debug)]
pub enum SubCmd {
    /// Change the traffic split of an active experiment.
    ///
    /// Every variant of the experiment must be given exactly once and the percentages must sum
    /// to 100. Nothing is changed if any allocation is invalid.
    #[clap(name = "adjust-traffic")]
    AdjustTraffic {
        /// The id of the experiment.
        experiment_id: Uuid,
        /// Allocations in the form <variant-id-or-name>=<percentage>.
        #[clap(required = true, value_parser = parse_allocation)]
        allocations: Vec<(String, f64)>,
    },
    /// Assign a variant of an active experiment using the configured traffic split.
    #[clap(name = "assign")]
    Assign {
        /// The id of the experiment.
        experiment_id: Uuid,
    },
    /// Evaluate whether an experiment has a winner that may be promoted. Nothing is written.
    #[clap(name = "check")]
    Check {
        /// The name of the experiment.
        name: String,
        #[command(flatten)]
        config: PromotionConfigArgs,
    },
    /// Inspect the auto-promotion config.
    #[clap(subcommand)]
    Config(ConfigSubCmd),
    /// Create an experiment from a JSON definition.
    #[clap(name = "create")]
    Create {
        /// Path to a JSON file holding the experiment definition.
        #[clap(long)]
        file: PathBuf,
    },
    /// End an active experiment without promoting a winner.
    #[clap(name = "end")]
    End {
        /// The name of the experiment.
        name: String,
    },
    /// List every experiment.
    #[clap(name = "list")]
    List,
    /// Show the per-variant metrics of an experiment.
    #[clap(name = "metrics")]
    Metrics {
        /// The name of the experiment.
        name: String,
    },
    /// Promote the winning variant of an experiment and end it.
    #[clap(name = "promote")]
    Promote {
        /// The name of the experiment.
        name: String,
        #[command(flatten)]
        config: PromotionConfigArgs,
    },
    /// Ingest logged request rows from a JSON file holding one row or an array of rows.
    #[clap(name = "record-request")]
    RecordRequest {
        #[clap(long)]
        file: PathBuf,
    },
    /// Restore the configuration that preceded a promotion.
    #[clap(name = "rollback")]
    Rollback {
        /// The id of the promotion to roll back.
        promotion_id: Uuid,
        /// Why the promotion is being rolled back.
        #[clap(long)]
        reason: String,
    },
    /// Try to promote a winner in every active experiment.
    #[clap(name = "scan")]
    Scan {
        #[command(flatten)]
        config: PromotionConfigArgs,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigSubCmd {
    /// Print the resolved auto-promotion config.
    #[clap(name = "show")]
    Show {
        #[command(flatten)]
        config: PromotionConfigArgs,
    },
    /// Validate the resolved auto-promotion config.
    #[clap(name = "validate")]
    Validate {
        #[command(flatten)]
        config: PromotionConfigArgs,
    },
}

impl Display for SubCmd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubCmd::AdjustTraffic { .. } => write!(f, "adjust_traffic"),
            SubCmd::Assign { .. } => write!(f, "assign"),
            SubCmd::Check { .. } => write!(f, "check"),
            SubCmd::Config(config_cmd) => write!(f, "config_{config_cmd}"),
            SubCmd::Create { .. } => write!(f, "create"),
            SubCmd::End { .. } => write!(f, "end"),
            SubCmd::List => write!(f, "list"),
            SubCmd::Metrics { .. } => write!(f, "metrics"),
            SubCmd::Promote { .. } => write!(f, "promote"),
            SubCmd::RecordRequest { .. } => write!(f, "record_request"),
            SubCmd::Rollback { .. } => write!(f, "rollback"),
            SubCmd::Scan { .. } => write!(f, "scan"),
        }
    }
}

impl Display for ConfigSubCmd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSubCmd::Show { .. } => write!(f, "show"),
            ConfigSubCmd::Validate { .. } => write!(f, "validate"),
        }
    }
}
