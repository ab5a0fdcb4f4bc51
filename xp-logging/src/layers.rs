// Copyright (C) 2025 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

use crate::{LogFormat, LogOutputDest, VerbosityLevel, error::Result};
use std::{collections::BTreeMap, ffi::OsStr, sync::Mutex};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_core::{Event, Level, Subscriber};
use tracing_subscriber::{
    Layer, Registry,
    filter::Targets,
    fmt::{
        self as tracing_fmt, FmtContext, FormatEvent, FormatFields,
        MakeWriter, format::Writer,
        time::{FormatTime, SystemTime},
    },
    layer::Filter,
    registry::LookupSpan,
    reload::{self, Handle},
};

/// Environment variable used to override the logging targets.
pub const XP_LOG_ENV: &str = "XP_LOG";

const LOG_FILE_PREFIX: &str = "xp.log";

// Verbose mode: TRACE level logging for every crate in the workspace
const VERBOSITY_VERBOSE: &str = "verbose";
const VERBOSITY_VERBOSE_SHORT: &str = "v";
// Standard mode: sets ALL crates to INFO level
const VERBOSITY_STANDARD: &str = "standard";
const VERBOSITY_STANDARD_SHORT: &str = "std";
// Minimal mode: uses application's default targets (no override)
const VERBOSITY_MINIMAL: &str = "minimal";
const VERBOSITY_MINIMAL_SHORT: &str = "min";

const WORKSPACE_TARGETS: [&str; 4] = ["xpctl", "xp_engine", "xp_logging", "xp_manager"];

/// Handle that implements functions to change the log level on the fly.
pub struct ReloadHandle(pub(crate) Handle<Box<dyn Filter<Registry> + Send + Sync>, Registry>);

impl ReloadHandle {
    /// Modify the log level to the provided CSV value
    /// Example input: `xp_engine=DEBUG,std,xpctl=ERROR`
    ///
    /// Keywords take less precedence than a target that is explicitly named in the CSV.
    pub fn modify_log_level(&self, logging_value: &str) -> Result<()> {
        let targets: Vec<(String, Level)> =
            get_logging_targets(Some(logging_value), vec![], None, false);
        self.0.modify(|old_filter| {
            let new_filter: Box<dyn Filter<Registry> + Send + Sync> =
                Box::new(Targets::new().with_targets(targets));
            *old_filter = new_filter;
        })?;

        Ok(())
    }
}

#[derive(Default)]
/// Single line formatter: `[time LEVEL module line/span] fields`
pub(crate) struct LogFormatter;

impl<S, N> FormatEvent<S, N> for LogFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let level = *event.metadata().level();
        let module = event.metadata().module_path().unwrap_or("<unknown module>");
        let lno = event.metadata().line().unwrap_or(0);
        let time = SystemTime;

        write!(writer, "[")?;
        time.format_time(&mut writer)?;
        write!(writer, " {level} {module} {lno}")?;
        ctx.visit_spans(|span| write!(writer, "/{}", span.name()))?;
        write!(writer, "] ")?;

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

/// The different Subscribers composed into a list of layers
#[derive(Default)]
pub(crate) struct TracingLayers {
    pub(crate) layers: Vec<Box<dyn Layer<Registry> + Send + Sync>>,
    pub(crate) log_appender_guard: Option<WorkerGuard>,
}

impl TracingLayers {
    pub(crate) fn fmt_layer(
        &mut self,
        application_log_targets: Vec<(String, Level)>,
        output_dest: &LogOutputDest,
        format: LogFormat,
        print_updates_to_stdout: bool,
        verbosity: Option<VerbosityLevel>,
    ) -> Result<ReloadHandle> {
        let layer = match output_dest {
            LogOutputDest::Stdout => {
                if print_updates_to_stdout {
                    println!("Logging to stdout");
                }
                formatted_layer(format, std::io::stdout)
            }
            LogOutputDest::Stderr => formatted_layer(format, std::io::stderr),
            LogOutputDest::Path(path) if path.extension() == Some(OsStr::new("log")) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                if print_updates_to_stdout {
                    println!("Logging to file: {path:?}");
                }
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)?;
                formatted_layer(format, Mutex::new(file))
            }
            LogOutputDest::Path(dir) => {
                std::fs::create_dir_all(dir)?;
                if print_updates_to_stdout {
                    println!("Logging to directory: {dir:?}");
                }
                let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
                let (non_blocking, worker_guard) = tracing_appender::non_blocking(appender);
                self.log_appender_guard = Some(worker_guard);
                formatted_layer(format, non_blocking)
            }
        };

        let xp_log = std::env::var(XP_LOG_ENV).ok();
        let targets = get_logging_targets(
            xp_log.as_deref(),
            application_log_targets,
            verbosity,
            print_updates_to_stdout,
        );

        let target_filters: Box<dyn Filter<Registry> + Send + Sync> =
            Box::new(Targets::new().with_targets(targets));

        let (filter, reload_handle) = reload::Layer::new(target_filters);

        let layer = layer.with_filter(filter);
        self.layers.push(Box::new(layer));

        Ok(ReloadHandle(reload_handle))
    }
}

fn formatted_layer<W>(format: LogFormat, writer: W) -> Box<dyn Layer<Registry> + Send + Sync>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        LogFormat::Json => tracing_fmt::layer()
            .json()
            .flatten_event(true)
            .with_writer(writer)
            .boxed(),
        LogFormat::Default => tracing_fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .event_format(LogFormatter)
            .with_writer(writer)
            .boxed(),
    }
}

/// Computes the final logging targets based on CLI verbosity, the `XP_LOG` env var, and
/// application defaults.
///
/// Precedence for determining base targets:
/// 1. CLI verbosity `standard`/`verbose` sets hardcoded base targets
/// 2. `XP_LOG` keywords (`std`/`verbose`) set hardcoded base targets (when CLI is minimal/none)
/// 3. Application defaults are used otherwise
///
/// Custom overrides from `XP_LOG` (e.g. `xp_engine=debug`) are always applied on top.
pub(crate) fn get_logging_targets(
    xp_log_value: Option<&str>,
    application_log_targets: Vec<(String, Level)>,
    verbosity: Option<VerbosityLevel>,
    print_updates: bool,
) -> Vec<(String, Level)> {
    let (xp_log_keyword, custom_overrides) = parse_xp_log(xp_log_value);

    let effective = match verbosity {
        Some(VerbosityLevel::Standard) | Some(VerbosityLevel::Verbose) => verbosity,
        Some(VerbosityLevel::Minimal) | None => xp_log_keyword,
    };

    let base_targets = match effective {
        Some(VerbosityLevel::Standard) => workspace_targets(Level::INFO),
        Some(VerbosityLevel::Verbose) => workspace_targets(Level::TRACE),
        Some(VerbosityLevel::Minimal) | None => BTreeMap::from_iter(application_log_targets),
    };

    if print_updates {
        let source = match effective {
            Some(level) => format!("verbosity: {level:?}"),
            None => "application default log targets".to_string(),
        };
        if custom_overrides.is_empty() {
            println!("Using {source}");
        } else {
            println!("Using {source} with {XP_LOG_ENV} overrides");
        }
    }

    let mut final_targets = base_targets;
    final_targets.extend(custom_overrides);

    final_targets.into_iter().collect()
}

/// Parses the `XP_LOG` value for keywords (std/verbose/minimal) and custom target overrides.
/// Invalid entries are silently skipped.
fn parse_xp_log(xp_log_value: Option<&str>) -> (Option<VerbosityLevel>, BTreeMap<String, Level>) {
    let Some(value) = xp_log_value else {
        return (None, BTreeMap::new());
    };

    let mut keyword_verbosity = None;
    let mut custom_overrides = BTreeMap::new();

    for part in value.split(',') {
        let trimmed = part.trim();
        if trimmed.is_empty() {
            continue;
        }

        if trimmed == VERBOSITY_VERBOSE || trimmed == VERBOSITY_VERBOSE_SHORT {
            keyword_verbosity = Some(VerbosityLevel::Verbose);
        } else if trimmed == VERBOSITY_STANDARD || trimmed == VERBOSITY_STANDARD_SHORT {
            keyword_verbosity = Some(VerbosityLevel::Standard);
        } else if trimmed == VERBOSITY_MINIMAL || trimmed == VERBOSITY_MINIMAL_SHORT {
            keyword_verbosity = Some(VerbosityLevel::Minimal);
        } else {
            // "crate_name=level", a bare crate name means trace
            let mut split = trimmed.split('=');
            if let Some(crate_name) = split.next() {
                if !crate_name.is_empty() {
                    let log_level = split.next().unwrap_or("trace");
                    if let Some(level) = parse_log_level(log_level) {
                        custom_overrides.insert(crate_name.to_string(), level);
                    }
                }
            }
        }
    }

    (keyword_verbosity, custom_overrides)
}

fn workspace_targets(level: Level) -> BTreeMap<String, Level> {
    WORKSPACE_TARGETS
        .iter()
        .map(|target| (target.to_string(), level))
        .collect()
}

/// Parses a log level string, returning None for invalid values
fn parse_log_level(log_level: &str) -> Option<Level> {
    match log_level.to_lowercase().as_str() {
        "info" | "i" => Some(Level::INFO),
        "debug" | "d" => Some(Level::DEBUG),
        "trace" | "t" => Some(Level::TRACE),
        "warn" | "w" => Some(Level::WARN),
        "error" | "e" => Some(Level::ERROR),
        _ => None,
    }
}
