// Copyright (C) 2025 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

mod error;
mod layers;

use crate::layers::{LogFormatter, TracingLayers, get_logging_targets};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::subscriber::DefaultGuard;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_core::Level;
use tracing_subscriber::{
    Layer, Registry, filter::Targets, fmt as tracing_fmt, layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use error::{Error, Result};
pub use layers::{ReloadHandle, XP_LOG_ENV};

#[derive(Debug, Clone)]
pub enum LogOutputDest {
    /// Log to standard output
    Stdout,
    /// Log to standard error
    Stderr,
    /// Log to a file (`*.log`) or a directory of daily rolling files
    Path(PathBuf),
}

impl std::fmt::Display for LogOutputDest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogOutputDest::Stdout => write!(f, "stdout"),
            LogOutputDest::Stderr => write!(f, "stderr"),
            LogOutputDest::Path(p) => write!(f, "{}", p.to_string_lossy()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogFormat {
    Default,
    Json,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Default => "default",
            LogFormat::Json => "json",
        }
    }
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "default" => Ok(LogFormat::Default),
            "json" => Ok(LogFormat::Json),
            other => Err(Error::UnknownLogFormat(other.to_string())),
        }
    }
}

/// Controls which set of targets is enabled when no explicit target list is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbosityLevel {
    /// Only the application's own default targets
    Minimal,
    /// Every crate in the workspace at INFO
    Standard,
    /// Every crate in the workspace at TRACE
    Verbose,
}

pub struct LogBuilder {
    default_logging_targets: Vec<(String, Level)>,
    output_dest: LogOutputDest,
    format: LogFormat,
    print_updates_to_stdout: bool,
    verbosity: Option<VerbosityLevel>,
}

impl LogBuilder {
    /// Create a new builder.
    ///
    /// Provide the default logging targets; the `XP_LOG` env var can add to or override them.
    pub fn new(default_logging_targets: Vec<(String, Level)>) -> Self {
        Self {
            default_logging_targets,
            output_dest: LogOutputDest::Stderr,
            format: LogFormat::Default,
            print_updates_to_stdout: true,
            verbosity: None,
        }
    }

    pub fn output_dest(&mut self, output_dest: LogOutputDest) {
        self.output_dest = output_dest;
    }

    pub fn format(&mut self, format: LogFormat) {
        self.format = format;
    }

    /// Print "Logging to ..." style updates to stdout while initializing.
    pub fn print_updates_to_stdout(&mut self, print: bool) {
        self.print_updates_to_stdout = print;
    }

    pub fn verbosity(&mut self, verbosity: VerbosityLevel) {
        self.verbosity = Some(verbosity);
    }

    /// Install the global subscriber.
    ///
    /// Keep the returned `WorkerGuard` alive for as long as file logging is needed.
    pub fn initialize(self) -> Result<(ReloadHandle, Option<WorkerGuard>)> {
        let mut layers = TracingLayers::default();

        let reload_handle = layers.fmt_layer(
            self.default_logging_targets,
            &self.output_dest,
            self.format,
            self.print_updates_to_stdout,
            self.verbosity,
        )?;

        tracing_subscriber::registry()
            .with(layers.layers)
            .try_init()?;

        Ok((reload_handle, layers.log_appender_guard))
    }

    /// Initialize a subscriber scoped to the current thread for a `#[tokio::test]`.
    ///
    /// Output goes through the test writer so it is only shown for failing tests.
    pub fn init_single_threaded_tokio_test() -> DefaultGuard {
        let subscriber = tracing_subscriber::registry().with(Self::test_layer());
        tracing::subscriber::set_default(subscriber)
    }

    /// Initialize a global subscriber for multi-threaded tests.
    ///
    /// Only the first call installs the subscriber, later calls are no-ops.
    pub fn init_multi_threaded_tokio_test() {
        let result = tracing_subscriber::registry()
            .with(Self::test_layer())
            .try_init();
        if result.is_err() {
            tracing::trace!("A global test subscriber was already installed");
        }
    }

    fn test_layer() -> Box<dyn Layer<Registry> + Send + Sync> {
        let xp_log = std::env::var(XP_LOG_ENV).ok();
        let targets = get_logging_targets(
            xp_log.as_deref(),
            vec![
                ("xp_engine".to_string(), Level::TRACE),
                ("xp_manager".to_string(), Level::TRACE),
                ("xp_logging".to_string(), Level::TRACE),
            ],
            None,
            false,
        );

        tracing_fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .event_format(LogFormatter)
            .with_test_writer()
            .with_filter(Targets::new().with_targets(targets))
            .boxed()
    }
}
