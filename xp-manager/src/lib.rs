// Copyright (C) 2025 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

#[macro_use]
extern crate tracing;

pub mod cmd;
pub mod config;

use colored::Colorize;
use xp_engine::{EligibilityResult, Experiment};

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum VerbosityLevel {
    Minimal,
    Normal,
    Full,
}

impl From<u8> for VerbosityLevel {
    fn from(verbosity: u8) -> Self {
        match verbosity {
            1 => VerbosityLevel::Minimal,
            2 => VerbosityLevel::Normal,
            3 => VerbosityLevel::Full,
            _ => VerbosityLevel::Normal,
        }
    }
}

/// How command results are written to stdout.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct OutputOptions {
    pub json: bool,
    pub verbosity: VerbosityLevel,
}

impl OutputOptions {
    pub fn human(&self) -> bool {
        !self.json && self.verbosity != VerbosityLevel::Minimal
    }
}

pub fn print_banner(text: &str) {
    let padding = 2;
    let text_width = text.len() + padding * 2;
    let border_chars = 2;
    let total_width = text_width + border_chars;
    let top_bottom = "═".repeat(total_width);

    println!("╔{top_bottom}╗");
    println!("║ {text:^text_width$} ║");
    println!("╚{top_bottom}╝");
}

pub fn print_json<T: serde::Serialize>(value: &T) -> color_eyre::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

fn format_state(experiment: &Experiment) -> String {
    if experiment.is_active {
        "ACTIVE".green().to_string()
    } else if experiment.winning_variant_id.is_some() {
        "PROMOTED".blue().to_string()
    } else {
        "ENDED".red().to_string()
    }
}

fn format_eligibility(eligibility: &EligibilityResult) -> String {
    if eligibility.eligible {
        "ELIGIBLE".green().to_string()
    } else {
        "NOT ELIGIBLE".yellow().to_string()
    }
}

fn format_optional<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_verbosity_is_normal() {
        assert_eq!(VerbosityLevel::from(0), VerbosityLevel::Normal);
        assert_eq!(VerbosityLevel::from(1), VerbosityLevel::Minimal);
        assert_eq!(VerbosityLevel::from(7), VerbosityLevel::Normal);
    }

    #[test]
    fn missing_values_print_as_a_dash() {
        assert_eq!(format_optional::<f64>(None), "-");
        assert_eq!(format_optional(Some(0.25)), "0.25");
    }
}
