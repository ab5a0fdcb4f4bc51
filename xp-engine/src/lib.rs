// Copyright (C) 2025 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

//! Traffic allocation, auto-promotion and rollback of AI configuration experiments.

pub mod ai_config;
pub mod allocator;
pub mod audit;
pub mod eligibility;
pub mod engine;
pub mod error;
pub mod experiment;
pub mod hooks;
pub mod lifecycle;
pub mod metrics;
pub mod promotion_config;
pub mod rollback;
pub mod scan;
pub mod stats;
pub mod store;

#[macro_use]
extern crate tracing;

pub use ai_config::{AiConfig, ConfigOverrides, VersionedConfig};
pub use allocator::TrafficAllocator;
pub use audit::{PromotionRecord, RollbackRecord};
pub use eligibility::{EligibilityResult, ExcludedVariant};
pub use engine::{PromotionEngine, PromotionResult};
pub use error::{Error, ErrorKind, Result};
pub use experiment::{
    Experiment, NewExperiment, NewVariant, RequestRecord, TrafficAllocation, Variant,
};
pub use hooks::{PostCommitHook, TracingHook};
pub use metrics::VariantMetrics;
pub use promotion_config::{
    AutoPromotionConfig, AutoPromotionOverrides, PrimaryMetric, PromotionPreset,
    SignificanceTestMethod, ValidationReport,
};
pub use rollback::{RollbackResult, RollbackStatus};
pub use scan::{ScanError, ScanResult, SkippedExperiment};
pub use store::{ExperimentRegistry, ExperimentStore, registry::get_default_registry_path};
