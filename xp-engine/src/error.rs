// Copyright (C) 2025 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Promotion '{0}' has already been rolled back")]
    AlreadyRolledBack(Uuid),
    #[error(
        "The base configuration was modified concurrently: expected version {expected}, found {actual}"
    )]
    ConcurrentModification { expected: u64, actual: u64 },
    #[error("Experiment '{0}' was not found")]
    ExperimentNotFound(String),
    #[error("Experiment '{experiment}' is not eligible for promotion: {reason}")]
    NotEligible { experiment: String, reason: String },
    #[error("Promotion '{0}' was not found")]
    PromotionNotFound(Uuid),
    #[error("Store operation failed: {reason}")]
    TransientStore { reason: String },
    #[error("Validation failed: {}", .errors.join("; "))]
    Validation { errors: Vec<String> },
    #[error("Variant '{0}' was not found")]
    VariantNotFound(Uuid),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::TransientStore {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::TransientStore {
            reason: format!("Failed to serialize/deserialize JSON: {err}"),
        }
    }
}

/// The coarse error taxonomy callers branch on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Validation,
    NotFound,
    NotEligible,
    TransientStore,
}

impl ErrorKind {
    /// Stable code for structured error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::NotEligible => "NOT_ELIGIBLE",
            ErrorKind::TransientStore => "TRANSIENT_STORE_ERROR",
        }
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation { .. } => ErrorKind::Validation,
            Error::ExperimentNotFound(_)
            | Error::PromotionNotFound(_)
            | Error::VariantNotFound(_) => ErrorKind::NotFound,
            Error::NotEligible { .. }
            | Error::ConcurrentModification { .. }
            | Error::AlreadyRolledBack(_) => ErrorKind::NotEligible,
            Error::TransientStore { .. } => ErrorKind::TransientStore,
        }
    }

    pub(crate) fn validation(error: impl Into<String>) -> Self {
        Error::Validation {
            errors: vec![error.into()],
        }
    }
}
