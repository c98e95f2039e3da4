//! Downstream systems that receive part of a processed receipt.

pub mod archive;
pub mod automation;
pub mod mime;
pub mod notification;

pub use archive::*;
pub use automation::*;
pub use notification::*;

use serde::Serialize;

/// What happened to one sink during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SinkOutcome<T> {
    Succeeded { reference: T },
    Skipped { reason: String },
    Failed { cause: String },
}

impl<T> SinkOutcome<T> {
    pub fn succeeded(reference: T) -> Self {
        Self::Succeeded { reference }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    pub fn failed(cause: impl std::fmt::Display) -> Self {
        Self::Failed {
            cause: cause.to_string(),
        }
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    pub fn reference(&self) -> Option<&T> {
        match self {
            Self::Succeeded { reference } => Some(reference),
            _ => None,
        }
    }
}
