// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Error taxonomy for the mapping coordinator.

use thiserror::Error;

/// Errors produced while batching or applying mapping tasks.
///
/// Per-request variants (everything except [`MappingError::ExecutorFatal`]) are
/// captured in a batch result and never abort sibling requests in the same
/// batch; see `PutMappingExecutor::execute`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    #[error("no concrete indices matched expression `{0}`")]
    RequestResolution(String),

    #[error("failed to parse mapping source for index `{index}`: {reason}")]
    MappingParse { index: String, reason: String },

    #[error("mapping update rejected for index `{index}`: {reason}")]
    MappingValidation { index: String, reason: String },

    #[error("expected index metadata for `{0}` was not present in cluster state")]
    StateInconsistency(String),

    #[error("cluster state builder rejected the revision: {0}")]
    ExecutorFatal(String),
}

impl MappingError {
    /// Irrecoverable errors abort the whole batch; everything else is scoped
    /// to the single request or task that produced it.
    pub fn is_batch_fatal(&self) -> bool {
        matches!(self, MappingError::ExecutorFatal(_))
    }
}

pub type MappingResult<T> = Result<T, MappingError>;
