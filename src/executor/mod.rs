// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Batch executors: the two ways a cluster-state revision gets produced.

pub mod put_mapping;
pub mod refresh;

pub use put_mapping::{PutMappingExecutor, PutMappingOutcome};
pub use refresh::{RefreshExecutor, RefreshOutcome};
