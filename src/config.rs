// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Coordinator-wide configuration.

use std::time::Duration;

/// How many nodes must acknowledge a published cluster-state revision
/// before a `PUT MAPPING` request is considered complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckPolicy {
    /// Wait for every node currently in the cluster.
    AllNodes,
    /// Wait for at least this many nodes, regardless of cluster size.
    AtLeast(usize),
}

impl Default for AckPolicy {
    fn default() -> Self {
        AckPolicy::AllNodes
    }
}

/// Tunables for [`crate::facade::MappingCoordinator`].
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub ack_policy: AckPolicy,
    pub default_ack_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        CoordinatorConfig {
            ack_policy: AckPolicy::default(),
            default_ack_timeout: Duration::from_secs(30),
        }
    }
}
