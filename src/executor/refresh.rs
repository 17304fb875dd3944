// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Reconciles cluster metadata with whatever mapping a node's mapper
//! actually has loaded, without ever bumping `mapping_version`.
//!
//! A refresh never represents a user-intended change: it only repairs
//! drift (e.g. after a master failover observed a mapping update that
//! never made it into the published cluster state). Because nothing here
//! is a semantic change, `mapping_version` is left untouched.

use std::sync::Arc;

use log::{debug, warn};

use crate::collaborators::{IndexServiceRegistry, MapperServiceFactory, MergeReason, RemovalReason};
use crate::model::{ClusterState, RefreshTask};

/// What happened to one [`RefreshTask`] in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The index's mapping in cluster state already matched the mapper's
    /// loaded mapping; nothing changed.
    UpToDate,
    /// Cluster state was repaired to match the mapper's loaded mapping.
    Repaired,
    /// The task referred to an index that no longer exists, or whose UUID
    /// no longer matches the current incarnation; discarded.
    Stale,
}

pub struct RefreshExecutor<'a> {
    pub mapper_factory: &'a dyn MapperServiceFactory,
    pub index_services: &'a dyn IndexServiceRegistry,
}

impl<'a> RefreshExecutor<'a> {
    pub fn new(
        mapper_factory: &'a dyn MapperServiceFactory,
        index_services: &'a dyn IndexServiceRegistry,
    ) -> Self {
        RefreshExecutor {
            mapper_factory,
            index_services,
        }
    }

    /// Process every task in `batch` against `current`. Returns `None` if
    /// no task produced a change, so callers can preserve reference
    /// equality on a no-op batch (see `MappingCoordinator::submit_refresh_batch`).
    pub fn execute(
        &self,
        current: &ClusterState,
        batch: &[RefreshTask],
    ) -> (Option<ClusterState>, Vec<RefreshOutcome>) {
        let mut metadata = current.metadata.clone();
        let mut outcomes = Vec::with_capacity(batch.len());
        let mut changed = false;

        for task in batch {
            let outcome = self.execute_one(current, &mut metadata, task);
            changed |= outcome == RefreshOutcome::Repaired;
            outcomes.push(outcome);
        }

        if changed {
            (
                Some(ClusterState {
                    version: current.version,
                    metadata,
                }),
                outcomes,
            )
        } else {
            (None, outcomes)
        }
    }

    fn execute_one(
        &self,
        current: &ClusterState,
        metadata: &mut crate::model::Metadata,
        task: &RefreshTask,
    ) -> RefreshOutcome {
        let Some(index_metadata) = current.metadata.indices.get(&task.index_name) else {
            debug!("refresh: index `{}` no longer exists, discarding", task.index_name);
            return RefreshOutcome::Stale;
        };
        if index_metadata.uuid != task.expected_uuid {
            debug!(
                "refresh: index `{}` UUID changed since task was queued, discarding",
                task.index_name
            );
            return RefreshOutcome::Stale;
        }

        // Use the locally open index service if present; only a transient
        // one this call itself opens gets released below.
        let locally_open = self.index_services.lookup(index_metadata.uuid);
        if !locally_open {
            if let Err(err) = self.index_services.create(index_metadata) {
                warn!(
                    "refresh: could not open index service for `{}`: {err}",
                    task.index_name
                );
                return RefreshOutcome::Stale;
            }
        }

        let outcome = match self.mapper_factory.mapper_for(index_metadata) {
            Ok(mapper) => self.reconcile(metadata, index_metadata, mapper),
            Err(err) => {
                warn!(
                    "refresh: could not obtain mapper for `{}`: {err}",
                    task.index_name
                );
                RefreshOutcome::Stale
            }
        };

        self.mapper_factory.release(index_metadata.uuid);
        if !locally_open {
            self.index_services
                .release_transient(index_metadata.uuid, RemovalReason::NoLongerAssigned);
        }

        outcome
    }

    fn reconcile(
        &self,
        metadata: &mut crate::model::Metadata,
        index_metadata: &crate::model::IndexMetadata,
        mapper: Arc<dyn crate::collaborators::DocumentMapper>,
    ) -> RefreshOutcome {
        let actual_source = mapper.current_source();
        if actual_source == index_metadata.mapping.source {
            return RefreshOutcome::UpToDate;
        }

        let merged = match mapper.merge(&actual_source, MergeReason::MappingRecovery) {
            Ok(merged) => merged,
            Err(err) => {
                warn!(
                    "refresh: mapper rejected its own loaded mapping for `{}`: {err}",
                    index_metadata.name
                );
                return RefreshOutcome::Stale;
            }
        };

        if let Some(entry) = metadata.indices.get_mut(&index_metadata.name) {
            entry.mapping.source = merged.source;
        }
        RefreshOutcome::Repaired
    }
}
