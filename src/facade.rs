// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! The public entry point: batches refresh tasks and `PUT MAPPING`
//! requests into cluster-state revisions and waits for them to be
//! acknowledged.

use std::sync::Arc;

use log::info;
use parking_lot::RwLock;

use crate::collaborators::{
    AckOutcome, AcknowledgementCoordinator, ClusterStateBuilder, IndexServiceRegistry,
    MapperServiceFactory, MetadataResolver,
};
use crate::config::CoordinatorConfig;
use crate::error::MappingResult;
use crate::executor::{PutMappingExecutor, PutMappingOutcome, RefreshExecutor, RefreshOutcome};
use crate::model::{ClusterState, PutMappingRequest, RefreshTask};

/// Outcome of a single `PUT MAPPING` request after its cluster-state
/// revision (if any) has been published and waited on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutMappingAck {
    /// The request changed no index's mapping; there was nothing to
    /// acknowledge.
    NoOp,
    /// A revision was published and acknowledged within its timeout.
    Acknowledged,
    /// A revision was published but not every required node acknowledged
    /// it before the request's timeout elapsed. The change is still live;
    /// only the wait timed out.
    TimedOut,
}

/// Ties the two executors to a shared, swappable cluster state and to the
/// collaborator implementations a production deployment supplies.
///
/// Holds the current [`ClusterState`] behind an `Arc` swapped under a
/// `RwLock`, so a batch that produces no change (every task a no-op, every
/// request a no-op) leaves the previously published `Arc` untouched —
/// `Arc::ptr_eq` against the pre-call state holds.
pub struct MappingCoordinator {
    state: RwLock<Arc<ClusterState>>,
    config: CoordinatorConfig,
    mapper_factory: Arc<dyn MapperServiceFactory>,
    index_services: Arc<dyn IndexServiceRegistry>,
    metadata_resolver: Arc<dyn MetadataResolver>,
    cluster_state_builder: Arc<dyn ClusterStateBuilder>,
    ack_coordinator: Arc<dyn AcknowledgementCoordinator>,
}

impl MappingCoordinator {
    pub fn new(
        initial_state: ClusterState,
        config: CoordinatorConfig,
        mapper_factory: Arc<dyn MapperServiceFactory>,
        index_services: Arc<dyn IndexServiceRegistry>,
        metadata_resolver: Arc<dyn MetadataResolver>,
        cluster_state_builder: Arc<dyn ClusterStateBuilder>,
        ack_coordinator: Arc<dyn AcknowledgementCoordinator>,
    ) -> Self {
        MappingCoordinator {
            state: RwLock::new(Arc::new(initial_state)),
            config,
            mapper_factory,
            index_services,
            metadata_resolver,
            cluster_state_builder,
            ack_coordinator,
        }
    }

    /// The cluster state as of the coordinator's last committed batch.
    pub fn current_state(&self) -> Arc<ClusterState> {
        self.state.read().clone()
    }

    /// Reconcile a single index's cluster metadata with its mapper.
    /// Convenience wrapper around [`Self::submit_refresh_batch`].
    pub fn refresh_mapping(&self, task: RefreshTask) -> RefreshOutcome {
        let outcomes = self.submit_refresh_batch(vec![task]);
        outcomes.into_iter().next().expect("one task in, one outcome out")
    }

    /// Apply a single `PUT MAPPING` request and wait for it to be
    /// acknowledged. Convenience wrapper around
    /// [`Self::submit_put_mapping_batch`].
    pub fn put_mapping(&self, request: PutMappingRequest) -> MappingResult<PutMappingAck> {
        let acks = self.submit_put_mapping_batch(vec![request])?;
        Ok(acks.into_iter().next().expect("one request in, one ack out"))
    }

    /// Batch-process refresh tasks (typically many queued while a master
    /// failover was in progress) into at most one new cluster-state
    /// revision. `mapping_version` is never bumped by this path.
    pub fn submit_refresh_batch(&self, batch: Vec<RefreshTask>) -> Vec<RefreshOutcome> {
        let current = self.current_state();
        let executor = RefreshExecutor::new(self.mapper_factory.as_ref(), self.index_services.as_ref());
        let (new_state, outcomes) = executor.execute(&current, &batch);

        if let Some(new_state) = new_state {
            info!(
                "refresh batch repaired {} of {} tasks",
                outcomes.iter().filter(|o| **o == RefreshOutcome::Repaired).count(),
                batch.len()
            );
            *self.state.write() = Arc::new(new_state);
        }

        outcomes
    }

    /// Batch-process `PUT MAPPING` requests into at most one new
    /// cluster-state revision, then wait for that revision (if any) to be
    /// acknowledged according to [`CoordinatorConfig::ack_policy`].
    pub fn submit_put_mapping_batch(
        &self,
        batch: Vec<PutMappingRequest>,
    ) -> MappingResult<Vec<PutMappingAck>> {
        let current = self.current_state();
        let executor = PutMappingExecutor::new(
            self.mapper_factory.as_ref(),
            self.index_services.as_ref(),
            self.metadata_resolver.as_ref(),
            self.cluster_state_builder.as_ref(),
        );
        let (new_state, outcomes) = executor.execute(&current, &batch)?;

        let Some(new_state) = new_state else {
            return Ok(outcomes.iter().map(|_| PutMappingAck::NoOp).collect());
        };

        let new_state = Arc::new(new_state);
        *self.state.write() = new_state.clone();

        // One commit covers the whole batch, so there is exactly one
        // revision to wait on; use the longest timeout any request in the
        // batch asked for.
        let timeout = batch
            .iter()
            .map(|r| r.ack_timeout)
            .max()
            .unwrap_or(self.config.default_ack_timeout);
        let ack = self
            .ack_coordinator
            .await_ack(&new_state, self.config.ack_policy, timeout);

        Ok(outcomes
            .into_iter()
            .map(|outcome| match outcome {
                PutMappingOutcome::NoOp { .. }
                | PutMappingOutcome::Unresolved { .. }
                | PutMappingOutcome::Rejected { .. } => PutMappingAck::NoOp,
                PutMappingOutcome::Applied { .. } => match ack {
                    AckOutcome::Acknowledged => PutMappingAck::Acknowledged,
                    AckOutcome::TimedOut => PutMappingAck::TimedOut,
                },
            })
            .collect())
    }
}
