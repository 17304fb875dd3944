// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Seams onto the systems this crate deliberately does not implement: the
//! mapper engine, the index-service/storage layer, and the cluster-state
//! queue and acknowledgement machinery. Executors and the facade depend only
//! on these traits; production wiring supplies the real implementations.

use std::sync::Arc;

use crate::config::AckPolicy;
use crate::error::MappingResult;
use crate::model::{ClusterState, IndexMetadata, IndexName, IndexUuid, SchemaBytes, SchemaTree};

/// Why a mapping merge is being performed. `MappingRecovery` merges are
/// produced by [`crate::executor::refresh::RefreshExecutor`] reconciling
/// cluster state with an already-loaded mapper; `MappingUpdate` merges are
/// produced by [`crate::executor::put_mapping::PutMappingExecutor`]
/// applying a user-submitted change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeReason {
    MappingRecovery,
    MappingUpdate,
}

/// A parsed, merged mapping as produced by a [`DocumentMapper`]. Carries
/// both the resulting tree and its re-encoded source so callers never have
/// to re-derive one from the other.
#[derive(Debug, Clone)]
pub struct MergedMapping {
    pub tree: SchemaTree,
    pub source: SchemaBytes,
}

/// A single index's live mapper: owns the parsed mapping and knows how to
/// merge a new source into it without committing the result.
///
/// Instances are cached per index UUID and shared across every request in a
/// batch, so methods take `&self`; real implementations hold their mutable
/// state behind internal synchronization.
pub trait DocumentMapper: Send + Sync {
    /// Dry-run `source` against the mapper's current mapping and return
    /// what the merge would produce, without installing anything. Called
    /// once per request ahead of [`Self::merge`] so validation errors
    /// surface before any partitioned-index position stamping is done
    /// against content that might not even be acceptable.
    fn simulate_merge(&self, source: &SchemaBytes) -> MappingResult<MergedMapping>;

    /// Merge `source` into the mapper's current mapping and install the
    /// result. Called once per request, after its dry run passed and (for a
    /// partitioned index) after `ColumnPositionPopulator` has stamped
    /// `source`, so what gets installed here is exactly what lands in
    /// cluster state.
    fn merge(&self, source: &SchemaBytes, reason: MergeReason) -> MappingResult<MergedMapping>;

    /// The mapper's currently installed source, independent of any pending
    /// merge.
    fn current_source(&self) -> SchemaBytes;
}

/// Produces (and caches) [`DocumentMapper`] instances for an index.
/// Analogous to `MapperService` in a search-engine node: expensive to
/// construct, so implementations typically keep an internal cache keyed on
/// [`IndexUuid`].
pub trait MapperServiceFactory: Send + Sync {
    /// Obtain (creating and caching if necessary) the mapper for `index`.
    fn mapper_for(&self, index: &IndexMetadata) -> MappingResult<Arc<dyn DocumentMapper>>;

    /// Release any ephemeral state the factory holds for `uuid`. Must be
    /// idempotent and safe to call even if `mapper_for` was never called
    /// for this UUID; executors call this on every exit path, success or
    /// failure.
    fn release(&self, uuid: IndexUuid);
}

/// Resolves an index expression (e.g. a wildcard or alias) against a
/// cluster state into the concrete index names it currently matches.
pub trait MetadataResolver: Send + Sync {
    /// Returns the concrete index names matched by `expression`, or an
    /// empty vec if none match.
    fn resolve_concrete_indices(
        &self,
        state: &ClusterState,
        expression: &str,
    ) -> Vec<IndexName>;
}

/// Why a transient index-service instance is being released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    NoLongerAssigned,
}

/// The storage/index-service layer backing concrete indices. Executors use
/// this only to open and release index services while merging a mapping;
/// they never read or write actual documents through it.
///
/// An index service that is already open locally (the node is currently
/// assigned the index) must be left alone: executors call [`Self::lookup`]
/// first and only [`Self::create`] (and later release) a transient instance
/// when none was already open.
pub trait IndexServiceRegistry: Send + Sync {
    /// True if an index service for `uuid` is already open locally.
    fn lookup(&self, uuid: IndexUuid) -> bool;

    /// Open a transient index-service instance for `index`. Only called
    /// after `lookup` reported none open; the caller releases exactly what
    /// it creates via [`Self::release_transient`].
    fn create(&self, index: &IndexMetadata) -> MappingResult<()>;

    /// Release a transient index-service instance opened on this node for
    /// `uuid`, if one exists. Idempotent. Never called for an index that
    /// was already open locally before the executor touched it.
    fn release_transient(&self, uuid: IndexUuid, reason: RemovalReason);
}

/// Builds the next cluster-state revision from the current one plus a set
/// of metadata edits. Stands in for the cluster-state update queue/executor
/// of a real coordination service: applying a builder's output is assumed
/// to be atomic and to strictly increment `ClusterState::version`.
pub trait ClusterStateBuilder: Send + Sync {
    /// Commit `updated_metadata` as a new revision built on top of
    /// `current`. Returns the new state, or an error if the underlying
    /// queue rejected the revision (e.g. a concurrent conflicting update
    /// already superseded `current`).
    fn commit(
        &self,
        current: &ClusterState,
        updated_metadata: crate::model::Metadata,
    ) -> MappingResult<ClusterState>;
}

/// Outcome of waiting for a cluster-state revision to be acknowledged by
/// the cluster's nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    Acknowledged,
    TimedOut,
}

/// Waits for nodes to apply a published cluster-state revision, according
/// to whatever [`AckPolicy`] the coordinator was configured with.
pub trait AcknowledgementCoordinator: Send + Sync {
    /// Block (or, in an async implementation, suspend) until `state` is
    /// acknowledged per `policy` or `timeout` elapses.
    fn await_ack(
        &self,
        state: &ClusterState,
        policy: AckPolicy,
        timeout: std::time::Duration,
    ) -> AckOutcome;
}
