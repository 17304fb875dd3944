// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Cluster-level mapping update coordinator.
//!
//! Batches `PUT MAPPING` requests and mapping-refresh tasks into versioned
//! cluster-state revisions, the way a distributed search/SQL engine's
//! master node batches schema changes before publishing a new cluster
//! state to the rest of the cluster.
//!
//! The crate owns the merge and version-bookkeeping algorithms
//! ([`executor::refresh::RefreshExecutor`],
//! [`executor::put_mapping::PutMappingExecutor`]) and the partitioned-index
//! column-position algorithm ([`populator::ColumnPositionPopulator`]). It
//! does not implement a mapper engine, document storage, or a real
//! cluster-state transport; those are represented as traits in
//! [`collaborators`] that a production deployment wires up.

pub mod collaborators;
pub mod config;
pub mod error;
pub mod executor;
pub mod facade;
pub mod model;
pub mod naming;
pub mod populator;
pub mod schema_codec;

pub use config::{AckPolicy, CoordinatorConfig};
pub use error::{MappingError, MappingResult};
pub use executor::{PutMappingExecutor, PutMappingOutcome, RefreshExecutor, RefreshOutcome};
pub use facade::{MappingCoordinator, PutMappingAck};
pub use model::{
    ClusterState, IndexMetadata, IndexName, IndexTemplateMetadata, IndexUuid, MappingMetadata,
    Metadata, PutMappingRequest, RefreshTask, SchemaBytes, SchemaTree,
};
