// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Applies user-submitted `PUT MAPPING` requests: resolves index
//! expressions, merges and validates the new source against each
//! concrete index's mapper, stamps partitioned-index column positions from
//! the owning template, and bumps `mapping_version` exactly on every index
//! whose effective mapping source actually changed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;
use rayon::prelude::*;

use crate::collaborators::{
    ClusterStateBuilder, DocumentMapper, IndexServiceRegistry, MapperServiceFactory, MergeReason,
    MetadataResolver, RemovalReason,
};
use crate::error::{MappingError, MappingResult};
use crate::model::{ClusterState, IndexName, IndexUuid, Metadata, PutMappingRequest};
use crate::naming;
use crate::populator::ColumnPositionPopulator;
use crate::schema_codec;

/// Ephemeral `MapperService` map owned by one `execute` invocation: obtained
/// lazily per index, shared across every request in the batch, and released
/// unconditionally before `execute` returns.
type MapperCache = Mutex<HashMap<IndexUuid, Arc<dyn DocumentMapper>>>;

/// Index UUIDs for which this `execute` invocation itself opened a
/// transient index service (as opposed to one already open locally).
/// Populated on first touch of an index, consulted at batch end so only
/// what the executor created gets released.
type TransientSet = Mutex<HashSet<IndexUuid>>;

/// What happened to one concrete index touched by a [`PutMappingRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutMappingOutcome {
    /// The index's mapping source changed; `new_version` is its bumped
    /// `mapping_version`.
    Applied { index: IndexName, new_version: u64 },
    /// The merged source was byte-identical to what was already installed;
    /// no cluster-state change was needed.
    NoOp { index: IndexName },
    /// The request's index expression matched nothing in cluster state.
    Unresolved { expression: String },
    /// A concrete index was matched but the merge or validation failed.
    Rejected { index: IndexName, error: MappingError },
}

pub struct PutMappingExecutor<'a> {
    pub mapper_factory: &'a dyn MapperServiceFactory,
    pub index_services: &'a dyn IndexServiceRegistry,
    pub metadata_resolver: &'a dyn MetadataResolver,
    pub cluster_state_builder: &'a dyn ClusterStateBuilder,
}

impl<'a> PutMappingExecutor<'a> {
    pub fn new(
        mapper_factory: &'a dyn MapperServiceFactory,
        index_services: &'a dyn IndexServiceRegistry,
        metadata_resolver: &'a dyn MetadataResolver,
        cluster_state_builder: &'a dyn ClusterStateBuilder,
    ) -> Self {
        PutMappingExecutor {
            mapper_factory,
            index_services,
            metadata_resolver,
            cluster_state_builder,
        }
    }

    /// Process every request in `batch` against `current`. A single
    /// commit covers the whole batch: either every accepted change lands
    /// in one new cluster-state revision, or (if the builder itself
    /// rejects the revision) the whole batch fails with
    /// [`MappingError::ExecutorFatal`] and nothing is applied.
    pub fn execute(
        &self,
        current: &ClusterState,
        batch: &[PutMappingRequest],
    ) -> MappingResult<(Option<ClusterState>, Vec<PutMappingOutcome>)> {
        let mapper_cache: MapperCache = Mutex::new(HashMap::new());
        let transient_indices: TransientSet = Mutex::new(HashSet::new());
        let mut metadata = current.metadata.clone();
        let mut outcomes = Vec::new();
        let mut changed = false;

        for request in batch {
            // A later request in the same batch must observe the committed
            // effect of an earlier request on the same index, so every
            // request resolves and merges against a fresh snapshot of the
            // metadata accumulated so far rather than the batch's original
            // `current`.
            let working_state = ClusterState {
                version: current.version,
                metadata: metadata.clone(),
            };
            let concrete_indices = self.resolve(&working_state, request);
            if concrete_indices.is_empty() {
                outcomes.push(PutMappingOutcome::Unresolved {
                    expression: request.index_expression.clone(),
                });
                continue;
            }

            // Merging and position-stamping only reads `working_state`; for
            // a wildcard expression touching many partitions of the same
            // template this is the expensive part, so the independent
            // per-index work runs across the rayon pool before anything
            // touches the (non-`Sync`-friendly) working metadata copy.
            let merges: Vec<(IndexName, MappingResult<Option<crate::model::SchemaBytes>>)> =
                concrete_indices
                    .par_iter()
                    .map(|index_name| {
                        let result = match working_state.metadata.indices.get(index_name) {
                            Some(index_metadata) => self.merge_and_populate(
                                &working_state,
                                index_metadata,
                                request,
                                &mapper_cache,
                                &transient_indices,
                            ),
                            None => Err(MappingError::StateInconsistency(index_name.clone())),
                        };
                        (index_name.clone(), result)
                    })
                    .collect();

            for (index_name, result) in merges {
                let outcome = match result {
                    Ok(None) => PutMappingOutcome::NoOp { index: index_name },
                    Ok(Some(final_source)) => {
                        let entry = metadata
                            .indices
                            .get_mut(&index_name)
                            .expect("index present in current state's metadata snapshot");
                        entry.mapping.source = final_source;
                        entry.mapping_version += 1;
                        debug!(
                            "put_mapping: index `{index_name}` mapping_version -> {}",
                            entry.mapping_version
                        );
                        changed = true;
                        PutMappingOutcome::Applied {
                            index: index_name,
                            new_version: entry.mapping_version,
                        }
                    }
                    Err(error) => {
                        warn!("put_mapping: rejected for `{index_name}`: {error}");
                        PutMappingOutcome::Rejected { index: index_name, error }
                    }
                };
                outcomes.push(outcome);
            }
        }

        // Batch completion: release every ephemeral mapper, and only the
        // index-service instances this batch itself opened transiently —
        // an index already open locally before this batch touched it is
        // left alone. Runs unconditionally before returning on any path
        // (success, no-op, or fatal error).
        let touched_uuids: Vec<IndexUuid> = mapper_cache.lock().keys().copied().collect();
        let transient_uuids = transient_indices.lock();
        for uuid in touched_uuids {
            self.mapper_factory.release(uuid);
            if transient_uuids.contains(&uuid) {
                self.index_services
                    .release_transient(uuid, RemovalReason::NoLongerAssigned);
            }
        }
        drop(transient_uuids);

        if !changed {
            return Ok((None, outcomes));
        }

        let new_state = self
            .cluster_state_builder
            .commit(current, metadata)
            .map_err(|err| MappingError::ExecutorFatal(err.to_string()))?;

        Ok((Some(new_state), outcomes))
    }

    fn resolve(&self, current: &ClusterState, request: &PutMappingRequest) -> Vec<IndexName> {
        if let Some(index) = &request.concrete_index {
            if current.metadata.indices.contains_key(index) {
                return vec![index.clone()];
            }
            return Vec::new();
        }
        self.metadata_resolver
            .resolve_concrete_indices(current, &request.index_expression)
    }

    /// Dry-run validates `request.source` against the index's mapper, then
    /// commits it — stamping partitioned-index column positions first where
    /// applicable — and returns the committed source, or `None` if it is
    /// byte-identical to what was already installed.
    fn merge_and_populate(
        &self,
        current: &ClusterState,
        index_metadata: &crate::model::IndexMetadata,
        request: &PutMappingRequest,
        mapper_cache: &MapperCache,
        transient_indices: &TransientSet,
    ) -> MappingResult<Option<crate::model::SchemaBytes>> {
        let mapper = self.cached_mapper(index_metadata, mapper_cache, transient_indices)?;

        // Dry run: surfaces validation errors (e.g. an incompatible type
        // change) before any position stamping touches the candidate
        // content, and without installing anything.
        mapper.simulate_merge(&request.source)?;

        // Commit: for a partitioned index, the content that actually lands
        // in cluster state has positions stamped from the parent template,
        // so the committing merge must run against that populated source,
        // not the raw request source the dry run validated.
        let merged = if let Some(template_name) = naming::parent_template_name(&index_metadata.name)
        {
            let template = current
                .metadata
                .templates
                .get(&template_name)
                .ok_or_else(|| {
                    MappingError::StateInconsistency(format!(
                        "index `{}` names parent template `{template_name}`, which is not present in cluster state",
                        index_metadata.name
                    ))
                })?;
            let mut tree = schema_codec::decode(&request.source, &index_metadata.name)?;
            ColumnPositionPopulator.populate(
                &mut tree,
                &template.mapping,
                &template_name,
                template.pre_position_boundary,
            )?;
            let populated_source = schema_codec::encode(&tree);
            mapper.merge(&populated_source, MergeReason::MappingUpdate)?
        } else {
            mapper.merge(&request.source, MergeReason::MappingUpdate)?
        };

        if merged.source == index_metadata.mapping.source {
            return Ok(None);
        }
        Ok(Some(merged.source))
    }

    /// Obtains `index_metadata`'s mapper from the batch-scoped cache,
    /// creating (and, per the factory's own contract, recovery-seeding) it
    /// on first use. Reused across every request in the batch that touches
    /// the same index. On first use also ensures an index service is open,
    /// recording the index as transient if none was already open locally.
    fn cached_mapper(
        &self,
        index_metadata: &crate::model::IndexMetadata,
        mapper_cache: &MapperCache,
        transient_indices: &TransientSet,
    ) -> MappingResult<Arc<dyn DocumentMapper>> {
        if let Some(mapper) = mapper_cache.lock().get(&index_metadata.uuid) {
            return Ok(mapper.clone());
        }

        if !self.index_services.lookup(index_metadata.uuid) {
            self.index_services.create(index_metadata)?;
            transient_indices.lock().insert(index_metadata.uuid);
        }

        let mapper = self.mapper_factory.mapper_for(index_metadata)?;
        mapper_cache
            .lock()
            .insert(index_metadata.uuid, mapper.clone());
        Ok(mapper)
    }
}
