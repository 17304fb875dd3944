// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Fake collaborator implementations exercising the coordinator end to end
//! without a real mapper engine, storage layer, or cluster transport.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;

use mapping_coordinator::collaborators::{
    AckOutcome, AcknowledgementCoordinator, ClusterStateBuilder, DocumentMapper,
    IndexServiceRegistry, MapperServiceFactory, MergeReason, MergedMapping, MetadataResolver,
    RemovalReason,
};
use mapping_coordinator::error::{MappingError, MappingResult};
use mapping_coordinator::{ClusterState, IndexMetadata, IndexName, IndexUuid, Metadata, SchemaTree};
use mapping_coordinator::schema_codec;

/// A document mapper that tracks one index's current mapping tree and
/// rejects a merge that would change an existing property's declared type
/// — the same conflict a real mapper engine's type-compatibility check
/// would catch.
pub struct FakeDocumentMapper {
    index_name: String,
    tree: Mutex<SchemaTree>,
}

impl FakeDocumentMapper {
    pub fn new(index_name: impl Into<String>, tree: SchemaTree) -> Self {
        FakeDocumentMapper {
            index_name: index_name.into(),
            tree: Mutex::new(tree),
        }
    }
}

fn properties_of(tree: &SchemaTree) -> serde_json::Map<String, Value> {
    tree.get("default")
        .and_then(Value::as_object)
        .and_then(|default| default.get("properties"))
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

impl FakeDocumentMapper {
    fn merge_inner(
        &self,
        source: &mapping_coordinator::SchemaBytes,
        install: bool,
    ) -> MappingResult<MergedMapping> {
        let incoming = schema_codec::decode(source, &self.index_name)?;
        let mut current = self.tree.lock();
        let current_props = properties_of(&current);
        let incoming_props = properties_of(&incoming);

        for (name, incoming_prop) in &incoming_props {
            if let Some(existing_prop) = current_props.get(name) {
                let existing_type = existing_prop.get("type").and_then(Value::as_str);
                let incoming_type = incoming_prop.get("type").and_then(Value::as_str);
                if let (Some(existing_type), Some(incoming_type)) = (existing_type, incoming_type) {
                    if existing_type != incoming_type {
                        return Err(MappingError::MappingValidation {
                            index: self.index_name.clone(),
                            reason: format!(
                                "property `{name}` cannot change type from `{existing_type}` to `{incoming_type}`"
                            ),
                        });
                    }
                }
            }
        }

        let mut merged_props = current_props;
        for (name, value) in incoming_props {
            merged_props.insert(name, value);
        }
        let merged_tree: SchemaTree = serde_json::json!({ "default": { "properties": merged_props } })
            .as_object()
            .cloned()
            .unwrap();

        if install {
            *current = merged_tree.clone();
        }

        Ok(MergedMapping {
            tree: merged_tree.clone(),
            source: schema_codec::encode(&merged_tree),
        })
    }
}

impl DocumentMapper for FakeDocumentMapper {
    fn simulate_merge(&self, source: &mapping_coordinator::SchemaBytes) -> MappingResult<MergedMapping> {
        self.merge_inner(source, false)
    }

    fn merge(&self, source: &mapping_coordinator::SchemaBytes, _reason: MergeReason) -> MappingResult<MergedMapping> {
        self.merge_inner(source, true)
    }

    fn current_source(&self) -> mapping_coordinator::SchemaBytes {
        schema_codec::encode(&self.tree.lock())
    }
}

/// Caches a [`FakeDocumentMapper`] per index UUID, the way a real
/// `MapperService` caches parsed mappers keyed by index.
pub struct FakeMapperServiceFactory {
    cache: Mutex<HashMap<IndexUuid, Arc<dyn DocumentMapper>>>,
    releases: Mutex<Vec<IndexUuid>>,
}

impl FakeMapperServiceFactory {
    pub fn new() -> Self {
        FakeMapperServiceFactory {
            cache: Mutex::new(HashMap::new()),
            releases: Mutex::new(Vec::new()),
        }
    }

    pub fn release_count(&self) -> usize {
        self.releases.lock().len()
    }

    /// Pre-populate the cache as if a mapper had already loaded `tree` for
    /// `uuid` independently of cluster state — used to set up drift
    /// scenarios without going through a prior `PUT MAPPING`.
    pub fn seed(&self, uuid: IndexUuid, index_name: impl Into<String>, tree: SchemaTree) {
        self.cache
            .lock()
            .insert(uuid, Arc::new(FakeDocumentMapper::new(index_name, tree)));
    }
}

impl MapperServiceFactory for FakeMapperServiceFactory {
    fn mapper_for(&self, index: &IndexMetadata) -> MappingResult<Arc<dyn DocumentMapper>> {
        let mut cache = self.cache.lock();
        if let Some(mapper) = cache.get(&index.uuid) {
            return Ok(mapper.clone());
        }
        let tree = schema_codec::decode(&index.mapping.source, &index.name)?;
        let mapper: Arc<dyn DocumentMapper> = Arc::new(FakeDocumentMapper::new(index.name.clone(), tree));
        cache.insert(index.uuid, mapper.clone());
        Ok(mapper)
    }

    fn release(&self, uuid: IndexUuid) {
        self.releases.lock().push(uuid);
        self.cache.lock().remove(&uuid);
    }
}

/// Resolves a trailing `*` wildcard by prefix match; anything else is
/// treated as an exact index name.
pub struct FakeMetadataResolver;

impl MetadataResolver for FakeMetadataResolver {
    fn resolve_concrete_indices(&self, state: &ClusterState, expression: &str) -> Vec<IndexName> {
        if let Some(prefix) = expression.strip_suffix('*') {
            let mut matches: Vec<IndexName> = state
                .metadata
                .indices
                .keys()
                .filter(|name| name.starts_with(prefix))
                .cloned()
                .collect();
            matches.sort();
            matches
        } else if state.metadata.indices.contains_key(expression) {
            vec![expression.to_string()]
        } else {
            Vec::new()
        }
    }
}

/// Tracks which index UUIDs had a transient index service opened and
/// released. Indices pre-registered via [`Self::mark_locally_open`] are
/// reported as already open and must never be created or released by an
/// executor.
pub struct FakeIndexServiceRegistry {
    locally_open: Mutex<HashSet<IndexUuid>>,
    creates: Mutex<Vec<IndexUuid>>,
    releases: Mutex<Vec<(IndexUuid, RemovalReason)>>,
}

impl FakeIndexServiceRegistry {
    pub fn new() -> Self {
        FakeIndexServiceRegistry {
            locally_open: Mutex::new(HashSet::new()),
            creates: Mutex::new(Vec::new()),
            releases: Mutex::new(Vec::new()),
        }
    }

    pub fn mark_locally_open(&self, uuid: IndexUuid) {
        self.locally_open.lock().insert(uuid);
    }

    pub fn create_count(&self) -> usize {
        self.creates.lock().len()
    }

    pub fn release_count(&self) -> usize {
        self.releases.lock().len()
    }
}

impl IndexServiceRegistry for FakeIndexServiceRegistry {
    fn lookup(&self, uuid: IndexUuid) -> bool {
        self.locally_open.lock().contains(&uuid)
    }

    fn create(&self, index: &IndexMetadata) -> MappingResult<()> {
        self.creates.lock().push(index.uuid);
        Ok(())
    }

    fn release_transient(&self, uuid: IndexUuid, reason: RemovalReason) {
        self.releases.lock().push((uuid, reason));
    }
}

/// Commits a new revision by incrementing the version, the way a real
/// cluster-state update queue would once its own consistency checks pass.
pub struct FakeClusterStateBuilder;

impl ClusterStateBuilder for FakeClusterStateBuilder {
    fn commit(&self, current: &ClusterState, updated_metadata: Metadata) -> MappingResult<ClusterState> {
        Ok(ClusterState {
            version: current.version + 1,
            metadata: updated_metadata,
        })
    }
}

/// Always reports every revision as acknowledged immediately.
pub struct FakeAcknowledgementCoordinator;

impl AcknowledgementCoordinator for FakeAcknowledgementCoordinator {
    fn await_ack(
        &self,
        _state: &ClusterState,
        _policy: mapping_coordinator::AckPolicy,
        _timeout: Duration,
    ) -> AckOutcome {
        AckOutcome::Acknowledged
    }
}
