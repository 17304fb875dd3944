// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Core data model: cluster state, index metadata, mappings and templates.
//!
//! These types are plain values. Nothing in this module talks to a mapper,
//! a registry, or a resolver — those seams live in [`crate::collaborators`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Map as JsonMap;
use serde_json::Value;
use uuid::Uuid;

/// Name of an index, as it appears in cluster metadata.
pub type IndexName = String;

/// A parsed mapping tree (canonical JSON object), as opposed to its
/// compressed [`SchemaBytes`] representation. See `src/schema_codec.rs`.
pub type SchemaTree = JsonMap<String, Value>;

/// The authoritative identity of an index. Index *names* may be reused
/// over time (e.g. after a drop and recreate); the UUID never is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexUuid(pub Uuid);

impl IndexUuid {
    pub fn new_random() -> Self {
        IndexUuid(Uuid::new_v4())
    }
}

impl std::fmt::Display for IndexUuid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compressed schema source bytes. Byte-equal sources are semantically
/// equal; this type's `PartialEq`/`Hash` are therefore exactly byte
/// comparisons, never a parse-and-compare.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaBytes(Arc<[u8]>);

impl SchemaBytes {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        SchemaBytes(bytes.into())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn from_str(source: &str) -> Self {
        SchemaBytes(Arc::from(source.as_bytes()))
    }
}

impl std::fmt::Display for SchemaBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

/// The mapping currently installed on an index: its compressed source plus
/// whatever parsed view callers need (obtained on demand via
/// `schema_codec::decode`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingMetadata {
    pub source: SchemaBytes,
}

impl MappingMetadata {
    pub fn new(source: SchemaBytes) -> Self {
        MappingMetadata { source }
    }

    pub fn empty() -> Self {
        MappingMetadata::new(SchemaBytes::from_str("{}"))
    }
}

/// Per-index record: identity, current mapping, and the mapping's version
/// counter. `mapping_version` increases exactly once per committed change
/// to `mapping.source` (see `PutMappingExecutor`); it is left untouched by
/// `RefreshExecutor`, which only reports drift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub name: IndexName,
    pub uuid: IndexUuid,
    pub mapping: MappingMetadata,
    pub mapping_version: u64,
}

impl IndexMetadata {
    pub fn new(name: impl Into<IndexName>, uuid: IndexUuid) -> Self {
        IndexMetadata {
            name: name.into(),
            uuid,
            mapping: MappingMetadata::empty(),
            mapping_version: 0,
        }
    }
}

/// A parent template's authoritative mapping. `pre_position_boundary`
/// records whether this template predates the version that started
/// requiring a `position` on every property (see
/// `ColumnPositionPopulator` and DESIGN.md's resolution of the open
/// question about legacy templates).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexTemplateMetadata {
    pub name: String,
    pub mapping: SchemaTree,
    pub pre_position_boundary: bool,
}

impl IndexTemplateMetadata {
    pub fn new(name: impl Into<String>, mapping: SchemaTree) -> Self {
        IndexTemplateMetadata {
            name: name.into(),
            mapping,
            pre_position_boundary: false,
        }
    }
}

/// Cluster-wide metadata: every known index and every known template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub indices: HashMap<IndexName, IndexMetadata>,
    pub templates: HashMap<String, IndexTemplateMetadata>,
}

/// An immutable cluster-metadata revision. Every mutation produces a new
/// `ClusterState`; nothing ever mutates one in place (see
/// `ClusterStateBuilder`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterState {
    pub version: u64,
    pub metadata: Metadata,
}

impl ClusterState {
    pub fn empty() -> Self {
        ClusterState {
            version: 0,
            metadata: Metadata::default(),
        }
    }
}

/// Request to reconcile cluster metadata for `index_name` with whatever
/// mapping the local mapper actually has loaded. Discarded if `expected_uuid`
/// no longer matches the index's current identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTask {
    pub index_name: IndexName,
    pub expected_uuid: IndexUuid,
}

/// A single user-submitted `PUT MAPPING` request.
///
/// Either `concrete_index` is already resolved (the common case once an
/// RPC layer has done index-expression expansion), or `index_expression`
/// is resolved fresh against the state the request is applied to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutMappingRequest {
    pub concrete_index: Option<IndexName>,
    pub index_expression: String,
    pub source: SchemaBytes,
    pub ack_timeout: Duration,
}

impl PutMappingRequest {
    pub fn for_index(index: impl Into<IndexName>, source: SchemaBytes) -> Self {
        let index = index.into();
        PutMappingRequest {
            concrete_index: Some(index.clone()),
            index_expression: index,
            source,
            ack_timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_bytes_equality_is_byte_identity() {
        let a = SchemaBytes::from_str(r#"{"a":1}"#);
        let b = SchemaBytes::from_str(r#"{"a":1}"#);
        let c = SchemaBytes::from_str(r#"{"a":2}"#);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn index_metadata_starts_at_version_zero_with_empty_mapping() {
        let meta = IndexMetadata::new("t1", IndexUuid::new_random());
        assert_eq!(meta.mapping_version, 0);
        assert_eq!(meta.mapping, MappingMetadata::empty());
    }
}
