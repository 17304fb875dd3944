// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Conversion between compressed schema bytes and the parsed tree used by
//! [`crate::populator::ColumnPositionPopulator`]. The Rust analogue of
//! `XContentHelper.convertToMap(bytes, ordered, JSON)`.

use serde_json::Value;

use crate::error::{MappingError, MappingResult};
use crate::model::{SchemaBytes, SchemaTree};

/// Parse compressed schema bytes into a mutable tree-of-maps.
///
/// `index` is only used to annotate a parse failure; it plays no role in
/// decoding itself.
pub fn decode(bytes: &SchemaBytes, index: &str) -> MappingResult<SchemaTree> {
    let value: Value =
        serde_json::from_slice(bytes.as_slice()).map_err(|e| MappingError::MappingParse {
            index: index.to_string(),
            reason: e.to_string(),
        })?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(MappingError::MappingParse {
            index: index.to_string(),
            reason: format!("expected a JSON object at the mapping root, found {other}"),
        }),
    }
}

/// Re-encode a tree-of-maps into compressed schema bytes.
pub fn encode(tree: &SchemaTree) -> SchemaBytes {
    let bytes = serde_json::to_vec(tree).expect("SchemaTree values always serialize");
    SchemaBytes::new(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_an_object() {
        let bytes = SchemaBytes::from_str(r#"{"default":{"properties":{"a":{"type":"keyword"}}}}"#);
        let tree = decode(&bytes, "t1").unwrap();
        let re_encoded = encode(&tree);
        assert_eq!(decode(&re_encoded, "t1").unwrap(), tree);
    }

    #[test]
    fn rejects_non_object_root() {
        let bytes = SchemaBytes::from_str("[1,2,3]");
        assert!(decode(&bytes, "t1").is_err());
    }

    #[test]
    fn rejects_malformed_json() {
        let bytes = SchemaBytes::from_str("{not json");
        assert!(decode(&bytes, "t1").is_err());
    }
}
