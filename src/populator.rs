// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Stamps authoritative column `position` attributes from a parent
//! template onto a partitioned index's incoming mapping tree.

use serde_json::{Map, Value};

use crate::error::{MappingError, MappingResult};
use crate::model::SchemaTree;

/// Conventional single-key wrapper mapping trees use for the default
/// document type, e.g. `{"default": {"properties": {...}}}`.
const ROOT_WRAPPER_HINT: usize = 1;

/// Rewrites `index_mapping` in place so every property carries the
/// `position` integer defined by the homonymous property in
/// `template_mapping`.
///
/// `pre_position_boundary` controls what happens when the template itself
/// has no `position` for a property: `true` skips it silently (a legacy
/// template predating the position requirement); `false` treats it as a
/// [`MappingError::StateInconsistency`] — the template violates its own
/// construction invariant.
pub struct ColumnPositionPopulator;

impl ColumnPositionPopulator {
    pub fn populate(
        &self,
        index_mapping: &mut SchemaTree,
        template_mapping: &SchemaTree,
        template_name: &str,
        pre_position_boundary: bool,
    ) -> MappingResult<()> {
        let index_root = unwrap_root_mut(index_mapping);
        let template_root = unwrap_root(template_mapping);
        populate_properties(
            index_root,
            template_root,
            template_name,
            pre_position_boundary,
        )
    }
}

fn unwrap_root(tree: &SchemaTree) -> &Map<String, Value> {
    if tree.len() == ROOT_WRAPPER_HINT {
        if let Some(Value::Object(inner)) = tree.values().next() {
            return inner;
        }
    }
    tree
}

fn unwrap_root_mut(tree: &mut SchemaTree) -> &mut Map<String, Value> {
    if tree.len() == ROOT_WRAPPER_HINT {
        let only_key = tree.keys().next().cloned();
        if let Some(key) = only_key {
            if matches!(tree.get(&key), Some(Value::Object(_))) {
                return tree.get_mut(&key).unwrap().as_object_mut().unwrap();
            }
        }
    }
    tree
}

/// A property may itself be wrapped under `inner` for the
/// collection-of-object case (an array/set of structured values).
fn inner_object(value: &Value) -> Map<String, Value> {
    match value.get("inner") {
        Some(Value::Object(inner)) => inner.clone(),
        _ => value.as_object().cloned().unwrap_or_default(),
    }
}

fn inner_object_mut(value: &mut Value) -> &mut Map<String, Value> {
    let has_inner = matches!(value.get("inner"), Some(Value::Object(_)));
    if has_inner {
        value.get_mut("inner").unwrap().as_object_mut().unwrap()
    } else {
        value.as_object_mut().expect("property values are objects")
    }
}

fn populate_properties(
    index_root: &mut Map<String, Value>,
    template_root: &Map<String, Value>,
    template_name: &str,
    pre_position_boundary: bool,
) -> MappingResult<()> {
    let Some(index_props) = index_root.get_mut("properties").and_then(Value::as_object_mut)
    else {
        return Ok(());
    };
    let template_props = template_root
        .get("properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    for name in index_props.keys().cloned().collect::<Vec<_>>() {
        let template_prop_value = template_props
            .get(&name)
            .cloned()
            .unwrap_or(Value::Object(Map::new()));
        let template_prop_obj = inner_object(&template_prop_value);

        let index_prop_value = index_props.get_mut(&name).unwrap();
        let index_prop_obj = inner_object_mut(index_prop_value);

        match template_prop_obj.get("position").and_then(Value::as_i64) {
            Some(position) => {
                index_prop_obj.insert("position".to_string(), Value::from(position));
            }
            None if pre_position_boundary => {}
            None => {
                return Err(MappingError::StateInconsistency(format!(
                    "template `{template_name}` has no position for property `{name}`"
                )));
            }
        }

        populate_properties(
            index_prop_obj,
            &template_prop_obj,
            template_name,
            pre_position_boundary,
        )?;
    }

    Ok(())
}
