// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Index-name conventions for partitioned indices.
//!
//! A partitioned index's name is `<template><SEP><partition-ident>`, where
//! `SEP` is a private-use-area code point that cannot appear in a
//! user-supplied template name. This lets the template name contain
//! ordinary punctuation (dots, underscores, hyphens) without ambiguity.

const PARTITION_SEPARATOR: &str = "\u{e000}";

/// True iff `index_name` follows the partitioned-index naming convention.
pub fn is_partitioned_index(index_name: &str) -> bool {
    parent_template_name(index_name).is_some()
}

/// Build the concrete index name for `partition_ident` under `template`.
pub fn partitioned_index_name(template: &str, partition_ident: &str) -> String {
    format!("{template}{PARTITION_SEPARATOR}{partition_ident}")
}

/// Derive the parent template name from a partitioned index name, or
/// `None` if `index_name` is not a partitioned index.
///
/// Total function: every input either yields `Some` template name or
/// `None`. An index name with no separator, an empty template portion, or
/// an empty partition portion is not partitioned.
pub fn parent_template_name(index_name: &str) -> Option<String> {
    let (template, partition) = index_name.split_once(PARTITION_SEPARATOR)?;
    if template.is_empty() || partition.is_empty() {
        return None;
    }
    Some(template.to_string())
}
