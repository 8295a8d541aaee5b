//! # Configuration Tree
//!
//! Dotted-path access into a composed configuration held as a
//! `serde_yaml::Value` tree.

use errors::ComposeError;
use serde_yaml::{Mapping, Value};

/// Split a dotted path into its segments. An empty path addresses the root.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('.').filter(|s| !s.is_empty()).collect()
}

/// Join a package prefix and a key.
pub fn join_path(prefix: &str, key: &str) -> String {
    match (prefix.is_empty(), key.is_empty()) {
        (true, _) => key.to_string(),
        (_, true) => prefix.to_string(),
        _ => format!("{prefix}.{key}")
    }
}

pub fn get_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    split_path(path)
        .into_iter()
        .try_fold(root, |node, key| node.as_mapping()?.get(key))
}

pub fn get_path_mut<'a>(root: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    split_path(path)
        .into_iter()
        .try_fold(root, |node, key| node.as_mapping_mut()?.get_mut(key))
}

/// Set `value` at `path`, creating intermediate mappings. `null`
/// intermediates are replaced by mappings; any other scalar is an error.
pub fn set_path(root: &mut Value, path: &str, value: Value) -> Result<(), ComposeError> {
    let segments = split_path(path);
    let Some((last, parents)) = segments.split_last() else {
        *root = value;
        return Ok(());
    };

    let mut node = root;
    let mut walked = String::new();
    for key in parents {
        walked = join_path(&walked, key);
        if node.is_null() {
            *node = Value::Mapping(Mapping::new());
        }
        let mapping = node
            .as_mapping_mut()
            .ok_or_else(|| ComposeError::NotAMapping {
                path: walked.clone()
            })?;
        node = mapping
            .entry(Value::String((*key).to_string()))
            .or_insert(Value::Null);
    }

    if node.is_null() {
        *node = Value::Mapping(Mapping::new());
    }
    let mapping = node.as_mapping_mut().ok_or(ComposeError::NotAMapping { path: walked })?;
    mapping.insert(Value::String((*last).to_string()), value);
    Ok(())
}

/// Remove the node at `path`, returning it.
pub fn remove_path(root: &mut Value, path: &str) -> Option<Value> {
    let segments = split_path(path);
    let (last, parents) = segments.split_last()?;
    let parent = parents
        .iter()
        .try_fold(root, |node, key| node.as_mapping_mut()?.get_mut(*key))?;
    parent.as_mapping_mut()?.shift_remove(*last)
}

/// Nest `value` under the dotted `package` path.
pub fn wrap_in_package(value: Value, package: &str) -> Value {
    split_path(package).into_iter().rev().fold(value, |inner, key| {
        let mut mapping = Mapping::new();
        mapping.insert(Value::String(key.to_string()), inner);
        Value::Mapping(mapping)
    })
}

/// Flatten a tree into `(dotted path, leaf)` pairs. Empty mappings are
/// reported as leaves so that they survive a diff.
pub fn flatten(root: &Value) -> Vec<(String, Value)> {
    let mut out = Vec::new();
    flatten_into(root, "", &mut out);
    out
}

fn flatten_into(node: &Value, prefix: &str, out: &mut Vec<(String, Value)>) {
    match node {
        Value::Mapping(mapping) if !mapping.is_empty() => {
            for (key, child) in mapping {
                flatten_into(child, &join_path(prefix, &key_to_string(key)), out);
            }
        }
        other => out.push((prefix.to_string(), other.clone()))
    }
}

pub fn key_to_string(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => scalar_to_string(other)
    }
}

/// Render a leaf the way it would appear inside an interpolated string.
pub fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(b) => (if *b { "True" } else { "False" }).to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default()
    }
}
