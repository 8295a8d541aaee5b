//! # Configuration Precedence
//!
//! Deep-merges configuration layers. Later layers win.
//!
//! # Precedence Order
//! 1. Command-line value overrides (highest priority)
//! 2. Experiment files selected by the defaults list
//! 3. Group options (`env`, `gflownet`, `proxy`, ...)
//! 4. Primary config (lowest priority)
//!
//! Mappings merge key by key. Every other combination replaces: sequences are
//! not concatenated and an explicit `null` clears the previous value.

use crate::tree::{join_path, key_to_string, scalar_to_string};
use serde_yaml::{Mapping, Value};

const MASKED_KEYS: [&str; 4] = ["api_key", "password", "token", "secret"];

/// Merge an ordered list of `(source_name, layer)` pairs.
///
/// # Usage
/// ```rust
/// use config::merge_layers;
///
/// let base: serde_yaml::Value = serde_yaml::from_str("optimizer: {lr: 0.001, z_dim: 16}").unwrap();
/// let exp: serde_yaml::Value = serde_yaml::from_str("optimizer: {lr: 0.01}").unwrap();
/// let merged = merge_layers(vec![("base".into(), base), ("experiment".into(), exp)]);
/// assert_eq!(merged["optimizer"]["lr"].as_f64(), Some(0.01));
/// assert_eq!(merged["optimizer"]["z_dim"].as_u64(), Some(16));
/// ```
pub fn merge_layers(layers: Vec<(String, Value)>) -> Value {
    layers
        .into_iter()
        .fold(Value::Mapping(Mapping::new()), |base, (source, layer)| {
            merge_with_logging(base, layer, &source)
        })
}

/// Merge one layer into `base`, logging each changed leaf under the layer's
/// source name.
pub fn merge_with_logging(mut base: Value, override_layer: Value, source_name: &str) -> Value {
    let mut changes = Vec::new();
    merge_node(&mut base, override_layer, "", &mut changes);

    if !changes.is_empty() {
        tracing::debug!("Configuration from {}: {:?}", source_name, changes);
    }

    base
}

/// Merge without change tracking.
pub fn merge_values(mut base: Value, override_layer: Value) -> Value {
    let mut changes = Vec::new();
    merge_node(&mut base, override_layer, "", &mut changes);
    base
}

fn merge_node(base: &mut Value, override_node: Value, path: &str, changes: &mut Vec<String>) {
    match (base, override_node) {
        (Value::Mapping(base_map), Value::Mapping(override_map)) => {
            for (key, value) in override_map {
                let child_path = join_path(path, &key_to_string(&key));
                match base_map.get_mut(&key) {
                    Some(existing) => merge_node(existing, value, &child_path, changes),
                    None => {
                        record_change(&child_path, &value, changes);
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base_slot, override_node) => {
            if *base_slot != override_node {
                record_change(path, &override_node, changes);
                *base_slot = override_node;
            }
        }
    }
}

fn record_change(path: &str, value: &Value, changes: &mut Vec<String>) {
    let leaf = path.rsplit('.').next().unwrap_or(path);
    if MASKED_KEYS.iter().any(|k| leaf.contains(k)) {
        changes.push(format!("{path} = ***"));
    } else if value.is_mapping() {
        changes.push(format!("{path} = {{..}}"));
    } else {
        changes.push(format!("{path} = {}", scalar_to_string(value)));
    }
}

/// Changes between two versions of a tree: new or changed leaves, plus keys
/// of `base` that `updated` no longer has (`path = <removed>`).
pub fn diff_changes(base: &Value, updated: &Value) -> Vec<String> {
    let mut changes = Vec::new();
    diff_node(base, updated, "", &mut changes);
    changes
}

fn diff_node(base: &Value, updated: &Value, path: &str, changes: &mut Vec<String>) {
    match (base, updated) {
        (Value::Mapping(base_map), Value::Mapping(updated_map)) => {
            for (key, value) in updated_map {
                let child_path = join_path(path, &key_to_string(key));
                match base_map.get(key) {
                    Some(old) => diff_node(old, value, &child_path, changes),
                    None => record_change(&child_path, value, changes)
                }
            }
            for key in base_map.keys().filter(|k| !updated_map.contains_key(*k)) {
                changes.push(format!("{} = <removed>", join_path(path, &key_to_string(key))));
            }
        }
        (old, value) => {
            if old != value {
                record_change(path, value, changes);
            }
        }
    }
}
