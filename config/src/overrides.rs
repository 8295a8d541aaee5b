//! # Command-Line Overrides
//!
//! Parses and applies `key=value` style overrides.
//!
//! | form              | effect                                      |
//! |-------------------|---------------------------------------------|
//! | `key=value`       | change an existing key or a group selection |
//! | `+key=value`      | add a key or a group that is not present    |
//! | `++key=value`     | add or overwrite                            |
//! | `~key[=value]`    | delete, optionally checking the value       |

use crate::tree::{get_path, remove_path, set_path};
use errors::ComposeError;
use serde_yaml::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideKind {
    Change,
    Add,
    ForceAdd,
    Delete
}

/// One parsed command-line override.
#[derive(Debug, Clone, PartialEq)]
pub struct Override {
    pub kind: OverrideKind,
    pub key: String,
    /// Raw text right of `=`, kept for group selections.
    pub raw_value: Option<String>,
    pub value: Option<Value>,
    pub text: String
}

impl FromStr for Override {
    type Err = ComposeError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ComposeError::InvalidOverride {
            text: text.to_string(),
            reason: reason.to_string()
        };

        let trimmed = text.trim();
        let (kind, rest) = if let Some(rest) = trimmed.strip_prefix("++") {
            (OverrideKind::ForceAdd, rest)
        } else if let Some(rest) = trimmed.strip_prefix('+') {
            (OverrideKind::Add, rest)
        } else if let Some(rest) = trimmed.strip_prefix('~') {
            (OverrideKind::Delete, rest)
        } else {
            (OverrideKind::Change, trimmed)
        };

        let (key, raw_value) = match rest.split_once('=') {
            Some((key, value)) => (key.trim(), Some(value.trim().to_string())),
            None => (rest.trim(), None)
        };

        if key.is_empty() {
            return Err(invalid("missing key"));
        }
        if key.split('.').any(str::is_empty) {
            return Err(invalid("empty segment in key"));
        }
        if raw_value.is_none() && kind != OverrideKind::Delete {
            return Err(invalid("expected 'key=value'"));
        }

        let value = raw_value.as_deref().map(parse_value);
        Ok(Self {
            kind,
            key: key.to_string(),
            raw_value,
            value,
            text: trimmed.to_string()
        })
    }
}

impl fmt::Display for Override {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Parse the value side of an override as YAML, falling back to a plain
/// string. An empty value is the empty string.
pub fn parse_value(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::String(String::new());
    }
    match serde_yaml::from_str::<Value>(raw) {
        Ok(Value::Tagged(_)) | Err(_) => Value::String(raw.to_string()),
        Ok(value) => value
    }
}

/// Parse every override in order.
pub fn parse_overrides<S: AsRef<str>>(texts: &[S]) -> Result<Vec<Override>, ComposeError> {
    texts.iter().map(|t| t.as_ref().parse()).collect()
}

/// Apply a value (non-group) override to a composed tree.
pub fn apply_override(config: &mut Value, ov: &Override) -> Result<(), ComposeError> {
    let exists = get_path(config, &ov.key).is_some();
    match ov.kind {
        OverrideKind::Change => {
            if !exists {
                return Err(ComposeError::KeyNotFound {
                    key: ov.key.clone()
                });
            }
            set_path(config, &ov.key, ov.value.clone().unwrap_or(Value::Null))
        }
        OverrideKind::Add => {
            if exists {
                return Err(ComposeError::KeyAlreadyExists {
                    key: ov.key.clone()
                });
            }
            set_path(config, &ov.key, ov.value.clone().unwrap_or(Value::Null))
        }
        OverrideKind::ForceAdd => {
            set_path(config, &ov.key, ov.value.clone().unwrap_or(Value::Null))
        }
        OverrideKind::Delete => {
            let current = get_path(config, &ov.key).ok_or_else(|| ComposeError::DeleteMismatch {
                key: ov.key.clone(),
                reason: "key not found".to_string()
            })?;
            if let Some(expected) = &ov.value {
                if current != expected {
                    return Err(ComposeError::DeleteMismatch {
                        key: ov.key.clone(),
                        reason: format!(
                            "value {} does not match {}",
                            crate::tree::scalar_to_string(current),
                            crate::tree::scalar_to_string(expected)
                        )
                    });
                }
            }
            remove_path(config, &ov.key);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    fn ov(text: &str) -> Override {
        text.parse().unwrap()
    }

    #[test]
    fn test_parse_kinds() {
        assert_eq!(ov("env=grid").kind, OverrideKind::Change);
        assert_eq!(ov("+experiment=lattice").kind, OverrideKind::Add);
        assert_eq!(ov("++seed=3").kind, OverrideKind::ForceAdd);
        assert_eq!(ov("~logger.tags").kind, OverrideKind::Delete);
        assert_eq!(ov("~logger.tags").value, None);
    }

    #[test]
    fn test_parse_values_as_yaml() {
        assert_eq!(ov("a=0.001").value, Some(yaml("0.001")));
        assert_eq!(ov("a=true").value, Some(Value::Bool(true)));
        assert_eq!(ov("a=null").value, Some(Value::Null));
        assert_eq!(ov("a=[1, 2]").value, Some(yaml("[1, 2]")));
        assert_eq!(ov("a={x: 1}").value, Some(yaml("{x: 1}")));
        assert_eq!(
            ov("a=crystals/lattice_parameters").value,
            Some(Value::String("crystals/lattice_parameters".to_string()))
        );
        assert_eq!(ov("a=").value, Some(Value::String(String::new())));
        assert_eq!(
            ov("a=[unclosed").value,
            Some(Value::String("[unclosed".to_string()))
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("=3".parse::<Override>().is_err());
        assert!("gflownet..lr=3".parse::<Override>().is_err());
        assert!("gflownet.lr".parse::<Override>().is_err());
    }

    #[test]
    fn test_change_requires_existing_key() {
        let mut config = yaml("gflownet: {optimizer: {lr: 0.0001}}");
        apply_override(&mut config, &ov("gflownet.optimizer.lr=0.01")).unwrap();
        assert_eq!(config["gflownet"]["optimizer"]["lr"].as_f64(), Some(0.01));

        let err = apply_override(&mut config, &ov("gflownet.optimizer.z_dim=4")).unwrap_err();
        assert!(matches!(err, ComposeError::KeyNotFound { .. }));
    }

    #[test]
    fn test_add_and_force_add() {
        let mut config = yaml("seed: 0");
        apply_override(&mut config, &ov("+logger.tags=[lattice]")).unwrap();
        assert_eq!(config["logger"]["tags"], yaml("[lattice]"));

        let err = apply_override(&mut config, &ov("+seed=1")).unwrap_err();
        assert!(matches!(err, ComposeError::KeyAlreadyExists { .. }));

        apply_override(&mut config, &ov("++seed=1")).unwrap();
        assert_eq!(config["seed"].as_u64(), Some(1));
    }

    #[test]
    fn test_delete_with_and_without_value() {
        let mut config = yaml("a: 1\nb: 2\n");
        apply_override(&mut config, &ov("~a")).unwrap();
        assert!(config.get("a").is_none());

        let err = apply_override(&mut config, &ov("~b=3")).unwrap_err();
        assert!(matches!(err, ComposeError::DeleteMismatch { .. }));
        apply_override(&mut config, &ov("~b=2")).unwrap();
        assert!(config.get("b").is_none());
    }

    #[test]
    fn test_same_overrides_twice_is_idempotent() {
        let base = yaml("gflownet: {optimizer: {lr: 0.0001, batch_size: {forward: 10}}}");
        let overrides = parse_overrides(&[
            "gflownet.optimizer.lr=0.01",
            "++gflownet.optimizer.batch_size.forward=100",
        ])
        .unwrap();

        let mut once = base.clone();
        for o in &overrides {
            apply_override(&mut once, o).unwrap();
        }
        let mut twice = once.clone();
        for o in &overrides {
            apply_override(&mut twice, o).unwrap();
        }
        assert_eq!(once, twice);
    }
}
