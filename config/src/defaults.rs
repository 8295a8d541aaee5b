//! # Defaults List
//!
//! Parses the `defaults:` entries of a configuration file.
//!
//! | YAML form                  | Entry                                    |
//! |----------------------------|------------------------------------------|
//! | `- _self_`                 | [`DefaultsEntry::SelfRef`]               |
//! | `- name`                   | [`DefaultsEntry::Config`]                |
//! | `- group: option`          | [`DefaultsEntry::Group`]                 |
//! | `- group: null`            | group placeholder without a selection    |
//! | `- optional group: option` | group that may be missing on disk        |
//! | `- override group: option` | [`DefaultsEntry::Override`]              |
//! | `- group@pkg: option`      | group merged under an explicit package   |

use errors::ComposeError;
use serde_yaml::Value;

/// One parsed `defaults:` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultsEntry {
    /// Position of the including file's own body.
    SelfRef,

    /// A config in the same group as the including file (or absolute with a
    /// leading `/`).
    Config {
        path: String,
        package: Option<String>,
        optional: bool
    },

    /// Selection of an option for a config group.
    Group {
        group: String,
        option: Option<String>,
        package: Option<String>,
        optional: bool
    },

    /// Change of the option of a group declared elsewhere.
    Override { group: String, option: Option<String> }
}

impl DefaultsEntry {
    /// Parse one YAML entry. `config` names the including file for error
    /// messages.
    pub fn parse(raw: &Value, config: &str) -> Result<Self, ComposeError> {
        let invalid = |reason: String| ComposeError::InvalidDefaultsEntry {
            config: config.to_string(),
            reason
        };

        match raw {
            Value::String(s) if s == "_self_" => Ok(Self::SelfRef),
            Value::String(s) => {
                let (path, package) = split_package(s);
                Ok(Self::Config {
                    path: path.to_string(),
                    package,
                    optional: false
                })
            }
            Value::Mapping(mapping) => {
                if mapping.len() != 1 {
                    return Err(invalid(format!(
                        "expected a single 'group: option' pair, got {} keys",
                        mapping.len()
                    )));
                }
                let Some((key, value)) = mapping.iter().next() else {
                    return Err(invalid("empty entry".to_string()));
                };
                let key = key
                    .as_str()
                    .ok_or_else(|| invalid(format!("group name must be a string: {key:?}")))?;
                let option = match value {
                    Value::Null => None,
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    Value::Bool(b) => Some(b.to_string()),
                    other => {
                        return Err(invalid(format!(
                            "option of '{key}' must be a scalar, got {other:?}"
                        )));
                    }
                };
                Self::from_keyword(key, option).map_err(invalid)
            }
            other => Err(invalid(format!("unsupported entry {other:?}")))
        }
    }

    fn from_keyword(key: &str, option: Option<String>) -> Result<Self, String> {
        let key = key.trim();
        if let Some(group) = key.strip_prefix("override ") {
            let group = group.trim();
            if group.contains('@') {
                return Err(format!("'override {group}' cannot change a package"));
            }
            return Ok(Self::Override {
                group: group.to_string(),
                option
            });
        }

        let (optional, key) = match key.strip_prefix("optional ") {
            Some(rest) => (true, rest.trim()),
            None => (false, key)
        };
        if key.is_empty() {
            return Err("empty group name".to_string());
        }

        let (group, package) = split_package(key);
        Ok(Self::Group {
            group: group.to_string(),
            option,
            package,
            optional
        })
    }

    /// Group key this entry selects or overrides, if any.
    pub fn group(&self) -> Option<&str> {
        match self {
            Self::Group { group, .. } | Self::Override { group, .. } => Some(group),
            _ => None
        }
    }
}

fn split_package(key: &str) -> (&str, Option<String>) {
    match key.split_once('@') {
        Some((group, package)) => (group.trim(), Some(package.trim().to_string())),
        None => (key.trim(), None)
    }
}

/// Parse a whole defaults list.
pub fn parse_defaults(raw: &[Value], config: &str) -> Result<Vec<DefaultsEntry>, ComposeError> {
    raw.iter()
        .map(|entry| DefaultsEntry::parse(entry, config))
        .collect()
}

/// Resolve a group path relative to the including file's group. A leading
/// `/` makes the path absolute.
pub fn absolute_group(parent_group: &str, group: &str) -> String {
    match group.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None if parent_group.is_empty() => group.to_string(),
        None => format!("{parent_group}/{group}")
    }
}

/// Resolve the package of an entry relative to the including file's
/// package.
///
/// - `_global_` (or `_global_.x`) addresses the root
/// - `_here_` (or `_here_.x`) is the including file's package
/// - `_group_` (or `_group_.x`) is the entry's own group package
pub fn resolve_package(parent_package: &str, group_package: &str, package: &str) -> String {
    let (head, rest) = match package.split_once('.') {
        Some((head, rest)) => (head, rest),
        None => (package, "")
    };
    let base = match head {
        "_global_" => "",
        "_here_" => parent_package,
        "_group_" => group_package,
        _ => return crate::tree::join_path(parent_package, package)
    };
    crate::tree::join_path(base, rest)
}
