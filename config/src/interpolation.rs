//! # Interpolation
//!
//! Resolves `${...}` expressions once composition is finished.
//!
//! - `${a.b.c}`: absolute reference to another node
//! - `${oc.env:VAR}` / `${oc.env:VAR,default}`: environment variable, with
//!   the default also used when the variable is blank
//! - `${now:%Y-%m-%d_%H-%M-%S}`: local time at resolution
//!
//! A string made of exactly one interpolation takes the referenced node with
//! its type; interpolations embedded in text are stringified.

use crate::tree::{get_path, join_path, key_to_string, scalar_to_string};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use errors::ComposeError;
use regex::Regex;
use serde_yaml::{Mapping, Value};
use std::sync::LazyLock;

static INTERPOLATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([^${}]+)\}").expect("interpolation pattern is a valid regex")
});

/// Resolve every interpolation in `config`.
pub fn resolve(config: &Value) -> Result<Value, ComposeError> {
    resolve_at(config, Local::now())
}

/// Resolve with a fixed clock, so that all `${now:...}` in one configuration
/// agree.
pub fn resolve_at(config: &Value, now: DateTime<Local>) -> Result<Value, ComposeError> {
    let resolver = Resolver { root: config, now };
    resolver.resolve_node(config, "", &mut Vec::new())
}

/// Whether a tree still contains interpolations.
pub fn has_interpolations(config: &Value) -> bool {
    match config {
        Value::String(s) => INTERPOLATION.is_match(s),
        Value::Mapping(m) => m.values().any(has_interpolations),
        Value::Sequence(seq) => seq.iter().any(has_interpolations),
        _ => false
    }
}

struct Resolver<'a> {
    root: &'a Value,
    now: DateTime<Local>
}

impl Resolver<'_> {
    fn resolve_node(
        &self,
        node: &Value,
        path: &str,
        stack: &mut Vec<String>
    ) -> Result<Value, ComposeError> {
        match node {
            Value::Mapping(mapping) => {
                let mut out = Mapping::new();
                for (key, child) in mapping {
                    let child_path = join_path(path, &key_to_string(key));
                    out.insert(key.clone(), self.resolve_node(child, &child_path, stack)?);
                }
                Ok(Value::Mapping(out))
            }
            Value::Sequence(seq) => seq
                .iter()
                .enumerate()
                .map(|(i, child)| self.resolve_node(child, &join_path(path, &i.to_string()), stack))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Sequence),
            Value::String(s) => self.resolve_string(s, stack),
            other => Ok(other.clone())
        }
    }

    fn resolve_string(&self, s: &str, stack: &mut Vec<String>) -> Result<Value, ComposeError> {
        let matches: Vec<_> = INTERPOLATION.captures_iter(s).collect();
        if matches.is_empty() {
            return Ok(Value::String(s.to_string()));
        }

        if let [only] = matches.as_slice() {
            if only.get(0).is_some_and(|m| m.as_str() == s) {
                return self.resolve_expression(&only[1], stack);
            }
        }

        let mut out = String::with_capacity(s.len());
        let mut last = 0;
        for caps in &matches {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            out.push_str(&s[last..whole.start()]);
            let value = self.resolve_expression(&caps[1], stack)?;
            out.push_str(&scalar_to_string(&value));
            last = whole.end();
        }
        out.push_str(&s[last..]);

        // A substitution may itself produce a new interpolation.
        if INTERPOLATION.is_match(&out) && out != s {
            return self.resolve_string(&out, stack);
        }
        Ok(Value::String(out))
    }

    fn resolve_expression(
        &self,
        expression: &str,
        stack: &mut Vec<String>
    ) -> Result<Value, ComposeError> {
        let expression = expression.trim();
        if let Some((resolver, args)) = expression.split_once(':') {
            return self.call_resolver(resolver.trim(), args.trim());
        }

        let key = expression.to_string();
        if stack.contains(&key) {
            return Err(ComposeError::InterpolationCycle { key });
        }
        let target = get_path(self.root, &key)
            .ok_or_else(|| ComposeError::InterpolationKeyNotFound { key: key.clone() })?;

        stack.push(key.clone());
        let resolved = self.resolve_node(target, &key, stack);
        stack.pop();
        resolved
    }

    fn call_resolver(&self, resolver: &str, args: &str) -> Result<Value, ComposeError> {
        match resolver {
            "oc.env" => {
                let (name, default) = match args.split_once(',') {
                    Some((name, default)) => (name.trim(), Some(unquote(default.trim()))),
                    None => (args, None)
                };
                // A blank variable counts as unset when a default is given.
                match (std::env::var(name), default) {
                    (Ok(value), Some(default)) if value.trim().is_empty() => {
                        Ok(Value::String(default.to_string()))
                    }
                    (Ok(value), _) => Ok(Value::String(value)),
                    (Err(_), Some(default)) => Ok(Value::String(default.to_string())),
                    (Err(_), None) => Err(ComposeError::MissingEnvVar {
                        name: name.to_string()
                    })
                }
            }
            "now" => self.format_now(args),
            other => Err(ComposeError::UnsupportedResolver {
                resolver: other.to_string()
            })
        }
    }

    fn format_now(&self, pattern: &str) -> Result<Value, ComposeError> {
        // `%f` is microseconds in the run-dir patterns, chrono's `%f` is nanoseconds.
        let pattern = pattern.replace("%f", "%6f");
        let items: Vec<Item<'_>> = StrftimeItems::new(&pattern).collect();
        if items.iter().any(|item| matches!(item, Item::Error)) {
            return Err(ComposeError::UnsupportedResolver {
                resolver: format!("now:{pattern}")
            });
        }
        Ok(Value::String(
            self.now.format_with_items(items.into_iter()).to_string()
        ))
    }
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .or_else(|| s.strip_prefix('"').and_then(|s| s.strip_suffix('"')))
        .unwrap_or(s)
}
