//! # Configuration File Loading
//!
//! Loads configuration trees from YAML or TOML files.
//!
//! Supports automatic format detection based on file extension, the
//! `# @package <pkg>` header and the `defaults:` list.

use errors::ComposeError;
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

/// Configuration file loading error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(String),

    #[error("Failed to parse YAML: {0}")]
    YamlParse(String),

    #[error("Config file has no extension")]
    NoExtension,

    #[error("Unsupported config file format: {0}")]
    UnsupportedFormat(String),

    #[error("Top level of {0} is not a mapping")]
    NotAMapping(String)
}

/// Map a file error into the composer's error, keeping the path.
pub fn load_failed(path: &Path, err: &ConfigFileError) -> ComposeError {
    ComposeError::LoadFailed {
        path: path.display().to_string(),
        reason: err.to_string()
    }
}

/// Package directive found in a `# @package` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageHeader {
    /// `_global_`: merge at the root of the configuration.
    Global,
    /// `_group_`: merge under the config group path (the default).
    Group,
    /// Explicit dotted path.
    Path(String)
}

impl PackageHeader {
    fn parse(raw: &str) -> Self {
        match raw.trim() {
            "_global_" => Self::Global,
            "_group_" => Self::Group,
            other => match other.strip_prefix("_global_.") {
                Some(rest) => Self::Path(rest.to_string()),
                None => Self::Path(other.to_string())
            }
        }
    }
}

/// A loaded configuration file, split into its parts.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub path: PathBuf,
    pub package: Option<PackageHeader>,
    /// Raw `defaults:` entries, parsed later by [`crate::defaults`].
    pub defaults: Option<Vec<Value>>,
    /// Everything except `defaults:`.
    pub body: Value
}

/// Load a configuration tree from a YAML file. An empty file is an empty
/// mapping.
pub fn load_from_yaml(path: &Path) -> Result<Value, ConfigFileError> {
    let contents = read(path)?;
    parse_yaml(&contents)
}

/// Load a configuration tree from a TOML file.
pub fn load_from_toml(path: &Path) -> Result<Value, ConfigFileError> {
    let contents = read(path)?;
    let value: Value =
        toml::from_str(&contents).map_err(|e| ConfigFileError::TomlParse(e.to_string()))?;
    Ok(value)
}

/// Load configuration from file with auto-detection.
///
/// ## Supported Formats
/// - `.toml`: TOML format
/// - `.yaml`: YAML format
/// - `.yml`: YAML format
pub fn load_from_file(path: &Path) -> Result<Value, ConfigFileError> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or(ConfigFileError::NoExtension)?;

    match extension.to_lowercase().as_str() {
        "toml" => load_from_toml(path),
        "yaml" | "yml" => load_from_yaml(path),
        other => Err(ConfigFileError::UnsupportedFormat(other.to_string()))
    }
}

/// Load a file and split it into package header, defaults list and body.
pub fn load_config_file(path: &Path) -> Result<ConfigFile, ConfigFileError> {
    let package = if is_yaml(path) {
        parse_package_header(&read(path)?)
    } else {
        None
    };

    let mut body = load_from_file(path)?;
    let mapping = body
        .as_mapping_mut()
        .ok_or_else(|| ConfigFileError::NotAMapping(path.display().to_string()))?;

    let defaults = match mapping.shift_remove("defaults") {
        None => None,
        Some(Value::Sequence(entries)) => Some(entries),
        Some(Value::Null) => Some(Vec::new()),
        Some(_) => {
            return Err(ConfigFileError::YamlParse(format!(
                "'defaults' in {} must be a list",
                path.display()
            )));
        }
    };

    Ok(ConfigFile {
        path: path.to_path_buf(),
        package,
        defaults,
        body
    })
}

/// Parse the `# @package <pkg>` header. Only comment lines before the first
/// content line are considered.
pub fn parse_package_header(contents: &str) -> Option<PackageHeader> {
    contents
        .lines()
        .map(str::trim)
        .take_while(|line| line.is_empty() || line.starts_with('#'))
        .find_map(|line| {
            line.trim_start_matches('#')
                .trim()
                .strip_prefix("@package")
                .map(PackageHeader::parse)
        })
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|s| s.to_str()).map(str::to_lowercase).as_deref(),
        Some("yaml" | "yml")
    )
}

fn read(path: &Path) -> Result<String, ConfigFileError> {
    std::fs::read_to_string(path)
        .map_err(|_e| ConfigFileError::FileNotFound(path.display().to_string()))
}

fn parse_yaml(contents: &str) -> Result<Value, ConfigFileError> {
    let value: Value =
        serde_yaml::from_str(contents).map_err(|e| ConfigFileError::YamlParse(e.to_string()))?;
    Ok(match value {
        Value::Null => Value::Mapping(Mapping::new()),
        other => other
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_from_yaml() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().with_extension("yaml");

        let yaml_content = r#"
gflownet:
  optimizer:
    loss: trajectorybalance
    lr: 0.0001
    batch_size:
      forward: 10
proxy:
  mu: 0.75
"#;
        fs::write(&path, yaml_content).unwrap();

        let config = load_from_yaml(&path).unwrap();
        assert_eq!(
            config["gflownet"]["optimizer"]["loss"].as_str(),
            Some("trajectorybalance")
        );
        assert_eq!(
            config["gflownet"]["optimizer"]["batch_size"]["forward"].as_u64(),
            Some(10)
        );
        assert_eq!(config["proxy"]["mu"].as_f64(), Some(0.75));
    }

    #[test]
    fn test_load_from_toml() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().with_extension("toml");

        let toml_content = r#"
device = "cpu"

[gflownet.optimizer]
lr = 0.001
n_train_steps = 5000
"#;
        fs::write(&path, toml_content).unwrap();

        let config = load_from_toml(&path).unwrap();
        assert_eq!(config["device"].as_str(), Some("cpu"));
        assert_eq!(config["gflownet"]["optimizer"]["lr"].as_f64(), Some(0.001));
        assert_eq!(
            config["gflownet"]["optimizer"]["n_train_steps"].as_i64(),
            Some(5000)
        );
    }

    #[test]
    fn test_empty_yaml_is_empty_mapping() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().with_extension("yaml");
        fs::write(&path, "# only a comment\n").unwrap();

        let config = load_from_yaml(&path).unwrap();
        assert_eq!(config, Value::Mapping(Mapping::new()));
    }

    #[test]
    fn test_load_from_file_unsupported() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().with_extension("json");
        fs::write(&path, "{}").unwrap();

        let result = load_from_file(&path);
        assert!(matches!(result, Err(ConfigFileError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_load_from_file_no_extension() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().with_extension("");
        fs::write(&path, "").unwrap();

        let result = load_from_file(&path);
        assert!(matches!(result, Err(ConfigFileError::NoExtension)));
    }

    #[test]
    fn test_load_from_yaml_invalid() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().with_extension("yaml");
        fs::write(&path, "invalid: [unmatched\n").unwrap();

        let result = load_from_yaml(&path);
        assert!(matches!(result, Err(ConfigFileError::YamlParse(_))));
    }

    #[test]
    fn test_load_from_toml_not_found() {
        let path = Path::new("/nonexistent/path/config.toml");
        let result = load_from_toml(path);
        assert!(matches!(result, Err(ConfigFileError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_file_splits_defaults_and_package() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().with_extension("yaml");
        let content = r#"# @package _global_
# Lattice parameters experiment
defaults:
  - override /env: crystals/lattice_parameters
  - override /proxy: box/corners

env:
  lattice_system: cubic
"#;
        fs::write(&path, content).unwrap();

        let loaded = load_config_file(&path).unwrap();
        assert_eq!(loaded.package, Some(PackageHeader::Global));
        assert_eq!(loaded.defaults.as_ref().map(Vec::len), Some(2));
        assert!(loaded.body.get("defaults").is_none());
        assert_eq!(loaded.body["env"]["lattice_system"].as_str(), Some("cubic"));
    }

    #[test]
    fn test_package_header_after_content_is_ignored() {
        let contents = "env:\n  id: cube\n# @package _global_\n";
        assert_eq!(parse_package_header(contents), None);
    }

    #[test]
    fn test_package_header_variants() {
        assert_eq!(
            parse_package_header("# @package _group_\n"),
            Some(PackageHeader::Group)
        );
        assert_eq!(
            parse_package_header("#@package _global_.logger\n"),
            Some(PackageHeader::Path("logger".to_string()))
        );
    }

    #[test]
    fn test_load_failed_keeps_path_and_reason() {
        let path = Path::new("/nonexistent/conf/main.yaml");
        let err = load_config_file(path).unwrap_err();
        match load_failed(path, &err) {
            ComposeError::LoadFailed { path, reason } => {
                assert_eq!(path, "/nonexistent/conf/main.yaml");
                assert!(reason.contains("File not found"));
            }
            other => panic!("unexpected error: {other:?}")
        }
    }

    #[test]
    fn test_defaults_must_be_a_list() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().with_extension("yaml");
        fs::write(&path, "defaults: oops\n").unwrap();

        let result = load_config_file(&path);
        assert!(matches!(result, Err(ConfigFileError::YamlParse(_))));
    }
}
