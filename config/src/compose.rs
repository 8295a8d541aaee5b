//! # Composition
//!
//! Builds a run configuration from a config directory.
//!
//! Resolution runs in two phases:
//!
//! 1. **Selection.** The defaults tree of the primary config is walked. Every
//!    group entry picks an option: a command-line group override wins, then an
//!    `override` directive found anywhere in the tree, then the declared
//!    option. Directives can only be discovered by loading the files that carry
//!    them, so the walk is repeated until the set of directives stops changing.
//! 2. **Override.** File bodies are merged in defaults order, each under its
//!    package, then the command-line value overrides are applied and
//!    interpolations resolved.

use crate::defaults::{DefaultsEntry, absolute_group, parse_defaults, resolve_package};
use crate::file_loader::{ConfigFile, PackageHeader, load_config_file, load_failed};
use crate::interpolation;
use crate::overrides::{Override, OverrideKind, apply_override, parse_overrides};
use crate::precedence::merge_layers;
use crate::tree::{set_path, wrap_in_package};
use errors::ComposeError;
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const MAX_SELECTION_PASSES: usize = 16;
const MAX_DEFAULTS_DEPTH: usize = 32;
const EXTENSIONS: [&str; 3] = ["yaml", "yml", "toml"];

/// Option selected for each config group (`None` when the group is a
/// placeholder or was deleted).
pub type Choices = BTreeMap<String, Option<String>>;

/// Result of a composition.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedConfig {
    pub config: Value,
    pub choices: Choices,
    pub overrides: Vec<String>
}

/// Composes configurations from an ordered search path. The first directory
/// that contains a config wins.
#[derive(Debug, Clone)]
pub struct Composer {
    search_path: Vec<PathBuf>
}

#[derive(Debug, Default)]
struct GroupOverrides {
    choices: Choices,
    appended: Vec<(String, Option<String>)>
}

#[derive(Debug, Default)]
struct Walk {
    layers: Vec<(String, Value)>,
    choices: Choices,
    directives: Vec<(String, Option<String>)>,
    groups_seen: BTreeSet<String>
}

impl Composer {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            search_path: vec![config_dir.into()]
        }
    }

    pub fn with_search_path(search_path: Vec<PathBuf>) -> Self {
        Self { search_path }
    }

    pub fn search_path(&self) -> &[PathBuf] {
        &self.search_path
    }

    /// Compose and resolve interpolations.
    ///
    /// ## Usage
    /// ```rust,no_run
    /// use config::Composer;
    ///
    /// let composer = Composer::new("conf");
    /// let composed = composer
    ///     .compose("main", &["env=crystals/lattice_parameters", "gflownet.optimizer.lr=0.001"])
    ///     .unwrap();
    /// println!("{}", serde_yaml::to_string(&composed.config).unwrap());
    /// ```
    pub fn compose<S: AsRef<str>>(
        &self,
        config_name: &str,
        overrides: &[S]
    ) -> Result<ComposedConfig, ComposeError> {
        let composed = self.compose_unresolved(config_name, overrides)?;
        let config = interpolation::resolve(&composed.config)?;
        Ok(ComposedConfig { config, ..composed })
    }

    /// Compose without resolving interpolations.
    pub fn compose_unresolved<S: AsRef<str>>(
        &self,
        config_name: &str,
        overrides: &[S]
    ) -> Result<ComposedConfig, ComposeError> {
        let parsed = parse_overrides(overrides)?;
        let (group_overrides, value_overrides) = self.split_overrides(parsed);

        let primary_path = self.find(config_name).ok_or_else(|| self.not_found(config_name))?;
        let primary = load_config_file(&primary_path).map_err(|e| load_failed(&primary_path, &e))?;

        let walk = self.select(&primary, &group_overrides)?;
        info!(
            "Composed '{}' with choices {:?}",
            config_name,
            walk.choices
        );

        let mut config = merge_layers(walk.layers);
        for ov in &value_overrides {
            apply_override(&mut config, ov)?;
        }

        let override_texts: Vec<String> = overrides
            .iter()
            .map(|o| o.as_ref().trim().to_string())
            .collect();
        record_runtime(&mut config, config_name, &walk.choices, &override_texts)?;

        Ok(ComposedConfig {
            config,
            choices: walk.choices,
            overrides: override_texts
        })
    }

    fn split_overrides(&self, parsed: Vec<Override>) -> (GroupOverrides, Vec<Override>) {
        let mut groups = GroupOverrides::default();
        let mut values = Vec::new();

        for ov in parsed {
            let group = ov.key.replace('.', "/");
            let selects_option = match &ov.value {
                None | Some(Value::Null) | Some(Value::String(_)) => true,
                Some(_) => false
            };
            if !selects_option || !self.is_group(&group) {
                values.push(ov);
                continue;
            }

            let option = match (&ov.kind, &ov.value) {
                (OverrideKind::Delete, _) | (_, None | Some(Value::Null)) => None,
                _ => ov.raw_value.clone()
            };
            match ov.kind {
                OverrideKind::Add => groups.appended.push((group, option)),
                OverrideKind::ForceAdd => {
                    groups.appended.push((group.clone(), option.clone()));
                    groups.choices.insert(group, option);
                }
                OverrideKind::Change | OverrideKind::Delete => {
                    groups.choices.insert(group, option);
                }
            }
        }

        (groups, values)
    }

    fn select(&self, primary: &ConfigFile, cli: &GroupOverrides) -> Result<Walk, ComposeError> {
        let mut directives: Choices = BTreeMap::new();

        for pass in 0..MAX_SELECTION_PASSES {
            let mut walk = Walk::default();
            self.expand(primary, "", "", cli, &directives, &mut walk, 0)?;

            let mut next: Choices = BTreeMap::new();
            for (group, option) in &walk.directives {
                if !walk.groups_seen.contains(group) {
                    return Err(ComposeError::OverrideNoMatch {
                        group: group.clone()
                    });
                }
                next.insert(group.clone(), option.clone());
            }
            for (group, _) in cli.choices.iter().filter(|(g, _)| !walk.groups_seen.contains(*g)) {
                if !cli.appended.iter().any(|(g, _)| g == group) {
                    return Err(ComposeError::OverrideNoMatch {
                        group: group.clone()
                    });
                }
            }

            if next == directives {
                debug!("Defaults selection settled after {} pass(es)", pass + 1);
                return Ok(walk);
            }
            directives = next;
        }

        Err(ComposeError::OverrideCycle {
            passes: MAX_SELECTION_PASSES
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn expand(
        &self,
        file: &ConfigFile,
        group_dir: &str,
        package: &str,
        cli: &GroupOverrides,
        directives: &Choices,
        walk: &mut Walk,
        depth: usize
    ) -> Result<(), ComposeError> {
        let source = file.path.display().to_string();
        if depth > MAX_DEFAULTS_DEPTH {
            return Err(ComposeError::InvalidDefaultsEntry {
                config: source,
                reason: "defaults nesting is too deep (recursive include?)".to_string()
            });
        }

        let mut entries = parse_defaults(file.defaults.as_deref().unwrap_or_default(), &source)?;
        if !entries.contains(&DefaultsEntry::SelfRef) {
            entries.push(DefaultsEntry::SelfRef);
        }
        let appended_from = if depth == 0 { entries.len() } else { usize::MAX };
        if depth == 0 {
            entries.extend(cli.appended.iter().map(|(group, option)| DefaultsEntry::Group {
                group: format!("/{group}"),
                option: option.clone(),
                package: None,
                optional: false
            }));
        }

        for (index, entry) in entries.into_iter().enumerate() {
            match entry {
                DefaultsEntry::SelfRef => {
                    debug!("Merging {} at package '{}'", source, package);
                    walk.layers
                        .push((source.clone(), wrap_in_package(file.body.clone(), package)));
                }
                DefaultsEntry::Config {
                    path,
                    package: entry_package,
                    optional
                } => {
                    let name = absolute_group(group_dir, &path);
                    let Some(found) = self.find(&name) else {
                        if optional {
                            continue;
                        }
                        return Err(self.not_found(&name));
                    };
                    let child = self.load(&found)?;
                    let child_package = child_package(
                        package,
                        entry_package.as_deref(),
                        child.package.as_ref(),
                        package
                    );
                    self.expand(
                        &child,
                        parent_dir(&name),
                        &child_package,
                        cli,
                        directives,
                        walk,
                        depth + 1
                    )?;
                }
                DefaultsEntry::Group {
                    group,
                    option,
                    package: entry_package,
                    optional
                } => {
                    let abs_group = absolute_group(group_dir, &group);
                    if index >= appended_from && walk.groups_seen.contains(&abs_group) {
                        // `++group=option` already took effect as a choice.
                        if cli.choices.contains_key(&abs_group) {
                            continue;
                        }
                        return Err(ComposeError::InvalidOverride {
                            text: format!("+{abs_group}={}", option.as_deref().unwrap_or("null")),
                            reason: format!(
                                "'{abs_group}' is already in the defaults list, use '{abs_group}=...' to change it"
                            )
                        });
                    }
                    walk.groups_seen.insert(abs_group.clone());

                    let choice = cli
                        .choices
                        .get(&abs_group)
                        .or_else(|| directives.get(&abs_group))
                        .cloned()
                        .unwrap_or(option);
                    walk.choices.insert(abs_group.clone(), choice.clone());

                    let Some(choice) = choice else {
                        continue;
                    };
                    let name = format!("{abs_group}/{choice}");
                    let Some(found) = self.find(&name) else {
                        if optional {
                            walk.choices.insert(abs_group, None);
                            continue;
                        }
                        return Err(self.not_found(&name));
                    };
                    let child = self.load(&found)?;
                    let group_package = abs_group.replace('/', ".");
                    let child_package = child_package(
                        package,
                        entry_package.as_deref(),
                        child.package.as_ref(),
                        &group_package
                    );
                    self.expand(
                        &child,
                        parent_dir(&name),
                        &child_package,
                        cli,
                        directives,
                        walk,
                        depth + 1
                    )?;
                }
                DefaultsEntry::Override { group, .. } if depth == 0 => {
                    return Err(ComposeError::InvalidDefaultsEntry {
                        config: source,
                        reason: format!(
                            "'override {group}' is only allowed in non-primary configs"
                        )
                    });
                }
                DefaultsEntry::Override { group, option } => {
                    walk.directives
                        .push((absolute_group(group_dir, &group), option));
                }
            }
        }

        Ok(())
    }

    /// Whether `group` (slash separated) is a config group directory.
    pub fn is_group(&self, group: &str) -> bool {
        self.search_path.iter().any(|dir| dir.join(group).is_dir())
    }

    /// Locate a config by name (without extension) on the search path.
    pub fn find(&self, name: &str) -> Option<PathBuf> {
        let name = name.trim_start_matches('/');
        self.search_path.iter().find_map(|dir| {
            let direct = dir.join(name);
            if direct.is_file() {
                return Some(direct);
            }
            EXTENSIONS
                .iter()
                .map(|ext| dir.join(format!("{name}.{ext}")))
                .find(|candidate| candidate.is_file())
        })
    }

    /// Available options of a config group, sorted.
    pub fn options(&self, group: &str) -> Vec<String> {
        let mut options = BTreeSet::new();
        for dir in &self.search_path {
            let group_dir = dir.join(group);
            collect_options(&group_dir, &group_dir, &mut options);
        }
        options.into_iter().collect()
    }

    fn load(&self, path: &Path) -> Result<ConfigFile, ComposeError> {
        debug!("Loading config {:?}", path);
        load_config_file(path).map_err(|e| load_failed(path, &e))
    }

    fn not_found(&self, name: &str) -> ComposeError {
        ComposeError::ConfigNotFound {
            name: name.to_string(),
            search_path: format!("{:?}", self.search_path)
        }
    }
}

fn collect_options(root: &Path, dir: &Path, out: &mut BTreeSet<String>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();
        if path.is_dir() {
            collect_options(root, &path, out);
            continue;
        }
        let is_config = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| EXTENSIONS.contains(&e));
        if !is_config {
            continue;
        }
        if let Ok(relative) = path.with_extension("").strip_prefix(root) {
            out.insert(relative.to_string_lossy().replace('\\', "/"));
        }
    }
}

fn parent_dir(name: &str) -> &str {
    name.trim_start_matches('/')
        .rsplit_once('/')
        .map_or("", |(dir, _)| dir)
}

/// Package precedence: defaults entry, then file header, then the default.
fn child_package(
    parent_package: &str,
    entry_package: Option<&str>,
    header: Option<&PackageHeader>,
    default_package: &str
) -> String {
    if let Some(pkg) = entry_package {
        return resolve_package(parent_package, default_package, pkg);
    }
    match header {
        Some(PackageHeader::Global) => String::new(),
        Some(PackageHeader::Group) => default_package.to_string(),
        Some(PackageHeader::Path(path)) => path.clone(),
        None => default_package.to_string()
    }
}

fn record_runtime(
    config: &mut Value,
    config_name: &str,
    choices: &Choices,
    overrides: &[String]
) -> Result<(), ComposeError> {
    let mut choice_map = Mapping::new();
    for (group, option) in choices {
        choice_map.insert(
            Value::String(group.clone()),
            option.clone().map_or(Value::Null, Value::String)
        );
    }
    set_path(config, "hydra.runtime.choices", Value::Mapping(choice_map))?;
    set_path(
        config,
        "hydra.overrides.task",
        Value::Sequence(overrides.iter().cloned().map(Value::String).collect())
    )?;
    set_path(
        config,
        "hydra.job.config_name",
        Value::String(config_name.to_string())
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::get_path;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) {
        let path = dir.path().join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn fixture() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir,
            "main.yaml",
            r#"
defaults:
  - _self_
  - env: cube
  - gflownet: trajectorybalance
  - proxy: corners
  - experiment: null

device: cpu
seed: 0
"#
        );
        write(&dir, "env/cube.yaml", "_target_: ContinuousCube\nid: cube\nn_dim: 2\n");
        write(
            &dir,
            "env/crystals/lattice_parameters.yaml",
            "_target_: LatticeParameters\nid: lattice_parameters\nlattice_system: triclinic\n"
        );
        write(
            &dir,
            "gflownet/gflownet.yaml",
            r#"
optimizer:
  loss: flowmatch
  lr: 0.0001
  z_dim: 16
  batch_size:
    forward: 10
    backward_replay: 0
"#
        );
        write(
            &dir,
            "gflownet/trajectorybalance.yaml",
            r#"
defaults:
  - gflownet
  - state_flow: null

optimizer:
  loss: trajectorybalance
  lr_z_mult: 100
"#
        );
        write(&dir, "gflownet/state_flow/mlp.yaml", "n_hid: 128\n");
        write(&dir, "proxy/corners.yaml", "_target_: Corners\nmu: 0.75\nsigma: 0.05\n");
        write(&dir, "proxy/box/corners.yaml", "_target_: Corners\nmu: 0.5\nsigma: 0.1\n");
        write(
            &dir,
            "experiment/lattice.yaml",
            r#"# @package _global_
defaults:
  - override /env: crystals/lattice_parameters
  - override /proxy: box/corners

env:
  lattice_system: cubic
gflownet:
  optimizer:
    batch_size:
      forward: 100
"#
        );
        dir
    }

    fn get<'a>(config: &'a Value, path: &str) -> &'a Value {
        get_path(config, path).unwrap_or_else(|| panic!("missing {path}"))
    }

    #[test]
    fn test_compose_base() {
        let dir = fixture();
        let composed = Composer::new(dir.path()).compose::<&str>("main", &[]).unwrap();
        let c = &composed.config;

        assert_eq!(get(c, "env.id").as_str(), Some("cube"));
        assert_eq!(get(c, "gflownet.optimizer.loss").as_str(), Some("trajectorybalance"));
        assert_eq!(get(c, "gflownet.optimizer.z_dim").as_u64(), Some(16));
        assert_eq!(get(c, "gflownet.optimizer.lr_z_mult").as_u64(), Some(100));
        assert_eq!(get(c, "proxy.mu").as_f64(), Some(0.75));
        assert_eq!(get(c, "device").as_str(), Some("cpu"));
        assert_eq!(composed.choices.get("env"), Some(&Some("cube".to_string())));
        assert_eq!(composed.choices.get("experiment"), Some(&None));
        assert_eq!(composed.choices.get("gflownet/state_flow"), Some(&None));
        assert!(get_path(c, "gflownet.state_flow").is_none());
    }

    #[test]
    fn test_experiment_overrides_groups_and_values() {
        let dir = fixture();
        let composed = Composer::new(dir.path())
            .compose("main", &["experiment=lattice"])
            .unwrap();
        let c = &composed.config;

        assert_eq!(get(c, "env.id").as_str(), Some("lattice_parameters"));
        assert_eq!(get(c, "env.lattice_system").as_str(), Some("cubic"));
        assert_eq!(get(c, "proxy.mu").as_f64(), Some(0.5));
        assert_eq!(get(c, "gflownet.optimizer.batch_size.forward").as_u64(), Some(100));
        assert_eq!(
            get(c, "gflownet.optimizer.batch_size.backward_replay").as_u64(),
            Some(0)
        );
        assert_eq!(
            composed.choices.get("env"),
            Some(&Some("crystals/lattice_parameters".to_string()))
        );
        assert!(get_path(c, "env.n_dim").is_none());
    }

    #[test]
    fn test_command_line_group_beats_directive() {
        let dir = fixture();
        let composed = Composer::new(dir.path())
            .compose("main", &["experiment=lattice", "proxy=corners"])
            .unwrap();
        assert_eq!(get(&composed.config, "proxy.mu").as_f64(), Some(0.75));
    }

    #[test]
    fn test_value_overrides_applied_last() {
        let dir = fixture();
        let composed = Composer::new(dir.path())
            .compose(
                "main",
                &[
                    "experiment=lattice",
                    "gflownet.optimizer.batch_size.forward=7",
                    "+logger.project_name=lattice",
                ]
            )
            .unwrap();
        let c = &composed.config;
        assert_eq!(get(c, "gflownet.optimizer.batch_size.forward").as_u64(), Some(7));
        assert_eq!(get(c, "logger.project_name").as_str(), Some("lattice"));
        let task: Vec<&str> = get(c, "hydra.overrides.task")
            .as_sequence()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(
            task,
            vec![
                "experiment=lattice",
                "gflownet.optimizer.batch_size.forward=7",
                "+logger.project_name=lattice",
            ]
        );
    }

    #[test]
    fn test_nested_group_selected_from_command_line() {
        let dir = fixture();
        let composed = Composer::new(dir.path())
            .compose("main", &["gflownet/state_flow=mlp"])
            .unwrap();
        assert_eq!(get(&composed.config, "gflownet.state_flow.n_hid").as_u64(), Some(128));
    }

    #[test]
    fn test_unknown_option_errors() {
        let dir = fixture();
        let err = Composer::new(dir.path())
            .compose("main", &["env=does_not_exist"])
            .unwrap_err();
        assert!(matches!(err, ComposeError::ConfigNotFound { .. }));
    }

    #[test]
    fn test_unknown_key_errors() {
        let dir = fixture();
        let err = Composer::new(dir.path())
            .compose("main", &["gflownet.optimizer.not_a_key=1"])
            .unwrap_err();
        assert!(matches!(err, ComposeError::KeyNotFound { .. }));
    }

    #[test]
    fn test_override_without_match_errors() {
        let dir = fixture();
        write(
            &dir,
            "experiment/bad.yaml",
            "# @package _global_\ndefaults:\n  - override /logger: wandb\n"
        );
        write(&dir, "logger/wandb.yaml", "project_name: x\n");
        let err = Composer::new(dir.path())
            .compose("main", &["experiment=bad"])
            .unwrap_err();
        assert!(matches!(err, ComposeError::OverrideNoMatch { .. }));
    }

    #[test]
    fn test_appended_group() {
        let dir = fixture();
        write(&dir, "logger/local.yaml", "do:\n  online: false\nproject_name: gfn\n");
        let composed = Composer::new(dir.path())
            .compose("main", &["+logger=local"])
            .unwrap();
        assert_eq!(get(&composed.config, "logger.do.online"), &Value::Bool(false));
        assert_eq!(composed.choices.get("logger"), Some(&Some("local".to_string())));
    }

    #[test]
    fn test_appending_existing_group_errors() {
        let dir = fixture();
        let err = Composer::new(dir.path())
            .compose("main", &["+env=crystals/lattice_parameters"])
            .unwrap_err();
        assert!(matches!(err, ComposeError::InvalidOverride { .. }));
        assert!(err.to_string().contains("already in the defaults list"));
    }

    #[test]
    fn test_force_appending_existing_group_changes_choice() {
        let dir = fixture();
        let composed = Composer::new(dir.path())
            .compose("main", &["++env=crystals/lattice_parameters"])
            .unwrap();
        let c = &composed.config;
        assert_eq!(get(c, "env.id").as_str(), Some("lattice_parameters"));
        assert!(get_path(c, "env.n_dim").is_none());
    }

    #[test]
    fn test_override_in_primary_errors() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir, "main.yaml", "defaults:\n  - _self_\n  - env: a\n  - override env: b\n");
        write(&dir, "env/a.yaml", "n: 1\n");
        write(&dir, "env/b.yaml", "n: 2\n");
        let err = Composer::new(dir.path())
            .compose::<&str>("main", &[])
            .unwrap_err();
        assert!(matches!(err, ComposeError::InvalidDefaultsEntry { .. }));
    }

    #[test]
    fn test_self_position_controls_precedence() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir, "first.yaml", "defaults:\n  - _self_\n  - env: a\nenv:\n  n: 1\n");
        write(&dir, "last.yaml", "defaults:\n  - env: a\nenv:\n  n: 1\n");
        write(&dir, "env/a.yaml", "n: 2\n");

        let composer = Composer::new(dir.path());
        let first = composer.compose::<&str>("first", &[]).unwrap();
        let last = composer.compose::<&str>("last", &[]).unwrap();
        assert_eq!(get(&first.config, "env.n").as_u64(), Some(2));
        assert_eq!(get(&last.config, "env.n").as_u64(), Some(1));
    }

    #[test]
    fn test_compose_twice_is_deterministic() {
        let dir = fixture();
        let composer = Composer::new(dir.path());
        let overrides = ["experiment=lattice", "seed=3"];
        let a = composer.compose_unresolved("main", &overrides).unwrap();
        let b = composer.compose_unresolved("main", &overrides).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_options_lists_nested() {
        let dir = fixture();
        let options = Composer::new(dir.path()).options("env");
        assert_eq!(options, vec!["crystals/lattice_parameters", "cube"]);
    }
}
