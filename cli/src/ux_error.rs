use colored::Colorize;
use config::Composer;
use errors::ComposeError;

#[derive(Debug)]
pub struct UxError {
    pub what: String,
    pub why: Option<String>,
    pub how_to_fix: Vec<String>,
    pub suggested_command: Option<String>
}

impl UxError {
    pub fn new(what: impl Into<String>) -> Self {
        Self {
            what: what.into(),
            why: None,
            how_to_fix: Vec::new(),
            suggested_command: None
        }
    }

    pub fn why(mut self, reason: impl Into<String>) -> Self {
        self.why = Some(reason.into());
        self
    }

    pub fn fix(mut self, suggestion: impl Into<String>) -> Self {
        self.how_to_fix.push(suggestion.into());
        self
    }

    pub fn suggest(mut self, cmd: impl Into<String>) -> Self {
        self.suggested_command = Some(cmd.into());
        self
    }

    pub fn display(&self) {
        eprintln!();
        eprintln!("{} {}", "error:".red().bold(), self.what.white().bold());

        if let Some(why) = &self.why {
            eprintln!("       {}", why.dimmed());
        }

        if !self.how_to_fix.is_empty() {
            eprintln!();
            eprintln!("{}", "How to fix:".yellow().bold());
            for (i, fix) in self.how_to_fix.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, fix);
            }
        }

        if let Some(cmd) = &self.suggested_command {
            eprintln!();
            eprintln!("{}", "Try this:".green().bold());
            eprintln!("  $ {}", cmd.cyan());
        }
        eprintln!();
    }
}

impl std::fmt::Display for UxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.what)
    }
}

impl std::error::Error for UxError {}

pub fn primary_not_found(name: &str, search_path: &str) -> UxError {
    UxError::new(format!("Config '{}' not found", name))
        .why(format!("Searched {}", search_path))
        .fix("Point --config-dir (or GFN_CONFIG_DIR) at the directory holding main.yaml")
        .fix("Or pick another primary config with --config-name")
        .suggest("gflownet compose --config-dir conf --config-name main")
}

pub fn unknown_option(group: &str, option: &str, options: &[String]) -> UxError {
    let err = UxError::new(format!("Unknown option '{}' for group '{}'", option, group));
    let err = if options.is_empty() {
        err.why(format!("Group '{}' has no options", group))
    } else {
        err.why(format!("Available options: {}", options.join(", ")))
    };
    match options.first() {
        Some(first) => err
            .fix("Use one of the available options")
            .suggest(format!("gflownet compose {}={}", group, first)),
        None => err.fix(format!("Add a config file under '{}/'", group))
    }
}

pub fn override_no_match(group: &str) -> UxError {
    UxError::new(format!("Could not override '{}'", group))
        .why("The group is not in the defaults list")
        .fix(format!("Append it instead with '+{}=<option>'", group))
        .fix("Or declare the group in the defaults list of the primary config")
}

pub fn key_not_found(key: &str) -> UxError {
    UxError::new(format!("Key '{}' is not in the config", key))
        .why("Plain overrides only change existing keys")
        .fix(format!("Add the key with '+{}=<value>'", key))
        .suggest(format!("gflownet compose +{}=<value>", key))
}

pub fn key_already_exists(key: &str) -> UxError {
    UxError::new(format!("Key '{}' already exists", key))
        .why("'+' only adds keys that are not in the config")
        .fix(format!("Change it with '{}=<value>'", key))
        .fix(format!("Or force it with '++{}=<value>'", key))
}

pub fn missing_env_var(name: &str) -> UxError {
    UxError::new(format!("Environment variable '{}' is not set", name))
        .why("An interpolation reads it without a default")
        .fix(format!("Export {} before running", name))
        .fix(format!("Or give a default: ${{oc.env:{},<default>}}", name))
}

pub fn invalid_run_config(reason: &str) -> UxError {
    UxError::new("Invalid run configuration")
        .why(reason.to_string())
        .fix("Fix the offending values in the config files or with overrides")
        .suggest("gflownet compose --unresolved")
}

/// Friendly rendering of a composition error, using the composer to list
/// the options of a group when an option does not exist.
pub fn from_compose_error(err: &ComposeError, composer: &Composer) -> UxError {
    match err {
        ComposeError::ConfigNotFound { name, search_path } => match split_option(name, composer) {
            Some((group, option)) => unknown_option(group, option, &composer.options(group)),
            None => primary_not_found(name, search_path)
        },
        ComposeError::OverrideNoMatch { group } => override_no_match(group),
        ComposeError::KeyNotFound { key } => key_not_found(key),
        ComposeError::KeyAlreadyExists { key } => key_already_exists(key),
        ComposeError::MissingEnvVar { name } => missing_env_var(name),
        ComposeError::InvalidRunConfig { reason } => invalid_run_config(reason),
        ComposeError::InvalidOverride { text, reason } => {
            UxError::new(format!("Invalid override '{}'", text))
                .why(reason.clone())
                .fix("Overrides look like key=value, +key=value, ++key=value or ~key")
        }
        other => UxError::new(other.to_string())
    }
}

/// Split `group/option` at the longest prefix that is a config group.
fn split_option<'a>(name: &'a str, composer: &Composer) -> Option<(&'a str, &'a str)> {
    name.match_indices('/')
        .map(|(i, _)| (&name[..i], &name[i + 1..]))
        .filter(|(group, _)| composer.is_group(group))
        .last()
}
