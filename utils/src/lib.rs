//! # GFlowNet Utilities
//!
//! Small helpers shared by the composer, the run-directory code and the
//! environments: path resolution, checkpoint discovery, index batching,
//! precision and device parsing, bootstrap resampling.

use errors::UtilError;
use rand::Rng;
use regex::{Captures, Regex};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .expect("env var pattern is a valid regex")
});

/// Expand `$VAR` and `${VAR}` references. Unknown variables are left as is.
#[must_use]
pub fn expand_env_vars(input: &str) -> String {
    ENV_VAR_PATTERN
        .replace_all(input, |caps: &Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            std::env::var(name).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

fn expand_home(input: &str) -> PathBuf {
    if input == "~" || input.starts_with("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(input.trim_start_matches('~').trim_start_matches('/'));
        }
    }
    PathBuf::from(input)
}

/// Resolve a path by expanding environment variables and the user home
/// directory, then making it absolute.
///
/// # Examples
///
/// ```
/// let resolved = utils::resolve_path("/tmp/$NOT_A_REAL_VAR_FOR_DOCS/data");
/// assert!(resolved.is_absolute());
/// ```
#[must_use]
pub fn resolve_path(path: &str) -> PathBuf {
    let expanded = expand_home(&expand_env_vars(path));
    std::path::absolute(&expanded).unwrap_or(expanded)
}

/// Find the latest checkpoint in `ckpt_dir`.
///
/// A file whose name contains `final` wins. Otherwise the file whose stem ends
/// in `iter_<n>` with the highest `n` is returned.
pub fn find_latest_checkpoint(ckpt_dir: &Path) -> Result<PathBuf, UtilError> {
    let entries = std::fs::read_dir(ckpt_dir).map_err(|e| UtilError::Io {
        path: ckpt_dir.display().to_string(),
        reason: e.to_string()
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .collect();
    files.sort();

    if let Some(final_ckpt) = files
        .iter()
        .find(|p| file_name(p).is_some_and(|name| name.contains("final")))
    {
        return Ok(final_ckpt.clone());
    }

    files
        .into_iter()
        .filter_map(|p| iteration_of(&p).map(|iter| (iter, p)))
        .max_by_key(|(iter, _)| *iter)
        .map(|(_, p)| p)
        .ok_or_else(|| UtilError::NoCheckpoint {
            dir: ckpt_dir.display().to_string()
        })
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|s| s.to_str())
}

/// Iteration of a checkpoint whose stem ends in `iter_<n>`, either alone or
/// after a `_` separated prefix (`policy_iter_100`).
fn iteration_of(path: &Path) -> Option<u64> {
    let stem = path.file_stem()?.to_str()?;
    let (head, iteration) = stem.rsplit_once('_')?;
    if head != "iter" && !head.ends_with("_iter") {
        return None;
    }
    iteration.parse::<u64>().ok()
}

/// Split `start..stop` into consecutive ranges of length `step`; the last one
/// may be shorter.
#[must_use]
pub fn batch_with_rest(start: usize, stop: usize, step: usize) -> Vec<Range<usize>> {
    if step == 0 {
        return Vec::new();
    }
    (start..stop)
        .step_by(step)
        .map(|i| i..(i + step).min(stop))
        .collect()
}

/// Floating point precision of tensors handed to the trainer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatPrecision {
    F16,
    F32,
    F64
}

impl FloatPrecision {
    pub fn bits(self) -> u32 {
        match self {
            Self::F16 => 16,
            Self::F32 => 32,
            Self::F64 => 64
        }
    }
}

impl TryFrom<u32> for FloatPrecision {
    type Error = UtilError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            16 => Ok(Self::F16),
            32 => Ok(Self::F32),
            64 => Ok(Self::F64),
            _ => Err(UtilError::InvalidPrecision {
                value,
                allowed: "16, 32, 64".to_string()
            })
        }
    }
}

/// Integer precision of index tensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntPrecision {
    I8,
    I16,
    I32,
    I64
}

impl TryFrom<u32> for IntPrecision {
    type Error = UtilError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            8 => Ok(Self::I8),
            16 => Ok(Self::I16),
            32 => Ok(Self::I32),
            64 => Ok(Self::I64),
            _ => Err(UtilError::InvalidPrecision {
                value,
                allowed: "8, 16, 32, 64".to_string()
            })
        }
    }
}

/// Compute device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Cuda
}

impl Device {
    /// `cuda` is only honoured when a GPU is available; everything else falls
    /// back to the CPU.
    #[must_use]
    pub fn resolve(name: &str, cuda_available: bool) -> Self {
        if name.eq_ignore_ascii_case("cuda") && cuda_available {
            Self::Cuda
        } else {
            Self::Cpu
        }
    }
}

/// Draw `num_samples` bootstrap resamples (with replacement) of `values`.
pub fn bootstrap_samples<T: Clone, R: Rng>(
    values: &[T],
    num_samples: usize,
    rng: &mut R
) -> Vec<Vec<T>> {
    if values.is_empty() {
        return vec![Vec::new(); num_samples];
    }
    (0..num_samples)
        .map(|_| {
            (0..values.len())
                .map(|_| values[rng.gen_range(0..values.len())].clone())
                .collect()
        })
        .collect()
}
