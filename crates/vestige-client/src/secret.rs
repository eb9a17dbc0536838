//! Credential values that live outside `config.toml`.
//!
//! `client_id` and `client_secret` may be written as a reference:
//!
//! - `file::~/path` reads the file and trims surrounding whitespace
//! - `env::VAR_NAME` reads `$VAR_NAME`
//! - `pass::path/in/store` uses the first line of `pass show path/in/store`
//!
//! Anything else is taken literally.

use std::path::PathBuf;

use thiserror::Error;

/// Why a reference could not be turned into a value.
#[derive(Debug, Error)]
pub enum SecretError {
    #[error("cannot read {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("environment variable `{0}` is not set")]
    Env(String),

    #[error("`pass show {path}` failed: {reason}")]
    Pass { path: String, reason: String },

    #[error("{0} is empty")]
    Empty(String),
}

/// A parsed credential value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretRef<'a> {
    File(PathBuf),
    Env(&'a str),
    Pass(&'a str),
    Literal(&'a str),
}

impl<'a> SecretRef<'a> {
    pub fn parse(value: &'a str) -> Self {
        if let Some(path) = value.strip_prefix("file::") {
            Self::File(expand_home(path))
        } else if let Some(var) = value.strip_prefix("env::") {
            Self::Env(var)
        } else if let Some(path) = value.strip_prefix("pass::") {
            Self::Pass(path)
        } else {
            Self::Literal(value)
        }
    }

    /// Fetches the value. References never resolve to an empty string.
    pub fn resolve(&self) -> Result<String, SecretError> {
        let (value, origin) = match self {
            Self::Literal(value) => return Ok(value.to_string()),
            Self::File(path) => {
                let contents = std::fs::read_to_string(path).map_err(|source| SecretError::File {
                    path: path.clone(),
                    source,
                })?;
                (contents.trim().to_string(), path.display().to_string())
            }
            Self::Env(var) => {
                let value = std::env::var(var).map_err(|_| SecretError::Env(var.to_string()))?;
                (value, format!("${}", var))
            }
            Self::Pass(path) => (pass_show(path)?, format!("pass entry {}", path)),
        };

        if value.is_empty() {
            return Err(SecretError::Empty(origin));
        }
        Ok(value)
    }
}

/// Resolves a value that may be a secret reference.
pub fn resolve(value: &str) -> Result<String, SecretError> {
    SecretRef::parse(value).resolve()
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

fn pass_show(path: &str) -> Result<String, SecretError> {
    let failed = |reason: String| SecretError::Pass {
        path: path.to_string(),
        reason,
    };

    let output = std::process::Command::new("pass")
        .arg("show")
        .arg(path)
        .output()
        .map_err(|e| failed(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(failed(format!("{}: {}", output.status, stderr.trim())));
    }

    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .unwrap_or_default()
        .to_string())
}
