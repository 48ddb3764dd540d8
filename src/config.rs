//! Classifier configuration.
//!
//! The built-in code tables cover what servers document. Deployments that
//! run proxies or patched servers can name additional codes and message
//! fragments here, in a TOML file and/or `OPFAIL__` environment variables.

use config::{Config, Environment, File, FileFormat};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use std::path::Path;

use crate::error::{FailureError, FailureResult};

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "OPFAIL";

/// Deployment-specific additions to the built-in classification tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Codes that make a write (and read) retryable.
    #[serde(deserialize_with = "code_list")]
    pub extra_write_retryable_codes: Vec<i32>,
    /// Codes that let a change stream resume on legacy servers.
    #[serde(deserialize_with = "code_list")]
    pub extra_resumable_codes: Vec<i32>,
    /// Message fragments that make a read retryable.
    #[serde(deserialize_with = "message_list")]
    pub extra_read_retry_messages: Vec<String>,
}

/// A list entry as it arrives from TOML (typed) or the environment (text).
#[derive(Deserialize)]
#[serde(untagged)]
enum ListItem {
    Int(i64),
    Text(String),
}

/// TOML arrays arrive as `Many`; environment values as a single
/// comma-separated `One`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawList {
    Many(Vec<ListItem>),
    One(ListItem),
}

impl RawList {
    fn into_items(self) -> Vec<ListItem> {
        match self {
            RawList::Many(items) => items,
            RawList::One(ListItem::Text(text)) => text
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| ListItem::Text(part.to_string()))
                .collect(),
            RawList::One(item) => vec![item],
        }
    }
}

fn code_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<i32>, D::Error> {
    RawList::deserialize(deserializer)?
        .into_items()
        .into_iter()
        .map(|item| match item {
            ListItem::Int(code) => i32::try_from(code).map_err(D::Error::custom),
            ListItem::Text(text) => text
                .trim()
                .parse::<i32>()
                .map_err(|e| D::Error::custom(format!("invalid error code {:?}: {}", text, e))),
        })
        .collect()
}

fn message_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(RawList::deserialize(deserializer)?
        .into_items()
        .into_iter()
        .map(|item| match item {
            ListItem::Int(number) => number.to_string(),
            ListItem::Text(text) => text,
        })
        .collect())
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
}

impl ClassifierConfig {
    /// Load configuration from a TOML file, with environment overrides.
    ///
    /// The file is parsed as TOML whatever its extension.
    ///
    /// Environment variables take the form `OPFAIL__<KEY>`, lists separated
    /// by commas (e.g. `OPFAIL__EXTRA_WRITE_RETRYABLE_CODES=7777,8888`).
    /// Environment values replace the file's value for that key.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist, the path is not valid
    /// UTF-8, or the contents cannot be parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> FailureResult<Self> {
        let path = path.as_ref();

        let path_str = path
            .to_str()
            .ok_or_else(|| FailureError::ConfigNotFound(format!("{:?}", path)))?;

        if !path.exists() {
            return Err(FailureError::ConfigNotFound(path_str.to_string()));
        }

        let config = Config::builder()
            .add_source(File::new(path_str, FileFormat::Toml))
            .add_source(environment())
            .build()?;

        let loaded: ClassifierConfig = config.try_deserialize()?;
        tracing::info!(path = path_str, ?loaded, "loaded classifier configuration");
        Ok(loaded)
    }

    /// Load configuration from environment variables only.
    pub fn from_env() -> FailureResult<Self> {
        let config = Config::builder().add_source(environment()).build()?;
        Ok(config.try_deserialize()?)
    }

    /// Returns true if nothing is added to the built-in tables.
    pub fn is_empty(&self) -> bool {
        self.extra_write_retryable_codes.is_empty()
            && self.extra_resumable_codes.is_empty()
            && self.extra_read_retry_messages.is_empty()
    }
}
