//! Runtime configuration for Shelf clients.
//!
//! Values come from `SHELF_*` environment variables. Parsing goes through
//! [`ClientConfig::from_lookup`] so tests can feed a plain map.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::remote::parse_base_url;
use crate::replication::ReplicationConfig;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_RETRY_SECS: u64 = 8;
pub const DEFAULT_PUSH_BATCH_SIZE: usize = 50;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

const MAX_INTERVAL_SECS: u64 = 3600;
const MAX_PUSH_BATCH_SIZE: usize = 1000;

/// Client-side settings shared by both collections and the replicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_base_url: String,
    /// Local store path; `None` leaves the choice to the caller
    pub db_path: Option<PathBuf>,
    pub retry_time: Duration,
    pub poll_interval: Option<Duration>,
    pub push_batch_size: usize,
    pub http_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            db_path: None,
            retry_time: Duration::from_secs(DEFAULT_RETRY_SECS),
            poll_interval: None,
            push_batch_size: DEFAULT_PUSH_BATCH_SIZE,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_base_url = optional_trimmed(&lookup, "SHELF_API_BASE_URL")
            .map_or_else(|| Ok(DEFAULT_API_BASE_URL.to_string()), |raw| parse_base_url(&raw))
            .map_err(|_| {
                Error::InvalidInput(
                    "SHELF_API_BASE_URL must be an http:// or https:// URL".to_string(),
                )
            })?;

        let db_path = optional_trimmed(&lookup, "SHELF_DB_PATH").map(PathBuf::from);

        let retry_secs = parse_secs(&lookup, "SHELF_SYNC_RETRY_SECS")?.unwrap_or(DEFAULT_RETRY_SECS);
        let poll_secs = parse_secs(&lookup, "SHELF_SYNC_POLL_SECS")?;
        let http_timeout_secs =
            parse_secs(&lookup, "SHELF_HTTP_TIMEOUT_SECS")?.unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);

        let push_batch_size = match optional_trimmed(&lookup, "SHELF_PUSH_BATCH_SIZE") {
            None => DEFAULT_PUSH_BATCH_SIZE,
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|size| (1..=MAX_PUSH_BATCH_SIZE).contains(size))
                .ok_or_else(|| {
                    Error::InvalidInput(format!(
                        "SHELF_PUSH_BATCH_SIZE must be an integer between 1 and {MAX_PUSH_BATCH_SIZE}"
                    ))
                })?,
        };

        Ok(Self {
            api_base_url,
            db_path,
            retry_time: Duration::from_secs(retry_secs),
            poll_interval: poll_secs.map(Duration::from_secs),
            push_batch_size,
            http_timeout: Duration::from_secs(http_timeout_secs),
        })
    }

    /// Override the API base URL (e.g. from a CLI flag).
    pub fn with_api_base_url(mut self, api_base_url: impl Into<String>) -> Result<Self> {
        self.api_base_url = parse_base_url(&api_base_url.into())?;
        Ok(self)
    }

    /// Settings for the replication loop
    pub fn replication(&self) -> ReplicationConfig {
        ReplicationConfig {
            retry_time: self.retry_time,
            poll_interval: self.poll_interval,
            push_batch_size: self.push_batch_size,
            ..ReplicationConfig::default()
        }
    }
}

fn parse_secs(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<u64>> {
    let Some(raw) = optional_trimmed(lookup, name) else {
        return Ok(None);
    };
    raw.parse::<u64>()
        .ok()
        .filter(|secs| (1..=MAX_INTERVAL_SECS).contains(secs))
        .map(Some)
        .ok_or_else(|| {
            Error::InvalidInput(format!(
                "{name} must be an integer between 1 and {MAX_INTERVAL_SECS}"
            ))
        })
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
