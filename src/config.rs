//! Coordinator configuration.

use crate::error::{FailoverError, Result};
use crate::types::{Endpoint, DEFAULT_RESERVED_PREFIX};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Order of the two halves of a hand-over between servers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoverOrder {
    /// Subscribe the chosen server, then unsubscribe the others.
    /// Changes may be delivered twice during the overlap (at-least-once).
    #[default]
    MakeBeforeBreak,
    /// Unsubscribe the others, then subscribe the chosen server.
    /// Changes in the gap are missed (at-most-once).
    BreakBeforeMake,
}

/// Coordinator configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FailoverConfig {
    /// Preference list, most preferred first.
    pub servers: Vec<Endpoint>,

    /// Hand-over ordering.
    /// Default: MakeBeforeBreak
    pub handover: HandoverOrder,

    /// Document id prefix of store-internal changes, filtered out of change streams.
    /// Default: "_"
    pub reserved_prefix: String,

    /// Buffer size of listeners created through the coordinator.
    /// Default: 256
    pub event_buffer_size: usize,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            handover: HandoverOrder::default(),
            reserved_prefix: DEFAULT_RESERVED_PREFIX.to_string(),
            event_buffer_size: 256,
        }
    }
}

impl FailoverConfig {
    /// Config with the given preference list and default settings.
    pub fn with_servers(servers: Vec<Endpoint>) -> Self {
        Self {
            servers,
            ..Default::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: FailoverConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Check the preference list: non-empty, no blank addresses, no duplicates.
    pub fn validate(&self) -> Result<()> {
        if self.servers.is_empty() {
            return Err(FailoverError::EmptyPreferenceList);
        }

        let mut seen = HashSet::with_capacity(self.servers.len());
        for server in &self.servers {
            if server.address.trim().is_empty() {
                return Err(FailoverError::InvalidEndpoint(format!(
                    "blank address for dataset '{}'",
                    server.dataset
                )));
            }
            if !seen.insert(server) {
                return Err(FailoverError::DuplicateServer(server.clone()));
            }
        }

        if self.event_buffer_size == 0 {
            return Err(FailoverError::Config(
                "event_buffer_size must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
