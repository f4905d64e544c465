//! Graph behaviour policies.
//!
//! Policies are local to a replica and are not part of replicated state.
//! Replicas that are expected to converge must run with the same policies,
//! since they decide which tombstones an operation writes.
//!
//! Settings can be loaded from TOML or from environment variables:
//!
//! ```toml
//! isolated_vertices = "prune"   # or "keep"
//! traversal = "undirected"      # or "directed"
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub const ENV_ISOLATED_VERTICES: &str = "LWW_GRAPH_ISOLATED_VERTICES";
pub const ENV_TRAVERSAL: &str = "LWW_GRAPH_TRAVERSAL";

/// What `remove_edge` does with an endpoint left without incident edges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IsolatedVertexPolicy {
    /// Remove the endpoint with the edge's timestamp.
    #[default]
    Prune,
    /// Leave the endpoint in place.
    Keep,
}

/// Neighbour expansion used by path search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Traversal {
    /// Follow edges in both directions.
    #[default]
    Undirected,
    /// Follow edges from `from` to `to` only.
    Directed,
}

impl FromStr for IsolatedVertexPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prune" => Ok(IsolatedVertexPolicy::Prune),
            "keep" => Ok(IsolatedVertexPolicy::Keep),
            other => Err(ConfigError::InvalidValue {
                key: "isolated_vertices",
                value: other.to_string(),
            }),
        }
    }
}

impl FromStr for Traversal {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "undirected" => Ok(Traversal::Undirected),
            "directed" => Ok(Traversal::Directed),
            other => Err(ConfigError::InvalidValue {
                key: "traversal",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub isolated_vertices: IsolatedVertexPolicy,
    pub traversal: Traversal,
}

impl GraphConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_isolated_vertices(mut self, policy: IsolatedVertexPolicy) -> Self {
        self.isolated_vertices = policy;
        self
    }

    pub fn with_traversal(mut self, traversal: Traversal) -> Self {
        self.traversal = traversal;
        self
    }

    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Load from `LWW_GRAPH_*` environment variables, defaulting unset keys.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = GraphConfig::default();
        if let Ok(value) = std::env::var(ENV_ISOLATED_VERTICES) {
            config.isolated_vertices = value.parse()?;
        }
        if let Ok(value) = std::env::var(ENV_TRAVERSAL) {
            config.traversal = value.parse()?;
        }
        Ok(config)
    }
}

/// Error loading a [`GraphConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Io { path: String, message: String },
    Parse(String),
    InvalidValue { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, message } => {
                write!(f, "failed to read config {}: {}", path, message)
            }
            ConfigError::Parse(message) => write!(f, "invalid config: {}", message),
            ConfigError::InvalidValue { key, value } => {
                write!(f, "invalid value {:?} for {}", value, key)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
