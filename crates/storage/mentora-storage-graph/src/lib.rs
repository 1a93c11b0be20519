//! Concept-graph path finding for Mentora
//!
//! Executes openCypher traversals (shortest path, bounded-depth neighbor
//! collection, deepest prerequisite chain) against a tenant-scoped property
//! graph, parses the backend's agtype result columns into typed values, and
//! falls back to literal parameter substitution on backends that reject a
//! bound parameter object.

#![warn(clippy::all)]

pub mod agtype;
pub mod cypher;
pub mod store;

pub use agtype::AgValue;
pub use cypher::{CypherRow, CypherTransport, PgCypherTransport};
pub use store::GraphStore;

use serde::{Deserialize, Serialize};

/// Configuration for the graph store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStoreConfig {
    /// Graph catalog name
    pub graph_name: String,

    /// Per-query timeout in seconds
    pub query_timeout_secs: u64,
}

impl Default for GraphStoreConfig {
    fn default() -> Self {
        Self {
            graph_name: "mentora_graph".to_string(),
            query_timeout_secs: 10,
        }
    }
}

impl GraphStoreConfig {
    /// Build from `MENTORA_GRAPH_NAME` / `MENTORA_QUERY_TIMEOUT_SECS`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            graph_name: std::env::var("MENTORA_GRAPH_NAME").unwrap_or(defaults.graph_name),
            query_timeout_secs: std::env::var("MENTORA_QUERY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.query_timeout_secs),
        }
    }
}
