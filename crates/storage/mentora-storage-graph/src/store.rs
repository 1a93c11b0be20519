//! Tenant-scoped concept graph traversals and mutations

use crate::agtype::AgValue;
use crate::cypher::{
    is_param_binding_unsupported, substitute_params, validate_identifier, CypherRow,
    CypherTransport,
};
use mentora_core::types::{clamp_depth, Concept, ConceptPath, ConceptSummary, RelationKind};
use mentora_core::{MentoraError, Result};
use serde_json::json;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Maximum hop count for shortest-path queries
const MAX_PATH_HOPS: i64 = 10;
/// Maximum hop count for prerequisite chains
const MAX_CHAIN_HOPS: i64 = 5;

/// Concept graph store
///
/// Read traversals (`shortest_path`, `collect_related`, `prerequisite_chain`)
/// degrade to `None`/empty on any backend failure; mutations propagate
/// errors. Parameter-binding support is probed at most once per store and
/// cached.
pub struct GraphStore {
    transport: Arc<dyn CypherTransport>,
    /// `None` until probed; `Some(false)` routes straight to substitution
    param_binding: RwLock<Option<bool>>,
}

impl GraphStore {
    /// Create a store over an injected transport
    pub fn new(transport: Arc<dyn CypherTransport>) -> Self {
        Self {
            transport,
            param_binding: RwLock::new(None),
        }
    }

    /// Execute a cypher query, handling the parameter-binding fallback
    ///
    /// When binding support is unknown, a bound attempt runs first; a failure
    /// carrying the backend's "third argument ... must be a parameter"
    /// signature records the capability and re-executes exactly once with
    /// every value substituted into the query text. No other error is ever
    /// retried.
    async fn run(
        &self,
        tenant_id: &str,
        query: &str,
        params: serde_json::Value,
        columns: &[&str],
    ) -> Result<Vec<CypherRow>> {
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let capability = *self.param_binding.read().unwrap();

        if capability == Some(false) {
            let substituted = substitute_params(query, &params)?;
            return self
                .transport
                .run_literal(tenant_id, &substituted, columns)
                .await;
        }

        match self
            .transport
            .run_bound(tenant_id, query, params.clone(), columns.clone())
            .await
        {
            Ok(rows) => {
                if capability.is_none() {
                    *self.param_binding.write().unwrap() = Some(true);
                }
                Ok(rows)
            }
            Err(err) if is_param_binding_unsupported(&err) => {
                warn!("Backend rejected bound cypher parameters, switching to literal substitution");
                *self.param_binding.write().unwrap() = Some(false);
                let substituted = substitute_params(query, &params)?;
                self.transport
                    .run_literal(tenant_id, &substituted, columns)
                    .await
            }
            Err(err) => Err(err),
        }
    }

    /// Shortest path between two named concepts
    ///
    /// Names match case-insensitively; `RELATED_TO` and `PREREQUISITE_OF`
    /// edges are searched in either direction, bounded to 1-10 hops. Returns
    /// `None` when either name does not resolve or no path exists.
    pub async fn shortest_path(
        &self,
        from_name: &str,
        to_name: &str,
        tenant_id: &str,
    ) -> Result<Option<ConceptPath>> {
        let query = format!(
            "MATCH (a:Concept), (b:Concept) \
             WHERE a.tenant_id = $tenant_id AND b.tenant_id = $tenant_id \
               AND toLower(a.name) = toLower($from_name) \
               AND toLower(b.name) = toLower($to_name) \
             MATCH p = (a)-[:RELATED_TO|PREREQUISITE_OF*1..{}]-(b) \
             RETURN [n IN nodes(p) | n.name] AS names, \
                    [n IN nodes(p) | toString(id(n))] AS ids, \
                    length(p) AS steps \
             ORDER BY steps ASC LIMIT 1",
            MAX_PATH_HOPS
        );
        let params = json!({
            "from_name": from_name,
            "to_name": to_name,
            "tenant_id": tenant_id,
        });

        let rows = match self
            .run(tenant_id, &query, params, &["names", "ids", "steps"])
            .await
        {
            Ok(rows) => rows,
            Err(err) => {
                warn!(
                    "Shortest path query failed ({} -> {}): {}",
                    from_name, to_name, err
                );
                return Ok(None);
            }
        };

        Ok(rows.first().and_then(path_from_row))
    }

    /// Distinct concepts reachable over `RELATED_TO` edges
    ///
    /// `depth` is clamped to `[1, 5]` before it reaches the query. Result
    /// order is whatever the backend's distinct collection returns.
    pub async fn collect_related(
        &self,
        concept_name: &str,
        depth: i64,
        tenant_id: &str,
    ) -> Result<Vec<ConceptSummary>> {
        let depth = clamp_depth(depth);
        let query = format!(
            "MATCH (a:Concept)-[:RELATED_TO*1..{}]-(n:Concept) \
             WHERE a.tenant_id = $tenant_id AND toLower(a.name) = toLower($name) \
               AND n.tenant_id = $tenant_id AND id(n) <> id(a) \
             RETURN DISTINCT toString(id(n)) AS id, n.name AS name",
            depth
        );
        let params = json!({"name": concept_name, "tenant_id": tenant_id});

        let rows = match self.run(tenant_id, &query, params, &["id", "name"]).await {
            Ok(rows) => rows,
            Err(err) => {
                warn!("Related-concept query failed for '{}': {}", concept_name, err);
                return Ok(Vec::new());
            }
        };

        Ok(rows.iter().filter_map(summary_from_row).collect())
    }

    /// Deepest prerequisite chain leading into the named concept
    ///
    /// Traverses `PREREQUISITE_OF` edges prerequisite→target only, up to 5
    /// hops, and returns the single longest chain ordered root-to-target
    /// (ties broken arbitrarily by the backend). Empty when the concept has
    /// no prerequisites.
    pub async fn prerequisite_chain(
        &self,
        concept_name: &str,
        tenant_id: &str,
    ) -> Result<Vec<ConceptSummary>> {
        let query = format!(
            "MATCH p = (root:Concept)-[:PREREQUISITE_OF*1..{}]->(target:Concept) \
             WHERE target.tenant_id = $tenant_id \
               AND toLower(target.name) = toLower($name) \
               AND root.tenant_id = $tenant_id \
             RETURN [n IN nodes(p) | n.name] AS names, \
                    [n IN nodes(p) | toString(id(n))] AS ids, \
                    length(p) AS depth \
             ORDER BY depth DESC LIMIT 1",
            MAX_CHAIN_HOPS
        );
        let params = json!({"name": concept_name, "tenant_id": tenant_id});

        let rows = match self
            .run(tenant_id, &query, params, &["names", "ids", "depth"])
            .await
        {
            Ok(rows) => rows,
            Err(err) => {
                warn!(
                    "Prerequisite chain query failed for '{}': {}",
                    concept_name, err
                );
                return Ok(Vec::new());
            }
        };

        Ok(rows
            .first()
            .and_then(path_from_row)
            .map(|path| path.concepts)
            .unwrap_or_default())
    }

    /// Case-insensitive point lookup by concept name
    pub async fn concept_by_name(
        &self,
        name: &str,
        tenant_id: &str,
    ) -> Result<Option<ConceptSummary>> {
        let query = "MATCH (c:Concept) \
                     WHERE c.tenant_id = $tenant_id AND toLower(c.name) = toLower($name) \
                     RETURN toString(id(c)) AS id, c.name AS name LIMIT 1";
        let params = json!({"name": name, "tenant_id": tenant_id});

        let rows = match self.run(tenant_id, query, params, &["id", "name"]).await {
            Ok(rows) => rows,
            Err(err) => {
                warn!("Concept lookup failed for '{}': {}", name, err);
                return Ok(None);
            }
        };

        Ok(rows.first().and_then(summary_from_row))
    }

    /// Create or update a concept node, keyed by lowercased name per tenant
    ///
    /// Unlike the read traversals, a failed write propagates its error.
    pub async fn upsert_concept(&self, concept: &Concept) -> Result<ConceptSummary> {
        let query = "MERGE (c:Concept {tenant_id: $tenant_id, name_key: $name_key}) \
                     SET c.uuid = $id, c.name = $name, c.definition = $definition, \
                         c.source_ids = $source_ids, c.updated_at = $updated_at \
                     RETURN toString(id(c)) AS id, c.name AS name";
        let params = json!({
            "tenant_id": concept.tenant_id,
            "name_key": concept.name.to_lowercase(),
            "id": concept.id.to_string(),
            "name": concept.name,
            "definition": concept.definition,
            "source_ids": concept.source_ids.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
            "updated_at": concept.updated_at.to_rfc3339(),
        });

        let rows = self
            .run(&concept.tenant_id, query, params, &["id", "name"])
            .await?;
        debug!("Upserted concept '{}'", concept.name);

        rows.first()
            .and_then(summary_from_row)
            .ok_or_else(|| MentoraError::graph("concept merge returned no row"))
    }

    /// Create a typed edge between two named concepts
    ///
    /// `strength` is clamped into `[0, 1]`; the edge label is validated
    /// before it is spliced into the pattern. Returns whether the edge was
    /// written.
    pub async fn link_concepts(
        &self,
        from_name: &str,
        to_name: &str,
        kind: &RelationKind,
        strength: f64,
        description: Option<&str>,
        tenant_id: &str,
    ) -> Result<bool> {
        let label = validate_identifier(kind.label())?;
        let strength = strength.clamp(0.0, 1.0);
        let query = format!(
            "MATCH (a:Concept), (b:Concept) \
             WHERE a.tenant_id = $tenant_id AND b.tenant_id = $tenant_id \
               AND toLower(a.name) = toLower($from_name) \
               AND toLower(b.name) = toLower($to_name) \
             MERGE (a)-[r:{}]->(b) \
             SET r.strength = $strength, r.description = $description \
             RETURN toString(id(r)) AS id",
            label
        );
        let params = json!({
            "from_name": from_name,
            "to_name": to_name,
            "strength": strength,
            "description": description,
            "tenant_id": tenant_id,
        });

        let rows = self.run(tenant_id, &query, params, &["id"]).await?;
        Ok(!rows.is_empty())
    }
}

/// Zip the `names`/`ids` array columns of a row into an ordered path
fn path_from_row(row: &CypherRow) -> Option<ConceptPath> {
    let names = row.get("names")?.as_list()?;
    let ids = row.get("ids")?.as_list()?;
    if names.is_empty() {
        return None;
    }

    let concepts: Vec<ConceptSummary> = names
        .iter()
        .zip(ids.iter())
        .filter_map(|(name, id)| {
            Some(ConceptSummary {
                id: value_to_string(id)?,
                name: value_to_string(name)?,
                kind: Some("Concept".to_string()),
            })
        })
        .collect();

    if concepts.is_empty() {
        return None;
    }
    Some(ConceptPath::from_concepts(concepts))
}

fn summary_from_row(row: &CypherRow) -> Option<ConceptSummary> {
    Some(ConceptSummary {
        id: value_to_string(row.get("id")?)?,
        name: value_to_string(row.get("name")?)?,
        kind: Some("Concept".to_string()),
    })
}

fn value_to_string(value: &AgValue) -> Option<String> {
    match value {
        AgValue::Text(s) => Some(s.clone()),
        AgValue::Number(n) => Some(format_number(*n)),
        AgValue::List(_) => None,
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
