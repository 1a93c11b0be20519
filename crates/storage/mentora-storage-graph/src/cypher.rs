//! openCypher query execution against the property-graph backend
//!
//! The backend wraps graph-pattern queries in a `cypher(graph, query, params)`
//! call on a pooled connection. Three setup statements run in order on every
//! freshly acquired connection before the traversal: load the graph
//! extension, set the search path, and set the tenant session variable. The
//! connection is always released, and the tenant variable reset, on both
//! success and failure paths.
//!
//! Depending on backend version the third `cypher()` argument may not accept
//! a bound parameter object; [`substitute_params`] provides the
//! literal-substitution fallback used in that case.

use crate::agtype::{parse_column, AgValue};
use crate::GraphStoreConfig;
use async_trait::async_trait;
use mentora_core::{MentoraError, Result};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// A row of named, parsed agtype columns
pub type CypherRow = HashMap<String, AgValue>;

/// Execution seam for cypher queries
///
/// `run_bound` executes with named placeholders and a separate JSON parameter
/// object; `run_literal` executes query text that already has every value
/// substituted in. Both acquire a dedicated connection, run the setup
/// statements, and release the connection when done.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CypherTransport: Send + Sync {
    /// Execute with a bound parameter object
    async fn run_bound(
        &self,
        tenant_id: &str,
        query: &str,
        params: serde_json::Value,
        columns: Vec<String>,
    ) -> Result<Vec<CypherRow>>;

    /// Execute pre-substituted query text without a parameter object
    async fn run_literal(
        &self,
        tenant_id: &str,
        query: &str,
        columns: Vec<String>,
    ) -> Result<Vec<CypherRow>>;
}

/// Whether an execution error is the backend rejecting a bound third argument
///
/// This precise signature is the only error ever inspected by message
/// content; it gates the literal-substitution retry.
pub fn is_param_binding_unsupported(err: &MentoraError) -> bool {
    let msg = err.to_string();
    msg.contains("third argument") && msg.contains("must be a parameter")
}

/// Validate a SQL/graph identifier (graph name, column alias, edge label)
pub(crate) fn validate_identifier(name: &str) -> Result<&str> {
    if name.is_empty() || name.len() > 64 {
        return Err(MentoraError::validation(format!(
            "Invalid identifier length: {} (must be 1-64 characters)",
            name.len()
        )));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(MentoraError::validation(format!(
            "Invalid identifier '{}': only alphanumeric characters and underscores allowed",
            name
        )));
    }
    Ok(name)
}

/// Substitute named placeholders with escaped literal values
///
/// Reserved for backends that reject bound parameters; every value is
/// re-escaped here before it touches the query text. Longer keys are
/// substituted first so `$name` never clobbers part of `$name_key`.
pub fn substitute_params(query: &str, params: &serde_json::Value) -> Result<String> {
    let obj = params
        .as_object()
        .ok_or_else(|| MentoraError::validation("cypher parameters must be a JSON object"))?;

    let mut keys: Vec<&String> = obj.keys().collect();
    keys.sort_by_key(|k| std::cmp::Reverse(k.len()));

    let mut out = query.to_string();
    for key in keys {
        validate_identifier(key)?;
        let literal = to_cypher_literal(&obj[key.as_str()]);
        out = out.replace(&format!("${}", key), &literal);
    }
    Ok(out)
}

fn to_cypher_literal(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "null".to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => quote_string(s),
        serde_json::Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(to_cypher_literal).collect();
            format!("[{}]", inner.join(", "))
        }
        serde_json::Value::Object(map) => {
            let inner: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", k, to_cypher_literal(v)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
    }
}

fn quote_string(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len() + 2);
    escaped.push('\'');
    for c in s.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\'"),
            _ => escaped.push(c),
        }
    }
    escaped.push('\'');
    escaped
}

/// PostgreSQL transport for cypher queries
pub struct PgCypherTransport {
    pool: PgPool,
    graph_name: String,
    query_timeout: Duration,
}

impl PgCypherTransport {
    /// Create a transport over an injected pool
    pub fn new(pool: PgPool, config: &GraphStoreConfig) -> Result<Self> {
        validate_identifier(&config.graph_name)?;
        Ok(Self {
            pool,
            graph_name: config.graph_name.clone(),
            query_timeout: Duration::from_secs(config.query_timeout_secs),
        })
    }

    /// Run the three per-connection setup statements, in order
    async fn setup(
        &self,
        conn: &mut sqlx::pool::PoolConnection<sqlx::Postgres>,
        tenant_id: &str,
    ) -> Result<()> {
        sqlx::query("LOAD 'age'").execute(&mut **conn).await?;
        sqlx::query("SET search_path = ag_catalog, \"$user\", public")
            .execute(&mut **conn)
            .await?;
        sqlx::query("SELECT set_config('app.tenant_id', $1, false)")
            .bind(tenant_id)
            .execute(&mut **conn)
            .await?;
        Ok(())
    }

    /// Wrap a cypher query in its SQL projection
    ///
    /// Every returned column is declared agtype and cast to text so the rows
    /// reach the parsing boundary as strings.
    fn wrap(&self, query: &str, columns: &[String], with_params: bool) -> Result<String> {
        let mut selects = Vec::with_capacity(columns.len());
        let mut decls = Vec::with_capacity(columns.len());
        for column in columns {
            let column = validate_identifier(column)?;
            selects.push(format!("{}::text AS {}", column, column));
            decls.push(format!("{} ag_catalog.agtype", column));
        }
        let args = if with_params {
            format!("'{}', $mentora${}$mentora$, $1::ag_catalog.agtype", self.graph_name, query)
        } else {
            format!("'{}', $mentora${}$mentora$", self.graph_name, query)
        };
        Ok(format!(
            "SELECT {} FROM ag_catalog.cypher({}) AS ({})",
            selects.join(", "),
            args,
            decls.join(", ")
        ))
    }

    async fn fetch(
        &self,
        tenant_id: &str,
        sql: &str,
        bound: Option<String>,
        columns: &[String],
    ) -> Result<Vec<CypherRow>> {
        let mut conn = self.pool.acquire().await?;

        let result: Result<Vec<CypherRow>> = async {
            self.setup(&mut conn, tenant_id).await?;

            let query = match &bound {
                Some(params) => sqlx::query(sql).bind(params.as_str()),
                None => sqlx::query(sql),
            };

            let rows = tokio::time::timeout(self.query_timeout, query.fetch_all(&mut *conn))
                .await
                .map_err(|_| {
                    MentoraError::timeout(format!(
                        "graph query exceeded {}s",
                        self.query_timeout.as_secs()
                    ))
                })??;

            let mut parsed = Vec::with_capacity(rows.len());
            for row in rows {
                let mut out = CypherRow::with_capacity(columns.len());
                for column in columns {
                    let raw: Option<String> = row.try_get(column.as_str())?;
                    if let Some(raw) = raw {
                        out.insert(column.clone(), parse_column(&raw));
                    }
                }
                parsed.push(out);
            }
            Ok(parsed)
        }
        .await;

        // Pooled connections must not carry tenant state back.
        if let Err(e) = sqlx::query("RESET app.tenant_id").execute(&mut *conn).await {
            warn!("Failed to reset tenant session state: {}", e);
        }

        result
    }
}

#[async_trait]
impl CypherTransport for PgCypherTransport {
    async fn run_bound(
        &self,
        tenant_id: &str,
        query: &str,
        params: serde_json::Value,
        columns: Vec<String>,
    ) -> Result<Vec<CypherRow>> {
        let sql = self.wrap(query, &columns, true)?;
        debug!("Executing bound cypher query on graph '{}'", self.graph_name);
        self.fetch(tenant_id, &sql, Some(params.to_string()), &columns)
            .await
    }

    async fn run_literal(
        &self,
        tenant_id: &str,
        query: &str,
        columns: Vec<String>,
    ) -> Result<Vec<CypherRow>> {
        let sql = self.wrap(query, &columns, false)?;
        debug!(
            "Executing literal cypher query on graph '{}'",
            self.graph_name
        );
        self.fetch(tenant_id, &sql, None, &columns).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_binding_unsupported_signature() {
        let err = MentoraError::graph(
            "ERROR: third argument of cypher function must be a parameter",
        );
        assert!(is_param_binding_unsupported(&err));

        let other = MentoraError::graph("connection refused");
        assert!(!is_param_binding_unsupported(&other));

        // Both fragments are required, not just any mention of one
        let partial = MentoraError::graph("third argument was wrong");
        assert!(!is_param_binding_unsupported(&partial));
    }

    #[test]
    fn test_substitute_strings_escaped() {
        let out = substitute_params(
            "MATCH (c) WHERE c.name = $name RETURN c",
            &json!({"name": "O'Brien's \\ set"}),
        )
        .unwrap();
        assert_eq!(
            out,
            "MATCH (c) WHERE c.name = 'O\\'Brien\\'s \\\\ set' RETURN c"
        );
    }

    #[test]
    fn test_substitute_longest_key_first() {
        let out = substitute_params(
            "WHERE c.key = $name_key AND c.name = $name",
            &json!({"name": "Algebra", "name_key": "algebra"}),
        )
        .unwrap();
        assert_eq!(out, "WHERE c.key = 'algebra' AND c.name = 'Algebra'");
    }

    #[test]
    fn test_substitute_numbers_and_arrays() {
        let out = substitute_params(
            "SET c.strength = $strength, c.tags = $tags",
            &json!({"strength": 0.5, "tags": ["a", "b"]}),
        )
        .unwrap();
        assert_eq!(out, "SET c.strength = 0.5, c.tags = ['a', 'b']");
    }

    #[test]
    fn test_substitute_rejects_non_object() {
        assert!(substitute_params("RETURN 1", &json!([1, 2])).is_err());
    }

    #[test]
    fn test_identifier_validation() {
        assert!(validate_identifier("mentora_graph").is_ok());
        assert!(validate_identifier("RELATED_TO").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("drop table;--").is_err());
        assert!(validate_identifier(&"x".repeat(65)).is_err());
    }
}
