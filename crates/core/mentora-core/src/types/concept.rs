//! Concept graph types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Relationship kind between two concepts
///
/// `RelatedTo` is traversable in either direction for neighborhood queries;
/// `PrerequisiteOf` is traversed prerequisite→target only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationKind {
    /// Undirected association for neighborhood traversal
    RelatedTo,
    /// Directed prerequisite edge (must be learned first)
    PrerequisiteOf,
    /// Caller-supplied edge label
    Custom(String),
}

impl RelationKind {
    /// Edge label as stored in the graph
    pub fn label(&self) -> &str {
        match self {
            RelationKind::RelatedTo => "RELATED_TO",
            RelationKind::PrerequisiteOf => "PREREQUISITE_OF",
            RelationKind::Custom(label) => label,
        }
    }
}

/// A concept node in the tenant's knowledge graph
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Concept {
    /// Unique identifier
    pub id: Uuid,

    /// Owning tenant
    pub tenant_id: String,

    /// Concept name; unique per tenant case-insensitively at the
    /// application layer (the store does not enforce it)
    pub name: String,

    /// Definition text
    pub definition: String,

    /// Source material ids backing this concept
    #[serde(default)]
    pub source_ids: Vec<Uuid>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// Lightweight concept reference returned from traversals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptSummary {
    /// Graph node id
    pub id: String,

    /// Concept name
    pub name: String,

    /// Node label, when the backend returns one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl ConceptSummary {
    /// Create a summary without a kind
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: None,
        }
    }
}

/// An ordered path through the concept graph
///
/// `steps` is the edge count, always `concepts.len() - 1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptPath {
    /// Concepts along the path, in order
    pub concepts: Vec<ConceptSummary>,

    /// Number of edges on the path
    pub steps: usize,
}

impl ConceptPath {
    /// Build a path from an ordered node list
    pub fn from_concepts(concepts: Vec<ConceptSummary>) -> Self {
        let steps = concepts.len().saturating_sub(1);
        Self { concepts, steps }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_labels() {
        assert_eq!(RelationKind::RelatedTo.label(), "RELATED_TO");
        assert_eq!(RelationKind::PrerequisiteOf.label(), "PREREQUISITE_OF");
        assert_eq!(RelationKind::Custom("CITES".into()).label(), "CITES");
    }

    #[test]
    fn test_path_step_invariant() {
        let path = ConceptPath::from_concepts(vec![
            ConceptSummary::new("1", "Algebra"),
            ConceptSummary::new("2", "Calculus"),
        ]);
        assert_eq!(path.steps, path.concepts.len() - 1);

        let empty = ConceptPath::from_concepts(vec![]);
        assert_eq!(empty.steps, 0);
    }
}
