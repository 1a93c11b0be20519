//! Request context types
//!
//! Identity resolution happens upstream (GraphQL layer); every call into the
//! retrieval core receives an already-resolved context.

use serde::{Deserialize, Serialize};

/// Caller role within a tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Learner account
    Student,
    /// Teaching/curation account
    Instructor,
    /// Tenant administrator
    Admin,
    /// Internal service-to-service caller
    Service,
}

/// Resolved per-request context
///
/// Supplied by the caller on every method. The retrieval core never resolves
/// identity itself and never crosses tenants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    /// Tenant isolation boundary
    pub tenant_id: String,

    /// Acting user
    pub user_id: String,

    /// Caller role
    pub role: Role,
}

impl RequestContext {
    /// Create a new request context
    pub fn new(tenant_id: impl Into<String>, user_id: impl Into<String>, role: Role) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            user_id: user_id.into(),
            role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_roundtrip() {
        let ctx = RequestContext::new("acme", "u-1", Role::Student);
        let json = serde_json::to_string(&ctx).unwrap();
        assert!(json.contains("\"tenantId\":\"acme\""));
        assert!(json.contains("\"role\":\"student\""));

        let back: RequestContext = serde_json::from_str(&json).unwrap();
        assert_eq!(back.tenant_id, "acme");
        assert_eq!(back.role, Role::Student);
    }
}
