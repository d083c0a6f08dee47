//! Injected predicate providers (tenant / security scoping)
//!
//! The engine asks its provider for an extra predicate on every compile and
//! ANDs whatever it returns with the caller's criteria at the root. It never
//! looks at the predicate beyond compiling it.

use std::fmt;

use crate::criteria::FilterCriteria;

/// Supplies an optional predicate that gates every query.
pub trait PredicateProvider: Send + Sync {
    fn predicate(&self) -> Option<FilterCriteria>;
}

impl<F> PredicateProvider for F
where
    F: Fn() -> Option<FilterCriteria> + Send + Sync,
{
    fn predicate(&self) -> Option<FilterCriteria> {
        self()
    }
}

/// Restricts every query to rows whose `field` equals `tenant_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantScope {
    field: String,
    tenant_id: String,
}

impl TenantScope {
    pub fn new(field: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            tenant_id: tenant_id.into(),
        }
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }
}

impl PredicateProvider for TenantScope {
    fn predicate(&self) -> Option<FilterCriteria> {
        Some(FilterCriteria::eq(self.field.clone(), self.tenant_id.clone()))
    }
}

impl fmt::Display for TenantScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.field, self.tenant_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_provider() {
        let provider = || Some(FilterCriteria::eq("tenantId", "acme"));
        assert_eq!(
            provider.predicate(),
            Some(FilterCriteria::eq("tenantId", "acme"))
        );

        let none = || -> Option<FilterCriteria> { None };
        assert_eq!(PredicateProvider::predicate(&none), None);
    }

    #[test]
    fn test_tenant_scope() {
        let scope = TenantScope::new("tenantId", "acme");
        assert_eq!(scope.predicate(), Some(FilterCriteria::eq("tenantId", "acme")));
        assert_eq!(scope.to_string(), "tenantId = acme");
    }
}
