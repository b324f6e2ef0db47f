use serde::Deserialize;
use std::collections::HashMap;

use crate::error::DataError;

/// Maps logical resource names to backend table/collection/endpoint names.
///
/// Resolution is identity by default. With `strict` set, only mapped
/// resources are accepted and everything else is
/// [`DataError::UnsupportedResource`].
///
/// ```yaml
/// resources:
///   strict: true
///   mapping:
///     orders: tbl_orders
///     customers: crm_contacts
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceMap {
    #[serde(default)]
    pub mapping: HashMap<String, String>,
    #[serde(default)]
    pub strict: bool,
}

impl ResourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map(mut self, resource: impl Into<String>, target: impl Into<String>) -> Self {
        self.mapping.insert(resource.into(), target.into());
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Resolve `resource` to its backend name.
    pub fn resolve<'a>(&'a self, provider: &'static str, resource: &'a str) -> Result<&'a str, DataError> {
        match self.mapping.get(resource) {
            Some(target) => Ok(target.as_str()),
            None if self.strict => Err(DataError::unsupported_resource(provider, resource)),
            None => Ok(resource),
        }
    }

    /// Resolve and validate that the name is usable as a path segment.
    pub fn resolve_path_segment<'a>(
        &'a self,
        provider: &'static str,
        resource: &'a str,
    ) -> Result<&'a str, DataError> {
        let target = self.resolve(provider, resource)?;
        if target.is_empty() || target.contains(['?', '#']) {
            return Err(DataError::unsupported_resource(provider, resource));
        }
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_by_default() {
        let map = ResourceMap::new();
        assert_eq!(map.resolve("sql", "orders").unwrap(), "orders");
    }

    #[test]
    fn mapped_names_win() {
        let map = ResourceMap::new().map("orders", "tbl_orders");
        assert_eq!(map.resolve("sql", "orders").unwrap(), "tbl_orders");
        assert_eq!(map.resolve("sql", "users").unwrap(), "users");
    }

    #[test]
    fn strict_rejects_unmapped() {
        let map = ResourceMap::new().map("orders", "tbl_orders").strict(true);
        let err = map.resolve("sql", "users").unwrap_err();
        assert!(matches!(
            err,
            DataError::UnsupportedResource { provider: "sql", ref resource } if resource == "users"
        ));
    }

    #[test]
    fn path_segment_rejects_query_characters() {
        let map = ResourceMap::new();
        assert!(map.resolve_path_segment("rest", "orders?x=1").is_err());
        assert!(map.resolve_path_segment("rest", "").is_err());
    }
}
