//! Permission checks run as `before` hooks on every operation.

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use crudkit_data::{DataError, Meta, Operation, OperationParams};

use crate::hooks::Hooks;
use crate::plugin::Plugin;

pub const PERMISSIONS_PLUGIN: &str = "permissions";

/// Decides whether an operation on a resource is allowed.
///
/// `Err(reason)` denies the call; the reason ends up in
/// [`DataError::PermissionDenied`].
pub trait PermissionPolicy: Send + Sync + 'static {
    fn check(&self, operation: Operation, resource: &str, meta: &Meta) -> Result<(), String>;
}

/// Allows everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PermissionPolicy for AllowAll {
    fn check(&self, _operation: Operation, _resource: &str, _meta: &Meta) -> Result<(), String> {
        Ok(())
    }
}

/// Role-based policy: role → resource → allowed operations.
///
/// The role is read from `meta.role`, falling back to `default_role`. Both
/// resource and operation accept the `*` wildcard.
///
/// ```yaml
/// default_role: guest
/// roles:
///   admin: { "*": ["*"] }
///   editor: { orders: [getList, getOne, update] }
///   guest: { "*": [getList, getOne] }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RolePolicy {
    #[serde(default)]
    pub roles: HashMap<String, HashMap<String, Vec<String>>>,
    #[serde(default)]
    pub default_role: Option<String>,
}

impl RolePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(mut self, role: &str, resource: &str, operations: &[Operation]) -> Self {
        let ops = self
            .roles
            .entry(role.to_string())
            .or_default()
            .entry(resource.to_string())
            .or_default();
        ops.extend(operations.iter().map(|op| op.as_str().to_string()));
        self
    }

    /// Grant every operation on every resource.
    pub fn allow_all(mut self, role: &str) -> Self {
        self.roles
            .entry(role.to_string())
            .or_default()
            .insert("*".to_string(), vec!["*".to_string()]);
        self
    }

    pub fn default_role(mut self, role: impl Into<String>) -> Self {
        self.default_role = Some(role.into());
        self
    }

    fn allows(ops: &[String], operation: Operation) -> bool {
        ops.iter().any(|op| op == "*" || op == operation.as_str())
    }
}

impl PermissionPolicy for RolePolicy {
    fn check(&self, operation: Operation, resource: &str, meta: &Meta) -> Result<(), String> {
        let role = meta
            .get("role")
            .and_then(|v| v.as_str())
            .or(self.default_role.as_deref())
            .ok_or_else(|| "no role in call meta".to_string())?;
        let Some(grants) = self.roles.get(role) else {
            return Err(format!("unknown role '{role}'"));
        };
        let allowed = [resource, "*"]
            .iter()
            .filter_map(|key| grants.get(*key))
            .any(|ops| Self::allows(ops, operation));
        if allowed {
            Ok(())
        } else {
            Err(format!("role '{role}' may not {operation} '{resource}'"))
        }
    }
}

/// Plugin denying calls its policy rejects, before they reach the provider.
pub struct PermissionsPlugin {
    policy: Arc<dyn PermissionPolicy>,
}

impl PermissionsPlugin {
    pub fn new(policy: Arc<dyn PermissionPolicy>) -> Self {
        Self { policy }
    }
}

fn guard<P: OperationParams>(policy: &dyn PermissionPolicy, params: P) -> Result<P, DataError> {
    let operation = P::OPERATION;
    match policy.check(operation, params.resource(), params.meta()) {
        Ok(()) => Ok(params),
        Err(reason) => {
            tracing::warn!(%operation, resource = params.resource(), %reason, "permission denied");
            Err(DataError::PermissionDenied {
                operation,
                resource: params.resource().to_string(),
                reason,
            })
        }
    }
}

impl Plugin for PermissionsPlugin {
    fn name(&self) -> &str {
        PERMISSIONS_PLUGIN
    }

    fn hooks(&self) -> Hooks {
        let (p1, p2, p3, p4, p5) = (
            self.policy.clone(),
            self.policy.clone(),
            self.policy.clone(),
            self.policy.clone(),
            self.policy.clone(),
        );
        Hooks::new()
            .before_get_list(move |params| guard(p1.as_ref(), params))
            .before_get_one(move |params| guard(p2.as_ref(), params))
            .before_create(move |params| guard(p3.as_ref(), params))
            .before_update(move |params| guard(p4.as_ref(), params))
            .before_delete(move |params| guard(p5.as_ref(), params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(role: &str) -> Meta {
        let mut meta = Meta::new();
        meta.insert("role".into(), json!(role));
        meta
    }

    #[test]
    fn role_policy_wildcards() {
        let policy = RolePolicy::new()
            .allow_all("admin")
            .allow("viewer", "*", &[Operation::GetList, Operation::GetOne])
            .allow("editor", "orders", &[Operation::Update]);

        assert!(policy.check(Operation::Delete, "orders", &meta("admin")).is_ok());
        assert!(policy.check(Operation::GetOne, "users", &meta("viewer")).is_ok());
        assert!(policy.check(Operation::Create, "users", &meta("viewer")).is_err());
        assert!(policy.check(Operation::Update, "orders", &meta("editor")).is_ok());
        assert!(policy.check(Operation::Update, "users", &meta("editor")).is_err());
    }

    #[test]
    fn missing_role_uses_default_or_denies() {
        let policy = RolePolicy::new().allow_all("admin");
        let err = policy
            .check(Operation::GetList, "orders", &Meta::new())
            .unwrap_err();
        assert!(err.contains("no role"));

        let policy = policy.default_role("admin");
        assert!(policy.check(Operation::GetList, "orders", &Meta::new()).is_ok());
    }

    #[test]
    fn policy_from_yaml_shape() {
        let policy: RolePolicy = serde_json::from_value(json!({
            "roles": { "guest": { "*": ["getList"] } },
            "default_role": "guest",
        }))
        .unwrap();
        assert!(policy.check(Operation::GetList, "x", &Meta::new()).is_ok());
        assert!(policy.check(Operation::Delete, "x", &Meta::new()).is_err());
    }
}
