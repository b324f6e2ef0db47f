use serde::Deserialize;

use crate::plugins::permissions::RolePolicy;

fn default_locale() -> String {
    "en".to_string()
}

/// The `engine` section of the application configuration.
///
/// ```yaml
/// engine:
///   enable_audit: true
///   enable_permissions: true
///   default_locale: en
///   supported_locales: [en, fr]
///   default_timeout_ms: 5000
///   permissions:
///     roles:
///       admin: { "*": ["*"] }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    #[serde(default)]
    pub enable_audit: bool,
    /// Also audit `getList`/`getOne`.
    #[serde(default)]
    pub audit_reads: bool,
    #[serde(default)]
    pub enable_permissions: bool,
    /// Role policy used when permissions are enabled. Without one, every
    /// call is allowed.
    #[serde(default)]
    pub permissions: Option<RolePolicy>,
    #[serde(default = "default_locale")]
    pub default_locale: String,
    /// Empty means only the default locale.
    #[serde(default)]
    pub supported_locales: Vec<String>,
    #[serde(default)]
    pub default_timeout_ms: Option<u64>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            enable_audit: false,
            audit_reads: false,
            enable_permissions: false,
            permissions: None,
            default_locale: default_locale(),
            supported_locales: Vec::new(),
            default_timeout_ms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_when_section_is_empty() {
        let settings: EngineSettings = serde_json::from_value(json!({})).unwrap();
        assert_eq!(settings.default_locale, "en");
        assert!(!settings.enable_audit);
        assert!(settings.default_timeout_ms.is_none());
    }

    #[test]
    fn reads_full_section() {
        let settings: EngineSettings = serde_json::from_value(json!({
            "enable_audit": true,
            "enable_permissions": true,
            "default_locale": "fr",
            "supported_locales": ["fr", "en"],
            "default_timeout_ms": 250,
            "permissions": { "roles": { "admin": { "*": ["*"] } } },
        }))
        .unwrap();
        assert!(settings.enable_permissions);
        assert_eq!(settings.supported_locales, vec!["fr", "en"]);
        assert_eq!(settings.default_timeout_ms, Some(250));
        assert!(settings.permissions.is_some());
    }
}
