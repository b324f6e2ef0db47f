use std::path::Path;

use serde_yaml::Value;

use super::secrets::{resolve_placeholders, SecretResolver};
use super::ConfigError;

/// Parse a YAML file, `None` when it does not exist.
pub(crate) fn load_yaml_file(path: &Path) -> Result<Option<Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Load(format!("{}: {e}", path.display())))?;
    parse_yaml(&content)
        .map(Some)
        .map_err(|e| ConfigError::Load(format!("{}: {e}", path.display())))
}

pub(crate) fn parse_yaml(content: &str) -> Result<Value, ConfigError> {
    match serde_yaml::from_str(content).map_err(|e| ConfigError::Load(e.to_string()))? {
        // An empty document is an empty config.
        Value::Null => Ok(Value::Mapping(Default::default())),
        value => Ok(value),
    }
}

/// Merge `overlay` into `base`: mappings merge key by key, anything else
/// (lists included) is replaced.
pub(crate) fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base), Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Resolve `${...}` placeholders in every string of the tree.
pub(crate) fn resolve_strings(value: &mut Value, resolver: &dyn SecretResolver) -> Result<(), ConfigError> {
    match value {
        Value::String(s) if s.contains("${") => {
            *s = resolve_placeholders(s, resolver)?;
        }
        Value::Mapping(map) => {
            for (_, item) in map.iter_mut() {
                resolve_strings(item, resolver)?;
            }
        }
        Value::Sequence(items) => {
            for item in items {
                resolve_strings(item, resolver)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Follow a dot-separated key through nested mappings.
pub(crate) fn lookup<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.')
        .filter(|part| !part.is_empty())
        .try_fold(root, |node, part| node.get(part))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_overlay_merges_mappings_and_replaces_lists() {
        let mut base = parse_yaml(
            "data:\n  provider:\n    type: rest\n    config:\n      base_url: http://localhost\n      timeout_ms: 100\nengine:\n  supported_locales: [en, fr]\n",
        )
        .unwrap();
        let overlay = parse_yaml(
            "data:\n  provider:\n    config:\n      base_url: https://prod\nengine:\n  supported_locales: [de]\n",
        )
        .unwrap();
        deep_merge(&mut base, overlay);

        assert_eq!(lookup(&base, "data.provider.type").and_then(Value::as_str), Some("rest"));
        assert_eq!(
            lookup(&base, "data.provider.config.base_url").and_then(Value::as_str),
            Some("https://prod")
        );
        assert_eq!(lookup(&base, "data.provider.config.timeout_ms").and_then(Value::as_u64), Some(100));
        assert_eq!(
            lookup(&base, "engine.supported_locales"),
            Some(&Value::Sequence(vec![Value::from("de")]))
        );
    }

    #[test]
    fn empty_document_is_an_empty_mapping() {
        assert!(parse_yaml("").unwrap().is_mapping());
        assert!(lookup(&parse_yaml("").unwrap(), "data.provider").is_none());
    }
}
