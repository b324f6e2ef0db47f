use super::ConfigError;

/// Resolves the reference inside a `${...}` placeholder.
pub trait SecretResolver: Send + Sync {
    fn resolve(&self, reference: &str) -> Result<String, ConfigError>;
}

/// Environment variables and files.
///
/// - `${VAR_NAME}`: environment variable
/// - `${env:VAR_NAME}`: environment variable, explicitly
/// - `${file:/path/to/secret}`: file content, trimmed
pub struct DefaultSecretResolver;

impl SecretResolver for DefaultSecretResolver {
    fn resolve(&self, reference: &str) -> Result<String, ConfigError> {
        if let Some(path) = reference.strip_prefix("file:") {
            let path = path.trim();
            std::fs::read_to_string(path)
                .map(|s| s.trim().to_string())
                .map_err(|e| ConfigError::Load(format!("secret file '{path}': {e}")))
        } else {
            let var = reference.strip_prefix("env:").unwrap_or(reference).trim();
            std::env::var(var).map_err(|_| ConfigError::Unresolved(reference.trim().to_string()))
        }
    }
}

/// Replace every `${...}` placeholder in `value`.
///
/// Resolved text is not scanned again, so a secret containing `${` is kept
/// verbatim.
pub fn resolve_placeholders(value: &str, resolver: &dyn SecretResolver) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find("${") {
        let end = rest[start..]
            .find('}')
            .ok_or_else(|| ConfigError::Load(format!("unclosed placeholder in '{value}'")))?;
        out.push_str(&rest[..start]);
        out.push_str(&resolver.resolve(&rest[start + 2..start + end])?);
        rest = &rest[start + end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}
