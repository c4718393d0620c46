//! Loading integration definition files given with `--integrations`.

use permit_core::IntegrationRegistry;
use std::path::Path;

/// Read one definitions document. `.toml` files are read as TOML, anything
/// else as JSON; both carry the same shape.
pub(crate) fn read_definitions(path: &Path) -> Result<serde_json::Value, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("error reading file '{}': {}", path.display(), e))?;
    let is_toml = path.extension().is_some_and(|ext| ext == "toml");
    if is_toml {
        toml::from_str(&content)
            .map_err(|e| format!("error parsing TOML in '{}': {}", path.display(), e))
    } else {
        serde_json::from_str(&content)
            .map_err(|e| format!("error parsing JSON in '{}': {}", path.display(), e))
    }
}

/// Build a registry from the given files, registering integrations in
/// argument order.
pub(crate) fn load_registry(paths: &[impl AsRef<Path>]) -> Result<IntegrationRegistry, String> {
    let mut registry = IntegrationRegistry::new();
    for path in paths {
        let path = path.as_ref();
        let definitions = read_definitions(path)?;
        registry
            .extend_from_json(&definitions)
            .map_err(|e| format!("invalid integration definitions in '{}': {}", path.display(), e))?;
        tracing::debug!(file = %path.display(), integrations = registry.len(), "loaded integration definitions");
    }
    Ok(registry)
}
