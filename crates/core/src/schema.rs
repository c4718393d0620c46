//! Integration definitions and the schema provider built from them.
//!
//! An integration describes one external system: the resource types it
//! exposes, the fields of each resource (with an optional declared data
//! type), which field each structural helper stands for, and optional
//! coercion pipelines. The registry keeps integrations in registration
//! order; every lookup that has to pick a winner scans in that order.

use crate::coerce::PipelineStep;
use crate::error::SchemaError;
use crate::vocab::{DataType, ResourceType, StructuralHelper};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Key holding the helper → field table of an integration.
pub const HELPER_MAPPINGS_KEY: &str = "_helper_mappings";
/// Key holding the data type → pipeline table of an integration.
pub const PIPELINES_KEY: &str = "_pipelines";
/// Key holding resource-level metadata inside a resource definition.
pub const METADATA_KEY: &str = "metadata";

pub type Metadata = serde_json::Map<String, serde_json::Value>;

// ──────────────────────────────────────────────
// Definitions
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldDefinition {
    /// Declared data type as written. Unknown names are kept here but never
    /// resolved.
    pub data_type: Option<String>,
    /// Every other key of the field definition (descriptions, upstream
    /// field names, ...).
    pub attributes: Metadata,
}

impl FieldDefinition {
    pub fn typed(data_type: DataType) -> Self {
        FieldDefinition {
            data_type: Some(data_type.as_str().to_owned()),
            attributes: Metadata::new(),
        }
    }

    pub fn declared_type(&self) -> Option<DataType> {
        self.data_type.as_deref().and_then(DataType::from_token)
    }

    fn from_json(path: &str, json: &serde_json::Value) -> Result<Self, SchemaError> {
        let obj = json
            .as_object()
            .ok_or_else(|| SchemaError::malformed(path, "field definition must be an object"))?;
        let mut field = FieldDefinition::default();
        for (key, value) in obj {
            if key == "data_type" {
                match value.as_str() {
                    Some(name) => {
                        if DataType::from_token(name).is_none() {
                            tracing::warn!(path, data_type = name, "unknown data type, ignored");
                        }
                        field.data_type = Some(name.to_owned());
                    }
                    None => {
                        tracing::warn!(path, "non-string data type, ignored");
                    }
                }
            } else {
                field.attributes.insert(key.clone(), value.clone());
            }
        }
        Ok(field)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResourceDefinition {
    pub metadata: Metadata,
    pub fields: BTreeMap<String, FieldDefinition>,
}

impl ResourceDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: impl Into<String>, field: FieldDefinition) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    fn from_json(path: &str, json: &serde_json::Value) -> Result<Self, SchemaError> {
        let obj = json
            .as_object()
            .ok_or_else(|| SchemaError::malformed(path, "resource definition must be an object"))?;
        let mut resource = ResourceDefinition::default();
        for (key, value) in obj {
            if key == METADATA_KEY {
                resource.metadata = value
                    .as_object()
                    .cloned()
                    .ok_or_else(|| SchemaError::malformed(path, "metadata must be an object"))?;
            } else if key.starts_with('_') {
                continue;
            } else {
                let field_path = format!("{}.{}", path, key);
                resource
                    .fields
                    .insert(key.clone(), FieldDefinition::from_json(&field_path, value)?);
            }
        }
        Ok(resource)
    }
}

/// The schema contributed by one external system.
#[derive(Debug, Clone, PartialEq)]
pub struct Integration {
    pub name: String,
    pub helper_mappings: BTreeMap<StructuralHelper, String>,
    pub pipelines: BTreeMap<DataType, Vec<PipelineStep>>,
    /// Resource definitions keyed by resource type name (e.g. `ISSUES`).
    pub resources: BTreeMap<String, ResourceDefinition>,
}

impl Integration {
    pub fn new(name: impl Into<String>) -> Self {
        Integration {
            name: name.into(),
            helper_mappings: BTreeMap::new(),
            pipelines: BTreeMap::new(),
            resources: BTreeMap::new(),
        }
    }

    pub fn with_helper(mut self, helper: StructuralHelper, field: impl Into<String>) -> Self {
        self.helper_mappings.insert(helper, field.into());
        self
    }

    pub fn with_pipeline(mut self, data_type: DataType, steps: Vec<PipelineStep>) -> Self {
        self.pipelines.insert(data_type, steps);
        self
    }

    pub fn with_resource(mut self, name: impl Into<String>, resource: ResourceDefinition) -> Self {
        self.resources.insert(name.into(), resource);
        self
    }

    pub fn resource(&self, resource: &ResourceType) -> Option<&ResourceDefinition> {
        self.resources.get(resource.as_str())
    }

    /// Read one integration definition. Unknown helper names, data types and
    /// pipeline steps are skipped with a warning; structural problems are
    /// errors.
    pub fn from_json(name: &str, json: &serde_json::Value) -> Result<Self, SchemaError> {
        let obj = json
            .as_object()
            .ok_or_else(|| SchemaError::malformed(name, "integration definition must be an object"))?;
        let mut integration = Integration::new(name);

        for (key, value) in obj {
            let path = format!("{}.{}", name, key);
            match key.as_str() {
                HELPER_MAPPINGS_KEY => {
                    let table = value
                        .as_object()
                        .ok_or_else(|| SchemaError::malformed(&path, "must be an object"))?;
                    for (helper_name, field) in table {
                        let field = field.as_str().ok_or_else(|| {
                            SchemaError::malformed(
                                format!("{}.{}", path, helper_name),
                                "helper field must be a string",
                            )
                        })?;
                        match StructuralHelper::from_token(helper_name) {
                            Some(helper) => {
                                integration.helper_mappings.insert(helper, field.to_owned());
                            }
                            None => {
                                tracing::warn!(integration = name, helper = %helper_name, "unknown structural helper, skipped");
                            }
                        }
                    }
                }
                PIPELINES_KEY => {
                    let table = value
                        .as_object()
                        .ok_or_else(|| SchemaError::malformed(&path, "must be an object"))?;
                    for (type_name, steps) in table {
                        let Some(data_type) = DataType::from_token(type_name) else {
                            tracing::warn!(integration = name, data_type = %type_name, "pipeline for unknown data type, skipped");
                            continue;
                        };
                        let steps = steps.as_array().ok_or_else(|| {
                            SchemaError::malformed(
                                format!("{}.{}", path, type_name),
                                "pipeline must be a list of steps",
                            )
                        })?;
                        let parsed = steps
                            .iter()
                            .filter_map(|step| {
                                let parsed = PipelineStep::from_json(step);
                                if parsed.is_none() {
                                    tracing::warn!(integration = name, %data_type, %step, "unknown pipeline step, skipped");
                                }
                                parsed
                            })
                            .collect();
                        integration.pipelines.insert(data_type, parsed);
                    }
                }
                other if other.starts_with('_') => {
                    tracing::debug!(integration = name, key = other, "ignoring reserved key");
                }
                resource => {
                    integration
                        .resources
                        .insert(resource.to_owned(), ResourceDefinition::from_json(&path, value)?);
                }
            }
        }
        Ok(integration)
    }
}

// ──────────────────────────────────────────────
// Registry
// ──────────────────────────────────────────────

/// Every integration known to a parser, in registration order.
///
/// Build it once and hand it (or a provider built from it) to each parser;
/// it is never mutated while parses run. To change definitions, build a new
/// registry and swap it in.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IntegrationRegistry {
    integrations: Vec<Integration>,
}

impl IntegrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, integration: Integration) -> Result<(), SchemaError> {
        if self.get(&integration.name).is_some() {
            return Err(SchemaError::DuplicateIntegration(integration.name));
        }
        self.integrations.push(integration);
        Ok(())
    }

    /// Builder-style `register`.
    pub fn with(mut self, integration: Integration) -> Result<Self, SchemaError> {
        self.register(integration)?;
        Ok(self)
    }

    /// Read a `{ integration_name: definition, ... }` document. Integrations
    /// are registered in document order.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, SchemaError> {
        let mut registry = IntegrationRegistry::new();
        registry.extend_from_json(json)?;
        Ok(registry)
    }

    /// Register every integration of another definitions document after the
    /// ones already present.
    pub fn extend_from_json(&mut self, json: &serde_json::Value) -> Result<(), SchemaError> {
        let obj = json.as_object().ok_or_else(|| {
            SchemaError::malformed("<root>", "definitions must map integration names to definitions")
        })?;
        for (name, definition) in obj {
            self.register(Integration::from_json(name, definition)?)?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Integration> {
        self.integrations.iter().find(|i| i.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Integration> {
        self.integrations.iter()
    }

    pub fn len(&self) -> usize {
        self.integrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.integrations.is_empty()
    }
}

// ──────────────────────────────────────────────
// Provider
// ──────────────────────────────────────────────

/// Field and type resolution consulted by the interpreter.
///
/// Implementations must be read-only: the same provider serves concurrent
/// parses.
pub trait SchemaProvider {
    /// Resolve the field a condition talks about. Mapping the result again
    /// with WITH must give it back unchanged.
    fn map_field(&self, helper: StructuralHelper, token: &str) -> String;

    /// Field a helper stands for when the statement names none
    /// (`TAGGED = urgent`).
    fn default_field(&self, helper: StructuralHelper) -> Option<String>;

    /// Declared data type of `field` on `resource`, if any integration
    /// declares one.
    fn field_type(&self, field: &str, resource: &ResourceType) -> Option<DataType>;

    /// Merged metadata of `resource`.
    fn resource_metadata(&self, resource: &ResourceType) -> Metadata;

    /// Recognise a resource type token.
    fn resolve_resource(&self, token: &str) -> Option<ResourceType> {
        ResourceType::from_token(token)
    }

    /// Every field declared for `resource`.
    fn resource_fields(&self, _resource: &ResourceType) -> BTreeMap<String, FieldDefinition> {
        BTreeMap::new()
    }
}

impl<P: SchemaProvider + ?Sized> SchemaProvider for Arc<P> {
    fn map_field(&self, helper: StructuralHelper, token: &str) -> String {
        (**self).map_field(helper, token)
    }

    fn default_field(&self, helper: StructuralHelper) -> Option<String> {
        (**self).default_field(helper)
    }

    fn field_type(&self, field: &str, resource: &ResourceType) -> Option<DataType> {
        (**self).field_type(field, resource)
    }

    fn resource_metadata(&self, resource: &ResourceType) -> Metadata {
        (**self).resource_metadata(resource)
    }

    fn resolve_resource(&self, token: &str) -> Option<ResourceType> {
        (**self).resolve_resource(token)
    }

    fn resource_fields(&self, resource: &ResourceType) -> BTreeMap<String, FieldDefinition> {
        (**self).resource_fields(resource)
    }
}

/// Schema provider backed by an [`IntegrationRegistry`].
#[derive(Debug, Clone, Default)]
pub struct IntegrationSchemaProvider {
    registry: IntegrationRegistry,
    /// helper → (integration, field), in registration order.
    helper_table: HashMap<StructuralHelper, Vec<(String, String)>>,
    /// Lower-cased field name → declared spelling. First declaration wins.
    field_spellings: HashMap<String, String>,
}

impl IntegrationSchemaProvider {
    pub fn new(registry: IntegrationRegistry) -> Self {
        let mut helper_table: HashMap<StructuralHelper, Vec<(String, String)>> = HashMap::new();
        let mut field_spellings: HashMap<String, String> = HashMap::new();
        for integration in registry.iter() {
            for (helper, field) in &integration.helper_mappings {
                helper_table
                    .entry(*helper)
                    .or_default()
                    .push((integration.name.clone(), field.clone()));
            }
            let declared = integration
                .helper_mappings
                .values()
                .chain(integration.resources.values().flat_map(|r| r.fields.keys()));
            for field in declared {
                field_spellings
                    .entry(field.to_lowercase())
                    .or_insert_with(|| field.clone());
            }
        }
        IntegrationSchemaProvider {
            registry,
            helper_table,
            field_spellings,
        }
    }

    /// Declared spelling of a field token, matched case-insensitively;
    /// undeclared names are lower-cased.
    fn spell_field(&self, token: &str) -> String {
        let lowered = token.to_lowercase();
        match self.field_spellings.get(&lowered) {
            Some(declared) => declared.clone(),
            None => lowered,
        }
    }

    pub fn registry(&self) -> &IntegrationRegistry {
        &self.registry
    }

    fn resources<'a>(
        &'a self,
        resource: &'a ResourceType,
    ) -> impl Iterator<Item = &'a ResourceDefinition> + 'a {
        self.registry.iter().filter_map(move |i| i.resource(resource))
    }
}

impl SchemaProvider for IntegrationSchemaProvider {
    fn map_field(&self, helper: StructuralHelper, token: &str) -> String {
        if helper == StructuralHelper::With {
            return self.spell_field(token);
        }
        self.default_field(helper)
            .unwrap_or_else(|| self.spell_field(token))
    }

    fn default_field(&self, helper: StructuralHelper) -> Option<String> {
        if helper == StructuralHelper::With {
            return None;
        }
        self.helper_table
            .get(&helper)
            .and_then(|entries| entries.first())
            .map(|(_, field)| field.clone())
    }

    fn field_type(&self, field: &str, resource: &ResourceType) -> Option<DataType> {
        self.resources(resource)
            .filter_map(|r| r.fields.get(field))
            .find_map(FieldDefinition::declared_type)
    }

    fn resource_metadata(&self, resource: &ResourceType) -> Metadata {
        let mut merged = Metadata::new();
        for r in self.resources(resource) {
            for (key, value) in &r.metadata {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged
    }

    fn resolve_resource(&self, token: &str) -> Option<ResourceType> {
        ResourceType::from_token(token).or_else(|| {
            self.registry
                .iter()
                .any(|i| i.resources.contains_key(token))
                .then(|| ResourceType::Custom(token.to_owned()))
        })
    }

    fn resource_fields(&self, resource: &ResourceType) -> BTreeMap<String, FieldDefinition> {
        let mut fields = BTreeMap::new();
        for r in self.resources(resource) {
            for (name, field) in &r.fields {
                fields.insert(name.clone(), field.clone());
            }
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn two_integrations() -> IntegrationRegistry {
        IntegrationRegistry::from_json(&json!({
            "tracker": {
                "_helper_mappings": { "TAGGED": "labels", "NAMED": "title", "BOGUS": "x" },
                "ISSUES": {
                    "metadata": { "api_name": "Tracker", "api_version": "v1" },
                    "priority": { "data_type": "NUMBER" },
                    "status": { "data_type": "STRING", "description": "workflow state" },
                    "estimate": { "data_type": "FANCY" }
                }
            },
            "mirror": {
                "_helper_mappings": { "TAGGED": "tags", "FROM": "team" },
                "ISSUES": {
                    "metadata": { "api_version": "v2", "region": "eu" },
                    "priority": { "data_type": "STRING" },
                    "estimate": { "data_type": "NUMBER" }
                },
                "INVOICES": { "amount": { "data_type": "NUMBER" } }
            }
        }))
        .unwrap()
    }

    #[test]
    fn registry_keeps_document_order() {
        let registry = two_integrations();
        let names: Vec<&str> = registry.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["tracker", "mirror"]);
    }

    #[test]
    fn unknown_helpers_are_skipped() {
        let registry = two_integrations();
        let tracker = registry.get("tracker").unwrap();
        assert_eq!(tracker.helper_mappings.len(), 2);
    }

    #[test]
    fn duplicate_integration_is_rejected() {
        let mut registry = IntegrationRegistry::new();
        registry.register(Integration::new("a")).unwrap();
        assert!(matches!(
            registry.register(Integration::new("a")),
            Err(SchemaError::DuplicateIntegration(name)) if name == "a"
        ));
    }

    #[test]
    fn malformed_definitions_are_errors() {
        assert!(IntegrationRegistry::from_json(&json!([1, 2])).is_err());
        assert!(IntegrationRegistry::from_json(&json!({ "x": { "ISSUES": 3 } })).is_err());
        assert!(IntegrationRegistry::from_json(&json!({
            "x": { "ISSUES": { "metadata": "nope" } }
        }))
        .is_err());
    }

    #[test]
    fn with_helper_lowercases_token() {
        let provider = IntegrationSchemaProvider::new(two_integrations());
        assert_eq!(provider.map_field(StructuralHelper::With, "PRIORITY"), "priority");
        assert_eq!(provider.default_field(StructuralHelper::With), None);
    }

    #[test]
    fn with_keeps_declared_spelling() {
        let registry = IntegrationRegistry::from_json(&json!({
            "tracker": {
                "_helper_mappings": { "TAGGED": "labelIds" },
                "ISSUES": {
                    "dueDate": { "data_type": "DATETIME" },
                    "labelIds": { "data_type": "TAGS" }
                }
            },
            "mirror": {
                "ISSUES": { "DueDate": { "data_type": "STRING" } }
            }
        }))
        .unwrap();
        let provider = IntegrationSchemaProvider::new(registry);
        assert_eq!(provider.map_field(StructuralHelper::With, "LABELIDS"), "labelIds");
        assert_eq!(provider.map_field(StructuralHelper::With, "labelIds"), "labelIds");
        assert_eq!(provider.map_field(StructuralHelper::With, "DUEDATE"), "dueDate");
        assert_eq!(provider.map_field(StructuralHelper::With, "Priority"), "priority");
        // Unmapped helpers resolve their token the same way.
        assert_eq!(provider.map_field(StructuralHelper::From, "duedate"), "dueDate");
        assert_eq!(
            provider.field_type("dueDate", &ResourceType::Issues),
            Some(DataType::DateTime)
        );
    }

    #[test]
    fn first_registered_helper_mapping_wins() {
        let provider = IntegrationSchemaProvider::new(two_integrations());
        assert_eq!(provider.map_field(StructuralHelper::Tagged, "whatever"), "labels");
        assert_eq!(provider.map_field(StructuralHelper::From, "x"), "team");
        // No integration maps ASSIGNED_TO.
        assert_eq!(provider.map_field(StructuralHelper::AssignedTo, "Owner"), "owner");
        assert_eq!(provider.default_field(StructuralHelper::AssignedTo), None);
    }

    #[test]
    fn field_type_scans_in_order_and_skips_unknown_types() {
        let provider = IntegrationSchemaProvider::new(two_integrations());
        let issues = ResourceType::Issues;
        assert_eq!(provider.field_type("priority", &issues), Some(DataType::Number));
        assert_eq!(provider.field_type("status", &issues), Some(DataType::String));
        assert_eq!(provider.field_type("estimate", &issues), Some(DataType::Number));
        assert_eq!(provider.field_type("missing", &issues), None);
        assert_eq!(provider.field_type("priority", &ResourceType::Teams), None);
    }

    #[test]
    fn metadata_later_integrations_overwrite() {
        let provider = IntegrationSchemaProvider::new(two_integrations());
        let meta = provider.resource_metadata(&ResourceType::Issues);
        assert_eq!(meta["api_name"], "Tracker");
        assert_eq!(meta["api_version"], "v2");
        assert_eq!(meta["region"], "eu");
        assert!(provider.resource_metadata(&ResourceType::Teams).is_empty());
    }

    #[test]
    fn resolves_integration_resources() {
        let provider = IntegrationSchemaProvider::new(two_integrations());
        assert_eq!(provider.resolve_resource("ISSUES"), Some(ResourceType::Issues));
        assert_eq!(
            provider.resolve_resource("INVOICES"),
            Some(ResourceType::Custom("INVOICES".into()))
        );
        assert_eq!(provider.resolve_resource("WIDGETS"), None);
    }

    #[test]
    fn resource_fields_are_merged() {
        let provider = IntegrationSchemaProvider::new(two_integrations());
        let fields = provider.resource_fields(&ResourceType::Issues);
        let names: Vec<&str> = fields.keys().map(String::as_str).collect();
        assert_eq!(names, ["estimate", "priority", "status"]);
        assert_eq!(fields["priority"].declared_type(), Some(DataType::String));
        assert_eq!(
            fields["status"].attributes.get("description"),
            Some(&json!("workflow state"))
        );
    }

    #[test]
    fn builder_api_matches_json() {
        let built = IntegrationRegistry::new()
            .with(
                Integration::new("tracker")
                    .with_helper(StructuralHelper::Tagged, "labels")
                    .with_resource(
                        "ISSUES",
                        ResourceDefinition::new()
                            .with_field("priority", FieldDefinition::typed(DataType::Number))
                            .with_metadata("api_name", json!("Tracker")),
                    ),
            )
            .unwrap();
        let parsed = IntegrationRegistry::from_json(&json!({
            "tracker": {
                "_helper_mappings": { "TAGGED": "labels" },
                "ISSUES": {
                    "metadata": { "api_name": "Tracker" },
                    "priority": { "data_type": "NUMBER" }
                }
            }
        }))
        .unwrap();
        assert_eq!(built, parsed);
    }
}
