//! Schema inference from a parsed API specification.
//!
//! Consumes the path map of an OpenAPI-style document (already parsed
//! into JSON) and derives a [`ResourceSchema`]: one resource type per
//! concrete path segment (singularized), the parent taken from the
//! nearest enclosing path parameter, and the id field found by
//! scanning component schemas. Inference is lenient: unresolvable
//! input yields an empty schema, never an error.

use crate::schema::{ResourceSchema, ResourceType};
use serde_json::Value;
use std::collections::BTreeMap;

/// Candidate id property names, scanned in priority order.
const ID_CANDIDATES: &[&str] = &["id", "uuid", "key"];

/// Infer a resource schema from a parsed API specification.
///
/// Expects `spec["paths"]` to be an object whose keys are URL
/// templates like `/users/{user_id}/orders`. Component schemas under
/// `spec["components"]["schemas"]` refine each type's `id_field`.
#[must_use]
pub fn infer_schema(spec: &Value) -> ResourceSchema {
    let Some(paths) = spec.get("paths").and_then(Value::as_object) else {
        return ResourceSchema::new();
    };

    // name -> (parent, path_param)
    let mut inferred: BTreeMap<String, (Option<String>, Option<String>)> = BTreeMap::new();

    for path in paths.keys() {
        collect_path_types(path, &mut inferred);
    }

    let mut types = Vec::with_capacity(inferred.len());
    for (name, (parent, path_param)) in &inferred {
        // A parent inferred from a malformed template may not exist as
        // a type; drop the link rather than fail validation.
        let parent = parent.clone().filter(|p| inferred.contains_key(p));
        let mut ty = ResourceType::new(name.clone()).with_id_field(infer_id_field(spec, name));
        if let Some(parent) = parent {
            ty = ty.with_parent(parent);
        }
        if let Some(param) = path_param {
            ty = ty.with_path_param(param.clone());
        }
        types.push(ty);
    }

    // Inferred hierarchies are acyclic by construction (parents come
    // from enclosing segments), so this only fails on pathological
    // input; fall back to an empty schema then.
    ResourceSchema::from_types(types).unwrap_or_default()
}

/// Walk one URL template, recording a type per concrete segment.
fn collect_path_types(
    path: &str,
    inferred: &mut BTreeMap<String, (Option<String>, Option<String>)>,
) {
    // Owner of the nearest enclosing path parameter seen so far.
    let mut enclosing: Option<String> = None;
    let mut last_type: Option<String> = None;

    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if let Some(param) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            if let Some(ty) = &last_type {
                if let Some(entry) = inferred.get_mut(ty) {
                    entry.1.get_or_insert_with(|| param.to_string());
                }
                enclosing = Some(ty.clone());
            }
            continue;
        }

        let name = singularize(segment);
        if name.is_empty() {
            continue;
        }
        let parent = enclosing.clone().filter(|p| p != &name);
        inferred.entry(name.clone()).or_insert((parent, None));
        last_type = Some(name);
    }
}

/// Naive English singularization, good enough for path segments.
fn singularize(segment: &str) -> String {
    let lower = segment.to_ascii_lowercase().replace('-', "_");
    if let Some(stem) = lower.strip_suffix("ies") {
        return format!("{stem}y");
    }
    if lower.ends_with("ss") || lower.ends_with("us") {
        return lower;
    }
    if let Some(stem) = lower.strip_suffix('s') {
        return stem.to_string();
    }
    lower
}

/// Scan component schemas for the id property of a type.
///
/// Looks for a schema named like the type (case-insensitive, singular
/// or plural) and picks `id`, `<type>_id`, `uuid`, or `key` in that
/// order. Falls back to `id`.
fn infer_id_field(spec: &Value, type_name: &str) -> String {
    let Some(schemas) = spec
        .get("components")
        .and_then(|c| c.get("schemas"))
        .and_then(Value::as_object)
    else {
        return "id".to_string();
    };

    let matches_type = |schema_name: &str| {
        let lower = schema_name.to_ascii_lowercase();
        lower == type_name || singularize(&lower) == type_name
    };

    for (schema_name, schema) in schemas {
        if !matches_type(schema_name) {
            continue;
        }
        let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
            continue;
        };
        if properties.contains_key("id") {
            return "id".to_string();
        }
        let typed_id = format!("{type_name}_id");
        if properties.contains_key(&typed_id) {
            return typed_id;
        }
        for candidate in ID_CANDIDATES {
            if properties.contains_key(*candidate) {
                return (*candidate).to_string();
            }
        }
    }
    "id".to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_infers_types_from_paths() {
        let spec = json!({
            "paths": {
                "/users": {},
                "/users/{user_id}": {},
                "/users/{user_id}/orders": {},
                "/products": {}
            }
        });
        let schema = infer_schema(&spec);
        assert!(schema.contains("user"));
        assert!(schema.contains("order"));
        assert!(schema.contains("product"));
        assert_eq!(schema.len(), 3);
    }

    #[test]
    fn test_parent_from_enclosing_parameter() {
        let spec = json!({
            "paths": {
                "/users/{user_id}/orders/{order_id}/items": {}
            }
        });
        let schema = infer_schema(&spec);
        assert_eq!(schema.get("order").unwrap().parent.as_deref(), Some("user"));
        assert_eq!(schema.get("item").unwrap().parent.as_deref(), Some("order"));
        assert!(schema.get("user").unwrap().parent.is_none());
    }

    #[test]
    fn test_path_param_recorded() {
        let spec = json!({
            "paths": { "/users/{user_id}": {} }
        });
        let schema = infer_schema(&spec);
        assert_eq!(
            schema.get("user").unwrap().path_param.as_deref(),
            Some("user_id")
        );
    }

    #[test]
    fn test_singularization() {
        assert_eq!(singularize("users"), "user");
        assert_eq!(singularize("companies"), "company");
        assert_eq!(singularize("status"), "status");
        assert_eq!(singularize("bonus"), "bonus");
        assert_eq!(singularize("access"), "access");
    }

    #[test]
    fn test_id_field_from_components() {
        let spec = json!({
            "paths": { "/orders": {} },
            "components": {
                "schemas": {
                    "Order": {
                        "properties": { "order_id": {"type": "string"} }
                    }
                }
            }
        });
        let schema = infer_schema(&spec);
        assert_eq!(schema.get("order").unwrap().id_field, "order_id");
    }

    #[test]
    fn test_id_field_uuid_fallback() {
        let spec = json!({
            "paths": { "/sessions": {} },
            "components": {
                "schemas": {
                    "Session": { "properties": { "uuid": {} } }
                }
            }
        });
        let schema = infer_schema(&spec);
        assert_eq!(schema.get("session").unwrap().id_field, "uuid");
    }

    #[test]
    fn test_unresolvable_input_yields_empty_schema() {
        assert!(infer_schema(&json!(null)).is_empty());
        assert!(infer_schema(&json!({"paths": 42})).is_empty());
        assert!(infer_schema(&json!({"openapi": "3.0"})).is_empty());
    }

    #[test]
    fn test_never_panics_on_arbitrary_shapes() {
        for spec in [
            json!({"paths": {"": {}}}),
            json!({"paths": {"/{just_a_param}": {}}}),
            json!({"paths": {"///": {}}}),
            json!({"paths": {"/users/{a}/{b}": {}}}),
        ] {
            let _ = infer_schema(&spec);
        }
    }
}
