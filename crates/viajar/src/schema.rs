//! Resource type schema.
//!
//! A schema declares the static type hierarchy of the application under
//! test: which resource types exist, which type (if any) owns each one,
//! and how instances are identified. The runtime graph in
//! [`crate::graph`] enforces this hierarchy on live instances.

use crate::result::{ViajarError, ViajarResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A declared resource type.
///
/// # Example
///
/// ```
/// use viajar::schema::ResourceType;
///
/// let project = ResourceType::new("project");
/// let task = ResourceType::new("task")
///     .with_parent("project")
///     .with_id_field("task_id");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceType {
    /// Type name (e.g. "user", "order")
    pub name: String,
    /// Owning parent type, if this is not a root type
    pub parent: Option<String>,
    /// Field in API payloads holding the instance id
    pub id_field: String,
    /// Path parameter naming instances of this type in URLs
    pub path_param: Option<String>,
}

impl ResourceType {
    /// Create a root resource type with the default `id` field.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            id_field: "id".to_string(),
            path_param: None,
        }
    }

    /// Set the parent type name.
    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Set the id field name.
    #[must_use]
    pub fn with_id_field(mut self, id_field: impl Into<String>) -> Self {
        self.id_field = id_field.into();
        self
    }

    /// Set the URL path parameter name.
    #[must_use]
    pub fn with_path_param(mut self, path_param: impl Into<String>) -> Self {
        self.path_param = Some(path_param.into());
        self
    }

    /// Check if this is a root type (no parent).
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// The full type hierarchy for a run.
///
/// Validated at construction: every declared parent must name a type in
/// the same schema, and parent chains must terminate. All derived
/// queries (`ancestors`, `descendants`, `children`, `roots`) walk
/// parent pointers with a cycle guard so a malformed schema can never
/// send them into an infinite loop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSchema {
    types: BTreeMap<String, ResourceType>,
}

impl ResourceSchema {
    /// Create an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a schema from a list of types, validating the hierarchy.
    ///
    /// # Errors
    ///
    /// Returns `UnknownParent` if a type references a parent absent from
    /// the list, or `CyclicParent` if any parent chain loops.
    pub fn from_types(types: Vec<ResourceType>) -> ViajarResult<Self> {
        let mut schema = Self::new();
        for ty in types {
            schema.types.insert(ty.name.clone(), ty);
        }
        schema.validate()?;
        Ok(schema)
    }

    /// Add a type to the schema, revalidating the hierarchy.
    ///
    /// # Errors
    ///
    /// Returns `UnknownParent` or `CyclicParent` if the addition breaks
    /// the hierarchy. The schema is left unchanged on error.
    pub fn add_type(&mut self, ty: ResourceType) -> ViajarResult<()> {
        let previous = self.types.insert(ty.name.clone(), ty.clone());
        if let Err(e) = self.validate() {
            match previous {
                Some(prev) => {
                    self.types.insert(ty.name.clone(), prev);
                }
                None => {
                    self.types.remove(&ty.name);
                }
            }
            return Err(e);
        }
        Ok(())
    }

    fn validate(&self) -> ViajarResult<()> {
        for ty in self.types.values() {
            if let Some(parent) = &ty.parent {
                if !self.types.contains_key(parent) {
                    return Err(ViajarError::UnknownParent {
                        type_name: ty.name.clone(),
                        parent: parent.clone(),
                    });
                }
            }
            // Walk the parent chain; more hops than types means a loop.
            let mut current = ty;
            let mut hops = 0usize;
            while let Some(parent) = &current.parent {
                hops += 1;
                if hops > self.types.len() {
                    return Err(ViajarError::CyclicParent {
                        type_name: ty.name.clone(),
                    });
                }
                match self.types.get(parent) {
                    Some(next) => current = next,
                    None => break,
                }
            }
        }
        Ok(())
    }

    /// Look up a type by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ResourceType> {
        self.types.get(name)
    }

    /// Check if a type is declared.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Number of declared types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check if the schema is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Iterate over all declared types in name order.
    pub fn types(&self) -> impl Iterator<Item = &ResourceType> {
        self.types.values()
    }

    /// Names of all root types (no parent), in name order.
    #[must_use]
    pub fn roots(&self) -> Vec<&str> {
        self.types
            .values()
            .filter(|t| t.is_root())
            .map(|t| t.name.as_str())
            .collect()
    }

    /// Direct children of a type, in name order.
    #[must_use]
    pub fn children(&self, name: &str) -> Vec<&str> {
        self.types
            .values()
            .filter(|t| t.parent.as_deref() == Some(name))
            .map(|t| t.name.as_str())
            .collect()
    }

    /// Ancestor chain of a type, nearest first.
    ///
    /// Returns an empty list for root or unknown types. The walk is
    /// cycle-guarded and stops after visiting every type once.
    #[must_use]
    pub fn ancestors(&self, name: &str) -> Vec<&str> {
        let mut out = Vec::new();
        let mut current = self.types.get(name);
        while let Some(ty) = current {
            let Some(parent) = &ty.parent else { break };
            if out.contains(&parent.as_str()) || out.len() >= self.types.len() {
                break;
            }
            out.push(parent.as_str());
            current = self.types.get(parent);
        }
        out
    }

    /// All transitive descendants of a type, in discovery order.
    #[must_use]
    pub fn descendants(&self, name: &str) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        let mut frontier = self.children(name);
        while let Some(next) = frontier.pop() {
            if out.contains(&next) {
                continue;
            }
            out.push(next);
            frontier.extend(self.children(next));
        }
        out
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn shop_schema() -> ResourceSchema {
        ResourceSchema::from_types(vec![
            ResourceType::new("user"),
            ResourceType::new("order").with_parent("user"),
            ResourceType::new("line_item")
                .with_parent("order")
                .with_id_field("line_item_id"),
            ResourceType::new("product"),
        ])
        .unwrap()
    }

    mod type_tests {
        use super::*;

        #[test]
        fn test_root_type_defaults() {
            let ty = ResourceType::new("user");
            assert!(ty.is_root());
            assert_eq!(ty.id_field, "id");
            assert!(ty.path_param.is_none());
        }

        #[test]
        fn test_builder_chain() {
            let ty = ResourceType::new("order")
                .with_parent("user")
                .with_id_field("order_id")
                .with_path_param("order_id");
            assert_eq!(ty.parent.as_deref(), Some("user"));
            assert_eq!(ty.id_field, "order_id");
            assert!(!ty.is_root());
        }
    }

    mod schema_tests {
        use super::*;

        #[test]
        fn test_unknown_parent_rejected() {
            let err = ResourceSchema::from_types(vec![
                ResourceType::new("order").with_parent("user"),
            ])
            .unwrap_err();
            assert!(matches!(err, ViajarError::UnknownParent { .. }));
        }

        #[test]
        fn test_cyclic_parent_rejected() {
            let err = ResourceSchema::from_types(vec![
                ResourceType::new("a").with_parent("b"),
                ResourceType::new("b").with_parent("a"),
            ])
            .unwrap_err();
            assert!(matches!(err, ViajarError::CyclicParent { .. }));
        }

        #[test]
        fn test_self_parent_rejected() {
            let err = ResourceSchema::from_types(vec![ResourceType::new("a").with_parent("a")])
                .unwrap_err();
            assert!(matches!(err, ViajarError::CyclicParent { .. }));
        }

        #[test]
        fn test_add_type_rolls_back_on_error() {
            let mut schema = shop_schema();
            let before = schema.clone();
            let err = schema
                .add_type(ResourceType::new("review").with_parent("nonexistent"))
                .unwrap_err();
            assert!(matches!(err, ViajarError::UnknownParent { .. }));
            assert_eq!(schema, before);
        }

        #[test]
        fn test_roots() {
            let schema = shop_schema();
            assert_eq!(schema.roots(), vec!["product", "user"]);
        }

        #[test]
        fn test_children() {
            let schema = shop_schema();
            assert_eq!(schema.children("user"), vec!["order"]);
            assert_eq!(schema.children("order"), vec!["line_item"]);
            assert!(schema.children("product").is_empty());
        }

        #[test]
        fn test_ancestors_nearest_first() {
            let schema = shop_schema();
            assert_eq!(schema.ancestors("line_item"), vec!["order", "user"]);
            assert!(schema.ancestors("user").is_empty());
            assert!(schema.ancestors("ghost").is_empty());
        }

        #[test]
        fn test_descendants() {
            let schema = shop_schema();
            let mut desc = schema.descendants("user");
            desc.sort_unstable();
            assert_eq!(desc, vec!["line_item", "order"]);
        }
    }
}
