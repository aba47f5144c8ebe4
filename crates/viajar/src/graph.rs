//! Runtime resource graph.
//!
//! Tracks every entity created during a run as an arena keyed by
//! `(type, id)`. Parent links are stored as keys into the same arena,
//! never as references, so snapshots are plain deep copies and cascade
//! traversal is a scan. The graph alone owns every resource's lifetime;
//! a parent link is a relation used for cascade destroy and
//! precondition checks, nothing more.
//!
//! # Example
//!
//! ```
//! use viajar::schema::{ResourceSchema, ResourceType};
//! use viajar::graph::ResourceGraph;
//!
//! let schema = ResourceSchema::from_types(vec![
//!     ResourceType::new("user"),
//!     ResourceType::new("order").with_parent("user"),
//! ]).unwrap();
//!
//! let mut graph = ResourceGraph::new(schema);
//! graph.create("user", "u1", None, None).unwrap();
//! graph.create("order", "o1", Some("u1"), None).unwrap();
//!
//! let snapshot = graph.checkpoint();
//! graph.destroy("user", "u1").unwrap(); // cascades to o1
//! assert!(!graph.exists("order", "o1"));
//!
//! graph.rollback(&snapshot);
//! assert!(graph.exists("order", "o1"));
//! ```

use crate::result::{ViajarError, ViajarResult};
use crate::schema::ResourceSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};

/// Arena key identifying one resource instance.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    /// Resource type name
    pub type_name: String,
    /// Resource instance id
    pub id: String,
}

impl ResourceKey {
    /// Create a key from type and id.
    #[must_use]
    pub fn new(type_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            id: id.into(),
        }
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.type_name, self.id)
    }
}

/// One tracked entity instance.
///
/// Identity is `(type, id)` only; `data` and `alive` never participate
/// in equality or hashing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    /// Resource type name
    pub type_name: String,
    /// Resource instance id
    pub id: String,
    /// Parent instance, if the type is a child type
    pub parent: Option<ResourceKey>,
    /// Mutable payload captured from API responses
    pub data: Value,
    /// Soft-delete flag; destroyed resources stay tracked
    pub alive: bool,
}

impl Resource {
    /// Arena key for this resource.
    #[must_use]
    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(&self.type_name, &self.id)
    }
}

impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name && self.id == other.id
    }
}

impl Eq for Resource {}

impl Hash for Resource {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_name.hash(state);
        self.id.hash(state);
    }
}

/// Independent deep copy of the graph's entire tracked set.
///
/// Includes dead resources, so a rollback can resurrect anything
/// destroyed after the checkpoint. Snapshots share nothing with the
/// live graph; mutating live resources never perturbs a stored
/// snapshot. A snapshot can be rolled back to any number of times.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    resources: BTreeMap<ResourceKey, Resource>,
}

impl ResourceSnapshot {
    /// Number of tracked resources (live and dead) in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Check if the snapshot tracks nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Runtime instance tracker with checkpoint/rollback.
///
/// Not internally synchronized: exactly one path owns a graph at a
/// time, and branch isolation comes from rollback, not locking.
#[derive(Debug, Clone)]
pub struct ResourceGraph {
    schema: ResourceSchema,
    resources: BTreeMap<ResourceKey, Resource>,
}

impl ResourceGraph {
    /// Create an empty graph over a schema.
    #[must_use]
    pub fn new(schema: ResourceSchema) -> Self {
        Self {
            schema,
            resources: BTreeMap::new(),
        }
    }

    /// The schema this graph enforces.
    #[must_use]
    pub const fn schema(&self) -> &ResourceSchema {
        &self.schema
    }

    /// Track a new resource instance.
    ///
    /// For child types the parent id is resolved against the parent
    /// type declared in the schema.
    ///
    /// # Errors
    ///
    /// - `UnknownType` if the type is absent from the schema
    /// - `MissingParent` if a child type is created without a parent id
    /// - `ParentNotFound` if the parent id is not a live instance
    /// - `UnexpectedParent` if a root type is given a parent id
    /// - `DuplicateResource` if `(type, id)` is already live
    pub fn create(
        &mut self,
        type_name: &str,
        id: &str,
        parent_id: Option<&str>,
        data: Option<Value>,
    ) -> ViajarResult<&Resource> {
        let ty = self
            .schema
            .get(type_name)
            .ok_or_else(|| ViajarError::UnknownType {
                type_name: type_name.to_string(),
            })?;

        let parent = match (&ty.parent, parent_id) {
            (Some(parent_type), Some(pid)) => {
                let key = ResourceKey::new(parent_type, pid);
                let live = self.resources.get(&key).is_some_and(|r| r.alive);
                if !live {
                    return Err(ViajarError::ParentNotFound {
                        type_name: type_name.to_string(),
                        parent_type: parent_type.clone(),
                        parent_id: pid.to_string(),
                    });
                }
                Some(key)
            }
            (Some(_), None) => {
                return Err(ViajarError::MissingParent {
                    type_name: type_name.to_string(),
                });
            }
            (None, Some(_)) => {
                return Err(ViajarError::UnexpectedParent {
                    type_name: type_name.to_string(),
                });
            }
            (None, None) => None,
        };

        let key = ResourceKey::new(type_name, id);
        if self.resources.get(&key).is_some_and(|r| r.alive) {
            return Err(ViajarError::DuplicateResource {
                type_name: type_name.to_string(),
                id: id.to_string(),
            });
        }

        tracing::debug!(resource = %key, "create");
        let resource = Resource {
            type_name: type_name.to_string(),
            id: id.to_string(),
            parent,
            data: data.unwrap_or(Value::Null),
            alive: true,
        };
        // Re-creating over a dead entry replaces it.
        self.resources.insert(key.clone(), resource);
        Ok(&self.resources[&key])
    }

    /// Destroy a resource and, depth-first, every live descendant.
    ///
    /// Order across same-level siblings is unspecified. Every reachable
    /// descendant is marked dead exactly once, before the target
    /// itself.
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if `(type, id)` is absent or already
    /// dead.
    pub fn destroy(&mut self, type_name: &str, id: &str) -> ViajarResult<()> {
        let key = ResourceKey::new(type_name, id);
        if !self.resources.get(&key).is_some_and(|r| r.alive) {
            return Err(ViajarError::ResourceNotFound {
                type_name: type_name.to_string(),
                id: id.to_string(),
            });
        }
        self.destroy_cascade(&key);
        Ok(())
    }

    fn destroy_cascade(&mut self, key: &ResourceKey) {
        let children: Vec<ResourceKey> = self
            .resources
            .values()
            .filter(|r| r.alive && r.parent.as_ref() == Some(key))
            .map(Resource::key)
            .collect();
        for child in &children {
            self.destroy_cascade(child);
        }
        if let Some(resource) = self.resources.get_mut(key) {
            tracing::debug!(resource = %key, "destroy");
            resource.alive = false;
        }
    }

    /// Look up a live resource.
    #[must_use]
    pub fn get(&self, type_name: &str, id: &str) -> Option<&Resource> {
        self.resources
            .get(&ResourceKey::new(type_name, id))
            .filter(|r| r.alive)
    }

    /// Mutable access to a live resource (e.g. to refresh `data`).
    #[must_use]
    pub fn get_mut(&mut self, type_name: &str, id: &str) -> Option<&mut Resource> {
        self.resources
            .get_mut(&ResourceKey::new(type_name, id))
            .filter(|r| r.alive)
    }

    /// Check whether a live resource exists.
    #[must_use]
    pub fn exists(&self, type_name: &str, id: &str) -> bool {
        self.get(type_name, id).is_some()
    }

    /// All live resources of one type.
    #[must_use]
    pub fn get_all(&self, type_name: &str) -> Vec<&Resource> {
        self.resources
            .values()
            .filter(|r| r.alive && r.type_name == type_name)
            .collect()
    }

    /// Live direct children of a resource.
    #[must_use]
    pub fn get_children(&self, type_name: &str, id: &str) -> Vec<&Resource> {
        let key = ResourceKey::new(type_name, id);
        self.resources
            .values()
            .filter(|r| r.alive && r.parent.as_ref() == Some(&key))
            .collect()
    }

    /// Every live resource, regardless of type.
    #[must_use]
    pub fn live_resources(&self) -> Vec<&Resource> {
        self.resources.values().filter(|r| r.alive).collect()
    }

    /// Count of live resources.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.resources.values().filter(|r| r.alive).count()
    }

    /// Count of all tracked resources, live or dead.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.resources.len()
    }

    /// Snapshot the entire tracked set, dead resources included.
    #[must_use]
    pub fn checkpoint(&self) -> ResourceSnapshot {
        ResourceSnapshot {
            resources: self.resources.clone(),
        }
    }

    /// Replace the entire tracked set with a snapshot's contents.
    ///
    /// A full restore, not a merge: resources created after the
    /// checkpoint vanish, resources destroyed after it come back. The
    /// snapshot is untouched and remains reusable.
    pub fn rollback(&mut self, snapshot: &ResourceSnapshot) {
        tracing::debug!(tracked = snapshot.len(), "rollback");
        self.resources = snapshot.resources.clone();
    }

    /// Check whether an action's type preconditions are satisfiable.
    ///
    /// True iff every required type has at least one live instance, or,
    /// when `bindings` pins a specific id for a type, that exact
    /// instance is live.
    #[must_use]
    pub fn can_execute(&self, requires: &[String], bindings: Option<&HashMap<String, String>>) -> bool {
        requires.iter().all(|type_name| {
            match bindings.and_then(|b| b.get(type_name)) {
                Some(id) => self.exists(type_name, id),
                None => self
                    .resources
                    .values()
                    .any(|r| r.alive && &r.type_name == type_name),
            }
        })
    }
}
