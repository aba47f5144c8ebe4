//! Named checkpoints across participating systems.
//!
//! A checkpoint node in a journey asks every participating system for a
//! snapshot and stores the bundle under the checkpoint's name. The
//! resource graph and context are snapshotted directly; any extra
//! stateful collaborator joins branch isolation by implementing
//! [`Restorable`]. Stateless collaborators (a clock, say) need not.

use crate::context::ContextSnapshot;
use crate::graph::ResourceSnapshot;
use crate::result::{ViajarError, ViajarResult};
use std::sync::{Arc, Mutex};

/// Maximum sanitized checkpoint name length.
///
/// Matches the identifier limit of common relational backends.
pub const MAX_CHECKPOINT_NAME_LEN: usize = 63;

/// SQL keywords rejected as checkpoint names when a relational store
/// backs the state adapter.
const SQL_KEYWORDS: &[&str] = &[
    "select", "insert", "update", "delete", "drop", "create", "alter", "table", "from", "where",
    "join", "union", "grant", "revoke", "truncate", "exec", "execute",
];

/// Contract for stateful collaborators that participate in branch
/// isolation.
///
/// Implementations hold named save-points internally: `checkpoint`
/// captures state under a name, `rollback` restores it
/// non-destructively, and `release` discards it. A save-point may be
/// rolled back to any number of times before release.
pub trait Restorable: Send {
    /// System name, used in checkpoint bundles and logs.
    fn system_name(&self) -> &str;

    /// Capture current state under `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the capture fails or the name is invalid for
    /// the backing store.
    fn checkpoint(&mut self, name: &str) -> ViajarResult<()>;

    /// Restore the state captured under `name`, leaving the save-point
    /// in place.
    ///
    /// # Errors
    ///
    /// Returns `CheckpointNotFound` if no save-point exists under
    /// `name`.
    fn rollback(&mut self, name: &str) -> ViajarResult<()>;

    /// Discard the save-point stored under `name`.
    ///
    /// # Errors
    ///
    /// Returns `CheckpointNotFound` if no save-point exists under
    /// `name`.
    fn release(&mut self, name: &str) -> ViajarResult<()>;
}

/// The bundle a journey checkpoint stores: one snapshot per
/// participating core system.
///
/// Extra [`Restorable`] collaborators keep their save-points
/// internally, keyed by the same name; the bundle records only that
/// they participated.
#[derive(Debug, Clone)]
pub struct SystemCheckpoint {
    /// Checkpoint name as declared in the journey
    pub name: String,
    /// Resource graph snapshot
    pub graph: ResourceSnapshot,
    /// Context data snapshot
    pub context: ContextSnapshot,
    /// Names of extra collaborators that captured state for this
    /// checkpoint
    pub participants: Vec<String>,
}

impl SystemCheckpoint {
    /// Bundle snapshots under a checkpoint name.
    #[must_use]
    pub fn new(name: impl Into<String>, graph: ResourceSnapshot, context: ContextSnapshot) -> Self {
        Self {
            name: name.into(),
            graph,
            context,
            participants: Vec::new(),
        }
    }
}

/// A restorable collaborator that steps and the runner share.
///
/// Steps reach the inner system through the handle registered in the
/// context's client map; the runner holds the `SharedSystem` itself
/// for checkpoint/rollback. Both sides see the same state.
#[derive(Debug)]
pub struct SharedSystem<T: Restorable> {
    name: String,
    inner: Arc<Mutex<T>>,
}

impl<T: Restorable> SharedSystem<T> {
    /// Wrap a collaborator for sharing.
    pub fn new(inner: T) -> Self {
        let name = inner.system_name().to_string();
        Self {
            name,
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// A handle to the inner system, suitable for the context's client
    /// registry.
    #[must_use]
    pub fn share(&self) -> Arc<Mutex<T>> {
        Arc::clone(&self.inner)
    }

    fn lock(&self) -> ViajarResult<std::sync::MutexGuard<'_, T>> {
        self.inner.lock().map_err(|_| ViajarError::InvalidState {
            message: format!("{} lock poisoned", self.name),
        })
    }
}

impl<T: Restorable> Restorable for SharedSystem<T> {
    fn system_name(&self) -> &str {
        &self.name
    }

    fn checkpoint(&mut self, name: &str) -> ViajarResult<()> {
        self.lock()?.checkpoint(name)
    }

    fn rollback(&mut self, name: &str) -> ViajarResult<()> {
        self.lock()?.rollback(name)
    }

    fn release(&mut self, name: &str) -> ViajarResult<()> {
        self.lock()?.release(name)
    }
}

/// Validate a checkpoint name for a relational state backend.
///
/// Rules: ASCII alphanumerics and underscores only, must not start
/// with a digit, at most [`MAX_CHECKPOINT_NAME_LEN`] characters, and
/// not a bare SQL keyword (case-insensitive).
///
/// # Errors
///
/// Returns `InvalidCheckpointName` naming the violated rule.
pub fn validate_checkpoint_name(name: &str) -> ViajarResult<()> {
    let reject = |reason: &str| {
        Err(ViajarError::InvalidCheckpointName {
            name: name.to_string(),
            reason: reason.to_string(),
        })
    };

    if name.is_empty() {
        return reject("name is empty");
    }
    if name.len() > MAX_CHECKPOINT_NAME_LEN {
        return reject("name exceeds 63 characters");
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return reject("only alphanumerics and underscores allowed");
    }
    if name.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return reject("name must not start with a digit");
    }
    if SQL_KEYWORDS.contains(&name.to_ascii_lowercase().as_str()) {
        return reject("name is a SQL keyword");
    }
    Ok(())
}

/// Rewrite an arbitrary string into a valid checkpoint name.
///
/// Invalid characters become underscores, a leading digit gains an
/// underscore prefix, SQL keywords gain an underscore suffix, and the
/// result is truncated to the length cap. Idempotent: sanitizing a
/// sanitized name returns it unchanged.
#[must_use]
pub fn sanitize_checkpoint_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() {
        out.push('_');
    }
    if out.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    if SQL_KEYWORDS.contains(&out.to_ascii_lowercase().as_str()) {
        out.push('_');
    }
    out.truncate(MAX_CHECKPOINT_NAME_LEN);
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod validate_tests {
        use super::*;

        #[test]
        fn test_valid_names() {
            validate_checkpoint_name("logged_in").unwrap();
            validate_checkpoint_name("cp_2").unwrap();
            validate_checkpoint_name("A").unwrap();
        }

        #[test]
        fn test_invalid_characters() {
            assert!(validate_checkpoint_name("after login").is_err());
            assert!(validate_checkpoint_name("cp-1").is_err());
            assert!(validate_checkpoint_name("").is_err());
        }

        #[test]
        fn test_leading_digit() {
            assert!(validate_checkpoint_name("1st").is_err());
        }

        #[test]
        fn test_sql_keywords_rejected() {
            assert!(validate_checkpoint_name("select").is_err());
            assert!(validate_checkpoint_name("DROP").is_err());
            // Keyword as substring is fine
            validate_checkpoint_name("selected").unwrap();
        }

        #[test]
        fn test_length_cap() {
            let long = "a".repeat(MAX_CHECKPOINT_NAME_LEN + 1);
            assert!(validate_checkpoint_name(&long).is_err());
            validate_checkpoint_name(&"a".repeat(MAX_CHECKPOINT_NAME_LEN)).unwrap();
        }
    }

    mod sanitize_tests {
        use super::*;

        #[test]
        fn test_sanitize_produces_valid_names() {
            for raw in ["after login!", "1st", "drop", "", "cp-1", "árbol"] {
                let sanitized = sanitize_checkpoint_name(raw);
                validate_checkpoint_name(&sanitized).unwrap();
            }
        }

        #[test]
        fn test_sanitize_idempotent() {
            for raw in ["after login!", "1st", "drop", "already_fine"] {
                let once = sanitize_checkpoint_name(raw);
                assert_eq!(sanitize_checkpoint_name(&once), once);
            }
        }

        #[test]
        fn test_sanitize_examples() {
            assert_eq!(sanitize_checkpoint_name("after login"), "after_login");
            assert_eq!(sanitize_checkpoint_name("1st"), "_1st");
            assert_eq!(sanitize_checkpoint_name("drop"), "drop_");
        }
    }
}
