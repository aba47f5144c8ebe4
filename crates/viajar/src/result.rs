//! Result and error types for Viajar.

use thiserror::Error;

/// Result type for Viajar operations
pub type ViajarResult<T> = Result<T, ViajarError>;

/// Errors that can occur in Viajar
///
/// Schema/definition and journey-structural errors surface at
/// construction time and abort before any side effect. Graph invariant
/// violations are returned from `ResourceGraph` operations; the runner
/// converts them into recorded issues rather than letting them escape
/// a path.
#[derive(Debug, Error)]
pub enum ViajarError {
    /// Resource type is not declared in the schema
    #[error("Unknown resource type: {type_name}")]
    UnknownType {
        /// Type name that failed to resolve
        type_name: String,
    },

    /// Resource type declares a parent that does not exist in the schema
    #[error("Type {type_name} references unknown parent {parent}")]
    UnknownParent {
        /// Child type name
        type_name: String,
        /// Missing parent type name
        parent: String,
    },

    /// Parent chain loops back on itself
    #[error("Cyclic parent chain detected at type {type_name}")]
    CyclicParent {
        /// Type where the cycle was detected
        type_name: String,
    },

    /// Child-typed resource created without a parent id
    #[error("Resource type {type_name} requires a parent id")]
    MissingParent {
        /// Type that requires a parent
        type_name: String,
    },

    /// Parent id does not resolve to a live resource
    #[error("Parent {parent_type}/{parent_id} not found for new {type_name}")]
    ParentNotFound {
        /// Child type being created
        type_name: String,
        /// Expected parent type
        parent_type: String,
        /// Parent id that failed to resolve
        parent_id: String,
    },

    /// Root-typed resource was given a parent id
    #[error("Root type {type_name} must not receive a parent id")]
    UnexpectedParent {
        /// Root type name
        type_name: String,
    },

    /// A live resource with the same (type, id) already exists
    #[error("Duplicate resource: {type_name}/{id} is already live")]
    DuplicateResource {
        /// Resource type
        type_name: String,
        /// Resource id
        id: String,
    },

    /// Resource is absent or already destroyed
    #[error("Resource not found: {type_name}/{id}")]
    ResourceNotFound {
        /// Resource type
        type_name: String,
        /// Resource id
        id: String,
    },

    /// Dimension declares the same value twice
    #[error("Dimension {dimension} has duplicate value {value}")]
    DuplicateDimensionValue {
        /// Dimension name
        dimension: String,
        /// Repeated value
        value: String,
    },

    /// Two dimensions share a name within one space
    #[error("Duplicate dimension name: {dimension}")]
    DuplicateDimension {
        /// Repeated dimension name
        dimension: String,
    },

    /// Branch references a checkpoint that does not precede it
    #[error("Branch {branch} references unknown checkpoint {checkpoint}")]
    DanglingCheckpoint {
        /// Branch name
        branch: String,
        /// Unresolved checkpoint name
        checkpoint: String,
    },

    /// Journey structure is invalid for the requested operation
    #[error("Invalid journey: {message}")]
    InvalidJourney {
        /// Error message
        message: String,
    },

    /// Named checkpoint bundle is missing at rollback time
    #[error("Checkpoint not found: {name}")]
    CheckpointNotFound {
        /// Checkpoint name
        name: String,
    },

    /// Checkpoint name fails backend sanitization rules
    #[error("Invalid checkpoint name '{name}': {reason}")]
    InvalidCheckpointName {
        /// Rejected name
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// Step assertion failed
    #[error("Assertion failed: {message}")]
    AssertionFailed {
        /// Error message
        message: String,
    },

    /// A step action returned an error
    #[error("Step {step} failed: {message}")]
    StepFailed {
        /// Step name
        step: String,
        /// Error message
        message: String,
    },

    /// Operation exceeded its advisory timeout
    #[error("Operation timed out after {ms}ms")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
    },

    /// HTTP collaborator error
    #[error("HTTP client error: {message}")]
    HttpError {
        /// Error message
        message: String,
    },

    /// Port collaborator error
    #[error("Port {port} error: {message}")]
    PortError {
        /// Port name
        port: String,
        /// Error message
        message: String,
    },

    /// Invalid state error (operation called in wrong state)
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ViajarError {
    /// Check whether this error is a graph invariant violation.
    ///
    /// The runner records these as issues on the owning path instead of
    /// aborting the journey.
    #[must_use]
    pub const fn is_graph_violation(&self) -> bool {
        matches!(
            self,
            Self::UnknownType { .. }
                | Self::MissingParent { .. }
                | Self::ParentNotFound { .. }
                | Self::UnexpectedParent { .. }
                | Self::DuplicateResource { .. }
                | Self::ResourceNotFound { .. }
        )
    }

    /// Check whether this error aborts the run before execution starts.
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::UnknownParent { .. }
                | Self::CyclicParent { .. }
                | Self::DuplicateDimension { .. }
                | Self::DuplicateDimensionValue { .. }
                | Self::DanglingCheckpoint { .. }
                | Self::InvalidJourney { .. }
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ViajarError::DuplicateResource {
            type_name: "user".to_string(),
            id: "u1".to_string(),
        };
        assert_eq!(err.to_string(), "Duplicate resource: user/u1 is already live");
    }

    #[test]
    fn test_graph_violation_classification() {
        let err = ViajarError::MissingParent {
            type_name: "order".to_string(),
        };
        assert!(err.is_graph_violation());
        assert!(!err.is_structural());
    }

    #[test]
    fn test_structural_classification() {
        let err = ViajarError::DanglingCheckpoint {
            branch: "after_login".to_string(),
            checkpoint: "logged_in".to_string(),
        };
        assert!(err.is_structural());
        assert!(!err.is_graph_violation());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ViajarError = io.into();
        assert!(matches!(err, ViajarError::Io(_)));
    }
}
