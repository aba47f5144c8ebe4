//! Journey model.
//!
//! A journey is an ordered list of nodes: steps that act on the system
//! under test, checkpoints that snapshot every participating system,
//! and branches that explore alternative continuations from a named
//! checkpoint. Structure is validated when the journey is built, so a
//! branch referencing a checkpoint that does not precede it fails
//! before anything runs.
//!
//! # Example
//!
//! ```
//! use viajar::journey::Journey;
//! use serde_json::json;
//!
//! let journey = Journey::builder("signup_flow")
//!     .step("create user", |ctx| {
//!         ctx.graph.create("user", "u1", None, None)?;
//!         Ok(())
//!     })
//!     .checkpoint("user_created")
//!     .branch("what next", "user_created", |b| {
//!         b.path("delete account", |p| {
//!             p.step("destroy", |ctx| ctx.graph.destroy("user", "u1"))
//!         })
//!         .path("update profile", |p| {
//!             p.step("set name", |ctx| {
//!                 ctx.context.set("name", json!("Ada"));
//!                 Ok(())
//!             })
//!         })
//!     })
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(journey.nodes().len(), 3);
//! ```

use crate::context::Context;
use crate::graph::ResourceGraph;
use crate::result::{ViajarError, ViajarResult};
use std::sync::Arc;
use std::time::Duration;

/// Default delay between step retry attempts.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 250;

/// What a step sees when it executes: the resource graph and the
/// shared context of the path that owns it.
#[derive(Debug)]
pub struct StepContext<'a> {
    /// Resource graph owned by the executing path
    pub graph: &'a mut ResourceGraph,
    /// Shared key/value context owned by the executing path
    pub context: &'a mut Context,
}

/// Boxed step action.
pub type StepFn = Arc<dyn Fn(&mut StepContext<'_>) -> ViajarResult<()> + Send + Sync>;

/// One executable step in a journey or path.
#[derive(Clone)]
pub struct Step {
    /// Step name, used in reports and issues
    pub name: String,
    /// The action to run
    pub run: StepFn,
    /// Invert pass/fail interpretation: the step passes only if the
    /// action fails
    pub expect_failure: bool,
    /// Retry attempts after the first failure
    pub retries: u32,
    /// Delay between retry attempts
    pub retry_delay: Duration,
    /// Advisory timeout; exceeding it records a failure, it does not
    /// kill the step
    pub timeout: Option<Duration>,
}

impl Step {
    /// Create a step from a name and action.
    pub fn new(
        name: impl Into<String>,
        run: impl Fn(&mut StepContext<'_>) -> ViajarResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            run: Arc::new(run),
            expect_failure: false,
            retries: 0,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            timeout: None,
        }
    }

    /// Mark the step as expected to fail.
    #[must_use]
    pub const fn expect_failure(mut self) -> Self {
        self.expect_failure = true;
        self
    }

    /// Set the retry count.
    #[must_use]
    pub const fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Set the delay between retries.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set the advisory timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("expect_failure", &self.expect_failure)
            .field("retries", &self.retries)
            .finish_non_exhaustive()
    }
}

/// One alternative continuation under a branch.
#[derive(Debug, Clone, Default)]
pub struct Path {
    /// Path name, used in reports
    pub name: String,
    /// Ordered steps run from the branch's restored checkpoint
    pub steps: Vec<Step>,
}

impl Path {
    /// Create an empty path.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Append a step built from a name and action.
    #[must_use]
    pub fn step(
        mut self,
        name: impl Into<String>,
        run: impl Fn(&mut StepContext<'_>) -> ViajarResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.steps.push(Step::new(name, run));
        self
    }

    /// Append a pre-built step.
    #[must_use]
    pub fn add_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }
}

/// A fork point: explores every path from the named checkpoint.
#[derive(Debug, Clone)]
pub struct Branch {
    /// Branch name, used in reports
    pub name: String,
    /// Name of the checkpoint to roll back to before each path
    pub checkpoint: String,
    /// Alternative continuations, each isolated from the others
    pub paths: Vec<Path>,
}

/// One node in a journey's ordered node list.
#[derive(Debug, Clone)]
pub enum JourneyNode {
    /// Execute a step against the shared context
    Step(Step),
    /// Snapshot every participating system under this name
    Checkpoint(String),
    /// Explore alternative paths from a prior checkpoint
    Branch(Branch),
}

/// A validated journey, ready to run.
#[derive(Debug, Clone)]
pub struct Journey {
    name: String,
    nodes: Vec<JourneyNode>,
}

impl Journey {
    /// Start building a journey.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> JourneyBuilder {
        JourneyBuilder {
            name: name.into(),
            nodes: Vec::new(),
        }
    }

    /// Journey name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The validated node list, in execution order.
    #[must_use]
    pub fn nodes(&self) -> &[JourneyNode] {
        &self.nodes
    }
}

/// Builds a [`Branch`]'s paths.
#[derive(Debug, Default)]
pub struct BranchBuilder {
    paths: Vec<Path>,
}

impl BranchBuilder {
    /// Add a path, built through the given closure.
    #[must_use]
    pub fn path(mut self, name: impl Into<String>, build: impl FnOnce(Path) -> Path) -> Self {
        self.paths.push(build(Path::new(name)));
        self
    }

    /// Add a pre-built path.
    #[must_use]
    pub fn add_path(mut self, path: Path) -> Self {
        self.paths.push(path);
        self
    }
}

/// Builds and validates a [`Journey`].
#[derive(Debug)]
pub struct JourneyBuilder {
    name: String,
    nodes: Vec<JourneyNode>,
}

impl JourneyBuilder {
    /// Append a step built from a name and action.
    #[must_use]
    pub fn step(
        mut self,
        name: impl Into<String>,
        run: impl Fn(&mut StepContext<'_>) -> ViajarResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.nodes.push(JourneyNode::Step(Step::new(name, run)));
        self
    }

    /// Append a pre-built step.
    #[must_use]
    pub fn add_step(mut self, step: Step) -> Self {
        self.nodes.push(JourneyNode::Step(step));
        self
    }

    /// Append a named checkpoint.
    #[must_use]
    pub fn checkpoint(mut self, name: impl Into<String>) -> Self {
        self.nodes.push(JourneyNode::Checkpoint(name.into()));
        self
    }

    /// Append a branch over the named checkpoint.
    #[must_use]
    pub fn branch(
        mut self,
        name: impl Into<String>,
        checkpoint: impl Into<String>,
        build: impl FnOnce(BranchBuilder) -> BranchBuilder,
    ) -> Self {
        let builder = build(BranchBuilder::default());
        self.nodes.push(JourneyNode::Branch(Branch {
            name: name.into(),
            checkpoint: checkpoint.into(),
            paths: builder.paths,
        }));
        self
    }

    /// Validate structure and produce the journey.
    ///
    /// # Errors
    ///
    /// Returns `DanglingCheckpoint` if any branch references a
    /// checkpoint that does not textually precede it, and
    /// `InvalidJourney` for a branch with no paths.
    pub fn build(self) -> ViajarResult<Journey> {
        let mut seen = Vec::new();
        for node in &self.nodes {
            match node {
                JourneyNode::Checkpoint(name) => seen.push(name.as_str()),
                JourneyNode::Branch(branch) => {
                    if !seen.contains(&branch.checkpoint.as_str()) {
                        return Err(ViajarError::DanglingCheckpoint {
                            branch: branch.name.clone(),
                            checkpoint: branch.checkpoint.clone(),
                        });
                    }
                    if branch.paths.is_empty() {
                        return Err(ViajarError::InvalidJourney {
                            message: format!("branch '{}' has no paths", branch.name),
                        });
                    }
                }
                JourneyNode::Step(_) => {}
            }
        }
        Ok(Journey {
            name: self.name,
            nodes: self.nodes,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn noop(_: &mut StepContext<'_>) -> ViajarResult<()> {
        Ok(())
    }

    mod builder_tests {
        use super::*;

        #[test]
        fn test_build_valid_journey() {
            let journey = Journey::builder("j")
                .step("a", noop)
                .checkpoint("cp")
                .branch("b", "cp", |b| {
                    b.path("p1", |p| p.step("s1", noop))
                        .path("p2", |p| p.step("s2", noop))
                })
                .build()
                .unwrap();
            assert_eq!(journey.name(), "j");
            assert_eq!(journey.nodes().len(), 3);
        }

        #[test]
        fn test_step_builder_options() {
            let step = Step::new("s", noop)
                .expect_failure()
                .with_retries(3)
                .with_retry_delay(Duration::from_millis(10))
                .with_timeout(Duration::from_secs(1));
            assert!(step.expect_failure);
            assert_eq!(step.retries, 3);
            assert_eq!(step.timeout, Some(Duration::from_secs(1)));
        }
    }

    mod validation_tests {
        use super::*;

        #[test]
        fn test_dangling_checkpoint_fails_build() {
            let err = Journey::builder("j")
                .branch("b", "never_declared", |b| b.path("p", |p| p.step("s", noop)))
                .build()
                .unwrap_err();
            assert!(matches!(err, ViajarError::DanglingCheckpoint { .. }));
        }

        #[test]
        fn test_checkpoint_after_branch_is_dangling() {
            let err = Journey::builder("j")
                .branch("b", "cp", |b| b.path("p", |p| p.step("s", noop)))
                .checkpoint("cp")
                .build()
                .unwrap_err();
            assert!(matches!(err, ViajarError::DanglingCheckpoint { .. }));
        }

        #[test]
        fn test_branch_without_paths_fails_build() {
            let err = Journey::builder("j")
                .checkpoint("cp")
                .branch("b", "cp", |b| b)
                .build()
                .unwrap_err();
            assert!(matches!(err, ViajarError::InvalidJourney { .. }));
        }

        #[test]
        fn test_two_branches_same_checkpoint() {
            let journey = Journey::builder("j")
                .checkpoint("cp")
                .branch("b1", "cp", |b| b.path("p", |p| p.step("s", noop)))
                .branch("b2", "cp", |b| b.path("p", |p| p.step("s", noop)))
                .build();
            assert!(journey.is_ok());
        }
    }
}
