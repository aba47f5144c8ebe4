//! Journey runner.
//!
//! Walks a journey's node list in order: steps execute against the
//! shared context, checkpoints snapshot every participating system,
//! and branches replay each path from the stored snapshot. Before
//! every sibling path the runner rolls all systems back to the
//! branch's checkpoint, so paths never observe each other's side
//! effects.
//!
//! In-journey failures are collected into the report, never raised;
//! only structural misuse (running an unvalidated journey, a missing
//! bundle) returns an error from [`JourneyRunner::run`].

use crate::checkpoint::{sanitize_checkpoint_name, Restorable, SystemCheckpoint};
use crate::context::Context;
use crate::graph::ResourceGraph;
use crate::journey::{Branch, Journey, JourneyNode, Path, Step, StepContext};
use crate::result::{ViajarError, ViajarResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;
use uuid::Uuid;

/// Name under which trunk steps (outside any branch) are reported.
pub const MAIN_PATH: &str = "main";

/// Issue severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    /// Informational note
    Info,
    /// Unexpected but non-failing observation
    Warning,
    /// Step or path failure
    Error,
    /// Panic or invariant violation inside a step
    Critical,
}

/// One recorded problem from a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    /// How severe the problem is
    pub severity: Severity,
    /// Step where it occurred
    pub step: String,
    /// Path where it occurred
    pub path: String,
    /// Error description
    pub error: String,
}

/// Status of one executed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    /// Step passed (after inversion for `expect_failure` steps)
    Passed,
    /// Step failed
    Failed,
    /// Step was never reached because an earlier step failed
    Skipped,
}

/// Record of one step execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    /// Step name
    pub name: String,
    /// Final status
    pub status: StepStatus,
    /// Attempts made (1 + retries actually used)
    pub attempts: u32,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
    /// Error from the final attempt, if any
    pub error: Option<String>,
}

/// Result of one path (or the trunk) within a journey run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathResult {
    /// Path name
    pub name: String,
    /// Branch that owns the path, if any
    pub branch: Option<String>,
    /// Whether every step passed
    pub passed: bool,
    /// Per-step records in execution order
    pub steps: Vec<StepRecord>,
}

impl PathResult {
    fn steps_passed(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Passed)
            .count()
    }

    fn steps_failed(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Failed)
            .count()
    }
}

/// Aggregated result of a journey run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JourneyReport {
    /// Unique id of this run
    pub run_id: Uuid,
    /// Journey name
    pub journey: String,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub finished_at: DateTime<Utc>,
    /// Steps that passed across all paths
    pub steps_passed: usize,
    /// Steps that failed across all paths
    pub steps_failed: usize,
    /// Paths (trunk included) that passed
    pub paths_passed: usize,
    /// Paths (trunk included) that failed
    pub paths_failed: usize,
    /// Every recorded issue, in discovery order
    pub issues: Vec<Issue>,
    /// Per-path results
    pub paths: Vec<PathResult>,
}

impl JourneyReport {
    /// Whether the whole run passed.
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.paths_failed == 0 && self.steps_failed == 0
    }

    /// Issues at or above a severity.
    #[must_use]
    pub fn issues_at_least(&self, severity: Severity) -> Vec<&Issue> {
        self.issues.iter().filter(|i| i.severity >= severity).collect()
    }
}

/// Runner configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunnerConfig {
    /// Run sibling paths of a branch on separate threads, each on its
    /// own rolled-back clone. Falls back to sequential execution when
    /// extra restorable collaborators are registered, since those
    /// cannot be cloned per path.
    pub parallel_paths: bool,
}

/// Executes journeys against a resource graph and context.
pub struct JourneyRunner {
    graph: ResourceGraph,
    context: Context,
    extras: Vec<Box<dyn Restorable>>,
    config: RunnerConfig,
}

impl std::fmt::Debug for JourneyRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JourneyRunner")
            .field("extras", &self.extras.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl JourneyRunner {
    /// Create a runner over a graph and context.
    #[must_use]
    pub fn new(graph: ResourceGraph, context: Context) -> Self {
        Self {
            graph,
            context,
            extras: Vec::new(),
            config: RunnerConfig::default(),
        }
    }

    /// Set the runner configuration.
    #[must_use]
    pub fn with_config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    /// Register an extra stateful collaborator for branch isolation.
    #[must_use]
    pub fn with_system(mut self, system: Box<dyn Restorable>) -> Self {
        self.extras.push(system);
        self
    }

    /// The graph in its current (post-run) state.
    #[must_use]
    pub const fn graph(&self) -> &ResourceGraph {
        &self.graph
    }

    /// The context in its current (post-run) state.
    #[must_use]
    pub const fn context(&self) -> &Context {
        &self.context
    }

    /// Execute a journey and aggregate the result.
    ///
    /// A trunk step failure stops the remaining trunk (later nodes are
    /// not reached); a path step failure stops only that path. Neither
    /// is an `Err` from this method.
    ///
    /// # Errors
    ///
    /// Returns an error only for structural problems: a branch whose
    /// checkpoint bundle is missing at execution time, or a
    /// collaborator whose checkpoint capture fails.
    pub fn run(&mut self, journey: &Journey) -> ViajarResult<JourneyReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        tracing::info!(journey = journey.name(), %run_id, "journey start");

        let mut checkpoints: HashMap<String, SystemCheckpoint> = HashMap::new();
        let mut issues = Vec::new();
        let mut paths = Vec::new();
        let mut trunk = PathResult {
            name: MAIN_PATH.to_string(),
            branch: None,
            passed: true,
            steps: Vec::new(),
        };
        let mut trunk_stopped = false;

        for node in journey.nodes() {
            if trunk_stopped {
                break;
            }
            match node {
                JourneyNode::Step(step) => {
                    let record = execute_step(step, &mut self.graph, &mut self.context, MAIN_PATH, &mut issues);
                    if record.status == StepStatus::Failed {
                        trunk.passed = false;
                        trunk_stopped = true;
                    }
                    trunk.steps.push(record);
                }
                JourneyNode::Checkpoint(name) => {
                    let bundle = self.capture_checkpoint(name)?;
                    checkpoints.insert(name.clone(), bundle);
                }
                JourneyNode::Branch(branch) => {
                    let bundle = checkpoints.get(&branch.checkpoint).cloned().ok_or_else(|| {
                        ViajarError::CheckpointNotFound {
                            name: branch.checkpoint.clone(),
                        }
                    })?;
                    let mut results = self.run_branch(branch, &bundle, &mut issues)?;
                    paths.append(&mut results);
                    // The trunk continues from the checkpoint state,
                    // not from whatever the last path left behind.
                    self.rollback_to(&bundle)?;
                }
            }
        }

        // Release collaborator save-points for every stored bundle.
        for bundle in checkpoints.values() {
            let sanitized = sanitize_checkpoint_name(&bundle.name);
            for extra in &mut self.extras {
                if let Err(e) = extra.release(&sanitized) {
                    tracing::warn!(system = extra.system_name(), error = %e, "release failed");
                }
            }
        }

        paths.insert(0, trunk);
        let finished_at = Utc::now();
        let report = JourneyReport {
            run_id,
            journey: journey.name().to_string(),
            started_at,
            finished_at,
            steps_passed: paths.iter().map(PathResult::steps_passed).sum(),
            steps_failed: paths.iter().map(PathResult::steps_failed).sum(),
            paths_passed: paths.iter().filter(|p| p.passed).count(),
            paths_failed: paths.iter().filter(|p| !p.passed).count(),
            issues,
            paths,
        };
        tracing::info!(
            journey = journey.name(),
            passed = report.passed(),
            steps_failed = report.steps_failed,
            "journey finished"
        );
        Ok(report)
    }

    fn capture_checkpoint(&mut self, name: &str) -> ViajarResult<SystemCheckpoint> {
        tracing::debug!(checkpoint = name, "capture");
        let mut bundle =
            SystemCheckpoint::new(name, self.graph.checkpoint(), self.context.checkpoint());
        let sanitized = sanitize_checkpoint_name(name);
        for extra in &mut self.extras {
            extra.checkpoint(&sanitized)?;
            bundle.participants.push(extra.system_name().to_string());
        }
        Ok(bundle)
    }

    fn rollback_to(&mut self, bundle: &SystemCheckpoint) -> ViajarResult<()> {
        self.graph.rollback(&bundle.graph);
        self.context.restore(&bundle.context);
        let sanitized = sanitize_checkpoint_name(&bundle.name);
        for extra in &mut self.extras {
            extra.rollback(&sanitized)?;
        }
        Ok(())
    }

    fn run_branch(
        &mut self,
        branch: &Branch,
        bundle: &SystemCheckpoint,
        issues: &mut Vec<Issue>,
    ) -> ViajarResult<Vec<PathResult>> {
        tracing::debug!(branch = branch.name, paths = branch.paths.len(), "branch start");
        if self.config.parallel_paths && self.extras.is_empty() {
            return Ok(run_paths_parallel(branch, bundle, &self.graph, &self.context, issues));
        }
        if self.config.parallel_paths {
            tracing::warn!(
                branch = branch.name,
                "parallel paths disabled: restorable collaborators cannot be cloned per path"
            );
        }

        let mut results = Vec::with_capacity(branch.paths.len());
        for path in &branch.paths {
            self.rollback_to(bundle)?;
            results.push(run_path(
                path,
                &branch.name,
                &mut self.graph,
                &mut self.context,
                issues,
            ));
        }
        Ok(results)
    }
}

/// Run every path of a branch on its own thread, each over its own
/// rolled-back clone of the graph and context. Isolation comes from
/// rollback-then-clone, not locking.
fn run_paths_parallel(
    branch: &Branch,
    bundle: &SystemCheckpoint,
    graph: &ResourceGraph,
    context: &Context,
    issues: &mut Vec<Issue>,
) -> Vec<PathResult> {
    let outcomes: Vec<(PathResult, Vec<Issue>)> = std::thread::scope(|scope| {
        let handles: Vec<_> = branch
            .paths
            .iter()
            .map(|path| {
                scope.spawn(move || {
                    let mut path_graph = graph.clone();
                    let mut path_context = context.clone();
                    path_graph.rollback(&bundle.graph);
                    path_context.restore(&bundle.context);
                    let mut path_issues = Vec::new();
                    let result = run_path(
                        path,
                        &branch.name,
                        &mut path_graph,
                        &mut path_context,
                        &mut path_issues,
                    );
                    (result, path_issues)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|_| {
                (
                    PathResult {
                        name: "<panicked path>".to_string(),
                        branch: Some(branch.name.clone()),
                        passed: false,
                        steps: Vec::new(),
                    },
                    Vec::new(),
                )
            }))
            .collect()
    });

    let mut results = Vec::with_capacity(outcomes.len());
    for (result, mut path_issues) in outcomes {
        issues.append(&mut path_issues);
        results.push(result);
    }
    results
}

fn run_path(
    path: &Path,
    branch_name: &str,
    graph: &mut ResourceGraph,
    context: &mut Context,
    issues: &mut Vec<Issue>,
) -> PathResult {
    tracing::debug!(path = path.name, "path start");
    let mut result = PathResult {
        name: path.name.clone(),
        branch: Some(branch_name.to_string()),
        passed: true,
        steps: Vec::new(),
    };
    let mut stopped = false;
    for step in &path.steps {
        if stopped {
            result.steps.push(StepRecord {
                name: step.name.clone(),
                status: StepStatus::Skipped,
                attempts: 0,
                duration_ms: 0,
                error: None,
            });
            continue;
        }
        let record = execute_step(step, graph, context, &path.name, issues);
        if record.status == StepStatus::Failed {
            result.passed = false;
            stopped = true;
        }
        result.steps.push(record);
    }
    result
}

/// Execute one step with retries, advisory timeout, and
/// `expect_failure` inversion. Panics inside the action are caught and
/// recorded as critical issues, never propagated.
fn execute_step(
    step: &Step,
    graph: &mut ResourceGraph,
    context: &mut Context,
    path_name: &str,
    issues: &mut Vec<Issue>,
) -> StepRecord {
    let max_attempts = step.retries + 1;
    let mut attempts = 0;
    let started = Instant::now();
    let mut last_error: Option<String> = None;
    let mut panicked = false;

    let effective_pass = loop {
        attempts += 1;
        let attempt_started = Instant::now();
        let outcome = {
            let graph = &mut *graph;
            let context = &mut *context;
            catch_unwind(AssertUnwindSafe(move || {
                let mut step_ctx = StepContext { graph, context };
                (step.run)(&mut step_ctx)
            }))
        };

        let action_result = match outcome {
            Ok(r) => r,
            Err(payload) => {
                panicked = true;
                Err(ViajarError::AssertionFailed {
                    message: panic_message(payload.as_ref()),
                })
            }
        };

        // Advisory timeout: a slow success is still a failure.
        let action_result = match (action_result, step.timeout) {
            (Ok(()), Some(timeout)) if attempt_started.elapsed() > timeout => {
                Err(ViajarError::Timeout {
                    ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                })
            }
            (r, _) => r,
        };

        let failed = action_result.is_err();
        if let Err(e) = action_result {
            last_error = Some(e.to_string());
        }

        // expect_failure inverts the interpretation of the outcome.
        let pass = failed == step.expect_failure;
        if pass || attempts >= max_attempts {
            break pass;
        }
        tracing::debug!(step = step.name, attempt = attempts, "retrying");
        std::thread::sleep(step.retry_delay);
    };

    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    if effective_pass {
        StepRecord {
            name: step.name.clone(),
            status: StepStatus::Passed,
            attempts,
            duration_ms,
            error: None,
        }
    } else {
        let error = last_error.unwrap_or_else(|| {
            "step was expected to fail but passed".to_string()
        });
        issues.push(Issue {
            severity: if panicked { Severity::Critical } else { Severity::Error },
            step: step.name.clone(),
            path: path_name.to_string(),
            error: error.clone(),
        });
        tracing::warn!(step = step.name, path = path_name, error = %error, "step failed");
        StepRecord {
            name: step.name.clone(),
            status: StepStatus::Failed,
            attempts,
            duration_ms,
            error: Some(error),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload.downcast_ref::<&str>().map_or_else(
        || {
            payload
                .downcast_ref::<String>()
                .cloned()
                .unwrap_or_else(|| "step panicked".to_string())
        },
        |s| (*s).to_string(),
    )
}
