//! Autonomous state-space exploration.
//!
//! Instead of a scripted journey, an explorer repeatedly proposes the
//! next [`Action`] whose preconditions are satisfiable in the current
//! state, observes the outcome, and decides when to stop. Strategies
//! differ only in how they choose: [`frontier::FrontierExplorer`]
//! walks the discovered action agenda breadth- or depth-first,
//! [`mcts::MctsExplorer`] samples playout rewards and biases future
//! choices toward productive actions.
//!
//! Every strategy is interruptible: `report()` returns usable partial
//! results at any point, and [`run_exploration`] checks `should_stop`
//! between every action.

pub mod frontier;
pub mod mcts;

use crate::graph::ResourceGraph;
use crate::result::ViajarResult;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{Duration, Instant};

/// Deterministic seed for reproducible exploration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Seed(u64);

impl Seed {
    /// Create a seed from a u64 value.
    #[must_use]
    pub const fn from_u64(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw seed value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

/// Simple xorshift64 PRNG for deterministic strategy tie-breaking.
#[derive(Debug, Clone)]
pub(crate) struct Xorshift64 {
    state: u64,
}

impl Xorshift64 {
    pub(crate) const fn new(seed: Seed) -> Self {
        // Ensure non-zero state
        let state = if seed.0 == 0 { 1 } else { seed.0 };
        Self { state }
    }

    pub(crate) fn next(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }
}

/// Canonical fingerprint of a resource-graph state.
///
/// Hashes the sorted set of live `(type, id)` pairs, so two graphs
/// holding the same live instances fingerprint identically regardless
/// of creation order or dead residue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateFingerprint(String);

impl StateFingerprint {
    /// Fingerprint a resource graph.
    #[must_use]
    pub fn of(graph: &ResourceGraph) -> Self {
        let mut hasher = Sha256::new();
        // live_resources iterates the arena in key order already
        for resource in graph.live_resources() {
            hasher.update(resource.type_name.as_bytes());
            hasher.update(b"/");
            hasher.update(resource.id.as_bytes());
            hasher.update(b"\n");
        }
        let digest = hasher.finalize();
        Self(digest.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// Hex digest string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StateFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0[..12.min(self.0.len())])
    }
}

/// What an explorer sees of the system under test.
pub trait RuntimeContext {
    /// The live resource graph.
    fn graph(&self) -> &ResourceGraph;

    /// Whether every required type has a live instance.
    fn can_execute(&self, requires: &[String]) -> bool {
        self.graph().can_execute(requires, None)
    }

    /// Fingerprint of the current state.
    fn fingerprint(&self) -> StateFingerprint {
        StateFingerprint::of(self.graph())
    }
}

impl RuntimeContext for ResourceGraph {
    fn graph(&self) -> &ResourceGraph {
        self
    }
}

/// Structural contract for anything an explorer can schedule.
pub trait Action: Send + Sync {
    /// Action name, used in stats and reports.
    fn name(&self) -> &str;

    /// Resource types that must have a live instance before the action
    /// can run.
    fn requires(&self) -> &[String];

    /// Whether preconditions are satisfiable right now.
    fn can_run(&self, ctx: &dyn RuntimeContext) -> bool {
        ctx.can_execute(self.requires())
    }
}

/// Outcome of executing a proposed action, reported back to the
/// explorer.
#[derive(Debug, Clone)]
pub enum ActionOutcome {
    /// The action ran; the system is now in `state`.
    Completed {
        /// Fingerprint after the action
        state: StateFingerprint,
    },
    /// The action errored. Treated as a signal (possible bug found),
    /// never as a fatal exploration error.
    Failed {
        /// Error description
        error: String,
        /// Fingerprint after the failed action
        state: StateFingerprint,
    },
}

impl ActionOutcome {
    /// Fingerprint after the action, whatever happened.
    #[must_use]
    pub const fn state(&self) -> &StateFingerprint {
        match self {
            Self::Completed { state } | Self::Failed { state, .. } => state,
        }
    }
}

/// An anomaly observed during exploration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    /// Action that surfaced the anomaly
    pub action: String,
    /// Error description
    pub error: String,
    /// Exploration step at which it occurred
    pub step: usize,
}

/// Termination policy for exploration.
#[derive(Debug, Clone, Copy)]
pub struct StopCondition {
    /// Maximum actions to execute
    pub max_steps: usize,
    /// Wall-clock budget
    pub time_budget: Option<Duration>,
    /// Stop once this many distinct states have been seen
    pub coverage_target: Option<usize>,
}

impl Default for StopCondition {
    fn default() -> Self {
        Self {
            max_steps: 1000,
            time_budget: None,
            coverage_target: None,
        }
    }
}

impl StopCondition {
    /// Create a policy bounded only by a step count.
    #[must_use]
    pub const fn max_steps(max_steps: usize) -> Self {
        Self {
            max_steps,
            time_budget: None,
            coverage_target: None,
        }
    }

    /// Set the wall-clock budget.
    #[must_use]
    pub const fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    /// Set the distinct-state coverage target.
    #[must_use]
    pub const fn with_coverage_target(mut self, states: usize) -> Self {
        self.coverage_target = Some(states);
        self
    }
}

/// Why an exploration ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Step budget exhausted
    MaxSteps,
    /// Time budget exhausted
    TimeBudget,
    /// Coverage target reached
    CoverageTarget,
    /// No runnable action remained
    Exhausted,
    /// Exploration is still in progress (partial report)
    InProgress,
}

/// Usable-at-any-point summary of an exploration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorationReport {
    /// Strategy name
    pub strategy: String,
    /// Actions executed
    pub steps_taken: usize,
    /// Distinct states observed
    pub distinct_states: usize,
    /// Anomalies recorded, in discovery order
    pub anomalies: Vec<Anomaly>,
    /// Why exploration ended, or `InProgress` for a partial report
    pub stop_reason: StopReason,
}

/// A strategy that picks the next action to try.
pub trait Explorer {
    /// Strategy name for reports.
    fn strategy(&self) -> &str;

    /// Propose the next action, or `None` when nothing is runnable.
    fn next_action<'a>(
        &mut self,
        ctx: &dyn RuntimeContext,
        actions: &'a [Box<dyn Action>],
    ) -> Option<&'a dyn Action>;

    /// Feed back the outcome of the proposed action.
    fn record_outcome(&mut self, action: &str, outcome: &ActionOutcome);

    /// Whether the termination policy says to stop.
    fn should_stop(&self) -> bool;

    /// Partial or final results, usable at any point.
    fn report(&self) -> ExplorationReport;
}

/// Drive an explorer against a live resource graph.
///
/// `apply` executes a proposed action against the graph; its error is
/// recorded as an anomaly, never propagated. The loop is interruptible
/// through the explorer's stop condition and always returns a usable
/// report.
pub fn run_exploration<F>(
    explorer: &mut dyn Explorer,
    graph: &mut ResourceGraph,
    actions: &[Box<dyn Action>],
    mut apply: F,
) -> ExplorationReport
where
    F: FnMut(&dyn Action, &mut ResourceGraph) -> ViajarResult<()>,
{
    tracing::info!(strategy = explorer.strategy(), "exploration start");
    loop {
        if explorer.should_stop() {
            break;
        }
        let Some(action) = explorer.next_action(&*graph, actions) else {
            break;
        };
        let name = action.name().to_string();
        let outcome = match apply(action, graph) {
            Ok(()) => ActionOutcome::Completed {
                state: StateFingerprint::of(graph),
            },
            Err(e) => {
                tracing::debug!(action = name, error = %e, "action failed");
                ActionOutcome::Failed {
                    error: e.to_string(),
                    state: StateFingerprint::of(graph),
                }
            }
        };
        explorer.record_outcome(&name, &outcome);
    }
    let report = explorer.report();
    tracing::info!(
        strategy = report.strategy,
        steps = report.steps_taken,
        states = report.distinct_states,
        anomalies = report.anomalies.len(),
        "exploration finished"
    );
    report
}

/// Shared bookkeeping every strategy needs: step counts, distinct
/// states, anomalies, and the termination policy.
#[derive(Debug, Clone)]
pub(crate) struct ExplorationState {
    pub stop: StopCondition,
    pub started: Instant,
    pub steps_taken: usize,
    pub seen: std::collections::HashSet<StateFingerprint>,
    pub anomalies: Vec<Anomaly>,
}

impl ExplorationState {
    pub fn new(stop: StopCondition) -> Self {
        Self {
            stop,
            started: Instant::now(),
            steps_taken: 0,
            seen: std::collections::HashSet::new(),
            anomalies: Vec::new(),
        }
    }

    /// Record an outcome; returns true when the state was new.
    pub fn observe(&mut self, action: &str, outcome: &ActionOutcome) -> bool {
        self.steps_taken += 1;
        let novel = self.seen.insert(outcome.state().clone());
        if let ActionOutcome::Failed { error, .. } = outcome {
            self.anomalies.push(Anomaly {
                action: action.to_string(),
                error: error.clone(),
                step: self.steps_taken,
            });
        }
        novel
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        if self.steps_taken >= self.stop.max_steps {
            return Some(StopReason::MaxSteps);
        }
        if let Some(budget) = self.stop.time_budget {
            if self.started.elapsed() >= budget {
                return Some(StopReason::TimeBudget);
            }
        }
        if let Some(target) = self.stop.coverage_target {
            if self.seen.len() >= target {
                return Some(StopReason::CoverageTarget);
            }
        }
        None
    }

    pub fn report(&self, strategy: &str, exhausted: bool) -> ExplorationReport {
        let stop_reason = self.stop_reason().unwrap_or(if exhausted {
            StopReason::Exhausted
        } else {
            StopReason::InProgress
        });
        ExplorationReport {
            strategy: strategy.to_string(),
            steps_taken: self.steps_taken,
            distinct_states: self.seen.len(),
            anomalies: self.anomalies.clone(),
            stop_reason,
        }
    }
}

/// A plain data action for tests and simple exploration setups.
#[derive(Debug, Clone)]
pub struct SimpleAction {
    name: String,
    requires: Vec<String>,
}

impl SimpleAction {
    /// Create an action from a name and required types.
    #[must_use]
    pub fn new<S: Into<String>>(name: impl Into<String>, requires: Vec<S>) -> Self {
        Self {
            name: name.into(),
            requires: requires.into_iter().map(Into::into).collect(),
        }
    }
}

impl Action for SimpleAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn requires(&self) -> &[String] {
        &self.requires
    }
}
