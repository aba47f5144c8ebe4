//! Monte Carlo exploration.
//!
//! Treats every executed action as one playout sample against a system
//! that is allowed to be non-deterministic: rewards are kept as sampled
//! distributions per action and averaged, never assumed to come from a
//! pure transition function. Selection is UCB1 over the sample means,
//! so actions that keep discovering new states or surfacing anomalies
//! (both are worth reward) get picked more often, while untried
//! actions always get a first sample.

use super::{
    Action, ActionOutcome, ExplorationReport, ExplorationState, Explorer, RuntimeContext, Seed,
    StopCondition, Xorshift64,
};
use std::collections::HashMap;

/// Default UCB1 exploration constant.
pub const DEFAULT_EXPLORATION: f64 = std::f64::consts::SQRT_2;

/// Reward granted when a playout lands in a previously unseen state.
pub const NOVELTY_REWARD: f64 = 1.0;

/// Reward granted when a playout surfaces an anomaly (a failed action
/// is a bug signal, not a dead end).
pub const ANOMALY_REWARD: f64 = 0.5;

/// Upper clamp on a single playout's reward.
pub const MAX_REWARD: f64 = 2.0;

/// MCTS explorer configuration.
#[derive(Debug, Clone, Copy)]
pub struct MctsConfig {
    /// UCB1 exploration constant
    pub exploration: f64,
    /// PRNG seed for tie-breaking among untried actions
    pub seed: Seed,
    /// Termination policy
    pub stop: StopCondition,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            exploration: DEFAULT_EXPLORATION,
            seed: Seed::default(),
            stop: StopCondition::default(),
        }
    }
}

impl MctsConfig {
    /// Set the PRNG seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: Seed) -> Self {
        self.seed = seed;
        self
    }

    /// Set the termination policy.
    #[must_use]
    pub const fn with_stop(mut self, stop: StopCondition) -> Self {
        self.stop = stop;
        self
    }

    /// Set the UCB1 exploration constant.
    #[must_use]
    pub const fn with_exploration(mut self, exploration: f64) -> Self {
        self.exploration = exploration;
        self
    }
}

#[derive(Debug, Clone, Default)]
struct ActionStats {
    samples: Vec<f64>,
}

impl ActionStats {
    fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = self.samples.len() as f64;
        self.samples.iter().sum::<f64>() / n
    }
}

/// Monte Carlo tree search explorer.
#[derive(Debug)]
pub struct MctsExplorer {
    config: MctsConfig,
    rng: Xorshift64,
    stats: HashMap<String, ActionStats>,
    state: ExplorationState,
    exhausted: bool,
}

impl MctsExplorer {
    /// Create an explorer from a config.
    #[must_use]
    pub fn new(config: MctsConfig) -> Self {
        Self {
            config,
            rng: Xorshift64::new(config.seed),
            stats: HashMap::new(),
            state: ExplorationState::new(config.stop),
            exhausted: false,
        }
    }

    /// Number of reward samples recorded for an action.
    #[must_use]
    pub fn sample_count(&self, action: &str) -> usize {
        self.stats.get(action).map_or(0, |s| s.samples.len())
    }

    /// Mean sampled reward for an action.
    #[must_use]
    pub fn mean_reward(&self, action: &str) -> f64 {
        self.stats.get(action).map_or(0.0, ActionStats::mean)
    }

    fn ucb1(&self, action: &str, total_samples: usize) -> f64 {
        let stats = match self.stats.get(action) {
            Some(s) if !s.samples.is_empty() => s,
            _ => return f64::INFINITY,
        };
        #[allow(clippy::cast_precision_loss)]
        let n = stats.samples.len() as f64;
        #[allow(clippy::cast_precision_loss)]
        let total = total_samples.max(1) as f64;
        stats.mean() + self.config.exploration * (total.ln() / n).sqrt()
    }
}

impl Explorer for MctsExplorer {
    fn strategy(&self) -> &str {
        "mcts"
    }

    fn next_action<'a>(
        &mut self,
        ctx: &dyn RuntimeContext,
        actions: &'a [Box<dyn Action>],
    ) -> Option<&'a dyn Action> {
        let runnable: Vec<&'a dyn Action> = actions
            .iter()
            .filter(|a| a.can_run(ctx))
            .map(AsRef::as_ref)
            .collect();
        if runnable.is_empty() {
            self.exhausted = true;
            return None;
        }

        let total_samples: usize = runnable
            .iter()
            .map(|a| self.sample_count(a.name()))
            .sum();

        // Untried actions first, tie-broken deterministically.
        let untried: Vec<&'a dyn Action> = runnable
            .iter()
            .copied()
            .filter(|a| self.sample_count(a.name()) == 0)
            .collect();
        if !untried.is_empty() {
            #[allow(clippy::cast_possible_truncation)]
            let pick = (self.rng.next() as usize) % untried.len();
            return Some(untried[pick]);
        }

        runnable.into_iter().max_by(|a, b| {
            let ua = self.ucb1(a.name(), total_samples);
            let ub = self.ucb1(b.name(), total_samples);
            ua.partial_cmp(&ub).unwrap_or(std::cmp::Ordering::Equal)
        })
    }

    fn record_outcome(&mut self, action: &str, outcome: &ActionOutcome) {
        let novel = self.state.observe(action, outcome);
        let mut reward = 0.0;
        if novel {
            reward += NOVELTY_REWARD;
        }
        if matches!(outcome, ActionOutcome::Failed { .. }) {
            reward += ANOMALY_REWARD;
        }
        let reward = reward.min(MAX_REWARD);
        self.stats.entry(action.to_string()).or_default().samples.push(reward);
    }

    fn should_stop(&self) -> bool {
        self.exhausted || self.state.stop_reason().is_some()
    }

    fn report(&self) -> ExplorationReport {
        self.state.report(self.strategy(), self.exhausted)
    }
}
