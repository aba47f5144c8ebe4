//! Breadth-first and depth-first exploration.
//!
//! Both strategies keep an agenda of `(state, action)` pairs that
//! became runnable and have not been tried yet. They differ only in
//! which end of the agenda they serve next: breadth-first takes the
//! oldest pending pair (queue), depth-first the newest (stack).

use super::{
    Action, ActionOutcome, ExplorationReport, ExplorationState, Explorer, RuntimeContext,
    StateFingerprint, StopCondition,
};
use std::collections::{HashSet, VecDeque};

/// Which end of the frontier agenda to serve next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraversalOrder {
    /// Queue: oldest pending pair first
    #[default]
    BreadthFirst,
    /// Stack: newest pending pair first
    DepthFirst,
}

/// BFS/DFS explorer over the discovered `(state, action)` agenda.
#[derive(Debug)]
pub struct FrontierExplorer {
    order: TraversalOrder,
    state: ExplorationState,
    agenda: VecDeque<(StateFingerprint, String)>,
    tried: HashSet<(StateFingerprint, String)>,
    exhausted: bool,
}

impl FrontierExplorer {
    /// Create a breadth-first explorer.
    #[must_use]
    pub fn bfs(stop: StopCondition) -> Self {
        Self::new(TraversalOrder::BreadthFirst, stop)
    }

    /// Create a depth-first explorer.
    #[must_use]
    pub fn dfs(stop: StopCondition) -> Self {
        Self::new(TraversalOrder::DepthFirst, stop)
    }

    /// Create an explorer with an explicit traversal order.
    #[must_use]
    pub fn new(order: TraversalOrder, stop: StopCondition) -> Self {
        Self {
            order,
            state: ExplorationState::new(stop),
            agenda: VecDeque::new(),
            tried: HashSet::new(),
            exhausted: false,
        }
    }

    /// Enqueue every runnable, untried action for the current state.
    fn refresh_agenda(&mut self, ctx: &dyn RuntimeContext, actions: &[Box<dyn Action>]) {
        let here = ctx.fingerprint();
        for action in actions {
            let pair = (here.clone(), action.name().to_string());
            if action.can_run(ctx)
                && !self.tried.contains(&pair)
                && !self.agenda.contains(&pair)
            {
                self.agenda.push_back(pair);
            }
        }
    }
}

impl Explorer for FrontierExplorer {
    fn strategy(&self) -> &str {
        match self.order {
            TraversalOrder::BreadthFirst => "bfs",
            TraversalOrder::DepthFirst => "dfs",
        }
    }

    fn next_action<'a>(
        &mut self,
        ctx: &dyn RuntimeContext,
        actions: &'a [Box<dyn Action>],
    ) -> Option<&'a dyn Action> {
        self.refresh_agenda(ctx, actions);
        let here = ctx.fingerprint();

        // Serve the first agenda entry (from the configured end) whose
        // action is runnable from where the system actually is now.
        // Entries recorded for other states stay pending until the
        // system passes through them again.
        let mut postponed = Vec::new();
        let chosen = loop {
            let pair = match self.order {
                TraversalOrder::BreadthFirst => self.agenda.pop_front(),
                TraversalOrder::DepthFirst => self.agenda.pop_back(),
            };
            let Some(pair) = pair else { break None };
            let runnable = pair.0 == here
                && actions
                    .iter()
                    .any(|a| a.name() == pair.1 && a.can_run(ctx));
            if runnable {
                break Some(pair);
            }
            postponed.push(pair);
        };
        for pair in postponed {
            self.agenda.push_back(pair);
        }

        let Some(pair) = chosen else {
            self.exhausted = true;
            return None;
        };
        self.tried.insert(pair.clone());
        actions
            .iter()
            .find(|a| a.name() == pair.1)
            .map(AsRef::as_ref)
    }

    fn record_outcome(&mut self, action: &str, outcome: &ActionOutcome) {
        self.state.observe(action, outcome);
    }

    fn should_stop(&self) -> bool {
        self.exhausted || self.state.stop_reason().is_some()
    }

    fn report(&self) -> ExplorationReport {
        self.state.report(self.strategy(), self.exhausted)
    }
}
