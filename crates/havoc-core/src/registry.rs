//! The full ordered catalog of chaos actions known to the process.
//!
//! Assembled once from a startup-time list of providers and read-only
//! afterwards. The active set holds clones of these entries, so membership
//! checks against the registry are checks against the same `Arc`-backed
//! actions.

use crate::action::{Action, ActionKind, ActionProvider};
use crate::providers::{NetworkChaos, ProcessChaos};
use tracing::{debug, warn};

pub struct Registry {
    actions: Vec<Action>,
}

impl Registry {
    pub fn new(providers: &[&dyn ActionProvider]) -> Self {
        let mut actions = Vec::new();
        for provider in providers {
            actions.extend(provider.actions());
        }
        // Duplicate command ids across providers are a construction bug in
        // the compiled-in catalog, not user input.
        #[cfg(debug_assertions)]
        {
            let mut seen = std::collections::HashSet::new();
            for action in &actions {
                assert!(
                    seen.insert(action.info().command_id.clone()),
                    "duplicate command id: {}",
                    action.info().command_id
                );
            }
        }
        Self { actions }
    }

    /// The built-in action families shipped with the runner.
    pub fn with_default_providers() -> Self {
        Self::new(&[&NetworkChaos, &ProcessChaos])
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// All group names, deduplicated, in first-seen order.
    pub fn groups(&self) -> Vec<String> {
        let mut groups: Vec<String> = Vec::new();
        for action in &self.actions {
            if !groups.contains(&action.info().group) {
                groups.push(action.info().group.clone());
            }
        }
        groups
    }

    /// All command ids, in registration order.
    pub fn command_ids(&self) -> Vec<String> {
        self.actions
            .iter()
            .map(|a| a.info().command_id.clone())
            .collect()
    }

    pub fn commands_in_group(&self, group: &str) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.info().group == group)
            .collect()
    }

    /// Shutdown hook: disable every two-phase action.
    ///
    /// Runs after the scheduler loop exits for any reason, so a run cut
    /// short by cancellation or a failed enable never leaves the host in a
    /// permanently-disrupted state. Best-effort: a failing disable is
    /// logged and the remaining actions are still reverted.
    pub fn revert_all(&self) {
        for action in &self.actions {
            if action.kind() != ActionKind::TwoPhase {
                continue;
            }
            if let Err(e) = action.fault().disable() {
                warn!(
                    command = %action.info().command_id,
                    error = %e,
                    "failed to revert chaos action"
                );
            }
        }
        debug!("all two-phase actions reverted");
    }
}
