//! Action descriptors and the behavior boundary for chaos operations.
//!
//! The runner never knows *how* an action disrupts the host. It sees an
//! immutable descriptor for catalog and filtering purposes, and a [`Fault`]
//! it drives through enable/disable (or a single shot). Concrete disruption
//! lives behind the trait, in providers.

use crate::error::Result;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Immutable descriptor for one chaos operation.
#[derive(Debug, Clone, Serialize)]
pub struct ActionInfo {
    /// Globally unique command identifier, e.g. `drop-all`.
    pub command_id: String,
    /// Named category used for bulk include/exclude filtering.
    pub group: String,
    pub description: String,
}

/// How the scheduler drives an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// `enable`, hold for the enablement window, `disable`.
    TwoPhase,
    /// Single `enable` invocation, nothing to revert.
    OneShot,
}

/// The behavior side of an action.
///
/// Implementations must be idempotent: `disable` on an action that is not
/// currently enabled has to be safe, because the shutdown hook reverts every
/// two-phase action unconditionally.
pub trait Fault: Send + Sync {
    fn enable(&self) -> Result<()>;
    fn disable(&self) -> Result<()>;
}

/// One registered chaos operation: descriptor plus behavior.
///
/// Cloning is cheap; the behavior is shared behind an `Arc`, so clones held
/// by the active set stay referentially tied to the registry entry.
#[derive(Clone)]
pub struct Action {
    info: ActionInfo,
    kind: ActionKind,
    fault: Arc<dyn Fault>,
}

impl Action {
    pub fn two_phase(
        command_id: impl Into<String>,
        group: impl Into<String>,
        description: impl Into<String>,
        fault: Arc<dyn Fault>,
    ) -> Self {
        Self::new(command_id, group, description, ActionKind::TwoPhase, fault)
    }

    pub fn one_shot(
        command_id: impl Into<String>,
        group: impl Into<String>,
        description: impl Into<String>,
        fault: Arc<dyn Fault>,
    ) -> Self {
        Self::new(command_id, group, description, ActionKind::OneShot, fault)
    }

    fn new(
        command_id: impl Into<String>,
        group: impl Into<String>,
        description: impl Into<String>,
        kind: ActionKind,
        fault: Arc<dyn Fault>,
    ) -> Self {
        Self {
            info: ActionInfo {
                command_id: command_id.into(),
                group: group.into(),
                description: description.into(),
            },
            kind,
            fault,
        }
    }

    pub fn info(&self) -> &ActionInfo {
        &self.info
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn fault(&self) -> &dyn Fault {
        self.fault.as_ref()
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("command_id", &self.info.command_id)
            .field("group", &self.info.group)
            .field("kind", &self.kind)
            .finish()
    }
}

/// A family of related chaos actions, registered once at startup.
pub trait ActionProvider {
    fn actions(&self) -> Vec<Action>;
}
