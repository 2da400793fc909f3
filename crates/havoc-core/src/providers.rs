//! Built-in action families.
//!
//! These providers carry the catalog shape of the runner — group names,
//! command ids, descriptions — with log-only effects. Actual host
//! disruption (firewall rules, process kills) is deployment-specific and
//! belongs in out-of-tree `Fault` implementations.

use crate::action::{Action, ActionProvider, Fault};
use crate::error::Result;
use std::sync::Arc;
use tracing::info;

pub const NETWORK_GROUP: &str = "network";
pub const KILL_GROUP: &str = "kill";

/// Records enable/disable transitions in the run log and nothing else.
struct LoggedFault {
    command_id: &'static str,
}

impl Fault for LoggedFault {
    fn enable(&self) -> Result<()> {
        info!(command = self.command_id, "enable");
        Ok(())
    }

    fn disable(&self) -> Result<()> {
        info!(command = self.command_id, "disable");
        Ok(())
    }
}

/// Network degradation family: two-phase actions that stay enabled for the
/// enablement window and are then reverted.
pub struct NetworkChaos;

impl NetworkChaos {
    fn action(command_id: &'static str, description: &str) -> Action {
        Action::two_phase(
            command_id,
            NETWORK_GROUP,
            description,
            Arc::new(LoggedFault { command_id }),
        )
    }
}

impl ActionProvider for NetworkChaos {
    fn actions(&self) -> Vec<Action> {
        vec![
            Self::action("drop-all", "Drop all inbound and outbound network traffic."),
            Self::action("deny-incoming", "Deny all inbound network traffic."),
            Self::action("deny-outgoing", "Deny all outbound network traffic."),
            Self::action("allow-ssh", "Drop all network traffic except inbound SSH."),
        ]
    }
}

/// Process termination family: one-shot actions with nothing to revert.
pub struct ProcessChaos;

impl ProcessChaos {
    fn action(command_id: &'static str, description: &str) -> Action {
        Action::one_shot(
            command_id,
            KILL_GROUP,
            description,
            Arc::new(LoggedFault { command_id }),
        )
    }
}

impl ActionProvider for ProcessChaos {
    fn actions(&self) -> Vec<Action> {
        vec![
            Self::action("kill-process", "Kill an eligible supervised process."),
            Self::action("restart-unit", "Restart the supervised unit."),
        ]
    }
}
