//! Selection engine: the mutable set of actions eligible for random pick.
//!
//! Every operation validates all of its tokens against the registry before
//! mutating anything, so a bad token leaves the active set untouched.

use crate::action::Action;
use crate::error::{HavocError, Result};
use crate::registry::Registry;
use rand::seq::SliceRandom;

/// Special group token that selects the entire registry.
pub const ALL_GROUPS: &str = "all";

/// Split a comma-separated filter list into trimmed, non-empty tokens.
pub fn split_tokens(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn validate(tokens: &[String], known: &[String], allow_all: bool) -> Result<()> {
    for token in tokens {
        if allow_all && token == ALL_GROUPS {
            continue;
        }
        if !known.iter().any(|k| k == token) {
            return Err(HavocError::InvalidToken(token.clone()));
        }
    }
    Ok(())
}

/// The actions currently eligible for random selection.
///
/// Owned exclusively by the scheduler for the lifetime of one run. Entries
/// are clones of registry actions, so referential integrity with the
/// registry holds by construction.
#[derive(Debug, Default)]
pub struct ActiveSet {
    actions: Vec<Action>,
}

impl ActiveSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter()
    }

    pub fn command_ids(&self) -> Vec<String> {
        self.actions
            .iter()
            .map(|a| a.info().command_id.clone())
            .collect()
    }

    pub fn contains_command(&self, command_id: &str) -> bool {
        self.actions
            .iter()
            .any(|a| a.info().command_id == command_id)
    }

    /// Uniform random pick.
    pub fn choose<R: rand::Rng>(&self, rng: &mut R) -> Option<&Action> {
        self.actions.choose(rng)
    }

    pub fn reset(&mut self) {
        self.actions.clear();
    }

    /// Replace the set with the whole registry.
    pub fn include_all(&mut self, registry: &Registry) {
        self.actions = registry.actions().to_vec();
    }

    /// Replace the set with the union of the named groups. The token `all`
    /// selects every action.
    pub fn include_groups(&mut self, registry: &Registry, names: &[String]) -> Result<()> {
        validate(names, &registry.groups(), true)?;
        if names.iter().any(|n| n == ALL_GROUPS) {
            self.include_all(registry);
            return Ok(());
        }
        self.actions = registry
            .actions()
            .iter()
            .filter(|a| names.contains(&a.info().group))
            .cloned()
            .collect();
        Ok(())
    }

    /// Remove every member of the named groups.
    pub fn exclude_groups(&mut self, registry: &Registry, names: &[String]) -> Result<()> {
        validate(names, &registry.groups(), false)?;
        self.actions.retain(|a| !names.contains(&a.info().group));
        Ok(())
    }

    /// Append the actions matching `ids` as one batch.
    ///
    /// Historical semantics, preserved for compatibility: if any requested
    /// id is already active the entire batch is skipped. This looks like an
    /// accident of the original control flow rather than a policy; the
    /// corrected behavior is [`ActiveSet::merge_commands`].
    pub fn include_commands(&mut self, registry: &Registry, ids: &[String]) -> Result<()> {
        validate(ids, &registry.command_ids(), false)?;
        if ids.iter().any(|id| self.contains_command(id)) {
            return Ok(());
        }
        let batch: Vec<Action> = registry
            .actions()
            .iter()
            .filter(|a| ids.contains(&a.info().command_id))
            .cloned()
            .collect();
        self.actions.extend(batch);
        Ok(())
    }

    /// Set-union variant of [`ActiveSet::include_commands`]: adds each
    /// requested action that is not already active, never duplicates.
    pub fn merge_commands(&mut self, registry: &Registry, ids: &[String]) -> Result<()> {
        validate(ids, &registry.command_ids(), false)?;
        for action in registry
            .actions()
            .iter()
            .filter(|a| ids.contains(&a.info().command_id))
        {
            if !self.contains_command(&action.info().command_id) {
                self.actions.push(action.clone());
            }
        }
        Ok(())
    }

    /// Remove the actions matching `ids`. Valid ids that are not currently
    /// active are silently ignored.
    pub fn exclude_commands(&mut self, registry: &Registry, ids: &[String]) -> Result<()> {
        validate(ids, &registry.command_ids(), false)?;
        self.actions
            .retain(|a| !ids.contains(&a.info().command_id));
        Ok(())
    }
}

/// Raw include/exclude filters as given on the command line.
#[derive(Debug, Default, Clone)]
pub struct FilterSpec {
    pub include_groups: Option<String>,
    pub exclude_groups: Option<String>,
    pub include_commands: Option<String>,
    pub exclude_commands: Option<String>,
    /// Use the corrected set-union command include instead of the
    /// historical skip-batch-on-overlap behavior.
    pub dedup_commands: bool,
}

impl FilterSpec {
    /// Apply the composition rule against a registry.
    ///
    /// No include filter at all means "include everything". Excludes always
    /// apply after includes, whatever order the flags were given in. All
    /// tokens are validated before any of them takes effect on the set
    /// being built.
    pub fn resolve(&self, registry: &Registry) -> Result<ActiveSet> {
        let tokens = |raw: &Option<String>| {
            raw.as_deref()
                .map(split_tokens)
                .filter(|t| !t.is_empty())
        };
        let include_groups = tokens(&self.include_groups);
        let exclude_groups = tokens(&self.exclude_groups);
        let include_commands = tokens(&self.include_commands);
        let exclude_commands = tokens(&self.exclude_commands);

        let mut set = ActiveSet::new();
        if include_groups.is_none() && include_commands.is_none() {
            set.include_all(registry);
        }
        if let Some(names) = &include_groups {
            set.include_groups(registry, names)?;
        }
        if let Some(ids) = &include_commands {
            if self.dedup_commands {
                set.merge_commands(registry, ids)?;
            } else {
                set.include_commands(registry, ids)?;
            }
        }
        if let Some(names) = &exclude_groups {
            set.exclude_groups(registry, names)?;
        }
        if let Some(ids) = &exclude_commands {
            set.exclude_commands(registry, ids)?;
        }
        Ok(set)
    }
}
