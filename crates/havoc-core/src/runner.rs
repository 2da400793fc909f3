//! Timed execution scheduler.
//!
//! Drives one run: lock the workspace, resolve the filters into an active
//! set, then loop picking a random action until the total budget expires or
//! cancellation is requested. Cancellation is cooperative and observed only
//! at iteration boundaries, so an in-flight enable/disable cycle always
//! finishes and shutdown latency is bounded by one enablement window.

use crate::action::{Action, ActionKind};
use crate::context::RunContext;
use crate::error::Result;
use crate::lock::WorkspaceLock;
use crate::registry::Registry;
use crate::selection::{ActiveSet, FilterSpec};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Scheduler lifecycle, advanced strictly left to right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Locked,
    Filtering,
    Running,
    Draining,
    CleanedUp,
}

/// Timing and mode parameters for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Total wall-clock budget for the run.
    pub total_timeout: Duration,
    /// How long a two-phase action stays enabled before it is reverted.
    /// This is a sleep, not a deadline on the fault call itself: a fault
    /// that blocks in `enable` or `disable` is not preempted.
    pub enablement_timeout: Duration,
    /// Execute at most one iteration regardless of remaining budget.
    pub run_once: bool,
    /// Perform zero actions; exercises filtering and locking only.
    pub dry_run: bool,
}

pub struct Runner {
    workspace: PathBuf,
    registry: Registry,
    ctx: Arc<RunContext>,
    lock: Option<WorkspaceLock>,
    active: ActiveSet,
    phase: Phase,
}

impl Runner {
    pub fn new(workspace: impl Into<PathBuf>, registry: Registry, ctx: Arc<RunContext>) -> Self {
        Self {
            workspace: workspace.into(),
            registry,
            ctx,
            lock: None,
            active: ActiveSet::new(),
            phase: Phase::Init,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn active(&self) -> &ActiveSet {
        &self.active
    }

    /// Lock the workspace. On conflict no lock was taken, so the caller
    /// must not attempt cleanup.
    pub fn acquire(&mut self) -> Result<()> {
        debug_assert_eq!(self.phase, Phase::Init);
        self.lock = Some(WorkspaceLock::acquire(&self.workspace)?);
        self.phase = Phase::Locked;
        debug!(workspace = %self.workspace.display(), "locked");
        Ok(())
    }

    /// Resolve the filters into this run's active set.
    pub fn filter(&mut self, spec: &FilterSpec) -> Result<()> {
        debug_assert_eq!(self.phase, Phase::Locked);
        self.phase = Phase::Filtering;
        self.active = spec.resolve(&self.registry)?;
        info!(selected = self.active.len(), "chaos commands selected");
        Ok(())
    }

    /// Run the timed loop, then revert anything left enabled.
    ///
    /// The revert hook runs after the loop exits for any reason other than
    /// dry-run, including a mid-loop fault error, so a cycle cut short
    /// never leaves the host permanently disrupted.
    pub fn run(&mut self, config: &RunConfig) -> Result<()> {
        debug_assert_eq!(self.phase, Phase::Filtering);
        self.phase = Phase::Running;
        let deadline = Instant::now() + config.total_timeout;
        let outcome = self.run_loop(config, deadline);
        self.phase = Phase::Draining;
        if !config.dry_run {
            self.registry.revert_all();
        }
        outcome
    }

    fn run_loop(&self, config: &RunConfig, deadline: Instant) -> Result<()> {
        let mut rng = rand::thread_rng();
        while Instant::now() < deadline {
            if self.ctx.cancel_requested() {
                info!("cancellation requested, stopping chaos loop");
                break;
            }
            if config.dry_run {
                info!("dry run, no chaos performed");
                break;
            }
            let Some(action) = self.active.choose(&mut rng).cloned() else {
                warn!("no chaos commands selected, nothing to run");
                break;
            };
            self.apply(&action, config.enablement_timeout)?;
            if config.run_once {
                break;
            }
        }
        Ok(())
    }

    fn apply(&self, action: &Action, window: Duration) -> Result<()> {
        let command = action.info().command_id.as_str();
        match action.kind() {
            ActionKind::OneShot => {
                info!(command, "running one-shot chaos action");
                action.fault().enable()
            }
            ActionKind::TwoPhase => {
                info!(command, window_secs = window.as_secs(), "enabling chaos action");
                action.fault().enable()?;
                thread::sleep(window);
                info!(command, "disabling chaos action");
                action.fault().disable()
            }
        }
    }

    /// Release the lock. Guaranteed by the caller to run once `acquire`
    /// succeeded, even when the run itself failed.
    pub fn cleanup(&mut self) -> Result<()> {
        if let Some(lock) = self.lock.take() {
            lock.release()?;
        }
        self.phase = Phase::CleanedUp;
        info!("chaos runner stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionProvider, Fault};
    use crate::error::HavocError;
    use crate::lock::LOCK_FILE;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingFault {
        enables: AtomicUsize,
        disables: AtomicUsize,
        fail_enable: bool,
    }

    impl Fault for CountingFault {
        fn enable(&self) -> Result<()> {
            self.enables.fetch_add(1, Ordering::SeqCst);
            if self.fail_enable {
                return Err(HavocError::Fault {
                    command: "injected".to_string(),
                    reason: "enable refused".to_string(),
                });
            }
            Ok(())
        }

        fn disable(&self) -> Result<()> {
            self.disables.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FixedProvider(Vec<Action>);

    impl ActionProvider for FixedProvider {
        fn actions(&self) -> Vec<Action> {
            self.0.clone()
        }
    }

    fn runner_with(dir: &TempDir, actions: Vec<Action>) -> Runner {
        let registry = Registry::new(&[&FixedProvider(actions)]);
        Runner::new(dir.path(), registry, RunContext::new())
    }

    fn config(total_secs: u64, window_millis: u64) -> RunConfig {
        RunConfig {
            total_timeout: Duration::from_secs(total_secs),
            enablement_timeout: Duration::from_millis(window_millis),
            run_once: false,
            dry_run: false,
        }
    }

    #[test]
    fn dry_run_performs_zero_actions_and_releases_lock() {
        let dir = TempDir::new().unwrap();
        let fault = Arc::new(CountingFault::default());
        let action = Action::two_phase("drop-all", "network", "", fault.clone());
        let mut runner = runner_with(&dir, vec![action]);

        runner.acquire().unwrap();
        runner.filter(&FilterSpec::default()).unwrap();
        let mut cfg = config(30, 0);
        cfg.dry_run = true;
        let start = Instant::now();
        runner.run(&cfg).unwrap();
        runner.cleanup().unwrap();

        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(fault.enables.load(Ordering::SeqCst), 0);
        assert_eq!(fault.disables.load(Ordering::SeqCst), 0);
        assert!(!dir.path().join(LOCK_FILE).exists());
        assert_eq!(runner.phase(), Phase::CleanedUp);
    }

    #[test]
    fn run_once_executes_a_single_cycle() {
        let dir = TempDir::new().unwrap();
        let fault = Arc::new(CountingFault::default());
        let action = Action::two_phase("drop-all", "network", "", fault.clone());
        let mut runner = runner_with(&dir, vec![action]);

        runner.acquire().unwrap();
        runner.filter(&FilterSpec::default()).unwrap();
        let mut cfg = config(60, 0);
        cfg.run_once = true;
        runner.run(&cfg).unwrap();
        runner.cleanup().unwrap();

        assert_eq!(fault.enables.load(Ordering::SeqCst), 1);
        // One disable from the cycle, one from the shutdown revert.
        assert_eq!(fault.disables.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn one_shot_action_is_not_reverted() {
        let dir = TempDir::new().unwrap();
        let fault = Arc::new(CountingFault::default());
        let action = Action::one_shot("kill-process", "kill", "", fault.clone());
        let mut runner = runner_with(&dir, vec![action]);

        runner.acquire().unwrap();
        runner.filter(&FilterSpec::default()).unwrap();
        let mut cfg = config(60, 0);
        cfg.run_once = true;
        runner.run(&cfg).unwrap();
        runner.cleanup().unwrap();

        assert_eq!(fault.enables.load(Ordering::SeqCst), 1);
        assert_eq!(fault.disables.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancellation_stops_loop_within_one_window() {
        let dir = TempDir::new().unwrap();
        let fault = Arc::new(CountingFault::default());
        let action = Action::two_phase("drop-all", "network", "", fault.clone());
        let registry = Registry::new(&[&FixedProvider(vec![action])]);
        let ctx = RunContext::new();
        let mut runner = Runner::new(dir.path(), registry, ctx.clone());

        runner.acquire().unwrap();
        runner.filter(&FilterSpec::default()).unwrap();

        let canceller = {
            let ctx = ctx.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                ctx.request_cancel();
            })
        };

        let start = Instant::now();
        runner.run(&config(30, 10)).unwrap();
        runner.cleanup().unwrap();
        canceller.join().unwrap();

        assert!(start.elapsed() < Duration::from_secs(10));
        // Every enable was matched by at least one disable: nothing left on.
        assert!(
            fault.disables.load(Ordering::SeqCst) >= fault.enables.load(Ordering::SeqCst)
        );
        assert!(!dir.path().join(LOCK_FILE).exists());
    }

    #[test]
    fn pre_set_cancel_flag_skips_all_actions() {
        let dir = TempDir::new().unwrap();
        let fault = Arc::new(CountingFault::default());
        let action = Action::two_phase("drop-all", "network", "", fault.clone());
        let registry = Registry::new(&[&FixedProvider(vec![action])]);
        let ctx = RunContext::new();
        ctx.request_cancel();
        let mut runner = Runner::new(dir.path(), registry, ctx);

        runner.acquire().unwrap();
        runner.filter(&FilterSpec::default()).unwrap();
        runner.run(&config(30, 0)).unwrap();
        runner.cleanup().unwrap();

        assert_eq!(fault.enables.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn empty_active_set_ends_clean() {
        let dir = TempDir::new().unwrap();
        let fault = Arc::new(CountingFault::default());
        let action = Action::two_phase("drop-all", "network", "", fault.clone());
        let mut runner = runner_with(&dir, vec![action]);

        runner.acquire().unwrap();
        let spec = FilterSpec {
            include_groups: Some("network".to_string()),
            exclude_groups: Some("network".to_string()),
            ..Default::default()
        };
        runner.filter(&spec).unwrap();
        assert!(runner.active().is_empty());

        let start = Instant::now();
        runner.run(&config(30, 0)).unwrap();
        runner.cleanup().unwrap();

        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(fault.enables.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failing_enable_aborts_run_but_still_reverts() {
        let dir = TempDir::new().unwrap();
        let fault = Arc::new(CountingFault {
            fail_enable: true,
            ..Default::default()
        });
        let action = Action::two_phase("drop-all", "network", "", fault.clone());
        let mut runner = runner_with(&dir, vec![action]);

        runner.acquire().unwrap();
        runner.filter(&FilterSpec::default()).unwrap();
        let err = runner.run(&config(30, 0)).unwrap_err();
        assert!(matches!(err, HavocError::Fault { .. }));

        // The shutdown hook still disabled the two-phase action.
        assert_eq!(fault.enables.load(Ordering::SeqCst), 1);
        assert_eq!(fault.disables.load(Ordering::SeqCst), 1);

        runner.cleanup().unwrap();
        assert!(!dir.path().join(LOCK_FILE).exists());
    }

    #[test]
    fn invalid_filter_leaves_lock_for_cleanup() {
        let dir = TempDir::new().unwrap();
        let fault = Arc::new(CountingFault::default());
        let action = Action::two_phase("drop-all", "network", "", fault);
        let mut runner = runner_with(&dir, vec![action]);

        runner.acquire().unwrap();
        let spec = FilterSpec {
            include_groups: Some("bogus".to_string()),
            ..Default::default()
        };
        assert!(runner.filter(&spec).is_err());
        assert!(dir.path().join(LOCK_FILE).exists());
        runner.cleanup().unwrap();
        assert!(!dir.path().join(LOCK_FILE).exists());
    }
}
