mod logging;
mod signals;

use clap::error::ErrorKind;
use clap::{CommandFactory, FromArgMatches, Parser};
use havoc_core::context::RunContext;
use havoc_core::registry::Registry;
use havoc_core::runner::{RunConfig, Runner};
use havoc_core::selection::FilterSpec;
use havoc_core::HavocError;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "havoc",
    about = "Run random chaos operations against this host for a bounded time window",
    version
)]
struct Cli {
    /// An existing directory, to be used as a workspace.
    #[arg(required_unless_present = "list_commands")]
    path: Option<PathBuf>,

    /// Enablement timeout in seconds: how long a two-phase action stays
    /// enabled before it is reverted.
    #[arg(short = 'e', long, value_name = "SECONDS", default_value_t = 10)]
    enablement_timeout: u64,

    /// Total timeout in seconds (defaults to the enablement timeout).
    #[arg(short = 't', long, value_name = "SECONDS")]
    total_timeout: Option<u64>,

    /// The number of rotated log backups to keep.
    #[arg(short = 'l', long, value_name = "NUMBER", default_value_t = 2)]
    log_count: u32,

    /// Select chaos from only a specified group or comma-separated set of
    /// groups. All groups are included by default.
    #[arg(long, value_name = "GROUPS")]
    include_group: Option<String>,

    /// Exclude a group or set of groups from selected chaos.
    #[arg(long, value_name = "GROUPS")]
    exclude_group: Option<String>,

    /// Select chaos from only a specified command or set of commands.
    #[arg(long, value_name = "COMMANDS")]
    include_command: Option<String>,

    /// Exclude a command or set of commands from selected chaos.
    #[arg(long, value_name = "COMMANDS")]
    exclude_command: Option<String>,

    /// Merge included commands without duplicates instead of the
    /// historical skip-batch-on-overlap behavior.
    #[arg(long)]
    dedup_commands: bool,

    /// Do not actually run chaos operations.
    #[arg(long)]
    dry_run: bool,

    /// Run a single command only.
    #[arg(long)]
    run_once: bool,

    /// Print the catalog of groups and commands as JSON and exit.
    #[arg(long)]
    list_commands: bool,
}

// ---------------------------------------------------------------------------
// Exit codes — one per operator-distinguishable failure (usage errors are
// exit code 2 via clap)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum RunExit {
    Clean,
    RuntimeFailure,
    WorkspaceNotFound,
    LockDenied,
}

impl RunExit {
    fn code(self) -> i32 {
        match self {
            RunExit::Clean => 0,
            RunExit::RuntimeFailure => 1,
            RunExit::WorkspaceNotFound => 3,
            RunExit::LockDenied => 4,
        }
    }

    fn from_error(err: &HavocError) -> Self {
        match err {
            HavocError::WorkspaceNotFound(_) => RunExit::WorkspaceNotFound,
            HavocError::LockConflict(_) | HavocError::LockIntegrity { .. } => RunExit::LockDenied,
            _ => RunExit::RuntimeFailure,
        }
    }
}

fn main() {
    let registry = Registry::with_default_providers();

    let mut cmd = Cli::command().after_help(catalog_help(&registry));
    let matches = cmd.get_matches_mut();
    let cli = match Cli::from_arg_matches(&matches) {
        Ok(cli) => cli,
        Err(e) => e.exit(),
    };

    if cli.run_once && cli.total_timeout.is_some() {
        cmd.error(
            ErrorKind::ArgumentConflict,
            "total-timeout is irrelevant if run-once is set",
        )
        .exit();
    }
    let total_timeout = cli.total_timeout.unwrap_or(cli.enablement_timeout);
    if total_timeout == 0 {
        cmd.error(
            ErrorKind::InvalidValue,
            "total-timeout must be greater than zero",
        )
        .exit();
    }
    if total_timeout < cli.enablement_timeout {
        cmd.error(
            ErrorKind::InvalidValue,
            "total-timeout can not be less than enablement-timeout",
        )
        .exit();
    }

    if cli.list_commands {
        if let Err(e) = print_catalog(&registry) {
            eprintln!("error: {e:#}");
            std::process::exit(RunExit::RuntimeFailure.code());
        }
        return;
    }

    let Some(workspace) = cli.path.clone() else {
        cmd.error(ErrorKind::MissingRequiredArgument, "path is required")
            .exit()
    };

    // Logging goes to the workspace; a bad path falls back to stderr and
    // fails properly at lock acquisition.
    if workspace.is_dir() {
        if let Err(e) = logging::init(&workspace, cli.log_count) {
            eprintln!("warning: falling back to stderr logging: {e:#}");
            logging::init_stderr();
        }
    } else {
        logging::init_stderr();
    }

    let ctx = RunContext::new();
    signals::install(ctx.clone());

    let mut runner = Runner::new(workspace.clone(), registry, ctx);
    if let Err(e) = runner.acquire() {
        // No lock was taken: exit without cleanup.
        eprintln!("error: {e}");
        std::process::exit(RunExit::from_error(&e).code());
    }
    tracing::info!(
        workspace = %workspace.display(),
        dry_run = cli.dry_run,
        "chaos runner started"
    );

    let spec = FilterSpec {
        include_groups: cli.include_group.clone(),
        exclude_groups: cli.exclude_group.clone(),
        include_commands: cli.include_command.clone(),
        exclude_commands: cli.exclude_command.clone(),
        dedup_commands: cli.dedup_commands,
    };
    let config = RunConfig {
        total_timeout: Duration::from_secs(total_timeout),
        enablement_timeout: Duration::from_secs(cli.enablement_timeout),
        run_once: cli.run_once,
        dry_run: cli.dry_run,
    };

    let result = runner.filter(&spec).and_then(|()| runner.run(&config));
    // Lock release is guaranteed once acquire succeeded, even when the run
    // failed.
    let cleanup = runner.cleanup();

    let exit = match result.and(cleanup) {
        Ok(()) => RunExit::Clean,
        Err(e) => {
            tracing::error!(error = %e, "chaos run failed");
            eprintln!("error: {e}");
            RunExit::from_error(&e)
        }
    };
    std::process::exit(exit.code());
}

// ---------------------------------------------------------------------------
// Catalog output
// ---------------------------------------------------------------------------

/// Help epilog listing every group and command, generated from the
/// registry so the help never drifts from the catalog.
fn catalog_help(registry: &Registry) -> String {
    let groups = registry.groups();
    let mut help = String::from("GROUPS: a comma-separated list of group names.\n");
    help.push_str(&format!("  Valid groups: {}\n\n", groups.join(", ")));
    help.push_str("COMMANDS: a comma-separated list of chaos commands:\n");
    for group in &groups {
        help.push_str(&format!("  Group: {group}\n"));
        for action in registry.commands_in_group(group) {
            let info = action.info();
            help.push_str(&format!("     {}: {}\n", info.command_id, info.description));
        }
        help.push('\n');
    }
    help
}

fn print_catalog(registry: &Registry) -> anyhow::Result<()> {
    let mut catalog = BTreeMap::new();
    for group in registry.groups() {
        let infos: Vec<_> = registry
            .commands_in_group(&group)
            .into_iter()
            .map(|a| a.info().clone())
            .collect();
        catalog.insert(group, infos);
    }
    println!("{}", serde_json::to_string_pretty(&catalog)?);
    Ok(())
}
