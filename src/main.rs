use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// Use mimalloc as the global allocator for the binary (non-Windows only)
#[cfg(not(windows))]
#[global_allocator]
static ALLOC: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod contact;
mod controller;
mod error;
mod plan;
mod scheduler;

// Test helpers for binary tests
#[cfg(any(test, feature = "test-internals"))]
mod test_helpers;

use controller::NetemController;
use plan::ContactPlan;
use scheduler::{RunOutcome, Scheduler};

#[derive(Parser, Debug)]
#[command(
    name = "ccm",
    author,
    version,
    disable_version_flag = true,
    about = "Contact plan manager: drives scheduled link windows in an emulated network",
    override_usage = "ccm [OPTIONS] PLAN_FILE"
)]
struct Cli {
    /// Print the version and exit
    #[arg(short = 'v', long = "version", action = clap::ArgAction::SetTrue)]
    print_version: bool,

    /// Contact plan file to load
    #[arg(required_unless_present = "print_version")]
    plan_file: Option<String>,

    /// Emulation session whose links the plan drives
    #[arg(short = 's', long = "session", default_value = "1")]
    session: u32,

    /// Override the plan's loop directive
    #[arg(short = 'l', long = "loop")]
    loop_override: Option<bool>,

    /// Namespace prefix of the session's nodes
    #[arg(long = "ns-prefix", default_value = netem_link::DEFAULT_NS_PREFIX)]
    ns_prefix: String,

    /// Enforce bandwidth with a TBF qdisc instead of netem-only rate shaping
    #[arg(long = "tbf")]
    tbf: bool,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let args = Cli::parse();
    if args.print_version {
        let version = env!("CARGO_PKG_VERSION");
        let git_hash = env!("GIT_HASH");
        let git_branch = env!("GIT_BRANCH");
        let git_dirty = env!("GIT_DIRTY");

        println!(
            "{} ({}@{}{}) [{}]",
            version,
            git_branch,
            git_hash,
            git_dirty,
            env!("CARGO_PKG_NAME")
        );
        return Ok(());
    }

    let plan_file = args.plan_file.as_deref().expect("required");

    let mut plan = ContactPlan::load(plan_file)
        .await
        .with_context(|| format!("load contact plan '{plan_file}'"))?;
    if let Some(loop_override) = args.loop_override {
        plan.set_loop(loop_override);
    }
    info!("loaded {plan} from {plan_file}");

    let controller = NetemController::connect(args.session, &args.ns_prefix, args.tbf)
        .context("connect to emulation session")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    spawn_shutdown_listener(shutdown_tx);

    let mut scheduler = Scheduler::new(plan, controller, shutdown_rx);
    match scheduler.run().await {
        RunOutcome::Finished => info!("plan finished"),
        RunOutcome::Interrupted => info!("stopped at t={}", scheduler.current_time()),
    }
    Ok(())
}

/// Fan SIGINT/SIGTERM into the shutdown channel the scheduler waits on.
/// The sender must stay alive until a signal arrives: the scheduler treats
/// a closed channel as a shutdown request.
fn spawn_shutdown_listener(tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(()) => {
                info!("shutdown signal received");
                let _ = tx.send(true);
            }
            Err(err) => {
                warn!("cannot listen for shutdown signals: {err}");
                // Hold the sender open; closing it would stop the scheduler
                std::future::pending::<()>().await
            }
        }
    });
}

async fn wait_for_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res,
            _ = term.recv() => Ok(()),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}
