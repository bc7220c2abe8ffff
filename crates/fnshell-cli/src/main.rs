//! fnshell CLI
//!
//! Deploys a throwaway shell function, then runs every line read from stdin
//! on it and prints the output. The function is deleted when stdin ends.
//!
//! Usage:
//!   fnshell                       Interactive prompt (Ctrl-D or Ctrl-C to quit)
//!   echo 'uname -a' | fnshell     Run piped commands
//!   fnshell --timeout 300         Allow commands to run for five minutes

use std::future::Future;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::anyhow;
use clap::Parser;
use fnshell::{
    DEFAULT_FUNCTION_NAME, LocalDeployer, Readline, ReplLoop, Session, SessionConfig,
    colored_prompt,
};
use tokio::io::BufReader;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// fnshell - a shell whose commands run inside a throwaway function
#[derive(Parser, Debug)]
#[command(name = "fnshell", version)]
#[command(about = "Run shell commands on a throwaway function, one line at a time")]
struct Args {
    /// Working directory
    #[arg(long, value_name = "DIR")]
    chdir: Option<PathBuf>,

    /// Log level
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: tracing::Level,

    /// Timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 60)]
    timeout: u64,

    /// Name the function is deployed under
    #[arg(long, default_value = DEFAULT_FUNCTION_NAME)]
    name: String,

    /// Directory to create the scratch directory in
    #[arg(long, value_name = "DIR")]
    scratch_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Logs go to stderr; stdout only carries command output
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(args.log_level.into()))
        .init();

    // A stdin read parked on the blocking pool would stall runtime shutdown.
    let code = match run(args).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("fnshell: error: {e}");
            1
        }
    };
    std::process::exit(code);
}

async fn run(args: Args) -> anyhow::Result<()> {
    if let Some(dir) = &args.chdir {
        std::env::set_current_dir(dir)
            .map_err(|e| anyhow!("cannot change directory to {}: {e}", dir.display()))?;
    }

    let config = SessionConfig {
        function_name: args.name,
        timeout: Duration::from_secs(args.timeout),
        scratch_root: args.scratch_dir,
    };
    let session = Session::with_defaults(LocalDeployer::new(), config);

    // Installed before deploying so an early Ctrl-C still reaches teardown
    let shutdown = shutdown_signal()?;

    if std::io::stdin().is_terminal() {
        let lines = Readline::new(colored_prompt("fnshell"))?;
        let mut repl = ReplLoop::from_lines(lines, tokio::io::stdout());
        session.run_until(&mut repl, shutdown).await?;
    } else {
        let mut repl = ReplLoop::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout());
        session.run_until(&mut repl, shutdown).await?;
    }
    Ok(())
}

#[cfg(unix)]
fn shutdown_signal() -> std::io::Result<impl Future<Output = ()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => {
                tracing::info!("Received Ctrl+C, ending session");
            }
            _ = terminate.recv() => {
                tracing::info!("Received SIGTERM, ending session");
            }
        }
    })
}

#[cfg(not(unix))]
fn shutdown_signal() -> std::io::Result<impl Future<Output = ()>> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    })
}
