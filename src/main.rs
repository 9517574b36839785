use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

mod cli;
mod core;
mod daemon;
mod icons;
mod providers;

#[derive(Parser)]
#[command(name = "prolific-watch")]
#[command(author, version, about = "Desktop alerts for newly published Prolific studies")]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the watcher daemon
    Daemon,

    /// Show the last fetched studies
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Trigger an immediate check via D-Bus
    Refresh,

    /// Pass one intercepted request (JSON on stdin) to the daemon
    Capture,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Set by systemd when the service's output is connected to the journal.
    let journald = std::env::var_os("JOURNAL_STREAM")
        .and_then(|_| tracing_journald::layer().ok());

    let fmt_layer = match (journald.is_some(), json) {
        (true, _) => None,
        (false, true) => Some(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(io::stderr)
                .boxed(),
        ),
        (false, false) => Some(tracing_subscriber::fmt::layer().with_writer(io::stderr).boxed()),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(journald)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Daemon => {
            init_logging(cli.json_logs);
            daemon::run().await
        }
        Commands::Status { json } => {
            init_logging(cli.json_logs);
            cli::status::run(json).await
        }
        Commands::Refresh => {
            init_logging(cli.json_logs);
            cli::refresh::run().await
        }
        Commands::Capture => {
            init_logging(cli.json_logs);
            cli::capture::run().await
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
    }
}
