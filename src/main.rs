// ABOUTME: Entry point for the keel CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands, ConfigAction};
use keel::config::RecordStore;
use keel::error::Result;
use keel::output::{Output, OutputMode};
use keel::selfupdate;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Upper bound for the background "new version" check.
const NOTIFY_TIMEOUT: Duration = Duration::from_secs(3);

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag; RUST_LOG wins when set
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };

    let notify = match cli.command {
        Commands::SelfUpdate | Commands::Version => None,
        _ if mode == OutputMode::Normal => Some(selfupdate::spawn_notify(NOTIFY_TIMEOUT)),
        _ => None,
    };

    let result = run(cli, mode).await;

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    // Only report a check that already finished; never hold up the command.
    if let Some(handle) = notify
        && handle.is_finished()
        && let Ok(Some(notice)) = handle.await
    {
        eprintln!("\n{notice}");
    }
}

async fn run(cli: Cli, mode: OutputMode) -> Result<()> {
    let output = Output::new(mode);
    let store = RecordStore::open_default();
    let name = commands::parse_name(cli.name.as_deref())?;

    match cli.command {
        Commands::Install(args) => commands::install(&store, name, args, output).await,
        Commands::Update {
            channel,
            target,
            check,
            yes,
            force,
        } => {
            let args = commands::UpdateArgs {
                channel,
                target,
                check,
                yes,
                force,
            };
            commands::update(&store, name.as_ref(), args, output).await
        }
        Commands::Status => commands::status(&store, name.as_ref(), output).await,
        Commands::Logs { follow } => commands::logs(&store, name.as_ref(), follow).await,
        Commands::Backup { force } => commands::backup(&store, name.as_ref(), force, output).await,
        Commands::Backups => commands::backups(&store, name.as_ref(), output).await,
        Commands::Restore { id, yes, force } => {
            commands::restore(&store, name.as_ref(), &id, yes, force, output).await
        }
        Commands::Rollback { yes, force } => {
            commands::rollback(&store, name.as_ref(), yes, force, output).await
        }
        Commands::Destroy { yes, force } => {
            commands::destroy(&store, name.as_ref(), yes, force, output).await
        }
        Commands::Prereqs { provider } => commands::prereqs(&store, &provider, output).await,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_show(&store, name.as_ref(), output),
            ConfigAction::Path => commands::config_path(&store, output),
        },
        Commands::SelfUpdate => commands::self_update(output).await,
        Commands::Version => commands::version(output),
    }
}
