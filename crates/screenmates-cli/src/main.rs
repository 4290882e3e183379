use std::path::PathBuf;

use clap::{Parser, Subcommand};
use screenmates_cli::cli::{
    print_response, run_command, CliCommand, CliConfig, CliContext, GroupCommand, Response,
    VaultKind,
};
use screenmates_core::constants::MONITORED_ACTIVITY;
use screenmates_core::tracing_setup::init_tracing;
use screenmates_core::WakeReason;

#[derive(Parser)]
#[command(name = "screenmates")]
#[command(about = "Drive the ScreenMates counter and sync engine from the command line")]
struct Cli {
    /// Pretty-print JSON output
    #[arg(long, short, global = true)]
    pretty: bool,

    /// Path to JSON config file
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Directory holding the shared state (overrides the config file)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// JSON file used as the record-store backend
    #[arg(long, global = true)]
    backend: Option<PathBuf>,

    /// Where the stable user id is kept
    #[arg(long, value_enum, global = true)]
    vault: Option<VaultKind>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the dashboard: counter, goal, streak, leaderboard
    Status,

    /// Deliver a threshold callback, as the usage monitor would
    Signal {
        /// Threshold event name, e.g. block_5
        event: String,
        /// Monitored activity name
        #[arg(long, default_value = MONITORED_ACTIVITY)]
        activity: String,
    },

    /// Reset the counter if the day has changed
    Rollover,

    /// Set the display name shown to the group
    Name { name: String },

    /// Upload this device's profile now
    Upload,

    /// Full refresh: upload, clean up duplicates, fetch the group
    Refresh {
        /// Trigger recorded in the report and logs
        #[arg(long, default_value = "manual")]
        reason: WakeReason,
    },

    /// Show the group leaderboard
    Leaderboard {
        /// Fetch from the backend instead of showing the cached board
        #[arg(long)]
        fetch: bool,
    },

    /// Manage the group
    #[command(subcommand)]
    Group(GroupCommands),

    /// Run a background sync pass and record it in the history
    Background,

    /// Show the background sync history
    History,

    /// List the checkpoints registered with the usage monitor
    Schedule,

    /// Simulate a remote change notification for a group
    Push { group_id: String },

    /// Turn milestone alerts on or off
    Notifications {
        #[arg(value_parser = clap::builder::BoolishValueParser::new())]
        enabled: bool,
    },

    /// Refresh periodically until Ctrl-C
    Watch {
        /// Seconds between refreshes (defaults to the configured interval)
        #[arg(long)]
        interval_secs: Option<u64>,
    },

    /// Forget name, group, counter and caches
    Reset,
}

#[derive(Subcommand)]
enum GroupCommands {
    /// Create a new group and join it
    Create,
    /// Join an existing group by code
    Join { code: String },
    /// Leave the current group
    Leave,
    /// Change the group's daily goal in blocks
    Goal { blocks: u32 },
    /// Show the current group
    Show,
}

fn main() {
    let mut cli = Cli::parse();
    init_tracing();

    let command = match cli.command.take() {
        Some(Commands::Status) => CliCommand::Status,
        Some(Commands::Signal { event, activity }) => CliCommand::Signal { event, activity },
        Some(Commands::Rollover) => CliCommand::Rollover,
        Some(Commands::Name { name }) => CliCommand::Name { name },
        Some(Commands::Upload) => CliCommand::Upload,
        Some(Commands::Refresh { reason }) => CliCommand::Refresh { reason },
        Some(Commands::Leaderboard { fetch }) => CliCommand::Leaderboard { fetch },
        Some(Commands::Group(group)) => CliCommand::Group(match group {
            GroupCommands::Create => GroupCommand::Create,
            GroupCommands::Join { code } => GroupCommand::Join { code },
            GroupCommands::Leave => GroupCommand::Leave,
            GroupCommands::Goal { blocks } => GroupCommand::Goal { blocks },
            GroupCommands::Show => GroupCommand::Show,
        }),
        Some(Commands::Background) => CliCommand::Background,
        Some(Commands::History) => CliCommand::History,
        Some(Commands::Schedule) => CliCommand::Schedule,
        Some(Commands::Push { group_id }) => CliCommand::Push { group_id },
        Some(Commands::Notifications { enabled }) => CliCommand::Notifications { enabled },
        Some(Commands::Watch { interval_secs }) => CliCommand::Watch { interval_secs },
        Some(Commands::Reset) => CliCommand::Reset,
        None => {
            eprintln!("No command specified. Use --help for usage.");
            std::process::exit(1);
        }
    };

    let config = load_config(&cli);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };

    let exit_code = runtime.block_on(async {
        let ctx = match CliContext::open(&config) {
            Ok(ctx) => ctx,
            Err(e) => {
                eprintln!("Error: {:#}", e);
                return 1;
            }
        };
        match run_command(&ctx, command).await {
            Ok(result) => {
                print_response(&Response::success(result), cli.pretty);
                0
            }
            Err(e) => {
                print_response(&Response::from_sync_error(&e), cli.pretty);
                1
            }
        }
    });
    std::process::exit(exit_code);
}

/// Load configuration from file, then apply command-line overrides
fn load_config(cli: &Cli) -> CliConfig {
    let mut config = match &cli.config {
        Some(path) => match CliConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {:#}", e);
                std::process::exit(1);
            }
        },
        None => CliConfig::with_defaults(),
    };

    if let Some(dir) = &cli.data_dir {
        config.core.data_dir = dir.clone();
    }
    if let Some(backend) = &cli.backend {
        config.backend_path = Some(backend.clone());
    }
    if let Some(vault) = cli.vault {
        config.vault = vault;
    }
    config
}
