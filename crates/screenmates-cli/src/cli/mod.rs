pub mod commands;
pub mod config;
pub mod output;

pub use commands::{run_command, CliCommand, CliContext, GroupCommand};
pub use config::{CliConfig, VaultKind};
pub use output::{print_response, Response};
