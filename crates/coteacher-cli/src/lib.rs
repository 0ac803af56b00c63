// Library interface for coteacher-cli so integration tests can reach the
// command parser and themes. main.rs declares the same files as modules,
// hence the path attributes.

#[path = "commands.rs"]
pub mod commands;

#[path = "theme.rs"]
pub mod theme;

pub use commands::{handle_command, CommandResult};
pub use theme::Theme;
