//! Command handlers
//!
//! Each subcommand lives in its own module and receives the loaded
//! configuration together with the [`OutputFormatter`](crate::cli::OutputFormatter).

mod check;
mod run;

pub use check::handle_check_command;
pub use run::{RunOptions, handle_run_command};
