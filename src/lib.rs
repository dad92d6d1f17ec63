//! Pipeline execution and job control for a small interactive shell.
//!
//! A parsed [`Script`] is handed to [`run_pipeline`], which forks one process
//! per stage, wires pipes and redirections, and either waits for the stages
//! or records them as a background job in the [`Session`]'s job table.

pub mod builtin;
pub mod env;
pub mod error;
pub mod eval;
pub mod job;
pub mod parser;
pub mod pipe;
pub mod session;
pub mod types;

pub use error::{Result, ShellError};
pub use eval::run_pipeline;
pub use parser::parse;
pub use session::Session;
pub use types::{Command, CommandHolder, Flags, Script};
