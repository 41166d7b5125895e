// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`launcher`] defines the capability interface the job state machine
//!   depends on (`ProcessLauncher`, `RunningProcess`) and the value types that
//!   cross it.
//! - [`command`] is the production launcher using `tokio::process::Command`.
//! - [`output`] holds the bounded buffer that captures process output.

pub mod command;
pub mod launcher;
pub mod output;

pub use command::TokioLauncher;
pub use launcher::{
    CommandSpec, ExitInfo, ProcessEnv, ProcessLauncher, RunningProcess, TermSignal,
};
pub use output::OutputSink;
