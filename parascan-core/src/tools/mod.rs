//! Tool integration module

pub mod catalog;
pub mod command;
pub mod runner;

pub use catalog::{ToolKind, ToolSpec, default_tools};
pub use command::{CommandBuilder, Invocation, normalize_model_name};
pub use runner::{ExitCodeTable, ProcessOutput, ToolRunner};
