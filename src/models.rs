//! Data types shared by the workspace, runner and batch layers

pub mod outcome;
pub mod task;

pub use outcome::{CheckResult, FailureCategory, Outcome};
pub use task::Task;
