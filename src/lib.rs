pub mod batch;
pub mod commands;
pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod process;
pub mod registry;
pub mod report;
pub mod runner;
pub mod workspace;
