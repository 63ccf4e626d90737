pub mod batch;
pub mod check;
pub mod clean;
pub mod common;
pub mod registry;
