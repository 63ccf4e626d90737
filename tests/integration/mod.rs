//! Integration tests for depcheck
//!
//! These drive the real process executor with small `sh` scripts standing in
//! for the scaffold and verification tools, so they only run on unix.

#[cfg(unix)]
pub mod batch_pipeline;
#[cfg(unix)]
pub mod helpers;
#[cfg(unix)]
pub mod single_check;
