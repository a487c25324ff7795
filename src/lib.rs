//! Replays a window of commit history and measures how much test time
//! regression test selection saves over running the full suite.

pub mod cli;
pub mod command;
pub mod config;
pub mod driver;
pub mod error;
pub mod model;
pub mod runner;
pub mod summary;
pub mod table;
pub mod walker;
pub mod workspace;

pub use driver::{Harness, TargetReport};
pub use error::{HarnessError, Result};
