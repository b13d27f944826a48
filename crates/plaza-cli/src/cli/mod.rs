//! Command-line interface for plaza.

mod commands;
pub mod icons;

pub use commands::{is_verbose, run};
