//! Subcommand argument definitions.

pub mod dataset;
pub mod fsi;
