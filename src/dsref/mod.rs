//! Dataset references.
//!
//! A [`Ref`] names a dataset by `username/name`, optionally pinned to a
//! snapshot path. [`VersionInfo`] is the denormalized summary that resolvers
//! and the link registry hand around.

mod parse;
mod reference;

pub use parse::{BadCasePolicy, ParseError, Parser, Result, parse};
pub use reference::{FSI_PATH_PREFIX, ME, Ref, VersionInfo, fsi_dir, fsi_path, is_fsi_path};
