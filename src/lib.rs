//! dsvc-rs - versioned datasets with working directory checkouts.
//!
//! Datasets are stored as content-addressed snapshots and named by
//! `username/name` references. A reference resolves through a chain of
//! backends (version cache, local index, logbook, remotes) and can be checked
//! out into a directory of plain component files, linked back to the
//! repository so edits can be diffed, restored and saved.

pub mod app;
pub mod backend;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod dsref;
pub mod fsi;
pub mod load;
pub mod repo;
pub mod resolve;
pub mod util;

pub use app::{App, AppContext, AppError};
pub use dataset::{ComponentKind, Dataset};
pub use dsref::{Ref, VersionInfo};
