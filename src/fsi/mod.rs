//! Filesystem integration: working directories linked to datasets.
//!
//! A linked directory holds one file per component. [`Fsi`] checks datasets
//! out into directories, reports component-level status against the last
//! snapshot, writes and restores component files, and saves directories back
//! as new snapshots. [`LinkRegistry`] keeps the marker file and the repository
//! index in agreement.

mod body;
mod checkout;
mod component;
mod component_files;
mod error;
#[allow(clippy::module_inception)]
mod fsi;
mod init;
mod link;
mod restore;
mod status;

pub use body::{decode_csv, encode_csv};
pub use checkout::CheckoutResult;
pub use component::{Component, ComponentContainer, ComponentState};
pub use component_files::{
    FileOptions, MetaFormat, WriteFailure, WriteReport, candidate_files, delete_component,
    read_components, read_dir, write_component, write_components,
};
pub use error::{FsiError, Result};
pub use fsi::Fsi;
pub use link::{LINK_MARKER, LinkRegistry, LinkState, read_marker};
pub use status::{ChangeType, StatusItem, diff, is_clean};
