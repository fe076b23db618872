//! Dataset documents and their content-addressed storage.

mod component;
#[allow(clippy::module_inception)]
mod dataset;
mod snapshot;

pub use component::{ComponentKind, UnknownComponent};
pub use dataset::{
    BodyFormat, Commit, Dataset, Meta, STRUCTURE_DERIVED_FIELDS, Structure, Transform, Viz,
};
pub use snapshot::{
    Result, SnapshotError, read_body, read_full_snapshot, read_snapshot, write_snapshot,
};
