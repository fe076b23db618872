//! Utility modules for dsvc-rs.

pub mod dedup;

pub use dedup::Dedup;
