//! The application root and its method groups.

#[allow(clippy::module_inception)]
mod app;
mod dataset_methods;
mod fsi_methods;

pub use app::{App, AppContext, AppError, Result};
pub use dataset_methods::{DatasetMethods, ResolveOutput};
pub use fsi_methods::FsiMethods;
