mod loader;

pub use loader::{LoadError, Loader, Result};
