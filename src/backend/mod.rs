//! Collaborator interfaces consumed by the core, with in-memory and on-disk
//! implementations.

mod event_bus;
mod filesystem;
mod json_file;
mod local_filesystem;
mod logbook;
mod memory_filesystem;
mod remote;
mod repo_index;

pub use event_bus::{BroadcastBus, Event, EventBus, NoopBus};
pub use filesystem::{Filesystem, FilesystemError, content_address, object_hash};
pub use json_file::JsonFileError;
pub use local_filesystem::LocalFilesystem;
pub use logbook::{DatasetLog, FileLogbook, LogEntry, Logbook, LogbookError, MemoryLogbook};
pub use memory_filesystem::MemoryFilesystem;
pub use remote::{MemoryRemote, RemoteError, RemoteTransport};
pub use repo_index::{FileRepoIndex, IndexError, MemoryRepoIndex, RepoIndex};
