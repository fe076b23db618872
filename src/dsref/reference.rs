//! Dataset references and version summaries.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Username that stands in for the caller's own identity.
///
/// Rewritten before any resolver sees the reference; never persisted.
pub const ME: &str = "me";

/// Prefix marking a version path that lives in a linked working directory.
pub const FSI_PATH_PREFIX: &str = "/fsi";

// =============================================================================
// Ref
// =============================================================================

/// A human-addressable pointer to a dataset, optionally pinned to a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ref {
    /// Stable lineage identifier that survives renames.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub init_id: String,
    /// Owner of the dataset.
    pub username: String,
    /// Dataset name.
    pub name: String,
    /// Content address of a snapshot. Empty until resolved.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
}

impl Ref {
    /// Create an unresolved reference from a username and name.
    pub fn new(username: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            init_id: String::new(),
            username: username.into(),
            name: name.into(),
            path: String::new(),
        }
    }

    /// Set the version path (builder pattern).
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// The `username/name` alias.
    pub fn alias(&self) -> String {
        format!("{}/{}", self.username, self.name)
    }

    /// The alias plus `@path` when a path is set.
    pub fn human(&self) -> String {
        if self.path.is_empty() {
            self.alias()
        } else {
            format!("{}@{}", self.alias(), self.path)
        }
    }

    /// True if the reference uses the contextual `me` username.
    pub fn is_me(&self) -> bool {
        self.username == ME
    }

    /// True if neither an alias nor an init id is present.
    pub fn is_empty(&self) -> bool {
        self.username.is_empty() && self.name.is_empty() && self.init_id.is_empty()
    }

    /// True if the reference names a dataset by alias.
    pub fn has_alias(&self) -> bool {
        !self.username.is_empty() && !self.name.is_empty()
    }

    /// True if the version path points into a linked working directory.
    pub fn is_fsi(&self) -> bool {
        is_fsi_path(&self.path)
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.human())
    }
}

// =============================================================================
// VersionInfo
// =============================================================================

/// Denormalized, read-mostly summary of one dataset version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub init_id: String,
    pub username: String,
    pub name: String,
    /// Content address of the head snapshot. Empty when there is no history.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    /// Linked working directory, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fsi_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_title: Option<String>,
    /// Commit time in RFC 3339 format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_time: Option<String>,
}

impl VersionInfo {
    /// Create a summary for an identity with no history and no link.
    pub fn new(
        init_id: impl Into<String>,
        username: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            init_id: init_id.into(),
            username: username.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// The `username/name` alias.
    pub fn alias(&self) -> String {
        format!("{}/{}", self.username, self.name)
    }

    /// Project this summary back into a reference.
    pub fn simple_ref(&self) -> Ref {
        Ref {
            init_id: self.init_id.clone(),
            username: self.username.clone(),
            name: self.name.clone(),
            path: self.path.clone(),
        }
    }

    /// True if the identity has at least one snapshot.
    pub fn has_history(&self) -> bool {
        !self.path.is_empty()
    }
}

// =============================================================================
// FSI path convention
// =============================================================================

/// True if `path` names a working directory rather than a content address.
pub fn is_fsi_path(path: &str) -> bool {
    path == FSI_PATH_PREFIX || path.starts_with(&format!("{}/", FSI_PATH_PREFIX))
}

/// Build the version path for a linked working directory.
pub fn fsi_path(dir: &Path) -> String {
    let dir = dir.to_string_lossy();
    format!("{}/{}", FSI_PATH_PREFIX, dir.trim_start_matches('/'))
}

/// Recover the working directory from a version path, if it is one.
pub fn fsi_dir(path: &str) -> Option<PathBuf> {
    let rest = path.strip_prefix(FSI_PATH_PREFIX)?;
    if rest.is_empty() || !rest.starts_with('/') {
        return None;
    }
    Some(PathBuf::from(rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_and_human() {
        let r = Ref::new("peer", "movies");
        assert_eq!(r.alias(), "peer/movies");
        assert_eq!(r.human(), "peer/movies");

        let r = r.with_path("/mem/abc");
        assert_eq!(r.human(), "peer/movies@/mem/abc");
        assert_eq!(r.to_string(), "peer/movies@/mem/abc");
    }

    #[test]
    fn test_fsi_path_roundtrip() {
        let dir = Path::new("/home/peer/movies");
        let path = fsi_path(dir);
        assert_eq!(path, "/fsi/home/peer/movies");
        assert!(is_fsi_path(&path));
        assert_eq!(fsi_dir(&path), Some(dir.to_path_buf()));
    }

    #[test]
    fn test_content_address_is_not_fsi() {
        assert!(!is_fsi_path("/mem/abc"));
        assert!(!is_fsi_path("/fsitest/abc"));
        assert_eq!(fsi_dir("/mem/abc"), None);
    }

    #[test]
    fn test_version_info_simple_ref() {
        let mut info = VersionInfo::new("init-1", "peer", "movies");
        assert!(!info.has_history());
        info.path = "/mem/abc".to_string();
        let r = info.simple_ref();
        assert_eq!(r.init_id, "init-1");
        assert_eq!(r.human(), "peer/movies@/mem/abc");
    }
}
