//! The closed set of dataset component kinds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One named part of a dataset document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Commit,
    Meta,
    Structure,
    Body,
    Viz,
    Transform,
}

impl ComponentKind {
    /// Every component kind.
    pub const ALL: [ComponentKind; 6] = [
        ComponentKind::Commit,
        ComponentKind::Meta,
        ComponentKind::Structure,
        ComponentKind::Body,
        ComponentKind::Viz,
        ComponentKind::Transform,
    ];

    /// Components that live on disk in a working directory, in status order.
    ///
    /// The commit is repository-only and never diffed.
    pub const WORKING: [ComponentKind; 5] = [
        ComponentKind::Meta,
        ComponentKind::Structure,
        ComponentKind::Viz,
        ComponentKind::Transform,
        ComponentKind::Body,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Commit => "commit",
            ComponentKind::Meta => "meta",
            ComponentKind::Structure => "structure",
            ComponentKind::Body => "body",
            ComponentKind::Viz => "viz",
            ComponentKind::Transform => "transform",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a component.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown component '{0}': expected one of commit, meta, structure, body, viz, transform")]
pub struct UnknownComponent(pub String);

impl FromStr for ComponentKind {
    type Err = UnknownComponent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "commit" | "cm" => Ok(ComponentKind::Commit),
            "meta" | "md" => Ok(ComponentKind::Meta),
            "structure" | "st" => Ok(ComponentKind::Structure),
            "body" | "bd" => Ok(ComponentKind::Body),
            "viz" | "vz" => Ok(ComponentKind::Viz),
            "transform" | "tf" => Ok(ComponentKind::Transform),
            other => Err(UnknownComponent(other.to_string())),
        }
    }
}
