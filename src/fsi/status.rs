//! Component-level diff between a snapshot and a working directory.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::dataset::ComponentKind;

use super::component::ComponentContainer;

/// How a component differs between history and disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// On disk only.
    Add,
    Modified,
    /// In history only.
    Removed,
    Unmodified,
    /// The disk file could not be read.
    #[serde(rename = "parse error")]
    ParseError,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Add => "add",
            ChangeType::Modified => "modified",
            ChangeType::Removed => "removed",
            ChangeType::Unmodified => "unmodified",
            ChangeType::ParseError => "parse error",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of a status report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusItem {
    pub component: ComponentKind,
    pub change: ChangeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Compare two containers component by component, in status order.
///
/// Components absent on both sides produce no row. Callers are expected to
/// have dropped derived and unmaterialized values first.
pub fn diff(history: &ComponentContainer, disk: &ComponentContainer) -> Vec<StatusItem> {
    let mut items = Vec::new();
    for kind in ComponentKind::WORKING {
        let old = history.get(kind);
        let new = disk.get(kind);
        let file = new.and_then(|c| c.file.clone());

        let (change, message) = match (old, new) {
            (None, None) => continue,
            (_, Some(c)) if c.parse_error().is_some() => (
                ChangeType::ParseError,
                c.parse_error().map(str::to_string),
            ),
            (None, Some(_)) => (ChangeType::Add, None),
            (Some(_), None) => (ChangeType::Removed, None),
            (Some(a), Some(b)) if a.value() == b.value() => (ChangeType::Unmodified, None),
            (Some(_), Some(_)) => (ChangeType::Modified, None),
        };
        items.push(StatusItem {
            component: kind,
            change,
            file,
            message,
        });
    }
    items
}

/// True if every row is unmodified.
pub fn is_clean(items: &[StatusItem]) -> bool {
    items.iter().all(|item| item.change == ChangeType::Unmodified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsi::component::{Component, ComponentState};
    use serde_json::json;

    fn container(entries: &[(ComponentKind, serde_json::Value)]) -> ComponentContainer {
        let mut c = ComponentContainer::new();
        for (kind, value) in entries {
            c.set(Component::loaded(*kind, value.clone()));
        }
        c
    }

    #[test]
    fn test_diff_classifies_each_component() {
        let history = container(&[
            (ComponentKind::Meta, json!({"title": "a"})),
            (ComponentKind::Structure, json!({"format": "json"})),
            (ComponentKind::Viz, json!({"format": "html", "script": ""})),
        ]);
        let mut disk = container(&[
            (ComponentKind::Meta, json!({"title": "b"})),
            (ComponentKind::Structure, json!({"format": "json"})),
            (ComponentKind::Body, json!([[1]])),
        ]);
        disk.set(Component {
            kind: ComponentKind::Transform,
            file: Some(PathBuf::from("/work/transform.star")),
            state: ComponentState::ParseError("bad".to_string()),
        });

        let items = diff(&history, &disk);
        let changes: Vec<(ComponentKind, ChangeType)> =
            items.iter().map(|i| (i.component, i.change)).collect();
        assert_eq!(
            changes,
            vec![
                (ComponentKind::Meta, ChangeType::Modified),
                (ComponentKind::Structure, ChangeType::Unmodified),
                (ComponentKind::Viz, ChangeType::Removed),
                (ComponentKind::Transform, ChangeType::ParseError),
                (ComponentKind::Body, ChangeType::Add),
            ]
        );
        assert_eq!(items[3].message.as_deref(), Some("bad"));
        assert!(!is_clean(&items));
    }

    #[test]
    fn test_commit_is_never_compared() {
        let history = container(&[(ComponentKind::Commit, json!({"title": "x"}))]);
        assert!(diff(&history, &ComponentContainer::new()).is_empty());
    }

    #[test]
    fn test_serialized_change_names() {
        for change in [
            ChangeType::Add,
            ChangeType::Modified,
            ChangeType::Removed,
            ChangeType::Unmodified,
            ChangeType::ParseError,
        ] {
            assert_eq!(serde_json::to_value(change).unwrap(), json!(change.as_str()));
        }
        assert_eq!(ChangeType::ParseError.to_string(), "parse error");
    }
}
