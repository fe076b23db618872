//! Dataset document types.
//!
//! A [`Dataset`] is a multi-component document. Each component is optional.
//! Identity fields (`username`, `name`, `path`) and the inline `body` are
//! transient: they are stripped before a snapshot is stored and stamped back
//! on every load.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Dataset
// =============================================================================

/// A dataset document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    /// Owner username. Transient.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    /// Dataset name. Transient.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Content address of this snapshot. Transient.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    /// Content address of the previous snapshot, if any.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub previous_path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<Commit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure: Option<Structure>,
    /// Content address of the stored body blob.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub body_path: String,
    /// Inline body data. Transient.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viz: Option<Viz>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
}

impl Dataset {
    /// Stamp transient identity fields after a load.
    pub fn stamp_identity(&mut self, username: &str, name: &str, path: &str) {
        self.username = username.to_string();
        self.name = name.to_string();
        self.path = path.to_string();
    }

    /// Remove transient fields, leaving only what belongs in a snapshot.
    pub fn strip_transient(&mut self) {
        self.username.clear();
        self.name.clear();
        self.path.clear();
        self.body = None;
    }

    /// The body format declared by the structure, defaulting to JSON.
    pub fn body_format(&self) -> BodyFormat {
        self.structure
            .as_ref()
            .and_then(|st| st.format.parse().ok())
            .unwrap_or_default()
    }

    /// True if no component is present.
    pub fn is_empty(&self) -> bool {
        self.commit.is_none()
            && self.meta.is_none()
            && self.structure.is_none()
            && self.body.is_none()
            && self.body_path.is_empty()
            && self.viz.is_none()
            && self.transform.is_none()
    }
}

// =============================================================================
// Components
// =============================================================================

/// A commit message attached to a snapshot. Never materialized to disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    /// Commit time in RFC 3339 format.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

/// Descriptive metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    /// Any other metadata fields, preserved as written.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Structure and schema of the body.
///
/// `checksum`, `entries`, `length` and `depth` are derived from the body when
/// a snapshot is saved and never take part in change detection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Structure {
    /// Body format: `json` or `csv`.
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_config: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub checksum: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub entries: u64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub length: u64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub depth: u64,
}

/// Names of structure fields recomputed at save time.
pub const STRUCTURE_DERIVED_FIELDS: &[&str] = &["checksum", "entries", "length", "depth"];

/// A visualization template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viz {
    #[serde(default = "default_viz_format")]
    pub format: String,
    #[serde(default)]
    pub script: String,
}

/// A transform script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transform {
    #[serde(default = "default_transform_syntax")]
    pub syntax: String,
    #[serde(default)]
    pub script: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
}

impl Default for Viz {
    fn default() -> Self {
        Self {
            format: default_viz_format(),
            script: String::new(),
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            syntax: default_transform_syntax(),
            script: String::new(),
            config: None,
        }
    }
}

fn default_viz_format() -> String {
    "html".to_string()
}

fn default_transform_syntax() -> String {
    "starlark".to_string()
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

// =============================================================================
// Body format
// =============================================================================

/// Supported body encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyFormat {
    #[default]
    Json,
    Csv,
}

impl BodyFormat {
    /// File extension used for body files.
    pub fn extension(&self) -> &'static str {
        match self {
            BodyFormat::Json => "json",
            BodyFormat::Csv => "csv",
        }
    }
}

impl std::str::FromStr for BodyFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(BodyFormat::Json),
            "csv" => Ok(BodyFormat::Csv),
            other => Err(format!("unsupported body format '{}'", other)),
        }
    }
}

impl std::fmt::Display for BodyFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_meta_preserves_extra_fields() {
        let meta: Meta = serde_json::from_value(json!({
            "title": "movies",
            "license": {"type": "CC0"},
        }))
        .unwrap();
        assert_eq!(meta.title.as_deref(), Some("movies"));
        assert_eq!(meta.extra.get("license"), Some(&json!({"type": "CC0"})));

        let back = serde_json::to_value(&meta).unwrap();
        assert_eq!(back, json!({"title": "movies", "license": {"type": "CC0"}}));
    }

    #[test]
    fn test_strip_transient() {
        let mut ds = Dataset {
            username: "peer".to_string(),
            name: "movies".to_string(),
            path: "/mem/abc".to_string(),
            body: Some(json!([[1]])),
            meta: Some(Meta::default()),
            ..Default::default()
        };
        ds.strip_transient();
        assert!(ds.username.is_empty());
        assert!(ds.name.is_empty());
        assert!(ds.path.is_empty());
        assert!(ds.body.is_none());
        assert!(ds.meta.is_some());
    }

    #[test]
    fn test_body_format() {
        let mut ds = Dataset::default();
        assert_eq!(ds.body_format(), BodyFormat::Json);
        ds.structure = Some(Structure {
            format: "csv".to_string(),
            ..Default::default()
        });
        assert_eq!(ds.body_format(), BodyFormat::Csv);
        assert!("xlsx".parse::<BodyFormat>().is_err());
    }
}
