//! Per-component files inside a working directory.
//!
//! Each working component has a small set of candidate file names. Reading
//! normalizes file contents through the typed component structs so the
//! result compares structurally with a snapshot-side container.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dataset::{BodyFormat, ComponentKind, Dataset, Meta, Structure, Transform, Viz};

use super::body::{decode_csv, encode_csv};
use super::component::{Component, ComponentContainer, ComponentState};
use super::error::{FsiError, Result};

// =============================================================================
// Formats
// =============================================================================

/// Encoding used for meta files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetaFormat {
    #[default]
    Json,
    Yaml,
}

impl MetaFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            MetaFormat::Json => "json",
            MetaFormat::Yaml => "yaml",
        }
    }
}

impl FromStr for MetaFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(MetaFormat::Json),
            "yaml" | "yml" => Ok(MetaFormat::Yaml),
            other => Err(format!(
                "unknown meta format '{}': expected 'json' or 'yaml'",
                other
            )),
        }
    }
}

impl fmt::Display for MetaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Formats used when a component has no existing file to follow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileOptions {
    pub meta_format: MetaFormat,
    /// Body format when the structure does not declare one.
    pub body_format: BodyFormat,
}

/// File names a component may be stored under.
pub fn candidate_files(kind: ComponentKind) -> &'static [&'static str] {
    match kind {
        ComponentKind::Commit => &[],
        ComponentKind::Meta => &["meta.json", "meta.yaml", "meta.yml"],
        ComponentKind::Structure => &["structure.json"],
        ComponentKind::Body => &["body.json", "body.csv"],
        ComponentKind::Viz => &["viz.html"],
        ComponentKind::Transform => &["transform.star"],
    }
}

async fn existing_files(dir: &Path, kind: ComponentKind) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for name in candidate_files(kind) {
        let path = dir.join(name);
        if tokio::fs::try_exists(&path)
            .await
            .map_err(FsiError::io(&path))?
        {
            found.push(path);
        }
    }
    Ok(found)
}

fn extension(path: &Path) -> &str {
    path.extension().and_then(|e| e.to_str()).unwrap_or_default()
}

// =============================================================================
// Read
// =============================================================================

/// Scan a working directory into a component container.
///
/// A file that cannot be read or parsed becomes a [`ComponentState::ParseError`]
/// entry; only failures to list the directory are returned as errors.
pub async fn read_components(dir: &Path) -> Result<ComponentContainer> {
    let mut container = ComponentContainer::new();

    // Structure is read before body so CSV bodies can use the schema.
    for kind in ComponentKind::WORKING {
        let files = existing_files(dir, kind).await?;
        let file = match files.as_slice() {
            [] => continue,
            [file] => file.clone(),
            [first, ..] => {
                let names: Vec<String> = files
                    .iter()
                    .map(|f| f.display().to_string())
                    .collect();
                container.set(Component {
                    kind,
                    file: Some(first.clone()),
                    state: ComponentState::ParseError(format!(
                        "conflicting files: {}",
                        names.join(", ")
                    )),
                });
                continue;
            }
        };

        let structure = container.structure();
        let state = match tokio::fs::read_to_string(&file).await {
            Ok(text) => match parse_component(kind, &file, &text, structure.as_ref()) {
                Ok(value) => ComponentState::Loaded(value),
                Err(message) => ComponentState::ParseError(message),
            },
            Err(e) => ComponentState::ParseError(e.to_string()),
        };
        if let ComponentState::ParseError(message) = &state {
            tracing::debug!(component = %kind, file = %file.display(), error = %message, "unreadable component file");
        }
        container.set(Component {
            kind,
            file: Some(file),
            state,
        });
    }
    Ok(container)
}

fn parse_component(
    kind: ComponentKind,
    file: &Path,
    text: &str,
    structure: Option<&Structure>,
) -> std::result::Result<Value, String> {
    let value = match kind {
        ComponentKind::Meta => {
            let meta: Meta = match extension(file) {
                "yaml" | "yml" => serde_yaml::from_str(text).map_err(|e| e.to_string())?,
                _ => serde_json::from_str(text).map_err(|e| e.to_string())?,
            };
            serde_json::to_value(meta)
        }
        ComponentKind::Structure => {
            let structure: Structure = serde_json::from_str(text).map_err(|e| e.to_string())?;
            serde_json::to_value(structure)
        }
        ComponentKind::Body => match extension(file) {
            "csv" => return decode_csv(text, structure),
            _ => return serde_json::from_str(text).map_err(|e| e.to_string()),
        },
        ComponentKind::Viz => serde_json::to_value(Viz {
            script: text.to_string(),
            ..Viz::default()
        }),
        ComponentKind::Transform => serde_json::to_value(Transform {
            script: text.to_string(),
            ..Transform::default()
        }),
        ComponentKind::Commit => return Err("commits are not stored on disk".to_string()),
    };
    value.map_err(|e| e.to_string())
}

/// Read a working directory as a dataset document.
///
/// Fails with the component and file name if any component file is malformed.
pub async fn read_dir(dir: &Path) -> Result<Dataset> {
    read_components(dir).await?.to_dataset()
}

// =============================================================================
// Write
// =============================================================================

/// A component that could not be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteFailure {
    pub component: ComponentKind,
    pub message: String,
}

/// Outcome of writing several components.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    pub written: Vec<PathBuf>,
    pub failures: Vec<WriteFailure>,
}

/// Write one component's file, replacing any alternative file for it.
///
/// Meta keeps the format of an existing meta file. The body follows the
/// structure's declared format.
pub async fn write_component(
    dir: &Path,
    component: &Component,
    structure: Option<&Structure>,
    options: FileOptions,
) -> Result<PathBuf> {
    let kind = component.kind;
    let value = component.value().ok_or_else(|| FsiError::Component {
        component: kind,
        file: component.file.clone().unwrap_or_default(),
        message: component.parse_error().unwrap_or_default().to_string(),
    })?;
    let fail = |file: &Path, message: String| FsiError::Component {
        component: kind,
        file: file.to_path_buf(),
        message,
    };

    let file = match kind {
        ComponentKind::Commit => return Err(FsiError::NotMaterialized { component: kind }),
        ComponentKind::Meta => match existing_files(dir, kind).await?.as_slice() {
            [existing] => existing.clone(),
            _ => dir.join(format!("meta.{}", options.meta_format.extension())),
        },
        ComponentKind::Body => {
            let format = structure
                .and_then(|st| st.format.parse::<BodyFormat>().ok())
                .unwrap_or(options.body_format);
            dir.join(format!("body.{}", format.extension()))
        }
        _ => dir.join(candidate_files(kind)[0]),
    };

    let text = match kind {
        ComponentKind::Meta if matches!(extension(&file), "yaml" | "yml") => {
            serde_yaml::to_string(value).map_err(|e| fail(&file, e.to_string()))?
        }
        ComponentKind::Body if extension(&file) == "csv" => {
            encode_csv(value, structure).map_err(|e| fail(&file, e))?
        }
        ComponentKind::Viz => {
            let viz: Viz =
                serde_json::from_value(value.clone()).map_err(|e| fail(&file, e.to_string()))?;
            viz.script
        }
        ComponentKind::Transform => {
            let transform: Transform =
                serde_json::from_value(value.clone()).map_err(|e| fail(&file, e.to_string()))?;
            transform.script
        }
        _ => {
            let mut text =
                serde_json::to_string_pretty(value).map_err(|e| fail(&file, e.to_string()))?;
            text.push('\n');
            text
        }
    };

    tokio::fs::write(&file, text)
        .await
        .map_err(FsiError::io(&file))?;

    for other in existing_files(dir, kind).await? {
        if other != file {
            remove_if_exists(&other).await?;
        }
    }
    Ok(file)
}

/// Write every working component of a container, collecting failures.
pub async fn write_components(
    dir: &Path,
    container: &ComponentContainer,
    options: FileOptions,
) -> WriteReport {
    let structure = container.structure();
    let mut report = WriteReport::default();
    for kind in ComponentKind::WORKING {
        let Some(component) = container.get(kind) else {
            continue;
        };
        match write_component(dir, component, structure.as_ref(), options).await {
            Ok(file) => report.written.push(file),
            Err(e) => {
                tracing::warn!(component = %kind, dir = %dir.display(), error = %e, "failed to write component");
                report.failures.push(WriteFailure {
                    component: kind,
                    message: e.to_string(),
                });
            }
        }
    }
    report
}

/// Delete every file a component may be stored under. Returns the removed files.
pub async fn delete_component(dir: &Path, kind: ComponentKind) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    for file in existing_files(dir, kind).await? {
        if remove_if_exists(&file).await? {
            removed.push(file);
        }
    }
    Ok(removed)
}

async fn remove_if_exists(path: &Path) -> Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(FsiError::io(path)(e)),
    }
}
