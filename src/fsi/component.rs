//! Component containers: one optional slot per component kind.
//!
//! Values are held as normalized JSON so containers built from a stored
//! snapshot and from a working directory compare structurally.

use std::path::PathBuf;

use serde_json::Value;

use crate::dataset::{
    ComponentKind, Dataset, Meta, STRUCTURE_DERIVED_FIELDS, Structure, Transform, Viz,
};

use super::error::{FsiError, Result};

/// Fields that exist only in snapshots, per component.
const UNMATERIALIZED_FIELDS: &[(ComponentKind, &[&str])] = &[
    (ComponentKind::Viz, &["format"]),
    (ComponentKind::Transform, &["syntax", "config"]),
];

/// The contents of one component.
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentState {
    /// Parsed and normalized value.
    Loaded(Value),
    /// The component's file exists but could not be read.
    ParseError(String),
}

/// One component of a dataset, from a snapshot or from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub kind: ComponentKind,
    /// File the component was read from. `None` for snapshot components.
    pub file: Option<PathBuf>,
    pub state: ComponentState,
}

impl Component {
    pub fn loaded(kind: ComponentKind, value: Value) -> Self {
        Self {
            kind,
            file: None,
            state: ComponentState::Loaded(value),
        }
    }

    /// Set the source file (builder pattern).
    pub fn with_file(mut self, file: PathBuf) -> Self {
        self.file = Some(file);
        self
    }

    pub fn value(&self) -> Option<&Value> {
        match &self.state {
            ComponentState::Loaded(value) => Some(value),
            ComponentState::ParseError(_) => None,
        }
    }

    pub fn parse_error(&self) -> Option<&str> {
        match &self.state {
            ComponentState::ParseError(message) => Some(message),
            ComponentState::Loaded(_) => None,
        }
    }

    fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        let file = self.file.clone().unwrap_or_default();
        match &self.state {
            ComponentState::Loaded(value) => {
                serde_json::from_value(value.clone()).map_err(|e| FsiError::Component {
                    component: self.kind,
                    file,
                    message: e.to_string(),
                })
            }
            ComponentState::ParseError(message) => Err(FsiError::Component {
                component: self.kind,
                file,
                message: message.clone(),
            }),
        }
    }
}

/// A fixed-schema set of dataset components.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentContainer {
    commit: Option<Component>,
    meta: Option<Component>,
    structure: Option<Component>,
    body: Option<Component>,
    viz: Option<Component>,
    transform: Option<Component>,
}

impl ComponentContainer {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, kind: ComponentKind) -> &Option<Component> {
        match kind {
            ComponentKind::Commit => &self.commit,
            ComponentKind::Meta => &self.meta,
            ComponentKind::Structure => &self.structure,
            ComponentKind::Body => &self.body,
            ComponentKind::Viz => &self.viz,
            ComponentKind::Transform => &self.transform,
        }
    }

    fn slot_mut(&mut self, kind: ComponentKind) -> &mut Option<Component> {
        match kind {
            ComponentKind::Commit => &mut self.commit,
            ComponentKind::Meta => &mut self.meta,
            ComponentKind::Structure => &mut self.structure,
            ComponentKind::Body => &mut self.body,
            ComponentKind::Viz => &mut self.viz,
            ComponentKind::Transform => &mut self.transform,
        }
    }

    pub fn get(&self, kind: ComponentKind) -> Option<&Component> {
        self.slot(kind).as_ref()
    }

    /// Store a component in its slot, replacing any previous one.
    pub fn set(&mut self, component: Component) {
        let kind = component.kind;
        *self.slot_mut(kind) = Some(component);
    }

    pub fn remove(&mut self, kind: ComponentKind) -> Option<Component> {
        self.slot_mut(kind).take()
    }

    /// Present components in [`ComponentKind::ALL`] order.
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        ComponentKind::ALL
            .into_iter()
            .filter_map(move |kind| self.get(kind))
    }

    /// The structure component, if present and parseable.
    pub fn structure(&self) -> Option<Structure> {
        self.get(ComponentKind::Structure)
            .and_then(|c| c.value())
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Remove structure fields recomputed at save time.
    pub fn drop_derived_values(&mut self) {
        if let Some(Component {
            state: ComponentState::Loaded(Value::Object(fields)),
            ..
        }) = self.slot_mut(ComponentKind::Structure)
        {
            for field in STRUCTURE_DERIVED_FIELDS {
                fields.remove(*field);
            }
        }
    }

    /// Remove values a working directory cannot hold. Script files carry
    /// only the script text, so the viz format, transform syntax and
    /// transform configuration go along with the commit.
    pub fn drop_unmaterialized(&mut self) {
        self.commit = None;
        for (kind, names) in UNMATERIALIZED_FIELDS {
            if let Some(Component {
                state: ComponentState::Loaded(Value::Object(fields)),
                ..
            }) = self.slot_mut(*kind)
            {
                for name in *names {
                    fields.remove(*name);
                }
            }
        }
    }

    /// Build a container from a dataset document.
    pub fn from_dataset(dataset: &Dataset) -> Result<Self> {
        let mut container = Self::new();
        let encode = |kind: ComponentKind, value: serde_json::Result<Value>| {
            value.map_err(|e| FsiError::Component {
                component: kind,
                file: PathBuf::new(),
                message: e.to_string(),
            })
        };

        if let Some(commit) = &dataset.commit {
            let value = encode(ComponentKind::Commit, serde_json::to_value(commit))?;
            container.set(Component::loaded(ComponentKind::Commit, value));
        }
        if let Some(meta) = &dataset.meta {
            let value = encode(ComponentKind::Meta, serde_json::to_value(meta))?;
            container.set(Component::loaded(ComponentKind::Meta, value));
        }
        if let Some(structure) = &dataset.structure {
            let value = encode(ComponentKind::Structure, serde_json::to_value(structure))?;
            container.set(Component::loaded(ComponentKind::Structure, value));
        }
        if let Some(body) = &dataset.body {
            container.set(Component::loaded(ComponentKind::Body, body.clone()));
        }
        if let Some(viz) = &dataset.viz {
            let value = encode(ComponentKind::Viz, serde_json::to_value(viz))?;
            container.set(Component::loaded(ComponentKind::Viz, value));
        }
        if let Some(transform) = &dataset.transform {
            let value = encode(ComponentKind::Transform, serde_json::to_value(transform))?;
            container.set(Component::loaded(ComponentKind::Transform, value));
        }
        Ok(container)
    }

    /// Convert back into a dataset document.
    ///
    /// Fails with the component and file name if any component has a parse error.
    pub fn to_dataset(&self) -> Result<Dataset> {
        let mut dataset = Dataset::default();
        if let Some(c) = &self.commit {
            dataset.commit = Some(c.decode()?);
        }
        if let Some(c) = &self.meta {
            dataset.meta = Some(c.decode::<Meta>()?);
        }
        if let Some(c) = &self.structure {
            dataset.structure = Some(c.decode::<Structure>()?);
        }
        if let Some(c) = &self.body {
            dataset.body = Some(c.decode::<Value>()?);
        }
        if let Some(c) = &self.viz {
            dataset.viz = Some(c.decode::<Viz>()?);
        }
        if let Some(c) = &self.transform {
            dataset.transform = Some(c.decode::<Transform>()?);
        }
        Ok(dataset)
    }
}
