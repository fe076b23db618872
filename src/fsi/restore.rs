use crate::dataset::{ComponentKind, Dataset};
use crate::dsref::Ref;

use super::component::ComponentContainer;
use super::component_files::{delete_component, read_components, write_component};
use super::error::{FsiError, Result};
use super::fsi::Fsi;
use super::status::StatusItem;

impl Fsi {
    /// Overwrite a linked directory's component files from a document and
    /// return the resulting status.
    ///
    /// Components missing from `dataset` are left as they are on disk. A
    /// body without a structure keeps the format of the structure on disk.
    pub async fn write(&self, reference: &Ref, dataset: &Dataset) -> Result<Vec<StatusItem>> {
        let (info, dir) = self.linked(reference).await?;

        let mut container = ComponentContainer::from_dataset(dataset)?;
        container.drop_derived_values();
        let structure = match container.structure() {
            Some(structure) => Some(structure),
            None => read_components(&dir).await?.structure(),
        };
        for component in container.components() {
            if component.kind == ComponentKind::Commit {
                continue;
            }
            write_component(&dir, component, structure.as_ref(), self.options).await?;
        }

        tracing::debug!(alias = %info.alias(), dir = %dir.display(), "wrote dataset to working directory");
        self.status_at(&info, &dir).await
    }

    /// Undo local edits by rewriting component files from a snapshot.
    ///
    /// `version` selects a snapshot path, defaulting to the head. With a
    /// `component` selector only that component is touched. A component the
    /// snapshot lacks is deleted from disk; every other one is overwritten.
    pub async fn restore(
        &self,
        reference: &Ref,
        version: Option<&str>,
        component: Option<ComponentKind>,
    ) -> Result<Vec<StatusItem>> {
        if component == Some(ComponentKind::Commit) {
            return Err(FsiError::NotMaterialized {
                component: ComponentKind::Commit,
            });
        }
        let (info, dir) = self.linked(reference).await?;
        let path = version.unwrap_or(info.path.as_str());
        let history = self.history_container(path).await?;
        let structure = history.structure();

        for kind in ComponentKind::WORKING {
            if component.is_some_and(|selected| selected != kind) {
                continue;
            }
            match history.get(kind) {
                Some(saved) => {
                    let file =
                        write_component(&dir, saved, structure.as_ref(), self.options).await?;
                    tracing::debug!(component = %kind, file = %file.display(), "restored component");
                }
                None => {
                    for file in delete_component(&dir, kind).await? {
                        tracing::debug!(component = %kind, file = %file.display(), "removed component");
                    }
                }
            }
        }

        tracing::info!(alias = %info.alias(), dir = %dir.display(), version = %path, "restored working directory");
        self.status_at(&info, &dir).await
    }
}
