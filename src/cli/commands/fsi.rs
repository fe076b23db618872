//! Working directory subcommands.

use std::path::{Path, PathBuf};

use clap::Args;

use crate::app::App;
use crate::cli::args::absolute_dir;
use crate::cli::{CliError, GlobalArgs, InputSource, OutputSink, Result};
use crate::dataset::{BodyFormat, Dataset};
use crate::dsref::VersionInfo;
use crate::fsi::{ChangeType, StatusItem};

fn describe_status(items: &[StatusItem]) -> String {
    if items.is_empty() {
        return "no components".to_string();
    }
    let lines: Vec<String> = items
        .iter()
        .map(|item| {
            let mut line = format!("{:>12}: {}", item.change.as_str(), item.component);
            if let Some(file) = &item.file {
                line.push_str(&format!(" ({})", file.display()));
            }
            if let Some(message) = &item.message {
                line.push_str(&format!(" - {}", message));
            }
            line
        })
        .collect();
    let mut out = lines.join("\n");
    if items.iter().all(|i| i.change == ChangeType::Unmodified) {
        out.push_str("\nworking directory clean");
    }
    out
}

fn describe_info(info: &VersionInfo) -> String {
    let mut out = info.alias();
    if !info.path.is_empty() {
        out.push_str(&format!("@{}", info.path));
    }
    if let Some(dir) = &info.fsi_path {
        out.push_str(&format!(" -> {}", dir.display()));
    }
    out
}

// =============================================================================
// Checkout
// =============================================================================

/// Arguments for the checkout command.
#[derive(Args, Debug)]
pub struct CheckoutArgs {
    /// Dataset reference, as username/name[@path].
    pub reference: String,

    /// Directory to create. Defaults to the dataset name.
    pub dir: Option<PathBuf>,

    #[command(flatten)]
    pub output: OutputSink,
}

impl CheckoutArgs {
    pub async fn run(self, app: &App, global: &GlobalArgs) -> Result<()> {
        let dir = match &self.dir {
            Some(dir) => absolute_dir(Some(dir))?,
            None => {
                let name = app.parse_ref(&self.reference)?.name;
                absolute_dir(Some(Path::new(&name)))?
            }
        };
        let result = app.fsi_methods().checkout(&dir, &self.reference).await?;
        self.output
            .write(&result, global.json, |r| {
                let mut out = format!("checked out {}", describe_info(&r.info));
                for failure in &r.failures {
                    out.push_str(&format!(
                        "\nfailed to write {}: {}",
                        failure.component, failure.message
                    ));
                }
                out
            })
            .await?;
        Ok(())
    }
}

// =============================================================================
// Status
// =============================================================================

/// Arguments for the status command.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Linked directory. Defaults to the current directory.
    pub dir: Option<PathBuf>,

    /// Report on the directory linked to this dataset instead.
    #[arg(long, conflicts_with = "dir")]
    pub reference: Option<String>,

    #[command(flatten)]
    pub output: OutputSink,
}

impl StatusArgs {
    pub async fn run(self, app: &App, global: &GlobalArgs) -> Result<()> {
        let items = match &self.reference {
            Some(reference) => app.fsi_methods().status_for_alias(reference).await?,
            None => {
                let dir = absolute_dir(self.dir.as_deref())?;
                app.fsi_methods().status(&dir).await?
            }
        };
        self.output
            .write(&items, global.json, |i| describe_status(i))
            .await?;
        Ok(())
    }
}

// =============================================================================
// Restore
// =============================================================================

/// Arguments for the restore command.
#[derive(Args, Debug)]
pub struct RestoreArgs {
    /// Component to restore (meta, structure, body, viz, transform). All if omitted.
    pub component: Option<String>,

    /// Dataset reference. Defaults to the dataset linked to the current directory.
    #[arg(long)]
    pub reference: Option<String>,

    /// Snapshot path to restore from. Defaults to the head.
    #[arg(long)]
    pub version: Option<String>,

    #[command(flatten)]
    pub output: OutputSink,
}

impl RestoreArgs {
    pub async fn run(self, app: &App, global: &GlobalArgs) -> Result<()> {
        let reference = match self.reference {
            Some(reference) => reference,
            None => {
                let dir = absolute_dir(None)?;
                app.fsi_methods().linked_info(&dir).await?.alias()
            }
        };
        let items = app
            .fsi_methods()
            .restore(&reference, self.version.as_deref(), self.component.as_deref())
            .await?;
        self.output
            .write(&items, global.json, |i| describe_status(i))
            .await?;
        Ok(())
    }
}

// =============================================================================
// Link / Unlink
// =============================================================================

/// Arguments for the link command.
#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Dataset reference, as username/name.
    pub reference: String,

    /// Directory to link. Defaults to the current directory.
    pub dir: Option<PathBuf>,

    /// Repoint the dataset's index entry at the directory named by its
    /// marker file, after the directory has moved.
    #[arg(long)]
    pub repair: bool,

    #[command(flatten)]
    pub output: OutputSink,
}

impl LinkArgs {
    pub async fn run(self, app: &App, global: &GlobalArgs) -> Result<()> {
        let dir = absolute_dir(self.dir.as_deref())?;
        let info = if self.repair {
            app.fsi_methods().ensure_ref(&dir).await?
        } else {
            app.fsi_methods().link(&dir, &self.reference).await?
        };
        self.output
            .write(&info, global.json, |i| format!("linked {}", describe_info(i)))
            .await?;
        Ok(())
    }
}

/// Arguments for the unlink command.
#[derive(Args, Debug)]
pub struct UnlinkArgs {
    /// Linked directory. Defaults to the current directory unless
    /// --reference is given.
    pub dir: Option<PathBuf>,

    /// Unlink the directory linked to this dataset.
    #[arg(long, conflicts_with = "dir")]
    pub reference: Option<String>,

    /// Also delete the component files.
    #[arg(long)]
    pub remove_files: bool,

    #[command(flatten)]
    pub output: OutputSink,
}

impl UnlinkArgs {
    pub async fn run(self, app: &App, global: &GlobalArgs) -> Result<()> {
        let dir = match (&self.dir, &self.reference) {
            (_, Some(_)) => None,
            (dir, None) => Some(absolute_dir(dir.as_deref())?),
        };
        let alias = app
            .fsi_methods()
            .unlink(dir.as_deref(), self.reference.as_deref(), self.remove_files)
            .await?;
        self.output
            .write(&alias, global.json, |a| format!("unlinked {}", a))
            .await?;
        Ok(())
    }
}

// =============================================================================
// Init / Save
// =============================================================================

/// Arguments for the init command.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// New dataset reference, as username/name. `me` names the configured identity.
    pub reference: String,

    /// Directory to initialize. Defaults to the current directory.
    pub dir: Option<PathBuf>,

    /// Body format for the starter body file (json or csv).
    #[arg(long)]
    pub body_format: Option<BodyFormat>,

    #[command(flatten)]
    pub output: OutputSink,
}

impl InitArgs {
    pub async fn run(self, app: &App, global: &GlobalArgs) -> Result<()> {
        let dir = absolute_dir(self.dir.as_deref())?;
        let info = app
            .fsi_methods()
            .init(&dir, &self.reference, self.body_format)
            .await?;
        self.output
            .write(&info, global.json, |i| {
                format!("initialized {}", describe_info(i))
            })
            .await?;
        Ok(())
    }
}

/// Arguments for the save command.
#[derive(Args, Debug)]
pub struct SaveArgs {
    /// Linked directory. Defaults to the current directory.
    pub dir: Option<PathBuf>,

    /// Commit title. Generated from the changed components if omitted.
    #[arg(short, long, default_value = "")]
    pub title: String,

    /// Commit message.
    #[arg(short, long, default_value = "")]
    pub message: String,

    #[command(flatten)]
    pub output: OutputSink,
}

impl SaveArgs {
    pub async fn run(self, app: &App, global: &GlobalArgs) -> Result<()> {
        let dir = absolute_dir(self.dir.as_deref())?;
        let info = app
            .fsi_methods()
            .save(&dir, &self.title, &self.message)
            .await?;
        self.output
            .write(&info, global.json, |i| format!("saved {}", describe_info(i)))
            .await?;
        Ok(())
    }
}

// =============================================================================
// Write
// =============================================================================

/// Arguments for the write command.
#[derive(Args, Debug)]
pub struct WriteArgs {
    /// Linked dataset reference.
    pub reference: String,

    /// Dataset document (JSON) to write into the working directory.
    #[command(flatten)]
    pub input: InputSource,

    #[command(flatten)]
    pub output: OutputSink,
}

impl WriteArgs {
    pub async fn run(self, app: &App, global: &GlobalArgs) -> Result<()> {
        let text = self.input.read().await?;
        let dataset: Dataset = serde_json::from_str(&text)
            .map_err(|e| CliError::Other(format!("invalid dataset document: {}", e)))?;
        let items = app.fsi_methods().write(&self.reference, &dataset).await?;
        self.output
            .write(&items, global.json, |i| describe_status(i))
            .await?;
        Ok(())
    }
}
