//! Dataset lookup subcommands.

use clap::Args;

use crate::app::App;
use crate::cli::{GlobalArgs, OutputSink, Result};

/// Arguments for the get command.
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Dataset reference, as username/name[@path] or a working directory path.
    pub reference: String,

    /// Resolution mode: local, network, registry or p2p. Uses the
    /// configured default if omitted.
    #[arg(long)]
    pub mode: Option<String>,

    #[command(flatten)]
    pub output: OutputSink,
}

impl GetArgs {
    pub async fn run(self, app: &App, _global: &GlobalArgs) -> Result<()> {
        let dataset = app
            .dataset_methods()
            .get(&self.reference, self.mode.as_deref())
            .await?;
        // A dataset document is always printed as JSON.
        self.output.write_json(&dataset).await?;
        Ok(())
    }
}

/// Arguments for the resolve command.
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Dataset reference, as username/name.
    pub reference: String,

    /// Resolution mode. Uses the configured default if omitted.
    #[arg(long)]
    pub mode: Option<String>,

    #[command(flatten)]
    pub output: OutputSink,
}

impl ResolveArgs {
    pub async fn run(self, app: &App, global: &GlobalArgs) -> Result<()> {
        let output = app
            .dataset_methods()
            .resolve(&self.reference, self.mode.as_deref())
            .await?;
        self.output
            .write(&output, global.json, |o| {
                let mut line = format!("{} {}", o.reference.human(), o.reference.init_id);
                if !o.source.is_empty() {
                    line.push_str(&format!(" from {}", o.source));
                }
                line.push_str(&format!(" ({})", o.resolver));
                line
            })
            .await?;
        Ok(())
    }
}

/// Arguments for the log command.
#[derive(Args, Debug)]
pub struct LogArgs {
    /// Dataset reference, as username/name.
    pub reference: String,

    #[command(flatten)]
    pub output: OutputSink,
}

impl LogArgs {
    pub async fn run(self, app: &App, global: &GlobalArgs) -> Result<()> {
        let entries = app.dataset_methods().log(&self.reference).await?;
        self.output
            .write(&entries, global.json, |entries| {
                entries
                    .iter()
                    .map(|e| format!("{}  {}  {}", e.timestamp, e.path, e.title))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .await?;
        Ok(())
    }
}
