use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use cabinet_removal::UnfileMode;

#[derive(Parser)]
#[command(
    name = "cabinet",
    about = "Cabinet - folder-tree removal for filing repositories",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Delete a folder and everything filed under it
    DeleteTree(DeleteTreeArgs),
    /// Delete a single object
    Delete(DeleteArgs),
    /// Walk a folder children-first, removing each node as it is offered
    Walk(WalkArgs),
    /// Print the fixture repository
    Tree(TreeArgs),
}

/// Options shared by the subtree commands.
#[derive(Args)]
pub struct RemovalArgs {
    /// Repository fixture (JSON)
    pub fixture: PathBuf,
    /// Slash-separated path of the folder, e.g. /Projects/Old
    pub path: String,
    /// How documents are removed: unfile, delete-single-filed or delete
    #[arg(long)]
    pub mode: Option<UnfileMode>,
    #[arg(long, conflicts_with = "stop_on_failure")]
    pub continue_on_failure: bool,
    #[arg(long)]
    pub stop_on_failure: bool,
    /// Removal settings (.toml or .json)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Identity locks are checked against
    #[arg(long = "as")]
    pub principal: Option<String>,
}

#[derive(Args)]
pub struct DeleteTreeArgs {
    #[command(flatten)]
    pub removal: RemovalArgs,
}

#[derive(Args)]
pub struct WalkArgs {
    #[command(flatten)]
    pub removal: RemovalArgs,
}

#[derive(Args)]
pub struct DeleteArgs {
    pub fixture: PathBuf,
    pub path: String,
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long = "as")]
    pub principal: Option<String>,
}

#[derive(Args)]
pub struct TreeArgs {
    pub fixture: PathBuf,
}
