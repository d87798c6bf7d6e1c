use std::path::Path;

use anyhow::bail;
use colored::Colorize;
use serde::Serialize;

use cabinet_removal::{
    Applied, FailureLedger, ParentedNode, RemovalConfig, RemovalService, UnfileMode,
};
use cabinet_store::{InMemoryNodeStore, NodeStore};
use cabinet_types::{NodeId, NodeKind, Principal};

use crate::cli::*;
use crate::fixture::{lookup, Fixture};

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::DeleteTree(args) => cmd_delete_tree(args, format),
        Command::Delete(args) => cmd_delete(args, format),
        Command::Walk(args) => cmd_walk(args, format),
        Command::Tree(args) => cmd_tree(args, format),
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

fn base_config(path: Option<&Path>, principal: Option<&str>) -> anyhow::Result<RemovalConfig> {
    let mut config = match path {
        Some(path) => RemovalConfig::load(path)?,
        None => RemovalConfig::default(),
    };
    if let Some(name) = principal {
        config.principal = Principal::new(name);
    }
    Ok(config)
}

impl RemovalArgs {
    fn resolve_config(&self) -> anyhow::Result<RemovalConfig> {
        let mut config = base_config(self.config.as_deref(), self.principal.as_deref())?;
        if let Some(mode) = self.mode {
            config.unfile_mode = mode;
        }
        if self.continue_on_failure {
            config.continue_on_failure = true;
        }
        if self.stop_on_failure {
            config.continue_on_failure = false;
        }
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Output records
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct FailureEntry {
    id: String,
    path: Option<String>,
}

#[derive(Serialize)]
struct DeleteTreeOutput {
    path: String,
    mode: UnfileMode,
    deleted: usize,
    unfiled: usize,
    vanished: usize,
    failures: Vec<FailureEntry>,
    remaining: usize,
}

#[derive(Serialize)]
struct DeleteOutput {
    path: String,
    id: String,
    outcome: Applied,
    cancelled_checkout: bool,
}

#[derive(Serialize)]
struct WalkStep {
    depth: usize,
    kind: NodeKind,
    path: String,
    removed: bool,
}

#[derive(Serialize)]
struct WalkOutput {
    steps: Vec<WalkStep>,
    failures: Vec<FailureEntry>,
}

#[derive(Serialize)]
struct TreeNode {
    name: String,
    id: String,
    kind: NodeKind,
    version: Option<String>,
    secondary: bool,
    working_copy: bool,
    children: Vec<TreeNode>,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn describe(store: &InMemoryNodeStore, failures: &FailureLedger) -> Vec<FailureEntry> {
    failures
        .iter()
        .map(|id| FailureEntry {
            id: id.to_string(),
            path: store.path_of(&id.node()),
        })
        .collect()
}

fn print_failures(failures: &[FailureEntry]) {
    for f in failures {
        println!(
            "  {} {}  {}",
            "✗".red(),
            f.path.as_deref().unwrap_or("(gone)").bold(),
            f.id.dimmed()
        );
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_delete_tree(args: DeleteTreeArgs, format: OutputFormat) -> anyhow::Result<()> {
    let args = args.removal;
    let store = Fixture::load(&args.fixture)?.build()?;
    let folder = lookup(&store, &args.path)?;
    let config = args.resolve_config()?;
    let mode = config.unfile_mode;
    let continue_on_failure = config.continue_on_failure;

    let service = RemovalService::new(&store, config);
    let report = service.delete_tree_report(&folder, mode, continue_on_failure)?;
    let output = DeleteTreeOutput {
        path: args.path,
        mode,
        deleted: report.deleted,
        unfiled: report.unfiled,
        vanished: report.vanished,
        failures: describe(&store, &report.failures),
        remaining: store.len().saturating_sub(1),
    };

    match format {
        OutputFormat::Json => print_json(&output)?,
        OutputFormat::Text => {
            if output.failures.is_empty() {
                println!("{} Removed {} ({})", "✓".green().bold(), output.path.bold(), mode);
            } else {
                println!(
                    "{} {} object(s) could not be removed from {}",
                    "✗".red().bold(),
                    output.failures.len(),
                    output.path.bold()
                );
                print_failures(&output.failures);
            }
            println!(
                "  deleted: {}  unfiled: {}  vanished: {}",
                output.deleted.to_string().green(),
                output.unfiled.to_string().yellow(),
                output.vanished.to_string().dimmed()
            );
        }
    }

    if !output.failures.is_empty() {
        bail!("removal of {} incomplete", output.path);
    }
    Ok(())
}

fn cmd_delete(args: DeleteArgs, format: OutputFormat) -> anyhow::Result<()> {
    let store = Fixture::load(&args.fixture)?.build()?;
    let node = lookup(&store, &args.path)?;
    let config = base_config(args.config.as_deref(), args.principal.as_deref())?;

    let cancelled_checkout = store.is_checked_out_working_copy(&node)?;
    let outcome = RemovalService::new(&store, config).delete_object(&node)?;
    let output = DeleteOutput {
        path: args.path,
        id: node.to_string(),
        outcome,
        cancelled_checkout,
    };

    match format {
        OutputFormat::Json => print_json(&output)?,
        OutputFormat::Text if output.cancelled_checkout => {
            println!("{} Cancelled check-out {}", "✓".green().bold(), output.path.bold())
        }
        OutputFormat::Text => println!("{} Deleted {}", "✓".green().bold(), output.path.bold()),
    }
    Ok(())
}

/// Path of an offered node through the edge it was reached by.
fn walked_path(store: &InMemoryNodeStore, item: &ParentedNode) -> String {
    let name = store.name_of(&item.node()).unwrap_or_default();
    match item.exact_parent().and_then(|edge| store.path_of(&edge.parent)) {
        Some(parent) => format!("{}/{name}", parent.trim_end_matches('/')),
        None => store
            .path_of(&item.node())
            .unwrap_or_else(|| item.node().to_string()),
    }
}

fn cmd_walk(args: WalkArgs, format: OutputFormat) -> anyhow::Result<()> {
    let args = args.removal;
    let store = Fixture::load(&args.fixture)?.build()?;
    let root = lookup(&store, &args.path)?;
    let config = args.resolve_config()?;

    let service = RemovalService::new(&store, config);
    let mut walker = service.enumerate(&root)?;
    let mut steps = Vec::new();
    while let Some(item) = walker.next() {
        let path = walked_path(&store, &item);
        let removed = walker.remove()?;
        steps.push(WalkStep {
            depth: item.depth(),
            kind: item.kind(),
            path,
            removed,
        });
    }
    let output = WalkOutput {
        steps,
        failures: describe(&store, walker.failures()),
    };

    match format {
        OutputFormat::Json => print_json(&output)?,
        OutputFormat::Text => {
            for step in &output.steps {
                let mark = if step.removed { "✓".green() } else { "✗".red() };
                let suffix = if step.kind == NodeKind::Folder { "/" } else { "" };
                println!("{}{} {}{}", "  ".repeat(step.depth), mark, step.path, suffix);
            }
            if !output.failures.is_empty() {
                println!("{}", "Could not remove:".red().bold());
                print_failures(&output.failures);
            }
        }
    }
    Ok(())
}

fn build_tree(
    store: &InMemoryNodeStore,
    node: NodeId,
    parent: Option<NodeId>,
) -> anyhow::Result<TreeNode> {
    let kind = store.kind_of(&node)?;
    let primary = store.primary_parent_of(&node)?.map(|edge| edge.parent);
    let children = if kind.is_folder() {
        store
            .children_of(&node)?
            .into_iter()
            .map(|edge| build_tree(store, edge.child, Some(node)))
            .collect::<anyhow::Result<Vec<_>>>()?
    } else {
        Vec::new()
    };
    Ok(TreeNode {
        name: store.name_of(&node).unwrap_or_default(),
        id: node.to_string(),
        kind,
        version: store.version_label_of(&node)?.map(|l| l.to_string()),
        secondary: parent.is_some() && parent != primary,
        working_copy: store.is_checked_out_working_copy(&node)?,
        children,
    })
}

fn print_tree(node: &TreeNode, depth: usize) {
    let indent = "  ".repeat(depth);
    let mut line = match node.kind {
        NodeKind::Folder if depth == 0 => "/".to_string(),
        NodeKind::Folder => format!("{}/", node.name).blue().bold().to_string(),
        NodeKind::Document => node.name.clone(),
    };
    if let Some(version) = &node.version {
        line.push_str(&format!(" [{}]", version.cyan()));
    }
    if node.secondary {
        line.push_str(&format!(" {}", "(also filed)".dimmed()));
    }
    if node.working_copy {
        line.push_str(&format!(" {}", "(working copy)".yellow()));
    }
    println!("{indent}{line}");
    for child in &node.children {
        print_tree(child, depth + 1);
    }
}

fn cmd_tree(args: TreeArgs, format: OutputFormat) -> anyhow::Result<()> {
    let store = Fixture::load(&args.fixture)?.build()?;
    let tree = build_tree(&store, store.root(), None)?;
    match format {
        OutputFormat::Json => print_json(&tree)?,
        OutputFormat::Text => print_tree(&tree, 0),
    }
    Ok(())
}
