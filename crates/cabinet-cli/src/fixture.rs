//! JSON repository fixtures.
//!
//! A fixture lists folders and documents by path and is loaded into an
//! [`InMemoryNodeStore`]:
//!
//! ```json
//! {
//!   "folders": [{ "path": "/R" }, { "path": "/R/A" }, { "path": "/S" }],
//!   "documents": [
//!     { "path": "/S/doc", "versions": ["1.0"], "also_filed": ["/R"] }
//!   ],
//!   "administrators": ["admin"]
//! }
//! ```

use std::path::Path;

use anyhow::{anyhow, bail, Context};
use serde::Deserialize;

use cabinet_store::InMemoryNodeStore;
use cabinet_types::{NodeId, Principal, VersionLabel};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Fixture {
    #[serde(default)]
    pub folders: Vec<FolderSpec>,
    #[serde(default)]
    pub documents: Vec<DocumentSpec>,
    /// Principals allowed to override locks.
    #[serde(default)]
    pub administrators: Vec<Principal>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FolderSpec {
    pub path: String,
    #[serde(default)]
    pub denied: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocumentSpec {
    pub path: String,
    /// Version labels, oldest first.
    #[serde(default)]
    pub versions: Vec<VersionLabel>,
    /// Folders the document is additionally filed under.
    #[serde(default)]
    pub also_filed: Vec<String>,
    #[serde(default)]
    pub checked_out: bool,
    #[serde(default)]
    pub lock_owner: Option<Principal>,
    #[serde(default)]
    pub denied: bool,
}

impl Fixture {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading fixture {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("parsing fixture {}", path.display()))
    }

    pub fn from_json_str(s: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Build a store. Folders are created shallowest first, so a fixture may
    /// list them in any order.
    pub fn build(&self) -> anyhow::Result<InMemoryNodeStore> {
        let store = InMemoryNodeStore::new();

        let mut folders: Vec<&FolderSpec> = self.folders.iter().collect();
        folders.sort_by_key(|f| depth(&f.path));
        for folder in folders {
            let (parent, name) = split(&store, &folder.path)?;
            let id = store.create_folder(&parent, name)?;
            if folder.denied {
                store.deny(&id)?;
            }
        }

        for doc in &self.documents {
            let (parent, name) = split(&store, &doc.path)?;
            let id = store.create_document(&parent, name)?;
            for label in &doc.versions {
                store.add_version(&id, label.clone())?;
            }
            for extra in &doc.also_filed {
                store
                    .file(&id, &lookup(&store, extra)?)
                    .with_context(|| format!("filing {} under {extra}", doc.path))?;
            }
            if doc.checked_out {
                store.check_out(&id)?;
            }
            if let Some(owner) = &doc.lock_owner {
                store.lock(&id, owner.clone())?;
            }
            if doc.denied {
                store.deny(&id)?;
            }
        }

        for admin in &self.administrators {
            store.grant_override(admin.clone());
        }
        Ok(store)
    }
}

pub fn lookup(store: &InMemoryNodeStore, path: &str) -> anyhow::Result<NodeId> {
    store
        .resolve(path)
        .ok_or_else(|| anyhow!("no such path: {path}"))
}

fn depth(path: &str) -> usize {
    path.split('/').filter(|s| !s.is_empty()).count()
}

fn split<'p>(store: &InMemoryNodeStore, path: &'p str) -> anyhow::Result<(NodeId, &'p str)> {
    let trimmed = path.trim_end_matches('/');
    let Some((parent, name)) = trimmed.rsplit_once('/') else {
        bail!("path must be absolute: {path}");
    };
    if name.is_empty() {
        bail!("path names the root: {path}");
    }
    let parent = if parent.is_empty() { "/" } else { parent };
    Ok((lookup(store, parent)?, name))
}
