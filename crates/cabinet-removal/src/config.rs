use std::path::Path;

use serde::{Deserialize, Serialize};

use cabinet_types::Principal;

use crate::error::{RemovalError, RemovalResult};
use crate::policy::UnfileMode;

/// Configuration shared by the enumerator, the queue remover and the
/// service facade.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemovalConfig {
    /// How documents reached through this tree are removed.
    pub unfile_mode: UnfileMode,
    /// Keep going after a node fails, poisoning its traversal ancestors.
    pub continue_on_failure: bool,
    /// Purge version histories along with the live documents.
    pub delete_all_versions: bool,
    /// Identity on whose behalf locks are evaluated.
    pub principal: Principal,
}

impl Default for RemovalConfig {
    fn default() -> Self {
        Self {
            unfile_mode: UnfileMode::DeleteSingleFiled,
            continue_on_failure: true,
            delete_all_versions: true,
            principal: Principal::system(),
        }
    }
}

impl RemovalConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> RemovalResult<Self> {
        toml::from_str(s).map_err(|e| RemovalError::Config(e.to_string()))
    }

    /// Parse a JSON document. Missing keys take their defaults.
    pub fn from_json_str(s: &str) -> RemovalResult<Self> {
        serde_json::from_str(s).map_err(|e| RemovalError::Config(e.to_string()))
    }

    /// Load from a `.toml` or `.json` file.
    pub fn load(path: &Path) -> RemovalResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| RemovalError::Config(format!("{}: {e}", path.display())))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&text),
            Some("json") => Self::from_json_str(&text),
            other => Err(RemovalError::Config(format!(
                "unsupported config format: {}",
                other.unwrap_or("<none>")
            ))),
        }
    }

    /// A copy with a different unfile mode.
    pub fn with_unfile_mode(mut self, mode: UnfileMode) -> Self {
        self.unfile_mode = mode;
        self
    }

    /// A copy with a different continuation flag.
    pub fn with_continue_on_failure(mut self, continue_on_failure: bool) -> Self {
        self.continue_on_failure = continue_on_failure;
        self
    }
}
