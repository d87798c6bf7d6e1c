use std::fmt;

use serde::{Deserialize, Serialize};

/// The identity on whose behalf a removal runs.
///
/// Lock ownership and administrative override are evaluated by the node
/// store against this name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The built-in system identity.
    pub fn system() -> Self {
        Self::new("system")
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Default for Principal {
    fn default() -> Self {
        Self::system()
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_system() {
        assert_eq!(Principal::default(), Principal::system());
        assert_eq!(Principal::system().name(), "system");
    }

    #[test]
    fn serde_is_transparent() {
        let p = Principal::new("alice");
        assert_eq!(serde_json::to_string(&p).unwrap(), "\"alice\"");
    }
}
