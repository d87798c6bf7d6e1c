use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::node::NodeId;

/// Label of one version of a document, e.g. `"1.0"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionLabel(String);

impl VersionLabel {
    /// Create a label. Labels are non-empty and never contain `/`, which
    /// separates the label from the node id in an [`ObjectIdentifier`].
    pub fn new(label: impl Into<String>) -> Result<Self, TypeError> {
        let label = label.into();
        if label.is_empty() {
            return Err(TypeError::EmptyVersionLabel);
        }
        if label.contains('/') {
            return Err(TypeError::InvalidVersionLabel {
                label,
                reason: "contains '/'".into(),
            });
        }
        Ok(Self(label))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for VersionLabel {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VersionLabel> for String {
    fn from(label: VersionLabel) -> Self {
        label.0
    }
}

impl fmt::Display for VersionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier reported for an object that could not be removed.
///
/// Renders as `nodeId` or `nodeId/versionLabel` when the node carried a
/// version label at the time of the failure.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectIdentifier {
    node: NodeId,
    version: Option<VersionLabel>,
}

impl ObjectIdentifier {
    pub fn new(node: NodeId, version: Option<VersionLabel>) -> Self {
        Self { node, version }
    }

    /// Identifier of an unversioned node.
    pub fn unversioned(node: NodeId) -> Self {
        Self::new(node, None)
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn version(&self) -> Option<&VersionLabel> {
        self.version.as_ref()
    }

    /// Parse `nodeId[/versionLabel]`.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let (node, version) = match s.split_once('/') {
            Some((node, label)) => (node, Some(label)),
            None => (s, None),
        };
        let node = NodeId::parse(node)
            .map_err(|e| TypeError::InvalidIdentifier(format!("{s}: {e}")))?;
        let version = version.map(VersionLabel::new).transpose()?;
        Ok(Self { node, version })
    }
}

impl FromStr for ObjectIdentifier {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ObjectIdentifier {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ObjectIdentifier> for String {
    fn from(id: ObjectIdentifier) -> Self {
        id.to_string()
    }
}

impl fmt::Display for ObjectIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(label) => write!(f, "{}/{}", self.node, label),
            None => write!(f, "{}", self.node),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn label_rejects_empty_and_slash() {
        assert_eq!(VersionLabel::new(""), Err(TypeError::EmptyVersionLabel));
        assert!(matches!(
            VersionLabel::new("1/0"),
            Err(TypeError::InvalidVersionLabel { .. })
        ));
        assert_eq!(VersionLabel::new("1.0").unwrap().as_str(), "1.0");
    }

    #[test]
    fn unversioned_renders_bare_id() {
        let node = NodeId::new();
        let id = ObjectIdentifier::unversioned(node);
        assert_eq!(id.to_string(), node.to_string());
        assert!(id.version().is_none());
    }

    #[test]
    fn versioned_renders_with_suffix() {
        let node = NodeId::new();
        let id = ObjectIdentifier::new(node, Some(VersionLabel::new("2.1").unwrap()));
        assert_eq!(id.to_string(), format!("{node}/2.1"));
    }

    #[test]
    fn parse_rejects_bad_node() {
        assert!(matches!(
            ObjectIdentifier::parse("zzz/1.0"),
            Err(TypeError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn parse_rejects_trailing_slash() {
        let s = format!("{}/", NodeId::new());
        assert_eq!(ObjectIdentifier::parse(&s), Err(TypeError::EmptyVersionLabel));
    }

    #[test]
    fn serializes_as_string() {
        let node = NodeId::new();
        let id = ObjectIdentifier::new(node, Some(VersionLabel::new("1.3").unwrap()));
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{node}/1.3\""));
        let back: ObjectIdentifier = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    proptest! {
        #[test]
        fn parse_inverts_display(major in 0u32..100, minor in 0u32..100, versioned in any::<bool>()) {
            let node = NodeId::new();
            let version = versioned
                .then(|| VersionLabel::new(format!("{major}.{minor}")).unwrap());
            let id = ObjectIdentifier::new(node, version);
            prop_assert_eq!(ObjectIdentifier::parse(&id.to_string()).unwrap(), id);
        }
    }
}
