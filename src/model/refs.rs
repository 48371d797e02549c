//! JSON-pointer style references between document nodes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The array (or root) a [`NodeRef`] points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// The `body` root group
    Body,
    /// The `furniture` root group
    Furniture,
    /// `groups[i]`
    Groups,
    /// `texts[i]`
    Texts,
    /// `tables[i]`
    Tables,
    /// `pictures[i]`
    Pictures,
}

impl NodeKind {
    /// Path segment used in the pointer.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Body => "body",
            NodeKind::Furniture => "furniture",
            NodeKind::Groups => "groups",
            NodeKind::Texts => "texts",
            NodeKind::Tables => "tables",
            NodeKind::Pictures => "pictures",
        }
    }
}

/// Reference to a node, serialized as `{"$ref": "#/texts/3"}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeRef {
    /// The pointer string
    #[serde(rename = "$ref")]
    pub cref: String,
}

impl NodeRef {
    /// Reference to `<kind>[index]`.
    pub fn new(kind: NodeKind, index: usize) -> Self {
        match kind {
            NodeKind::Body | NodeKind::Furniture => Self {
                cref: format!("#/{}", kind.as_str()),
            },
            _ => Self {
                cref: format!("#/{}/{}", kind.as_str(), index),
            },
        }
    }

    /// Reference to the body root.
    pub fn body() -> Self {
        Self::new(NodeKind::Body, 0)
    }

    /// Reference to the furniture root.
    pub fn furniture() -> Self {
        Self::new(NodeKind::Furniture, 0)
    }

    /// Split the pointer into its kind and index.
    pub fn parse(&self) -> Result<(NodeKind, usize)> {
        let invalid = || Error::InvalidRef(self.cref.clone());
        let path = self.cref.strip_prefix("#/").ok_or_else(invalid)?;
        let mut parts = path.split('/');
        let head = parts.next().ok_or_else(invalid)?;
        let index = parts.next();
        if parts.next().is_some() {
            return Err(invalid());
        }

        let kind = match head {
            "body" => NodeKind::Body,
            "furniture" => NodeKind::Furniture,
            "groups" => NodeKind::Groups,
            "texts" => NodeKind::Texts,
            "tables" => NodeKind::Tables,
            "pictures" => NodeKind::Pictures,
            _ => return Err(invalid()),
        };

        match (kind, index) {
            (NodeKind::Body | NodeKind::Furniture, None) => Ok((kind, 0)),
            (NodeKind::Body | NodeKind::Furniture, Some(_)) => Err(invalid()),
            (_, Some(idx)) => idx.parse().map(|i| (kind, i)).map_err(|_| invalid()),
            (_, None) => Err(invalid()),
        }
    }

    /// Kind of the referenced node, if the pointer is well formed.
    pub fn kind(&self) -> Option<NodeKind> {
        self.parse().ok().map(|(k, _)| k)
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cref)
    }
}

impl FromStr for NodeRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let r = NodeRef {
            cref: s.to_string(),
        };
        r.parse()?;
        Ok(r)
    }
}
