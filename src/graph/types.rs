//! NB-001: Node identities, type tokens, and deferred output handles.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::graph::value::PropertyMap;

// ===== Identities =====

/// Index of a registered node within its scope. Minted by `Scope::register`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub(crate) fn new(index: usize) -> Self {
        NodeId(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

/// Provider type token, e.g. `aws:ec2:Instance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeType(&'static str);

impl NodeType {
    pub const fn new(token: &'static str) -> Self {
        NodeType(token)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

// ===== Deferred outputs =====

/// Where a deferred value comes from: a registered node or a recorded
/// invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Origin {
    Node(String),
    Invoke(String),
}

impl Origin {
    pub fn name(&self) -> &str {
        match self {
            Origin::Node(name) | Origin::Invoke(name) => name,
        }
    }
}

/// Handle to a value that only exists after the external engine applies the
/// plan. Carries an origin and a field path; never resolved here. Projection
/// extends the path, so `node.output("a").field("b")` addresses `a.b` on the
/// node's eventual output.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutputRef {
    origin: Origin,
    path: Vec<String>,
}

impl OutputRef {
    pub(crate) fn node(name: impl Into<String>) -> Self {
        OutputRef {
            origin: Origin::Node(name.into()),
            path: Vec::new(),
        }
    }

    pub(crate) fn invoke(name: impl Into<String>) -> Self {
        OutputRef {
            origin: Origin::Invoke(name.into()),
            path: Vec::new(),
        }
    }

    /// Project a field of this deferred value.
    pub fn field(&self, name: &str) -> Self {
        let mut path = self.path.clone();
        path.push(name.to_string());
        OutputRef {
            origin: self.origin.clone(),
            path,
        }
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }
}

impl fmt::Display for OutputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${{{}", self.origin.name())?;
        for segment in &self.path {
            write!(f, ".{segment}")?;
        }
        f.write_str("}")
    }
}

impl Serialize for OutputRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ===== Nodes =====

/// Everything needed to register one node.
#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub name: String,
    pub ty: NodeType,
    pub properties: PropertyMap,
    pub depends_on: Vec<NodeId>,
    pub existing_id: Option<String>,
}

/// A registered node as stored by the scope. Immutable after registration.
#[derive(Debug, Clone)]
pub struct NodeRecord {
    pub name: String,
    pub ty: NodeType,
    pub properties: PropertyMap,
    pub depends_on: Vec<NodeId>,
    pub existing_id: Option<String>,
}

/// Cheap handle returned by registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    id: NodeId,
    name: String,
}

impl Node {
    pub(crate) fn new(id: NodeId, name: String) -> Self {
        Node { id, name }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Deferred reference to the whole output bag of this node.
    pub fn reference(&self) -> OutputRef {
        OutputRef::node(self.name.clone())
    }

    /// Deferred reference to one output field of this node.
    pub fn output(&self, field: &str) -> OutputRef {
        self.reference().field(field)
    }
}
