//! NB-003: Append-only registration scope.
//!
//! Components never talk to a provider; they register nodes and record
//! invocations here. Dependency edges come from two places: explicit
//! `depends_on` ids and references found inside property values. The scope
//! snapshots to a serializable graph and fingerprints it with BLAKE3.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use thiserror::Error;

use crate::graph::types::{Node, NodeId, NodeRecord, NodeSpec, Origin, OutputRef};
use crate::graph::value::{Fragment, PropertyMap, PropertyValue};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScopeError {
    #[error("node '{name}' is already registered")]
    DuplicateNode { name: String },
    #[error("reference to unregistered origin '{name}'")]
    UnknownReference { name: String },
    #[error("dependency id {index} is not a registered node")]
    UnknownDependency { index: usize },
    #[error("invocation '{name}' is already recorded with different arguments")]
    ConflictingInvoke { name: String },
}

/// A recorded deferred query (`getSubnet`, `getAmi`, ...). The external
/// engine resolves these; planning only records them.
#[derive(Debug, Clone, PartialEq)]
pub struct InvokeRecord {
    pub name: String,
    pub function: String,
    pub arguments: PropertyMap,
}

/// Registry for one planning pass. Append-only: records are immutable once
/// added, and nothing is ever removed.
#[derive(Debug, Default)]
pub struct Scope {
    nodes: Vec<NodeRecord>,
    node_index: FxHashMap<String, NodeId>,
    invocations: Vec<InvokeRecord>,
    invoke_index: FxHashMap<String, usize>,
}

impl Scope {
    pub fn new() -> Self {
        Scope::default()
    }

    /// Register one node. Explicit dependencies are bounds-checked, property
    /// references must point at already-registered origins, and the union of
    /// both becomes the node's edge set (first occurrence wins the order).
    pub fn register(&mut self, spec: NodeSpec) -> Result<Node, ScopeError> {
        if self.node_index.contains_key(&spec.name) {
            return Err(ScopeError::DuplicateNode { name: spec.name });
        }

        let mut depends_on = Vec::new();
        let mut seen: FxHashSet<NodeId> = FxHashSet::default();
        for dep in &spec.depends_on {
            if dep.index() >= self.nodes.len() {
                return Err(ScopeError::UnknownDependency { index: dep.index() });
            }
            if seen.insert(*dep) {
                depends_on.push(*dep);
            }
        }
        for id in self.resolve_origins(&spec.properties)? {
            if seen.insert(id) {
                depends_on.push(id);
            }
        }

        log::debug!("register {} ({})", spec.name, spec.ty);
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(NodeRecord {
            name: spec.name.clone(),
            ty: spec.ty,
            properties: spec.properties,
            depends_on,
            existing_id: spec.existing_id,
        });
        self.node_index.insert(spec.name.clone(), id);
        Ok(Node::new(id, spec.name))
    }

    /// Record a deferred query and hand back a reference to its eventual
    /// result. Re-recording the same name with identical function and
    /// arguments returns the existing reference; diverging arguments under
    /// one name are rejected.
    pub fn invoke(
        &mut self,
        name: &str,
        function: &str,
        arguments: PropertyMap,
    ) -> Result<OutputRef, ScopeError> {
        self.resolve_origins(&arguments)?;

        if let Some(&idx) = self.invoke_index.get(name) {
            let existing = &self.invocations[idx];
            if existing.function == function && existing.arguments == arguments {
                return Ok(OutputRef::invoke(name));
            }
            return Err(ScopeError::ConflictingInvoke {
                name: name.to_string(),
            });
        }

        log::debug!("invoke {name} ({function})");
        self.invoke_index.insert(name.to_string(), self.invocations.len());
        self.invocations.push(InvokeRecord {
            name: name.to_string(),
            function: function.to_string(),
            arguments,
        });
        Ok(OutputRef::invoke(name))
    }

    /// Validate every reference in a property bag and return the node ids it
    /// mentions, in first-seen order.
    fn resolve_origins(&self, properties: &PropertyMap) -> Result<Vec<NodeId>, ScopeError> {
        let mut origins = Vec::new();
        for value in properties.values() {
            collect_origins(value, &mut origins);
        }

        let mut ids = Vec::new();
        for origin in origins {
            match origin {
                Origin::Node(name) => match self.node_index.get(name) {
                    Some(id) => ids.push(*id),
                    None => {
                        return Err(ScopeError::UnknownReference { name: name.clone() });
                    }
                },
                Origin::Invoke(name) => {
                    if !self.invoke_index.contains_key(name) {
                        return Err(ScopeError::UnknownReference { name: name.clone() });
                    }
                }
            }
        }
        Ok(ids)
    }

    pub fn lookup(&self, name: &str) -> Option<NodeId> {
        self.node_index.get(name).copied()
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeRecord> {
        self.nodes.get(id.index())
    }

    pub fn nodes(&self) -> &[NodeRecord] {
        &self.nodes
    }

    pub fn invocations(&self) -> &[InvokeRecord] {
        &self.invocations
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Serializable snapshot of everything registered so far.
    pub fn to_graph(&self) -> GraphDoc {
        let nodes = self
            .nodes
            .iter()
            .map(|record| GraphNode {
                name: record.name.clone(),
                ty: record.ty.as_str().to_string(),
                properties: record.properties.clone(),
                depends_on: record
                    .depends_on
                    .iter()
                    .map(|id| self.nodes[id.index()].name.clone())
                    .collect(),
                existing_id: record.existing_id.clone(),
            })
            .collect();
        let invocations = self
            .invocations
            .iter()
            .map(|record| GraphInvoke {
                name: record.name.clone(),
                function: record.function.clone(),
                arguments: record.arguments.clone(),
            })
            .collect();
        GraphDoc { nodes, invocations }
    }

    /// Content hash of the snapshot, `blake3:<hex>`. Two passes that plan the
    /// same topology produce the same fingerprint.
    pub fn fingerprint(&self) -> serde_json::Result<String> {
        let bytes = serde_json::to_vec(&self.to_graph())?;
        Ok(format!("blake3:{}", blake3::hash(&bytes).to_hex()))
    }
}

fn collect_origins<'a>(value: &'a PropertyValue, out: &mut Vec<&'a Origin>) {
    match value {
        PropertyValue::Ref(r) => out.push(r.origin()),
        PropertyValue::Interpolated(interp) => {
            for fragment in interp.fragments() {
                if let Fragment::Output(r) = fragment {
                    out.push(r.origin());
                }
            }
        }
        PropertyValue::List(items) => {
            for item in items {
                collect_origins(item, out);
            }
        }
        PropertyValue::Map(entries) => {
            for entry in entries.values() {
                collect_origins(entry, out);
            }
        }
        PropertyValue::Str(_) | PropertyValue::Bool(_) | PropertyValue::Int(_) => {}
    }
}

// ===== Graph snapshot =====

#[derive(Debug, Serialize)]
pub struct GraphDoc {
    pub nodes: Vec<GraphNode>,
    pub invocations: Vec<GraphInvoke>,
}

#[derive(Debug, Serialize)]
pub struct GraphNode {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub properties: PropertyMap,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GraphInvoke {
    pub name: String,
    pub function: String,
    pub arguments: PropertyMap,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::NodeType;
    use crate::graph::value::Interpolation;

    const WIDGET: NodeType = NodeType::new("test:core:Widget");

    fn spec(name: &str) -> NodeSpec {
        NodeSpec {
            name: name.to_string(),
            ty: WIDGET,
            properties: PropertyMap::new(),
            depends_on: vec![],
            existing_id: None,
        }
    }

    #[test]
    fn test_register_assigns_sequential_ids() {
        let mut scope = Scope::new();
        let a = scope.register(spec("a")).unwrap();
        let b = scope.register(spec("b")).unwrap();
        assert_eq!(a.id().index(), 0);
        assert_eq!(b.id().index(), 1);
        assert_eq!(scope.len(), 2);
        assert_eq!(scope.lookup("b"), Some(b.id()));
    }

    #[test]
    fn test_duplicate_name_is_rejected() {
        let mut scope = Scope::new();
        scope.register(spec("a")).unwrap();
        let err = scope.register(spec("a")).unwrap_err();
        assert_eq!(err, ScopeError::DuplicateNode { name: "a".into() });
        assert_eq!(scope.len(), 1);
    }

    #[test]
    fn test_edges_derived_from_property_references() {
        let mut scope = Scope::new();
        let base = scope.register(spec("base")).unwrap();
        let mut dependent = spec("dependent");
        dependent.properties = PropertyMap::new().set("baseId", base.output("id"));
        let node = scope.register(dependent).unwrap();

        let record = scope.node(node.id()).unwrap();
        assert_eq!(record.depends_on, vec![base.id()]);
    }

    #[test]
    fn test_explicit_and_derived_edges_deduplicate() {
        let mut scope = Scope::new();
        let a = scope.register(spec("a")).unwrap();
        let b = scope.register(spec("b")).unwrap();
        let mut c = spec("c");
        c.depends_on = vec![b.id(), a.id()];
        c.properties = PropertyMap::new().set("aId", a.output("id"));
        let c = scope.register(c).unwrap();

        // explicit order first, derived duplicates folded in
        let record = scope.node(c.id()).unwrap();
        assert_eq!(record.depends_on, vec![b.id(), a.id()]);
    }

    #[test]
    fn test_reference_to_unknown_node_is_rejected() {
        let mut scope = Scope::new();
        let mut bad = spec("bad");
        bad.properties =
            PropertyMap::new().set("id", crate::graph::types::OutputRef::node("ghost"));
        let err = scope.register(bad).unwrap_err();
        assert_eq!(err, ScopeError::UnknownReference { name: "ghost".into() });
        assert!(scope.is_empty());
    }

    #[test]
    fn test_interpolation_references_create_edges() {
        let mut scope = Scope::new();
        let eip = scope.register(spec("eip")).unwrap();
        let mut banner = spec("banner");
        banner.properties = PropertyMap::new().set(
            "motd",
            Interpolation::new()
                .literal("address: ")
                .output(eip.output("publicIp")),
        );
        let banner = scope.register(banner).unwrap();
        assert_eq!(scope.node(banner.id()).unwrap().depends_on, vec![eip.id()]);
    }

    #[test]
    fn test_out_of_range_dependency_is_rejected() {
        let mut scope = Scope::new();
        let mut bad = spec("bad");
        bad.depends_on = vec![NodeId::new(7)];
        let err = scope.register(bad).unwrap_err();
        assert_eq!(err, ScopeError::UnknownDependency { index: 7 });
    }

    #[test]
    fn test_invoke_is_memoized_for_identical_arguments() {
        let mut scope = Scope::new();
        let args = PropertyMap::new().set("id", "subnet-1");
        let first = scope
            .invoke("get-subnet-subnet-1", "aws:ec2:getSubnet", args.clone())
            .unwrap();
        let second = scope
            .invoke("get-subnet-subnet-1", "aws:ec2:getSubnet", args)
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(scope.invocations().len(), 1);
    }

    #[test]
    fn test_invoke_name_conflict_is_rejected() {
        let mut scope = Scope::new();
        scope
            .invoke("q", "aws:ec2:getSubnet", PropertyMap::new().set("id", "s-1"))
            .unwrap();
        let err = scope
            .invoke("q", "aws:ec2:getSubnet", PropertyMap::new().set("id", "s-2"))
            .unwrap_err();
        assert_eq!(err, ScopeError::ConflictingInvoke { name: "q".into() });
    }

    #[test]
    fn test_node_properties_may_reference_invocations() {
        let mut scope = Scope::new();
        let az = scope
            .invoke("get-subnet-s1", "aws:ec2:getSubnet", PropertyMap::new().set("id", "s1"))
            .unwrap();
        let mut vol = spec("vol");
        vol.properties = PropertyMap::new().set("availabilityZone", az.field("availabilityZone"));
        let vol = scope.register(vol).unwrap();
        // invocation references are validated but never become node edges
        assert!(scope.node(vol.id()).unwrap().depends_on.is_empty());
    }

    #[test]
    fn test_graph_snapshot_names_dependencies() {
        let mut scope = Scope::new();
        let a = scope.register(spec("a")).unwrap();
        let mut b = spec("b");
        b.depends_on = vec![a.id()];
        scope.register(b).unwrap();

        let doc = scope.to_graph();
        assert_eq!(doc.nodes.len(), 2);
        assert_eq!(doc.nodes[1].depends_on, vec!["a".to_string()]);

        let json = serde_json::to_string(&doc).unwrap();
        // empty edge lists and absent existing ids are omitted entirely
        assert!(!json.contains("existing_id"));
        assert!(json.contains(r#""type":"test:core:Widget""#));
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let build = || {
            let mut scope = Scope::new();
            scope.register(spec("a")).unwrap();
            let mut b = spec("b");
            b.properties = PropertyMap::new().set("n", 1i64);
            scope.register(b).unwrap();
            scope.fingerprint().unwrap()
        };
        let first = build();
        assert_eq!(first, build());
        assert!(first.starts_with("blake3:"));
    }

    #[test]
    fn test_fingerprint_changes_with_content() {
        let mut scope = Scope::new();
        scope.register(spec("a")).unwrap();
        let before = scope.fingerprint().unwrap();
        scope.register(spec("b")).unwrap();
        assert_ne!(before, scope.fingerprint().unwrap());
    }
}
