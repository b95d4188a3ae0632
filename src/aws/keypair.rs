//! NB-005: Key pair component.

use serde::{Deserialize, Serialize};

use crate::graph::{Node, NodeSpec, OutputRef, PropertyMap, Scope, ScopeError};

/// Key pair settings. Without a `public_key` the provider generates the
/// material at apply time; `existing_id` adopts a key pair that already
/// exists instead of creating one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPairConfig {
    #[serde(default)]
    pub public_key: Option<String>,
    #[serde(default)]
    pub existing_id: Option<String>,
}

/// A planned `aws:ec2:KeyPair` node.
#[derive(Debug, Clone)]
pub struct KeyPair {
    node: Node,
}

impl KeyPair {
    pub fn plan(name: &str, cfg: &KeyPairConfig, scope: &mut Scope) -> Result<KeyPair, ScopeError> {
        let node = scope.register(NodeSpec {
            name: name.to_string(),
            ty: super::KEY_PAIR,
            properties: PropertyMap::new().maybe("publicKey", cfg.public_key.clone()),
            depends_on: vec![],
            existing_id: cfg.existing_id.clone(),
        })?;
        Ok(KeyPair { node })
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn id(&self) -> OutputRef {
        self.node.output("id")
    }

    /// Provider-assigned key name, the value an instance's `keyName`
    /// property references.
    pub fn key_name(&self) -> OutputRef {
        self.node.output("keyName")
    }
}
