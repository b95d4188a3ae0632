//! NB-006: Default-VPC subnet component.

use crate::graph::{Node, NodeSpec, OutputRef, PropertyMap, Scope, ScopeError};

/// The region's default-VPC subnet, adopted under the fixed logical name
/// `default-subnet`.
#[derive(Debug, Clone)]
pub struct DefaultSubnet {
    node: Node,
}

impl DefaultSubnet {
    pub fn plan(region: &str, scope: &mut Scope) -> Result<DefaultSubnet, ScopeError> {
        let node = scope.register(NodeSpec {
            name: "default-subnet".to_string(),
            ty: super::DEFAULT_SUBNET,
            properties: PropertyMap::new().set("region", region),
            depends_on: vec![],
            existing_id: None,
        })?;
        Ok(DefaultSubnet { node })
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn id(&self) -> OutputRef {
        self.node.output("id")
    }

    pub fn availability_zone(&self) -> OutputRef {
        self.node.output("availabilityZone")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_uses_fixed_logical_name() {
        let mut scope = Scope::new();
        let subnet = DefaultSubnet::plan("us-east-1", &mut scope).unwrap();
        assert_eq!(subnet.node().name(), "default-subnet");

        let record = scope.node(subnet.node().id()).unwrap();
        assert_eq!(record.ty, super::super::DEFAULT_SUBNET);
        assert_eq!(
            record.properties.get("region"),
            Some(&crate::graph::PropertyValue::from("us-east-1"))
        );
    }

    #[test]
    fn test_second_default_subnet_collides() {
        let mut scope = Scope::new();
        DefaultSubnet::plan("us-east-1", &mut scope).unwrap();
        let err = DefaultSubnet::plan("us-west-2", &mut scope).unwrap_err();
        assert_eq!(err, ScopeError::DuplicateNode { name: "default-subnet".into() });
    }

    #[test]
    fn test_availability_zone_projection() {
        let mut scope = Scope::new();
        let subnet = DefaultSubnet::plan("eu-west-1", &mut scope).unwrap();
        assert_eq!(subnet.availability_zone().to_string(), "${default-subnet.availabilityZone}");
    }
}
