//! NB-007: Deferred provider queries — subnet, ARN, and AMI lookups.
//!
//! Nothing here talks to AWS. Each helper records an invocation in the scope
//! and returns a reference to its eventual result; resolution is the
//! external engine's job.

use indexmap::IndexMap;

use crate::graph::{Node, OutputRef, PropertyMap, PropertyValue, Scope, ScopeError};

pub const GET_SUBNET: &str = "aws:ec2:getSubnet";
pub const GET_AMI: &str = "aws:ec2:getAmi";
pub const GET_ARN: &str = "aws:index:getArn";

/// Record a subnet query. Memoized per subnet id: several components sharing
/// one subnet cost a single lookup.
pub fn get_subnet(scope: &mut Scope, subnet_id: &str) -> Result<OutputRef, ScopeError> {
    scope.invoke(
        &format!("get-subnet-{subnet_id}"),
        GET_SUBNET,
        PropertyMap::new().set("id", subnet_id),
    )
}

/// Record an ARN query over a registered node.
pub fn get_arn(scope: &mut Scope, node: &Node) -> Result<OutputRef, ScopeError> {
    scope.invoke(
        &format!("get-arn-{}", node.name()),
        GET_ARN,
        PropertyMap::new().set("resource", node.reference()),
    )
}

/// Search criteria for an AMI lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct AmiQuery {
    pub name: Option<String>,
    pub owners: Option<Vec<String>>,
    pub filters: Option<IndexMap<String, String>>,
    pub most_recent: bool,
}

impl Default for AmiQuery {
    fn default() -> Self {
        AmiQuery {
            name: None,
            owners: None,
            filters: None,
            most_recent: true,
        }
    }
}

/// Record an AMI search. `label` distinguishes several searches within one
/// scope; without it the invocation is simply `get-ami`.
pub fn get_ami(
    scope: &mut Scope,
    label: Option<&str>,
    query: &AmiQuery,
) -> Result<OutputRef, ScopeError> {
    let name = match label {
        Some(label) => format!("get-ami-{label}"),
        None => "get-ami".to_string(),
    };
    let arguments = PropertyMap::new()
        .set("mostRecent", query.most_recent)
        .maybe("name", query.name.clone())
        .maybe(
            "owners",
            query
                .owners
                .as_ref()
                .map(|owners| PropertyValue::string_list(owners.iter().cloned())),
        )
        .maybe("filters", query.filters.as_ref().map(PropertyValue::string_map));
    scope.invoke(&name, GET_AMI, arguments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeSpec, NodeType, Origin};

    fn register_widget(scope: &mut Scope, name: &str) -> Node {
        scope
            .register(NodeSpec {
                name: name.to_string(),
                ty: NodeType::new("test:core:Widget"),
                properties: PropertyMap::new(),
                depends_on: vec![],
                existing_id: None,
            })
            .unwrap()
    }

    #[test]
    fn test_get_subnet_records_one_invocation() {
        let mut scope = Scope::new();
        let first = get_subnet(&mut scope, "subnet-123").unwrap();
        let second = get_subnet(&mut scope, "subnet-123").unwrap();
        assert_eq!(first, second);
        assert_eq!(scope.invocations().len(), 1);

        let record = &scope.invocations()[0];
        assert_eq!(record.function, GET_SUBNET);
        assert_eq!(record.name, "get-subnet-subnet-123");
        assert_eq!(record.arguments.get("id"), Some(&PropertyValue::Str("subnet-123".into())));
    }

    #[test]
    fn test_get_subnet_distinct_ids_record_separately() {
        let mut scope = Scope::new();
        get_subnet(&mut scope, "subnet-a").unwrap();
        get_subnet(&mut scope, "subnet-b").unwrap();
        assert_eq!(scope.invocations().len(), 2);
    }

    #[test]
    fn test_get_arn_references_the_node() {
        let mut scope = Scope::new();
        let node = register_widget(&mut scope, "web-instance");
        let arn = get_arn(&mut scope, &node).unwrap();
        assert_eq!(arn.origin(), &Origin::Invoke("get-arn-web-instance".into()));
        assert_eq!(
            scope.invocations()[0].arguments.get("resource"),
            Some(&PropertyValue::Ref(node.reference()))
        );
    }

    #[test]
    fn test_get_arn_rejects_foreign_node() {
        let mut a = Scope::new();
        let node = register_widget(&mut a, "orphan");
        let mut b = Scope::new();
        let err = get_arn(&mut b, &node).unwrap_err();
        assert_eq!(err, ScopeError::UnknownReference { name: "orphan".into() });
    }

    #[test]
    fn test_get_ami_defaults_to_most_recent_only() {
        let mut scope = Scope::new();
        get_ami(&mut scope, None, &AmiQuery::default()).unwrap();
        let record = &scope.invocations()[0];
        assert_eq!(record.name, "get-ami");
        assert_eq!(record.function, GET_AMI);
        assert_eq!(record.arguments.len(), 1);
        assert_eq!(record.arguments.get("mostRecent"), Some(&PropertyValue::Bool(true)));
    }

    #[test]
    fn test_get_ami_carries_search_criteria() {
        let mut scope = Scope::new();
        let mut filters = IndexMap::new();
        filters.insert("architecture".to_string(), "x86_64".to_string());
        let query = AmiQuery {
            name: Some("al2023-ami-*".into()),
            owners: Some(vec!["amazon".into()]),
            filters: Some(filters),
            most_recent: true,
        };
        get_ami(&mut scope, Some("web"), &query).unwrap();

        let record = &scope.invocations()[0];
        assert_eq!(record.name, "get-ami-web");
        assert!(record.arguments.contains("name"));
        assert!(record.arguments.contains("owners"));
        assert!(record.arguments.contains("filters"));
    }

    #[test]
    fn test_ami_reference_renders_as_placeholder() {
        let mut scope = Scope::new();
        let ami = get_ami(&mut scope, None, &AmiQuery::default()).unwrap();
        assert_eq!(ami.field("id").to_string(), "${get-ami.id}");
    }
}
