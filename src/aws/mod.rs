//! EC2 components and lookup helpers.
//!
//! Each component plans nodes into a [`crate::graph::Scope`]; the type
//! tokens below name what the external engine would materialize.

pub mod instance;
pub mod keypair;
pub mod lookups;
pub mod subnet;

use crate::graph::NodeType;

pub const INSTANCE: NodeType = NodeType::new("aws:ec2:Instance");
pub const NETWORK_INTERFACE: NodeType = NodeType::new("aws:ec2:NetworkInterface");
pub const VOLUME: NodeType = NodeType::new("aws:ec2:Volume");
pub const VOLUME_ATTACHMENT: NodeType = NodeType::new("aws:ec2:VolumeAttachment");
pub const ELASTIC_IP: NodeType = NodeType::new("aws:ec2:Eip");
pub const EIP_ASSOCIATION: NodeType = NodeType::new("aws:ec2:EipAssociation");
pub const KEY_PAIR: NodeType = NodeType::new("aws:ec2:KeyPair");
pub const DEFAULT_SUBNET: NodeType = NodeType::new("aws:ec2:DefaultSubnet");

pub use instance::{
    ConfigurationError, Instance, InstanceConfig, KeyReference, NetworkingMode, OutputSet,
    PlanError, Topology, VolumeSpec,
};
pub use keypair::{KeyPair, KeyPairConfig};
pub use lookups::AmiQuery;
pub use subnet::DefaultSubnet;
