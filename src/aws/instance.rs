//! NB-004: Compute-instance component — configuration, topology planning,
//! and output projection.
//!
//! `plan` decides which auxiliary nodes an instance needs — dedicated
//! network interface, volumes with their attachments, elastic address with
//! its association, companion key pair — and registers them through the
//! scope in a fixed order. Validation runs strictly first, so a rejected
//! configuration plans nothing at all. No provider is contacted; every
//! unresolved value stays a handle.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aws::keypair::{KeyPair, KeyPairConfig};
use crate::aws::lookups;
use crate::graph::{Node, NodeSpec, OutputRef, PropertyMap, PropertyValue, Scope, ScopeError};

/// Image used when the configuration does not pin one.
pub const DEFAULT_AMI: &str = "ami-0de716d6197524dd9";

pub const DEFAULT_INSTANCE_TYPE: &str = "t3.micro";

// ===== Configuration =====

/// Declarative instance settings. The nil/empty distinction on
/// `security_group_ids` is significant: supplying an empty list still
/// switches networking to a dedicated interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceConfig {
    #[serde(default)]
    pub ami: Option<String>,
    #[serde(default = "default_instance_type")]
    pub instance_type: String,
    #[serde(default, with = "serde_yaml_ng::with::singleton_map")]
    pub key: Option<KeyReference>,
    #[serde(default)]
    pub subnet_id: Option<String>,
    #[serde(default)]
    pub security_group_ids: Option<Vec<String>>,
    #[serde(default)]
    pub user_data: Option<String>,
    #[serde(default)]
    pub volumes: Vec<VolumeSpec>,
    #[serde(default)]
    pub iam_role_arn: Option<String>,
    #[serde(default)]
    pub tags: Option<IndexMap<String, String>>,
    #[serde(default)]
    pub public_ip: bool,
    #[serde(default)]
    pub associate_elastic_ip: bool,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        InstanceConfig {
            ami: None,
            instance_type: default_instance_type(),
            key: None,
            subnet_id: None,
            security_group_ids: None,
            user_data: None,
            volumes: Vec::new(),
            iam_role_arn: None,
            tags: None,
            public_ip: false,
            associate_elastic_ip: false,
        }
    }
}

fn default_instance_type() -> String {
    DEFAULT_INSTANCE_TYPE.to_string()
}

fn default_true() -> bool {
    true
}

/// How the instance's SSH key is supplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyReference {
    /// An existing key pair, referenced by name.
    Named(String),
    /// Plan a companion key pair whose material the provider generates.
    Generated,
}

/// One additional block device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSpec {
    pub device_name: String,
    pub size_gb: u32,
    #[serde(default)]
    pub volume_type: Option<String>,
    #[serde(default = "default_true")]
    pub delete_on_termination: bool,
}

// ===== Errors =====

/// Rejected configurations. Raised before anything registers; never
/// retryable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("associate_elastic_ip requires public_ip")]
    AssociateElasticIpRequiresPublicIp,
    #[error("volumes require subnet_id to pin an availability zone")]
    VolumesRequireSubnetId,
}

/// Planning failure: a rejected configuration or a refused substrate
/// operation. Substrate errors pass through unchanged.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Config(#[from] ConfigurationError),
    #[error(transparent)]
    Scope(#[from] ScopeError),
}

// ===== Modes =====

/// How the instance attaches to the network. A dedicated interface is
/// planned exactly when security groups are supplied or an elastic address
/// will be associated; otherwise networking properties sit directly on the
/// instance node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkingMode {
    Direct,
    Interface,
}

impl NetworkingMode {
    pub fn for_config(cfg: &InstanceConfig) -> Self {
        if cfg.security_group_ids.is_some() || cfg.associate_elastic_ip {
            NetworkingMode::Interface
        } else {
            NetworkingMode::Direct
        }
    }
}

/// Where an elastic-address association points: the dedicated interface when
/// one exists, the instance itself otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressTarget {
    NetworkInterface(OutputRef),
    Instance(OutputRef),
}

impl AddressTarget {
    pub fn select(nic: Option<&Node>, instance: &Node) -> Self {
        match nic {
            Some(nic) => AddressTarget::NetworkInterface(nic.output("id")),
            None => AddressTarget::Instance(instance.output("id")),
        }
    }

    pub fn property(&self) -> (&'static str, OutputRef) {
        match self {
            AddressTarget::NetworkInterface(id) => ("networkInterfaceId", id.clone()),
            AddressTarget::Instance(id) => ("instanceId", id.clone()),
        }
    }
}

// ===== Topology =====

/// Every node planned for one instance component. `volumes` and
/// `attachments` are index-aligned.
#[derive(Debug, Clone)]
pub struct Topology {
    pub instance: Node,
    pub network_interface: Option<Node>,
    pub key_pair: Option<Node>,
    pub volumes: Vec<Node>,
    pub attachments: Vec<Node>,
    pub elastic_address: Option<Node>,
    pub association: Option<Node>,
}

impl Topology {
    pub fn node_count(&self) -> usize {
        1 + usize::from(self.network_interface.is_some())
            + usize::from(self.key_pair.is_some())
            + self.volumes.len()
            + self.attachments.len()
            + usize::from(self.elastic_address.is_some())
            + usize::from(self.association.is_some())
    }
}

// ===== Validation =====

/// Check a configuration without touching the scope.
pub fn validate(cfg: &InstanceConfig) -> Result<(), ConfigurationError> {
    if cfg.associate_elastic_ip && !cfg.public_ip {
        return Err(ConfigurationError::AssociateElasticIpRequiresPublicIp);
    }
    if !cfg.volumes.is_empty() && cfg.subnet_id.is_none() {
        return Err(ConfigurationError::VolumesRequireSubnetId);
    }
    Ok(())
}

/// Resolve the instance's `keyName` property. `Generated` plans a companion
/// key pair and projects its provider-assigned name; the side-effect node is
/// handed back alongside the value.
fn resolve_key_name(
    name: &str,
    key: Option<&KeyReference>,
    scope: &mut Scope,
) -> Result<(Option<PropertyValue>, Option<Node>), ScopeError> {
    match key {
        None => Ok((None, None)),
        Some(KeyReference::Named(key_name)) => {
            Ok((Some(PropertyValue::from(key_name.clone())), None))
        }
        Some(KeyReference::Generated) => {
            let pair = KeyPair::plan(&format!("{name}-keypair"), &KeyPairConfig::default(), scope)?;
            let value = PropertyValue::from(pair.key_name());
            Ok((Some(value), Some(pair.node().clone())))
        }
    }
}

// ===== Planner =====

/// Plan the full topology for one named instance.
///
/// Registration order is fixed: interface, key pair, instance, then per
/// volume the volume and its attachment, then elastic address and
/// association. Identical inputs therefore produce identical graphs.
pub fn plan(name: &str, cfg: &InstanceConfig, scope: &mut Scope) -> Result<Topology, PlanError> {
    validate(cfg)?;

    let mode = NetworkingMode::for_config(cfg);
    log::debug!("planning instance '{name}' ({mode:?} networking)");

    let instance_name = format!("{name}-instance");

    let network_interface = match mode {
        NetworkingMode::Interface => Some(scope.register(NodeSpec {
            name: format!("{name}-nic"),
            ty: super::NETWORK_INTERFACE,
            properties: PropertyMap::new()
                .maybe("subnetId", cfg.subnet_id.clone())
                .maybe(
                    "securityGroups",
                    cfg.security_group_ids
                        .as_ref()
                        .map(|ids| PropertyValue::string_list(ids.iter().cloned())),
                )
                .set("description", format!("{instance_name}-nic")),
            depends_on: vec![],
            existing_id: None,
        })?),
        NetworkingMode::Direct => None,
    };

    let (key_name, key_pair) = resolve_key_name(name, cfg.key.as_ref(), scope)?;

    let mut properties = PropertyMap::new()
        .set("ami", cfg.ami.clone().unwrap_or_else(|| DEFAULT_AMI.to_string()))
        .set("instanceType", cfg.instance_type.clone())
        .maybe("keyName", key_name)
        .maybe("userData", cfg.user_data.clone())
        .maybe("tags", cfg.tags.as_ref().map(PropertyValue::string_map));

    properties = match &network_interface {
        Some(nic) => properties.set(
            "networkInterfaces",
            vec![PropertyValue::Map(IndexMap::from([(
                "networkInterfaceId".to_string(),
                PropertyValue::Ref(nic.output("id")),
            )]))],
        ),
        None => properties.maybe("subnetId", cfg.subnet_id.clone()).maybe(
            "vpcSecurityGroupIds",
            cfg.security_group_ids
                .as_ref()
                .map(|ids| PropertyValue::string_list(ids.iter().cloned())),
        ),
    };

    properties = properties.maybe(
        "iamInstanceProfile",
        cfg.iam_role_arn.as_ref().map(|arn| {
            PropertyValue::Map(IndexMap::from([(
                "arn".to_string(),
                PropertyValue::Str(arn.clone()),
            )]))
        }),
    );

    let instance = scope.register(NodeSpec {
        name: instance_name,
        ty: super::INSTANCE,
        properties,
        depends_on: vec![],
        existing_id: None,
    })?;

    let mut volumes = Vec::with_capacity(cfg.volumes.len());
    let mut attachments = Vec::with_capacity(cfg.volumes.len());
    if !cfg.volumes.is_empty() {
        let Some(subnet_id) = cfg.subnet_id.as_deref() else {
            return Err(ConfigurationError::VolumesRequireSubnetId.into());
        };
        let subnet = lookups::get_subnet(scope, subnet_id)?;
        let zone = subnet.field("availabilityZone");

        for (index, volume) in cfg.volumes.iter().enumerate() {
            let volume_node = scope.register(NodeSpec {
                name: format!("{name}-volume-{index}"),
                ty: super::VOLUME,
                properties: PropertyMap::new()
                    .set("size", volume.size_gb)
                    .maybe("type", volume.volume_type.clone())
                    .set("availabilityZone", zone.clone()),
                depends_on: vec![],
                existing_id: None,
            })?;
            let attachment = scope.register(NodeSpec {
                name: format!("{name}-volume-attach-{index}"),
                ty: super::VOLUME_ATTACHMENT,
                properties: PropertyMap::new()
                    .set("deviceName", volume.device_name.clone())
                    .set("volumeId", volume_node.output("id"))
                    .set("instanceId", instance.output("id"))
                    .set("deleteOnTermination", volume.delete_on_termination),
                depends_on: vec![volume_node.id(), instance.id()],
                existing_id: None,
            })?;
            volumes.push(volume_node);
            attachments.push(attachment);
        }
    }

    let (elastic_address, association) = if cfg.public_ip && cfg.associate_elastic_ip {
        let eip = scope.register(NodeSpec {
            name: format!("{name}-eip"),
            ty: super::ELASTIC_IP,
            properties: PropertyMap::new().set("vpc", true),
            depends_on: vec![],
            existing_id: None,
        })?;
        let target = AddressTarget::select(network_interface.as_ref(), &instance);
        let (target_key, target_id) = target.property();
        let association = scope.register(NodeSpec {
            name: format!("{name}-eip-assoc"),
            ty: super::EIP_ASSOCIATION,
            properties: PropertyMap::new()
                .set("allocationId", eip.output("allocationId"))
                .set(target_key, target_id),
            depends_on: vec![eip.id(), instance.id()],
            existing_id: None,
        })?;
        (Some(eip), Some(association))
    } else {
        (None, None)
    };

    Ok(Topology {
        instance,
        network_interface,
        key_pair,
        volumes,
        attachments,
        elastic_address,
        association,
    })
}

// ===== Output projection =====

/// The component's outward-facing deferred values.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSet {
    pub instance_id: OutputRef,
    pub arn: OutputRef,
    pub public_ip: OutputRef,
    pub private_ip: OutputRef,
    pub dns_name: OutputRef,
}

impl OutputSet {
    /// Outputs keyed by their singular names.
    pub fn named(&self) -> IndexMap<String, OutputRef> {
        IndexMap::from([
            ("instanceId".to_string(), self.instance_id.clone()),
            ("arn".to_string(), self.arn.clone()),
            ("publicIp".to_string(), self.public_ip.clone()),
            ("privateIp".to_string(), self.private_ip.clone()),
            ("dnsName".to_string(), self.dns_name.clone()),
        ])
    }

    /// Alias map with pluralized keys; `instanceId` is the exception and
    /// stays singular.
    pub fn aliases(&self) -> IndexMap<String, OutputRef> {
        IndexMap::from([
            ("instanceId".to_string(), self.instance_id.clone()),
            ("arns".to_string(), self.arn.clone()),
            ("publicIps".to_string(), self.public_ip.clone()),
            ("privateIps".to_string(), self.private_ip.clone()),
            ("dnsNames".to_string(), self.dns_name.clone()),
        ])
    }
}

/// Derive the outputs from a planned topology. The ARN comes from a
/// recorded lookup over the instance node; `publicIp` follows the elastic
/// address exactly when one is associated.
pub fn project(
    topology: &Topology,
    cfg: &InstanceConfig,
    scope: &mut Scope,
) -> Result<OutputSet, ScopeError> {
    let instance = &topology.instance;
    let arn = lookups::get_arn(scope, instance)?.field("arn");
    let public_ip = match (&topology.elastic_address, cfg.associate_elastic_ip) {
        (Some(eip), true) => eip.output("publicIp"),
        _ => instance.output("publicIp"),
    };
    Ok(OutputSet {
        instance_id: instance.output("id"),
        arn,
        public_ip,
        private_ip: instance.output("privateIp"),
        dns_name: instance.output("publicDns"),
    })
}

// ===== Facade =====

/// A planned compute instance: its topology and outputs, nothing else.
#[derive(Debug, Clone)]
pub struct Instance {
    name: String,
    topology: Topology,
    outputs: OutputSet,
}

impl Instance {
    /// Validate, plan, and project in one pass.
    pub fn plan(name: &str, cfg: &InstanceConfig, scope: &mut Scope) -> Result<Instance, PlanError> {
        let topology = plan(name, cfg, scope)?;
        let outputs = project(&topology, cfg, scope)?;
        Ok(Instance {
            name: name.to_string(),
            topology,
            outputs,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn outputs(&self) -> &OutputSet {
        &self.outputs
    }

    pub fn instance_id(&self) -> &OutputRef {
        &self.outputs.instance_id
    }

    pub fn arn(&self) -> &OutputRef {
        &self.outputs.arn
    }

    pub fn public_ip(&self) -> &OutputRef {
        &self.outputs.public_ip
    }

    pub fn private_ip(&self) -> &OutputRef {
        &self.outputs.private_ip
    }

    pub fn dns_name(&self) -> &OutputRef {
        &self.outputs.dns_name
    }
}
