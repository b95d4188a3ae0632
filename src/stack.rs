//! NB-008: Stack files — the YAML surface naming key pairs and instances.
//!
//! Parsing and structural validation live here; plan-time rules (elastic
//! address gating, volume placement) belong to the components themselves.

use std::fmt;
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::aws::instance::{Instance, InstanceConfig};
use crate::aws::keypair::{KeyPair, KeyPairConfig};
use crate::aws::subnet::DefaultSubnet;
use crate::graph::Scope;

pub const STACK_VERSION: &str = "1.0";

/// Starter stack file written by `nube init`.
pub const STACK_TEMPLATE: &str = r#"version: "1.0"
name: my-stack

key_pairs: {}

instances:
  web:
    instance_type: t3.micro
    public_ip: true
"#;

// ===== Model =====

/// Top-level stack file (`nube.yaml`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackConfig {
    pub version: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub default_subnet: Option<DefaultSubnetConfig>,
    #[serde(default)]
    pub key_pairs: IndexMap<String, KeyPairConfig>,
    #[serde(default)]
    pub instances: IndexMap<String, InstanceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultSubnetConfig {
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl StackConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, String> {
        serde_yaml_ng::from_str(yaml).map_err(|e| format!("YAML parse error: {e}"))
    }

    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
        Self::from_yaml(&content)
    }
}

// ===== Validation =====

/// A structural error with the offending path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Structural checks on a parsed stack. Returns every problem found, not
/// just the first.
pub fn validate_stack(config: &StackConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.version != STACK_VERSION {
        errors.push(ValidationError {
            path: "version".into(),
            message: format!(
                "unsupported version '{}', expected '{STACK_VERSION}'",
                config.version
            ),
        });
    }
    if config.name.is_empty() {
        errors.push(ValidationError {
            path: "name".into(),
            message: "stack name must not be empty".into(),
        });
    }

    for name in config.key_pairs.keys() {
        if name.is_empty() {
            errors.push(ValidationError {
                path: "key_pairs".into(),
                message: "key pair name must not be empty".into(),
            });
        }
    }

    for (name, instance) in &config.instances {
        let path = format!("instances.{name}");
        if name.is_empty() {
            errors.push(ValidationError {
                path: "instances".into(),
                message: "instance name must not be empty".into(),
            });
        }
        if instance.instance_type.is_empty() {
            errors.push(ValidationError {
                path: format!("{path}.instance_type"),
                message: "instance type must not be empty".into(),
            });
        }

        let mut devices: FxHashSet<&str> = FxHashSet::default();
        for (index, volume) in instance.volumes.iter().enumerate() {
            let volume_path = format!("{path}.volumes[{index}]");
            if volume.device_name.is_empty() {
                errors.push(ValidationError {
                    path: format!("{volume_path}.device_name"),
                    message: "device name must not be empty".into(),
                });
            } else if !devices.insert(&volume.device_name) {
                errors.push(ValidationError {
                    path: format!("{volume_path}.device_name"),
                    message: format!("duplicate device name '{}'", volume.device_name),
                });
            }
            if volume.size_gb == 0 {
                errors.push(ValidationError {
                    path: format!("{volume_path}.size_gb"),
                    message: "volume size must be positive".into(),
                });
            }
        }
    }

    errors
}

// ===== Build =====

/// A fully planned stack: the populated scope plus each planned instance.
#[derive(Debug)]
pub struct BuiltStack {
    pub scope: Scope,
    pub instances: Vec<Instance>,
}

/// Plan every component into one scope. Order follows the file: default
/// subnet, key pairs, then instances.
pub fn build_stack(config: &StackConfig) -> Result<BuiltStack, String> {
    let mut scope = Scope::new();

    if let Some(subnet) = &config.default_subnet {
        DefaultSubnet::plan(&subnet.region, &mut scope)
            .map_err(|e| format!("default_subnet: {e}"))?;
    }
    for (name, cfg) in &config.key_pairs {
        KeyPair::plan(name, cfg, &mut scope).map_err(|e| format!("key_pairs.{name}: {e}"))?;
    }

    let mut instances = Vec::with_capacity(config.instances.len());
    for (name, cfg) in &config.instances {
        let planned =
            Instance::plan(name, cfg, &mut scope).map_err(|e| format!("instances.{name}: {e}"))?;
        instances.push(planned);
    }

    log::debug!(
        "stack '{}' planned: {} nodes, {} invocations",
        config.name,
        scope.len(),
        scope.invocations().len()
    );
    Ok(BuiltStack { scope, instances })
}
