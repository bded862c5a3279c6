//! Provider network intents and node-targeting policies.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InvalidNetwork;

/// Bridge names are derived from the network name with this prefix.
pub const BRIDGE_PREFIX: &str = "br-";

/// An operator-defined network attached through a physical or VLAN
/// interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderNetwork {
    pub name: String,
    pub kind: ProviderNetKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<SubnetSpec>,
    #[serde(default)]
    pub selector: NodeSelector,
    #[serde(default)]
    pub state: LifecycleState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderNetKind {
    Vlan(VlanSpec),
    Direct(DirectSpec),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlanSpec {
    pub vlan_id: u16,
    pub provider_interface: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_interface: Option<String>,
}

impl VlanSpec {
    /// Name of the VLAN device, `<provider_interface>.<vlan_id>` unless
    /// overridden.
    pub fn interface_name(&self) -> String {
        match &self.logical_interface {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("{}.{}", self.provider_interface, self.vlan_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectSpec {
    pub provider_interface: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetSpec {
    /// CIDR, e.g. `172.16.33.0/24`.
    pub cidr: String,
    /// Gateway with mask, e.g. `172.16.33.1/24`.
    pub gateway: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_ips: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    #[default]
    Pending,
    Created,
    CreateError,
    Deleted,
    DeleteError,
}

/// Which nodes an intent is delivered to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", content = "labels", rename_all = "snake_case")]
pub enum NodeSelector {
    #[default]
    All,
    Any,
    Specific(LabelSelector),
}

/// Equality-based label selector, written `key=value,key2=value2`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LabelSelector(BTreeMap<String, String>);

impl LabelSelector {
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.0.iter().all(|(k, v)| labels.get(k) == Some(v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for LabelSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut labels = BTreeMap::new();
        for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| format!("label {:?} is not key=value", pair))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(format!("label {:?} has an empty key", pair));
            }
            labels.insert(key.to_string(), value.trim().to_string());
        }
        Ok(Self(labels))
    }
}

impl TryFrom<String> for LabelSelector {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<LabelSelector> for String {
    fn from(sel: LabelSelector) -> Self {
        sel.to_string()
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self.0.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        f.write_str(&joined.join(","))
    }
}

impl ProviderNetwork {
    pub fn bridge_name(&self) -> String {
        bridge_name(&self.name)
    }

    pub fn vlan(&self) -> Option<&VlanSpec> {
        match &self.kind {
            ProviderNetKind::Vlan(vlan) => Some(vlan),
            ProviderNetKind::Direct(_) => None,
        }
    }

    /// Interface enslaved to the provider bridge.
    pub fn uplink(&self) -> String {
        match &self.kind {
            ProviderNetKind::Vlan(vlan) => vlan.interface_name(),
            ProviderNetKind::Direct(direct) => direct.provider_interface.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), InvalidNetwork> {
        let invalid = |reason: &str| InvalidNetwork {
            name: self.name.clone(),
            reason: reason.to_string(),
        };
        if self.name.is_empty() {
            return Err(invalid("name is empty"));
        }
        match &self.kind {
            ProviderNetKind::Vlan(vlan) => {
                if !(1..=4094).contains(&vlan.vlan_id) {
                    return Err(invalid("vlan id must be within 1..=4094"));
                }
                if vlan.provider_interface.is_empty() {
                    return Err(invalid("provider interface is empty"));
                }
            }
            ProviderNetKind::Direct(direct) => {
                if direct.provider_interface.is_empty() {
                    return Err(invalid("provider interface is empty"));
                }
            }
        }
        if let NodeSelector::Specific(sel) = &self.selector {
            if sel.is_empty() {
                return Err(invalid("specific selector has no labels"));
            }
        }
        Ok(())
    }
}

pub fn bridge_name(network: &str) -> String {
    format!("{}{}", BRIDGE_PREFIX, network)
}

/// Network identity derived from a provider bridge name.
pub fn network_from_bridge(bridge: &str) -> &str {
    bridge.strip_prefix(BRIDGE_PREFIX).unwrap_or(bridge)
}
