//! Messages carried on a node's notification stream.
//!
//! These types are serialised using [`serde`](https://serde.rs/) as one
//! JSON document per line. Ordering is only defined within the stream of
//! a single node.

use serde::{Deserialize, Serialize};

use crate::provider::ProviderNetwork;

/// CNI flavour a notification is addressed to. Only [`CniType::Ovn4nfv`]
/// is handled; anything else deserialises to [`CniType::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CniType {
    Ovn4nfv,
    Other,
}

impl From<String> for CniType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "ovn4nfv" => CniType::Ovn4nfv,
            _ => CniType::Other,
        }
    }
}

impl From<CniType> for String {
    fn from(cni: CniType) -> Self {
        match cni {
            CniType::Ovn4nfv => "ovn4nfv".into(),
            CniType::Other => "other".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub cni_type: CniType,
    pub payload: Payload,
}

impl Notification {
    pub fn new(payload: Payload) -> Self {
        Self {
            cni_type: CniType::Ovn4nfv,
            payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    ProviderNetworkCreate(ProviderNetwork),
    ProviderNetworkRemove(ProviderNetwork),
    ContainerRouteInsert(ContainerRoutes),
    ContainerRouteRemove(ContainerRoutes),
    PodAddNetwork(PodNetwork),
    PodDelNetwork(PodNetwork),
    /// The full initial desired state has been sent; reconcile and switch
    /// to incremental mode.
    SyncMarker(SyncMarker),
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::ProviderNetworkCreate(_) => "provider_network_create",
            Payload::ProviderNetworkRemove(_) => "provider_network_remove",
            Payload::ContainerRouteInsert(_) => "container_route_insert",
            Payload::ContainerRouteRemove(_) => "container_route_remove",
            Payload::PodAddNetwork(_) => "pod_add_network",
            Payload::PodDelNetwork(_) => "pod_del_network",
            Payload::SyncMarker(_) => "sync_marker",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMarker {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_interface: Option<NodeInterface>,
}

/// Addressing for a node's own port on the cluster network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInterface {
    /// IPv4 address with mask, e.g. `10.154.142.5/18`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6_address: Option<String>,
    pub mac_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub dst: String,
    pub gw: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRoutes {
    pub container_id: String,
    pub routes: Vec<Route>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodNetwork {
    pub container_id: String,
    pub network: String,
    pub interface: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
}
