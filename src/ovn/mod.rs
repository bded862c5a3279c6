use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::OvnError;
use crate::provider::{ProviderNetwork, VlanSpec};
use crate::types::NodeInterface;

pub mod address;
pub mod controller;
mod host;

pub use address::PodInterface;
pub use controller::{LogicalNetworkController, PodPortRequest, PodRef, SwitchSpec};

/// Node-local provider network plumbing driven by the reconciler.
///
/// The primitive operations map one-to-one onto backend objects; the
/// provided `create_provider_network`/`delete_provider_network` compose
/// them idempotently for incremental updates.
#[async_trait]
pub trait ProviderBackend: Send + Sync {
    /// Names of VLAN devices present on the node.
    async fn vlan_interfaces(&self) -> Result<BTreeSet<String>, OvnError>;

    /// Provider bridges (`br-<network>`) present on the node.
    async fn provider_bridges(&self) -> Result<BTreeSet<String>, OvnError>;

    async fn create_vlan_interface(&self, vlan: &VlanSpec) -> Result<(), OvnError>;

    async fn delete_vlan_interface(&self, name: &str) -> Result<(), OvnError>;

    /// Bridge, uplink port and bridge mapping for `net`.
    async fn create_provider_bridge(&self, net: &ProviderNetwork) -> Result<(), OvnError>;

    async fn delete_provider_bridge(&self, network: &str) -> Result<(), OvnError>;

    async fn delete_provider_switch(&self, network: &str) -> Result<(), OvnError>;

    /// Plugs the node's own interface into the integration bridge.
    async fn provision_node_interface(&self, node: &str, iface: &NodeInterface) -> Result<(), OvnError>;

    async fn create_provider_network(&self, net: &ProviderNetwork) -> Result<(), OvnError> {
        if let Some(vlan) = net.vlan() {
            if !self.vlan_interfaces().await?.contains(&vlan.interface_name()) {
                self.create_vlan_interface(vlan).await?;
            }
        }
        self.create_provider_bridge(net).await
    }

    async fn delete_provider_network(&self, net: &ProviderNetwork) -> Result<(), OvnError> {
        self.delete_provider_bridge(&net.name).await?;
        if let Some(vlan) = net.vlan() {
            let name = vlan.interface_name();
            if self.vlan_interfaces().await?.contains(&name) {
                self.delete_vlan_interface(&name).await?;
            }
        }
        self.delete_provider_switch(&net.name).await
    }
}
