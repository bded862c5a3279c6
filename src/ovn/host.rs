use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use log::info;

use super::controller::{node_port_name, LogicalNetworkController};
use super::ProviderBackend;
use crate::error::OvnError;
use crate::provider::{bridge_name, ProviderNetwork, VlanSpec, BRIDGE_PREFIX};
use crate::types::NodeInterface;

const BRIDGE_MAPPINGS: &str = "external_ids:ovn-bridge-mappings";

/// Extracts `eth1.100` from `7: eth1.100@eth1: <BROADCAST,...> mtu 1500`.
fn link_name(line: &str) -> Option<String> {
    let name = line.split(": ").nth(1)?.split('@').next()?.trim();
    (!name.is_empty()).then(|| name.to_string())
}

fn parse_mappings(raw: &str) -> BTreeMap<String, String> {
    raw.trim()
        .trim_matches('"')
        .split(',')
        .filter_map(|entry| entry.split_once(':'))
        .map(|(net, bridge)| (net.trim().to_string(), bridge.trim().to_string()))
        .filter(|(net, _)| !net.is_empty())
        .collect()
}

impl LogicalNetworkController {
    /// Adds (`Some`) or removes (`None`) the bridge mapping for `network`,
    /// leaving the row untouched when nothing changes.
    async fn set_bridge_mapping(&self, network: &str, bridge: Option<&str>) -> Result<(), OvnError> {
        let raw = self
            .exec
            .vsctl(&["--if-exists", "get", "open_vswitch", ".", BRIDGE_MAPPINGS])
            .await?;
        let mut mappings = parse_mappings(&raw);
        let changed = match bridge {
            Some(bridge) => mappings.insert(network.to_string(), bridge.to_string()).as_deref() != Some(bridge),
            None => mappings.remove(network).is_some(),
        };
        if !changed {
            return Ok(());
        }
        if mappings.is_empty() {
            self.exec
                .vsctl(&["remove", "open_vswitch", ".", "external_ids", "ovn-bridge-mappings"])
                .await?;
        } else {
            let joined: Vec<String> = mappings.iter().map(|(n, b)| format!("{}:{}", n, b)).collect();
            let value = format!("{}=\"{}\"", BRIDGE_MAPPINGS, joined.join(","));
            self.exec.vsctl(&["set", "open_vswitch", ".", &value]).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ProviderBackend for LogicalNetworkController {
    async fn vlan_interfaces(&self) -> Result<BTreeSet<String>, OvnError> {
        let out = self.exec.ip(&["-o", "-d", "link", "show", "type", "vlan"]).await?;
        Ok(out.lines().filter_map(link_name).collect())
    }

    async fn provider_bridges(&self) -> Result<BTreeSet<String>, OvnError> {
        let out = self.exec.vsctl(&["list-br"]).await?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|b| b.starts_with(BRIDGE_PREFIX) && *b != self.settings.integration_bridge)
            .map(str::to_string)
            .collect())
    }

    async fn create_vlan_interface(&self, vlan: &VlanSpec) -> Result<(), OvnError> {
        let name = vlan.interface_name();
        let id = vlan.vlan_id.to_string();
        self.exec
            .ip(&["link", "add", "link", &vlan.provider_interface, "name", &name, "type", "vlan", "id", &id])
            .await?;
        self.exec.ip(&["link", "set", &name, "up"]).await?;
        info!("Created VLAN interface {}", name);
        Ok(())
    }

    async fn delete_vlan_interface(&self, name: &str) -> Result<(), OvnError> {
        self.exec.ip(&["link", "del", name]).await?;
        info!("Deleted VLAN interface {}", name);
        Ok(())
    }

    async fn create_provider_bridge(&self, net: &ProviderNetwork) -> Result<(), OvnError> {
        self.create_provider_switch(net).await?;
        let bridge = net.bridge_name();
        let uplink = net.uplink();
        self.exec.vsctl(&["--may-exist", "add-br", &bridge]).await?;
        self.exec.vsctl(&["--may-exist", "add-port", &bridge, &uplink]).await?;
        self.exec.ip(&["link", "set", &uplink, "up"]).await?;
        self.set_bridge_mapping(&net.name, Some(&bridge)).await?;
        info!("Provider bridge {} ready with uplink {}", bridge, uplink);
        Ok(())
    }

    async fn delete_provider_bridge(&self, network: &str) -> Result<(), OvnError> {
        let bridge = bridge_name(network);
        self.exec.vsctl(&["--if-exists", "del-br", &bridge]).await?;
        self.set_bridge_mapping(network, None).await?;
        info!("Deleted provider bridge {}", bridge);
        Ok(())
    }

    async fn delete_provider_switch(&self, network: &str) -> Result<(), OvnError> {
        self.delete_logical_switch(network).await
    }

    async fn provision_node_interface(&self, node: &str, iface: &NodeInterface) -> Result<(), OvnError> {
        let dev = &self.settings.node_interface;
        let iface_id = format!("external_ids:iface-id={}", node_port_name(node));
        self.exec
            .vsctl(&[
                "--may-exist", "add-port", &self.settings.integration_bridge, dev,
                "--", "set", "interface", dev, "type=internal", &iface_id,
            ])
            .await?;
        self.exec.ip(&["link", "set", dev, "address", &iface.mac_address]).await?;
        for addr in [&iface.ip_address, &iface.ipv6_address].into_iter().flatten() {
            self.exec.ip(&["addr", "replace", addr, "dev", dev]).await?;
        }
        self.exec.ip(&["link", "set", dev, "up"]).await?;
        info!("Node interface {} configured with {}", dev, iface.mac_address);
        Ok(())
    }
}
