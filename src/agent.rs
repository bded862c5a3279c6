//! Node agent: turns the notification stream into backend state.
//!
//! Provider network creates that arrive before the sync marker are
//! buffered. The marker triggers a one-time convergence pass that makes
//! the node's VLAN devices and provider bridges exactly match the buffered
//! set; afterwards every create/remove is applied as it arrives.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use tokio::sync::{mpsc, watch};

use crate::error::{AgentError, OvnError};
use crate::ovn::ProviderBackend;
use crate::provider::{network_from_bridge, ProviderNetwork, VlanSpec};
use crate::types::{CniType, Notification, Payload, SyncMarker};

/// Ordered stream of notifications for one node. `Ok(None)` is a clean
/// close.
#[async_trait]
pub trait NotificationSource: Send {
    async fn next(&mut self) -> Result<Option<Notification>, AgentError>;
}

#[async_trait]
impl NotificationSource for mpsc::UnboundedReceiver<Notification> {
    async fn next(&mut self) -> Result<Option<Notification>, AgentError> {
        Ok(self.recv().await)
    }
}

/// Consumer of the route and pod-network messages.
#[async_trait]
pub trait ChainingHandler: Send + Sync {
    async fn apply(&self, payload: &Payload) -> anyhow::Result<()>;
}

/// Logs chaining messages without acting on them.
pub struct LogChaining;

#[async_trait]
impl ChainingHandler for LogChaining {
    async fn apply(&self, payload: &Payload) -> anyhow::Result<()> {
        info!("Received {} notification, no chaining handler configured", payload.kind());
        Ok(())
    }
}

/// What a convergence pass changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConvergenceReport {
    pub created_vlans: Vec<String>,
    pub deleted_vlans: Vec<String>,
    pub created_bridges: Vec<String>,
    pub deleted_bridges: Vec<String>,
}

/// Make the node's VLAN devices and provider bridges equal `desired`.
/// Entries already present on both sides are left alone. The first
/// backend error aborts the pass.
pub async fn converge<B>(backend: &B, desired: &[ProviderNetwork]) -> Result<ConvergenceReport, OvnError>
where
    B: ProviderBackend + ?Sized,
{
    let actual_vlans = backend.vlan_interfaces().await?;
    let actual_bridges = backend.provider_bridges().await?;

    let desired_vlans: BTreeMap<String, &VlanSpec> = desired
        .iter()
        .filter_map(|net| net.vlan())
        .map(|vlan| (vlan.interface_name(), vlan))
        .collect();
    let desired_bridges: BTreeMap<String, &ProviderNetwork> =
        desired.iter().map(|net| (net.bridge_name(), net)).collect();

    let mut report = ConvergenceReport::default();
    for (name, vlan) in &desired_vlans {
        if !actual_vlans.contains(name) {
            backend.create_vlan_interface(vlan).await?;
            report.created_vlans.push(name.clone());
        }
    }
    for name in actual_vlans.iter().filter(|n| !desired_vlans.contains_key(*n)) {
        backend.delete_vlan_interface(name).await?;
        report.deleted_vlans.push(name.clone());
    }
    for (bridge, net) in &desired_bridges {
        if !actual_bridges.contains(bridge) {
            backend.create_provider_bridge(net).await?;
            report.created_bridges.push(bridge.clone());
        }
    }
    for bridge in actual_bridges.iter().filter(|b| !desired_bridges.contains_key(*b)) {
        backend.delete_provider_bridge(network_from_bridge(bridge)).await?;
        report.deleted_bridges.push(bridge.clone());
    }
    Ok(report)
}

pub struct Reconciler<B: ProviderBackend + ?Sized> {
    node_name: String,
    backend: Arc<B>,
    chaining: Arc<dyn ChainingHandler>,
    synchronized: bool,
    pending_creates: Vec<ProviderNetwork>,
}

impl<B: ProviderBackend + ?Sized> Reconciler<B> {
    pub fn new(node_name: impl Into<String>, backend: Arc<B>, chaining: Arc<dyn ChainingHandler>) -> Self {
        Self {
            node_name: node_name.into(),
            backend,
            chaining,
            synchronized: false,
            pending_creates: Vec::new(),
        }
    }

    pub fn is_synchronized(&self) -> bool {
        self.synchronized
    }

    pub fn pending_creates(&self) -> &[ProviderNetwork] {
        &self.pending_creates
    }

    /// Handles one message. Errors are terminal for the agent.
    pub async fn on_message(&mut self, notification: Notification) -> Result<(), AgentError> {
        if notification.cni_type != CniType::Ovn4nfv {
            warn!("Ignoring {} notification for unsupported CNI type", notification.payload.kind());
            return Ok(());
        }
        match notification.payload {
            Payload::ProviderNetworkCreate(net) if !self.synchronized => {
                debug!("Buffering provider network {} until sync", net.name);
                self.pending_creates.push(net);
            }
            Payload::ProviderNetworkRemove(net) if !self.synchronized => {
                warn!("Discarding remove of provider network {} received before sync", net.name);
            }
            Payload::ProviderNetworkCreate(net) => {
                match self.backend.create_provider_network(&net).await {
                    Ok(()) => info!("Provider network {} applied", net.name),
                    Err(e) => error!("Failed to create provider network {}: {}", net.name, e),
                }
            }
            Payload::ProviderNetworkRemove(net) => {
                match self.backend.delete_provider_network(&net).await {
                    Ok(()) => info!("Provider network {} removed", net.name),
                    Err(e) => error!("Failed to delete provider network {}: {}", net.name, e),
                }
            }
            Payload::SyncMarker(marker) => self.synchronize(marker).await?,
            other => {
                if let Err(e) = self.chaining.apply(&other).await {
                    error!("Failed to apply {} notification: {}", other.kind(), e);
                }
            }
        }
        Ok(())
    }

    async fn synchronize(&mut self, marker: SyncMarker) -> Result<(), AgentError> {
        if self.synchronized {
            warn!("Ignoring repeated sync marker");
            return Ok(());
        }
        let report = converge(self.backend.as_ref(), &self.pending_creates)
            .await
            .map_err(AgentError::Convergence)?;
        info!(
            "Converged {} provider networks: +{:?} -{:?} vlans, +{:?} -{:?} bridges",
            self.pending_creates.len(),
            report.created_vlans,
            report.deleted_vlans,
            report.created_bridges,
            report.deleted_bridges
        );
        if let Some(iface) = &marker.node_interface {
            self.backend
                .provision_node_interface(&self.node_name, iface)
                .await
                .map_err(AgentError::NodeInterface)?;
        }
        self.synchronized = true;
        self.pending_creates.clear();
        Ok(())
    }
}

/// Consume `source` until shutdown or a terminal error. In-flight work is
/// dropped when shutdown is signalled.
pub async fn run_agent<S, B>(
    mut source: S,
    mut reconciler: Reconciler<B>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), AgentError>
where
    S: NotificationSource,
    B: ProviderBackend + ?Sized,
{
    loop {
        let step = async {
            match source.next().await {
                Ok(Some(notification)) => reconciler.on_message(notification).await,
                Ok(None) => Err(AgentError::StreamClosed),
                Err(e) => Err(e),
            }
        };
        tokio::select! {
            _ = shutdown.changed() => {
                info!("Agent stopping on shutdown signal");
                return Ok(());
            }
            result = step => result?,
        }
    }
}
