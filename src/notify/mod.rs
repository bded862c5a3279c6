//! Notification distribution.
//!
//! Keeps one outbound stream per connected node and fans provider network
//! intents out to them according to each intent's [`NodeSelector`].
//! Delivery is best effort: a failed send is logged and the remaining
//! targets are still tried.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use tokio::sync::{mpsc, Mutex};

use crate::error::NotifyError;
use crate::ovn::LogicalNetworkController;
use crate::provider::{LifecycleState, NodeSelector, ProviderNetwork};
use crate::types::{NodeInterface, Notification, Payload, SyncMarker};

pub mod membership;
pub mod transport;

pub use membership::{NodeMembership, StaticMembership};

/// Supplies node bootstrap addressing when no pending data was set.
#[async_trait]
pub trait NodeBootstrap: Send + Sync {
    async fn node_interface(&self, node: &str) -> anyhow::Result<NodeInterface>;
}

#[async_trait]
impl NodeBootstrap for LogicalNetworkController {
    async fn node_interface(&self, node: &str) -> anyhow::Result<NodeInterface> {
        Ok(self.create_node_port(node).await?)
    }
}

/// Outbound handle for one node. Messages are queued and written by the
/// node's connection task, so concurrent senders never interleave.
#[derive(Debug, Clone)]
pub struct NodeStream {
    node: String,
    tx: mpsc::UnboundedSender<Notification>,
}

impl NodeStream {
    pub fn send(&self, notification: Notification) -> Result<(), NotifyError> {
        self.tx
            .send(notification)
            .map_err(|_| NotifyError::StreamClosed(self.node.clone()))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

struct IntentRecord {
    network: ProviderNetwork,
    /// Node holding an ANY-policy network.
    assigned: Option<String>,
    /// Last version that passed validation and went out to nodes.
    delivered: Option<ProviderNetwork>,
}

pub struct NotificationServer {
    registry: Mutex<HashMap<String, NodeStream>>,
    intents: Mutex<BTreeMap<String, IntentRecord>>,
    bootstrap: Mutex<HashMap<String, NodeInterface>>,
    bootstrapper: Option<Arc<dyn NodeBootstrap>>,
    membership: Arc<dyn NodeMembership>,
}

impl NotificationServer {
    pub fn new(membership: Arc<dyn NodeMembership>) -> Self {
        Self {
            registry: Mutex::new(HashMap::new()),
            intents: Mutex::new(BTreeMap::new()),
            bootstrap: Mutex::new(HashMap::new()),
            bootstrapper: None,
            membership,
        }
    }

    pub fn with_bootstrapper(mut self, bootstrapper: Arc<dyn NodeBootstrap>) -> Self {
        self.bootstrapper = Some(bootstrapper);
        self
    }

    /// Registers `node_name` and queues the catch-up: every intent that
    /// targets the node, then a sync marker.
    pub async fn subscribe(
        &self,
        node_name: &str,
    ) -> Result<mpsc::UnboundedReceiver<Notification>, NotifyError> {
        if node_name.is_empty() {
            return Err(NotifyError::InvalidArgument);
        }
        let node_interface = self.resolve_bootstrap(node_name).await;
        let (tx, rx) = mpsc::unbounded_channel();
        let stream = NodeStream {
            node: node_name.to_string(),
            tx,
        };

        // Holding the intent table keeps publishes from slipping in ahead
        // of the catch-up.
        let mut intents = self.intents.lock().await;
        if self
            .registry
            .lock()
            .await
            .insert(node_name.to_string(), stream.clone())
            .is_some()
        {
            info!("Node {} re-subscribed, replacing its stream", node_name);
        }
        for record in intents.values_mut() {
            if !matches!(record.network.state, LifecycleState::Pending | LifecycleState::Created) {
                continue;
            }
            self.deliver_create(record, Some(node_name)).await;
        }
        stream.send(Notification::new(Payload::SyncMarker(SyncMarker { node_interface })))?;
        info!("Node {} subscribed, catch-up queued", node_name);
        Ok(rx)
    }

    async fn resolve_bootstrap(&self, node: &str) -> Option<NodeInterface> {
        if let Some(iface) = self.bootstrap.lock().await.remove(node) {
            return Some(iface);
        }
        let bootstrapper = self.bootstrapper.as_ref()?;
        match bootstrapper.node_interface(node).await {
            Ok(iface) => Some(iface),
            Err(e) => {
                error!("Failed to allocate node interface for {}: {}", node, e);
                None
            }
        }
    }

    pub async fn set_node_bootstrap(&self, node: &str, iface: NodeInterface) {
        self.bootstrap.lock().await.insert(node.to_string(), iface);
    }

    pub async fn registered_stream(&self, node: &str) -> Option<NodeStream> {
        self.registry.lock().await.get(node).cloned()
    }

    /// Drops the registry entry for `node` if its stream is dead.
    pub async fn release(&self, node: &str) {
        let mut registry = self.registry.lock().await;
        if registry.get(node).is_some_and(NodeStream::is_closed) {
            registry.remove(node);
            debug!("Released stream for node {}", node);
        }
    }

    pub async fn state_of(&self, name: &str) -> Option<LifecycleState> {
        self.intents
            .lock()
            .await
            .get(name)
            .map(|r| r.network.state)
    }

    /// Stores `network` and delivers it to its targets.
    pub async fn apply_provider_network(&self, mut network: ProviderNetwork) -> LifecycleState {
        let mut intents = self.intents.lock().await;
        network.state = intents
            .get(&network.name)
            .map(|r| r.network.state)
            .unwrap_or_default();
        let record = intents
            .entry(network.name.clone())
            .or_insert_with(|| IntentRecord {
                network: network.clone(),
                assigned: None,
                delivered: None,
            });
        record.network = network;
        if let Err(e) = record.network.validate() {
            error!("{}", e);
            record.network.state = LifecycleState::CreateError;
            return LifecycleState::CreateError;
        }
        self.deliver_create(record, None).await;
        record.network.state
    }

    /// Sends removes to wherever the network was delivered and forgets it.
    /// An intent that never reached a node is simply forgotten.
    pub async fn remove_provider_network(&self, name: &str) -> Result<LifecycleState, NotifyError> {
        let mut intents = self.intents.lock().await;
        let record = intents
            .get_mut(name)
            .ok_or_else(|| NotifyError::UnknownNetwork(name.to_string()))?;
        let Some(mut network) = record.delivered.clone() else {
            intents.remove(name);
            info!("Provider network {} was never delivered, forgotten", name);
            return Ok(LifecycleState::Deleted);
        };
        let targets = match &network.selector {
            NodeSelector::Any => record.assigned.iter().cloned().collect(),
            selector => match self.resolve_targets(selector, None).await {
                Ok(targets) => targets,
                Err(e) => {
                    error!("Cannot remove provider network {}: {}", name, e);
                    record.network.state = LifecycleState::DeleteError;
                    return Ok(LifecycleState::DeleteError);
                }
            },
        };
        network.state = LifecycleState::Deleted;
        let registry = self.registry.lock().await;
        for node in &targets {
            match registry.get(node) {
                Some(stream) => {
                    if let Err(e) = stream.send(Notification::new(Payload::ProviderNetworkRemove(network.clone()))) {
                        warn!("Remove of {} not delivered: {}", name, e);
                    }
                }
                None => debug!("Node {} not connected, skipping remove of {}", node, name),
            }
        }
        intents.remove(name);
        info!("Provider network {} deleted", name);
        Ok(LifecycleState::Deleted)
    }

    /// Registered nodes a policy targets, narrowed to `originating` when
    /// set. ANY is handled by the caller.
    async fn resolve_targets(
        &self,
        selector: &NodeSelector,
        originating: Option<&str>,
    ) -> anyhow::Result<BTreeSet<String>> {
        let registered: BTreeSet<String> = self.registry.lock().await.keys().cloned().collect();
        let candidates = match selector {
            NodeSelector::All | NodeSelector::Any => registered,
            NodeSelector::Specific(labels) => self
                .membership
                .nodes_matching(labels)
                .await?
                .into_iter()
                .filter(|n| registered.contains(n))
                .collect(),
        };
        Ok(match originating {
            Some(node) => candidates.into_iter().filter(|n| n == node).collect(),
            None => candidates,
        })
    }

    async fn deliver_create(&self, record: &mut IntentRecord, originating: Option<&str>) {
        let name = record.network.name.clone();
        match record.network.selector.clone() {
            NodeSelector::Any => self.deliver_any(record, originating).await,
            selector => {
                let targets = match self.resolve_targets(&selector, originating).await {
                    Ok(targets) => targets,
                    Err(e) => {
                        error!("Cannot resolve targets of provider network {}: {}", name, e);
                        if originating.is_none() {
                            record.network.state = LifecycleState::CreateError;
                        }
                        return;
                    }
                };
                if targets.is_empty() {
                    debug!("No connected node matches provider network {}", name);
                }
                let registry = self.registry.lock().await;
                for node in &targets {
                    let Some(stream) = registry.get(node) else { continue };
                    let message = Notification::new(Payload::ProviderNetworkCreate(record.network.clone()));
                    if let Err(e) = stream.send(message) {
                        warn!("Create of {} not delivered: {}", name, e);
                    }
                }
                if originating.is_none() {
                    record.delivered = Some(record.network.clone());
                    if record.network.state != LifecycleState::Created {
                        record.network.state = LifecycleState::Created;
                        info!("Provider network {} created", name);
                    }
                }
            }
        }
    }

    /// Exactly one node receives the network; the first successful send
    /// wins.
    async fn deliver_any(&self, record: &mut IntentRecord, originating: Option<&str>) {
        let name = record.network.name.clone();
        let created = record.network.state == LifecycleState::Created;
        let registry = self.registry.lock().await;

        let mut candidates: Vec<String> = Vec::new();
        match originating {
            Some(node) => {
                let holds_it = record.assigned.as_deref() == Some(node);
                if holds_it || !created {
                    candidates.push(node.to_string());
                }
            }
            None => {
                candidates.extend(record.assigned.iter().cloned());
                let mut rest: Vec<String> = registry.keys().filter(|n| Some(*n) != record.assigned.as_ref()).cloned().collect();
                rest.sort();
                candidates.extend(rest);
            }
        }

        for node in candidates {
            let Some(stream) = registry.get(&node) else { continue };
            let message = Notification::new(Payload::ProviderNetworkCreate(record.network.clone()));
            match stream.send(message) {
                Ok(()) => {
                    record.assigned = Some(node.clone());
                    record.delivered = Some(record.network.clone());
                    if record.network.state != LifecycleState::Created {
                        record.network.state = LifecycleState::Created;
                        info!("Provider network {} created on node {}", name, node);
                    }
                    return;
                }
                Err(e) => warn!("Create of {} not delivered: {}, trying next node", name, e),
            }
        }
        if originating.is_none() {
            warn!("Provider network {} could not be delivered to any node", name);
        }
    }
}
