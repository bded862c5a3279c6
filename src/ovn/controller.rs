//! Northbound operations: logical switches, ports and routers.

use std::collections::HashMap;
use std::time::Duration;

use log::{debug, info};
use tokio::sync::RwLock;

use super::address::{generate_mac, parse_port_address, split_cidr, Gateway, PodInterface, PortAddress};
use crate::clock::RetryPolicy;
use crate::config::OvnConfig;
use crate::error::OvnError;
use crate::exec::Executor;
use crate::provider::ProviderNetwork;
use crate::types::NodeInterface;

/// Dynamic address discovery: one query per second, thirty at most.
pub const ADDRESS_POLL: RetryPolicy = RetryPolicy::new(30, Duration::from_secs(1));

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub integration_bridge: String,
    pub node_switch: String,
    pub cluster_router: String,
    pub node_interface: String,
    pub address_poll: RetryPolicy,
}

impl From<&OvnConfig> for ControllerSettings {
    fn from(cfg: &OvnConfig) -> Self {
        Self {
            integration_bridge: cfg.integration_bridge.clone(),
            node_switch: cfg.node_switch.clone(),
            cluster_router: cfg.cluster_router.clone(),
            node_interface: cfg.node_interface.clone(),
            address_poll: ADDRESS_POLL,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwitchSpec {
    pub name: String,
    pub subnet_v4: Option<String>,
    pub gateway_v4: Option<String>,
    pub exclude_ips: Option<String>,
    pub subnet_v6: Option<String>,
    pub gateway_v6: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodRef {
    pub namespace: String,
    pub name: String,
}

impl PodRef {
    /// Every logical port owned by the pod contains this string.
    pub fn port_prefix(&self) -> String {
        format!("{}_{}_", self.namespace, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodPortRequest {
    pub pod: PodRef,
    pub switch: String,
    pub interface: String,
    pub ip: Option<String>,
    pub mac: Option<String>,
    pub gateway_ip: Option<String>,
    pub default_gateway: bool,
}

impl PodPortRequest {
    pub fn port_name(&self) -> String {
        format!("{}{}", self.pod.port_prefix(), self.interface)
    }
}

pub fn node_port_name(node: &str) -> String {
    format!("nfn-node-{}", node)
}

fn localnet_port_name(network: &str) -> String {
    format!("{}-localnet", network)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn bare_address(addr: &str) -> String {
    addr.split('/').next().unwrap_or(addr).to_string()
}

fn as_refs(args: &[String]) -> Vec<&str> {
    args.iter().map(String::as_str).collect()
}

/// Idempotent CRUD over the logical network, plus the node-level provider
/// network plumbing in `host.rs`.
pub struct LogicalNetworkController {
    pub(super) exec: Executor,
    pub(super) settings: ControllerSettings,
    gateways: RwLock<HashMap<String, Gateway>>,
}

impl LogicalNetworkController {
    pub fn new(exec: Executor, settings: ControllerSettings) -> Self {
        Self {
            exec,
            settings,
            gateways: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create_logical_switch(&self, spec: &SwitchSpec) -> Result<(), OvnError> {
        let mut args = vec!["--may-exist".to_string(), "ls-add".to_string(), spec.name.clone()];
        let mut columns = Vec::new();
        if let Some(subnet) = non_empty(&spec.subnet_v4) {
            columns.push(format!("other_config:subnet={}", subnet));
        }
        if let Some(exclude) = non_empty(&spec.exclude_ips) {
            columns.push(format!("other_config:exclude_ips=\"{}\"", exclude));
        }
        if let Some(gateway) = non_empty(&spec.gateway_v4) {
            columns.push(format!("external_ids:gateway_ip={}", gateway));
        }
        if let Some(subnet) = non_empty(&spec.subnet_v6) {
            let prefix = subnet.split('/').next().unwrap_or(subnet);
            columns.push(format!("other_config:ipv6_prefix={}", prefix));
        }
        if let Some(gateway) = non_empty(&spec.gateway_v6) {
            columns.push(format!("external_ids:gateway_ipv6={}", gateway));
        }
        if !columns.is_empty() {
            args.extend(["--".to_string(), "set".to_string(), "logical_switch".to_string(), spec.name.clone()]);
            args.extend(columns);
        }
        self.exec.nbctl(&as_refs(&args)).await?;
        info!("Logical switch {} ensured", spec.name);
        Ok(())
    }

    /// Connects `switch` to the cluster router with `gateway` (CIDR) as
    /// the router port address. An existing router port keeps its MAC.
    pub async fn attach_to_router(&self, switch: &str, gateway: &str) -> Result<(), OvnError> {
        let router = &self.settings.cluster_router;
        let router_port = format!("rtos-{}", switch);
        let switch_port = format!("stor-{}", switch);
        let option = format!("router-port={}", router_port);
        let existing = self
            .exec
            .nbctl(&["--if-exists", "get", "logical_router_port", &router_port, "mac"])
            .await?;
        let existing = existing.trim().trim_matches('"');
        let mac = if existing.is_empty() {
            generate_mac()
        } else {
            existing.to_string()
        };

        self.exec.nbctl(&["--may-exist", "lr-add", router]).await?;
        self.exec
            .nbctl(&["--may-exist", "lrp-add", router, &router_port, &mac, gateway])
            .await?;
        self.exec
            .nbctl(&[
                "--may-exist", "lsp-add", switch, &switch_port,
                "--", "lsp-set-type", &switch_port, "router",
                "--", "lsp-set-addresses", &switch_port, "router",
                "--", "lsp-set-options", &switch_port, &option,
            ])
            .await?;
        Ok(())
    }

    pub async fn delete_logical_switch(&self, name: &str) -> Result<(), OvnError> {
        let router_port = format!("rtos-{}", name);
        self.exec.nbctl(&["--if-exists", "ls-del", name]).await?;
        self.exec.nbctl(&["--if-exists", "lrp-del", &router_port]).await?;
        self.invalidate_gateway(name).await;
        info!("Logical switch {} deleted", name);
        Ok(())
    }

    pub async fn find_logical_switch(&self, name: &str) -> Result<bool, OvnError> {
        let filter = format!("name={}", name);
        let out = self
            .exec
            .nbctl(&["--data=bare", "--no-heading", "--columns=name", "find", "logical_switch", &filter])
            .await?;
        Ok(!out.is_empty())
    }

    /// Gateway of `switch`, resolved once and then served from the cache.
    pub async fn gateway(&self, switch: &str) -> Result<Gateway, OvnError> {
        if let Some(gateway) = self.gateways.read().await.get(switch) {
            return Ok(gateway.clone());
        }
        let raw = self
            .exec
            .nbctl(&["--if-exists", "get", "logical_switch", switch, "external_ids:gateway_ip"])
            .await?;
        let gateway = split_cidr(&raw).ok_or_else(|| OvnError::MissingGateway(switch.to_string()))?;
        self.gateways
            .write()
            .await
            .insert(switch.to_string(), gateway.clone());
        Ok(gateway)
    }

    pub async fn invalidate_gateway(&self, switch: &str) {
        self.gateways.write().await.remove(switch);
    }

    /// Creates the node's own port with a dynamically assigned address.
    pub async fn create_node_port(&self, node: &str) -> Result<NodeInterface, OvnError> {
        let switch = &self.settings.node_switch;
        let port = node_port_name(node);
        self.exec
            .nbctl(&[
                "--may-exist", "lsp-add", switch, &port,
                "--", "lsp-set-addresses", &port, "dynamic",
            ])
            .await?;
        let address = self.wait_for_dynamic_address(&port).await?;
        let gateway = self.gateway(switch).await?;
        info!("Node port {} assigned {} {}", port, address.mac, address.ip);
        Ok(NodeInterface {
            ip_address: Some(format!("{}/{}", address.ip, gateway.mask)),
            ipv6_address: None,
            mac_address: address.mac,
        })
    }

    /// Creates a pod port. A supplied IP makes the port static (generating
    /// a MAC if needed); otherwise the backend assigns one dynamically.
    pub async fn create_pod_port(&self, req: &PodPortRequest) -> Result<PodInterface, OvnError> {
        let port = req.port_name();
        let pod_ns = format!("external_ids:namespace={}", req.pod.namespace);
        let requested_ip = non_empty(&req.ip);

        let address = match requested_ip {
            Some(ip) => {
                let bare_ip = bare_address(ip);
                let mac = non_empty(&req.mac).map(str::to_string).unwrap_or_else(generate_mac);
                let addresses = format!("{} {}", mac, bare_ip);
                self.exec
                    .nbctl(&[
                        "--may-exist", "lsp-add", &req.switch, &port,
                        "--", "lsp-set-addresses", &port, &addresses,
                        "--", "set", "logical_switch_port", &port, &pod_ns, "external_ids:pod=true",
                    ])
                    .await?;
                let raw = self
                    .exec
                    .nbctl(&["get", "logical_switch_port", &port, "addresses"])
                    .await?;
                parse_port_address(&raw)?.ok_or(OvnError::MalformedAddress(raw))?
            }
            None => {
                self.exec
                    .nbctl(&[
                        "--may-exist", "lsp-add", &req.switch, &port,
                        "--", "lsp-set-addresses", &port, "dynamic",
                        "--", "set", "logical_switch_port", &port, &pod_ns, "external_ids:pod=true",
                    ])
                    .await?;
                self.wait_for_dynamic_address(&port).await?
            }
        };

        // The mask comes from the requested IP, then the supplied gateway,
        // then the switch.
        let supplied_gateway = non_empty(&req.gateway_ip);
        let mask = requested_ip
            .and_then(|ip| ip.split_once('/'))
            .map(|(_, mask)| mask.to_string())
            .or_else(|| supplied_gateway.and_then(split_cidr).map(|g| g.mask));
        let (gateway_ip, mask) = match (supplied_gateway, mask) {
            (Some(gateway), Some(mask)) => (bare_address(gateway), mask),
            (gateway, mask) => {
                let cached = self.gateway(&req.switch).await?;
                (
                    gateway.map(bare_address).unwrap_or(cached.ip),
                    mask.unwrap_or(cached.mask),
                )
            }
        };

        Ok(PodInterface {
            ip_address: format!("{}/{}", address.ip, mask),
            mac_address: address.mac,
            gateway_ip,
            default_gateway: req.default_gateway,
            interface: req.interface.clone(),
        })
    }

    /// Deletes every pod port belonging to `pod`. Returns how many were
    /// removed; none is not an error.
    pub async fn delete_logical_port(&self, pod: &PodRef) -> Result<usize, OvnError> {
        let out = self
            .exec
            .nbctl(&[
                "--data=bare", "--no-heading", "--columns=name",
                "find", "logical_switch_port", "external_ids:pod=true",
            ])
            .await?;
        let prefix = pod.port_prefix();
        let mut removed = 0;
        for port in out.lines().map(str::trim).filter(|p| p.contains(&prefix)) {
            self.exec.nbctl(&["--if-exists", "lsp-del", port]).await?;
            removed += 1;
        }
        debug!("Removed {} logical ports for {}/{}", removed, pod.namespace, pod.name);
        Ok(removed)
    }

    /// Logical switch and localnet port for a provider network.
    pub async fn create_provider_switch(&self, net: &ProviderNetwork) -> Result<(), OvnError> {
        let spec = SwitchSpec {
            name: net.name.clone(),
            subnet_v4: net.subnet.as_ref().map(|s| s.cidr.clone()),
            gateway_v4: net.subnet.as_ref().map(|s| s.gateway.clone()),
            exclude_ips: net.subnet.as_ref().and_then(|s| s.exclude_ips.clone()),
            ..SwitchSpec::default()
        };
        self.create_logical_switch(&spec).await?;

        let port = localnet_port_name(&net.name);
        let option = format!("network_name={}", net.name);
        self.exec
            .nbctl(&[
                "--may-exist", "lsp-add", &net.name, &port,
                "--", "lsp-set-addresses", &port, "unknown",
                "--", "lsp-set-type", &port, "localnet",
                "--", "lsp-set-options", &port, &option,
            ])
            .await?;
        Ok(())
    }

    async fn wait_for_dynamic_address(&self, port: &str) -> Result<PortAddress, OvnError> {
        let exec = &self.exec;
        let poll = self.settings.address_poll;
        let found = poll
            .poll(exec.clock(), |attempt| async move {
                match exec.nbctl(&["get", "logical_switch_port", port, "dynamic_addresses"]).await {
                    Ok(raw) => {
                        let parsed = parse_port_address(&raw);
                        if let Ok(None) = parsed {
                            debug!("Port {} has no dynamic address yet (poll {})", port, attempt);
                        }
                        parsed
                    }
                    Err(e) => Err(OvnError::from(e)),
                }
            })
            .await?;
        found.ok_or_else(|| OvnError::AddressTimeout {
            port: port.to_string(),
            attempts: poll.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::CommandOutput;
    use crate::testutil::{controller, RecordingClock, ScriptedRunner};
    use crate::provider::{DirectSpec, NodeSelector, ProviderNetKind, SubnetSpec};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    /// Answers dynamic address queries with `[]` until `ready_on`.
    fn northbound(ready_on: u32) -> ScriptedRunner {
        let polls = AtomicU32::new(0);
        ScriptedRunner::new(move |_, args| {
            let args = args.join(" ");
            if args.ends_with("dynamic_addresses") {
                let n = polls.fetch_add(1, Ordering::SeqCst) + 1;
                if n >= ready_on {
                    return ScriptedRunner::success("\"0a:00:00:00:00:06 10.154.142.6\"\n");
                }
                return ScriptedRunner::success("[]\n");
            }
            if args.ends_with("external_ids:gateway_ip") {
                return ScriptedRunner::success("\"10.154.142.1/18\"\n");
            }
            if args.ends_with(" addresses") {
                return ScriptedRunner::success("[\"0a:00:00:aa:bb:cc 172.16.33.5\"]\n");
            }
            CommandOutput {
                success: true,
                ..CommandOutput::default()
            }
        })
    }

    #[tokio::test]
    async fn node_port_resolves_after_sixth_poll() {
        let runner = Arc::new(northbound(6));
        let clock = Arc::new(RecordingClock::default());
        let ctl = controller(runner.clone(), clock.clone());

        let iface = ctl.create_node_port("node-a").await.unwrap();
        assert_eq!(iface.ip_address.as_deref(), Some("10.154.142.6/18"));
        assert_eq!(iface.mac_address, "0a:00:00:00:00:06");
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(1); 5]);
        assert_eq!(runner.count("dynamic_addresses"), 6);
    }

    #[tokio::test]
    async fn node_port_times_out_after_thirty_polls() {
        let runner = Arc::new(northbound(u32::MAX));
        let clock = Arc::new(RecordingClock::default());
        let ctl = controller(runner.clone(), clock.clone());

        let err = ctl.create_node_port("node-a").await.unwrap_err();
        assert!(matches!(err, OvnError::AddressTimeout { attempts: 30, .. }));
        assert_eq!(runner.count("dynamic_addresses"), 30);
        assert_eq!(clock.sleeps().len(), 29);
    }

    #[tokio::test]
    async fn gateway_is_resolved_once_per_switch() {
        let runner = Arc::new(northbound(1));
        let ctl = controller(runner.clone(), Arc::new(RecordingClock::default()));

        ctl.create_node_port("node-a").await.unwrap();
        ctl.create_node_port("node-b").await.unwrap();
        assert_eq!(runner.count("external_ids:gateway_ip"), 1);

        ctl.invalidate_gateway("nfn-node").await;
        ctl.create_node_port("node-c").await.unwrap();
        assert_eq!(runner.count("external_ids:gateway_ip"), 2);
    }

    #[tokio::test]
    async fn missing_gateway_is_an_error() {
        let runner = Arc::new(ScriptedRunner::new(|_, args| {
            if args.last().map(String::as_str) == Some("dynamic_addresses") {
                ScriptedRunner::success("\"0a:00:00:00:00:07 10.0.0.7\"")
            } else {
                ScriptedRunner::success("")
            }
        }));
        let ctl = controller(runner, Arc::new(RecordingClock::default()));
        let err = ctl.create_node_port("node-a").await.unwrap_err();
        assert!(matches!(err, OvnError::MissingGateway(ref s) if s == "nfn-node"));
    }

    fn pod_request(ip: Option<&str>, mac: Option<&str>) -> PodPortRequest {
        PodPortRequest {
            pod: PodRef {
                namespace: "default".into(),
                name: "web-0".into(),
            },
            switch: "ovn-net1".into(),
            interface: "net1".into(),
            ip: ip.map(Into::into),
            mac: mac.map(Into::into),
            gateway_ip: None,
            default_gateway: false,
        }
    }

    #[tokio::test]
    async fn static_pod_port_uses_supplied_addresses() {
        let runner = Arc::new(northbound(1));
        let ctl = controller(runner.clone(), Arc::new(RecordingClock::default()));

        let iface = ctl
            .create_pod_port(&pod_request(Some("172.16.33.5/24"), Some("0a:00:00:aa:bb:cc")))
            .await
            .unwrap();
        assert_eq!(iface.ip_address, "172.16.33.5/24");
        assert_eq!(iface.mac_address, "0a:00:00:aa:bb:cc");
        assert_eq!(iface.gateway_ip, "10.154.142.1");
        assert_eq!(runner.count("dynamic_addresses"), 0);
        assert!(runner
            .calls()
            .iter()
            .any(|c| c.contains("lsp-set-addresses default_web-0_net1 0a:00:00:aa:bb:cc 172.16.33.5")));
    }

    #[tokio::test]
    async fn ip_without_mac_generates_one_and_stays_static() {
        let runner = Arc::new(northbound(1));
        let ctl = controller(runner.clone(), Arc::new(RecordingClock::default()));

        ctl.create_pod_port(&pod_request(Some("172.16.33.5"), None)).await.unwrap();
        let set = runner
            .calls()
            .into_iter()
            .find(|c| c.contains("lsp-set-addresses default_web-0_net1"))
            .unwrap();
        assert!(set.contains("lsp-set-addresses default_web-0_net1 0a:00:00:"));
        assert!(!set.contains("dynamic"));
        assert_eq!(runner.count("dynamic_addresses"), 0);
    }

    #[tokio::test]
    async fn pod_port_without_ip_is_dynamic() {
        let runner = Arc::new(northbound(2));
        let clock = Arc::new(RecordingClock::default());
        let ctl = controller(runner.clone(), clock.clone());

        let iface = ctl.create_pod_port(&pod_request(None, None)).await.unwrap();
        assert_eq!(iface.ip_address, "10.154.142.6/18");
        assert_eq!(iface.gateway_ip, "10.154.142.1");
        assert_eq!(clock.sleeps().len(), 1);
        let annotation = serde_json::to_value(&iface).unwrap();
        assert_eq!(annotation["interface"], "net1");
    }

    #[tokio::test]
    async fn supplied_gateway_provides_the_mask() {
        let runner = Arc::new(ScriptedRunner::new(|_, args| {
            if args.last().map(String::as_str) == Some("addresses") {
                ScriptedRunner::success("[\"0a:00:00:aa:bb:cc 172.16.33.5\"]\n")
            } else {
                ScriptedRunner::success("")
            }
        }));
        let ctl = controller(runner.clone(), Arc::new(RecordingClock::default()));

        let mut req = pod_request(Some("172.16.33.5"), Some("0a:00:00:aa:bb:cc"));
        req.gateway_ip = Some("172.16.33.1/24".into());
        let iface = ctl.create_pod_port(&req).await.unwrap();
        assert_eq!(iface.ip_address, "172.16.33.5/24");
        assert_eq!(iface.gateway_ip, "172.16.33.1");
        assert_eq!(runner.count("external_ids:gateway_ip"), 0);
    }

    #[tokio::test]
    async fn delete_logical_port_removes_only_matching_ports() {
        let runner = Arc::new(ScriptedRunner::new(|_, args| {
            if args.iter().any(|a| a == "find") {
                ScriptedRunner::success("default_web-0_net1\ndefault_web-0_net2\ndefault_web-01_net1\nother_web-0_net1\n")
            } else {
                ScriptedRunner::success("")
            }
        }));
        let ctl = controller(runner.clone(), Arc::new(RecordingClock::default()));

        let pod = PodRef {
            namespace: "default".into(),
            name: "web-0".into(),
        };
        assert_eq!(ctl.delete_logical_port(&pod).await.unwrap(), 2);
        assert_eq!(runner.count("lsp-del"), 2);
    }

    #[tokio::test]
    async fn switch_creation_sets_subnet_columns() {
        let runner = Arc::new(ScriptedRunner::ok(""));
        let ctl = controller(runner.clone(), Arc::new(RecordingClock::default()));
        ctl.create_logical_switch(&SwitchSpec {
            name: "nfn-node".into(),
            subnet_v4: Some("10.154.142.0/18".into()),
            gateway_v4: Some("10.154.142.1/18".into()),
            exclude_ips: Some("10.154.142.1..10.154.142.10".into()),
            subnet_v6: Some("fd00:1::/64".into()),
            gateway_v6: None,
        })
        .await
        .unwrap();
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].starts_with("ovn-nbctl --timeout=15 --may-exist ls-add nfn-node -- set logical_switch nfn-node"));
        assert!(calls[0].contains("other_config:subnet=10.154.142.0/18"));
        assert!(calls[0].contains("external_ids:gateway_ip=10.154.142.1/18"));
        assert!(calls[0].contains("other_config:ipv6_prefix=fd00:1::"));
    }

    #[tokio::test]
    async fn router_attachment_keeps_its_mac_across_calls() {
        let router_mac = Mutex::new(String::new());
        let runner = Arc::new(ScriptedRunner::new(move |_, args| {
            let mut mac = router_mac.lock().unwrap();
            if args.iter().any(|a| a == "lrp-add") {
                *mac = args[args.len() - 2].clone();
            }
            if args.last().map(String::as_str) == Some("mac") && !mac.is_empty() {
                return ScriptedRunner::success(&format!("\"{}\"\n", mac));
            }
            ScriptedRunner::success("")
        }));
        let ctl = controller(runner.clone(), Arc::new(RecordingClock::default()));

        ctl.attach_to_router("nfn-node", "10.154.142.1/18").await.unwrap();
        ctl.attach_to_router("nfn-node", "10.154.142.1/18").await.unwrap();

        let calls = runner.calls();
        let adds: Vec<&String> = calls.iter().filter(|c| c.contains("lrp-add")).collect();
        assert_eq!(adds.len(), 2);
        assert_eq!(adds[0], adds[1]);
        assert!(adds[0].starts_with("ovn-nbctl --timeout=15 --may-exist lrp-add nfn-cluster rtos-nfn-node 0a:00:00:"));
        assert!(adds[0].ends_with(" 10.154.142.1/18"));
        assert!(calls.iter().any(|c| c.ends_with(
            "--may-exist lsp-add nfn-node stor-nfn-node -- lsp-set-type stor-nfn-node router \
             -- lsp-set-addresses stor-nfn-node router -- lsp-set-options stor-nfn-node router-port=rtos-nfn-node"
        )));
    }

    #[tokio::test]
    async fn provider_switch_gets_localnet_port() {
        let runner = Arc::new(ScriptedRunner::ok(""));
        let ctl = controller(runner.clone(), Arc::new(RecordingClock::default()));
        let net = ProviderNetwork {
            name: "pnet1".into(),
            kind: ProviderNetKind::Direct(DirectSpec {
                provider_interface: "eth2".into(),
            }),
            subnet: Some(SubnetSpec {
                cidr: "172.16.40.0/24".into(),
                gateway: "172.16.40.1/24".into(),
                exclude_ips: None,
            }),
            selector: NodeSelector::All,
            state: Default::default(),
        };

        ctl.create_provider_switch(&net).await.unwrap();
        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].contains("--may-exist ls-add pnet1 -- set logical_switch pnet1 other_config:subnet=172.16.40.0/24"));
        assert_eq!(
            calls[1],
            "ovn-nbctl --timeout=15 --may-exist lsp-add pnet1 pnet1-localnet -- lsp-set-addresses pnet1-localnet unknown \
             -- lsp-set-type pnet1-localnet localnet -- lsp-set-options pnet1-localnet network_name=pnet1"
        );
    }

    #[tokio::test]
    async fn find_logical_switch_checks_output() {
        let runner = Arc::new(ScriptedRunner::new(|_, args| {
            if args.iter().any(|a| a == "name=present") {
                ScriptedRunner::success("present\n")
            } else {
                ScriptedRunner::success("\n")
            }
        }));
        let ctl = controller(runner, Arc::new(RecordingClock::default()));
        assert!(ctl.find_logical_switch("present").await.unwrap());
        assert!(!ctl.find_logical_switch("absent").await.unwrap());
    }
}
