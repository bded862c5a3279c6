use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;

use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use log::info;
use serde::{Deserialize, Serialize};

use crate::provider::ProviderNetwork;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Controller,
    Agent,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
    /// Controller bind address.
    pub listen: SocketAddr,
    /// Controller address agents connect to.
    pub server: String,
    pub ovn: OvnConfig,
    #[serde(default)]
    pub provider_networks: Vec<ProviderNetwork>,
    #[serde(default)]
    pub node_labels: HashMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OvnConfig {
    pub nbctl: String,
    pub vsctl: String,
    pub ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nb_db: Option<String>,
    /// Passed to every `ovn-nbctl`/`ovs-vsctl` call as `--timeout`.
    pub timeout_secs: u64,
    pub integration_bridge: String,
    pub node_switch: String,
    pub cluster_router: String,
    pub node_interface: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_v4: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_v4: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_ips: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_v6: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_v6: Option<String>,
}

impl Default for OvnConfig {
    fn default() -> Self {
        Self {
            nbctl: "ovn-nbctl".into(),
            vsctl: "ovs-vsctl".into(),
            ip: "ip".into(),
            nb_db: None,
            timeout_secs: 15,
            integration_bridge: "br-int".into(),
            node_switch: "nfn-node".into(),
            cluster_router: "nfn-cluster".into(),
            node_interface: "nfn0".into(),
            subnet_v4: None,
            gateway_v4: None,
            exclude_ips: None,
            subnet_v6: None,
            gateway_v6: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            role: Role::Agent,
            node_name: None,
            listen: SocketAddr::from(([0, 0, 0, 0], 50301)),
            server: "127.0.0.1:50301".into(),
            ovn: OvnConfig::default(),
            provider_networks: Vec::new(),
            node_labels: HashMap::new(),
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config: Config = Self::figment()
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;
        config.resolve()
    }

    fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("nfnsync.toml"))
            .merge(Json::file("nfnsync.json"))
            .merge(Env::prefixed("NFN_").split("__"))
    }

    /// Fills the node identity from the environment and checks required
    /// values for the configured role.
    fn resolve(mut self) -> anyhow::Result<Self> {
        if self.node_name.as_deref().map_or(true, str::is_empty) {
            self.node_name = ["NODE_NAME", "HOSTNAME"]
                .iter()
                .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()));
        }
        if self.role == Role::Agent && self.node_name.is_none() {
            anyhow::bail!("node_name is required for the agent role (set NFN_NODE_NAME or NODE_NAME)");
        }
        for (key, value) in [
            ("ovn.subnet_v4", &self.ovn.subnet_v4),
            ("ovn.gateway_v4", &self.ovn.gateway_v4),
            ("ovn.exclude_ips", &self.ovn.exclude_ips),
            ("ovn.subnet_v6", &self.ovn.subnet_v6),
            ("ovn.gateway_v6", &self.ovn.gateway_v6),
        ] {
            if value.is_none() {
                info!("{} not configured, skipping", key);
            }
        }
        Ok(self)
    }
}
