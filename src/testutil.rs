//! Deterministic stand-ins for the clock and the backend CLIs.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::clock::Clock;
use crate::exec::{CommandOutput, CommandRunner, Executor, Programs};
use crate::ovn::controller::{ControllerSettings, ADDRESS_POLL};
use crate::ovn::LogicalNetworkController;

/// Records requested sleeps and returns immediately.
#[derive(Default)]
pub struct RecordingClock {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingClock {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for RecordingClock {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

pub fn programs() -> Programs {
    Programs {
        nbctl: "ovn-nbctl".into(),
        vsctl: "ovs-vsctl".into(),
        ip: "ip".into(),
    }
}

pub fn controller(runner: Arc<dyn CommandRunner>, clock: Arc<RecordingClock>) -> LogicalNetworkController {
    let exec = Executor::new(runner, clock, programs(), 15);
    LogicalNetworkController::new(
        exec,
        ControllerSettings {
            integration_bridge: "br-int".into(),
            node_switch: "nfn-node".into(),
            cluster_router: "nfn-cluster".into(),
            node_interface: "nfn0".into(),
            address_poll: ADDRESS_POLL,
        },
    )
}

type Responder = Box<dyn Fn(&str, &[String]) -> CommandOutput + Send + Sync>;

/// Answers every command through a closure and keeps the command lines.
pub struct ScriptedRunner {
    respond: Responder,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(&str, &[String]) -> CommandOutput + Send + Sync + 'static,
    {
        Self {
            respond: Box::new(respond),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn ok(stdout: &str) -> Self {
        let stdout = stdout.to_string();
        Self::new(move |_, _| Self::success(&stdout))
    }

    pub fn success(stdout: &str) -> CommandOutput {
        CommandOutput {
            stdout: stdout.to_string(),
            stderr: String::new(),
            success: true,
        }
    }

    pub fn failure(stderr: &str) -> CommandOutput {
        CommandOutput {
            stdout: String::new(),
            stderr: stderr.to_string(),
            success: false,
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, needle: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.contains(needle)).count()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, program: &str, args: &[String]) -> std::io::Result<CommandOutput> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{} {}", program, args.join(" ")));
        Ok((self.respond)(program, args))
    }
}

#[derive(Default)]
struct HostState {
    /// VLAN device → parent interface.
    vlans: BTreeMap<String, String>,
    bridges: BTreeSet<String>,
    mappings: String,
    calls: Vec<String>,
    fail_on: Option<String>,
}

/// Emulates `ip` and `ovs-vsctl` on one node. `ovn-nbctl` always
/// succeeds with empty output.
#[derive(Default)]
pub struct FakeHost {
    state: Mutex<HostState>,
}

impl FakeHost {
    pub fn with_state(vlans: &[(&str, &str)], bridges: &[&str]) -> Self {
        let host = Self::default();
        {
            let mut state = host.state.lock().unwrap();
            for (name, parent) in vlans {
                state.vlans.insert(name.to_string(), parent.to_string());
            }
            state.bridges = bridges.iter().map(|b| b.to_string()).collect();
        }
        host
    }

    pub fn vlans(&self) -> BTreeSet<String> {
        self.state.lock().unwrap().vlans.keys().cloned().collect()
    }

    pub fn bridges(&self) -> BTreeSet<String> {
        self.state.lock().unwrap().bridges.clone()
    }

    pub fn mappings(&self) -> String {
        self.state.lock().unwrap().mappings.clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Any later command line containing `needle` fails.
    pub fn fail_on(&self, needle: &str) {
        self.state.lock().unwrap().fail_on = Some(needle.to_string());
    }

    fn ip(state: &mut HostState, args: &[&str]) -> CommandOutput {
        match args {
            ["-o", "-d", "link", "show", "type", "vlan"] => {
                let lines: Vec<String> = state
                    .vlans
                    .iter()
                    .enumerate()
                    .map(|(i, (name, parent))| {
                        format!("{}: {}@{}: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 qdisc noqueue", i + 2, name, parent)
                    })
                    .collect();
                ScriptedRunner::success(&lines.join("\n"))
            }
            ["link", "add", "link", parent, "name", name, "type", "vlan", "id", _] => {
                if state.vlans.contains_key(*name) {
                    return ScriptedRunner::failure("RTNETLINK answers: File exists");
                }
                state.vlans.insert(name.to_string(), parent.to_string());
                ScriptedRunner::success("")
            }
            ["link", "del", name] => match state.vlans.remove(*name) {
                Some(_) => ScriptedRunner::success(""),
                None => ScriptedRunner::failure(&format!("Cannot find device \"{}\"", name)),
            },
            _ => ScriptedRunner::success(""),
        }
    }

    fn vsctl(state: &mut HostState, args: &[&str]) -> CommandOutput {
        match args {
            ["list-br"] => {
                let bridges: Vec<&str> = state.bridges.iter().map(String::as_str).collect();
                ScriptedRunner::success(&bridges.join("\n"))
            }
            ["--may-exist", "add-br", bridge] => {
                state.bridges.insert(bridge.to_string());
                ScriptedRunner::success("")
            }
            ["--if-exists", "del-br", bridge] => {
                state.bridges.remove(*bridge);
                ScriptedRunner::success("")
            }
            ["--if-exists", "get", "open_vswitch", ".", _] => {
                if state.mappings.is_empty() {
                    ScriptedRunner::success("")
                } else {
                    ScriptedRunner::success(&format!("\"{}\"\n", state.mappings))
                }
            }
            ["set", "open_vswitch", ".", value] => {
                let (_, mappings) = value.split_once('=').unwrap_or(("", ""));
                state.mappings = mappings.trim_matches('"').to_string();
                ScriptedRunner::success("")
            }
            ["remove", "open_vswitch", ".", "external_ids", "ovn-bridge-mappings"] => {
                state.mappings.clear();
                ScriptedRunner::success("")
            }
            _ => ScriptedRunner::success(""),
        }
    }
}

#[async_trait]
impl CommandRunner for FakeHost {
    async fn run(&self, program: &str, args: &[String]) -> std::io::Result<CommandOutput> {
        let mut state = self.state.lock().unwrap();
        let line = format!("{} {}", program, args.join(" "));
        state.calls.push(line.clone());
        if let Some(needle) = &state.fail_on {
            if line.contains(needle.as_str()) {
                return Ok(ScriptedRunner::failure("injected failure"));
            }
        }
        let args: Vec<&str> = args
            .iter()
            .map(String::as_str)
            .filter(|a| !a.starts_with("--timeout=") && !a.starts_with("--db="))
            .collect();
        Ok(match program {
            "ip" => Self::ip(&mut state, &args),
            "ovs-vsctl" => Self::vsctl(&mut state, &args),
            _ => ScriptedRunner::success(""),
        })
    }
}
