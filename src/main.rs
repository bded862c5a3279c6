//! nfnsync daemon entry point.
//!
//! `role = "controller"` runs the notification distribution service;
//! `role = "agent"` runs the per-node reconciler against the local
//! OVS/OVN backend.

use std::process::ExitCode;
use std::sync::Arc;

use log::{error, info, warn};
use tokio::signal;
use tokio::sync::watch;

use nfnsync::agent::{run_agent, LogChaining, Reconciler};
use nfnsync::clock::TokioClock;
use nfnsync::config::{Config, Role};
use nfnsync::error::AgentError;
use nfnsync::exec::{Executor, ProcessRunner, Programs};
use nfnsync::notify::transport::{run_notification_server, NotificationStream};
use nfnsync::notify::{NotificationServer, StaticMembership};
use nfnsync::ovn::controller::ControllerSettings;
use nfnsync::ovn::{LogicalNetworkController, SwitchSpec};

const EXIT_CONFIG: u8 = 2;

fn logical_network(cfg: &Config) -> LogicalNetworkController {
    let exec = Executor::new(
        Arc::new(ProcessRunner),
        Arc::new(TokioClock),
        Programs::from(&cfg.ovn),
        cfg.ovn.timeout_secs,
    )
    .with_nb_db(cfg.ovn.nb_db.clone());
    LogicalNetworkController::new(exec, ControllerSettings::from(&cfg.ovn))
}

async fn run_controller(cfg: Config) -> anyhow::Result<()> {
    let ovn = Arc::new(logical_network(&cfg));

    match &cfg.ovn.subnet_v4 {
        Some(subnet) => {
            let spec = SwitchSpec {
                name: cfg.ovn.node_switch.clone(),
                subnet_v4: Some(subnet.clone()),
                gateway_v4: cfg.ovn.gateway_v4.clone(),
                exclude_ips: cfg.ovn.exclude_ips.clone(),
                subnet_v6: cfg.ovn.subnet_v6.clone(),
                gateway_v6: cfg.ovn.gateway_v6.clone(),
            };
            ovn.create_logical_switch(&spec).await?;
            if let Some(gateway) = &cfg.ovn.gateway_v4 {
                ovn.attach_to_router(&spec.name, gateway).await?;
            }
        }
        None => warn!("No node subnet configured; node switch {} left as is", cfg.ovn.node_switch),
    }

    let membership = Arc::new(StaticMembership::new(cfg.node_labels.clone()));
    let server = Arc::new(NotificationServer::new(membership).with_bootstrapper(ovn));
    for network in cfg.provider_networks {
        let name = network.name.clone();
        let state = server.apply_provider_network(network).await;
        info!("Provider network {} from configuration: {:?}", name, state);
    }

    let listen = cfg.listen;
    let server_handle = tokio::spawn(run_notification_server(listen, server));

    tokio::select! {
        result = server_handle => {
            result??;
            Ok(())
        }
        signal = signal::ctrl_c() => {
            signal?;
            info!("Received Ctrl+C, shutting down...");
            Ok(())
        }
    }
}

async fn run_node_agent(cfg: Config) -> anyhow::Result<()> {
    let node_name = cfg
        .node_name
        .clone()
        .ok_or_else(|| anyhow::anyhow!("node_name is required for the agent role"))?;
    let backend = Arc::new(logical_network(&cfg));
    let reconciler = Reconciler::new(node_name.clone(), backend, Arc::new(LogChaining));

    let stream = NotificationStream::connect(&cfg.server, &node_name)
        .await
        .map_err(|e| {
            error!("Cannot reach notification server {}: {}", cfg.server, e);
            AgentError::StreamClosed
        })?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut agent = tokio::spawn(run_agent(stream, reconciler, shutdown_rx));

    tokio::select! {
        result = &mut agent => Ok(result??),
        signal = signal::ctrl_c() => {
            signal?;
            info!("Received Ctrl+C, shutting down...");
            let _ = shutdown_tx.send(true);
            Ok(agent.await??)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let cfg = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    info!("Starting nfnsync with config: {:?}", cfg);

    let result = match cfg.role {
        Role::Controller => run_controller(cfg).await,
        Role::Agent => run_node_agent(cfg).await,
    };

    match result {
        Ok(()) => {
            info!("Shutdown complete.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Fatal: {:#}", e);
            let code = e.downcast_ref::<AgentError>().map_or(1, AgentError::exit_code);
            ExitCode::from(code)
        }
    }
}
