//! Line-delimited JSON transport.
//!
//! A client opens a TCP connection and sends one [`Request`] line:
//!
//! * **subscribe**: the connection becomes the node's notification
//!   stream; the server writes one [`Notification`] per line until either
//!   side closes.
//! * **apply** / **remove**: desired-state changes; the server answers
//!   with one [`Reply`] line and closes.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

use super::NotificationServer;
use crate::agent::NotificationSource;
use crate::error::AgentError;
use crate::provider::{LifecycleState, ProviderNetwork};
use crate::types::Notification;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Subscribe { node_name: String },
    Apply { network: ProviderNetwork },
    Remove { name: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<LifecycleState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Reply {
    fn state(state: LifecycleState) -> Self {
        Self {
            ok: true,
            state: Some(state),
            error: None,
        }
    }

    fn error(message: impl ToString) -> Self {
        Self {
            ok: false,
            state: None,
            error: Some(message.to_string()),
        }
    }
}

async fn write_line<T: Serialize>(writer: &mut OwnedWriteHalf, value: &T) -> anyhow::Result<()> {
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    Ok(())
}

/// Accept connections until the listener fails.
pub async fn run_notification_server(bind_addr: SocketAddr, server: Arc<NotificationServer>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind_addr).await?;
    info!("Notification server listening on {}", bind_addr);
    loop {
        let (socket, peer) = listener.accept().await?;
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(socket, server).await {
                warn!("Connection from {} ended with error: {}", peer, e);
            }
        });
    }
}

async fn handle_connection(socket: TcpStream, server: Arc<NotificationServer>) -> anyhow::Result<()> {
    let (reader, mut writer) = socket.into_split();
    let mut lines = BufReader::new(reader).lines();
    let Some(first) = lines.next_line().await? else {
        return Ok(());
    };
    let request: Request = match serde_json::from_str(&first) {
        Ok(request) => request,
        Err(e) => {
            write_line(&mut writer, &Reply::error(format!("malformed request: {}", e))).await?;
            return Ok(());
        }
    };

    match request {
        Request::Subscribe { node_name } => {
            let mut rx = match server.subscribe(&node_name).await {
                Ok(rx) => rx,
                Err(e) => {
                    write_line(&mut writer, &Reply::error(&e)).await?;
                    return Ok(());
                }
            };
            let result: anyhow::Result<()> = async {
                loop {
                    tokio::select! {
                        message = rx.recv() => match message {
                            Some(message) => write_line(&mut writer, &message).await?,
                            None => return Ok(()),
                        },
                        line = lines.next_line() => match line? {
                            Some(_) => continue,
                            None => return Ok(()),
                        },
                    }
                }
            }
            .await;
            info!("Stream to node {} closed", node_name);
            drop(rx);
            server.release(&node_name).await;
            result
        }
        Request::Apply { network } => {
            let state = server.apply_provider_network(network).await;
            write_line(&mut writer, &Reply::state(state)).await
        }
        Request::Remove { name } => {
            let reply = match server.remove_provider_network(&name).await {
                Ok(state) => Reply::state(state),
                Err(e) => Reply::error(e),
            };
            write_line(&mut writer, &reply).await
        }
    }
}

/// Agent side of a subscription.
pub struct NotificationStream {
    lines: Lines<BufReader<OwnedReadHalf>>,
    _writer: OwnedWriteHalf,
}

impl NotificationStream {
    pub async fn connect(server: &str, node_name: &str) -> anyhow::Result<Self> {
        let socket = TcpStream::connect(server).await?;
        let (reader, mut writer) = socket.into_split();
        let request = Request::Subscribe {
            node_name: node_name.to_string(),
        };
        write_line(&mut writer, &request).await?;
        info!("Subscribed to {} as node {}", server, node_name);
        Ok(Self {
            lines: BufReader::new(reader).lines(),
            _writer: writer,
        })
    }
}

#[async_trait]
impl NotificationSource for NotificationStream {
    async fn next(&mut self) -> Result<Option<Notification>, AgentError> {
        while let Some(line) = self.lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Notification>(&line) {
                Ok(notification) => return Ok(Some(notification)),
                Err(e) => match serde_json::from_str::<Reply>(&line) {
                    Ok(reply) if !reply.ok => {
                        error!("Subscription rejected: {}", reply.error.unwrap_or_default());
                        return Ok(None);
                    }
                    _ => warn!("Dropping undecodable notification: {}", e),
                },
            }
        }
        Ok(None)
    }
}
