//! Error types shared across the daemon.

use std::io;

use thiserror::Error;

/// Failure running a backend command.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("`{command}` failed: {stderr}")]
    Failed { command: String, stderr: String },
}

impl ExecError {
    /// True when the backend daemon was not yet accepting connections.
    pub fn is_connection_refused(&self) -> bool {
        match self {
            ExecError::Failed { stderr, .. } => stderr.contains("Connection refused"),
            ExecError::Spawn { .. } => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum OvnError {
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error("no dynamic address assigned to port {port} after {attempts} polls")]
    AddressTimeout { port: String, attempts: u32 },
    #[error("malformed port address {0:?}")]
    MalformedAddress(String),
    #[error("logical switch {0} has no gateway configured")]
    MissingGateway(String),
}

#[derive(Debug, Error)]
#[error("invalid provider network {name:?}: {reason}")]
pub struct InvalidNetwork {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("node name must not be empty")]
    InvalidArgument,
    #[error("stream to node {0} is closed")]
    StreamClosed(String),
    #[error("unknown provider network {0}")]
    UnknownNetwork(String),
}

/// Terminal conditions for a node agent.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("notification stream closed by server")]
    StreamClosed,
    #[error("notification stream failed: {0}")]
    Transport(#[from] io::Error),
    #[error("convergence failed: {0}")]
    Convergence(#[source] OvnError),
    #[error("failed to provision node interface: {0}")]
    NodeInterface(#[source] OvnError),
}

impl AgentError {
    pub fn exit_code(&self) -> u8 {
        match self {
            AgentError::StreamClosed | AgentError::Transport(_) => 3,
            AgentError::Convergence(_) | AgentError::NodeInterface(_) => 4,
        }
    }
}
