//! Provider network synchronisation for an OVN-based container network.
//!
//! A central [`notify::NotificationServer`] fans provider network intents
//! out to node agents. Each agent buffers what it receives until the sync
//! marker, converges its node against that set, and then applies updates
//! incrementally through the [`ovn::LogicalNetworkController`].

pub mod agent;
pub mod clock;
pub mod config;
pub mod error;
pub mod exec;
pub mod notify;
pub mod ovn;
pub mod provider;
pub mod types;

#[cfg(test)]
mod testutil;
