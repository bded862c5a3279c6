use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use async_trait::async_trait;

use crate::provider::LabelSelector;

/// Resolves label selectors to node names.
#[async_trait]
pub trait NodeMembership: Send + Sync {
    async fn nodes_matching(&self, selector: &LabelSelector) -> Result<Vec<String>>;
}

/// Node labels fixed at start-up from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticMembership {
    labels: HashMap<String, BTreeMap<String, String>>,
}

impl StaticMembership {
    pub fn new(labels: HashMap<String, BTreeMap<String, String>>) -> Self {
        Self { labels }
    }
}

#[async_trait]
impl NodeMembership for StaticMembership {
    async fn nodes_matching(&self, selector: &LabelSelector) -> Result<Vec<String>> {
        let mut nodes: Vec<String> = self
            .labels
            .iter()
            .filter(|(_, labels)| selector.matches(labels))
            .map(|(node, _)| node.clone())
            .collect();
        nodes.sort();
        Ok(nodes)
    }
}
