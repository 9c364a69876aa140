use log::debug;
use rustc_hash::FxHashSet;
use serde_json::Value;
use std::cmp::Ordering;

use crate::model::{value_label, Network};

fn node_key(id: &Value) -> String {
    value_label(id).unwrap_or_else(|| id.to_string())
}

/// Keeps the `top_n` highest-degree nodes, ties in original order, and only
/// the edges whose both endpoints survive.
pub fn prune_network(network: Network, top_n: usize) -> Network {
    let total_nodes = network.nodes.len();
    let total_edges = network.edges.len();

    let mut nodes = network.nodes;
    nodes.sort_by(|a, b| b.degree.partial_cmp(&a.degree).unwrap_or(Ordering::Equal));
    nodes.truncate(top_n);

    let kept: FxHashSet<String> = nodes.iter().map(|n| node_key(&n.id)).collect();
    let edges: Vec<_> = network
        .edges
        .into_iter()
        .filter(|e| kept.contains(&node_key(&e.source)) && kept.contains(&node_key(&e.target)))
        .collect();

    debug!(
        "Pruned network from {} nodes / {} edges to {} / {}",
        total_nodes,
        total_edges,
        nodes.len(),
        edges.len()
    );
    Network { nodes, edges }
}
