//! Graph rewrites behind auto-applicable suggestions.
//!
//! Rewrites build a new graph from the parts of the input and never touch the
//! input. They check structure only; re-resolving the result is the caller's
//! job. Errors are plain reasons, wrapped into `RewriteInvalid` by the caller.

use serde_json::{Value as JsonValue, json};
use std::collections::HashSet;
use switchyard_workflow::{Edge, Node, NodeId, WorkflowGraph};

/// Returns `base`, or `base_2`, `base_3`... whichever is free in `graph`.
fn fresh_id(graph: &WorkflowGraph, base: String) -> NodeId {
    let candidate = NodeId::new(base.clone());
    if !graph.contains(&candidate) {
        return candidate;
    }
    (2..)
        .map(|n| NodeId::new(format!("{base}_{n}")))
        .find(|id| !graph.contains(id))
        .unwrap_or(candidate)
}

fn require_members(graph: &WorkflowGraph, members: &[NodeId]) -> Result<(), String> {
    if members.is_empty() {
        return Err("suggestion names no nodes".to_string());
    }
    match members.iter().find(|id| !graph.contains(id)) {
        Some(missing) => Err(format!("node {missing} is no longer in the graph")),
        None => Ok(()),
    }
}

/// Keeps the first edge per endpoint pair and drops self-loops.
fn dedup_edges(edges: Vec<Edge>) -> Vec<Edge> {
    let mut seen = HashSet::new();
    edges
        .into_iter()
        .filter(|edge| edge.source != edge.target)
        .filter(|edge| seen.insert((edge.source.clone(), edge.target.clone())))
        .collect()
}

fn rebuild(nodes: Vec<Node>, edges: Vec<Edge>) -> Result<WorkflowGraph, String> {
    WorkflowGraph::from_parts(nodes, dedup_edges(edges)).map_err(|err| err.to_string())
}

/// Replaces a serial chain by `split -> (members side by side) -> join`.
///
/// Edges into the first member move to the split node and edges out of the
/// last member move to the join node. Links between members are removed, so
/// every member reads the split node's input.
pub(crate) fn parallelize(graph: &WorkflowGraph, chain: &[NodeId]) -> Result<WorkflowGraph, String> {
    require_members(graph, chain)?;
    let (Some(first), Some(last)) = (chain.first(), chain.last()) else {
        return Err("suggestion names no nodes".to_string());
    };
    if chain.len() < 2 {
        return Err("a chain needs at least two nodes".to_string());
    }

    let split_id = fresh_id(graph, format!("{first}__split"));
    let join_id = fresh_id(graph, format!("{last}__join"));
    let members: HashSet<&NodeId> = chain.iter().collect();
    let (nodes, edges) = graph.clone().into_parts();

    let mut rewritten_nodes = Vec::with_capacity(nodes.len() + 2);
    for node in nodes {
        let is_first = &node.id == first;
        let is_last = &node.id == last;
        if is_first {
            rewritten_nodes.push(Node::action(split_id.clone(), "core.split"));
        }
        rewritten_nodes.push(node);
        if is_last {
            rewritten_nodes.push(Node::action(join_id.clone(), "core.join"));
        }
    }

    let mut rewritten_edges = Vec::with_capacity(edges.len() + chain.len() * 2);
    for edge in edges {
        let internal = members.contains(&edge.source) && members.contains(&edge.target);
        if internal {
            continue;
        }
        if &edge.target == first {
            rewritten_edges.push(Edge::between(edge.source, split_id.clone()));
        } else if &edge.source == last {
            rewritten_edges.push(Edge::between(join_id.clone(), edge.target));
        } else {
            rewritten_edges.push(edge);
        }
    }
    for member in chain {
        rewritten_edges.push(Edge::between(split_id.clone(), member.clone()));
        rewritten_edges.push(Edge::between(member.clone(), join_id.clone()));
    }

    rebuild(rewritten_nodes, rewritten_edges)
}

/// Replaces same-family calls by one `core.batch` node at the position of the
/// first call.
///
/// The batch node carries every original call in `config.calls`, and the
/// dispatcher still performs each of them when the batch runs. Edges into or
/// out of any member are redirected to the batch node.
pub(crate) fn batch(
    graph: &WorkflowGraph,
    family: &str,
    members: &[NodeId],
) -> Result<WorkflowGraph, String> {
    require_members(graph, members)?;
    let batch_id = fresh_id(graph, format!("{family}__batch"));
    let member_set: HashSet<&NodeId> = members.iter().collect();

    let calls: Vec<JsonValue> = members
        .iter()
        .filter_map(|id| graph.get_node(id))
        .map(|node| {
            json!({
                "id": node.id,
                "type": node.type_id,
                "config": node.config,
            })
        })
        .collect();
    let batch_node = Node::action(batch_id.clone(), "core.batch")
        .with_config_value("family", json!(family))
        .with_config_value("calls", JsonValue::Array(calls));

    let (nodes, edges) = graph.clone().into_parts();
    let mut batch_node = Some(batch_node);
    let mut rewritten_nodes = Vec::with_capacity(nodes.len());
    for node in nodes {
        if member_set.contains(&node.id) {
            if let Some(batch_node) = batch_node.take() {
                rewritten_nodes.push(batch_node);
            }
        } else {
            rewritten_nodes.push(node);
        }
    }

    let redirect = |id: NodeId| {
        if member_set.contains(&id) {
            (batch_id.clone(), true)
        } else {
            (id, false)
        }
    };
    let rewritten_edges = edges
        .into_iter()
        .map(|edge| {
            let (source, moved_source) = redirect(edge.source.clone());
            let (target, moved_target) = redirect(edge.target.clone());
            if moved_source || moved_target {
                Edge::between(source, target)
            } else {
                edge
            }
        })
        .collect();

    rebuild(rewritten_nodes, rewritten_edges)
}
