// SPDX-License-Identifier: MIT OR Apache-2.0
//! Flow extraction: the minimal self-contained subgraph around a node.

use crate::document::GraphDocument;
use crate::link::{Link, LinkId};
use crate::node::NodeId;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Extract every node reachable from `root` backward or forward, with the
/// links among them.
///
/// Works on compact links directly. Nodes come out ascending by id, links
/// ascending by id, and the counters are the largest ids included. Slot
/// references to links outside the subgraph are cleared so the result loads
/// on its own. An unknown root yields a document without nodes.
pub fn extract_flow(document: &GraphDocument, root: NodeId) -> GraphDocument {
    let mut flow = GraphDocument {
        extra: document.extra.clone(),
        ..GraphDocument::default()
    };
    if document.node(root).is_none() {
        tracing::debug!(%root, "root not in document");
        return flow;
    }

    let present: HashSet<NodeId> = document.nodes.iter().map(|n| n.id).collect();
    let mut members = reach(document, &present, root, |l| (l.target_id, l.origin_id));
    members.extend(reach(document, &present, root, |l| (l.origin_id, l.target_id)));

    let mut links: Vec<Link> = Vec::new();
    let mut seen = HashSet::new();
    for link in document.links() {
        if members.contains(&link.origin_id)
            && members.contains(&link.target_id)
            && seen.insert(link.id)
        {
            links.push(link.clone());
        }
    }
    links.sort_by_key(|l| l.id);
    let kept: HashSet<LinkId> = links.iter().map(|l| l.id).collect();

    let mut nodes: Vec<_> = document
        .nodes
        .iter()
        .filter(|n| members.contains(&n.id))
        .cloned()
        .collect();
    nodes.sort_by_key(|n| n.id);
    nodes.dedup_by_key(|n| n.id);
    for node in &mut nodes {
        for input in &mut node.inputs {
            if input.link.is_some_and(|id| !kept.contains(&id)) {
                input.link = None;
            }
        }
        for output in &mut node.outputs {
            output.links.retain(|id| kept.contains(id));
        }
    }

    flow.last_node_id = nodes.last().map_or(0, |n| n.id.0);
    flow.last_link_id = links.last().map_or(0, |l| l.id.0);
    flow.nodes = nodes;
    flow.links = links.into_iter().map(Some).collect();
    flow
}

/// Closure of `root` along one link direction. `step` maps a link to
/// `(from, to)` for that direction.
fn reach(
    document: &GraphDocument,
    present: &HashSet<NodeId>,
    root: NodeId,
    step: impl Fn(&Link) -> (NodeId, NodeId),
) -> BTreeSet<NodeId> {
    let mut adjacent: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for (from, to) in document.links().map(step) {
        if present.contains(&to) {
            adjacent.entry(from).or_default().push(to);
        }
    }

    let mut visited = BTreeSet::from([root]);
    let mut stack = vec![root];
    while let Some(current) = stack.pop() {
        for &to in adjacent.get(&current).into_iter().flatten() {
            if visited.insert(to) {
                stack.push(to);
            }
        }
    }
    visited
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// 1 -> 2 -> 3 -> 4, plus 1 -> 5 (a sibling branch off an ancestor)
    /// and an unrelated pair 6 -> 7
    fn workflow() -> GraphDocument {
        let n = |id: i64, link_in: Option<i64>, links_out: Vec<i64>| {
            json!({
                "id": id, "type": format!("T{id}"),
                "inputs": [{"name": "in", "type": "X", "link": link_in}],
                "outputs": [{"name": "out", "type": "X", "links": links_out}]
            })
        };
        GraphDocument::from_value(json!({
            "last_node_id": 7, "last_link_id": 12,
            "nodes": [n(4, Some(3), vec![]), n(2, Some(1), vec![2]), n(1, None, vec![1, 5]),
                      n(3, Some(2), vec![3]), n(5, Some(5), vec![]),
                      n(6, None, vec![12]), n(7, Some(12), vec![])],
            "links": [[3, 3, 0, 4, 0, "X"], [1, 1, 0, 2, 0, "X"], null,
                      [2, 2, 0, 3, 0, "X"], [5, 1, 0, 5, 0, "X"], [12, 6, 0, 7, 0, "X"],
                      [8, 3, 0, 99, 0, "X"]],
            "version": 0.4
        }))
        .unwrap()
    }

    #[test]
    fn test_extract_from_middle() {
        let flow = extract_flow(&workflow(), NodeId(3));

        let ids: Vec<_> = flow.nodes.iter().map(|n| n.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        let links: Vec<_> = flow.links().map(|l| l.id.0).collect();
        assert_eq!(links, vec![1, 2, 3]);
        assert_eq!(flow.last_node_id, 4);
        assert_eq!(flow.last_link_id, 3);
        assert!(flow.extra.contains_key("version"));
    }

    #[test]
    fn test_extract_is_self_contained() {
        let flow = extract_flow(&workflow(), NodeId(3));
        let ids: HashSet<_> = flow.nodes.iter().map(|n| n.id).collect();
        for link in flow.links() {
            assert!(ids.contains(&link.origin_id) && ids.contains(&link.target_id));
        }
        // Link 5 to the sibling branch is gone from node 1's output
        assert_eq!(flow.node(NodeId(1)).unwrap().outputs[0].links, vec![LinkId(1)]);
    }

    #[test]
    fn test_extract_is_idempotent() {
        let once = extract_flow(&workflow(), NodeId(2));
        let twice = extract_flow(&once, NodeId(2));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_extract_from_source_includes_every_branch() {
        let flow = extract_flow(&workflow(), NodeId(1));
        let ids: Vec<_> = flow.nodes.iter().map(|n| n.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_unknown_root() {
        let flow = extract_flow(&workflow(), NodeId(42));
        assert!(flow.nodes.is_empty());
        assert!(flow.links.is_empty());
    }

    #[test]
    fn test_extract_long_chain() {
        const LEN: i64 = 20_000;
        let nodes: Vec<_> = (1..=LEN)
            .map(|id| {
                let link_in = (id > 1).then_some(id - 1);
                let links_out: Vec<i64> = (id < LEN).then_some(id).into_iter().collect();
                json!({
                    "id": id, "type": "Step",
                    "inputs": [{"name": "in", "type": "X", "link": link_in}],
                    "outputs": [{"name": "out", "type": "X", "links": links_out}]
                })
            })
            .collect();
        let links: Vec<_> = (1..LEN).map(|id| json!([id, id, 0, id + 1, 0, "X"])).collect();
        let doc = GraphDocument::from_value(json!({"nodes": nodes, "links": links})).unwrap();

        let flow = extract_flow(&doc, NodeId(LEN / 2));
        assert_eq!(flow.nodes.len(), LEN as usize);
        assert_eq!(flow.links().count(), (LEN - 1) as usize);
        assert_eq!(flow.last_node_id, LEN);
    }
}
