// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property tests over randomly generated graphs.

use flowsplice_graph::{
    build_node_map, extract_flow, resolve, Graph, GraphDocument, Link, LinkId, Node, NodeId,
    SpliceConfig, Splicer,
};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashSet};

/// Build a document with `count` nodes and one link per edge. Each edge
/// lands on its own input slot of the target.
fn document(count: usize, edges: &[(usize, usize)]) -> GraphDocument {
    let mut nodes: Vec<Node> = (0..count)
        .map(|i| {
            Node::new(i as i64 + 1, "Step")
                .with_position((i % 3) as f32 * 120.0, (i / 3) as f32 * 150.0)
                .with_size(100.0, 100.0)
                .with_output("out", "T")
        })
        .collect();

    let mut links = Vec::new();
    for (k, &(a, b)) in edges.iter().enumerate() {
        let id = LinkId(k as i64 + 1);
        let slot = nodes[b].inputs.len();
        nodes[b] = nodes[b].clone().with_input(format!("in{slot}"), "T");
        nodes[b].inputs[slot].link = Some(id);
        nodes[a].outputs[0].links.push(id);
        links.push(Some(Link::new(
            id,
            NodeId(a as i64 + 1),
            0,
            NodeId(b as i64 + 1),
            slot,
            "T",
        )));
    }

    GraphDocument {
        last_node_id: count as i64,
        last_link_id: edges.len() as i64,
        nodes,
        links,
        ..GraphDocument::default()
    }
}

/// Node count and forward-only edges, deduplicated
fn dag() -> impl Strategy<Value = (usize, Vec<(usize, usize)>)> {
    (2usize..10).prop_flat_map(|n| {
        let edges = prop::collection::vec((0..n, 0..n), 0..16).prop_map(|pairs| {
            let set: BTreeSet<(usize, usize)> = pairs
                .into_iter()
                .filter(|(a, b)| a != b)
                .map(|(a, b)| (a.min(b), a.max(b)))
                .collect();
            set.into_iter().collect::<Vec<_>>()
        });
        (Just(n), edges)
    })
}

/// Node count and arbitrary edges, cycles included
fn cyclic() -> impl Strategy<Value = (usize, Vec<(usize, usize)>)> {
    (2usize..6).prop_flat_map(|n| {
        let edges = prop::collection::vec((0..n, 0..n), 0..10)
            .prop_map(|pairs| pairs.into_iter().filter(|(a, b)| a != b).collect::<Vec<_>>());
        (Just(n), edges)
    })
}

fn no_overlaps(graph: &Graph) -> bool {
    let nodes: Vec<_> = graph.nodes().collect();
    nodes.iter().enumerate().all(|(i, a)| {
        nodes[i + 1..]
            .iter()
            .all(|b| !a.bounds().overlaps(&b.bounds()))
    })
}

proptest! {
    #[test]
    fn test_node_map_layers_link_toward_pivot((n, edges) in dag(), pick in any::<prop::sample::Index>()) {
        let doc = document(n, &edges);
        let graph = resolve(&doc);
        let pivot = NodeId(pick.index(n) as i64 + 1);
        let map = build_node_map(&graph, pivot);
        let layers = map.layers();
        let p = map.pivot_layer();

        prop_assert_eq!(&layers[p], &vec![pivot]);
        for k in 1..=p {
            let nearer: HashSet<NodeId> = layers[p - k + 1].iter().copied().collect();
            for &id in &layers[p - k] {
                prop_assert!(doc.links().any(|l| l.origin_id == id && nearer.contains(&l.target_id)));
            }
        }
        for k in p + 1..layers.len() {
            let nearer: HashSet<NodeId> = layers[k - 1].iter().copied().collect();
            for &id in &layers[k] {
                prop_assert!(doc.links().any(|l| l.target_id == id && nearer.contains(&l.origin_id)));
            }
        }
    }

    #[test]
    fn test_node_map_terminates_on_cycles((n, edges) in cyclic()) {
        let doc = document(n, &edges);
        let graph = resolve(&doc);
        for i in 0..n {
            let pivot = NodeId(i as i64 + 1);
            let map = build_node_map(&graph, pivot);
            prop_assert_eq!(&map.layers()[map.pivot_layer()], &vec![pivot]);
        }
    }

    #[test]
    fn test_extract_is_idempotent((n, edges) in dag(), pick in any::<prop::sample::Index>()) {
        let doc = document(n, &edges);
        let root = NodeId(pick.index(n) as i64 + 1);
        let once = extract_flow(&doc, root);
        let twice = extract_flow(&once, root);
        prop_assert_eq!(&once, &twice);

        let members: HashSet<NodeId> = once.nodes.iter().map(|n| n.id).collect();
        prop_assert!(once.links().all(|l| members.contains(&l.origin_id) && members.contains(&l.target_id)));
    }

    #[test]
    fn test_resolve_flatten_keeps_id_sets((n, edges) in cyclic()) {
        let doc = document(n, &edges);
        let flat = resolve(&doc).flatten();

        let node_ids = |d: &GraphDocument| d.nodes.iter().map(|n| n.id).collect::<BTreeSet<_>>();
        let link_ids = |d: &GraphDocument| d.links().map(|l| l.id).collect::<BTreeSet<_>>();
        prop_assert_eq!(node_ids(&flat), node_ids(&doc));
        prop_assert_eq!(link_ids(&flat), link_ids(&doc));
    }

    #[test]
    fn test_repeated_import_converges_without_overlap((n, edges) in dag()) {
        let template = resolve(&document(n, &edges));
        let ids: Vec<NodeId> = template.nodes().map(|n| n.id()).collect();

        let mut live = Graph::new();
        let owner = live.add_node(Node::new(1, "Owner").with_size(100.0, 100.0));
        let splicer = Splicer::new(SpliceConfig::default());
        let anchor = splicer.anchor_right_of(live.node(owner).unwrap());

        let first = splicer.import_subgraph(&mut live, &template, &ids, &anchor, &[]);
        let count = live.node_count();
        prop_assert!(no_overlaps(&live));

        let second = splicer.import_subgraph(&mut live, &template, &ids, &anchor, &[]);
        prop_assert_eq!(live.node_count(), count);
        prop_assert_eq!(first, second);
        prop_assert!(no_overlaps(&live));
    }
}
