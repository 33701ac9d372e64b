//! Property-based tests for the graph substrate.

use proptest::prelude::*;

use mklopt_graph::{
    canonical_string, topo_order, validate, Graph, NodeDef, OpRegistry, OpSchema,
};

fn registry() -> OpRegistry {
    let mut r = OpRegistry::new();
    r.register("Input", OpSchema::fixed(1));
    r
}

/// Random layered DAG blueprint: each op picks two earlier producers.
fn arb_dag() -> impl Strategy<Value = (usize, Vec<(usize, usize)>)> {
    (1usize..5).prop_flat_map(|sources| {
        prop::collection::vec((0usize..1000, 0usize..1000), 0..15)
            .prop_map(move |picks| (sources, picks))
    })
}

fn build(sources: usize, picks: &[(usize, usize)]) -> Graph {
    let mut g = Graph::new(registry());
    let mut names = Vec::new();
    for i in 0..sources {
        let name = format!("in{i}");
        g.add_node(NodeDef::new(&name, "Input")).unwrap();
        names.push(name);
    }
    for (i, (a, b)) in picks.iter().enumerate() {
        let name = format!("op{i}");
        let lhs = names[a % names.len()].clone();
        let rhs = names[b % names.len()].clone();
        g.add_node(NodeDef::new(&name, "Op").input(&lhs).input(&rhs))
            .unwrap();
        names.push(name);
    }
    g
}

proptest! {
    #[test]
    fn topo_order_respects_every_edge((sources, picks) in arb_dag()) {
        let g = build(sources, &picks);
        let order = topo_order(&g).unwrap();
        prop_assert_eq!(order.len(), g.node_count());
        let position = |id| order.iter().position(|&o| o == id).unwrap();
        for e in g.edges() {
            prop_assert!(position(e.src) < position(e.dst));
        }
    }

    #[test]
    fn constructed_graphs_validate((sources, picks) in arb_dag()) {
        let g = build(sources, &picks);
        prop_assert!(validate(&g).is_ok());
    }

    #[test]
    fn canonical_string_is_total_and_stable((sources, picks) in arb_dag()) {
        let g = build(sources, &picks);
        let a = canonical_string(&g);
        let b = canonical_string(&g);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn node_removal_leaves_no_dangling_edges((sources, picks) in arb_dag()) {
        let mut g = build(sources, &picks);
        let last = g.nodes().last().map(|(id, _)| id);
        if let Some(id) = last {
            g.remove_node(id);
            prop_assert!(validate(&g).is_ok());
        }
    }
}
