//! Canonical textual encoding of a graph.
//!
//! Produces `"name(op);...|src->dst;..."` with nodes and edges sorted
//! lexicographically, so two graphs compare equal exactly when their
//! canonical strings compare equal regardless of construction order.
//! Port 0 renders as the bare node name, the control port renders as
//! `name:control`, and any other port as `name:N`.

use crate::graph::Graph;
use crate::node::Port;

fn endpoint(name: &str, port: Port) -> String {
    match port {
        Port::Data(0) => name.to_string(),
        Port::Control => format!("{name}:control"),
        Port::Data(slot) => format!("{name}:{slot}"),
    }
}

/// Render the canonical form of `graph`.
pub fn canonical_string(graph: &Graph) -> String {
    let mut nodes: Vec<String> = graph
        .nodes()
        .map(|(_, n)| format!("{}({})", n.name, n.op))
        .collect();
    let mut edges: Vec<String> = graph
        .edges()
        .iter()
        .filter_map(|e| {
            let src = graph.node(e.src)?;
            let dst = graph.node(e.dst)?;
            Some(format!(
                "{}->{}",
                endpoint(&src.name, e.src_port),
                endpoint(&dst.name, e.dst_port)
            ))
        })
        .collect();
    nodes.sort();
    edges.sort();
    format!("{}|{}", nodes.join(";"), edges.join(";"))
}
