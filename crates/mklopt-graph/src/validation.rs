//! Structural validation: no dangling edges, no out-of-range ports.

use crate::error::GraphError;
use crate::graph::Graph;
use crate::node::Port;

/// Check that every edge references live nodes and in-range source
/// ports. Intended as a debugging aid after a batch of mutations; the
/// mutation API already maintains these invariants incrementally.
pub fn validate(graph: &Graph) -> Result<(), GraphError> {
    for edge in graph.edges() {
        let src = graph
            .node(edge.src)
            .ok_or(GraphError::UnknownNode(edge.src.index()))?;
        graph
            .node(edge.dst)
            .ok_or(GraphError::UnknownNode(edge.dst.index()))?;
        if let Port::Data(slot) = edge.src_port {
            let limit = src.output_ports();
            if slot >= limit {
                return Err(GraphError::PortOutOfRange {
                    node: src.name.clone(),
                    port: slot,
                    limit,
                });
            }
        }
        // A mixed control/data edge cannot be expressed through the
        // construction API; reject it if one was assembled by hand.
        if edge.src_port.is_control() != edge.dst_port.is_control() {
            return Err(GraphError::PortOutOfRange {
                node: src.name.clone(),
                port: edge.src_port.slot().unwrap_or(0),
                limit: 0,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeDef;
    use crate::registry::{OpRegistry, OpSchema};

    #[test]
    fn valid_graph_passes() {
        let mut r = OpRegistry::new();
        r.register("Input", OpSchema::fixed(1));
        let mut g = Graph::new(r);
        g.add_node(NodeDef::new("A", "Input")).unwrap();
        g.add_node(NodeDef::new("B", "Zeta").input("A")).unwrap();
        assert!(validate(&g).is_ok());
    }
}
