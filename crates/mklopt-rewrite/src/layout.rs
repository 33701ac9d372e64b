//! Layout-metadata companion handling shared by the engines.

use mklopt_graph::{AttrMap, AttrValue, DataType, Edge, Graph, GraphError, Node, NodeId};

use crate::config::TensorOrdering;
use crate::context::RewriteContext;
use crate::rules::ops;

/// Resolve the layout tensor paired with the tensor carried by `edge`.
///
/// When the producer already exposes layout outputs (it was rewritten
/// earlier, or arrived that way), the paired layout output is reused
/// directly; otherwise the caller must synthesize a companion constant.
pub(crate) fn layout_output_of(
    graph: &Graph,
    edge: &Edge,
    ordering: TensorOrdering,
) -> Option<(NodeId, usize)> {
    let producer = graph.node(edge.src)?;
    if !producer.layout_outputs {
        return None;
    }
    let port = edge.src_port.slot()?;
    let layout_port = ordering.layout_port_for_data_port(port, producer.outputs)?;
    Some((edge.src, layout_port))
}

/// Synthesize a degenerate layout-metadata constant: a zero-size
/// `Const` standing in for "no optimized layout available". A control
/// edge from `control_src` keeps it from being scheduled before its
/// paired real tensor can exist.
pub(crate) fn synthesize_layout_const(
    graph: &mut Graph,
    ctx: &mut RewriteContext,
    device: &str,
    control_src: Option<NodeId>,
) -> Result<NodeId, GraphError> {
    let mut attrs = AttrMap::new();
    attrs.insert("dtype".into(), AttrValue::Type(DataType::Uint8));
    let id = graph.insert_node(Node {
        name: ctx.next_layout_const_name(),
        op: ops::CONST.into(),
        attrs,
        device: device.to_string(),
        outputs: 1,
        layout_outputs: false,
    })?;
    if let Some(src) = control_src {
        graph.add_control_edge(src, id)?;
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mklopt_graph::{NodeDef, OpRegistry, Port};

    #[test]
    fn reuses_layout_output_of_rewritten_producer() {
        let mut g = Graph::new(OpRegistry::standard());
        g.add_node(NodeDef::new("A", "_MklRelu")).unwrap();
        let z = g.add_node(NodeDef::new("Z", "Zeta").input("A")).unwrap();
        let edge = g.in_edge(z, 0).unwrap();
        assert_eq!(
            layout_output_of(&g, &edge, TensorOrdering::Contiguous),
            Some((g.node_id("A").unwrap(), 1))
        );
    }

    #[test]
    fn plain_producer_has_no_layout_output() {
        let mut g = Graph::new(OpRegistry::standard());
        g.add_node(NodeDef::new("A", "Relu")).unwrap();
        let z = g.add_node(NodeDef::new("Z", "Zeta").input("A")).unwrap();
        let edge = g.in_edge(z, 0).unwrap();
        assert_eq!(layout_output_of(&g, &edge, TensorOrdering::Contiguous), None);
    }

    #[test]
    fn synthesized_const_is_controlled() {
        let mut g = Graph::new(OpRegistry::standard());
        let a = g.add_node(NodeDef::new("A", "Relu")).unwrap();
        let mut ctx = RewriteContext::new();
        let d = synthesize_layout_const(&mut g, &mut ctx, "dev", Some(a)).unwrap();
        let node = g.node(d).unwrap();
        assert_eq!(node.name, "DMT/_0");
        assert_eq!(node.op, "Const");
        assert_eq!(node.device, "dev");
        let ctrl = g.in_control_edges(d);
        assert_eq!(ctrl.len(), 1);
        assert_eq!(ctrl[0].src, a);
        assert_eq!(ctrl[0].src_port, Port::Control);
    }
}
