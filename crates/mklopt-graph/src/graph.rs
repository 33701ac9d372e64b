//! The mutable directed multigraph.
//!
//! Nodes live in an arena with stable ids; removing a node leaves a
//! tombstone so that ids of surviving nodes never shift. The graph
//! exclusively owns the edge list. Iteration over nodes follows
//! insertion order, never hash order, so a rewrite over the graph is
//! reproducible run to run.

use std::collections::HashMap;

use crate::attr::{AttrMap, AttrValue};
use crate::error::GraphError;
use crate::node::{Edge, Node, NodeId, Port};
use crate::registry::OpRegistry;

/// Declarative description of a node to add, with inputs referenced by
/// producer name and optional output slot (`"B"` or `"B:1"`).
#[derive(Clone, Debug)]
pub struct NodeDef {
    pub name: String,
    pub op: String,
    pub attrs: AttrMap,
    pub inputs: Vec<(String, usize)>,
    pub device: String,
}

impl NodeDef {
    pub fn new(name: impl Into<String>, op: impl Into<String>) -> Self {
        NodeDef {
            name: name.into(),
            op: op.into(),
            attrs: AttrMap::new(),
            inputs: Vec::new(),
            device: String::new(),
        }
    }

    pub fn attr(mut self, key: impl Into<String>, value: AttrValue) -> Self {
        self.attrs.insert(key.into(), value);
        self
    }

    /// Add an input reference. A trailing `:N` selects output slot `N`
    /// of the producer; the bare name selects slot 0.
    pub fn input(mut self, reference: &str) -> Self {
        let (name, slot) = match reference.rsplit_once(':') {
            Some((name, slot_str)) => match slot_str.parse::<usize>() {
                Ok(slot) => (name.to_string(), slot),
                Err(_) => (reference.to_string(), 0),
            },
            None => (reference.to_string(), 0),
        };
        self.inputs.push((name, slot));
        self
    }

    pub fn device(mut self, device: impl Into<String>) -> Self {
        self.device = device.into();
        self
    }
}

#[derive(Clone, Debug, Default)]
pub struct Graph {
    registry: OpRegistry,
    nodes: Vec<Option<Node>>,
    edges: Vec<Edge>,
    names: HashMap<String, NodeId>,
}

impl Graph {
    pub fn new(registry: OpRegistry) -> Self {
        Graph {
            registry,
            nodes: Vec::new(),
            edges: Vec::new(),
            names: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &OpRegistry {
        &self.registry
    }

    /// Add a node from a declarative definition, resolving its declared
    /// inputs against nodes already present. A reference to a missing
    /// producer is the one fatal construction error (the pass itself
    /// assumes a well-formed graph).
    pub fn add_node(&mut self, def: NodeDef) -> Result<NodeId, GraphError> {
        let outputs = self.registry.outputs_for(&def.op, &def.attrs);
        let layout_outputs = self.registry.has_layout_outputs(&def.op);
        let node = Node {
            name: def.name,
            op: def.op,
            attrs: def.attrs,
            device: def.device,
            outputs,
            layout_outputs,
        };
        let id = self.insert_node(node)?;
        for (slot_idx, (src_name, src_slot)) in def.inputs.iter().enumerate() {
            let src = self.names.get(src_name).copied().ok_or_else(|| {
                let node_name = self.node(id).map(|n| n.name.clone()).unwrap_or_default();
                GraphError::UnknownInput {
                    node: node_name,
                    input: format!("{src_name}:{src_slot}"),
                }
            })?;
            self.add_edge(src, *src_slot, id, slot_idx)?;
        }
        Ok(id)
    }

    /// Insert a fully formed node (used by rewrite machinery for
    /// synthesized nodes). The name must be unused.
    pub fn insert_node(&mut self, node: Node) -> Result<NodeId, GraphError> {
        if self.names.contains_key(&node.name) {
            return Err(GraphError::DuplicateName(node.name));
        }
        let id = NodeId(self.nodes.len());
        self.names.insert(node.name.clone(), id);
        self.nodes.push(Some(node));
        Ok(id)
    }

    /// Remove a node and every incident edge. Returns the node, if it
    /// was present.
    pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        let node = self.nodes.get_mut(id.0)?.take()?;
        self.names.remove(&node.name);
        self.edges.retain(|e| e.src != id && e.dst != id);
        Some(node)
    }

    /// Add a data edge `src:src_slot -> dst:dst_slot`. The source slot
    /// must be within the producer's output ports and the destination
    /// slot must be unoccupied.
    pub fn add_edge(
        &mut self,
        src: NodeId,
        src_slot: usize,
        dst: NodeId,
        dst_slot: usize,
    ) -> Result<(), GraphError> {
        let src_node = self.node(src).ok_or(GraphError::UnknownNode(src.0))?;
        let limit = src_node.output_ports();
        if src_slot >= limit {
            return Err(GraphError::PortOutOfRange {
                node: src_node.name.clone(),
                port: src_slot,
                limit,
            });
        }
        let dst_node = self.node(dst).ok_or(GraphError::UnknownNode(dst.0))?;
        if self.in_edge(dst, dst_slot).is_some() {
            return Err(GraphError::DuplicateInput {
                node: dst_node.name.clone(),
                slot: dst_slot,
            });
        }
        self.edges.push(Edge {
            src,
            src_port: Port::Data(src_slot),
            dst,
            dst_port: Port::Data(dst_slot),
        });
        Ok(())
    }

    /// Add a control-only dependency from `src` to `dst`. Duplicate
    /// control edges are collapsed.
    pub fn add_control_edge(&mut self, src: NodeId, dst: NodeId) -> Result<(), GraphError> {
        if self.node(src).is_none() {
            return Err(GraphError::UnknownNode(src.0));
        }
        if self.node(dst).is_none() {
            return Err(GraphError::UnknownNode(dst.0));
        }
        let edge = Edge {
            src,
            src_port: Port::Control,
            dst,
            dst_port: Port::Control,
        };
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    /// Live nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.as_ref().map(|n| (NodeId(i), n)))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// The unique edge feeding `dst` at data slot `slot`, if connected.
    pub fn in_edge(&self, dst: NodeId, slot: usize) -> Option<Edge> {
        self.edges
            .iter()
            .find(|e| e.dst == dst && e.dst_port == Port::Data(slot))
            .copied()
    }

    /// Incoming data edges of `dst`, ordered by destination slot.
    pub fn in_data_edges(&self, dst: NodeId) -> Vec<Edge> {
        let mut edges: Vec<Edge> = self
            .edges
            .iter()
            .filter(|e| e.dst == dst && !e.is_control())
            .copied()
            .collect();
        edges.sort_by_key(|e| e.dst_port);
        edges
    }

    /// Incoming control edges of `dst`, in edge-insertion order.
    pub fn in_control_edges(&self, dst: NodeId) -> Vec<Edge> {
        self.edges
            .iter()
            .filter(|e| e.dst == dst && e.is_control())
            .copied()
            .collect()
    }

    /// Outgoing edges of `src` (data and control), in insertion order.
    pub fn out_edges(&self, src: NodeId) -> Vec<Edge> {
        self.edges
            .iter()
            .filter(|e| e.src == src)
            .copied()
            .collect()
    }

    /// Number of outgoing non-control edges, over all output slots.
    pub fn data_out_degree(&self, src: NodeId) -> usize {
        self.edges
            .iter()
            .filter(|e| e.src == src && !e.is_control())
            .count()
    }

    /// Consumers of `src`'s data output `slot`, in edge-insertion order.
    pub fn consumers(&self, src: NodeId, slot: usize) -> Vec<Edge> {
        self.edges
            .iter()
            .filter(|e| e.src == src && e.src_port == Port::Data(slot))
            .copied()
            .collect()
    }

    /// Assign the same device string to every node. Mirrors how test
    /// harnesses pin a whole graph to one device.
    pub fn set_all_devices(&mut self, device: &str) {
        for node in self.nodes.iter_mut().flatten() {
            node.device = device.to_string();
        }
    }

    /// Convenience accessor used throughout the rewrite machinery.
    pub fn attr_of(&self, id: NodeId, key: &str) -> Option<&AttrValue> {
        self.node(id).and_then(|n| n.attr(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::OpSchema;

    fn registry() -> OpRegistry {
        let mut r = OpRegistry::standard();
        r.register("Input", OpSchema::fixed(1));
        r
    }

    #[test]
    fn add_and_resolve_inputs() {
        let mut g = Graph::new(registry());
        g.add_node(NodeDef::new("A", "Input")).unwrap();
        g.add_node(NodeDef::new("B", "Input")).unwrap();
        let c = g
            .add_node(NodeDef::new("C", "Zeta").input("A").input("B"))
            .unwrap();
        assert_eq!(g.node_count(), 3);
        let ins = g.in_data_edges(c);
        assert_eq!(ins.len(), 2);
        assert_eq!(ins[0].src, g.node_id("A").unwrap());
        assert_eq!(ins[1].src, g.node_id("B").unwrap());
    }

    #[test]
    fn input_slot_parsing() {
        let mut g = Graph::new(registry());
        let mut r = OpRegistry::new();
        r.register("Two", OpSchema::fixed(2));
        let mut g2 = Graph::new(r);
        g2.add_node(NodeDef::new("M", "Two")).unwrap();
        let d = g2.add_node(NodeDef::new("D", "Zeta").input("M:1")).unwrap();
        assert_eq!(g2.in_edge(d, 0).unwrap().src_port, Port::Data(1));

        // Bare reference is slot 0.
        g.add_node(NodeDef::new("A", "Input")).unwrap();
        let b = g.add_node(NodeDef::new("B", "Zeta").input("A")).unwrap();
        assert_eq!(g.in_edge(b, 0).unwrap().src_port, Port::Data(0));
    }

    #[test]
    fn unknown_input_is_fatal() {
        let mut g = Graph::new(registry());
        let err = g.add_node(NodeDef::new("C", "Zeta").input("missing"));
        assert!(matches!(err, Err(GraphError::UnknownInput { .. })));
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut g = Graph::new(registry());
        g.add_node(NodeDef::new("A", "Input")).unwrap();
        assert!(matches!(
            g.add_node(NodeDef::new("A", "Input")),
            Err(GraphError::DuplicateName(_))
        ));
    }

    #[test]
    fn remove_node_drops_incident_edges() {
        let mut g = Graph::new(registry());
        let a = g.add_node(NodeDef::new("A", "Input")).unwrap();
        let b = g.add_node(NodeDef::new("B", "Zeta").input("A")).unwrap();
        g.add_node(NodeDef::new("C", "Zeta").input("B")).unwrap();
        g.remove_node(b);
        assert!(g.edges().iter().all(|e| e.src != b && e.dst != b));
        assert_eq!(g.node_count(), 2);
        // The freed name can be taken again.
        let b2 = g.add_node(NodeDef::new("B", "Input")).unwrap();
        assert_ne!(a, b2);
        assert_eq!(g.node_id("B"), Some(b2));
    }

    #[test]
    fn source_port_bounds_enforced() {
        let mut g = Graph::new(registry());
        g.add_node(NodeDef::new("A", "Input")).unwrap();
        let err = g.add_node(NodeDef::new("B", "Zeta").input("A:4"));
        assert!(matches!(err, Err(GraphError::PortOutOfRange { .. })));
    }

    #[test]
    fn occupied_input_slot_rejected() {
        let mut g = Graph::new(registry());
        let a = g.add_node(NodeDef::new("A", "Input")).unwrap();
        let b = g.add_node(NodeDef::new("B", "Zeta").input("A")).unwrap();
        assert!(matches!(
            g.add_edge(a, 0, b, 0),
            Err(GraphError::DuplicateInput { .. })
        ));
    }

    #[test]
    fn control_edges_deduplicate() {
        let mut g = Graph::new(registry());
        let a = g.add_node(NodeDef::new("A", "Input")).unwrap();
        let b = g.add_node(NodeDef::new("B", "Input")).unwrap();
        g.add_control_edge(a, b).unwrap();
        g.add_control_edge(a, b).unwrap();
        assert_eq!(g.edges().len(), 1);
        assert!(g.edges()[0].is_control());
    }
}
