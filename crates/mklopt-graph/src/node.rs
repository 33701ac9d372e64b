//! Nodes, edges and ports.

use serde::{Deserialize, Serialize};

use crate::attr::{AttrMap, AttrValue};
use crate::datatype::DataType;

/// Stable handle to a node. Ids follow insertion order and are never
/// reused within one graph, which keeps traversal order deterministic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// An endpoint slot on a node. `Control` is the distinguished slot for
/// control-only dependencies; a control edge uses it on both endpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Port {
    Data(usize),
    Control,
}

impl Port {
    pub fn is_control(self) -> bool {
        matches!(self, Port::Control)
    }

    /// Data slot index, if this is a data port.
    pub fn slot(self) -> Option<usize> {
        match self {
            Port::Data(s) => Some(s),
            Port::Control => None,
        }
    }
}

/// A directed edge. The graph exclusively owns all edges; nodes hold no
/// edge state of their own.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edge {
    pub src: NodeId,
    pub src_port: Port,
    pub dst: NodeId,
    pub dst_port: Port,
}

impl Edge {
    pub fn is_control(&self) -> bool {
        self.src_port.is_control() || self.dst_port.is_control()
    }
}

/// A graph node: named operator instance with attributes and an opaque
/// device assignment.
///
/// `outputs` counts the node's data outputs (including a workspace
/// output where the operator has one). When `layout_outputs` is set the
/// node additionally exposes one layout-metadata output per data
/// output; those occupy the ports after the data outputs.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub name: String,
    pub op: String,
    pub attrs: AttrMap,
    pub device: String,
    pub outputs: usize,
    pub layout_outputs: bool,
}

impl Node {
    pub fn attr(&self, key: &str) -> Option<&AttrValue> {
        self.attrs.get(key)
    }

    /// The element type declared under the conventional `T` attribute.
    pub fn data_type(&self) -> Option<DataType> {
        self.attr("T").and_then(AttrValue::as_type)
    }

    /// Total number of output ports, counting layout outputs.
    pub fn output_ports(&self) -> usize {
        if self.layout_outputs {
            self.outputs * 2
        } else {
            self.outputs
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_accessors() {
        assert!(Port::Control.is_control());
        assert!(!Port::Data(0).is_control());
        assert_eq!(Port::Data(3).slot(), Some(3));
        assert_eq!(Port::Control.slot(), None);
    }

    #[test]
    fn output_ports_double_with_layout() {
        let mut n = Node {
            name: "a".into(),
            op: "Op".into(),
            attrs: AttrMap::new(),
            device: String::new(),
            outputs: 2,
            layout_outputs: false,
        };
        assert_eq!(n.output_ports(), 2);
        n.layout_outputs = true;
        assert_eq!(n.output_ports(), 4);
    }
}
