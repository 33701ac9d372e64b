//! # mklopt-graph
//!
//! Mutable directed multigraph substrate for tensor computation
//! graphs, shared by the layout rewrite pass in `mklopt-rewrite`.
//!
//! A graph owns a set of named operator [`Node`]s and the [`Edge`]s
//! between them. Edges connect typed output ports to input slots; a
//! distinguished control port expresses control-only dependencies.
//! Nodes carry an attribute map, an opaque device string, and their
//! data-output arity (resolved through an [`OpRegistry`] at
//! construction time).
//!
//! Everything here is deterministic by construction: node iteration
//! follows insertion order, topological ordering breaks ties by node
//! id, and the [`canonical_string`] encoding sorts nodes and edges so
//! graph equality can be asserted as string equality.
//!
//! ```
//! use mklopt_graph::{Graph, NodeDef, OpRegistry, canonical_string};
//!
//! let mut g = Graph::new(OpRegistry::standard());
//! g.add_node(NodeDef::new("A", "Const")).unwrap();
//! g.add_node(NodeDef::new("B", "Relu").input("A")).unwrap();
//! assert_eq!(canonical_string(&g), "A(Const);B(Relu)|A->B");
//! ```

mod attr;
mod canonical;
mod datatype;
mod error;
mod graph;
mod node;
mod registry;
mod topo;
mod validation;

pub use attr::{AttrMap, AttrValue};
pub use canonical::canonical_string;
pub use datatype::DataType;
pub use error::GraphError;
pub use graph::{Graph, NodeDef};
pub use node::{Edge, Node, NodeId, Port};
pub use registry::{OpRegistry, OpSchema, OutputArity};
pub use topo::topo_order;
pub use validation::validate;
