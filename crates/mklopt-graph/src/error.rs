//! Error types for graph construction and validation.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("node name '{0}' already exists in the graph")]
    DuplicateName(String),
    #[error("node '{node}' references unknown input '{input}'")]
    UnknownInput { node: String, input: String },
    #[error("unknown node id {0}")]
    UnknownNode(usize),
    #[error("output port {port} out of range for node '{node}' ({limit} ports)")]
    PortOutOfRange {
        node: String,
        port: usize,
        limit: usize,
    },
    #[error("input slot {slot} of node '{node}' is already connected")]
    DuplicateInput { node: String, slot: usize },
    #[error("graph contains a cycle and cannot be topologically ordered")]
    Cycle,
}
