//! Element type tags carried by node attributes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Element type of a tensor, as declared by a node's type attribute.
///
/// Only the tag is modeled; the pass never touches tensor contents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Float,
    Double,
    Half,
    Int32,
    Int64,
    Uint8,
    Bool,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Float => "float",
            DataType::Double => "double",
            DataType::Half => "half",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::Uint8 => "uint8",
            DataType::Bool => "bool",
        };
        f.write_str(name)
    }
}
