//! Node attributes: a small tagged-value map keyed by attribute name.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::datatype::DataType;

/// A single attribute value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    /// An element type tag (conventionally under the key `T` or `dtype`).
    Type(DataType),
    /// A string value (e.g. `data_format`, `padding`).
    S(String),
    B(bool),
    I(i64),
    F(f32),
    IntList(Vec<i64>),
    TypeList(Vec<DataType>),
}

impl AttrValue {
    pub fn as_type(&self) -> Option<DataType> {
        match self {
            AttrValue::Type(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::S(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::B(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::I(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_int_list(&self) -> Option<&[i64]> {
        match self {
            AttrValue::IntList(v) => Some(v),
            _ => None,
        }
    }
}

/// Attribute map. A `BTreeMap` keeps iteration deterministic, which the
/// rewrite machinery relies on when copying attribute sets.
pub type AttrMap = BTreeMap<String, AttrValue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_match_variant() {
        assert_eq!(AttrValue::Type(DataType::Float).as_type(), Some(DataType::Float));
        assert_eq!(AttrValue::S("NCHW".into()).as_str(), Some("NCHW"));
        assert_eq!(AttrValue::B(true).as_bool(), Some(true));
        assert_eq!(AttrValue::I(2).as_int(), Some(2));
        assert_eq!(
            AttrValue::IntList(vec![1, 1, 2, 2]).as_int_list(),
            Some(&[1i64, 1, 2, 2][..])
        );
    }

    #[test]
    fn accessors_reject_other_variants() {
        assert_eq!(AttrValue::S("x".into()).as_type(), None);
        assert_eq!(AttrValue::I(1).as_str(), None);
        assert_eq!(AttrValue::Type(DataType::Half).as_int_list(), None);
    }
}
