//! Operator schemas: output arity and layout-output capability.
//!
//! The registry answers the one structural question graph construction
//! needs about an operator: how many outputs it has (possibly driven by
//! an integer attribute, as with list operators) and whether it exposes
//! paired layout-metadata outputs. Unregistered operators default to a
//! single plain output.

use std::collections::HashMap;

use crate::attr::{AttrMap, AttrValue};

#[derive(Clone, Debug)]
pub enum OutputArity {
    Fixed(usize),
    /// Output count is the value of the named integer attribute.
    Attr(&'static str),
}

#[derive(Clone, Debug)]
pub struct OpSchema {
    pub outputs: OutputArity,
    pub layout_outputs: bool,
}

impl OpSchema {
    pub fn fixed(outputs: usize) -> Self {
        OpSchema {
            outputs: OutputArity::Fixed(outputs),
            layout_outputs: false,
        }
    }

    pub fn with_layout(outputs: usize) -> Self {
        OpSchema {
            outputs: OutputArity::Fixed(outputs),
            layout_outputs: true,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct OpRegistry {
    schemas: HashMap<String, OpSchema>,
}

impl OpRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with the operator vocabulary of the layout
    /// rewrite pass, including the optimized variants it produces.
    pub fn standard() -> Self {
        let mut r = OpRegistry::new();
        for op in [
            "Const",
            "Conv2D",
            "Conv2DBackpropFilter",
            "Conv2DBackpropInput",
            "Conv2DWithBias",
            "Conv2DWithBiasBackpropBias",
            "BiasAdd",
            "BiasAddGrad",
            "MatMul",
            "Relu",
            "ReluGrad",
            "MaxPool",
            "MaxPoolGrad",
            "AvgPool",
            "AvgPoolGrad",
            "LRN",
            "LRNGrad",
            "Concat",
            "ConcatV2",
        ] {
            r.register(op, OpSchema::fixed(1));
        }
        r.register("FusedBatchNorm", OpSchema::fixed(5));
        r.register("FusedBatchNormGrad", OpSchema::fixed(5));

        // Optimized variants: data outputs (workspace included for the
        // forward pooling/normalization ops) plus paired layout outputs.
        for op in [
            "_MklConv2D",
            "_MklConv2DBackpropFilter",
            "_MklConv2DBackpropInput",
            "_MklConv2DWithBias",
            "_MklConv2DWithBiasBackpropBias",
            "_MklRelu",
            "_MklReluGrad",
            "_MklMaxPoolGrad",
            "_MklAvgPool",
            "_MklAvgPoolGrad",
            "_MklLRNGrad",
            "_MklConcat",
            "_MklConcatV2",
        ] {
            r.register(op, OpSchema::with_layout(1));
        }
        r.register("_MklMaxPool", OpSchema::with_layout(2));
        r.register("_MklLRN", OpSchema::with_layout(2));
        r.register("_MklFusedBatchNorm", OpSchema::with_layout(5));
        r.register("_MklFusedBatchNormGrad", OpSchema::with_layout(5));
        r
    }

    pub fn register(&mut self, op: impl Into<String>, schema: OpSchema) -> &mut Self {
        self.schemas.insert(op.into(), schema);
        self
    }

    pub fn schema(&self, op: &str) -> Option<&OpSchema> {
        self.schemas.get(op)
    }

    /// Data-output count for `op` given the node's attributes.
    pub fn outputs_for(&self, op: &str, attrs: &AttrMap) -> usize {
        match self.schemas.get(op).map(|s| &s.outputs) {
            Some(OutputArity::Fixed(n)) => *n,
            Some(OutputArity::Attr(key)) => attrs
                .get(*key)
                .and_then(AttrValue::as_int)
                .map(|n| n.max(0) as usize)
                .unwrap_or(1),
            None => 1,
        }
    }

    pub fn has_layout_outputs(&self, op: &str) -> bool {
        self.schemas.get(op).is_some_and(|s| s.layout_outputs)
    }
}
