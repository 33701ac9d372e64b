//! The static rule table.
//!
//! One read-only table maps operator types to merge, rewrite, context
//! and workspace rules. Engines resolve a node's op through a single
//! table lookup rather than scattered string comparisons; an op with no
//! entry simply passes through the pass unmodified.

use std::sync::OnceLock;

use mklopt_graph::{AttrMap, AttrValue, DataType, Node};

/// Operator type names known to the pass.
pub mod ops {
    pub const CONST: &str = "Const";

    pub const CONV2D: &str = "Conv2D";
    pub const CONV2D_GRAD_FILTER: &str = "Conv2DBackpropFilter";
    pub const CONV2D_GRAD_INPUT: &str = "Conv2DBackpropInput";
    pub const CONV2D_WITH_BIAS: &str = "Conv2DWithBias";
    pub const CONV2D_WITH_BIAS_GRAD_BIAS: &str = "Conv2DWithBiasBackpropBias";
    pub const BIAS_ADD: &str = "BiasAdd";
    pub const BIAS_ADD_GRAD: &str = "BiasAddGrad";
    pub const MATMUL: &str = "MatMul";
    pub const RELU: &str = "Relu";
    pub const RELU_GRAD: &str = "ReluGrad";
    pub const MAX_POOL: &str = "MaxPool";
    pub const MAX_POOL_GRAD: &str = "MaxPoolGrad";
    pub const AVG_POOL: &str = "AvgPool";
    pub const AVG_POOL_GRAD: &str = "AvgPoolGrad";
    pub const LRN: &str = "LRN";
    pub const LRN_GRAD: &str = "LRNGrad";
    pub const CONCAT: &str = "Concat";
    pub const CONCAT_V2: &str = "ConcatV2";
    pub const FUSED_BATCH_NORM: &str = "FusedBatchNorm";
    pub const FUSED_BATCH_NORM_GRAD: &str = "FusedBatchNormGrad";

    pub const MKL_CONV2D: &str = "_MklConv2D";
    pub const MKL_CONV2D_GRAD_FILTER: &str = "_MklConv2DBackpropFilter";
    pub const MKL_CONV2D_GRAD_INPUT: &str = "_MklConv2DBackpropInput";
    pub const MKL_CONV2D_WITH_BIAS: &str = "_MklConv2DWithBias";
    pub const MKL_CONV2D_WITH_BIAS_GRAD_BIAS: &str = "_MklConv2DWithBiasBackpropBias";
    pub const MKL_RELU: &str = "_MklRelu";
    pub const MKL_RELU_GRAD: &str = "_MklReluGrad";
    pub const MKL_MAX_POOL: &str = "_MklMaxPool";
    pub const MKL_MAX_POOL_GRAD: &str = "_MklMaxPoolGrad";
    pub const MKL_AVG_POOL: &str = "_MklAvgPool";
    pub const MKL_AVG_POOL_GRAD: &str = "_MklAvgPoolGrad";
    pub const MKL_LRN: &str = "_MklLRN";
    pub const MKL_LRN_GRAD: &str = "_MklLRNGrad";
    pub const MKL_CONCAT: &str = "_MklConcat";
    pub const MKL_CONCAT_V2: &str = "_MklConcatV2";
    pub const MKL_FUSED_BATCH_NORM: &str = "_MklFusedBatchNorm";
    pub const MKL_FUSED_BATCH_NORM_GRAD: &str = "_MklFusedBatchNormGrad";
}

const FLOAT_ONLY: &[DataType] = &[DataType::Float];

/// Structural precondition of a rewrite rule beyond type and device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RewritePredicate {
    Always,
    /// Pooling must be purely spatial: kernel and stride 1 in the
    /// batch and channel dimensions of the node's `data_format`.
    SpatialPooling,
}

/// Workspace behavior of a rewritten op.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkspaceRole {
    /// Produces a workspace output after its data outputs.
    Forward,
    /// Consumes a workspace input; `pairing_slot` is the original
    /// input slot through which the matching forward op must arrive.
    Backward { pairing_slot: usize },
}

#[derive(Clone, Debug)]
pub struct RewriteRule {
    pub from: &'static str,
    pub to: &'static str,
    pub types: &'static [DataType],
    pub predicate: RewritePredicate,
    pub workspace: Option<WorkspaceRole>,
}

impl RewriteRule {
    const fn plain(from: &'static str, to: &'static str) -> Self {
        RewriteRule {
            from,
            to,
            types: FLOAT_ONLY,
            predicate: RewritePredicate::Always,
            workspace: None,
        }
    }

    /// Type and structural eligibility of `node` under this rule.
    pub fn supports(&self, node: &Node) -> bool {
        let Some(dt) = node.data_type() else {
            return false;
        };
        if !self.types.contains(&dt) {
            return false;
        }
        match self.predicate {
            RewritePredicate::Always => true,
            RewritePredicate::SpatialPooling => is_spatial_pooling(&node.attrs),
        }
    }
}

/// Fuse an adjacent producer/consumer pair into one compound op.
#[derive(Clone, Debug)]
pub struct MergeRule {
    pub pred_op: &'static str,
    pub succ_op: &'static str,
    pub target_op: &'static str,
    /// Successor input slot that must be fed by the predecessor.
    pub succ_slot: usize,
    /// Attributes that must compare equal on both nodes.
    pub match_attrs: &'static [&'static str],
    pub types: &'static [DataType],
    /// Whether the predecessor already carries paired layout inputs
    /// (and the fused node therefore exposes layout ports).
    pub pred_carries_layout: bool,
}

/// Relabel a node based on a bounded backward dataflow search from its
/// sole input.
#[derive(Clone, Debug)]
pub struct ContextRule {
    pub op: &'static str,
    /// Operator types that establish the context when found upstream.
    pub context_ops: &'static [&'static str],
    /// When non-empty: some consumer of the node's input, of one of
    /// these types, must take that tensor at `filter_slot` and share
    /// its input 0 with the context node.
    pub filter_ops: &'static [&'static str],
    pub filter_slot: usize,
    pub target_op: &'static str,
}

/// Thread a workspace tensor from a rewritten forward op into its
/// rewritten backward partner.
#[derive(Clone, Debug)]
pub struct WorkspaceRule {
    pub mkl_fwd_op: &'static str,
    pub mkl_bwd_op: &'static str,
    /// Original backward input slot through which the forward arrives.
    pub bwd_slot: usize,
}

#[derive(Debug, Default)]
pub struct RuleTable {
    rewrites: Vec<RewriteRule>,
    merges: Vec<MergeRule>,
    contexts: Vec<ContextRule>,
    workspaces: Vec<WorkspaceRule>,
}

impl RuleTable {
    /// The built-in table. Constructed once per process; contents are
    /// immutable thereafter.
    pub fn global() -> &'static RuleTable {
        static TABLE: OnceLock<RuleTable> = OnceLock::new();
        TABLE.get_or_init(RuleTable::build)
    }

    fn build() -> RuleTable {
        use ops::*;
        let mut t = RuleTable::default();

        t.rewrites.push(RewriteRule::plain(CONV2D, MKL_CONV2D));
        t.rewrites
            .push(RewriteRule::plain(CONV2D_GRAD_FILTER, MKL_CONV2D_GRAD_FILTER));
        t.rewrites
            .push(RewriteRule::plain(CONV2D_GRAD_INPUT, MKL_CONV2D_GRAD_INPUT));
        t.rewrites
            .push(RewriteRule::plain(CONV2D_WITH_BIAS, MKL_CONV2D_WITH_BIAS));
        t.rewrites.push(RewriteRule::plain(
            CONV2D_WITH_BIAS_GRAD_BIAS,
            MKL_CONV2D_WITH_BIAS_GRAD_BIAS,
        ));
        t.rewrites.push(RewriteRule::plain(RELU, MKL_RELU));
        t.rewrites.push(RewriteRule::plain(RELU_GRAD, MKL_RELU_GRAD));
        t.rewrites.push(RewriteRule {
            predicate: RewritePredicate::SpatialPooling,
            workspace: Some(WorkspaceRole::Forward),
            ..RewriteRule::plain(MAX_POOL, MKL_MAX_POOL)
        });
        t.rewrites.push(RewriteRule {
            predicate: RewritePredicate::SpatialPooling,
            workspace: Some(WorkspaceRole::Backward { pairing_slot: 1 }),
            ..RewriteRule::plain(MAX_POOL_GRAD, MKL_MAX_POOL_GRAD)
        });
        t.rewrites.push(RewriteRule {
            predicate: RewritePredicate::SpatialPooling,
            ..RewriteRule::plain(AVG_POOL, MKL_AVG_POOL)
        });
        t.rewrites.push(RewriteRule {
            predicate: RewritePredicate::SpatialPooling,
            ..RewriteRule::plain(AVG_POOL_GRAD, MKL_AVG_POOL_GRAD)
        });
        t.rewrites.push(RewriteRule {
            workspace: Some(WorkspaceRole::Forward),
            ..RewriteRule::plain(LRN, MKL_LRN)
        });
        t.rewrites.push(RewriteRule {
            workspace: Some(WorkspaceRole::Backward { pairing_slot: 2 }),
            ..RewriteRule::plain(LRN_GRAD, MKL_LRN_GRAD)
        });
        t.rewrites.push(RewriteRule::plain(CONCAT, MKL_CONCAT));
        t.rewrites.push(RewriteRule::plain(CONCAT_V2, MKL_CONCAT_V2));
        t.rewrites
            .push(RewriteRule::plain(FUSED_BATCH_NORM, MKL_FUSED_BATCH_NORM));
        t.rewrites.push(RewriteRule::plain(
            FUSED_BATCH_NORM_GRAD,
            MKL_FUSED_BATCH_NORM_GRAD,
        ));

        t.merges.push(MergeRule {
            pred_op: CONV2D,
            succ_op: BIAS_ADD,
            target_op: CONV2D_WITH_BIAS,
            succ_slot: 0,
            match_attrs: &["data_format"],
            types: FLOAT_ONLY,
            pred_carries_layout: false,
        });
        t.merges.push(MergeRule {
            pred_op: MKL_CONV2D,
            succ_op: BIAS_ADD,
            target_op: MKL_CONV2D_WITH_BIAS,
            succ_slot: 0,
            match_attrs: &["data_format"],
            types: FLOAT_ONLY,
            pred_carries_layout: true,
        });

        t.contexts.push(ContextRule {
            op: BIAS_ADD_GRAD,
            context_ops: &[CONV2D_WITH_BIAS, MKL_CONV2D_WITH_BIAS],
            filter_ops: &[CONV2D_GRAD_FILTER, MKL_CONV2D_GRAD_FILTER],
            filter_slot: 2,
            target_op: CONV2D_WITH_BIAS_GRAD_BIAS,
        });
        // A matrix-multiply context claims the gradient without
        // renaming it, which keeps the convolution rule from firing on
        // dense-layer graphs.
        t.contexts.push(ContextRule {
            op: BIAS_ADD_GRAD,
            context_ops: &[MATMUL],
            filter_ops: &[],
            filter_slot: 0,
            target_op: BIAS_ADD_GRAD,
        });

        t.workspaces.push(WorkspaceRule {
            mkl_fwd_op: MKL_MAX_POOL,
            mkl_bwd_op: MKL_MAX_POOL_GRAD,
            bwd_slot: 1,
        });
        t.workspaces.push(WorkspaceRule {
            mkl_fwd_op: MKL_LRN,
            mkl_bwd_op: MKL_LRN_GRAD,
            bwd_slot: 2,
        });

        t
    }

    pub fn rewrite_for(&self, op: &str) -> Option<&RewriteRule> {
        self.rewrites.iter().find(|r| r.from == op)
    }

    pub fn merges_for_successor<'a>(
        &'a self,
        op: &'a str,
    ) -> impl Iterator<Item = &'a MergeRule> {
        self.merges.iter().filter(move |m| m.succ_op == op)
    }

    pub fn contexts_for<'a>(&'a self, op: &'a str) -> impl Iterator<Item = &'a ContextRule> {
        self.contexts.iter().filter(move |c| c.op == op)
    }

    pub fn workspace_for_backward(&self, mkl_op: &str) -> Option<&WorkspaceRule> {
        self.workspaces.iter().find(|w| w.mkl_bwd_op == mkl_op)
    }
}

/// Kernel and stride must be 1 in the batch and channel dimensions for
/// the node's layout; anything else keeps the pooling op untouched.
pub(crate) fn is_spatial_pooling(attrs: &AttrMap) -> bool {
    let format = attrs
        .get("data_format")
        .and_then(AttrValue::as_str)
        .unwrap_or("NHWC");
    let (batch, channel) = match format {
        "NCHW" => (0, 1),
        "NHWC" => (0, 3),
        _ => return false,
    };
    let unit_at = |key: &str| {
        attrs
            .get(key)
            .and_then(AttrValue::as_int_list)
            .is_some_and(|v| v.len() == 4 && v[batch] == 1 && v[channel] == 1)
    };
    unit_at("ksize") && unit_at("strides")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_attrs(format: &str, ksize: [i64; 4], strides: [i64; 4]) -> AttrMap {
        let mut attrs = AttrMap::new();
        attrs.insert("T".into(), AttrValue::Type(DataType::Float));
        attrs.insert("data_format".into(), AttrValue::S(format.into()));
        attrs.insert("ksize".into(), AttrValue::IntList(ksize.to_vec()));
        attrs.insert("strides".into(), AttrValue::IntList(strides.to_vec()));
        attrs
    }

    #[test]
    fn table_is_keyed_by_op_type() {
        let t = RuleTable::global();
        assert_eq!(t.rewrite_for(ops::CONV2D).unwrap().to, ops::MKL_CONV2D);
        assert!(t.rewrite_for("Zeta").is_none());
        assert!(t.rewrite_for(ops::MKL_CONV2D).is_none());
        assert_eq!(t.merges_for_successor(ops::BIAS_ADD).count(), 2);
        assert_eq!(t.contexts_for(ops::BIAS_ADD_GRAD).count(), 2);
        assert!(t.workspace_for_backward(ops::MKL_LRN_GRAD).is_some());
        assert!(t.workspace_for_backward(ops::MKL_AVG_POOL_GRAD).is_none());
    }

    #[test]
    fn spatial_pooling_accepts_spatial_kernels() {
        assert!(is_spatial_pooling(&pool_attrs(
            "NCHW",
            [1, 1, 3, 3],
            [1, 1, 2, 2]
        )));
        assert!(is_spatial_pooling(&pool_attrs(
            "NHWC",
            [1, 3, 3, 1],
            [1, 2, 2, 1]
        )));
    }

    #[test]
    fn spatial_pooling_rejects_batch_and_channel_pooling() {
        // Batch-wise kernel and stride, NCHW.
        assert!(!is_spatial_pooling(&pool_attrs(
            "NCHW",
            [2, 1, 1, 1],
            [1, 1, 1, 1]
        )));
        assert!(!is_spatial_pooling(&pool_attrs(
            "NCHW",
            [1, 1, 1, 1],
            [2, 1, 1, 1]
        )));
        // Channel-wise kernel, NCHW and NHWC.
        assert!(!is_spatial_pooling(&pool_attrs(
            "NCHW",
            [1, 2, 1, 1],
            [1, 1, 1, 1]
        )));
        assert!(!is_spatial_pooling(&pool_attrs(
            "NHWC",
            [1, 1, 1, 2],
            [1, 1, 1, 1]
        )));
        // Unknown layout or missing lists never qualify.
        assert!(!is_spatial_pooling(&pool_attrs(
            "NCWH",
            [1, 1, 1, 1],
            [1, 1, 1, 1]
        )));
        assert!(!is_spatial_pooling(&AttrMap::new()));
    }

    #[test]
    fn rewrite_rule_gates_on_type() {
        let t = RuleTable::global();
        let rule = t.rewrite_for(ops::CONV2D).unwrap();
        let mut attrs = AttrMap::new();
        attrs.insert("T".into(), AttrValue::Type(DataType::Half));
        let node = Node {
            name: "c".into(),
            op: ops::CONV2D.into(),
            attrs,
            device: String::new(),
            outputs: 1,
            layout_outputs: false,
        };
        assert!(!rule.supports(&node));
        let mut node = node;
        node.attrs
            .insert("T".into(), AttrValue::Type(DataType::Float));
        assert!(rule.supports(&node));
        // No type attribute at all is never eligible.
        node.attrs.remove("T");
        assert!(!rule.supports(&node));
    }
}
