//! # mklopt-rewrite
//!
//! Graph layout rewrite pass: transforms a tensor computation graph,
//! in place, into an equivalent graph built from vendor-optimized
//! ("Mkl") operator variants that require a layout-metadata companion
//! tensor alongside every real tensor.
//!
//! # Architecture
//!
//! The pass runs three sub-passes in a fixed order over the graph:
//!
//! 1. **Merge** — fuses known adjacent pairs (convolution + bias add)
//!    into compound ops, and relabels bias gradients whose dataflow
//!    context matches a fused convolution.
//! 2. **Rewrite** — replaces each eligible node with its optimized
//!    variant, threading one layout input per data input: reused from
//!    an already-rewritten producer where possible, otherwise a
//!    synthesized degenerate constant (`DMT/_N`).
//! 3. **Workspace insertion** — wires scratch-state tensors from
//!    rewritten forward pooling/normalization ops into their rewritten
//!    backward partners, degrading to dummy inputs when unpaired.
//!
//! Eligibility is governed by a static [`RuleTable`]: operator type,
//! element type support, exact device-string match, and per-rule
//! structural predicates. Anything ineligible passes through
//! untouched — the pass has no user-visible failure mode of its own.
//!
//! The result is deterministic: node traversal follows a stable
//! topological order and synthesized names come from a counter in a
//! per-invocation [`RewriteContext`], so equal inputs produce
//! byte-identical canonical encodings.
//!
//! ```
//! use mklopt_graph::{AttrValue, DataType, Graph, NodeDef, OpRegistry, canonical_string};
//! use mklopt_rewrite::{run_layout_pass, PassConfig, DEFAULT_CPU_DEVICE};
//!
//! let mut registry = OpRegistry::standard();
//! registry.register("Input", mklopt_graph::OpSchema::fixed(1));
//! let mut g = Graph::new(registry);
//! g.add_node(NodeDef::new("A", "Input")).unwrap();
//! g.add_node(
//!     NodeDef::new("B", "Relu")
//!         .attr("T", AttrValue::Type(DataType::Float))
//!         .input("A"),
//! )
//! .unwrap();
//! g.set_all_devices(DEFAULT_CPU_DEVICE);
//!
//! run_layout_pass(&mut g, &PassConfig::default()).unwrap();
//! assert_eq!(
//!     canonical_string(&g),
//!     "A(Input);B(_MklRelu);DMT/_0(Const)|A->B;A:control->DMT/_0:control;DMT/_0->B:1"
//! );
//! ```

mod config;
mod context;
mod layout;
mod merge;
mod pass;
mod rewrite;
mod rules;
mod workspace;

pub use config::{PassConfig, TensorOrdering, DEFAULT_CPU_DEVICE, LAYOUT_CONST_PREFIX};
pub use context::RewriteContext;
pub use pass::{run_layout_pass, RewriteStats};
pub use rules::{
    ops, ContextRule, MergeRule, RewritePredicate, RewriteRule, RuleTable, WorkspaceRole,
    WorkspaceRule,
};
