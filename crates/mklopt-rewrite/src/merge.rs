//! Node merge engine.
//!
//! Detects adjacent producer/consumer pairs that form a known fusable
//! pattern and replaces each with one compound node carrying the union
//! of their inputs in the configured slot ordering. Also hosts the
//! context rules: relabelings driven by a bounded backward dataflow
//! match rather than direct adjacency.
//!
//! Every unmet precondition is a silent skip for that candidate; the
//! untouched nodes remain eligible for single-node rewriting.

use std::collections::{BTreeSet, VecDeque};

use mklopt_graph::{topo_order, Edge, Graph, GraphError, Node, NodeId, Port};

use crate::config::PassConfig;
use crate::context::RewriteContext;
use crate::layout::{layout_output_of, synthesize_layout_const};
use crate::rules::{ContextRule, MergeRule, RuleTable};

pub(crate) struct MergeOutcome {
    pub merged: usize,
    pub relabeled: usize,
}

pub(crate) fn run_merge_pass(
    graph: &mut Graph,
    table: &RuleTable,
    config: &PassConfig,
    ctx: &mut RewriteContext,
) -> Result<MergeOutcome, GraphError> {
    let order = topo_order(graph)?;
    let mut outcome = MergeOutcome {
        merged: 0,
        relabeled: 0,
    };
    for id in order {
        // Nodes consumed by an earlier merge leave a tombstone behind.
        let Some(node) = graph.node(id) else { continue };
        if node.device != config.cpu_device {
            continue;
        }
        let op = node.op.clone();
        if try_merge(graph, table, config, ctx, id, &op)? {
            outcome.merged += 1;
            continue;
        }
        if try_context_relabel(graph, table, config, id, &op) {
            outcome.relabeled += 1;
        }
    }
    Ok(outcome)
}

/// Attempt to merge `succ_id` (the consumer side of a merge pattern)
/// with its producer. Returns whether a merge happened.
fn try_merge(
    graph: &mut Graph,
    table: &RuleTable,
    config: &PassConfig,
    ctx: &mut RewriteContext,
    succ_id: NodeId,
    succ_op: &str,
) -> Result<bool, GraphError> {
    for rule in table.merges_for_successor(succ_op) {
        let Some(edge) = graph.in_edge(succ_id, rule.succ_slot) else {
            continue;
        };
        // The pattern requires the producer's primary output.
        if edge.src_port != Port::Data(0) {
            continue;
        }
        let pred_id = edge.src;
        if !merge_eligible(graph, config, rule, pred_id, succ_id) {
            continue;
        }
        log::debug!(
            "merging '{}' + '{}' into {}",
            rule.pred_op,
            rule.succ_op,
            rule.target_op
        );
        apply_merge(graph, config, ctx, rule, pred_id, succ_id)?;
        return Ok(true);
    }
    Ok(false)
}

fn merge_eligible(
    graph: &Graph,
    config: &PassConfig,
    rule: &MergeRule,
    pred_id: NodeId,
    succ_id: NodeId,
) -> bool {
    let (Some(pred), Some(succ)) = (graph.node(pred_id), graph.node(succ_id)) else {
        return false;
    };
    if pred.op != rule.pred_op || pred.device != config.cpu_device {
        return false;
    }
    let typed = |n: &Node| n.data_type().is_some_and(|dt| rule.types.contains(&dt));
    if !typed(pred) || !typed(succ) {
        return false;
    }
    // Fan-out from the producer (over any output, layout included)
    // would orphan a consumer of the removed node.
    if graph.data_out_degree(pred_id) != 1 {
        return false;
    }
    rule.match_attrs.iter().all(|key| match (pred.attr(key), succ.attr(key)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    })
}

fn apply_merge(
    graph: &mut Graph,
    config: &PassConfig,
    ctx: &mut RewriteContext,
    rule: &MergeRule,
    pred_id: NodeId,
    succ_id: NodeId,
) -> Result<(), GraphError> {
    let ordering = config.ordering;
    let (Some(pred), Some(succ)) = (
        graph.node(pred_id).cloned(),
        graph.node(succ_id).cloned(),
    ) else {
        return Ok(());
    };

    let pred_in = graph.in_data_edges(pred_id);
    let succ_in = graph.in_data_edges(succ_id);

    // Split the producer's inputs into data tensors and their layout
    // companions, per the active ordering.
    let (pred_data, pred_layout): (Vec<Edge>, Vec<Edge>) = if rule.pred_carries_layout {
        let n = pred_in.len() / 2;
        pred_in.iter().copied().partition(|e| {
            let slot = e.dst_port.slot().unwrap_or(0);
            (0..n).any(|i| ordering.data_input_slot(i, n, false) == slot)
        })
    } else {
        (pred_in.clone(), Vec::new())
    };

    // The consumer's inputs minus the tensor being fused away.
    let extra: Vec<Edge> = succ_in
        .iter()
        .filter(|e| e.dst_port != Port::Data(rule.succ_slot))
        .copied()
        .collect();

    // Resolve layout sources for the extra inputs before mutating.
    let extra_layout: Vec<Option<(NodeId, usize)>> = extra
        .iter()
        .map(|e| layout_output_of(graph, e, ordering))
        .collect();

    let mut control_in: Vec<NodeId> = graph
        .in_control_edges(pred_id)
        .iter()
        .chain(graph.in_control_edges(succ_id).iter())
        .map(|e| e.src)
        .filter(|&s| s != pred_id && s != succ_id)
        .collect();
    control_in.dedup();

    let succ_out = graph.out_edges(succ_id);
    let pred_control_out: Vec<NodeId> = graph
        .out_edges(pred_id)
        .iter()
        .filter(|e| e.is_control())
        .map(|e| e.dst)
        .collect();

    let fused_data: Vec<(NodeId, usize)> = pred_data
        .iter()
        .chain(extra.iter())
        .filter_map(|e| e.src_port.slot().map(|s| (e.src, s)))
        .collect();
    let pred_layout_srcs: Vec<(NodeId, usize)> = pred_layout
        .iter()
        .filter_map(|e| e.src_port.slot().map(|s| (e.src, s)))
        .collect();

    let device = succ.device.clone();
    let fused = Node {
        name: succ.name.clone(),
        op: rule.target_op.to_string(),
        attrs: pred.attrs.clone(),
        device: device.clone(),
        outputs: succ.outputs,
        layout_outputs: rule.pred_carries_layout,
    };

    graph.remove_node(pred_id);
    graph.remove_node(succ_id);
    let fused_id = graph.insert_node(fused)?;

    let n = fused_data.len();
    for (i, (src, slot)) in fused_data.iter().enumerate() {
        graph.add_edge(*src, *slot, fused_id, ordering.data_input_slot(i, n, false))?;
    }
    if rule.pred_carries_layout {
        let control_src = fused_data.first().map(|(src, _)| *src);
        let mut layouts = pred_layout_srcs;
        for maybe in extra_layout {
            let source = match maybe {
                Some(pair) => pair,
                None => {
                    let dummy = synthesize_layout_const(graph, ctx, &device, control_src)?;
                    (dummy, 0)
                }
            };
            layouts.push(source);
        }
        for (i, (src, slot)) in layouts.iter().enumerate() {
            graph.add_edge(*src, *slot, fused_id, ordering.layout_input_slot(i, n, false))?;
        }
    }

    for e in succ_out {
        match (e.src_port, e.dst_port) {
            (Port::Data(s), Port::Data(d)) => {
                graph.add_edge(fused_id, ordering.data_output_slot(s), e.dst, d)?;
            }
            _ => graph.add_control_edge(fused_id, e.dst)?,
        }
    }
    for dst in pred_control_out {
        graph.add_control_edge(fused_id, dst)?;
    }
    for src in control_in {
        graph.add_control_edge(src, fused_id)?;
    }
    Ok(())
}

/// Context rules: relabel `id` when its dataflow neighborhood matches.
/// Rules are tried in table order; the first fully matching rule ends
/// the search, whether or not it changes the op type.
fn try_context_relabel(
    graph: &mut Graph,
    table: &RuleTable,
    config: &PassConfig,
    id: NodeId,
    op: &str,
) -> bool {
    let Some(anchor) = graph.in_edge(id, 0) else {
        return false;
    };
    for rule in table.contexts_for(op) {
        let Some(context_id) = find_context(graph, anchor.src, rule.context_ops, config.context_depth)
        else {
            continue;
        };
        if !rule.filter_ops.is_empty() && !filter_consumer_matches(graph, &anchor, context_id, rule)
        {
            continue;
        }
        if rule.target_op != op {
            if let Some(node) = graph.node_mut(id) {
                log::debug!("relabeling '{}' as {}", node.name, rule.target_op);
                node.op = rule.target_op.to_string();
                return true;
            }
        }
        return false;
    }
    false
}

/// Breadth-first search backward over data inputs, bounded by
/// `max_depth` hops, for a node of one of the context op types.
fn find_context(
    graph: &Graph,
    start: NodeId,
    context_ops: &[&str],
    max_depth: usize,
) -> Option<NodeId> {
    let mut visited = BTreeSet::new();
    let mut frontier = VecDeque::new();
    visited.insert(start);
    frontier.push_back((start, 1usize));
    while let Some((id, depth)) = frontier.pop_front() {
        let Some(node) = graph.node(id) else { continue };
        if context_ops.contains(&node.op.as_str()) {
            return Some(id);
        }
        if depth >= max_depth {
            continue;
        }
        for e in graph.in_data_edges(id) {
            if visited.insert(e.src) {
                frontier.push_back((e.src, depth + 1));
            }
        }
    }
    None
}

/// The filter condition of the convolution context rule: some consumer
/// of the anchored tensor, of a filter-gradient type, must read it at
/// the rule's slot and share its input 0 with the context node.
fn filter_consumer_matches(
    graph: &Graph,
    anchor: &Edge,
    context_id: NodeId,
    rule: &ContextRule,
) -> bool {
    let Some(context_in0) = graph.in_edge(context_id, 0) else {
        return false;
    };
    let Some(anchor_slot) = anchor.src_port.slot() else {
        return false;
    };
    graph
        .consumers(anchor.src, anchor_slot)
        .iter()
        .any(|consumer| {
            if consumer.dst_port != Port::Data(rule.filter_slot) {
                return false;
            }
            let Some(node) = graph.node(consumer.dst) else {
                return false;
            };
            if !rule.filter_ops.contains(&node.op.as_str()) {
                return false;
            }
            graph.in_edge(consumer.dst, 0).is_some_and(|e| {
                e.src == context_in0.src && e.src_port == context_in0.src_port
            })
        })
}
