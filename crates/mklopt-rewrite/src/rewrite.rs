//! Node rewrite engine.
//!
//! Replaces each eligible node with its optimized variant, pairing
//! every data input with a layout-metadata input. The layout input is
//! taken from the producer when that producer already exposes layout
//! outputs; otherwise a degenerate constant is synthesized, scheduled
//! after the node's first input by a control edge.
//!
//! Workspace-backward ops get their data and layout inputs placed
//! around reserved workspace slots, which the workspace engine fills
//! in the following sub-pass.

use mklopt_graph::{topo_order, Graph, GraphError, Node, NodeId, Port};

use crate::config::PassConfig;
use crate::context::RewriteContext;
use crate::layout::{layout_output_of, synthesize_layout_const};
use crate::rules::{RewriteRule, RuleTable, WorkspaceRole};

pub(crate) fn run_rewrite_pass(
    graph: &mut Graph,
    table: &RuleTable,
    config: &PassConfig,
    ctx: &mut RewriteContext,
) -> Result<usize, GraphError> {
    let order = topo_order(graph)?;
    let mut rewritten = 0;
    for id in order {
        let Some(node) = graph.node(id) else { continue };
        if node.device != config.cpu_device {
            continue;
        }
        let Some(rule) = table.rewrite_for(&node.op) else {
            continue;
        };
        if !rule.supports(node) {
            continue;
        }
        // A node participating in control flow only is not a rewrite
        // target; there is no tensor to pair a layout input with.
        if graph.in_data_edges(id).is_empty() {
            continue;
        }
        rewrite_node(graph, config, ctx, id, rule)?;
        rewritten += 1;
    }
    Ok(rewritten)
}

fn rewrite_node(
    graph: &mut Graph,
    config: &PassConfig,
    ctx: &mut RewriteContext,
    id: NodeId,
    rule: &RewriteRule,
) -> Result<(), GraphError> {
    let ordering = config.ordering;
    let Some(old) = graph.node(id).cloned() else {
        return Ok(());
    };
    log::debug!("rewriting '{}' ({} -> {})", old.name, old.op, rule.to);

    let data_in = graph.in_data_edges(id);
    let n = data_in.len();
    let reserves_workspace = matches!(rule.workspace, Some(WorkspaceRole::Backward { .. }));
    let grows_workspace = matches!(rule.workspace, Some(WorkspaceRole::Forward));

    // Resolve all layout sources against the pre-rewrite graph.
    let layout_srcs: Vec<Option<(NodeId, usize)>> = data_in
        .iter()
        .map(|e| layout_output_of(graph, e, ordering))
        .collect();
    let control_src = data_in.first().map(|e| e.src);
    let control_in: Vec<NodeId> = graph
        .in_control_edges(id)
        .iter()
        .map(|e| e.src)
        .collect();
    let out_edges = graph.out_edges(id);

    let device = old.device.clone();
    graph.remove_node(id);
    let new_id = graph.insert_node(Node {
        name: old.name,
        op: rule.to.to_string(),
        attrs: old.attrs,
        device: device.clone(),
        outputs: old.outputs + usize::from(grows_workspace),
        layout_outputs: true,
    })?;

    for (i, e) in data_in.iter().enumerate() {
        let Some(src_slot) = e.src_port.slot() else {
            continue;
        };
        graph.add_edge(
            e.src,
            src_slot,
            new_id,
            ordering.data_input_slot(i, n, reserves_workspace),
        )?;
    }
    for (i, source) in layout_srcs.into_iter().enumerate() {
        let (src, src_slot) = match source {
            Some(pair) => pair,
            None => {
                let dummy = synthesize_layout_const(graph, ctx, &device, control_src)?;
                (dummy, 0)
            }
        };
        graph.add_edge(
            src,
            src_slot,
            new_id,
            ordering.layout_input_slot(i, n, reserves_workspace),
        )?;
    }

    for e in out_edges {
        match (e.src_port, e.dst_port) {
            (Port::Data(s), Port::Data(d)) => {
                graph.add_edge(new_id, ordering.data_output_slot(s), e.dst, d)?;
            }
            _ => graph.add_control_edge(new_id, e.dst)?,
        }
    }
    for src in control_in {
        graph.add_control_edge(src, new_id)?;
    }
    Ok(())
}
