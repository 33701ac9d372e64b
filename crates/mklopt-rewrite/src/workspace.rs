//! Workspace insertion engine.
//!
//! Certain forward/backward operator pairs share hardware scratch
//! state. After both sides have been rewritten, this engine threads
//! the forward op's workspace output (and its layout companion) into
//! the backward op's reserved workspace slots. A backward op whose
//! matching forward is absent gets degenerate constants instead; a
//! forward op with no matching backward just keeps its unused
//! workspace output. Every outcome leaves a structurally valid graph.

use mklopt_graph::{topo_order, Graph, GraphError, Port};

use crate::config::PassConfig;
use crate::context::RewriteContext;
use crate::layout::synthesize_layout_const;
use crate::rules::RuleTable;

#[derive(Debug, Default)]
pub(crate) struct WorkspaceOutcome {
    pub paired: usize,
    pub unpaired: usize,
}

pub(crate) fn run_workspace_pass(
    graph: &mut Graph,
    table: &RuleTable,
    config: &PassConfig,
    ctx: &mut RewriteContext,
) -> Result<WorkspaceOutcome, GraphError> {
    let ordering = config.ordering;
    let order = topo_order(graph)?;
    let mut outcome = WorkspaceOutcome::default();

    for id in order {
        let Some(node) = graph.node(id) else { continue };
        let Some(rule) = table.workspace_for_backward(&node.op) else {
            continue;
        };
        if node.device != config.cpu_device {
            continue;
        }
        let device = node.device.clone();

        // The rewritten backward node carries n data inputs and n
        // layout inputs around the two reserved workspace slots.
        let n = graph.in_data_edges(id).len() / 2;
        let ws_slot = ordering.workspace_input_slot(n);
        let ws_layout_slot = ordering.workspace_layout_input_slot(n);
        if graph.in_edge(id, ws_slot).is_some() {
            continue;
        }

        let pairing_slot = ordering.data_input_slot(rule.bwd_slot, n, true);
        let forward = graph.in_edge(id, pairing_slot).and_then(|e| {
            let producer = graph.node(e.src)?;
            let primary = Port::Data(ordering.data_output_slot(0));
            (producer.op == rule.mkl_fwd_op && e.src_port == primary)
                .then_some((e.src, producer.outputs))
        });

        match forward {
            Some((fwd_id, fwd_outputs)) => {
                // The workspace is the forward op's trailing data output.
                let ws_out = fwd_outputs - 1;
                graph.add_edge(fwd_id, ordering.data_output_slot(ws_out), id, ws_slot)?;
                graph.add_edge(
                    fwd_id,
                    ordering.layout_output_slot(ws_out, fwd_outputs),
                    id,
                    ws_layout_slot,
                )?;
                outcome.paired += 1;
                log::debug!("workspace edge wired for '{}'", rule.mkl_bwd_op);
            }
            None => {
                let control_src = graph
                    .in_edge(id, ordering.data_input_slot(0, n, true))
                    .map(|e| e.src);
                let ws = synthesize_layout_const(graph, ctx, &device, control_src)?;
                graph.add_edge(ws, 0, id, ws_slot)?;
                let ws_layout = synthesize_layout_const(graph, ctx, &device, control_src)?;
                graph.add_edge(ws_layout, 0, id, ws_layout_slot)?;
                outcome.unpaired += 1;
                log::debug!("dummy workspace synthesized for '{}'", rule.mkl_bwd_op);
            }
        }
    }
    Ok(outcome)
}
