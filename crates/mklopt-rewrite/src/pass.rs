//! Pass driver.

use mklopt_graph::{Graph, GraphError};

use crate::config::PassConfig;
use crate::context::RewriteContext;
use crate::rules::RuleTable;
use crate::{merge, rewrite, workspace};

/// Counts of what one pass invocation changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RewriteStats {
    /// Adjacent pairs fused into compound nodes.
    pub nodes_merged: usize,
    /// Nodes relabeled by a context rule.
    pub nodes_relabeled: usize,
    /// Nodes replaced by their optimized variant.
    pub nodes_rewritten: usize,
    /// Workspace edges wired between forward/backward pairs.
    pub workspace_paired: usize,
    /// Backward ops that received dummy workspace inputs.
    pub workspace_unpaired: usize,
    /// Layout-metadata constants synthesized.
    pub layout_consts: usize,
}

impl RewriteStats {
    pub fn changed(&self) -> bool {
        self.nodes_merged != 0
            || self.nodes_relabeled != 0
            || self.nodes_rewritten != 0
            || self.workspace_paired != 0
            || self.workspace_unpaired != 0
    }
}

/// Run the layout rewrite pass over `graph`, in place.
///
/// Sub-passes execute in a fixed order — merge, rewrite, workspace
/// insertion — each traversing a deterministic topological snapshot of
/// the node set. Ineligible candidates are skipped silently; the only
/// error condition is a malformed graph (a contract violation of the
/// construction step, not a property of this pass).
pub fn run_layout_pass(
    graph: &mut Graph,
    config: &PassConfig,
) -> Result<RewriteStats, GraphError> {
    let table = RuleTable::global();
    let mut ctx = RewriteContext::new();

    let merged = merge::run_merge_pass(graph, table, config, &mut ctx)?;
    let rewritten = rewrite::run_rewrite_pass(graph, table, config, &mut ctx)?;
    let ws = workspace::run_workspace_pass(graph, table, config, &mut ctx)?;

    let stats = RewriteStats {
        nodes_merged: merged.merged,
        nodes_relabeled: merged.relabeled,
        nodes_rewritten: rewritten,
        workspace_paired: ws.paired,
        workspace_unpaired: ws.unpaired,
        layout_consts: ctx.created(),
    };
    log::debug!(
        "layout pass done: {} merged, {} relabeled, {} rewritten, {}+{} workspace, {} layout consts",
        stats.nodes_merged,
        stats.nodes_relabeled,
        stats.nodes_rewritten,
        stats.workspace_paired,
        stats.workspace_unpaired,
        stats.layout_consts
    );
    Ok(stats)
}
