//! The mandatory transformations, applied in order. Each pass reports
//! through the shared diagnostic sink.

use std::collections::HashMap;

use petgraph::{graph::DiGraph, graph::NodeIndex, visit::DfsPostOrder};

use vela_shared::diag::DiagnosticSink;

use crate::{
    module::{Function, Module},
    operand::{BlockId, FunctionId},
};

pub mod close_borrows;
pub mod dead_code;
pub mod exclusivity;
pub mod normalize_states;
pub mod reify_accesses;

/// Run the semantic passes a lowered function must go through: dead-code
/// removal, access reification, borrow closing, object-state normalization,
/// and exclusivity enforcement.
pub fn run_mandatory_passes(
    module: &mut Module,
    function: FunctionId,
    diagnostics: &mut DiagnosticSink,
) {
    log::debug!(
        "[run_mandatory_passes] {}",
        module.function(function).name
    );
    dead_code::run(module, function, diagnostics);
    reify_accesses::run(module, function, diagnostics);
    close_borrows::run(module, function, diagnostics);
    normalize_states::run(module, function, diagnostics);
    exclusivity::run(module, function, diagnostics);
}

pub(crate) struct ControlFlow {
    graph: DiGraph<BlockId, ()>,
    nodes: HashMap<BlockId, NodeIndex>,
}

impl ControlFlow {
    pub(crate) fn of(function: &Function) -> ControlFlow {
        let mut graph = DiGraph::new();
        let mut nodes = HashMap::new();
        for block in function.block_ids() {
            nodes.insert(block, graph.add_node(block));
        }
        for block in function.block_ids() {
            for successor in function.successors(block) {
                graph.add_edge(nodes[&block], nodes[&successor], ());
            }
        }
        ControlFlow { graph, nodes }
    }

    pub(crate) fn predecessors(&self, block: BlockId) -> Vec<BlockId> {
        self.graph
            .neighbors_directed(self.nodes[&block], petgraph::Direction::Incoming)
            .map(|n| self.graph[n])
            .collect()
    }

    /// Blocks in reverse postorder from the entry.
    pub(crate) fn reverse_postorder(&self, entry: BlockId) -> Vec<BlockId> {
        let mut order = vec![];
        let mut dfs = DfsPostOrder::new(&self.graph, self.nodes[&entry]);
        while let Some(n) = dfs.next(&self.graph) {
            order.push(self.graph[n]);
        }
        order.reverse();
        order
    }

    /// Blocks reachable from `from`, excluding `from` itself unless it is
    /// on a cycle.
    pub(crate) fn reachable_from(&self, from: BlockId) -> Vec<BlockId> {
        let mut seen = vec![];
        let mut work = self
            .graph
            .neighbors(self.nodes[&from])
            .collect::<Vec<_>>();
        while let Some(n) = work.pop() {
            let block = self.graph[n];
            if seen.contains(&block) {
                continue;
            }
            seen.push(block);
            work.extend(self.graph.neighbors(n));
        }
        seen
    }
}
