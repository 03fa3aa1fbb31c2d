//! The instance hierarchy of a circuit, as a directed graph over modules.

use petgraph::algo;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use ripple_ir::{Circuit, IndexRef, ModuleId, OpId, OpKind};
use ripple_utils::{Error, RippleResult};

/// A directed graph with one node per module and one edge per instance
/// operation, pointing from the instantiating module to the instantiated
/// one. Instances of modules that do not exist in the circuit are ignored.
pub struct InstanceGraph {
    graph: DiGraph<ModuleId, OpId>,
    /// Node handle for each module, indexed by [ModuleId].
    nodes: Vec<NodeIndex>,
}

impl InstanceGraph {
    /// Build the instance graph. Fails when the hierarchy is cyclic, since
    /// every hierarchy traversal would diverge on it.
    pub fn new(circuit: &Circuit) -> RippleResult<Self> {
        let mut graph = DiGraph::new();
        let nodes: Vec<NodeIndex> =
            circuit.module_ids().map(|m| graph.add_node(m)).collect();
        for (id, module) in circuit.modules() {
            if module.ext {
                continue;
            }
            for op_id in module.body() {
                let OpKind::Instance { module: callee } =
                    &module.op(*op_id).kind
                else {
                    continue;
                };
                if let Some(callee_id) = circuit.find_module(*callee) {
                    graph.add_edge(
                        nodes[id.index()],
                        nodes[callee_id.index()],
                        *op_id,
                    );
                }
            }
        }
        if algo::is_cyclic_directed(&graph) {
            return Err(Error::malformed_structure(
                "instance graph contains a cycle",
            ));
        }
        Ok(Self { graph, nodes })
    }

    /// The instances inside `module`, as `(instance op, instantiated
    /// module)` pairs in deterministic (operation creation) order.
    pub fn instances_of(&self, module: ModuleId) -> Vec<(OpId, ModuleId)> {
        let mut edges: Vec<_> = self
            .graph
            .edges(self.nodes[module.index()])
            .map(|e| (*e.weight(), self.graph[e.target()]))
            .collect();
        edges.sort_by_key(|(op, _)| *op);
        edges
    }
}
