//! Graph orchestrator.
//!
//! [`Graph`] orders all nodes reachable from root, evaluates them from leaves
//! to root and accumulates gradients of root from root to leaves.

use crate::{
    context::Context,
    error::RevadError,
    node::{get_node, NodeId},
    tensor::Tensor,
};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Graph
///
/// Gradient of every node is the gradient of root, with it's elements summed,
/// with respect to that node.
///
/// Ordering is cached. Node structure can not change after construction,
/// but if root is changed with [`set_root`](Graph::set_root), graph is recompiled.
#[derive(Debug, Clone)]
pub struct Graph {
    root: NodeId,
    ordering: Vec<NodeId>,
    gradients: BTreeMap<NodeId, Tensor>,
}

impl Graph {
    /// Create graph over root and compile it,
    /// that is create topological ordering of root and all it's descendants.
    /// # Errors
    /// Returns [`RevadError::UnknownNode`] if root is not in context.
    pub fn new(ctx: &Context, root: impl Into<NodeId>) -> Result<Graph, RevadError> {
        let mut graph = Graph { root: root.into(), ordering: Vec::new(), gradients: BTreeMap::new() };
        graph.compile(ctx)?;
        Ok(graph)
    }

    /// Recompile the graph, creating new topological ordering from root.
    /// # Errors
    /// Returns [`RevadError::UnknownNode`] if some node of the graph is not in context,
    /// which happens when graph was built in another context.
    pub fn compile(&mut self, ctx: &Context) -> Result<(), RevadError> {
        self.ordering = topological_ordering(ctx, self.root)?;
        if ctx.config().debug_order() {
            log::debug!("Ordering of {}: {:?}", self.root, self.ordering);
        }
        Ok(())
    }

    /// Change root and recompile
    /// # Errors
    /// Returns [`RevadError::UnknownNode`] if root is not in context.
    pub fn set_root(&mut self, ctx: &Context, root: impl Into<NodeId>) -> Result<(), RevadError> {
        *self = Graph::new(ctx, root)?;
        Ok(())
    }

    /// Root node
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// All nodes reachable from root, root first. Every node is placed
    /// before all nodes it depends on.
    #[must_use]
    pub fn ordering(&self) -> &[NodeId] {
        &self.ordering
    }

    /// Calculate values of root and all it's descendants,
    /// looping from leaves to root.
    /// # Errors
    /// Returns [`RevadError::ShapeMismatch`] if elementwise function returns tensor
    /// of wrong shape and [`RevadError::UnknownNode`] if ctx is not the context of this graph.
    pub fn calc_values(&self, ctx: &Context) -> Result<(), RevadError> {
        for &nid in self.ordering.iter().rev() {
            ctx.calc_value(nid)?;
            if ctx.config().debug_eval() {
                if let Some(value) = ctx.value(nid) {
                    log::debug!("Value of {nid}:\n{value}");
                }
            }
        }
        Ok(())
    }

    /// Calculate values and then gradients of all nodes,
    /// looping from root to leaves.
    /// # Errors
    /// Returns error if values could not be calculated.
    pub fn calc_gradients(&mut self, ctx: &Context) -> Result<&BTreeMap<NodeId, Tensor>, RevadError> {
        self.calc_values(ctx)?;
        self.gradients.clear();
        let root_value = ctx.value(self.root).ok_or(RevadError::MissingValue(self.root))?;
        self.gradients.insert(self.root, root_value.ones_like());
        for &nid in &self.ordering {
            // All parents of nid were already visited, so it's gradient is complete
            let Some(grad) = self.gradients.get(&nid) else {
                continue;
            };
            if ctx.config().debug_grad() {
                log::debug!("Gradient of {nid}:\n{grad}");
            }
            for (child, contribution) in ctx.child_gradients(nid, grad)? {
                match self.gradients.entry(child) {
                    std::collections::btree_map::Entry::Vacant(e) => {
                        let mut zeros = ctx.value(child).ok_or(RevadError::MissingValue(child))?.zeros_like();
                        zeros.accumulate(&contribution)?;
                        e.insert(zeros);
                    }
                    std::collections::btree_map::Entry::Occupied(mut e) => {
                        e.get_mut().accumulate(&contribution)?;
                    }
                }
            }
        }
        Ok(&self.gradients)
    }

    /// Gradient of root with respect to node, available after
    /// [`calc_gradients`](Graph::calc_gradients).
    #[must_use]
    pub fn gradient(&self, x: impl Into<NodeId>) -> Option<&Tensor> {
        self.gradients.get(&x.into())
    }

    /// All gradients from last call to [`calc_gradients`](Graph::calc_gradients)
    #[must_use]
    pub fn gradients(&self) -> &BTreeMap<NodeId, Tensor> {
        &self.gradients
    }

    /// Plot graph in dot format
    #[must_use]
    pub fn plot_dot_graph(&self, ctx: &Context) -> String {
        use core::fmt::Write;
        let dot = &ctx.config().dot;
        let mut res = String::from("digraph {\n  ordering=in\n");
        if !dot.top_to_bottom {
            res += "  rankdir=LR\n";
        }
        for (i, &nid) in self.ordering.iter().enumerate() {
            let Some(op) = ctx.op(nid) else { continue };
            let shape = ctx.shape(nid).unwrap_or_else(crate::shape::Shape::scalar);
            let (node_shape, fillcolor) = match (op.is_leaf(), nid == self.root) {
                (true, _) => ("box", "aqua"),
                (false, true) => ("oval", "coral"),
                (false, false) => ("oval", "white"),
            };
            let name = op.name().replace('\\', "\\\\").replace('"', "\\\"");
            let mut label = format!("{name}; {i}\\n{nid}: {shape}");
            if dot.show_values {
                if let Some(value) = ctx.value(nid) {
                    let value = format!("{value:.3}").replace('\n', "\\n");
                    let _ = write!(label, "\\n{value}");
                }
            }
            let _ = writeln!(
                res,
                "  {nid}[label=\"{label}\", shape={node_shape}, fillcolor=\"{fillcolor}\", style=filled]"
            );
            // Not strict, x*x has two edges
            for child in op.children() {
                let _ = writeln!(res, "  {nid} -> {child}");
            }
        }
        res + "}\n"
    }

    /// Write dot graph into file
    /// # Errors
    /// Returns [`RevadError::IOError`] if file could not be written.
    pub fn write_dot(&self, ctx: &Context, path: impl AsRef<Path>) -> Result<(), RevadError> {
        std::fs::write(path, self.plot_dot_graph(ctx))?;
        Ok(())
    }
}

/// Kahn's algorithm from root to leaves. Graph can have multiple edges
/// between the same nodes, but only unique edges are considered,
/// which does not change dependencies. Parents that are not reachable
/// from root are not part of this graph and are not waited for.
fn topological_ordering(ctx: &Context, root: NodeId) -> Result<Vec<NodeId>, RevadError> {
    let nodes = ctx.nodes();
    let mut reachable = BTreeSet::new();
    let mut params = vec![root];
    while let Some(nid) = params.pop() {
        if reachable.insert(nid) {
            params.extend(get_node(&nodes, nid)?.op.children());
        }
    }
    let mut ordering = Vec::with_capacity(reachable.len());
    let mut removed_edges: BTreeMap<NodeId, BTreeSet<NodeId>> = BTreeMap::new();
    let mut stack = vec![root];
    while let Some(nid) = stack.pop() {
        ordering.push(nid);
        let children: BTreeSet<NodeId> = get_node(&nodes, nid)?.op.children().collect();
        for child in children {
            let removed = removed_edges.entry(child).or_default();
            removed.insert(nid);
            let parents: BTreeSet<&NodeId> =
                get_node(&nodes, child)?.parents.iter().filter(|p| reachable.contains(*p)).collect();
            if removed.len() == parents.len() {
                stack.push(child);
            }
        }
    }
    Ok(ordering)
}
