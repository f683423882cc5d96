//! # Context
//!
//! Context owns every node. Nodes refer to their children and parents
//! by [`NodeId`], so there are no reference cycles and no node is ever
//! removed while context lives.

use crate::{
    config::Config,
    error::RevadError,
    expr::Expr,
    node::{get_node, ElemFunc, Node, NodeId, Op},
    shape::{Shape, ShapeKind},
    tensor::Tensor,
};
use std::cell::{Ref, RefCell};

/// Kind of leaf node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafKind {
    /// Value can be substituted later with [`Context::set_value`]
    Variable,
    /// Value is fixed
    Constant,
}

/// # Context
///
/// Arena of nodes. Node constructors validate shapes of their operands
/// and return [`Expr`] handles, which can be further combined with operators.
pub struct Context {
    nodes: RefCell<Vec<Node>>,
    config: Config,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for Context {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for (i, node) in self.nodes.borrow().iter().enumerate() {
            f.write_fmt(format_args!("{i}: {:?} -> {}\n", node.op, node.shape))?;
        }
        Ok(())
    }
}

impl Context {
    /// Create new context with configuration loaded from config directories
    /// and environment, see [`Config::load`].
    #[must_use]
    pub fn new() -> Context {
        Context::with_config(Config::load())
    }

    /// Create new context with given configuration
    #[must_use]
    pub fn with_config(config: Config) -> Context {
        Context { nodes: RefCell::new(Vec::new()), config }
    }

    /// Configuration of this context
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of nodes in context
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    /// Are there no nodes?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.borrow().is_empty()
    }

    pub(crate) fn nodes(&self) -> Ref<'_, Vec<Node>> {
        self.nodes.borrow()
    }

    fn push(&self, op: Op, shape: Shape, value: Option<Tensor>) -> Expr<'_> {
        let mut nodes = self.nodes.borrow_mut();
        let id = NodeId::new(nodes.len());
        for child in op.children() {
            nodes[child.i()].parents.push(id);
        }
        nodes.push(Node { op, parents: Vec::new(), shape, value });
        Expr::new(id, self)
    }

    #[track_caller]
    fn shape_of(&self, x: NodeId) -> Result<Shape, RevadError> {
        self.nodes.borrow().get(x.i()).map(|node| node.shape.clone()).ok_or(RevadError::UnknownNode(x))
    }

    /// Create leaf node. Value, if given, must contain batch dimension.
    /// If only shape is given, value is zeros with batch of size 1.
    /// # Errors
    /// Returns [`RevadError::UnspecifiedNode`] if neither value nor shape is given
    /// and [`RevadError::ShapeMismatch`] if value does not have shape `(batch, *shape)`.
    #[track_caller]
    pub fn leaf(&self, kind: LeafKind, value: Option<Tensor>, shape: Option<Shape>) -> Result<Expr<'_>, RevadError> {
        let (value, shape) = match (value, shape) {
            (None, None) => return Err(RevadError::UnspecifiedNode),
            (None, Some(shape)) => (Tensor::zeros(shape.batched(1)), shape),
            (Some(value), shape) => {
                let Some(sample) = value.shape().unbatched() else {
                    return Err(RevadError::shape_mismatch(format!(
                        "leaf value {} does not have batch dimension",
                        value.shape()
                    )));
                };
                if let Some(shape) = shape.filter(|shape| *shape != sample) {
                    return Err(RevadError::shape_mismatch(format!(
                        "value and shape are incompatible, value shape is {}, but node shape is {shape}",
                        value.shape()
                    )));
                }
                (value, sample)
            }
        };
        let op = match kind {
            LeafKind::Variable => Op::Variable,
            LeafKind::Constant => Op::Constant,
        };
        Ok(self.push(op, shape, Some(value)))
    }

    /// Create variable from single unbatched value, batch dimension of size 1 is added.
    pub fn variable(&self, value: impl Into<Tensor>) -> Expr<'_> {
        let value: Tensor = value.into();
        let shape = value.shape().clone();
        self.push(Op::Variable, shape, Some(value.unsqueeze_batch()))
    }

    /// Create constant from single unbatched value, batch dimension of size 1 is added.
    pub fn constant(&self, value: impl Into<Tensor>) -> Expr<'_> {
        let value: Tensor = value.into();
        let shape = value.shape().clone();
        self.push(Op::Constant, shape, Some(value.unsqueeze_batch()))
    }

    /// Create variable from value whose first dimension is batch.
    /// # Errors
    /// Returns [`RevadError::ShapeMismatch`] if value has rank 0.
    #[track_caller]
    pub fn batched_variable(&self, value: Tensor) -> Result<Expr<'_>, RevadError> {
        self.leaf(LeafKind::Variable, Some(value), None)
    }

    /// Create constant from value whose first dimension is batch.
    /// # Errors
    /// Returns [`RevadError::ShapeMismatch`] if value has rank 0.
    #[track_caller]
    pub fn batched_constant(&self, value: Tensor) -> Result<Expr<'_>, RevadError> {
        self.leaf(LeafKind::Constant, Some(value), None)
    }

    /// Elementwise addition
    /// # Errors
    /// Returns [`RevadError::ShapeMismatch`] if shapes of x and y are not equal.
    #[track_caller]
    pub fn elem_add(&self, x: impl Into<NodeId>, y: impl Into<NodeId>) -> Result<Expr<'_>, RevadError> {
        let (x, y) = (x.into(), y.into());
        let (xs, ys) = (self.shape_of(x)?, self.shape_of(y)?);
        if xs != ys {
            return Err(RevadError::shape_mismatch(format!(
                "elementwise addition only applies to nodes of the same shape, got {xs} and {ys}"
            )));
        }
        Ok(self.push(Op::ElemAdd(x, y), xs, None))
    }

    /// Elementwise multiplication
    /// # Errors
    /// Returns [`RevadError::ShapeMismatch`] if shapes of x and y are not equal.
    #[track_caller]
    pub fn elem_mul(&self, x: impl Into<NodeId>, y: impl Into<NodeId>) -> Result<Expr<'_>, RevadError> {
        let (x, y) = (x.into(), y.into());
        let (xs, ys) = (self.shape_of(x)?, self.shape_of(y)?);
        if xs != ys {
            return Err(RevadError::shape_mismatch(format!(
                "elementwise multiplication only applies to nodes of the same shape, got {xs} and {ys}"
            )));
        }
        Ok(self.push(Op::ElemMultiply(x, y), xs, None))
    }

    /// Scalar times tensor
    /// # Errors
    /// Returns [`RevadError::ShapeMismatch`] if scalar has more than one element.
    #[track_caller]
    pub fn scalar_mul(&self, scalar: impl Into<NodeId>, x: impl Into<NodeId>) -> Result<Expr<'_>, RevadError> {
        let (scalar, x) = (scalar.into(), x.into());
        let (ss, xs) = (self.shape_of(scalar)?, self.shape_of(x)?);
        if ss.kind() != ShapeKind::Scalar {
            return Err(RevadError::shape_mismatch(format!("node with shape {ss} is not a scalar")));
        }
        Ok(self.push(Op::ScalarMultiply(scalar, x), xs, None))
    }

    /// Matrix times vector
    /// # Errors
    /// Returns [`RevadError::ShapeMismatch`] if matrix is not rank 2, vector is not rank 1
    /// or their inner dimensions differ.
    #[track_caller]
    pub fn matvec(&self, matrix: impl Into<NodeId>, vector: impl Into<NodeId>) -> Result<Expr<'_>, RevadError> {
        let (matrix, vector) = (matrix.into(), vector.into());
        let (ms, vs) = (self.shape_of(matrix)?, self.shape_of(vector)?);
        match (ms.dims(), vs.dims()) {
            (&[rows, cols], &[n]) if cols == n => Ok(self.push(Op::MatVecMultiply(matrix, vector), rows.into(), None)),
            _ => Err(RevadError::shape_mismatch(format!("can not multiply matrix and vector of shapes {ms}, {vs}"))),
        }
    }

    /// Elementwise negation
    /// # Errors
    /// Returns [`RevadError::UnknownNode`] if x is not in this context.
    #[track_caller]
    pub fn negate(&self, x: impl Into<NodeId>) -> Result<Expr<'_>, RevadError> {
        let x = x.into();
        let shape = self.shape_of(x)?;
        Ok(self.push(Op::Negate(x), shape, None))
    }

    /// Elementwise function
    /// # Errors
    /// Returns [`RevadError::UnknownNode`] if x is not in this context.
    #[track_caller]
    pub fn elem_func(&self, x: impl Into<NodeId>, func: ElemFunc) -> Result<Expr<'_>, RevadError> {
        let x = x.into();
        let shape = self.shape_of(x)?;
        Ok(self.push(Op::ElemFunc(x, func), shape, None))
    }

    /// Addition, same as [`elem_add`](Context::elem_add)
    /// # Errors
    /// Returns [`RevadError::ShapeMismatch`] if shapes of x and y are not equal.
    #[track_caller]
    pub fn add(&self, x: impl Into<NodeId>, y: impl Into<NodeId>) -> Result<Expr<'_>, RevadError> {
        self.elem_add(x, y)
    }

    /// Subtraction, x + (-y)
    /// # Errors
    /// Returns [`RevadError::ShapeMismatch`] if shapes of x and y are not equal.
    #[track_caller]
    pub fn sub(&self, x: impl Into<NodeId>, y: impl Into<NodeId>) -> Result<Expr<'_>, RevadError> {
        let (x, y) = (x.into(), y.into());
        let (xs, ys) = (self.shape_of(x)?, self.shape_of(y)?);
        if xs != ys {
            return Err(RevadError::shape_mismatch(format!(
                "subtraction only applies to nodes of the same shape, got {xs} and {ys}"
            )));
        }
        let neg = self.negate(y)?;
        self.elem_add(x, neg)
    }

    /// Multiplication. Variant is chosen by shapes of operands:
    /// equal shapes multiply elementwise, scalar operand scales the other one
    /// and matrix times vector is matrix vector product.
    /// # Errors
    /// Returns [`RevadError::ShapeMismatch`] if matrix and vector inner dimensions differ
    /// and [`RevadError::UnsupportedOperation`] if there is no multiplication for these shapes.
    #[track_caller]
    pub fn mul(&self, x: impl Into<NodeId>, y: impl Into<NodeId>) -> Result<Expr<'_>, RevadError> {
        let (x, y) = (x.into(), y.into());
        let (xs, ys) = (self.shape_of(x)?, self.shape_of(y)?);
        if xs == ys {
            return self.elem_mul(x, y);
        }
        match (xs.kind(), ys.kind()) {
            (ShapeKind::Scalar, _) => self.scalar_mul(x, y),
            (_, ShapeKind::Scalar) => self.scalar_mul(y, x),
            (ShapeKind::Matrix(..), ShapeKind::Vector(..)) => self.matvec(x, y),
            _ => Err(RevadError::unsupported(format!("no multiplication for shapes {xs} and {ys}"))),
        }
    }

    /// Substitute new unbatched value into variable. Batch dimension of size 1 is added.
    /// # Errors
    /// Returns [`RevadError::ShapeMismatch`] if value does not have shape of the node
    /// and [`RevadError::UnsupportedOperation`] if node is not a variable.
    #[track_caller]
    pub fn set_value(&self, x: impl Into<NodeId>, value: impl Into<Tensor>) -> Result<(), RevadError> {
        self.set_batched_value(x, value.into().unsqueeze_batch())
    }

    /// Substitute new value, whose first dimension is batch, into variable.
    /// # Errors
    /// Returns [`RevadError::ShapeMismatch`] if value does not have shape `(batch, *shape)`
    /// and [`RevadError::UnsupportedOperation`] if node is not a variable.
    #[track_caller]
    pub fn set_batched_value(&self, x: impl Into<NodeId>, value: Tensor) -> Result<(), RevadError> {
        let x = x.into();
        let mut nodes = self.nodes.borrow_mut();
        let node = nodes.get_mut(x.i()).ok_or(RevadError::UnknownNode(x))?;
        if !matches!(node.op, Op::Variable) {
            return Err(RevadError::unsupported(format!(
                "only variables can be assigned, node {x} is {}",
                node.op.name()
            )));
        }
        node.set_value(value)
    }

    /// Current value of node, None if it was not evaluated yet
    #[must_use]
    pub fn value(&self, x: impl Into<NodeId>) -> Option<Tensor> {
        self.nodes.borrow().get(x.into().i()).and_then(|node| node.value.clone())
    }

    /// Shape of node without batch dimension
    #[must_use]
    pub fn shape(&self, x: impl Into<NodeId>) -> Option<Shape> {
        self.shape_of(x.into()).ok()
    }

    /// Operation of node
    #[must_use]
    pub fn op(&self, x: impl Into<NodeId>) -> Option<Op> {
        self.nodes.borrow().get(x.into().i()).map(|node| node.op.clone())
    }

    /// Children of node in order, with repetitions
    #[must_use]
    pub fn children(&self, x: impl Into<NodeId>) -> Vec<NodeId> {
        self.nodes.borrow().get(x.into().i()).map(|node| node.op.children().collect()).unwrap_or_default()
    }

    /// Parents of node, one entry per edge
    #[must_use]
    pub fn parents(&self, x: impl Into<NodeId>) -> Vec<NodeId> {
        self.nodes.borrow().get(x.into().i()).map(|node| node.parents.clone()).unwrap_or_default()
    }

    /// Recalculate value of node from values of it's children
    pub(crate) fn calc_value(&self, x: NodeId) -> Result<(), RevadError> {
        let mut nodes = self.nodes.borrow_mut();
        let value = get_node(&nodes, x)?.op.calc_value(&nodes)?;
        if let (Some(value), Some(node)) = (value, nodes.get_mut(x.i())) {
            node.set_value(value)?;
        }
        Ok(())
    }

    /// Gradient contributions of children of x, paired with those children
    pub(crate) fn child_gradients(&self, x: NodeId, gradient: &Tensor) -> Result<Vec<(NodeId, Tensor)>, RevadError> {
        let nodes = self.nodes.borrow();
        let node = get_node(&nodes, x)?;
        let value = node.value.as_ref().ok_or(RevadError::MissingValue(x))?;
        let grads = node.op.child_gradients(&nodes, value, gradient)?;
        Ok(node.op.children().zip(grads).collect())
    }
}
