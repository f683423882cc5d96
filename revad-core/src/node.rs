use crate::{error::RevadError, shape::Shape, tensor::Tensor};
use std::rc::Rc;

/// Index of node in [`Context`](crate::Context)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub(crate) const fn new(id: usize) -> Self {
        Self(id)
    }

    pub(crate) const fn i(self) -> usize {
        self.0
    }
}

impl core::fmt::Display for NodeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("{}", self.0))
    }
}

type TensorFn = Rc<dyn Fn(&Tensor) -> Tensor>;

/// Elementwise function and it's derivative.
///
/// Derivative is evaluated at the output of the function, not at it's input,
/// so for example derivative of sigmoid is `y * (1 - y)`.
#[derive(Clone)]
pub struct ElemFunc {
    name: Box<str>,
    function: TensorFn,
    derivative: TensorFn,
}

impl ElemFunc {
    /// Create from functions over whole tensors.
    /// Both functions must return tensor of the same shape as their input.
    pub fn new(
        name: impl Into<Box<str>>,
        function: impl Fn(&Tensor) -> Tensor + 'static,
        derivative: impl Fn(&Tensor) -> Tensor + 'static,
    ) -> ElemFunc {
        ElemFunc { name: name.into(), function: Rc::new(function), derivative: Rc::new(derivative) }
    }

    /// Create from scalar functions applied to each element
    pub fn map(name: impl Into<Box<str>>, function: fn(f64) -> f64, derivative: fn(f64) -> f64) -> ElemFunc {
        ElemFunc::new(name, move |x: &Tensor| x.map(function), move |y: &Tensor| y.map(derivative))
    }

    /// Name used in debug output and dot graphs
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn apply(&self, x: &Tensor) -> Tensor {
        (self.function)(x)
    }

    pub(crate) fn derivative(&self, y: &Tensor) -> Tensor {
        (self.derivative)(y)
    }
}

impl core::fmt::Debug for ElemFunc {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Operation of node. Children are stored in the operation, in order.
#[derive(Clone)]
pub enum Op {
    /// Leaf with value that can be substituted between evaluations
    Variable,
    /// Leaf with fixed value
    Constant,
    /// Elementwise addition
    ElemAdd(NodeId, NodeId),
    /// Elementwise multiplication of tensors with the same shape
    ElemMultiply(NodeId, NodeId),
    /// Scalar times tensor, scalar is always first
    ScalarMultiply(NodeId, NodeId),
    /// Matrix times vector
    MatVecMultiply(NodeId, NodeId),
    /// Elementwise negation
    Negate(NodeId),
    /// Elementwise function
    ElemFunc(NodeId, ElemFunc),
}

impl core::fmt::Debug for Op {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Op::Variable => f.write_str("Variable"),
            Op::Constant => f.write_str("Constant"),
            Op::ElemAdd(x, y) => f.write_fmt(format_args!("ElemAdd({x}, {y})")),
            Op::ElemMultiply(x, y) => f.write_fmt(format_args!("ElemMultiply({x}, {y})")),
            Op::ScalarMultiply(x, y) => f.write_fmt(format_args!("ScalarMultiply({x}, {y})")),
            Op::MatVecMultiply(x, y) => f.write_fmt(format_args!("MatVecMultiply({x}, {y})")),
            Op::Negate(x) => f.write_fmt(format_args!("Negate({x})")),
            Op::ElemFunc(x, func) => f.write_fmt(format_args!("ElemFunc({x}, {func:?})")),
        }
    }
}

/// Iterator over children of op which does not allocate on heap.
pub struct OpChildrenIterator {
    children: [NodeId; 2],
    len: u8,
    idx: u8,
}

impl Iterator for OpChildrenIterator {
    type Item = NodeId;
    fn next(&mut self) -> Option<Self::Item> {
        if self.idx == self.len {
            return None;
        }
        let idx = self.idx;
        self.idx += 1;
        Some(self.children[idx as usize])
    }
}

impl Op {
    /// Get all children of self in order, with repetitions. This method does not allocate.
    #[must_use]
    pub fn children(&self) -> OpChildrenIterator {
        let none = NodeId(0);
        match self {
            Op::Variable | Op::Constant => OpChildrenIterator { children: [none; 2], len: 0, idx: 0 },
            Op::Negate(x) | Op::ElemFunc(x, _) => OpChildrenIterator { children: [*x, none], len: 1, idx: 0 },
            Op::ElemAdd(x, y) | Op::ElemMultiply(x, y) | Op::ScalarMultiply(x, y) | Op::MatVecMultiply(x, y) => {
                OpChildrenIterator { children: [*x, *y], len: 2, idx: 0 }
            }
        }
    }

    /// Is this op a leaf?
    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        matches!(self, Op::Variable | Op::Constant)
    }

    /// Short name of the operation
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Op::Variable => "Variable",
            Op::Constant => "Constant",
            Op::ElemAdd(..) => "ElemAdd",
            Op::ElemMultiply(..) => "ElemMultiply",
            Op::ScalarMultiply(..) => "ScalarMultiply",
            Op::MatVecMultiply(..) => "MatVecMultiply",
            Op::Negate(..) => "Negate",
            Op::ElemFunc(_, func) => func.name(),
        }
    }
}

/// Single node stored in context
pub(crate) struct Node {
    pub(crate) op: Op,
    pub(crate) parents: Vec<NodeId>,
    pub(crate) shape: Shape,
    pub(crate) value: Option<Tensor>,
}

impl Node {
    /// Assign value, checking that it has shape `(batch, *shape)`
    #[track_caller]
    pub(crate) fn set_value(&mut self, value: Tensor) -> Result<(), RevadError> {
        if value.rank() == 0 || value.sample_shape() != self.shape {
            return Err(RevadError::shape_mismatch(format!(
                "wrong value shape {}, should be (batch, {})",
                value.shape(),
                self.shape
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }
        self.value = Some(value);
        Ok(())
    }
}

/// Node with id x, ids from other contexts may point past the end of arena
pub(crate) fn get_node(nodes: &[Node], x: NodeId) -> Result<&Node, RevadError> {
    nodes.get(x.i()).ok_or(RevadError::UnknownNode(x))
}

fn value_of(nodes: &[Node], x: NodeId) -> Result<&Tensor, RevadError> {
    get_node(nodes, x)?.value.as_ref().ok_or(RevadError::MissingValue(x))
}

impl Op {
    /// Calculate value from the values of children.
    /// Returns None for leafs.
    pub(crate) fn calc_value(&self, nodes: &[Node]) -> Result<Option<Tensor>, RevadError> {
        let v = |x: &NodeId| value_of(nodes, *x);
        Ok(Some(match self {
            Op::Variable | Op::Constant => return Ok(None),
            Op::ElemAdd(x, y) => v(x)?.try_add(v(y)?)?,
            Op::ElemMultiply(x, y) => v(x)?.try_mul(v(y)?)?,
            Op::ScalarMultiply(s, x) => v(x)?.scale(v(s)?)?,
            Op::MatVecMultiply(m, x) => v(m)?.matvec(v(x)?)?,
            Op::Negate(x) => -(v(x)? as &Tensor),
            Op::ElemFunc(x, func) => func.apply(v(x)?),
        }))
    }

    /// Local gradient contribution of each child, in the same order as children,
    /// given gradient of this node and it's current value.
    pub(crate) fn child_gradients(
        &self,
        nodes: &[Node],
        value: &Tensor,
        gradient: &Tensor,
    ) -> Result<Vec<Tensor>, RevadError> {
        let v = |x: &NodeId| value_of(nodes, *x);
        Ok(match self {
            Op::Variable | Op::Constant => Vec::new(),
            Op::ElemAdd(..) => vec![gradient.clone(), gradient.clone()],
            Op::ElemMultiply(x, y) => vec![gradient.try_mul(v(y)?)?, gradient.try_mul(v(x)?)?],
            Op::ScalarMultiply(s, x) => vec![
                gradient.contract(v(x)?, &get_node(nodes, *s)?.shape)?,
                gradient.scale(v(s)?)?,
            ],
            Op::MatVecMultiply(m, x) => vec![gradient.outer(v(x)?)?, v(m)?.t_matvec(gradient)?],
            Op::Negate(..) => vec![-gradient],
            Op::ElemFunc(_, func) => vec![gradient.try_mul(&func.derivative(value))?],
        })
    }
}
