//! Expression handles and operator overloads.
//!
//! Plain numbers and tensors combined with expressions are turned
//! into constants. Operators panic when operands have incompatible shapes,
//! use `try_*` methods to get [`RevadError`] instead.

use crate::{
    context::Context,
    error::RevadError,
    node::{ElemFunc, NodeId},
    shape::Shape,
    tensor::Tensor,
};
use core::ops::{Add, Mul, Neg, Sub};

/// Handle to node in [`Context`]
#[derive(Clone, Copy)]
pub struct Expr<'c> {
    id: NodeId,
    ctx: &'c Context,
}

impl core::fmt::Debug for Expr<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("Expr({})", self.id))
    }
}

impl<'c> From<Expr<'c>> for NodeId {
    fn from(value: Expr<'c>) -> Self {
        value.id
    }
}

impl<'c> From<&Expr<'c>> for NodeId {
    fn from(value: &Expr<'c>) -> Self {
        value.id
    }
}

/// Right hand side of binary operation
pub enum Operand<'c> {
    /// Existing node
    Expr(Expr<'c>),
    /// Number, promoted to constant
    Scalar(f64),
    /// Unbatched tensor, promoted to constant
    Tensor(Tensor),
}

impl<'c> From<Expr<'c>> for Operand<'c> {
    fn from(value: Expr<'c>) -> Self {
        Operand::Expr(value)
    }
}

impl<'c> From<&Expr<'c>> for Operand<'c> {
    fn from(value: &Expr<'c>) -> Self {
        Operand::Expr(*value)
    }
}

impl From<f64> for Operand<'_> {
    fn from(value: f64) -> Self {
        Operand::Scalar(value)
    }
}

impl From<Tensor> for Operand<'_> {
    fn from(value: Tensor) -> Self {
        Operand::Tensor(value)
    }
}

impl<'c> Expr<'c> {
    pub(crate) fn new(id: NodeId, ctx: &'c Context) -> Self {
        Expr { id, ctx }
    }

    /// Id of node
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Context that owns the node
    #[must_use]
    pub fn context(&self) -> &'c Context {
        self.ctx
    }

    /// Shape of node without batch dimension
    #[must_use]
    pub fn shape(&self) -> Shape {
        self.ctx.shape(self.id).unwrap_or_else(Shape::scalar)
    }

    /// Current value, None if node was not evaluated yet
    #[must_use]
    pub fn value(&self) -> Option<Tensor> {
        self.ctx.value(self.id)
    }

    /// Substitute new unbatched value, see [`Context::set_value`]
    /// # Errors
    /// Returns [`RevadError::ShapeMismatch`] if value has wrong shape
    /// and [`RevadError::UnsupportedOperation`] if node is not a variable.
    #[track_caller]
    pub fn set_value(&self, value: impl Into<Tensor>) -> Result<(), RevadError> {
        self.ctx.set_value(self.id, value)
    }

    /// Substitute new batched value, see [`Context::set_batched_value`]
    /// # Errors
    /// Returns [`RevadError::ShapeMismatch`] if value has wrong shape
    /// and [`RevadError::UnsupportedOperation`] if node is not a variable.
    #[track_caller]
    pub fn set_batched_value(&self, value: Tensor) -> Result<(), RevadError> {
        self.ctx.set_batched_value(self.id, value)
    }

    /// Apply elementwise function
    /// # Errors
    /// Returns [`RevadError::UnknownNode`] if node is not in it's context.
    #[track_caller]
    pub fn apply(self, func: ElemFunc) -> Result<Expr<'c>, RevadError> {
        self.ctx.elem_func(self.id, func)
    }

    // Numbers added to non-scalar node are filled to node's shape,
    // multiplication keeps them scalar so that scalar multiply is chosen.
    #[track_caller]
    fn promote(&self, rhs: Operand<'c>, fill: bool) -> Result<NodeId, RevadError> {
        Ok(match rhs {
            Operand::Expr(x) => {
                if !core::ptr::eq(self.ctx, x.ctx) {
                    return Err(RevadError::unsupported("operands belong to different contexts"));
                }
                x.id
            }
            Operand::Scalar(x) if fill => self.ctx.constant(Tensor::full(self.shape(), x)).id,
            Operand::Scalar(x) => self.ctx.constant(x).id,
            Operand::Tensor(x) => self.ctx.constant(x).id,
        })
    }

    /// Addition
    /// # Errors
    /// Returns [`RevadError::ShapeMismatch`] if shapes are not equal.
    #[track_caller]
    pub fn try_add(self, rhs: impl Into<Operand<'c>>) -> Result<Expr<'c>, RevadError> {
        let rhs = self.promote(rhs.into(), true)?;
        self.ctx.add(self.id, rhs)
    }

    /// Subtraction
    /// # Errors
    /// Returns [`RevadError::ShapeMismatch`] if shapes are not equal.
    #[track_caller]
    pub fn try_sub(self, rhs: impl Into<Operand<'c>>) -> Result<Expr<'c>, RevadError> {
        let rhs = self.promote(rhs.into(), true)?;
        self.ctx.sub(self.id, rhs)
    }

    /// Multiplication, see [`Context::mul`]
    /// # Errors
    /// Returns [`RevadError::ShapeMismatch`] or [`RevadError::UnsupportedOperation`]
    /// if shapes can not be multiplied.
    #[track_caller]
    pub fn try_mul(self, rhs: impl Into<Operand<'c>>) -> Result<Expr<'c>, RevadError> {
        let rhs = self.promote(rhs.into(), false)?;
        self.ctx.mul(self.id, rhs)
    }

    /// Negation
    /// # Errors
    /// Returns [`RevadError::UnknownNode`] if node is not in it's context.
    #[track_caller]
    pub fn try_neg(self) -> Result<Expr<'c>, RevadError> {
        self.ctx.negate(self.id)
    }
}

#[track_caller]
fn unwrap_op<'c>(res: Result<Expr<'c>, RevadError>) -> Expr<'c> {
    match res {
        Ok(x) => x,
        Err(e) => panic!("{e}"),
    }
}

impl<'c, T: Into<Operand<'c>>> Add<T> for Expr<'c> {
    type Output = Expr<'c>;
    #[track_caller]
    fn add(self, rhs: T) -> Self::Output {
        unwrap_op(self.try_add(rhs))
    }
}

impl<'c, T: Into<Operand<'c>>> Sub<T> for Expr<'c> {
    type Output = Expr<'c>;
    #[track_caller]
    fn sub(self, rhs: T) -> Self::Output {
        unwrap_op(self.try_sub(rhs))
    }
}

impl<'c, T: Into<Operand<'c>>> Mul<T> for Expr<'c> {
    type Output = Expr<'c>;
    #[track_caller]
    fn mul(self, rhs: T) -> Self::Output {
        unwrap_op(self.try_mul(rhs))
    }
}

impl<'c> Neg for Expr<'c> {
    type Output = Expr<'c>;
    #[track_caller]
    fn neg(self) -> Self::Output {
        unwrap_op(self.try_neg())
    }
}

impl<'c> Add<Expr<'c>> for f64 {
    type Output = Expr<'c>;
    #[track_caller]
    fn add(self, rhs: Expr<'c>) -> Self::Output {
        unwrap_op(rhs.try_add(self))
    }
}

impl<'c> Sub<Expr<'c>> for f64 {
    type Output = Expr<'c>;
    #[track_caller]
    fn sub(self, rhs: Expr<'c>) -> Self::Output {
        let lhs = rhs.ctx.constant(Tensor::full(rhs.shape(), self));
        unwrap_op(lhs.try_sub(rhs))
    }
}

impl<'c> Mul<Expr<'c>> for f64 {
    type Output = Expr<'c>;
    #[track_caller]
    fn mul(self, rhs: Expr<'c>) -> Self::Output {
        let lhs = rhs.ctx.constant(self);
        unwrap_op(lhs.try_mul(rhs))
    }
}
