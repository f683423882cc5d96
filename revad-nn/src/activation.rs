use revad_core::{ElemFunc, Expr, RevadError, Tensor};

/// Activation
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub enum Activation {
    /// Relu
    #[default]
    Relu,
    /// Leaky relu with negative slope
    LeakyRelu(f64),
    /// Sigmoid
    Sigmoid,
    /// Tanh
    Tanh,
    /// Softplus
    Softplus,
}

impl Activation {
    /// Elementwise function of this activation
    #[must_use]
    pub fn func(&self) -> ElemFunc {
        match *self {
            Self::Relu => relu(),
            Self::LeakyRelu(negative_slope) => leaky_relu(negative_slope),
            Self::Sigmoid => sigmoid(),
            Self::Tanh => tanh(),
            Self::Softplus => softplus(),
        }
    }

    /// Activation forward
    /// # Errors
    /// Returns [`RevadError::UnknownNode`] if xs does not belong to it's context.
    pub fn forward<'c>(&self, xs: Expr<'c>) -> Result<Expr<'c>, RevadError> {
        xs.apply(self.func())
    }
}

/// Relu, derivative is heaviside step of the output with zero at zero
#[must_use]
pub fn relu() -> ElemFunc {
    ElemFunc::map("relu", |x| x.max(0.), |y| if y > 0. { 1. } else { 0. })
}

/// Leaky relu
#[must_use]
pub fn leaky_relu(negative_slope: f64) -> ElemFunc {
    // For positive slope sign of output is the sign of input
    ElemFunc::new(
        "leaky_relu",
        move |x: &Tensor| x.map(|x| if x > 0. { x } else { negative_slope * x }),
        move |y: &Tensor| y.map(|y| if y > 0. { 1. } else { negative_slope }),
    )
}

/// Sigmoid
#[must_use]
pub fn sigmoid() -> ElemFunc {
    ElemFunc::map("sigmoid", |x| 1. / (1. + (-x).exp()), |y| y * (1. - y))
}

/// Tanh
#[must_use]
pub fn tanh() -> ElemFunc {
    ElemFunc::map("tanh", f64::tanh, |y| 1. - y * y)
}

/// Softplus, `ln(1 + e^x)`
#[must_use]
pub fn softplus() -> ElemFunc {
    ElemFunc::map("softplus", |x| x.exp().ln_1p(), |y| -(-y).exp_m1())
}
