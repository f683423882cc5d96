/// Shape of tensor
///
/// Node shapes never include the batch dimension, value shapes always do.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Shape(Box<[usize]>);

/// Shape category used to pick multiplication variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    /// Single element, rank 0 or all dimensions equal to one
    Scalar,
    /// Rank 1
    Vector(usize),
    /// Rank 2, rows and columns
    Matrix(usize, usize),
    /// Anything of higher rank
    Tensor,
}

impl Shape {
    /// Shape of rank 0
    #[must_use]
    pub fn scalar() -> Shape {
        Shape(Box::new([]))
    }

    /// Get shape's rank
    #[must_use]
    pub const fn rank(&self) -> usize {
        self.0.len()
    }

    /// Get number of elements in tensor with this shape
    /// (a product of it's dimensions).
    #[must_use]
    pub fn numel(&self) -> usize {
        self.0.iter().product()
    }

    /// Iter
    pub fn iter(&self) -> impl Iterator<Item = &usize> {
        self.into_iter()
    }

    /// Dimensions as slice
    #[must_use]
    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Prepend batch dimension
    #[must_use]
    pub fn batched(&self, batch: usize) -> Shape {
        core::iter::once(batch).chain(self.0.iter().copied()).collect::<Vec<_>>().into()
    }

    /// Remove first (batch) dimension.
    /// Returns None for shapes of rank 0.
    #[must_use]
    pub fn unbatched(&self) -> Option<Shape> {
        self.0.split_first().map(|(_, rest)| rest.into())
    }

    /// Category of this shape
    #[must_use]
    pub fn kind(&self) -> ShapeKind {
        if self.numel() == 1 {
            return ShapeKind::Scalar;
        }
        match *self.0 {
            [n] => ShapeKind::Vector(n),
            [r, c] => ShapeKind::Matrix(r, c),
            _ => ShapeKind::Tensor,
        }
    }
}

impl core::ops::Index<usize> for Shape {
    type Output = usize;
    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl From<Vec<usize>> for Shape {
    fn from(value: Vec<usize>) -> Self {
        Shape(value.into_boxed_slice())
    }
}

impl From<&[usize]> for Shape {
    fn from(value: &[usize]) -> Self {
        Shape(value.iter().copied().collect())
    }
}

impl From<usize> for Shape {
    fn from(value: usize) -> Self {
        Shape(Box::new([value]))
    }
}

impl From<()> for Shape {
    fn from((): ()) -> Self {
        Shape::scalar()
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(value: [usize; N]) -> Self {
        Shape(value.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Shape {
    type IntoIter = <&'a [usize] as IntoIterator>::IntoIter;
    type Item = &'a usize;
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl core::fmt::Display for Shape {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("(")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_fmt(format_args!("{d}"))?;
        }
        if self.0.len() == 1 {
            f.write_str(",")?;
        }
        f.write_str(")")
    }
}
