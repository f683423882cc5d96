//! Dense row major tensor of f64 with batched kernels used by node rules.
//!
//! Every value stored in a node has leading batch dimension. Binary kernels
//! accept operands whose batch sizes differ only if one of them is 1,
//! in which case it is broadcasted along the batch dimension.

use crate::{error::RevadError, shape::Shape};
use core::ops::Range;
use rand::Rng;

/// Tensor
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Shape,
    data: Vec<f64>,
}

impl Tensor {
    /// Create tensor from shape and row major data.
    /// # Errors
    /// Returns [`RevadError::ShapeMismatch`] if number of elements of shape
    /// is not equal to length of data.
    #[track_caller]
    pub fn new(shape: impl Into<Shape>, data: Vec<f64>) -> Result<Tensor, RevadError> {
        let shape = shape.into();
        if shape.numel() != data.len() {
            return Err(RevadError::shape_mismatch(format!(
                "shape {shape} has {} elements, but data has {}",
                shape.numel(),
                data.len()
            )));
        }
        Ok(Tensor { shape, data })
    }

    /// Tensor filled with value
    #[must_use]
    pub fn full(shape: impl Into<Shape>, value: f64) -> Tensor {
        let shape = shape.into();
        let data = vec![value; shape.numel()];
        Tensor { shape, data }
    }

    /// Tensor filled with zeros
    #[must_use]
    pub fn zeros(shape: impl Into<Shape>) -> Tensor {
        Tensor::full(shape, 0.)
    }

    /// Tensor filled with ones
    #[must_use]
    pub fn ones(shape: impl Into<Shape>) -> Tensor {
        Tensor::full(shape, 1.)
    }

    /// Tensor with values drawn uniformly from range
    #[must_use]
    pub fn uniform(shape: impl Into<Shape>, range: Range<f64>, rng: &mut impl Rng) -> Tensor {
        let shape = shape.into();
        let data = (0..shape.numel()).map(|_| rng.gen_range(range.clone())).collect();
        Tensor { shape, data }
    }

    /// Zeros with shape of self
    #[must_use]
    pub fn zeros_like(&self) -> Tensor {
        Tensor::zeros(self.shape.clone())
    }

    /// Ones with shape of self
    #[must_use]
    pub fn ones_like(&self) -> Tensor {
        Tensor::ones(self.shape.clone())
    }

    /// Shape of tensor
    #[must_use]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Row major data
    #[must_use]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Copy data into vec
    #[must_use]
    pub fn to_vec(&self) -> Vec<f64> {
        self.data.clone()
    }

    /// Number of elements
    #[must_use]
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Rank
    #[must_use]
    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    /// Only element of tensor with single element
    #[must_use]
    pub fn item(&self) -> Option<f64> {
        match *self.data {
            [x] => Some(x),
            _ => None,
        }
    }

    /// Sum of all elements
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Apply function to each element
    #[must_use]
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Tensor {
        Tensor { shape: self.shape.clone(), data: self.data.iter().map(|&x| f(x)).collect() }
    }

    /// Size of the leading batch dimension
    #[must_use]
    pub fn batch(&self) -> usize {
        self.shape.dims().first().copied().unwrap_or(1)
    }

    /// Shape without the batch dimension
    #[must_use]
    pub fn sample_shape(&self) -> Shape {
        self.shape.unbatched().unwrap_or_else(Shape::scalar)
    }

    fn sample_numel(&self) -> usize {
        self.sample_shape().numel()
    }

    /// Prepend batch dimension of size 1
    #[must_use]
    pub fn unsqueeze_batch(self) -> Tensor {
        Tensor { shape: self.shape.batched(1), data: self.data }
    }

    /// Sum along the batch dimension, keeping it with size 1
    #[must_use]
    pub fn sum_batch(&self) -> Tensor {
        let n = self.sample_numel();
        let mut data = vec![0.; n];
        for chunk in self.data.chunks(n.max(1)) {
            for (d, x) in data.iter_mut().zip(chunk) {
                *d += x;
            }
        }
        Tensor { shape: self.sample_shape().batched(1), data }
    }

    /// Elementwise sum with batch broadcasting
    /// # Errors
    /// Returns [`RevadError::ShapeMismatch`] if shapes differ in anything else
    /// than broadcastable batch dimension.
    #[track_caller]
    pub fn try_add(&self, other: &Tensor) -> Result<Tensor, RevadError> {
        self.zip_batched(other, |x, y| x + y)
    }

    /// Elementwise product with batch broadcasting
    /// # Errors
    /// Returns [`RevadError::ShapeMismatch`] if shapes differ in anything else
    /// than broadcastable batch dimension.
    #[track_caller]
    pub fn try_mul(&self, other: &Tensor) -> Result<Tensor, RevadError> {
        self.zip_batched(other, |x, y| x * y)
    }

    #[track_caller]
    fn zip_batched(&self, other: &Tensor, op: impl Fn(f64, f64) -> f64) -> Result<Tensor, RevadError> {
        let sample = self.sample_shape();
        if sample != other.sample_shape() {
            return Err(RevadError::shape_mismatch(format!(
                "elementwise operands have shapes {} and {}",
                self.shape, other.shape
            )));
        }
        let batch = broadcast_batch(self.batch(), other.batch())?;
        let n = sample.numel();
        let mut data = Vec::with_capacity(batch * n);
        for b in 0..batch {
            let x = batch_slice(self, b, n);
            let y = batch_slice(other, b, n);
            data.extend(x.iter().zip(y).map(|(&x, &y)| op(x, y)));
        }
        Ok(Tensor { shape: sample.batched(batch), data })
    }

    /// Multiply self by scalar tensor. Scalar has single element per batch.
    #[track_caller]
    pub(crate) fn scale(&self, scalar: &Tensor) -> Result<Tensor, RevadError> {
        if scalar.sample_numel() != 1 {
            return Err(RevadError::shape_mismatch(format!(
                "{} is not a batch of scalars",
                scalar.shape
            )));
        }
        let batch = broadcast_batch(self.batch(), scalar.batch())?;
        let n = self.sample_numel();
        let mut data = Vec::with_capacity(batch * n);
        for b in 0..batch {
            let s = batch_slice(scalar, b, 1)[0];
            data.extend(batch_slice(self, b, n).iter().map(|x| x * s));
        }
        Ok(Tensor { shape: self.sample_shape().batched(batch), data })
    }

    /// Per batch inner product of self and other, shaped as `(batch, *target)`,
    /// where target has single element.
    #[track_caller]
    pub(crate) fn contract(&self, other: &Tensor, target: &Shape) -> Result<Tensor, RevadError> {
        if target.numel() != 1 {
            return Err(RevadError::shape_mismatch(format!("{target} is not a scalar shape")));
        }
        let prod = self.try_mul(other)?;
        let n = prod.sample_numel();
        let data: Vec<f64> = prod.data.chunks(n.max(1)).map(|c| c.iter().sum()).collect();
        Ok(Tensor { shape: target.batched(prod.batch()), data })
    }

    /// Matrix `(batch, rows, cols)` times vector `(batch, cols)`
    #[track_caller]
    pub(crate) fn matvec(&self, vector: &Tensor) -> Result<Tensor, RevadError> {
        let (rows, cols) = self.matrix_dims()?;
        if vector.sample_shape() != Shape::from([cols]) {
            return Err(RevadError::shape_mismatch(format!(
                "can not multiply matrix {} with vector {}",
                self.shape, vector.shape
            )));
        }
        let batch = broadcast_batch(self.batch(), vector.batch())?;
        let mut data = Vec::with_capacity(batch * rows);
        for b in 0..batch {
            let m = batch_slice(self, b, rows * cols);
            let v = batch_slice(vector, b, cols);
            data.extend(m.chunks(cols.max(1)).map(|row| row.iter().zip(v).map(|(a, b)| a * b).sum::<f64>()));
        }
        Ok(Tensor { shape: Shape::from([batch, rows]), data })
    }

    /// Transposed matrix `(batch, rows, cols)` times vector `(batch, rows)`
    #[track_caller]
    pub(crate) fn t_matvec(&self, vector: &Tensor) -> Result<Tensor, RevadError> {
        let (rows, cols) = self.matrix_dims()?;
        if vector.sample_shape() != Shape::from([rows]) {
            return Err(RevadError::shape_mismatch(format!(
                "can not multiply transposed matrix {} with vector {}",
                self.shape, vector.shape
            )));
        }
        let batch = broadcast_batch(self.batch(), vector.batch())?;
        let mut data = vec![0.; batch * cols];
        for b in 0..batch {
            let m = batch_slice(self, b, rows * cols);
            let v = batch_slice(vector, b, rows);
            let out = &mut data[b * cols..(b + 1) * cols];
            for (row, &g) in m.chunks(cols.max(1)).zip(v) {
                for (o, x) in out.iter_mut().zip(row) {
                    *o += g * x;
                }
            }
        }
        Ok(Tensor { shape: Shape::from([batch, cols]), data })
    }

    /// Outer product of vectors `(batch, rows)` and `(batch, cols)`
    #[track_caller]
    pub(crate) fn outer(&self, other: &Tensor) -> Result<Tensor, RevadError> {
        let (rows, cols) = match (self.sample_shape().dims(), other.sample_shape().dims()) {
            (&[rows], &[cols]) => (rows, cols),
            _ => {
                return Err(RevadError::shape_mismatch(format!(
                    "outer product needs two batches of vectors, got {} and {}",
                    self.shape, other.shape
                )))
            }
        };
        let batch = broadcast_batch(self.batch(), other.batch())?;
        let mut data = Vec::with_capacity(batch * rows * cols);
        for b in 0..batch {
            let x = batch_slice(self, b, rows);
            let y = batch_slice(other, b, cols);
            for &a in x {
                data.extend(y.iter().map(|&c| a * c));
            }
        }
        Ok(Tensor { shape: Shape::from([batch, rows, cols]), data })
    }

    /// Add contribution into self. If self has batch of size 1 and contribution
    /// is larger batch, contribution is summed along batch first.
    #[track_caller]
    pub(crate) fn accumulate(&mut self, contribution: &Tensor) -> Result<(), RevadError> {
        if self.sample_shape() != contribution.sample_shape() {
            return Err(RevadError::shape_mismatch(format!(
                "can not accumulate {} into {}",
                contribution.shape, self.shape
            )));
        }
        let (sb, cb) = (self.batch(), contribution.batch());
        if sb == cb {
            for (d, c) in self.data.iter_mut().zip(&contribution.data) {
                *d += c;
            }
        } else if sb == 1 {
            let reduced = contribution.sum_batch();
            for (d, c) in self.data.iter_mut().zip(&reduced.data) {
                *d += c;
            }
        } else {
            *self = self.try_add(contribution)?;
        }
        Ok(())
    }

    fn matrix_dims(&self) -> Result<(usize, usize), RevadError> {
        match *self.sample_shape().dims() {
            [rows, cols] => Ok((rows, cols)),
            _ => Err(RevadError::shape_mismatch(format!("{} is not a batch of matrices", self.shape))),
        }
    }
}

#[track_caller]
fn broadcast_batch(x: usize, y: usize) -> Result<usize, RevadError> {
    if x == y || y == 1 {
        Ok(x)
    } else if x == 1 {
        Ok(y)
    } else {
        Err(RevadError::shape_mismatch(format!("batch sizes {x} and {y} can not be broadcasted")))
    }
}

fn batch_slice(x: &Tensor, b: usize, n: usize) -> &[f64] {
    let b = if x.batch() == 1 { 0 } else { b };
    &x.data[b * n..(b + 1) * n]
}

impl core::ops::Neg for &Tensor {
    type Output = Tensor;
    fn neg(self) -> Self::Output {
        self.map(|x| -x)
    }
}

impl core::ops::Neg for Tensor {
    type Output = Tensor;
    fn neg(self) -> Self::Output {
        (&self).neg()
    }
}

impl From<f64> for Tensor {
    fn from(value: f64) -> Self {
        Tensor { shape: Shape::scalar(), data: vec![value] }
    }
}

impl From<Vec<f64>> for Tensor {
    fn from(data: Vec<f64>) -> Self {
        Tensor { shape: data.len().into(), data }
    }
}

impl From<&[f64]> for Tensor {
    fn from(data: &[f64]) -> Self {
        Tensor::from(data.to_vec())
    }
}

impl<const N: usize> From<[f64; N]> for Tensor {
    fn from(data: [f64; N]) -> Self {
        Tensor { shape: N.into(), data: data.into() }
    }
}

impl<const N: usize, const M: usize> From<[[f64; M]; N]> for Tensor {
    fn from(data: [[f64; M]; N]) -> Self {
        Tensor { shape: [N, M].into(), data: data.into_iter().flatten().collect() }
    }
}

impl<const N: usize, const M: usize, const L: usize> From<[[[f64; L]; M]; N]> for Tensor {
    fn from(data: [[[f64; L]; M]; N]) -> Self {
        Tensor { shape: [N, M, L].into(), data: data.into_iter().flatten().flatten().collect() }
    }
}

impl<const N: usize> PartialEq<[f64; N]> for Tensor {
    fn eq(&self, other: &[f64; N]) -> bool {
        self.data == other
    }
}

impl<const N: usize, const M: usize> PartialEq<[[f64; M]; N]> for Tensor {
    fn eq(&self, other: &[[f64; M]; N]) -> bool {
        self.data.iter().eq(other.iter().flatten())
    }
}

impl core::fmt::Display for Tensor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let precision = f.precision().unwrap_or(3);
        f.write_str(&tensor_to_string(&self.data, self.shape.dims(), precision, f.width()))
    }
}

fn tensor_to_string(data: &[f64], shape: &[usize], precision: usize, width: Option<usize>) -> String {
    if data.is_empty() {
        return "[]".into();
    }
    // All elements are padded to the widest one
    let width = width.unwrap_or_else(|| data.iter().map(|x| format!("{x:.precision$}").len()).max().unwrap_or(0));
    let mut res = String::new();
    write_nested(&mut res, data, shape, 0, precision, width);
    res
}

fn write_nested(res: &mut String, data: &[f64], shape: &[usize], depth: usize, precision: usize, width: usize) {
    use core::fmt::Write;
    match shape {
        [] => {
            let _ = write!(res, "{:.precision$}", data[0]);
        }
        [_] => {
            res.push('[');
            for (i, x) in data.iter().enumerate() {
                if i > 0 {
                    res.push_str("  ");
                }
                let _ = write!(res, "{x:>width$.precision$}");
            }
            res.push(']');
        }
        [n, inner @ ..] => {
            res.push('[');
            for (i, rows) in data.chunks(data.len() / n).enumerate() {
                if i > 0 {
                    res.push('\n');
                    res.push_str(&" ".repeat(depth + 1));
                }
                write_nested(res, rows, inner, depth + 1, precision, width);
            }
            res.push(']');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Tensor;
    use crate::{error::RevadError, shape::Shape};

    #[test]
    fn batch_broadcast_add() -> Result<(), RevadError> {
        let x = Tensor::from([[1., 2.], [3., 4.]]);
        let y = Tensor::from([[10., 20.]]);
        assert_eq!(x.try_add(&y)?, [[11., 22.], [13., 24.]]);
        assert_eq!(y.try_add(&x)?.shape(), &Shape::from([2, 2]));
        Ok(())
    }

    #[test]
    fn incompatible_batches() {
        let x = Tensor::zeros([2, 3]);
        let y = Tensor::zeros([3, 3]);
        assert!(matches!(x.try_mul(&y), Err(RevadError::ShapeMismatch(..))));
    }

    #[test]
    fn matvec_and_transposed() -> Result<(), RevadError> {
        let m = Tensor::from([[[1., 2., 3.], [4., 5., 6.]]]);
        let v = Tensor::from([[1., 0., -1.]]);
        assert_eq!(m.matvec(&v)?, [[-2., -2.]]);
        let g = Tensor::from([[1., 1.]]);
        assert_eq!(m.t_matvec(&g)?, [[5., 7., 9.]]);
        assert_eq!(g.outer(&v)?.shape(), &Shape::from([1, 2, 3]));
        Ok(())
    }

    #[test]
    fn accumulate_reduces_broadcast_batch() -> Result<(), RevadError> {
        let mut acc = Tensor::zeros([1, 2]);
        acc.accumulate(&Tensor::from([[1., 2.], [3., 4.], [5., 6.]]))?;
        assert_eq!(acc, [[9., 12.]]);
        Ok(())
    }

    #[test]
    fn display() {
        let x = Tensor::from([[1., 2.], [3., 4.]]);
        assert_eq!(format!("{x:.1}"), "[[1.0  2.0]\n [3.0  4.0]]");
        assert_eq!(format!("{:.2}", Tensor::from(2.)), "2.00");
        let y = Tensor::from([[[1., -1.]], [[10., 0.]]]);
        assert_eq!(format!("{y:.0}"), "[[[ 1  -1]]\n [[10   0]]]");
    }
}
