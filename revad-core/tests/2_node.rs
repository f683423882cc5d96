use revad_core::{Config, Context, ElemFunc, LeafKind, Op, RevadError, Shape, Tensor};

#[test]
fn leaves() -> Result<(), RevadError> {
    let ctx = Context::with_config(Config::default());
    let x = ctx.variable([1., 2., 3.]);
    assert_eq!(x.shape(), Shape::from(3));
    assert_eq!(x.value().map(|v| v.shape().clone()), Some(Shape::from([1, 3])));
    let w = ctx.leaf(LeafKind::Constant, None, Some(Shape::from([2, 2])))?;
    assert_eq!(w.value(), Some(Tensor::zeros([1, 2, 2])));
    assert!(matches!(ctx.op(w), Some(Op::Constant)));
    let b = ctx.leaf(LeafKind::Variable, Some(Tensor::from([[1., 2.], [3., 4.]])), Some(Shape::from(2)))?;
    assert_eq!(b.shape(), Shape::from(2));
    assert!(matches!(ctx.leaf(LeafKind::Variable, None, None), Err(RevadError::UnspecifiedNode)));
    assert!(matches!(
        ctx.leaf(LeafKind::Variable, Some(Tensor::zeros([1, 3])), Some(Shape::from(2))),
        Err(RevadError::ShapeMismatch(..))
    ));
    assert!(matches!(ctx.batched_variable(Tensor::from(1.)), Err(RevadError::ShapeMismatch(..))));
    Ok(())
}

#[test]
fn parents_and_children() {
    let ctx = Context::with_config(Config::default());
    let x = ctx.variable(2.);
    let y = x * x;
    let z = x + y;
    assert_eq!(ctx.children(y), vec![x.id(), x.id()]);
    assert_eq!(ctx.children(z), vec![x.id(), y.id()]);
    assert_eq!(ctx.parents(x), vec![y.id(), y.id(), z.id()]);
    assert!(ctx.children(x).is_empty());
    assert_eq!(ctx.len(), 3);
}

#[test]
fn composite_value_is_empty_until_evaluated() {
    let ctx = Context::with_config(Config::default());
    let x = ctx.variable(2.);
    assert_eq!((x + x).value(), None);
}

#[test]
fn multiplication_dispatch() {
    let ctx = Context::with_config(Config::default());
    let s = ctx.variable(3.);
    let v = ctx.variable([1., 2., 3.]);
    let m = ctx.variable([[1., 2., 3.], [4., 5., 6.]]);

    let sv = v * s;
    assert!(matches!(ctx.op(sv), Some(Op::ScalarMultiply(a, b)) if a == s.id() && b == v.id()));
    assert_eq!(sv.shape(), Shape::from(3));

    let vv = v * v;
    assert!(matches!(ctx.op(vv), Some(Op::ElemMultiply(..))));

    let mv = m * v;
    assert!(matches!(ctx.op(mv), Some(Op::MatVecMultiply(a, b)) if a == m.id() && b == v.id()));
    assert_eq!(mv.shape(), Shape::from(2));

    let two = 2. * m;
    assert!(matches!(ctx.op(two), Some(Op::ScalarMultiply(..))));
}

#[test]
fn construction_validates_shapes() -> Result<(), RevadError> {
    let ctx = Context::with_config(Config::default());
    let a = ctx.variable(Tensor::zeros(3));
    let b = ctx.variable(Tensor::zeros(4));
    assert!(matches!(ctx.elem_add(a, b), Err(RevadError::ShapeMismatch(..))));
    let m = ctx.variable(Tensor::zeros([4, 5]));
    let v = ctx.variable(Tensor::zeros(5));
    assert_eq!(ctx.matvec(m, v)?.shape(), Shape::from(4));
    Ok(())
}

#[test]
fn incompatible_shapes() {
    let ctx = Context::with_config(Config::default());
    let a = ctx.variable([1., 2., 3.]);
    let b = ctx.variable([1., 2.]);
    let m = ctx.variable([[1., 2., 3.], [4., 5., 6.]]);
    assert!(matches!(a.try_add(b), Err(RevadError::ShapeMismatch(..))));
    assert!(matches!(a.try_sub(b), Err(RevadError::ShapeMismatch(..))));
    assert!(matches!(a.try_mul(b), Err(RevadError::UnsupportedOperation(..))));
    assert!(matches!(ctx.matvec(m, b), Err(RevadError::ShapeMismatch(..))));
    assert!(matches!(ctx.elem_mul(a, m), Err(RevadError::ShapeMismatch(..))));
    assert!(matches!(ctx.scalar_mul(a, m), Err(RevadError::ShapeMismatch(..))));
    assert!(matches!(b.try_mul(m), Err(RevadError::UnsupportedOperation(..))));
}

#[test]
#[should_panic(expected = "Shape mismatch")]
fn operator_panics_on_shape_mismatch() {
    let ctx = Context::with_config(Config::default());
    let a = ctx.variable([1., 2., 3.]);
    let b = ctx.variable([1., 2.]);
    let _ = a + b;
}

#[test]
fn different_contexts() {
    let ctx1 = Context::with_config(Config::default());
    let ctx2 = Context::with_config(Config::default());
    let x = ctx1.variable(1.);
    let y = ctx2.variable(1.);
    assert!(matches!(x.try_add(y), Err(RevadError::UnsupportedOperation(..))));
    assert!(matches!(ctx2.negate(ctx1.variable(1.)), Err(RevadError::UnknownNode(..))));
}

#[test]
fn set_value() -> Result<(), RevadError> {
    let ctx = Context::with_config(Config::default());
    let x = ctx.variable([1., 2., 3.]);
    let c = ctx.constant(1.);
    x.set_value([4., 5., 6.])?;
    assert_eq!(x.value(), Some(Tensor::from([[4., 5., 6.]])));
    x.set_batched_value(Tensor::zeros([4, 3]))?;
    assert_eq!(x.value().map(|v| v.batch()), Some(4));
    assert!(matches!(x.set_value([1., 2.]), Err(RevadError::ShapeMismatch(..))));
    assert!(matches!(c.set_value(2.), Err(RevadError::UnsupportedOperation(..))));
    let y = x + x;
    assert!(matches!(y.set_value([1., 2., 3.]), Err(RevadError::UnsupportedOperation(..))));
    Ok(())
}

#[test]
fn elem_func_name() -> Result<(), RevadError> {
    let ctx = Context::with_config(Config::default());
    let x = ctx.variable([1., 2.]);
    let y = x.apply(ElemFunc::map("square", |x| x * x, |y| 2. * y.sqrt()))?;
    assert_eq!(ctx.op(y).map(|op| op.name().to_string()), Some(String::from("square")));
    Ok(())
}
