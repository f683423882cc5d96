use rand::{rngs::SmallRng, SeedableRng};
use revad_core::{Config, Context, ElemFunc, Graph, RevadError, Shape, Tensor};

const SEED: u64 = 69420;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn ctx() -> Context {
    init();
    Context::with_config(Config { debug: 7, ..Config::default() })
}

#[test]
fn grad_add_self() -> Result<(), RevadError> {
    let ctx = ctx();
    let x = ctx.variable(3.);
    let y = x + x;
    let mut graph = Graph::new(&ctx, y)?;
    graph.calc_gradients(&ctx)?;
    assert_eq!(y.value().and_then(|v| v.item()), Some(6.));
    assert_eq!(graph.gradient(x).and_then(Tensor::item), Some(2.));
    Ok(())
}

#[test]
fn grad_mul_self() -> Result<(), RevadError> {
    let ctx = ctx();
    let x = ctx.variable([3., -1.]);
    let y = x * x;
    let mut graph = Graph::new(&ctx, y)?;
    graph.calc_gradients(&ctx)?;
    assert_eq!(graph.gradient(x), Some(&Tensor::from([[6., -2.]])));
    Ok(())
}

#[test]
fn grad_square_of_sum() -> Result<(), RevadError> {
    let ctx = ctx();
    let x = ctx.variable(2.);
    let y = (x + 1.) * (x + 1.);
    let mut graph = Graph::new(&ctx, y)?;
    graph.calc_gradients(&ctx)?;
    assert_eq!(y.value().and_then(|v| v.item()), Some(9.));
    assert_eq!(graph.gradient(x).and_then(Tensor::item), Some(6.));
    Ok(())
}

#[test]
fn grad_sub() -> Result<(), RevadError> {
    let ctx = ctx();
    let x = ctx.variable([1., 2.]);
    let y = ctx.variable([5., 7.]);
    let z = x - y;
    let mut graph = Graph::new(&ctx, z)?;
    graph.calc_gradients(&ctx)?;
    assert_eq!(z.value(), Some(Tensor::from([[-4., -5.]])));
    assert_eq!(graph.gradient(x), Some(&Tensor::from([[1., 1.]])));
    assert_eq!(graph.gradient(y), Some(&Tensor::from([[-1., -1.]])));
    Ok(())
}

#[test]
fn grad_scalar_multiply() -> Result<(), RevadError> {
    let ctx = ctx();
    let s = ctx.variable(3.);
    let v = ctx.variable([1., 2., 3.]);
    let y = s * v;
    let mut graph = Graph::new(&ctx, y)?;
    graph.calc_gradients(&ctx)?;
    assert_eq!(y.value(), Some(Tensor::from([[3., 6., 9.]])));
    assert_eq!(graph.gradient(v), Some(&Tensor::from([[3., 3., 3.]])));
    assert_eq!(graph.gradient(s), Some(&Tensor::from([6.])));
    Ok(())
}

#[test]
fn grad_matvec() -> Result<(), RevadError> {
    let ctx = ctx();
    let m = ctx.variable([[1., 2., 3.], [4., 5., 6.]]);
    let v = ctx.variable([1., 0., -1.]);
    let y = m * v;
    let mut graph = Graph::new(&ctx, y)?;
    graph.calc_gradients(&ctx)?;
    assert_eq!(y.value(), Some(Tensor::from([[-2., -2.]])));
    let m_grad = graph.gradient(m).cloned().unwrap();
    assert_eq!(m_grad.shape(), &Shape::from([1, 2, 3]));
    assert_eq!(m_grad.to_vec(), [1., 0., -1., 1., 0., -1.]);
    assert_eq!(graph.gradient(v), Some(&Tensor::from([[5., 7., 9.]])));
    Ok(())
}

#[test]
fn grad_negate() -> Result<(), RevadError> {
    let ctx = ctx();
    let x = ctx.variable([1., -2.]);
    let y = -(x * x);
    let mut graph = Graph::new(&ctx, y)?;
    graph.calc_gradients(&ctx)?;
    assert_eq!(graph.gradient(x), Some(&Tensor::from([[-2., 4.]])));
    Ok(())
}

#[test]
fn grad_relu() -> Result<(), RevadError> {
    let ctx = ctx();
    let relu = ElemFunc::map("relu", |x| x.max(0.), |y| if y > 0. { 1. } else { 0. });
    let x = ctx.variable([-1., 2., 0.]);
    let y = x.apply(relu)?;
    let mut graph = Graph::new(&ctx, y)?;
    graph.calc_gradients(&ctx)?;
    assert_eq!(y.value(), Some(Tensor::from([[0., 2., 0.]])));
    assert_eq!(graph.gradient(x), Some(&Tensor::from([[0., 1., 0.]])));
    Ok(())
}

#[test]
fn elem_func_with_wrong_output_shape() -> Result<(), RevadError> {
    let ctx = ctx();
    let bad = ElemFunc::new("bad", |_: &Tensor| Tensor::zeros([1, 7]), |y: &Tensor| y.clone());
    let x = ctx.variable([1., 2.]);
    let y = x.apply(bad)?;
    let graph = Graph::new(&ctx, y)?;
    assert!(matches!(graph.calc_values(&ctx), Err(RevadError::ShapeMismatch(..))));
    Ok(())
}

#[test]
fn grad_batched() -> Result<(), RevadError> {
    let ctx = ctx();
    let x = ctx.batched_variable(Tensor::from([[1., 2.], [3., 4.], [5., 6.]]))?;
    let w = ctx.variable([10., 20.]);
    let y = x * w;
    let mut graph = Graph::new(&ctx, y)?;
    graph.calc_gradients(&ctx)?;
    assert_eq!(y.value(), Some(Tensor::from([[10., 40.], [30., 80.], [50., 120.]])));
    assert_eq!(graph.gradient(x), Some(&Tensor::from([[10., 20.], [10., 20.], [10., 20.]])));
    // w has batch of size 1, so it's gradient is summed over batch
    assert_eq!(graph.gradient(w), Some(&Tensor::from([[9., 12.]])));
    Ok(())
}

#[test]
fn grad_batched_matvec() -> Result<(), RevadError> {
    let ctx = ctx();
    let m = ctx.variable([[1., 0.], [0., 2.]]);
    let x = ctx.batched_variable(Tensor::from([[1., 1.], [2., 3.]]))?;
    let y = m * x;
    let mut graph = Graph::new(&ctx, y)?;
    graph.calc_gradients(&ctx)?;
    assert_eq!(y.value(), Some(Tensor::from([[1., 2.], [2., 6.]])));
    assert_eq!(graph.gradient(x), Some(&Tensor::from([[1., 2.], [1., 2.]])));
    let m_grad = graph.gradient(m).cloned().unwrap();
    assert_eq!(m_grad.shape(), &Shape::from([1, 2, 2]));
    assert_eq!(m_grad.to_vec(), [3., 4., 3., 4.]);
    Ok(())
}

#[test]
fn expression() -> Result<(), RevadError> {
    let ctx = ctx();
    let one = ctx.constant(1.);
    let x = ctx.variable(2.);
    let y = ctx.variable(2.);
    let res = (y + y) + 2. * ((x + one) * (x + one) + one - one + one - one);
    let mut graph = Graph::new(&ctx, res)?;
    graph.calc_gradients(&ctx)?;
    assert_eq!(res.value().and_then(|v| v.item()), Some(22.));
    assert_eq!(graph.gradient(x).and_then(Tensor::item), Some(12.));
    assert_eq!(graph.gradient(y).and_then(Tensor::item), Some(2.));

    // Substituted value is used by the next evaluation
    x.set_value(3.)?;
    graph.calc_gradients(&ctx)?;
    assert_eq!(res.value().and_then(|v| v.item()), Some(36.));
    assert_eq!(graph.gradient(x).and_then(Tensor::item), Some(16.));
    Ok(())
}

#[test]
fn gradients_are_not_accumulated_between_calls() -> Result<(), RevadError> {
    let ctx = ctx();
    let x = ctx.variable([1., 2.]);
    let y = x * x + x;
    let mut graph = Graph::new(&ctx, y)?;
    let first = graph.calc_gradients(&ctx)?.clone();
    let second = graph.calc_gradients(&ctx)?.clone();
    assert_eq!(first, second);
    assert_eq!(graph.gradient(x), Some(&Tensor::from([[3., 5.]])));
    Ok(())
}

#[test]
fn finite_differences() -> Result<(), RevadError> {
    let ctx = ctx();
    let mut rng = SmallRng::seed_from_u64(SEED);
    let x = ctx.variable(Tensor::uniform(3, -1.0..1.0, &mut rng));
    let w = ctx.variable(Tensor::uniform([2, 3], -1.0..1.0, &mut rng));
    let a = ctx.variable(Tensor::uniform((), 0.5..1.5, &mut rng));
    let sigmoid = ElemFunc::map("sigmoid", |x| 1. / (1. + (-x).exp()), |y| y * (1. - y));
    let h = (w * x).apply(sigmoid)?;
    let y = a * (h * h) - h;
    let mut graph = Graph::new(&ctx, y)?;
    let x_grad = graph.calc_gradients(&ctx)?.get(&x.id()).cloned().unwrap();

    let x0 = x.value().unwrap().to_vec();
    let eps = 1e-6;
    let f = |data: &[f64]| -> Result<f64, RevadError> {
        x.set_value(data)?;
        graph.calc_values(&ctx)?;
        Ok(y.value().map_or(0., |v| v.sum()))
    };
    for i in 0..x0.len() {
        let mut plus = x0.clone();
        plus[i] += eps;
        let mut minus = x0.clone();
        minus[i] -= eps;
        let numeric = (f(&plus)? - f(&minus)?) / (2. * eps);
        let analytic = x_grad.data()[i];
        assert!((numeric - analytic).abs() < 1e-5, "{i}: {numeric} != {analytic}");
    }
    Ok(())
}
