use clap::Parser;
use rand::{rngs::SmallRng, SeedableRng};
use revad_core::{Context, Graph, RevadError, Tensor};
use revad_nn::Activation;

#[derive(Parser, Debug)]
#[command(author, version, about = "Gradients of single dense layer over a batch of inputs", long_about = None)]
struct Args {
    /// Number of inputs in batch
    #[arg(long, short = 'b', default_value_t = 4)]
    batch: usize,

    /// Input features
    #[arg(long, default_value_t = 3)]
    inputs: usize,

    /// Output features
    #[arg(long, default_value_t = 2)]
    outputs: usize,

    /// The seed to use when generating random weights and inputs.
    #[arg(long, default_value_t = 69420)]
    seed: u64,

    /// Activation, one of relu, leaky_relu, sigmoid, tanh, softplus
    #[arg(long, default_value = "relu")]
    activation: String,
}

fn main() -> Result<(), RevadError> {
    env_logger::init();
    let args = Args::parse();
    let activation = match args.activation.as_str() {
        "relu" => Activation::Relu,
        "leaky_relu" => Activation::LeakyRelu(0.01),
        "sigmoid" => Activation::Sigmoid,
        "tanh" => Activation::Tanh,
        "softplus" => Activation::Softplus,
        other => return Err(RevadError::parse_error(format!("unknown activation {other}"))),
    };
    let mut rng = SmallRng::seed_from_u64(args.seed);

    let ctx = Context::new();
    let w = ctx.variable(Tensor::uniform([args.outputs, args.inputs], -1.0..1.0, &mut rng));
    let b = ctx.variable(Tensor::uniform(args.outputs, -1.0..1.0, &mut rng));
    let x = ctx.batched_constant(Tensor::uniform([args.batch, args.inputs], -1.0..1.0, &mut rng))?;
    let h = ctx.matvec(w, x)?.try_add(b)?;
    let y = activation.forward(h)?;

    let mut graph = Graph::new(&ctx, y)?;
    graph.calc_gradients(&ctx)?;
    log::info!("Ordering {:?}", graph.ordering());

    if let Some(value) = y.value() {
        println!("y =\n{value}");
    }
    if let Some(grad) = graph.gradient(w) {
        println!("dy/dw summed over batch =\n{grad}");
    }
    if let Some(grad) = graph.gradient(b) {
        println!("dy/db summed over batch =\n{grad}");
    }
    Ok(())
}
