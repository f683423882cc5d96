use clap::Parser;
use revad_core::{Context, Graph, RevadError};

#[derive(Parser, Debug)]
#[command(author, version, about = "Evaluate and differentiate (y + y) + 2((x + 1)^2 + 1 - 1 + 1 - 1)", long_about = None)]
struct Args {
    /// Value of x
    #[arg(long, default_value_t = 2.)]
    x: f64,

    /// Value of y
    #[arg(long, default_value_t = 2.)]
    y: f64,

    /// Write graph in dot format into this file
    #[arg(long)]
    dot: Option<String>,
}

fn main() -> Result<(), RevadError> {
    env_logger::init();
    let args = Args::parse();

    let ctx = Context::new();
    let one = ctx.constant(1.);
    let x = ctx.variable(args.x);
    let y = ctx.variable(args.y);
    let res = (y + y) + 2. * ((x + one) * (x + one) + one - one + one - one);

    let mut graph = Graph::new(&ctx, res)?;
    graph.calc_gradients(&ctx)?;
    log::info!("Evaluated {} nodes", graph.ordering().len());

    if let Some(value) = res.value() {
        println!("res = {value}");
    }
    for (name, node) in [("x", x), ("y", y), ("one", one)] {
        if let Some(grad) = graph.gradient(node) {
            println!("d res / d {name} = {grad}");
        }
    }
    if let Some(path) = args.dot {
        graph.write_dot(&ctx, &path)?;
        println!("Graph written into {path}");
    }
    Ok(())
}
