//! # revad-core
//!
//! revad-core is reverse mode automatic differentiation over computation graphs.
//! Nodes are created in [`Context`], combined with operators through [`Expr`]
//! handles and evaluated and differentiated by [`Graph`].
//!
//! ```
//! use revad_core::{Context, Graph};
//! let ctx = Context::new();
//! let x = ctx.variable(2.);
//! let y = (x + 1.) * (x + 1.);
//! let mut graph = Graph::new(&ctx, y)?;
//! graph.calc_gradients(&ctx)?;
//! assert_eq!(graph.gradient(x).and_then(|g| g.item()), Some(6.));
//! # Ok::<(), revad_core::RevadError>(())
//! ```
#![forbid(unsafe_code)]
#![forbid(rustdoc::broken_intra_doc_links)]
#![forbid(rustdoc::private_intra_doc_links)]
#![forbid(missing_docs)]
#![forbid(rustdoc::missing_crate_level_docs)]
#![forbid(rustdoc::private_doc_tests)]
#![forbid(rustdoc::invalid_codeblock_attributes)]
#![forbid(rustdoc::invalid_html_tags)]
#![forbid(rustdoc::invalid_rust_codeblocks)]
#![forbid(rustdoc::bare_urls)]
#![forbid(rustdoc::unescaped_backticks)]
#![forbid(rustdoc::redundant_explicit_links)]

mod config;
mod context;
mod error;
mod expr;
mod graph;
mod node;
mod shape;
mod tensor;

pub use config::{Config, DotConfig};
pub use context::{Context, LeafKind};
pub use error::RevadError;
pub use expr::{Expr, Operand};
pub use graph::Graph;
pub use node::{ElemFunc, NodeId, Op, OpChildrenIterator};
pub use shape::{Shape, ShapeKind};
pub use tensor::Tensor;
