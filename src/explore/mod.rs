//! Neighborhood exploration: move enumeration, delta evaluation, selection.

mod explorer;
mod multimodal;

pub use explorer::{EvaluatedMove, NeighborhoodExplorer, Selection};
pub use multimodal::{
    ProductExplorer, ProductInverse, ProductMove, UnionExplorer, UnionInverse, UnionMove,
};
