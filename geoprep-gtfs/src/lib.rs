pub mod cache;
pub mod dataset;
pub mod error;
pub mod fetch;
pub mod graph;
pub mod parse;
pub mod score;

pub use error::GtfsError;
