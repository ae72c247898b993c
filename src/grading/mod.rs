pub mod aggregate;
pub mod error;
pub mod evaluator;
pub mod label;
pub mod pipeline;
pub mod resolver;

pub use error::GradingError;
pub use label::{Grade, LotLabel};
pub use pipeline::GradingEngine;
