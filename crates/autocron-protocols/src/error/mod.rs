//! Error types for the autocron protocol layer.

mod collaborator;
mod schedule;
mod store;
mod validation;

pub use collaborator::*;
pub use schedule::*;
pub use store::*;
pub use validation::*;
