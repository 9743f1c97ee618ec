mod model;
mod scalar;

pub use model::*;
pub use scalar::*;
