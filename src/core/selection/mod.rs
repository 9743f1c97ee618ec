mod annotate;
mod model;
mod resolver;

pub use annotate::*;
pub use model::*;
pub use resolver::*;
