mod cause;
mod error;
mod valid;

pub use cause::*;
pub use error::*;
pub use valid::*;
