mod cache;
mod index;

pub use cache::*;
pub use index::*;
