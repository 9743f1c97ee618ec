#[allow(clippy::module_inception)]
mod config;
mod source;

pub use config::*;
pub use source::*;
