mod ast;
mod compiler;

pub use ast::*;
pub use compiler::*;
