mod builder;
mod expression;
mod literal;
mod operator;

pub use builder::*;
pub use expression::*;
pub use literal::*;
pub use operator::*;
