mod args;
mod executor;
mod field_error;
mod planner;
mod query_info;

pub use args::*;
pub use executor::*;
pub use field_error::*;
pub use planner::*;
pub use query_info::*;
