mod engine;
mod request;
mod response;

pub use engine::*;
pub use request::*;
pub use response::*;
