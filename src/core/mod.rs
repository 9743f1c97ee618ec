#![allow(clippy::module_inception)]

pub mod config;
pub mod datetime;
pub mod engine;
pub mod error;
pub mod filter;
pub mod plan;
pub mod registry;
pub mod selection;
pub mod soql;
pub mod surface;
pub mod tracing;
pub mod tree;
pub mod valid;

pub use error::{Error, Result};
