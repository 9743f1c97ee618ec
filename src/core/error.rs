use derive_more::From;

use super::config::UnsupportedConfigFormat;
use super::valid::ValidationError;

#[derive(From, thiserror::Error, Debug)]
pub enum Error {
    #[error("Filter Syntax Error: {}", _0)]
    #[from(ignore)]
    FilterSyntax(ValidationError<String>),

    #[error("Query Constraint Error: {}", _0)]
    #[from(ignore)]
    QueryConstraint(ValidationError<String>),

    /// Failures of the remote store are forwarded as they are.
    #[error("{}", _0)]
    Transport(anyhow::Error),

    #[error("GraphQL Parse Error: {}", _0)]
    Parse(async_graphql::parser::Error),

    #[error("Selection Error: {}", _0)]
    #[from(ignore)]
    Resolution(String),

    #[error("Annotation Error: {}", _0)]
    #[from(ignore)]
    Annotation(String),

    #[error("Invalid Response: {}", _0)]
    #[from(ignore)]
    InvalidResponse(String),

    #[error("Std IO Error")]
    StdIO(std::io::Error),

    #[error("Serde Json Error: {}", _0)]
    SerdeJson(serde_json::Error),

    #[error("Serde Yaml Error: {}", _0)]
    SerdeYaml(serde_yaml::Error),

    #[error("Unsupported Config Format")]
    UnsupportedConfigFormat(UnsupportedConfigFormat),
}

pub type Result<A, E = Error> = std::result::Result<A, E>;
