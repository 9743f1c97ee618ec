use derive_setters::Setters;
use serde::Deserialize;
use serde_json::{Map, Value};

/// A GraphQL request as it arrives over the wire.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Setters)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    #[setters(skip)]
    pub query: String,
    #[serde(default)]
    #[setters(strip_option, into)]
    pub operation_name: Option<String>,
    #[serde(default)]
    pub variables: Map<String, Value>,
}

impl Request {
    pub fn new(query: impl Into<String>) -> Self {
        Self { query: query.into(), ..Default::default() }
    }
}
