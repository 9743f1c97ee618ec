use serde::Serialize;
use serde_json::{Map, Value};

use crate::core::plan::FieldError;

/// `{ data, errors }` as returned to the client. `data` is `null` when the
/// request failed before any field was resolved.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Response {
    pub data: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

impl Response {
    pub fn new(data: Map<String, Value>, errors: Vec<FieldError>) -> Self {
        Self { data: Value::Object(data), errors }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { data: Value::Null, errors: vec![FieldError::new(message, Vec::new())] }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}
