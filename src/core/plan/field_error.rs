use std::fmt::{Display, Formatter};

use serde::Serialize;

/// One step of a response path: a response key or a list position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(value: &str) -> Self {
        PathSegment::Field(value.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(value: usize) -> Self {
        PathSegment::Index(value)
    }
}

impl Display for PathSegment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PathSegment::Field(name) => f.write_str(name),
            PathSegment::Index(index) => write!(f, "{}", index),
        }
    }
}

/// A failure that nulled a single field of the response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub message: String,
    pub path: Vec<PathSegment>,
}

impl FieldError {
    pub fn new(message: impl Into<String>, path: Vec<PathSegment>) -> Self {
        Self { message: message.into(), path }
    }
}

impl Display for FieldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let path = self.path.iter().map(ToString::to_string).collect::<Vec<_>>();
        write!(f, "{} at {}", self.message, path.join("."))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_serialize_path() {
        let error = FieldError::new("session expired", vec!["Jedi".into(), 0.into(), "Padawans".into()]);
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            json!({ "message": "session expired", "path": ["Jedi", 0, "Padawans"] })
        );
        assert_eq!(error.to_string(), "session expired at Jedi.0.Padawans");
    }
}
