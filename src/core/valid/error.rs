use std::fmt::{Debug, Display};

use super::Cause;

/// Every cause collected while validating one input.
#[derive(Debug, PartialEq, Default, Clone)]
pub struct ValidationError<E>(Vec<Cause<E>>);

impl<E: Display> Display for ValidationError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lines = self.0.iter().map(|cause| cause.to_string()).collect::<Vec<_>>();
        f.write_str(&lines.join("\n"))
    }
}

impl<E> ValidationError<E> {
    pub fn new(e: E) -> Self {
        ValidationError(vec![Cause::new(e)])
    }

    pub fn empty() -> Self {
        ValidationError(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn combine(mut self, mut other: ValidationError<E>) -> ValidationError<E> {
        self.0.append(&mut other.0);
        self
    }

    /// Prepends `message` to the trace of every cause.
    pub fn trace(self, message: &str) -> Self {
        let mut errors = self.0;
        for cause in errors.iter_mut() {
            cause.trace.push_front(message.to_owned());
        }
        Self(errors)
    }
}

impl<E: Display + Debug> std::error::Error for ValidationError<E> {}

impl<E> From<Vec<Cause<E>>> for ValidationError<E> {
    fn from(value: Vec<Cause<E>>) -> Self {
        ValidationError(value)
    }
}
