use std::collections::VecDeque;
use std::fmt::Display;

/// A single validation failure along with the path of names that lead to it.
#[derive(Clone, PartialEq, Debug)]
pub struct Cause<E> {
    pub message: E,
    pub trace: VecDeque<String>,
}

impl<E> Cause<E> {
    pub fn new(e: E) -> Self {
        Cause { message: e, trace: VecDeque::new() }
    }

    pub fn trace<T: Display>(mut self, trace: impl IntoIterator<Item = T>) -> Self {
        self.trace = trace.into_iter().map(|t| t.to_string()).collect();
        self
    }
}

impl<E: Display> Display for Cause<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if !self.trace.is_empty() {
            let trace = self.trace.iter().cloned().collect::<Vec<_>>().join(", ");
            write!(f, " [{}]", trace)?;
        }
        Ok(())
    }
}
