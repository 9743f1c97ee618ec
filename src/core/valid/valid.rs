use super::ValidationError;

/// Result of a validation that keeps every independent failure instead of
/// stopping at the first one.
#[derive(Debug, PartialEq, Clone)]
pub struct Valid<A, E>(Result<A, ValidationError<E>>);

pub trait Validator<A, E>: Sized {
    fn to_result(self) -> Result<A, ValidationError<E>>;

    fn is_succeed(&self) -> bool;

    fn is_fail(&self) -> bool {
        !self.is_succeed()
    }

    fn map<A1>(self, f: impl FnOnce(A) -> A1) -> Valid<A1, E> {
        Valid(self.to_result().map(f))
    }

    fn unit(self) -> Valid<(), E> {
        self.map(|_| ())
    }

    /// Runs both validations and keeps the value of `other`. Failures of both
    /// sides are reported.
    fn and<A1>(self, other: Valid<A1, E>) -> Valid<A1, E> {
        self.zip(other).map(|(_, a1)| a1)
    }

    /// Runs both validations, accumulating failures of both sides.
    fn zip<A1>(self, other: Valid<A1, E>) -> Valid<(A, A1), E> {
        match (self.to_result(), other.0) {
            (Ok(a), Ok(a1)) => Valid(Ok((a, a1))),
            (Ok(_), Err(e1)) => Valid(Err(e1)),
            (Err(e1), Ok(_)) => Valid(Err(e1)),
            (Err(e1), Err(e2)) => Valid(Err(e1.combine(e2))),
        }
    }

    /// Dependent validation: `f` only runs once `self` has succeeded.
    fn and_then<B>(self, f: impl FnOnce(A) -> Valid<B, E>) -> Valid<B, E> {
        match self.to_result() {
            Ok(a) => f(a),
            Err(e) => Valid(Err(e)),
        }
    }

    fn trace(self, message: &str) -> Valid<A, E> {
        Valid(self.to_result().map_err(|e| e.trace(message)))
    }
}

impl<A, E> Valid<A, E> {
    pub fn fail(e: E) -> Valid<A, E> {
        Valid(Err(ValidationError::new(e)))
    }

    pub fn succeed(a: A) -> Valid<A, E> {
        Valid(Ok(a))
    }

    /// Validates every item, collecting the successes in order or every
    /// failure.
    pub fn from_iter<B>(
        iter: impl IntoIterator<Item = B>,
        mut f: impl FnMut(B) -> Valid<A, E>,
    ) -> Valid<Vec<A>, E> {
        let mut values: Vec<A> = Vec::new();
        let mut errors: ValidationError<E> = ValidationError::empty();
        for item in iter {
            match f(item).0 {
                Ok(a) => values.push(a),
                Err(err) => errors = errors.combine(err),
            }
        }

        if errors.is_empty() {
            Valid(Ok(values))
        } else {
            Valid(Err(errors))
        }
    }

    pub fn from_option(option: Option<A>, e: E) -> Valid<A, E> {
        match option {
            Some(a) => Valid::succeed(a),
            None => Valid::fail(e),
        }
    }
}

impl<E> Valid<(), E> {
    /// Fails with `e` when `condition` holds.
    pub fn when(condition: bool, e: impl FnOnce() -> E) -> Valid<(), E> {
        if condition {
            Valid::fail(e())
        } else {
            Valid::succeed(())
        }
    }
}

impl<A, E> Validator<A, E> for Valid<A, E> {
    fn to_result(self) -> Result<A, ValidationError<E>> {
        self.0
    }

    fn is_succeed(&self) -> bool {
        self.0.is_ok()
    }
}

impl<A, E> From<Result<A, ValidationError<E>>> for Valid<A, E> {
    fn from(value: Result<A, ValidationError<E>>) -> Self {
        Valid(value)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::core::valid::Cause;

    #[test]
    fn test_ok() {
        let result = Valid::<i32, ()>::succeed(1);
        assert_eq!(result.to_result(), Ok(1));
    }

    #[test]
    fn test_fail() {
        let result = Valid::<(), i32>::fail(1);
        assert_eq!(result.to_result(), Err(ValidationError::new(1)));
    }

    #[test]
    fn test_zip_accumulates() {
        let result = Valid::<(), i32>::fail(1).zip(Valid::<(), i32>::fail(2));
        assert_eq!(
            result.to_result(),
            Err(vec![Cause::new(1), Cause::new(2)].into())
        );
    }

    #[test]
    fn test_and_keeps_right_value() {
        let result = Valid::<bool, i32>::succeed(true).and(Valid::succeed(3u8));
        assert_eq!(result.to_result(), Ok(3u8));
    }

    #[test]
    fn test_and_then_short_circuits() {
        let mut called = false;
        let result = Valid::<(), i32>::fail(1).and_then(|_| {
            called = true;
            Valid::<(), i32>::fail(2)
        });
        assert!(!called);
        assert_eq!(result.to_result(), Err(ValidationError::new(1)));
    }

    #[test]
    fn test_from_iter() {
        let result = Valid::from_iter([1, 2, 3], |a| Valid::<(), i32>::fail(a * 2));
        assert_eq!(
            result.to_result(),
            Err(vec![Cause::new(2), Cause::new(4), Cause::new(6)].into())
        );
    }

    #[test]
    fn test_from_option() {
        let result = Valid::from_option(None::<i32>, "missing");
        assert_eq!(result.to_result(), Err(ValidationError::new("missing")));
    }

    #[test]
    fn test_trace() {
        let result = Valid::<(), i32>::fail(1).trace("A").trace("B").trace("C");
        let expected = ValidationError::from(vec![Cause::new(1).trace(["C", "B", "A"])]);
        assert_eq!(result.to_result(), Err(expected));
    }

    #[test]
    fn test_when() {
        assert!(Valid::when(false, || "never").is_succeed());
        assert!(Valid::when(true, || "always").is_fail());
    }
}
