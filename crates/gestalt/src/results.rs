//! The accumulating result container used throughout the pipeline.
//!
//! A [`Validated`] carries an optional value together with every
//! [`ValidationError`] observed while producing it. A result-bearing
//! container may still carry non-fatal errors (warnings, absorbed misses);
//! a value-less container always carries at least one error. Combinators
//! never drop errors.

use crate::error::{ErrorLevel, ValidationError};

/// Optional value plus the full list of validation errors behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct Validated<T> {
    value: Option<T>,
    errors: Vec<ValidationError>,
}

impl<T> Validated<T> {
    /// A successful result with no errors.
    #[must_use]
    pub fn valid(value: T) -> Self {
        Self { value: Some(value), errors: Vec::new() }
    }

    /// A value-less result carrying a single error.
    #[must_use]
    pub fn invalid(error: ValidationError) -> Self {
        Self { value: None, errors: vec![error] }
    }

    /// A value-less result carrying the given errors.
    #[must_use]
    pub fn errors(errors: Vec<ValidationError>) -> Self {
        debug_assert!(!errors.is_empty(), "a value-less result must carry at least one error");
        Self { value: None, errors }
    }

    /// A result from an optional value and accumulated errors.
    #[must_use]
    pub fn of(value: Option<T>, errors: Vec<ValidationError>) -> Self {
        debug_assert!(
            value.is_some() || !errors.is_empty(),
            "a value-less result must carry at least one error"
        );
        Self { value, errors }
    }

    #[must_use]
    pub fn has_results(&self) -> bool {
        self.value.is_some()
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    #[must_use]
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    #[must_use]
    pub fn into_value(self) -> Option<T> {
        self.value
    }

    #[must_use]
    pub fn error_list(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Splits the container into its value and error list.
    #[must_use]
    pub fn into_parts(self) -> (Option<T>, Vec<ValidationError>) {
        (self.value, self.errors)
    }

    /// The highest severity among the accumulated errors.
    #[must_use]
    pub fn max_level(&self) -> Option<ErrorLevel> {
        self.errors.iter().map(ValidationError::level).max()
    }

    pub fn push_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_errors(&mut self, errors: impl IntoIterator<Item = ValidationError>) {
        self.errors.extend(errors);
    }

    /// Maps the value, keeping the accumulated errors.
    #[must_use]
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Validated<U> {
        Validated { value: self.value.map(f), errors: self.errors }
    }

    /// Chains a fallible step, concatenating both error sets.
    ///
    /// When no value is present the step does not run and the existing
    /// errors carry through.
    #[must_use]
    pub fn and_then<U>(self, f: impl FnOnce(T) -> Validated<U>) -> Validated<U> {
        let mut errors = self.errors;
        match self.value {
            Some(value) => {
                let mut next = f(value);
                errors.append(&mut next.errors);
                Validated { value: next.value, errors }
            },
            None => Validated { value: None, errors },
        }
    }

    /// Absorbs another result's errors, returning its value.
    pub fn merge_errors<U>(&mut self, other: Validated<U>) -> Option<U> {
        self.errors.extend(other.errors);
        other.value
    }

    /// Merges a collection of results: errors are unioned and the value is
    /// the full list only when every input carried one.
    #[must_use]
    pub fn merge(results: impl IntoIterator<Item = Validated<T>>) -> Validated<Vec<T>> {
        let mut errors = Vec::new();
        let mut values = Vec::new();
        let mut complete = true;
        for result in results {
            errors.extend(result.errors);
            match result.value {
                Some(value) => values.push(value),
                None => complete = false,
            }
        }
        Validated { value: complete.then_some(values), errors }
    }
}
