//! Structural validation failures.
//!
//! A validation pass over an input produces a set of [`Violation`]s; an empty
//! set means the input passed. The pipeline never interprets the messages, it
//! only carries them into [`crate::HandlerError::Validation`] and renders them
//! for logs.

use serde::{Deserialize, Serialize};

/// One structured validation failure: a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    message: String,
}

impl Violation {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// The outcome of a structural validation pass. Empty means valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violations(Vec<Violation>);

impl Violations {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn of(violations: impl IntoIterator<Item = Violation>) -> Self {
        Self(violations.into_iter().collect())
    }

    /// Convenience for the common single-message case.
    pub fn single(message: impl Into<String>) -> Self {
        Self(vec![Violation::new(message)])
    }

    pub fn push(&mut self, violation: Violation) {
        self.0.push(violation);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.0.iter()
    }

    /// Renders all messages, newline-joined, for log output.
    pub fn render(&self) -> String {
        self.0
            .iter()
            .map(Violation::message)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl std::fmt::Display for Violations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

impl IntoIterator for Violations {
    type Item = Violation;
    type IntoIter = std::vec::IntoIter<Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<Violation> for Violations {
    fn from_iter<I: IntoIterator<Item = Violation>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_valid() {
        let violations = Violations::empty();
        assert!(violations.is_empty());
        assert_eq!(violations.render(), "");
    }

    #[test]
    fn test_render_joins_messages_with_newlines() {
        let violations = Violations::of([
            Violation::new("age must not be negative"),
            Violation::new("name must not be empty"),
        ]);
        assert_eq!(
            violations.render(),
            "age must not be negative\nname must not be empty"
        );
    }

    #[test]
    fn test_single_constructor() {
        let violations = Violations::single("broken");
        assert_eq!(violations.len(), 1);
        assert_eq!(violations.iter().next().unwrap().message(), "broken");
    }
}
