//! Caller-supplied work request.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_MAX_ITERATIONS, MAX_ITERATIONS, MAX_QUERY_CHARS, MIN_ITERATIONS, MIN_QUERY_CHARS,
};
use crate::error::TaskError;

fn default_max_iterations() -> u32 {
    DEFAULT_MAX_ITERATIONS
}

/// The immutable input of a research task.
///
/// Deserializes from the request body of `POST /research`; omitted optional
/// fields take their defaults.
///
/// # Examples
///
/// ```
/// use research_tasks::TaskInput;
///
/// let input: TaskInput = serde_json::from_str(r#"{"query": "tokio internals"}"#).unwrap();
/// assert_eq!(input.max_iterations, 10);
/// assert!(!input.create_report);
/// assert!(input.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInput {
    /// The research question.
    pub query: String,
    /// Upper bound on research iterations.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Whether the worker should write a report artifact.
    #[serde(default)]
    pub create_report: bool,
    /// Optional wall-clock budget for execution, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_secs: Option<u64>,
}

impl TaskInput {
    /// Creates an input with default iteration count and no report.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            create_report: false,
            deadline_secs: None,
        }
    }

    /// Sets the iteration bound.
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Requests a report artifact.
    pub fn with_report(mut self, create_report: bool) -> Self {
        self.create_report = create_report;
        self
    }

    /// Sets the execution deadline.
    pub fn with_deadline_secs(mut self, secs: u64) -> Self {
        self.deadline_secs = Some(secs);
        self
    }

    /// Returns the per-task deadline, if one was requested.
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }

    /// Checks the request against the accepted ranges.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidInput`] naming the first offending field.
    pub fn validate(&self) -> Result<(), TaskError> {
        let chars = self.query.chars().count();
        if self.query.trim().is_empty() {
            return Err(TaskError::invalid_input("query", "must not be blank"));
        }
        if !(MIN_QUERY_CHARS..=MAX_QUERY_CHARS).contains(&chars) {
            return Err(TaskError::invalid_input(
                "query",
                format!(
                    "length must be between {MIN_QUERY_CHARS} and {MAX_QUERY_CHARS} characters (got {chars})"
                ),
            ));
        }
        if !(MIN_ITERATIONS..=MAX_ITERATIONS).contains(&self.max_iterations) {
            return Err(TaskError::invalid_input(
                "max_iterations",
                format!(
                    "must be between {MIN_ITERATIONS} and {MAX_ITERATIONS} (got {})",
                    self.max_iterations
                ),
            ));
        }
        if self.deadline_secs == Some(0) {
            return Err(TaskError::invalid_input(
                "deadline_secs",
                "must be at least 1 second when set",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("ab", 10, "query")]
    #[case("   ", 10, "query")]
    #[case("valid query", 0, "max_iterations")]
    #[case("valid query", 21, "max_iterations")]
    fn rejects_out_of_range(#[case] query: &str, #[case] iterations: u32, #[case] field: &str) {
        let input = TaskInput::new(query).with_max_iterations(iterations);
        match input.validate() {
            Err(TaskError::InvalidInput { field: f, .. }) => assert_eq!(f, field),
            other => panic!("expected InvalidInput on {field}, got {other:?}"),
        }
    }

    #[rstest]
    #[case("abc", 1)]
    #[case("what is a monad", 20)]
    fn accepts_boundaries(#[case] query: &str, #[case] iterations: u32) {
        assert!(TaskInput::new(query)
            .with_max_iterations(iterations)
            .validate()
            .is_ok());
    }

    #[test]
    fn query_length_counts_characters_not_bytes() {
        // Three multi-byte characters are long enough.
        assert!(TaskInput::new("äöü").validate().is_ok());
        let long = "é".repeat(MAX_QUERY_CHARS);
        assert!(TaskInput::new(long).validate().is_ok());
        let too_long = "x".repeat(MAX_QUERY_CHARS + 1);
        assert!(TaskInput::new(too_long).validate().is_err());
    }

    #[test]
    fn zero_deadline_is_rejected() {
        let err = TaskInput::new("deadline check")
            .with_deadline_secs(0)
            .validate()
            .unwrap_err();
        assert!(matches!(err, TaskError::InvalidInput { field: "deadline_secs", .. }));
        assert_eq!(
            TaskInput::new("deadline check").with_deadline_secs(5).deadline(),
            Some(Duration::from_secs(5))
        );
    }

    #[test]
    fn deadline_omitted_from_json_when_unset() {
        let json = serde_json::to_value(TaskInput::new("serde check")).unwrap();
        assert!(json.get("deadline_secs").is_none());
        assert_eq!(json["max_iterations"], 10);
    }
}
