//! Custom assertion utilities for tests.

use std::fmt::Debug;
use std::hash::Hash;

use super::dao::CallLog;

/// Assert that an error message contains expected text (case-insensitive).
///
/// Uses the alternate format so every `anyhow` context layer is searched.
pub fn assert_error_contains(error: &anyhow::Error, expected_text: &str, context: &str) {
    let error_str = format!("{error:#}").to_lowercase();
    let expected_lower = expected_text.to_lowercase();

    assert!(
        error_str.contains(&expected_lower),
        "{}: error message should contain '{}', got: {:#}",
        context,
        expected_text,
        error
    );
}

/// Assert that no id was handed to a DAO method twice.
pub fn assert_no_repeats<K: Clone + Eq + Hash + Debug>(log: &CallLog<K>, what: &str) {
    let repeated = log.repeated();
    assert!(
        repeated.is_empty(),
        "{} fetched ids more than once: {:?}",
        what,
        repeated
    );
}
