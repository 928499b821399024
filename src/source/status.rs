use regex::Regex;
use std::sync::LazyLock;

/// Label preceding the status code inside an event message.
pub const STATUS_LABEL: &str = "HTTP Status Code:";

/// The one code treated as a clean success by the sliding window.
pub const CANONICAL_SUCCESS: u64 = 200;

static STATUS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"HTTP Status Code:\s*(\d+)").expect("status pattern is valid"));

/// The digit run following `HTTP Status Code:` (after optional whitespace),
/// exactly as written in the message.
pub fn status_digits(message: &str) -> Option<&str> {
    Some(STATUS_PATTERN.captures(message)?.get(1)?.as_str())
}

/// Extract the HTTP status code from an event message.
///
/// Returns `None` if the label is missing or the digits do not fit in a `u64`.
pub fn extract_status_code(message: &str) -> Option<u64> {
    status_digits(message)?.parse().ok()
}

/// A code counts as a success when its leading digit is 2, whatever its length
pub fn is_success(digits: &str) -> bool {
    digits.starts_with('2')
}

/// Whether the message carries a status code classified as a success
pub fn is_success_message(message: &str) -> bool {
    status_digits(message).is_some_and(is_success)
}
