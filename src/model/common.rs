use chrono::{DateTime, Utc};

/// Primary keys are assigned by the store.
pub type Id = i64;

pub type Timestamp = DateTime<Utc>;

/// Default label colors, matching what the labeling UI renders when none are given.
pub const DEFAULT_BACKGROUND_COLOR: &str = "#209cee";
pub const DEFAULT_TEXT_COLOR: &str = "#ffffff";

/// Treats an empty string the same as a missing value.
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}
