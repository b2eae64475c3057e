//! ID generation utilities.

use uuid::Uuid;

/// Generate a new UUID v4.
///
/// Used for every store-generated row id; callers never supply ids.
pub fn uuid() -> String {
    Uuid::new_v4().to_string()
}
