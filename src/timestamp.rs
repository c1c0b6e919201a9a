//! Time helpers.
//!
//! Moved into a separate module, so all wire types agree on one timestamp representation.

#[allow(missing_docs)]
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Current time.
pub fn now() -> Timestamp {
    chrono::Utc::now()
}
