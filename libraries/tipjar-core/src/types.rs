//! Domain types for the tipjar donation service.

use serde::{Deserialize, Serialize};

/// Id carried by a record the server has not assigned an identity to yet.
pub const UNASSIGNED_ID: i32 = 0;

/// A donation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique record identifier. `0` means "not yet assigned"; the server
    /// assigns the real id when the record is added.
    pub id: i32,

    /// Donor display name, treated opaquely (may be empty).
    pub name: String,

    /// Donated amount.
    pub donate: i32,

    /// Free-form description, empty when absent.
    pub description: String,
}

impl User {
    /// Create a record without a server-assigned id.
    pub fn new(name: impl Into<String>, donate: i32, description: impl Into<String>) -> Self {
        Self {
            id: UNASSIGNED_ID,
            name: name.into(),
            donate,
            description: description.into(),
        }
    }

    /// Same record under a different id.
    #[must_use]
    pub fn with_id(mut self, id: i32) -> Self {
        self.id = id;
        self
    }
}
