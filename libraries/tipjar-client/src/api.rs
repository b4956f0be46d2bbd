//! Capability surface for donation record operations.

use crate::error::Result;
use async_trait::async_trait;
use tipjar_core::types::User;

/// The typed operations a tipjar server exposes over one session.
///
/// [`UserApiClient`](crate::UserApiClient) is the TCP implementation;
/// callers that only need the operations can depend on this trait and
/// tests can substitute an in-memory implementation.
#[async_trait]
pub trait UserApi: Send + Sync {
    /// Every record the server holds, possibly empty.
    async fn get_all(&self) -> Result<Vec<User>>;

    /// The record under `id`.
    ///
    /// Fails with [`ClientError::NotFound`](crate::ClientError::NotFound)
    /// when the server holds no such record.
    async fn get(&self, id: i32) -> Result<User>;

    /// Create a record. Identity is assigned server-side; whatever id the
    /// caller put on `user` is not sent. Returns whether the server
    /// accepted the record.
    async fn add(&self, user: User) -> Result<bool>;

    /// Replace the record under `id` with `user` in full, every field,
    /// including unchanged ones. Returns whether the server accepted the
    /// replacement.
    async fn update(&self, id: i32, user: User) -> Result<bool>;

    /// Remove the record under `id`. Returns whether the server accepted
    /// the removal.
    async fn delete(&self, id: i32) -> Result<bool>;
}

// ============================================================================
// Tests
// ============================================================================
