//! Tipjar Protocol Core
//!
//! Transport-agnostic protocol definition for the tipjar donation service:
//! the `User` domain entity, the request/response envelopes, and the binary
//! wire codec shared by the client and by server-side tooling.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: the `User` donation record
//! - **Envelopes**: `Request`/`Response` with their operation tags
//! - **Wire Codec**: deterministic encode/decode with `DecodeError`
//!
//! No I/O happens here; framing and socket handling live in `tipjar-client`.
//!
//! # Example
//!
//! ```rust
//! use tipjar_core::protocol::{Request, RequestBody};
//! use tipjar_core::types::User;
//! use tipjar_core::wire;
//!
//! let user = User::new("Alice", 500, "first donation");
//! let request = Request::new(1, RequestBody::Add { user });
//!
//! let payload = wire::encode_request(&request);
//! let decoded = wire::decode_request(&payload)?;
//! assert_eq!(decoded, request);
//! # Ok::<(), tipjar_core::wire::DecodeError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod protocol;
pub mod types;
pub mod wire;

// Re-export commonly used types
pub use protocol::{Op, Request, RequestBody, Response, ResponseBody};
pub use types::User;
pub use wire::{DecodeError, MAX_FRAME_LEN};
