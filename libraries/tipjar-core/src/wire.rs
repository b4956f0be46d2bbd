//! Binary wire codec for the tipjar protocol.
//!
//! Every request and response travels as one frame: a `u32` big-endian
//! length prefix followed by that many payload bytes. This module encodes
//! and decodes the payloads; the length prefix itself is written and read
//! by the transport layer.
//!
//! Payload layout, fixed once as the compatibility contract:
//!
//! - request: `[tag: u8][correlation: u32 BE][operation payload]`
//! - response: `[tag: u8][correlation: u32 BE][status: u8][payload]`
//! - `User`: `[id: i32 BE][name: text][donate: i32 BE][description: text]`
//! - text: `[len: u32 BE][UTF-8 bytes]`
//!
//! Decoding is strict: unknown tags, statuses invalid for the operation,
//! truncated fields, non-UTF-8 text, and trailing bytes are all errors.

use crate::protocol::{Op, Request, RequestBody, Response, ResponseBody};
use crate::types::User;
use bytes::{Buf, BufMut};
use thiserror::Error;

/// Largest payload a frame may declare, in bytes.
///
/// A length prefix above this limit means the peers have lost framing (or
/// the peer is hostile); the session cannot be resynchronized past it.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Width of the length prefix that precedes every frame payload.
pub const FRAME_HEADER_LEN: usize = 4;

const STATUS_OK: u8 = 0;
const STATUS_NOT_FOUND: u8 = 1;
const STATUS_ERROR: u8 = 2;

/// Reasons a frame payload fails to decode.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The payload ended before a declared field was complete.
    #[error("payload truncated: field needs {expected} byte(s), {remaining} left")]
    UnexpectedEnd {
        /// Bytes the current field still required.
        expected: usize,
        /// Bytes actually left.
        remaining: usize,
    },

    /// The operation tag byte is not one of the known operations.
    #[error("unknown operation tag {0:#04x}")]
    UnknownTag(u8),

    /// The status byte is not valid for the operation carrying it.
    #[error("invalid status {status:#04x} for operation tag {tag:#04x}")]
    InvalidStatus {
        /// Echoed operation tag.
        tag: u8,
        /// Offending status byte.
        status: u8,
    },

    /// A text field holds bytes that are not valid UTF-8.
    #[error("text field is not valid UTF-8: {0}")]
    InvalidText(#[from] std::str::Utf8Error),

    /// A frame declared a payload larger than [`MAX_FRAME_LEN`].
    #[error("frame of {len} byte(s) exceeds the {max} byte limit")]
    FrameTooLarge {
        /// Declared payload length.
        len: usize,
        /// Limit in force.
        max: usize,
    },

    /// Decoding finished with bytes left over.
    #[error("{0} trailing byte(s) after the payload")]
    TrailingBytes(usize),
}

// ==== Encoding ====

/// Encode a request envelope into a frame payload.
pub fn encode_request(request: &Request) -> Vec<u8> {
    let mut buf = Vec::with_capacity(32);
    buf.put_u8(request.op().tag());
    buf.put_u32(request.correlation);
    match &request.body {
        RequestBody::List => {}
        RequestBody::Get { id } | RequestBody::Delete { id } => buf.put_i32(*id),
        RequestBody::Add { user } => put_user(&mut buf, user),
        RequestBody::Update { id, user } => {
            buf.put_i32(*id);
            put_user(&mut buf, user);
        }
    }
    buf
}

/// Encode a response envelope into a frame payload.
pub fn encode_response(response: &Response) -> Vec<u8> {
    let mut buf = Vec::with_capacity(32);
    buf.put_u8(response.op.tag());
    buf.put_u32(response.correlation);
    match &response.body {
        ResponseBody::Users(users) => {
            buf.put_u8(STATUS_OK);
            buf.put_u32(users.len() as u32);
            for user in users {
                put_user(&mut buf, user);
            }
        }
        ResponseBody::Found(Some(user)) => {
            buf.put_u8(STATUS_OK);
            put_user(&mut buf, user);
        }
        ResponseBody::Found(None) => buf.put_u8(STATUS_NOT_FOUND),
        ResponseBody::Accepted(accepted) => {
            buf.put_u8(STATUS_OK);
            buf.put_u8(u8::from(*accepted));
        }
        ResponseBody::Error(message) => {
            buf.put_u8(STATUS_ERROR);
            put_text(&mut buf, message);
        }
    }
    buf
}

fn put_user(buf: &mut Vec<u8>, user: &User) {
    buf.put_i32(user.id);
    put_text(buf, &user.name);
    buf.put_i32(user.donate);
    put_text(buf, &user.description);
}

fn put_text(buf: &mut Vec<u8>, text: &str) {
    buf.put_u32(text.len() as u32);
    buf.put_slice(text.as_bytes());
}

// ==== Decoding ====

/// Decode a request envelope from a frame payload.
pub fn decode_request(payload: &[u8]) -> Result<Request, DecodeError> {
    let mut buf = payload;
    let tag = take_u8(&mut buf)?;
    let op = Op::from_tag(tag).ok_or(DecodeError::UnknownTag(tag))?;
    let correlation = take_u32(&mut buf)?;
    let body = match op {
        Op::List => RequestBody::List,
        Op::Get => RequestBody::Get {
            id: take_i32(&mut buf)?,
        },
        Op::Add => RequestBody::Add {
            user: take_user(&mut buf)?,
        },
        Op::Update => {
            let id = take_i32(&mut buf)?;
            let user = take_user(&mut buf)?;
            RequestBody::Update { id, user }
        }
        Op::Delete => RequestBody::Delete {
            id: take_i32(&mut buf)?,
        },
    };
    finish(buf)?;
    Ok(Request::new(correlation, body))
}

/// Decode a response envelope from a frame payload.
pub fn decode_response(payload: &[u8]) -> Result<Response, DecodeError> {
    let mut buf = payload;
    let tag = take_u8(&mut buf)?;
    let op = Op::from_tag(tag).ok_or(DecodeError::UnknownTag(tag))?;
    let correlation = take_u32(&mut buf)?;
    let status = take_u8(&mut buf)?;
    let body = match (op, status) {
        (Op::List, STATUS_OK) => {
            let count = take_u32(&mut buf)? as usize;
            // count is wire data, cap the preallocation
            let mut users = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                users.push(take_user(&mut buf)?);
            }
            ResponseBody::Users(users)
        }
        (Op::Get, STATUS_OK) => ResponseBody::Found(Some(take_user(&mut buf)?)),
        (Op::Get, STATUS_NOT_FOUND) => ResponseBody::Found(None),
        (Op::Add | Op::Update | Op::Delete, STATUS_OK) => {
            ResponseBody::Accepted(take_u8(&mut buf)? != 0)
        }
        (_, STATUS_ERROR) => ResponseBody::Error(take_text(&mut buf)?),
        _ => return Err(DecodeError::InvalidStatus { tag, status }),
    };
    finish(buf)?;
    Ok(Response {
        correlation,
        op,
        body,
    })
}

// ==== Cursor helpers ====

fn take_u8(buf: &mut &[u8]) -> Result<u8, DecodeError> {
    ensure(buf, 1)?;
    Ok(buf.get_u8())
}

fn take_u32(buf: &mut &[u8]) -> Result<u32, DecodeError> {
    ensure(buf, 4)?;
    Ok(buf.get_u32())
}

fn take_i32(buf: &mut &[u8]) -> Result<i32, DecodeError> {
    ensure(buf, 4)?;
    Ok(buf.get_i32())
}

fn take_text(buf: &mut &[u8]) -> Result<String, DecodeError> {
    let len = take_u32(buf)? as usize;
    ensure(buf, len)?;
    let (text, rest) = buf.split_at(len);
    let text = std::str::from_utf8(text)?.to_owned();
    *buf = rest;
    Ok(text)
}

fn take_user(buf: &mut &[u8]) -> Result<User, DecodeError> {
    let id = take_i32(buf)?;
    let name = take_text(buf)?;
    let donate = take_i32(buf)?;
    let description = take_text(buf)?;
    Ok(User {
        id,
        name,
        donate,
        description,
    })
}

fn ensure(buf: &[u8], expected: usize) -> Result<(), DecodeError> {
    if buf.remaining() < expected {
        return Err(DecodeError::UnexpectedEnd {
            expected,
            remaining: buf.remaining(),
        });
    }
    Ok(())
}

fn finish(buf: &[u8]) -> Result<(), DecodeError> {
    if !buf.is_empty() {
        return Err(DecodeError::TrailingBytes(buf.len()));
    }
    Ok(())
}
