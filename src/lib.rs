// Copyright (c) 2024 The Quic-Frames Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! quic-frames is a strict decoder for the frame layer of QUIC version 1
//! in the draft-14 wire format.
//!
//! Given the decrypted payload of a single QUIC packet, [`parse_frames`]
//! decodes the concatenated frame sequence it carries into three lists:
//! ordinary data/control frames, acknowledgement frames, and cryptographic
//! handshake frames. Each list preserves the on-wire order of appearance.
//!
//! The decoder is a pure function over the payload bytes. It performs no
//! I/O, keeps no state between calls, and either consumes the entire
//! payload or fails with a single [`Error`]; no partial frame lists are
//! ever returned. Packet header parsing, packet protection, congestion
//! control and all connection state belong to the layers above.
//!
//! Parsing is strict: unknown frame types, truncated fields and
//! out-of-range values are rejected rather than skipped.

use std::cmp;
use std::fmt;

/// Result type for frame decoding operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The length field of a NEW_CONNECTION_ID frame is 5 bits, so an encoded
/// connection ID carries at most 31 bytes.
pub const MAX_CID_LEN: usize = 31;

/// The Stateless Reset Token is a 16-byte value.
pub const RESET_TOKEN_LEN: usize = 16;

/// Connection Id is an identifier used to identify a QUIC connection
/// at an endpoint.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Default)]
pub struct ConnectionId {
    /// length of cid
    len: u8,
    /// octets of cid
    data: [u8; MAX_CID_LEN],
}

impl ConnectionId {
    /// Construct cid from byte slice
    pub fn new(bytes: &[u8]) -> Self {
        let len = cmp::min(bytes.len(), MAX_CID_LEN);
        let mut cid = Self {
            len: len as u8,
            data: [0; MAX_CID_LEN],
        };
        cid.data[..len].copy_from_slice(&bytes[..len]);
        cid
    }
}

impl std::ops::Deref for ConnectionId {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.data[0..self.len as usize]
    }
}

impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.iter() {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A 128-bit opaque value carried in NEW_CONNECTION_ID frames, used by
/// peers to validate stateless reset packets.
#[derive(Clone, Copy, Eq, PartialEq, Default)]
pub struct ResetToken(pub [u8; RESET_TOKEN_LEN]);

impl std::ops::Deref for ResetToken {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for ResetToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.iter() {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}


pub use crate::error::AppError;
pub use crate::error::Error;
pub use crate::frame::parse_frames;
pub use crate::frame::stream_owner;
pub use crate::frame::stream_type;
pub use crate::frame::AckFrame;
pub use crate::frame::CryptoFrame;
pub use crate::frame::EcnCounts;
pub use crate::frame::Frame;
pub use crate::frame::FrameSet;
pub use crate::frame::StreamOwner;
pub use crate::frame::StreamType;
pub use crate::ranges::RangeSet;

mod codec;
pub mod error;
mod frame;
mod ranges;
