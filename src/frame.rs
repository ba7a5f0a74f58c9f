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

use bytes::Bytes;
use log::*;

use crate::codec::Decoder;
use crate::error::AppError;
use crate::error::Error;
use crate::ranges::RangeSet;
use crate::ConnectionId;
use crate::ResetToken;
use crate::Result;

/// The QUIC frame is a unit of structured protocol information. Frames are
/// contained in QUIC packets.
///
/// This enum covers the data and control frames of the draft-14 wire
/// format. ACK frames and CRYPTO frames are decoded into [`AckFrame`] and
/// [`CryptoFrame`] and routed to their own output lists; PADDING is
/// consumed without being represented.
#[derive(Clone, PartialEq, Eq)]
pub enum Frame {
    /// RST_STREAM frame (type=0x01) is used to abruptly terminate the
    /// sending part of a stream.
    ResetStream {
        stream_id: u64,
        error_code: AppError,
        final_offset: u64,
    },

    /// CONNECTION_CLOSE frame (type=0x02) is used to notify the peer that
    /// the connection is being closed due to an error of the QUIC layer.
    ConnectionClose { error: Error, reason: Vec<u8> },

    /// APPLICATION_CLOSE frame (type=0x03) is used to notify the peer that
    /// the connection is being closed due to an error of the application.
    ApplicationClose { error_code: AppError, reason: Vec<u8> },

    /// MAX_DATA frame (type=0x04) is used to inform the peer of the maximum
    /// amount of data that can be sent on the connection as a whole.
    MaxData { max: u64 },

    /// MAX_STREAM_DATA frame (type=0x05) is used to inform a peer of the
    /// maximum amount of data that can be sent on a stream.
    MaxStreamData { stream_id: u64, max: u64 },

    /// MAX_STREAM_ID frame (type=0x06) informs the peer of the maximum
    /// stream ID it is permitted to open.
    MaxStreamId { max: u64 },

    /// PING frame (type=0x07) is used to verify that peers are still alive
    /// or to check reachability to the peer.
    Ping,

    /// BLOCKED frame (type=0x08) is sent when the sender wishes to send
    /// data but is unable to do so due to connection-level flow control.
    DataBlocked { offset: u64 },

    /// STREAM_BLOCKED frame (type=0x09) is sent when the sender wishes to
    /// send data but is unable to do so due to stream-level flow control.
    StreamDataBlocked { stream_id: u64, offset: u64 },

    /// STREAM_ID_BLOCKED frame (type=0x0a) indicates that the sender wants
    /// to open a stream beyond its advertised stream ID limit.
    StreamIdBlocked { stream_id: u64 },

    /// NEW_CONNECTION_ID frame (type=0x0b) is used to provide the peer with
    /// alternative connection IDs that can be used to break linkability.
    NewConnectionId {
        seq_num: u64,
        conn_id: ConnectionId,
        reset_token: ResetToken,
    },

    /// STOP_SENDING frame (type=0x0c) is used to communicate that incoming
    /// data is being discarded on receipt per application request.
    StopSending { stream_id: u64, error_code: AppError },

    /// RETIRE_CONNECTION_ID frame (type=0x0d) is used to indicate that the
    /// endpoint will no longer use a connection ID issued by its peer.
    RetireConnectionId { seq_num: u64 },

    /// PATH_CHALLENGE frame (type=0x0e) is used to check reachability to
    /// the peer and for path validation during connection migration.
    PathChallenge { data: [u8; 8] },

    /// PATH_RESPONSE frame (type=0x0f) is sent in response to a
    /// PATH_CHALLENGE frame.
    PathResponse { data: [u8; 8] },

    /// STREAM frame (types 0x10..=0x17) carrying the first bytes of a
    /// stream: FIN clear, an explicit Length field, and offset zero.
    StreamOpen {
        stream_id: u64,
        offset: u64,
        data: Bytes,
    },

    /// STREAM frame (types 0x10..=0x17) carrying stream data with FIN
    /// clear. When the type byte has no Length bit the data extends to the
    /// end of the packet and the frame must be the final one.
    StreamData {
        stream_id: u64,
        offset: u64,
        data: Bytes,
    },

    /// STREAM frame (types 0x10..=0x17) with the FIN bit set, closing the
    /// stream at `offset + data.len()`.
    StreamClose {
        stream_id: u64,
        offset: u64,
        data: Bytes,
    },
}

/// The ACK frame (types 0x1a and 0x1b) informs the sender of packets that
/// were received and processed. The least significant bit of the type
/// value indicates the presence of ECN feedback.
#[derive(Clone, PartialEq, Eq)]
pub struct AckFrame {
    /// The largest packet number the peer is acknowledging.
    pub largest_acked: u64,

    /// The acknowledgment delay in microseconds.
    pub ack_delay: u64,

    /// The acknowledged packet numbers as disjoint inclusive ranges in
    /// ascending order. Never empty: the frame always acknowledges at
    /// least `largest_acked` itself.
    pub ranges: RangeSet,

    /// ECN counts, present for type 0x1b only.
    pub ecn_counts: Option<EcnCounts>,
}

/// The counts of packets received with each ECN codepoint in the packet
/// number space of an ACK frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EcnCounts {
    /// The total number of packets received with the ECT(0) codepoint.
    pub ect0_count: u64,

    /// The total number of packets received with the ECT(1) codepoint.
    pub ect1_count: u64,

    /// The total number of packets received with the ECN-CE codepoint.
    pub ecn_ce_count: u64,
}

/// The CRYPTO frame (type=0x18) carries TLS handshake bytes. It is routed
/// to its own output list for the handshake layer.
#[derive(Clone, PartialEq, Eq)]
pub struct CryptoFrame {
    /// Byte offset of this chunk within the handshake byte stream.
    pub offset: u64,

    /// Length of the carried handshake bytes.
    pub length: usize,

    /// The handshake bytes, a view into the packet payload.
    pub data: Bytes,
}

/// The decoded content of a packet payload, split by consumer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameSet {
    /// Data and control frames, in wire order.
    pub frames: Vec<Frame>,

    /// Acknowledgement frames, in wire order.
    pub acks: Vec<AckFrame>,

    /// CRYPTO frames carrying TLS handshake bytes, in wire order.
    pub tls: Vec<CryptoFrame>,
}

/// The endpoint that opened a stream, taken from the least significant bit
/// of its stream ID.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamOwner {
    Client,
    Server,
}

/// The directionality of a stream, taken from the second least significant
/// bit of its stream ID.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamType {
    Bidirectional,
    Unidirectional,
}

/// Return the endpoint that opened the stream with the given ID.
pub fn stream_owner(stream_id: u64) -> StreamOwner {
    if stream_id & 0x01 == 0 {
        StreamOwner::Client
    } else {
        StreamOwner::Server
    }
}

/// Return the directionality of the stream with the given ID.
pub fn stream_type(stream_id: u64) -> StreamType {
    if stream_id & 0x02 == 0 {
        StreamType::Bidirectional
    } else {
        StreamType::Unidirectional
    }
}

/// Decode the frame sequence of a decrypted packet payload.
///
/// The entire payload is consumed. Frames are routed by kind: CRYPTO
/// frames to `tls`, ACK frames to `acks`, everything else to `frames`.
/// PADDING is consumed without being emitted. An empty payload decodes to
/// three empty lists.
///
/// Decoding is strict and all-or-nothing: the first malformed frame aborts
/// the parse with an error and no partial results are returned. Message
/// bodies are zero-copy views into `payload`. A stream frame without a
/// Length field owns the rest of the packet; a tail that decodes as
/// further frames fails with [`Error::ProtocolViolation`].
pub fn parse_frames(payload: &Bytes) -> Result<FrameSet> {
    let mut b = payload.as_ref();
    let mut set = FrameSet::default();
    let mut terminated = false;

    while !b.is_empty() {
        // A stream frame without a Length field owns the rest of the
        // packet and must be the final frame.
        if terminated {
            return Err(Error::ProtocolViolation);
        }

        let frame_type = b.read_u8()?;
        match frame_type {
            // PADDING has no semantic value and is not emitted.
            0x00 => (),

            0x01 => set.frames.push(Frame::ResetStream {
                stream_id: b.read_varint()?,
                error_code: AppError::from_wire(b.read_u16()?),
                final_offset: b.read_varint()?,
            }),

            0x02 => set.frames.push(Frame::ConnectionClose {
                error: Error::from_wire(b.read_u16()?)?,
                reason: b.read_with_varint_length()?,
            }),

            0x03 => set.frames.push(Frame::ApplicationClose {
                error_code: AppError::from_wire(b.read_u16()?),
                reason: b.read_with_varint_length()?,
            }),

            0x04 => set.frames.push(Frame::MaxData {
                max: b.read_varint()?,
            }),

            0x05 => set.frames.push(Frame::MaxStreamData {
                stream_id: b.read_varint()?,
                max: b.read_varint()?,
            }),

            0x06 => set.frames.push(Frame::MaxStreamId {
                max: b.read_varint()?,
            }),

            0x07 => set.frames.push(Frame::Ping),

            0x08 => set.frames.push(Frame::DataBlocked {
                offset: b.read_varint()?,
            }),

            0x09 => set.frames.push(Frame::StreamDataBlocked {
                stream_id: b.read_varint()?,
                offset: b.read_varint()?,
            }),

            0x0a => set.frames.push(Frame::StreamIdBlocked {
                stream_id: b.read_varint()?,
            }),

            0x0b => {
                // The three high bits of the length octet are reserved.
                let cid_len = (b.read_u8()? & 0x1f) as usize;
                let seq_num = b.read_varint()?;
                let cid = b.read(cid_len)?;
                set.frames.push(Frame::NewConnectionId {
                    seq_num,
                    conn_id: ConnectionId::new(&cid),
                    reset_token: ResetToken(
                        b.read(16)?.try_into().map_err(|_| Error::MalformedFrame)?,
                    ),
                });
            }

            0x0c => set.frames.push(Frame::StopSending {
                stream_id: b.read_varint()?,
                error_code: AppError::from_wire(b.read_u16()?),
            }),

            0x0d => set.frames.push(Frame::RetireConnectionId {
                seq_num: b.read_varint()?,
            }),

            0x0e => set.frames.push(Frame::PathChallenge {
                data: b.read(8)?.try_into().map_err(|_| Error::MalformedFrame)?,
            }),

            0x0f => set.frames.push(Frame::PathResponse {
                data: b.read(8)?.try_into().map_err(|_| Error::MalformedFrame)?,
            }),

            0x18 => {
                let offset = b.read_varint()?;
                let length = b.read_varint()? as usize;
                if length > b.len() {
                    return Err(Error::MalformedFrame);
                }
                let start = payload.len() - b.len();
                let data = payload.slice(start..(start + length));
                b.skip(length)?;
                set.tls.push(CryptoFrame {
                    offset,
                    length,
                    data,
                });
            }

            0x1a | 0x1b => set.acks.push(parse_ack_frame(frame_type, &mut b)?),

            0x10..=0x17 => {
                let stream_id = b.read_varint()?;
                let offset = if frame_type & 0x04 != 0 {
                    b.read_varint()?
                } else {
                    0
                };
                let has_len = frame_type & 0x02 != 0;
                let length = if has_len {
                    b.read_varint()? as usize
                } else {
                    stream_tail_len(&payload.slice(payload.len() - b.len()..))
                };
                if length > b.len() {
                    return Err(Error::MalformedFrame);
                }
                let start = payload.len() - b.len();
                let data = payload.slice(start..(start + length));
                b.skip(length)?;

                let frame = if frame_type & 0x01 != 0 {
                    Frame::StreamClose {
                        stream_id,
                        offset,
                        data,
                    }
                } else if offset == 0 && has_len {
                    Frame::StreamOpen {
                        stream_id,
                        offset,
                        data,
                    }
                } else {
                    Frame::StreamData {
                        stream_id,
                        offset,
                        data,
                    }
                };
                set.frames.push(frame);
                if !has_len {
                    terminated = true;
                }
            }

            _ => return Err(Error::MalformedFrame),
        }
    }

    trace!(
        "parsed payload: {} frames, {} acks, {} crypto frames",
        set.frames.len(),
        set.acks.len(),
        set.tls.len()
    );
    Ok(set)
}

/// Decode an ACK frame body and expand its differential range encoding
/// into explicit packet-number ranges.
fn parse_ack_frame(frame_type: u8, b: &mut &[u8]) -> Result<AckFrame> {
    let mut ranges = RangeSet::new();

    // The largest packet number the peer is acknowledging.
    let largest_acked = b.read_varint()?;

    // The acknowledgment delay in microseconds.
    let ack_delay = b.read_varint()?;

    // The number of gap/ack-range pairs that follow the first range.
    let block_count = b.read_varint()?;

    // The number of contiguous packets preceding the Largest Acknowledged
    // that are being acknowledged.
    let first_range = b.read_varint()?;
    if largest_acked < first_range {
        return Err(Error::FrameFormatError);
    }
    let mut smallest_ack = largest_acked - first_range;
    ranges.insert(smallest_ack..=largest_acked);

    for _ in 0..block_count {
        // The number of contiguous unacknowledged packets preceding the
        // packet number one lower than the smallest in the preceding range.
        let gap = b.read_varint()?;
        if smallest_ack < gap + 2 {
            return Err(Error::FrameFormatError);
        }
        let largest = (smallest_ack - gap) - 2;

        // The number of contiguous acknowledged packets in this range.
        let range_len = b.read_varint()?;
        if largest < range_len {
            return Err(Error::FrameFormatError);
        }
        smallest_ack = largest - range_len;

        ranges.insert(smallest_ack..=largest);
    }

    let ecn_counts = if frame_type & 0x01 != 0 {
        Some(EcnCounts {
            ect0_count: b.read_varint()?,
            ect1_count: b.read_varint()?,
            ecn_ce_count: b.read_varint()?,
        })
    } else {
        None
    };

    Ok(AckFrame {
        largest_acked,
        ack_delay,
        ranges,
        ecn_counts,
    })
}

/// Data length of a stream frame that has no Length field.
///
/// Such a frame extends to the end of the packet. A tail that decodes as
/// a frame sequence of its own is not stream data but frames placed after
/// the terminator; they are left in the buffer for the dispatch loop to
/// reject.
fn stream_tail_len(tail: &Bytes) -> usize {
    (0..tail.len())
        .find(|&split| parse_frames(&tail.slice(split..)).is_ok())
        .unwrap_or(tail.len())
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Frame::ResetStream {
                stream_id,
                error_code,
                final_offset,
            } => {
                write!(
                    f,
                    "RST_STREAM id={stream_id} err={error_code:?} off={final_offset}"
                )?;
            }

            Frame::ConnectionClose { error, reason } => {
                write!(f, "CONNECTION_CLOSE err={error:?} reason={reason:x?}")?;
            }

            Frame::ApplicationClose { error_code, reason } => {
                write!(
                    f,
                    "APPLICATION_CLOSE err={error_code:?} reason={reason:x?}"
                )?;
            }

            Frame::MaxData { max } => {
                write!(f, "MAX_DATA max={max}")?;
            }

            Frame::MaxStreamData { stream_id, max } => {
                write!(f, "MAX_STREAM_DATA id={stream_id} max={max}")?;
            }

            Frame::MaxStreamId { max } => {
                write!(f, "MAX_STREAM_ID max={max}")?;
            }

            Frame::Ping => {
                write!(f, "PING")?;
            }

            Frame::DataBlocked { offset } => {
                write!(f, "BLOCKED off={offset}")?;
            }

            Frame::StreamDataBlocked { stream_id, offset } => {
                write!(f, "STREAM_BLOCKED id={stream_id} off={offset}")?;
            }

            Frame::StreamIdBlocked { stream_id } => {
                write!(f, "STREAM_ID_BLOCKED id={stream_id}")?;
            }

            Frame::NewConnectionId {
                seq_num,
                conn_id,
                reset_token,
            } => {
                write!(
                    f,
                    "NEW_CONNECTION_ID seq={seq_num} cid={conn_id:?} reset_token={reset_token:?}"
                )?;
            }

            Frame::StopSending {
                stream_id,
                error_code,
            } => {
                write!(f, "STOP_SENDING id={stream_id} err={error_code:?}")?;
            }

            Frame::RetireConnectionId { seq_num } => {
                write!(f, "RETIRE_CONNECTION_ID seq={seq_num}")?;
            }

            Frame::PathChallenge { data } => {
                write!(f, "PATH_CHALLENGE data={data:02x?}")?;
            }

            Frame::PathResponse { data } => {
                write!(f, "PATH_RESPONSE data={data:02x?}")?;
            }

            Frame::StreamOpen {
                stream_id,
                offset,
                data,
            } => {
                write!(
                    f,
                    "STREAM_OPEN id={} off={} len={}",
                    stream_id,
                    offset,
                    data.len()
                )?;
            }

            Frame::StreamData {
                stream_id,
                offset,
                data,
            } => {
                write!(
                    f,
                    "STREAM_DATA id={} off={} len={}",
                    stream_id,
                    offset,
                    data.len()
                )?;
            }

            Frame::StreamClose {
                stream_id,
                offset,
                data,
            } => {
                write!(
                    f,
                    "STREAM_CLOSE id={} off={} len={}",
                    stream_id,
                    offset,
                    data.len()
                )?;
            }
        }

        Ok(())
    }
}

impl std::fmt::Debug for AckFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "ACK largest={} delay={} ranges={:?} ecn_counts={:?}",
            self.largest_acked, self.ack_delay, self.ranges, self.ecn_counts
        )
    }
}

impl std::fmt::Debug for CryptoFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "CRYPTO off={} len={}", self.offset, self.length)
    }
}
