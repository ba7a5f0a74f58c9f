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

//! Error types for frame decoding.

use strum_macros::EnumIter;

// Transport error codes of draft-ietf-quic-transport-14 Section 12.3.
pub const NO_ERROR: u16 = 0x0;
pub const INTERNAL_ERROR: u16 = 0x1;
pub const SERVER_BUSY: u16 = 0x2;
pub const FLOW_CONTROL_ERROR: u16 = 0x3;
pub const STREAM_ID_ERROR: u16 = 0x4;
pub const STREAM_STATE_ERROR: u16 = 0x5;
pub const FINAL_OFFSET_ERROR: u16 = 0x6;
pub const FRAME_FORMAT_ERROR: u16 = 0x7;
pub const TRANSPORT_PARAMETER_ERROR: u16 = 0x8;
pub const VERSION_NEGOTIATION_ERROR: u16 = 0x9;
pub const PROTOCOL_VIOLATION: u16 = 0xa;
pub const UNSOLICITED_PATH_RESPONSE: u16 = 0xb;

/// The FRAME_ERROR band. A code in this range reports an error in a
/// specific frame type; the frame type is the offset into the band.
pub const FRAME_ERROR_MIN: u16 = 100;
pub const FRAME_ERROR_MAX: u16 = 123;

/// Application error code requesting that a stream be stopped.
pub const STOPPING: u16 = 0x0;

/// QUIC transport error.
///
/// The wire-mapped variants carry the semantics of a CONNECTION_CLOSE
/// error code; the private variants at the end report decode failures and
/// have no wire value.
#[allow(clippy::enum_variant_names)]
#[derive(Clone, Debug, Default, PartialEq, Eq, EnumIter)]
pub enum Error {
    /// The connection is being closed abruptly in the absence of any error.
    #[default]
    NoError,

    /// The endpoint encountered an internal error and cannot continue with
    /// the connection.
    InternalError,

    /// The server is currently busy and does not accept any new connection.
    ServerBusy,

    /// An endpoint received more data than it permitted in its advertised
    /// data limits.
    FlowControlError,

    /// An endpoint received a frame for a stream identifier that exceeded
    /// its advertised limit for the corresponding stream type.
    StreamIdError,

    /// An endpoint received a frame for a stream that was not in a state
    /// that permitted that frame.
    StreamStateError,

    /// An endpoint received a STREAM frame containing data that exceeded the
    /// previously established final offset, or a RST_STREAM frame containing
    /// a final offset that was lower than the maximum offset already
    /// received.
    FinalOffsetError,

    /// An endpoint received a frame that was badly formatted, such as an
    /// ACK frame whose reconstructed ranges underflow.
    FrameFormatError,

    /// An endpoint received transport parameters that were badly formatted.
    TransportParameterError,

    /// An endpoint received transport parameters that contradict version
    /// negotiation.
    VersionNegotiationError,

    /// An endpoint detected an error with protocol compliance that was not
    /// covered by more specific error codes.
    ProtocolViolation,

    /// An endpoint received a PATH_RESPONSE frame that did not correspond
    /// to any outstanding PATH_CHALLENGE.
    UnsolicitedPathResponse,

    /// An endpoint detected an error in a specific frame type. The frame
    /// type is carried as associated data.
    FrameError(u8),

    /* Note: Private error codes are as follows */
    /// The input bytes could not be interpreted as framed QUIC data:
    /// truncated field, unknown frame type, or a length prefix that exceeds
    /// the remaining input.
    MalformedFrame,
}

impl Error {
    /// Map a 16-bit wire error code to its semantic variant.
    ///
    /// Codes outside the recognised set and the FRAME_ERROR band are
    /// rejected as malformed input.
    pub fn from_wire(code: u16) -> crate::Result<Error> {
        match code {
            NO_ERROR => Ok(Error::NoError),
            INTERNAL_ERROR => Ok(Error::InternalError),
            SERVER_BUSY => Ok(Error::ServerBusy),
            FLOW_CONTROL_ERROR => Ok(Error::FlowControlError),
            STREAM_ID_ERROR => Ok(Error::StreamIdError),
            STREAM_STATE_ERROR => Ok(Error::StreamStateError),
            FINAL_OFFSET_ERROR => Ok(Error::FinalOffsetError),
            FRAME_FORMAT_ERROR => Ok(Error::FrameFormatError),
            TRANSPORT_PARAMETER_ERROR => Ok(Error::TransportParameterError),
            VERSION_NEGOTIATION_ERROR => Ok(Error::VersionNegotiationError),
            PROTOCOL_VIOLATION => Ok(Error::ProtocolViolation),
            UNSOLICITED_PATH_RESPONSE => Ok(Error::UnsolicitedPathResponse),
            FRAME_ERROR_MIN..=FRAME_ERROR_MAX => {
                Ok(Error::FrameError((code - FRAME_ERROR_MIN) as u8))
            }
            _ => Err(Error::MalformedFrame),
        }
    }

    /// Return the wire value of the error. Private errors have none and
    /// map to zero.
    pub fn to_wire(&self) -> u16 {
        match *self {
            Error::NoError => NO_ERROR,
            Error::InternalError => INTERNAL_ERROR,
            Error::ServerBusy => SERVER_BUSY,
            Error::FlowControlError => FLOW_CONTROL_ERROR,
            Error::StreamIdError => STREAM_ID_ERROR,
            Error::StreamStateError => STREAM_STATE_ERROR,
            Error::FinalOffsetError => FINAL_OFFSET_ERROR,
            Error::FrameFormatError => FRAME_FORMAT_ERROR,
            Error::TransportParameterError => TRANSPORT_PARAMETER_ERROR,
            Error::VersionNegotiationError => VERSION_NEGOTIATION_ERROR,
            Error::ProtocolViolation => PROTOCOL_VIOLATION,
            Error::UnsolicitedPathResponse => UNSOLICITED_PATH_RESPONSE,
            Error::FrameError(t) => FRAME_ERROR_MIN + t as u16,
            Error::MalformedFrame => 0,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

/// Application-space error code carried by RST_STREAM, STOP_SENDING and
/// APPLICATION_CLOSE frames.
///
/// Only the STOPPING sentinel is meaningful to the transport; every other
/// value belongs to the application protocol and is carried verbatim.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppError {
    /// The peer requested that the stream be stopped.
    Stopping,

    /// An application-defined error code, retained for the upper layer.
    Code(u16),
}

impl AppError {
    /// Map a 16-bit wire code to an application error.
    pub fn from_wire(code: u16) -> AppError {
        match code {
            STOPPING => AppError::Stopping,
            _ => AppError::Code(code),
        }
    }

    /// Return the wire value of the application error.
    pub fn to_wire(&self) -> u16 {
        match *self {
            AppError::Stopping => STOPPING,
            AppError::Code(code) => code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use strum::IntoEnumIterator;

    #[test]
    fn error_wire_mapping() {
        let mut found_private_err = false;
        for err in Error::iter() {
            if err == Error::MalformedFrame {
                found_private_err = true;
            }
            if found_private_err {
                assert_eq!(err.to_wire(), 0);
                continue;
            }
            assert_eq!(Error::from_wire(err.to_wire()), Ok(err));
        }
    }

    #[test]
    fn error_frame_error_band() {
        assert_eq!(Error::from_wire(99), Err(Error::MalformedFrame));
        assert_eq!(Error::from_wire(100), Ok(Error::FrameError(0)));
        assert_eq!(Error::from_wire(117), Ok(Error::FrameError(17)));
        assert_eq!(Error::from_wire(123), Ok(Error::FrameError(23)));
        assert_eq!(Error::from_wire(124), Err(Error::MalformedFrame));

        assert_eq!(Error::FrameError(17).to_wire(), 117);
    }

    #[test]
    fn error_unknown_code() {
        assert_eq!(Error::from_wire(0xc), Err(Error::MalformedFrame));
        assert_eq!(Error::from_wire(0x42), Err(Error::MalformedFrame));
        assert_eq!(Error::from_wire(0xffff), Err(Error::MalformedFrame));
    }

    #[test]
    fn error_display() {
        assert_eq!(format!("{}", Error::ProtocolViolation), "ProtocolViolation");
        assert_eq!(format!("{}", Error::FrameError(2)), "FrameError(2)");
        use std::error::Error as _;
        assert!(Error::MalformedFrame.source().is_none());
    }

    #[test]
    fn app_error_wire_mapping() {
        assert_eq!(AppError::from_wire(0), AppError::Stopping);
        assert_eq!(AppError::from_wire(7), AppError::Code(7));
        assert_eq!(AppError::from_wire(0xffff), AppError::Code(0xffff));

        assert_eq!(AppError::Stopping.to_wire(), STOPPING);
        assert_eq!(AppError::Code(7).to_wire(), 7);
    }
}
