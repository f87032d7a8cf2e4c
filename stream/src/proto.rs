//! The frame protocol shared by every transport.
//!
//! A call is one ordered link per direction. The initiator's first frame is always
//! [Frame::Open]; after that each direction carries zero or more [Frame::Msg] and ends with
//! exactly one [Frame::End] or [Frame::Fail].
//!
//! Byte-stream transports use the wire form produced by [Frame::encode_into]:
//!
//! ```text
//! len: u32 (big endian, size of everything after it)
//! tag: u8
//!   1 Open   shape: u8, method: utf8
//!   2 Msg    payload (codec encoded)
//!   3 End
//!   4 Fail   0, code: u8      framework error
//!            1, bytes         codec encoded application error
//! ```

use crate::error::RpcIntErr;
use std::fmt;

/// Largest frame body accepted from the wire.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

const TAG_OPEN: u8 = 1;
const TAG_MSG: u8 = 2;
const TAG_END: u8 = 3;
const TAG_FAIL: u8 = 4;

const FAIL_RPC: u8 = 0;
const FAIL_USER: u8 = 1;

/// The four interaction shapes of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CallShape {
    /// One request, one response
    Unary = 1,
    /// One request, many responses
    ServerStream = 2,
    /// Many requests, one response
    ClientStream = 3,
    /// Many requests and many responses, independently paced
    BidiStream = 4,
}

impl TryFrom<u8> for CallShape {
    type Error = RpcIntErr;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Unary),
            2 => Ok(Self::ServerStream),
            3 => Ok(Self::ClientStream),
            4 => Ok(Self::BidiStream),
            _ => Err(RpcIntErr::Decode),
        }
    }
}

/// Carried by the opening frame, tells the handler what to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallHeader {
    pub method: String,
    pub shape: CallShape,
}

impl CallHeader {
    #[inline]
    pub fn new(method: impl Into<String>, shape: CallShape) -> Self {
        Self { method: method.into(), shape }
    }
}

impl fmt::Display for CallHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", self.method, self.shape)
    }
}

/// Error carried by a [Frame::Fail]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodedErr {
    Rpc(RpcIntErr),
    /// Application error, encoded by the call's codec
    User(Vec<u8>),
}

#[derive(Clone, PartialEq, Eq)]
pub enum Frame {
    Open(CallHeader),
    Msg(Vec<u8>),
    /// The terminal signal of one direction
    End,
    Fail(EncodedErr),
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open(h) => write!(f, "Open({})", h),
            Self::Msg(buf) => write!(f, "Msg({} bytes)", buf.len()),
            Self::End => write!(f, "End"),
            Self::Fail(e) => write!(f, "Fail({:?})", e),
        }
    }
}

impl Frame {
    /// Whether this frame terminates its direction.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::End | Self::Fail(_))
    }

    /// Append the length-prefixed wire form of this frame to `buf`.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        let start = buf.len();
        buf.extend_from_slice(&[0u8; 4]);
        match self {
            Self::Open(header) => {
                buf.push(TAG_OPEN);
                buf.push(header.shape as u8);
                buf.extend_from_slice(header.method.as_bytes());
            }
            Self::Msg(payload) => {
                buf.push(TAG_MSG);
                buf.extend_from_slice(payload);
            }
            Self::End => buf.push(TAG_END),
            Self::Fail(EncodedErr::Rpc(e)) => {
                buf.extend_from_slice(&[TAG_FAIL, FAIL_RPC, *e as u8]);
            }
            Self::Fail(EncodedErr::User(payload)) => {
                buf.extend_from_slice(&[TAG_FAIL, FAIL_USER]);
                buf.extend_from_slice(payload);
            }
        }
        let len = (buf.len() - start - 4) as u32;
        buf[start..start + 4].copy_from_slice(&len.to_be_bytes());
    }

    /// Parse a frame body, i.e. everything after the length prefix.
    pub fn decode(body: &[u8]) -> Result<Self, RpcIntErr> {
        let (&tag, rest) = body.split_first().ok_or(RpcIntErr::Decode)?;
        match tag {
            TAG_OPEN => {
                let (&shape, method) = rest.split_first().ok_or(RpcIntErr::Decode)?;
                let method = std::str::from_utf8(method).map_err(|_| RpcIntErr::Decode)?;
                Ok(Self::Open(CallHeader::new(method, CallShape::try_from(shape)?)))
            }
            TAG_MSG => Ok(Self::Msg(rest.to_vec())),
            TAG_END if rest.is_empty() => Ok(Self::End),
            TAG_FAIL => match rest {
                [FAIL_RPC, code] => Ok(Self::Fail(EncodedErr::Rpc(RpcIntErr::try_from(*code)?))),
                [FAIL_USER, payload @ ..] => Ok(Self::Fail(EncodedErr::User(payload.to_vec()))),
                _ => Err(RpcIntErr::Decode),
            },
            _ => Err(RpcIntErr::Decode),
        }
    }
}
