//! Error types shared by both sides of a call.
//!
//! [RpcIntErr] covers everything the framework itself can raise: transport loss, protocol
//! violations and codec failures. [RpcError] wraps it together with the application's own error
//! type, so the initiator can tell a handler failure from a broken call.

use std::fmt;

/// Framework-level error of a call.
///
/// The numeric value is what goes on the wire in a `Fail` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RpcIntErr {
    /// The connection was closed or the peer went away.
    Cancelled = 1,
    /// The transport link could not be established.
    Unreachable = 2,
    /// A message was sent after the local send direction was half-closed.
    SendAfterClose = 3,
    /// A frame arrived after the peer's end-of-stream.
    RecvAfterEnd = 4,
    /// The frame sequence does not match the call shape.
    Protocol = 5,
    /// Unknown method, or the call shape does not match the method.
    Method = 6,
    Encode = 7,
    Decode = 8,
    IO = 9,
    Timeout = 10,
    /// The call has already failed on an earlier error.
    Aborted = 11,
}

impl RpcIntErr {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cancelled => "call cancelled",
            Self::Unreachable => "peer unreachable",
            Self::SendAfterClose => "send after half-close",
            Self::RecvAfterEnd => "message after end of stream",
            Self::Protocol => "protocol violation",
            Self::Method => "unknown method",
            Self::Encode => "encode error",
            Self::Decode => "decode error",
            Self::IO => "io error",
            Self::Timeout => "timeout",
            Self::Aborted => "call aborted",
        }
    }
}

impl fmt::Display for RpcIntErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::error::Error for RpcIntErr {}

impl TryFrom<u8> for RpcIntErr {
    type Error = RpcIntErr;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Cancelled),
            2 => Ok(Self::Unreachable),
            3 => Ok(Self::SendAfterClose),
            4 => Ok(Self::RecvAfterEnd),
            5 => Ok(Self::Protocol),
            6 => Ok(Self::Method),
            7 => Ok(Self::Encode),
            8 => Ok(Self::Decode),
            9 => Ok(Self::IO),
            10 => Ok(Self::Timeout),
            11 => Ok(Self::Aborted),
            _ => Err(Self::Decode),
        }
    }
}

impl From<std::io::Error> for RpcIntErr {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::TimedOut => Self::Timeout,
            std::io::ErrorKind::ConnectionRefused | std::io::ErrorKind::NotFound => {
                Self::Unreachable
            }
            std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::UnexpectedEof => Self::Cancelled,
            _ => Self::IO,
        }
    }
}

/// Result of a failed call, as seen by the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcError<E> {
    /// The handler failed with an application error.
    User(E),
    /// The call failed inside the framework.
    Rpc(RpcIntErr),
}

impl<E> RpcError<E> {
    #[inline]
    pub fn is_user(&self) -> bool {
        matches!(self, Self::User(_))
    }

    /// Returns the framework error, if this is one.
    #[inline]
    pub fn rpc(&self) -> Option<RpcIntErr> {
        match self {
            Self::Rpc(e) => Some(*e),
            Self::User(_) => None,
        }
    }
}

impl<E> From<RpcIntErr> for RpcError<E> {
    #[inline]
    fn from(e: RpcIntErr) -> Self {
        Self::Rpc(e)
    }
}

impl<E: fmt::Display> fmt::Display for RpcError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(e) => write!(f, "call failed: {}", e),
            Self::Rpc(e) => write!(f, "rpc error: {}", e),
        }
    }
}

impl<E: fmt::Display + fmt::Debug> std::error::Error for RpcError<E> {}
