//! Lifecycle of one side's view of a call.
//!
//! ```text
//! Open ──close_send──> SendHalfClosed ──recv_end──> BothClosed
//!   └───recv_end───> RecvHalfClosed ──close_send──┘
//! any non-terminal state ──fail──> Failed
//! ```

use crate::error::RpcIntErr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Open,
    /// We sent our end-of-stream, the peer may still send.
    SendHalfClosed,
    /// The peer sent its end-of-stream, we may still send.
    RecvHalfClosed,
    BothClosed,
    Failed(RpcIntErr),
}

impl CallState {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::BothClosed | Self::Failed(_))
    }

    #[inline]
    pub fn can_send(&self) -> bool {
        matches!(self, Self::Open | Self::RecvHalfClosed)
    }

    /// Half-close the send direction.
    ///
    /// Returns `Ok(None)` when the send direction was already closed.
    pub fn close_send(self) -> Result<Option<Self>, RpcIntErr> {
        match self {
            Self::Open => Ok(Some(Self::SendHalfClosed)),
            Self::RecvHalfClosed => Ok(Some(Self::BothClosed)),
            Self::SendHalfClosed | Self::BothClosed => Ok(None),
            Self::Failed(e) => Err(e),
        }
    }

    /// The peer's end-of-stream has been observed.
    pub fn recv_end(self) -> Result<Self, RpcIntErr> {
        match self {
            Self::Open => Ok(Self::RecvHalfClosed),
            Self::SendHalfClosed => Ok(Self::BothClosed),
            Self::RecvHalfClosed | Self::BothClosed => Err(RpcIntErr::RecvAfterEnd),
            Self::Failed(e) => Err(e),
        }
    }

    /// Terminal states absorb later failures, the first cause wins.
    #[inline]
    pub fn fail(self, cause: RpcIntErr) -> Option<Self> {
        if self.is_terminal() { None } else { Some(Self::Failed(cause)) }
    }
}
