//! The typed halves of a call.
//!
//! A [SendHalf] and a [RecvHalf] are independent: either can be moved to its own task, and
//! closing one never drops or blocks messages already queued in the other.

use crate::call::{CallCtl, CallSignal};
use crate::error::{RpcError, RpcIntErr};
use crate::proto::{EncodedErr, Frame};
use crate::state::CallState;
use crate::Codec;
use serde::{Serialize, de::DeserializeOwned};
use std::{marker::PhantomData, sync::Arc};
use tokio::sync::mpsc;

/// The outbound direction of a call, carrying messages of type `T`.
pub struct SendHalf<T, E, C> {
    tx: mpsc::Sender<Frame>,
    signal: CallSignal,
    codec: Arc<C>,
    _phan: PhantomData<fn(T, E)>,
}

impl<T, E, C: Codec> SendHalf<T, E, C> {
    pub(crate) fn new(tx: mpsc::Sender<Frame>, signal: CallSignal, codec: Arc<C>) -> Self {
        Self { tx, signal, codec, _phan: Default::default() }
    }

    /// A second handle on the same direction, the framework keeps one to close the direction
    /// after the handler returns.
    pub(crate) fn dup(&self) -> Self {
        Self::new(self.tx.clone(), self.signal.clone(), self.codec.clone())
    }

    #[inline]
    pub fn state(&self) -> CallState {
        self.signal.ctl().state()
    }

    #[inline]
    pub(crate) fn ctl(&self) -> &Arc<CallCtl> {
        self.signal.ctl()
    }

    async fn push(&mut self, frame: Frame) -> Result<(), RpcIntErr> {
        tokio::select! {
            biased;
            cause = self.signal.fired() => Err(cause),
            // the outbound pump is gone, only this direction is dead. The receiving half still
            // gets the peer's Fail or EOF.
            r = self.tx.send(frame) => r.map_err(|_| RpcIntErr::Cancelled),
        }
    }

    /// Resolves with the cause once the call is aborted, the peer went away or the connection
    /// closed. Lets a producer that waits between messages stop without sending first.
    pub async fn cancelled(&mut self) -> RpcIntErr {
        self.signal.fired().await
    }

    /// Half-close the direction, the peer observes the terminal signal after every message sent
    /// so far. Closing twice is a no-op.
    pub async fn close(&mut self) -> Result<(), RpcError<E>> {
        if self.ctl().close_send()? {
            self.push(Frame::End).await?;
        }
        Ok(())
    }

    /// Abort this direction with an error instead of the terminal signal.
    ///
    /// The local call is marked failed; the peer receives `err` in place of an end-of-stream.
    pub async fn fail(&mut self, err: RpcError<E>) -> Result<(), RpcError<E>>
    where
        E: Serialize,
    {
        let (cause, encoded) = match &err {
            RpcError::Rpc(e) => (*e, EncodedErr::Rpc(*e)),
            RpcError::User(e) => {
                let buf = self.codec.encode(e).map_err(|_| RpcIntErr::Encode)?;
                (RpcIntErr::Aborted, EncodedErr::User(buf))
            }
        };
        if !self.state().can_send() {
            // the direction is already over, there's nothing left to carry the error
            return Err(err);
        }
        self.ctl().mark_failed(cause);
        self.push(Frame::Fail(encoded)).await?;
        Ok(())
    }
}

impl<T: Serialize, E, C: Codec> SendHalf<T, E, C> {
    /// Send one message, suspends only when the direction's buffer is full.
    ///
    /// Sending after [SendHalf::close] is a protocol violation and fails the call.
    pub async fn send(&mut self, msg: T) -> Result<(), RpcError<E>> {
        match self.state() {
            CallState::Open | CallState::RecvHalfClosed => {}
            CallState::SendHalfClosed | CallState::BothClosed => {
                self.ctl().abort(RpcIntErr::SendAfterClose);
                return Err(RpcIntErr::SendAfterClose.into());
            }
            CallState::Failed(e) => return Err(e.into()),
        }
        let buf = self.codec.encode(&msg).map_err(|_| RpcIntErr::Encode)?;
        self.push(Frame::Msg(buf)).await?;
        Ok(())
    }
}

/// The inbound direction of a call, carrying messages of type `T`.
pub struct RecvHalf<T, E, C> {
    rx: mpsc::Receiver<Frame>,
    signal: CallSignal,
    codec: Arc<C>,
    ended: bool,
    _phan: PhantomData<fn() -> (T, E)>,
}

impl<T, E, C> RecvHalf<T, E, C> {
    pub(crate) fn new(rx: mpsc::Receiver<Frame>, signal: CallSignal, codec: Arc<C>) -> Self {
        Self { rx, signal, codec, ended: false, _phan: Default::default() }
    }

    #[inline]
    pub fn state(&self) -> CallState {
        self.signal.ctl().state()
    }

    /// Whether the peer's terminal signal has been observed.
    #[inline]
    pub fn is_ended(&self) -> bool {
        self.ended
    }
}

impl<T: DeserializeOwned, E: DeserializeOwned, C: Codec> RecvHalf<T, E, C> {
    /// Receive the next message.
    ///
    /// Returns `Ok(None)` once the peer's terminal signal has been observed (and on every call
    /// after that). An `Err` means the stream failed: messages received before it must not be
    /// taken as a complete result. Any error here fails the whole call.
    pub async fn recv(&mut self) -> Result<Option<T>, RpcError<E>> {
        if self.ended {
            return Ok(None);
        }
        let frame = tokio::select! {
            biased;
            cause = self.signal.fired() => return Err(cause.into()),
            frame = self.rx.recv() => frame,
        };
        match frame {
            Some(Frame::Msg(buf)) => match self.codec.decode::<T>(&buf) {
                Ok(msg) => Ok(Some(msg)),
                Err(_) => Err(self.violation(RpcIntErr::Decode)),
            },
            Some(Frame::End) => {
                self.ended = true;
                Ok(None)
            }
            Some(Frame::Fail(EncodedErr::Rpc(e))) => {
                self.signal.ctl().abort(e);
                Err(e.into())
            }
            Some(Frame::Fail(EncodedErr::User(buf))) => match self.codec.decode::<E>(&buf) {
                Ok(e) => {
                    self.signal.ctl().abort(RpcIntErr::Aborted);
                    Err(RpcError::User(e))
                }
                Err(_) => Err(self.violation(RpcIntErr::Decode)),
            },
            Some(Frame::Open(_)) => Err(self.violation(RpcIntErr::Protocol)),
            // the pump quit without a terminal frame, the call was torn down underneath us
            None => Err(self.violation(RpcIntErr::Cancelled)),
        }
    }

    /// Receive exactly one message followed by the terminal signal.
    pub(crate) async fn recv_single(&mut self) -> Result<T, RpcError<E>> {
        let Some(msg) = self.recv().await? else {
            return Err(self.violation(RpcIntErr::Protocol));
        };
        if self.recv().await?.is_some() {
            return Err(self.violation(RpcIntErr::Protocol));
        }
        Ok(msg)
    }

    /// Drain every remaining message until the terminal signal.
    pub async fn collect(&mut self) -> Result<Vec<T>, RpcError<E>> {
        let mut items = Vec::new();
        while let Some(item) = self.recv().await? {
            items.push(item);
        }
        Ok(items)
    }

    fn violation(&self, cause: RpcIntErr) -> RpcError<E> {
        self.signal.ctl().abort(cause);
        cause.into()
    }
}
