//! Per-call plumbing between the typed halves and the transport.
//!
//! [RawCall::bridge] spawns two pumps for every call: one moves frames from the
//! [SendHalf](crate::pipe::SendHalf) to the transport sink, the other moves frames from the
//! transport source to the [RecvHalf](crate::pipe::RecvHalf). Both directions are closed
//! independently; an abort, or the close of the owning connection, tears down both.

use crate::error::RpcIntErr;
use crate::pipe::{RecvHalf, SendHalf};
use crate::proto::{CallHeader, EncodedErr, Frame};
use crate::state::CallState;
use crate::transport::{FrameSink, FrameSource};
use crate::Codec;
use captains_log::filter::LogFilter;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};

/// State shared by the two halves and the two pumps of one side of a call.
pub struct CallCtl {
    state: Mutex<CallState>,
    abort: watch::Sender<Option<RpcIntErr>>,
    /// Set once the peer's End was read off the link.
    peer_end: watch::Sender<bool>,
    conn_closed: watch::Receiver<bool>,
}

impl CallCtl {
    pub(crate) fn new(conn_closed: watch::Receiver<bool>) -> Arc<Self> {
        let (abort, _) = watch::channel(None);
        let (peer_end, _) = watch::channel(false);
        Arc::new(Self { state: Mutex::new(CallState::Open), abort, peer_end, conn_closed })
    }

    #[inline]
    pub fn state(&self) -> CallState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[inline]
    fn update<R>(&self, f: impl FnOnce(&mut CallState) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    /// Returns false when the send direction was already closed.
    pub(crate) fn close_send(&self) -> Result<bool, RpcIntErr> {
        self.update(|state| match state.close_send()? {
            Some(next) => {
                *state = next;
                Ok(true)
            }
            None => Ok(false),
        })
    }

    /// Applied by the inbound pump, not when the receiving half gets to it.
    pub(crate) fn recv_end(&self) -> Result<(), RpcIntErr> {
        self.update(|state| {
            *state = state.recv_end()?;
            Ok(())
        })
    }

    /// Record a failure without waking the pumps, used when the failure itself is still to be
    /// written out as a `Fail` frame.
    pub(crate) fn mark_failed(&self, cause: RpcIntErr) {
        self.update(|state| {
            if let Some(next) = state.fail(cause) {
                *state = next;
            }
        })
    }

    /// Fail the call and wake everything waiting on it.
    ///
    /// Has no effect once the call reached a terminal state.
    pub fn abort(&self, cause: RpcIntErr) {
        let changed = self.update(|state| match state.fail(cause) {
            Some(next) => {
                *state = next;
                true
            }
            None => false,
        });
        if changed {
            self.abort.send_if_modified(|c| {
                if c.is_none() {
                    *c = Some(cause);
                    true
                } else {
                    false
                }
            });
        }
    }

    pub(crate) fn signal(self: &Arc<Self>) -> CallSignal {
        CallSignal {
            ctl: self.clone(),
            abort: self.abort.subscribe(),
            conn_closed: self.conn_closed.clone(),
        }
    }

    #[inline]
    fn peer_ended(&self) {
        self.peer_end.send_replace(true);
    }

    /// Resolves once the peer's End was read off the link.
    async fn peer_end_seen(&self) {
        let mut peer_end = self.peer_end.subscribe();
        // the sender lives in self, so the wait can only end on the flag
        let _ = peer_end.wait_for(|seen| *seen).await;
    }
}

/// Fires when the call is aborted or its connection is closed.
#[derive(Clone)]
pub struct CallSignal {
    ctl: Arc<CallCtl>,
    abort: watch::Receiver<Option<RpcIntErr>>,
    conn_closed: watch::Receiver<bool>,
}

impl CallSignal {
    /// Resolves with the cause once the call must stop, immediately if it already has.
    ///
    /// A dropped connection handle counts as a closed connection.
    pub async fn fired(&mut self) -> RpcIntErr {
        let abort = &mut self.abort;
        let conn_closed = &mut self.conn_closed;
        let cause = tokio::select! {
            r = async move { abort.wait_for(|c| c.is_some()).await.map(|c| *c) } => {
                r.ok().flatten().unwrap_or(RpcIntErr::Aborted)
            }
            _ = async move { conn_closed.wait_for(|closed| *closed).await.is_ok() } => {
                RpcIntErr::Cancelled
            }
        };
        self.ctl.abort(cause);
        cause
    }

    #[inline]
    pub fn ctl(&self) -> &Arc<CallCtl> {
        &self.ctl
    }
}

/// One side of a call, bridged onto its transport but not yet typed.
pub struct RawCall {
    pub(crate) header: CallHeader,
    pub(crate) out_tx: mpsc::Sender<Frame>,
    pub(crate) in_rx: mpsc::Receiver<Frame>,
    pub(crate) ctl: Arc<CallCtl>,
}

impl RawCall {
    /// Spawn the pumps of a call on the current tokio runtime.
    pub(crate) fn bridge<S: FrameSink, R: FrameSource>(
        header: CallHeader, sink: S, source: R, conn_closed: watch::Receiver<bool>,
        buf_size: usize, logger: Arc<LogFilter>,
    ) -> Self {
        let ctl = CallCtl::new(conn_closed);
        let (out_tx, out_rx) = mpsc::channel(buf_size.max(1));
        let (in_tx, in_rx) = mpsc::channel(buf_size.max(1));
        tokio::spawn(pump_out(header.clone(), sink, out_rx, ctl.signal(), logger.clone()));
        tokio::spawn(pump_in(header.clone(), source, in_tx, ctl.signal(), logger));
        Self { header, out_tx, in_rx, ctl }
    }

    #[inline]
    pub fn header(&self) -> &CallHeader {
        &self.header
    }

    #[inline]
    pub fn ctl(&self) -> &Arc<CallCtl> {
        &self.ctl
    }

    /// Type the two directions of the call.
    pub fn split<Out, In, E, C: Codec>(
        self, codec: Arc<C>,
    ) -> (SendHalf<Out, E, C>, RecvHalf<In, E, C>) {
        let tx = SendHalf::new(self.out_tx, self.ctl.signal(), codec.clone());
        let rx = RecvHalf::new(self.in_rx, self.ctl.signal(), codec);
        (tx, rx)
    }
}

async fn pump_out<S: FrameSink>(
    header: CallHeader, mut sink: S, mut rx: mpsc::Receiver<Frame>, mut signal: CallSignal,
    logger: Arc<LogFilter>,
) {
    loop {
        let frame = tokio::select! {
            biased;
            cause = signal.fired() => {
                logger_debug!(logger, "{} aborted: {}", header, cause);
                let _ = sink.send(Frame::Fail(EncodedErr::Rpc(cause))).await;
                break;
            }
            frame = rx.recv() => frame,
        };
        // all senders gone without end-of-stream
        let frame = frame.unwrap_or(Frame::Fail(EncodedErr::Rpc(RpcIntErr::Cancelled)));
        logger_trace!(logger, "{} send {:?}", header, frame);
        let is_end = matches!(frame, Frame::End);
        let terminal = frame.is_terminal();
        if let Err(e) = sink.send(frame).await {
            logger_debug!(logger, "{} send failed: {}", header, e);
            if e.kind() == std::io::ErrorKind::TimedOut {
                signal.ctl().abort(RpcIntErr::Timeout);
            }
            // otherwise the peer is gone, the inbound pump reports its Fail or EOF
            break;
        }
        if is_end {
            // The link stays up until the peer's End arrived too, so an EOF after our End
            // tells the peer that we went away. Nothing is written after End, an abort just
            // closes the link.
            let ctl = signal.ctl().clone();
            tokio::select! {
                biased;
                cause = signal.fired() => {
                    logger_debug!(logger, "{} aborted after end of stream: {}", header, cause);
                }
                _ = ctl.peer_end_seen() => {}
            }
            break;
        }
        if terminal {
            break;
        }
    }
    sink.close().await;
}

async fn pump_in<R: FrameSource>(
    header: CallHeader, mut source: R, tx: mpsc::Sender<Frame>, mut signal: CallSignal,
    logger: Arc<LogFilter>,
) {
    let mut ended = false;
    // The peer's End, when our side was closed already. The peer drops the link right after,
    // and it is handed out on EOF.
    let mut held_end = false;
    loop {
        let res = tokio::select! {
            biased;
            _ = signal.fired() => break,
            res = source.recv() => res,
        };
        let frame = match res {
            Ok(Some(frame)) => frame,
            Ok(None) if held_end => {
                end_of_stream(&tx, &mut signal).await;
                break;
            }
            Err(e) if held_end => {
                // both directions ended in frames already
                logger_debug!(logger, "{} recv error after both ends: {}", header, e);
                end_of_stream(&tx, &mut signal).await;
                break;
            }
            Ok(None) if ended => {
                // a peer only drops the link after End once our End reached it, or on failure
                if signal.ctl().state().can_send() {
                    logger_debug!(logger, "{} peer gone while we still send", header);
                    signal.ctl().abort(RpcIntErr::Cancelled);
                }
                break;
            }
            Ok(None) => {
                logger_debug!(logger, "{} peer gone before end of stream", header);
                deliver_fail(&tx, &mut signal, EncodedErr::Rpc(RpcIntErr::Cancelled)).await;
                break;
            }
            Err(e) if ended => {
                if signal.ctl().state().can_send() {
                    logger_warn!(logger, "{} recv error while we still send: {}", header, e);
                    signal.ctl().abort(RpcIntErr::Cancelled);
                }
                break;
            }
            Err(e) => {
                logger_warn!(logger, "{} recv error: {}", header, e);
                deliver_fail(&tx, &mut signal, EncodedErr::Rpc(RpcIntErr::from(e))).await;
                break;
            }
        };
        logger_trace!(logger, "{} recv {:?}", header, frame);
        if ended {
            // no effect only when the application already finished the call: it saw the End,
            // then closed its own side
            logger_warn!(logger, "{} got {:?} after end of stream", header, frame);
            signal.ctl().abort(RpcIntErr::RecvAfterEnd);
            continue;
        }
        match frame {
            Frame::Open(_) => {
                logger_warn!(logger, "{} got a second open frame", header);
                signal.ctl().abort(RpcIntErr::Protocol);
                break;
            }
            Frame::End => {
                ended = true;
                signal.ctl().peer_ended();
                if signal.ctl().state().can_send() {
                    end_of_stream(&tx, &mut signal).await;
                } else {
                    held_end = true;
                }
            }
            Frame::Fail(e) => {
                deliver_fail(&tx, &mut signal, e).await;
                break;
            }
            Frame::Msg(_) => {
                if !deliver(&tx, &mut signal, frame).await {
                    // the receiving half is gone. If the call already failed there's no signal
                    // to fire, keep draining until EOF so the peer is not reset mid-reply.
                    signal.ctl().abort(RpcIntErr::Cancelled);
                }
            }
        }
    }
}

async fn end_of_stream(tx: &mpsc::Sender<Frame>, signal: &mut CallSignal) {
    if signal.ctl().recv_end().is_ok() {
        deliver(tx, signal, Frame::End).await;
    }
}

/// The receiving half fails the call when it reads the frame. Nobody is left to read it once
/// that half is dropped, then the call is failed here.
async fn deliver_fail(tx: &mpsc::Sender<Frame>, signal: &mut CallSignal, err: EncodedErr) {
    let cause = match &err {
        EncodedErr::Rpc(e) => *e,
        EncodedErr::User(_) => RpcIntErr::Aborted,
    };
    if !deliver(tx, signal, Frame::Fail(err)).await {
        signal.ctl().abort(cause);
    }
}

/// Returns false when the frame could not be handed to the receiving half.
async fn deliver(tx: &mpsc::Sender<Frame>, signal: &mut CallSignal, frame: Frame) -> bool {
    tokio::select! {
        biased;
        _ = signal.fired() => false,
        r = tx.send(frame) => r.is_ok(),
    }
}
