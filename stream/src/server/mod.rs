//! This module contains the handler side of calls
//!
//! An [RpcServer] pulls calls out of one or more [ServerTransport]s. For every call it reads the
//! opening frame, bridges the call onto a Stream Coordinator, and hands an [IncomingCall] to the
//! user's [Dispatch] implementation on its own task.

use crate::call::RawCall;
use crate::error::RpcIntErr;
use crate::proto::{EncodedErr, Frame};
use crate::transport::{FrameSink, FrameSource, ServerTransport};
use crate::Codec;
use captains_log::filter::LogFilter;
use std::time::Duration;
use std::{
    future::Future,
    sync::{Arc, Weak},
};
use tokio::sync::watch;

mod call;
pub use call::IncomingCall;

pub use crate::ServerConfig;

/// Pause after a failed accept before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Routes an accepted call to the driver for its method.
///
/// Each call runs on its own task, any per-call state belongs to the returned future.
pub trait Dispatch<C: Codec>: Clone + Send + Sync + 'static {
    fn dispatch(&self, call: IncomingCall<C>) -> impl Future<Output = ()> + Send;
}

pub struct RpcServer {
    config: ServerConfig,
    logger: Arc<LogFilter>,
    closed: watch::Sender<bool>,
    /// one clone per in-flight call
    call_count: Arc<()>,
}

impl RpcServer {
    pub fn new(config: ServerConfig) -> Self {
        let (closed, _) = watch::channel(false);
        Self { config, logger: Arc::new(LogFilter::new()), closed, call_count: Arc::new(()) }
    }

    #[inline]
    pub fn set_log_level(&self, level: log::Level) {
        self.logger.set_level(level);
    }

    #[inline]
    pub fn get_config(&self) -> &ServerConfig {
        &self.config
    }

    /// Number of calls being handled.
    #[inline]
    pub fn active_count(&self) -> usize {
        Arc::strong_count(&self.call_count) - 1
    }

    /// Start accepting calls from `transport` on a background task.
    pub fn listen<T, C, D>(&self, transport: T, dispatch: D)
    where
        T: ServerTransport,
        C: Codec,
        D: Dispatch<C>,
    {
        let ctx = ServeCtx {
            config: self.config.clone(),
            logger: self.logger.clone(),
            closed: self.closed.subscribe(),
            codec: Arc::new(C::default()),
            dispatch,
        };
        tokio::spawn(accept_loop(transport, ctx, Arc::downgrade(&self.call_count)));
    }

    /// Cancel every in-flight call, stop accepting, and wait for the calls to wind down
    /// within `server_close_wait`.
    pub async fn close(&self) {
        logger_info!(self.logger, "server closing, {} active", self.active_count());
        self.closed.send_replace(true);
        let deadline = tokio::time::Instant::now() + self.config.server_close_wait;
        while self.active_count() > 0 {
            if tokio::time::Instant::now() >= deadline {
                logger_warn!(
                    self.logger,
                    "server close timeout, {} still active",
                    self.active_count()
                );
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        logger_info!(self.logger, "server closed");
    }
}

impl Drop for RpcServer {
    fn drop(&mut self) {
        self.closed.send_replace(true);
    }
}

struct ServeCtx<C: Codec, D: Dispatch<C>> {
    config: ServerConfig,
    logger: Arc<LogFilter>,
    closed: watch::Receiver<bool>,
    codec: Arc<C>,
    dispatch: D,
}

impl<C: Codec, D: Dispatch<C>> Clone for ServeCtx<C, D> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            logger: self.logger.clone(),
            closed: self.closed.clone(),
            codec: self.codec.clone(),
            dispatch: self.dispatch.clone(),
        }
    }
}

async fn accept_loop<T: ServerTransport, C: Codec, D: Dispatch<C>>(
    mut transport: T, ctx: ServeCtx<C, D>, call_count: Weak<()>,
) {
    let mut closed = ctx.closed.clone();
    loop {
        let res = tokio::select! {
            biased;
            _ = async { closed.wait_for(|c| *c).await.is_ok() } => break,
            res = transport.accept() => res,
        };
        match res {
            Ok((sink, source)) => {
                // the server is gone
                let Some(count) = call_count.upgrade() else { break };
                tokio::spawn(serve_call(sink, source, ctx.clone(), count));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => {
                logger_info!(ctx.logger, "listener closed: {}", e);
                break;
            }
            Err(e) => {
                // a failed link, or out of fds for now, later calls may still get through
                logger_error!(ctx.logger, "accept error: {}", e);
                tokio::select! {
                    biased;
                    _ = async { closed.wait_for(|c| *c).await.is_ok() } => break,
                    _ = tokio::time::sleep(ACCEPT_BACKOFF) => {}
                }
            }
        }
    }
    logger_debug!(ctx.logger, "accept loop exit");
}

async fn serve_call<S: FrameSink, R: FrameSource, C: Codec, D: Dispatch<C>>(
    mut sink: S, mut source: R, ctx: ServeCtx<C, D>, _count: Arc<()>,
) {
    let timeout = ctx.config.read_timeout;
    let first = if timeout.is_zero() {
        source.recv().await
    } else {
        match tokio::time::timeout(timeout, source.recv()).await {
            Ok(r) => r,
            Err(_) => Err(std::io::ErrorKind::TimedOut.into()),
        }
    };
    let header = match first {
        Ok(Some(Frame::Open(header))) => header,
        Ok(Some(frame)) => {
            logger_warn!(ctx.logger, "call started with {:?} instead of open", frame);
            let _ = sink.send(Frame::Fail(EncodedErr::Rpc(RpcIntErr::Protocol))).await;
            sink.close().await;
            return;
        }
        Ok(None) => return,
        Err(e) => {
            logger_warn!(ctx.logger, "read open frame: {}", e);
            let _ = sink.send(Frame::Fail(EncodedErr::Rpc(RpcIntErr::from(e)))).await;
            sink.close().await;
            return;
        }
    };
    logger_debug!(ctx.logger, "accepted call {}", header);
    let raw = RawCall::bridge(
        header,
        sink,
        source,
        ctx.closed.clone(),
        ctx.config.call_buf_size,
        ctx.logger.clone(),
    );
    ctx.dispatch.dispatch(IncomingCall::new(raw, ctx.codec.clone(), ctx.logger.clone())).await;
}
