//! The call initiator.
//!
//! A [ClientConn] opens calls over a [ClientTransport], one transport link per call. Closing the
//! connection (or dropping it) fails every call still in flight on it with
//! [RpcIntErr::Cancelled].

use crate::call::RawCall;
use crate::error::{RpcError, RpcIntErr};
use crate::pipe::{RecvHalf, SendHalf};
use crate::proto::{CallHeader, CallShape, Frame};
use crate::transport::{ClientTransport, FrameSink};
use crate::{ClientConfig, Codec};
use captains_log::filter::LogFilter;
use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;
use tokio::sync::watch;

pub struct ClientConn<T: ClientTransport, C: Codec> {
    transport: T,
    config: ClientConfig,
    codec: Arc<C>,
    logger: Arc<LogFilter>,
    closed: watch::Sender<bool>,
}

impl<T: ClientTransport, C: Codec> ClientConn<T, C> {
    pub fn new(transport: T, config: ClientConfig) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            transport,
            config,
            codec: Arc::new(C::default()),
            logger: Arc::new(LogFilter::new()),
            closed,
        }
    }

    #[inline]
    pub fn set_log_level(&self, level: log::Level) {
        self.logger.set_level(level);
    }

    #[inline]
    pub fn get_config(&self) -> &ClientConfig {
        &self.config
    }

    #[inline]
    pub fn logger(&self) -> &LogFilter {
        &self.logger
    }

    /// Fail every in-flight call with [RpcIntErr::Cancelled] and refuse new ones.
    pub fn close(&self) {
        logger_debug!(self.logger, "closing connection");
        self.closed.send_replace(true);
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Open a call of any shape and return both halves.
    ///
    /// The shape helpers below are built on this; use it directly to drive a call by hand.
    pub async fn open<Req, Resp, E>(
        &self, method: &str, shape: CallShape,
    ) -> Result<(SendHalf<Req, E, C>, RecvHalf<Resp, E, C>), RpcError<E>> {
        if self.is_closed() {
            return Err(RpcIntErr::Cancelled.into());
        }
        let header = CallHeader::new(method, shape);
        logger_debug!(self.logger, "open call {}", header);
        let timeout = self.config.connect_timeout;
        let (mut sink, source) = if timeout.is_zero() {
            self.transport.connect().await
        } else {
            match tokio::time::timeout(timeout, self.transport.connect()).await {
                Ok(r) => r,
                Err(_) => Err(std::io::ErrorKind::TimedOut.into()),
            }
        }
        .map_err(|e| {
            logger_warn!(self.logger, "connect for {} failed: {}", header, e);
            RpcIntErr::from(e)
        })?;
        if let Err(e) = sink.send(Frame::Open(header.clone())).await {
            logger_warn!(self.logger, "open {} failed: {}", header, e);
            return Err(RpcIntErr::from(e).into());
        }
        let raw = RawCall::bridge(
            header,
            sink,
            source,
            self.closed.subscribe(),
            self.config.call_buf_size,
            self.logger.clone(),
        );
        Ok(raw.split(self.codec.clone()))
    }
}

impl<T: ClientTransport, C: Codec> ClientConn<T, C> {
    /// One request, one response.
    pub async fn unary<Req, Resp, E>(&self, method: &str, req: Req) -> Result<Resp, RpcError<E>>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
        E: DeserializeOwned,
    {
        let (mut tx, mut rx) = self.open::<Req, Resp, E>(method, CallShape::Unary).await?;
        tx.send(req).await?;
        tx.close().await?;
        rx.recv_single().await
    }

    /// One request, then a stream of responses to drain until `Ok(None)`.
    pub async fn server_stream<Req, Resp, E>(
        &self, method: &str, req: Req,
    ) -> Result<RecvHalf<Resp, E, C>, RpcError<E>>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
        E: DeserializeOwned,
    {
        let (mut tx, rx) = self.open::<Req, Resp, E>(method, CallShape::ServerStream).await?;
        tx.send(req).await?;
        tx.close().await?;
        Ok(rx)
    }

    /// A stream of requests, then one response after [ClientStreamCall::close_and_recv].
    pub async fn client_stream<Req, Resp, E>(
        &self, method: &str,
    ) -> Result<ClientStreamCall<Req, Resp, E, C>, RpcError<E>>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
        E: DeserializeOwned,
    {
        let (tx, rx) = self.open::<Req, Resp, E>(method, CallShape::ClientStream).await?;
        Ok(ClientStreamCall { tx, rx })
    }

    /// Independent request and response streams.
    ///
    /// The call is only complete once the returned [RecvHalf] has yielded `Ok(None)`; finishing
    /// the send side alone loses the trailing responses.
    pub async fn bidi_stream<Req, Resp, E>(
        &self, method: &str,
    ) -> Result<(SendHalf<Req, E, C>, RecvHalf<Resp, E, C>), RpcError<E>>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
        E: DeserializeOwned,
    {
        self.open::<Req, Resp, E>(method, CallShape::BidiStream).await
    }
}

impl<T: ClientTransport, C: Codec> Drop for ClientConn<T, C> {
    fn drop(&mut self) {
        self.closed.send_replace(true);
    }
}

/// Initiator side of a client-streaming call.
pub struct ClientStreamCall<Req, Resp, E, C> {
    tx: SendHalf<Req, E, C>,
    rx: RecvHalf<Resp, E, C>,
}

impl<Req, Resp, E, C> ClientStreamCall<Req, Resp, E, C>
where
    Req: Serialize,
    Resp: DeserializeOwned,
    E: DeserializeOwned,
    C: Codec,
{
    #[inline]
    pub async fn send(&mut self, req: Req) -> Result<(), RpcError<E>> {
        self.tx.send(req).await
    }

    /// Half-close the request stream and wait for the single response.
    pub async fn close_and_recv(mut self) -> Result<Resp, RpcError<E>> {
        self.tx.close().await?;
        self.rx.recv_single().await
    }
}
