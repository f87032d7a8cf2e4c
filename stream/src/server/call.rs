//! Handler side of a single call, with one driver per call shape.

use crate::call::RawCall;
use crate::error::{RpcError, RpcIntErr};
use crate::pipe::{RecvHalf, SendHalf};
use crate::proto::{CallHeader, CallShape};
use crate::Codec;
use captains_log::filter::LogFilter;
use serde::{Serialize, de::DeserializeOwned};
use std::{future::Future, sync::Arc};

/// An accepted call, waiting for the [Dispatch](crate::server::Dispatch) implementation to
/// pick the driver matching its method.
pub struct IncomingCall<C: Codec> {
    raw: RawCall,
    codec: Arc<C>,
    logger: Arc<LogFilter>,
}

impl<C: Codec> IncomingCall<C> {
    pub(crate) fn new(raw: RawCall, codec: Arc<C>, logger: Arc<LogFilter>) -> Self {
        Self { raw, codec, logger }
    }

    #[inline]
    pub fn header(&self) -> &CallHeader {
        self.raw.header()
    }

    #[inline]
    pub fn method(&self) -> &str {
        &self.raw.header().method
    }

    #[inline]
    pub fn shape(&self) -> CallShape {
        self.raw.header().shape
    }

    #[inline]
    pub fn logger(&self) -> &LogFilter {
        &self.logger
    }

    /// Refuse the call, the initiator receives `err`.
    pub async fn reject(self, err: RpcIntErr) {
        logger_warn!(self.logger, "reject {}: {}", self.header(), err);
        let (mut tx, _rx) = self.raw.split::<(), (), (), C>(self.codec);
        let _ = tx.fail(RpcError::Rpc(err)).await;
    }

    /// Typed halves for a handler that drives the protocol itself.
    pub fn into_halves<Req, Resp, E>(self) -> (RecvHalf<Req, E, C>, SendHalf<Resp, E, C>) {
        let (tx, rx) = self.raw.split(self.codec);
        (rx, tx)
    }

    /// Check the shape and split, rejecting the call on a mismatch.
    async fn open<Req, Resp, E>(
        self, expect: CallShape,
    ) -> Option<(RecvHalf<Req, E, C>, SendHalf<Resp, E, C>, Arc<LogFilter>)> {
        if self.shape() != expect {
            logger_warn!(
                self.logger,
                "{} opened with shape {:?}, expect {:?}",
                self.method(),
                self.shape(),
                expect
            );
            self.reject(RpcIntErr::Method).await;
            return None;
        }
        let logger = self.logger.clone();
        let (rx, tx) = self.into_halves();
        Some((rx, tx, logger))
    }

    /// Receive exactly one request, reply with exactly one response.
    pub async fn unary<Req, Resp, E, F, FR>(self, handle: F)
    where
        Req: DeserializeOwned,
        Resp: Serialize,
        E: Serialize + DeserializeOwned,
        F: FnOnce(Req) -> FR,
        FR: Future<Output = Result<Resp, E>>,
    {
        let Some((mut rx, mut tx, logger)) = self.open::<Req, Resp, E>(CallShape::Unary).await
        else {
            return;
        };
        let res = match rx.recv_single().await {
            Ok(req) => match handle(req).await {
                Ok(resp) => tx.send(resp).await,
                Err(e) => Err(RpcError::User(e)),
            },
            Err(e) => Err(e),
        };
        finish(&logger, &mut tx, res).await;
    }

    /// Receive exactly one request, then let the handler emit any number of responses.
    ///
    /// The response direction is closed when the handler returns `Ok`.
    pub async fn server_stream<Req, Resp, E, F, FR>(self, handle: F)
    where
        Req: DeserializeOwned,
        Resp: Serialize,
        E: Serialize + DeserializeOwned,
        F: FnOnce(Req, SendHalf<Resp, E, C>) -> FR,
        FR: Future<Output = Result<(), RpcError<E>>>,
    {
        let Some((mut rx, mut tx, logger)) =
            self.open::<Req, Resp, E>(CallShape::ServerStream).await
        else {
            return;
        };
        let res = match rx.recv_single().await {
            Ok(req) => handle(req, tx.dup()).await,
            Err(e) => Err(e),
        };
        finish(&logger, &mut tx, res).await;
    }

    /// Let the handler consume the request stream and produce one response.
    pub async fn client_stream<Req, Resp, E, F, FR>(self, handle: F)
    where
        Req: DeserializeOwned,
        Resp: Serialize,
        E: Serialize + DeserializeOwned,
        F: FnOnce(RecvHalf<Req, E, C>) -> FR,
        FR: Future<Output = Result<Resp, RpcError<E>>>,
    {
        let Some((rx, mut tx, logger)) = self.open::<Req, Resp, E>(CallShape::ClientStream).await
        else {
            return;
        };
        let res = match handle(rx).await {
            Ok(resp) => tx.send(resp).await,
            Err(e) => Err(e),
        };
        finish(&logger, &mut tx, res).await;
    }

    /// Give the handler both directions, to run concurrently as it sees fit.
    ///
    /// The response direction is closed when the handler returns `Ok`.
    pub async fn bidi<Req, Resp, E, F, FR>(self, handle: F)
    where
        Req: DeserializeOwned,
        Resp: Serialize,
        E: Serialize + DeserializeOwned,
        F: FnOnce(RecvHalf<Req, E, C>, SendHalf<Resp, E, C>) -> FR,
        FR: Future<Output = Result<(), RpcError<E>>>,
    {
        let Some((rx, mut tx, logger)) = self.open::<Req, Resp, E>(CallShape::BidiStream).await
        else {
            return;
        };
        let res = handle(rx, tx.dup()).await;
        finish(&logger, &mut tx, res).await;
    }
}

/// Close the response direction, or carry the handler's error to the initiator.
async fn finish<Resp, E: Serialize, C: Codec>(
    logger: &LogFilter, tx: &mut SendHalf<Resp, E, C>, res: Result<(), RpcError<E>>,
) {
    match res {
        Ok(()) => {
            if let Err(e) = tx.close().await {
                logger_debug!(logger, "close response stream: {:?}", e.rpc());
            }
        }
        Err(e) => {
            if let Some(cause) = e.rpc() {
                logger_debug!(logger, "call failed: {}", cause);
            } else {
                logger_debug!(logger, "handler returned error");
            }
            if tx.state().is_terminal() {
                return;
            }
            let _ = tx.fail(e).await;
        }
    }
}
