//! Initiator side of the calculator service.

use crate::error::{CalcError, CalcResult};
use crate::proto::*;
use calc_rpc_codec::MsgpCodec;
use calc_rpc_stream::Codec;
use calc_rpc_stream::client::{ClientConn, ClientStreamCall};
use calc_rpc_stream::error::RpcIntErr;
use calc_rpc_stream::pipe::{RecvHalf, SendHalf};
use calc_rpc_stream::transport::ClientTransport;
use calc_rpc_stream::ClientConfig;
use std::time::Duration;

pub type PrimeStream<C> = RecvHalf<PrimeNumbersResp, CalcError, C>;
pub type MaxSender<C> = SendHalf<FindMaxNumberReq, CalcError, C>;
pub type MaxReceiver<C> = RecvHalf<FindMaxNumberResp, CalcError, C>;

pub struct CalcClient<T: ClientTransport, C: Codec = MsgpCodec> {
    conn: ClientConn<T, C>,
}

impl<T: ClientTransport, C: Codec> CalcClient<T, C> {
    pub fn new(transport: T, config: ClientConfig) -> Self {
        Self { conn: ClientConn::new(transport, config) }
    }

    #[inline]
    pub fn conn(&self) -> &ClientConn<T, C> {
        &self.conn
    }

    /// Fail every call in flight on this client with [RpcIntErr::Cancelled].
    #[inline]
    pub fn close(&self) {
        self.conn.close();
    }

    pub async fn sum(&self, a: f64, b: f64) -> CalcResult<f64> {
        let req = SumReq { a, b };
        let resp = self.conn.unary::<_, SumResp, CalcError>(CalcMethod::Sum.name(), req).await?;
        Ok(resp.sum)
    }

    /// Start the prime enumeration, drain the returned stream until `Ok(None)`.
    pub async fn prime_numbers(&self, limit: i64) -> CalcResult<PrimeStream<C>> {
        self.conn.server_stream(CalcMethod::PrimeNumbers.name(), PrimeNumbersReq { limit }).await
    }

    /// All primes in `[0, limit]`, only returned when the stream ended normally.
    pub async fn prime_numbers_all(&self, limit: i64) -> CalcResult<Vec<i64>> {
        let mut stream = self.prime_numbers(limit).await?;
        let mut primes = Vec::new();
        while let Some(resp) = stream.recv().await? {
            primes.push(resp.value);
        }
        Ok(primes)
    }

    pub async fn compute_average(&self) -> CalcResult<AverageCall<C>> {
        let method = CalcMethod::ComputeAverage.name();
        let call = self.conn.client_stream::<_, _, CalcError>(method).await?;
        Ok(AverageCall { call })
    }

    /// Send every value, half-close, and wait for the average.
    pub async fn compute_average_of(
        &self, values: impl IntoIterator<Item = i64>,
    ) -> CalcResult<i64> {
        let mut call = self.compute_average().await?;
        for value in values {
            call.send(value).await?;
        }
        call.close_and_recv().await
    }

    /// Open the max-tracking call, the halves can be driven from separate tasks.
    pub async fn find_max_number(&self) -> CalcResult<(MaxSender<C>, MaxReceiver<C>)> {
        self.conn.bidi_stream(CalcMethod::FindMaxNumber.name()).await
    }

    /// Stream `values` (paced by `pace`) while collecting every new maximum on another task.
    ///
    /// Completes when the receiving task sees the end of the response stream. A failure on the
    /// sending task only stops the sending; a failure on the receiving task fails the call.
    pub async fn find_max_of(&self, values: Vec<i64>, pace: Duration) -> CalcResult<Vec<i64>> {
        let (mut tx, mut rx) = self.find_max_number().await?;
        let sender = tokio::spawn(async move {
            for value in values {
                tx.send(FindMaxNumberReq { value }).await?;
                if !pace.is_zero() {
                    tokio::time::sleep(pace).await;
                }
            }
            tx.close().await
        });
        let receiver = tokio::spawn(async move {
            let mut maxes = Vec::new();
            while let Some(resp) = rx.recv().await? {
                maxes.push(resp.value);
            }
            Ok::<_, calc_rpc_stream::error::RpcError<CalcError>>(maxes)
        });
        let res = receiver.await.map_err(|_| RpcIntErr::Aborted)?;
        match sender.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                logger_debug!(self.conn.logger(), "find_max send side: {}", e);
            }
            Err(_) => {
                logger_warn!(self.conn.logger(), "find_max send task panicked");
            }
        }
        res
    }
}

/// Initiator side of `ComputeAverage`.
pub struct AverageCall<C: Codec> {
    call: ClientStreamCall<ComputeAverageReq, ComputeAverageResp, CalcError, C>,
}

impl<C: Codec> AverageCall<C> {
    #[inline]
    pub async fn send(&mut self, value: i64) -> CalcResult<()> {
        self.call.send(ComputeAverageReq { value }).await
    }

    pub async fn close_and_recv(self) -> CalcResult<i64> {
        let resp = self.call.close_and_recv().await?;
        Ok(resp.average)
    }
}
