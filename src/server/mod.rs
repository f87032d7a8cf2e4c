//! Handler side of the calculator service.

use crate::calc::{self, Average, Primes, RunningMax};
use crate::error::CalcError;
use crate::proto::*;
use calc_rpc_stream::Codec;
use calc_rpc_stream::error::{RpcError, RpcIntErr};
use calc_rpc_stream::pipe::{RecvHalf, SendHalf};
use calc_rpc_stream::server::{Dispatch, IncomingCall};
use std::time::Duration;

pub use calc_rpc_stream::server::{RpcServer, ServerConfig};

/// Settings of the calculator handlers
#[derive(Clone, Debug, Default)]
pub struct CalcConfig {
    /// Pause before emitting each prime, zero to stream as fast as the initiator drains
    pub prime_interval: Duration,
}

#[derive(Clone, Debug, Default)]
pub struct CalcServer {
    config: CalcConfig,
}

impl CalcServer {
    pub fn new(config: CalcConfig) -> Self {
        Self { config }
    }
}

impl<C: Codec> Dispatch<C> for CalcServer {
    async fn dispatch(&self, call: IncomingCall<C>) {
        logger_debug!(call.logger(), "dispatch {}", call.header());
        let Some(method) = CalcMethod::from_name(call.method()) else {
            call.reject(RpcIntErr::Method).await;
            return;
        };
        match method {
            CalcMethod::Sum => call.unary(sum).await,
            CalcMethod::PrimeNumbers => {
                let interval = self.config.prime_interval;
                call.server_stream(move |req, sink| prime_numbers(req, sink, interval)).await
            }
            CalcMethod::ComputeAverage => call.client_stream(compute_average).await,
            CalcMethod::FindMaxNumber => call.bidi(find_max_number).await,
        }
    }
}

async fn sum(req: SumReq) -> Result<SumResp, CalcError> {
    Ok(SumResp { sum: calc::sum(req.a, req.b) })
}

async fn prime_numbers<C: Codec>(
    req: PrimeNumbersReq, mut sink: SendHalf<PrimeNumbersResp, CalcError, C>, interval: Duration,
) -> Result<(), RpcError<CalcError>> {
    for value in Primes::up_to(req.limit) {
        if !interval.is_zero() {
            tokio::select! {
                biased;
                cause = sink.cancelled() => return Err(cause.into()),
                _ = tokio::time::sleep(interval) => {}
            }
        }
        sink.send(PrimeNumbersResp { value }).await?;
    }
    Ok(())
}

async fn compute_average<C: Codec>(
    mut requests: RecvHalf<ComputeAverageReq, CalcError, C>,
) -> Result<ComputeAverageResp, RpcError<CalcError>> {
    let mut avg = Average::default();
    while let Some(req) = requests.recv().await? {
        avg.push(req.value);
    }
    let average = avg.finish().map_err(RpcError::User)?;
    Ok(ComputeAverageResp { average })
}

async fn find_max_number<C: Codec>(
    mut requests: RecvHalf<FindMaxNumberReq, CalcError, C>,
    mut sink: SendHalf<FindMaxNumberResp, CalcError, C>,
) -> Result<(), RpcError<CalcError>> {
    let mut max = RunningMax::new();
    while let Some(req) = requests.recv().await? {
        if let Some(value) = max.observe(req.value) {
            sink.send(FindMaxNumberResp { value }).await?;
        }
    }
    Ok(())
}
