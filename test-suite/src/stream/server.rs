use super::client::*;
use crate::{Codec, Endpoint, ServerConfig};
use calc_rpc_stream::error::{RpcError, RpcIntErr};
use calc_rpc_stream::pipe::{RecvHalf, SendHalf};
use calc_rpc_stream::server::{Dispatch, IncomingCall, RpcServer};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

pub const TICK: Duration = Duration::from_millis(20);

pub fn init_server(config: ServerConfig) -> RpcServer {
    let server = RpcServer::new(config);
    server.set_log_level(log::Level::Trace);
    server
}

pub async fn init_server_closure<H, FH>(
    server_handle: H, config: ServerConfig, is_tcp: bool,
) -> (RpcServer, Endpoint)
where
    H: Fn(IncomingCall<Codec>) -> FH + Send + Sync + 'static + Clone,
    FH: Future<Output = ()> + Send + 'static,
{
    let server = init_server(config);
    let endpoint = crate::listen(&server, DispatchClosure(server_handle), is_tcp).await;
    (server, endpoint)
}

pub async fn init_echo_server(config: ServerConfig, is_tcp: bool) -> (RpcServer, EchoServer, Endpoint) {
    let server = init_server(config);
    let echo = EchoServer::default();
    let endpoint = crate::listen(&server, echo.clone(), is_tcp).await;
    (server, echo, endpoint)
}

/// Turns a closure into a [Dispatch], for tests that handle calls by hand.
#[derive(Clone)]
pub struct DispatchClosure<H>(pub H);

impl<H, FH> Dispatch<Codec> for DispatchClosure<H>
where
    H: Fn(IncomingCall<Codec>) -> FH + Send + Sync + 'static + Clone,
    FH: Future<Output = ()> + Send + 'static,
{
    fn dispatch(&self, call: IncomingCall<Codec>) -> impl Future<Output = ()> + Send {
        (self.0)(call)
    }
}

#[derive(Clone, Default)]
pub struct EchoServer {
    /// ticks sent by `Echo/Tick` handlers, over every call
    pub ticks: Arc<AtomicUsize>,
    /// `Echo/Tick` handlers that returned
    pub tick_done: Arc<AtomicUsize>,
}

impl Dispatch<Codec> for EchoServer {
    async fn dispatch(&self, call: IncomingCall<Codec>) {
        log::debug!("echo server got {}", call.header());
        let method = call.method().to_string();
        match method.as_str() {
            ECHO_SAY => call.unary(say).await,
            ECHO_REPEAT => call.server_stream(repeat).await,
            ECHO_COUNT => call.client_stream(count).await,
            ECHO_CHAT => call.bidi(chat).await,
            ECHO_SILENT => {
                let (mut rx, mut tx) = call.into_halves::<String, String, EchoErr>();
                let req = rx.recv().await;
                log::debug!("silent got {:?}", req);
                let _ = tx.close().await;
            }
            ECHO_TICK => {
                let ticks = self.ticks.clone();
                call.server_stream(move |_: (), sink| tick(sink, ticks)).await;
                self.tick_done.fetch_add(1, Ordering::SeqCst);
            }
            _ => call.reject(RpcIntErr::Method).await,
        }
    }
}

async fn say(req: String) -> Result<String, EchoErr> {
    if req == "fail" { Err("refused".to_string()) } else { Ok(req) }
}

async fn repeat(
    req: RepeatReq, mut sink: SendHalf<String, EchoErr, Codec>,
) -> Result<(), RpcError<EchoErr>> {
    for i in 0..req.times {
        if req.word == "boom" && i == 3 {
            return Err(RpcError::User("boom".to_string()));
        }
        sink.send(req.word.clone()).await?;
    }
    Ok(())
}

async fn count(mut requests: RecvHalf<String, EchoErr, Codec>) -> Result<u64, RpcError<EchoErr>> {
    let mut n = 0;
    while requests.recv().await?.is_some() {
        n += 1;
    }
    Ok(n)
}

async fn chat(
    mut requests: RecvHalf<String, EchoErr, Codec>, mut sink: SendHalf<String, EchoErr, Codec>,
) -> Result<(), RpcError<EchoErr>> {
    while let Some(req) = requests.recv().await? {
        sink.send(req).await?;
    }
    Ok(())
}

async fn tick(
    mut sink: SendHalf<u64, EchoErr, Codec>, ticks: Arc<AtomicUsize>,
) -> Result<(), RpcError<EchoErr>> {
    let mut i = 0u64;
    loop {
        sink.send(i).await?;
        ticks.fetch_add(1, Ordering::SeqCst);
        i += 1;
        tokio::time::sleep(TICK).await;
    }
}
