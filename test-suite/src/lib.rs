pub mod api;
pub mod stream;

extern crate captains_log;
extern crate log;
pub use captains_log::logfn;
use captains_log::*;
pub use calc_rpc_core::{ClientConfig, ServerConfig};
use calc_rpc_stream::mem::{self, MemConnector};
use calc_rpc_stream::server::{Dispatch, RpcServer};
pub use calc_rpc_tcp::TcpClient;
use calc_rpc_tcp::TcpServer;
use rstest::*;
use std::fmt;
use std::time::Duration;
use tokio::runtime::Runtime;

pub type Codec = calc_rpc_codec::MsgpCodec;

/// Where the calls of a test go, the same scenario runs against both.
pub enum Endpoint {
    Mem(MemConnector),
    Tcp(String),
}

/// Start accepting on `server`, over a fresh in-memory channel or a TCP port picked by the OS.
pub async fn listen<D: Dispatch<Codec>>(server: &RpcServer, dispatch: D, is_tcp: bool) -> Endpoint {
    if is_tcp {
        let transport = TcpServer::bind("127.0.0.1:0", server.get_config()).await.expect("bind");
        let addr = transport.local_addr().expect("local addr").to_string();
        server.listen::<_, Codec, _>(transport, dispatch);
        Endpoint::Tcp(addr)
    } else {
        let (connector, listener) = mem::channel(server.get_config().call_buf_size);
        server.listen::<_, Codec, _>(listener, dispatch);
        Endpoint::Mem(connector)
    }
}

/// Poll `cond` until it holds, false on timeout.
pub async fn wait_until<F: Fn() -> bool>(cond: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while !cond() {
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    true
}

/// Poll until the server has no call in flight.
#[inline]
pub async fn wait_idle(server: &RpcServer, timeout: Duration) -> bool {
    wait_until(|| server.active_count() == 0, timeout).await
}

/// Run `$scenario(transport, config, args..)` with the client transport matching `$endpoint`.
///
/// `$scenario` must be generic over `ClientTransport`.
#[macro_export]
macro_rules! with_transport {
    ($endpoint: expr, $config: expr, $scenario: path $(, $arg: expr)*) => {{
        let config: $crate::ClientConfig = $config;
        match $endpoint {
            $crate::Endpoint::Mem(connector) => $scenario(connector, config $(, $arg)*).await,
            $crate::Endpoint::Tcp(addr) => {
                let transport = $crate::TcpClient::new(addr, &config);
                $scenario(transport, config $(, $arg)*).await
            }
        }
    }};
}

#[fixture]
pub fn runner() -> TestRunner {
    TestRunner::new()
}

impl fmt::Debug for TestRunner {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "")
    }
}

pub struct TestRunner {
    pub rt: Runtime,
}

impl TestRunner {
    pub fn new() -> Self {
        recipe::raw_file_logger("/tmp/calc_rpc_test.log", Level::Trace).test().build().expect("log");
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()
            .expect("runtime");
        Self { rt }
    }

    pub fn block_on<F: Future<Output = ()> + Send + 'static>(&self, f: F) {
        self.rt.block_on(f);
    }
}
