use crate::stream::{client::*, server::*};
use crate::*;
use calc_rpc_stream::mem::{self, MemListener, MemSink, MemSource};
use calc_rpc_stream::transport::ServerTransport;
use rstest::*;
use std::io;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

/// Fails the first `failures` accepts the way an exhausted fd table or a reset link does.
struct FlakyListener {
    inner: MemListener,
    failures: Arc<AtomicUsize>,
}

impl ServerTransport for FlakyListener {
    type Sink = MemSink;
    type Source = MemSource;

    async fn accept(&mut self) -> io::Result<(MemSink, MemSource)> {
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Err(io::Error::other("Too many open files"));
        }
        self.inner.accept().await
    }
}

#[logfn]
#[rstest]
fn test_accept_error_keeps_serving(runner: TestRunner) {
    runner.block_on(async move {
        let server = init_server(ServerConfig::default());
        let (connector, listener) = mem::channel(8);
        let failures = Arc::new(AtomicUsize::new(3));
        server.listen::<_, Codec, _>(
            FlakyListener { inner: listener, failures: failures.clone() },
            EchoServer::default(),
        );
        let conn = init_client(connector, ClientConfig::default());
        let resp = conn.unary::<_, String, EchoErr>(ECHO_SAY, "hi".to_string()).await;
        assert_eq!(resp.expect("say"), "hi");
        assert_eq!(failures.load(Ordering::SeqCst), 0);
        let resp = conn.unary::<_, String, EchoErr>(ECHO_SAY, "again".to_string()).await;
        assert_eq!(resp.expect("say"), "again");
    });
}

#[logfn]
#[rstest]
fn test_accept_stops_without_connectors(runner: TestRunner) {
    runner.block_on(async move {
        let server = init_server(ServerConfig::default());
        let (connector, listener) = mem::channel(8);
        let echo = EchoServer::default();
        server.listen::<_, Codec, _>(listener, echo.clone());
        let conn = init_client(connector.clone(), ClientConfig::default());
        let resp = conn.unary::<_, String, EchoErr>(ECHO_SAY, "hi".to_string()).await;
        assert_eq!(resp.expect("say"), "hi");
        drop(conn);
        drop(connector);
        // the accept loop holds the only other reference to the dispatcher
        assert!(wait_until(|| Arc::strong_count(&echo.ticks) == 1, Duration::from_secs(1)).await);
    });
}
