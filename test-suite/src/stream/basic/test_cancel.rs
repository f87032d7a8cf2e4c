use crate::stream::{client::*, server::*};
use crate::*;
use calc_rpc_stream::error::{RpcError, RpcIntErr};
use calc_rpc_stream::server::RpcServer;
use calc_rpc_stream::transport::ClientTransport;
use rstest::*;
use std::sync::atomic::Ordering;
use std::time::Duration;

async fn close_during_stream<T: ClientTransport>(
    transport: T, config: ClientConfig, echo: EchoServer,
) {
    let conn = init_client(transport, config);
    let mut rx = conn.server_stream::<_, u64, EchoErr>(ECHO_TICK, ()).await.expect("open");
    assert_eq!(rx.recv().await.expect("tick"), Some(0));
    assert_eq!(rx.recv().await.expect("tick"), Some(1));
    conn.close();
    assert!(conn.is_closed());
    assert_eq!(rx.recv().await.unwrap_err(), RpcError::Rpc(RpcIntErr::Cancelled));
    // the handler notices on its next send and stops emitting
    let done = echo.tick_done.clone();
    assert!(wait_until(|| done.load(Ordering::SeqCst) == 1, Duration::from_secs(3)).await);
    let sent = echo.ticks.load(Ordering::SeqCst);
    tokio::time::sleep(TICK * 5).await;
    assert_eq!(echo.ticks.load(Ordering::SeqCst), sent);

    let err = conn.unary::<_, String, EchoErr>(ECHO_SAY, "x".to_string()).await.unwrap_err();
    assert_eq!(err, RpcError::Rpc(RpcIntErr::Cancelled));
}

#[logfn]
#[rstest]
#[case(true)]
#[case(false)]
fn test_close_during_stream(runner: TestRunner, #[case] is_tcp: bool) {
    runner.block_on(async move {
        let (server, echo, endpoint) = init_echo_server(ServerConfig::default(), is_tcp).await;
        with_transport!(endpoint, ClientConfig::default(), close_during_stream, echo);
        assert!(wait_idle(&server, Duration::from_secs(3)).await);
    });
}

async fn drop_receiver<T: ClientTransport>(transport: T, config: ClientConfig, echo: EchoServer) {
    let conn = init_client(transport, config);
    let mut rx = conn.server_stream::<_, u64, EchoErr>(ECHO_TICK, ()).await.expect("open");
    assert_eq!(rx.recv().await.expect("tick"), Some(0));
    drop(rx);
    let done = echo.tick_done.clone();
    assert!(wait_until(|| done.load(Ordering::SeqCst) == 1, Duration::from_secs(3)).await);
    // the connection itself is still usable
    let resp = conn.unary::<_, String, EchoErr>(ECHO_SAY, "still here".to_string()).await;
    assert_eq!(resp.expect("say"), "still here");
}

#[logfn]
#[rstest]
#[case(true)]
#[case(false)]
fn test_drop_receiver(runner: TestRunner, #[case] is_tcp: bool) {
    runner.block_on(async move {
        let (server, echo, endpoint) = init_echo_server(ServerConfig::default(), is_tcp).await;
        with_transport!(endpoint, ClientConfig::default(), drop_receiver, echo);
        assert!(wait_idle(&server, Duration::from_secs(3)).await);
    });
}

async fn drop_conn<T: ClientTransport>(transport: T, config: ClientConfig) {
    let conn = init_client(transport, config);
    let (_tx, mut rx) =
        conn.bidi_stream::<String, String, EchoErr>(ECHO_CHAT).await.expect("open");
    let waiter = tokio::spawn(async move { rx.recv().await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished());
    drop(conn);
    let res = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("woken in time")
        .expect("join");
    assert_eq!(res.unwrap_err(), RpcError::Rpc(RpcIntErr::Cancelled));
}

#[logfn]
#[rstest]
#[case(true)]
#[case(false)]
fn test_drop_conn(runner: TestRunner, #[case] is_tcp: bool) {
    runner.block_on(async move {
        let (server, _echo, endpoint) = init_echo_server(ServerConfig::default(), is_tcp).await;
        with_transport!(endpoint, ClientConfig::default(), drop_conn);
        assert!(wait_idle(&server, Duration::from_secs(3)).await);
    });
}

async fn server_close<T: ClientTransport>(
    transport: T, config: ClientConfig, server: &RpcServer,
) {
    let conn = init_client(transport, config);
    let (mut tx, mut rx) =
        conn.bidi_stream::<String, String, EchoErr>(ECHO_CHAT).await.expect("open");
    tx.send("a".to_string()).await.expect("send");
    assert_eq!(rx.recv().await.expect("echo").as_deref(), Some("a"));
    assert_eq!(server.active_count(), 1);
    server.close().await;
    assert_eq!(server.active_count(), 0);
    assert_eq!(rx.recv().await.unwrap_err(), RpcError::Rpc(RpcIntErr::Cancelled));
}

#[logfn]
#[rstest]
#[case(true)]
#[case(false)]
fn test_server_close(runner: TestRunner, #[case] is_tcp: bool) {
    runner.block_on(async move {
        let (server, _echo, endpoint) = init_echo_server(ServerConfig::default(), is_tcp).await;
        with_transport!(endpoint, ClientConfig::default(), server_close, &server);
    });
}
