use crate::stream::{client::*, server::*};
use crate::*;
use calc_rpc_stream::Codec as _;
use calc_rpc_stream::error::{RpcError, RpcIntErr};
use calc_rpc_stream::mem;
use calc_rpc_stream::pipe::{RecvHalf, SendHalf};
use calc_rpc_stream::proto::{CallHeader, CallShape, EncodedErr, Frame};
use calc_rpc_stream::state::CallState;
use calc_rpc_stream::transport::{ClientTransport, FrameSink, FrameSource, ServerTransport};
use rstest::*;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

async fn send_after_close<T: ClientTransport>(transport: T, config: ClientConfig) {
    let conn = init_client(transport, config);
    // Echo/Tick never ends its direction, so the call stays half-open after our close
    let (mut tx, mut rx) =
        conn.open::<(), u64, EchoErr>(ECHO_TICK, CallShape::ServerStream).await.expect("open");
    tx.send(()).await.expect("send");
    tx.close().await.expect("close");
    assert_eq!(tx.state(), CallState::SendHalfClosed);
    let err = tx.send(()).await.unwrap_err();
    assert_eq!(err, RpcError::Rpc(RpcIntErr::SendAfterClose));
    assert_eq!(tx.state(), CallState::Failed(RpcIntErr::SendAfterClose));
    // the violation fails the whole call
    assert_eq!(rx.recv().await.unwrap_err(), RpcError::Rpc(RpcIntErr::SendAfterClose));
}

#[logfn]
#[rstest]
#[case(true)]
#[case(false)]
fn test_send_after_close(runner: TestRunner, #[case] is_tcp: bool) {
    runner.block_on(async move {
        let (server, echo, endpoint) = init_echo_server(ServerConfig::default(), is_tcp).await;
        with_transport!(endpoint, ClientConfig::default(), send_after_close);
        // the handler side sees the initiator leave and stops ticking
        let done = echo.tick_done.clone();
        assert!(wait_until(|| done.load(Ordering::SeqCst) == 1, Duration::from_secs(3)).await);
        assert!(wait_idle(&server, Duration::from_secs(1)).await);
    });
}

async fn bad_method<T: ClientTransport>(transport: T, config: ClientConfig) {
    let conn = init_client(transport, config);
    let err = conn.unary::<_, String, EchoErr>("Echo/Nope", "x".to_string()).await.unwrap_err();
    assert_eq!(err, RpcError::Rpc(RpcIntErr::Method));

    let (_tx, mut rx) =
        conn.bidi_stream::<String, String, EchoErr>("Nope/Chat").await.expect("open");
    assert_eq!(rx.recv().await.unwrap_err(), RpcError::Rpc(RpcIntErr::Method));

    // a known method opened with the wrong shape
    let (_tx, mut rx) = conn
        .open::<String, String, EchoErr>(ECHO_SAY, CallShape::BidiStream)
        .await
        .expect("open");
    assert_eq!(rx.recv().await.unwrap_err(), RpcError::Rpc(RpcIntErr::Method));
    let err = conn
        .server_stream::<_, String, EchoErr>(ECHO_CHAT, "x".to_string())
        .await
        .expect("open")
        .recv()
        .await
        .unwrap_err();
    assert_eq!(err, RpcError::Rpc(RpcIntErr::Method));
}

#[logfn]
#[rstest]
#[case(true)]
#[case(false)]
fn test_bad_method(runner: TestRunner, #[case] is_tcp: bool) {
    runner.block_on(async move {
        let (_server, _echo, endpoint) = init_echo_server(ServerConfig::default(), is_tcp).await;
        with_transport!(endpoint, ClientConfig::default(), bad_method);
    });
}

async fn missing_response<T: ClientTransport>(transport: T, config: ClientConfig) {
    let conn = init_client(transport, config);
    let err = conn.unary::<_, String, EchoErr>(ECHO_SILENT, "x".to_string()).await.unwrap_err();
    assert_eq!(err, RpcError::Rpc(RpcIntErr::Protocol));
}

#[logfn]
#[rstest]
#[case(true)]
#[case(false)]
fn test_unary_missing_response(runner: TestRunner, #[case] is_tcp: bool) {
    runner.block_on(async move {
        let (_server, _echo, endpoint) = init_echo_server(ServerConfig::default(), is_tcp).await;
        with_transport!(endpoint, ClientConfig::default(), missing_response);
    });
}

/// The handler side is played by hand here, to send what a well-behaved handler never would.
#[logfn]
#[rstest]
#[case(true)]
#[case(false)]
fn test_frame_after_end(runner: TestRunner, #[case] late_end: bool) {
    runner.block_on(async move {
        let (connector, mut listener) = mem::channel(8);
        let conn = init_client(connector, ClientConfig::default());
        let (mut tx, _rx) =
            conn.bidi_stream::<String, String, EchoErr>(ECHO_CHAT).await.expect("open");
        let (mut sink, mut source) = listener.accept().await.expect("accept");
        assert!(matches!(source.recv().await.expect("recv"), Some(Frame::Open(_))));

        let msg = Codec::default().encode(&"one".to_string()).expect("encode");
        sink.send(Frame::Msg(msg.clone())).await.expect("send");
        sink.send(Frame::End).await.expect("send");
        let late = if late_end { Frame::End } else { Frame::Msg(msg) };
        sink.send(late).await.expect("send");

        // we can still send, so the call is not complete and the late frame fails it
        let frame = source.recv().await.expect("recv");
        assert_eq!(frame, Some(Frame::Fail(EncodedErr::Rpc(RpcIntErr::RecvAfterEnd))));
        assert_eq!(tx.state(), CallState::Failed(RpcIntErr::RecvAfterEnd));
        let err = tx.send("late".to_string()).await.unwrap_err();
        assert_eq!(err, RpcError::Rpc(RpcIntErr::RecvAfterEnd));
    });
}

#[logfn]
#[rstest]
fn test_frame_after_end_unary(runner: TestRunner) {
    runner.block_on(async move {
        let (connector, mut listener) = mem::channel(8);
        let conn = init_client(connector, ClientConfig::default());
        let call = tokio::spawn(async move {
            conn.unary::<_, String, EchoErr>(ECHO_SAY, "x".to_string()).await
        });
        let (mut sink, mut source) = listener.accept().await.expect("accept");
        assert!(matches!(source.recv().await.expect("recv"), Some(Frame::Open(_))));
        assert!(matches!(source.recv().await.expect("recv"), Some(Frame::Msg(_))));
        // the request direction is closed before any reply goes out
        assert_eq!(source.recv().await.expect("recv"), Some(Frame::End));

        let codec = Codec::default();
        sink.send(Frame::Msg(codec.encode(&"one".to_string()).expect("encode")))
            .await
            .expect("send");
        sink.send(Frame::End).await.expect("send");
        sink.send(Frame::Msg(codec.encode(&"two".to_string()).expect("encode")))
            .await
            .expect("send");

        // the End is only handed out once the link is gone, so the late reply always fails it
        let err = call.await.expect("join").unwrap_err();
        assert_eq!(err, RpcError::Rpc(RpcIntErr::RecvAfterEnd));
        // the initiator leaves quietly, nothing follows its End
        assert_eq!(source.recv().await.expect("recv"), None);
    });
}

#[logfn]
#[rstest]
fn test_second_open(runner: TestRunner) {
    runner.block_on(async move {
        let (connector, mut listener) = mem::channel(8);
        let conn = init_client(connector, ClientConfig::default());
        let (_tx, mut rx) =
            conn.bidi_stream::<String, String, EchoErr>(ECHO_CHAT).await.expect("open");
        let (mut sink, mut source) = listener.accept().await.expect("accept");
        assert!(matches!(source.recv().await.expect("recv"), Some(Frame::Open(_))));

        let header = CallHeader::new(ECHO_CHAT, CallShape::BidiStream);
        sink.send(Frame::Open(header)).await.expect("send");
        assert_eq!(rx.recv().await.unwrap_err(), RpcError::Rpc(RpcIntErr::Protocol));
        let frame = source.recv().await.expect("recv");
        assert_eq!(frame, Some(Frame::Fail(EncodedErr::Rpc(RpcIntErr::Protocol))));
    });
}

#[logfn]
#[rstest]
fn test_peer_gone_before_end(runner: TestRunner) {
    runner.block_on(async move {
        let (connector, mut listener) = mem::channel(8);
        let conn = init_client(connector, ClientConfig::default());
        let req = RepeatReq { word: "w".to_string(), times: 2 };
        let mut rx =
            conn.server_stream::<_, String, EchoErr>(ECHO_REPEAT, req).await.expect("open");
        let (mut sink, source) = listener.accept().await.expect("accept");
        let msg = Codec::default().encode(&"w".to_string()).expect("encode");
        sink.send(Frame::Msg(msg)).await.expect("send");
        drop(sink);
        drop(source);

        assert_eq!(rx.recv().await.expect("msg").as_deref(), Some("w"));
        // no terminal signal, so the partial result is not a complete one
        assert_eq!(rx.recv().await.unwrap_err(), RpcError::Rpc(RpcIntErr::Cancelled));
    });
}

/// The handler end goes away after its End while the initiator still sends.
async fn gone_after_end(
    mut tx: SendHalf<String, EchoErr, Codec>, mut rx: RecvHalf<String, EchoErr, Codec>,
) {
    // End may still be handed out first, the call fails either way
    match rx.recv().await {
        Ok(None) | Err(RpcError::Rpc(RpcIntErr::Cancelled)) => {}
        other => panic!("unexpected {:?}", other),
    }
    let failed = CallState::Failed(RpcIntErr::Cancelled);
    assert!(wait_until(|| tx.state() == failed, Duration::from_secs(1)).await);
    let err = tx.send("late".to_string()).await.unwrap_err();
    assert_eq!(err, RpcError::Rpc(RpcIntErr::Cancelled));
}

#[logfn]
#[rstest]
fn test_peer_gone_after_end(runner: TestRunner) {
    runner.block_on(async move {
        let (connector, mut listener) = mem::channel(8);
        let conn = init_client(connector, ClientConfig::default());
        let (tx, rx) =
            conn.bidi_stream::<String, String, EchoErr>(ECHO_CHAT).await.expect("open");
        let (mut sink, source) = listener.accept().await.expect("accept");
        sink.send(Frame::End).await.expect("send");
        drop(sink);
        drop(source);
        gone_after_end(tx, rx).await;
    });
}

#[logfn]
#[rstest]
fn test_peer_reset_after_end(runner: TestRunner) {
    runner.block_on(async move {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr").to_string();
        let config = ClientConfig::default();
        let conn = init_client(TcpClient::new(addr, &config), config);
        let (tx, rx) =
            conn.bidi_stream::<String, String, EchoErr>(ECHO_CHAT).await.expect("open");
        let (mut stream, _) = listener.accept().await.expect("accept");
        let mut buf = Vec::new();
        Frame::End.encode_into(&mut buf);
        stream.write_all(&buf).await.expect("write");
        // a zero linger turns the close into a reset
        #[allow(deprecated)]
        stream.set_linger(Some(Duration::ZERO)).expect("linger");
        drop(stream);
        gone_after_end(tx, rx).await;
    });
}

async fn call_unreachable<T: ClientTransport>(transport: T, config: ClientConfig) {
    let conn = init_client(transport, config);
    let err = conn.unary::<_, String, EchoErr>(ECHO_SAY, "x".to_string()).await.unwrap_err();
    assert_eq!(err, RpcError::Rpc(RpcIntErr::Unreachable));
}

#[logfn]
#[rstest]
#[case(true)]
#[case(false)]
fn test_unreachable(runner: TestRunner, #[case] is_tcp: bool) {
    runner.block_on(async move {
        let endpoint = if is_tcp {
            let server = calc_rpc_tcp::TcpServer::bind("127.0.0.1:0", &ServerConfig::default())
                .await
                .expect("bind");
            let addr = server.local_addr().expect("addr").to_string();
            drop(server);
            Endpoint::Tcp(addr)
        } else {
            let (connector, listener) = mem::channel(1);
            drop(listener);
            Endpoint::Mem(connector)
        };
        with_transport!(endpoint, ClientConfig::default(), call_unreachable);
    });
}
