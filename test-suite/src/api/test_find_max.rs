//! `find_max_of` against a handler played by hand, to control when each direction ends.

use crate::api::client::*;
use crate::*;
use calc_rpc::error::CalcError;
use calc_rpc::proto::FindMaxNumberResp;
use calc_rpc::{RpcError, RpcIntErr};
use calc_rpc_stream::Codec as _;
use calc_rpc_stream::mem::{self, MemSink};
use calc_rpc_stream::proto::{EncodedErr, Frame};
use calc_rpc_stream::transport::{FrameSink, FrameSource, ServerTransport};
use rstest::*;
use std::time::Duration;

async fn send_max(sink: &mut MemSink, value: i64) {
    let buf = Codec::default().encode(&FindMaxNumberResp { value }).expect("encode");
    sink.send(Frame::Msg(buf)).await.expect("send");
}

#[logfn]
#[rstest]
fn test_find_max_waits_for_responses(runner: TestRunner) {
    runner.block_on(async move {
        let (connector, mut listener) = mem::channel(8);
        let client = init_client(connector, ClientConfig::default());
        let call = tokio::spawn(async move { client.find_max_of(vec![], Duration::ZERO).await });
        let (mut sink, mut source) = listener.accept().await.expect("accept");
        assert!(matches!(source.recv().await.expect("recv"), Some(Frame::Open(_))));
        // the send task is done before any response goes out
        assert_eq!(source.recv().await.expect("recv"), Some(Frame::End));

        send_max(&mut sink, 7).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!call.is_finished());
        send_max(&mut sink, 9).await;
        sink.send(Frame::End).await.expect("send");
        drop(sink);
        assert_eq!(call.await.expect("join").expect("find max"), vec![7, 9]);
    });
}

#[logfn]
#[rstest]
fn test_find_max_send_side_failure(runner: TestRunner) {
    runner.block_on(async move {
        let (connector, mut listener) = mem::channel(8);
        let client = init_client(connector, ClientConfig::default());
        let values: Vec<i64> = (1..=200).collect();
        let call = tokio::spawn(async move {
            client.find_max_of(values, Duration::from_millis(1)).await
        });
        let (mut sink, mut source) = listener.accept().await.expect("accept");
        assert!(matches!(source.recv().await.expect("recv"), Some(Frame::Open(_))));
        // stop reading, the requests written after this fail
        drop(source);

        send_max(&mut sink, 7).await;
        sink.send(Frame::End).await.expect("send");
        // the response stream is complete, the broken request stream does not fail the call
        assert_eq!(call.await.expect("join").expect("find max"), vec![7]);
        drop(sink);
    });
}

#[logfn]
#[rstest]
fn test_find_max_receive_side_failure(runner: TestRunner) {
    runner.block_on(async move {
        let (connector, mut listener) = mem::channel(8);
        let client = init_client(connector, ClientConfig::default());
        let values: Vec<i64> = (1..=200).collect();
        let call = tokio::spawn(async move {
            client.find_max_of(values, Duration::from_millis(1)).await
        });
        let (mut sink, mut source) = listener.accept().await.expect("accept");
        assert!(matches!(source.recv().await.expect("recv"), Some(Frame::Open(_))));

        send_max(&mut sink, 5).await;
        let err = Codec::default().encode(&CalcError::EmptyInput).expect("encode");
        sink.send(Frame::Fail(EncodedErr::User(err))).await.expect("send");
        let res = tokio::time::timeout(Duration::from_secs(1), call)
            .await
            .expect("done in time")
            .expect("join");
        assert_eq!(res.unwrap_err(), RpcError::User(CalcError::EmptyInput));

        // the send task was stopped by the failure instead of finishing its values
        let mut last = None;
        while let Some(frame) = source.recv().await.expect("recv") {
            last = Some(frame);
        }
        assert_eq!(last, Some(Frame::Fail(EncodedErr::Rpc(RpcIntErr::Aborted))));
    });
}
