//! Traits for the transport layer protocol.
//!
//! A transport provides one reliable, ordered link per call, with the two directions usable from
//! different tasks. The implementations can be found on:
//!
//! - [crate::mem]: in-process channels
//! - [calc-rpc-tcp](../calc_rpc_tcp/index.html): one TCP socket per call

use crate::proto::Frame;
use std::{future::Future, io};

/// The writing direction of a call link
pub trait FrameSink: Send + Sized + 'static {
    /// Write a frame, suspends only on transport backpressure
    fn send(&mut self, frame: Frame) -> impl Future<Output = io::Result<()>> + Send;

    /// Shutdown the write direction, the peer will observe EOF after the frames already sent
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// The reading direction of a call link
pub trait FrameSource: Send + Sized + 'static {
    /// Read the next frame, `Ok(None)` on EOF
    fn recv(&mut self) -> impl Future<Output = io::Result<Option<Frame>>> + Send;
}

/// Client-side transport, establishes a fresh link for every call.
pub trait ClientTransport: Send + Sync + Sized + 'static {
    type Sink: FrameSink;
    type Source: FrameSource;

    fn connect(&self) -> impl Future<Output = io::Result<(Self::Sink, Self::Source)>> + Send;
}

/// Server-side transport, yields the link of every incoming call.
///
/// The first frame read from an accepted source is expected to be [Frame::Open].
///
/// An `accept` error of kind [io::ErrorKind::NotConnected] means no call can arrive any more and
/// stops the server's accept loop. Any other error only affects the link being accepted.
pub trait ServerTransport: Send + Sized + 'static {
    type Sink: FrameSink;
    type Source: FrameSource;

    fn accept(&mut self) -> impl Future<Output = io::Result<(Self::Sink, Self::Source)>> + Send;
}
