//! In-process transport built on tokio channels.
//!
//! Useful for tests and for running the initiator and the handler inside one process. Each call
//! gets two bounded frame channels, so the transport applies the same kind of backpressure a
//! socket would.

use crate::proto::Frame;
use crate::transport::*;
use std::io;
use tokio::sync::mpsc;

type Link = (MemSink, MemSource);

/// Create a connected pair of transport endpoints.
///
/// `depth` is the number of frames each direction holds before `send` waits.
pub fn channel(depth: usize) -> (MemConnector, MemListener) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MemConnector { accept_tx: tx, depth: depth.max(1) }, MemListener { accept_rx: rx })
}

#[derive(Clone)]
pub struct MemConnector {
    accept_tx: mpsc::UnboundedSender<Link>,
    depth: usize,
}

pub struct MemListener {
    accept_rx: mpsc::UnboundedReceiver<Link>,
}

pub struct MemSink {
    tx: Option<mpsc::Sender<Frame>>,
}

pub struct MemSource {
    rx: mpsc::Receiver<Frame>,
}

impl ClientTransport for MemConnector {
    type Sink = MemSink;
    type Source = MemSource;

    async fn connect(&self) -> io::Result<Link> {
        let (c2s_tx, c2s_rx) = mpsc::channel(self.depth);
        let (s2c_tx, s2c_rx) = mpsc::channel(self.depth);
        let server_end = (MemSink { tx: Some(s2c_tx) }, MemSource { rx: c2s_rx });
        if self.accept_tx.send(server_end).is_err() {
            return Err(io::ErrorKind::ConnectionRefused.into());
        }
        Ok((MemSink { tx: Some(c2s_tx) }, MemSource { rx: s2c_rx }))
    }
}

impl ServerTransport for MemListener {
    type Sink = MemSink;
    type Source = MemSource;

    async fn accept(&mut self) -> io::Result<Link> {
        // every connector is gone
        self.accept_rx.recv().await.ok_or_else(|| io::ErrorKind::NotConnected.into())
    }
}

impl FrameSink for MemSink {
    async fn send(&mut self, frame: Frame) -> io::Result<()> {
        let Some(tx) = self.tx.as_ref() else {
            return Err(io::ErrorKind::BrokenPipe.into());
        };
        tx.send(frame).await.map_err(|_| io::ErrorKind::BrokenPipe.into())
    }

    async fn close(&mut self) {
        self.tx.take();
    }
}

impl FrameSource for MemSource {
    async fn recv(&mut self) -> io::Result<Option<Frame>> {
        Ok(self.rx.recv().await)
    }
}
