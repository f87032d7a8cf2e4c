use crate::frame::{TcpFrameSink, TcpFrameSource};
use calc_rpc_core::ClientConfig;
use calc_rpc_stream::transport::ClientTransport;
use std::{io, time::Duration};
use tokio::net::TcpStream;

/// Dials `addr` once per call.
#[derive(Clone, Debug)]
pub struct TcpClient {
    addr: String,
    write_timeout: Duration,
}

impl TcpClient {
    pub fn new(addr: impl Into<String>, config: &ClientConfig) -> Self {
        Self { addr: addr.into(), write_timeout: config.write_timeout }
    }
}

impl ClientTransport for TcpClient {
    type Sink = TcpFrameSink;
    type Source = TcpFrameSource;

    async fn connect(&self) -> io::Result<(TcpFrameSink, TcpFrameSource)> {
        let stream = TcpStream::connect(&self.addr).await?;
        stream.set_nodelay(true)?;
        log::trace!("connected to {}", self.addr);
        let (reader, writer) = stream.into_split();
        Ok((TcpFrameSink::new(writer, self.write_timeout), TcpFrameSource::new(reader)))
    }
}
