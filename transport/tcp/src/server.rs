use crate::frame::{TcpFrameSink, TcpFrameSource};
use calc_rpc_core::ServerConfig;
use calc_rpc_stream::transport::ServerTransport;
use std::{io, net::SocketAddr, time::Duration};
use tokio::net::TcpListener;

pub struct TcpServer {
    listener: TcpListener,
    write_timeout: Duration,
}

impl TcpServer {
    /// Bind `addr`, use port 0 to let the OS pick one and read it back from
    /// [TcpServer::local_addr].
    pub async fn bind(addr: &str, config: &ServerConfig) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        log::info!("listening on {}", listener.local_addr()?);
        Ok(Self { listener, write_timeout: config.write_timeout })
    }

    #[inline]
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl ServerTransport for TcpServer {
    type Sink = TcpFrameSink;
    type Source = TcpFrameSource;

    async fn accept(&mut self) -> io::Result<(TcpFrameSink, TcpFrameSource)> {
        let (stream, peer) = self.listener.accept().await?;
        stream.set_nodelay(true)?;
        log::trace!("accepted connection from {}", peer);
        let (reader, writer) = stream.into_split();
        Ok((TcpFrameSink::new(writer, self.write_timeout), TcpFrameSource::new(reader)))
    }
}
