use crate::io_with_timeout;
use calc_rpc_stream::proto::{Frame, MAX_FRAME_SIZE};
use calc_rpc_stream::transport::{FrameSink, FrameSource};
use std::{fmt, io, time::Duration};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

pub struct TcpFrameSink {
    writer: Option<OwnedWriteHalf>,
    write_timeout: Duration,
    buf: Vec<u8>,
}

impl TcpFrameSink {
    pub(crate) fn new(writer: OwnedWriteHalf, write_timeout: Duration) -> Self {
        Self { writer: Some(writer), write_timeout, buf: Vec::with_capacity(256) }
    }
}

impl fmt::Debug for TcpFrameSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.writer.as_ref().and_then(|w| w.peer_addr().ok()) {
            Some(addr) => write!(f, "tcp sink to {}", addr),
            None => write!(f, "tcp sink (closed)"),
        }
    }
}

impl FrameSink for TcpFrameSink {
    async fn send(&mut self, frame: Frame) -> io::Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(io::ErrorKind::BrokenPipe.into());
        };
        self.buf.clear();
        frame.encode_into(&mut self.buf);
        io_with_timeout!(self.write_timeout, writer.write_all(&self.buf))
    }

    async fn close(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.shutdown().await {
                log::debug!("tcp shutdown write: {}", e);
            }
        }
    }
}

pub struct TcpFrameSource {
    reader: BufReader<OwnedReadHalf>,
    buf: Vec<u8>,
}

impl TcpFrameSource {
    pub(crate) fn new(reader: OwnedReadHalf) -> Self {
        Self { reader: BufReader::new(reader), buf: Vec::new() }
    }
}

impl FrameSource for TcpFrameSource {
    async fn recv(&mut self) -> io::Result<Option<Frame>> {
        let len = match self.reader.read_u32().await {
            Ok(len) => len as usize,
            // EOF on a frame boundary is the peer's write shutdown
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e),
        };
        if len == 0 || len > MAX_FRAME_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame size {} out of range", len),
            ));
        }
        self.buf.resize(len, 0);
        self.reader.read_exact(&mut self.buf).await?;
        Frame::decode(&self.buf)
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}
