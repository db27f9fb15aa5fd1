//! TCP client adapter for a remote INDI server.

use super::{FrameSink, FrameSource, IO_TIMEOUT};
use crate::config::IndiServerConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::info;

/// Connected socket to an INDI server
#[derive(Debug)]
pub struct IndiConnection {
    stream: TcpStream,
}

impl IndiConnection {
    /// Connect to the configured server, bounded by the I/O timeout
    pub async fn connect(cfg: &IndiServerConfig) -> Result<Self> {
        let addr = cfg.address();
        let stream = timeout(IO_TIMEOUT, TcpStream::connect(&addr))
            .await
            .map_err(|_| Error::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("connect to {} timed out", addr),
            )))??;
        info!(server = %addr, "connected to INDI server");
        Ok(Self { stream })
    }

    /// Split into independent reader and writer halves
    pub fn split(self) -> (IndiReader, IndiWriter) {
        let (read, write) = self.stream.into_split();
        (
            IndiReader {
                read,
                buf: BytesMut::with_capacity(8 * 1024),
            },
            IndiWriter { write },
        )
    }
}

/// Receiving half of an INDI socket
#[derive(Debug)]
pub struct IndiReader {
    read: OwnedReadHalf,
    buf: BytesMut,
}

#[async_trait]
impl FrameSource for IndiReader {
    async fn recv(&mut self) -> Result<Bytes> {
        self.buf.clear();
        let n = self.read.read_buf(&mut self.buf).await?;
        if n == 0 {
            return Err(Error::Closed("INDI server closed the connection".to_string()));
        }
        Ok(self.buf.split().freeze())
    }
}

/// Sending half of an INDI socket
#[derive(Debug)]
pub struct IndiWriter {
    write: OwnedWriteHalf,
}

#[async_trait]
impl FrameSink for IndiWriter {
    async fn send(&mut self, frame: &[u8]) -> Result<()> {
        timeout(IO_TIMEOUT, async {
            self.write.write_all(frame).await?;
            self.write.flush().await
        })
        .await
        .map_err(|_| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "INDI write timed out",
            ))
        })??;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.write.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connect_send_recv() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 64];
            let n = socket.read(&mut buf).await.unwrap();
            assert!(buf[..n].starts_with(b"<getProperties"));
            socket
                .write_all(b"<message message=\"hello\"/>")
                .await
                .unwrap();
        });

        let cfg = IndiServerConfig::new(addr.ip().to_string(), addr.port());
        let conn = IndiConnection::connect(&cfg).await.unwrap();
        let (mut reader, mut writer) = conn.split();

        writer
            .send(b"<getProperties version=\"1.7\"/>")
            .await
            .unwrap();
        let received = reader.recv().await.unwrap();
        assert!(received.starts_with(b"<message"));

        server.await.unwrap();
        writer.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_recv_reports_closed_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let cfg = IndiServerConfig::new(addr.ip().to_string(), addr.port());
        let (mut reader, _writer) = IndiConnection::connect(&cfg).await.unwrap().split();
        assert!(matches!(reader.recv().await, Err(Error::Closed(_))));
    }
}
