use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::reader::TransportReader;
use crate::writer::TransportWriter;

/// TCP port NT3 servers listen on.
pub const DEFAULT_PORT: u16 = 1735;

/// Default read chunk size in bytes.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 512;

/// Default initial capacity of the read and write buffers.
pub const DEFAULT_BUFFER_CAPACITY: usize = 8 * 1024;

/// Configuration for the transport adapter.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Minimum number of bytes requested from the socket per read.
    pub read_chunk_size: usize,
    /// Initial capacity of the read and write buffers.
    pub initial_buffer_capacity: usize,
    /// Upper bound on establishing the TCP connection.
    pub connect_timeout: Duration,
    /// Disable Nagle's algorithm. Entries stream at high frequency, so latency wins.
    pub nodelay: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            initial_buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            connect_timeout: Duration::from_secs(5),
            nodelay: true,
        }
    }
}

/// Append [`DEFAULT_PORT`] to `addr` unless it already names a port.
pub fn with_default_port(addr: &str) -> String {
    if addr.parse::<SocketAddr>().is_ok() {
        return addr.to_string();
    }
    match addr.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') && port.parse::<u16>().is_ok() => addr.to_string(),
        _ if addr.starts_with('[') && addr.ends_with(']') => format!("{addr}:{DEFAULT_PORT}"),
        _ if addr.contains(':') => format!("[{addr}]:{DEFAULT_PORT}"),
        _ => format!("{addr}:{DEFAULT_PORT}"),
    }
}

/// A connected duplex byte stream, already split into its two directions.
pub struct TransportStream<R, W> {
    reader: TransportReader<R>,
    writer: TransportWriter<W>,
    peer_addr: Option<SocketAddr>,
}

/// Transport over a TCP connection.
pub type TcpTransport = TransportStream<OwnedReadHalf, OwnedWriteHalf>;

impl TcpTransport {
    /// Connect to a peer over TCP.
    pub async fn connect<A>(addr: A, config: &TransportConfig) -> Result<Self>
    where
        A: ToSocketAddrs + fmt::Display,
    {
        let target = addr.to_string();
        let stream = match tokio::time::timeout(config.connect_timeout, TcpStream::connect(addr))
            .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(TransportError::Connect {
                    addr: target,
                    source,
                })
            }
            Err(_) => {
                return Err(TransportError::ConnectTimeout {
                    addr: target,
                    timeout: config.connect_timeout,
                })
            }
        };
        info!(addr = %target, "connected");
        Self::from_tcp(stream, config)
    }

    /// Wrap an already connected TCP stream.
    pub fn from_tcp(stream: TcpStream, config: &TransportConfig) -> Result<Self> {
        stream.set_nodelay(config.nodelay)?;
        let peer_addr = stream.peer_addr().ok();
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: TransportReader::new(read_half, config),
            writer: TransportWriter::new(write_half, config),
            peer_addr,
        })
    }
}

impl<T> TransportStream<ReadHalf<T>, WriteHalf<T>>
where
    T: AsyncRead + AsyncWrite,
{
    /// Wrap any duplex I/O object (for example `tokio::io::duplex`).
    pub fn from_io(io: T, config: &TransportConfig) -> Self {
        let (read_half, write_half) = tokio::io::split(io);
        debug!("wrapped in-memory duplex transport");
        Self {
            reader: TransportReader::new(read_half, config),
            writer: TransportWriter::new(write_half, config),
            peer_addr: None,
        }
    }
}

impl<R, W> TransportStream<R, W> {
    /// Build a transport from separately owned directions.
    pub fn from_parts(read: R, write: W, config: &TransportConfig) -> Self {
        Self {
            reader: TransportReader::new(read, config),
            writer: TransportWriter::new(write, config),
            peer_addr: None,
        }
    }

    /// Remote address, when the transport is a socket.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Hand out the two directions. Each one is meant to be owned by exactly one loop.
    pub fn split(self) -> (TransportReader<R>, TransportWriter<W>) {
        (self.reader, self.writer)
    }
}

impl<R, W> fmt::Debug for TransportStream<R, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportStream")
            .field("peer_addr", &self.peer_addr)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    #[tokio::test]
    async fn connect_and_exchange_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(&[0x03]).await.unwrap();
            let mut buf = [0u8; 1];
            socket.read_exact(&mut buf).await.unwrap();
            buf[0]
        });

        let transport = TcpTransport::connect(addr, &TransportConfig::default())
            .await
            .unwrap();
        assert_eq!(transport.peer_addr(), Some(addr));

        let (mut reader, mut writer) = transport.split();
        let result = reader.read_at_least(1).await.unwrap();
        assert_eq!(result.buffered, 1);
        assert_eq!(reader.buffer(), &[0x03]);

        writer.get_buffer(1)[0] = 0x05;
        writer.advance(1);
        writer.flush().await.unwrap();

        assert_eq!(server.await.unwrap(), 0x05);
    }

    #[test]
    fn default_port_only_when_missing() {
        assert_eq!(with_default_port("10.0.0.2"), "10.0.0.2:1735");
        assert_eq!(with_default_port("roborio-1234-frc.local"), "roborio-1234-frc.local:1735");
        assert_eq!(with_default_port("localhost:5810"), "localhost:5810");
        assert_eq!(with_default_port("127.0.0.1:9000"), "127.0.0.1:9000");
        assert_eq!(with_default_port("::1"), "[::1]:1735");
        assert_eq!(with_default_port("[::1]"), "[::1]:1735");
        assert_eq!(with_default_port("[::1]:80"), "[::1]:80");
    }

    #[tokio::test]
    async fn connect_refused_reports_address() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = TcpTransport::connect(addr, &TransportConfig::default())
            .await
            .unwrap_err();
        match err {
            TransportError::Connect { addr: shown, .. } => assert_eq!(shown, addr.to_string()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn default_config_values() {
        let config = TransportConfig::default();
        assert_eq!(config.read_chunk_size, DEFAULT_READ_CHUNK_SIZE);
        assert_eq!(config.initial_buffer_capacity, DEFAULT_BUFFER_CAPACITY);
        assert!(config.nodelay);
    }
}
