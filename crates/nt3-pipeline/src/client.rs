use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use nt3_frame::{Entry, FrameConfig, ReadEvent, ServerHello, WriteEvent};
use nt3_transport::{TcpTransport, TransportConfig, TransportStream};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::ToSocketAddrs;
use tracing::{debug, info, trace};

use crate::channel::{event_channel, EventReceiver, EventSender};
use crate::error::{ClientError, Result};
use crate::pipeline::{Pipeline, PipelineReport};

/// Default time allowed for the server hello exchange.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time the decode loop gets to see end-of-stream during close.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Name announced in the client hello. Only blank names are supported.
    pub client_name: String,
    pub transport: TransportConfig,
    pub frame: FrameConfig,
    pub handshake_timeout: Duration,
    pub shutdown_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_name: String::new(),
            transport: TransportConfig::default(),
            frame: FrameConfig::default(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

/// What the server announced before ServerHelloComplete.
#[derive(Debug, Clone, PartialEq)]
pub struct HandshakeResult {
    pub server: ServerHello,
    /// Entry assignments received during the hello, in arrival order.
    pub entries: Vec<Entry>,
}

/// An NT3 client session: a running pipeline plus the application end of its queues.
pub struct Client {
    pipeline: Pipeline,
    events: EventReceiver<ReadEvent>,
    requests: EventSender<WriteEvent>,
    peer_addr: Option<SocketAddr>,
    config: ClientConfig,
}

impl Client {
    /// Connect over TCP and start the pipeline.
    pub async fn connect<A>(addr: A, config: ClientConfig) -> Result<Self>
    where
        A: ToSocketAddrs + fmt::Display,
    {
        let transport = TcpTransport::connect(addr, &config.transport).await?;
        Self::from_transport(transport, config)
    }

    /// Start the pipeline over an already connected transport.
    ///
    /// The client hello is the first request queued, before either loop runs.
    pub fn from_transport<R, W>(transport: TransportStream<R, W>, config: ClientConfig) -> Result<Self>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let hello = WriteEvent::client_hello(config.client_name.clone())?;
        let peer_addr = transport.peer_addr();

        let (mut app, end) = event_channel();
        app.requests.send(hello).map_err(|_| ClientError::Channel)?;
        let pipeline = Pipeline::spawn(transport, end, config.frame.clone());

        Ok(Self {
            pipeline,
            events: app.events,
            requests: app.requests,
            peer_addr,
            config,
        })
    }

    /// Wait for the server hello through ServerHelloComplete, then answer
    /// with ClientHelloComplete.
    pub async fn handshake(&mut self) -> Result<HandshakeResult> {
        let timeout = self.config.handshake_timeout;
        let result = tokio::time::timeout(timeout, self.read_server_hello())
            .await
            .map_err(|_| ClientError::HandshakeTimeout(timeout))??;

        self.send(WriteEvent::ClientHelloComplete)?;
        info!(
            identity = %result.server.server_identity,
            client_seen = result.server.client_seen(),
            entries = result.entries.len(),
            "handshake complete"
        );
        Ok(result)
    }

    async fn read_server_hello(&mut self) -> Result<HandshakeResult> {
        let mut server = None;
        let mut entries = Vec::new();
        loop {
            let Some(event) = self.events.recv().await else {
                return Err(ClientError::Disconnected(
                    "connection closed during handshake".to_string(),
                ));
            };
            match event {
                ReadEvent::ServerHello(hello) => {
                    debug!(flags = hello.flags, "server hello");
                    server = Some(hello);
                }
                ReadEvent::EntryAssignment(entry) => entries.push(entry),
                ReadEvent::ServerHelloComplete => {
                    let server = server.ok_or_else(|| {
                        ClientError::HandshakeFailed(
                            "server hello complete without server hello".to_string(),
                        )
                    })?;
                    return Ok(HandshakeResult { server, entries });
                }
                ReadEvent::KeepAlive => {}
                other => trace!(event = %other, "ignoring event during handshake"),
            }
        }
    }

    /// Queue a request for the encode loop.
    ///
    /// Takes `&mut self`: a client shared between tasks cannot enqueue.
    ///
    /// ```compile_fail
    /// use std::sync::Arc;
    ///
    /// use nt3_frame::WriteEvent;
    /// use nt3_pipeline::Client;
    ///
    /// fn enqueue(client: Arc<Client>) {
    ///     let _ = client.send(WriteEvent::ClientHelloComplete);
    /// }
    /// ```
    pub fn send(&mut self, event: WriteEvent) -> Result<()> {
        self.requests.send(event).map_err(|_| ClientError::Channel)
    }

    /// Next server event, or `None` once the connection is done.
    pub async fn recv(&mut self) -> Option<ReadEvent> {
        self.events.recv().await
    }

    /// The event queue itself, for `Stream` combinators.
    pub fn events(&mut self) -> &mut EventReceiver<ReadEvent> {
        &mut self.events
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Stop sending, let queued requests drain, then wait up to
    /// `shutdown_timeout` for the server to close before cancelling the reader.
    pub async fn close(mut self) -> PipelineReport {
        self.requests.close();
        let report = self
            .pipeline
            .close_with_timeout(self.config.shutdown_timeout)
            .await;
        debug!(decode = %report.decode, encode = %report.encode, "client closed");
        report
    }

    /// Cancel both loops immediately.
    pub async fn abort(self) -> PipelineReport {
        self.pipeline.abort().await
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("peer_addr", &self.peer_addr)
            .field("pipeline", &self.pipeline)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use nt3_frame::{EntryValue, FrameError};
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;
    use crate::pipeline::LoopExit;
    use crate::table::EntryTable;

    const SERVER_HELLO: [u8; 6] = [0x04, 0x01, 0x03, b'b', b'o', b't'];

    #[tokio::test]
    async fn handshake_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut hello = [0u8; 4];
            socket.read_exact(&mut hello).await.unwrap();
            assert_eq!(hello, [0x01, 0x03, 0x00, 0x00]);

            socket.write_all(&SERVER_HELLO).await.unwrap();
            socket.write_all(&[0x00]).await.unwrap();
            // "/on" = true, id 1, seq 1
            socket
                .write_all(&[0x10, 0x03, b'/', b'o', b'n', 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x01])
                .await
                .unwrap();
            socket.write_all(&[0x03]).await.unwrap();

            let mut complete = [0u8; 1];
            socket.read_exact(&mut complete).await.unwrap();
            assert_eq!(complete, [0x05]);

            // update id 1 to false at seq 2
            socket
                .write_all(&[0x11, 0x00, 0x01, 0x00, 0x02, 0x00, 0x00])
                .await
                .unwrap();
        });

        let mut client = Client::connect(addr, ClientConfig::default()).await.unwrap();
        assert_eq!(client.peer_addr(), Some(addr));

        let result = client.handshake().await.unwrap();
        assert_eq!(result.server.server_identity, "bot");
        assert!(result.server.client_seen());
        assert_eq!(result.entries.len(), 1);

        let mut table = EntryTable::from_entries(result.entries);
        let update = client.recv().await.unwrap();
        assert!(table.apply(&update));
        assert_eq!(
            table.get_by_name("/on").unwrap().value,
            EntryValue::Boolean(false)
        );

        server.await.unwrap();
        assert_eq!(client.recv().await, None);

        let report = client.close().await;
        assert!(matches!(report.decode, LoopExit::Completed));
        assert!(matches!(report.encode, LoopExit::Completed));
    }

    #[tokio::test]
    async fn handshake_times_out() {
        let (local, _server) = duplex(64);
        let config = ClientConfig {
            handshake_timeout: Duration::from_millis(20),
            shutdown_timeout: Duration::from_millis(20),
            ..ClientConfig::default()
        };
        let transport = TransportStream::from_io(local, &config.transport);
        let mut client = Client::from_transport(transport, config).unwrap();

        let err = client.handshake().await.unwrap_err();
        assert!(matches!(err, ClientError::HandshakeTimeout(_)));

        let report = client.close().await;
        assert!(matches!(report.decode, LoopExit::Cancelled));
    }

    #[tokio::test]
    async fn handshake_reports_disconnect() {
        let (local, mut server) = duplex(64);
        let transport = TransportStream::from_io(local, &TransportConfig::default());
        let mut client = Client::from_transport(transport, ClientConfig::default()).unwrap();

        server.write_all(&SERVER_HELLO).await.unwrap();
        drop(server);

        let err = client.handshake().await.unwrap_err();
        assert!(matches!(err, ClientError::Disconnected(_)));
        client.abort().await;
    }

    #[tokio::test]
    async fn complete_without_hello_fails_handshake() {
        let (local, mut server) = duplex(64);
        let transport = TransportStream::from_io(local, &TransportConfig::default());
        let mut client = Client::from_transport(transport, ClientConfig::default()).unwrap();

        server.write_all(&[0x03]).await.unwrap();
        let err = client.handshake().await.unwrap_err();
        assert!(matches!(err, ClientError::HandshakeFailed(_)));
        client.abort().await;
    }

    #[tokio::test]
    async fn non_blank_name_is_rejected_before_start() {
        let (local, _server) = duplex(64);
        let transport = TransportStream::from_io(local, &TransportConfig::default());
        let config = ClientConfig {
            client_name: "dashboard".to_string(),
            ..ClientConfig::default()
        };

        let err = Client::from_transport(transport, config).unwrap_err();
        assert!(matches!(
            err,
            ClientError::Frame(FrameError::UnsupportedClientName(_))
        ));
    }

    #[tokio::test]
    async fn close_flushes_hello_and_completes() {
        let (local, mut server) = duplex(64);
        let transport = TransportStream::from_io(local, &TransportConfig::default());
        let client = Client::from_transport(transport, ClientConfig::default()).unwrap();

        let mut hello = [0u8; 4];
        server.read_exact(&mut hello).await.unwrap();
        drop(server);

        let report = client.close().await;
        assert!(matches!(report.encode, LoopExit::Completed));
        assert!(matches!(report.decode, LoopExit::Completed));
    }
}
