//! `tokio_util::codec` adapter over [`FrameDecoder`].

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::decode::{Decode, FrameConfig, FrameDecoder};
use crate::error::FrameError;
use crate::event::{ReadEvent, WriteEvent};

/// Decodes server frames into [`ReadEvent`]s and encodes [`WriteEvent`]s.
///
/// Frames that carry nothing to report (a clear-all with the wrong magic)
/// are consumed silently.
#[derive(Debug, Default)]
pub struct Nt3Codec {
    decoder: FrameDecoder,
}

impl Nt3Codec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            decoder: FrameDecoder::with_config(config),
        }
    }
}

impl Decoder for Nt3Codec {
    type Item = ReadEvent;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<ReadEvent>, FrameError> {
        loop {
            match self.decoder.decode(src)? {
                Decode::Frame { event, consumed } => {
                    src.advance(consumed);
                    if event.is_some() {
                        return Ok(event);
                    }
                }
                Decode::Incomplete { needed } => {
                    src.reserve(needed - src.len());
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<ReadEvent>, FrameError> {
        match self.decode(src)? {
            Some(event) => Ok(Some(event)),
            None if src.is_empty() => Ok(None),
            None => Err(FrameError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("stream ended inside a frame ({} bytes unread)", src.len()),
            ))),
        }
    }
}

impl Encoder<WriteEvent> for Nt3Codec {
    type Error = FrameError;

    fn encode(&mut self, item: WriteEvent, dst: &mut BytesMut) -> Result<(), FrameError> {
        item.encode_to(dst)
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio::io::AsyncWriteExt;
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;
    use crate::event::CLEAR_ALL_MAGIC;

    #[tokio::test]
    async fn framed_read_over_trickled_bytes() {
        let (mut server, client) = tokio::io::duplex(8);
        let mut framed = FramedRead::new(client, Nt3Codec::new());

        let writer = tokio::spawn(async move {
            let mut wire = vec![0x04, 0x00, 0x02, b'n', b't', 0x14, 0, 0, 0, 0, 0x14];
            wire.extend_from_slice(&CLEAR_ALL_MAGIC.to_be_bytes());
            wire.push(0x03);
            for byte in wire {
                server.write_all(&[byte]).await.unwrap();
            }
        });

        let first = framed.next().await.unwrap().unwrap();
        assert_eq!(first.to_string(), "server_hello identity=\"nt\" flags=0x00");
        assert_eq!(
            framed.next().await.unwrap().unwrap(),
            ReadEvent::ClearAllEntries
        );
        assert_eq!(
            framed.next().await.unwrap().unwrap(),
            ReadEvent::ServerHelloComplete
        );
        writer.await.unwrap();
        assert!(framed.next().await.is_none());
    }

    #[tokio::test]
    async fn framed_read_surfaces_malformed_frame() {
        let mut framed = FramedRead::new(&[0x00, 0xFF][..], Nt3Codec::new());
        assert_eq!(framed.next().await.unwrap().unwrap(), ReadEvent::KeepAlive);
        let err = framed.next().await.unwrap().unwrap_err();
        assert!(matches!(err, FrameError::UnknownMessageType(0xFF)));
    }

    #[tokio::test]
    async fn truncated_stream_is_an_error_at_eof() {
        let mut framed = FramedRead::new(&[0x11, 0x00][..], Nt3Codec::new());
        let err = framed.next().await.unwrap().unwrap_err();
        match err {
            FrameError::Io(err) => assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof),
            other => panic!("expected io error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn framed_write_encodes_events() {
        let mut framed = FramedWrite::new(Vec::new(), Nt3Codec::new());
        framed
            .send(WriteEvent::client_hello("").unwrap())
            .await
            .unwrap();
        framed.send(WriteEvent::ClientHelloComplete).await.unwrap();
        assert_eq!(framed.get_ref().as_slice(), &[0x01, 0x03, 0x00, 0x00, 0x05]);
    }
}
