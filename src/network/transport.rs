//! Packet Transports
//!
//! Moves whole packets over a reliable, ordered channel. Two flavors:
//!
//! - byte streams (TCP, pipes): the tag byte tells how many body bytes follow
//! - WebSocket: one binary message per packet
//!
//! Each transport is split into a source and a sink so the receive loop and
//! the writer task can own one half each.

use std::future::Future;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::debug;

use crate::network::protocol::{CodecError, Packet, PacketKind, MAX_PACKET_SIZE};

/// Transport failures.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Byte stream read or write failed
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Peer sent bytes that are not a packet
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// WebSocket layer failed
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Peer sent a WebSocket text message
    #[error("unexpected text message")]
    UnexpectedText,
}

/// Receiving half of a transport.
pub trait PacketSource: Send + 'static {
    /// Next packet, or `None` once the peer closed the channel cleanly.
    fn recv(&mut self) -> impl Future<Output = Result<Option<Packet>, TransportError>> + Send;
}

/// Sending half of a transport.
pub trait PacketSink: Send + 'static {
    /// Send one packet.
    fn send(&mut self, packet: Packet) -> impl Future<Output = Result<(), TransportError>> + Send;
}

// =============================================================================
// BYTE STREAM
// =============================================================================

/// Reads tag-prefixed packets from a byte stream.
pub struct StreamSource<R> {
    reader: R,
}

/// Writes packets to a byte stream.
pub struct StreamSink<W> {
    writer: W,
}

/// Split a byte stream into a packet source and sink.
pub fn stream_transport<S>(stream: S) -> (StreamSource<ReadHalf<S>>, StreamSink<WriteHalf<S>>)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, writer) = tokio::io::split(stream);
    (StreamSource { reader }, StreamSink { writer })
}

impl<R> StreamSource<R> {
    /// Wrap a reader.
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<W> StreamSink<W> {
    /// Wrap a writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<R> PacketSource for StreamSource<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    fn recv(&mut self) -> impl Future<Output = Result<Option<Packet>, TransportError>> + Send {
        async move {
            let mut tag = [0u8; 1];
            if self.reader.read(&mut tag).await? == 0 {
                return Ok(None);
            }

            let kind = PacketKind::from_tag(tag[0])?;
            let mut body = [0u8; MAX_PACKET_SIZE];
            let body = &mut body[..kind.body_len()];
            self.reader.read_exact(body).await?;

            Ok(Some(Packet::decode_body(kind, body)?))
        }
    }
}

impl<W> PacketSink for StreamSink<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    fn send(&mut self, packet: Packet) -> impl Future<Output = Result<(), TransportError>> + Send {
        async move {
            self.writer.write_all(&packet.encode()).await?;
            self.writer.flush().await?;
            Ok(())
        }
    }
}

// =============================================================================
// WEBSOCKET
// =============================================================================

/// Receives one packet per binary WebSocket message.
pub struct WsSource<S> {
    stream: SplitStream<WebSocketStream<S>>,
}

/// Sends one packet per binary WebSocket message.
pub struct WsSink<S> {
    sink: SplitSink<WebSocketStream<S>, Message>,
}

/// Split an established WebSocket into a packet source and sink.
pub fn websocket_transport<S>(ws: WebSocketStream<S>) -> (WsSource<S>, WsSink<S>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (sink, stream) = ws.split();
    (WsSource { stream }, WsSink { sink })
}

impl<S> PacketSource for WsSource<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn recv(&mut self) -> impl Future<Output = Result<Option<Packet>, TransportError>> + Send {
        async move {
            while let Some(message) = self.stream.next().await {
                match message? {
                    Message::Binary(data) => return Ok(Some(Packet::decode(&data)?)),
                    Message::Close(_) => return Ok(None),
                    Message::Text(_) => return Err(TransportError::UnexpectedText),
                    // Protocol-level ping/pong is answered by tungstenite itself
                    other => debug!("Ignoring websocket frame: {:?}", other),
                }
            }
            Ok(None)
        }
    }
}

impl<S> PacketSink for WsSink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn send(&mut self, packet: Packet) -> impl Future<Output = Result<(), TransportError>> + Send {
        async move {
            self.sink.send(Message::Binary(packet.encode())).await?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::input::Intent;

    #[tokio::test]
    async fn test_stream_transport_preserves_order() {
        let (a, b) = tokio::io::duplex(64);
        let (_a_source, mut a_sink) = stream_transport(a);
        let (mut b_source, _b_sink) = stream_transport(b);

        let packets = [
            Packet::Ping { id: 1 },
            Packet::Commit { commitment: [3; 32] },
            Packet::Intent { for_tick: 7, intent: Intent(Intent::RIGHT) },
        ];
        for packet in packets {
            a_sink.send(packet).await.unwrap();
        }
        for packet in packets {
            assert_eq!(b_source.recv().await.unwrap(), Some(packet));
        }
    }

    #[tokio::test]
    async fn test_stream_eof_is_clean_close() {
        let (a, b) = tokio::io::duplex(64);
        let (mut b_source, _b_sink) = stream_transport(b);
        drop(a);
        assert_eq!(b_source.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_stream_unknown_tag_is_error() {
        let (mut a, b) = tokio::io::duplex(64);
        let (mut b_source, _b_sink) = stream_transport(b);
        a.write_all(&[9, 0, 0]).await.unwrap();
        assert!(matches!(
            b_source.recv().await,
            Err(TransportError::Codec(CodecError::UnknownPacket(9)))
        ));
    }

    #[tokio::test]
    async fn test_stream_truncated_body_is_error() {
        let (mut a, b) = tokio::io::duplex(64);
        let (mut b_source, _b_sink) = stream_transport(b);
        a.write_all(&[0, 1, 2, 3]).await.unwrap();
        drop(a);
        assert!(matches!(b_source.recv().await, Err(TransportError::Io(_))));
    }

    #[tokio::test]
    async fn test_websocket_transport_roundtrip() {
        let (client_io, server_io) = tokio::io::duplex(1024);
        let server = tokio::spawn(async move {
            tokio_tungstenite::accept_async(server_io).await.unwrap()
        });
        let (client_ws, _) = tokio_tungstenite::client_async("ws://localhost/", client_io)
            .await
            .unwrap();
        let server_ws = server.await.unwrap();

        let (_client_source, mut client_sink) = websocket_transport(client_ws);
        let (mut server_source, _server_sink) = websocket_transport(server_ws);

        let packet = Packet::Reveal { nonce: [0x5a; 16] };
        client_sink.send(packet).await.unwrap();
        assert_eq!(server_source.recv().await.unwrap(), Some(packet));
    }
}
