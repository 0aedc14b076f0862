//! Transport traits and the development TCP adapter.
//!
//! The production wire transport is an external collaborator; sessions
//! only see these traits. The shipped adapter frames one JSON object per
//! line over TCP.

use async_trait::async_trait;
use nocturne_protocol::event::{ClientEvent, ServerFrame};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::trace;

/// One inbound frame, or evidence the client sent something else.
#[derive(Clone, Debug, PartialEq)]
pub enum Inbound {
    Event(ClientEvent),
    /// A frame that did not parse; carries the parse error text.
    Malformed(String),
}

/// The read half of a client connection.
#[async_trait]
pub trait SocketReader: Send + 'static {
    /// Next inbound frame. `None` means the transport disconnected.
    async fn recv(&mut self) -> Option<Inbound>;
}

/// The write half of a client connection.
#[async_trait]
pub trait SocketWriter: Send + 'static {
    /// Sends one frame. Returns `false` once the transport is gone.
    async fn send(&mut self, frame: &ServerFrame) -> bool;
}

pub struct TcpSocketReader {
    lines: tokio::io::Lines<BufReader<OwnedReadHalf>>,
}

pub struct TcpSocketWriter {
    write: OwnedWriteHalf,
}

/// Splits a TCP stream into the line-framed transport pair.
pub fn tcp_transport(stream: TcpStream) -> (TcpSocketReader, TcpSocketWriter) {
    let (read, write) = stream.into_split();

    (
        TcpSocketReader {
            lines: BufReader::new(read).lines(),
        },
        TcpSocketWriter { write },
    )
}

#[async_trait]
impl SocketReader for TcpSocketReader {
    async fn recv(&mut self) -> Option<Inbound> {
        loop {
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) | Err(_) => return None,
            };

            if line.trim().is_empty() {
                continue;
            }

            trace!(frame = line, "inbound");

            return Some(match serde_json::from_str::<ClientEvent>(&line) {
                Ok(event) => Inbound::Event(event),
                Err(e) => Inbound::Malformed(e.to_string()),
            });
        }
    }
}

#[async_trait]
impl SocketWriter for TcpSocketWriter {
    async fn send(&mut self, frame: &ServerFrame) -> bool {
        let Ok(mut line) = serde_json::to_vec(frame) else {
            return true;
        };
        line.push(b'\n');

        self.write.write_all(&line).await.is_ok()
    }
}

/// In-process transport for tests: a pair of flume channels.
pub mod channel {
    use super::*;

    pub struct ChannelReader {
        pub receiver: flume::Receiver<Inbound>,
    }

    pub struct ChannelWriter {
        pub sender: flume::Sender<ServerFrame>,
    }

    /// Returns (reader, writer) for the session side plus the client-side
    /// handles to drive them.
    pub fn pair() -> (
        ChannelReader,
        ChannelWriter,
        flume::Sender<Inbound>,
        flume::Receiver<ServerFrame>,
    ) {
        let (in_tx, in_rx) = flume::unbounded();
        let (out_tx, out_rx) = flume::unbounded();

        (
            ChannelReader { receiver: in_rx },
            ChannelWriter { sender: out_tx },
            in_tx,
            out_rx,
        )
    }

    #[async_trait]
    impl SocketReader for ChannelReader {
        async fn recv(&mut self) -> Option<Inbound> {
            self.receiver.recv_async().await.ok()
        }
    }

    #[async_trait]
    impl SocketWriter for ChannelWriter {
        async fn send(&mut self, frame: &ServerFrame) -> bool {
            self.sender.send(frame.clone()).is_ok()
        }
    }
}
