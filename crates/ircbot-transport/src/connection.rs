//! TCP connection to the IRC server.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use ircbot_core::{TransportError, TransportResult};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, trace, warn};

use crate::codec::IrcLineCodec;

/// How long [`Connection::finish`] waits for queued lines to be written.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// An open server connection.
///
/// Reading happens on the caller's task through [`Connection::next_line`];
/// writing happens on a dedicated task draining the outbound queue, so replies
/// are sent in the order they were queued.
pub struct Connection {
    reader: FramedRead<OwnedReadHalf, IrcLineCodec>,
    writer: JoinHandle<()>,
    peer: String,
}

impl Connection {
    /// Connects to `server:port` and starts writing lines from `outbound`.
    ///
    /// Failure is reported once; there is no retry.
    pub async fn connect(
        server: &str,
        port: u16,
        outbound: mpsc::UnboundedReceiver<String>,
    ) -> TransportResult<Self> {
        let stream = TcpStream::connect((server, port)).await.map_err(|e| {
            TransportError::ConnectionFailed {
                server: server.to_string(),
                port,
                reason: e.to_string(),
            }
        })?;
        info!(server, port, "Connected");
        Ok(Self::from_stream(stream, outbound, format!("{server}:{port}")))
    }

    /// Wraps an already established stream.
    pub fn from_stream(
        stream: TcpStream,
        outbound: mpsc::UnboundedReceiver<String>,
        peer: String,
    ) -> Self {
        let (read_half, write_half) = stream.into_split();
        let reader = FramedRead::new(read_half, IrcLineCodec::new());
        let writer = tokio::spawn(write_loop(
            FramedWrite::new(write_half, IrcLineCodec::new()),
            outbound,
        ));
        Self {
            reader,
            writer,
            peer,
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Reads the next line. `None` once the server closed the stream.
    ///
    /// Cancel safe: a line is never lost if the future is dropped.
    pub async fn next_line(&mut self) -> Option<TransportResult<String>> {
        let line = self.reader.next().await?;
        if let Ok(line) = &line {
            trace!(target: "ircbot::wire", "< {line}");
        }
        Some(line.map_err(TransportError::from))
    }

    /// Waits for the writer to flush whatever is still queued.
    ///
    /// The writer stops once every [`ircbot_core::Outbound`] handle is gone;
    /// handles still alive after the timeout are abandoned.
    pub async fn finish(self) {
        let mut writer = self.writer;
        match tokio::time::timeout(DRAIN_TIMEOUT, &mut writer).await {
            Ok(_) => debug!(peer = %self.peer, "Writer finished"),
            Err(_) => {
                warn!(peer = %self.peer, "Writer did not drain in time, aborting");
                writer.abort();
            }
        }
    }
}

async fn write_loop(
    mut sink: FramedWrite<OwnedWriteHalf, IrcLineCodec>,
    mut outbound: mpsc::UnboundedReceiver<String>,
) {
    while let Some(line) = outbound.recv().await {
        if let Err(e) = sink.send(line).await {
            warn!(error = %e, "Failed to write line");
            return;
        }
    }
    if let Err(e) = SinkExt::<String>::close(&mut sink).await {
        debug!(error = %e, "Failed to close write half");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ircbot_core::Outbound;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_round_trip_with_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read, mut write) = socket.into_split();
            let mut lines = BufReader::new(read).lines();
            let first = lines.next_line().await.unwrap().unwrap();
            write.write_all(b"PING :token\r\n").await.unwrap();
            drop(write);
            first
        });

        let (outbound, rx) = Outbound::channel();
        let mut conn = Connection::connect("127.0.0.1", port, rx).await.unwrap();
        outbound.send("NICK bot");

        assert_eq!(server.await.unwrap(), "NICK bot");
        assert_eq!(conn.next_line().await.unwrap().unwrap(), "PING :token");
        assert!(conn.next_line().await.is_none());

        drop(outbound);
        conn.finish().await;
    }

    #[tokio::test]
    async fn test_writer_drains_queue_then_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut lines = BufReader::new(socket).lines();
            let mut received = Vec::new();
            while let Some(line) = lines.next_line().await.unwrap() {
                received.push(line);
            }
            received
        });

        let (outbound, rx) = Outbound::channel();
        let conn = Connection::connect("127.0.0.1", port, rx).await.unwrap();
        outbound.send("NICK bot");
        outbound.send("QUIT");
        drop(outbound);
        conn.finish().await;

        assert_eq!(server.await.unwrap(), ["NICK bot", "QUIT"]);
    }

    #[tokio::test]
    async fn test_connect_failure_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let (_outbound, rx) = Outbound::channel();
        let err = Connection::connect("127.0.0.1", port, rx).await.err().unwrap();
        assert!(matches!(err, TransportError::ConnectionFailed { port: p, .. } if p == port));
    }
}
