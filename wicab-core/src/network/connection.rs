//! Managed TCP connection carrying newline-delimited protocol lines.
//!
//! [`CabConnection`] owns the socket and the line framing and knows
//! nothing about the protocol grammar above the line level. The
//! protocol client splits it into a write half (for commands and
//! keepalives) and a read half (for the background read loop).

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::debug;

use crate::codec::LineCodec;
use crate::error::CabError;

pub type Connection = CabConnection;

/// Write half of a split [`CabConnection`].
pub type LineSink = SplitSink<Framed<TcpStream, LineCodec>, String>;

/// Read half of a split [`CabConnection`].
pub type LineStream = SplitStream<Framed<TcpStream, LineCodec>>;

/// A live TCP connection to a WiThrottle server.
#[derive(Debug)]
pub struct CabConnection {
    framed: Framed<TcpStream, LineCodec>,
}

impl CabConnection {
    /// Open a TCP connection to the given peer.
    ///
    /// DNS resolution, refusal and timeouts surface as
    /// [`CabError::Connection`].
    pub async fn connect(info: &ConnectionInfo) -> Result<Self, CabError> {
        let stream = TcpStream::connect(info.to_addr()).await?;
        // Command lines are tiny; don't let Nagle hold them back.
        let _ = stream.set_nodelay(true);
        Ok(Self {
            framed: Framed::new(stream, LineCodec::new()),
        })
    }

    /// Send one line; the codec appends the single `\n` terminator.
    pub async fn send_line(&mut self, line: &str) -> Result<(), CabError> {
        self.framed.send(line.to_string()).await
    }

    /// Receive the next line, trailing whitespace trimmed.
    ///
    /// Returns `Ok(None)` once the peer closes the stream.
    pub async fn next_line(&mut self) -> Result<Option<String>, CabError> {
        match self.framed.next().await {
            Some(Ok(line)) => Ok(Some(line)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    /// Flush and shut down the write half. Idempotent: repeated closes
    /// and closes of an already-reset socket are swallowed.
    pub async fn close(&mut self) {
        if let Err(e) = self.framed.close().await {
            debug!(error = %e, "close after socket already went down");
        }
    }

    /// Split into independently owned write and read halves.
    pub fn into_split(self) -> (LineSink, LineStream) {
        self.framed.split()
    }
}

// ── ConnectionInfo ───────────────────────────────────────────────

/// Host and port of a WiThrottle server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    host: String,
    port: u16,
}

impl ConnectionInfo {
    pub fn new(host: String, port: u16) -> Self {
        Self { host, port }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port` form accepted by `TcpStream::connect`.
    pub fn to_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl std::fmt::Display for ConnectionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    #[test]
    fn connection_info_formatting() {
        let info = ConnectionInfo::new("127.0.0.1".to_string(), 12090);
        assert_eq!(info.to_addr(), "127.0.0.1:12090");
        assert_eq!(info.to_string(), "127.0.0.1:12090");
        assert_eq!(info.host(), "127.0.0.1");
        assert_eq!(info.port(), 12090);
    }

    #[tokio::test]
    async fn connect_refused_surfaces_error() {
        // Bind then drop a listener so the port is (very likely) dead.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let info = ConnectionInfo::new("127.0.0.1".to_string(), port);
        let err = CabConnection::connect(&info).await.unwrap_err();
        assert!(matches!(err, CabError::Connection(_)));
    }

    #[tokio::test]
    async fn send_and_receive_lines() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(b"VN2.0\r\nPPA1\n").await.unwrap();
            let mut buf = vec![0u8; 64];
            let n = tokio::io::AsyncReadExt::read(&mut sock, &mut buf).await.unwrap();
            buf.truncate(n);
            buf
        });

        let info = ConnectionInfo::new("127.0.0.1".to_string(), addr.port());
        let mut conn = CabConnection::connect(&info).await.unwrap();

        assert_eq!(conn.next_line().await.unwrap(), Some("VN2.0".to_string()));
        assert_eq!(conn.next_line().await.unwrap(), Some("PPA1".to_string()));

        conn.send_line("*").await.unwrap();
        conn.close().await;

        let received = server.await.unwrap();
        assert_eq!(&received, b"*\n");
    }

    #[tokio::test]
    async fn next_line_reports_end_of_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (sock, _) = listener.accept().await.unwrap();
            drop(sock);
        });

        let info = ConnectionInfo::new("127.0.0.1".to_string(), addr.port());
        let mut conn = CabConnection::connect(&info).await.unwrap();
        assert_eq!(conn.next_line().await.unwrap(), None);
    }
}
