//! TCP server for handling finger connections.
//!
//! Every connection carries exactly one query: read a line, write the
//! reply, close. Connections are independent tasks with no shared
//! mutable state.

use crate::config::Config;
use crate::directory::Accounts;
use crate::engine::Engine;
use crate::uptime::UptimeSource;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::{debug, error, info, trace};

/// Per-connection read limits
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// Longest accepted query, excluding the terminator
    pub max_line_length: usize,
    /// How long to wait for the query line
    pub read_timeout: Option<Duration>,
}

impl From<&Config> for Limits {
    fn from(config: &Config) -> Self {
        Limits {
            max_line_length: config.max_line_length,
            read_timeout: config.read_timeout,
        }
    }
}

/// Server instance
pub struct Server<A, U> {
    listen: String,
    limits: Limits,
    engine: Arc<Engine<A, U>>,
}

impl<A, U> Server<A, U>
where
    A: Accounts + 'static,
    U: UptimeSource + 'static,
{
    /// Create a new server instance
    pub fn new(config: &Config, engine: Engine<A, U>) -> Self {
        Server {
            listen: config.listen_addr(),
            limits: Limits::from(config),
            engine: Arc::new(engine),
        }
    }

    /// Bind the listening socket
    pub async fn bind(&self) -> std::io::Result<TcpListener> {
        let listener = TcpListener::bind(&self.listen).await?;
        info!(
            address = %listener.local_addr()?,
            identity = self.engine.identity(),
            "Server listening"
        );
        Ok(listener)
    }

    /// Accept connections forever, one task per connection
    pub async fn serve(&self, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    debug!(peer = %peer, "New connection");

                    let engine = Arc::clone(&self.engine);
                    let limits = self.limits;

                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, engine, limits).await {
                            debug!(peer = %peer, error = %e, "Connection error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }
}

/// Handle a single client connection: one query, one reply.
pub async fn handle_connection<S, A, U>(
    stream: S,
    peer: SocketAddr,
    engine: Arc<Engine<A, U>>,
    limits: Limits,
) -> Result<(), ConnectionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    A: Accounts + 'static,
    U: UptimeSource + 'static,
{
    let mut stream = BufReader::new(stream);

    let read = read_query(&mut stream, limits.max_line_length);
    let query = match limits.read_timeout {
        Some(timeout) => tokio::time::timeout(timeout, read)
            .await
            .map_err(|_| ConnectionError::Timeout)??,
        None => read.await?,
    };

    info!(peer = %peer, query = ?query, "Query");

    // Account and plan lookups block
    let response = tokio::task::spawn_blocking(move || engine.respond(&query))
        .await
        .map_err(ConnectionError::Dispatch)?;

    stream.write_all(&response).await?;
    stream.shutdown().await?;
    trace!(peer = %peer, bytes = response.len(), "Reply sent");

    Ok(())
}

/// Read the query line, without its `\n` or `\r\n` terminator.
///
/// A final line cut short by end of stream is still a query; an empty
/// stream is not.
async fn read_query<R>(reader: &mut R, max_line_length: usize) -> Result<String, ConnectionError>
where
    R: AsyncBufRead + Unpin,
{
    // Room for the query plus "\r\n"
    let limit = max_line_length + 2;
    let mut line = Vec::with_capacity(128);

    let n = (&mut *reader)
        .take(limit as u64)
        .read_until(b'\n', &mut line)
        .await?;
    if n == 0 {
        return Err(ConnectionError::Closed);
    }

    if line.last() == Some(&b'\n') {
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
    } else if n == limit {
        return Err(ConnectionError::LineTooLong);
    }

    if line.len() > max_line_length {
        return Err(ConnectionError::LineTooLong);
    }

    Ok(String::from_utf8_lossy(&line).into_owned())
}

/// Reasons a connection is dropped without a reply
#[derive(Debug)]
pub enum ConnectionError {
    /// Client closed before sending anything
    Closed,
    /// No query line within the read timeout
    Timeout,
    /// Query line exceeds the configured maximum
    LineTooLong,
    Io(std::io::Error),
    /// The blocking lookup task failed
    Dispatch(tokio::task::JoinError),
}

impl std::fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionError::Closed => write!(f, "connection closed before query"),
            ConnectionError::Timeout => write!(f, "timed out waiting for query"),
            ConnectionError::LineTooLong => write!(f, "query line too long"),
            ConnectionError::Io(e) => write!(f, "I/O error: {}", e),
            ConnectionError::Dispatch(e) => write!(f, "lookup task failed: {}", e),
        }
    }
}

impl std::error::Error for ConnectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConnectionError::Io(e) => Some(e),
            ConnectionError::Dispatch(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConnectionError {
    fn from(e: std::io::Error) -> Self {
        ConnectionError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::directory::{StaticAccounts, PLAN_FILE};
    use crate::uptime::FixedUptime;
    use tokio::net::TcpStream;
    use tokio_test::io::Builder;

    const LIMITS: Limits = Limits {
        max_line_length: 16,
        read_timeout: None,
    };

    fn peer() -> SocketAddr {
        "127.0.0.1:7979".parse().unwrap()
    }

    fn engine(accounts: StaticAccounts) -> Arc<Engine<StaticAccounts, FixedUptime>> {
        Arc::new(Engine::new(Arc::from("example.box"), accounts, FixedUptime(Some(3661))))
    }

    #[tokio::test]
    async fn test_listing_reply() {
        let stream = Builder::new()
            .read(b"\r\n")
            .write(b"Welcome to example.box!\r\nUptime: 0 days 1:01:01\r\n")
            .build();

        handle_connection(stream, peer(), engine(StaticAccounts::default()), LIMITS)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_user_reply_with_bare_newline() {
        let home = tempfile::tempdir().unwrap();
        std::fs::write(home.path().join(PLAN_FILE), b"brb\r\n").unwrap();
        let accounts = StaticAccounts::default().with("alice", "Alice A.", home.path());

        let stream = Builder::new()
            .read(b"/W alice\n")
            .write(b"User: alice\r\nName: Alice A.\r\nPlan: brb\r\n")
            .build();

        handle_connection(stream, peer(), engine(accounts), LIMITS)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_query_split_across_reads() {
        let stream = Builder::new()
            .read(b"nobo")
            .read(b"dy123\r\n")
            .write(b"nobody123: no such user\r\n")
            .build();

        handle_connection(stream, peer(), engine(StaticAccounts::default()), LIMITS)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_read_query_framing() {
        let mut input: &[u8] = b"alice\r\n";
        assert_eq!(read_query(&mut input, 16).await.unwrap(), "alice");

        let mut input: &[u8] = b"alice\n";
        assert_eq!(read_query(&mut input, 16).await.unwrap(), "alice");

        // Unterminated final line
        let mut input: &[u8] = b"alice@host";
        assert_eq!(read_query(&mut input, 16).await.unwrap(), "alice@host");

        // Only the first line is read
        let mut input: &[u8] = b"alice\r\nbob\r\n";
        assert_eq!(read_query(&mut input, 16).await.unwrap(), "alice");

        // Invalid UTF-8 survives as replacement characters
        let mut input: &[u8] = b"al\xffce\r\n";
        assert_eq!(read_query(&mut input, 16).await.unwrap(), "al\u{fffd}ce");

        let mut input: &[u8] = b"";
        assert!(matches!(read_query(&mut input, 16).await, Err(ConnectionError::Closed)));

        let mut input: &[u8] = b"aaaaaaaaaaaaaaaaa";
        assert!(matches!(read_query(&mut input, 16).await, Err(ConnectionError::LineTooLong)));
    }

    #[tokio::test]
    async fn test_closed_without_query() {
        let stream = Builder::new().build();

        let result = handle_connection(stream, peer(), engine(StaticAccounts::default()), LIMITS).await;
        assert!(matches!(result, Err(ConnectionError::Closed)));
    }

    #[tokio::test]
    async fn test_read_error_sends_nothing() {
        let stream = Builder::new()
            .read_error(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"))
            .build();

        let result = handle_connection(stream, peer(), engine(StaticAccounts::default()), LIMITS).await;
        assert!(matches!(result, Err(ConnectionError::Io(_))));
    }

    #[tokio::test]
    async fn test_line_too_long() {
        let stream = Builder::new().read(b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\r\n").build();

        let result = handle_connection(stream, peer(), engine(StaticAccounts::default()), LIMITS).await;
        assert!(matches!(result, Err(ConnectionError::LineTooLong)));
    }

    #[tokio::test]
    async fn test_line_at_limit() {
        let stream = Builder::new()
            .read(b"aaaaaaaaaaaaaaaa\r\n")
            .write(b"aaaaaaaaaaaaaaaa: no such user\r\n")
            .build();

        handle_connection(stream, peer(), engine(StaticAccounts::default()), LIMITS)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_read_timeout() {
        let stream = Builder::new().wait(Duration::from_secs(5)).build();
        let limits = Limits {
            read_timeout: Some(Duration::from_millis(20)),
            ..LIMITS
        };

        let result = handle_connection(stream, peer(), engine(StaticAccounts::default()), limits).await;
        assert!(matches!(result, Err(ConnectionError::Timeout)));
    }

    #[tokio::test]
    async fn test_serve_over_tcp() {
        let config = test_config();
        let server = Server::new(
            &config,
            Engine::new(Arc::from("example.box"), StaticAccounts::default(), FixedUptime(Some(3661))),
        );
        let listener = server.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { server.serve(listener).await });

        // Each connection gets exactly one reply, then EOF
        let cases: [(&[u8], &[u8]); 5] = [
            (b"\r\n", b"Welcome to example.box!\r\nUptime: 0 days 1:01:01\r\n"),
            (b"nobody123\r\n", b"nobody123: no such user\r\n"),
            (b"alice@host\r\n", b"Finger forwarding service denied\r\n"),
            (b"alice bob\r\n", b"\r\n"),
            (b"/W", b"Welcome to example.box!\r\nUptime: 0 days 1:01:01\r\n"),
        ];

        for (query, expected) in cases {
            let mut client = TcpStream::connect(addr).await.unwrap();
            client.write_all(query).await.unwrap();
            client.shutdown().await.unwrap();

            let mut reply = Vec::new();
            client.read_to_end(&mut reply).await.unwrap();
            assert_eq!(reply, expected);
        }
    }
}
