//! Connection pair handling: dial, then copy bytes both ways until the pair is done.
//!
//! A pair moves through `ACCEPTED -> DIALED -> RELAYING -> CLOSED`. When the
//! dial fails the accepted socket is dropped straight away and nothing is
//! relayed. Once relaying, a clean end-of-stream from the accepted side is
//! passed on as a half-close and the reply keeps flowing back. The pair ends
//! when the dialed->accepted copy returns or the accepted->dialed copy fails;
//! the other direction is aborted and all four socket halves are dropped
//! before [`relay`] returns.

use std::fmt;
use std::io;
use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::dial::Dialer;
use crate::error::Result;

/// Buffer size for a single read in one copy direction.
pub const READ_BUFFER_SIZE: usize = 16 * 1024;

/// One copy direction of a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Accepted side to dialed side.
    Forward,
    /// Dialed side to accepted side.
    Backward,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => f.write_str("accepted->dialed"),
            Direction::Backward => f.write_str("dialed->accepted"),
        }
    }
}

/// How a relay ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayOutcome {
    /// The direction whose termination closed the pair.
    pub finished: Direction,
    /// Bytes that direction copied before it stopped.
    pub bytes: u64,
    /// Whether it stopped on an I/O error rather than end-of-stream.
    pub errored: bool,
}

/// Handles one accepted connection for its whole lifetime.
///
/// Dial errors are logged here and returned so callers can observe them;
/// the accepted socket is closed either way.
pub async fn handle_connection(
    accepted: TcpStream,
    peer: SocketAddr,
    dialer: &Dialer,
) -> Result<RelayOutcome> {
    if let Err(e) = accepted.set_nodelay(true) {
        tracing::debug!(%peer, error = %e, "failed to set TCP_NODELAY on accepted socket");
    }

    let dialed = match dialer.dial().await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!(%peer, target = dialer.target(), "Error connecting to {}: {}", dialer.description(), e);
            return Err(e);
        }
    };

    tracing::debug!(%peer, target = dialer.target(), "destination connected, relaying");

    let outcome = relay(accepted, dialed).await;

    tracing::debug!(
        %peer,
        finished = %outcome.finished,
        bytes = outcome.bytes,
        "connection pair closed"
    );

    Ok(outcome)
}

/// Copies bytes between two connected sockets until the pair is done.
///
/// The forward direction runs on its own task; the backward direction runs
/// on the caller's task. The returned outcome names the direction that
/// closed the pair.
pub async fn relay(accepted: TcpStream, dialed: TcpStream) -> RelayOutcome {
    let (mut accepted_read, mut accepted_write) = accepted.into_split();
    let (mut dialed_read, mut dialed_write) = dialed.into_split();

    let mut forward = tokio::spawn(async move {
        let outcome =
            copy_direction(&mut accepted_read, &mut dialed_write, Direction::Forward).await;
        if !outcome.errored {
            if let Err(e) = dialed_write.shutdown().await {
                tracing::debug!(error = %e, "failed to half-close dialed side");
            }
        }
        outcome
    });

    let outcome = {
        let backward = copy_direction(&mut dialed_read, &mut accepted_write, Direction::Backward);
        tokio::pin!(backward);

        tokio::select! {
            joined = &mut forward => {
                let forward_outcome = match joined {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        tracing::error!(error = %e, "forward relay task failed");
                        RelayOutcome { finished: Direction::Forward, bytes: 0, errored: true }
                    }
                };
                if forward_outcome.errored {
                    forward_outcome
                } else {
                    // Half-closed: keep relaying the reply until the dialed side is done.
                    backward.await
                }
            }
            outcome = &mut backward => {
                forward.abort();
                // Wait for the aborted task so its socket halves are dropped before we return.
                let _ = forward.await;
                outcome
            }
        }
    };

    drop(dialed_read);
    drop(accepted_write);

    outcome
}

/// Copies one direction until end-of-stream or an error.
async fn copy_direction<R, W>(reader: &mut R, writer: &mut W, direction: Direction) -> RelayOutcome
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let mut bytes = 0u64;

    let result: io::Result<()> = async {
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                return Ok(());
            }
            writer.write_all(&buf[..n]).await?;
            bytes += n as u64;
        }
    }
    .await;

    let errored = match result {
        Ok(()) => {
            tracing::debug!(%direction, bytes, "end of stream");
            false
        }
        Err(e) => {
            tracing::debug!(%direction, bytes, error = %e, "connection closed");
            true
        }
    };

    RelayOutcome {
        finished: direction,
        bytes,
        errored,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tracing_subscriber::fmt::MakeWriter;

    /// Log sink shared between the subscriber and the test.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    /// Returns both ends of a loopback TCP connection.
    async fn socket_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        (client.unwrap(), accepted.unwrap().0)
    }

    #[test]
    fn test_direction_display() {
        assert_eq!(Direction::Forward.to_string(), "accepted->dialed");
        assert_eq!(Direction::Backward.to_string(), "dialed->accepted");
    }

    #[tokio::test]
    async fn test_copy_direction_counts_bytes_until_eof() {
        let (mut reader, mut writer) = tokio::io::duplex(64);
        let mut sink = Vec::new();

        writer.write_all(b"hello world").await.unwrap();
        drop(writer);

        let outcome = copy_direction(&mut reader, &mut sink, Direction::Forward).await;
        assert_eq!(outcome.bytes, 11);
        assert!(!outcome.errored);
        assert_eq!(sink, b"hello world");
    }

    #[tokio::test]
    async fn test_relay_moves_bytes_both_ways() {
        let (mut app, accepted) = socket_pair().await;
        let (dialed, mut backend) = socket_pair().await;

        let relay_task = tokio::spawn(relay(accepted, dialed));

        app.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        backend.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        backend.write_all(b"pong").await.unwrap();
        app.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");

        // Closing the accepted side reaches the dialed side as EOF.
        drop(app);
        let n = tokio::time::timeout(Duration::from_secs(5), backend.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 0);

        drop(backend);
        let outcome = tokio::time::timeout(Duration::from_secs(5), relay_task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.finished, Direction::Backward);
        assert_eq!(outcome.bytes, 4);
    }

    #[tokio::test]
    async fn test_half_close_still_delivers_reply() {
        let (mut app, accepted) = socket_pair().await;
        let (dialed, mut backend) = socket_pair().await;

        let relay_task = tokio::spawn(relay(accepted, dialed));

        app.write_all(b"ping").await.unwrap();
        app.shutdown().await.unwrap();

        let mut request = Vec::new();
        tokio::time::timeout(Duration::from_secs(5), backend.read_to_end(&mut request))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(request, b"ping");

        backend.write_all(b"pong").await.unwrap();
        backend.shutdown().await.unwrap();

        let mut response = Vec::new();
        tokio::time::timeout(Duration::from_secs(5), app.read_to_end(&mut response))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response, b"pong");

        let outcome = tokio::time::timeout(Duration::from_secs(5), relay_task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.finished, Direction::Backward);
        assert_eq!(outcome.bytes, 4);
        assert!(!outcome.errored);
    }

    #[tokio::test]
    async fn test_dialed_close_ends_pair() {
        let (mut app, accepted) = socket_pair().await;
        let (dialed, backend) = socket_pair().await;

        let relay_task = tokio::spawn(relay(accepted, dialed));
        drop(backend);

        let outcome = tokio::time::timeout(Duration::from_secs(5), relay_task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.finished, Direction::Backward);

        let mut buf = [0u8; 8];
        let n = tokio::time::timeout(Duration::from_secs(5), app.read(&mut buf))
            .await
            .unwrap()
            .unwrap_or(0);
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_handle_connection_dial_failure_closes_accepted() {
        let unused = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let dialer = Dialer::new(&unused.to_string(), None).unwrap();

        let (mut app, accepted) = socket_pair().await;
        let peer = app.local_addr().unwrap();

        let result = handle_connection(accepted, peer, &dialer).await;
        assert!(result.is_err());

        let mut buf = [0u8; 8];
        let n = tokio::time::timeout(Duration::from_secs(5), app.read(&mut buf))
            .await
            .unwrap()
            .unwrap_or(0);
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_dial_failure_log_names_target() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let unused = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };

        let dialer = Dialer::new(&unused.to_string(), None).unwrap();
        let (_app, accepted) = socket_pair().await;
        let peer = accepted.peer_addr().unwrap();
        assert!(handle_connection(accepted, peer, &dialer).await.is_err());
        assert!(logs.contents().contains("Error connecting to destination server"));

        let dialer = Dialer::new(&unused.to_string(), None)
            .unwrap()
            .with_description("tunnel server");
        let (_app, accepted) = socket_pair().await;
        let peer = accepted.peer_addr().unwrap();
        assert!(handle_connection(accepted, peer, &dialer).await.is_err());
        assert!(logs.contents().contains("Error connecting to tunnel server"));
    }
}
