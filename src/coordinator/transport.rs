//! Per-connection transport tracking
//!
//! [`GateListener`] wraps every accepted socket in a [`TrackedStream`] and
//! hands a [`ConnectionHandle`] to the request handlers through axum's
//! connect-info mechanism. A handler that ends the barrier marks its handle;
//! when the HTTP layer later shuts down that socket (after flushing the
//! `Connection: close` response) the stream notifies the
//! [`ShutdownSequencer`].

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use axum::extract::connect_info::Connected;
use axum::serve::{IncomingStream, Listener};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream};

use super::shutdown::ShutdownSequencer;

// ============================================================================
// Connection Handle
// ============================================================================

struct ConnectionShared {
    peer: SocketAddr,
    exit_on_close: AtomicBool,
    sequencer: Arc<ShutdownSequencer>,
}

/// Handle to the connection a request arrived on
#[derive(Clone)]
pub struct ConnectionHandle {
    shared: Arc<ConnectionShared>,
}

impl ConnectionHandle {
    pub fn new(peer: SocketAddr, sequencer: Arc<ShutdownSequencer>) -> Self {
        Self {
            shared: Arc::new(ConnectionShared {
                peer,
                exit_on_close: AtomicBool::new(false),
                sequencer,
            }),
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.shared.peer
    }

    /// Exit the process once this connection has been shut down
    pub fn close_then_exit(&self) {
        self.shared.exit_on_close.store(true, Ordering::SeqCst);
    }

    pub fn exit_requested(&self) -> bool {
        self.shared.exit_on_close.load(Ordering::SeqCst)
    }

    fn sequencer(&self) -> &ShutdownSequencer {
        &self.shared.sequencer
    }
}

impl Connected<IncomingStream<'_, GateListener>> for ConnectionHandle {
    fn connect_info(stream: IncomingStream<'_, GateListener>) -> Self {
        stream.io().handle().clone()
    }
}

// ============================================================================
// Tracked Stream
// ============================================================================

/// TCP stream that reports its shutdown to the sequencer when asked to
pub struct TrackedStream {
    inner: TcpStream,
    handle: ConnectionHandle,
    settled: bool,
}

impl TrackedStream {
    pub fn new(inner: TcpStream, handle: ConnectionHandle) -> Self {
        Self {
            inner,
            handle,
            settled: false,
        }
    }

    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    fn settle(&mut self, result: &io::Result<()>) {
        if self.settled || !self.handle.exit_requested() {
            return;
        }
        self.settled = true;

        match result {
            // The peer may close first once it has read the whole response
            Ok(()) => self.handle.sequencer().connection_closed(self.handle.peer()),
            Err(e) if e.kind() == io::ErrorKind::NotConnected => {
                self.handle.sequencer().connection_closed(self.handle.peer())
            }
            Err(e) => self
                .handle
                .sequencer()
                .connection_failed(self.handle.peer(), &e.to_string()),
        }
    }
}

impl AsyncRead for TrackedStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for TrackedStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let result = ready!(Pin::new(&mut self.inner).poll_shutdown(cx));
        self.settle(&result);
        Poll::Ready(result)
    }
}

impl Drop for TrackedStream {
    fn drop(&mut self) {
        if !self.settled && self.handle.exit_requested() {
            self.settled = true;
            self.handle.sequencer().connection_failed(
                self.handle.peer(),
                "connection dropped before the final response was flushed",
            );
        }
    }
}

// ============================================================================
// Gate Listener
// ============================================================================

/// TCP listener producing tracked connections
pub struct GateListener {
    inner: TcpListener,
    sequencer: Arc<ShutdownSequencer>,
}

impl GateListener {
    pub async fn bind(addr: SocketAddr, sequencer: Arc<ShutdownSequencer>) -> io::Result<Self> {
        let inner = TcpListener::bind(addr).await?;
        Ok(Self { inner, sequencer })
    }
}

impl Listener for GateListener {
    type Io = TrackedStream;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        loop {
            match self.inner.accept().await {
                Ok((stream, peer)) => {
                    if self.sequencer.is_triggered() {
                        tracing::debug!(peer = %peer, "Refusing connection, barrier finished");
                        continue;
                    }
                    let handle = ConnectionHandle::new(peer, self.sequencer.clone());
                    return (TrackedStream::new(stream, handle), peer);
                }
                Err(e) => {
                    // Usually fd exhaustion; back off instead of spinning
                    tracing::warn!(error = %e, "Failed to accept connection");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        self.inner.local_addr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::shutdown::testing::RecordingExit;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn pair(
        sequencer: Arc<ShutdownSequencer>,
    ) -> (TrackedStream, TcpStream) {
        let mut listener = GateListener::bind("127.0.0.1:0".parse().unwrap(), sequencer)
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await;
        (server, client)
    }

    #[tokio::test]
    async fn test_untracked_shutdown_does_not_exit() {
        let exit = Arc::new(RecordingExit::default());
        let sequencer = Arc::new(ShutdownSequencer::new(exit.clone()));
        let (mut server, _client) = pair(sequencer).await;

        server.shutdown().await.unwrap();
        drop(server);
        assert!(exit.codes().is_empty());
    }

    #[tokio::test]
    async fn test_exit_after_flush_and_shutdown() {
        let exit = Arc::new(RecordingExit::default());
        let sequencer = Arc::new(ShutdownSequencer::new(exit.clone()));
        let (mut server, mut client) = pair(sequencer.clone()).await;

        sequencer.trigger(Some(server.handle()));
        server.write_all(b"OK").await.unwrap();
        server.flush().await.unwrap();
        assert!(exit.codes().is_empty());

        server.shutdown().await.unwrap();
        assert_eq!(exit.codes(), vec![0]);

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"OK");

        // Dropping after a clean shutdown must not report a failure
        drop(server);
        assert_eq!(exit.codes(), vec![0]);
    }

    #[tokio::test]
    async fn test_drop_without_shutdown_is_fatal() {
        let exit = Arc::new(RecordingExit::default());
        let sequencer = Arc::new(ShutdownSequencer::new(exit.clone()));
        let (server, _client) = pair(sequencer.clone()).await;

        sequencer.trigger(Some(server.handle()));
        drop(server);
        assert_eq!(exit.codes(), vec![1]);
    }

    #[tokio::test]
    async fn test_listener_refuses_after_trigger() {
        let exit = Arc::new(RecordingExit::default());
        let sequencer = Arc::new(ShutdownSequencer::new(exit.clone()));
        let mut listener =
            GateListener::bind("127.0.0.1:0".parse().unwrap(), sequencer.clone())
                .await
                .unwrap();
        let addr = listener.local_addr().unwrap();

        sequencer.trigger(None);

        let mut refused = TcpStream::connect(addr).await.unwrap();
        let accept = tokio::time::timeout(Duration::from_millis(200), listener.accept()).await;
        assert!(accept.is_err());

        // The refused socket is closed by the server
        let mut buf = [0u8; 1];
        let n = refused.read(&mut buf).await.unwrap_or(0);
        assert_eq!(n, 0);
    }
}
