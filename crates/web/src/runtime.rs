//! Hosted runtime: drives an [`HttpServer`] from tokio sockets.
//!
//! The server stays single threaded. Everything runs on one thread inside a
//! [`tokio::task::LocalSet`], the server lives in an `Rc<RefCell<_>>`, and no
//! borrow is ever held across an `.await`, so events reach the server one at
//! a time exactly as a callback driven network stack would deliver them.
//!
//! Per connection:
//!
//! - a reader feeding `on_receive`, ended by the idle timeout, EOF or a
//!   requested disconnect
//! - a writer draining the queued sends, reporting `on_sent` after each
//!   completed write
//! - a [`CancellationToken`] shared by both halves and by the transport, so a
//!   disconnect requested by the server stops both
//!
//! The number of concurrent connections is bounded by a [`Semaphore`].

use std::cell::RefCell;
use std::io;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use button_http::protocol::SendError;
use button_http::transport::Transport;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, info, warn};
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::util::TryInitError;

use crate::config::ServerConfig;
use crate::request::ConnectionId;
use crate::server::HttpServer;

const READ_BUFFER_SIZE: usize = 1536;

/// Installs the global `fmt` subscriber used by binaries.
pub fn init_tracing(level: Level) -> Result<(), TryInitError> {
    use tracing_subscriber::util::SubscriberInitExt;
    FmtSubscriber::builder().with_max_level(level).finish().try_init()
}

/// A [`Transport`] that queues sends for the connection's writer task.
#[derive(Debug)]
pub struct TokioTransport {
    queue: mpsc::UnboundedSender<Bytes>,
    cancel: CancellationToken,
}

impl TokioTransport {
    pub fn new(queue: mpsc::UnboundedSender<Bytes>, cancel: CancellationToken) -> Self {
        Self { queue, cancel }
    }
}

impl Transport for TokioTransport {
    fn send(&mut self, data: &[u8]) -> Result<(), SendError> {
        if self.cancel.is_cancelled() {
            return Err(SendError::io(io::ErrorKind::NotConnected));
        }
        self.queue
            .send(Bytes::copy_from_slice(data))
            .map_err(|e| SendError::io(io::Error::new(io::ErrorKind::BrokenPipe, e.to_string())))
    }

    fn disconnect(&mut self) {
        self.cancel.cancel();
    }
}

/// Accepts connections forever. Must run inside a [`tokio::task::LocalSet`].
pub async fn serve(server: Rc<RefCell<HttpServer>>, config: &ServerConfig) -> io::Result<()> {
    let listener = TcpListener::bind(config.listen).await?;
    info!(address = %config.listen, max_connections = config.max_connections, "listening");

    let permits = Arc::new(Semaphore::new(config.max_connections));
    loop {
        let permit = Arc::clone(&permits).acquire_owned().await.map_err(io::Error::other)?;
        let (stream, remote) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(cause = %e, "failed to accept");
                continue;
            }
        };
        debug!(%remote, "tcp connection accepted");
        tokio::task::spawn_local(serve_connection(Rc::clone(&server), stream, config.idle_timeout(), permit));
    }
}

async fn serve_connection(
    server: Rc<RefCell<HttpServer>>,
    stream: TcpStream,
    idle_timeout: Duration,
    _permit: OwnedSemaphorePermit,
) {
    let (queue, outbound) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let id = server.borrow_mut().accept(Box::new(TokioTransport::new(queue, cancel.clone())));

    let (reader, writer) = stream.into_split();
    tokio::join!(
        read_loop(&server, id, reader, idle_timeout, &cancel),
        write_loop(&server, id, writer, outbound, &cancel)
    );

    server.borrow_mut().on_disconnect(id);
}

async fn read_loop(
    server: &RefCell<HttpServer>,
    id: ConnectionId,
    mut reader: OwnedReadHalf,
    idle_timeout: Duration,
    cancel: &CancellationToken,
) {
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    loop {
        let read = tokio::select! {
            () = cancel.cancelled() => break,
            read = timeout(idle_timeout, reader.read(&mut buf)) => read,
        };
        match read {
            Ok(Ok(0)) => {
                debug!(connection = %id, "peer closed");
                break;
            }
            Ok(Ok(n)) => server.borrow_mut().on_receive(id, &buf[..n]),
            Ok(Err(e)) => {
                warn!(connection = %id, cause = %e, "read failed");
                break;
            }
            Err(_elapsed) => {
                info!(connection = %id, "idle timeout");
                break;
            }
        }
    }
    cancel.cancel();
}

async fn write_loop(
    server: &RefCell<HttpServer>,
    id: ConnectionId,
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<Bytes>,
    cancel: &CancellationToken,
) {
    loop {
        let data = tokio::select! {
            biased;
            data = outbound.recv() => data,
            () = cancel.cancelled() => None,
        };
        let Some(data) = data else {
            break;
        };
        if let Err(e) = writer.write_all(&data).await {
            warn!(connection = %id, cause = %e, "write failed");
            break;
        }
        server.borrow_mut().on_sent(id);
    }
    if let Err(e) = writer.shutdown().await {
        debug!(connection = %id, cause = %e, "shutdown failed");
    }
    cancel.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_queues_sends() {
        let (queue, mut outbound) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let mut transport = TokioTransport::new(queue, cancel.clone());

        transport.send(b"HTTP/1.1 200 OK\r\n").unwrap();
        assert_eq!(outbound.try_recv().unwrap(), Bytes::from_static(b"HTTP/1.1 200 OK\r\n"));

        transport.disconnect();
        assert!(cancel.is_cancelled());
        assert!(matches!(transport.send(b"late"), Err(SendError::Io { .. })));
    }

    #[test]
    fn closed_queue_is_a_send_error() {
        let (queue, outbound) = mpsc::unbounded_channel();
        drop(outbound);
        let mut transport = TokioTransport::new(queue, CancellationToken::new());
        assert!(matches!(transport.send(b"x"), Err(SendError::Io { .. })));
    }
}
