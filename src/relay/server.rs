// Connection event loop: accept, serve one request, close

use crate::relay::error::{RelayError, Result};
use crate::relay::handler::Dispatcher;
use crate::relay::protocol::Response;
use crate::relay::storage::RelayStore;
use crate::relay::transport::{self, RawRequest};
use anyhow::Context;
use std::future::Future;
use std::net::SocketAddr;
use std::rc::Rc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket};
use tracing::Instrument;

/// Pending connections the kernel may queue before `accept`
pub const LISTEN_BACKLOG: u32 = 5;

/// The relay listener.
///
/// Runs on a single thread: every connection is a local task, and the
/// dispatcher (with its store) is shared through an `Rc`, so store calls
/// never overlap. Handlers do not yield between store calls, which keeps a
/// check-then-insert such as name registration atomic.
pub struct RelayServer<S> {
    listener: TcpListener,
    dispatcher: Rc<Dispatcher<S>>,
}

impl<S: RelayStore + 'static> RelayServer<S> {
    /// Bind and listen on `addr`. Must be called from within a Tokio runtime.
    pub fn bind(addr: SocketAddr, store: S) -> anyhow::Result<Self> {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .context("Failed to create listening socket")?;

        socket
            .set_reuseaddr(true)
            .context("Failed to set SO_REUSEADDR")?;
        socket
            .bind(addr)
            .with_context(|| format!("Failed to bind {}", addr))?;
        let listener = socket
            .listen(LISTEN_BACKLOG)
            .with_context(|| format!("Failed to listen on {}", addr))?;

        tracing::info!("Relay listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            dispatcher: Rc::new(Dispatcher::new(store)),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` resolves.
    ///
    /// Connections are spawned with `spawn_local`, so this must run inside a
    /// [`tokio::task::LocalSet`].
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            tracing::debug!("Accepted connection from {}", peer);
                            let dispatcher = self.dispatcher.clone();
                            let span = tracing::info_span!("conn", %peer);
                            tokio::task::spawn_local(
                                async move {
                                    let mut stream = stream;
                                    if let Err(e) = serve_connection(&mut stream, &*dispatcher).await {
                                        tracing::warn!("Request aborted: {}", e);
                                    }
                                    if let Err(e) = stream.shutdown().await {
                                        tracing::trace!("Shutdown after response failed: {}", e);
                                    }
                                }
                                .instrument(span),
                            );
                        }
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                        }
                    }
                }
                _ = &mut shutdown => {
                    tracing::info!("Listener shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Serve exactly one request on `stream`.
///
/// Walks AwaitHeader → AwaitPayload → Dispatch → Respond. Protocol and store
/// failures are answered with the generic error response; transport failures
/// abort without a response and are returned to the caller.
pub async fn serve_connection<S, T>(stream: &mut T, dispatcher: &Dispatcher<S>) -> Result<()>
where
    S: RelayStore,
    T: AsyncRead + AsyncWrite + Unpin,
{
    let (header, partial) = match transport::read_header(stream).await {
        Ok(Some(parsed)) => parsed,
        Ok(None) => {
            tracing::debug!("Peer closed without sending a request");
            return Ok(());
        }
        Err(RelayError::Protocol(e)) => {
            tracing::warn!("Failed to parse request header: {}", e);
            respond(stream, &Response::error()).await?;
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    tracing::debug!(
        "Request header: client={} version={} code={} payload={}",
        header.client_id,
        header.version,
        header.code,
        header.payload_size
    );
    dispatcher.touch(&header);

    let payload = match transport::read_payload(stream, &header, partial).await {
        Ok(payload) => payload,
        Err(RelayError::Protocol(e)) => {
            tracing::warn!("Rejected request payload: {}", e);
            respond(stream, &Response::error()).await?;
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    let outcome = dispatcher.handle(&RawRequest { header, payload });

    let delivered = respond(stream, &outcome.response).await?;
    if delivered && !outcome.delivered.is_empty() {
        let removed = dispatcher.acknowledge(&outcome.delivered);
        tracing::debug!(
            "Removed {} of {} delivered messages",
            removed,
            outcome.delivered.len()
        );
    }

    Ok(())
}

/// Write `response`, falling back to the generic error if it cannot be
/// encoded. Returns whether `response` itself went out.
async fn respond<T>(stream: &mut T, response: &Response) -> Result<bool>
where
    T: AsyncWrite + Unpin,
{
    match transport::write_response(stream, response).await {
        Ok(()) => Ok(true),
        Err(RelayError::Protocol(e)) => {
            tracing::warn!("Response could not be encoded: {}", e);
            transport::write_response(stream, &Response::error()).await?;
            Ok(false)
        }
        Err(e) => Err(e),
    }
}
