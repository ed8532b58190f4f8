//! Connection handler module
//!
//! Handles the lifecycle of viewer connections:
//! - Session creation with a bounded outbound queue
//! - Writer task that frames queued packets onto the socket
//! - Stage join on connect, leave on disconnect
//! - Draining (and ignoring) inbound bytes until the peer closes
//!
//! No handshake or login is performed: an accepted stream is a viewer.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::game::viewer::ViewerDirectory;
use crate::net::session::{Session, SessionState};
use crate::net::transport::FrameWriter;
use crate::AppState;

/// Inbound read buffer size
const READ_BUFFER_SIZE: usize = 4096;

/// Connection handler for processing viewer connections
pub struct ConnectionHandler {
    /// Shared application state
    state: Arc<AppState>,
}

impl ConnectionHandler {
    /// Create a new connection handler
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Handle a TCP connection
    pub async fn handle_tcp(&self, stream: TcpStream, addr: SocketAddr) -> Result<()> {
        debug!(address = %addr, "Handling TCP connection");

        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();

        self.handle_connection(reader, writer, addr).await
    }

    /// Run a connection over any split stream until the peer disconnects
    pub async fn handle_connection<R, W>(
        &self,
        reader: R,
        writer: W,
        addr: SocketAddr,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        // Subscribe before joining the stage
        let shutdown_rx = self.state.shutdown_tx.subscribe();
        let (outbound_tx, outbound_rx) =
            mpsc::channel(self.state.config.outbound_queue_capacity);
        let session = self
            .state
            .session_manager
            .create_session_with_channel(addr, outbound_tx)?;

        let writer_task = tokio::spawn(FrameWriter::new(writer).run(outbound_rx));

        let viewer = self.state.session_manager.viewer_id_of(session.id);
        session.set_state(SessionState::Viewing);
        self.state.stage.on_viewer_join(viewer);

        debug!(
            session_id = session.id,
            address = %session.address,
            "Starting connection handler"
        );

        let result = self.read_until_closed(reader, shutdown_rx, &session).await;

        // Cleanup
        session.set_state(SessionState::Disconnecting);
        self.state.stage.on_viewer_leave(viewer);
        self.state.session_manager.remove(session.id);
        let session_id = session.id;
        // Last handle to the session; dropping it closes the outbound queue
        drop(session);

        match writer_task.await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => debug!(session_id = session_id, error = %e, "Writer ended with error"),
            Err(e) => warn!(session_id = session_id, error = %e, "Writer task failed"),
        }

        debug!(session_id = session_id, "Connection handler ending");
        result
    }

    /// Discard inbound bytes until EOF or shutdown
    async fn read_until_closed<R>(
        &self,
        mut reader: R,
        mut shutdown_rx: broadcast::Receiver<()>,
        session: &Session,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];

        loop {
            tokio::select! {
                read = reader.read(&mut buf) => {
                    let n = read?;
                    if n == 0 {
                        debug!(session_id = session.id, "Peer closed connection");
                        return Ok(());
                    }
                    session.touch();
                    trace!(session_id = session.id, bytes = n, "Ignoring inbound data");
                }
                _ = shutdown_rx.recv() => {
                    debug!(session_id = session.id, "Closing connection for shutdown");
                    return Ok(());
                }
            }
        }
    }
}
