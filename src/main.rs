//! Phantom Server
//!
//! Accepts viewer connections and shows them a status hologram and a waving
//! mannequin made entirely of packet-only armor stands.

use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use phantom_server::config::ServerConfig;
use phantom_server::game::showcase::Showcase;
use phantom_server::net::handler::ConnectionHandler;
use phantom_server::state::AppState;
use phantom_server::VERSION;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration before logging so the subscriber can honor it
    let config = ServerConfig::load().await?;

    // Initialize logging
    init_logging(&config);

    info!("Phantom Server v{}", VERSION);
    info!(
        "Configuration loaded from: {}",
        config.config_path.display()
    );
    info!("Client protocol: {}", config.protocol_version);

    // Create shutdown channel
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let state = Arc::new(AppState::new(config.clone(), shutdown_tx.clone())?);
    info!("Application state initialized");

    // Demo content, then the stage tick
    let showcase = Showcase::install(&state.stage)?;
    let stage = state.stage.clone();
    let mut stage_shutdown_rx = shutdown_tx.subscribe();
    let stage_handle = tokio::spawn(async move {
        stage
            .run(&mut stage_shutdown_rx, |stage, tick| {
                showcase.on_tick(stage, tick)
            })
            .await;
    });

    // Start TCP listener for viewer connections
    let addr = config.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    info!("Listening for viewers on: {}", addr);

    let accept_state = state.clone();
    let mut accept_shutdown_rx = shutdown_tx.subscribe();
    let accept_handle = tokio::spawn(async move {
        accept_connections(listener, accept_state, &mut accept_shutdown_rx).await;
    });

    info!("Server startup complete!");

    // Wait for shutdown signal
    wait_for_shutdown(shutdown_tx.clone()).await;

    info!("Shutting down server...");

    // Wait for tasks to finish
    let _ = accept_handle.await;
    let _ = stage_handle.await;

    // Cleanup
    state.session_manager.disconnect_all();
    info!("All sessions disconnected");

    info!("Server shutdown complete. Goodbye!");
    Ok(())
}

/// Initialize the logging/tracing system
fn init_logging(config: &ServerConfig) {
    let default_directive = if config.debug {
        "debug"
    } else {
        "info,phantom_server=debug"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_level(true);

    if config.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Accept incoming viewer (TCP) connections
async fn accept_connections(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown_rx: &mut broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        info!("New viewer connection from: {}", addr);
                        let handler = ConnectionHandler::new(state.clone());
                        tokio::spawn(async move {
                            if let Err(e) = handler.handle_tcp(stream, addr).await {
                                warn!("Viewer connection error from {}: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept viewer connection: {}", e);
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Connection acceptor shutting down");
                break;
            }
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn wait_for_shutdown(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    // Signal all tasks to shut down
    let _ = shutdown_tx.send(());
}
