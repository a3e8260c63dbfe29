//! Process wiring: bind both sockets, spawn the relay and reaper, accept
//! reliable connections until shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, UdpSocket};
use tracing::{error, info, warn};

use crate::config::BrokerConfig;
use crate::error::BrokerError;
use crate::registry::Registry;
use crate::{handshake, reaper, relay};

/// How long `run` waits for the relay and reaper tasks to drain after a
/// shutdown signal before giving up on them.
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// The running broker: owns the registry and drives the acceptor, relay,
/// and reaper tasks until a shutdown signal arrives.
pub struct Broker {
    config: BrokerConfig,
    registry: Arc<Registry>,
}

impl Broker {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            registry: Arc::new(Registry::new()),
        }
    }

    /// Bind both sockets and run until SIGINT/SIGTERM.
    pub async fn run(self) -> Result<(), BrokerError> {
        let tcp_listener =
            TcpListener::bind(&self.config.tcp_addr)
                .await
                .map_err(|source| BrokerError::Bind {
                    addr: self.config.tcp_addr.clone(),
                    source,
                })?;
        let udp_socket = Arc::new(UdpSocket::bind(&self.config.udp_addr).await.map_err(
            |source| BrokerError::Bind {
                addr: self.config.udp_addr.clone(),
                source,
            },
        )?);

        info!(
            tcp_addr = %self.config.tcp_addr,
            udp_addr = %self.config.udp_addr,
            "broker listening"
        );

        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

        let relay_handle = tokio::spawn(relay::run_relay(
            Arc::clone(&udp_socket),
            Arc::clone(&self.registry),
            shutdown_rx.clone(),
        ));
        let reaper_handle = tokio::spawn(reaper::run_reaper(
            Arc::clone(&self.registry),
            Arc::clone(&udp_socket),
            Duration::from_secs(self.config.reaper_period_secs),
            Duration::from_secs(self.config.inactivity_timeout_secs),
            shutdown_rx,
        ));

        let handshake_timeout = Duration::from_secs(self.config.handshake_timeout_secs);
        let max_payload_size = self.config.max_payload_size;
        let accept_loop = async {
            loop {
                match tcp_listener.accept().await {
                    Ok((stream, peer_addr)) => {
                        let registry = Arc::clone(&self.registry);
                        let udp_socket = Arc::clone(&udp_socket);
                        tokio::spawn(handshake::handle_connection(
                            stream,
                            peer_addr,
                            registry,
                            udp_socket,
                            handshake_timeout,
                            max_payload_size,
                        ));
                    }
                    Err(err) => {
                        error!(error = %err, "failed to accept tcp connection");
                    }
                }
            }
        };

        tokio::select! {
            _ = accept_loop => {},
            _ = shutdown_signal() => {
                info!("shutdown signal received, stopping broker");
            }
        }

        // Signal the relay and reaper to drain and let in-flight handshake
        // tasks finish or hit their own timeout; give the long-lived tasks a
        // bounded grace period to exit cooperatively before moving on.
        let _ = shutdown_tx.send(true);
        let drain = async {
            let _ = relay_handle.await;
            let _ = reaper_handle.await;
        };
        if tokio::time::timeout(SHUTDOWN_GRACE_PERIOD, drain).await.is_err() {
            warn!("relay/reaper did not drain within the shutdown grace period");
        }

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install sigterm handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
