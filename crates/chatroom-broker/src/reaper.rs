//! The periodic idle-eviction loop
//!
//! Wakes up every `reaper_period`, closes rooms whose host has gone silent
//! longer than `inactivity_timeout`, and evicts individually idle non-host
//! members of the rest, sending a farewell or eviction notice before each
//! removal.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::registry::{ReapAction, Registry};
use crate::relay;

const ROOM_CLOSED_MESSAGE: &str = "チャットルームが閉じられました";
const EVICTION_MESSAGE: &str = "しばらく発言しなかったので、チャットルームから退出させました";

/// Run the reaper loop, sleeping `period` between sweeps, until `shutdown` fires.
pub async fn run_reaper(
    registry: Arc<Registry>,
    socket: Arc<UdpSocket>,
    period: Duration,
    inactivity_timeout: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                sweep(&registry, &socket, inactivity_timeout).await;
            }
            _ = shutdown.changed() => {
                debug!("reaper loop draining on shutdown signal");
                return;
            }
        }
    }
}

async fn sweep(registry: &Registry, socket: &UdpSocket, inactivity_timeout: Duration) {
    let actions = registry.reap(inactivity_timeout);
    if actions.is_empty() {
        return;
    }
    info!(count = actions.len(), "reaper sweep evicted idle state");
    for action in actions {
        match action {
            ReapAction::RoomClosed { recipients } => {
                relay::broadcast(socket, &recipients, ROOM_CLOSED_MESSAGE).await;
            }
            ReapAction::MembersEvicted { recipients } => {
                relay::broadcast(socket, &recipients, EVICTION_MESSAGE).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    #[tokio::test]
    async fn sweep_closes_idle_host_room_and_notifies() {
        let registry = Registry::new();
        let host_token = registry
            .create_room("lobby", "alice", "", IpAddr::V4(Ipv4Addr::LOCALHOST))
            .unwrap();
        let relay_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let member_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        registry.bind_return_port(&host_token, member_socket.local_addr().unwrap().port());

        sweep(&registry, &relay_socket, Duration::from_secs(0)).await;

        let mut buf = [0u8; 128];
        let (len, _) = member_socket.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], ROOM_CLOSED_MESSAGE.as_bytes());
        assert_eq!(registry.room_count(), 0);
    }

    #[tokio::test]
    async fn sweep_is_silent_when_nothing_is_idle() {
        let registry = Registry::new();
        registry
            .create_room("lobby", "alice", "", IpAddr::V4(Ipv4Addr::LOCALHOST))
            .unwrap();
        let relay_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sweep(&registry, &relay_socket, Duration::from_secs(300)).await;
        assert_eq!(registry.room_count(), 1);
    }
}
