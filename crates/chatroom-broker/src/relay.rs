//! The datagram relay loop
//!
//! Receives UDP datagrams, authenticates each against the registry by
//! `(room, token, source ip)`, and fans the formatted message out to every
//! other current member. A host sending `/exit` closes its room after the
//! broadcast goes out.

use std::net::IpAddr;
use std::sync::Arc;

use chatroom_wire::Datagram;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::registry::Registry;

const ROOM_CLOSED_MESSAGE: &str = "チャットルームが閉じられました";
const EXIT_COMMAND: &str = "/exit";

/// Run the relay loop until the socket errors out or `shutdown` fires.
pub async fn run_relay(socket: Arc<UdpSocket>, registry: Arc<Registry>, mut shutdown: watch::Receiver<bool>) {
    let mut buf = vec![0u8; chatroom_wire::datagram::MAX_DATAGRAM_SIZE];
    loop {
        tokio::select! {
            result = socket.recv_from(&mut buf) => {
                let (len, source) = match result {
                    Ok(pair) => pair,
                    Err(err) => {
                        warn!(error = %err, "udp recv failed, relay loop exiting");
                        return;
                    }
                };

                let dgram = match Datagram::decode(&buf[..len]) {
                    Ok(d) => d,
                    Err(_) => continue,
                };

                handle_datagram(&socket, &registry, dgram, source.ip()).await;
            }
            _ = shutdown.changed() => {
                debug!("relay loop draining on shutdown signal");
                return;
            }
        }
    }
}

async fn handle_datagram(
    socket: &UdpSocket,
    registry: &Registry,
    dgram: Datagram,
    source_ip: IpAddr,
) {
    let Some((username, recipients)) =
        registry.lookup_for_datagram(&dgram.room_name, &dgram.token, source_ip)
    else {
        debug!(room = %dgram.room_name, "dropped unauthenticated datagram");
        return;
    };

    let formatted = format!("{username}: {}", dgram.message);
    broadcast(socket, &recipients, &formatted).await;

    let is_exit = dgram.message.trim().to_lowercase() == EXIT_COMMAND;
    if is_exit && registry.is_host(&dgram.room_name, &dgram.token) {
        let remaining = registry.close_room(&dgram.room_name);
        broadcast(socket, &remaining, ROOM_CLOSED_MESSAGE).await;
    }
}

/// Send one plain-text message datagram to each recipient. A send failure to
/// one recipient is logged and does not stop delivery to the others.
pub async fn broadcast(socket: &UdpSocket, recipients: &[(IpAddr, u16)], message: &str) {
    let bytes = Datagram::encode_plain_message(message);
    for &(ip, port) in recipients {
        if let Err(err) = socket.send_to(&bytes, (ip, port)).await {
            warn!(%ip, port, error = %err, "failed to deliver datagram to recipient");
        }
    }
}
