//! The per-connection handshake routine
//!
//! Reads one CREATE or JOIN request off a reliable connection, mutates the
//! registry, and writes back ACKNOWLEDGE then (on success) COMPLETE, before
//! reading the client's chosen datagram return port. The connection carries
//! nothing else; it is closed once this routine returns.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use chatroom_wire::header::{self, Header, HEADER_LEN};
use chatroom_wire::{Credentials, Operation, State, Status};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tracing::{debug, info, warn};

use crate::error::{HandshakeError, RegistryError};
use crate::registry::Registry;
use crate::relay;

const JOIN_SYSTEM_MESSAGE_FMT: &str = "{username} がチャットルームに参加しました";

/// Drive one accepted reliable connection to completion.
pub async fn handle_connection(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    registry: Arc<Registry>,
    datagram_socket: Arc<UdpSocket>,
    handshake_timeout: Duration,
    max_payload_size: u64,
) {
    match tokio::time::timeout(
        handshake_timeout,
        drive(
            &mut stream,
            peer_addr.ip(),
            &registry,
            &datagram_socket,
            max_payload_size,
        ),
    )
    .await
    {
        Ok(Ok(())) => {}
        Ok(Err(err)) => debug!(peer = %peer_addr, error = %err, "handshake failed"),
        Err(_) => {
            let err = HandshakeError::Timeout;
            warn!(peer = %peer_addr, error = %err, "handshake timed out");
        }
    }
}

async fn drive(
    stream: &mut TcpStream,
    peer_ip: IpAddr,
    registry: &Registry,
    datagram_socket: &UdpSocket,
    max_payload_size: u64,
) -> Result<(), HandshakeError> {
    let mut header_buf = [0u8; HEADER_LEN];
    stream.read_exact(&mut header_buf).await?;
    let header = Header::decode(&header_buf)?;
    if header.payload_size > max_payload_size {
        return Err(HandshakeError::PayloadTooLarge {
            declared: header.payload_size,
            max: max_payload_size,
        });
    }

    let mut body = vec![0u8; header.body_len()];
    stream.read_exact(&mut body).await?;
    let (room_name, payload) = header::split_body(&header, &body)?;
    let room_name = room_name.to_string();

    match (header.operation, header.state) {
        (Operation::CreateRoom, State::Request) => {
            handle_create(stream, &room_name, payload, peer_ip, registry).await
        }
        (Operation::JoinRoom, State::Request) => {
            handle_join(stream, &room_name, payload, peer_ip, registry, datagram_socket).await
        }
        (op, state) => Err(HandshakeError::UnexpectedState { op, state }),
    }
}

async fn handle_create(
    stream: &mut TcpStream,
    room_name: &str,
    payload: &[u8],
    peer_ip: IpAddr,
    registry: &Registry,
) -> Result<(), HandshakeError> {
    let creds = match Credentials::decode(payload) {
        Ok(c) => c,
        Err(_) => {
            send_acknowledge(stream, room_name, Operation::CreateRoom, Status::InvalidPassword)
                .await?;
            return Ok(());
        }
    };

    match registry.create_room(room_name, &creds.username, &creds.password, peer_ip) {
        Ok(issued_token) => {
            send_acknowledge(stream, room_name, Operation::CreateRoom, Status::Success).await?;
            send_complete(stream, room_name, Operation::CreateRoom, &issued_token).await?;
            info!(room = room_name, username = %creds.username, "room created");
            let port = read_return_port(stream).await?;
            registry.bind_return_port(&issued_token, port);
            Ok(())
        }
        Err(RegistryError::RoomExists(_)) => {
            send_acknowledge(stream, room_name, Operation::CreateRoom, Status::RoomExists).await
        }
        Err(_) => unreachable!("create_room only returns RoomExists"),
    }
}

async fn handle_join(
    stream: &mut TcpStream,
    room_name: &str,
    payload: &[u8],
    peer_ip: IpAddr,
    registry: &Registry,
    datagram_socket: &UdpSocket,
) -> Result<(), HandshakeError> {
    let creds = match Credentials::decode(payload) {
        Ok(c) => c,
        Err(_) => {
            send_acknowledge(stream, room_name, Operation::JoinRoom, Status::InvalidPassword)
                .await?;
            return Ok(());
        }
    };

    match registry.join_room(room_name, &creds.username, &creds.password, peer_ip) {
        Ok(issued_token) => {
            send_acknowledge(stream, room_name, Operation::JoinRoom, Status::Success).await?;
            send_complete(stream, room_name, Operation::JoinRoom, &issued_token).await?;
            info!(room = room_name, username = %creds.username, "member joined");

            let notice = JOIN_SYSTEM_MESSAGE_FMT.replace("{username}", &creds.username);
            notify_room(registry, datagram_socket, room_name, &notice).await;

            let port = read_return_port(stream).await?;
            registry.bind_return_port(&issued_token, port);
            Ok(())
        }
        Err(RegistryError::RoomNotFound(_)) => {
            send_acknowledge(stream, room_name, Operation::JoinRoom, Status::RoomNotFound).await
        }
        Err(RegistryError::InvalidPassword(_)) => {
            send_acknowledge(stream, room_name, Operation::JoinRoom, Status::InvalidPassword).await
        }
        Err(RegistryError::RoomExists(_)) => unreachable!("join_room never returns RoomExists"),
    }
}

async fn notify_room(registry: &Registry, socket: &UdpSocket, room_name: &str, message: &str) {
    let recipients = registry.bound_recipients(room_name);
    if !recipients.is_empty() {
        relay::broadcast(socket, &recipients, message).await;
    }
}

async fn read_return_port(stream: &mut TcpStream) -> Result<u16, HandshakeError> {
    let mut buf = [0u8; 2];
    stream.read_exact(&mut buf).await?;
    Ok(u16::from_be_bytes(buf))
}

async fn send_acknowledge(
    stream: &mut TcpStream,
    room_name: &str,
    operation: Operation,
    status: Status,
) -> Result<(), HandshakeError> {
    let frame = header::encode_acknowledge(room_name, operation, status.to_byte());
    stream.write_all(&frame).await?;
    Ok(())
}

async fn send_complete(
    stream: &mut TcpStream,
    room_name: &str,
    operation: Operation,
    token: &str,
) -> Result<(), HandshakeError> {
    let frame = header::encode_complete(room_name, operation, token);
    stream.write_all(&frame).await?;
    Ok(())
}
