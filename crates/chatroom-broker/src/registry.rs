//! The room registry: the broker's single source of truth for rooms,
//! memberships, and per-token liveness.
//!
//! Three maps, always acquired in the order rooms -> membership -> liveness
//! when more than one is held at once. `DashMap` gives each map its own
//! per-shard locking, so this is closer to "three independent tables" than
//! "one big lock", but the acquisition order still matters whenever a single
//! operation touches more than one of them.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::error::RegistryError;
use crate::{password, token};

/// A member's known network identity: the IP observed at token issuance,
/// and the datagram return port it registered after COMPLETE (absent until
/// the client reports it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Member {
    pub ip: IpAddr,
    pub port: Option<u16>,
}

/// A single chat room
pub struct Room {
    pub host_token: String,
    pub password_verifier: Option<String>,
    pub members: HashMap<String, Member>,
}

struct Membership {
    room_name: String,
    username: String,
}

/// Outcome of one reaper sweep over one room, for the caller to act on
/// (send farewell datagrams) without holding any registry lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReapAction {
    /// The host went idle; the whole room was closed
    RoomClosed { recipients: Vec<(IpAddr, u16)> },
    /// One or more non-host members went idle and were evicted
    MembersEvicted { recipients: Vec<(IpAddr, u16)> },
}

/// The concurrent room/membership/liveness store
pub struct Registry {
    rooms: DashMap<String, Room>,
    membership: DashMap<String, Membership>,
    liveness: DashMap<String, Instant>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            membership: DashMap::new(),
            liveness: DashMap::new(),
        }
    }

    /// Create a room and issue the host its token.
    pub fn create_room(
        &self,
        name: &str,
        username: &str,
        password: &str,
        addr: IpAddr,
    ) -> Result<String, RegistryError> {
        use dashmap::mapref::entry::Entry;

        let issued_token = token::generate();
        match self.rooms.entry(name.to_string()) {
            Entry::Occupied(_) => return Err(RegistryError::RoomExists(name.to_string())),
            Entry::Vacant(entry) => {
                let mut members = HashMap::new();
                members.insert(
                    issued_token.clone(),
                    Member {
                        ip: addr,
                        port: None,
                    },
                );
                entry.insert(Room {
                    host_token: issued_token.clone(),
                    password_verifier: password::make_verifier(password),
                    members,
                });
            }
        }

        self.membership.insert(
            issued_token.clone(),
            Membership {
                room_name: name.to_string(),
                username: username.to_string(),
            },
        );
        self.liveness.insert(issued_token.clone(), Instant::now());
        Ok(issued_token)
    }

    /// Join an existing room after checking its password verifier.
    pub fn join_room(
        &self,
        name: &str,
        username: &str,
        password: &str,
        addr: IpAddr,
    ) -> Result<String, RegistryError> {
        let issued_token = token::generate();
        {
            let mut room = self
                .rooms
                .get_mut(name)
                .ok_or_else(|| RegistryError::RoomNotFound(name.to_string()))?;
            if !password::verify(password, room.password_verifier.as_deref()) {
                return Err(RegistryError::InvalidPassword(name.to_string()));
            }
            room.members.insert(
                issued_token.clone(),
                Member {
                    ip: addr,
                    port: None,
                },
            );
        }

        self.membership.insert(
            issued_token.clone(),
            Membership {
                room_name: name.to_string(),
                username: username.to_string(),
            },
        );
        self.liveness.insert(issued_token.clone(), Instant::now());
        Ok(issued_token)
    }

    /// Record the datagram return port a client reports after COMPLETE.
    pub fn bind_return_port(&self, issued_token: &str, port: u16) {
        let Some(membership) = self.membership.get(issued_token) else {
            return;
        };
        if let Some(mut room) = self.rooms.get_mut(&membership.room_name) {
            if let Some(member) = room.members.get_mut(issued_token) {
                member.port = Some(port);
            }
        }
    }

    /// Authenticate a datagram by `(room, token, source ip)` and, on success,
    /// return the sender's username and the return addresses of every other
    /// current member. Touches the token's liveness timestamp.
    pub fn lookup_for_datagram(
        &self,
        room_name: &str,
        issued_token: &str,
        source_ip: IpAddr,
    ) -> Option<(String, Vec<(IpAddr, u16)>)> {
        let (username, recipients) = {
            let room = self.rooms.get(room_name)?;
            let member = room.members.get(issued_token)?;
            if member.ip != source_ip {
                return None;
            }
            let membership = self.membership.get(issued_token)?;
            if membership.room_name != room_name {
                return None;
            }
            let recipients: Vec<(IpAddr, u16)> = room
                .members
                .iter()
                .filter(|(t, _)| t.as_str() != issued_token)
                .filter_map(|(_, m)| m.port.map(|p| (m.ip, p)))
                .collect();
            (membership.username.clone(), recipients)
        };

        self.liveness.insert(issued_token.to_string(), Instant::now());
        Some((username, recipients))
    }

    /// The return addresses of every current member of a room who has
    /// registered a datagram port. Used for system-message broadcasts that
    /// are not triggered by an authenticated datagram (e.g. the join notice).
    pub fn bound_recipients(&self, room_name: &str) -> Vec<(IpAddr, u16)> {
        self.rooms
            .get(room_name)
            .map(|room| {
                room.members
                    .values()
                    .filter_map(|m| m.port.map(|p| (m.ip, p)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether `issued_token` is the host of `room_name`. Used to gate the
    /// `/exit` room-close path to the host alone.
    pub fn is_host(&self, room_name: &str, issued_token: &str) -> bool {
        self.rooms
            .get(room_name)
            .map(|room| room.host_token == issued_token)
            .unwrap_or(false)
    }

    /// Remove a room and every token it contained. Returns the return
    /// addresses of members who had registered a port, for a farewell
    /// broadcast. Idempotent: a second call on a removed room returns empty.
    pub fn close_room(&self, name: &str) -> Vec<(IpAddr, u16)> {
        let Some((_, room)) = self.rooms.remove(name) else {
            return Vec::new();
        };
        let recipients: Vec<(IpAddr, u16)> = room
            .members
            .values()
            .filter_map(|m| m.port.map(|p| (m.ip, p)))
            .collect();
        for member_token in room.members.keys() {
            self.membership.remove(member_token);
            self.liveness.remove(member_token);
        }
        recipients
    }

    /// One reaper sweep: close rooms whose host has gone idle past `timeout`,
    /// and evict individually idle non-host members of the rest.
    pub fn reap(&self, timeout: Duration) -> Vec<ReapAction> {
        let now = Instant::now();
        let mut actions = Vec::new();

        let room_names: Vec<String> = self.rooms.iter().map(|entry| entry.key().clone()).collect();
        for name in room_names {
            let Some(host_token) = self.rooms.get(&name).map(|r| r.host_token.clone()) else {
                continue;
            };
            let host_idle = self
                .liveness
                .get(&host_token)
                .map(|ts| now.duration_since(*ts))
                .unwrap_or(Duration::MAX);

            if host_idle > timeout {
                let recipients = self.close_room(&name);
                actions.push(ReapAction::RoomClosed { recipients });
                continue;
            }

            let stale: Vec<String> = match self.rooms.get(&name) {
                Some(room) => room
                    .members
                    .keys()
                    .filter(|member_token| **member_token != host_token)
                    .filter(|member_token| {
                        let idle = self
                            .liveness
                            .get(*member_token)
                            .map(|ts| now.duration_since(*ts))
                            .unwrap_or(Duration::MAX);
                        idle > timeout
                    })
                    .cloned()
                    .collect(),
                None => continue,
            };
            if stale.is_empty() {
                continue;
            }

            let mut recipients = Vec::new();
            if let Some(mut room) = self.rooms.get_mut(&name) {
                for member_token in &stale {
                    if let Some(member) = room.members.remove(member_token) {
                        if let Some(port) = member.port {
                            recipients.push((member.ip, port));
                        }
                    }
                }
            }
            for member_token in &stale {
                self.membership.remove(member_token);
                self.liveness.remove(member_token);
            }
            actions.push(ReapAction::MembersEvicted { recipients });
        }

        actions
    }

    #[cfg(test)]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn addr(n: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(127, 0, 0, n))
    }

    #[test]
    fn create_then_duplicate_create_fails() {
        let registry = Registry::new();
        registry
            .create_room("lobby", "alice", "", addr(1))
            .unwrap();
        let err = registry
            .create_room("lobby", "mallory", "", addr(2))
            .unwrap_err();
        assert_eq!(err, RegistryError::RoomExists("lobby".to_string()));
    }

    #[test]
    fn join_missing_room_fails() {
        let registry = Registry::new();
        let err = registry.join_room("ghost", "bob", "", addr(1)).unwrap_err();
        assert_eq!(err, RegistryError::RoomNotFound("ghost".to_string()));
    }

    #[test]
    fn join_wrong_password_fails() {
        let registry = Registry::new();
        registry
            .create_room("secret", "alice", "hunter2", addr(1))
            .unwrap();
        let err = registry
            .join_room("secret", "bob", "wrong", addr(2))
            .unwrap_err();
        assert_eq!(err, RegistryError::InvalidPassword("secret".to_string()));
    }

    #[test]
    fn join_correct_password_succeeds() {
        let registry = Registry::new();
        registry
            .create_room("secret", "alice", "hunter2", addr(1))
            .unwrap();
        registry
            .join_room("secret", "bob", "hunter2", addr(2))
            .unwrap();
        assert_eq!(registry.room_count(), 1);
    }

    #[test]
    fn datagram_rejected_until_port_bound() {
        let registry = Registry::new();
        let host_token = registry
            .create_room("lobby", "alice", "", addr(1))
            .unwrap();
        let bob_token = registry
            .join_room("lobby", "bob", "", addr(2))
            .unwrap();

        // alice has no port yet, so bob's message reaches no one
        let (username, recipients) = registry
            .lookup_for_datagram("lobby", &bob_token, addr(2))
            .unwrap();
        assert_eq!(username, "bob");
        assert!(recipients.is_empty());

        registry.bind_return_port(&host_token, 40001);
        let (_, recipients) = registry
            .lookup_for_datagram("lobby", &bob_token, addr(2))
            .unwrap();
        assert_eq!(recipients, vec![(addr(1), 40001)]);
    }

    #[test]
    fn datagram_from_wrong_ip_is_rejected() {
        let registry = Registry::new();
        let token = registry
            .create_room("lobby", "alice", "", addr(1))
            .unwrap();
        assert!(registry
            .lookup_for_datagram("lobby", &token, addr(9))
            .is_none());
    }

    #[test]
    fn close_room_removes_all_tokens() {
        let registry = Registry::new();
        let host_token = registry
            .create_room("lobby", "alice", "", addr(1))
            .unwrap();
        registry.bind_return_port(&host_token, 1000);
        let bob_token = registry.join_room("lobby", "bob", "", addr(2)).unwrap();
        registry.bind_return_port(&bob_token, 2000);

        let recipients = registry.close_room("lobby");
        assert_eq!(recipients.len(), 2);
        assert_eq!(registry.room_count(), 0);
        assert!(registry
            .lookup_for_datagram("lobby", &host_token, addr(1))
            .is_none());

        // idempotent
        assert!(registry.close_room("lobby").is_empty());
    }

    #[test]
    fn reap_closes_room_with_idle_host() {
        let registry = Registry::new();
        let host_token = registry
            .create_room("lobby", "alice", "", addr(1))
            .unwrap();
        registry.bind_return_port(&host_token, 1000);

        // liveness was just set, so nothing is evicted yet
        assert!(registry.reap(Duration::from_secs(300)).is_empty());

        // a zero-duration timeout makes everything instantly "idle"
        let actions = registry.reap(Duration::from_secs(0));
        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], ReapAction::RoomClosed { .. }));
        assert_eq!(registry.room_count(), 0);
    }

    #[test]
    fn reap_evicts_only_idle_non_host_members() {
        let registry = Registry::new();
        let host_token = registry
            .create_room("lobby", "alice", "", addr(1))
            .unwrap();
        registry.bind_return_port(&host_token, 1000);
        let bob_token = registry.join_room("lobby", "bob", "", addr(2)).unwrap();
        registry.bind_return_port(&bob_token, 2000);

        let timeout = Duration::from_millis(20);
        std::thread::sleep(Duration::from_millis(40));

        // touch the host so its liveness stays within `timeout` while bob's
        // does not; bob is the only one who should be evicted
        registry
            .lookup_for_datagram("lobby", &host_token, addr(1))
            .unwrap();

        let actions = registry.reap(timeout);
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            ReapAction::MembersEvicted { recipients } => {
                assert_eq!(recipients, &vec![(addr(2), 2000)]);
            }
            other => panic!("expected MembersEvicted, got {other:?}"),
        }
        assert_eq!(registry.room_count(), 1);
    }
}
