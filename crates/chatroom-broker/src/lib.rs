//! Chat broker core: room registry, handshake dispatcher, datagram relay, reaper

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod handshake;
pub mod password;
pub mod reaper;
pub mod registry;
pub mod relay;
pub mod server;
pub mod token;

pub use error::BrokerError;
pub use registry::Registry;
pub use server::Broker;

pub type Result<T> = std::result::Result<T, BrokerError>;
