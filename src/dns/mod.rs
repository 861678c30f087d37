//! DNS layer: wire codec, smuggling encoder, request handling, listeners.

pub mod aaaa;
pub mod handler;
pub mod records;
pub mod server;
pub mod wire;

// Re-exports
pub use handler::SeedHandler;
pub use server::{DnsServer, PeerInfo, TCP_SIZE_LIMIT, Transport, UDP_SIZE_LIMIT};
pub use wire::{Message, Rcode, Record, RecordType};
