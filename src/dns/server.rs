// Darkseed — DNS Server
// Copyright (c) 2024-2026 The Darkseed developers
// Distributed under the MIT software license.

//! Concurrent UDP and TCP DNS listeners.
//!
//! Both listeners bind the same address and port and share one re-entrant
//! [`SeedHandler`]; each accepted request is processed to completion in its
//! own task. There are no per-request timeouts: UDP is fire-and-forget and
//! TCP connections are closed on framing errors.

use crate::dns::handler::SeedHandler;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tracing::{debug, info, warn};

/// Maximum UDP reply size. The handler's quotas keep replies under this;
/// exceeding it is a quota bug, not a runtime condition.
pub const UDP_SIZE_LIMIT: usize = 512;

/// Maximum TCP reply size, bounded by the two-byte length prefix.
pub const TCP_SIZE_LIMIT: usize = 65535;

/// Receive buffer for a single UDP datagram. Queries are far smaller; the
/// headroom just avoids truncating garbage mid-parse.
const UDP_RECV_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Udp,
    Tcp,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Udp => f.write_str("UDP"),
            Transport::Tcp => f.write_str("TCP"),
        }
    }
}

/// Requesting peer, formatted for log lines as
/// `ip:port (ban=<netgroup>) [UDP|TCP]`.
#[derive(Debug, Clone, Copy)]
pub struct PeerInfo {
    addr: SocketAddr,
    transport: Transport,
}

impl PeerInfo {
    pub fn new(addr: SocketAddr, transport: Transport) -> Self {
        PeerInfo { addr, transport }
    }
}

impl fmt::Display for PeerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (ban={}) [{}]",
            self.addr,
            netgroup(self.addr.ip()),
            self.transport
        )
    }
}

/// Group an IP into the subnet a ban would cover: /16 for IPv4, /32 for
/// IPv6.
fn netgroup(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(ip) => {
            let octets = ip.octets();
            format!("{}.{}.0.0/16", octets[0], octets[1])
        }
        IpAddr::V6(ip) => {
            let segments = ip.segments();
            format!("{:x}:{:x}::/32", segments[0], segments[1])
        }
    }
}

/// DNS server holding both bound sockets.
pub struct DnsServer {
    udp: UdpSocket,
    tcp: TcpListener,
    handler: Arc<SeedHandler>,
}

impl DnsServer {
    /// Bind UDP and TCP listeners on `addr`.
    pub async fn bind(addr: SocketAddr, handler: SeedHandler) -> std::io::Result<Self> {
        let udp = UdpSocket::bind(addr).await?;
        let tcp = TcpListener::bind(addr).await?;
        info!("Started DNS server on {} [UDP]", udp.local_addr()?);
        info!("Started DNS server on {} [TCP]", tcp.local_addr()?);
        Ok(DnsServer { udp, tcp, handler: Arc::new(handler) })
    }

    /// Local address of the UDP socket (useful with port 0).
    pub fn udp_addr(&self) -> std::io::Result<SocketAddr> {
        self.udp.local_addr()
    }

    /// Local address of the TCP listener.
    pub fn tcp_addr(&self) -> std::io::Result<SocketAddr> {
        self.tcp.local_addr()
    }

    /// Serve both transports until an accept loop fails.
    pub async fn run(self) -> std::io::Result<()> {
        let DnsServer { udp, tcp, handler } = self;
        let udp_task = tokio::spawn(serve_udp(udp, handler.clone()));
        let tcp_task = tokio::spawn(serve_tcp(tcp, handler));
        tokio::select! {
            result = udp_task => result.unwrap_or_else(|e| Err(std::io::Error::other(e))),
            result = tcp_task => result.unwrap_or_else(|e| Err(std::io::Error::other(e))),
        }
    }
}

async fn serve_udp(socket: UdpSocket, handler: Arc<SeedHandler>) -> std::io::Result<()> {
    let socket = Arc::new(socket);
    let mut buf = vec![0u8; UDP_RECV_SIZE];
    loop {
        let (len, peer_addr) = socket.recv_from(&mut buf).await?;
        let data = buf[..len].to_vec();
        let socket = socket.clone();
        let handler = handler.clone();
        tokio::spawn(async move {
            let peer = PeerInfo::new(peer_addr, Transport::Udp);
            if let Some(reply) = handler.process(&data, &peer) {
                debug_assert!(
                    reply.len() <= UDP_SIZE_LIMIT,
                    "UDP reply of {} bytes exceeds {} (quota bug)",
                    reply.len(),
                    UDP_SIZE_LIMIT
                );
                if let Err(e) = socket.send_to(&reply, peer_addr).await {
                    warn!("Failed to send UDP reply to {}: {}", peer, e);
                }
            }
        });
    }
}

async fn serve_tcp(listener: TcpListener, handler: Arc<SeedHandler>) -> std::io::Result<()> {
    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let handler = handler.clone();
        tokio::spawn(async move {
            let peer = PeerInfo::new(peer_addr, Transport::Tcp);
            if let Err(e) = serve_tcp_request(stream, &peer, &handler).await {
                debug!("Closing TCP connection from {}: {}", peer, e);
            }
        });
    }
}

/// Handle one length-prefixed request on a TCP connection.
///
/// A declared length that the peer does not deliver surfaces as a short
/// read; the error return closes the connection without a reply.
async fn serve_tcp_request(
    mut stream: TcpStream,
    peer: &PeerInfo,
    handler: &SeedHandler,
) -> std::io::Result<()> {
    let mut len_buf = [0u8; 2];
    stream.read_exact(&mut len_buf).await?;
    let expected = u16::from_be_bytes(len_buf) as usize;
    let mut data = vec![0u8; expected];
    stream.read_exact(&mut data).await?;

    if let Some(reply) = handler.process(&data, peer) {
        debug_assert!(
            reply.len() <= TCP_SIZE_LIMIT,
            "TCP reply of {} bytes exceeds {}",
            reply.len(),
            TCP_SIZE_LIMIT
        );
        stream.write_all(&(reply.len() as u16).to_be_bytes()).await?;
        stream.write_all(&reply).await?;
    }
    Ok(())
}
