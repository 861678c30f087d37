//! End-to-end tests for the darkseed DNS server.
//!
//! Run with: cargo test --test dns_test

use darkseed::addr::{Address, NetworkType, emit_i2p, emit_onion_v3};
use darkseed::dns::wire::{Message, Rcode, Rdata, RecordType};
use darkseed::dns::{DnsServer, SeedHandler, UDP_SIZE_LIMIT, aaaa};
use darkseed::nodes::{MAINNET_PORT, Node, NodeManager, SEED_SERVICES};
use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};

const ZONE: &str = "dnsseed.21.ninja.";

fn test_nodes() -> Vec<Node> {
    let mut nodes = Vec::new();
    for i in 1..=30u8 {
        nodes.push(Node::new(
            Address::Ipv4(Ipv4Addr::new(203, 0, 113, i)),
            MAINNET_PORT,
            SEED_SERVICES,
        ));
    }
    for i in 1..=20u16 {
        nodes.push(Node::new(
            format!("2001:db8:85a3::{i:x}").parse().unwrap(),
            MAINNET_PORT,
            SEED_SERVICES,
        ));
    }
    for i in 1..=10u8 {
        nodes.push(Node::new(Address::OnionV3([i; 32]), MAINNET_PORT, SEED_SERVICES));
        nodes.push(Node::new(Address::I2p([0x40 | i; 32]), 0, SEED_SERVICES));
        nodes.push(Node::new(
            format!("fc32:17ea::{i:x}").parse().unwrap(),
            MAINNET_PORT,
            SEED_SERVICES,
        ));
    }
    nodes
}

/// Spin up a server on ephemeral ports with a populated pool.
async fn start_server() -> (SocketAddr, SocketAddr, NodeManager) {
    let manager = NodeManager::new(PathBuf::from("/nonexistent"), Duration::from_secs(600));
    manager.publish(test_nodes());

    let handler = SeedHandler::new(ZONE, 60, manager.clone());
    let server = DnsServer::bind("127.0.0.1:0".parse().unwrap(), handler)
        .await
        .unwrap();
    let udp_addr = server.udp_addr().unwrap();
    let tcp_addr = server.tcp_addr().unwrap();
    tokio::spawn(server.run());
    (udp_addr, tcp_addr, manager)
}

async fn query_udp(server: SocketAddr, name: &str, rtype: RecordType) -> Option<Message> {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let query = Message::query(0x2121, name, rtype);
    socket
        .send_to(&query.to_bytes().unwrap(), server)
        .await
        .unwrap();

    let mut buf = [0u8; 2048];
    let received = tokio::time::timeout(Duration::from_secs(2), socket.recv(&mut buf)).await;
    match received {
        Ok(Ok(len)) => {
            assert!(len <= UDP_SIZE_LIMIT, "UDP reply of {len} bytes exceeds limit");
            Some(Message::from_bytes(&buf[..len]).unwrap())
        }
        _ => None,
    }
}

async fn query_tcp(server: SocketAddr, name: &str, rtype: RecordType) -> Message {
    let mut stream = TcpStream::connect(server).await.unwrap();
    let wire = Message::query(0x2222, name, rtype).to_bytes().unwrap();
    stream
        .write_all(&(wire.len() as u16).to_be_bytes())
        .await
        .unwrap();
    stream.write_all(&wire).await.unwrap();

    let mut len_buf = [0u8; 2];
    stream.read_exact(&mut len_buf).await.unwrap();
    let len = u16::from_be_bytes(len_buf) as usize;
    let mut data = vec![0u8; len];
    stream.read_exact(&mut data).await.unwrap();
    Message::from_bytes(&data).unwrap()
}

#[tokio::test]
async fn test_udp_apex_any() {
    let (udp, _, _) = start_server().await;
    let reply = query_udp(udp, ZONE, RecordType::Any).await.unwrap();

    assert_eq!(reply.flags.rcode, Rcode::NoError);
    assert!(reply.flags.qr);
    assert!(reply.flags.aa);

    let a_count = reply
        .answers
        .iter()
        .filter(|r| matches!(r.rdata, Rdata::A(_)))
        .count();
    let aaaa_count = reply
        .answers
        .iter()
        .filter(|r| matches!(r.rdata, Rdata::Aaaa(_)))
        .count();
    assert_eq!(a_count, 12);
    assert_eq!(aaaa_count, 10);

    // Addresses are drawn without replacement.
    let unique: HashSet<String> = reply
        .answers
        .iter()
        .map(|r| match &r.rdata {
            Rdata::A(ip) => ip.to_string(),
            Rdata::Aaaa(ip) => ip.to_string(),
            Rdata::Other(data) => hex::encode(data),
        })
        .collect();
    assert_eq!(unique.len(), reply.answers.len());
}

#[tokio::test]
async fn test_udp_n3_smuggled_onions() {
    let (udp, _, _) = start_server().await;
    let name = format!("n3.{ZONE}");
    let reply = query_udp(udp, &name, RecordType::Any).await.unwrap();

    assert!(!reply.answers.is_empty());
    assert!(reply.answers.iter().all(|r| match &r.rdata {
        Rdata::Aaaa(ip) => ip.octets()[0] == aaaa::SMUGGLE_PREFIX,
        _ => false,
    }));

    let decoded = aaaa::decode(&reply.answers).unwrap();
    assert_eq!(decoded.len(), 6);
    assert!(decoded.iter().all(|a| a.network() == NetworkType::OnionV3));
}

#[tokio::test]
async fn test_udp_out_of_zone_is_silent() {
    let (udp, _, _) = start_server().await;
    assert!(query_udp(udp, "example.org.", RecordType::A).await.is_none());
}

#[tokio::test]
async fn test_udp_unknown_label_empty_noerror() {
    let (udp, _, _) = start_server().await;
    let name = format!("other.{ZONE}");
    let reply = query_udp(udp, &name, RecordType::Any).await.unwrap();
    assert_eq!(reply.flags.rcode, Rcode::NoError);
    assert!(reply.answers.is_empty());
}

#[tokio::test]
async fn test_udp_unsupported_qtype_refused() {
    let (udp, _, _) = start_server().await;
    // TXT query
    let reply = query_udp(udp, ZONE, RecordType::Other(16)).await.unwrap();
    assert_eq!(reply.flags.rcode, Rcode::Refused);
    assert!(reply.answers.is_empty());
}

#[tokio::test]
async fn test_tcp_query_with_framing() {
    let (_, tcp, _) = start_server().await;
    let name = format!("n5.{ZONE}");
    let reply = query_tcp(tcp, &name, RecordType::Aaaa).await;

    let decoded = aaaa::decode(&reply.answers).unwrap();
    assert_eq!(decoded.len(), 10); // pool holds 10 cjdns nodes, quota is 13
    assert!(decoded.iter().all(|a| a.network() == NetworkType::Cjdns));
}

#[tokio::test]
async fn test_tcp_bad_framing_closes_without_reply() {
    let (_, tcp, _) = start_server().await;
    let mut stream = TcpStream::connect(tcp).await.unwrap();

    // Declare 100 bytes but deliver only 5, then shut down the write side.
    stream.write_all(&100u16.to_be_bytes()).await.unwrap();
    stream.write_all(&[1, 2, 3, 4, 5]).await.unwrap();
    stream.shutdown().await.unwrap();

    // The server must close the connection without sending anything.
    let mut buf = [0u8; 16];
    let read = tokio::time::timeout(Duration::from_secs(2), stream.read(&mut buf))
        .await
        .expect("server left the connection open");
    assert_eq!(read.unwrap(), 0);
}

#[tokio::test]
async fn test_pool_swap_visible_to_running_server() {
    let (udp, _, manager) = start_server().await;

    let reply = query_udp(udp, ZONE, RecordType::A).await.unwrap();
    assert_eq!(reply.answers.len(), 29);

    // Replace the pool with a single node; the handler must observe the
    // new generation on the next request.
    manager.publish(vec![Node::new(
        Address::Ipv4(Ipv4Addr::new(198, 51, 100, 1)),
        MAINNET_PORT,
        SEED_SERVICES,
    )]);
    let reply = query_udp(udp, ZONE, RecordType::A).await.unwrap();
    assert_eq!(reply.answers.len(), 1);
    assert_eq!(
        reply.answers[0].rdata,
        Rdata::A(Ipv4Addr::new(198, 51, 100, 1))
    );
}

/// Smuggling round-trip across real textual addresses, independent of the
/// server: two onions and one i2p encode into exactly eight records.
#[test]
fn test_smuggling_roundtrip_vectors() {
    let addresses: Vec<Address> = vec![
        emit_onion_v3(&[0xaa; 32]).parse().unwrap(),
        emit_onion_v3(&[0xbb; 32]).parse().unwrap(),
        emit_i2p(&[0xcc; 32]).parse().unwrap(),
    ];
    let records = aaaa::encode(&addresses, ZONE, 60).unwrap();
    assert_eq!(records.len(), 8);

    let mut decoded: Vec<String> = aaaa::decode(&records)
        .unwrap()
        .iter()
        .map(Address::to_string)
        .collect();
    let mut expected: Vec<String> = addresses.iter().map(Address::to_string).collect();
    decoded.sort();
    expected.sort();
    assert_eq!(decoded, expected);
}
