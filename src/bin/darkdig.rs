//! darkdig — dig-style diagnostic client for darkseed servers.
//!
//! Sends a single UDP query and pretty-prints the reply. AAAA records
//! inside the reserved `fc00::/8` smuggling prefix are reassembled and
//! decoded back into their darknet addresses.
//!
//! Usage:
//!   darkdig --nameserver 127.0.0.1 --port 8053 --qtype ANY n3.dnsseed.acme.com

use clap::Parser;
use darkseed::dns::aaaa;
use darkseed::dns::wire::{Message, Rdata, RecordType};
use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::process::ExitCode;
use std::time::{Duration, Instant};

/// darkdig version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "darkdig", version, about = "Query a darkseed DNS server")]
struct Args {
    /// Domain to query
    domain: String,

    /// Nameserver to query
    #[arg(short, long, default_value = "127.0.0.1")]
    nameserver: IpAddr,

    /// Nameserver port
    #[arg(short, long, default_value = "53")]
    port: u16,

    /// Query type: A, AAAA or ANY
    #[arg(short, long, default_value = "ANY")]
    qtype: String,

    /// Receive timeout in seconds
    #[arg(long, default_value = "5")]
    timeout: u64,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let qtype = match args.qtype.to_ascii_uppercase().as_str() {
        "A" => RecordType::A,
        "AAAA" => RecordType::Aaaa,
        "ANY" => RecordType::Any,
        other => {
            eprintln!("Unsupported query type: {other} (use A, AAAA or ANY)");
            return ExitCode::FAILURE;
        }
    };

    println!(
        "; <<>> darkdig {VERSION} <<>> @{} -p {} {}",
        args.nameserver, args.port, args.domain
    );

    let start = Instant::now();
    let (response, size) = match lookup(&args, qtype) {
        Ok(response) => response,
        Err(e) => {
            eprintln!("Failed to retrieve DNS records: {e}");
            return ExitCode::FAILURE;
        }
    };
    let elapsed = start.elapsed();

    print_response(&response);

    println!(";; Query time: {} msec", elapsed.as_millis());
    println!(";; SERVER: {}#{}", args.nameserver, args.port);
    println!(";; MSG SIZE  rcvd: {size}");
    ExitCode::SUCCESS
}

fn lookup(args: &Args, qtype: RecordType) -> std::io::Result<(Message, usize)> {
    let query = Message::query(rand::random(), &args.domain, qtype);
    let wire = query
        .to_bytes()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    let socket = UdpSocket::bind(("0.0.0.0", 0))?;
    socket.set_read_timeout(Some(Duration::from_secs(args.timeout)))?;
    socket.send_to(&wire, SocketAddr::new(args.nameserver, args.port))?;

    let mut buf = [0u8; 4096];
    let len = socket.recv(&mut buf)?;
    let message = Message::from_bytes(&buf[..len])
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    Ok((message, len))
}

fn print_response(response: &Message) {
    let flags = &response.flags;
    println!(
        ";; ->>HEADER<<- opcode: {}, status: {}, id: {}",
        if flags.opcode == 0 { "QUERY".to_string() } else { format!("OPCODE{}", flags.opcode) },
        flags.rcode,
        response.id
    );
    let mut set_flags = Vec::new();
    for (bit, name) in [
        (flags.qr, "qr"),
        (flags.aa, "aa"),
        (flags.tc, "tc"),
        (flags.rd, "rd"),
        (flags.ra, "ra"),
    ] {
        if bit {
            set_flags.push(name);
        }
    }
    println!(
        ";; flags: {}; QUERY: {}, ANSWER: {}",
        set_flags.join(" "),
        response.questions.len(),
        response.answers.len()
    );
    println!();

    println!(";; QUESTION SECTION:");
    for question in &response.questions {
        println!(
            "; domain={}, rdclass={}, rdtype={}",
            question.name, question.rclass, question.rtype
        );
    }
    println!();

    println!(";; ANSWER SECTION:");
    let mut smuggled = Vec::new();
    for record in &response.answers {
        match &record.rdata {
            Rdata::A(ip) => {
                println!(
                    "domain={}, ttl={}, rdtype={}, data={}",
                    record.name, record.ttl, record.rtype, ip
                );
            }
            Rdata::Aaaa(ip) if ip.octets()[0] == aaaa::SMUGGLE_PREFIX => {
                println!(
                    "domain={}, ttl={}, rdtype={}, data={} (smuggled chunk {})",
                    record.name,
                    record.ttl,
                    record.rtype,
                    ip,
                    ip.octets()[1]
                );
                smuggled.push(record.clone());
            }
            Rdata::Aaaa(ip) => {
                println!(
                    "domain={}, ttl={}, rdtype={}, data={}",
                    record.name, record.ttl, record.rtype, ip
                );
            }
            Rdata::Other(data) => {
                println!(
                    "domain={}, ttl={}, rdtype={}, data=0x{}",
                    record.name,
                    record.ttl,
                    record.rtype,
                    hex::encode(data)
                );
            }
        }
    }
    println!();

    if !smuggled.is_empty() {
        let payload: Vec<u8> = {
            let mut chunks: Vec<(u8, [u8; 14])> = smuggled
                .iter()
                .filter_map(|r| match &r.rdata {
                    Rdata::Aaaa(ip) => {
                        let octets = ip.octets();
                        let mut chunk = [0u8; 14];
                        chunk.copy_from_slice(&octets[2..]);
                        Some((octets[1], chunk))
                    }
                    _ => None,
                })
                .collect();
            chunks.sort_by_key(|(index, _)| *index);
            chunks.iter().flat_map(|(_, chunk)| chunk.iter().copied()).collect()
        };
        println!(
            ";; ->>smuggled AAAA block<<- chunks: {}, payload (hex): {}",
            smuggled.len(),
            hex::encode(&payload)
        );
        match aaaa::decode(&smuggled) {
            Ok(addresses) => {
                for (pos, address) in addresses.iter().enumerate() {
                    println!(
                        ";; ->>smuggled address<<- record: {}, network: {}, address: {}",
                        pos,
                        address.network(),
                        address
                    );
                }
            }
            Err(e) => eprintln!(";; failed to decode smuggled addresses: {e}"),
        }
        println!();
    }
}
