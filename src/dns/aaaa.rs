// Darkseed — AAAA Smuggling Codec
// Copyright (c) 2024-2026 The Darkseed developers
// Distributed under the MIT software license.

//! Darknet address transport inside ordinary AAAA records.
//!
//! Standard DNS record types only carry IPv4 and IPv6 addresses, so darknet
//! addresses are serialized with the BIP155-like encoding, concatenated,
//! prefixed with the address count and broken into 14-byte chunks. Each
//! chunk becomes the tail of a synthetic IPv6 address:
//!
//! ```text
//! byte 0      0xfc — reserved marker (fc00::/8)
//! byte 1      chunk index (0, 1, 2, ...)
//! bytes 2-15  payload chunk, zero-padded in the final record
//! ```
//!
//! Recursive resolvers may reorder records, so the index byte carries the
//! ordering and the encoder shuffles its output on purpose — clients must
//! not rely on answer position. Within a reply produced by this seeder,
//! every AAAA record inside `fc00::/8` is a smuggled chunk, never a native
//! cjdns address: smuggled blocks always start with the index-0 record
//! carrying the address count.

use crate::addr::{Address, AddressError, bip155};
use crate::dns::wire::{Rdata, Record};
use rand::seq::SliceRandom;
use std::collections::BTreeMap;
use std::net::Ipv6Addr;
use thiserror::Error;

/// Reserved first byte of every smuggled record (`fc00::/8`).
pub const SMUGGLE_PREFIX: u8 = 0xfc;

/// Payload bytes per record: 16-byte IPv6 address minus prefix and index.
pub const PAYLOAD_BYTES: usize = 14;

/// Maximum number of AAAA records per reply.
///
/// A 512-byte UDP reply leaves 470 bytes after the 12-byte header and a
/// ~30-byte question. Each AAAA record costs 28 bytes (2 each for name
/// pointer, type, class and rdlength, 4 for TTL, 16 of data), so
/// floor(470 / 28) = 16 records.
pub const RECORD_LIMIT: usize = 16;

/// Maximum total payload, count byte included.
pub const MAX_PAYLOAD: usize = RECORD_LIMIT * PAYLOAD_BYTES;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("no addresses to encode")]
    Empty,

    #[error("too many addresses: {0}")]
    TooManyAddresses(usize),

    #[error("payload of {0} bytes exceeds {MAX_PAYLOAD}-byte record budget")]
    Oversize(usize),

    #[error("missing chunk {expected}, found index {found}")]
    MissingChunk { expected: usize, found: usize },

    #[error(transparent)]
    Address(#[from] AddressError),
}

/// Encode darknet addresses into a shuffled set of AAAA records for `name`.
pub fn encode(addresses: &[Address], name: &str, ttl: u32) -> Result<Vec<Record>, CodecError> {
    if addresses.is_empty() {
        return Err(CodecError::Empty);
    }
    if addresses.len() > u8::MAX as usize {
        return Err(CodecError::TooManyAddresses(addresses.len()));
    }

    let mut payload = Vec::with_capacity(1 + addresses.len() * 33);
    payload.push(addresses.len() as u8);
    for address in addresses {
        payload.extend_from_slice(&bip155::encode(address)?);
    }
    if payload.len() > MAX_PAYLOAD {
        return Err(CodecError::Oversize(payload.len()));
    }

    let mut records = Vec::with_capacity(payload.len().div_ceil(PAYLOAD_BYTES));
    for (index, chunk) in payload.chunks(PAYLOAD_BYTES).enumerate() {
        let mut octets = [0u8; 16];
        octets[0] = SMUGGLE_PREFIX;
        octets[1] = index as u8;
        octets[2..2 + chunk.len()].copy_from_slice(chunk);
        records.push(Record::aaaa(name, ttl, Ipv6Addr::from(octets)));
    }

    records.shuffle(&mut rand::thread_rng());
    Ok(records)
}

/// Decode smuggled addresses from the AAAA records of an answer section.
///
/// Records outside `fc00::/8` (and non-AAAA records) are ignored. Chunk
/// indices must form a contiguous run starting at zero.
pub fn decode(records: &[Record]) -> Result<Vec<Address>, CodecError> {
    let mut chunks: BTreeMap<u8, [u8; 14]> = BTreeMap::new();
    for record in records {
        let Rdata::Aaaa(ip) = &record.rdata else {
            continue;
        };
        let octets = ip.octets();
        if octets[0] != SMUGGLE_PREFIX {
            continue;
        }
        let mut chunk = [0u8; 14];
        chunk.copy_from_slice(&octets[2..]);
        chunks.insert(octets[1], chunk);
    }
    if chunks.is_empty() {
        return Err(CodecError::Empty);
    }

    let mut payload = Vec::with_capacity(chunks.len() * PAYLOAD_BYTES);
    for (expected, (&index, chunk)) in chunks.iter().enumerate() {
        if index as usize != expected {
            return Err(CodecError::MissingChunk { expected, found: index as usize });
        }
        payload.extend_from_slice(chunk);
    }

    let count = payload[0] as usize;
    let mut rest = &payload[1..];
    let mut addresses = Vec::with_capacity(count);
    for _ in 0..count {
        let (address, remaining) = bip155::decode(rest)?;
        addresses.push(address);
        rest = remaining;
    }
    Ok(addresses)
}
