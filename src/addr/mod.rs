// Darkseed — Network Addresses
// Copyright (c) 2024-2026 The Darkseed developers
// Distributed under the MIT software license.

//! Network address model and darknet address codecs.
//!
//! Bitcoin nodes are reachable over five network families. Two of them
//! (IPv4, IPv6) are plain IP literals; the other three are overlay networks
//! whose textual addresses encode a fixed-size binary identity:
//!
//! | Network  | Textual form                  | Identity          |
//! |----------|-------------------------------|-------------------|
//! | cjdns    | IPv6 literal in `fc00::/8`    | 16-byte address   |
//! | onion v3 | 56 base32 chars + `.onion`    | 32-byte pubkey    |
//! | i2p      | 52 base32 chars + `.b32.i2p`  | 32-byte SHA-256   |
//!
//! [`Address`] carries the decoded identity; parsing and display round-trip
//! for every canonical (lowercase) input.

pub mod bip155;

use sha3::{Digest, Sha3_256};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use thiserror::Error;

/// Suffix of textual onion v3 addresses.
pub const ONION_SUFFIX: &str = ".onion";

/// Base32 length of an onion v3 address without its suffix.
/// 35 bytes (pubkey + checksum + version) × 8 / 5 bits = 56 characters.
pub const ONION_ENCODED_LEN: usize = 56;

/// Onion address version byte. Only v3 is supported.
pub const ONION_VERSION: u8 = 3;

/// Suffix of textual I2P addresses.
pub const I2P_SUFFIX: &str = ".b32.i2p";

/// Base32 length of an I2P address without its suffix.
/// A 32-byte hash encodes to 52 characters (padding stripped).
pub const I2P_ENCODED_LEN: usize = 52;

/// Textual prefix shared by all cjdns addresses (`fc00::/8`).
pub const CJDNS_PREFIX: &str = "fc";

/// Domain-separation prefix for the onion v3 checksum.
const ONION_CHECKSUM_PREFIX: &[u8] = b".onion checksum";

/// Unpadded RFC 4648 alphabet used by both onion and I2P addresses.
const BASE32: base32::Alphabet = base32::Alphabet::RFC4648 { padding: false };

/// Errors raised by address classification and the darknet codecs.
///
/// Every error is a rejection: no partial results are produced.
#[derive(Debug, Error)]
pub enum AddressError {
    #[error("unsupported address: {0}")]
    Unsupported(String),

    #[error("invalid onion v3 address length: {0} (expected {ONION_ENCODED_LEN})")]
    OnionLength(usize),

    #[error("invalid i2p address length: {0} (expected {I2P_ENCODED_LEN})")]
    I2pLength(usize),

    #[error("base32 decode failure: {0}")]
    Base32(String),

    #[error("invalid onion v3 checksum: expected {expected:02x?}, computed {computed:02x?}")]
    Checksum { expected: [u8; 2], computed: [u8; 2] },

    #[error("invalid onion v3 address version: {0}")]
    Version(u8),

    #[error("unsupported network id: {0:#04x}")]
    UnknownNetId(u8),

    #[error("truncated address record")]
    Truncated,

    #[error("{0} addresses cannot use this encoding")]
    WrongNetwork(NetworkType),
}

/// The five network families served by the seeder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkType {
    Ipv4,
    Ipv6,
    Cjdns,
    OnionV3,
    I2p,
}

impl NetworkType {
    /// All families, in the order used for partitioning and log lines.
    pub const ALL: [NetworkType; 5] = [
        NetworkType::Ipv4,
        NetworkType::Ipv6,
        NetworkType::OnionV3,
        NetworkType::I2p,
        NetworkType::Cjdns,
    ];

    /// True for overlay networks whose addresses need the smuggling codec.
    pub fn is_darknet(&self) -> bool {
        matches!(self, NetworkType::Cjdns | NetworkType::OnionV3 | NetworkType::I2p)
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NetworkType::Ipv4 => "ipv4",
            NetworkType::Ipv6 => "ipv6",
            NetworkType::Cjdns => "cjdns",
            NetworkType::OnionV3 => "onion_v3",
            NetworkType::I2p => "i2p",
        };
        f.write_str(s)
    }
}

/// A network address with its decoded identity.
///
/// Construction goes through [`FromStr`], which classifies the textual form
/// and validates the embedded identity (onion checksum and version, base32
/// lengths). [`fmt::Display`] emits the canonical lowercase textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
    Cjdns(Ipv6Addr),
    OnionV3([u8; 32]),
    I2p([u8; 32]),
}

impl Address {
    pub fn network(&self) -> NetworkType {
        match self {
            Address::Ipv4(_) => NetworkType::Ipv4,
            Address::Ipv6(_) => NetworkType::Ipv6,
            Address::Cjdns(_) => NetworkType::Cjdns,
            Address::OnionV3(_) => NetworkType::OnionV3,
            Address::I2p(_) => NetworkType::I2p,
        }
    }
}

impl FromStr for Address {
    type Err = AddressError;

    /// Classify an address string and decode its identity.
    ///
    /// Suffix checks come first (`.b32.i2p`, `.onion`), then IP literal
    /// parsing; an IPv6 literal whose lowercase form starts with `fc` is
    /// cjdns. Anything else is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.ends_with(I2P_SUFFIX) {
            return Ok(Address::I2p(parse_i2p(s)?));
        }
        if s.ends_with(ONION_SUFFIX) {
            return Ok(Address::OnionV3(parse_onion_v3(s)?));
        }
        match IpAddr::from_str(s) {
            Ok(IpAddr::V4(ip)) => Ok(Address::Ipv4(ip)),
            Ok(IpAddr::V6(ip)) => {
                if s.to_ascii_lowercase().starts_with(CJDNS_PREFIX) {
                    Ok(Address::Cjdns(ip))
                } else {
                    Ok(Address::Ipv6(ip))
                }
            }
            Err(_) => Err(AddressError::Unsupported(s.to_string())),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Ipv4(ip) => ip.fmt(f),
            Address::Ipv6(ip) | Address::Cjdns(ip) => ip.fmt(f),
            Address::OnionV3(pubkey) => f.write_str(&emit_onion_v3(pubkey)),
            Address::I2p(hash) => f.write_str(&emit_i2p(hash)),
        }
    }
}

/// Derive the 256-bit public key from an onion v3 address.
///
/// Strips the suffix, base32-decodes the remaining 56 characters to
/// `pubkey(32) | checksum(2) | version(1)` and validates checksum and
/// version.
pub fn parse_onion_v3(address: &str) -> Result<[u8; 32], AddressError> {
    let encoded = address.strip_suffix(ONION_SUFFIX).unwrap_or(address);
    if encoded.len() != ONION_ENCODED_LEN {
        return Err(AddressError::OnionLength(encoded.len()));
    }
    let decoded = base32::decode(BASE32, encoded)
        .ok_or_else(|| AddressError::Base32(encoded.to_string()))?;
    if decoded.len() != 35 {
        return Err(AddressError::Base32(encoded.to_string()));
    }
    let mut pubkey = [0u8; 32];
    pubkey.copy_from_slice(&decoded[..32]);
    let expected = [decoded[32], decoded[33]];
    let version = decoded[34];
    let computed = onion_checksum(&pubkey);
    if computed != expected {
        return Err(AddressError::Checksum { expected, computed });
    }
    if version != ONION_VERSION {
        return Err(AddressError::Version(version));
    }
    Ok(pubkey)
}

/// Derive the 256-bit hash from an I2P address.
///
/// The suffix-stripped address is always 52 characters, which is not a
/// multiple of eight; the decoder tolerates the missing padding and drops
/// the four trailing bits.
pub fn parse_i2p(address: &str) -> Result<[u8; 32], AddressError> {
    let encoded = address.strip_suffix(I2P_SUFFIX).unwrap_or(address);
    if encoded.len() != I2P_ENCODED_LEN {
        return Err(AddressError::I2pLength(encoded.len()));
    }
    let decoded = base32::decode(BASE32, encoded)
        .ok_or_else(|| AddressError::Base32(encoded.to_string()))?;
    let mut hash = [0u8; 32];
    if decoded.len() < 32 {
        return Err(AddressError::Base32(encoded.to_string()));
    }
    hash.copy_from_slice(&decoded[..32]);
    Ok(hash)
}

/// Convert a 256-bit public key into an onion v3 address.
pub fn emit_onion_v3(pubkey: &[u8; 32]) -> String {
    let mut raw = [0u8; 35];
    raw[..32].copy_from_slice(pubkey);
    let checksum = onion_checksum(pubkey);
    raw[32..34].copy_from_slice(&checksum);
    raw[34] = ONION_VERSION;
    let encoded = base32::encode(BASE32, &raw).to_ascii_lowercase();
    format!("{encoded}{ONION_SUFFIX}")
}

/// Convert a 256-bit hash into an I2P address.
pub fn emit_i2p(hash: &[u8; 32]) -> String {
    let encoded = base32::encode(BASE32, hash).to_ascii_lowercase();
    format!("{encoded}{I2P_SUFFIX}")
}

/// Compute the two-byte onion v3 checksum:
/// `SHA3-256(".onion checksum" | pubkey | 0x03)[0..2]`.
fn onion_checksum(pubkey: &[u8; 32]) -> [u8; 2] {
    let mut hasher = Sha3_256::new();
    hasher.update(ONION_CHECKSUM_PREFIX);
    hasher.update(pubkey);
    hasher.update([ONION_VERSION]);
    let digest = hasher.finalize();
    [digest[0], digest[1]]
}

#[cfg(test)]
mod tests {
    use super::*;

    // Onion v3 address of the all-zero pubkey; checksum is
    // sha3_256(".onion checksum" | 0x00*32 | 0x03)[..2] = cd0e.
    const ZERO_ONION: &str =
        "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaam2dqd.onion";

    const I2P_ADDR: &str =
        "abcdabcdabcdabcdabcdabcdabcdabcdabcdabcdabcdabcdabca.b32.i2p";

    #[test]
    fn test_classify() {
        assert_eq!("1.2.3.4".parse::<Address>().unwrap().network(), NetworkType::Ipv4);
        assert_eq!("2001:db8::1".parse::<Address>().unwrap().network(), NetworkType::Ipv6);
        assert_eq!("fc32:17ea::1".parse::<Address>().unwrap().network(), NetworkType::Cjdns);
        assert_eq!(ZERO_ONION.parse::<Address>().unwrap().network(), NetworkType::OnionV3);
        assert_eq!(I2P_ADDR.parse::<Address>().unwrap().network(), NetworkType::I2p);
        assert!("notanaddress".parse::<Address>().is_err());
    }

    #[test]
    fn test_onion_zero_pubkey_vector() {
        assert_eq!(emit_onion_v3(&[0u8; 32]), ZERO_ONION);
        assert_eq!(parse_onion_v3(ZERO_ONION).unwrap(), [0u8; 32]);
    }

    #[test]
    fn test_onion_roundtrip() {
        let mut pubkey = [0u8; 32];
        for (i, b) in pubkey.iter_mut().enumerate() {
            *b = i as u8;
        }
        let address = emit_onion_v3(&pubkey);
        assert_eq!(address.len(), ONION_ENCODED_LEN + ONION_SUFFIX.len());
        assert_eq!(parse_onion_v3(&address).unwrap(), pubkey);
        let parsed: Address = address.parse().unwrap();
        assert_eq!(parsed.to_string(), address);
    }

    #[test]
    fn test_onion_bad_checksum() {
        // Flip one character in the checksum region.
        let mut chars: Vec<char> = ZERO_ONION.chars().collect();
        let pos = ONION_ENCODED_LEN - 2;
        chars[pos] = if chars[pos] == 'a' { 'b' } else { 'a' };
        let corrupted: String = chars.into_iter().collect();
        assert!(matches!(
            parse_onion_v3(&corrupted),
            Err(AddressError::Checksum { .. })
        ));
    }

    #[test]
    fn test_onion_bad_length() {
        assert!(matches!(
            parse_onion_v3("tooshort.onion"),
            Err(AddressError::OnionLength(8))
        ));
    }

    #[test]
    fn test_onion_bad_version() {
        // Rebuild the zero-pubkey address with version byte 2. The checksum
        // is still computed over version 3, so it passes; only the trailing
        // version byte differs.
        let mut raw = [0u8; 35];
        raw[32..34].copy_from_slice(&onion_checksum(&[0u8; 32]));
        raw[34] = 2;
        let address = format!(
            "{}{ONION_SUFFIX}",
            base32::encode(BASE32, &raw).to_ascii_lowercase()
        );
        assert!(matches!(parse_onion_v3(&address), Err(AddressError::Version(2))));
    }

    #[test]
    fn test_i2p_roundtrip() {
        let hash = parse_i2p(I2P_ADDR).unwrap();
        assert_eq!(emit_i2p(&hash), I2P_ADDR);
        let parsed: Address = I2P_ADDR.parse().unwrap();
        assert_eq!(parsed.to_string(), I2P_ADDR);
    }

    #[test]
    fn test_i2p_bad_length() {
        assert!(matches!(
            parse_i2p("tooshort.b32.i2p"),
            Err(AddressError::I2pLength(8))
        ));
    }

    #[test]
    fn test_cjdns_requires_fc_prefix() {
        // IPv6 literal outside fc00::/8 must not classify as cjdns.
        let addr: Address = "fd00::1".parse().unwrap();
        assert_eq!(addr.network(), NetworkType::Ipv6);
    }

    #[test]
    fn test_display_roundtrip_clearnet() {
        for s in ["93.184.216.34", "2001:db8::2:1", "fc00::1"] {
            let addr: Address = s.parse().unwrap();
            assert_eq!(addr.to_string(), s);
        }
    }
}
