//! BIP155-like darknet address encoding.
//!
//! One byte of network id followed by the fixed-length identity. Unlike real
//! BIP 155 there is no timestamp and no port; the seeder only ships
//! identities. Clearnet addresses never take this path (they travel as
//! native A/AAAA records), so the encoder rejects them.

use super::{Address, AddressError};

// Network ids from BIP 155. Ids for clearnet networks are listed for
// completeness; the codec only accepts the darknet subset.
pub const NET_ID_IPV4: u8 = 0x01;
pub const NET_ID_IPV6: u8 = 0x02;
pub const NET_ID_TORV3: u8 = 0x04;
pub const NET_ID_I2P: u8 = 0x05;
pub const NET_ID_CJDNS: u8 = 0x06;

/// Fixed payload length for a network id.
pub fn payload_len(net_id: u8) -> Option<usize> {
    match net_id {
        NET_ID_IPV4 => Some(4),
        NET_ID_IPV6 => Some(16),
        NET_ID_TORV3 => Some(32),
        NET_ID_I2P => Some(32),
        NET_ID_CJDNS => Some(16),
        _ => None,
    }
}

/// Serialize a darknet address as `net_id | identity`.
pub fn encode(address: &Address) -> Result<Vec<u8>, AddressError> {
    match address {
        Address::OnionV3(pubkey) => {
            let mut out = Vec::with_capacity(33);
            out.push(NET_ID_TORV3);
            out.extend_from_slice(pubkey);
            Ok(out)
        }
        Address::I2p(hash) => {
            let mut out = Vec::with_capacity(33);
            out.push(NET_ID_I2P);
            out.extend_from_slice(hash);
            Ok(out)
        }
        Address::Cjdns(ip) => {
            let mut out = Vec::with_capacity(17);
            out.push(NET_ID_CJDNS);
            out.extend_from_slice(&ip.octets());
            Ok(out)
        }
        Address::Ipv4(_) | Address::Ipv6(_) => {
            Err(AddressError::WrongNetwork(address.network()))
        }
    }
}

/// Deserialize one address record from the front of `buf`.
///
/// Returns the address and the remaining bytes. Unknown network ids and
/// truncated payloads fail; clearnet ids are unknown here by design.
pub fn decode(buf: &[u8]) -> Result<(Address, &[u8]), AddressError> {
    let (&net_id, rest) = buf.split_first().ok_or(AddressError::Truncated)?;
    match net_id {
        NET_ID_TORV3 => {
            let (payload, rest) = take::<32>(rest)?;
            Ok((Address::OnionV3(payload), rest))
        }
        NET_ID_I2P => {
            let (payload, rest) = take::<32>(rest)?;
            Ok((Address::I2p(payload), rest))
        }
        NET_ID_CJDNS => {
            let (payload, rest) = take::<16>(rest)?;
            Ok((Address::Cjdns(payload.into()), rest))
        }
        other => Err(AddressError::UnknownNetId(other)),
    }
}

fn take<const N: usize>(buf: &[u8]) -> Result<([u8; N], &[u8]), AddressError> {
    if buf.len() < N {
        return Err(AddressError::Truncated);
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[..N]);
    Ok((out, &buf[N..]))
}
