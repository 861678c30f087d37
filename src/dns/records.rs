//! Resource records for natively representable addresses.

use crate::addr::{Address, AddressError};
use crate::dns::wire::Record;

/// Build the single A or AAAA record for an address DNS can carry natively.
///
/// cjdns addresses are valid IPv6 literals, so they fit in an AAAA record
/// without the smuggling codec. Onion and I2P addresses have no native
/// record type and are rejected here.
pub fn clearnet_record(address: &Address, name: &str, ttl: u32) -> Result<Record, AddressError> {
    match address {
        Address::Ipv4(ip) => Ok(Record::a(name, ttl, *ip)),
        Address::Ipv6(ip) | Address::Cjdns(ip) => Ok(Record::aaaa(name, ttl, *ip)),
        Address::OnionV3(_) | Address::I2p(_) => {
            Err(AddressError::WrongNetwork(address.network()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::wire::{Rdata, RecordType};

    #[test]
    fn test_ipv4_record() {
        let addr: Address = "93.184.216.34".parse().unwrap();
        let record = clearnet_record(&addr, "seed.example.com.", 60).unwrap();
        assert_eq!(record.rtype, RecordType::A);
        assert_eq!(record.rdata, Rdata::A("93.184.216.34".parse().unwrap()));
    }

    #[test]
    fn test_ipv6_record() {
        let addr: Address = "2001:db8::1".parse().unwrap();
        let record = clearnet_record(&addr, "seed.example.com.", 60).unwrap();
        assert_eq!(record.rtype, RecordType::Aaaa);
    }

    #[test]
    fn test_cjdns_native_record() {
        let addr: Address = "fc00::1".parse().unwrap();
        let record = clearnet_record(&addr, "seed.example.com.", 60).unwrap();
        assert_eq!(record.rtype, RecordType::Aaaa);
        assert_eq!(record.rdata, Rdata::Aaaa("fc00::1".parse().unwrap()));
    }

    #[test]
    fn test_darknet_rejected() {
        let addr = Address::OnionV3([0u8; 32]);
        assert!(clearnet_record(&addr, "seed.example.com.", 60).is_err());
    }
}
