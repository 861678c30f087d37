// Darkseed — DNS Request Handler
// Copyright (c) 2024-2026 The Darkseed developers
// Distributed under the MIT software license.

//! Question classification and response assembly.
//!
//! The handler serves one zone and a fixed set of labels under it. Each
//! label maps to a per-network address quota; quotas are sized so that the
//! assembled reply stays within the 512-byte UDP budget, which is why the
//! handler never trims dynamically.
//!
//! | label      | qtype      | draw                    |
//! |------------|------------|-------------------------|
//! | apex       | ANY        | 12 ipv4 + 10 ipv6       |
//! | apex, `n1` | A (or ANY) | 29 ipv4                 |
//! | apex, `n2` | AAAA (ANY) | 16 ipv6                 |
//! | `n3`       | AAAA (ANY) | 6 onion, smuggled       |
//! | `n4`       | AAAA (ANY) | 6 i2p, smuggled         |
//! | `n5`       | AAAA (ANY) | 13 cjdns, smuggled      |
//!
//! The first matching row wins; anything else under the zone gets a NOERROR
//! reply with an empty answer section. Clearnet draws become one A/AAAA
//! record per address; all darknet draws of a reply go through the AAAA
//! smuggling codec in a single batch.
//!
//! Handler state is bound at construction and shared by every listener
//! task; processing is stateless across requests.

use crate::addr::{AddressError, NetworkType};
use crate::dns::server::PeerInfo;
use crate::dns::wire::{Message, Rcode, RecordType, WireError};
use crate::dns::{aaaa, records};
use crate::nodes::NodeManager;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Per-network draw counts for one quota table row.
type Quota = &'static [(NetworkType, usize)];

struct QuotaRow {
    labels: &'static [&'static str],
    qtypes: &'static [RecordType],
    quota: Quota,
}

/// Subdomain-to-quota table. First match wins.
static QUOTAS: &[QuotaRow] = &[
    QuotaRow {
        labels: &[""],
        qtypes: &[RecordType::Any],
        quota: &[(NetworkType::Ipv4, 12), (NetworkType::Ipv6, 10)],
    },
    QuotaRow {
        labels: &["", "n1"],
        qtypes: &[RecordType::A, RecordType::Any],
        quota: &[(NetworkType::Ipv4, 29)],
    },
    QuotaRow {
        labels: &["", "n2"],
        qtypes: &[RecordType::Aaaa, RecordType::Any],
        quota: &[(NetworkType::Ipv6, 16)],
    },
    QuotaRow {
        labels: &["n3"],
        qtypes: &[RecordType::Aaaa, RecordType::Any],
        quota: &[(NetworkType::OnionV3, 6)],
    },
    QuotaRow {
        labels: &["n4"],
        qtypes: &[RecordType::Aaaa, RecordType::Any],
        quota: &[(NetworkType::I2p, 6)],
    },
    QuotaRow {
        labels: &["n5"],
        qtypes: &[RecordType::Aaaa, RecordType::Any],
        quota: &[(NetworkType::Cjdns, 13)],
    },
];

fn quota_for(label: &str, qtype: RecordType) -> Quota {
    QUOTAS
        .iter()
        .find(|row| row.labels.contains(&label) && row.qtypes.contains(&qtype))
        .map_or(&[], |row| row.quota)
}

#[derive(Debug, Error)]
enum ResponseError {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Codec(#[from] aaaa::CodecError),

    #[error(transparent)]
    Address(#[from] AddressError),
}

/// DNS request handler bound to one zone and one node pool.
pub struct SeedHandler {
    zone: String,
    ttl: u32,
    nodes: NodeManager,
}

impl SeedHandler {
    /// `zone` is canonicalised to lowercase with a trailing dot.
    pub fn new(zone: &str, ttl: u32, nodes: NodeManager) -> Self {
        let mut zone = zone.to_ascii_lowercase();
        if !zone.ends_with('.') {
            zone.push('.');
        }
        SeedHandler { zone, ttl, nodes }
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// Process one request datagram. `None` means no reply is sent: the
    /// request did not parse, or asked for a name outside the zone.
    pub fn process(&self, data: &[u8], peer: &PeerInfo) -> Option<Vec<u8>> {
        let request = match Message::from_bytes(data) {
            Ok(request) => request,
            Err(e) => {
                warn!("Dropping malformed query from {}: {}", peer, e);
                return None;
            }
        };

        if request.questions.len() != 1 {
            warn!(
                "Refusing query with {} questions (from={})",
                request.questions.len(),
                peer
            );
            return self.refuse(&request);
        }
        let question = request.questions[0].clone();

        let Some(label) = self.zone_label(&question.name) else {
            warn!(
                "Dropping query for name outside zone (from={}, name={})",
                peer, question.name
            );
            return None;
        };

        if !matches!(question.rtype, RecordType::A | RecordType::Aaaa | RecordType::Any) {
            warn!(
                "Refusing unsupported query type (from={}, type={})",
                peer, question.rtype
            );
            return self.refuse(&request);
        }

        info!(
            "Received DNS query: from={}, size={}, name={}, class={}, type={}",
            peer,
            data.len(),
            question.name,
            question.rclass,
            question.rtype
        );

        match self.create_response(&request, &label) {
            Ok((wire, num_records)) => {
                info!(
                    "Sending reply: to={}, size={}, records={}",
                    peer,
                    wire.len(),
                    num_records
                );
                Some(wire)
            }
            Err(e) => {
                warn!("Failed to build reply for {}: {}", peer, e);
                None
            }
        }
    }

    /// Strip the zone from a question name.
    ///
    /// Returns the remaining label ("" for the apex) or `None` when the name
    /// is not under the zone. Matching is case-insensitive and respects
    /// label boundaries.
    fn zone_label(&self, name: &str) -> Option<String> {
        let name = name.to_ascii_lowercase();
        if name == self.zone {
            return Some(String::new());
        }
        let prefix = name.strip_suffix(&self.zone)?;
        prefix.strip_suffix('.').map(str::to_string)
    }

    fn refuse(&self, request: &Message) -> Option<Vec<u8>> {
        let mut response = Message::response(request);
        response.flags.rcode = Rcode::Refused;
        match response.to_bytes() {
            Ok(wire) => Some(wire),
            Err(e) => {
                debug!("Failed to serialize REFUSED reply: {}", e);
                None
            }
        }
    }

    fn create_response(
        &self,
        request: &Message,
        label: &str,
    ) -> Result<(Vec<u8>, usize), ResponseError> {
        let mut response = Message::response(request);
        let question = &request.questions[0];

        // One pool snapshot per request; a refresh cannot change the pool
        // under our feet between per-network draws.
        let pool = self.nodes.view();

        let mut num_addresses = 0;
        let mut darknet = Vec::new();
        for &(network, count) in quota_for(label, question.rtype) {
            for address in pool.sample(network, count) {
                num_addresses += 1;
                // cjdns only shows up here under the n5 label, where it is
                // batched with the other darknets instead of using its
                // native AAAA form.
                if network.is_darknet() {
                    darknet.push(address);
                } else {
                    response.answers.push(records::clearnet_record(
                        &address,
                        &question.name,
                        self.ttl,
                    )?);
                }
            }
        }
        if !darknet.is_empty() {
            response
                .answers
                .extend(aaaa::encode(&darknet, &question.name, self.ttl)?);
        }

        let wire = response.to_bytes()?;
        debug!(
            "Created response (size={}B, addresses={}, records={})",
            wire.len(),
            num_addresses,
            response.answers.len()
        );
        Ok((wire, response.answers.len()))
    }
}
