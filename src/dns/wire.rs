// Darkseed — DNS Wire Format
// Copyright (c) 2024-2026 The Darkseed developers
// Distributed under the MIT software license.

//! Minimal RFC 1035 message codec.
//!
//! The seeder answers a fixed set of questions with A/AAAA records, so this
//! implements exactly the subset it speaks: header, question section and
//! answer records. Unknown query types are carried through (so policy can
//! refuse them instead of the parser dropping the packet), compression
//! pointers are followed on read, and every answer owner name is written as
//! a pointer to the question name at offset 12 — all answers share the
//! question's owner, and the pointer keeps the per-record overhead at the
//! 28 bytes the response quotas are budgeted for.
//!
//! No EDNS, no truncation bit, no authority/additional sections on output.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use thiserror::Error;

/// Fixed DNS header length.
pub const HEADER_LEN: usize = 12;

/// Offset of the question name in every message we emit; answer owner
/// names compress to a pointer at this offset.
const QNAME_OFFSET: u16 = HEADER_LEN as u16;

/// Upper bound on compression pointer hops while reading a name.
const MAX_POINTER_HOPS: usize = 16;

/// Maximum length of a single name label.
const MAX_LABEL_LEN: usize = 63;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("message truncated at byte {0}")]
    Truncated(usize),

    #[error("compression pointer loop")]
    PointerLoop,

    #[error("label exceeds {MAX_LABEL_LEN} bytes: {0}")]
    LabelTooLong(usize),

    #[error("name exceeds 255 bytes")]
    NameTooLong,
}

/// Response codes used by the seeder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rcode {
    NoError,
    Refused,
    Other(u8),
}

impl Rcode {
    pub fn to_u8(self) -> u8 {
        match self {
            Rcode::NoError => 0,
            Rcode::Refused => 5,
            Rcode::Other(v) => v,
        }
    }

    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => Rcode::NoError,
            5 => Rcode::Refused,
            other => Rcode::Other(other),
        }
    }
}

impl fmt::Display for Rcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rcode::NoError => f.write_str("NOERROR"),
            Rcode::Refused => f.write_str("REFUSED"),
            Rcode::Other(v) => write!(f, "RCODE{v}"),
        }
    }
}

/// Record (and query) types. Unknown values are preserved so the policy
/// layer can refuse them explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    A,
    Aaaa,
    Any,
    Other(u16),
}

impl RecordType {
    pub fn to_u16(self) -> u16 {
        match self {
            RecordType::A => 1,
            RecordType::Aaaa => 28,
            RecordType::Any => 255,
            RecordType::Other(v) => v,
        }
    }

    pub fn from_u16(v: u16) -> Self {
        match v {
            1 => RecordType::A,
            28 => RecordType::Aaaa,
            255 => RecordType::Any,
            other => RecordType::Other(other),
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordType::A => f.write_str("A"),
            RecordType::Aaaa => f.write_str("AAAA"),
            RecordType::Any => f.write_str("ANY"),
            RecordType::Other(v) => write!(f, "TYPE{v}"),
        }
    }
}

/// Record classes. Everything the seeder serves is `IN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordClass {
    In,
    Other(u16),
}

impl RecordClass {
    pub fn to_u16(self) -> u16 {
        match self {
            RecordClass::In => 1,
            RecordClass::Other(v) => v,
        }
    }

    pub fn from_u16(v: u16) -> Self {
        match v {
            1 => RecordClass::In,
            other => RecordClass::Other(other),
        }
    }
}

impl fmt::Display for RecordClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordClass::In => f.write_str("IN"),
            RecordClass::Other(v) => write!(f, "CLASS{v}"),
        }
    }
}

/// Header flag word, bit-for-bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flags {
    pub qr: bool,
    pub opcode: u8,
    pub aa: bool,
    pub tc: bool,
    pub rd: bool,
    pub ra: bool,
    pub rcode: Rcode,
}

impl Flags {
    fn to_u16(self) -> u16 {
        let mut v = 0u16;
        if self.qr {
            v |= 1 << 15;
        }
        v |= ((self.opcode & 0x0f) as u16) << 11;
        if self.aa {
            v |= 1 << 10;
        }
        if self.tc {
            v |= 1 << 9;
        }
        if self.rd {
            v |= 1 << 8;
        }
        if self.ra {
            v |= 1 << 7;
        }
        v | self.rcode.to_u8() as u16
    }

    fn from_u16(v: u16) -> Self {
        Flags {
            qr: v & (1 << 15) != 0,
            opcode: ((v >> 11) & 0x0f) as u8,
            aa: v & (1 << 10) != 0,
            tc: v & (1 << 9) != 0,
            rd: v & (1 << 8) != 0,
            ra: v & (1 << 7) != 0,
            rcode: Rcode::from_u8((v & 0x0f) as u8),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Dotted name with trailing dot, as received.
    pub name: String,
    pub rtype: RecordType,
    pub rclass: RecordClass,
}

/// Record data for the types the seeder emits. Anything else read off the
/// wire is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rdata {
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
    Other(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub name: String,
    pub rtype: RecordType,
    pub ttl: u32,
    pub rdata: Rdata,
}

impl Record {
    pub fn a(name: &str, ttl: u32, ip: Ipv4Addr) -> Self {
        Record { name: name.to_string(), rtype: RecordType::A, ttl, rdata: Rdata::A(ip) }
    }

    pub fn aaaa(name: &str, ttl: u32, ip: Ipv6Addr) -> Self {
        Record { name: name.to_string(), rtype: RecordType::Aaaa, ttl, rdata: Rdata::Aaaa(ip) }
    }
}

/// A DNS message restricted to the sections the seeder uses. Authority and
/// additional records are skipped on read and never written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: u16,
    pub flags: Flags,
    pub questions: Vec<Question>,
    pub answers: Vec<Record>,
}

impl Message {
    /// Build a recursion-desired query for one name.
    pub fn query(id: u16, name: &str, rtype: RecordType) -> Self {
        Message {
            id,
            flags: Flags {
                qr: false,
                opcode: 0,
                aa: false,
                tc: false,
                rd: true,
                ra: false,
                rcode: Rcode::NoError,
            },
            questions: vec![Question {
                name: canonical_name(name),
                rtype,
                rclass: RecordClass::In,
            }],
            answers: Vec::new(),
        }
    }

    /// Build an authoritative response skeleton echoing id, questions and
    /// the RD bit of `request`.
    pub fn response(request: &Message) -> Self {
        Message {
            id: request.id,
            flags: Flags {
                qr: true,
                opcode: request.flags.opcode,
                aa: true,
                tc: false,
                rd: request.flags.rd,
                ra: false,
                rcode: Rcode::NoError,
            },
            questions: request.questions.clone(),
            answers: Vec::new(),
        }
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Message, WireError> {
        if buf.len() < HEADER_LEN {
            return Err(WireError::Truncated(buf.len()));
        }
        let id = read_u16(buf, 0)?;
        let flags = Flags::from_u16(read_u16(buf, 2)?);
        let qd_count = read_u16(buf, 4)?;
        let an_count = read_u16(buf, 6)?;
        let ns_count = read_u16(buf, 8)?;
        let ar_count = read_u16(buf, 10)?;

        let mut pos = HEADER_LEN;
        let mut questions = Vec::with_capacity(qd_count as usize);
        for _ in 0..qd_count {
            let (name, next) = read_name(buf, pos)?;
            let rtype = RecordType::from_u16(read_u16(buf, next)?);
            let rclass = RecordClass::from_u16(read_u16(buf, next + 2)?);
            pos = next + 4;
            questions.push(Question { name, rtype, rclass });
        }

        let mut answers = Vec::with_capacity(an_count as usize);
        for _ in 0..an_count {
            let (record, next) = read_record(buf, pos)?;
            pos = next;
            answers.push(record);
        }
        // Authority and additional sections are parsed past but not kept.
        for _ in 0..(ns_count as usize + ar_count as usize) {
            let (_, next) = read_record(buf, pos)?;
            pos = next;
        }

        Ok(Message { id, flags, questions, answers })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        let mut out = Vec::with_capacity(HEADER_LEN + 64);
        out.extend_from_slice(&self.id.to_be_bytes());
        out.extend_from_slice(&self.flags.to_u16().to_be_bytes());
        out.extend_from_slice(&(self.questions.len() as u16).to_be_bytes());
        out.extend_from_slice(&(self.answers.len() as u16).to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());

        for question in &self.questions {
            write_name(&mut out, &question.name)?;
            out.extend_from_slice(&question.rtype.to_u16().to_be_bytes());
            out.extend_from_slice(&question.rclass.to_u16().to_be_bytes());
        }

        let qname = self.questions.first().map(|q| q.name.as_str());
        for record in &self.answers {
            match qname {
                Some(name) if record.name.eq_ignore_ascii_case(name) => {
                    out.extend_from_slice(&(0xc000 | QNAME_OFFSET).to_be_bytes());
                }
                _ => write_name(&mut out, &record.name)?,
            }
            out.extend_from_slice(&record.rtype.to_u16().to_be_bytes());
            out.extend_from_slice(&RecordClass::In.to_u16().to_be_bytes());
            out.extend_from_slice(&record.ttl.to_be_bytes());
            match &record.rdata {
                Rdata::A(ip) => {
                    out.extend_from_slice(&4u16.to_be_bytes());
                    out.extend_from_slice(&ip.octets());
                }
                Rdata::Aaaa(ip) => {
                    out.extend_from_slice(&16u16.to_be_bytes());
                    out.extend_from_slice(&ip.octets());
                }
                Rdata::Other(data) => {
                    out.extend_from_slice(&(data.len() as u16).to_be_bytes());
                    out.extend_from_slice(data);
                }
            }
        }
        Ok(out)
    }
}

/// Normalize a name to dotted form with a trailing dot.
pub fn canonical_name(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{name}.")
    }
}

fn read_u16(buf: &[u8], pos: usize) -> Result<u16, WireError> {
    let bytes: [u8; 2] = buf
        .get(pos..pos + 2)
        .ok_or(WireError::Truncated(buf.len()))?
        .try_into()
        .unwrap_or([0; 2]);
    Ok(u16::from_be_bytes(bytes))
}

/// Read a possibly-compressed name starting at `pos`.
///
/// Returns the dotted name (trailing dot included; root is `"."`) and the
/// position after the name in the original stream.
fn read_name(buf: &[u8], pos: usize) -> Result<(String, usize), WireError> {
    let mut name = String::new();
    let mut pos = pos;
    let mut next = 0usize;
    let mut jumped = false;
    let mut hops = 0usize;

    loop {
        let len = *buf.get(pos).ok_or(WireError::Truncated(buf.len()))? as usize;
        if len & 0xc0 == 0xc0 {
            hops += 1;
            if hops > MAX_POINTER_HOPS {
                return Err(WireError::PointerLoop);
            }
            let low = *buf.get(pos + 1).ok_or(WireError::Truncated(buf.len()))? as usize;
            if !jumped {
                next = pos + 2;
                jumped = true;
            }
            pos = (len & 0x3f) << 8 | low;
            continue;
        }
        if len == 0 {
            if !jumped {
                next = pos + 1;
            }
            break;
        }
        let label = buf
            .get(pos + 1..pos + 1 + len)
            .ok_or(WireError::Truncated(buf.len()))?;
        name.push_str(&String::from_utf8_lossy(label));
        name.push('.');
        pos += 1 + len;
    }

    if name.is_empty() {
        name.push('.');
    }
    Ok((name, next))
}

/// Write a name in uncompressed label form.
fn write_name(out: &mut Vec<u8>, name: &str) -> Result<(), WireError> {
    let mut written = 0usize;
    for label in name.split('.').filter(|l| !l.is_empty()) {
        let bytes = label.as_bytes();
        if bytes.len() > MAX_LABEL_LEN {
            return Err(WireError::LabelTooLong(bytes.len()));
        }
        written += bytes.len() + 1;
        if written > 255 {
            return Err(WireError::NameTooLong);
        }
        out.push(bytes.len() as u8);
        out.extend_from_slice(bytes);
    }
    out.push(0);
    Ok(())
}

fn read_record(buf: &[u8], pos: usize) -> Result<(Record, usize), WireError> {
    let (name, next) = read_name(buf, pos)?;
    let rtype = RecordType::from_u16(read_u16(buf, next)?);
    let _rclass = RecordClass::from_u16(read_u16(buf, next + 2)?);
    let ttl_bytes: [u8; 4] = buf
        .get(next + 4..next + 8)
        .ok_or(WireError::Truncated(buf.len()))?
        .try_into()
        .unwrap_or([0; 4]);
    let ttl = u32::from_be_bytes(ttl_bytes);
    let rdlength = read_u16(buf, next + 8)? as usize;
    let rdata_start = next + 10;
    let rdata_bytes = buf
        .get(rdata_start..rdata_start + rdlength)
        .ok_or(WireError::Truncated(buf.len()))?;

    let rdata = match (rtype, rdlength) {
        (RecordType::A, 4) => {
            let octets: [u8; 4] = rdata_bytes.try_into().unwrap_or([0; 4]);
            Rdata::A(Ipv4Addr::from(octets))
        }
        (RecordType::Aaaa, 16) => {
            let octets: [u8; 16] = rdata_bytes.try_into().unwrap_or([0; 16]);
            Rdata::Aaaa(Ipv6Addr::from(octets))
        }
        _ => Rdata::Other(rdata_bytes.to_vec()),
    };

    Ok((Record { name, rtype, ttl, rdata }, rdata_start + rdlength))
}
