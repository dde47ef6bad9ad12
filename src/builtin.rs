//! Built-in probe payloads.
//!
//! Seeded into every registry before user files are merged, so a template
//! file or capture that names the same port replaces the built-in.

/// How the length of a built-in payload is determined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadLength {
    /// Exactly this many bytes (clamped to the data)
    Fixed(usize),
    /// Up to the first NUL byte, or the whole data when there is none
    UntilNul,
}

/// One entry of the built-in table
#[derive(Debug, Clone, Copy)]
pub struct BuiltinPayload {
    pub port: u16,
    pub source_port: Option<u16>,
    pub length: PayloadLength,
    pub data: &'static [u8],
}

impl BuiltinPayload {
    /// Payload bytes after applying the length rule
    pub fn bytes(&self) -> &'static [u8] {
        let length = match self.length {
            PayloadLength::Fixed(length) => length.min(self.data.len()),
            PayloadLength::UntilNul => self
                .data
                .iter()
                .position(|&b| b == 0)
                .unwrap_or(self.data.len()),
        };
        &self.data[..length]
    }
}

/// SNMPv1 GetRequest, community "public", for sysName.0 and sysDescr.0
const SNMP_GET: &[u8] = &[
    0x30, 0x37, // SEQUENCE
    0x02, 0x01, 0x00, // version
    0x04, 0x06, b'p', b'u', b'b', b'l', b'i', b'c', // community = public
    0xa0, 0x2a, // GetRequest-PDU
    0x02, 0x04, 0x00, 0x00, 0x00, 0x00, // request-id
    0x02, 0x01, 0x00, // error-status
    0x02, 0x01, 0x00, // error-index
    0x30, 0x1c, // varbind list
    0x30, 0x0c,
    0x06, 0x08, 0x2b, 0x06, 0x01, 0x02, 0x01, 0x01, 0x01, 0x00, // sysName
    0x05, 0x00,
    0x30, 0x0c,
    0x06, 0x08, 0x2b, 0x06, 0x01, 0x02, 0x01, 0x01, 0x05, 0x00, // sysDesc
    0x05, 0x00,
];

/// version.bind TXT/CHAOS query followed by an A query for www.yahoo.com
const DNS_QUERIES: &[u8] = &[
    0x50, 0xb6, // transaction id
    0x01, 0x20, // flags
    0x00, 0x01, // questions
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x07, b'v', b'e', b'r', b's', b'i', b'o', b'n',
    0x04, b'b', b'i', b'n', b'd', 0x00,
    0x00, 0x10, // TXT
    0x00, 0x03, // CHAOS
    0x00, 0x00, // transaction id
    0x01, 0x00, // standard query
    0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x03, b'w', b'w', b'w',
    0x05, b'y', b'a', b'h', b'o', b'o',
    0x03, b'c', b'o', b'm', 0x00,
    0x00, 0x01, 0x00, 0x01, // A IN
];

const SIP_OPTIONS: &[u8] = b"OPTIONS sip:carol@chicago.com SIP/2.0\r\n\
Via: SIP/2.0/UDP pc33.atlanta.com;branch=z9hG4bKhjhs8ass877\r\n\
Max-Forwards: 70\r\n\
To: <sip:carol@chicago.com>\r\n\
From: Alice <sip:alice@atlanta.com>;tag=1928301774\r\n\
Call-ID: a84b4c76e66710\r\n\
CSeq: 63104 OPTIONS\r\n\
Contact: <sip:alice@pc33.atlanta.com>\r\n\
Accept: application/sdp\r\n\
Content-Length: 0\r\n";

/// Default payload table, inserted in order
pub const BUILTIN_PAYLOADS: &[BuiltinPayload] = &[
    BuiltinPayload {
        port: 161,
        source_port: None,
        length: PayloadLength::Fixed(57),
        data: SNMP_GET,
    },
    BuiltinPayload {
        port: 53,
        source_port: None,
        length: PayloadLength::Fixed(61),
        data: DNS_QUERIES,
    },
    BuiltinPayload {
        port: 5060,
        source_port: None,
        length: PayloadLength::UntilNul,
        data: SIP_OPTIONS,
    },
];
