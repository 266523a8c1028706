// packet.rs - the 20-byte header plus attribute-list codec.
//
// Encoding canonicalizes attribute order to ascending type code; decoding
// is a strict two-pass walk that validates framing before anything is
// interpreted. Neither direction needs a `Dictionary`: the wire bytes are
// self-sufficient, and typed access is layered on top via
// `Attribute::typed_value`, which runs on demand rather than as a
// precondition for decode to succeed.

use std::sync::atomic::{AtomicU8, Ordering};

use bytes::{BufMut, BytesMut};
use rand::RngCore;
use tracing::{debug, warn};

use crate::attribute::Attribute;
use crate::dictionary::STANDARD_VENDOR;
use crate::error::{Error, Result};

/// Maximum serialized size of a RADIUS datagram.
pub const MAX_PACKET_LEN: usize = 4096;
/// Size of the fixed RADIUS header.
pub const HEADER_LEN: usize = 20;

/// Well-known RADIUS packet codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketCode {
    AccessRequest = 1,
    AccessAccept = 2,
    AccessReject = 3,
    AccountingRequest = 4,
    AccountingResponse = 5,
    AccessChallenge = 11,
    StatusServer = 12,
    StatusClient = 13,
    DisconnectRequest = 40,
    DisconnectAck = 41,
    DisconnectNak = 42,
    CoaRequest = 43,
    CoaAck = 44,
    CoaNak = 45,
}

impl PacketCode {
    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::AccessRequest),
            2 => Some(Self::AccessAccept),
            3 => Some(Self::AccessReject),
            4 => Some(Self::AccountingRequest),
            5 => Some(Self::AccountingResponse),
            11 => Some(Self::AccessChallenge),
            12 => Some(Self::StatusServer),
            13 => Some(Self::StatusClient),
            40 => Some(Self::DisconnectRequest),
            41 => Some(Self::DisconnectAck),
            42 => Some(Self::DisconnectNak),
            43 => Some(Self::CoaRequest),
            44 => Some(Self::CoaAck),
            45 => Some(Self::CoaNak),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// The process-wide identifier source: an atomic counter that wraps
/// 0..=255. Callers wanting an isolated identifier space construct their
/// own `IdentifierCounter` instead of using `next_identifier()`.
#[derive(Debug, Default)]
pub struct IdentifierCounter(AtomicU8);

impl IdentifierCounter {
    pub const fn new() -> Self {
        Self(AtomicU8::new(0))
    }

    /// Monotonic mod 256 under concurrent access.
    pub fn next(&self) -> u8 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

static DEFAULT_IDENTIFIERS: IdentifierCounter = IdentifierCounter::new();

/// Draws the next identifier from the process-wide default counter.
pub fn next_identifier() -> u8 {
    DEFAULT_IDENTIFIERS.next()
}

/// Fills `buf` with cryptographically secure random bytes. Request
/// authenticators and CHAP challenges must never be seeded from a
/// non-cryptographic generator.
pub fn fill_random(buf: &mut [u8]) {
    rand::rngs::OsRng.fill_bytes(buf);
}

/// A RADIUS packet: header fields plus an ordered attribute list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub code: u8,
    pub identifier: u8,
    pub authenticator: [u8; 16],
    pub attributes: Vec<Attribute>,
}

impl Packet {
    pub fn new(code: u8, identifier: u8, authenticator: [u8; 16]) -> Self {
        Self {
            code,
            identifier,
            authenticator,
            attributes: Vec::new(),
        }
    }

    /// A freshly-built outbound packet: identifier drawn from the
    /// process-wide counter, authenticator left zeroed until an
    /// authenticator-engine call fills it in at first encode.
    pub fn outbound(code: u8) -> Self {
        Self::new(code, next_identifier(), [0u8; 16])
    }

    pub fn known_code(&self) -> Option<PacketCode> {
        PacketCode::from_u8(self.code)
    }

    pub fn add_attribute(&mut self, attribute: Attribute) {
        self.attributes.push(attribute);
    }

    /// Builds a response sharing this packet's identifier and (initially)
    /// its authenticator - the authenticator engine overwrites the latter
    /// with the computed Response Authenticator before transmission.
    pub fn create_response(&self, code: u8) -> Self {
        Self {
            code,
            identifier: self.identifier,
            authenticator: self.authenticator,
            attributes: Vec::new(),
        }
    }

    /// First attribute matching `(vendor_id, type_code)`, in wire order.
    pub fn get(&self, vendor_id: i32, type_code: u8) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|a| a.vendor_id == vendor_id && a.type_code == type_code)
    }

    /// First attribute matching a name known to `dict`.
    pub fn get_by_name<'a>(
        &'a self,
        dict: &crate::dictionary::Dictionary,
        name: &str,
    ) -> Option<&'a Attribute> {
        let descriptor = dict.attribute_by_name(name)?;
        self.get(descriptor.vendor_id, descriptor.type_code)
    }

    /// All attributes matching `(vendor_id, type_code)`, in wire order.
    pub fn get_all(&self, vendor_id: i32, type_code: u8) -> Vec<&Attribute> {
        self.attributes
            .iter()
            .filter(|a| a.vendor_id == vendor_id && a.type_code == type_code)
            .collect()
    }

    /// Serializes the header and attribute list. Attributes are emitted in
    /// ascending `type_code` order (stable, so repeats keep their relative
    /// insertion order); total length must not exceed 4096 bytes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut ordered: Vec<&Attribute> = self.attributes.iter().collect();
        ordered.sort_by_key(|a| a.type_code);

        let mut size = HEADER_LEN;
        for attr in &ordered {
            let attr_len = 2 + attr.data.len();
            if attr_len > 255 {
                return Err(Error::MalformedPacket(format!(
                    "attribute {} value too long: {} bytes",
                    attr.type_code,
                    attr.data.len()
                )));
            }
            size += attr_len;
        }
        if size > MAX_PACKET_LEN {
            return Err(Error::PacketTooLong(size));
        }

        let mut buf = BytesMut::with_capacity(size);
        buf.put_u8(self.code);
        buf.put_u8(self.identifier);
        buf.put_u16(size as u16);
        buf.put_slice(&self.authenticator);
        for attr in ordered {
            buf.put_u8(attr.type_code);
            buf.put_u8((2 + attr.data.len()) as u8);
            buf.put_slice(&attr.data);
        }
        Ok(buf.to_vec())
    }

    /// Strict two-pass decode: pass 1 validates that
    /// `[type][length]` pairs exactly cover the declared body; pass 2
    /// materializes attributes. All top-level attributes decode with
    /// `vendor_id == STANDARD_VENDOR`; VSA sub-attributes are recovered by
    /// calling `typed_value` on the type-26 attribute.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_LEN {
            warn!(len = buf.len(), "packet shorter than the header");
            return Err(Error::MalformedPacket(format!(
                "packet shorter than the {HEADER_LEN}-byte header: {} bytes",
                buf.len()
            )));
        }
        let code = buf[0];
        let identifier = buf[1];
        let length = u16::from_be_bytes([buf[2], buf[3]]) as usize;
        if length < HEADER_LEN {
            warn!(length, "declared length shorter than the header");
            return Err(Error::MalformedPacket(format!(
                "declared length {length} shorter than the header"
            )));
        }
        if length > buf.len() {
            warn!(length, received = buf.len(), "declared length exceeds received bytes");
            return Err(Error::MalformedPacket(format!(
                "declared length {length} exceeds received {} bytes",
                buf.len()
            )));
        }
        let mut authenticator = [0u8; 16];
        authenticator.copy_from_slice(&buf[4..20]);

        let body = &buf[HEADER_LEN..length];

        // Pass 1: validate framing only.
        let mut offset = 0;
        while offset < body.len() {
            if offset + 2 > body.len() {
                warn!("truncated attribute header");
                return Err(Error::MalformedPacket("truncated attribute header".to_string()));
            }
            let attr_len = body[offset + 1] as usize;
            if attr_len < 2 {
                warn!(attr_len, "attribute length below the 2-byte minimum");
                return Err(Error::MalformedPacket(format!(
                    "attribute length {attr_len} below the 2-byte minimum"
                )));
            }
            if offset + attr_len > body.len() {
                warn!("attribute extends beyond the declared packet length");
                return Err(Error::MalformedPacket(
                    "attribute extends beyond the declared packet length".to_string(),
                ));
            }
            offset += attr_len;
        }
        if offset != body.len() {
            warn!("attribute list does not exactly cover the packet body");
            return Err(Error::MalformedPacket(
                "attribute list does not exactly cover the packet body".to_string(),
            ));
        }

        // Pass 2: materialize attributes.
        let mut attributes = Vec::new();
        offset = 0;
        while offset < body.len() {
            let attr_type = body[offset];
            let attr_len = body[offset + 1] as usize;
            let value = body[offset + 2..offset + attr_len].to_vec();
            attributes.push(Attribute::raw(attr_type, STANDARD_VENDOR, value));
            offset += attr_len;
        }

        debug!(code, identifier, attrs = attributes.len(), "decoded packet");
        Ok(Self {
            code,
            identifier,
            authenticator,
            attributes,
        })
    }
}
