// attribute.rs - typed attribute values and the Vendor-Specific container.
//
// One sum type instead of a class hierarchy: the dictionary descriptor's
// value-kind tag selects a `TypedValue` variant directly, no subclass
// and no reflection-based dispatch.

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::dictionary::{AttributeDescriptor, Dictionary, Enumeration, ValueKind, STANDARD_VENDOR};
use crate::error::{Error, Result};

/// A wire-level attribute: type code, vendor namespace, and raw value bytes.
///
/// `vendor_id == STANDARD_VENDOR` (-1) means "not vendor-specific".
/// `data` is always the value portion only (0..=253 bytes), never including
/// the `[type][length]` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub type_code: u8,
    pub vendor_id: i32,
    pub data: Vec<u8>,
}

impl Attribute {
    pub fn raw(type_code: u8, vendor_id: i32, data: Vec<u8>) -> Self {
        Self {
            type_code,
            vendor_id,
            data,
        }
    }

    /// Wraps an already-built Vendor-Specific container as a type-26 attribute.
    pub fn from_vsa(vsa: &VendorSpecificAttribute) -> Result<Self> {
        Ok(Self {
            type_code: VSA_TYPE_CODE,
            vendor_id: STANDARD_VENDOR,
            data: vsa.write()?,
        })
    }

    /// Builds an attribute by looking `name` up in `dict` and serializing `value`.
    pub fn from_value(dict: &Dictionary, name: &str, value: TypedValue) -> Result<Self> {
        let descriptor = dict
            .attribute_by_name(name)
            .ok_or_else(|| Error::UnknownAttributeName(name.to_string()))?;
        let data = value.write()?;
        Ok(Self {
            type_code: descriptor.type_code,
            vendor_id: descriptor.vendor_id,
            data,
        })
    }

    fn descriptor<'d>(&self, dict: &'d Dictionary) -> Option<&'d AttributeDescriptor> {
        dict.attribute_by_code(self.vendor_id, self.type_code)
    }

    /// The dictionary-resolved value kind, falling back to `Octets` when the
    /// dictionary has no entry, falling back to the raw octet view.
    pub fn value_kind(&self, dict: &Dictionary) -> ValueKind {
        // Type code 26 is reserved for Vendor-Specific by the protocol
        // itself, independent of whether a dictionary happens to register it.
        if self.type_code == VSA_TYPE_CODE && self.vendor_id == STANDARD_VENDOR {
            return ValueKind::Vsa;
        }
        self.descriptor(dict).map(|d| d.kind).unwrap_or(ValueKind::Octets)
    }

    pub fn name<'d>(&self, dict: &'d Dictionary) -> Option<&'d str> {
        self.descriptor(dict).map(|d| d.name.as_str())
    }

    /// Decodes `data` into a typed view according to the dictionary.
    pub fn typed_value(&self, dict: &Dictionary) -> Result<TypedValue> {
        TypedValue::read(self.value_kind(dict), &self.data)
    }

    /// Text rendering, falling back to hex octets if the dictionary-selected
    /// kind fails to parse the stored bytes.
    pub fn as_string(&self, dict: &Dictionary) -> String {
        let descriptor = self.descriptor(dict);
        let kind = descriptor.map(|d| d.kind).unwrap_or(ValueKind::Octets);
        match TypedValue::read(kind, &self.data) {
            Ok(value) => value.as_string(descriptor.and_then(|d| d.enumeration.as_ref())),
            Err(_) => octets_to_hex(&self.data),
        }
    }
}

/// 2..18 byte IPv6-prefix value: `[reserved=0][prefix-length][prefix-bytes]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv6Prefix {
    pub prefix_len: u8,
    pub addr: Ipv6Addr,
}

/// The decoded form of an attribute's value, tagged by `ValueKind`.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    String(String),
    Octets(Vec<u8>),
    Integer(u32),
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
    Ipv6Prefix(Ipv6Prefix),
    Vsa(VendorSpecificAttribute),
}

impl TypedValue {
    /// Parses `value_bytes` (the attribute's value, header already stripped)
    /// as `kind`, enforcing each kind's length contract.
    pub fn read(kind: ValueKind, value_bytes: &[u8]) -> Result<TypedValue> {
        match kind {
            ValueKind::String => {
                require_total_len(kind, value_bytes.len(), 2, 255)?;
                // `from_utf8_lossy` substitutes U+FFFD for invalid sequences;
                // the original bytes remain available via `Attribute::data`,
                // so no information is actually discarded overall.
                Ok(TypedValue::String(String::from_utf8_lossy(value_bytes).into_owned()))
            }
            ValueKind::Octets => {
                require_total_len(kind, value_bytes.len(), 2, 255)?;
                Ok(TypedValue::Octets(value_bytes.to_vec()))
            }
            ValueKind::Integer => {
                require_total_len(kind, value_bytes.len(), 6, 6)?;
                let bytes: [u8; 4] = value_bytes.try_into().unwrap();
                Ok(TypedValue::Integer(u32::from_be_bytes(bytes)))
            }
            ValueKind::Ipv4 => {
                require_total_len(kind, value_bytes.len(), 6, 6)?;
                Ok(TypedValue::Ipv4(Ipv4Addr::new(
                    value_bytes[0],
                    value_bytes[1],
                    value_bytes[2],
                    value_bytes[3],
                )))
            }
            ValueKind::Ipv6 => {
                require_total_len(kind, value_bytes.len(), 18, 18)?;
                let bytes: [u8; 16] = value_bytes.try_into().unwrap();
                Ok(TypedValue::Ipv6(Ipv6Addr::from(bytes)))
            }
            ValueKind::Ipv6Prefix => {
                require_total_len(kind, value_bytes.len(), 4, 20)?;
                let prefix_len = value_bytes[1];
                let mut addr_bytes = [0u8; 16];
                let prefix_bytes = &value_bytes[2..];
                addr_bytes[..prefix_bytes.len()].copy_from_slice(prefix_bytes);
                Ok(TypedValue::Ipv6Prefix(Ipv6Prefix {
                    prefix_len,
                    addr: Ipv6Addr::from(addr_bytes),
                }))
            }
            ValueKind::Vsa => Ok(TypedValue::Vsa(VendorSpecificAttribute::read(value_bytes)?)),
        }
    }

    /// Serializes back to the attribute's value bytes (header not included).
    pub fn write(&self) -> Result<Vec<u8>> {
        match self {
            TypedValue::String(s) => Ok(s.as_bytes().to_vec()),
            TypedValue::Octets(b) => Ok(b.clone()),
            TypedValue::Integer(v) => Ok(v.to_be_bytes().to_vec()),
            TypedValue::Ipv4(a) => Ok(a.octets().to_vec()),
            TypedValue::Ipv6(a) => Ok(a.octets().to_vec()),
            TypedValue::Ipv6Prefix(p) => {
                let mut out = Vec::with_capacity(18);
                out.push(0);
                out.push(p.prefix_len);
                out.extend_from_slice(&p.addr.octets());
                Ok(out)
            }
            TypedValue::Vsa(vsa) => vsa.write(),
        }
    }

    /// Parses a textual representation into a typed value, using `enumeration`
    /// (if any) to resolve symbolic integer names.
    pub fn set_from_string(kind: ValueKind, text: &str, enumeration: Option<&Enumeration>) -> Result<TypedValue> {
        match kind {
            ValueKind::String => Ok(TypedValue::String(text.to_string())),
            ValueKind::Octets => {
                let hex_digits = text
                    .strip_prefix("0x")
                    .ok_or_else(|| Error::MalformedPacket(format!("octets text must start with 0x: {text}")))?;
                Ok(TypedValue::Octets(hex_to_octets(hex_digits)?))
            }
            ValueKind::Integer => {
                if let Some(e) = enumeration {
                    if let Some(v) = e.value_for(text) {
                        return Ok(TypedValue::Integer(v));
                    }
                }
                let v: u32 = text
                    .parse()
                    .map_err(|_| Error::MalformedPacket(format!("not a valid integer or enum name: {text}")))?;
                Ok(TypedValue::Integer(v))
            }
            ValueKind::Ipv4 => {
                let a: Ipv4Addr = text
                    .parse()
                    .map_err(|_| Error::MalformedPacket(format!("not a valid IPv4 address: {text}")))?;
                Ok(TypedValue::Ipv4(a))
            }
            ValueKind::Ipv6 => {
                let a: Ipv6Addr = text
                    .parse()
                    .map_err(|_| Error::MalformedPacket(format!("not a valid IPv6 address: {text}")))?;
                Ok(TypedValue::Ipv6(a))
            }
            ValueKind::Ipv6Prefix => {
                let (addr_text, len_text) = text
                    .split_once('/')
                    .ok_or_else(|| Error::MalformedPacket(format!("expected <addr>/<prefix-length>: {text}")))?;
                let addr: Ipv6Addr = addr_text
                    .parse()
                    .map_err(|_| Error::MalformedPacket(format!("not a valid IPv6 address: {addr_text}")))?;
                let prefix_len: u8 = len_text
                    .parse()
                    .map_err(|_| Error::MalformedPacket(format!("not a valid prefix length: {len_text}")))?;
                Ok(TypedValue::Ipv6Prefix(Ipv6Prefix { prefix_len, addr }))
            }
            ValueKind::Vsa => Err(Error::MalformedPacket(
                "vendor-specific attributes cannot be set from a string".to_string(),
            )),
        }
    }

    /// Text rendering (enumeration name preferred for integers, when one resolves).
    pub fn as_string(&self, enumeration: Option<&Enumeration>) -> String {
        match self {
            TypedValue::String(s) => s.clone(),
            TypedValue::Octets(b) => octets_to_hex(b),
            TypedValue::Integer(v) => enumeration
                .and_then(|e| e.name_for(*v))
                .map(str::to_string)
                .unwrap_or_else(|| v.to_string()),
            TypedValue::Ipv4(a) => a.to_string(),
            TypedValue::Ipv6(a) => a.to_string(),
            TypedValue::Ipv6Prefix(p) => format!("{}/{}", p.addr, p.prefix_len),
            TypedValue::Vsa(vsa) => format!("Vendor-Specific({})", vsa.vendor_id),
        }
    }
}

fn require_total_len(kind: ValueKind, value_len: usize, min_total: usize, max_total: usize) -> Result<()> {
    let total = value_len + 2;
    if total < min_total || total > max_total {
        return Err(Error::BadAttributeLength {
            attribute: format!("{kind:?}"),
            expected: if min_total == max_total {
                format!("{min_total}")
            } else {
                format!("{min_total}..={max_total}")
            },
            actual: total,
        });
    }
    Ok(())
}

fn octets_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(2 + bytes.len() * 2);
    s.push_str("0x");
    for b in bytes {
        s.push_str(&format!("{b:02x}"));
    }
    s
}

fn hex_to_octets(hex: &str) -> Result<Vec<u8>> {
    if !hex.len().is_multiple_of(2) {
        return Err(Error::MalformedPacket(format!("odd-length hex string: {hex}")));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| Error::MalformedPacket(format!("invalid hex digit in: {hex}")))
        })
        .collect()
}

/// The Vendor-Specific Attribute container (type code 26).
///
/// Sub-attributes keep insertion order on write - the RFC does not mandate
/// sorting within a VSA, and some vendor NAS firmwares are order-sensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorSpecificAttribute {
    pub vendor_id: i32,
    pub sub_attributes: Vec<Attribute>,
}

pub const VSA_TYPE_CODE: u8 = 26;

impl VendorSpecificAttribute {
    pub fn new(vendor_id: i32) -> Self {
        Self {
            vendor_id,
            sub_attributes: Vec::new(),
        }
    }

    pub fn add_sub(&mut self, attr: Attribute) -> Result<()> {
        if attr.vendor_id != self.vendor_id {
            return Err(Error::VendorIdMismatch {
                container: self.vendor_id,
                attribute: attr.vendor_id,
            });
        }
        self.sub_attributes.push(attr);
        Ok(())
    }

    /// Serializes `[vendor_id:4][sub-attrs...]`, the value portion of the
    /// type-26 attribute (header not included).
    pub fn write(&self) -> Result<Vec<u8>> {
        let mut payload_len = 4;
        for sub in &self.sub_attributes {
            payload_len += 2 + sub.data.len();
        }
        let total_attr_len = 2 + payload_len;
        if total_attr_len >= 256 {
            return Err(Error::OversizedVsa(total_attr_len));
        }
        let mut out = Vec::with_capacity(payload_len);
        out.extend_from_slice(&(self.vendor_id as u32).to_be_bytes());
        for sub in &self.sub_attributes {
            out.push(sub.type_code);
            out.push((2 + sub.data.len()) as u8);
            out.extend_from_slice(&sub.data);
        }
        Ok(out)
    }

    /// Parses the value portion of a type-26 attribute.
    pub fn read(value_bytes: &[u8]) -> Result<Self> {
        if value_bytes.len() < 4 {
            return Err(Error::MalformedVsa(format!(
                "value too short for vendor id: {} bytes",
                value_bytes.len()
            )));
        }
        let vendor_id = u32::from_be_bytes(value_bytes[0..4].try_into().unwrap()) as i32;
        let sub_bytes = &value_bytes[4..];

        let mut sub_attributes = Vec::new();
        let mut offset = 0;
        while offset < sub_bytes.len() {
            if offset + 2 > sub_bytes.len() {
                return Err(Error::MalformedVsa("truncated sub-attribute header".to_string()));
            }
            let sub_type = sub_bytes[offset];
            let sub_len = sub_bytes[offset + 1] as usize;
            if sub_len < 2 {
                return Err(Error::MalformedVsa(format!("sub-attribute length {sub_len} < 2")));
            }
            if offset + sub_len > sub_bytes.len() {
                return Err(Error::MalformedVsa(
                    "sub-attribute extends beyond vendor-specific payload".to_string(),
                ));
            }
            let value = sub_bytes[offset + 2..offset + sub_len].to_vec();
            sub_attributes.push(Attribute::raw(sub_type, vendor_id, value));
            offset += sub_len;
        }
        if offset != sub_bytes.len() {
            return Err(Error::MalformedVsa(
                "sub-attribute walk did not exactly consume the declared payload".to_string(),
            ));
        }

        Ok(Self {
            vendor_id,
            sub_attributes,
        })
    }
}

/// Convenience constructor for a plain standard attribute (non-vendor).
pub fn standard_attribute(type_code: u8, data: Vec<u8>) -> Attribute {
    Attribute::raw(type_code, STANDARD_VENDOR, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::Dictionary;

    #[test]
    fn string_round_trips() {
        let v = TypedValue::read(ValueKind::String, b"nemo").unwrap();
        assert_eq!(v, TypedValue::String("nemo".to_string()));
        assert_eq!(v.write().unwrap(), b"nemo");
    }

    #[test]
    fn zero_length_string_is_valid() {
        let v = TypedValue::read(ValueKind::String, b"").unwrap();
        assert_eq!(v, TypedValue::String(String::new()));
    }

    #[test]
    fn max_length_attribute_253_bytes() {
        let data = vec![b'x'; 253];
        let v = TypedValue::read(ValueKind::Octets, &data).unwrap();
        assert_eq!(v.write().unwrap(), data);
    }

    #[test]
    fn integer_does_not_sign_extend() {
        let v = TypedValue::read(ValueKind::Integer, &[0xFF, 0xFF, 0xFF, 0xFF]).unwrap();
        assert_eq!(v, TypedValue::Integer(0xFFFF_FFFF));
    }

    #[test]
    fn integer_requires_exactly_four_bytes() {
        let err = TypedValue::read(ValueKind::Integer, &[1, 2, 3]).unwrap_err();
        assert!(matches!(err, Error::BadAttributeLength { .. }));
    }

    #[test]
    fn ipv4_renders_dotted_decimal() {
        let v = TypedValue::read(ValueKind::Ipv4, &[10, 0, 0, 1]).unwrap();
        assert_eq!(v.as_string(None), "10.0.0.1");
    }

    #[test]
    fn ipv6_prefix_zero_length() {
        let v = TypedValue::read(ValueKind::Ipv6Prefix, &[0, 0]).unwrap();
        assert_eq!(v.as_string(None), "::/0");
    }

    #[test]
    fn ipv6_prefix_full_length() {
        let v = TypedValue::read(
            ValueKind::Ipv6Prefix,
            &[0, 128, 0x20, 1, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1],
        )
        .unwrap();
        assert_eq!(v.as_string(None), "2001:db8::1/128");
    }

    #[test]
    fn octets_render_lowercase_hex() {
        let v = TypedValue::Octets(vec![0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(v.as_string(None), "0xdeadbeef");
    }

    #[test]
    fn vsa_round_trip() {
        let mut vsa = VendorSpecificAttribute::new(311);
        vsa.add_sub(Attribute::raw(11, 311, vec![1, 2, 3, 4])).unwrap();
        vsa.add_sub(Attribute::raw(25, 311, vec![5, 6])).unwrap();
        let bytes = vsa.write().unwrap();
        let parsed = VendorSpecificAttribute::read(&bytes).unwrap();
        assert_eq!(parsed, vsa);
    }

    #[test]
    fn vsa_rejects_mismatched_vendor_on_add() {
        let mut vsa = VendorSpecificAttribute::new(311);
        let err = vsa.add_sub(Attribute::raw(11, 9, vec![1])).unwrap_err();
        assert!(matches!(err, Error::VendorIdMismatch { .. }));
    }

    #[test]
    fn vsa_rejects_short_sublen() {
        // vendor id (4 bytes) + one sub-attribute header claiming length 1
        let bytes = [0, 0, 1, 55, 11, 1];
        let err = VendorSpecificAttribute::read(&bytes).unwrap_err();
        assert!(matches!(err, Error::MalformedVsa(_)));
    }

    #[test]
    fn vsa_rejects_oversized_payload() {
        let mut vsa = VendorSpecificAttribute::new(1);
        vsa.add_sub(Attribute::raw(1, 1, vec![0u8; 253])).unwrap();
        let err = vsa.write().unwrap_err();
        assert!(matches!(err, Error::OversizedVsa(_)));
    }

    #[test]
    fn attribute_from_value_uses_dictionary() {
        let dict = Dictionary::standard();
        let attr = Attribute::from_value(dict, "NAS-Port", TypedValue::Integer(5)).unwrap();
        assert_eq!(attr.type_code, 5);
        assert_eq!(attr.typed_value(dict).unwrap(), TypedValue::Integer(5));
    }

    #[test]
    fn unknown_code_falls_back_to_octets() {
        let dict = Dictionary::new();
        let attr = Attribute::raw(200, STANDARD_VENDOR, vec![1, 2, 3]);
        assert_eq!(attr.value_kind(&dict), ValueKind::Octets);
        assert_eq!(attr.as_string(&dict), "0x010203");
    }
}
