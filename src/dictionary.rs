// dictionary.rs - attribute dictionary: name/code lookups, enumerations,
// and the vendor namespace.
//
// A dictionary is built once (either from the bundled standard table via
// `Dictionary::standard()`, or from an application's own text dictionary
// via `load_file`/`load_str`) and is treated as read-only thereafter -
// concurrent readers need no synchronization (spec ambient rule, §5).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Sentinel vendor id meaning "standard attribute, not vendor-specific".
pub const STANDARD_VENDOR: i32 = -1;

/// The value-kind tag that selects how an attribute's bytes are interpreted.
///
/// The factory switches on this tag directly - no subclassing, no
/// reflection-based dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    String,
    Octets,
    Integer,
    Ipv4,
    Ipv6,
    Ipv6Prefix,
    Vsa,
}

impl ValueKind {
    fn from_grammar_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "string" => Some(Self::String),
            "octets" => Some(Self::Octets),
            "integer" => Some(Self::Integer),
            "date" => Some(Self::Integer), // date is encoded like integer
            "ipaddr" => Some(Self::Ipv4),
            "ipv6addr" => Some(Self::Ipv6),
            "ipv6prefix" => Some(Self::Ipv6Prefix),
            _ => None,
        }
    }
}

/// A two-way integer <-> symbolic-name mapping for an `Integer` attribute.
#[derive(Debug, Clone, Default)]
pub struct Enumeration {
    by_value: HashMap<u32, String>,
    by_name: HashMap<String, u32>,
}

impl Enumeration {
    fn insert(&mut self, name: String, value: u32) {
        self.by_value.insert(value, name.clone());
        self.by_name.insert(name, value);
    }

    pub fn name_for(&self, value: u32) -> Option<&str> {
        self.by_value.get(&value).map(String::as_str)
    }

    pub fn value_for(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).copied()
    }
}

/// A dictionary entry: everything needed to encode/decode one attribute.
#[derive(Debug, Clone)]
pub struct AttributeDescriptor {
    pub name: String,
    pub type_code: u8,
    pub vendor_id: i32,
    pub kind: ValueKind,
    pub enumeration: Option<Enumeration>,
}

impl AttributeDescriptor {
    pub fn standard(name: &str, type_code: u8, kind: ValueKind) -> Self {
        Self {
            name: name.to_string(),
            type_code,
            vendor_id: STANDARD_VENDOR,
            kind,
            enumeration: None,
        }
    }

    pub fn vendor(vendor_id: i32, name: &str, type_code: u8, kind: ValueKind) -> Self {
        Self {
            name: name.to_string(),
            type_code,
            vendor_id,
            kind,
            enumeration: None,
        }
    }

    pub fn with_enum_values(mut self, values: &[(&str, u32)]) -> Self {
        let mut e = Enumeration::default();
        for (name, value) in values {
            e.insert((*name).to_string(), *value);
        }
        self.enumeration = Some(e);
        self
    }
}

/// Maps between attribute names, (vendor, code) pairs, and vendor names.
///
/// Within a vendor space `type_code` is unique; globally `name` is unique
/// The dictionary is a plain owned value - no global mutable singleton
/// is required to use one; `Dictionary::standard()` merely caches a
/// lazily-built default via `OnceLock` for callers who want one.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    by_code: HashMap<(i32, u8), Arc<AttributeDescriptor>>,
    by_name: HashMap<String, Arc<AttributeDescriptor>>,
    vendor_names: HashMap<i32, String>,
    vendor_ids: HashMap<String, i32>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide default dictionary, built once from the bundled
    /// table of standard RFC 2865/2866/2869 attributes.
    pub fn standard() -> &'static Dictionary {
        static DEFAULT: OnceLock<Dictionary> = OnceLock::new();
        DEFAULT.get_or_init(build_standard_dictionary)
    }

    pub fn attribute_by_code(&self, vendor_id: i32, type_code: u8) -> Option<&AttributeDescriptor> {
        self.by_code.get(&(vendor_id, type_code)).map(Arc::as_ref)
    }

    pub fn attribute_by_name(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.by_name.get(name).map(Arc::as_ref)
    }

    pub fn vendor_name(&self, vendor_id: i32) -> Option<&str> {
        self.vendor_names.get(&vendor_id).map(String::as_str)
    }

    /// Returns the vendor id for `name`, or `STANDARD_VENDOR` (-1) if unknown.
    pub fn vendor_id(&self, name: &str) -> i32 {
        self.vendor_ids.get(name).copied().unwrap_or(STANDARD_VENDOR)
    }

    pub fn add_vendor(&mut self, id: i32, name: &str) -> Result<()> {
        if id < 0 {
            return Err(Error::InvalidVendorId(id));
        }
        self.vendor_names.insert(id, name.to_string());
        self.vendor_ids.insert(name.to_string(), id);
        Ok(())
    }

    pub fn add_attribute(&mut self, descriptor: AttributeDescriptor) -> Result<()> {
        if descriptor.vendor_id < STANDARD_VENDOR {
            return Err(Error::InvalidVendorId(descriptor.vendor_id));
        }
        if self.by_name.contains_key(&descriptor.name) {
            return Err(Error::DuplicateName(descriptor.name));
        }
        let key = (descriptor.vendor_id, descriptor.type_code);
        if self.by_code.contains_key(&key) {
            return Err(Error::DuplicateCode {
                vendor_id: descriptor.vendor_id,
                code: descriptor.type_code,
            });
        }
        let descriptor = Arc::new(descriptor);
        self.by_code.insert(key, descriptor.clone());
        self.by_name.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    /// Registers an enumeration entry for an already-registered attribute,
    /// as the text grammar's `VALUE` directive does.
    fn add_enum_value(&mut self, attribute_name: &str, enum_name: &str, value: u32) -> Result<()> {
        let descriptor = self
            .by_name
            .get(attribute_name)
            .ok_or_else(|| Error::UnknownAttributeName(attribute_name.to_string()))?;
        let mut updated = (**descriptor).clone();
        updated
            .enumeration
            .get_or_insert_with(Enumeration::default)
            .insert(enum_name.to_string(), value);
        let key = (updated.vendor_id, updated.type_code);
        let updated = Arc::new(updated);
        self.by_code.insert(key, updated.clone());
        self.by_name.insert(attribute_name.to_string(), updated);
        Ok(())
    }

    /// Parses a text dictionary file, following `$INCLUDE` relative to its
    /// directory.
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            warn!(path = %path.display(), error = %e, "failed to read dictionary file");
            Error::DictionarySyntax {
                line: 0,
                message: format!("failed to read {}: {e}", path.display()),
            }
        })?;
        debug!(path = %path.display(), "loading dictionary file");
        let base_dir = path.parent().map(Path::to_path_buf);
        self.load_str_with_base(&text, base_dir.as_deref())
    }

    /// Parses a text dictionary from an in-memory string. `$INCLUDE` fails
    /// with `DictionarySyntax` since there is no base directory to resolve
    /// relative paths against.
    pub fn load_str(&mut self, text: &str) -> Result<()> {
        self.load_str_with_base(text, None)
    }

    fn load_str_with_base(&mut self, text: &str, base_dir: Option<&Path>) -> Result<()> {
        for (idx, raw_line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let tokens: Vec<&str> = line.split_whitespace().collect();
            let directive = tokens[0].to_ascii_uppercase();
            match directive.as_str() {
                "ATTRIBUTE" => self.parse_attribute(&tokens, line_no)?,
                "VALUE" => self.parse_value(&tokens, line_no)?,
                "VENDOR" => self.parse_vendor(&tokens, line_no)?,
                "VENDORATTR" => self.parse_vendorattr(&tokens, line_no)?,
                "$INCLUDE" => self.parse_include(&tokens, base_dir, line_no)?,
                other => {
                    let err = Error::DictionarySyntax {
                        line: line_no,
                        message: format!("unrecognized directive {other}"),
                    };
                    warn!(line = line_no, directive = other, "dictionary syntax error");
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    fn parse_attribute(&mut self, tokens: &[&str], line: usize) -> Result<()> {
        if tokens.len() != 4 {
            return Err(syntax(line, "expected ATTRIBUTE <name> <code> <type>"));
        }
        let name = tokens[1];
        let code: u8 = tokens[2]
            .parse()
            .map_err(|_| syntax(line, "attribute code must be 0-255"))?;
        let kind = ValueKind::from_grammar_token(tokens[3])
            .ok_or_else(|| syntax(line, &format!("unknown attribute type {}", tokens[3])))?;
        self.add_attribute(AttributeDescriptor::standard(name, code, kind))
            .map_err(|e| syntax(line, &e.to_string()))
    }

    fn parse_value(&mut self, tokens: &[&str], line: usize) -> Result<()> {
        if tokens.len() != 4 {
            return Err(syntax(line, "expected VALUE <attribute-name> <enum-name> <integer-value>"));
        }
        let value: u32 = tokens[3]
            .parse()
            .map_err(|_| syntax(line, "enum value must be an unsigned 32-bit integer"))?;
        self.add_enum_value(tokens[1], tokens[2], value)
            .map_err(|e| syntax(line, &e.to_string()))
    }

    fn parse_vendor(&mut self, tokens: &[&str], line: usize) -> Result<()> {
        if tokens.len() != 3 {
            return Err(syntax(line, "expected VENDOR <id> <name>"));
        }
        let id: i32 = tokens[1]
            .parse()
            .map_err(|_| syntax(line, "vendor id must be an integer"))?;
        self.add_vendor(id, tokens[2])
            .map_err(|e| syntax(line, &e.to_string()))
    }

    fn parse_vendorattr(&mut self, tokens: &[&str], line: usize) -> Result<()> {
        if tokens.len() != 5 {
            return Err(syntax(
                line,
                "expected VENDORATTR <vendor-id> <name> <code> <type>",
            ));
        }
        let vendor_id: i32 = tokens[1]
            .parse()
            .map_err(|_| syntax(line, "vendor id must be an integer"))?;
        let code: u8 = tokens[3]
            .parse()
            .map_err(|_| syntax(line, "attribute code must be 0-255"))?;
        let kind = ValueKind::from_grammar_token(tokens[4])
            .ok_or_else(|| syntax(line, &format!("unknown attribute type {}", tokens[4])))?;
        self.add_attribute(AttributeDescriptor::vendor(vendor_id, tokens[2], code, kind))
            .map_err(|e| syntax(line, &e.to_string()))
    }

    fn parse_include(&mut self, tokens: &[&str], base_dir: Option<&Path>, line: usize) -> Result<()> {
        if tokens.len() != 2 {
            return Err(syntax(line, "expected $INCLUDE <path>"));
        }
        let base_dir = base_dir.ok_or_else(|| {
            syntax(line, "$INCLUDE requires a file-backed dictionary (use load_file)")
        })?;
        let included: PathBuf = base_dir.join(tokens[1]);
        self.load_file(&included)
    }
}

fn syntax(line: usize, message: &str) -> Error {
    warn!(line, message, "dictionary syntax error");
    Error::DictionarySyntax {
        line,
        message: message.to_string(),
    }
}

fn build_standard_dictionary() -> Dictionary {
    let mut dict = Dictionary::new();
    for (name, code, kind) in STANDARD_ATTRIBUTES {
        dict.add_attribute(AttributeDescriptor::standard(name, *code, *kind))
            .expect("bundled standard attribute table must be internally consistent");
    }
    dict.add_attribute(
        AttributeDescriptor::standard("Service-Type", 6, ValueKind::Integer).with_enum_values(&[
            ("Login", 1),
            ("Framed", 2),
            ("Callback-Login", 3),
            ("Callback-Framed", 4),
            ("Outbound", 5),
            ("Administrative", 6),
            ("NAS-Prompt", 7),
            ("Authenticate-Only", 8),
            ("Callback-NAS-Prompt", 9),
        ]),
    )
    .expect("duplicate Service-Type");
    dict.add_attribute(
        AttributeDescriptor::standard("Acct-Status-Type", 40, ValueKind::Integer).with_enum_values(&[
            ("Start", 1),
            ("Stop", 2),
            ("Interim-Update", 3),
            ("Accounting-On", 7),
            ("Accounting-Off", 8),
        ]),
    )
    .expect("duplicate Acct-Status-Type");

    dict.add_vendor(311, "Microsoft").expect("builtin vendor");
    dict.add_attribute(AttributeDescriptor::vendor(
        311,
        "MS-CHAP-Challenge",
        11,
        ValueKind::Octets,
    ))
    .expect("builtin vendor attribute");
    dict.add_attribute(AttributeDescriptor::vendor(
        311,
        "MS-CHAP2-Response",
        25,
        ValueKind::Octets,
    ))
    .expect("builtin vendor attribute");

    dict
}

/// RFC 2865/2866/2869 standard attributes (excluding the two with
/// enumerations, added separately above).
const STANDARD_ATTRIBUTES: &[(&str, u8, ValueKind)] = &[
    ("User-Name", 1, ValueKind::String),
    ("User-Password", 2, ValueKind::Octets),
    ("CHAP-Password", 3, ValueKind::Octets),
    ("NAS-IP-Address", 4, ValueKind::Ipv4),
    ("NAS-Port", 5, ValueKind::Integer),
    ("Framed-Protocol", 7, ValueKind::Integer),
    ("Framed-IP-Address", 8, ValueKind::Ipv4),
    ("Framed-IP-Netmask", 9, ValueKind::Ipv4),
    ("Filter-Id", 11, ValueKind::String),
    ("Framed-MTU", 12, ValueKind::Integer),
    ("Reply-Message", 18, ValueKind::String),
    ("State", 24, ValueKind::Octets),
    ("Class", 25, ValueKind::Octets),
    ("Vendor-Specific", 26, ValueKind::Vsa),
    ("Session-Timeout", 27, ValueKind::Integer),
    ("Idle-Timeout", 28, ValueKind::Integer),
    ("Called-Station-Id", 30, ValueKind::String),
    ("Calling-Station-Id", 31, ValueKind::String),
    ("NAS-Identifier", 32, ValueKind::String),
    ("Proxy-State", 33, ValueKind::Octets),
    ("Acct-Session-Id", 44, ValueKind::String),
    ("Acct-Input-Octets", 42, ValueKind::Integer),
    ("Acct-Output-Octets", 43, ValueKind::Integer),
    ("Acct-Delay-Time", 41, ValueKind::Integer),
    ("CHAP-Challenge", 60, ValueKind::Octets),
    ("NAS-Port-Type", 61, ValueKind::Integer),
    ("Event-Timestamp", 55, ValueKind::Integer),
    ("Message-Authenticator", 80, ValueKind::Octets),
    ("Framed-IPv6-Prefix", 97, ValueKind::Ipv6Prefix),
    ("EAP-Message", 79, ValueKind::Octets),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_dictionary_resolves_user_name() {
        let dict = Dictionary::standard();
        let d = dict.attribute_by_name("User-Name").unwrap();
        assert_eq!(d.type_code, 1);
        assert_eq!(d.vendor_id, STANDARD_VENDOR);
        let by_code = dict.attribute_by_code(STANDARD_VENDOR, 1).unwrap();
        assert_eq!(by_code.name, "User-Name");
    }

    #[test]
    fn enumeration_round_trips_both_directions() {
        let dict = Dictionary::standard();
        let d = dict.attribute_by_name("Acct-Status-Type").unwrap();
        let e = d.enumeration.as_ref().unwrap();
        assert_eq!(e.name_for(1), Some("Start"));
        assert_eq!(e.value_for("Stop"), Some(2));
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut dict = Dictionary::new();
        dict.add_attribute(AttributeDescriptor::standard("Foo", 1, ValueKind::String))
            .unwrap();
        let err = dict
            .add_attribute(AttributeDescriptor::standard("Foo", 2, ValueKind::String))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateName(_)));
    }

    #[test]
    fn duplicate_code_within_vendor_rejected() {
        let mut dict = Dictionary::new();
        dict.add_attribute(AttributeDescriptor::standard("Foo", 1, ValueKind::String))
            .unwrap();
        let err = dict
            .add_attribute(AttributeDescriptor::standard("Bar", 1, ValueKind::String))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateCode { .. }));
    }

    #[test]
    fn same_code_allowed_across_vendors() {
        let mut dict = Dictionary::new();
        dict.add_vendor(311, "Microsoft").unwrap();
        dict.add_attribute(AttributeDescriptor::standard("Foo", 1, ValueKind::String))
            .unwrap();
        dict.add_attribute(AttributeDescriptor::vendor(311, "Bar", 1, ValueKind::String))
            .unwrap();
    }

    #[test]
    fn negative_vendor_id_rejected() {
        let mut dict = Dictionary::new();
        let err = dict.add_vendor(-5, "Bad").unwrap_err();
        assert!(matches!(err, Error::InvalidVendorId(-5)));
    }

    #[test]
    fn unknown_vendor_name_returns_sentinel() {
        let dict = Dictionary::new();
        assert_eq!(dict.vendor_id("Nobody"), STANDARD_VENDOR);
    }

    #[test]
    fn text_grammar_loads_vendor_and_vsa() {
        let mut dict = Dictionary::new();
        dict.load_str(
            "# comment\nVENDOR 311 Microsoft\nVENDORATTR 311 MS-CHAP-Challenge 11 octets\n",
        )
        .unwrap();
        let d = dict.attribute_by_name("MS-CHAP-Challenge").unwrap();
        assert_eq!(d.vendor_id, 311);
        assert_eq!(d.kind, ValueKind::Octets);
    }

    #[test]
    fn text_grammar_rejects_unknown_directive() {
        let mut dict = Dictionary::new();
        let err = dict.load_str("BOGUS foo bar\n").unwrap_err();
        match err {
            Error::DictionarySyntax { line, .. } => assert_eq!(line, 1),
            other => panic!("expected DictionarySyntax, got {other:?}"),
        }
    }

    #[test]
    fn value_directive_registers_enum() {
        let mut dict = Dictionary::new();
        dict.load_str("ATTRIBUTE Foo 1 integer\nVALUE Foo Bar 7\n")
            .unwrap();
        let d = dict.attribute_by_name("Foo").unwrap();
        assert_eq!(d.enumeration.as_ref().unwrap().value_for("Bar"), Some(7));
    }
}
