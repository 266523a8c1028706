// error.rs - error kinds for the RADIUS protocol engine
//
// One variant per error kind in the protocol design; every variant carries
// an informative message so callers never have to guess what went wrong.

use thiserror::Error;

/// Errors raised by the dictionary, codec, and authenticator engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Header or attribute-list framing is internally inconsistent.
    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    /// A typed attribute's length did not match what its value-kind requires.
    #[error("bad attribute length for {attribute}: expected {expected}, got {actual}")]
    BadAttributeLength {
        attribute: String,
        expected: String,
        actual: usize,
    },

    /// The inner TLV walk of a Vendor-Specific Attribute did not consume
    /// exactly its declared payload.
    #[error("malformed vendor-specific attribute: {0}")]
    MalformedVsa(String),

    /// A sub-attribute's vendor id did not match its container's.
    #[error("vendor id mismatch: container is vendor {container}, attribute is vendor {attribute}")]
    VendorIdMismatch { container: i32, attribute: i32 },

    /// A Vendor-Specific Attribute's total payload would not fit in one attribute.
    #[error("vendor-specific attribute payload too large: {0} bytes")]
    OversizedVsa(usize),

    /// A decoded response's identifier did not match the outstanding request's.
    #[error("identifier mismatch: request {request}, response {response}")]
    IdentifierMismatch { request: u8, response: u8 },

    /// A response's Response Authenticator did not verify against the shared secret.
    #[error("response authenticator verification failed")]
    BadResponseAuthenticator,

    /// An Accounting/CoA/Disconnect request's Request Authenticator did not verify.
    #[error("request authenticator verification failed")]
    BadRequestAuthenticator,

    /// The encoded packet would exceed the 4096-byte RADIUS maximum.
    #[error("encoded packet too long: {0} bytes (maximum 4096)")]
    PacketTooLong(usize),

    /// An Access-Request carried no attributes recognized as credentials.
    #[error("missing credentials: no recognized authentication attributes present")]
    MissingCredentials,

    /// A credential (PAP password, CHAP response) did not match the
    /// plaintext password on file.
    #[error("credential verification failed")]
    CredentialMismatch,

    /// A mandatory attribute for this packet-type facade was absent or invalid.
    #[error("missing mandatory attribute {0}")]
    MissingMandatoryAttribute(String),

    /// Password verification was requested for a protocol this crate cannot verify.
    #[error("unsupported authentication protocol: {0:?}")]
    UnsupportedAuthProtocol(crate::authenticator::AuthProtocol),

    /// A name-based dictionary lookup found no matching attribute.
    #[error("unknown attribute name: {0}")]
    UnknownAttributeName(String),

    /// Dictionary registration rejected a duplicate attribute name.
    #[error("duplicate attribute name: {0}")]
    DuplicateName(String),

    /// Dictionary registration rejected a duplicate (vendor, code) pair.
    #[error("duplicate attribute code {code} for vendor {vendor_id}")]
    DuplicateCode { vendor_id: i32, code: u8 },

    /// Dictionary registration was given a negative vendor id.
    #[error("invalid vendor id: {0}")]
    InvalidVendorId(i32),

    /// The text dictionary grammar rejected a line.
    #[error("dictionary syntax error at line {line}: {message}")]
    DictionarySyntax { line: usize, message: String },

    /// A transport exchange exhausted all retries without a reply.
    #[error("transport timed out after {attempts} attempt(s)")]
    TransportTimeout { attempts: u32 },

    /// The underlying socket failed for a reason other than a timeout.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
