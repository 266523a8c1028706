// radius-client: a client-side RADIUS protocol engine implementing the
// RFC 2865 authentication, RFC 2866 accounting, and RFC 3576 CoA/Disconnect
// wire formats, authenticator cryptography, and UDP exchange loop.
//
// This crate does not listen for RADIUS traffic; it builds, signs, sends,
// and verifies requests against an existing RADIUS server.

pub mod attribute;
pub mod authenticator;
pub mod dictionary;
pub mod error;
pub mod packet;
pub mod requests;
pub mod transport;

pub use attribute::{Attribute, TypedValue, VendorSpecificAttribute};
pub use authenticator::AuthProtocol;
pub use dictionary::{Dictionary, STANDARD_VENDOR};
pub use error::{Error, Result};
pub use packet::{Packet, PacketCode};
pub use requests::{
    decode_typed, AccessRequest, AccountingRequest, CoaRequest, DecodedRequest, DisconnectRequest,
    RequestState,
};
pub use transport::{RadiusClient, TransportConfig};

/// Library version, exposed for diagnostics and user-agent-style logging.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
