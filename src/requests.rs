// requests.rs - packet-type facades and the request lifecycle.
//
// Each facade enforces the mandatory attributes for its packet type and
// picks the right authenticator construction before handing the packet to
// the transport. `RequestState` tracks what has and hasn't happened yet to
// a given request so a caller can't, say, retransmit before the first
// authenticator was ever computed.

use crate::attribute::{Attribute, TypedValue};
use crate::authenticator::{self, AuthProtocol};
use crate::dictionary::{Dictionary, STANDARD_VENDOR};
use crate::error::{Error, Result};
use crate::packet::{Packet, PacketCode};

const USER_NAME: &str = "User-Name";
const ACCT_STATUS_TYPE: &str = "Acct-Status-Type";

/// Where a request sits in its lifecycle.
///
/// Retries move `InFlight` back to `InFlight`, never back through `Built`:
/// the authenticator computed at `Encoded` is reused verbatim across
/// retransmissions of the same request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestState {
    Built,
    Encoded,
    InFlight,
    Responded { verified: bool },
    TimedOut,
}

fn mandatory_user_name(packet: &Packet, dict: &Dictionary) -> Result<()> {
    if packet.get_by_name(dict, USER_NAME).is_none() {
        return Err(Error::MissingMandatoryAttribute(USER_NAME.to_string()));
    }
    Ok(())
}

/// An Access-Request under construction, ahead of transport.
#[derive(Debug)]
pub struct AccessRequest {
    pub packet: Packet,
    pub state: RequestState,
    /// Which credential mechanism this request carries, once known.
    pub auth_protocol: Option<AuthProtocol>,
}

impl AccessRequest {
    /// Builds a PAP Access-Request. `secret` is consumed immediately to
    /// obfuscate `password`; it is not retained on the struct.
    pub fn pap(dict: &Dictionary, user_name: &str, password: &str, secret: &[u8]) -> Result<Self> {
        let mut packet = Packet::outbound(PacketCode::AccessRequest.as_u8());
        authenticator::sign_access_request(&mut packet, secret);
        packet.add_attribute(Attribute::from_value(
            dict,
            USER_NAME,
            TypedValue::String(user_name.to_string()),
        )?);
        let encrypted = authenticator::pap_encrypt(password, secret, &packet.authenticator);
        packet.add_attribute(Attribute::raw(2, STANDARD_VENDOR, encrypted));
        mandatory_user_name(&packet, dict)?;
        Ok(Self {
            packet,
            state: RequestState::Encoded,
            auth_protocol: Some(AuthProtocol::Pap),
        })
    }

    /// Builds a CHAP Access-Request with a freshly drawn challenge and id.
    /// `secret` signs the Request Authenticator exactly as it does for PAP -
    /// every Access-Request uses the same `MD5(secret || random)`
    /// construction regardless of which credential mechanism it carries.
    pub fn chap(dict: &Dictionary, user_name: &str, password: &str, secret: &[u8]) -> Result<Self> {
        let mut packet = Packet::outbound(PacketCode::AccessRequest.as_u8());
        authenticator::sign_access_request(&mut packet, secret);

        packet.add_attribute(Attribute::from_value(
            dict,
            USER_NAME,
            TypedValue::String(user_name.to_string()),
        )?);
        let challenge = authenticator::generate_chap_challenge();
        let chap_id = authenticator::generate_chap_id();
        let response = authenticator::chap_compute(chap_id, password, &challenge);
        packet.add_attribute(Attribute::raw(3, STANDARD_VENDOR, response.to_vec()));
        packet.add_attribute(Attribute::raw(60, STANDARD_VENDOR, challenge.to_vec()));

        mandatory_user_name(&packet, dict)?;
        Ok(Self {
            packet,
            state: RequestState::Encoded,
            auth_protocol: Some(AuthProtocol::Chap),
        })
    }

    /// Wraps an already-decoded Access-Request packet, verifying its
    /// credentials against `secret`/`cleartext_password`. Fails with
    /// `MissingCredentials` if no recognized credential attribute is
    /// present, with `CredentialMismatch` if the password doesn't match, or
    /// propagates whatever else `verify_password` returns (e.g.
    /// `UnsupportedAuthProtocol` for MS-CHAPv2/EAP).
    pub fn from_packet(
        packet: Packet,
        dict: &Dictionary,
        secret: &[u8],
        cleartext_password: &str,
    ) -> Result<Self> {
        let protocol = AuthProtocol::classify(&packet).ok_or(Error::MissingCredentials)?;
        if !authenticator::verify_password(&packet, dict, secret, cleartext_password)? {
            return Err(Error::CredentialMismatch);
        }
        Ok(Self {
            packet,
            state: RequestState::Encoded,
            auth_protocol: Some(protocol),
        })
    }

    /// Wraps an already-decoded packet without attempting credential
    /// verification - used by [`decode_typed`] where no secret/password is
    /// in scope yet. `auth_protocol` is set from whatever credential
    /// attributes are present, or left `None` if none are recognized.
    fn from_decoded(packet: Packet) -> Self {
        let auth_protocol = AuthProtocol::classify(&packet);
        Self {
            packet,
            state: RequestState::Encoded,
            auth_protocol,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        self.packet.encode()
    }

    /// Validates a decoded Access-Accept/Access-Reject/Access-Challenge
    /// against this request's authenticator and advances the state.
    pub fn verify_response(&mut self, response: &Packet, secret: &[u8]) -> Result<()> {
        if response.identifier != self.packet.identifier {
            return Err(Error::IdentifierMismatch {
                request: self.packet.identifier,
                response: response.identifier,
            });
        }
        let outcome = authenticator::verify_response(response, &self.packet.authenticator, secret);
        self.state = RequestState::Responded {
            verified: outcome.is_ok(),
        };
        outcome
    }
}

/// An Accounting-Request under construction. Mandatory:
/// `User-Name` and an `Acct-Status-Type` in 1..=15.
#[derive(Debug)]
pub struct AccountingRequest {
    pub packet: Packet,
    pub state: RequestState,
}

impl AccountingRequest {
    pub fn new(dict: &Dictionary, user_name: &str, status_type: u32, secret: &[u8]) -> Result<Self> {
        if status_type == 0 || status_type > 15 {
            return Err(Error::MissingMandatoryAttribute(format!(
                "Acct-Status-Type must be in 1..=15, got {status_type}"
            )));
        }
        let mut packet = Packet::outbound(PacketCode::AccountingRequest.as_u8());
        packet.add_attribute(Attribute::from_value(
            dict,
            USER_NAME,
            TypedValue::String(user_name.to_string()),
        )?);
        packet.add_attribute(Attribute::from_value(
            dict,
            ACCT_STATUS_TYPE,
            TypedValue::Integer(status_type),
        )?);
        mandatory_user_name(&packet, dict)?;
        if packet.get_by_name(dict, ACCT_STATUS_TYPE).is_none() {
            return Err(Error::MissingMandatoryAttribute(ACCT_STATUS_TYPE.to_string()));
        }
        authenticator::sign_deterministic_request(&mut packet, secret)?;
        Ok(Self {
            packet,
            state: RequestState::Encoded,
        })
    }

    /// Appends an attribute before the authenticator has been (re-)signed.
    /// Must be called before transport; re-signs to keep the authenticator
    /// consistent with the final attribute set.
    pub fn add_attribute(&mut self, attribute: Attribute, secret: &[u8]) -> Result<()> {
        self.packet.add_attribute(attribute);
        authenticator::sign_deterministic_request(&mut self.packet, secret)
    }

    /// Wraps an already-decoded Accounting-Request packet without re-signing.
    fn from_decoded(packet: Packet) -> Self {
        Self {
            packet,
            state: RequestState::Encoded,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        self.packet.encode()
    }
}

/// A CoA-Request under construction. Uses the deterministic Request
/// Authenticator construction, same as Accounting-Request, not the
/// Access-Request random-seed construction.
#[derive(Debug)]
pub struct CoaRequest {
    pub packet: Packet,
    pub state: RequestState,
}

impl CoaRequest {
    pub fn new(secret: &[u8]) -> Result<Self> {
        let mut packet = Packet::outbound(PacketCode::CoaRequest.as_u8());
        authenticator::sign_deterministic_request(&mut packet, secret)?;
        Ok(Self {
            packet,
            state: RequestState::Encoded,
        })
    }

    pub fn add_attribute(&mut self, attribute: Attribute, secret: &[u8]) -> Result<()> {
        self.packet.add_attribute(attribute);
        authenticator::sign_deterministic_request(&mut self.packet, secret)
    }

    /// Wraps an already-decoded CoA-Request packet without re-signing.
    fn from_decoded(packet: Packet) -> Self {
        Self {
            packet,
            state: RequestState::Encoded,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        self.packet.encode()
    }
}

/// A Disconnect-Request under construction, same construction as CoA.
#[derive(Debug)]
pub struct DisconnectRequest {
    pub packet: Packet,
    pub state: RequestState,
}

impl DisconnectRequest {
    pub fn new(secret: &[u8]) -> Result<Self> {
        let mut packet = Packet::outbound(PacketCode::DisconnectRequest.as_u8());
        authenticator::sign_deterministic_request(&mut packet, secret)?;
        Ok(Self {
            packet,
            state: RequestState::Encoded,
        })
    }

    pub fn add_attribute(&mut self, attribute: Attribute, secret: &[u8]) -> Result<()> {
        self.packet.add_attribute(attribute);
        authenticator::sign_deterministic_request(&mut self.packet, secret)
    }

    /// Wraps an already-decoded Disconnect-Request packet without re-signing.
    fn from_decoded(packet: Packet) -> Self {
        Self {
            packet,
            state: RequestState::Encoded,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        self.packet.encode()
    }
}

/// Which packet-type facade a decoded packet was dispatched into; packet
/// types without a facade of their own (Access-Accept, Status-Server, ...)
/// come back as a bare `Packet`.
#[derive(Debug)]
pub enum DecodedRequest {
    Access(AccessRequest),
    Accounting(AccountingRequest),
    Coa(CoaRequest),
    Disconnect(DisconnectRequest),
    Other(Packet),
}

/// Decodes `buf` and dispatches the result into the matching packet-type
/// facade by `code` - Access-Request, Accounting-Request, CoA-Request, or
/// Disconnect-Request - falling back to a bare `Packet` for anything else.
/// `force_type`, when given, overrides whichever code would otherwise
/// drive dispatch; the wire bytes themselves are never altered by it.
pub fn decode_typed(buf: &[u8], force_type: Option<PacketCode>) -> Result<DecodedRequest> {
    let packet = Packet::decode(buf)?;
    let dispatch = force_type.or_else(|| packet.known_code());
    Ok(match dispatch {
        Some(PacketCode::AccessRequest) => DecodedRequest::Access(AccessRequest::from_decoded(packet)),
        Some(PacketCode::AccountingRequest) => {
            DecodedRequest::Accounting(AccountingRequest::from_decoded(packet))
        }
        Some(PacketCode::CoaRequest) => DecodedRequest::Coa(CoaRequest::from_decoded(packet)),
        Some(PacketCode::DisconnectRequest) => {
            DecodedRequest::Disconnect(DisconnectRequest::from_decoded(packet))
        }
        _ => DecodedRequest::Other(packet),
    })
}
