// authenticator.rs - the cryptographic authenticator engine.
//
// Three distinct MD5-based constructions, plus PAP password obfuscation
// and CHAP. All inputs are byte sequences in the exact order given by the
// RFC; nothing here performs host-order conversions.

use md5::{Digest, Md5};
use tracing::{debug, warn};

use crate::dictionary::Dictionary;
use crate::error::{Error, Result};
use crate::packet::{fill_random, Packet, HEADER_LEN};

fn md5(parts: &[&[u8]]) -> [u8; 16] {
    let mut hasher = Md5::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Computes the attribute-list bytes and the total on-wire length that the
/// three authenticator constructions all need as MD5 input.
fn body_and_length(packet: &Packet) -> Result<(Vec<u8>, u16)> {
    let mut ordered: Vec<&crate::attribute::Attribute> = packet.attributes.iter().collect();
    ordered.sort_by_key(|a| a.type_code);
    let mut body = Vec::new();
    for attr in ordered {
        body.push(attr.type_code);
        body.push((2 + attr.data.len()) as u8);
        body.extend_from_slice(&attr.data);
    }
    let length = HEADER_LEN + body.len();
    if length > crate::packet::MAX_PACKET_LEN {
        return Err(Error::PacketTooLong(length));
    }
    Ok((body, length as u16))
}

/// Generates and signs the Access-Request Request Authenticator: 16 random
/// bytes folded through `MD5(secret || random)`. Called once at first
/// encode; the caller reuses the same packet (same identifier and
/// authenticator) across retries.
pub fn sign_access_request(packet: &mut Packet, secret: &[u8]) {
    let mut random = [0u8; 16];
    fill_random(&mut random);
    packet.authenticator = md5(&[secret, &random]);
}

/// Signs an Accounting-Request/CoA-Request/Disconnect-Request with the
/// deterministic construction `MD5(code|id|len|zero16|attrs|secret)`.
pub fn sign_deterministic_request(packet: &mut Packet, secret: &[u8]) -> Result<()> {
    let (body, length) = body_and_length(packet)?;
    packet.authenticator = md5(&[
        &[packet.code, packet.identifier],
        &length.to_be_bytes(),
        &[0u8; 16],
        &body,
        secret,
    ]);
    Ok(())
}

/// Recomputes the deterministic Request Authenticator with `zero16` in
/// place of the transmitted value and compares against it.
pub fn verify_deterministic_request(packet: &Packet, secret: &[u8]) -> Result<()> {
    let (body, length) = body_and_length(packet)?;
    let expected = md5(&[
        &[packet.code, packet.identifier],
        &length.to_be_bytes(),
        &[0u8; 16],
        &body,
        secret,
    ]);
    if expected == packet.authenticator {
        debug!(identifier = packet.identifier, "request authenticator verified");
        Ok(())
    } else {
        warn!(identifier = packet.identifier, "request authenticator verification failed");
        Err(Error::BadRequestAuthenticator)
    }
}

/// Signs any response packet: `MD5(code|id|len|request_authenticator|attrs|secret)`.
pub fn sign_response(packet: &mut Packet, request_authenticator: &[u8; 16], secret: &[u8]) -> Result<()> {
    let (body, length) = body_and_length(packet)?;
    packet.authenticator = md5(&[
        &[packet.code, packet.identifier],
        &length.to_be_bytes(),
        request_authenticator,
        &body,
        secret,
    ]);
    Ok(())
}

/// Verifies a decoded response's authenticator against the request it answers.
pub fn verify_response(packet: &Packet, request_authenticator: &[u8; 16], secret: &[u8]) -> Result<()> {
    let (body, length) = body_and_length(packet)?;
    let expected = md5(&[
        &[packet.code, packet.identifier],
        &length.to_be_bytes(),
        request_authenticator,
        &body,
        secret,
    ]);
    if expected == packet.authenticator {
        debug!(identifier = packet.identifier, "response authenticator verified");
        Ok(())
    } else {
        warn!(identifier = packet.identifier, "response authenticator verification failed");
        Err(Error::BadResponseAuthenticator)
    }
}

/// RFC 2865 §5.2 PAP obfuscation. `password` is truncated to 128 bytes and
/// zero-padded to the next multiple of 16 before encryption.
pub fn pap_encrypt(password: &str, secret: &[u8], request_authenticator: &[u8; 16]) -> Vec<u8> {
    let mut plaintext = password.as_bytes().to_vec();
    plaintext.truncate(128);
    let padded_len = plaintext.len().div_ceil(16).max(1) * 16;
    plaintext.resize(padded_len, 0);

    let mut out = Vec::with_capacity(plaintext.len());
    let mut feedback = *request_authenticator;
    for block in plaintext.chunks(16) {
        let b = md5(&[secret, &feedback]);
        let mut cipher_block = [0u8; 16];
        for i in 0..16 {
            cipher_block[i] = block[i] ^ b[i];
        }
        out.extend_from_slice(&cipher_block);
        feedback = cipher_block;
    }
    out
}

/// Inverts [`pap_encrypt`] and strips trailing zero padding.
pub fn pap_decrypt(data: &[u8], secret: &[u8], request_authenticator: &[u8; 16]) -> Result<Vec<u8>> {
    if data.is_empty() || !data.len().is_multiple_of(16) {
        return Err(Error::BadAttributeLength {
            attribute: "User-Password".to_string(),
            expected: "a positive multiple of 16".to_string(),
            actual: data.len(),
        });
    }
    let mut out = Vec::with_capacity(data.len());
    let mut feedback = *request_authenticator;
    for block in data.chunks(16) {
        let b = md5(&[secret, &feedback]);
        let mut plain_block = [0u8; 16];
        for i in 0..16 {
            plain_block[i] = block[i] ^ b[i];
        }
        out.extend_from_slice(&plain_block);
        feedback.copy_from_slice(block);
    }
    while out.last() == Some(&0) {
        out.pop();
    }
    Ok(out)
}

/// RFC 2865 §2.2 CHAP: `chap_id || MD5(chap_id || password || challenge)`.
pub fn chap_compute(chap_id: u8, password: &str, challenge: &[u8; 16]) -> [u8; 17] {
    let digest = md5(&[&[chap_id], password.as_bytes(), challenge]);
    let mut out = [0u8; 17];
    out[0] = chap_id;
    out[1..].copy_from_slice(&digest);
    out
}

/// Draws a fresh CSPRNG challenge for an outbound CHAP Access-Request.
pub fn generate_chap_challenge() -> [u8; 16] {
    let mut challenge = [0u8; 16];
    fill_random(&mut challenge);
    challenge
}

/// Draws a fresh CSPRNG CHAP identifier byte.
pub fn generate_chap_id() -> u8 {
    let mut byte = [0u8; 1];
    fill_random(&mut byte);
    byte[0]
}

/// Verifies a received `chap_password`/`chap_challenge` pair against the
/// plaintext the verifier has on file.
pub fn chap_verify(chap_password: &[u8], chap_challenge: &[u8], password: &str) -> Result<bool> {
    if chap_password.len() != 17 {
        return Err(Error::BadAttributeLength {
            attribute: "CHAP-Password".to_string(),
            expected: "17".to_string(),
            actual: chap_password.len(),
        });
    }
    if chap_challenge.len() != 16 {
        return Err(Error::BadAttributeLength {
            attribute: "CHAP-Challenge".to_string(),
            expected: "16".to_string(),
            actual: chap_challenge.len(),
        });
    }
    let chap_id = chap_password[0];
    let challenge: [u8; 16] = chap_challenge.try_into().unwrap();
    let expected = chap_compute(chap_id, password, &challenge);
    let matches = expected[1..] == chap_password[1..];
    if matches {
        debug!(chap_id, "CHAP response verified");
    } else {
        warn!(chap_id, "CHAP response did not match");
    }
    Ok(matches)
}

/// Which password-transport mechanism an Access-Request is using, classified
/// by which credential attributes are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthProtocol {
    Pap,
    Chap,
    MsChapV2,
    Eap,
}

const MS_VENDOR: i32 = 311;
const MS_CHAP2_RESPONSE: u8 = 25;
const EAP_MESSAGE: u8 = 79;
const USER_PASSWORD: u8 = 2;
const CHAP_PASSWORD: u8 = 3;
const CHAP_CHALLENGE: u8 = 60;

impl AuthProtocol {
    /// Inspects which credential attributes are present and classifies the
    /// protocol; `None` means no recognized credential attribute was found.
    pub fn classify(packet: &Packet) -> Option<Self> {
        use crate::dictionary::STANDARD_VENDOR;
        if packet.get(MS_VENDOR, MS_CHAP2_RESPONSE).is_some() {
            Some(Self::MsChapV2)
        } else if packet.get(STANDARD_VENDOR, EAP_MESSAGE).is_some() {
            Some(Self::Eap)
        } else if packet.get(STANDARD_VENDOR, CHAP_PASSWORD).is_some() {
            Some(Self::Chap)
        } else if packet.get(STANDARD_VENDOR, USER_PASSWORD).is_some() {
            Some(Self::Pap)
        } else {
            None
        }
    }
}

/// Verifies the cleartext `password` against whatever credential attributes
/// `packet` carries. PAP and CHAP are fully verified; MS-CHAPv2 and EAP are
/// recognized but not cryptographically checked.
pub fn verify_password(
    packet: &Packet,
    _dict: &Dictionary,
    secret: &[u8],
    password: &str,
) -> Result<bool> {
    use crate::dictionary::STANDARD_VENDOR;
    match AuthProtocol::classify(packet) {
        Some(AuthProtocol::Pap) => {
            let encrypted = &packet.get(STANDARD_VENDOR, USER_PASSWORD).unwrap().data;
            let decrypted = pap_decrypt(encrypted, secret, &packet.authenticator)?;
            Ok(decrypted == password.as_bytes())
        }
        Some(AuthProtocol::Chap) => {
            let chap_password = &packet.get(STANDARD_VENDOR, CHAP_PASSWORD).unwrap().data;
            let challenge = packet
                .get(STANDARD_VENDOR, CHAP_CHALLENGE)
                .map(|a| a.data.clone())
                .unwrap_or_else(|| packet.authenticator.to_vec());
            chap_verify(chap_password, &challenge, password)
        }
        Some(protocol @ (AuthProtocol::MsChapV2 | AuthProtocol::Eap)) => {
            Err(Error::UnsupportedAuthProtocol(protocol))
        }
        None => Err(Error::MissingCredentials),
    }
}
