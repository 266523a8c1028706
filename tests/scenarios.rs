// End-to-end scenarios exercising the wire codec, authenticator engine, and
// dictionary together through the public API.

use radius_client::attribute::{Attribute, TypedValue, VendorSpecificAttribute};
use radius_client::authenticator;
use radius_client::dictionary::{Dictionary, STANDARD_VENDOR};
use radius_client::error::Error;
use radius_client::packet::{Packet, PacketCode};
use radius_client::requests::AccessRequest;

/// PAP Access-Request, checked against an independently computed MD5 chain.
#[test]
fn pap_access_request_user_password_matches_worked_example() {
    let dict = Dictionary::standard();
    let secret = b"xyzzy5461";
    let request_authenticator = [0u8; 16];

    let encrypted = authenticator::pap_encrypt("arctangent", secret, &request_authenticator);
    assert_eq!(
        encrypted,
        vec![
            0x7c, 0x3f, 0xc1, 0x4b, 0x73, 0xfe, 0x2c, 0x4b, 0xf6, 0xe1, 0x2c, 0xb3, 0x7f, 0x16,
            0x3f, 0xb1,
        ]
    );

    let mut packet = Packet::new(PacketCode::AccessRequest.as_u8(), 1, request_authenticator);
    packet.add_attribute(Attribute::from_value(dict, "User-Name", TypedValue::String("nemo".into())).unwrap());
    packet.add_attribute(Attribute::raw(2, STANDARD_VENDOR, encrypted.clone()));
    let encoded = packet.encode().unwrap();
    let decoded = Packet::decode(&encoded).unwrap();
    assert_eq!(decoded.get(STANDARD_VENDOR, 2).unwrap().data, encrypted);
}

#[test]
fn access_accept_verifies_and_rejects_on_bad_secret() {
    let secret = b"xyzzy5461";
    let request_authenticator = [0u8; 16];
    let request = Packet::new(PacketCode::AccessRequest.as_u8(), 1, request_authenticator);

    let mut response = request.create_response(PacketCode::AccessAccept.as_u8());
    authenticator::sign_response(&mut response, &request_authenticator, secret).unwrap();

    let encoded = response.encode().unwrap();
    let decoded = Packet::decode(&encoded).unwrap();
    assert_eq!(decoded.known_code(), Some(PacketCode::AccessAccept));
    authenticator::verify_response(&decoded, &request_authenticator, secret).unwrap();

    let mut wrong_secret = secret.to_vec();
    wrong_secret[0] ^= 0xFF;
    let err = authenticator::verify_response(&decoded, &request_authenticator, &wrong_secret).unwrap_err();
    assert!(matches!(err, Error::BadResponseAuthenticator));
}

#[test]
fn accounting_request_deterministic_authenticator() {
    let dict = Dictionary::standard();
    let secret = b"testing123";

    let mut packet = Packet::new(PacketCode::AccountingRequest.as_u8(), 42, [0u8; 16]);
    packet.add_attribute(Attribute::from_value(dict, "User-Name", TypedValue::String("user".into())).unwrap());
    packet.add_attribute(Attribute::from_value(dict, "Acct-Status-Type", TypedValue::Integer(1)).unwrap());
    authenticator::sign_deterministic_request(&mut packet, secret).unwrap();

    authenticator::verify_deterministic_request(&packet, secret).unwrap();
    let err = authenticator::verify_deterministic_request(&packet, b"wrong-secret").unwrap_err();
    assert!(matches!(err, Error::BadRequestAuthenticator));
}

#[test]
fn disconnect_request_and_crafted_ack_round_trip() {
    let dict = Dictionary::standard();
    let secret = b"disconnect-secret";

    let mut request = Packet::new(PacketCode::DisconnectRequest.as_u8(), 5, [0u8; 16]);
    request.add_attribute(Attribute::from_value(dict, "User-Name", TypedValue::String("nemo".into())).unwrap());
    authenticator::sign_deterministic_request(&mut request, secret).unwrap();
    assert_eq!(request.code, PacketCode::DisconnectRequest.as_u8());

    let mut ack = request.create_response(PacketCode::DisconnectAck.as_u8());
    authenticator::sign_response(&mut ack, &request.authenticator, secret).unwrap();
    let encoded = ack.encode().unwrap();

    let decoded = Packet::decode(&encoded).unwrap();
    assert_eq!(decoded.known_code(), Some(PacketCode::DisconnectAck));
    authenticator::verify_response(&decoded, &request.authenticator, secret).unwrap();
}

#[test]
fn dictionary_driven_vsa_round_trip() {
    let mut dict = Dictionary::new();
    dict.load_str("VENDOR 311 Microsoft\nVENDORATTR 311 MS-CHAP-Challenge 11 octets\n")
        .unwrap();

    let descriptor = dict.attribute_by_name("MS-CHAP-Challenge").unwrap();
    let challenge = vec![1, 2, 3, 4, 5, 6, 7, 8];
    let mut vsa = VendorSpecificAttribute::new(311);
    vsa.add_sub(Attribute::raw(descriptor.type_code, 311, challenge.clone())).unwrap();

    let mut packet = Packet::new(PacketCode::AccessRequest.as_u8(), 1, [0u8; 16]);
    packet.add_attribute(Attribute::from_vsa(&vsa).unwrap());

    let encoded = packet.encode().unwrap();
    let decoded = Packet::decode(&encoded).unwrap();

    let vsa_attr = decoded.get(STANDARD_VENDOR, 26).unwrap();
    let typed = vsa_attr.typed_value(&dict).unwrap();
    match typed {
        TypedValue::Vsa(parsed) => {
            let sub = parsed
                .sub_attributes
                .iter()
                .find(|a| a.type_code == descriptor.type_code)
                .unwrap();
            assert_eq!(sub.data, challenge);
        }
        other => panic!("expected Vsa, got {other:?}"),
    }
}

#[test]
fn pap_truncates_to_128_bytes_without_over_stripping() {
    let secret = b"supersecret12345";
    let request_authenticator = [3u8; 16];
    let password: String = "x".repeat(130);

    let encrypted = authenticator::pap_encrypt(&password, secret, &request_authenticator);
    assert_eq!(encrypted.len(), 128);

    let decrypted = authenticator::pap_decrypt(&encrypted, secret, &request_authenticator).unwrap();
    assert_eq!(decrypted.len(), 128);
    assert_eq!(decrypted, "x".repeat(128).as_bytes());
}

#[test]
fn access_request_facade_end_to_end() {
    let dict = Dictionary::standard();
    let req = AccessRequest::pap(dict, "nemo", "arctangent", b"xyzzy5461").unwrap();
    let encoded = req.encode().unwrap();
    let decoded = Packet::decode(&encoded).unwrap();
    assert_eq!(decoded.identifier, req.packet.identifier);
    assert_eq!(decoded.get(STANDARD_VENDOR, 1).unwrap().as_string(dict), "nemo");
}
