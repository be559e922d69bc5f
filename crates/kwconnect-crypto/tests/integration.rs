//! Integration tests for box envelopes exchanged as JSON payloads.

use kwconnect_crypto::{
    decode_nonce, decrypt, encrypt, incremented, seal, EnvelopeError, EphemeralKeypair,
    SessionKeys, NONCE_LENGTH,
};
use kwconnect_crypto::keys::decode_public_key;
use serde_json::json;

/// Run the key exchange the way the two sides do it on the wire:
/// public keys only ever cross as base64 strings.
fn exchange_keys() -> (SessionKeys, SessionKeys) {
    let peer = EphemeralKeypair::generate();
    let peer_wire = peer.public_key_base64();

    let host = EphemeralKeypair::generate();
    let host_wire = host.public_key_base64();

    let host_keys = SessionKeys::new(decode_public_key(&peer_wire).unwrap(), host);
    let peer_keys = SessionKeys::new(decode_public_key(&host_wire).unwrap(), peer);

    (host_keys, peer_keys)
}

#[test]
fn test_request_reply_exchange() {
    let (host, peer) = exchange_keys();

    let request_nonce = [42u8; NONCE_LENGTH];
    let request = json!({ "action": "get-databasehash" });
    let sealed = seal(&peer, &request_nonce, request.to_string().as_bytes()).unwrap();

    // Host side
    let plaintext = decrypt(&host, &sealed.nonce, &sealed.message).unwrap();
    let payload: serde_json::Value = serde_json::from_slice(&plaintext).unwrap();
    assert_eq!(payload["action"], "get-databasehash");

    let reply = json!({ "action": "hash", "version": "1.0", "hash": "TODO" });
    let nonce = decode_nonce(&sealed.nonce).unwrap();
    let sealed_reply = encrypt(&host, nonce, reply.to_string().as_bytes()).unwrap();

    // Peer side
    assert_eq!(
        decode_nonce(&sealed_reply.nonce).unwrap(),
        incremented(&request_nonce)
    );
    let plaintext = decrypt(&peer, &sealed_reply.nonce, &sealed_reply.message).unwrap();
    let payload: serde_json::Value = serde_json::from_slice(&plaintext).unwrap();
    assert_eq!(payload, reply);
}

#[test]
fn test_many_requests_distinct_nonces() {
    let (host, peer) = exchange_keys();

    for i in 0..16u8 {
        let mut nonce = [0u8; NONCE_LENGTH];
        nonce[0] = i.wrapping_mul(2);
        nonce[NONCE_LENGTH - 1] = i;

        let body = format!("message {}", i);
        let sealed = seal(&peer, &nonce, body.as_bytes()).unwrap();
        let opened = decrypt(&host, &sealed.nonce, &sealed.message).unwrap();
        assert_eq!(opened.as_slice(), body.as_bytes());

        let reply = encrypt(&host, nonce, body.as_bytes()).unwrap();
        let opened = decrypt(&peer, &reply.nonce, &reply.message).unwrap();
        assert_eq!(opened.as_slice(), body.as_bytes());
    }
}

#[test]
fn test_reply_cannot_be_opened_under_request_nonce() {
    let (host, peer) = exchange_keys();
    let nonce = [9u8; NONCE_LENGTH];

    let reply = encrypt(&host, nonce, b"reply").unwrap();
    let request_nonce = seal(&peer, &nonce, b"").unwrap().nonce;

    assert_eq!(
        decrypt(&peer, &request_nonce, &reply.message).unwrap_err(),
        EnvelopeError::Authentication
    );
}

#[test]
fn test_rekeyed_session_rejects_old_messages() {
    let (old_host, peer) = exchange_keys();
    let sealed = seal(&peer, &[5u8; NONCE_LENGTH], b"hello").unwrap();
    assert!(decrypt(&old_host, &sealed.nonce, &sealed.message).is_ok());

    // Peer keeps its key, host generates a fresh one
    let new_host = SessionKeys::new(
        peer.local_public_key().clone(),
        EphemeralKeypair::generate(),
    );
    assert_eq!(
        decrypt(&new_host, &sealed.nonce, &sealed.message).unwrap_err(),
        EnvelopeError::Authentication
    );
}
