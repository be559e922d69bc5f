//! Box envelopes: authenticated public-key encryption with base64 wire form.
//!
//! A sealed message is `crypto_box_easy` output (16-byte Poly1305 tag
//! followed by the XSalsa20 ciphertext), base64 encoded. The nonce travels
//! next to it, also base64 encoded.
//!
//! # Nonce discipline
//!
//! [`encrypt`] derives its nonce from the nonce of the message being
//! answered (`nonce + 1`). [`seal`] uses the nonce as given and is meant for
//! the side that originates a request.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use crypto_box::aead::generic_array::GenericArray;
use crypto_box::aead::Aead;
use crypto_box::{PublicKey, SalsaBox};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::keys::{encode_public_key, EphemeralKeypair};
use crate::nonce::{increment, NONCE_LENGTH};

/// Envelope errors.
///
/// The `Display` strings are what the peer eventually sees.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// Malformed base64, or a field of the wrong length.
    #[error("Failed to decode {0}")]
    Decode(&'static str),

    /// Box open failed (wrong key, tampered ciphertext, wrong nonce).
    /// Renders exactly like an undecodable `message`.
    #[error("Failed to decode message")]
    Authentication,

    #[error("Failed to encrypt message")]
    Encryption,
}

/// Key material for one side of a box channel.
pub struct SessionKeys {
    peer_public: PublicKey,
    local: EphemeralKeypair,
}

impl SessionKeys {
    pub fn new(peer_public: PublicKey, local: EphemeralKeypair) -> Self {
        Self { peer_public, local }
    }

    pub fn peer_public_key(&self) -> &PublicKey {
        &self.peer_public
    }

    pub fn local_public_key(&self) -> &PublicKey {
        self.local.public_key()
    }

    pub fn local_public_key_base64(&self) -> String {
        encode_public_key(self.local.public_key())
    }

    fn salsa_box(&self) -> SalsaBox {
        SalsaBox::new(&self.peer_public, self.local.secret_key())
    }
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys")
            .field("peer_public", &encode_public_key(&self.peer_public))
            .field("local", &self.local)
            .finish()
    }
}

/// A sealed message in wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    /// Base64 nonce the message was sealed under.
    pub nonce: String,
    /// Base64 ciphertext.
    pub message: String,
}

/// Seal `plaintext` under exactly `nonce`.
pub fn seal(
    keys: &SessionKeys,
    nonce: &[u8; NONCE_LENGTH],
    plaintext: &[u8],
) -> Result<Sealed, EnvelopeError> {
    let ciphertext = keys
        .salsa_box()
        .encrypt(GenericArray::from_slice(nonce), plaintext)
        .map_err(|_| EnvelopeError::Encryption)?;

    Ok(Sealed {
        nonce: STANDARD.encode(nonce),
        message: STANDARD.encode(ciphertext),
    })
}

/// Seal a reply to a message that arrived under `nonce`.
///
/// The reply is sealed under `nonce + 1`; the caller's copy is consumed.
pub fn encrypt(
    keys: &SessionKeys,
    mut nonce: [u8; NONCE_LENGTH],
    plaintext: &[u8],
) -> Result<Sealed, EnvelopeError> {
    increment(&mut nonce);
    seal(keys, &nonce, plaintext)
}

/// Decode a base64 nonce, which must be exactly 24 bytes.
pub fn decode_nonce(encoded: &str) -> Result<[u8; NONCE_LENGTH], EnvelopeError> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|_| EnvelopeError::Decode("nonce"))?;

    bytes.try_into().map_err(|_| EnvelopeError::Decode("nonce"))
}

/// Open a base64 message sealed by the peer.
pub fn decrypt(
    keys: &SessionKeys,
    nonce: &str,
    message: &str,
) -> Result<Zeroizing<Vec<u8>>, EnvelopeError> {
    let nonce = decode_nonce(nonce)?;
    let ciphertext = STANDARD
        .decode(message)
        .map_err(|_| EnvelopeError::Decode("message"))?;

    keys.salsa_box()
        .decrypt(GenericArray::from_slice(&nonce), ciphertext.as_slice())
        .map(Zeroizing::new)
        .map_err(|_| EnvelopeError::Authentication)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nonce::incremented;

    /// Returns (host side, peer side) keys for one session.
    fn key_pair() -> (SessionKeys, SessionKeys) {
        let host = EphemeralKeypair::generate();
        let peer = EphemeralKeypair::generate();
        let host_public = host.public_key().clone();
        let peer_public = peer.public_key().clone();

        (
            SessionKeys::new(peer_public, host),
            SessionKeys::new(host_public, peer),
        )
    }

    fn flip_byte(encoded: &str, index: usize) -> String {
        let mut bytes = STANDARD.decode(encoded).unwrap();
        bytes[index] ^= 0x01;
        STANDARD.encode(bytes)
    }

    #[test]
    fn test_seal_open() {
        let (host, peer) = key_pair();
        let nonce = [3u8; NONCE_LENGTH];

        let sealed = seal(&peer, &nonce, b"{\"action\":\"ping\"}").unwrap();
        let opened = decrypt(&host, &sealed.nonce, &sealed.message).unwrap();

        assert_eq!(opened.as_slice(), b"{\"action\":\"ping\"}");
    }

    #[test]
    fn test_reply_uses_incremented_nonce() {
        let (host, peer) = key_pair();
        let mut request_nonce = [0u8; NONCE_LENGTH];
        request_nonce[0] = 0xff;
        request_nonce[2] = 0x05;

        let reply = encrypt(&host, request_nonce, b"reply").unwrap();

        assert_eq!(
            decode_nonce(&reply.nonce).unwrap(),
            incremented(&request_nonce)
        );
        assert_ne!(reply.nonce, STANDARD.encode(request_nonce));

        let opened = decrypt(&peer, &reply.nonce, &reply.message).unwrap();
        assert_eq!(opened.as_slice(), b"reply");
    }

    #[test]
    fn test_ciphertext_carries_tag() {
        let (_, peer) = key_pair();
        let sealed = seal(&peer, &[0u8; NONCE_LENGTH], b"abc").unwrap();
        assert_eq!(STANDARD.decode(sealed.message).unwrap().len(), 3 + 16);
    }

    #[test]
    fn test_tampered_message_fails_authentication() {
        let (host, peer) = key_pair();
        let sealed = seal(&peer, &[1u8; NONCE_LENGTH], b"secret payload").unwrap();
        let len = STANDARD.decode(&sealed.message).unwrap().len();

        for index in [0, 15, 16, len - 1] {
            let tampered = flip_byte(&sealed.message, index);
            assert_eq!(
                decrypt(&host, &sealed.nonce, &tampered).unwrap_err(),
                EnvelopeError::Authentication
            );
        }
    }

    #[test]
    fn test_tampered_nonce_fails_authentication() {
        let (host, peer) = key_pair();
        let sealed = seal(&peer, &[1u8; NONCE_LENGTH], b"secret payload").unwrap();

        for index in [0, 12, NONCE_LENGTH - 1] {
            let tampered = flip_byte(&sealed.nonce, index);
            assert_eq!(
                decrypt(&host, &tampered, &sealed.message).unwrap_err(),
                EnvelopeError::Authentication
            );
        }
    }

    #[test]
    fn test_wrong_keys_fail_authentication() {
        let (_, peer) = key_pair();
        let (other_host, _) = key_pair();
        let sealed = seal(&peer, &[2u8; NONCE_LENGTH], b"hello").unwrap();

        assert_eq!(
            decrypt(&other_host, &sealed.nonce, &sealed.message).unwrap_err(),
            EnvelopeError::Authentication
        );
    }

    #[test]
    fn test_authentication_failure_looks_like_decode_failure() {
        let (host, peer) = key_pair();
        let sealed = seal(&peer, &[4u8; NONCE_LENGTH], b"hello").unwrap();

        let forged = decrypt(&host, &sealed.nonce, &flip_byte(&sealed.message, 0)).unwrap_err();
        let garbage = decrypt(&host, &sealed.nonce, "***").unwrap_err();

        assert_eq!(forged.to_string(), garbage.to_string());
    }

    #[test]
    fn test_bad_nonce_encoding() {
        let (host, _) = key_pair();
        let short = STANDARD.encode([0u8; 23]);

        assert_eq!(
            decrypt(&host, &short, "AAAA").unwrap_err(),
            EnvelopeError::Decode("nonce")
        );
        assert_eq!(
            decode_nonce("%%%").unwrap_err(),
            EnvelopeError::Decode("nonce")
        );
    }

    #[test]
    fn test_truncated_ciphertext() {
        let (host, _) = key_pair();
        let nonce = STANDARD.encode([0u8; NONCE_LENGTH]);
        let short = STANDARD.encode([0u8; 8]);

        assert_eq!(
            decrypt(&host, &nonce, &short).unwrap_err(),
            EnvelopeError::Authentication
        );
    }
}
