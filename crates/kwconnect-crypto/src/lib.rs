//! Cryptographic primitives for kwconnect.
//!
//! This crate provides:
//! - Ephemeral X25519 keypairs and base64 key encoding
//! - NaCl box (`crypto_box_curve25519xsalsa20poly1305`) envelopes with base64 wire encoding
//! - The little-endian nonce counter used to derive reply nonces
//!
//! # Design
//!
//! The host never keeps a send counter. A reply is sealed under the request
//! nonce incremented by one, so a request and its reply never share a nonce
//! under the same session key. Uniqueness across requests is up to the peer.

#![forbid(unsafe_code)]

pub mod envelope;
pub mod keys;
pub mod nonce;

pub use envelope::{decode_nonce, decrypt, encrypt, seal, EnvelopeError, Sealed, SessionKeys};
pub use keys::{decode_public_key, encode_public_key, EphemeralKeypair};
pub use nonce::{increment, incremented, NONCE_LENGTH};
