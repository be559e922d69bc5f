//! Ephemeral X25519 keys and their base64 wire form.
//!
//! Keys travel as standard (padded) base64 of the raw 32 bytes, the same
//! encoding tweetnacl-based extensions use.
//!
//! # Example
//!
//! ```
//! use kwconnect_crypto::keys::{decode_public_key, EphemeralKeypair};
//!
//! let keypair = EphemeralKeypair::generate();
//! let wire = keypair.public_key_base64();
//!
//! let decoded = decode_public_key(&wire).unwrap();
//! assert_eq!(decoded.as_bytes(), keypair.public_key().as_bytes());
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use crypto_box::{PublicKey, SecretKey};
use rand::rngs::OsRng;

use crate::envelope::EnvelopeError;

/// Length of an X25519 key in bytes.
pub const KEY_LENGTH: usize = 32;

/// Ephemeral X25519 keypair.
///
/// The secret half is zeroized on drop by `crypto_box`.
pub struct EphemeralKeypair {
    secret: SecretKey,
    public: PublicKey,
}

impl EphemeralKeypair {
    /// Generate a new random keypair using the OS CSPRNG.
    pub fn generate() -> Self {
        Self::from_secret(SecretKey::generate(&mut OsRng))
    }

    /// Create from raw secret key bytes.
    pub fn from_secret_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self::from_secret(SecretKey::from(bytes))
    }

    fn from_secret(secret: SecretKey) -> Self {
        let public = secret.public_key();
        Self { secret, public }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Public key in wire form.
    pub fn public_key_base64(&self) -> String {
        encode_public_key(&self.public)
    }

    pub(crate) fn secret_key(&self) -> &SecretKey {
        &self.secret
    }
}

impl std::fmt::Debug for EphemeralKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralKeypair")
            .field("public", &self.public_key_base64())
            .finish_non_exhaustive()
    }
}

/// Encode a public key for the wire.
pub fn encode_public_key(key: &PublicKey) -> String {
    STANDARD.encode(key.as_bytes())
}

/// Decode a peer-supplied public key.
///
/// Fails with [`EnvelopeError::Decode`] on bad base64 or a length other than 32.
pub fn decode_public_key(encoded: &str) -> Result<PublicKey, EnvelopeError> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|_| EnvelopeError::Decode("publicKey"))?;

    let bytes: [u8; KEY_LENGTH] = bytes
        .try_into()
        .map_err(|_| EnvelopeError::Decode("publicKey"))?;

    Ok(PublicKey::from(bytes))
}
