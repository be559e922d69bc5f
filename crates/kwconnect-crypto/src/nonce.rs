//! Nonce counter.
//!
//! Same semantics as libsodium's `sodium_increment`: the buffer is a
//! little-endian integer, incremented by one with carry, wrapping silently
//! on overflow.

/// Length of a box nonce in bytes.
pub const NONCE_LENGTH: usize = 24;

/// Increment `nonce` in place.
pub fn increment(nonce: &mut [u8]) {
    let mut carry: u16 = 1;
    for byte in nonce.iter_mut() {
        carry += u16::from(*byte);
        *byte = carry as u8;
        carry >>= 8;
    }
}

/// Return `nonce + 1` as a new buffer.
pub fn incremented<const N: usize>(nonce: &[u8; N]) -> [u8; N] {
    let mut next = *nonce;
    increment(&mut next);
    next
}
