//! Ed25519 signing primitive
//!
//! The cell core never interprets keys; it hands a 32-byte content hash to
//! these byte-sequence helpers. [`crate::cell::Cell::sign`] and
//! [`crate::cell::Cell::verify`] delegate here.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

/// Sign an arbitrary message with an Ed25519 key.
pub fn sign_message(key: &SigningKey, message: &[u8]) -> Signature {
    key.sign(message)
}

/// Verify an Ed25519 signature over `message`.
pub fn verify_message(key: &VerifyingKey, message: &[u8], signature: &Signature) -> bool {
    key.verify(message, signature).is_ok()
}
