//! Key material handling.
//!
//! Keys may be handed to us already parsed or as hex strings. Either form is
//! resolved exactly once, at construction, into the NIST P-192 key types used
//! for every later sign or verify call.
//!
//! Hex forms are the bare 24 byte scalar for private keys and the bare 48 byte
//! `X || Y` point for public keys.

use error_stack::Report;
use rand::rngs::OsRng;

use crate::error::HtdsaError;

pub use p192::ecdsa::{Signature, VerifyingKey};

/// A P-192 private scalar.
pub type SigningKey = p192::elliptic_curve::SecretKey<p192::NistP192>;

/// Length of the raw `X || Y` public key encoding.
pub const RAW_PUBLIC_KEY_LEN: usize = 48;
/// Length of a P-192 private scalar.
pub const PRIVATE_KEY_LEN: usize = 24;

/// Key material as supplied by configuration.
#[derive(Debug, Clone)]
pub enum KeyMaterial<K> {
    Parsed(K),
    Hex(String),
}

impl From<SigningKey> for KeyMaterial<SigningKey> {
    fn from(key: SigningKey) -> Self {
        Self::Parsed(key)
    }
}

impl From<VerifyingKey> for KeyMaterial<VerifyingKey> {
    fn from(key: VerifyingKey) -> Self {
        Self::Parsed(key)
    }
}

impl<K> From<&str> for KeyMaterial<K> {
    fn from(encoded: &str) -> Self {
        Self::Hex(encoded.to_string())
    }
}

impl<K> From<String> for KeyMaterial<K> {
    fn from(encoded: String) -> Self {
        Self::Hex(encoded)
    }
}

fn decode_hex(encoded: &str, what: &str) -> Result<Vec<u8>, Report<HtdsaError>> {
    hex::decode(encoded.trim()).map_err(|e| {
        Report::new(HtdsaError::InvalidKey {
            message: format!("Failed to decode {what} hex: {e}"),
        })
    })
}

impl KeyMaterial<SigningKey> {
    /// Resolve into a signing key.
    ///
    /// # Errors
    ///
    /// Returns [`HtdsaError::InvalidKey`] if the hex is malformed, is not 24 bytes,
    /// or is not a valid P-192 scalar.
    pub fn resolve(self) -> Result<SigningKey, Report<HtdsaError>> {
        match self {
            Self::Parsed(key) => Ok(key),
            Self::Hex(encoded) => {
                let bytes = decode_hex(&encoded, "private key")?;
                if bytes.len() != PRIVATE_KEY_LEN {
                    return Err(Report::new(HtdsaError::InvalidKey {
                        message: format!(
                            "Invalid private key length (expected {PRIVATE_KEY_LEN} bytes, got {})",
                            bytes.len()
                        ),
                    }));
                }

                SigningKey::from_slice(&bytes).map_err(|e| {
                    Report::new(HtdsaError::InvalidKey {
                        message: format!("Failed to create signing key: {e}"),
                    })
                })
            }
        }
    }
}

impl KeyMaterial<VerifyingKey> {
    /// Resolve into a verifying key.
    ///
    /// Accepts the raw 48 byte `X || Y` form as well as SEC1 compressed (25
    /// bytes) and uncompressed (49 bytes) encodings.
    ///
    /// # Errors
    ///
    /// Returns [`HtdsaError::InvalidKey`] if the hex is malformed or does not
    /// describe a point on the curve.
    pub fn resolve(self) -> Result<VerifyingKey, Report<HtdsaError>> {
        match self {
            Self::Parsed(key) => Ok(key),
            Self::Hex(encoded) => {
                let mut bytes = decode_hex(&encoded, "public key")?;
                if bytes.len() == RAW_PUBLIC_KEY_LEN {
                    bytes.insert(0, 0x04);
                }

                VerifyingKey::from_sec1_bytes(&bytes).map_err(|e| {
                    Report::new(HtdsaError::InvalidKey {
                        message: format!(
                            "Failed to create verifying key from {} bytes: {e}",
                            encoded.trim().len() / 2
                        ),
                    })
                })
            }
        }
    }
}

/// Hex encoding of a private key's scalar.
#[must_use]
pub fn signing_key_hex(key: &SigningKey) -> String {
    hex::encode(key.to_bytes())
}

/// Hex encoding of a public key in raw `X || Y` form.
#[must_use]
pub fn verifying_key_hex(key: &VerifyingKey) -> String {
    let point = key.to_encoded_point(false);
    hex::encode(&point.as_bytes()[1..])
}

pub struct Keypair {
    pub signing_key: SigningKey,
    pub verifying_key: VerifyingKey,
}

impl Keypair {
    #[must_use]
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::random(&mut OsRng))
    }

    #[must_use]
    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        let verifying_key = VerifyingKey::from(signing_key.public_key());

        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Rebuild a keypair from a hex-encoded private key.
    ///
    /// # Errors
    ///
    /// Returns an error if the private key is invalid.
    pub fn from_private_hex(private_hex: &str) -> Result<Self, Report<HtdsaError>> {
        let signing_key = KeyMaterial::<SigningKey>::from(private_hex).resolve()?;
        Ok(Self::from_signing_key(signing_key))
    }

    #[must_use]
    pub fn private_hex(&self) -> String {
        signing_key_hex(&self.signing_key)
    }

    #[must_use]
    pub fn public_hex(&self) -> String {
        verifying_key_hex(&self.verifying_key)
    }
}
