//! Request and response signing.
//!
//! Signatures are ECDSA over NIST P-192 with a SHA-256 digest of the
//! canonical message, transported as hex of the fixed-width `r || s` form.
//! The digest is truncated to its leftmost 192 bits before use, as ECDSA
//! requires when the hash is wider than the curve order.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use error_stack::{Report, ResultExt};
use http::{HeaderMap, HeaderValue};
use ecdsa::hazmat::sign_prehashed;
use p192::ecdsa::signature::hazmat::PrehashVerifier;
use p192::elliptic_curve::NonZeroScalar;
use p192::{FieldBytes, NistP192};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use crate::clock::{Clock, SystemClock};
use crate::constants::{HEADER_DATE, HEADER_X_SERVICE, HEADER_X_SIGNATURE};
use crate::error::HtdsaError;
use crate::timestamp::format_http_date;

use super::canonical::{canonicalize_request, canonicalize_response};
use super::keys::{KeyMaterial, Signature, SigningKey, VerifyingKey};

/// SHA-256 of `payload`, truncated to the curve's field width.
fn digest_field(payload: &[u8]) -> FieldBytes {
    let digest = Sha256::digest(payload);
    let mut field = FieldBytes::default();
    let width = field.len();
    field.copy_from_slice(&digest[..width]);
    field
}

/// Sign `payload` with a random nonce and return the hex-encoded signature.
#[must_use]
pub fn sign_payload(key: &SigningKey, payload: &[u8]) -> String {
    let secret = key.to_nonzero_scalar();
    let z = digest_field(payload);

    loop {
        let k = NonZeroScalar::<NistP192>::random(&mut OsRng);
        // Only fails when r or s comes out zero; draw another nonce.
        if let Ok((signature, _)) = sign_prehashed::<NistP192, _>(secret.as_ref(), *k, &z) {
            return hex::encode(signature.to_bytes());
        }
    }
}

/// Decode a hex-encoded `r || s` signature.
#[must_use]
pub fn decode_signature(signature_hex: &str) -> Option<Signature> {
    let bytes = hex::decode(signature_hex.trim()).ok()?;
    Signature::from_slice(&bytes).ok()
}

/// Check `signature` against `payload`.
///
/// The comparison happens inside the curve arithmetic of `p192`; encoded
/// signatures are never compared byte-wise. Both the low and the high `s`
/// form of a signature are accepted.
#[must_use]
pub fn verify_payload(key: &VerifyingKey, payload: &[u8], signature: &Signature) -> bool {
    let signature = signature.normalize_s().unwrap_or(*signature);
    key.verify_prehash(&digest_field(payload), &signature)
        .is_ok()
}

/// Check that an identity token can travel as a header value.
///
/// # Errors
///
/// Returns [`HtdsaError::Configuration`] if the identity is empty or contains
/// characters not allowed in an HTTP header.
pub fn validate_identity(identity: &str) -> Result<(), Report<HtdsaError>> {
    if identity.is_empty() {
        return Err(Report::new(HtdsaError::Configuration {
            message: "Identity token must not be empty".into(),
        }));
    }

    HeaderValue::from_str(identity).change_context(HtdsaError::Configuration {
        message: "Identity token is not a valid header value".into(),
    })?;

    Ok(())
}

fn header_value(value: &str) -> Result<HeaderValue, Report<HtdsaError>> {
    HeaderValue::from_str(value).change_context(HtdsaError::Configuration {
        message: format!("Invalid header value: {value:?}"),
    })
}

/// The header values that authenticate an outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub date: String,
    pub identity: String,
    pub signature: String,
}

impl SignedHeaders {
    /// Merge `Date`, `X-Service` and `X-Signature` into `headers`, replacing
    /// any existing values.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be represented as a header.
    pub fn apply(&self, headers: &mut HeaderMap) -> Result<(), Report<HtdsaError>> {
        headers.insert(HEADER_DATE, header_value(&self.date)?);
        headers.insert(HEADER_X_SERVICE, header_value(&self.identity)?);
        headers.insert(HEADER_X_SIGNATURE, header_value(&self.signature)?);
        Ok(())
    }
}

/// Client side signer for outgoing requests.
#[derive(Clone)]
pub struct Signer {
    key: SigningKey,
    identity: String,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl Signer {
    /// Build a signer, resolving the private key once.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity is not usable as a header value or the
    /// key material is invalid.
    pub fn new(
        identity: impl Into<String>,
        private_key: impl Into<KeyMaterial<SigningKey>>,
    ) -> Result<Self, Report<HtdsaError>> {
        let identity = identity.into();
        validate_identity(&identity)?;
        let key = private_key
            .into()
            .resolve()
            .attach("while loading the client private key")?;

        Ok(Self {
            key,
            identity,
            clock: Arc::new(SystemClock),
        })
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Sign a request stamped with the current time.
    #[must_use]
    pub fn sign(&self, method: &str, url: &str, body: &[u8]) -> SignedHeaders {
        self.sign_at(&self.clock.now(), method, url, body)
    }

    /// Sign a request stamped with `now`.
    #[must_use]
    pub fn sign_at(&self, now: &DateTime<Utc>, method: &str, url: &str, body: &[u8]) -> SignedHeaders {
        let start = Instant::now();
        log::debug!("Signing HTTP {} request to {}", method, url);

        let date = format_http_date(now);
        let canonical = canonicalize_request(method, &date, url, body);
        let signature = sign_payload(&self.key, &canonical);

        log::debug!(
            "Signing of HTTP {} request took {:?}",
            method,
            start.elapsed()
        );

        SignedHeaders {
            date,
            identity: self.identity.clone(),
            signature,
        }
    }
}

/// Header values that authenticate a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSignature {
    pub date: String,
    pub signature: String,
}

impl ResponseSignature {
    /// Merge `Date` and `X-Signature` into `headers`.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be represented as a header.
    pub fn apply(&self, headers: &mut HeaderMap) -> Result<(), Report<HtdsaError>> {
        headers.insert(HEADER_DATE, header_value(&self.date)?);
        headers.insert(HEADER_X_SIGNATURE, header_value(&self.signature)?);
        Ok(())
    }
}

/// Service side signer for responses to signed requests.
#[derive(Clone)]
pub struct ResponseSigner {
    key: SigningKey,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for ResponseSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseSigner").finish_non_exhaustive()
    }
}

impl ResponseSigner {
    /// # Errors
    ///
    /// Returns an error if the key material is invalid.
    pub fn new(private_key: impl Into<KeyMaterial<SigningKey>>) -> Result<Self, Report<HtdsaError>> {
        let key = private_key
            .into()
            .resolve()
            .attach("while loading the service private key")?;

        Ok(Self {
            key,
            clock: Arc::new(SystemClock),
        })
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn sign(
        &self,
        identity: &str,
        request_method: &str,
        request_url: &str,
        body: &[u8],
    ) -> ResponseSignature {
        self.sign_at(&self.clock.now(), identity, request_method, request_url, body)
    }

    /// Sign a response for the client `identity`, stamped with `now`.
    #[must_use]
    pub fn sign_at(
        &self,
        now: &DateTime<Utc>,
        identity: &str,
        request_method: &str,
        request_url: &str,
        body: &[u8],
    ) -> ResponseSignature {
        let date = format_http_date(now);
        let canonical = canonicalize_response(identity, request_method, &date, request_url, body);

        ResponseSignature {
            signature: sign_payload(&self.key, &canonical),
            date,
        }
    }
}
