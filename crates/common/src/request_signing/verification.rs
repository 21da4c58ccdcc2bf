//! Signature verification with freshness checks.
//!
//! A message is accepted when its `Date` lies no more than
//! [`MAX_MESSAGE_AGE_SECS`] in the past and no more than
//! [`MAX_CLOCK_SKEW_SECS`] in the future, and its signature verifies against
//! either the supplied `Date` or, on a single retry, the `Date` one second
//! earlier. The retry absorbs peers that truncate the timestamp differently
//! when signing than when stamping the header.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use error_stack::{Report, ResultExt};
use http::{HeaderMap, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::constants::{
    HEADER_DATE, HEADER_X_SERVICE, HEADER_X_SIGNATURE, MAX_CLOCK_SKEW_SECS, MAX_MESSAGE_AGE_SECS,
};
use crate::error::{HtdsaError, VerificationError};
use crate::timestamp::{format_http_date, parse_http_date};

use super::canonical::{canonicalize_request, canonicalize_response};
use super::keys::{KeyMaterial, Signature, VerifyingKey};
use super::signing::{decode_signature, validate_identity, verify_payload};

/// Which response statuses are subject to verification.
///
/// Responses outside the gate are accepted without inspection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseGate {
    /// Only `200 OK`.
    #[default]
    Ok,
    /// Any 2xx status.
    Success,
    /// Every response.
    All,
}

impl ResponseGate {
    #[must_use]
    pub fn requires_verification(self, status: StatusCode) -> bool {
        match self {
            Self::Ok => status == StatusCode::OK,
            Self::Success => status.is_success(),
            Self::All => true,
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &http::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn check_freshness(date: &DateTime<Utc>, now: &DateTime<Utc>) -> Result<(), VerificationError> {
    let age = *now - *date;

    if age > Duration::seconds(MAX_MESSAGE_AGE_SECS) {
        log::warn!("Rejecting stale message dated {} ({}s old)", date, age.num_seconds());
        return Err(VerificationError::StaleResponse);
    }

    if age < -Duration::seconds(MAX_CLOCK_SKEW_SECS) {
        log::warn!(
            "Received a message from the future ({}s ahead); please check system time NTP synchronization",
            -age.num_seconds()
        );
        return Err(VerificationError::FutureResponse);
    }

    Ok(())
}

/// Parse the `Date` and signature headers and enforce freshness.
fn signed_parts<'a>(
    headers: &'a HeaderMap,
    now: &DateTime<Utc>,
) -> Result<(&'a str, DateTime<Utc>, Signature), VerificationError> {
    let signature_value = headers
        .get(HEADER_X_SIGNATURE)
        .ok_or(VerificationError::MissingSignature)?;

    let date_header = header_str(headers, &HEADER_DATE).ok_or(VerificationError::MalformedTimestamp)?;
    let date = parse_http_date(date_header).ok_or(VerificationError::MalformedTimestamp)?;

    check_freshness(&date, now)?;

    let signature = signature_value
        .to_str()
        .ok()
        .and_then(decode_signature)
        .ok_or(VerificationError::BadSignature)?;

    Ok((date_header, date, signature))
}

/// Verify against the `Date` as supplied, then once more against one second
/// earlier. `canonical_for` rebuilds the message for a given date string.
fn verify_with_retry<F>(
    key: &VerifyingKey,
    signature: &Signature,
    date_header: &str,
    date: &DateTime<Utc>,
    canonical_for: F,
) -> Result<(), VerificationError>
where
    F: Fn(&str) -> Vec<u8>,
{
    if verify_payload(key, &canonical_for(date_header), signature) {
        return Ok(());
    }

    let adjusted = format_http_date(&(*date - Duration::seconds(1)));
    log::debug!("Signature mismatch, retrying with Date adjusted to {}", adjusted);

    if verify_payload(key, &canonical_for(&adjusted), signature) {
        Ok(())
    } else {
        Err(VerificationError::BadSignature)
    }
}

/// Client side verifier for responses to signed requests.
#[derive(Clone)]
pub struct Verifier {
    key: VerifyingKey,
    identity: String,
    gate: ResponseGate,
}

impl fmt::Debug for Verifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Verifier")
            .field("identity", &self.identity)
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

impl Verifier {
    /// Build a verifier for responses addressed to `identity`, resolving the
    /// service's public key once.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity is unusable or the key material is
    /// invalid.
    pub fn new(
        identity: impl Into<String>,
        public_key: impl Into<KeyMaterial<VerifyingKey>>,
    ) -> Result<Self, Report<HtdsaError>> {
        let identity = identity.into();
        validate_identity(&identity)?;
        let key = public_key
            .into()
            .resolve()
            .attach("while loading the service public key")?;

        Ok(Self {
            key,
            identity,
            gate: ResponseGate::default(),
        })
    }

    #[must_use]
    pub fn with_gate(mut self, gate: ResponseGate) -> Self {
        self.gate = gate;
        self
    }

    #[must_use]
    pub fn gate(&self) -> ResponseGate {
        self.gate
    }

    /// Verify `response` to the request `request_method request_url`.
    ///
    /// # Errors
    ///
    /// Returns the [`VerificationError`] describing why the response was
    /// rejected.
    pub fn verify<B: AsRef<[u8]>>(
        &self,
        request_method: &str,
        request_url: &str,
        response: &Response<B>,
        now: &DateTime<Utc>,
    ) -> Result<(), VerificationError> {
        if !self.gate.requires_verification(response.status()) {
            log::debug!(
                "Skipping validation of {} response to {} {}",
                response.status(),
                request_method,
                request_url
            );
            return Ok(());
        }

        log::debug!(
            "Validating response signature for {} {}",
            request_method,
            request_url
        );

        let (date_header, date, signature) = signed_parts(response.headers(), now)?;
        let body = response.body().as_ref();

        verify_with_retry(&self.key, &signature, date_header, &date, |date| {
            canonicalize_response(&self.identity, request_method, date, request_url, body)
        })
    }
}

/// Lookup of client public keys by identity token.
pub trait ClientKeys: Send + Sync {
    fn public_key(&self, identity: &str) -> Option<VerifyingKey>;
}

impl ClientKeys for HashMap<String, VerifyingKey> {
    fn public_key(&self, identity: &str) -> Option<VerifyingKey> {
        self.get(identity).copied()
    }
}

/// Build a [`ClientKeys`] map from identity to hex-encoded public key.
///
/// # Errors
///
/// Returns an error naming the first identity whose key does not resolve.
pub fn client_keys_from_hex<'a, I>(
    entries: I,
) -> Result<HashMap<String, VerifyingKey>, Report<HtdsaError>>
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    entries
        .into_iter()
        .map(|(identity, key_hex)| -> Result<_, Report<HtdsaError>> {
            validate_identity(identity)?;
            let key = KeyMaterial::<VerifyingKey>::from(key_hex.as_str())
                .resolve()
                .attach(format!("while loading public key for client {identity}"))?;
            Ok((identity.clone(), key))
        })
        .collect()
}

/// Service side verifier for signed requests.
pub struct RequestVerifier<K> {
    clients: K,
}

impl<K: ClientKeys> RequestVerifier<K> {
    #[must_use]
    pub fn new(clients: K) -> Self {
        Self { clients }
    }

    /// Verify a signed request and return the authenticated identity.
    ///
    /// `url` is the absolute URL the client addressed, which is what the
    /// client signed; it is usually reconstructed from the `Host` header.
    ///
    /// # Errors
    ///
    /// Returns the [`VerificationError`] describing why the request was
    /// rejected.
    pub fn verify<B: AsRef<[u8]>>(
        &self,
        request: &Request<B>,
        url: &str,
        now: &DateTime<Utc>,
    ) -> Result<String, VerificationError> {
        let headers = request.headers();
        let identity =
            header_str(headers, &HEADER_X_SERVICE).ok_or(VerificationError::MissingIdentity)?;
        let key = self.clients.public_key(identity).ok_or_else(|| {
            log::warn!("Rejecting request from unknown identity {:?}", identity);
            VerificationError::UnknownIdentity
        })?;

        let (date_header, date, signature) = signed_parts(headers, now)?;
        let method = request.method().as_str();
        let body = request.body().as_ref();

        verify_with_retry(&key, &signature, date_header, &date, |date| {
            canonicalize_request(method, date, url, body)
        })?;

        Ok(identity.to_string())
    }
}
