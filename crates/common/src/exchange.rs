//! Exchange coordination around a caller-supplied HTTP transport.
//!
//! [`SignedAuth`] exposes the two protocol hooks, `attach` before sending
//! and `validate` after receipt. [`SignedClient`] sequences them around a
//! [`Transport`]: sign, send, await the response, verify.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use error_stack::{Report, ResultExt};
use http::{Request, Response};

use crate::clock::{Clock, SystemClock};
use crate::error::HtdsaError;
use crate::request_signing::{
    KeyMaterial, ResponseGate, Signer, SigningKey, Verifier, VerifyingKey,
};
use crate::settings::Client;

/// Sends a request and returns the response. Implemented by the embedding
/// application on top of whichever HTTP client it uses.
#[async_trait(?Send)]
pub trait Transport {
    /// # Errors
    ///
    /// Returns [`HtdsaError::Transport`] when no response could be obtained.
    async fn send(
        &self,
        request: Request<Vec<u8>>,
    ) -> Result<Response<Vec<u8>>, Report<HtdsaError>>;
}

/// Signed request/response authentication for a single client identity.
#[derive(Debug, Clone)]
pub struct SignedAuth {
    signer: Signer,
    verifier: Verifier,
    clock: Arc<dyn Clock>,
}

impl SignedAuth {
    /// Configure HTDSA authentication.
    ///
    /// `private_key` is this application's key; `public_key` is the service key
    /// handed out when the application was registered. Either may be a parsed
    /// key or its hex encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity or either key is invalid.
    pub fn new(
        identity: impl Into<String>,
        private_key: impl Into<KeyMaterial<SigningKey>>,
        public_key: impl Into<KeyMaterial<VerifyingKey>>,
    ) -> Result<Self, Report<HtdsaError>> {
        let identity = identity.into();
        let signer = Signer::new(identity.clone(), private_key)?;
        let verifier = Verifier::new(identity, public_key)?;

        Ok(Self {
            signer,
            verifier,
            clock: Arc::new(SystemClock),
        })
    }

    /// # Errors
    ///
    /// Returns an error if the configured identity or keys are invalid.
    pub fn from_settings(client: &Client) -> Result<Self, Report<HtdsaError>> {
        Ok(Self::new(
            client.identity.as_str(),
            client.private_key.as_str(),
            client.service_public_key.as_str(),
        )
        .attach("while configuring client from settings")?
        .with_gate(client.verify))
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.signer = self.signer.with_clock(Arc::clone(&clock));
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_gate(mut self, gate: ResponseGate) -> Self {
        self.verifier = self.verifier.with_gate(gate);
        self
    }

    #[must_use]
    pub fn identity(&self) -> &str {
        self.signer.identity()
    }

    /// Sign `request` in place, adding `Date`, `X-Service` and `X-Signature`.
    ///
    /// # Errors
    ///
    /// Returns an error if the signed values cannot be stored as headers.
    pub fn attach<B: AsRef<[u8]>>(&self, request: &mut Request<B>) -> Result<(), Report<HtdsaError>> {
        let url = request.uri().to_string();
        let signed = self
            .signer
            .sign(request.method().as_str(), &url, request.body().as_ref());

        signed.apply(request.headers_mut())
    }

    /// Verify `response` to the request `method url`.
    ///
    /// # Errors
    ///
    /// Returns an [`HtdsaError::Verification`] report carrying the
    /// [`VerificationError`](crate::error::VerificationError) reason.
    pub fn validate<B: AsRef<[u8]>>(
        &self,
        method: &str,
        url: &str,
        response: &Response<B>,
    ) -> Result<(), Report<HtdsaError>> {
        let start = Instant::now();

        self.verifier
            .verify(method, url, response, &self.clock.now())
            .map_err(|reason| {
                Report::new(reason)
                    .change_context(HtdsaError::Verification)
                    .attach(format!("while validating response to {method} {url}"))
            })?;

        log::debug!(
            "Validation of response to {} {} took {:?}",
            method,
            url,
            start.elapsed()
        );
        Ok(())
    }
}

/// A transport wrapped with HTDSA signing and verification.
pub struct SignedClient<T> {
    auth: SignedAuth,
    transport: T,
}

impl<T: Transport> SignedClient<T> {
    #[must_use]
    pub fn new(auth: SignedAuth, transport: T) -> Self {
        Self { auth, transport }
    }

    #[must_use]
    pub fn auth(&self) -> &SignedAuth {
        &self.auth
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Sign and send `request`, then verify the response before returning it.
    ///
    /// Verification only runs once a response exists; a transport failure is
    /// returned as is.
    ///
    /// # Errors
    ///
    /// Returns a transport error, or a verification error if the response
    /// signature is not acceptable.
    pub async fn execute(
        &self,
        mut request: Request<Vec<u8>>,
    ) -> Result<Response<Vec<u8>>, Report<HtdsaError>> {
        let method = request.method().clone();
        let url = request.uri().to_string();

        self.auth.attach(&mut request)?;

        let response = self
            .transport
            .send(request)
            .await
            .attach(format!("while sending {method} {url}"))?;

        self.auth.validate(method.as_str(), &url, &response)?;
        Ok(response)
    }
}
