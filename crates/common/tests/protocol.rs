//! End-to-end exchanges through the public API: a client and a service, each
//! with its own keypair, talking over an in-memory transport.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use error_stack::Report;
use futures::executor::block_on;
use http::{Method, Request, Response, StatusCode};

use htdsa_common::clock::FixedClock;
use htdsa_common::error::{HtdsaError, VerificationError};
use htdsa_common::exchange::{SignedAuth, SignedClient, Transport};
use htdsa_common::request_signing::{
    canonicalize_request, canonicalize_response, Keypair, RequestVerifier, ResponseGate,
    ResponseSigner, VerifyingKey,
};

const IDENTITY: &str = "app-7";
const URL: &str = "https://api.example.com/v1/orders?page=2";

fn instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2031, 6, 15, 12, 30, 0)
        .single()
        .expect("valid instant")
}

/// A service that authenticates the caller and signs a reply naming it.
struct Service {
    signer: ResponseSigner,
    verifier: RequestVerifier<HashMap<String, VerifyingKey>>,
    now: DateTime<Utc>,
    reply_at: DateTime<Utc>,
    status: StatusCode,
}

#[async_trait(?Send)]
impl Transport for Service {
    async fn send(
        &self,
        request: Request<Vec<u8>>,
    ) -> Result<Response<Vec<u8>>, Report<HtdsaError>> {
        let url = request.uri().to_string();
        let body = match self.verifier.verify(&request, &url, &self.now) {
            Ok(identity) => format!("{{\"caller\":\"{identity}\"}}").into_bytes(),
            Err(reason) => {
                return Ok(Response::builder()
                    .status(StatusCode::UNAUTHORIZED)
                    .body(reason.to_string().into_bytes())
                    .expect("valid response"))
            }
        };

        let mut response = Response::builder()
            .status(self.status)
            .body(body)
            .expect("valid response");
        let identity = request
            .headers()
            .get("x-service")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        self.signer
            .sign_at(&self.reply_at, &identity, request.method().as_str(), &url, response.body())
            .apply(response.headers_mut())?;
        Ok(response)
    }
}

struct Setup {
    client: Keypair,
    service: Keypair,
}

impl Setup {
    fn new() -> Self {
        Self {
            client: Keypair::generate(),
            service: Keypair::generate(),
        }
    }

    fn auth(&self, now: DateTime<Utc>) -> SignedAuth {
        SignedAuth::new(IDENTITY, self.client.private_hex(), self.service.public_hex())
            .expect("valid auth")
            .with_clock(Arc::new(FixedClock(now)))
    }

    fn service(&self, now: DateTime<Utc>, status: StatusCode) -> Service {
        let mut clients = HashMap::new();
        clients.insert(IDENTITY.to_string(), self.client.verifying_key);
        Service {
            signer: ResponseSigner::new(self.service.private_hex()).expect("valid signer"),
            verifier: RequestVerifier::new(clients),
            now,
            reply_at: now,
            status,
        }
    }
}

fn post(body: &[u8]) -> Request<Vec<u8>> {
    Request::builder()
        .method(Method::POST)
        .uri(URL)
        .body(body.to_vec())
        .expect("valid request")
}

#[test]
fn signed_exchange_round_trip() {
    let setup = Setup::new();
    let client = SignedClient::new(
        setup.auth(instant()),
        setup.service(instant(), StatusCode::OK),
    );

    let response = block_on(client.execute(post(b"qty=3"))).expect("exchange should verify");
    assert_eq!(response.body(), br#"{"caller":"app-7"}"#);
}

#[test]
fn service_clock_slightly_ahead_is_tolerated() {
    let setup = Setup::new();
    let client = SignedClient::new(
        setup.auth(instant()),
        setup.service(instant() + Duration::seconds(1), StatusCode::OK),
    );

    assert!(block_on(client.execute(post(b""))).is_ok());
}

#[test]
fn stale_service_reply_is_rejected() {
    let setup = Setup::new();
    let mut service = setup.service(instant(), StatusCode::OK);
    service.reply_at = instant() - Duration::seconds(40);
    let client = SignedClient::new(setup.auth(instant()), service);

    let err = block_on(client.execute(post(b""))).expect_err("should be stale");
    assert_eq!(
        err.downcast_ref::<VerificationError>(),
        Some(&VerificationError::StaleResponse)
    );
}

#[test]
fn reply_signed_by_another_key_is_rejected() {
    let setup = Setup::new();
    let impostor = Setup::new();
    let client = SignedClient::new(
        setup.auth(instant()),
        impostor.service(instant(), StatusCode::OK),
    );

    // The impostor does not know the client key, so it answers 401 which the
    // default gate leaves unverified.
    let response = block_on(client.execute(post(b""))).expect("401 is not verified");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[test]
fn gate_all_verifies_error_replies() {
    let setup = Setup::new();
    let impostor = Setup::new();
    let client = SignedClient::new(
        setup.auth(instant()).with_gate(ResponseGate::All),
        impostor.service(instant(), StatusCode::OK),
    );

    let err = block_on(client.execute(post(b""))).expect_err("unsigned 401 should fail");
    assert_eq!(
        err.downcast_ref::<VerificationError>(),
        Some(&VerificationError::MissingSignature)
    );
}

#[test]
fn canonical_forms_match_documented_layout() {
    let date = "Sun, 15 Jun 2031 12:30:00 GMT";

    assert_eq!(
        canonicalize_request("GET", date, URL, b""),
        format!("GET\n{date}\n{URL}\n").into_bytes()
    );
    assert_eq!(
        canonicalize_response(IDENTITY, "GET", date, URL, b"[]"),
        format!("{IDENTITY}\nGET\n{date}\n{URL}\n[]").into_bytes()
    );
}
