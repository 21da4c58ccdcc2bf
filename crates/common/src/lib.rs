//! HTDSA signed request/response authentication for HTTP.
//!
//! A client signs each outgoing request with its private key and the identity
//! token the service assigned it; the service signs its reply, and the client
//! verifies that signature before trusting the response.
//!
//! # Modules
//!
//! - [`api`]: Generic REST endpoint builder over a signed client
//! - [`clock`]: Injectable wall-clock used for stamping and freshness checks
//! - [`constants`]: Header names, date format and freshness bounds
//! - [`error`]: Error types and error handling utilities
//! - [`exchange`]: Sign/verify lifecycle around a caller-supplied transport
//! - [`logging`]: Logger initialization
//! - [`request_signing`]: Canonical messages, signing and verification
//! - [`settings`]: Configuration management and validation
//! - [`test_support`]: Testing utilities
//! - [`timestamp`]: `Date` header rendering and parsing

pub mod api;
pub mod clock;
pub mod constants;
pub mod error;
pub mod exchange;
pub mod logging;
pub mod request_signing;
pub mod settings;
pub mod timestamp;
