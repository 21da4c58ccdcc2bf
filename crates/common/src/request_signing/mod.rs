//! HTDSA request signing and response verification.
//!
//! This module provides the protocol engine: canonical message construction,
//! ECDSA (NIST P-192, SHA-256) signing, and verification with freshness and
//! clock-skew handling, for both the client and the service side.

pub mod canonical;
pub mod keys;
pub mod signing;
pub mod verification;

pub use canonical::*;
pub use keys::*;
pub use signing::*;
pub use verification::*;
