//! Key generation.

use serde::Serialize;
use sha2::{Digest, Sha256};

use htdsa_common::request_signing::Keypair;

use crate::error::CliError;
use crate::KeyFormat;

#[derive(Debug, Serialize)]
struct GeneratedKey {
    private_key: String,
    public_key: String,
    fingerprint: String,
}

/// SHA-256 fingerprint of a hex-encoded public key, for out-of-band comparison.
pub fn fingerprint(public_hex: &str) -> String {
    let hash = Sha256::digest(public_hex.as_bytes());
    format!("sha256:{}", hex::encode(hash))
}

fn render(keypair: &Keypair, format: &KeyFormat) -> Result<String, CliError> {
    let public_key = keypair.public_hex();
    let generated = GeneratedKey {
        private_key: keypair.private_hex(),
        fingerprint: fingerprint(&public_key),
        public_key,
    };

    Ok(match format {
        KeyFormat::Text => format!(
            "Private key: {}\nPublic key:  {}\nFingerprint: {}",
            generated.private_key, generated.public_key, generated.fingerprint
        ),
        KeyFormat::Json => serde_json::to_string_pretty(&generated)?,
        KeyFormat::Toml => toml::to_string(&generated)?,
    })
}

/// Generate a fresh P-192 keypair and print it.
pub fn generate_and_display(format: &KeyFormat) -> Result<(), CliError> {
    let keypair = Keypair::generate();
    println!("{}", render(&keypair, format)?);
    Ok(())
}
