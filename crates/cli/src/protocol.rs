//! Signing and verification commands.

use std::fs;
use std::path::Path;

use chrono::Utc;
use http::{Response, StatusCode, Uri};

use htdsa_common::constants::{HEADER_DATE, HEADER_X_SERVICE, HEADER_X_SIGNATURE};
use htdsa_common::request_signing::{Signer, SignedHeaders, Verifier};
use htdsa_common::timestamp::parse_http_date;

use crate::config::load_config;
use crate::error::CliError;
use crate::{OutputFormat, VerifyArgs};

fn read_body(path: Option<&Path>) -> Result<Vec<u8>, CliError> {
    match path {
        Some(path) => Ok(fs::read(path)?),
        None => Ok(Vec::new()),
    }
}

fn render_headers(signed: &SignedHeaders, format: &OutputFormat) -> Result<String, CliError> {
    Ok(match format {
        OutputFormat::Text => format!(
            "{}: {}\n{}: {}\n{}: {}",
            HEADER_DATE.as_str(),
            signed.date,
            HEADER_X_SERVICE.as_str(),
            signed.identity,
            HEADER_X_SIGNATURE.as_str(),
            signed.signature
        ),
        OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
            "date": signed.date,
            "x-service": signed.identity,
            "x-signature": signed.signature,
        }))?,
    })
}

/// The URL as an `http` client sends it, e.g. `https://h` becomes `https://h/`.
fn request_url(url: &str) -> Result<String, CliError> {
    let uri: Uri = url
        .parse()
        .map_err(|e| CliError::Input(format!("Invalid URL {url}: {e}")))?;
    Ok(uri.to_string())
}

fn signed_headers(
    config: &Path,
    method: &str,
    url: &str,
    body: Option<&Path>,
    verbose: bool,
) -> Result<SignedHeaders, CliError> {
    let settings = load_config(config, verbose)?;
    let signer = Signer::new(
        settings.client.identity.as_str(),
        settings.client.private_key.as_str(),
    )?;

    let url = request_url(url)?;
    let body = read_body(body)?;
    Ok(signer.sign(&method.to_ascii_uppercase(), &url, &body))
}

/// Sign a request with the configured client key and print the headers to attach.
pub fn sign(
    config: &Path,
    method: &str,
    url: &str,
    body: Option<&Path>,
    format: &OutputFormat,
    verbose: bool,
) -> Result<(), CliError> {
    let signed = signed_headers(config, method, url, body, verbose)?;
    println!("{}", render_headers(&signed, format)?);
    Ok(())
}

fn build_response(args: &VerifyArgs, body: Vec<u8>) -> Result<Response<Vec<u8>>, CliError> {
    let status = StatusCode::from_u16(args.status)
        .map_err(|e| CliError::Input(format!("Invalid status {}: {e}", args.status)))?;

    let mut builder = Response::builder()
        .status(status)
        .header(HEADER_DATE, args.date.as_str());
    if let Some(signature) = &args.signature {
        builder = builder.header(HEADER_X_SIGNATURE, signature.as_str());
    }

    builder
        .body(body)
        .map_err(|e| CliError::Input(format!("Invalid response headers: {e}")))
}

/// Verify a response signature against the configured service key.
pub fn verify(args: &VerifyArgs, verbose: bool) -> Result<(), CliError> {
    let settings = load_config(&args.config, verbose)?;
    let verifier = Verifier::new(
        settings.client.identity.as_str(),
        settings.client.service_public_key.as_str(),
    )?
    .with_gate(settings.client.verify);

    let now = match &args.now {
        Some(now) => parse_http_date(now)
            .ok_or_else(|| CliError::Input(format!("Invalid --now timestamp: {now}")))?,
        None => Utc::now(),
    };

    let url = request_url(&args.url)?;
    let response = build_response(args, read_body(args.body.as_deref())?)?;
    verifier
        .verify(&args.method.to_ascii_uppercase(), &url, &response, &now)
        .map_err(|reason| CliError::Verification(reason.to_string()))?;

    println!("Response signature is valid");
    Ok(())
}
