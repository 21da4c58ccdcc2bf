//! Configuration management commands.
//!
//! Configuration is loaded from TOML files and merged with environment variables
//! prefixed with `HTDSA__`. For example, `HTDSA__CLIENT__IDENTITY` will override
//! `client.identity` in the TOML file.

use std::path::Path;

use htdsa_common::exchange::SignedAuth;
use htdsa_common::settings::Settings;

use crate::error::CliError;

/// Load configuration from a TOML file merged with environment variables.
pub(crate) fn load_config(file: &Path, verbose: bool) -> Result<Settings, CliError> {
    if verbose {
        log::info!("Loading config from: {}", file.display());
        log::info!("Environment variables with HTDSA__ prefix will be merged");
    }

    Settings::from_file(file)
        .map_err(|e| CliError::Config(format!("Failed to load config: {e:?}")))
}

/// Validate a configuration file.
///
/// Beyond syntax and required fields, every key is parsed so that bad key
/// material is reported here rather than on first use.
pub fn validate(file: &Path, verbose: bool) -> Result<(), CliError> {
    let settings = load_config(file, verbose)?;
    let auth = SignedAuth::from_settings(&settings.client)?;

    println!("Configuration is valid");
    println!("  File: {}", file.display());
    println!("  Identity: {}", auth.identity());
    println!("  Verify: {:?}", settings.client.verify);
    if let Some(endpoint) = &settings.client.endpoint {
        println!("  Endpoint: {}", endpoint);
    }

    if let Some(server) = &settings.server {
        server.response_signer()?;
        server.request_verifier()?;
        println!("  Server clients: {}", server.clients.len());
    }

    Ok(())
}
