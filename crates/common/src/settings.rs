use std::collections::HashMap;
use std::fs;
use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use error_stack::{Report, ResultExt};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::HtdsaError;
use crate::request_signing::{
    client_keys_from_hex, RequestVerifier, ResponseGate, ResponseSigner, VerifyingKey,
};

pub const ENVIRONMENT_PREFIX: &str = "HTDSA";

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct Client {
    #[validate(length(min = 1))]
    pub identity: String,
    #[validate(length(min = 1))]
    pub private_key: String,
    #[validate(length(min = 1))]
    pub service_public_key: String,
    #[validate(url)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub verify: ResponseGate,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct Server {
    #[validate(length(min = 1))]
    pub private_key: String,
    /// Client identity token to hex-encoded public key.
    #[serde(default)]
    pub clients: HashMap<String, String>,
}

impl Server {
    /// # Errors
    ///
    /// Returns an error if the service private key is invalid.
    pub fn response_signer(&self) -> Result<ResponseSigner, Report<HtdsaError>> {
        ResponseSigner::new(self.private_key.as_str())
    }

    /// # Errors
    ///
    /// Returns an error if any registered client key is invalid.
    pub fn request_verifier(
        &self,
    ) -> Result<RequestVerifier<HashMap<String, VerifyingKey>>, Report<HtdsaError>> {
        Ok(RequestVerifier::new(client_keys_from_hex(&self.clients)?))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct Settings {
    #[validate(nested)]
    pub client: Client,
    #[validate(nested)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<Server>,
}

impl Settings {
    /// Load settings from a TOML file, applying `HTDSA__` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the settings are invalid.
    pub fn from_file(path: &Path) -> Result<Self, Report<HtdsaError>> {
        let toml_str = fs::read_to_string(path).change_context(HtdsaError::Configuration {
            message: format!("Failed to read settings file {}", path.display()),
        })?;

        Self::from_toml(&toml_str)
    }

    /// Parse settings from a TOML string, applying `HTDSA__` environment
    /// overrides (e.g. `HTDSA__CLIENT__IDENTITY`).
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed, a required field is missing,
    /// or validation fails.
    pub fn from_toml(toml_str: &str) -> Result<Self, Report<HtdsaError>> {
        let environment = Environment::default()
            .prefix(ENVIRONMENT_PREFIX)
            .separator("__");

        let toml = File::from_str(toml_str, FileFormat::Toml);
        let config = Config::builder()
            .add_source(toml)
            .add_source(environment)
            .build()
            .change_context(HtdsaError::Configuration {
                message: "Failed to build configuration".into(),
            })?;

        let settings: Self =
            config
                .try_deserialize()
                .change_context(HtdsaError::Configuration {
                    message: "Failed to deserialize configuration".into(),
                })?;

        settings
            .validate()
            .change_context(HtdsaError::Configuration {
                message: "Configuration validation failed".into(),
            })?;

        Ok(settings)
    }
}
