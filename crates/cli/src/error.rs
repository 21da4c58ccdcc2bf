//! CLI error types.

use std::fmt;

use error_stack::Report;
use htdsa_common::error::HtdsaError;

#[derive(Debug)]
pub enum CliError {
    /// Configuration file error
    Config(String),
    /// Invalid command line input
    Input(String),
    /// IO error
    Io(std::io::Error),
    /// Output serialization error
    Output(String),
    /// Signature was rejected
    Verification(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Input(msg) => write!(f, "Invalid input: {}", msg),
            CliError::Io(err) => write!(f, "IO error: {}", err),
            CliError::Output(msg) => write!(f, "Output error: {}", msg),
            CliError::Verification(msg) => write!(f, "Verification failed: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io(err)
    }
}

impl From<toml::ser::Error> for CliError {
    fn from(err: toml::ser::Error) -> Self {
        CliError::Output(err.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Output(err.to_string())
    }
}

impl From<Report<HtdsaError>> for CliError {
    fn from(report: Report<HtdsaError>) -> Self {
        match report.current_context() {
            HtdsaError::Verification => CliError::Verification(format!("{report:?}")),
            _ => CliError::Config(format!("{report:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_cli_error_display() {
        assert_eq!(
            format!("{}", CliError::Config("test".into())),
            "Configuration error: test"
        );
        assert_eq!(
            format!("{}", CliError::Input("test".into())),
            "Invalid input: test"
        );
        assert_eq!(
            format!("{}", CliError::Output("test".into())),
            "Output error: test"
        );
        assert_eq!(
            format!("{}", CliError::Verification("test".into())),
            "Verification failed: test"
        );
    }

    #[test]
    fn test_cli_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let cli_err: CliError = io_err.into();
        match cli_err {
            CliError::Io(_) => {}
            _ => panic!("Expected Io variant"),
        }
    }

    #[test]
    fn test_cli_error_from_report() {
        let report = Report::new(HtdsaError::Verification);
        assert!(matches!(CliError::from(report), CliError::Verification(_)));

        let report = Report::new(HtdsaError::InvalidKey {
            message: "bad".into(),
        });
        assert!(matches!(CliError::from(report), CliError::Config(_)));
    }

    #[test]
    fn test_cli_error_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let cli_err: CliError = io_err.into();
        assert!(cli_err.source().is_some());

        let config_err = CliError::Config("test".into());
        assert!(config_err.source().is_none());
    }
}
